pub mod guard;
pub mod like;
pub mod optimistic;

pub use self::guard::{InFlightGuard, InFlightPermit};
pub use self::like::{LikeState, LikeToggle};
pub use self::optimistic::{Optimistic, Outcome};
