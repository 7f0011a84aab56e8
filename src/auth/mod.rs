pub mod handlers;
pub mod session;

pub use session::{AuthEvent, Session, SessionProvider, Subscription};
