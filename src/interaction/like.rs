//! Like state of one post as seen by one viewer.

use crate::backend::BackendResult;
use crate::db::Db;

use super::optimistic::{Optimistic, Outcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeState {
    pub count: u64,
    pub liked: bool,
}

impl LikeState {
    /// The state after one toggle.
    pub fn toggled(&self) -> Self {
        if self.liked {
            Self {
                count: self.count.saturating_sub(1),
                liked: false,
            }
        } else {
            Self {
                count: self.count + 1,
                liked: true,
            }
        }
    }

    pub fn label(&self) -> String {
        if self.count > 0 {
            self.count.to_string()
        } else {
            "Like".to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Applied(LikeState),
    RolledBack(LikeState),
    Busy(LikeState),
}

impl ToggleOutcome {
    pub fn state(&self) -> LikeState {
        match self {
            ToggleOutcome::Applied(s) | ToggleOutcome::RolledBack(s) | ToggleOutcome::Busy(s) => *s,
        }
    }
}

#[derive(Debug)]
pub struct LikeToggle {
    post_id: String,
    viewer_id: String,
    state: Optimistic<LikeState>,
}

impl LikeToggle {
    pub fn new(post_id: &str, viewer_id: &str, initial: LikeState) -> Self {
        Self {
            post_id: post_id.to_string(),
            viewer_id: viewer_id.to_string(),
            state: Optimistic::new(initial),
        }
    }

    /// Fetch the like count and whether the viewer has liked the post.
    pub async fn load(db: Db<'_>, post_id: &str, viewer_id: &str) -> BackendResult<Self> {
        let count = db.like_count(post_id).await?;
        let liked = db.has_liked(post_id, viewer_id).await?;
        Ok(Self::new(post_id, viewer_id, LikeState { count, liked }))
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn state(&self) -> LikeState {
        self.state.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    /// Flip the displayed state at once, then delete or insert the viewer's
    /// like. A failed mutation puts the previous state back; a toggle while
    /// another is in flight is ignored.
    pub async fn toggle(&self, db: Db<'_>) -> ToggleOutcome {
        let post_id = self.post_id.as_str();
        let viewer_id = self.viewer_id.as_str();

        let outcome = self
            .state
            .apply(LikeState::toggled, |prior| async move {
                if prior.liked {
                    db.unlike(post_id, viewer_id).await
                } else {
                    db.like(post_id, viewer_id).await
                }
            })
            .await;

        match outcome {
            Outcome::Applied(state) => ToggleOutcome::Applied(state),
            Outcome::Busy(state) => {
                tracing::debug!("Like on {} already in flight", post_id);
                ToggleOutcome::Busy(state)
            }
            Outcome::RolledBack { state, error } => {
                tracing::warn!("Error toggling like on {}: {}", post_id, error);
                ToggleOutcome::RolledBack(state)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggled_moves_count_with_liked() {
        let unliked = LikeState {
            count: 3,
            liked: false,
        };
        assert_eq!(
            unliked.toggled(),
            LikeState {
                count: 4,
                liked: true
            }
        );
        assert_eq!(unliked.toggled().toggled(), unliked);
    }

    #[test]
    fn toggled_never_underflows() {
        let stale = LikeState {
            count: 0,
            liked: true,
        };
        assert_eq!(stale.toggled().count, 0);
    }

    #[test]
    fn label_shows_count_or_prompt() {
        assert_eq!(
            LikeState {
                count: 0,
                liked: false
            }
            .label(),
            "Like"
        );
        assert_eq!(
            LikeState {
                count: 12,
                liked: true
            }
            .label(),
            "12"
        );
    }
}
