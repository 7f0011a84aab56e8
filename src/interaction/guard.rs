use tokio::sync::{Semaphore, SemaphorePermit};

/// Single-slot guard over one pending operation.
///
/// Holding the [`InFlightPermit`] marks the operation as in flight; dropping
/// it frees the slot, so an early return or a panic cannot leave the guard
/// stuck.
#[derive(Debug)]
pub struct InFlightGuard {
    slot: Semaphore,
}

#[derive(Debug)]
pub struct InFlightPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self {
            slot: Semaphore::new(1),
        }
    }

    /// Take the slot if it is free, otherwise reject.
    pub fn try_acquire(&self) -> Option<InFlightPermit<'_>> {
        self.slot
            .try_acquire()
            .ok()
            .map(|permit| InFlightPermit { _permit: permit })
    }

    /// Wait for the slot.
    pub async fn acquire(&self) -> InFlightPermit<'_> {
        // The semaphore is never closed.
        match self.slot.acquire().await {
            Ok(permit) => InFlightPermit { _permit: permit },
            Err(_) => unreachable!("in-flight semaphore closed"),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn second_request_is_rejected_while_first_is_held() {
        let guard = InFlightGuard::new();
        let first = guard.try_acquire();
        assert!(first.is_some());
        assert!(guard.is_busy());
        assert!(guard.try_acquire().is_none());

        drop(first);
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_queues_until_release() {
        let guard = Arc::new(InFlightGuard::new());
        let permit = guard.try_acquire();
        assert!(permit.is_some());
        let waiter = {
            let guard = guard.clone();
            tokio::spawn(async move {
                let _p = guard.acquire().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(permit);
        waiter.await.unwrap();
    }
}
