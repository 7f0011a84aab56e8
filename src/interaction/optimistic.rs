use std::future::Future;
use std::sync::Mutex;

use super::guard::InFlightGuard;

/// How an optimistic change ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<S, E> {
    /// The effect succeeded; the tentative state stays.
    Applied(S),
    /// The effect failed; the prior state was put back.
    RolledBack { state: S, error: E },
    /// Another change was still in flight; nothing happened.
    Busy(S),
}

impl<S, E> Outcome<S, E> {
    pub fn state(&self) -> &S {
        match self {
            Outcome::Applied(s) | Outcome::Busy(s) => s,
            Outcome::RolledBack { state, .. } => state,
        }
    }
}

/// A slice of displayed state that is changed before the effect backing it
/// has been confirmed, and restored if the effect fails.
///
/// At most one change is in flight at a time; the guard is taken before the
/// first await point.
#[derive(Debug)]
pub struct Optimistic<S> {
    state: Mutex<S>,
    guard: InFlightGuard,
}

impl<S: Clone> Optimistic<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: Mutex::new(initial),
            guard: InFlightGuard::new(),
        }
    }

    /// What is displayed right now, tentative or not.
    pub fn snapshot(&self) -> S {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// Replace the state wholesale, e.g. after a fresh fetch.
    pub fn reset(&self, state: S) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Apply `tentative` to the current state, run `effect` with the prior
    /// state, and restore the prior state if the effect fails.
    pub async fn apply<T, F, Fut, E>(&self, tentative: T, effect: F) -> Outcome<S, E>
    where
        T: FnOnce(&S) -> S,
        F: FnOnce(S) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let Some(_permit) = self.guard.try_acquire() else {
            return Outcome::Busy(self.snapshot());
        };

        let (prior, next) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let prior = state.clone();
            let next = tentative(&prior);
            *state = next.clone();
            (prior, next)
        };

        match effect(prior.clone()).await {
            Ok(()) => Outcome::Applied(next),
            Err(error) => {
                self.reset(prior.clone());
                Outcome::RolledBack {
                    state: prior,
                    error,
                }
            }
        }
    }
}
