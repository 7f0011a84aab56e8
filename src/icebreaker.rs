//! Icebreaker card game: a shuffled deck of question cards that players flip
//! one at a time. Entirely local; nothing is persisted.

use std::sync::Mutex;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::interaction::InFlightGuard;

pub const DEFAULT_QUESTIONS: &[&str] = &[
    "What's your favourite fruit?",
    "Share your most embarrassing moment.",
    "Share a moment you were most grateful for.",
    "What are you looking for in a partner?",
    "What's your favourite sport?",
    "If you could have one superpower, what would it be?",
    "What was the last thing that made you laugh out loud?",
    "Where would you most like to travel?",
    "Share a favourite movie.",
    "What's your most memorable childhood memory?",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: usize,
    pub question: String,
    pub is_flipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipOutcome {
    Flipped,
    AlreadyFlipped,
    Resetting,
    UnknownCard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Reshuffled,
    AlreadyResetting,
}

/// Uniform Fisher-Yates permutation in place.
pub fn shuffle<R: Rng + ?Sized>(cards: &mut [Card], rng: &mut R) {
    cards.shuffle(rng);
}

/// One face-down card per question, ids following question order, shuffled.
pub fn deal<R: Rng + ?Sized>(questions: &[String], rng: &mut R) -> Vec<Card> {
    let mut cards: Vec<Card> = questions
        .iter()
        .enumerate()
        .map(|(id, question)| Card {
            id,
            question: question.clone(),
            is_flipped: false,
        })
        .collect();
    shuffle(&mut cards, rng);
    cards
}

#[derive(Debug)]
pub struct IcebreakerGame {
    cards: Mutex<Vec<Card>>,
    resetting: InFlightGuard,
    reset_delay: Duration,
}

impl IcebreakerGame {
    pub fn new(questions: &[String], reset_delay: Duration) -> Self {
        Self::with_rng(questions, reset_delay, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(
        questions: &[String],
        reset_delay: Duration,
        rng: &mut R,
    ) -> Self {
        Self {
            cards: Mutex::new(deal(questions, rng)),
            resetting: InFlightGuard::new(),
            reset_delay,
        }
    }

    pub fn cards(&self) -> Vec<Card> {
        self.cards.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_resetting(&self) -> bool {
        self.resetting.is_busy()
    }

    /// Turn a card face up. Face-up cards stay that way until the next reset.
    ///
    /// The resetting check happens under the cards lock, the same lock
    /// `reset` holds while it takes the guard and turns cards face down.
    pub fn flip(&self, id: usize) -> FlipOutcome {
        let mut cards = self.cards.lock().unwrap_or_else(|e| e.into_inner());
        if self.resetting.is_busy() {
            return FlipOutcome::Resetting;
        }
        match cards.iter_mut().find(|c| c.id == id) {
            None => FlipOutcome::UnknownCard,
            Some(card) if card.is_flipped => FlipOutcome::AlreadyFlipped,
            Some(card) => {
                card.is_flipped = true;
                FlipOutcome::Flipped
            }
        }
    }

    /// Turn every card face down, wait for the flip-back animation, then
    /// reshuffle. Flips are refused until the reshuffle is done.
    pub async fn reset(&self) -> ResetOutcome {
        let _permit = {
            let mut cards = self.cards.lock().unwrap_or_else(|e| e.into_inner());
            let Some(permit) = self.resetting.try_acquire() else {
                return ResetOutcome::AlreadyResetting;
            };
            for card in cards.iter_mut() {
                card.is_flipped = false;
            }
            permit
        };

        tokio::time::sleep(self.reset_delay).await;

        let mut cards = self.cards.lock().unwrap_or_else(|e| e.into_inner());
        shuffle(&mut cards, &mut rand::thread_rng());
        ResetOutcome::Reshuffled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn questions(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("question {}", i)).collect()
    }

    fn sorted_ids(cards: &[Card]) -> Vec<usize> {
        let mut ids: Vec<usize> = cards.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn deal_is_a_permutation_for_any_size_and_seed() {
        for n in [0, 1, 2, 5, 10, 33] {
            for seed in 0..50 {
                let mut rng = StdRng::seed_from_u64(seed);
                let cards = deal(&questions(n), &mut rng);
                assert_eq!(sorted_ids(&cards), (0..n).collect::<Vec<_>>());
                assert!(cards.iter().all(|c| !c.is_flipped));
                assert!(cards
                    .iter()
                    .all(|c| c.question == format!("question {}", c.id)));
            }
        }
    }

    #[test]
    fn shuffle_reaches_every_position() {
        let mut first_positions = std::collections::HashSet::new();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let cards = deal(&questions(4), &mut rng);
            first_positions.insert(cards[0].id);
        }
        assert_eq!(first_positions.len(), 4);
    }

    #[test]
    fn flip_is_one_way() {
        let game = IcebreakerGame::new(&questions(3), Duration::from_millis(600));
        assert_eq!(game.flip(1), FlipOutcome::Flipped);
        assert_eq!(game.flip(1), FlipOutcome::AlreadyFlipped);
        assert!(game.cards().iter().find(|c| c.id == 1).unwrap().is_flipped);
        assert_eq!(game.flip(99), FlipOutcome::UnknownCard);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_unflips_then_reshuffles_and_blocks_flips_meanwhile() {
        let game = Arc::new(IcebreakerGame::new(
            &questions(10),
            Duration::from_millis(600),
        ));
        game.flip(0);
        game.flip(4);

        let resetting = {
            let game = game.clone();
            tokio::spawn(async move { game.reset().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(game.is_resetting());
        assert!(game.cards().iter().all(|c| !c.is_flipped));
        assert_eq!(game.flip(2), FlipOutcome::Resetting);
        assert_eq!(game.reset().await, ResetOutcome::AlreadyResetting);

        assert_eq!(resetting.await.unwrap(), ResetOutcome::Reshuffled);
        assert!(!game.is_resetting());
        assert_eq!(sorted_ids(&game.cards()), (0..10).collect::<Vec<_>>());
        assert!(game.cards().iter().all(|c| !c.is_flipped));
        assert_eq!(game.flip(2), FlipOutcome::Flipped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn flip_racing_a_reset_never_survives_the_reshuffle() {
        for _ in 0..200 {
            let game = Arc::new(IcebreakerGame::new(&questions(4), Duration::from_millis(2)));
            let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

            let flipper = {
                let game = game.clone();
                let done = done.clone();
                std::thread::spawn(move || loop {
                    game.flip(0);
                    if game.is_resetting() {
                        return true;
                    }
                    if done.load(std::sync::atomic::Ordering::SeqCst) {
                        return false;
                    }
                })
            };

            assert_eq!(game.reset().await, ResetOutcome::Reshuffled);
            done.store(true, std::sync::atomic::Ordering::SeqCst);
            let saw_reset = flipper.join().unwrap();

            if saw_reset {
                let card = game.cards().into_iter().find(|c| c.id == 0).unwrap();
                assert!(!card.is_flipped);
            }
        }
    }
}
