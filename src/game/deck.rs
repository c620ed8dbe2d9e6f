use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::types::DevelopmentCard;

const DISTRIBUTION: &[(DevelopmentCard, usize)] = &[
    (DevelopmentCard::Knight, 14),
    (DevelopmentCard::VictoryPoint, 5),
    (DevelopmentCard::RoadBuilding, 2),
    (DevelopmentCard::YearOfPlenty, 2),
    (DevelopmentCard::Monopoly, 2),
];

/// Shuffled, finite development deck. Draws are permanent removals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevelopmentDeck {
    cards: Vec<DevelopmentCard>,
}

impl DevelopmentDeck {
    pub fn shuffled(rng: &mut impl rand::Rng) -> Self {
        let mut cards = Self::standard_cards();
        cards.shuffle(rng);
        Self { cards }
    }

    fn standard_cards() -> Vec<DevelopmentCard> {
        let mut cards = Vec::with_capacity(25);
        for (card, count) in DISTRIBUTION {
            cards.extend(std::iter::repeat_n(*card, *count));
        }
        cards
    }

    pub fn draw(&mut self) -> Option<DevelopmentCard> {
        self.cards.pop()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
