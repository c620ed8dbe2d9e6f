use serde::{Deserialize, Serialize};
use strum::Display;

use crate::types::PlayerId;

/// What the starting placement expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SetupPrompt {
    Settlement,
    Road,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SetupStep {
    player: PlayerId,
    prompt: SetupPrompt,
    second_round: bool,
}

/// Two placement rounds: seats in order, then in reverse. Each seat places
/// a settlement followed by a road touching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupState {
    steps: Vec<SetupStep>,
    cursor: usize,
}

impl SetupState {
    pub fn new(num_players: usize) -> Self {
        let mut steps = Vec::with_capacity(num_players * 4);
        let first = (0..num_players).map(|player| (player, false));
        let second = (0..num_players).rev().map(|player| (player, true));
        for (player, second_round) in first.chain(second) {
            for prompt in [SetupPrompt::Settlement, SetupPrompt::Road] {
                steps.push(SetupStep {
                    player,
                    prompt,
                    second_round,
                });
            }
        }
        Self { steps, cursor: 0 }
    }

    pub fn current_prompt(&self) -> Option<SetupPrompt> {
        self.steps.get(self.cursor).map(|step| step.prompt)
    }

    pub fn current_player(&self) -> Option<PlayerId> {
        self.steps.get(self.cursor).map(|step| step.player)
    }

    pub fn is_second_round(&self) -> bool {
        self.steps
            .get(self.cursor)
            .map(|step| step.second_round)
            .unwrap_or(false)
    }

    pub fn advance(&mut self) {
        if self.cursor < self.steps.len() {
            self.cursor += 1;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.steps.len()
    }
}
