/// Cycles through players round by round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnManager {
    current_player_index: usize,
    /// 1-based. Exceeds `total_rounds` once every round has been played.
    current_round: u32,
    /// Turns completed so far.
    turn_number: u32,
    player_count: usize,
    total_rounds: u32,
}

impl TurnManager {
    pub fn new(player_count: usize, total_rounds: u32) -> Self {
        Self {
            current_player_index: 0,
            current_round: 1,
            turn_number: 0,
            player_count,
            total_rounds,
        }
    }

    /// Move to the next player, wrapping into the next round after the last.
    pub fn advance_turn(&mut self) {
        self.turn_number += 1;
        self.current_player_index += 1;
        if self.current_player_index >= self.player_count {
            self.current_player_index = 0;
            self.current_round += 1;
        }
    }

    pub fn is_all_rounds_complete(&self) -> bool {
        self.current_round > self.total_rounds
    }

    pub fn current_player_index(&self) -> usize {
        self.current_player_index
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }
}
