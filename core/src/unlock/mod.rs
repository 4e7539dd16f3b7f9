use std::future::Future;

use crate::games::tictactoe::{Board, Mark, best_move};
use crate::session::SessionLog;

/// Rounds that must be won (or drawn) before a claim unlocks, indexed by
/// unlock tier. Tiers above the table clamp to the last entry.
const ROUNDS_BY_TIER: [u32; 6] = [5, 4, 3, 1, 0, 0];

/// Tiers at or above this claim directly, without the mini-game gate.
pub const DIRECT_CLAIM_TIER: u8 = 4;

pub fn rounds_required(tier: u8) -> u32 {
    ROUNDS_BY_TIER[usize::from(tier).min(ROUNDS_BY_TIER.len() - 1)]
}

/// Contract with the external automation driver that operates the remote
/// mini-game page. The engine never sees selectors or markup, only boards.
pub trait GameDriver: Send + 'static {
    fn new_round(&mut self) -> impl Future<Output = Result<Board, String>> + Send;
    fn apply_move(
        &mut self,
        row: usize,
        col: usize,
    ) -> impl Future<Output = Result<(), String>> + Send;
    fn wait_for_opponent(&mut self) -> impl Future<Output = Result<(), String>> + Send;
    fn read_board(&mut self) -> impl Future<Output = Result<Board, String>> + Send;
    fn submit_claim(&mut self) -> impl Future<Output = Result<bool, String>> + Send;
}

/// Placeholder driver for accounts that never hit the mini-game gate. Every
/// call fails, which the engine reports as an unlock failure.
pub struct NoopDriver;

impl GameDriver for NoopDriver {
    async fn new_round(&mut self) -> Result<Board, String> {
        Err("no automation driver attached".to_string())
    }

    async fn apply_move(&mut self, _row: usize, _col: usize) -> Result<(), String> {
        Err("no automation driver attached".to_string())
    }

    async fn wait_for_opponent(&mut self) -> Result<(), String> {
        Err("no automation driver attached".to_string())
    }

    async fn read_board(&mut self) -> Result<Board, String> {
        Err("no automation driver attached".to_string())
    }

    async fn submit_claim(&mut self) -> Result<bool, String> {
        Err("no automation driver attached".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundResult {
    Won,
    Draw,
    Lost,
}

pub struct UnlockEngine<D: GameDriver> {
    driver: D,
    log: SessionLog,
}

impl<D: GameDriver> UnlockEngine<D> {
    pub fn new(driver: D, log: SessionLog) -> Self {
        Self { driver, log }
    }

    /// Plays the required rounds and submits the claim. Driver failures and
    /// lost rounds are reported as `false`, never propagated; a bad round
    /// must not take the session down with it.
    pub async fn unlock(&mut self, rounds_required: u32, currency: &str) -> bool {
        if rounds_required == 0 {
            return true;
        }

        for round in 1..=rounds_required {
            self.log
                .push(format!("Mini-game round {}/{}", round, rounds_required));
            match self.play_round().await {
                Ok(RoundResult::Won) => self.log.push(format!("Round {} won", round)),
                Ok(RoundResult::Draw) => self.log.push(format!("Round {} drawn", round)),
                Ok(RoundResult::Lost) => {
                    self.log
                        .push(format!("Round {} lost, aborting unlock", round));
                    return false;
                }
                Err(error) => {
                    self.log
                        .push(format!("Automation failed in round {}: {}", round, error));
                    return false;
                }
            }
        }

        match self.driver.submit_claim().await {
            Ok(accepted) => {
                if accepted {
                    self.log.push(format!("Claim submitted for {}", currency));
                } else {
                    self.log.push("Claim submission was not accepted");
                }
                accepted
            }
            Err(error) => {
                self.log.push(format!("Claim submission failed: {}", error));
                false
            }
        }
    }

    async fn play_round(&mut self) -> Result<RoundResult, String> {
        let mut board = self.driver.new_round().await?;

        // At most nine placements fit on the board; re-reads past that mean
        // the page is stuck.
        for _ in 0..9 {
            if let Some(result) = round_result(&board) {
                return Ok(result);
            }

            let (row, col) = best_move(&board)
                .ok_or_else(|| "no legal moves on an unfinished board".to_string())?;
            self.driver.apply_move(row, col).await?;
            self.driver.wait_for_opponent().await?;
            board = self.driver.read_board().await?;
        }

        round_result(&board).ok_or_else(|| "round never reached a terminal state".to_string())
    }
}

fn round_result(board: &Board) -> Option<RoundResult> {
    match board.winner() {
        Some(Mark::Own) => Some(RoundResult::Won),
        Some(Mark::Foe) => Some(RoundResult::Lost),
        Some(Mark::Empty) => unreachable!(),
        None if board.is_full() => Some(RoundResult::Draw),
        None => None,
    }
}
