mod board;
mod solver;

pub use board::{BOARD_SIZE, Board, Mark};
pub use solver::best_move;
