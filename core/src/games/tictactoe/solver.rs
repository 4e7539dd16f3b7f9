use super::board::{Board, Mark};

const WIN_SCORE: i32 = 10;
const SCORE_SENTINEL: i32 = 100;

/// Best move for the own side under optimal opposing play. Ties are broken
/// by the first candidate in row-major order, so the result is deterministic
/// for a given board.
pub fn best_move(board: &Board) -> Option<(usize, usize)> {
    let mut scratch = *board;
    let mut best: Option<(usize, usize)> = None;
    let mut best_score = -SCORE_SENTINEL;

    for (row, col) in board.available_moves() {
        scratch.set(row, col, Mark::Own);
        let score = minimax(&mut scratch, false, -SCORE_SENTINEL, SCORE_SENTINEL);
        scratch.set(row, col, Mark::Empty);

        if score > best_score {
            best_score = score;
            best = Some((row, col));
        }
    }

    best
}

fn minimax(board: &mut Board, is_maximizing: bool, mut alpha: i32, mut beta: i32) -> i32 {
    match board.winner() {
        Some(Mark::Own) => return WIN_SCORE,
        Some(Mark::Foe) => return -WIN_SCORE,
        _ => {}
    }

    if board.is_full() {
        return 0;
    }

    if is_maximizing {
        let mut best = -SCORE_SENTINEL;
        for (row, col) in board.available_moves() {
            board.set(row, col, Mark::Own);
            best = best.max(minimax(board, false, alpha, beta));
            board.set(row, col, Mark::Empty);

            alpha = alpha.max(best);
            if beta <= alpha {
                return best;
            }
        }
        best
    } else {
        let mut best = SCORE_SENTINEL;
        for (row, col) in board.available_moves() {
            board.set(row, col, Mark::Foe);
            best = best.min(minimax(board, true, alpha, beta));
            board.set(row, col, Mark::Empty);

            beta = beta.min(best);
            if beta <= alpha {
                return best;
            }
        }
        best
    }
}
