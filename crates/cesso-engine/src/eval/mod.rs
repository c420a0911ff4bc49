//! Static evaluation: classical handcrafted terms blended by game phase,
//! with an optional NNUE backend and a mop-up override for simplified
//! winning endgames.

pub mod king_safety;
pub mod material;
pub mod mobility;
pub mod mopup;
pub mod nnue;
pub mod outposts;
pub mod pawns;
pub mod phase;
pub mod pst;
pub mod rooks;
pub mod score;

use cesso_core::Board;
use cesso_core::Color;

use self::phase::MAX_PHASE;
use self::score::Score;

/// Sum piece-square table contributions for every occupied square, from
/// White's perspective.
fn pst_score(board: &Board) -> Score {
    let mut score = Score::ZERO;
    for sq in board.occupied() {
        let kind = board.piece_on(sq).expect("occupied square has a piece");
        let color = board.color_on(sq).expect("occupied square has a color");
        score += pst::pst_value(kind, color, sq);
    }
    score
}

/// Combine every handcrafted term into a single tapered score, from White's
/// perspective.
fn classical_score(board: &Board) -> Score {
    material::material(board)
        + pst_score(board)
        + king_safety::evaluate_king_safety(board)
        + mobility::evaluate_mobility(board)
        + pawns::evaluate_pawns(board)
        + rooks::evaluate_rooks(board)
        + outposts::evaluate_outposts(board)
}

/// Blend a packed mg/eg score down to a single centipawn value using the
/// current game phase, from White's perspective.
fn taper(score: Score, board: &Board) -> i32 {
    let phase = phase::game_phase(board).clamp(0, MAX_PHASE);
    let mg = score.mg() as i32;
    let eg = score.eg() as i32;
    (mg * phase + eg * (MAX_PHASE - phase)) / MAX_PHASE
}

/// Evaluate the board from White's perspective, in centipawns, using the
/// handcrafted classical terms only (no mop-up, no NNUE).
fn classical_eval_white(board: &Board) -> i32 {
    taper(classical_score(board), board)
}

/// Evaluate via NNUE if a network has been loaded (see
/// `nnue::try_load`/`nnue::unload`), else fall back to the classical
/// handcrafted terms. Both paths return the side-to-move's perspective.
fn backend_eval_stm(board: &Board) -> i32 {
    if let Some(score) = nnue::evaluate(board) {
        return score;
    }

    let white_eval = classical_eval_white(board);
    match board.side_to_move() {
        Color::White => white_eval,
        Color::Black => -white_eval,
    }
}

/// Evaluate the position from the side-to-move's perspective, in centipawns.
///
/// Once a position reaches a pawn-less, materially decided endgame the
/// mop-up heuristic (driving the losing king to the edge) takes over from
/// the regular evaluation; otherwise the board is scored with NNUE when a
/// network is loaded, or with the classical handcrafted terms otherwise.
pub fn evaluate(board: &Board) -> i32 {
    if let Some(white_score) = mopup::mop_up_score(board) {
        return match board.side_to_move() {
            Color::White => white_score,
            Color::Black => -white_score,
        };
    }

    backend_eval_stm(board)
}

#[cfg(test)]
mod tests {
    use cesso_core::Board;

    use super::evaluate;

    #[test]
    fn starting_position_is_near_zero() {
        let board = Board::starting_position();
        let score = evaluate(&board);
        assert!(score.abs() <= 40, "expected near-zero eval, got {score}");
    }

    #[test]
    fn missing_queen_is_heavily_penalized() {
        let with_queen = Board::starting_position();
        let without_queen: Board = "rnb1kbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
            .parse()
            .unwrap();

        let full_eval = evaluate(&with_queen);
        let missing_eval = evaluate(&without_queen);

        assert!(
            full_eval - missing_eval > 700,
            "losing a queen should cost well over a pawn's worth many times over, \
             full={full_eval}, missing={missing_eval}"
        );
    }

    #[test]
    fn evaluate_is_symmetric_under_color_flip() {
        let white_to_move = Board::starting_position();
        let black_to_move: Board =
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1".parse().unwrap();

        let w = evaluate(&white_to_move);
        let b = evaluate(&black_to_move);
        assert_eq!(w, b, "symmetric position should score equally for the side to move");
    }

    #[test]
    fn krk_defers_to_mop_up() {
        let board: Board = "8/8/4k3/8/8/8/4K3/R7 w - - 0 1".parse().unwrap();
        let score = evaluate(&board);
        assert!(score > 0, "White, up a rook with no pawns, should be winning, got {score}");
    }
}
