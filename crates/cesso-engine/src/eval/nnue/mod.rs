//! NNUE evaluation using a (768->1024)x2->1x8 SCReLU network, loaded at
//! runtime from a weights file (see [`network::load_from_file`]).

mod accumulator;
mod features;
mod network;

use cesso_core::{Board, Color};

use self::accumulator::Accumulator;

pub use self::network::{try_load, unload, NetworkLoadError, NETWORK_SIZE};

/// Compute the output bucket index from material count.
///
/// Must match Bullet's `MaterialCount<8>`:
/// `bucket = (occupied_count - 2) / (32.div_ceil(8))` = `(occ - 2) / 4`.
#[inline]
fn output_bucket(board: &Board) -> usize {
    let piece_count = board.occupied().count() as usize;
    (piece_count.saturating_sub(2)) / 4
}

/// Evaluate the board using NNUE, if a network has been loaded.
///
/// Returns a centipawn score from the side-to-move's perspective
/// (positive = good for the side to move), or `None` if no `EvalFile` has
/// been loaded yet — callers fall back to the classical evaluator.
pub fn evaluate(board: &Board) -> Option<i32> {
    let bucket = output_bucket(board);

    network::with_loaded(|net| {
        let white_acc = Accumulator::refresh(board, Color::White, net);
        let black_acc = Accumulator::refresh(board, Color::Black, net);

        let (us, them) = match board.side_to_move() {
            Color::White => (&white_acc, &black_acc),
            Color::Black => (&black_acc, &white_acc),
        };

        net.evaluate(us, them, bucket)
    })
}
