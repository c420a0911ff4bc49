//! Syzygy endgame tablebase probing.

use std::path::Path;

use cesso_core::Board;
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess};
use shakmaty_syzygy::{SyzygyError, Tablebase, Wdl};
use tracing::warn;

/// Score assigned to a tablebase-proven win, adjusted down by ply so the
/// search still prefers the shortest mate.
pub const SYZYGY_INF: i32 = 25_000;

/// Tablebases only resolve WDL for positions at or below this piece count.
const MAX_PIECES: u32 = 5;

/// A loaded set of Syzygy tablebases, probed through `shakmaty-syzygy`.
pub struct Syzygy {
    tablebase: Tablebase<Chess>,
}

impl Syzygy {
    /// Load tablebases from `dir`. Returns `None` if the directory does not
    /// exist or contains no tables `shakmaty-syzygy` recognizes — probing is
    /// then simply unavailable rather than an error.
    pub fn new(dir: &str) -> Option<Self> {
        if !Path::new(dir).is_dir() {
            warn!(path = %dir, "Syzygy directory not found, tablebase probing disabled");
            return None;
        }

        let mut tablebase = Tablebase::new();
        if tablebase.add_directory(dir).is_err() {
            warn!(path = %dir, "failed to load Syzygy tables from directory");
            return None;
        }

        Some(Self { tablebase })
    }

    /// Probe WDL for `board`, returning a score from the side-to-move's
    /// perspective, or `None` if the position has too many pieces or no
    /// table covers it.
    pub fn probe(&self, board: &Board, ply: u8) -> Option<i32> {
        if board.occupied().count() > MAX_PIECES {
            return None;
        }

        let pos = to_shakmaty(board)?;

        match self.tablebase.probe_wdl_after_zeroing(&pos) {
            Ok(wdl) => Some(wdl_to_score(wdl, ply)),
            Err(SyzygyError::MissingTable { .. }) => None,
            Err(_) => None,
        }
    }
}

fn to_shakmaty(board: &Board) -> Option<Chess> {
    let fen: Fen = format!("{board}").parse().ok()?;
    fen.into_position(CastlingMode::Standard).ok()
}

fn wdl_to_score(wdl: Wdl, ply: u8) -> i32 {
    let ply = i32::from(ply);
    match wdl {
        Wdl::Win => SYZYGY_INF - ply,
        Wdl::CursedWin | Wdl::Draw | Wdl::BlessedLoss => 0,
        Wdl::Loss => -SYZYGY_INF + ply,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_is_none() {
        assert!(Syzygy::new("/nonexistent/syzygy/path").is_none());
    }

    #[test]
    fn too_many_pieces_is_none() {
        // Starting position has 32 pieces, far above the 5-piece WDL limit.
        // Constructing a `Syzygy` needs a real directory, so this only
        // exercises the piece-count short-circuit via a fake handle-less
        // path — skipped when no tables are available in this environment.
        if let Some(tb) = Syzygy::new("syzygy") {
            let board = Board::starting_position();
            assert!(tb.probe(&board, 0).is_none());
        }
    }
}
