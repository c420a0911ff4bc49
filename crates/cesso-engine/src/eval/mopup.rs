//! Mop-up evaluation: driving a lone king to the edge once the position is
//! materially decided and no pawns remain to complicate things.

use cesso_core::{Board, Color, PieceKind, Square};

/// Per-square bonus table steering the losing king toward the corner matching
/// a light-squared bishop's mating net (a1/h8 diagonal favoured).
#[rustfmt::skip]
const BN_MATE_LIGHT_SQUARES: [i32; 64] = [
    0, 10, 20, 30, 40, 50, 60, 70,
    10, 20, 30, 40, 50, 60, 70, 60,
    20, 30, 40, 50, 60, 70, 60, 50,
    30, 40, 50, 60, 70, 60, 50, 40,
    40, 50, 60, 70, 60, 50, 40, 30,
    50, 60, 70, 60, 50, 40, 30, 20,
    60, 70, 60, 50, 40, 30, 20, 10,
    70, 60, 50, 40, 30, 20, 10, 0,
];

/// Same idea for a dark-squared bishop's mating net (a8/h1 diagonal favoured).
#[rustfmt::skip]
const BN_MATE_DARK_SQUARES: [i32; 64] = [
    70, 60, 50, 40, 30, 20, 10, 0,
    60, 70, 60, 50, 40, 30, 20, 10,
    50, 60, 70, 60, 50, 40, 30, 20,
    40, 50, 60, 70, 60, 50, 40, 30,
    30, 40, 50, 60, 70, 60, 50, 40,
    20, 30, 40, 50, 60, 70, 60, 50,
    10, 20, 30, 40, 50, 60, 70, 60,
    0, 10, 20, 30, 40, 50, 60, 70,
];

/// Weighted material count used only to decide mop-up eligibility and the
/// winning side — pawn=1, knight/bishop=3, rook=5, queen=10.
fn weighted_material(board: &Board, color: Color) -> i32 {
    let side = board.side(color);
    let pawns = (board.pieces(PieceKind::Pawn) & side).count() as i32;
    let knights = (board.pieces(PieceKind::Knight) & side).count() as i32;
    let bishops = (board.pieces(PieceKind::Bishop) & side).count() as i32;
    let rooks = (board.pieces(PieceKind::Rook) & side).count() as i32;
    let queens = (board.pieces(PieceKind::Queen) & side).count() as i32;
    pawns + knights * 3 + bishops * 3 + rooks * 5 + queens * 10
}

/// True once no pawns remain on the board and one side holds a clear,
/// non-drawish material edge (more than a bare minor piece's worth).
pub fn is_mop_up_phase(board: &Board) -> bool {
    if board.pieces(PieceKind::Pawn).is_nonempty() {
        return false;
    }
    let white = weighted_material(board, Color::White);
    let black = weighted_material(board, Color::Black);
    (white - black).abs() > 4
}

fn manhattan(a: Square, b: Square) -> i32 {
    (a.file().index() as i32 - b.file().index() as i32).abs()
        + (a.rank().index() as i32 - b.rank().index() as i32).abs()
}

/// Score a mop-up position from White's perspective, in centipawns.
///
/// Returns `None` if the position is not in a mop-up phase; call
/// [`is_mop_up_phase`] first (or rely on the `None` check directly).
pub fn mop_up_score(board: &Board) -> Option<i32> {
    if !is_mop_up_phase(board) {
        return None;
    }

    let white_material = weighted_material(board, Color::White);
    let black_material = weighted_material(board, Color::Black);
    let winning_color = if white_material > black_material { Color::White } else { Color::Black };
    let losing_color = !winning_color;

    let winning_king = board.king_square(winning_color);
    let losing_king = board.king_square(losing_color);
    let king_dist = manhattan(winning_king, losing_king);

    let (winning_material, losing_material) = if winning_color == Color::White {
        (white_material, black_material)
    } else {
        (black_material, white_material)
    };
    let material_score = 100 * (winning_material - losing_material);

    let our_queens = (board.pieces(PieceKind::Queen) & board.side(winning_color)).count();
    let our_rooks = (board.pieces(PieceKind::Rook) & board.side(winning_color)).count();
    let our_bishops = (board.pieces(PieceKind::Bishop) & board.side(winning_color)).count();
    let our_knights = (board.pieces(PieceKind::Knight) & board.side(winning_color)).count();
    let is_bishop_knight_mate = our_queens == 0 && our_rooks == 0 && our_bishops == 1 && our_knights == 1;

    let score = if is_bishop_knight_mate {
        let bishop_bb = board.pieces(PieceKind::Bishop) & board.side(winning_color);
        let bishop_sq = bishop_bb.into_iter().next().expect("bishop present by is_bishop_knight_mate");
        let dark_squared = (bishop_sq.rank().index() + bishop_sq.file().index()) % 2 == 0;
        let table = if dark_squared { &BN_MATE_DARK_SQUARES } else { &BN_MATE_LIGHT_SQUARES };
        5000 + 2 * material_score + 150 * (14 - king_dist) + 100 * table[losing_king.index()]
    } else {
        let center = Square::E4;
        5000 + 150 * (14 - king_dist) + material_score + 475 * manhattan(losing_king, center)
    };

    Some(if winning_color == Color::White { score } else { -score })
}
