//! Immutable Connect-Four position.
//!
//! A [`Board`] is the 7×6 grid, the side to move and the terminal
//! marker. Cells are indexed row-major with row 0 at the top, so the
//! cell at column `c`, row `r` lives at index `c + 7 * r` and gravity
//! pulls tokens towards the largest row.
//!
//! Boards are small (`Copy`) value types; [`Board::apply`] returns a
//! new board rather than mutating in place, which is what lets the game
//! history hold every position ever reached without aliasing.
//!
//! # Wire Encoding
//!
//! [`Board::encode`] produces the 43-character `position` payload used
//! on the engine wire: runes 0..42 are `'0'` (empty), `'1'` (player 1)
//! or `'2'` (player 2) in index order, rune 42 is the side to move.
//! [`Board::decode`] is the inverse and recomputes the terminal marker
//! from scratch.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::ErrorCode;

/// Number of columns on the board.
pub const COLS: usize = 7;
/// Number of rows on the board.
pub const ROWS: usize = 6;
/// Total number of cells.
pub const SQUARES: usize = COLS * ROWS;

/// Contents of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    /// No token has been dropped here.
    Empty,
    /// A player-1 token.
    P1,
    /// A player-2 token.
    P2,
}

/// One of the two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Player 1, who always moves first from the starting position.
    P1,
    /// Player 2.
    P2,
}

impl Side {
    /// Returns the opposing side.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::P1 => Self::P2,
            Self::P2 => Self::P1,
        }
    }

    /// Returns the token this side drops.
    #[must_use]
    pub fn token(self) -> Cell {
        match self {
            Self::P1 => Cell::P1,
            Self::P2 => Cell::P2,
        }
    }
}

/// Terminal marker of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The game is still in progress.
    Undecided,
    /// The given side has four in a row.
    Won(Side),
    /// The board is full with no four in a row.
    Draw,
}

impl Outcome {
    /// Returns `true` unless the game is still in progress.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Undecided)
    }
}

/// Board errors.
///
/// [`IllegalColumn`](Self::IllegalColumn), [`ColumnFull`](Self::ColumnFull)
/// and [`Terminal`](Self::Terminal) come out of [`Board::apply`]; the
/// rest come out of [`Board::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoardError {
    /// The move names a column outside `0..7`.
    #[error("column {0} is out of range")]
    IllegalColumn(usize),

    /// The named column has no empty cell left.
    #[error("column {0} is full")]
    ColumnFull(usize),

    /// The position already has a winner or is drawn.
    #[error("position is terminal")]
    Terminal,

    /// An encoded position was not exactly 43 characters.
    #[error("position encoding must be 43 characters, got {0}")]
    BadLength(usize),

    /// An encoded position held a character other than `0`, `1` or `2`.
    #[error("invalid cell character {0:?} in position encoding")]
    BadChar(char),

    /// The side-to-move rune was not `1` or `2`.
    #[error("side to move must be 1 or 2")]
    IllegalTurn,
}

impl ErrorCode for BoardError {
    fn code(&self) -> &'static str {
        match self {
            Self::IllegalColumn(_) => "BOARD_ILLEGAL_COLUMN",
            Self::ColumnFull(_) => "BOARD_COLUMN_FULL",
            Self::Terminal => "BOARD_TERMINAL",
            Self::BadLength(_) => "BOARD_BAD_LENGTH",
            Self::BadChar(_) => "BOARD_BAD_CHAR",
            Self::IllegalTurn => "BOARD_ILLEGAL_TURN",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Retrying any of these with the same input cannot succeed.
        false
    }
}

/// An immutable Connect-Four position.
///
/// # Invariants
///
/// Every board reachable through [`Board::new`] and [`Board::apply`]
/// satisfies:
///
/// - player-1 tokens equal player-2 tokens when player 1 is to move,
///   and exceed them by one when player 2 is to move;
/// - a non-empty cell at `(c, r)` with `r < 5` sits on a non-empty cell
///   at `(c, r + 1)` (tokens never float);
/// - the terminal marker matches the grid contents.
///
/// [`Board::decode`] recomputes the marker but performs no token-count
/// check; the wire is trusted to carry positions of real games.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    cells: [Cell; SQUARES],
    to_move: Side,
    outcome: Outcome,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Returns the empty starting position with player 1 to move.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; SQUARES],
            to_move: Side::P1,
            outcome: Outcome::Undecided,
        }
    }

    /// Returns the side to move.
    #[must_use]
    pub fn to_move(&self) -> Side {
        self.to_move
    }

    /// Returns the terminal marker.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Returns the cell at the given column and row.
    ///
    /// # Panics
    ///
    /// Panics if `col >= 7` or `row >= 6`.
    #[must_use]
    pub fn cell(&self, col: usize, row: usize) -> Cell {
        assert!(col < COLS && row < ROWS, "cell ({col}, {row}) out of range");
        self.cells[col + COLS * row]
    }

    /// Returns one legality flag per column.
    ///
    /// A column is playable when its top cell is empty and the position
    /// is not terminal; a terminal position has no legal moves at all.
    #[must_use]
    pub fn legal(&self) -> [bool; COLS] {
        if self.outcome.is_terminal() {
            return [false; COLS];
        }
        let mut flags = [false; COLS];
        for (col, flag) in flags.iter_mut().enumerate() {
            *flag = self.cells[col] == Cell::Empty;
        }
        flags
    }

    /// Drops the current side's token into `column` and returns the
    /// resulting position.
    ///
    /// The terminal marker of the result is computed by checking only
    /// the four lines through the newly placed cell, then testing for a
    /// full board.
    ///
    /// # Errors
    ///
    /// - [`BoardError::Terminal`] if this position already has a result
    /// - [`BoardError::IllegalColumn`] if `column >= 7`
    /// - [`BoardError::ColumnFull`] if the column has no empty cell
    pub fn apply(&self, column: usize) -> Result<Self, BoardError> {
        if self.outcome.is_terminal() {
            return Err(BoardError::Terminal);
        }
        if column >= COLS {
            return Err(BoardError::IllegalColumn(column));
        }
        // Lowest empty cell: scan rows bottom-up.
        let row = (0..ROWS)
            .rev()
            .find(|row| self.cells[column + COLS * row] == Cell::Empty)
            .ok_or(BoardError::ColumnFull(column))?;

        let mut next = *self;
        next.cells[column + COLS * row] = self.to_move.token();
        next.outcome = if next.wins_through(column, row) {
            Outcome::Won(self.to_move)
        } else if next.is_full() {
            Outcome::Draw
        } else {
            Outcome::Undecided
        };
        next.to_move = self.to_move.other();
        Ok(next)
    }

    /// Returns the 43-character wire encoding of this position.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(SQUARES + 1);
        for cell in &self.cells {
            out.push(match cell {
                Cell::Empty => '0',
                Cell::P1 => '1',
                Cell::P2 => '2',
            });
        }
        out.push(match self.to_move {
            Side::P1 => '1',
            Side::P2 => '2',
        });
        out
    }

    /// Decodes a 43-character wire encoding.
    ///
    /// The terminal marker is recomputed by scanning the whole grid,
    /// since the encoding does not carry it.
    ///
    /// # Errors
    ///
    /// - [`BoardError::BadLength`] if the input is not 43 characters
    /// - [`BoardError::BadChar`] for any cell rune outside `0`/`1`/`2`
    /// - [`BoardError::IllegalTurn`] if the final rune is not `1` or `2`
    pub fn decode(encoded: &str) -> Result<Self, BoardError> {
        let chars: Vec<char> = encoded.chars().collect();
        if chars.len() != SQUARES + 1 {
            return Err(BoardError::BadLength(chars.len()));
        }
        let mut cells = [Cell::Empty; SQUARES];
        for (i, &ch) in chars[..SQUARES].iter().enumerate() {
            cells[i] = match ch {
                '0' => Cell::Empty,
                '1' => Cell::P1,
                '2' => Cell::P2,
                other => return Err(BoardError::BadChar(other)),
            };
        }
        let to_move = match chars[SQUARES] {
            '1' => Side::P1,
            '2' => Side::P2,
            _ => return Err(BoardError::IllegalTurn),
        };
        let mut board = Self {
            cells,
            to_move,
            outcome: Outcome::Undecided,
        };
        board.outcome = board.scan_outcome();
        Ok(board)
    }

    /// Counts the run through `(col, row)` along each of the four axes.
    ///
    /// Walks outward in both directions from the placed cell until a
    /// non-matching cell or the edge, which keeps the win check O(1)
    /// per move instead of rescanning every line on the board.
    fn wins_through(&self, col: usize, row: usize) -> bool {
        let token = self.cells[col + COLS * row];
        const AXES: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];
        AXES.iter().any(|&(dx, dy)| {
            let run = 1 + self.run_length(col, row, dx, dy) + self.run_length(col, row, -dx, -dy);
            debug_assert!(token != Cell::Empty);
            run >= 4
        })
    }

    /// Number of same-token cells strictly beyond `(col, row)` in the
    /// direction `(dx, dy)`.
    fn run_length(&self, col: usize, row: usize, dx: isize, dy: isize) -> usize {
        let token = self.cells[col + COLS * row];
        let mut count = 0;
        let (mut x, mut y) = (col as isize + dx, row as isize + dy);
        while (0..COLS as isize).contains(&x)
            && (0..ROWS as isize).contains(&y)
            && self.cells[x as usize + COLS * y as usize] == token
        {
            count += 1;
            x += dx;
            y += dy;
        }
        count
    }

    fn is_full(&self) -> bool {
        self.cells.iter().all(|&c| c != Cell::Empty)
    }

    /// Full-board outcome scan, used by [`Board::decode`] where no
    /// "last move" is available.
    fn scan_outcome(&self) -> Outcome {
        for row in 0..ROWS {
            for col in 0..COLS {
                let token = self.cells[col + COLS * row];
                if token == Cell::Empty {
                    continue;
                }
                if self.wins_through(col, row) {
                    return match token {
                        Cell::P1 => Outcome::Won(Side::P1),
                        Cell::P2 => Outcome::Won(Side::P2),
                        Cell::Empty => unreachable!("empty cell filtered above"),
                    };
                }
            }
        }
        if self.is_full() {
            Outcome::Draw
        } else {
            Outcome::Undecided
        }
    }
}

impl fmt::Display for Board {
    /// Renders the grid as six rows of `X` (player 1), `O` (player 2)
    /// and `-`, top row first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..ROWS {
            for col in 0..COLS {
                if col > 0 {
                    f.write_str(" ")?;
                }
                f.write_str(match self.cells[col + COLS * row] {
                    Cell::P1 => "X",
                    Cell::P2 => "O",
                    Cell::Empty => "-",
                })?;
            }
            if row + 1 < ROWS {
                f.write_str("\n")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_error_codes;

    /// Plays a sequence of columns from the empty board.
    fn play(columns: &[usize]) -> Board {
        columns.iter().fold(Board::new(), |b, &c| {
            b.apply(c).unwrap_or_else(|e| panic!("move {c} failed: {e}"))
        })
    }

    fn token_counts(board: &Board) -> (usize, usize) {
        let mut p1 = 0;
        let mut p2 = 0;
        for col in 0..COLS {
            for row in 0..ROWS {
                match board.cell(col, row) {
                    Cell::P1 => p1 += 1,
                    Cell::P2 => p2 += 1,
                    Cell::Empty => {}
                }
            }
        }
        (p1, p2)
    }

    #[test]
    fn new_board_is_empty() {
        let board = Board::new();
        assert_eq!(board.to_move(), Side::P1);
        assert_eq!(board.outcome(), Outcome::Undecided);
        assert_eq!(board.legal(), [true; COLS]);
        assert_eq!(token_counts(&board), (0, 0));
    }

    #[test]
    fn tokens_stack_from_the_bottom() {
        let board = play(&[3, 3, 3]);
        assert_eq!(board.cell(3, 5), Cell::P1);
        assert_eq!(board.cell(3, 4), Cell::P2);
        assert_eq!(board.cell(3, 3), Cell::P1);
        assert_eq!(board.cell(3, 2), Cell::Empty);
    }

    #[test]
    fn token_count_invariant_holds_along_a_game() {
        let mut board = Board::new();
        for &col in &[0, 1, 0, 1, 2, 3, 2, 3, 6, 5, 6, 5] {
            board = board.apply(col).unwrap();
            let (p1, p2) = token_counts(&board);
            match board.to_move() {
                Side::P1 => assert_eq!(p1, p2),
                Side::P2 => assert_eq!(p1, p2 + 1),
            }
        }
    }

    #[test]
    fn apply_rejects_out_of_range_column() {
        assert_eq!(Board::new().apply(7), Err(BoardError::IllegalColumn(7)));
    }

    #[test]
    fn apply_rejects_full_column() {
        let board = play(&[2, 2, 2, 2, 2, 2]);
        assert!(!board.legal()[2]);
        assert_eq!(board.apply(2), Err(BoardError::ColumnFull(2)));
    }

    #[test]
    fn apply_rejects_terminal_position() {
        // P1 wins vertically in column 0.
        let board = play(&[0, 1, 0, 1, 0, 1, 0]);
        assert_eq!(board.outcome(), Outcome::Won(Side::P1));
        assert_eq!(board.apply(3), Err(BoardError::Terminal));
        assert_eq!(board.legal(), [false; COLS]);
    }

    #[test]
    fn horizontal_win() {
        let board = play(&[0, 0, 1, 1, 2, 2, 3]);
        assert_eq!(board.outcome(), Outcome::Won(Side::P1));
    }

    #[test]
    fn vertical_win_for_p2() {
        let board = play(&[0, 6, 1, 6, 0, 6, 1, 6]);
        assert_eq!(board.outcome(), Outcome::Won(Side::P2));
    }

    #[test]
    fn positive_diagonal_win() {
        // P1 builds the / diagonal from (0, 5) up to (3, 2).
        let board = play(&[0, 1, 1, 2, 2, 3, 2, 3, 3, 6, 3]);
        assert_eq!(board.outcome(), Outcome::Won(Side::P1));
    }

    #[test]
    fn negative_diagonal_win() {
        // Mirror image of the positive diagonal, through columns 6..3.
        let board = play(&[6, 5, 5, 4, 4, 3, 4, 3, 3, 0, 3]);
        assert_eq!(board.outcome(), Outcome::Won(Side::P1));
    }

    #[test]
    fn win_in_the_middle_of_a_line() {
        // Four across the bottom row completed by dropping into the gap:
        // cells 0,1,3 are P1 before the final move into column 2.
        let board = play(&[0, 0, 1, 1, 3, 3, 2]);
        assert_eq!(board.outcome(), Outcome::Won(Side::P1));
    }

    /// A full grid with no four in a row: row pattern `XXOOXXO` on even
    /// rows and its inverse on odd rows. Colours alternate vertically
    /// and never run past two along any diagonal.
    fn drawn_grid() -> String {
        const ROW_A: &str = "1122112";
        const ROW_B: &str = "2211221";
        [ROW_A, ROW_B, ROW_A, ROW_B, ROW_A, ROW_B].concat()
    }

    #[test]
    fn full_board_without_four_is_a_draw() {
        let board = Board::decode(&format!("{}1", drawn_grid())).unwrap();
        assert_eq!(board.outcome(), Outcome::Draw);
        assert_eq!(board.legal(), [false; COLS]);
    }

    #[test]
    fn final_move_into_the_last_gap_draws() {
        // Empty the top cell of column 6 and hand the move to player 2,
        // whose token completes the drawn grid above.
        let mut cells: Vec<char> = drawn_grid().chars().collect();
        cells[6] = '0';
        let encoded: String = cells.into_iter().chain(['2']).collect();
        let board = Board::decode(&encoded).unwrap();
        assert_eq!(board.outcome(), Outcome::Undecided);

        let done = board.apply(6).unwrap();
        assert_eq!(done.outcome(), Outcome::Draw);
    }

    #[test]
    fn encode_decode_round_trip_on_reachable_boards() {
        let boards = [
            Board::new(),
            play(&[3]),
            play(&[3, 3, 4, 2, 1]),
            play(&[0, 1, 0, 1, 0, 1, 0]),
        ];
        for board in boards {
            let decoded = Board::decode(&board.encode()).unwrap();
            assert_eq!(decoded, board);
        }
    }

    #[test]
    fn decode_recomputes_outcome() {
        let won = play(&[0, 1, 0, 1, 0, 1, 0]);
        let decoded = Board::decode(&won.encode()).unwrap();
        assert_eq!(decoded.outcome(), Outcome::Won(Side::P1));
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert_eq!(Board::decode("123"), Err(BoardError::BadLength(3)));
        let mut junk = "0".repeat(SQUARES);
        junk.push('x');
        assert_eq!(Board::decode(&junk), Err(BoardError::IllegalTurn));
        let mut bad_cell = "3".to_string();
        bad_cell.push_str(&"0".repeat(SQUARES - 1));
        bad_cell.push('1');
        assert_eq!(Board::decode(&bad_cell), Err(BoardError::BadChar('3')));
    }

    #[test]
    fn display_renders_the_grid() {
        let board = play(&[3, 3]);
        let text = board.to_string();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), ROWS);
        assert_eq!(rows[5], "- - - X - - -");
        assert_eq!(rows[4], "- - - O - - -");
    }

    #[test]
    fn error_codes_are_well_formed() {
        assert_error_codes(
            &[
                BoardError::IllegalColumn(9),
                BoardError::ColumnFull(0),
                BoardError::Terminal,
                BoardError::BadLength(2),
                BoardError::BadChar('x'),
                BoardError::IllegalTurn,
            ],
            "BOARD_",
        );
    }
}
