//! Cursor motions expressed as addresses.
//!
//! Every motion resolves an address relative to the cursor, so motions step
//! over whole runes and agree with the edit language on what a line is.

use the_rope::{
  Rope,
  RuneRead,
};

use crate::{
  address::addr,
  diff::Dot,
};

/// The direction of a motion.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
  /// Toward the end of the text.
  Forward,
  /// Toward the start of the text.
  Backward,
}

impl Direction {
  fn sign(self) -> char {
    match self {
      Direction::Forward => '+',
      Direction::Backward => '-',
    }
  }
}

/// Moves a cursor one rune in `dir`, or collapses a selection to its edge
/// in `dir`. Stays put at either end of the text.
pub fn left_right(dot: Dot, dir: Direction, rope: &Rope) -> usize {
  let runes = if dot.is_empty() { 1 } else { 0 };
  addr(dot, &format!("{}#{runes}", dir.sign()), rope).map_or(dot.start, |at| at.start)
}

/// Returns the number of runes between the start of the line and `at`.
pub fn cursor_col(at: usize, rope: &Rope) -> usize {
  let head = rope.slice(0, at);
  let mut r = head.reverse_reader();
  let mut col = 0;
  while let Some((c, _)) = r.read_rune() {
    if c == '\n' {
      break;
    }
    col += 1;
  }
  col
}

/// Moves to rune column `col` of the line before or after the one holding
/// `dot.start`, clamped to the end of that line. Past the first line this is
/// the start of the text, past the last line the end.
pub fn up_down(dot: Dot, col: usize, dir: Direction, rope: &Rope) -> usize {
  // "-+" is the whole line holding dot, even at offset 0.
  let Ok(line) = addr(dot, &format!("-+{}", dir.sign()), rope) else {
    return match dir {
      Direction::Forward => rope.len(),
      Direction::Backward => 0,
    };
  };
  if line.is_empty() {
    return line.start;
  }
  let newline = rope
    .slice(line.start, line.end)
    .reverse_reader()
    .read_byte()
    == Some(b'\n');
  let last = if newline { line.end - 1 } else { line.end };
  addr(Dot::point(line.start), &format!("+#{col}"), rope).map_or(last, |at| at.start.min(last))
}

/// Returns the start of the line holding `at`.
pub fn line_start(at: usize, rope: &Rope) -> usize {
  addr(Dot::point(at), "-0", rope).map_or(0, |line| line.start)
}
