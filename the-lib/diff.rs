//! Diffs: replacements of byte ranges of a rope.
//!
//! A [`Diff`] replaces the span [`Diff::at`] with [`Diff::text`]. A [`Diffs`]
//! is a sequence of diffs applied one after the other, each addressing the
//! rope produced by the previous one. Applying diffs yields the new rope and
//! the diffs that undo the change:
//!
//! ```ignore
//! let (after, undo) = diffs.apply(&before);
//! let (restored, _) = undo.apply(&after);
//! assert_eq!(restored, before);
//! ```
//!
//! [`Diffs::update`] maps a selection on the old rope to the corresponding
//! selection on the new one.

use std::{
  fmt,
  ops::{
    Deref,
    Range,
  },
};

use the_rope::Rope;

/// A span of byte offsets, `start..end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dot {
  pub start: usize,
  pub end:   usize,
}

impl Dot {
  pub const fn new(start: usize, end: usize) -> Self {
    Self { start, end }
  }

  /// An empty dot at `at`.
  pub const fn point(at: usize) -> Self {
    Self { start: at, end: at }
  }

  pub const fn len(self) -> usize {
    self.end - self.start
  }

  pub const fn is_empty(self) -> bool {
    self.start == self.end
  }

  pub const fn range(self) -> Range<usize> {
    self.start..self.end
  }

  /// Moves both ends by `by`, or `None` if either would leave `usize`.
  pub fn shift(self, by: isize) -> Option<Self> {
    Some(Self::new(
      self.start.checked_add_signed(by)?,
      self.end.checked_add_signed(by)?,
    ))
  }
}

impl From<Range<usize>> for Dot {
  fn from(range: Range<usize>) -> Self {
    Self::new(range.start, range.end)
  }
}

impl fmt::Display for Dot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}, {})", self.start, self.end)
  }
}

/// A change to a contiguous span of bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
  /// The span changed.
  pub at:   Dot,
  /// The replacement text, `None` if the span was deleted.
  pub text: Option<Rope>,
}

impl Diff {
  pub fn new(at: Dot, text: Option<Rope>) -> Self {
    Self { at, text }
  }

  /// Length of the replacement text.
  pub fn text_len(&self) -> usize {
    self.text.as_ref().map_or(0, Rope::len)
  }

  /// Returns `dot` adjusted for this diff.
  ///
  /// A dot covered by the diff collapses to the end of the replacement. A
  /// diff overlapping only the start or end of dot trims that edge.
  pub fn update(&self, dot: Dot) -> Dot {
    let Dot { start, end } = self.at;
    let (removed, inserted) = (end - start, self.text_len());
    if start >= dot.end {
      // after
      dot
    } else if end <= dot.start {
      // before
      Dot::new(dot.start - removed + inserted, dot.end - removed + inserted)
    } else if dot.start <= start && end < dot.end {
      // inside
      Dot::new(dot.start, dot.end - removed + inserted)
    } else if start <= dot.start && dot.end <= end {
      // over
      Dot::point(start + inserted)
    } else if end < dot.end {
      // prefix
      let new_start = start + inserted;
      Dot::new(new_start, new_start + (dot.end - end))
    } else {
      // suffix
      Dot::new(dot.start, start)
    }
  }

  /// Applies the diff, returning the new rope and the diff that undoes it.
  ///
  /// # Panics
  ///
  /// Panics if the span is out of bounds for `rope`.
  pub fn apply(&self, rope: &Rope) -> (Rope, Diff) {
    let Dot { start, end } = self.at;
    let mut rope = rope.clone();
    let mut deleted = None;
    if start < end {
      deleted = Some(rope.slice(start, end));
      rope = rope.delete(start, end - start);
    }
    if let Some(text) = &self.text
      && !text.is_empty()
    {
      rope = rope.insert(start, text);
    }
    let undo = Diff::new(Dot::new(start, start + self.text_len()), deleted);
    (rope, undo)
  }
}

/// A sequence of diffs, each applying to the result of the one before.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diffs(Vec<Diff>);

impl Diffs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, diff: Diff) {
    self.0.push(diff);
  }

  /// Returns `dot` adjusted for every diff in turn.
  pub fn update(&self, dot: Dot) -> Dot {
    self.0.iter().fold(dot, |dot, diff| diff.update(dot))
  }

  /// Applies the diffs in order. The returned undo diffs restore `rope` when
  /// applied to the returned rope.
  pub fn apply(&self, rope: &Rope) -> (Rope, Diffs) {
    let mut rope = rope.clone();
    let mut undo = Vec::with_capacity(self.0.len());
    for diff in &self.0 {
      let (next, inverse) = diff.apply(&rope);
      rope = next;
      undo.push(inverse);
    }
    undo.reverse();
    (rope, Diffs(undo))
  }

  pub fn into_inner(self) -> Vec<Diff> {
    self.0
  }
}

impl Deref for Diffs {
  type Target = [Diff];

  fn deref(&self) -> &[Diff] {
    &self.0
  }
}

impl From<Vec<Diff>> for Diffs {
  fn from(diffs: Vec<Diff>) -> Self {
    Self(diffs)
  }
}

impl FromIterator<Diff> for Diffs {
  fn from_iter<I: IntoIterator<Item = Diff>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl Extend<Diff> for Diffs {
  fn extend<I: IntoIterator<Item = Diff>>(&mut self, iter: I) {
    self.0.extend(iter);
  }
}

impl IntoIterator for Diffs {
  type Item = Diff;
  type IntoIter = std::vec::IntoIter<Diff>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.into_iter()
  }
}

impl<'a> IntoIterator for &'a Diffs {
  type Item = &'a Diff;
  type IntoIter = std::slice::Iter<'a, Diff>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter()
  }
}
