//! Immutable, persistent byte ropes.
//!
//! A [`Rope`] is either a leaf holding a window onto a shared byte buffer or
//! a binary node concatenating two sub-ropes. Ropes are never mutated after
//! construction: every edit returns a fresh value that shares structure with
//! its input, so old snapshots stay valid (e.g. for undo) at no extra cost.
//!
//! # Overview
//!
//! All structural edits are derived from two primitives:
//!
//! - [`Rope::append`] concatenates, flattening small results into a single
//!   leaf and merging into the right-most leaf of a node when that keeps the
//!   leaf small. Typing one rune at a time therefore does not grow the tree.
//! - [`Rope::split`] divides a rope at a byte offset, rebuilding ancestors
//!   with `append` on the way back up.
//!
//! [`Rope::delete`], [`Rope::insert`] and [`Rope::slice`] are built from
//! those two.
//!
//! # Examples
//!
//! ```ignore
//! use the_rope::Rope;
//!
//! let text = Rope::new("Hello, World");
//! let text = text.delete(5, 7).insert(5, &Rope::new("!"));
//! assert_eq!(text, "Hello!");
//! ```
//!
//! # Indices
//!
//! Offsets are byte offsets. Passing an offset outside `0..=len` to
//! [`Rope::split`] or anything built on it is a caller bug and panics.

mod index;
mod reader;

use std::{
  fmt,
  io::{
    self,
    Read,
    Write,
  },
  ops::Range,
  sync::Arc,
};

use smallvec::SmallVec;
use thiserror::Error;

pub use crate::reader::{
  Reader,
  ReverseReader,
  RuneRead,
};

/// Ropes at or below this many bytes are kept as a single leaf.
pub const SMALL_SIZE: usize = 32;

const READ_CHUNK: usize = 32 * 1024;

/// An immutable byte sequence with cheap concatenation and splitting.
#[derive(Clone)]
pub struct Rope(Repr);

#[derive(Clone)]
enum Repr {
  Leaf(Leaf),
  Node(Arc<Node>),
}

#[derive(Clone)]
struct Leaf {
  buf:   Arc<[u8]>,
  range: Range<usize>,
}

struct Node {
  left:  Rope,
  right: Rope,
  len:   usize,
}

impl Leaf {
  fn bytes(&self) -> &[u8] {
    &self.buf[self.range.clone()]
  }
}

/// Error returned by [`Rope::read_from`].
///
/// Data read before the failure is never dropped: it is returned in
/// `partial`.
#[derive(Debug, Error)]
#[error("failed to read rope: {source}")]
pub struct ReadError {
  pub partial: Rope,
  #[source]
  pub source:  io::Error,
}

impl Rope {
  /// Returns a rope holding a copy of `text`.
  pub fn new(text: impl AsRef<[u8]>) -> Self {
    let buf: Arc<[u8]> = Arc::from(text.as_ref());
    let range = 0..buf.len();
    Rope(Repr::Leaf(Leaf { buf, range }))
  }

  pub fn empty() -> Self {
    Self::new("")
  }

  /// Returns the length of the rope in bytes.
  pub fn len(&self) -> usize {
    match &self.0 {
      Repr::Leaf(leaf) => leaf.range.len(),
      Repr::Node(node) => node.len,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Reads `r` to its end in fixed size chunks.
  ///
  /// On error the bytes read so far are returned in [`ReadError::partial`].
  pub fn read_from<R: Read>(mut r: R) -> Result<Rope, ReadError> {
    let mut buf = vec![0; READ_CHUNK];
    let mut rope = Rope::empty();
    loop {
      match r.read(&mut buf) {
        Ok(0) => return Ok(rope),
        Ok(n) => rope = rope.append(&Rope::new(&buf[..n])),
        Err(err) if err.kind() == io::ErrorKind::Interrupted => {},
        Err(source) => {
          return Err(ReadError {
            partial: rope,
            source,
          });
        },
      }
    }
  }

  /// Writes the contents of the rope to `w`, returning the number of bytes
  /// written.
  pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<usize> {
    let mut n = 0;
    for chunk in self.chunks() {
      w.write_all(chunk)?;
      n += chunk.len();
    }
    Ok(n)
  }

  /// Concatenates two ropes.
  pub fn append(&self, right: &Rope) -> Rope {
    if self.is_empty() {
      return right.clone();
    }
    if right.is_empty() {
      return self.clone();
    }
    let len = self.len() + right.len();
    if len <= SMALL_SIZE {
      return Rope::new(concat(self, right));
    }
    if let Repr::Node(node) = &self.0
      && node.right.len() + right.len() <= SMALL_SIZE
    {
      return Rope::node(node.left.clone(), Rope::new(concat(&node.right, right)));
    }
    Rope::node(self.clone(), right.clone())
  }

  fn node(left: Rope, right: Rope) -> Rope {
    let len = left.len() + right.len();
    Rope(Repr::Node(Arc::new(Node { left, right, len })))
  }

  /// Splits the rope at byte offset `i`.
  ///
  /// # Panics
  ///
  /// Panics if `i > self.len()`.
  pub fn split(&self, i: usize) -> (Rope, Rope) {
    assert!(
      i <= self.len(),
      "split index {i} out of bounds for rope of length {}",
      self.len()
    );
    match &self.0 {
      Repr::Leaf(leaf) => {
        let mid = leaf.range.start + i;
        let left = Leaf {
          buf:   leaf.buf.clone(),
          range: leaf.range.start..mid,
        };
        let right = Leaf {
          buf:   leaf.buf.clone(),
          range: mid..leaf.range.end,
        };
        (Rope(Repr::Leaf(left)), Rope(Repr::Leaf(right)))
      },
      Repr::Node(node) if i <= node.left.len() => {
        let (l, r) = node.left.split(i);
        (l, r.append(&node.right))
      },
      Repr::Node(node) => {
        let (l, r) = node.right.split(i - node.left.len());
        (node.left.append(&l), r)
      },
    }
  }

  /// Deletes `n` bytes starting at `start`.
  pub fn delete(&self, start: usize, n: usize) -> Rope {
    let (left, rest) = self.split(start);
    let (_, right) = rest.split(n);
    left.append(&right)
  }

  /// Inserts `ins` at byte offset `i`.
  pub fn insert(&self, i: usize, ins: &Rope) -> Rope {
    let (left, right) = self.split(i);
    left.append(ins).append(&right)
  }

  /// Returns the bytes in `start..end`.
  pub fn slice(&self, start: usize, end: usize) -> Rope {
    assert!(start <= end, "slice start {start} is after end {end}");
    let (_, rest) = self.split(start);
    let (middle, _) = rest.split(end - start);
    middle
  }

  /// Iterates the leaves of the rope, in order.
  pub fn chunks(&self) -> Chunks<'_> {
    let mut todo = SmallVec::new();
    todo.push(self);
    Chunks { todo }
  }

  pub fn to_bytes(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(self.len());
    for chunk in self.chunks() {
      bytes.extend_from_slice(chunk);
    }
    bytes
  }

  pub fn reader(&self) -> Reader<'_> {
    Reader::new(self)
  }

  pub fn reverse_reader(&self) -> ReverseReader<'_> {
    ReverseReader::new(self)
  }
}

fn concat(left: &Rope, right: &Rope) -> Vec<u8> {
  let mut bytes = Vec::with_capacity(left.len() + right.len());
  for chunk in left.chunks().chain(right.chunks()) {
    bytes.extend_from_slice(chunk);
  }
  bytes
}

/// Iterator over the leaf byte slices of a [`Rope`].
pub struct Chunks<'a> {
  todo: SmallVec<[&'a Rope; 16]>,
}

impl<'a> Iterator for Chunks<'a> {
  type Item = &'a [u8];

  fn next(&mut self) -> Option<Self::Item> {
    let mut rope = self.todo.pop()?;
    loop {
      match &rope.0 {
        Repr::Leaf(leaf) => return Some(leaf.bytes()),
        Repr::Node(node) => {
          self.todo.push(&node.right);
          rope = &node.left;
        },
      }
    }
  }
}

impl Default for Rope {
  fn default() -> Self {
    Self::empty()
  }
}

impl From<&str> for Rope {
  fn from(text: &str) -> Self {
    Rope::new(text)
  }
}

impl From<String> for Rope {
  fn from(text: String) -> Self {
    Rope::new(text)
  }
}

impl From<&[u8]> for Rope {
  fn from(bytes: &[u8]) -> Self {
    Rope::new(bytes)
  }
}

/// Invalid UTF-8 is rendered lossily.
impl fmt::Display for Rope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
  }
}

impl fmt::Debug for Rope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Rope")
      .field(&String::from_utf8_lossy(&self.to_bytes()))
      .finish()
  }
}

impl PartialEq for Rope {
  fn eq(&self, other: &Rope) -> bool {
    self.len() == other.len() && self.to_bytes() == other.to_bytes()
  }
}

impl Eq for Rope {}

impl PartialEq<str> for Rope {
  fn eq(&self, other: &str) -> bool {
    self.len() == other.len() && self.to_bytes() == other.as_bytes()
  }
}

impl PartialEq<&str> for Rope {
  fn eq(&self, other: &&str) -> bool {
    self == *other
  }
}

#[cfg(test)]
mod test {
  use super::*;

  const HELLO: &str = "Hello, 世界";

  fn samples() -> Vec<String> {
    vec![
      String::new(),
      "Hello, World".to_string(),
      HELLO.to_string(),
      HELLO.repeat(SMALL_SIZE * 2 / HELLO.len()),
    ]
  }

  /// A rope built one small leaf at a time, so that it is several nodes deep.
  fn deep(text: &str) -> Rope {
    let mut rope = Rope::empty();
    for ch in text.chars() {
      rope = Rope::node(rope, Rope::new(ch.to_string()));
    }
    rope
  }

  const DEEP_TEXT: &str = "The quick brown fox jumps over the lazy dog. 世界!";

  fn leaf_text(rope: &Rope) -> Option<Vec<u8>> {
    match &rope.0 {
      Repr::Leaf(leaf) => Some(leaf.bytes().to_vec()),
      Repr::Node(_) => None,
    }
  }

  #[test]
  fn empty() {
    let rope = Rope::empty();
    assert_eq!(rope, "");
    assert_eq!(rope.len(), 0);
    assert!(rope.is_empty());
  }

  #[test]
  fn new() {
    for text in samples() {
      let rope = Rope::new(&text);
      assert_eq!(rope.to_string(), text);
      assert_eq!(rope.len(), text.len());
    }
  }

  #[test]
  fn read_from() {
    for text in samples() {
      let rope = Rope::read_from(text.as_bytes()).unwrap();
      assert_eq!(rope.to_string(), text);
      assert_eq!(rope.len(), text.len());
    }
  }

  #[test]
  fn read_from_keeps_partial_data() {
    struct Failing<'a>(&'a [u8]);

    impl Read for Failing<'_> {
      fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.0.is_empty() {
          return Err(io::Error::other("boom"));
        }
        let n = self.0.read(buf)?;
        Ok(n)
      }
    }

    let err = Rope::read_from(Failing(b"partial")).unwrap_err();
    assert_eq!(err.partial, "partial");
    assert_eq!(err.source.to_string(), "boom");
  }

  #[test]
  fn write_to() {
    let rope = deep(DEEP_TEXT);
    let mut out = Vec::new();
    let n = rope.write_to(&mut out).unwrap();
    assert_eq!(n, DEEP_TEXT.len());
    assert_eq!(out, DEEP_TEXT.as_bytes());
  }

  #[test]
  fn append_empty() {
    let rope = Rope::new("x");
    assert_eq!(rope.append(&Rope::empty()), "x");
    assert_eq!(Rope::empty().append(&rope), "x");
  }

  #[test]
  fn append_small_flattens() {
    let xs = "x".repeat(SMALL_SIZE - 1);

    let rope = Rope::new(&xs).append(&Rope::new("y"));
    assert_eq!(leaf_text(&rope), Some(format!("{xs}y").into_bytes()));

    let rope = Rope::new("y").append(&Rope::new(&xs));
    assert_eq!(leaf_text(&rope), Some(format!("y{xs}").into_bytes()));
  }

  #[test]
  fn append_small_niece() {
    let xs = "x".repeat(SMALL_SIZE - 1);
    let niece = Rope::node(Rope::new("w"), Rope::new(&xs));

    let rope = niece.append(&Rope::new("y"));
    let Repr::Node(node) = &rope.0 else {
      panic!("expected a node, got {rope:?}");
    };
    assert_eq!(leaf_text(&node.left), Some(b"w".to_vec()));
    assert_eq!(leaf_text(&node.right), Some(format!("{xs}y").into_bytes()));
    assert_eq!(rope.len(), SMALL_SIZE + 1);
  }

  #[test]
  fn append_large_builds_node() {
    let xs = "x".repeat(SMALL_SIZE);
    let rope = Rope::new(&xs).append(&Rope::new("y"));
    assert!(matches!(rope.0, Repr::Node(_)));
    assert_eq!(rope.to_string(), format!("{xs}y"));
  }

  #[test]
  fn split() {
    let rope = deep(DEEP_TEXT);
    for i in 0..=DEEP_TEXT.len() {
      let (left, right) = rope.split(i);
      assert_eq!(left.to_bytes(), &DEEP_TEXT.as_bytes()[..i]);
      assert_eq!(right.to_bytes(), &DEEP_TEXT.as_bytes()[i..]);
    }
  }

  #[test]
  #[should_panic]
  fn split_out_of_bounds() {
    Rope::new("abc").split(4);
  }

  #[test]
  fn delete() {
    let rope = deep(DEEP_TEXT);
    let bytes = DEEP_TEXT.as_bytes();
    for start in 0..=bytes.len() {
      for n in 0..=bytes.len() - start {
        let want = [&bytes[..start], &bytes[start + n..]].concat();
        assert_eq!(rope.delete(start, n).to_bytes(), want);
      }
    }
  }

  #[test]
  #[should_panic]
  fn delete_out_of_bounds() {
    Rope::new("abc").delete(2, 2);
  }

  #[test]
  fn insert() {
    let rope = deep(DEEP_TEXT);
    let bytes = DEEP_TEXT.as_bytes();
    for i in 0..=bytes.len() {
      let want = [&bytes[..i], "☺".as_bytes(), &bytes[i..]].concat();
      assert_eq!(rope.insert(i, &Rope::new("☺")).to_bytes(), want);
    }
  }

  #[test]
  fn slice() {
    let rope = deep(DEEP_TEXT);
    let bytes = DEEP_TEXT.as_bytes();
    for start in 0..=bytes.len() {
      for end in start..=bytes.len() {
        assert_eq!(rope.slice(start, end).to_bytes(), &bytes[start..end]);
      }
    }
  }

  #[test]
  #[should_panic]
  fn slice_inverted() {
    Rope::new("abc").slice(2, 1);
  }

  #[test]
  fn old_snapshots_survive_edits() {
    let before = deep(DEEP_TEXT);
    let after = before.delete(0, 4).insert(0, &Rope::new("A"));
    assert_eq!(before, DEEP_TEXT);
    assert_eq!(after.to_string(), format!("A{}", &DEEP_TEXT[4..]));
  }

  fn build(parts: &[String]) -> (Rope, String) {
    let mut rope = Rope::empty();
    let mut text = String::new();
    for part in parts {
      rope = rope.append(&Rope::new(part));
      text.push_str(part);
    }
    (rope, text)
  }

  quickcheck::quickcheck! {
    fn quick_append(parts: Vec<String>) -> bool {
      let (rope, text) = build(&parts);
      rope == text.as_str() && rope.len() == text.len()
    }

    fn quick_split(parts: Vec<String>, i: usize) -> bool {
      let (rope, text) = build(&parts);
      let i = i % (text.len() + 1);
      let (left, right) = rope.split(i);
      left.to_bytes() == &text.as_bytes()[..i]
        && right.to_bytes() == &text.as_bytes()[i..]
        && left.append(&right) == text.as_str()
    }

    fn quick_delete(parts: Vec<String>, start: usize, n: usize) -> bool {
      let (rope, text) = build(&parts);
      let bytes = text.as_bytes();
      let start = start % (bytes.len() + 1);
      let n = n % (bytes.len() - start + 1);
      rope.delete(start, n).to_bytes() == [&bytes[..start], &bytes[start + n..]].concat()
    }

    fn quick_insert(parts: Vec<String>, i: usize, ins: String) -> bool {
      let (rope, text) = build(&parts);
      let bytes = text.as_bytes();
      let i = i % (bytes.len() + 1);
      rope.insert(i, &Rope::new(&ins)).to_bytes()
        == [&bytes[..i], ins.as_bytes(), &bytes[i..]].concat()
    }

    fn quick_slice(parts: Vec<String>, a: usize, b: usize) -> bool {
      let (rope, text) = build(&parts);
      let bytes = text.as_bytes();
      let a = a % (bytes.len() + 1);
      let b = a + b % (bytes.len() - a + 1);
      rope.slice(a, b).to_bytes() == &bytes[a..b]
    }
  }
}
