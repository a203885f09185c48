//! Forward and reverse byte/rune cursors over a [`Rope`].
//!
//! Both readers walk the leaves of the rope with an explicit stack and keep a
//! small pending buffer for runes that straddle leaves. Malformed UTF-8 is
//! reported as [`char::REPLACEMENT_CHARACTER`] with a width of one byte, one
//! replacement per byte that cannot be part of a valid encoding. Because a
//! valid encoding is only recognised when its leading byte is present, both
//! directions split a byte sequence into exactly the same runes.

use std::{
  io,
  str,
};

use smallvec::SmallVec;

use crate::{
  Repr,
  Rope,
};

const UTF8_MAX: usize = 4;

/// A source of runes with their encoded byte widths.
pub trait RuneRead {
  /// Returns the next rune and its width in bytes, or `None` at the end of
  /// input.
  fn read_rune(&mut self) -> Option<(char, usize)>;
}

impl<R: RuneRead + ?Sized> RuneRead for &mut R {
  fn read_rune(&mut self) -> Option<(char, usize)> {
    (**self).read_rune()
  }
}

impl RuneRead for str::Chars<'_> {
  fn read_rune(&mut self) -> Option<(char, usize)> {
    self.next().map(|ch| (ch, ch.len_utf8()))
  }
}

impl RuneRead for std::iter::Rev<str::Chars<'_>> {
  fn read_rune(&mut self) -> Option<(char, usize)> {
    self.next().map(|ch| (ch, ch.len_utf8()))
  }
}

struct Leaves<'a> {
  todo: SmallVec<[&'a Rope; 16]>,
  text: &'a [u8],
}

impl<'a> Leaves<'a> {
  fn new(rope: &'a Rope) -> Self {
    let mut todo = SmallVec::new();
    todo.push(rope);
    Leaves { todo, text: &[] }
  }

  /// Loads the next non-empty leaf. Returns false when exhausted.
  fn advance(&mut self, rev: bool) -> bool {
    while self.text.is_empty() {
      let Some(mut rope) = self.todo.pop() else {
        return false;
      };
      loop {
        match &rope.0 {
          Repr::Leaf(leaf) => {
            self.text = leaf.bytes();
            break;
          },
          Repr::Node(node) if rev => {
            self.todo.push(&node.left);
            rope = &node.right;
          },
          Repr::Node(node) => {
            self.todo.push(&node.right);
            rope = &node.left;
          },
        }
      }
    }
    true
  }

  fn read(&mut self, p: &mut [u8]) -> usize {
    if !self.advance(false) {
      return 0;
    }
    let n = p.len().min(self.text.len());
    p[..n].copy_from_slice(&self.text[..n]);
    self.text = &self.text[n..];
    n
  }

  /// Fills `p` with bytes in reverse order.
  fn read_rev(&mut self, p: &mut [u8]) -> usize {
    if !self.advance(true) {
      return 0;
    }
    let n = p.len().min(self.text.len());
    let (rest, tail) = self.text.split_at(self.text.len() - n);
    for (dst, src) in p.iter_mut().zip(tail.iter().rev()) {
      *dst = *src;
    }
    self.text = rest;
    n
  }
}

fn decode_first(bytes: &[u8]) -> Option<char> {
  let valid = match str::from_utf8(bytes) {
    Ok(s) => s,
    Err(err) => str::from_utf8(&bytes[..err.valid_up_to()]).ok()?,
  };
  valid.chars().next()
}

fn decode_last(bytes: &[u8]) -> Option<(char, usize)> {
  (1..=bytes.len()).find_map(|w| {
    let s = str::from_utf8(&bytes[bytes.len() - w..]).ok()?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
      (Some(ch), None) => Some((ch, w)),
      _ => None,
    }
  })
}

/// Reads a rope from beginning to end.
pub struct Reader<'a> {
  leaves: Leaves<'a>,
  buf:    [u8; UTF8_MAX],
  n:      usize,
}

impl<'a> Reader<'a> {
  pub fn new(rope: &'a Rope) -> Self {
    Reader {
      leaves: Leaves::new(rope),
      buf:    [0; UTF8_MAX],
      n:      0,
    }
  }

  pub fn read_byte(&mut self) -> Option<u8> {
    let mut b = [0];
    (self.fill(&mut b) == 1).then_some(b[0])
  }

  fn fill(&mut self, p: &mut [u8]) -> usize {
    if self.n == 0 {
      return self.leaves.read(p);
    }
    let n = p.len().min(self.n);
    p[..n].copy_from_slice(&self.buf[..n]);
    self.buf.copy_within(n..self.n, 0);
    self.n -= n;
    n
  }

  fn consume(&mut self, w: usize) {
    self.buf.copy_within(w..self.n, 0);
    self.n -= w;
  }
}

impl io::Read for Reader<'_> {
  fn read(&mut self, p: &mut [u8]) -> io::Result<usize> {
    Ok(self.fill(p))
  }
}

impl RuneRead for Reader<'_> {
  fn read_rune(&mut self) -> Option<(char, usize)> {
    loop {
      if let Some(ch) = decode_first(&self.buf[..self.n]) {
        let w = ch.len_utf8();
        self.consume(w);
        return Some((ch, w));
      }
      if self.n == UTF8_MAX {
        break;
      }
      let mut b = [0];
      if self.leaves.read(&mut b) == 0 {
        break;
      }
      self.buf[self.n] = b[0];
      self.n += 1;
    }
    if self.n == 0 {
      return None;
    }
    self.consume(1);
    Some((char::REPLACEMENT_CHARACTER, 1))
  }
}

impl Iterator for Reader<'_> {
  type Item = char;

  fn next(&mut self) -> Option<char> {
    self.read_rune().map(|(ch, _)| ch)
  }
}

/// Reads a rope from end to beginning.
pub struct ReverseReader<'a> {
  leaves: Leaves<'a>,
  // Pending bytes in text order; the last one is returned next.
  buf:    [u8; UTF8_MAX],
  n:      usize,
}

impl<'a> ReverseReader<'a> {
  pub fn new(rope: &'a Rope) -> Self {
    ReverseReader {
      leaves: Leaves::new(rope),
      buf:    [0; UTF8_MAX],
      n:      0,
    }
  }

  pub fn read_byte(&mut self) -> Option<u8> {
    let mut b = [0];
    (self.fill(&mut b) == 1).then_some(b[0])
  }

  fn fill(&mut self, p: &mut [u8]) -> usize {
    if self.n == 0 {
      return self.leaves.read_rev(p);
    }
    let n = p.len().min(self.n);
    for (dst, src) in p.iter_mut().zip(self.buf[..self.n].iter().rev()) {
      *dst = *src;
    }
    self.n -= n;
    n
  }
}

impl io::Read for ReverseReader<'_> {
  fn read(&mut self, p: &mut [u8]) -> io::Result<usize> {
    Ok(self.fill(p))
  }
}

impl RuneRead for ReverseReader<'_> {
  fn read_rune(&mut self) -> Option<(char, usize)> {
    loop {
      if let Some((ch, w)) = decode_last(&self.buf[..self.n]) {
        self.n -= w;
        return Some((ch, w));
      }
      if self.n == UTF8_MAX {
        break;
      }
      let mut b = [0];
      if self.leaves.read_rev(&mut b) == 0 {
        break;
      }
      self.buf.copy_within(0..self.n, 1);
      self.buf[0] = b[0];
      self.n += 1;
    }
    if self.n == 0 {
      return None;
    }
    self.n -= 1;
    Some((char::REPLACEMENT_CHARACTER, 1))
  }
}

impl Iterator for ReverseReader<'_> {
  type Item = char;

  fn next(&mut self) -> Option<char> {
    self.read_rune().map(|(ch, _)| ch)
  }
}
