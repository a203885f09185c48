//! A small, linear-time regular expression engine that searches ropes
//! directly.
//!
//! Patterns compile to a bytecode [`Program`] executed by a Thompson-style
//! simultaneous-thread VM: no backtracking, leftmost-longest semantics, and
//! capture groups. The same program can be compiled for reverse matching
//! (concatenations swapped, `^`/`$` swapped) so that backward searches run
//! from the search point rather than re-scanning from the start of the text.
//!
//! # Grammar
//!
//! ```text
//! regexp    = alternate
//! alternate = concat [ "|" alternate ]
//! concat    = repeat [ concat ]
//! repeat    = term { "*" | "+" | "?" }
//! term      = "." | "^" | "$" | "(" regexp ")" | charclass | literal
//! charclass = "[" [ "^" ] ( classlit [ "-" classlit ] ) { classlit [ "-" classlit ] } "]"
//! ```
//!
//! - `|` alternation, `*` `+` `?` greedy repetition, `()` capturing group
//! - `.` any rune except newline
//! - `^` `$` beginning and end of text or line
//! - `[]` character class, `^` negates, `-` is a range
//! - `\n` newline, `\t` tab, `\` before any other rune is that rune, a
//!   trailing lone `\` is `\` itself
//!
//! # Terminators
//!
//! A pattern ends at the end of input, an unescaped newline, or an unescaped
//! delimiter ([`Opts::delimiter`]). [`Regexp::new`] returns the text after
//! the terminator so patterns can be embedded in a larger command string.
//!
//! # Unions
//!
//! [`Regexp::union`] joins several compiled programs into one alternation.
//! Each component keeps its own capture numbering and every match reports
//! the [`Opts::id`] of the component that won, which is how tokenizers
//! dispatch on the matched rule.

mod compile;
mod debug;
mod rope;
mod union;
mod vm;

use std::ops::Range;

use smallvec::SmallVec;
use the_rope::RuneRead;
use thiserror::Error;

use crate::{
  compile::Parser,
  vm::Vm,
};

pub type Result<T> = std::result::Result<T, RegexpError>;

/// Errors produced while compiling a pattern.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum RegexpError {
  #[error("unexpected {0}")]
  Unexpected(char),
  #[error("unclosed (")]
  UnclosedGroup,
  #[error("unopened )")]
  UnopenedGroup,
  #[error("unclosed [")]
  UnclosedClass,
  #[error("empty charclass")]
  EmptyClass,
  #[error("bad range")]
  BadRange,
}

/// Compile-time options. The default compiles a forward, undelimited
/// pattern with ID 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Opts {
  /// Compile for reverse matching.
  pub reverse:   bool,
  /// An unescaped occurrence of this rune terminates the pattern.
  pub delimiter: Option<char>,
  /// Reported by [`Captures::id`] when this pattern matches, including as a
  /// component of a union.
  pub id:        usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Instr {
  Match(usize),
  Any,
  Bol,
  Eol,
  Rune(char),
  Class(usize),
  NClass(usize),
  /// Jump by the offset.
  Jmp(isize),
  /// High priority continues at the next instruction, low priority jumps
  /// by the offset.
  Fork(isize),
  /// High priority jumps by the offset, low priority continues.
  RFork(isize),
  Save(usize),
}

/// A compiled instruction sequence.
#[derive(Debug, Clone, Default)]
pub(crate) struct Program {
  pub(crate) instrs:  Vec<Instr>,
  pub(crate) ncap:    usize,
  pub(crate) classes: Vec<Vec<(char, char)>>,
}

/// A compiled regular expression.
#[derive(Debug, Clone)]
pub struct Regexp {
  program: Program,
  source:  String,
}

impl Regexp {
  /// Compiles the pattern at the start of `text`, returning the regexp and
  /// the residual text following its terminator.
  pub fn new(text: &str, opts: Opts) -> Result<(Regexp, &str)> {
    let mut parser = Parser::new(text, opts);
    let program = parser.parse()?;
    let (source, rest) = parser.finish();
    Ok((Regexp {
      program,
      source: source.to_string(),
    }, rest))
  }

  /// Returns the text of the pattern.
  pub fn source(&self) -> &str {
    &self.source
  }

  /// Returns the number of capture groups, including the whole match.
  pub fn captures_len(&self) -> usize {
    self.program.ncap
  }

  /// Returns the leftmost-longest match in `input`.
  ///
  /// Offsets count the byte widths reported by the rune source.
  pub fn find<R: RuneRead>(&self, input: R) -> Option<Captures> {
    tracing::trace!("find {:?}\n{}", self.source, self);
    Vm::new(&self.program, input).run()
  }
}

/// Returns `text` with every meta-character escaped.
pub fn escape(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for ch in text.chars() {
    if r"|*+?.^$()[]\".contains(ch) {
      escaped.push('\\');
    }
    escaped.push(ch);
  }
  escaped
}

/// The offsets of a match and its capture groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures {
  slots: SmallVec<[Option<usize>; 8]>,
  id:    usize,
}

impl Captures {
  /// The span of the whole match.
  pub fn range(&self) -> Range<usize> {
    self.start()..self.end()
  }

  pub fn start(&self) -> usize {
    self.slots[0].unwrap_or_default()
  }

  pub fn end(&self) -> usize {
    self.slots[1].unwrap_or_default()
  }

  /// Returns the span of group `i`, where group 0 is the whole match. `None`
  /// if the group did not participate or does not exist.
  pub fn get(&self, i: usize) -> Option<Range<usize>> {
    let start = (*self.slots.get(2 * i)?)?;
    let end = (*self.slots.get(2 * i + 1)?)?;
    Some(start..end)
  }

  /// Number of groups, including the whole match.
  pub fn len(&self) -> usize {
    self.slots.len() / 2
  }

  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }

  /// The ID of the pattern that matched.
  pub fn id(&self) -> usize {
    self.id
  }

  /// Raw start/end slots, two per group.
  pub fn slots(&self) -> &[Option<usize>] {
    &self.slots
  }
}
