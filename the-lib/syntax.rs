//! Regexp-driven syntax highlighting.
//!
//! A [`Tokenizer`] finds the next styled token in a rope. The
//! [`RegexpTokenizer`] does so with a union of one regexp per
//! [`TokenRule`]. A [`Highlighter`] keeps a sorted list of highlights in
//! step with edits; [`TokenHighlighter`] re-tokenizes only from the first
//! changed token until the new tokens line up with the old ones again.
//!
//! Rules can be loaded from TOML:
//!
//! ```toml
//! [[rule]]
//! regexp = '//.*'
//! style = "comment"
//!
//! [[rule]]
//! regexp = '"([^"]*)"'
//! group = 1
//! style = "string"
//! ```

use std::time::Instant;

use serde::{
  Deserialize,
  Serialize,
  de::DeserializeOwned,
};
use the_regexp::{
  Opts,
  Regexp,
  RegexpError,
};
use the_rope::{
  Rope,
  RuneRead,
};
use thiserror::Error;
use tracing::Level;

use crate::diff::{
  Diffs,
  Dot,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyntaxError {
  #[error("no regexps")]
  NoRegexps,
  /// A rule's regexp ended before the end of its text.
  #[error("expected end-of-input, got {0}")]
  Residual(String),
  #[error(transparent)]
  Regexp(#[from] RegexpError),
  #[error("invalid syntax rules: {0}")]
  Config(#[from] toml::de::Error),
}

/// A style applied to a span of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight<S> {
  pub at:    Dot,
  pub style: S,
}

pub trait Tokenizer<S> {
  /// Returns the first token starting at or after `at`.
  fn next_token(&self, rope: &Rope, at: usize) -> Option<Highlight<S>>;
}

/// A syntactic element matched by a regexp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TokenRule<S> {
  pub regexp: String,
  /// The capture group holding the styled text. 0 is the whole match.
  #[serde(default)]
  pub group:  usize,
  pub style:  S,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, bound(deserialize = "S: Deserialize<'de>"))]
struct RuleSet<S> {
  #[serde(default)]
  rule: Vec<TokenRule<S>>,
}

/// Tokenizes with the leftmost-longest match among its rules. Ties go to
/// the earlier rule.
#[derive(Debug, Clone)]
pub struct RegexpTokenizer<S> {
  rules:  Vec<TokenRule<S>>,
  regexp: Regexp,
}

impl<S> RegexpTokenizer<S> {
  pub fn new(rules: Vec<TokenRule<S>>) -> Result<Self, SyntaxError> {
    let mut regexps = Vec::with_capacity(rules.len());
    for (id, rule) in rules.iter().enumerate() {
      let opts = Opts {
        id,
        ..Opts::default()
      };
      let (regexp, rest) = Regexp::new(&rule.regexp, opts)?;
      if !rest.is_empty() {
        return Err(SyntaxError::Residual(rest.to_string()));
      }
      regexps.push(regexp);
    }
    let regexp = Regexp::union(&regexps).ok_or(SyntaxError::NoRegexps)?;
    Ok(Self { rules, regexp })
  }

  pub fn rules(&self) -> &[TokenRule<S>] {
    &self.rules
  }
}

impl<S: DeserializeOwned> RegexpTokenizer<S> {
  /// Builds a tokenizer from the `[[rule]]` tables of a TOML document.
  pub fn from_toml(text: &str) -> Result<Self, SyntaxError> {
    let rules: RuleSet<S> = toml::from_str(text)?;
    Self::new(rules.rule)
  }
}

impl<S: Clone> Tokenizer<S> for RegexpTokenizer<S> {
  fn next_token(&self, rope: &Rope, at: usize) -> Option<Highlight<S>> {
    let caps = self.regexp.find_in_rope(rope, at, rope.len())?;
    let rule = self.rules.get(caps.id())?;
    // A group that took no part in the match styles the whole match.
    let span = caps.get(rule.group).unwrap_or(caps.range());
    Some(Highlight {
      at:    span.into(),
      style: rule.style.clone(),
    })
  }
}

pub trait Highlighter<S> {
  /// Returns the highlights of `rope`, the text produced by applying `diffs`
  /// to the text that `old` highlights. With no diffs, tokenizing continues
  /// after the last of `old`, so an empty `old` highlights the whole text.
  fn update(&self, old: Vec<Highlight<S>>, diffs: &Diffs, rope: &Rope) -> Vec<Highlight<S>>;
}

/// A [`Highlighter`] over any [`Tokenizer`].
#[derive(Debug, Clone)]
pub struct TokenHighlighter<T> {
  tokenizer: T,
}

impl<T> TokenHighlighter<T> {
  pub fn new(tokenizer: T) -> Self {
    Self { tokenizer }
  }

  pub fn tokenizer(&self) -> &T {
    &self.tokenizer
  }

  /// Tokenizes from the end of `hi`. Once past `resync`, a token equal to
  /// the next of `tail` means the rest of `tail` is still valid.
  fn retokenize<S>(
    &self,
    mut hi: Vec<Highlight<S>>,
    tail: Vec<Highlight<S>>,
    resync: usize,
    rope: &Rope,
  ) -> Vec<Highlight<S>>
  where
    S: PartialEq,
    T: Tokenizer<S>,
  {
    let mut tail = tail.into_iter().peekable();
    let mut at = hi.last().map_or(0, |h| h.at.end);
    loop {
      let Some(h) = self.tokenizer.next_token(rope, at) else {
        return hi;
      };
      if h.at.start >= resync && tail.peek() == Some(&h) {
        hi.extend(tail);
        return hi;
      }
      at = if h.at.is_empty() {
        let Some(next) = rune_end(rope, h.at.end) else {
          return hi;
        };
        next
      } else {
        h.at.end
      };
      while tail.next_if(|old| old.at.start < at).is_some() {}
      if !h.at.is_empty() {
        hi.push(h);
      }
    }
  }
}

impl<S, T> Highlighter<S> for TokenHighlighter<T>
where
  S: PartialEq,
  T: Tokenizer<S>,
{
  fn update(&self, old: Vec<Highlight<S>>, diffs: &Diffs, rope: &Rope) -> Vec<Highlight<S>> {
    let start = tracing::enabled!(Level::DEBUG).then(Instant::now);
    let mut hi = old;
    // Span of the new text that differs from the shifted old text.
    let mut dirty: Option<Dot> = None;
    for diff in diffs {
      let inserted = Dot::new(diff.at.start, diff.at.start + diff.text_len());
      dirty = Some(match dirty {
        Some(prev) => {
          let prev = diff.update(prev);
          Dot::new(
            prev.start.min(inserted.start),
            prev.end.max(inserted.end),
          )
        },
        None => inserted,
      });
      hi.retain_mut(|h| {
        let overlaps = h.at.end > diff.at.start && h.at.start < diff.at.end;
        h.at = diff.update(h.at);
        !overlaps
      });
    }
    // A token touching the change may grow into it, so it is redone too.
    let (keep, resync) = match dirty {
      Some(dirty) => (hi.partition_point(|h| h.at.end < dirty.start), dirty.end),
      None => (hi.len(), 0),
    };
    let tail = hi.split_off(keep);
    let hi = self.retokenize(hi, tail, resync, rope);

    if let Some(start) = start {
      tracing::debug!(
        "highlight update took {}s",
        Instant::now().duration_since(start).as_secs_f64()
      );
    }
    hi
  }
}

fn rune_end(rope: &Rope, at: usize) -> Option<usize> {
  let tail = rope.slice(at, rope.len());
  let (_, width) = tail.reader().read_rune()?;
  Some(at + width)
}
