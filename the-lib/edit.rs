//! The edit command language.
//!
//! An edit is an optional [address](crate::address) followed by a command.
//! A missing address is dot. Commands either print or compute [`Diffs`]
//! against the unmodified rope; nothing is applied here.
//!
//! ```text
//! a/text/  c/text/  i/text/   append after, change, insert before
//! d                           delete
//! m addr   t addr             move, copy to after addr
//! p                           print
//! s[n]/re/text/[g]            substitute the nth (and later with g) match
//! g/re/cmd  v/re/cmd          run cmd if re matches (g) or not (v)
//! x/re/cmd  y/re/cmd          run cmd on each match (x) or between (y)
//! { cmd ... }                 run each cmd with the same dot
//! < cmd  > cmd  | cmd         replace with, send to, or filter through a shell command
//! ```
//!
//! Any non-space rune can stand in for `/` as the delimiter. Text may also be
//! given as lines following the command, ended by a line holding only `.`,
//! in which case escapes are not interpreted. In delimited text `\n` is a
//! newline, `\t` a tab, `\` before any other rune is that rune, and in
//! substitutions `\0`..`\9` is the text of a capture group.
//!
//! The diffs of compound commands (`x`, `y`, `g`, `v`, `{`) must address
//! ascending, non-overlapping spans of the original text.

use std::{
  io::{
    self,
    Write,
  },
  process::ExitStatus,
};

use the_regexp::{
  Captures,
  Opts,
  Regexp,
  RegexpError,
};
use the_rope::{
  Rope,
  RuneRead,
};
use thiserror::Error;

use crate::{
  address::{
    self,
    next,
    number,
  },
  config::EditConfig,
  diff::{
    Diff,
    Diffs,
    Dot,
  },
  pipe::{
    self,
    Pipe,
  },
};

pub type Result<T> = std::result::Result<T, EditError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EditError {
  #[error("no address")]
  NoAddress,
  #[error("address out of range")]
  OutOfRange,
  #[error("address out of order")]
  AddressOutOfOrder,
  #[error("no match")]
  NoMatch,
  #[error("expected end-of-input")]
  ExpectedEnd,
  #[error("bad command {0}")]
  BadCommand(char),
  /// The address resolved but no command followed it.
  #[error("no command")]
  NoCommand(Dot),
  #[error("expected address")]
  ExpectedAddress,
  #[error("expected regular expression")]
  ExpectedRegexp,
  #[error("expected command")]
  ExpectedCommand,
  #[error("unclosed {{")]
  UnclosedBlock,
  /// Edits of a compound command overlap or are not ascending.
  #[error("out of order")]
  OutOfOrder,
  #[error("value out of range")]
  ValueOutOfRange,
  #[error(transparent)]
  Regexp(#[from] RegexpError),
  #[error(transparent)]
  Io(#[from] io::Error),
  /// A shell command exited unsuccessfully.
  #[error("{0}")]
  Exit(ExitStatus),
  #[error("invalid config: {0}")]
  Config(#[from] toml::de::Error),
}

/// Computes the diffs of the edit `text` on `rope` with the default
/// [`EditConfig`]. Printed text and shell error output go to `print`.
pub fn edit(dot: Dot, text: &str, print: &mut dyn Write, rope: &Rope) -> Result<Diffs> {
  edit_with(&EditConfig::default(), dot, text, print, rope)
}

/// Like [`edit`] with an explicit configuration.
pub fn edit_with(
  config: &EditConfig,
  dot: Dot,
  text: &str,
  print: &mut dyn Write,
  rope: &Rope,
) -> Result<Diffs> {
  Editor {
    config,
    print,
    rope,
  }
  .edit_all(dot, text)
}

struct Editor<'a> {
  config: &'a EditConfig,
  print:  &'a mut dyn Write,
  rope:   &'a Rope,
}

impl Editor<'_> {
  /// Evaluates one edit and requires that nothing but space follows it.
  fn edit_all(&mut self, dot: Dot, t: &str) -> Result<Diffs> {
    let (diffs, rest) = self.edit(dot, t)?;
    if !rest.trim().is_empty() {
      return Err(EditError::ExpectedEnd);
    }
    Ok(diffs)
  }

  fn edit<'t>(&mut self, dot: Dot, t: &'t str) -> Result<(Diffs, &'t str)> {
    let mut dot = dot;
    let (a, t) = address::parse(&mut dot, t, self.rope)?;
    let a = a.unwrap_or(dot);
    let (op, t) = next(t.trim_start());
    tracing::debug!(%a, ?op, "edit");
    match op {
      None | Some('\n') => Err(EditError::NoCommand(a)),
      Some(op @ ('a' | 'c' | 'd' | 'i')) => Ok(change(a, op, t)),
      Some('m') => self.move_to(dot, a, t),
      Some('p') => {
        self.rope.slice(a.start, a.end).write_to(&mut *self.print)?;
        Ok((Diffs::new(), t))
      },
      Some('t') => self.copy(dot, a, t),
      Some('s') => self.sub(a, t),
      Some(op @ ('g' | 'v')) => self.cond(a, op, t),
      Some(op @ ('x' | 'y')) => self.each(a, op, t),
      Some('{') => self.seq(a, t),
      Some(op @ ('<' | '>' | '|')) => self.pipe(a, op, t),
      Some(op) => Err(EditError::BadCommand(op)),
    }
  }

  fn move_to<'t>(&self, mut dot: Dot, a: Dot, t: &'t str) -> Result<(Diffs, &'t str)> {
    let (b, t) = address::parse(&mut dot, t, self.rope)?;
    let mut b = b.ok_or(EditError::ExpectedAddress)?;
    // Moving nothing, or into the moved text, changes nothing.
    if a.is_empty() || (a.start <= b.end && b.end < a.end) {
      return Ok((Diffs::new(), t));
    }
    if a.end < b.end {
      b.end -= a.len();
    }
    let text = self.rope.slice(a.start, a.end);
    let diffs = vec![
      Diff::new(a, None),
      Diff::new(Dot::point(b.end), Some(text)),
    ];
    Ok((diffs.into(), t))
  }

  fn copy<'t>(&self, mut dot: Dot, a: Dot, t: &'t str) -> Result<(Diffs, &'t str)> {
    let (b, t) = address::parse(&mut dot, t, self.rope)?;
    if a.is_empty() {
      return Ok((Diffs::new(), t));
    }
    let b = b.ok_or(EditError::ExpectedAddress)?;
    let text = self.rope.slice(a.start, a.end);
    Ok((vec![Diff::new(Dot::point(b.end), Some(text))].into(), t))
  }

  fn sub<'t>(&self, a: Dot, t: &'t str) -> Result<(Diffs, &'t str)> {
    let (n, t) = number(t.trim_start())?;
    let (re, delim, t) = parse_regexp(t)?;
    let template = t;
    let (_, t) = parse_delimited(t, delim, None);
    let (global, t) = match next(t.trim_start()) {
      (Some('g'), rest) => (true, rest),
      _ => (false, t),
    };

    let mut skip = n.saturating_sub(1);
    let mut diffs = Diffs::new();
    let mut shift = 0isize;
    let mut from = a.start;
    while from <= a.end {
      let Some(caps) = re.find_in_rope(self.rope, from, a.end) else {
        break;
      };
      from = advance(self.rope, &caps);
      if skip > 0 {
        skip -= 1;
        continue;
      }
      let group = |i: usize| {
        caps
          .get(i)
          .map(|r| self.rope.slice(r.start, r.end).to_string())
          .unwrap_or_default()
      };
      let (text, _) = parse_delimited(template, delim, Some(&group));
      let at = Dot::from(caps.range())
        .shift(shift)
        .ok_or(EditError::OutOfOrder)?;
      shift += text.len() as isize - at.len() as isize;
      diffs.push(Diff::new(at, Some(Rope::new(text))));
      if !global {
        break;
      }
    }
    if diffs.is_empty() {
      return Err(EditError::NoMatch);
    }
    Ok((diffs, t))
  }

  fn cond<'t>(&mut self, a: Dot, op: char, t: &'t str) -> Result<(Diffs, &'t str)> {
    let (re, _, t) = parse_regexp(t)?;
    let (cmd, t) = split_newline(t);
    let matched = re.find_in_rope(self.rope, a.start, a.end).is_some();
    if matched != (op == 'g') {
      return Ok((Diffs::new(), t));
    }
    Ok((self.edit_all(a, cmd)?, t))
  }

  fn each<'t>(&mut self, a: Dot, op: char, t: &'t str) -> Result<(Diffs, &'t str)> {
    let (re, _, t) = parse_regexp(t)?;
    let (cmd, t) = split_newline(t);
    let mut composer = Composer::default();
    let mut prev = a.start;
    let mut from = a.start;
    while from <= a.end {
      let Some(caps) = re.find_in_rope(self.rope, from, a.end) else {
        break;
      };
      from = advance(self.rope, &caps);
      let dot = if op == 'y' {
        let between = Dot::new(prev, caps.start());
        prev = caps.end();
        between
      } else {
        caps.range().into()
      };
      composer.append(self.edit_all(dot, cmd)?)?;
    }
    if op == 'y' {
      composer.append(self.edit_all(Dot::new(prev, a.end), cmd)?)?;
    }
    Ok((composer.diffs, t))
  }

  fn seq<'t>(&mut self, a: Dot, mut t: &'t str) -> Result<(Diffs, &'t str)> {
    let mut composer = Composer::default();
    loop {
      t = t.trim_start();
      match next(t) {
        (Some('}'), rest) => return Ok((composer.diffs, rest)),
        (None, _) => return Err(EditError::UnclosedBlock),
        _ => {},
      }
      let (cmd, rest) = split_newline(t);
      t = rest;
      composer.append(self.edit_all(a, cmd)?)?;
    }
  }

  fn pipe<'t>(&mut self, a: Dot, op: char, t: &'t str) -> Result<(Diffs, &'t str)> {
    let (command, t) = split_newline(t);
    let command = command.trim();
    if command.is_empty() {
      return Err(EditError::ExpectedCommand);
    }
    let pipe = match op {
      '<' => Pipe::From,
      '>' => Pipe::To,
      _ => Pipe::Through,
    };
    let input = self.rope.slice(a.start, a.end);
    let output = pipe::run(&self.config.shell, command, pipe, &input, &mut *self.print)?;
    let diffs = output.map(|text| Diff::new(a, Some(text))).into_iter().collect();
    Ok((diffs, t))
  }
}

/// Joins the diffs of successive sub-commands that each address the
/// original text into one sequence of diffs applied in order.
#[derive(Default)]
struct Composer {
  /// End of the last appended diff, in original coordinates.
  end:   usize,
  /// Growth of the text from the diffs appended so far.
  shift: isize,
  diffs: Diffs,
}

impl Composer {
  fn append(&mut self, diffs: Diffs) -> Result<()> {
    if diffs.iter().any(|d| d.at.start < self.end) {
      return Err(EditError::OutOfOrder);
    }
    let Some(last) = diffs.last() else {
      return Ok(());
    };
    self.end = last.at.end;
    let shift = self.shift;
    for mut diff in diffs {
      self.shift += diff.text_len() as isize - diff.at.len() as isize;
      diff.at = diff.at.shift(shift).ok_or(EditError::OutOfOrder)?;
      self.diffs.push(diff);
    }
    Ok(())
  }
}

/// Returns where to search after `caps`. Empty matches step over one rune.
fn advance(rope: &Rope, caps: &Captures) -> usize {
  let end = caps.end();
  if caps.start() < end {
    return end;
  }
  let width = rope
    .slice(end, rope.len())
    .reader()
    .read_rune()
    .map_or(1, |(_, w)| w);
  end + width
}

fn change(mut a: Dot, op: char, t: &str) -> (Diffs, &str) {
  match op {
    'a' => a.start = a.end,
    'i' => a.end = a.start,
    _ => {},
  }
  if op == 'd' {
    return (vec![Diff::new(a, None)].into(), t);
  }
  let (text, t) = parse_text(t);
  (vec![Diff::new(a, Some(Rope::new(text)))].into(), t)
}

fn parse_text(t: &str) -> (String, &str) {
  let t = t.trim_start_matches(|c: char| c.is_whitespace() && c != '\n');
  match next(t) {
    (None, t) => (String::new(), t),
    (Some('\n'), t) => parse_lines(t),
    (Some(delim), t) => parse_delimited(t, delim, None),
  }
}

/// Reads lines up to one holding only `.`. The newline before the `.` line
/// is not part of the text.
fn parse_lines(mut t: &str) -> (String, &str) {
  let mut text = String::new();
  let mut line_start = true;
  let mut n = 0;
  loop {
    let (c, rest) = next(t);
    t = rest;
    match c {
      None => {
        if line_start && n > 0 {
          text.push('\n');
        }
        return (text, t);
      },
      Some('.') if line_start && (t.is_empty() || t.starts_with('\n')) => {
        return (text, t.strip_prefix('\n').unwrap_or(t));
      },
      Some(c) => {
        if line_start && n > 0 {
          text.push('\n');
        }
        n += 1;
        line_start = c == '\n';
        if !line_start {
          text.push(c);
        }
      },
    }
  }
}

/// Reads text up to an unescaped `delim`, newline or the end of input. With
/// `group`, `\0`..`\9` expand to the text it returns for that group.
fn parse_delimited<'t>(
  mut t: &'t str,
  delim: char,
  group: Option<&dyn Fn(usize) -> String>,
) -> (String, &'t str) {
  let mut text = String::new();
  loop {
    let (c, rest) = next(t);
    t = rest;
    match c {
      None => return (text, t),
      Some(c) if c == '\n' || c == delim => return (text, t),
      Some('\\') => {
        let (c, rest) = next(t);
        t = rest;
        match (group, c.and_then(|c| c.to_digit(10))) {
          (Some(group), Some(i)) => text.push_str(&group(i as usize)),
          _ => text.push(unescape(c)),
        }
      },
      Some(c) => text.push(c),
    }
  }
}

fn unescape(c: Option<char>) -> char {
  match c {
    None => '\\',
    Some('n' | '\n') => '\n',
    Some('t') => '\t',
    Some(c) => c,
  }
}

fn parse_regexp(t: &str) -> Result<(Regexp, char, &str)> {
  let (delim, t) = next(t.trim_start());
  let delim = delim.ok_or(EditError::ExpectedRegexp)?;
  let opts = Opts {
    delimiter: Some(delim),
    ..Opts::default()
  };
  let (re, t) = Regexp::new(t, opts)?;
  Ok((re, delim, t))
}

/// Splits after the first newline, keeping it with the command.
fn split_newline(t: &str) -> (&str, &str) {
  t.find('\n').map_or((t, ""), |i| t.split_at(i + 1))
}
