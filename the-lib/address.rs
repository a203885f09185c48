//! Address resolution.
//!
//! An address names a span of the text. The grammar, loosest binding first:
//!
//! ```text
//! range    = [ relative ] "," [ range ] | [ relative ] ";" [ range ] | relative
//! relative = [ simple ] "+" [ relative ] | [ simple ] "-" [ relative ]
//!          | simple relative | simple
//! simple   = "$" | "." | "#" [ digits ] | digits | "/" regexp [ "/" ]
//! ```
//!
//! - `a,b` spans from the start of `a` to the end of `b`. A missing `a` is
//!   the start of the text and a missing `b` is `$`.
//! - `a;b` is like `a,b` but sets dot to `a` before evaluating `b`.
//! - `a+b` evaluates `b` forward from the end of `a`, `a-b` evaluates `b`
//!   backward from the start of `a`. A missing `a` is dot and a missing `b`
//!   is `1`. Juxtaposed simple addresses are joined with `+`.
//! - `$` is the empty span at the end of the text, `.` is dot.
//! - `#n` is the empty span after the `n`th rune.
//! - `n` is the `n`th line, including its newline. Line 0 is the empty span
//!   at the start of the text.
//! - `/re/` is the next match of `re`, wrapping around the end of the text.
//!   Evaluated backward it is the previous match, wrapping around the start.

use the_regexp::{
  Opts,
  Regexp,
};
use the_rope::{
  Rope,
  RuneRead,
};

use crate::{
  diff::Dot,
  edit::{
    EditError,
    Result,
  },
};

/// Runes that begin a simple address.
const SIMPLE_START: &str = ".#0123456789/$";

/// Resolves the address `text` against `rope` with `dot` as the current
/// selection.
pub fn addr(dot: Dot, text: &str, rope: &Rope) -> Result<Dot> {
  let mut dot = dot;
  let (at, rest) = parse(&mut dot, text, rope)?;
  if !rest.trim().is_empty() {
    return Err(EditError::ExpectedEnd);
  }
  at.ok_or(EditError::NoAddress)
}

/// Parses the longest address at the start of `t`. Returns `None` with `t`
/// unconsumed if there is no address. A `;` updates `dot`.
pub(crate) fn parse<'t>(dot: &mut Dot, t: &'t str, rope: &Rope) -> Result<(Option<Dot>, &'t str)> {
  let (left, t) = simple(*dot, 0, false, t, rope)?;
  let (left, t) = relative(*dot, left, t, rope)?;
  range(dot, left, t, rope)
}

fn range<'t>(
  dot: &mut Dot,
  left: Option<Dot>,
  t0: &'t str,
  rope: &Rope,
) -> Result<(Option<Dot>, &'t str)> {
  let (op, t) = match next(t0.trim_start()) {
    (None, t) => return Ok((left, t)),
    (Some(op @ (',' | ';')), t) => (op, t),
    (Some(_), _) => return Ok((left, t0)),
  };
  let left = left.unwrap_or_default();
  if op == ';' {
    *dot = left;
  }
  let (right, t) = parse(dot, t, rope)?;
  let right = right.unwrap_or(Dot::point(rope.len()));
  if left.start > right.end {
    return Err(EditError::AddressOutOfOrder);
  }
  range(dot, Some(Dot::new(left.start, right.end)), t, rope)
}

fn relative<'t>(
  dot: Dot,
  left: Option<Dot>,
  t0: &'t str,
  rope: &Rope,
) -> Result<(Option<Dot>, &'t str)> {
  let (op, t) = match next(t0.trim_start()) {
    (None, t) => return Ok((left, t)),
    (Some(c), _) if SIMPLE_START.contains(c) => ('+', t0),
    (Some(op @ ('+' | '-')), t) => (op, t),
    (Some(_), _) => return Ok((left, t0)),
  };
  let left = left.unwrap_or(dot);
  let rev = op == '-';
  let at = if rev { left.start } else { left.end };
  let (right, t) = match simple(dot, at, rev, t, rope)? {
    (Some(right), t) => (right, t),
    (None, t) => (line_addr(rope, at, rev, 1)?, t),
  };
  relative(dot, Some(right), t, rope)
}

/// Parses a simple address evaluated forward from `at`, or backward if
/// `rev`.
fn simple<'t>(
  dot: Dot,
  at: usize,
  rev: bool,
  t0: &'t str,
  rope: &Rope,
) -> Result<(Option<Dot>, &'t str)> {
  let t0 = t0.trim_start();
  let (c, t) = next(t0);
  let addr = match c {
    None => return Ok((None, t)),
    Some('.') => (dot, t),
    Some('#') => {
      let (n, t) = number(t)?;
      (rune_addr(rope, at, rev, n)?, t)
    },
    Some('0'..='9') => {
      let (n, t) = number(t0)?;
      (line_addr(rope, at, rev, n)?, t)
    },
    Some('/') => regexp_addr(rope, at, rev, t)?,
    Some('$') => (Dot::point(rope.len()), t),
    Some(_) => return Ok((None, t0)),
  };
  Ok((Some(addr.0), addr.1))
}

fn rune_addr(rope: &Rope, at: usize, rev: bool, n: usize) -> Result<Dot> {
  fn skip(mut r: impl RuneRead, n: usize) -> Result<usize> {
    let mut width = 0;
    for _ in 0..n {
      let (_, w) = r.read_rune().ok_or(EditError::OutOfRange)?;
      width += w;
    }
    Ok(width)
  }

  if rev {
    let head = rope.slice(0, at);
    Ok(Dot::point(at - skip(head.reverse_reader(), n)?))
  } else {
    let tail = rope.slice(at, rope.len());
    Ok(Dot::point(at + skip(tail.reader(), n)?))
  }
}

fn line_addr(rope: &Rope, at: usize, rev: bool, n: usize) -> Result<Dot> {
  if rev {
    return line_reverse(rope, at, n);
  }
  // Counting starts with the current line only if at is mid-line.
  let head = rope.slice(0, at);
  let at_line_start = head
    .reverse_reader()
    .read_rune()
    .is_none_or(|(c, _)| c == '\n');
  match (at_line_start, n) {
    (true, 0) => Ok(Dot::point(at)),
    (true, n) => line_forward(rope, at, n - 1),
    (false, n) => line_forward(rope, at, n),
  }
}

/// Returns the span of the `n`th newline-terminated line after `at`, where
/// the remainder of the current line is line 0. The end of the text
/// terminates the last line.
fn line_forward(rope: &Rope, mut at: usize, mut n: usize) -> Result<Dot> {
  let tail = rope.slice(at, rope.len());
  let mut r = tail.reader();
  let mut dot = Dot::point(at);
  loop {
    let b = match r.read_byte() {
      Some(b) => {
        at += 1;
        b
      },
      None if n == 0 => b'\n',
      None => return Err(EditError::OutOfRange),
    };
    if b == b'\n' {
      dot = Dot::new(dot.end, at);
      if n == 0 {
        return Ok(dot);
      }
      n -= 1;
    }
  }
}

/// Returns the span of the `n`th line before `at`, where the part of the
/// current line before `at` is line 0. Running out of text one line early
/// yields line 0 of the text, the empty span at its start.
fn line_reverse(rope: &Rope, mut at: usize, mut n: usize) -> Result<Dot> {
  let head = rope.slice(0, at);
  let mut r = head.reverse_reader();
  let mut dot = Dot::point(at);
  loop {
    let b = match r.read_byte() {
      Some(b) => b,
      None if n == 0 => b'\n',
      None if n == 1 => return Ok(Dot::point(0)),
      None => return Err(EditError::OutOfRange),
    };
    if b == b'\n' {
      dot = Dot::new(at, dot.start);
      if n == 0 {
        return Ok(dot);
      }
      n -= 1;
    }
    at -= 1;
  }
}

fn regexp_addr<'t>(rope: &Rope, at: usize, rev: bool, t: &'t str) -> Result<(Dot, &'t str)> {
  let opts = Opts {
    reverse: rev,
    delimiter: Some('/'),
    ..Opts::default()
  };
  let (re, t) = Regexp::new(t, opts)?;
  let caps = if rev {
    re.find_reverse_in_rope(rope, 0, at)
      .or_else(|| re.find_reverse_in_rope(rope, 0, rope.len()))
  } else {
    re.find_in_rope(rope, at, rope.len())
      .or_else(|| re.find_in_rope(rope, 0, rope.len()))
  };
  let caps = caps.ok_or(EditError::NoMatch)?;
  Ok((caps.range().into(), t))
}

/// Splits the first rune from `t`.
pub(crate) fn next(t: &str) -> (Option<char>, &str) {
  let mut chars = t.chars();
  (chars.next(), chars.as_str())
}

/// Parses a leading decimal number, defaulting to 1 if there are no digits.
pub(crate) fn number(t: &str) -> Result<(usize, &str)> {
  let end = t.find(|c: char| !c.is_ascii_digit()).unwrap_or(t.len());
  if end == 0 {
    return Ok((1, t));
  }
  let n = t[..end]
    .parse::<isize>()
    .ok()
    .and_then(|n| usize::try_from(n).ok())
    .ok_or(EditError::ValueOutOfRange)?;
  Ok((n, &t[end..]))
}

#[cfg(test)]
mod test {
  use super::*;

  /// `Ok(text)` of the resolved span or `Err(message)`.
  fn resolve(text: &str, dot: Dot, address: &str) -> std::result::Result<String, String> {
    let rope = Rope::new(text);
    addr(dot, address, &rope)
      .map(|at| rope.slice(at.start, at.end).to_string())
      .map_err(|err| err.to_string())
  }

  fn check(text: &str, dot: Dot, cases: &[(&str, std::result::Result<&str, &str>)]) {
    for &(address, want) in cases {
      let got = resolve(text, dot, address);
      match want {
        Ok(want) => assert_eq!(got.as_deref(), Ok(want), "{text:?} {address:?}"),
        Err(want) => {
          let err = got.expect_err(address);
          assert!(err.contains(want), "{text:?} {address:?}: {err:?} !~ {want:?}");
        },
      }
    }
  }

  const HELLO: &str = "Hello, 世界";
  const LINES: &str = "line1\nline2\nline3";

  #[test]
  fn errors() {
    check(HELLO, Dot::default(), &[
      ("", Err("no address")),
      ("1 xyz", Err("expected end-of-input")),
      ("#18446744073709551615", Err("value out of range")),
      ("18446744073709551615", Err("value out of range")),
      ("/(", Err("unclosed (")),
    ]);
  }

  #[test]
  fn end_of_text() {
    check(HELLO, Dot::default(), &[("$", Ok(""))]);
  }

  #[test]
  fn runes() {
    check(HELLO, Dot::default(), &[
      ("#", Ok("")),
      ("#1,#2", Ok("e")),
      ("#7,#8", Ok("世")),
      ("#9", Ok("")),
      ("#10", Err("address out of range")),
      ("#9-#0,#9", Ok("")),
      ("#9-#1,#9", Ok("界")),
      ("#9-#4,#9", Ok(", 世界")),
      ("#9-#9,#9", Ok(HELLO)),
      ("#9-#10,#9", Err("address out of range")),
    ]);
  }

  #[test]
  fn lines() {
    let text = "Hello,\n世界\n123";
    check(text, Dot::default(), &[
      ("0", Ok("")),
      ("1", Ok("Hello,\n")),
      ("2", Ok("世界\n")),
      ("3", Ok("123")),
      ("4", Err("address out of range")),
      ("100", Err("address out of range")),
      ("#1+0", Ok("ello,\n")),
      ("1+1", Ok("世界\n")),
      ("1+0", Ok("")),
      ("/世界/+0", Ok("\n")),
      ("1+3", Err("address out of range")),
      ("$-0", Ok("123")),
      ("$-1", Ok("世界\n")),
      ("$-2", Ok("Hello,\n")),
      ("$-3", Ok("")),
      ("$-4", Err("address out of range")),
      ("$-100", Err("address out of range")),
    ]);
  }

  #[test]
  fn regexps() {
    check(HELLO, Dot::default(), &[
      ("/世界", Ok("世界")),
      ("/世界/", Ok("世界")),
      ("/[a-z][a-z][a-z]", Ok("ell")),
      ("/X*", Ok("")),
      ("#2+/...", Ok("llo")),
      ("$+/世界", Ok("世界")),
      ("/NoMatch", Err("no match")),
      ("$-/..", Ok("世界")),
      ("#1-/..", Ok("世界")),
      ("#1-/NoMatch", Err("no match")),
    ]);
    check("12345", Dot::default(), &[("$-/[0-9][0-9][0-9]", Ok("345"))]);
    check("XXX123\nXXX\n123XXX", Dot::default(), &[
      ("$-/^123$", Err("no match")),
      ("$-/^XXX$", Ok("XXX")),
    ]);
    check("Hello, 世界/", Dot::default(), &[(r"/世界\/", Ok("世界/"))]);
    check(r"Hello, 世界\", Dot::default(), &[(r"/世界\\", Ok(r"世界\"))]);
    check("Hello, 世界\n", Dot::default(), &[(r"/世界\n", Ok("世界\n"))]);
    check("Hello, 世界\nxyz", Dot::default(), &[("/世界\\\nxyz", Ok("世界\nxyz"))]);
  }

  #[test]
  fn plus() {
    check(LINES, Dot::new(0, 1), &[
      (".", Ok("l")),
      ("$+$", Ok("")),
      (".+$", Ok("")),
      ("#1+$", Ok("")),
      ("1+$", Ok("")),
      ("/line/+$", Ok("")),
      ("$+.", Ok("l")),
      (".+.", Ok("l")),
      ("#1+.", Ok("l")),
      ("1+.", Ok("l")),
      ("/line/+.", Ok("l")),
      ("$+#1", Err("out of range")),
      (".+#1", Ok("")),
      ("#1+#1", Ok("")),
      ("1+#1", Ok("")),
      ("/line/+#1", Ok("")),
      ("$+1", Err("out of range")),
      (".+1", Ok("line2\n")),
      ("#1+1", Ok("line2\n")),
      ("1+1", Ok("line2\n")),
      ("/line/+1", Ok("line2\n")),
      ("$+/line[0-9]/", Ok("line1")),
      (".+/line[0-9]/", Ok("line2")),
      ("#1+/line[0-9]/", Ok("line2")),
      ("1+/line[0-9]/", Ok("line2")),
      ("/line/+/line[0-9]/", Ok("line2")),
      ("1+1+1", Ok("line3")),
      ("1+", Ok("line2\n")),
      ("$+", Err("address out of range")),
      ("+1", Ok("line2\n")),
      (".+/[a-z0-9]*/", Ok("ine1")),
      ("+/[a-z0-9]*/", Ok("ine1")),
      ("0+0", Ok("")),
      ("0+1", Ok("line1\n")),
      ("1 + 1", Ok("line2\n")),
      ("1 /line.*/", Ok("line2")),
      ("1 2", Ok("line3")),
    ]);
  }

  #[test]
  fn minus() {
    check(LINES, Dot::new(15, 16), &[
      (".", Ok("e")),
      ("$-$", Ok("")),
      (".-$", Ok("")),
      ("#1-$", Ok("")),
      ("1-$", Ok("")),
      ("/line/-$", Ok("")),
      ("$-.", Ok("e")),
      (".-.", Ok("e")),
      ("#1-.", Ok("e")),
      ("1-.", Ok("e")),
      ("/line/-.", Ok("e")),
      ("$-#1", Ok("")),
      (".-#1", Ok("")),
      ("#1-#1", Ok("")),
      ("1-#1", Err("address out of range")),
      ("2-#1", Ok("")),
      ("/line2/-#1", Ok("")),
      ("$-1", Ok("line2\n")),
      (".-1", Ok("line2\n")),
      ("#1-1", Ok("")),
      ("#1-2", Err("address out of range")),
      ("#6-1", Ok("line1\n")),
      ("1-1", Ok("")),
      ("2-2", Ok("")),
      ("3-3", Ok("")),
      ("1-2", Err("address out of range")),
      ("/line2/-1", Ok("line1\n")),
      ("$-/line[0-9]/", Ok("line3")),
      (".-/line[0-9]/", Ok("line2")),
      ("#1-/line[0-9]/", Ok("line3")),
      ("1-/line[0-9]/", Ok("line3")),
      ("/line/-/line[0-9]/", Ok("line3")),
      ("3-1-1", Ok("line1\n")),
      ("2-", Ok("line1\n")),
      ("0-", Ok("")),
      ("-1", Ok("line2\n")),
      (".-/[a-z0-9]*$/", Ok("line2")),
      ("-/[a-z0-9]*$/", Ok("line2")),
      ("3 - 1", Ok("line2\n")),
    ]);
  }

  #[test]
  fn comma() {
    check(LINES, Dot::new(0, 1), &[
      ("$,$", Ok("")),
      ("$,$+1", Err("address out of range")),
      (".,.", Ok("l")),
      (".,2", Ok("line1\nline2\n")),
      ("#1,#1", Ok("")),
      ("#1,#5", Ok("ine1")),
      ("0,0", Ok("")),
      ("1,1", Ok("line1\n")),
      ("1,2", Ok("line1\nline2\n")),
      ("1+1,3", Ok("line2\nline3")),
      ("3-1,3", Ok("line2\nline3")),
      ("1,2,3", Ok(LINES)),
      ("0,2", Ok("line1\nline2\n")),
      (",2", Ok("line1\nline2\n")),
      ("2,$", Ok("line2\nline3")),
      ("2,", Ok("line2\nline3")),
      (",", Ok(LINES)),
      ("3,1", Err("address out of order")),
      // Dot is unchanged when evaluating the right side.
      ("2,.+1", Ok("line2\n")),
    ]);
  }

  #[test]
  fn semicolon() {
    check(LINES, Dot::new(0, 1), &[
      ("$;$", Ok("")),
      ("$;$+1", Err("address out of range")),
      (".;.", Ok("l")),
      (".;2", Ok("line1\nline2\n")),
      ("#1;#1", Ok("")),
      ("#1;#5", Ok("ine1")),
      ("0;0", Ok("")),
      ("1;1", Ok("line1\n")),
      ("1;2", Ok("line1\nline2\n")),
      ("1+1;3", Ok("line2\nline3")),
      ("3-1;3", Ok("line2\nline3")),
      ("1;2;3", Ok(LINES)),
      ("0;2", Ok("line1\nline2\n")),
      (";2", Ok("line1\nline2\n")),
      ("2;$", Ok("line2\nline3")),
      ("2;", Ok("line2\nline3")),
      (";", Ok(LINES)),
      ("3;1", Err("address out of order")),
      // Dot is the left side when evaluating the right side.
      ("2;.+1", Ok("line2\nline3")),
    ]);
  }

  #[test]
  fn literal_scenarios() {
    check(LINES, Dot::new(0, 1), &[
      ("2", Ok("line2\n")),
      ("$-1", Ok("line2\n")),
      ("1,2", Ok("line1\nline2\n")),
      ("/line/", Ok("line")),
    ]);
  }

  #[test]
  fn mark_is_not_an_address() {
    check(LINES, Dot::new(0, 1), &[("'a", Err("expected end-of-input"))]);
  }

  #[test]
  fn parse_leaves_commands() {
    let rope = Rope::new(LINES);
    let mut dot = Dot::default();
    let (at, rest) = parse(&mut dot, "2,3 d", &rope).unwrap();
    assert_eq!(at, Some(Dot::new(6, 17)));
    assert_eq!(rest, " d");
    let (at, rest) = parse(&mut dot, "p", &rope).unwrap();
    assert_eq!(at, None);
    assert_eq!(rest, "p");
  }

  #[test]
  fn number_prefix() {
    assert_eq!(number("").unwrap(), (1, ""));
    assert_eq!(number("x").unwrap(), (1, "x"));
    assert_eq!(number("0").unwrap(), (0, ""));
    assert_eq!(number("42abc").unwrap(), (42, "abc"));
    assert!(matches!(
      number("99999999999999999999"),
      Err(EditError::ValueOutOfRange)
    ));
  }
}
