use crate::{
  Instr,
  Opts,
  Program,
  RegexpError,
  Result,
};

/// Recursive-descent compiler for the pattern grammar.
pub(crate) struct Parser<'a> {
  text: &'a str,
  pos:  usize,
  opts: Opts,
  /// Set once a terminator has been consumed. Holds the pattern's end.
  end:  Option<usize>,
}

impl<'a> Parser<'a> {
  pub(crate) fn new(text: &'a str, opts: Opts) -> Self {
    Parser {
      text,
      pos: 0,
      opts,
      end: None,
    }
  }

  /// Parses a complete pattern and wraps it as group 0 followed by a match.
  pub(crate) fn parse(&mut self) -> Result<Program> {
    let program = self.alternate(0)?.unwrap_or_default();
    let mut program = program.group();
    program.instrs.push(Instr::Match(self.opts.id));
    Ok(program)
  }

  /// Returns the pattern source and the residual text.
  pub(crate) fn finish(self) -> (&'a str, &'a str) {
    let end = self.end.unwrap_or(self.pos);
    (&self.text[..end], &self.text[self.pos..])
  }

  fn done(&self) -> bool {
    self.end.is_some()
  }

  fn peek(&self) -> Option<char> {
    self.text[self.pos..].chars().next()
  }

  fn next(&mut self) -> Option<char> {
    let ch = self.peek()?;
    self.pos += ch.len_utf8();
    Some(ch)
  }

  fn escape(&mut self) -> char {
    match self.next() {
      None => '\\',
      Some('n') => '\n',
      Some('t') => '\t',
      Some(ch) => ch,
    }
  }

  fn alternate(&mut self, depth: usize) -> Result<Option<Program>> {
    let left = self.concat(depth)?;
    if self.done() || self.peek() != Some('|') {
      return Ok(left);
    }
    let Some(left) = left else {
      return Err(RegexpError::Unexpected('|'));
    };
    self.next();
    let right = self.alternate(depth)?.unwrap_or_default();
    Ok(Some(left.alt(right)))
  }

  fn concat(&mut self, depth: usize) -> Result<Option<Program>> {
    let Some(mut program) = self.repeat(depth)? else {
      return Ok(None);
    };
    while !self.done() {
      match self.repeat(depth)? {
        Some(right) => program = program.cat(right, self.opts.reverse),
        None => break,
      }
    }
    Ok(Some(program))
  }

  fn repeat(&mut self, depth: usize) -> Result<Option<Program>> {
    let Some(mut program) = self.term(depth)? else {
      return Ok(None);
    };
    while let Some(op @ ('*' | '+' | '?')) = self.peek() {
      self.next();
      program = program.repeat(op);
    }
    Ok(Some(program))
  }

  fn term(&mut self, depth: usize) -> Result<Option<Program>> {
    let Some(ch) = self.peek() else {
      self.end = Some(self.pos);
      return Ok(None);
    };
    if ch == '\n' || Some(ch) == self.opts.delimiter {
      self.end = Some(self.pos);
      self.next();
      return Ok(None);
    }
    match ch {
      '|' => return Ok(None),
      ')' if depth > 0 => return Ok(None),
      ')' => return Err(RegexpError::UnopenedGroup),
      '*' | '+' | '?' => return Err(RegexpError::Unexpected(ch)),
      _ => {},
    }
    self.next();
    let rev = self.opts.reverse;
    let program = match ch {
      '\\' => Program::op(Instr::Rune(self.escape())),
      '.' => Program::op(Instr::Any),
      '^' => Program::op(if rev { Instr::Eol } else { Instr::Bol }),
      '$' => Program::op(if rev { Instr::Bol } else { Instr::Eol }),
      '(' => self.group(depth)?,
      '[' => self.charclass()?,
      ch => Program::op(Instr::Rune(ch)),
    };
    Ok(Some(program))
  }

  fn group(&mut self, depth: usize) -> Result<Program> {
    let inner = self.alternate(depth + 1)?;
    if self.done() || self.next() != Some(')') {
      return Err(RegexpError::UnclosedGroup);
    }
    Ok(inner.unwrap_or_default().group())
  }

  fn charclass(&mut self) -> Result<Program> {
    let negated = self.peek() == Some('^');
    if negated {
      self.next();
    }
    let mut ranges = Vec::new();
    let mut pending: Option<char> = None;
    while let Some(ch) = self.next() {
      match ch {
        ']' => {
          ranges.extend(pending.map(|p| (p, p)));
          if ranges.is_empty() {
            return Err(RegexpError::EmptyClass);
          }
          return Ok(Program::class(ranges, negated));
        },
        '-' => {
          let Some(lo) = pending.take() else {
            return Err(RegexpError::BadRange);
          };
          let hi = match self.next() {
            None | Some(']' | '-') => return Err(RegexpError::BadRange),
            Some('\\') => self.escape(),
            Some(hi) => hi,
          };
          if lo >= hi {
            return Err(RegexpError::BadRange);
          }
          ranges.push((lo, hi));
        },
        ch => {
          let lit = if ch == '\\' { self.escape() } else { ch };
          ranges.extend(pending.replace(lit).map(|p| (p, p)));
        },
      }
    }
    Err(RegexpError::UnclosedClass)
  }
}

impl Instr {
  fn shift_save(self, n: usize) -> Instr {
    match self {
      Instr::Save(i) => Instr::Save(i + n),
      instr => instr,
    }
  }

  fn shift_class(self, n: usize) -> Instr {
    match self {
      Instr::Class(i) => Instr::Class(i + n),
      Instr::NClass(i) => Instr::NClass(i + n),
      instr => instr,
    }
  }
}

fn offset(n: usize) -> isize {
  n as isize
}

impl Program {
  fn op(instr: Instr) -> Program {
    Program {
      instrs: vec![instr],
      ..Program::default()
    }
  }

  fn class(ranges: Vec<(char, char)>, negated: bool) -> Program {
    let instr = if negated {
      Instr::NClass(0)
    } else {
      Instr::Class(0)
    };
    Program {
      instrs:  vec![instr],
      ncap:    0,
      classes: vec![ranges],
    }
  }

  /// `self|right`, numbering right's groups after self's.
  fn alt(self, right: Program) -> Program {
    self.branch(&right).cat(right, false)
  }

  /// Wraps self in `fork`/`jmp` so that `right` can be appended as the low
  /// priority branch of an alternation.
  pub(crate) fn branch(self, right: &Program) -> Program {
    let mut instrs = Vec::with_capacity(self.instrs.len() + right.instrs.len() + 2);
    instrs.push(Instr::Fork(offset(self.instrs.len() + 2)));
    instrs.extend(self.instrs);
    instrs.push(Instr::Jmp(offset(right.instrs.len() + 1)));
    Program { instrs, ..self }
  }

  /// Concatenates right after self (before self if reversed). Capture
  /// groups are numbered in source order either way.
  fn cat(self, mut right: Program, rev: bool) -> Program {
    let saves = self.ncap * 2;
    for instr in &mut right.instrs {
      *instr = instr.shift_save(saves);
    }
    let ncap = self.ncap + right.ncap;
    let (left, right) = if rev { (right, self) } else { (self, right) };
    Program {
      ncap,
      ..left.append(right)
    }
  }

  /// Appends right's instructions and classes. Group numbers and the group
  /// count are left untouched.
  pub(crate) fn append(mut self, right: Program) -> Program {
    let classes = self.classes.len();
    self
      .instrs
      .extend(right.instrs.into_iter().map(|instr| instr.shift_class(classes)));
    self.classes.extend(right.classes);
    self
  }

  fn repeat(self, op: char) -> Program {
    let n = self.instrs.len();
    let mut instrs = Vec::with_capacity(n + 2);
    match op {
      '+' => {
        instrs.extend(self.instrs);
        instrs.push(Instr::RFork(-offset(n)));
      },
      '*' => {
        instrs.push(Instr::Fork(offset(n + 2)));
        instrs.extend(self.instrs);
        instrs.push(Instr::RFork(-offset(n)));
      },
      _ => {
        instrs.push(Instr::Fork(offset(n + 1)));
        instrs.extend(self.instrs);
      },
    }
    Program { instrs, ..self }
  }

  /// Wraps self in a capture group numbered 0, shifting its groups up.
  fn group(self) -> Program {
    let mut instrs = Vec::with_capacity(self.instrs.len() + 2);
    instrs.push(Instr::Save(0));
    instrs.extend(self.instrs.into_iter().map(|instr| instr.shift_save(2)));
    instrs.push(Instr::Save(1));
    Program {
      instrs,
      ncap: self.ncap + 1,
      classes: self.classes,
    }
  }
}
