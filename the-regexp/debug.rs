use std::fmt;

use crate::{
  Instr,
  Regexp,
};

/// Renders the pattern source followed by one numbered line per instruction.
/// Jump targets are absolute.
impl fmt::Display for Regexp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.source)?;
    for (pc, &instr) in self.program.instrs.iter().enumerate() {
      write!(f, "\n{pc:4}:\t")?;
      self.fmt_instr(f, pc, instr)?;
    }
    Ok(())
  }
}

impl Regexp {
  fn fmt_instr(&self, f: &mut fmt::Formatter<'_>, pc: usize, instr: Instr) -> fmt::Result {
    let target = |off: isize| pc.wrapping_add_signed(off);
    match instr {
      Instr::Any => write!(f, "any"),
      Instr::Class(i) | Instr::NClass(i) => {
        let name = if matches!(instr, Instr::NClass(_)) {
          "nclass"
        } else {
          "class"
        };
        write!(f, "{name}")?;
        for &(lo, hi) in &self.program.classes[i] {
          if lo < hi {
            write!(f, " {lo}-{hi}")?;
          } else {
            write!(f, " {lo}")?;
          }
        }
        Ok(())
      },
      Instr::Match(_) => write!(f, "match"),
      Instr::Jmp(off) => write!(f, "jmp {}", target(off)),
      Instr::Fork(off) => write!(f, "fork {} {}", pc + 1, target(off)),
      Instr::RFork(off) => write!(f, "rfork {} {}", target(off), pc + 1),
      Instr::Save(i) => write!(f, "save {i}"),
      Instr::Bol => write!(f, "bol"),
      Instr::Eol => write!(f, "eol"),
      Instr::Rune(ch) => write!(f, "{ch:?}"),
    }
  }
}
