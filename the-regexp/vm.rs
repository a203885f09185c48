//! Thompson NFA simulation.
//!
//! Threads advance in lock step, one rune at a time. `add` follows epsilon
//! instructions eagerly and refuses to add the same pc twice at the same
//! position, which bounds the work per rune by the program length. Capture
//! buffers are recycled through a free list rather than reallocated for every
//! fork.

use smallvec::SmallVec;
use the_rope::RuneRead;

use crate::{
  Captures,
  Instr,
  Program,
};

type Mem = Vec<Option<usize>>;

struct Thread {
  pc:  usize,
  mem: Mem,
}

pub(crate) struct Vm<'p, R> {
  program:        &'p Program,
  input:          R,
  pub(crate) at:  usize,
  pub(crate) lim: Option<usize>,
  /// The rune before `at`.
  pub(crate) c:   Option<char>,
  /// The rune at `at`, and its width.
  n:              Option<(char, usize)>,
  /// The position at which each pc was last added.
  seen:           Vec<Option<usize>>,
  cur:            Vec<Thread>,
  next:           Vec<Thread>,
  free:           Vec<Mem>,
  best:           Option<(Mem, usize)>,
}

impl<'p, R: RuneRead> Vm<'p, R> {
  pub(crate) fn new(program: &'p Program, input: R) -> Self {
    let mut vm = Vm {
      program,
      input,
      at: 0,
      lim: None,
      c: None,
      n: None,
      seen: vec![None; program.instrs.len()],
      cur: Vec::new(),
      next: Vec::new(),
      free: Vec::new(),
      best: None,
    };
    vm.read();
    vm
  }

  pub(crate) fn run(mut self) -> Option<Captures> {
    loop {
      if self.best.is_none() {
        let mem = self.new_mem(None);
        self.add(0, mem);
      }
      // Checked after add() so that an empty pattern can match at the limit.
      if self.lim.is_some_and(|lim| self.at >= lim) {
        break;
      }
      self.read();
      std::mem::swap(&mut self.cur, &mut self.next);
      let mut cur = std::mem::take(&mut self.cur);
      for thread in cur.drain(..) {
        self.step(thread);
      }
      self.cur = cur;
      if self.c.is_none() || (self.best.is_some() && self.next.is_empty()) {
        break;
      }
    }
    let (mem, id) = self.best?;
    Some(Captures {
      slots: SmallVec::from_vec(mem),
      id,
    })
  }

  fn read(&mut self) {
    if let Some((_, w)) = self.n {
      self.at += w;
    }
    self.c = self.n.map(|(ch, _)| ch);
    self.n = self.input.read_rune();
  }

  fn new_mem(&mut self, init: Option<&[Option<usize>]>) -> Mem {
    let mut mem = self
      .free
      .pop()
      .unwrap_or_else(|| vec![None; 2 * self.program.ncap]);
    match init {
      Some(init) => mem.copy_from_slice(init),
      None => mem.fill(None),
    }
    mem
  }

  fn step(&mut self, thread: Thread) {
    if self.accepts(self.program.instrs[thread.pc]) {
      self.add(thread.pc + 1, thread.mem);
    } else {
      self.free.push(thread.mem);
    }
  }

  fn accepts(&self, instr: Instr) -> bool {
    let Some(c) = self.c else {
      return false;
    };
    match instr {
      Instr::Any => c != '\n',
      Instr::Rune(r) => c == r,
      Instr::Class(i) => in_class(c, &self.program.classes[i]),
      Instr::NClass(i) => !in_class(c, &self.program.classes[i]),
      _ => false,
    }
  }

  fn add(&mut self, pc: usize, mut mem: Mem) {
    if self.seen[pc] == Some(self.at) {
      self.free.push(mem);
      return;
    }
    self.seen[pc] = Some(self.at);
    match self.program.instrs[pc] {
      Instr::Jmp(off) => self.add(jump(pc, off), mem),
      Instr::Fork(off) => {
        let clone = self.new_mem(Some(mem.as_slice()));
        self.add(pc + 1, mem);
        self.add(jump(pc, off), clone);
      },
      Instr::RFork(off) => {
        let clone = self.new_mem(Some(mem.as_slice()));
        self.add(jump(pc, off), mem);
        self.add(pc + 1, clone);
      },
      Instr::Save(i) => {
        mem[i] = Some(self.at);
        self.add(pc + 1, mem);
      },
      Instr::Bol if self.c.is_some_and(|c| c != '\n') => self.free.push(mem),
      Instr::Eol if self.n.is_some_and(|(c, _)| c != '\n') => self.free.push(mem),
      Instr::Bol | Instr::Eol => self.add(pc + 1, mem),
      Instr::Match(id) => self.set_match(mem, id),
      Instr::Any | Instr::Rune(_) | Instr::Class(_) | Instr::NClass(_) => {
        self.next.push(Thread { pc, mem });
      },
    }
  }

  /// Keeps the leftmost-longest match. Among equal matches the earlier added
  /// thread, which took the higher priority branches, wins.
  fn set_match(&mut self, mem: Mem, id: usize) {
    match &self.best {
      Some((best, _)) if !(mem[0] <= best[0] && mem[1] > best[1]) => self.free.push(mem),
      _ => {
        if let Some((old, _)) = self.best.replace((mem, id)) {
          self.free.push(old);
        }
      },
    }
  }
}

fn jump(pc: usize, off: isize) -> usize {
  pc.wrapping_add_signed(off)
}

fn in_class(c: char, ranges: &[(char, char)]) -> bool {
  ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi)
}
