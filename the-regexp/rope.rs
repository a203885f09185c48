use the_rope::{
  Rope,
  RuneRead,
};

use crate::{
  Captures,
  Regexp,
  vm::Vm,
};

impl Regexp {
  /// Returns the leftmost-longest match that starts and ends within
  /// `start..end` of `rope`. The rune before `start` is still visible to `^`.
  ///
  /// # Panics
  ///
  /// Panics if `start > rope.len()`.
  pub fn find_in_rope(&self, rope: &Rope, start: usize, end: usize) -> Option<Captures> {
    let tail = rope.slice(start, rope.len());
    let mut vm = Vm::new(&self.program, tail.reader());
    vm.c = prev_rune(rope, start);
    vm.at = start;
    vm.lim = Some(end);
    vm.run()
  }

  /// Returns the rightmost-longest match within `start..end` of `rope`,
  /// scanning backwards from `end`. The regexp must have been compiled with
  /// [`Opts::reverse`](crate::Opts::reverse). Offsets are forward offsets.
  ///
  /// # Panics
  ///
  /// Panics if `start > end` or `end > rope.len()`.
  pub fn find_reverse_in_rope(&self, rope: &Rope, start: usize, end: usize) -> Option<Captures> {
    assert!(start <= end, "start {start} > end {end}");
    let head = rope.slice(0, end);
    let mut vm = Vm::new(&self.program, head.reverse_reader());
    vm.c = next_rune(rope, end);
    vm.lim = Some(end - start);
    let mut caps = vm.run()?;
    caps.reflect(end);
    Some(caps)
  }
}

impl Captures {
  /// Maps offsets counted backwards from `end` to forward offsets.
  fn reflect(&mut self, end: usize) {
    for pair in self.slots.chunks_exact_mut(2) {
      match (pair[0], pair[1]) {
        (Some(s), Some(e)) => {
          pair[0] = Some(end - e);
          pair[1] = Some(end - s);
        },
        _ => pair.fill(None),
      }
    }
  }
}

fn prev_rune(rope: &Rope, at: usize) -> Option<char> {
  let head = rope.slice(0, at);
  head.reverse_reader().read_rune().map(|(ch, _)| ch)
}

fn next_rune(rope: &Rope, at: usize) -> Option<char> {
  let tail = rope.slice(at, rope.len());
  tail.reader().read_rune().map(|(ch, _)| ch)
}
