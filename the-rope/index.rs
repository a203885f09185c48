use crate::{
  Rope,
  RuneRead,
};

impl Rope {
  /// Returns the byte offset of the first rune for which `f` returns true.
  pub fn index_func(&self, mut f: impl FnMut(char) -> bool) -> Option<usize> {
    let mut r = self.reader();
    let mut at = 0;
    while let Some((ch, w)) = r.read_rune() {
      if f(ch) {
        return Some(at);
      }
      at += w;
    }
    None
  }

  /// Returns the byte offset of the first occurrence of `ch`.
  pub fn index_rune(&self, ch: char) -> Option<usize> {
    self.index_func(|x| x == ch)
  }

  /// Returns the byte offset of the last rune for which `f` returns true,
  /// scanning from the end.
  pub fn last_index_func(&self, mut f: impl FnMut(char) -> bool) -> Option<usize> {
    let mut r = self.reverse_reader();
    let mut at = self.len();
    while let Some((ch, w)) = r.read_rune() {
      at -= w;
      if f(ch) {
        return Some(at);
      }
    }
    None
  }
}
