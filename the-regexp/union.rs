use crate::Regexp;

impl Regexp {
  /// Returns a regexp matching any of `regexps`, or `None` if there are none.
  ///
  /// Each component keeps its own capture numbering, so group 1 of a match
  /// is group 1 of whichever component matched. [`Captures::id`] reports
  /// that component's [`Opts::id`]. The leftmost-longest rule applies across
  /// components and earlier components win ties.
  ///
  /// [`Captures::id`]: crate::Captures::id
  /// [`Opts::id`]: crate::Opts::id
  pub fn union<'a>(regexps: impl IntoIterator<Item = &'a Regexp>) -> Option<Regexp> {
    let mut regexps = regexps.into_iter();
    let first = regexps.next()?;
    let Some(second) = regexps.next() else {
      return Some(first.clone());
    };
    let mut union = first.clone();
    union.source = format!("(?:{})", first.source);
    for right in std::iter::once(second).chain(regexps) {
      let ncap = union.program.ncap.max(right.program.ncap);
      union.program = union.program.branch(&right.program).append(right.program.clone());
      union.program.ncap = ncap;
      union.source.push_str(&format!("|(?:{})", right.source));
    }
    Some(union)
  }
}
