//! Benchmarks for address resolution, edits and highlighting in the-lib.
//!
//! Run with: `cargo bench -p the-lib --bench edit`

use std::io;

use divan::{
  Bencher,
  black_box,
};
use the_lib::{
  Diff,
  Diffs,
  Dot,
  addr,
  edit,
  syntax::{
    Highlighter,
    RegexpTokenizer,
    TokenHighlighter,
    TokenRule,
  },
};
use the_rope::Rope;

fn main() {
  divan::main();
}

fn make_text(lines: usize) -> Rope {
  let line = "The quick brown fox jumps over the lazy dog 42 times.\n";
  Rope::new(line.repeat(lines))
}

#[divan::bench(args = ["$", "500", "$-/fox/", "100,200", "#1000+3"])]
fn address(bencher: Bencher, address: &str) {
  let rope = make_text(1_000);
  bencher.bench(|| black_box(addr(Dot::default(), address, &rope)));
}

#[divan::bench(args = [",x/fox/c/cat/", ",s/[0-9]+/N/g", ",y/\\n/d", "1,$-1{\n2d\n3d\n}"])]
fn edit_and_apply(bencher: Bencher, command: &str) {
  let rope = make_text(1_000);
  bencher.bench(|| {
    let Ok(diffs) = edit(Dot::default(), command, &mut io::sink(), &rope) else {
      return None;
    };
    Some(black_box(diffs.apply(&rope)))
  });
}

fn highlighter() -> TokenHighlighter<RegexpTokenizer<u8>> {
  let rules = [("[a-zA-Z]+", 0), ("[0-9]+", 1), ("[.]", 2)]
    .into_iter()
    .map(|(regexp, style)| TokenRule {
      regexp: regexp.to_string(),
      group: 0,
      style,
    })
    .collect();
  match RegexpTokenizer::new(rules) {
    Ok(tokenizer) => TokenHighlighter::new(tokenizer),
    Err(err) => panic!("bad rules: {err}"),
  }
}

#[divan::bench]
fn highlight_full(bencher: Bencher) {
  let rope = make_text(200);
  let highlighter = highlighter();
  bencher.bench(|| black_box(highlighter.update(Vec::new(), &Diffs::new(), &rope)));
}

#[divan::bench]
fn highlight_after_insert(bencher: Bencher) {
  let old = make_text(200);
  let highlighter = highlighter();
  let hi = highlighter.update(Vec::new(), &Diffs::new(), &old);
  let diffs = Diffs::from(vec![Diff::new(Dot::point(5_000), Some(Rope::new("xyz")))]);
  let (new, _) = diffs.apply(&old);
  bencher
    .with_inputs(|| hi.clone())
    .bench_values(|hi| black_box(highlighter.update(hi, &diffs, &new)));
}
