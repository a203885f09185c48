//! Structural editing of ropes with the sam command language.
//!
//! [`address`] resolves addresses to spans, [`edit`] turns commands into
//! [`Diffs`] that can be applied and undone, [`motion`] derives cursor
//! motions from addresses and [`syntax`] keeps regexp highlights up to date
//! across edits.
//!
//! ```ignore
//! use the_lib::{Dot, edit};
//! use the_rope::Rope;
//!
//! let text = Rope::new("line1\nline2\nline3");
//! let diffs = edit(Dot::default(), ",x/line/c/LINE/", &mut std::io::sink(), &text)?;
//! let (text, undo) = diffs.apply(&text);
//! assert_eq!(text, "LINE1\nLINE2\nLINE3");
//! ```

pub mod address;
pub mod config;
pub mod diff;
pub mod edit;
pub mod motion;
mod pipe;
pub mod syntax;

pub use address::addr;
pub use config::EditConfig;
pub use diff::{
  Diff,
  Diffs,
  Dot,
};
pub use edit::{
  EditError,
  Result,
  edit,
  edit_with,
};
