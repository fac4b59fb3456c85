//! Text primitives for list menus: the single-line input editor, the token filter used to
//! narrow item lists, and display-width helpers for truncating and wrapping rows.

pub mod fuzzy;
pub mod input_line;
pub mod width;

pub use fuzzy::{Query, match_indices};
pub use input_line::InputLine;
pub use width::{display_width, truncate_to_width, wrap_to_width};
