// Question-paper layout: font metrics, word wrap and page flow.
// Pure computation; the PDF writer in `render` consumes the result.

pub mod font_metrics;
pub mod paper;

pub use font_metrics::{default_page_config, FontFace, PageConfig};
pub use paper::{layout_paper, PaperLayout};
