//! Deterministic charts: ASCII for terminal/Markdown, SVG for HTML.

pub mod ascii;
pub mod svg;

pub use ascii::render_ascii_chart;
pub use svg::render_svg_chart;
