//! Inline SVG time-series chart for the HTML report.
//!
//! Same inputs as the ASCII chart. A missing value ends the current path
//! segment; recession windows are drawn as shaded bands behind the line.

use chrono::NaiveDate;

use crate::domain::RecessionWindow;

const MARGIN_LEFT: f64 = 48.0;
const MARGIN_RIGHT: f64 = 12.0;
const MARGIN_TOP: f64 = 12.0;
const MARGIN_BOTTOM: f64 = 24.0;

/// Render `points` as a standalone `<svg>` element tagged with `data-column`.
pub fn render_svg_chart(
    column: &str,
    points: &[(NaiveDate, Option<f64>)],
    recessions: &[RecessionWindow],
    width: usize,
    height: usize,
) -> String {
    let w = (width.max(120)) as f64;
    let h = (height.max(80)) as f64;
    let plot_w = w - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = h - MARGIN_TOP - MARGIN_BOTTOM;

    let mut out = format!(
        "<svg class=\"chart\" data-column=\"{}\" viewBox=\"0 0 {w:.0} {h:.0}\" width=\"{w:.0}\" height=\"{h:.0}\" role=\"img\">\n",
        escape_attr(column)
    );

    let n = points.len();
    let values: Vec<f64> = points.iter().filter_map(|(_, v)| *v).collect();
    let range = match (values.iter().copied().reduce(f64::min), values.iter().copied().reduce(f64::max)) {
        (Some(lo), Some(hi)) if hi > lo => Some((lo, hi)),
        (Some(lo), Some(_)) => Some((lo - 1.0, lo + 1.0)),
        _ => None,
    };

    let x_at = |i: usize| {
        if n < 2 {
            MARGIN_LEFT
        } else {
            MARGIN_LEFT + plot_w * i as f64 / (n as f64 - 1.0)
        }
    };

    // Recession bands, one rect per contiguous run of dates inside any window.
    let mut i = 0;
    while i < n {
        if recessions.iter().any(|r| r.contains(points[i].0)) {
            let start = i;
            while i + 1 < n && recessions.iter().any(|r| r.contains(points[i + 1].0)) {
                i += 1;
            }
            let x0 = x_at(start);
            let x1 = x_at(i).max(x0 + 1.0);
            out.push_str(&format!(
                "  <rect class=\"recession\" x=\"{x0:.2}\" y=\"{MARGIN_TOP:.2}\" width=\"{:.2}\" height=\"{plot_h:.2}\" />\n",
                x1 - x0
            ));
        }
        i += 1;
    }

    out.push_str(&format!(
        "  <rect class=\"frame\" x=\"{MARGIN_LEFT:.2}\" y=\"{MARGIN_TOP:.2}\" width=\"{plot_w:.2}\" height=\"{plot_h:.2}\" fill=\"none\" />\n"
    ));

    let Some((lo, hi)) = range else {
        out.push_str(&format!(
            "  <text class=\"empty\" x=\"{:.2}\" y=\"{:.2}\">NA (no observations)</text>\n</svg>\n",
            MARGIN_LEFT + 8.0,
            MARGIN_TOP + plot_h / 2.0
        ));
        return out;
    };
    let y_at = |v: f64| MARGIN_TOP + plot_h * (1.0 - (v - lo) / (hi - lo));

    // Line segments broken at missing values.
    let mut segments: Vec<Vec<(f64, f64)>> = vec![Vec::new()];
    for (i, (_, value)) in points.iter().enumerate() {
        match value {
            Some(v) => {
                if let Some(seg) = segments.last_mut() {
                    seg.push((x_at(i), y_at(*v)));
                }
            }
            None => segments.push(Vec::new()),
        }
    }
    for seg in segments.iter().filter(|s| !s.is_empty()) {
        if let [(x, y)] = seg.as_slice() {
            out.push_str(&format!("  <circle class=\"point\" cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"1.5\" />\n"));
        } else {
            let coords: Vec<String> = seg.iter().map(|(x, y)| format!("{x:.2},{y:.2}")).collect();
            out.push_str(&format!(
                "  <polyline class=\"line\" fill=\"none\" points=\"{}\" />\n",
                coords.join(" ")
            ));
        }
    }

    // Axis labels.
    out.push_str(&format!(
        "  <text class=\"axis\" x=\"4\" y=\"{:.2}\">{hi:.2}</text>\n",
        MARGIN_TOP + 4.0
    ));
    out.push_str(&format!(
        "  <text class=\"axis\" x=\"4\" y=\"{:.2}\">{lo:.2}</text>\n",
        MARGIN_TOP + plot_h
    ));
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        out.push_str(&format!(
            "  <text class=\"axis\" x=\"{MARGIN_LEFT:.2}\" y=\"{:.2}\">{}</text>\n",
            h - 6.0,
            first.0
        ));
        out.push_str(&format!(
            "  <text class=\"axis\" x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"end\">{}</text>\n",
            MARGIN_LEFT + plot_w,
            h - 6.0,
            last.0
        ));
    }

    out.push_str("</svg>\n");
    out
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
