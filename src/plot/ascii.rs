//! ASCII time-series chart for terminal and Markdown output.
//!
//! Fixed-size grid, deterministic output (golden tests below).
//!
//! Plot elements:
//! - observed values: `*`
//! - line between consecutive present values: `-` (a missing value breaks it)
//! - recession strip under the grid: `#`
//! - missing-value strip under the grid: `?`

use chrono::NaiveDate;

use crate::domain::RecessionWindow;

/// Render a chart of `points` (one entry per frame date, in order).
pub fn render_ascii_chart(
    points: &[(NaiveDate, Option<f64>)],
    recessions: &[RecessionWindow],
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return "Chart: no dates\n".to_string();
    };
    let Some((y_min, y_max)) = y_range(points) else {
        return format!("Chart: {} .. {} | no observations\n", first.0, last.0);
    };
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let n = points.len();
    let mut grid = vec![vec![' '; width]; height];

    // Lines first so the markers overlay them.
    for pair in points.windows(2).enumerate() {
        let (i, w) = pair;
        if let (Some(a), Some(b)) = (w[0].1, w[1].1) {
            let x0 = map_x(i, n, width);
            let x1 = map_x(i + 1, n, width);
            draw_line(&mut grid, x0, map_y(a, y_min, y_max, height), x1, map_y(b, y_min, y_max, height), '-');
        }
    }
    for (i, (_, value)) in points.iter().enumerate() {
        if let Some(v) = value {
            grid[map_y(*v, y_min, y_max, height)][map_x(i, n, width)] = '*';
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Chart: {} .. {} | y=[{y_min:.2}, {y_max:.2}]\n",
        first.0, last.0
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    if !recessions.is_empty() {
        let strip = strip(points, width, '#', |date, _| recessions.iter().any(|w| w.contains(date)));
        if strip.contains('#') {
            out.push_str(&format!("{strip} recession\n"));
        }
    }
    if points.iter().any(|(_, v)| v.is_none()) {
        let strip = strip(points, width, '?', |_, value| value.is_none());
        out.push_str(&format!("{strip} missing\n"));
    }

    out
}

/// One character per column, taken from the nearest date.
fn strip(
    points: &[(NaiveDate, Option<f64>)],
    width: usize,
    mark: char,
    hit: impl Fn(NaiveDate, Option<f64>) -> bool,
) -> String {
    (0..width)
        .map(|x| {
            let (date, value) = points[nearest_index(x, points.len(), width)];
            if hit(date, value) { mark } else { ' ' }
        })
        .collect()
}

fn y_range(points: &[(NaiveDate, Option<f64>)]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for v in points.iter().filter_map(|(_, v)| *v) {
        min_y = min_y.min(v);
        max_y = max_y.max(v);
    }
    if !(min_y.is_finite() && max_y.is_finite()) {
        return None;
    }
    if max_y > min_y {
        Some((min_y, max_y))
    } else {
        // Flat series: centre it.
        Some((min_y - 1.0, max_y + 1.0))
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(i: usize, n: usize, width: usize) -> usize {
    if n < 2 {
        return 0;
    }
    let u = i as f64 / (n as f64 - 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn nearest_index(x: usize, n: usize, width: usize) -> usize {
    let u = x as f64 / (width as f64 - 1.0);
    ((u * (n as f64 - 1.0)).round() as usize).min(n.saturating_sub(1))
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish). Only fills blank cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn chart_golden_snapshot_small() {
        let points = vec![
            (d(1, 31), Some(1.0)),
            (d(2, 29), Some(2.0)),
            (d(3, 31), None),
            (d(4, 30), Some(4.0)),
            (d(5, 31), Some(3.0)),
        ];
        let recessions = vec![RecessionWindow {
            start: d(2, 1),
            end: d(3, 31),
            label: None,
        }];

        let txt = render_ascii_chart(&points, &recessions, 10, 5);
        let expected = concat!(
            "Chart: 2024-01-31 .. 2024-05-31 | y=[0.85, 4.15]\n",
            "       *  \n",
            "        -*\n",
            "          \n",
            " -*       \n",
            "*         \n",
            "  ####     recession\n",
            "    ??     missing\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn no_strips_without_gaps_or_recessions() {
        let points = vec![(d(1, 31), Some(1.0)), (d(2, 29), Some(1.0))];
        let txt = render_ascii_chart(&points, &[], 10, 5);
        assert!(!txt.contains("recession"));
        assert!(!txt.contains("missing"));
        assert!(txt.starts_with("Chart: 2024-01-31 .. 2024-02-29 | y=[-0.10, 2.10]\n"));
    }

    #[test]
    fn all_missing_column_is_reported() {
        let points = vec![(d(1, 31), None), (d(2, 29), None)];
        assert_eq!(
            render_ascii_chart(&points, &[], 10, 5),
            "Chart: 2024-01-31 .. 2024-02-29 | no observations\n"
        );
        assert_eq!(render_ascii_chart(&[], &[], 10, 5), "Chart: no dates\n");
    }
}
