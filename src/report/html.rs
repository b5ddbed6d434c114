//! Interactive report: one self-contained HTML file.
//!
//! Tables collapse under `<details>`, charts are inline SVG, and the frame is
//! embedded as JSON so a small script can show a hover readout per chart.

use serde_json::{Map, Value, json};

use crate::plot::render_svg_chart;
use crate::report::format::{
    gap_counts, meta_fields, recession_cells, summary_cells, table_cells,
};
use crate::report::{RenderMeta, ReportSpec, Section, Snapshot};

/// Chart size in CSS pixels per ASCII cell.
const PX_PER_COL: usize = 10;
const PX_PER_ROW: usize = 20;

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:1000px;margin:2em auto;padding:0 1em;color:#222}\
table{border-collapse:collapse;margin:.5em 0}td,th{border:1px solid #ccc;padding:2px 8px;text-align:right}\
td:first-child,th:first-child{text-align:left}.na{color:#b00}\
svg.chart .line{stroke:#1f5fa8;stroke-width:1.5}svg.chart .point{fill:#1f5fa8}\
svg.chart .recession{fill:#ddd}svg.chart .frame{stroke:#999}svg.chart .axis{font-size:10px;fill:#555}\
.readout{font-family:monospace;min-height:1.2em;color:#333}";

const SCRIPT: &str = r#"(function(){
  var data = JSON.parse(document.getElementById('fmr-data').textContent);
  document.querySelectorAll('svg.chart').forEach(function(svg){
    var col = svg.getAttribute('data-column');
    var out = svg.nextElementSibling;
    var values = data.columns[col] || [];
    svg.addEventListener('mousemove', function(ev){
      var box = svg.getBoundingClientRect();
      var vb = svg.viewBox.baseVal;
      var x = (ev.clientX - box.left) * vb.width / box.width;
      var u = (x - 48) / (vb.width - 60);
      var n = data.dates.length;
      var i = Math.max(0, Math.min(n - 1, Math.round(u * (n - 1))));
      var v = values[i];
      out.textContent = data.dates[i] + '  ' + col + ' = ' + (v === null || v === undefined ? 'NA' : v.toFixed(2));
    });
  });
})();"#;

pub fn render_html(spec: &ReportSpec, snapshot: &Snapshot, meta: &RenderMeta) -> String {
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape(&spec.title)));
    out.push_str(&format!("<style>{STYLE}</style>\n</head>\n<body>\n"));
    out.push_str(&format!("<h1>{}</h1>\n", escape(&spec.title)));
    if let Some(subtitle) = &spec.subtitle {
        out.push_str(&format!("<p class=\"subtitle\"><em>{}</em></p>\n", escape(subtitle)));
    }

    out.push_str("<table class=\"meta\">\n");
    for (field, value) in meta_fields(meta) {
        out.push_str(&format!("<tr><th>{field}</th><td>{}</td></tr>\n", escape(&value)));
    }
    out.push_str("</table>\n");

    for section in &spec.sections {
        render_section(&mut out, section, snapshot);
    }
    render_gaps(&mut out, snapshot);

    out.push_str(&format!(
        "<script type=\"application/json\" id=\"fmr-data\">{}</script>\n",
        embedded_json(snapshot)
    ));
    out.push_str(&format!("<script>{SCRIPT}</script>\n"));
    out.push_str("</body>\n</html>\n");
    out
}

fn render_section(out: &mut String, section: &Section, snapshot: &Snapshot) {
    match section {
        Section::Prose { text } => {
            for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
                out.push_str(&format!("<p>{}</p>\n", escape(para)));
            }
        }
        Section::Table { title, columns, last } => {
            let columns = snapshot.resolve(columns);
            let (header, rows) = table_cells(snapshot, &columns, *last);
            out.push_str(&format!(
                "<details open>\n<summary>{} ({} rows)</summary>\n",
                escape(title.as_deref().unwrap_or("Data")),
                rows.len()
            ));
            out.push_str(&table(&header, &rows));
            out.push_str("</details>\n");
        }
        Section::Chart {
            title,
            column,
            width,
            height,
        } => {
            out.push_str(&format!(
                "<h2>{}</h2>\n",
                escape(title.as_deref().unwrap_or(snapshot.label(column)))
            ));
            let points = snapshot.frame.points(column).unwrap_or_default();
            out.push_str(&render_svg_chart(
                column,
                &points,
                &snapshot.recessions,
                width * PX_PER_COL,
                height * PX_PER_ROW,
            ));
            out.push_str("<div class=\"readout\"></div>\n");
        }
        Section::Summary { title, columns } => {
            out.push_str(&format!("<h2>{}</h2>\n", escape(title.as_deref().unwrap_or("Summary"))));
            let columns = snapshot.resolve(columns);
            let (header, rows) = summary_cells(snapshot, &columns);
            out.push_str(&table(&header, &rows));
        }
        Section::Recessions { title, column } => {
            out.push_str(&format!("<h2>{}</h2>\n", escape(title.as_deref().unwrap_or("Recessions"))));
            if snapshot.recessions.is_empty() {
                out.push_str("<p>No recession windows configured.</p>\n");
                return;
            }
            let (header, rows) = recession_cells(snapshot, column.as_deref());
            out.push_str(&table(&header, &rows));
        }
    }
}

fn render_gaps(out: &mut String, snapshot: &Snapshot) {
    out.push_str("<h2>Data gaps</h2>\n");
    let gaps = gap_counts(snapshot);
    if snapshot.warnings.is_empty() && gaps.is_empty() {
        out.push_str("<p>No missing values.</p>\n");
        return;
    }
    if !snapshot.warnings.is_empty() {
        out.push_str("<ul class=\"warnings\">\n");
        for w in &snapshot.warnings {
            out.push_str(&format!(
                "<li><strong>{}</strong>: {}</li>\n",
                escape(&w.subject),
                escape(&w.message)
            ));
        }
        out.push_str("</ul>\n");
    }
    if !gaps.is_empty() {
        let rows: Vec<Vec<String>> = gaps
            .into_iter()
            .map(|(label, missing, total)| vec![label, missing.to_string(), total.to_string()])
            .collect();
        out.push_str(&table(
            &["Column".to_string(), "Missing (NA)".to_string(), "Dates".to_string()],
            &rows,
        ));
    }
}

fn table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::from("<table>\n<tr>");
    for h in header {
        out.push_str(&format!("<th>{}</th>", escape(h)));
    }
    out.push_str("</tr>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            if cell == crate::report::format::MISSING {
                out.push_str("<td class=\"na\">NA</td>");
            } else {
                out.push_str(&format!("<td>{}</td>", escape(cell)));
            }
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
    out
}

/// Dates plus one array per column; missing values are `null`.
fn embedded_json(snapshot: &Snapshot) -> String {
    let frame = &snapshot.frame;
    let dates: Vec<String> = frame.dates().iter().map(|d| d.to_string()).collect();
    let mut columns = Map::new();
    for col in frame.columns() {
        let values: Vec<Value> = col.values.iter().map(|v| v.map_or(Value::Null, |v| json!(v))).collect();
        columns.insert(col.id.clone(), Value::Array(values));
    }
    let doc = json!({ "dates": dates, "columns": columns });
    // Keep `</script>` out of the payload.
    doc.to_string().replace("</", "<\\/")
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
