//! Static report: Markdown with ASCII charts.

use crate::plot::render_ascii_chart;
use crate::report::format::{
    gap_counts, meta_fields, recession_cells, summary_cells, table_cells,
};
use crate::report::{RenderMeta, ReportSpec, Section, Snapshot};

pub fn render_markdown(spec: &ReportSpec, snapshot: &Snapshot, meta: &RenderMeta) -> String {
    let mut out = String::new();

    out.push_str(&format!("# {}\n\n", spec.title));
    if let Some(subtitle) = &spec.subtitle {
        out.push_str(&format!("_{subtitle}_\n\n"));
    }

    let rows: Vec<Vec<String>> = meta_fields(meta)
        .into_iter()
        .map(|(k, v)| vec![k.to_string(), v])
        .collect();
    out.push_str(&table(&["Field".to_string(), "Value".to_string()], &rows));
    out.push('\n');

    for section in &spec.sections {
        render_section(&mut out, section, snapshot);
    }

    render_gaps(&mut out, snapshot);
    out
}

fn render_section(out: &mut String, section: &Section, snapshot: &Snapshot) {
    match section {
        Section::Prose { text } => {
            out.push_str(text.trim_end());
            out.push_str("\n\n");
        }
        Section::Table { title, columns, last } => {
            heading(out, title.as_deref().unwrap_or("Data"));
            let columns = snapshot.resolve(columns);
            let (header, rows) = table_cells(snapshot, &columns, *last);
            out.push_str(&table(&header, &rows));
            out.push('\n');
        }
        Section::Chart {
            title,
            column,
            width,
            height,
        } => {
            heading(out, title.as_deref().unwrap_or(snapshot.label(column)));
            let points = snapshot.frame.points(column).unwrap_or_default();
            out.push_str("```text\n");
            out.push_str(&render_ascii_chart(&points, &snapshot.recessions, *width, *height));
            out.push_str("```\n\n");
        }
        Section::Summary { title, columns } => {
            heading(out, title.as_deref().unwrap_or("Summary"));
            let columns = snapshot.resolve(columns);
            let (header, rows) = summary_cells(snapshot, &columns);
            out.push_str(&table(&header, &rows));
            out.push('\n');
        }
        Section::Recessions { title, column } => {
            heading(out, title.as_deref().unwrap_or("Recessions"));
            if snapshot.recessions.is_empty() {
                out.push_str("No recession windows configured.\n\n");
                return;
            }
            let (header, rows) = recession_cells(snapshot, column.as_deref());
            out.push_str(&table(&header, &rows));
            out.push('\n');
        }
    }
}

fn render_gaps(out: &mut String, snapshot: &Snapshot) {
    heading(out, "Data gaps");
    let gaps = gap_counts(snapshot);
    if snapshot.warnings.is_empty() && gaps.is_empty() {
        out.push_str("No missing values.\n");
        return;
    }
    for w in &snapshot.warnings {
        out.push_str(&format!("- **{}**: {}\n", escape_cell(&w.subject), w.message));
    }
    if !snapshot.warnings.is_empty() {
        out.push('\n');
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

fn heading(out: &mut String, text: &str) {
    out.push_str(&format!("## {text}\n\n"));
}

fn table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "| {} |\n",
        header.iter().map(|h| escape_cell(h)).collect::<Vec<_>>().join(" | ")
    ));
    out.push_str(&format!("|{}\n", "---|".repeat(header.len())));
    for row in rows {
        out.push_str(&format!(
            "| {} |\n",
            row.iter().map(|c| escape_cell(c)).collect::<Vec<_>>().join(" | ")
        ));
    }
    out
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{sample_meta, sample_snapshot};

    fn spec(sections: Vec<Section>) -> ReportSpec {
        ReportSpec {
            title: "Macro".to_string(),
            subtitle: Some("monthly".to_string()),
            sections,
        }
    }

    #[test]
    fn renders_sections_in_order_with_na_markers() {
        let doc = render_markdown(
            &spec(vec![
                Section::Prose {
                    text: "Intro paragraph.".to_string(),
                },
                Section::Table {
                    title: Some("Rates".to_string()),
                    columns: vec!["DGS10".to_string(), "DGS2".to_string()],
                    last: None,
                },
                Section::Chart {
                    title: None,
                    column: "SPREAD".to_string(),
                    width: 20,
                    height: 5,
                },
            ]),
            &sample_snapshot(),
            &sample_meta(),
        );

        assert!(doc.starts_with("# Macro\n\n_monthly_\n\n| Field | Value |\n"));
        let intro = doc.find("Intro paragraph.").unwrap();
        let rates = doc.find("## Rates").unwrap();
        let chart = doc.find("## SPREAD").unwrap();
        assert!(intro < rates && rates < chart);
        assert!(doc.contains("| 2024-02-29 | 4.30 | NA |"));
        assert!(doc.contains("```text\nChart: 2024-01-31 .. 2024-03-31"));
        assert!(!doc.contains("Generated at"));
    }

    #[test]
    fn data_gaps_lists_warnings_and_missing_counts() {
        let doc = render_markdown(&spec(vec![]), &sample_snapshot(), &sample_meta());
        let gaps = &doc[doc.find("## Data gaps").unwrap()..];
        assert!(gaps.contains("- **NOTAREALSERIES**: Series not found; shown as missing."));
        assert!(gaps.contains("| DGS2 | 1 | 3 |"));
        assert!(gaps.contains("| SPREAD | 1 | 3 |"));
    }

    #[test]
    fn generation_time_only_appears_in_metadata() {
        let mut meta = sample_meta();
        meta.generated_at = Some("2026-01-01T00:00:00Z".to_string());
        let doc = render_markdown(&spec(vec![]), &sample_snapshot(), &meta);
        assert_eq!(doc.matches("2026-01-01T00:00:00Z").count(), 1);
        assert!(doc.contains("| Generated at | 2026-01-01T00:00:00Z |"));
    }
}
