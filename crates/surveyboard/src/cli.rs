//! Output formatting for the status commands

use chrono::{DateTime, Local, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use surveyboard_core::{Category, StatusRecord};

// ============================================================================
// Single subject
// ============================================================================

/// Format one record (human table or JSON)
pub fn format_record(record: &StatusRecord, json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(record).unwrap_or_else(|_| "{}".to_string());
    }

    if record.is_empty() {
        return format!(
            "No status available for {} (lookup failed, try again)",
            record.subject
        );
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    if no_color {
        table.set_header(vec!["Survey", "Status", "Completed at", "Note"]);
    } else {
        table.set_header(vec![
            Cell::new("Survey").fg(Color::Cyan),
            Cell::new("Status").fg(Color::Cyan),
            Cell::new("Completed at").fg(Color::Cyan),
            Cell::new("Note").fg(Color::Cyan),
        ]);
    }

    for entry in &record.entries {
        let (status, color) = match (entry.completed, entry.error.is_some()) {
            (true, _) => ("completed", Color::Green),
            (false, true) => ("unknown", Color::Yellow),
            (false, false) => ("pending", Color::DarkGrey),
        };
        let completed_at = entry.completed_at.as_deref().unwrap_or("-");
        let note = entry
            .error
            .as_deref()
            .map(|e| truncate(e, 50))
            .unwrap_or_default();

        let status_cell = if no_color {
            Cell::new(status)
        } else {
            Cell::new(status).fg(color)
        };

        table.add_row(Row::from(vec![
            Cell::new(category_label(entry.category)),
            status_cell,
            Cell::new(completed_at),
            Cell::new(note),
        ]));
    }

    let mut out = vec![
        format!("Subject:    {}", record.subject),
        format!("Fetched:    {}", format_timestamp(record.fetched_at)),
        format!(
            "Completed:  {} yearly survey(s)",
            record.completed_count()
        ),
    ];
    if record.is_partial() {
        out.push(format!(
            "Warning:    {} lookup(s) failed, results are partial",
            record.failed().count()
        ));
    }
    out.push(String::new());
    out.push(table.to_string());
    out.join("\n")
}

// ============================================================================
// Several subjects
// ============================================================================

/// One row per subject, one column per category
pub fn format_batch(records: &[&StatusRecord], categories: &[Category], json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec!["Subject".to_string()];
    header.extend(categories.iter().map(|c| category_label(*c)));
    header.push("Done".to_string());
    table.set_header(header);

    for record in records {
        let mut row = vec![record.subject.to_string()];
        for category in categories {
            let mark = match record.get(*category) {
                Some(e) if e.completed => "yes",
                Some(e) if e.error.is_some() => "?",
                Some(_) => "no",
                None => "-",
            };
            row.push(mark.to_string());
        }
        row.push(record.completed_count().to_string());
        table.add_row(row);
    }

    table.to_string()
}

/// True when `record` reports different per-category status than `prev`
///
/// Refetches that only move `fetched_at` do not count as a change.
pub fn status_changed(prev: Option<&StatusRecord>, record: &StatusRecord) -> bool {
    prev.is_none_or(|prev| prev.entries != record.entries)
}

/// Configured categories, one per line
pub fn format_categories(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|c| match c {
            Category::Year(y) => format!("{}  (survey_{}_responses)", y, y),
            Category::Current => "current  (first completed yearly survey)".to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Helpers
// ============================================================================

fn category_label(category: Category) -> String {
    match category {
        Category::Year(y) => y.to_string(),
        Category::Current => "Current".to_string(),
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveyboard_core::{CategoryStatus, LookupOutcome, SubjectKey};

    fn record() -> StatusRecord {
        StatusRecord::new(
            SubjectKey::new("member-7").unwrap(),
            vec![
                CategoryStatus::from_outcome(
                    Category::Year(2021),
                    LookupOutcome::completed(Some("2021-11-02".to_string()), None),
                ),
                CategoryStatus::failed(Category::Year(2022), "no such table"),
                CategoryStatus::from_outcome(Category::Current, LookupOutcome::not_completed()),
            ],
        )
    }

    #[test]
    fn test_format_record_table() {
        let out = format_record(&record(), false, true);
        assert!(out.contains("member-7"));
        assert!(out.contains("completed"));
        assert!(out.contains("unknown"));
        assert!(out.contains("pending"));
        assert!(out.contains("2021-11-02"));
        assert!(out.contains("results are partial"));
    }

    #[test]
    fn test_format_record_json() {
        let out = format_record(&record(), true, true);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["subject"], "member-7");
        assert_eq!(value["entries"][1]["error"], "no such table");
    }

    #[test]
    fn test_format_empty_record() {
        let empty = StatusRecord::empty(SubjectKey::new("x").unwrap());
        assert!(format_record(&empty, false, true).contains("No status available"));
    }

    #[test]
    fn test_format_batch_marks() {
        let r = record();
        let out = format_batch(
            &[&r],
            &[Category::Year(2021), Category::Year(2022), Category::Year(2023)],
            false,
        );
        let row: Vec<&str> = out
            .lines()
            .find(|line| line.contains("member-7"))
            .unwrap()
            .split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect();
        assert_eq!(row, vec!["member-7", "yes", "?", "-", "1"]);
    }

    #[test]
    fn test_status_changed_ignores_refetch_time() {
        let first = record();
        let mut refetched = record();
        refetched.fetched_at = first.fetched_at + chrono::Duration::seconds(31);
        assert!(!status_changed(Some(&first), &refetched));

        let mut updated = record();
        updated.entries[2] = CategoryStatus::from_outcome(
            Category::Current,
            LookupOutcome::completed(Some("2021-11-02".to_string()), None),
        );
        assert!(status_changed(Some(&first), &updated));
        assert!(status_changed(None, &first));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long error message", 10), "a very ...");
    }
}
