//! CLI output formatting
//!
//! Commands write results through an [`OutputFormatter`] so `--json` swaps
//! human-readable lines for machine-readable objects. Logs go to stderr and
//! never mix with this output.

use dropsync_sync::engine::PassReport;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);

    /// Prints the outcome of a reconciliation pass
    fn report(&self, report: &PassReport);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {}

    fn report(&self, report: &PassReport) {
        for line in report_lines(report) {
            if line.starts_with(' ') {
                println!("{line}");
            } else {
                self.success(&line);
            }
        }
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }

    fn report(&self, report: &PassReport) {
        let mut value = serde_json::to_value(report).unwrap_or_default();
        if let Some(object) = value.as_object_mut() {
            object.insert("success".to_string(), serde_json::Value::Bool(true));
        }
        self.print_json(&value);
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}

/// Summary lines for a pass; indented lines are details
fn report_lines(report: &PassReport) -> Vec<String> {
    let mut lines = Vec::new();
    let prefix = if report.dry_run { "Dry run: " } else { "" };

    if report.uploaded.is_empty() && report.deleted.is_empty() {
        lines.push(format!(
            "{prefix}Already up to date ({} checked in {})",
            plural(report.items_considered, "file"),
            format_duration(report.duration_ms)
        ));
        return lines;
    }

    lines.push(format!(
        "{prefix}Pass completed in {}",
        format_duration(report.duration_ms)
    ));

    let (upload_verb, delete_verb) = if report.dry_run {
        ("Would upload", "Would delete")
    } else {
        ("Uploaded", "Deleted")
    };

    lines.push(format!(
        "  {upload_verb}: {}",
        plural(report.uploaded.len(), "file")
    ));
    lines.extend(report.uploaded.iter().map(|key| format!("    + {key}")));
    lines.push(format!(
        "  {delete_verb}: {}",
        plural(report.deleted.len(), "file")
    ));
    lines.extend(report.deleted.iter().map(|key| format!("    - {key}")));
    lines.push(format!("  Unchanged: {}", plural(report.unchanged, "file")));
    lines
}

pub fn format_duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}

pub fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}
