use std::io::Write;

use owo_colors::OwoColorize;
use textflow_core::report::{self, HistoryPeriod, Polarity};
use textflow_core::{
    AnalyzeResponse, Config, EmailDelivery, HistoryEntry, InboxMessage, IngestionResult,
    Operation, SearchHit,
};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn heading(w: &mut dyn Write, title: &str, color: ColorMode) -> std::io::Result<()> {
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", title.bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "{}", title)?;
        writeln!(w, "{}", sep)?;
    }
    Ok(())
}

pub fn print_success(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "OK".green().bold(), message)
    } else {
        writeln!(w, "OK {}", message)
    }
}

pub fn print_warning(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "WARNING:".yellow(), message)
    } else {
        writeln!(w, "WARNING: {}", message)
    }
}

/// Summary of a merged selection, printed before submission.
pub fn print_dataset_summary(
    w: &mut dyn Write,
    dataset: &IngestionResult,
    skipped: &[&str],
    color: ColorMode,
) -> std::io::Result<()> {
    let label = dataset.submission_filename();
    if color.enabled() {
        writeln!(
            w,
            "Loaded {} ({} files, {} rows)",
            label.bold(),
            dataset.file_count(),
            dataset.total_rows
        )?;
    } else {
        writeln!(
            w,
            "Loaded {} ({} files, {} rows)",
            label,
            dataset.file_count(),
            dataset.total_rows
        )?;
    }
    if !skipped.is_empty() {
        let note = format!("(Skipped {} non-CSV: {})", skipped.len(), skipped.join(", "));
        if color.enabled() {
            writeln!(w, "{}", note.dimmed())?;
        } else {
            writeln!(w, "{}", note)?;
        }
    }
    Ok(())
}

pub fn print_analysis(
    w: &mut dyn Write,
    response: &AnalyzeResponse,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    heading(w, "ANALYSIS RESULTS", color)?;

    for result in &response.results {
        writeln!(w)?;
        match (result.success, color.enabled()) {
            (true, true) => writeln!(w, "{}", result.title.bold().cyan())?,
            (false, true) => writeln!(w, "{} {}", result.title.bold().red(), "(failed)".red())?,
            (true, false) => writeln!(w, "{}", result.title)?,
            (false, false) => writeln!(w, "{} (failed)", result.title)?,
        }
        for line in result.output.lines() {
            writeln!(w, "  {}", line)?;
        }
    }

    if let Some(stats) = &response.stats {
        writeln!(w)?;
        writeln!(
            w,
            "Segments: {}    Processing time: {:.3}s",
            stats.total_chunks, stats.processing_time
        )?;
        if stats.alert {
            print_warning(w, "backend raised an alert for this dataset", color)?;
        }
    }
    Ok(())
}

pub fn print_search_hits(
    w: &mut dyn Write,
    query: &str,
    hits: &[SearchHit],
    color: ColorMode,
) -> std::io::Result<()> {
    if hits.is_empty() {
        writeln!(w, "No matches for \"{}\".", query)?;
        return Ok(());
    }
    writeln!(w, "{} matches for \"{}\"", hits.len(), query)?;

    for hit in hits {
        writeln!(w)?;
        let source = format!(
            "{} / {}",
            hit.filename.as_deref().unwrap_or("?"),
            hit.column_name.as_deref().unwrap_or("?")
        );
        let score = format!("{:+.2}", hit.sentiment_score);
        if color.enabled() {
            let score = match Polarity::of(hit.sentiment_score) {
                Polarity::Positive => score.green().to_string(),
                Polarity::Negative => score.red().to_string(),
                Polarity::Neutral => score.dimmed().to_string(),
            };
            writeln!(w, "{}  sentiment {}", source.bold(), score)?;
        } else {
            writeln!(w, "{}  sentiment {}", source, score)?;
        }
        writeln!(w, "  {}", report::search_snippet(hit))?;
    }
    Ok(())
}

pub fn print_history(
    w: &mut dyn Write,
    entries: &[&HistoryEntry],
    period: HistoryPeriod,
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, &format!("HISTORY ({})", period), color)?;
    if entries.is_empty() {
        writeln!(w, "No runs in this period.")?;
        return Ok(());
    }

    for entry in entries {
        let status = entry.status.as_deref().unwrap_or("Unknown");
        let status = if !color.enabled() {
            status.to_string()
        } else if status.eq_ignore_ascii_case("completed") {
            status.green().to_string()
        } else {
            status.yellow().to_string()
        };
        writeln!(
            w,
            "#{:<5} {}  {}  [{}]",
            entry.id,
            entry.timestamp.as_deref().unwrap_or("-"),
            entry.filename.as_deref().unwrap_or("-"),
            status
        )?;
        let records = entry
            .records_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let time = entry
            .processing_time
            .map(|t| format!("{:.3}s", t))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            w,
            "       ops: {}  records: {}  time: {}",
            entry.operations.as_deref().unwrap_or("-"),
            records,
            time
        )?;
    }
    writeln!(w)?;
    writeln!(w, "{} runs", entries.len())?;
    Ok(())
}

pub fn print_inbox(
    w: &mut dyn Write,
    messages: &[InboxMessage],
    color: ColorMode,
) -> std::io::Result<()> {
    if messages.is_empty() {
        writeln!(w, "Inbox is empty.")?;
        return Ok(());
    }

    for msg in messages {
        let title = msg.title.as_deref().unwrap_or("(untitled)");
        if color.enabled() {
            let kind = msg.kind.as_deref().unwrap_or("info");
            let title = match kind {
                "success" => title.green().to_string(),
                "error" => title.red().to_string(),
                _ => title.bold().to_string(),
            };
            writeln!(w, "#{:<5} {}", msg.id, title)?;
        } else {
            writeln!(w, "#{:<5} {}", msg.id, title)?;
        }

        if let Some(body) = &msg.message {
            writeln!(w, "       {}", body)?;
        }
        let delivery = msg.email_delivery();
        let report = if msg.report_data.is_some() {
            "report attached"
        } else {
            "no report"
        };
        let line = format!(
            "       {}  email {}  {}",
            msg.timestamp.as_deref().unwrap_or("-"),
            delivery.label(),
            report
        );
        if color.enabled() && delivery == EmailDelivery::Failed {
            writeln!(w, "{}", line.yellow())?;
        } else if color.enabled() {
            writeln!(w, "{}", line.dimmed())?;
        } else {
            writeln!(w, "{}", line)?;
        }
    }
    Ok(())
}

pub fn print_operations(w: &mut dyn Write, color: ColorMode) -> std::io::Result<()> {
    for op in Operation::ALL {
        if color.enabled() {
            writeln!(w, "{:<20} {}", op.slug().cyan(), op.label().bold())?;
        } else {
            writeln!(w, "{:<20} {}", op.slug(), op.label())?;
        }
        writeln!(w, "{:<20} {}", "", op.description())?;
    }
    Ok(())
}

pub fn print_config(
    w: &mut dyn Write,
    config: &Config,
    identity: Option<&str>,
) -> std::io::Result<()> {
    writeln!(w, "base_url             = {}", config.normalized_base_url())?;
    writeln!(w, "request_timeout_secs = {}", config.request_timeout_secs)?;
    writeln!(w, "read_timeout_secs    = {}", config.read_timeout_secs)?;
    writeln!(w, "color                = {}", config.color)?;
    writeln!(
        w,
        "identity             = {}",
        identity.unwrap_or(textflow_core::GUEST_USER)
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use textflow_core::{OperationResult, RunStats};

    fn render(f: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn analysis_plain_text() {
        let response = AnalyzeResponse {
            results: vec![
                OperationResult {
                    title: "Summarization".into(),
                    output: "rows: 4\nmean: 2.5".into(),
                    success: true,
                },
                OperationResult {
                    title: "Translation".into(),
                    output: "service unavailable".into(),
                    success: false,
                },
            ],
            stats: Some(RunStats {
                total_chunks: 2,
                processing_time: 0.25,
                alert: true,
            }),
        };
        let out = render(|w| print_analysis(w, &response, ColorMode(false)));
        assert!(out.contains("Summarization\n  rows: 4\n  mean: 2.5\n"));
        assert!(out.contains("Translation (failed)"));
        assert!(out.contains("Segments: 2    Processing time: 0.250s"));
        assert!(out.contains("WARNING: backend raised an alert"));
    }

    #[test]
    fn dataset_summary_lists_skipped() {
        let dataset = IngestionResult {
            merged_text: "h\n1".into(),
            total_rows: 1,
            sources: vec!["a.csv".into()],
        };
        let out = render(|w| print_dataset_summary(w, &dataset, &["notes.txt"], ColorMode(false)));
        assert_eq!(
            out,
            "Loaded a.csv (1 files, 1 rows)\n(Skipped 1 non-CSV: notes.txt)\n"
        );
    }

    #[test]
    fn operations_listing_has_every_slug() {
        let out = render(|w| print_operations(w, ColorMode(false)));
        for op in Operation::ALL {
            assert!(out.contains(&op.slug()));
        }
    }
}
