//! Pure header-stripping and concatenation over already-decoded file text.

use crate::{IngestError, IngestionResult};

/// Body and row contribution of one file after header handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    /// Lines kept for the merged text, joined with `\n`.
    pub body: String,
    /// `max(0, lines - 1)`
    pub rows: usize,
}

/// Decode raw bytes as UTF-8, dropping a leading byte-order mark.
pub(crate) fn decode(name: &str, bytes: &[u8]) -> Result<String, IngestError> {
    let text = std::str::from_utf8(bytes).map_err(|_| IngestError::Decode {
        name: name.to_string(),
    })?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
}

/// Lines of the trimmed content. `\r\n` and `\n` both end a line; empty
/// content still counts as a single (empty) line.
fn lines(content: &str) -> Vec<&str> {
    content
        .trim()
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Data rows in `content`: its line count minus the header, floored at zero.
pub fn row_count(content: &str) -> usize {
    lines(content).len().saturating_sub(1)
}

/// Apply header handling to one file. The first file keeps every line;
/// later files lose their first line.
pub fn process_file(content: &str, is_first: bool) -> ProcessedFile {
    let lines = lines(content);
    let rows = lines.len().saturating_sub(1);
    let kept = if is_first { &lines[..] } else { &lines[1..] };
    ProcessedFile {
        body: kept.join("\n"),
        rows,
    }
}

/// Merge decoded contents in order. `sources` names the files the contents
/// came from and is recorded on the result.
pub fn merge_contents(sources: Vec<String>, contents: &[String]) -> IngestionResult {
    let mut parts: Vec<String> = Vec::with_capacity(contents.len());
    let mut total_rows = 0;

    for (index, content) in contents.iter().enumerate() {
        let processed = process_file(content, index == 0);
        total_rows += processed.rows;
        // A header-only follower adds no lines at all.
        if index == 0 || !processed.body.is_empty() {
            parts.push(processed.body);
        }
    }

    IngestionResult {
        merged_text: parts.join("\n"),
        total_rows,
        sources,
    }
}
