//! Analysis operations offered by the backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// One text-analysis operation. Serialized as its display label, which is
/// the identifier the backend dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Summarization,
    Translation,
    #[serde(rename = "Keyword Extraction")]
    KeywordExtraction,
    #[serde(rename = "Sentiment Analysis")]
    SentimentAnalysis,
    #[serde(rename = "Grammar Correction")]
    GrammarCorrection,
    #[serde(rename = "Spell Check")]
    SpellCheck,
    #[serde(rename = "Remove Stop Words")]
    RemoveStopWords,
    #[serde(rename = "Convert Case")]
    ConvertCase,
}

impl Operation {
    /// Every operation, in dashboard order.
    pub const ALL: [Operation; 8] = [
        Operation::Summarization,
        Operation::Translation,
        Operation::KeywordExtraction,
        Operation::SentimentAnalysis,
        Operation::GrammarCorrection,
        Operation::SpellCheck,
        Operation::RemoveStopWords,
        Operation::ConvertCase,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Operation::Summarization => "Summarization",
            Operation::Translation => "Translation",
            Operation::KeywordExtraction => "Keyword Extraction",
            Operation::SentimentAnalysis => "Sentiment Analysis",
            Operation::GrammarCorrection => "Grammar Correction",
            Operation::SpellCheck => "Spell Check",
            Operation::RemoveStopWords => "Remove Stop Words",
            Operation::ConvertCase => "Convert Case",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Operation::Summarization => {
                "Generates statistical and categorical distribution reports."
            }
            Operation::Translation => "Auto-detects and converts non-English content to English.",
            Operation::KeywordExtraction => "Identifies primary themes based on word frequency.",
            Operation::SentimentAnalysis => "Determines emotional polarity in opinion-based text.",
            Operation::GrammarCorrection => "Optimizes sentence structure and syntax flow.",
            Operation::SpellCheck => "Verifies vocabulary against standard English lexicons.",
            Operation::RemoveStopWords => {
                "Filters out high-frequency noise words for cleaner data."
            }
            Operation::ConvertCase => "Transforms text into Uppercase, Lowercase, or Title case.",
        }
    }

    /// Kebab-case form used on the command line.
    pub fn slug(self) -> String {
        self.label().to_lowercase().replace(' ', "-")
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lowercase and drop separators so "Spell Check", "spell-check" and
/// "spell_check" compare equal.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for Operation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s.trim());
        Operation::ALL
            .into_iter()
            .find(|op| normalize(op.label()) == wanted)
            .ok_or_else(|| CoreError::Validation(format!("unknown operation: {:?}", s)))
    }
}

/// Parse a comma-separated operation list, keeping the first occurrence
/// of each operation.
pub fn parse_list(s: &str) -> Result<Vec<Operation>, CoreError> {
    let mut selected = Vec::new();
    for part in s.split(',').filter(|p| !p.trim().is_empty()) {
        let op: Operation = part.parse()?;
        if !selected.contains(&op) {
            selected.push(op);
        }
    }
    Ok(selected)
}
