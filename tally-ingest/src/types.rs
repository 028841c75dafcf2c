use serde::{Deserialize, Serialize};
use tally_core::{NormalizedLine, SourceSpan};

/// Column arrangement of the transaction table, learned from its header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColumnLayout {
    /// No header seen; amounts are interpreted by count and sign
    #[default]
    Unknown,
    /// One signed amount column
    Single { balance: bool },
    /// Separate withdrawal and deposit columns
    Split { debit_first: bool, balance: bool },
}

impl ColumnLayout {
    pub fn has_balance(&self) -> bool {
        match self {
            ColumnLayout::Unknown => false,
            ColumnLayout::Single { balance } | ColumnLayout::Split { balance, .. } => *balance,
        }
    }
}

/// Consecutive lines making up one transaction: a dated start line plus any
/// continuation lines.
#[derive(Debug, Clone, PartialEq)]
pub struct LineGroup {
    pub lines: Vec<NormalizedLine>,
    /// Layout in force when the group started
    pub layout: ColumnLayout,
}

impl LineGroup {
    pub fn new(first: NormalizedLine, layout: ColumnLayout) -> Self {
        Self {
            lines: vec![first],
            layout,
        }
    }

    pub fn start(&self) -> &NormalizedLine {
        &self.lines[0]
    }

    pub fn continuation_count(&self) -> usize {
        self.lines.len() - 1
    }

    pub fn span(&self) -> SourceSpan {
        let first = &self.lines[0];
        let last = &self.lines[self.lines.len() - 1];
        SourceSpan::new(first.page, first.line, last.line)
    }

    /// Lines joined for audit output.
    pub fn raw_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Lowest line confidence in the group.
    pub fn confidence(&self) -> f64 {
        self.lines.iter().map(|l| l.confidence).fold(1.0, f64::min)
    }
}
