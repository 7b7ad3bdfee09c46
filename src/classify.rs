//! Table classification from header text.
//!
//! Rules are tried in declaration order and the first match wins. Header
//! sets that satisfy more than one rule (a reference list whose header also
//! holds a legend keyword) get whichever rule is listed first; there is no
//! scoring. Only the first row decides the type; the text before the table
//! is carried for logging.

use std::fmt;

use crate::model::{Alignment, Table};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableType {
    ReferenceList,
    Legend,
    ClaimChart,
    Standard,
}

impl TableType {
    pub fn name(self) -> &'static str {
        match self {
            TableType::ReferenceList => "Reference List",
            TableType::Legend => "Legend Table",
            TableType::ClaimChart => "Claim Chart",
            TableType::Standard => "Standard Table",
        }
    }

    pub fn config(self) -> TableConfig {
        let (body_align, special) = match self {
            TableType::ReferenceList => (Alignment::Center, SpecialRule::None),
            TableType::Legend => (Alignment::Justify, SpecialRule::Legend),
            TableType::ClaimChart => (Alignment::Justify, SpecialRule::ClaimChart),
            TableType::Standard => (Alignment::Justify, SpecialRule::None),
        };
        TableConfig {
            table_type: self,
            header_align: Alignment::Center,
            body_align,
            special,
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-cell overrides of `body_align`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialRule {
    None,
    /// Column 0 centred, every other column justified.
    Legend,
    /// Column 0 and lone symbol cells centred, everything else justified.
    ClaimChart,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableConfig {
    pub table_type: TableType,
    pub header_align: Alignment,
    pub body_align: Alignment,
    pub special: SpecialRule,
}

const REFERENCE_LIST_KEYWORDS: &[&str] = &[
    "publication number",
    "priority date",
    "filing date",
    "inventor(s)",
    "assignee(s)",
];

const LEGEND_KEYWORDS: &[&str] = &[
    "supported:",
    "inferentially supported:",
    "partially supported:",
    "not supported:",
];

struct TableContext<'a> {
    header: &'a [String],
    header_text: String,
}

struct Rule {
    table_type: TableType,
    matches: fn(&TableContext) -> bool,
}

fn reference_list(ctx: &TableContext) -> bool {
    REFERENCE_LIST_KEYWORDS
        .iter()
        .any(|k| ctx.header_text.contains(k))
}

fn legend_keywords(ctx: &TableContext) -> bool {
    ctx.header
        .iter()
        .any(|cell| LEGEND_KEYWORDS.iter().any(|k| cell.contains(k)))
}

fn claim_chart(ctx: &TableContext) -> bool {
    ctx.header_text.contains("claim element")
}

const RULES: &[Rule] = &[
    Rule {
        table_type: TableType::ReferenceList,
        matches: reference_list,
    },
    Rule {
        table_type: TableType::Legend,
        matches: legend_keywords,
    },
    Rule {
        table_type: TableType::ClaimChart,
        matches: claim_chart,
    },
];

/// Classifies a table from its first row and the text of the paragraph
/// directly before it ("" when there is none).
pub fn classify(table: &Table, preceding_text: &str) -> TableConfig {
    classify_header(&table.header(), preceding_text)
}

/// `header` is the lower-cased, trimmed text of each first-row cell.
pub fn classify_header(header: &[String], preceding_text: &str) -> TableConfig {
    let ctx = TableContext {
        header,
        header_text: header.join(" "),
    };
    let table_type = RULES
        .iter()
        .find(|rule| (rule.matches)(&ctx))
        .map_or(TableType::Standard, |rule| rule.table_type);
    log::debug!(
        "table header {header:?} after {:?} classified as {table_type}",
        preceding_text.trim()
    );
    table_type.config()
}
