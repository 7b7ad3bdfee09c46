//! The house style. Check and fix both read these tables, so the two passes
//! cannot disagree on what conforms.

pub const HEADING_FONT: &str = "Cambria";
pub const BODY_FONT: &str = "Segoe UI";
pub const BODY_SIZE: f32 = 10.0;
pub const TOC_FONT: &str = "Calibri";
pub const TOC_SIZE: f32 = 11.0;
pub const HEADING_COLOR: [u8; 3] = [0, 0, 0];

/// Runs in these fonts carry glyphs (check marks, bullets) rather than text.
pub const PROTECTED_FONTS: &[&str] = &["Wingdings", "Wingdings 2", "Symbol"];

/// Whole-cell texts centred in claim charts.
pub const CLAIM_CHART_SYMBOLS: &[&str] = &["\u{2713}", "\u{2612}", "P", "-"];

pub const H1_SPACE_BEFORE: f32 = 6.0;
pub const H1_SPACE_AFTER: f32 = 6.0;
pub const H1_LINE_SPACING: f32 = 1.33;
pub const LINE_SPACING_TOLERANCE: f32 = 0.01;

pub const DATE_PLACEHOLDER: &str = "[DATE]";
pub const TOC_TITLE: &str = "Table of Contents";
pub const TOC_TITLE_STYLE: &str = "TOC Heading";
pub const TOC_INSTRUCTION: &str = r#"TOC \o "1-3" \h \z \u"#;

/// Point size for heading levels with a house rule.
pub fn heading_size(level: u8) -> Option<f32> {
    match level {
        1 => Some(28.0),
        2 => Some(20.0),
        3 => Some(14.0),
        _ => None,
    }
}

pub fn is_protected(font: Option<&str>) -> bool {
    font.is_some_and(|f| PROTECTED_FONTS.iter().any(|p| p.eq_ignore_ascii_case(f)))
}

pub(crate) fn same_size(actual: Option<f32>, expected: f32) -> bool {
    actual.is_some_and(|a| (a - expected).abs() < 0.01)
}
