//! Applies the fixers for a list of issues from `check::check`.

use crate::check::{Issue, IssueKind, Location};
use crate::classify::TableConfig;
use crate::format;
use crate::model::{Alignment, Block, Document, Paragraph, StyleKind};

fn paragraph<'a>(doc: &'a mut Document, issue: &Issue) -> Option<&'a mut Paragraph> {
    let Location::Paragraph(i) = issue.location else {
        return None;
    };
    let p = doc.paragraph_mut(i);
    if p.is_none() {
        log::warn!("skipping {:?}: no paragraph {}", issue.kind, i + 1);
    }
    p
}

fn fix_table(doc: &mut Document, configs: &[TableConfig], index: usize) -> bool {
    match (doc.table_mut(index), configs.get(index)) {
        (Some(table), Some(config)) => {
            format::format_table(table, config);
            true
        }
        _ => {
            log::warn!("skipping table review: no table {}", index + 1);
            false
        }
    }
}

fn fix_located(doc: &mut Document, configs: &[TableConfig], issue: &Issue, date: &str) -> bool {
    match issue.kind {
        IssueKind::BodyAlignment => paragraph(doc, issue).map(format::align_body).is_some(),
        IssueKind::BodyFont => paragraph(doc, issue)
            .map(format::format_body_fonts)
            .is_some(),
        IssueKind::ImageAlignment => paragraph(doc, issue)
            .map(|p| p.alignment = Some(Alignment::Center))
            .is_some(),
        IssueKind::HeadingOneSpacing => paragraph(doc, issue)
            .map(format::apply_h1_spacing)
            .is_some(),
        IssueKind::HeadingFormat => match paragraph(doc, issue) {
            Some(p) => match p.style.kind() {
                StyleKind::Heading(level) => {
                    format::format_heading(p, level);
                    true
                }
                _ => false,
            },
            None => false,
        },
        IssueKind::TableReview => match issue.location {
            Location::Table(i) => fix_table(doc, configs, i),
            _ => false,
        },
        IssueKind::DatePlaceholder => {
            let Location::Story(part) = &issue.location else {
                return false;
            };
            match doc.story_mut(part) {
                Some(story) => format::replace_date_placeholders(&mut story.blocks, date) > 0,
                None => {
                    log::warn!("skipping date placeholder: no part {part}");
                    false
                }
            }
        }
        IssueKind::DocumentProperties | IssueKind::TocFont | IssueKind::TocMissing => false,
    }
}

fn fix_toc_fonts(doc: &mut Document) {
    for block in &mut doc.body {
        if let Block::Paragraph(p) = block {
            if p.style.kind() == StyleKind::Toc {
                format::format_toc_paragraph(p);
            }
        }
    }
}

/// Applies one fixer per issue and returns how many changed something.
///
/// Tables are classified once up front, before any paragraph is touched.
/// Located issues go first. Document-level issues follow, each kind at most
/// once, with TOC insertion last since it shifts every paragraph index.
/// `stem` is the value written to the document properties and `date` the
/// text that replaces `[DATE]` placeholders.
pub fn apply(doc: &mut Document, issues: &[Issue], stem: &str, date: &str) -> usize {
    let configs = format::classify_tables(doc);
    let mut applied = 0;
    for issue in issues.iter().filter(|i| i.location != Location::Document) {
        if fix_located(doc, &configs, issue, date) {
            applied += 1;
        } else {
            log::debug!("nothing applied for {issue}");
        }
    }

    let has = |kind: IssueKind| issues.iter().any(|i| i.kind == kind);
    if has(IssueKind::DocumentProperties) {
        format::apply_properties(&mut doc.properties, stem);
        applied += 1;
    }
    if has(IssueKind::TocFont) {
        fix_toc_fonts(doc);
        applied += 1;
    }
    if has(IssueKind::TocMissing) {
        format::insert_toc(doc);
        applied += 1;
    }
    log::info!("applied {applied} of {} fix(es)", issues.len());
    applied
}
