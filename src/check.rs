//! The read-only check pass.

use std::fmt;

use crate::classify;
use crate::format::Scope;
use crate::house::{self, is_protected, same_size};
use crate::model::{
    Alignment, Block, CoreProperties, Document, LineSpacing, Paragraph, Run, StyleKind,
    collect_instructions,
};
use crate::xml::Node;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssueKind {
    BodyAlignment,
    BodyFont,
    HeadingFormat,
    /// Raised for every table; tables are always reformatted in full.
    TableReview,
    ImageAlignment,
    HeadingOneSpacing,
    DocumentProperties,
    TocMissing,
    TocFont,
    DatePlaceholder,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Document,
    /// Index among top-level body paragraphs.
    Paragraph(usize),
    /// Index among top-level tables.
    Table(usize),
    /// Header or footer part name.
    Story(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Issue {
    pub kind: IssueKind,
    pub location: Location,
    pub detail: String,
}

impl Issue {
    fn new(kind: IssueKind, location: Location, detail: impl Into<String>) -> Self {
        Issue {
            kind,
            location,
            detail: detail.into(),
        }
    }

    /// Everything except the table-review flag, which a fix never clears.
    pub fn is_nonconformity(&self) -> bool {
        self.kind != IssueKind::TableReview
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Document => f.write_str("document"),
            Location::Paragraph(i) => write!(f, "paragraph {}", i + 1),
            Location::Table(i) => write!(f, "table {}", i + 1),
            Location::Story(part) => f.write_str(part),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.detail)
    }
}

fn font_label(run: &Run) -> String {
    let name = run.font_name.as_deref().unwrap_or("inherited font");
    match run.font_size {
        Some(size) => format!("'{name}' {size}pt"),
        None => format!("'{name}'"),
    }
}

fn body_run_conforms(run: &Run) -> bool {
    is_protected(run.font_name.as_deref())
        || (run.font_name.as_deref() == Some(house::BODY_FONT)
            && same_size(run.font_size, house::BODY_SIZE))
}

fn heading_level(p: &Paragraph) -> Option<(u8, f32)> {
    match p.style.kind() {
        StyleKind::Heading(level) => house::heading_size(level).map(|size| (level, size)),
        _ => None,
    }
}

fn check_body_text(doc: &Document, issues: &mut Vec<Issue>) {
    for (i, p) in doc.paragraphs().enumerate() {
        if p.style.kind() != StyleKind::Body || !p.has_text() {
            continue;
        }
        if !p.has_image() && p.alignment != Some(Alignment::Justify) {
            issues.push(Issue::new(
                IssueKind::BodyAlignment,
                Location::Paragraph(i),
                "body text not justified",
            ));
        }
        if let Some(run) = p.runs().find(|r| !body_run_conforms(r)) {
            issues.push(Issue::new(
                IssueKind::BodyFont,
                Location::Paragraph(i),
                format!("body text in {}", font_label(run)),
            ));
        }
    }
}

fn check_headings(doc: &Document, issues: &mut Vec<Issue>) {
    for (i, p) in doc.paragraphs().enumerate() {
        let Some((level, size)) = heading_level(p) else {
            continue;
        };
        if p.alignment != Some(Alignment::Left) {
            issues.push(Issue::new(
                IssueKind::HeadingFormat,
                Location::Paragraph(i),
                format!("{} not left-aligned", p.style.name),
            ));
        }
        let wrong = p.runs().find(|r| {
            !is_protected(r.font_name.as_deref())
                && (r.font_name.as_deref() != Some(house::HEADING_FONT)
                    || !same_size(r.font_size, size))
        });
        if let Some(run) = wrong {
            issues.push(Issue::new(
                IssueKind::HeadingFormat,
                Location::Paragraph(i),
                format!(
                    "Heading {level} in {}, expected '{}' {size}pt",
                    font_label(run),
                    house::HEADING_FONT
                ),
            ));
        }
    }
}

fn check_tables(doc: &Document, issues: &mut Vec<Issue>) {
    for (i, (table, preceding)) in doc.tables_with_context().into_iter().enumerate() {
        let config = classify::classify(table, &preceding);
        issues.push(Issue::new(
            IssueKind::TableReview,
            Location::Table(i),
            format!("{} scheduled for formatting", config.table_type),
        ));
    }
}

fn check_images(doc: &Document, issues: &mut Vec<Issue>) {
    for (i, p) in doc.paragraphs().enumerate() {
        if heading_level(p).is_some() || !p.has_image() {
            continue;
        }
        if p.alignment != Some(Alignment::Center) {
            issues.push(Issue::new(
                IssueKind::ImageAlignment,
                Location::Paragraph(i),
                "image not centred",
            ));
        }
    }
}

fn spacing_conforms(p: &Paragraph) -> bool {
    let line_ok = matches!(
        p.line_spacing,
        Some(LineSpacing::Multiple(m)) if (m - house::H1_LINE_SPACING).abs() <= house::LINE_SPACING_TOLERANCE
    );
    same_size(p.space_before, house::H1_SPACE_BEFORE)
        && same_size(p.space_after, house::H1_SPACE_AFTER)
        && line_ok
}

fn check_heading_one_spacing(doc: &Document, issues: &mut Vec<Issue>) {
    let mut scope = Scope::default();
    for (i, p) in doc.paragraphs().enumerate() {
        let kind = p.style.kind();
        scope = scope.advance(kind);
        if scope != Scope::InH1Scope || kind != StyleKind::Body || !p.has_text() {
            continue;
        }
        if !spacing_conforms(p) {
            issues.push(Issue::new(
                IssueKind::HeadingOneSpacing,
                Location::Paragraph(i),
                "content under Heading 1 needs 6pt before/after and 1.33 line spacing",
            ));
        }
    }
}

fn check_properties(props: &CoreProperties, stem: &str, issues: &mut Vec<Issue>) {
    let fields = [
        ("title", &props.title),
        ("subject", &props.subject),
        ("keywords", &props.keywords),
        ("category", &props.category),
        ("comments", &props.comments),
    ];
    let mismatched: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.as_str() != stem)
        .map(|(name, _)| *name)
        .collect();
    if !mismatched.is_empty() {
        issues.push(Issue::new(
            IssueKind::DocumentProperties,
            Location::Document,
            format!("{} do not match '{stem}'", mismatched.join(", ")),
        ));
    }
}

fn is_toc_instruction(instr: &str) -> bool {
    instr.trim_start().to_ascii_uppercase().starts_with("TOC")
}

/// A TOC-styled paragraph or a TOC field anywhere in the body, including
/// inside content controls.
pub fn has_toc(doc: &Document) -> bool {
    doc.body.iter().any(|block| match block {
        Block::Paragraph(p) => {
            p.style.kind() == StyleKind::Toc
                || p.field_instructions().iter().any(|i| is_toc_instruction(i))
        }
        Block::Raw(Node::Element(e)) => {
            let mut instructions = Vec::new();
            collect_instructions(e, &mut instructions);
            instructions.iter().any(|i| is_toc_instruction(i))
                || e.descendants().any(|d| {
                    d.is("w:pStyle")
                        && d.attr("w:val")
                            .is_some_and(|v| v.to_ascii_uppercase().starts_with("TOC"))
                })
        }
        _ => false,
    })
}

fn check_toc(doc: &Document, issues: &mut Vec<Issue>) {
    if !has_toc(doc) {
        issues.push(Issue::new(
            IssueKind::TocMissing,
            Location::Document,
            "table of contents missing",
        ));
        return;
    }
    let wrong = doc
        .paragraphs()
        .filter(|p| p.style.kind() == StyleKind::Toc)
        .find_map(|p| {
            p.runs()
                .find(|r| {
                    !is_protected(r.font_name.as_deref())
                        && (r.font_name.as_deref() != Some(house::TOC_FONT)
                            || !same_size(r.font_size, house::TOC_SIZE))
                })
                .map(|r| (p, r))
        });
    if let Some((p, run)) = wrong {
        issues.push(Issue::new(
            IssueKind::TocFont,
            Location::Document,
            format!("{} entry in {}", p.style.name, font_label(run)),
        ));
    }
}

fn check_date_placeholders(doc: &Document, issues: &mut Vec<Issue>) {
    for story in &doc.stories {
        if story.text().contains(house::DATE_PLACEHOLDER) {
            issues.push(Issue::new(
                IssueKind::DatePlaceholder,
                Location::Story(story.part.clone()),
                format!("{} placeholder not filled in", house::DATE_PLACEHOLDER),
            ));
        }
    }
}

/// Scans the document without modifying it. `stem` is the file name without
/// extension, the value every checked document property must equal.
pub fn check(doc: &Document, stem: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    check_body_text(doc, &mut issues);
    check_headings(doc, &mut issues);
    check_tables(doc, &mut issues);
    check_images(doc, &mut issues);
    check_heading_one_spacing(doc, &mut issues);
    check_properties(&doc.properties, stem, &mut issues);
    check_toc(doc, &mut issues);
    check_date_placeholders(doc, &mut issues);
    log::info!(
        "check found {} issue(s), {} of them table reviews",
        issues.len(),
        issues.iter().filter(|i| !i.is_nonconformity()).count()
    );
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Group, Inline, Paragraph, Run, Table};
    use crate::xml::Element;

    fn kinds(issues: &[Issue]) -> Vec<IssueKind> {
        issues.iter().map(|i| i.kind).collect()
    }

    fn conforming_props(stem: &str) -> CoreProperties {
        let mut props = CoreProperties::default();
        crate::format::apply_properties(&mut props, stem);
        props
    }

    #[test]
    fn wingdings_runs_are_never_flagged() {
        let mut doc = Document::new()
            .with_block(Paragraph::new("TOC 1").with_run(Run::new("Intro").with_font("Calibri", 11.0)))
            .with_block(
                Paragraph::new("Normal")
                    .with_alignment(Alignment::Justify)
                    .with_run(Run::new("\u{f0a7}").with_font("Wingdings", 14.0)),
            );
        doc.properties = conforming_props("a");
        assert!(check(&doc, "a").is_empty());
    }

    #[test]
    fn inherited_body_font_is_flagged() {
        let doc = Document::new().with_block(
            Paragraph::new("Normal")
                .with_alignment(Alignment::Justify)
                .with_run(Run::new("text")),
        );
        let issues = check(&doc, "a");
        assert!(kinds(&issues).contains(&IssueKind::BodyFont));
        assert!(!kinds(&issues).contains(&IssueKind::BodyAlignment));
    }

    #[test]
    fn empty_paragraphs_are_ignored() {
        let mut doc = Document::new()
            .with_block(Paragraph::new("TOC 1"))
            .with_block(Paragraph::new("Normal"))
            .with_block(Paragraph::new("Normal").with_run(Run::new("   ")));
        doc.properties = conforming_props("a");
        assert!(check(&doc, "a").is_empty());
    }

    #[test]
    fn every_table_is_flagged_for_review() {
        let mut doc = Document::new()
            .with_block(Paragraph::new("TOC 1"))
            .with_block(Table::new(&[&["Claim Element", "Support"]]))
            .with_block(Table::new(&[]));
        doc.properties = conforming_props("a");
        let issues = check(&doc, "a");
        assert_eq!(kinds(&issues), [IssueKind::TableReview, IssueKind::TableReview]);
        assert_eq!(issues[0].location, Location::Table(0));
        assert!(issues[0].detail.starts_with("Claim Chart"));
        assert!(issues.iter().all(|i| !i.is_nonconformity()));
    }

    #[test]
    fn h1_scope_ends_at_next_heading() {
        let mut doc = Document::new()
            .with_block(Paragraph::new("TOC 1"))
            .with_block(Paragraph::new("Normal").with_run(Run::new("before any heading")))
            .with_block(Paragraph::new("Heading 1"))
            .with_block(Paragraph::new("Normal").with_run(Run::new("in scope")))
            .with_block(Paragraph::new("Heading 2"))
            .with_block(Paragraph::new("Normal").with_run(Run::new("out of scope")));
        doc.properties = conforming_props("a");
        let spacing: Vec<Location> = check(&doc, "a")
            .into_iter()
            .filter(|i| i.kind == IssueKind::HeadingOneSpacing)
            .map(|i| i.location)
            .collect();
        assert_eq!(spacing, [Location::Paragraph(3)]);
    }

    #[test]
    fn properties_must_all_match_the_stem() {
        let mut props = conforming_props("Report_2024");
        assert!(check(&Document { properties: props.clone(), ..Document::new() }, "Report_2024")
            .iter()
            .all(|i| i.kind != IssueKind::DocumentProperties));
        props.category = "Formatted Reports".into();
        let issues = check(&Document { properties: props, ..Document::new() }, "Report_2024");
        let issue = issues
            .iter()
            .find(|i| i.kind == IssueKind::DocumentProperties)
            .unwrap();
        assert_eq!(issue.location, Location::Document);
        assert!(issue.detail.starts_with("category"));
    }

    #[test]
    fn toc_field_inside_content_control_counts() {
        let sdt = crate::xml::parse(
            r#"<w:sdt xmlns:w="urn:w"><w:sdtContent><w:p><w:r><w:instrText xml:space="preserve"> TOC \o "1-3" </w:instrText></w:r></w:p></w:sdtContent></w:sdt>"#,
        )
        .unwrap();
        let doc = Document::new().with_block(Block::Raw(Node::Element(sdt)));
        assert!(has_toc(&doc));
        assert!(!has_toc(&Document::new()));
    }

    #[test]
    fn protected_runs_in_headings_and_toc_are_not_flagged() {
        let mut doc = Document::new()
            .with_block(
                Paragraph::new("TOC 1")
                    .with_run(Run::new("\u{F0E0}").with_font("Symbol", 9.0))
                    .with_run(Run::new("Intro").with_font("Calibri", 11.0)),
            )
            .with_block(
                Paragraph::new("Heading 1")
                    .with_alignment(Alignment::Left)
                    .with_run(Run::new("\u{F0FC}").with_font("Wingdings", 14.0))
                    .with_run(Run::new("Findings").with_font("Cambria", 28.0)),
            );
        doc.properties = conforming_props("a");
        assert!(check(&doc, "a").is_empty());
    }

    #[test]
    fn hyperlink_runs_are_checked_and_fixed() {
        let link = Group {
            inlines: vec![Inline::Run(Run::new("see the annex").with_font("Arial", 12.0))],
            tag: Element::new("w:hyperlink"),
        };
        let mut para = Paragraph::new("Normal").with_alignment(Alignment::Justify);
        para.inlines.push(Inline::Group(link));
        let mut doc = Document::new()
            .with_block(Paragraph::new("TOC 1"))
            .with_block(para);
        doc.properties = conforming_props("a");

        let issues = check(&doc, "a");
        assert_eq!(kinds(&issues), [IssueKind::BodyFont]);
        assert_eq!(issues[0].location, Location::Paragraph(1));

        crate::fix::apply(&mut doc, &issues, "a", "");
        assert!(check(&doc, "a").is_empty());
        let p = doc.paragraphs().nth(1).unwrap();
        assert!(matches!(p.inlines[0], Inline::Group(_)));
        assert_eq!(p.runs().next().unwrap().font_name.as_deref(), Some("Segoe UI"));
    }
}
