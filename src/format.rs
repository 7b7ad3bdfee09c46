//! In-place formatters. Each one writes the house style (see `house`) and is
//! idempotent: applying it twice leaves the same document as applying it once.

use crate::classify::{self, SpecialRule, TableConfig};
use crate::house::{self, is_protected};
use crate::model::{
    Alignment, Block, CoreProperties, Document, LineSpacing, Paragraph, Run, StyleKind, Table,
    visit_paragraphs_mut,
};
use crate::xml::{Element, Node};

/// Where a paragraph sits relative to the last Heading 1 to 3 seen while
/// walking the body in order. Body paragraphs between a Heading 1 and the
/// next Heading 1 to 3 get the extra Heading-1 spacing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scope {
    #[default]
    NotInH1Scope,
    InH1Scope,
}

impl Scope {
    /// State after visiting a paragraph of `kind`.
    pub fn advance(self, kind: StyleKind) -> Scope {
        match kind {
            StyleKind::Heading(1) => Scope::InH1Scope,
            StyleKind::Heading(2 | 3) => Scope::NotInH1Scope,
            _ => self,
        }
    }
}

fn set_font(run: &mut Run, name: &str, size: f32) {
    run.font_name = Some(name.to_string());
    run.font_size = Some(size);
}

/// Cambria at the level's size, bold, black, left-aligned. Levels without a
/// house size are left alone, as are runs in a protected font.
pub fn format_heading(p: &mut Paragraph, level: u8) {
    let Some(size) = house::heading_size(level) else {
        return;
    };
    p.alignment = Some(Alignment::Left);
    for run in p.runs_mut() {
        if is_protected(run.font_name.as_deref()) {
            continue;
        }
        set_font(run, house::HEADING_FONT, size);
        run.bold = Some(true);
        run.color = Some(house::HEADING_COLOR);
    }
}

/// Justified, or centred when the paragraph holds a picture.
pub fn align_body(p: &mut Paragraph) {
    p.alignment = Some(if p.has_image() {
        Alignment::Center
    } else {
        Alignment::Justify
    });
}

/// Segoe UI 10pt for every run not in a protected font.
pub fn format_body_fonts(p: &mut Paragraph) {
    for run in p.runs_mut() {
        if !is_protected(run.font_name.as_deref()) {
            set_font(run, house::BODY_FONT, house::BODY_SIZE);
        }
    }
}

pub fn apply_h1_spacing(p: &mut Paragraph) {
    p.space_before = Some(house::H1_SPACE_BEFORE);
    p.space_after = Some(house::H1_SPACE_AFTER);
    p.line_spacing = Some(LineSpacing::Multiple(house::H1_LINE_SPACING));
}

pub fn format_toc_paragraph(p: &mut Paragraph) {
    for run in p.runs_mut() {
        if !is_protected(run.font_name.as_deref()) {
            set_font(run, house::TOC_FONT, house::TOC_SIZE);
        }
    }
}

/// Applies the rule for the paragraph's style kind. `scope` is the state
/// after visiting this paragraph.
pub fn format_paragraph(p: &mut Paragraph, scope: Scope) {
    match p.style.kind() {
        StyleKind::Heading(level) if house::heading_size(level).is_some() => {
            format_heading(p, level);
        }
        StyleKind::Heading(_) => {}
        StyleKind::Toc => format_toc_paragraph(p),
        StyleKind::Body => {
            align_body(p);
            format_body_fonts(p);
            if scope == Scope::InH1Scope && p.has_text() {
                apply_h1_spacing(p);
            }
        }
    }
}

/// Alignment of a cell's paragraphs, pictures aside.
pub fn cell_alignment(config: &TableConfig, row: usize, col: usize, cell_text: &str) -> Alignment {
    if row == 0 {
        return config.header_align;
    }
    match config.special {
        SpecialRule::None => config.body_align,
        SpecialRule::Legend if col == 0 => Alignment::Center,
        SpecialRule::Legend => Alignment::Justify,
        SpecialRule::ClaimChart
            if col == 0 || house::CLAIM_CHART_SYMBOLS.contains(&cell_text.trim()) =>
        {
            Alignment::Center
        }
        SpecialRule::ClaimChart => Alignment::Justify,
    }
}

pub fn format_table(table: &mut Table, config: &TableConfig) {
    for (r, row) in table.rows.iter_mut().enumerate() {
        for (c, cell) in row.cells.iter_mut().enumerate() {
            let align = cell_alignment(config, r, c, &cell.text());
            for p in cell.paragraphs_mut() {
                p.alignment = Some(if p.has_image() { Alignment::Center } else { align });
                format_body_fonts(p);
            }
        }
    }
}

/// Config of every top-level table, in order. Taken before anything is
/// formatted so each table sees its original preceding paragraph.
pub fn classify_tables(doc: &Document) -> Vec<TableConfig> {
    doc.tables_with_context()
        .into_iter()
        .map(|(t, preceding)| classify::classify(t, &preceding))
        .collect()
}

/// Title, subject, keywords, category, comments, author and last-modified-by
/// all set to the file stem.
pub fn apply_properties(props: &mut CoreProperties, stem: &str) {
    for field in [
        &mut props.title,
        &mut props.subject,
        &mut props.keywords,
        &mut props.category,
        &mut props.comments,
        &mut props.author,
        &mut props.last_modified_by,
    ] {
        *field = stem.to_string();
    }
}

fn toc_field_run() -> Run {
    let mut run = Run::new("");
    run.content = vec![
        Node::Element(
            Element::new("w:fldChar")
                .with_attr("w:fldCharType", "begin")
                .with_attr("w:dirty", "true"),
        ),
        Node::Element(
            Element::new("w:instrText")
                .with_attr("xml:space", "preserve")
                .with_text(house::TOC_INSTRUCTION),
        ),
        Node::Element(Element::new("w:fldChar").with_attr("w:fldCharType", "separate")),
        Node::Element(Element::new("w:fldChar").with_attr("w:fldCharType", "end")),
    ];
    run
}

/// Puts a "Table of Contents" title and a TOC field at the top of the body.
/// The field is marked dirty so Word rebuilds the entries on open.
pub fn insert_toc(doc: &mut Document) {
    let title = Paragraph::new(house::TOC_TITLE_STYLE)
        .with_run(Run::new(house::TOC_TITLE).with_font(house::TOC_FONT, house::TOC_SIZE));
    let field = Paragraph::new("Normal").with_run(toc_field_run());
    doc.body.insert(0, Block::Paragraph(field));
    doc.body.insert(0, Block::Paragraph(title));
}

/// Replaces `[DATE]` in one header/footer part, including placeholders
/// split over several runs. Returns how many were replaced.
pub fn replace_date_placeholders(blocks: &mut [Block], date: &str) -> usize {
    let mut count = 0;
    visit_paragraphs_mut(blocks, &mut |p| {
        count += p.replace_text(house::DATE_PLACEHOLDER, date);
    });
    count
}
