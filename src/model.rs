use crate::xml::{Element, Node};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub(crate) fn from_jc(val: &str) -> Option<Alignment> {
        match val {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "both" | "distribute" => Some(Alignment::Justify),
            _ => None,
        }
    }

    pub(crate) fn jc(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "both",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LineSpacing {
    Multiple(f32), // w:lineRule="auto", line / 240
    Exact(f32),    // points
    AtLeast(f32),  // points
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleKind {
    Heading(u8),
    Toc,
    Body,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Style {
    pub id: Option<String>,
    pub name: String,
}

impl Style {
    pub fn normal() -> Self {
        Style {
            id: None,
            name: "Normal".to_string(),
        }
    }

    /// A style referenced by its UI name; the id follows Word's convention of
    /// dropping the spaces ("Heading 1" -> "Heading1").
    pub fn named(name: &str) -> Self {
        Style {
            id: Some(name.replace(' ', "")),
            name: name.to_string(),
        }
    }

    pub fn kind(&self) -> StyleKind {
        let lower = self.name.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("heading") {
            if let Ok(level) = rest.trim().parse::<u8>() {
                return StyleKind::Heading(level);
            }
        }
        if lower.starts_with("toc") {
            return StyleKind::Toc;
        }
        StyleKind::Body
    }
}

pub struct Document {
    pub body: Vec<Block>,
    pub properties: CoreProperties,
    pub sections: Vec<Section>,
    pub stories: Vec<Story>,
    pub(crate) root: Element, // w:document; the w:body child is rebuilt on save
}

#[derive(Clone, Debug)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    Raw(Node),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoreProperties {
    pub title: String,
    pub subject: String,
    pub keywords: String,
    pub category: String,
    pub comments: String,
    pub author: String,
    pub last_modified_by: String,
    pub(crate) xml: Option<Element>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Section {
    pub headers: Vec<String>, // part names, e.g. "word/header1.xml"
    pub footers: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoryKind {
    Header,
    Footer,
}

#[derive(Clone, Debug)]
pub struct Story {
    pub part: String,
    pub kind: StoryKind,
    pub blocks: Vec<Block>,
    pub(crate) root: Element, // w:hdr / w:ftr without children
}

#[derive(Clone, Debug)]
pub struct Paragraph {
    pub style: Style,
    pub alignment: Option<Alignment>,
    pub space_before: Option<f32>, // points
    pub space_after: Option<f32>,  // points
    pub line_spacing: Option<LineSpacing>,
    pub inlines: Vec<Inline>,
    pub(crate) tag: Element,
    pub(crate) ppr: Element,
}

#[derive(Clone, Debug)]
pub enum Inline {
    Run(Run),
    /// `w:hyperlink`, `w:ins`, `w:smartTag`, inline `w:sdt` and similar
    /// containers whose runs are part of the paragraph's text.
    Group(Group),
    Raw(Node),
}

#[derive(Clone, Debug)]
pub struct Group {
    pub inlines: Vec<Inline>,
    pub(crate) tag: Element,
}

/// Inline containers parsed into `Inline::Group`.
pub(crate) const INLINE_GROUPS: &[&str] = &[
    "w:hyperlink",
    "w:ins",
    "w:moveTo",
    "w:smartTag",
    "w:customXml",
    "w:fldSimple",
    "w:sdt",
    "w:sdtContent",
    "w:dir",
    "w:bdo",
];

#[derive(Clone, Debug)]
pub struct Run {
    pub font_name: Option<String>, // direct w:rFonts/@w:ascii; None = inherited
    pub font_size: Option<f32>,    // points
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub color: Option<[u8; 3]>,
    pub(crate) tag: Element,
    pub(crate) rpr: Element,
    pub(crate) content: Vec<Node>,
}

#[derive(Clone, Debug)]
pub struct Table {
    pub rows: Vec<Row>,
    pub(crate) tag: Element,
    pub(crate) layout: Layout,
}

#[derive(Clone, Debug)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub(crate) tag: Element,
    pub(crate) layout: Layout,
}

#[derive(Clone, Debug)]
pub struct Cell {
    pub blocks: Vec<Block>,
    pub(crate) tag: Element,
}

/// Original child order of a container whose parsed children are held in a
/// separate `Vec`: `None` marks the slot of the next parsed child, `Some` is
/// markup kept verbatim (`w:tblPr`, `w:trPr`, bookmarks).
#[derive(Clone, Debug, Default)]
pub(crate) struct Layout(pub(crate) Vec<Option<Node>>);

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let root = Element::new("w:document")
            .with_attr("xmlns:w", WML_NS)
            .with_attr("xmlns:r", REL_NS)
            .with_child(Element::new("w:body"));
        Document {
            body: Vec::new(),
            properties: CoreProperties::default(),
            sections: Vec::new(),
            stories: Vec::new(),
            root,
        }
    }

    pub fn with_block(mut self, block: impl Into<Block>) -> Self {
        self.body.push(block.into());
        self
    }

    /// Top-level body paragraphs in document order; the indices used by
    /// `Location::Paragraph`.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.body.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    pub fn paragraph_mut(&mut self, index: usize) -> Option<&mut Paragraph> {
        self.body
            .iter_mut()
            .filter_map(|b| match b {
                Block::Paragraph(p) => Some(p),
                _ => None,
            })
            .nth(index)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.body.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
    }

    /// Each top-level table paired with the text of the paragraph directly
    /// before it in the body, or "" when the previous block is not a
    /// paragraph.
    pub fn tables_with_context(&self) -> Vec<(&Table, String)> {
        self.body
            .iter()
            .enumerate()
            .filter_map(|(i, b)| match b {
                Block::Table(t) => Some((t, preceding_text(&self.body, i))),
                _ => None,
            })
            .collect()
    }

    pub fn table_mut(&mut self, index: usize) -> Option<&mut Table> {
        self.body
            .iter_mut()
            .filter_map(|b| match b {
                Block::Table(t) => Some(t),
                _ => None,
            })
            .nth(index)
    }

    pub fn story_mut(&mut self, part: &str) -> Option<&mut Story> {
        self.stories.iter_mut().find(|s| s.part == part)
    }
}

/// Every paragraph in `blocks`, including those inside table cells.
pub fn visit_paragraphs<'a>(blocks: &'a [Block], f: &mut dyn FnMut(&'a Paragraph)) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => f(p),
            Block::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| r.cells.iter()) {
                    visit_paragraphs(&cell.blocks, f);
                }
            }
            Block::Raw(_) => {}
        }
    }
}

pub fn visit_paragraphs_mut(blocks: &mut [Block], f: &mut dyn FnMut(&mut Paragraph)) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => f(p),
            Block::Table(t) => {
                for cell in t.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
                    visit_paragraphs_mut(&mut cell.blocks, f);
                }
            }
            Block::Raw(_) => {}
        }
    }
}

pub(crate) fn preceding_text(blocks: &[Block], index: usize) -> String {
    match index.checked_sub(1).map(|i| &blocks[i]) {
        Some(Block::Paragraph(p)) => p.text(),
        _ => String::new(),
    }
}

impl From<Paragraph> for Block {
    fn from(p: Paragraph) -> Self {
        Block::Paragraph(p)
    }
}

impl From<Table> for Block {
    fn from(t: Table) -> Self {
        Block::Table(t)
    }
}

impl Story {
    /// Text of every paragraph in the part, cells included, one per line.
    pub fn text(&self) -> String {
        let mut lines = Vec::new();
        visit_paragraphs(&self.blocks, &mut |p| lines.push(p.text()));
        lines.join("\n")
    }
}

impl Paragraph {
    pub fn new(style: &str) -> Self {
        let style = if style == "Normal" {
            Style::normal()
        } else {
            Style::named(style)
        };
        Paragraph {
            style,
            alignment: None,
            space_before: None,
            space_after: None,
            line_spacing: None,
            inlines: Vec::new(),
            tag: Element::new("w:p"),
            ppr: Element::new("w:pPr"),
        }
    }

    pub fn with_run(mut self, run: Run) -> Self {
        self.inlines.push(Inline::Run(run));
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    /// Every run in document order, including runs inside hyperlinks,
    /// tracked insertions and other inline groups.
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        let mut out = Vec::new();
        collect_runs(&self.inlines, &mut out);
        out.into_iter()
    }

    pub fn runs_mut(&mut self) -> impl Iterator<Item = &mut Run> {
        let mut out = Vec::new();
        collect_runs_mut(&mut self.inlines, &mut out);
        out.into_iter()
    }

    /// Text of the paragraph's runs.
    pub fn text(&self) -> String {
        self.runs().map(Run::text).collect()
    }

    pub fn has_text(&self) -> bool {
        !self.text().trim().is_empty()
    }

    /// Whether the paragraph holds a DrawingML or VML picture anywhere inside.
    pub fn has_image(&self) -> bool {
        fn any_picture(inlines: &[Inline]) -> bool {
            inlines.iter().any(|inline| match inline {
                Inline::Run(r) => r.has_image(),
                Inline::Group(g) => any_picture(&g.inlines),
                Inline::Raw(Node::Element(e)) => contains_picture(e),
                Inline::Raw(_) => false,
            })
        }
        any_picture(&self.inlines)
    }

    /// Field instructions (`w:instrText`, `w:fldSimple/@w:instr`) inside the
    /// paragraph.
    pub fn field_instructions(&self) -> Vec<String> {
        fn walk(inlines: &[Inline], out: &mut Vec<String>) {
            for inline in inlines {
                match inline {
                    Inline::Run(r) => {
                        for node in &r.content {
                            if let Node::Element(e) = node {
                                collect_instructions(e, out);
                            }
                        }
                    }
                    Inline::Group(g) => {
                        if let Some(instr) = g.tag.attr("w:instr") {
                            out.push(instr.to_string());
                        }
                        walk(&g.inlines, out);
                    }
                    Inline::Raw(Node::Element(e)) => collect_instructions(e, out),
                    Inline::Raw(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.inlines, &mut out);
        out
    }

    /// Replaces every occurrence of `from` in the paragraph's text, also
    /// when Word has split it over several runs. The replacement goes into
    /// the `w:t` where the match starts; the rest of the match is cut from
    /// the following ones. Returns the number of replacements.
    pub fn replace_text(&mut self, from: &str, to: &str) -> usize {
        if from.is_empty() {
            return 0;
        }
        let mut texts: Vec<&mut Element> = Vec::new();
        for run in self.runs_mut() {
            for node in &mut run.content {
                if let Node::Element(e) = node {
                    if e.is("w:t") {
                        texts.push(e);
                    }
                }
            }
        }

        let original: Vec<String> = texts.iter().map(|e| e.text()).collect();
        let joined = original.concat();
        let matches: Vec<usize> = joined.match_indices(from).map(|(i, _)| i).collect();
        if matches.is_empty() {
            return 0;
        }

        let mut starts = Vec::with_capacity(original.len());
        let mut offset = 0;
        for t in &original {
            starts.push(offset);
            offset += t.len();
        }

        // Right to left, so earlier offsets stay valid.
        let mut segments = original.clone();
        for &start in matches.iter().rev() {
            let end = start + from.len();
            let Some(first) = (0..original.len())
                .find(|&i| starts[i] <= start && start < starts[i] + original[i].len())
            else {
                continue;
            };
            for i in first..original.len() {
                if starts[i] >= end {
                    break;
                }
                let lo = start.saturating_sub(starts[i]);
                let hi = end.min(starts[i] + original[i].len()) - starts[i];
                let with = if i == first { to } else { "" };
                segments[i].replace_range(lo..hi, with);
            }
        }

        for ((el, new), old) in texts.into_iter().zip(&segments).zip(&original) {
            if new != old {
                el.children = vec![Node::Text(new.clone())];
                el.set_attr("xml:space", "preserve");
            }
        }
        matches.len()
    }
}

fn collect_runs<'a>(inlines: &'a [Inline], out: &mut Vec<&'a Run>) {
    for inline in inlines {
        match inline {
            Inline::Run(r) => out.push(r),
            Inline::Group(g) => collect_runs(&g.inlines, out),
            Inline::Raw(_) => {}
        }
    }
}

fn collect_runs_mut<'a>(inlines: &'a mut [Inline], out: &mut Vec<&'a mut Run>) {
    for inline in inlines {
        match inline {
            Inline::Run(r) => out.push(r),
            Inline::Group(g) => collect_runs_mut(&mut g.inlines, out),
            Inline::Raw(_) => {}
        }
    }
}

pub(crate) fn collect_instructions(el: &Element, out: &mut Vec<String>) {
    for d in el.descendants() {
        if d.is("w:instrText") {
            out.push(d.text());
        } else if d.is("w:fldSimple") {
            if let Some(instr) = d.attr("w:instr") {
                out.push(instr.to_string());
            }
        }
    }
}

fn contains_picture(el: &Element) -> bool {
    el.descendants().any(|d| d.is("w:drawing") || d.is("w:pict"))
}

fn content_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        let Node::Element(e) = node else { continue };
        match e.name.as_str() {
            "w:t" => out.push_str(&e.text()),
            "w:tab" => out.push('\t'),
            "w:br" | "w:cr" => out.push('\n'),
            _ => {}
        }
    }
    out
}

impl Run {
    pub fn new(text: &str) -> Self {
        let t = Element::new("w:t")
            .with_attr("xml:space", "preserve")
            .with_text(text);
        Run {
            font_name: None,
            font_size: None,
            bold: None,
            italic: None,
            color: None,
            tag: Element::new("w:r"),
            rpr: Element::new("w:rPr"),
            content: vec![Node::Element(t)],
        }
    }

    pub fn with_font(mut self, name: &str, size: f32) -> Self {
        self.font_name = Some(name.to_string());
        self.font_size = Some(size);
        self
    }

    pub fn text(&self) -> String {
        content_text(&self.content)
    }

    pub fn has_image(&self) -> bool {
        self.content.iter().any(|n| match n {
            Node::Element(e) => contains_picture(e),
            _ => false,
        })
    }
}

impl Table {
    /// Builds a table of single-paragraph cells, one inner slice per row.
    pub fn new(rows: &[&[&str]]) -> Self {
        Table {
            rows: rows
                .iter()
                .map(|cells| Row {
                    cells: cells.iter().map(|text| Cell::new(text)).collect(),
                    tag: Element::new("w:tr"),
                    layout: Layout::default(),
                })
                .collect(),
            tag: Element::new("w:tbl"),
            layout: Layout::default(),
        }
    }

    /// Lower-cased, trimmed text of every cell in the first row.
    pub fn header(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| {
                row.cells
                    .iter()
                    .map(|c| c.text().trim().to_lowercase())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Cell {
    pub fn new(text: &str) -> Self {
        let mut p = Paragraph::new("Normal");
        if !text.is_empty() {
            p = p.with_run(Run::new(text));
        }
        Cell {
            blocks: vec![Block::Paragraph(p)],
            tag: Element::new("w:tc"),
        }
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.blocks.iter_mut().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    /// Paragraph texts joined by newlines.
    pub fn text(&self) -> String {
        self.paragraphs()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
