//! Model back to WordprocessingML.
//!
//! Every paragraph and run still carries the `w:pPr`/`w:rPr` it was parsed
//! from. A property is only written when the model value differs from what
//! that element already says, so untouched formatting survives as it was.

use crate::docx::{paragraph_properties, run_properties};
use crate::model::{
    Block, Cell, CoreProperties, Document, Inline, LineSpacing, Paragraph, Row, Run, Story, Table,
};
use crate::xml::{Element, Node};

const PPR_ORDER: &[&str] = &[
    "w:pStyle", "w:keepNext", "w:keepLines", "w:pageBreakBefore", "w:framePr",
    "w:widowControl", "w:numPr", "w:suppressLineNumbers", "w:pBdr", "w:shd", "w:tabs",
    "w:suppressAutoHyphens", "w:kinsoku", "w:wordWrap", "w:overflowPunct", "w:topLinePunct",
    "w:autoSpaceDE", "w:autoSpaceDN", "w:bidi", "w:adjustRightInd", "w:snapToGrid",
    "w:spacing", "w:ind", "w:contextualSpacing", "w:mirrorIndents", "w:suppressOverlap",
    "w:jc", "w:textDirection", "w:textAlignment", "w:textboxTightWrap", "w:outlineLvl",
    "w:divId", "w:cnfStyle", "w:rPr", "w:sectPr", "w:pPrChange",
];

const RPR_ORDER: &[&str] = &[
    "w:rStyle", "w:rFonts", "w:b", "w:bCs", "w:i", "w:iCs", "w:caps", "w:smallCaps",
    "w:strike", "w:dstrike", "w:outline", "w:shadow", "w:emboss", "w:imprint", "w:noProof",
    "w:snapToGrid", "w:vanish", "w:webHidden", "w:color", "w:spacing", "w:w", "w:kern",
    "w:position", "w:sz", "w:szCs", "w:highlight", "w:u", "w:effect", "w:bdr", "w:shd",
    "w:fitText", "w:vertAlign", "w:rtl", "w:cs", "w:em", "w:lang", "w:eastAsianLayout",
    "w:specVanish", "w:oMath", "w:rPrChange",
];

const FONT_SLOTS: &[&str] = &["w:ascii", "w:hAnsi", "w:cs", "w:eastAsia"];
const THEME_FONT_SLOTS: &[&str] = &["w:asciiTheme", "w:hAnsiTheme", "w:cstheme", "w:eastAsiaTheme"];

fn pts_to_twips(pts: f32) -> String {
    format!("{}", (pts * 20.0).round() as i64)
}

pub(crate) fn document_xml(doc: &Document) -> String {
    let mut root = doc.root.clone();
    if let Some(body) = root.child_mut("w:body") {
        body.children = blocks_to_nodes(&doc.body);
    }
    root.to_xml()
}

pub(crate) fn story_xml(story: &Story) -> String {
    let mut root = story.root.clone();
    root.children = blocks_to_nodes(&story.blocks);
    root.to_xml()
}

fn blocks_to_nodes(blocks: &[Block]) -> Vec<Node> {
    blocks
        .iter()
        .map(|b| match b {
            Block::Paragraph(p) => Node::Element(paragraph_element(p)),
            Block::Table(t) => Node::Element(table_element(t)),
            Block::Raw(node) => node.clone(),
        })
        .collect()
}

fn paragraph_element(p: &Paragraph) -> Element {
    let mut el = p.tag.clone();
    let ppr = sync_ppr(p);
    if !ppr.children.is_empty() || !ppr.attrs.is_empty() {
        el.children.push(Node::Element(ppr));
    }
    el.children.extend(inline_nodes(&p.inlines));
    el
}

fn inline_nodes(inlines: &[Inline]) -> Vec<Node> {
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::Run(r) => Node::Element(run_element(r)),
            Inline::Group(g) => {
                let mut el = g.tag.clone();
                el.children = inline_nodes(&g.inlines);
                Node::Element(el)
            }
            Inline::Raw(node) => node.clone(),
        })
        .collect()
}

fn sync_ppr(p: &Paragraph) -> Element {
    let mut ppr = p.ppr.clone();

    if ppr.val("w:pStyle") != p.style.id.as_deref() {
        match &p.style.id {
            Some(id) => ppr.ensure_child("w:pStyle", PPR_ORDER).set_attr("w:val", id),
            None => ppr.remove_children("w:pStyle"),
        }
    }

    let current = paragraph_properties(&ppr);

    if current.alignment != p.alignment {
        match p.alignment {
            Some(a) => ppr.ensure_child("w:jc", PPR_ORDER).set_attr("w:val", a.jc()),
            None => ppr.remove_children("w:jc"),
        }
    }

    let spacing_changed = current.space_before != p.space_before
        || current.space_after != p.space_after
        || current.line_spacing != p.line_spacing;
    if spacing_changed {
        let spacing = ppr.ensure_child("w:spacing", PPR_ORDER);
        if current.space_before != p.space_before {
            spacing.remove_attr("w:beforeAutospacing");
            match p.space_before {
                Some(pts) => spacing.set_attr("w:before", &pts_to_twips(pts)),
                None => spacing.remove_attr("w:before"),
            }
        }
        if current.space_after != p.space_after {
            spacing.remove_attr("w:afterAutospacing");
            match p.space_after {
                Some(pts) => spacing.set_attr("w:after", &pts_to_twips(pts)),
                None => spacing.remove_attr("w:after"),
            }
        }
        if current.line_spacing != p.line_spacing {
            match p.line_spacing {
                Some(LineSpacing::Multiple(m)) => {
                    spacing.set_attr("w:line", &format!("{}", (m * 240.0).round() as i64));
                    spacing.set_attr("w:lineRule", "auto");
                }
                Some(LineSpacing::Exact(pts)) => {
                    spacing.set_attr("w:line", &pts_to_twips(pts));
                    spacing.set_attr("w:lineRule", "exact");
                }
                Some(LineSpacing::AtLeast(pts)) => {
                    spacing.set_attr("w:line", &pts_to_twips(pts));
                    spacing.set_attr("w:lineRule", "atLeast");
                }
                None => {
                    spacing.remove_attr("w:line");
                    spacing.remove_attr("w:lineRule");
                }
            }
        }
        if spacing.attrs.is_empty() {
            ppr.remove_children("w:spacing");
        }
    }

    ppr
}

fn run_element(r: &Run) -> Element {
    let mut el = r.tag.clone();
    let rpr = sync_rpr(r);
    if !rpr.children.is_empty() || !rpr.attrs.is_empty() {
        el.children.push(Node::Element(rpr));
    }
    el.children.extend(r.content.iter().cloned());
    el
}

fn set_toggle(rpr: &mut Element, name: &str, value: Option<bool>) {
    match value {
        Some(true) => rpr.ensure_child(name, RPR_ORDER).remove_attr("w:val"),
        Some(false) => rpr.ensure_child(name, RPR_ORDER).set_attr("w:val", "0"),
        None => rpr.remove_children(name),
    }
}

fn sync_rpr(r: &Run) -> Element {
    let mut rpr = r.rpr.clone();
    let (font_name, font_size, bold, italic, color) = run_properties(&rpr);

    if font_name != r.font_name {
        match &r.font_name {
            Some(name) => {
                let fonts = rpr.ensure_child("w:rFonts", RPR_ORDER);
                for slot in FONT_SLOTS {
                    fonts.set_attr(slot, name);
                }
                // Theme attributes take precedence over explicit names.
                for slot in THEME_FONT_SLOTS {
                    fonts.remove_attr(slot);
                }
            }
            None => rpr.remove_children("w:rFonts"),
        }
    }

    if font_size != r.font_size {
        match r.font_size {
            Some(pts) => {
                let half_points = format!("{}", (pts * 2.0).round() as i64);
                rpr.ensure_child("w:sz", RPR_ORDER).set_attr("w:val", &half_points);
                rpr.ensure_child("w:szCs", RPR_ORDER).set_attr("w:val", &half_points);
            }
            None => {
                rpr.remove_children("w:sz");
                rpr.remove_children("w:szCs");
            }
        }
    }

    if bold != r.bold {
        set_toggle(&mut rpr, "w:b", r.bold);
    }
    if italic != r.italic {
        set_toggle(&mut rpr, "w:i", r.italic);
    }

    if color != r.color {
        match r.color {
            Some([red, green, blue]) => {
                let el = rpr.ensure_child("w:color", RPR_ORDER);
                el.set_attr("w:val", &format!("{red:02X}{green:02X}{blue:02X}"));
                el.remove_attr("w:themeColor");
                el.remove_attr("w:themeShade");
                el.remove_attr("w:themeTint");
            }
            None => rpr.remove_children("w:color"),
        }
    }

    rpr
}

/// Re-interleaves parsed children with the verbatim markup around them;
/// children added after parsing go at the end.
fn interleave<T>(layout: &[Option<Node>], items: &[T], render: impl Fn(&T) -> Element) -> Vec<Node> {
    let mut out = Vec::with_capacity(layout.len().max(items.len()));
    let mut next = items.iter();
    for slot in layout {
        match slot {
            Some(node) => out.push(node.clone()),
            None => {
                if let Some(item) = next.next() {
                    out.push(Node::Element(render(item)));
                }
            }
        }
    }
    out.extend(next.map(|item| Node::Element(render(item))));
    out
}

fn table_element(t: &Table) -> Element {
    let mut el = t.tag.clone();
    el.children = interleave(&t.layout.0, &t.rows, row_element);
    el
}

fn row_element(r: &Row) -> Element {
    let mut el = r.tag.clone();
    el.children = interleave(&r.layout.0, &r.cells, cell_element);
    el
}

fn cell_element(c: &Cell) -> Element {
    let mut el = c.tag.clone();
    el.children = blocks_to_nodes(&c.blocks);
    // A cell must end in a paragraph for Word to open the file.
    if !matches!(c.blocks.last(), Some(Block::Paragraph(_))) {
        el.children.push(Node::Element(Element::new("w:p")));
    }
    el
}

fn new_core_root() -> Element {
    Element::new("cp:coreProperties")
        .with_attr(
            "xmlns:cp",
            "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
        )
        .with_attr("xmlns:dc", "http://purl.org/dc/elements/1.1/")
        .with_attr("xmlns:dcterms", "http://purl.org/dc/terms/")
        .with_attr("xmlns:dcmitype", "http://purl.org/dc/dcmitype/")
        .with_attr("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance")
}

fn set_core_field(root: &mut Element, qualified: &str, value: &str) {
    let local = qualified.split_once(':').map_or(qualified, |(_, l)| l);
    let existing = root.children.iter_mut().find_map(|n| match n {
        Node::Element(e) if e.local_name() == local => Some(e),
        _ => None,
    });
    match existing {
        Some(el) => {
            el.children = if value.is_empty() {
                Vec::new()
            } else {
                vec![Node::Text(value.to_string())]
            };
        }
        None if !value.is_empty() => {
            root.children
                .push(Node::Element(Element::new(qualified).with_text(value)));
        }
        None => {}
    }
}

pub(crate) fn core_xml(props: &CoreProperties) -> String {
    let mut root = props.xml.clone().unwrap_or_else(new_core_root);
    set_core_field(&mut root, "dc:title", &props.title);
    set_core_field(&mut root, "dc:subject", &props.subject);
    set_core_field(&mut root, "dc:creator", &props.author);
    set_core_field(&mut root, "cp:keywords", &props.keywords);
    set_core_field(&mut root, "dc:description", &props.comments);
    set_core_field(&mut root, "cp:lastModifiedBy", &props.last_modified_by);
    set_core_field(&mut root, "cp:category", &props.category);
    root.to_xml()
}
