use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::Error;
use crate::model::{
    Alignment, Block, Cell, CoreProperties, Document, Group, INLINE_GROUPS, Inline, Layout,
    LineSpacing, Paragraph, Row, Run, Section, Story, StoryKind, Style, Table,
};
use crate::write;
use crate::xml::{self, Element, Node};

pub(crate) const DOCUMENT_PART: &str = "word/document.xml";
pub(crate) const STYLES_PART: &str = "word/styles.xml";
pub(crate) const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
pub(crate) const CORE_PART: &str = "docProps/core.xml";
pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub(crate) const PACKAGE_RELS_PART: &str = "_rels/.rels";

const REL_TYPE_HEADER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const REL_TYPE_FOOTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
pub(crate) const REL_TYPE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const REL_TYPE_CORE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
pub(crate) const CT_DOCUMENT: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
pub(crate) const CT_CORE: &str = "application/vnd.openxmlformats-package.core-properties+xml";
pub(crate) const CT_RELS: &str = "application/vnd.openxmlformats-package.relationships+xml";
pub(crate) const CONTENT_TYPES_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";
pub(crate) const PACKAGE_RELS_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

/// A DOCX package: the parsed document plus every ZIP entry, in archive
/// order, so parts the engine never touches are written back unchanged.
pub struct Package {
    pub document: Document,
    entries: Vec<(String, Vec<u8>)>,
}

fn twips_to_pts(twips: f32) -> f32 {
    twips / 20.0
}

fn parse_hex_color(val: &str) -> Option<[u8; 3]> {
    if val == "auto" || val.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&val[0..2], 16).ok()?;
    let g = u8::from_str_radix(&val[2..4], 16).ok()?;
    let b = u8::from_str_radix(&val[4..6], 16).ok()?;
    Some([r, g, b])
}

fn twips_attr(node: &Element, attr: &str) -> Option<f32> {
    node.attr(attr)
        .and_then(|v| v.parse::<f32>().ok())
        .map(twips_to_pts)
}

/// On/off property: present without `w:val`, or with a truthy one.
pub(crate) fn parse_toggle(node: Option<&Element>) -> Option<bool> {
    let node = node?;
    Some(!matches!(
        node.attr("w:val"),
        Some("0" | "false" | "off" | "none")
    ))
}

/// Empty copy of an element: name and attributes, no children.
fn shell(el: &Element) -> Element {
    Element {
        name: el.name.clone(),
        attrs: el.attrs.clone(),
        children: Vec::new(),
    }
}

/// Word shows built-in styles under capitalised names.
fn ui_style_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if lower == "normal" {
        return "Normal".to_string();
    }
    if let Some(rest) = lower.strip_prefix("heading ") {
        return format!("Heading {rest}");
    }
    if let Some(rest) = lower.strip_prefix("toc ") {
        return format!("TOC {rest}");
    }
    name.to_string()
}

struct StylesInfo {
    names: HashMap<String, String>,
    default_paragraph: Option<String>,
}

impl StylesInfo {
    fn resolve(&self, style_id: Option<&str>) -> Style {
        match style_id {
            Some(id) => Style {
                id: Some(id.to_string()),
                name: self
                    .names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| ui_style_name(id)),
            },
            None => Style {
                id: None,
                name: self
                    .default_paragraph
                    .clone()
                    .unwrap_or_else(|| "Normal".to_string()),
            },
        }
    }
}

fn parse_styles(xml_content: Option<&str>) -> StylesInfo {
    let mut info = StylesInfo {
        names: HashMap::new(),
        default_paragraph: None,
    };
    let Some(root) = xml_content.and_then(|s| xml::parse(s).ok()) else {
        return info;
    };

    for style in root.elements().filter(|e| e.is("w:style")) {
        if style.attr("w:type") != Some("paragraph") {
            continue;
        }
        let Some(style_id) = style.attr("w:styleId") else {
            continue;
        };
        let name = style
            .val("w:name")
            .map(ui_style_name)
            .unwrap_or_else(|| ui_style_name(style_id));
        if matches!(style.attr("w:default"), Some("1" | "true")) {
            info.default_paragraph = Some(name.clone());
        }
        info.names.insert(style_id.to_string(), name);
    }
    info
}

fn parse_run(el: &Element) -> Run {
    let rpr = el
        .child("w:rPr")
        .cloned()
        .unwrap_or_else(|| Element::new("w:rPr"));
    let content = el
        .children
        .iter()
        .filter(|n| !matches!(n, Node::Element(e) if e.is("w:rPr")))
        .cloned()
        .collect();
    let (font_name, font_size, bold, italic, color) = run_properties(&rpr);
    Run {
        font_name,
        font_size,
        bold,
        italic,
        color,
        tag: shell(el),
        rpr,
        content,
    }
}

type RunProperties = (
    Option<String>,
    Option<f32>,
    Option<bool>,
    Option<bool>,
    Option<[u8; 3]>,
);

/// Direct formatting as `w:rPr` states it. The writer compares against this
/// so only changed properties are touched.
pub(crate) fn run_properties(rpr: &Element) -> RunProperties {
    let font_name = rpr
        .child("w:rFonts")
        .and_then(|f| f.attr("w:ascii"))
        .map(str::to_string);
    let font_size = rpr
        .val("w:sz")
        .and_then(|v| v.parse::<f32>().ok())
        .map(|hp| hp / 2.0);
    let bold = parse_toggle(rpr.child("w:b"));
    let italic = parse_toggle(rpr.child("w:i"));
    let color = rpr.val("w:color").and_then(parse_hex_color);
    (font_name, font_size, bold, italic, color)
}

pub(crate) struct ParagraphProperties {
    pub(crate) alignment: Option<Alignment>,
    pub(crate) space_before: Option<f32>,
    pub(crate) space_after: Option<f32>,
    pub(crate) line_spacing: Option<LineSpacing>,
}

pub(crate) fn paragraph_properties(ppr: &Element) -> ParagraphProperties {
    let spacing = ppr.child("w:spacing");
    let line_spacing = spacing.and_then(|s| {
        let line = s.attr("w:line")?.parse::<f32>().ok()?;
        Some(match s.attr("w:lineRule") {
            Some("exact") => LineSpacing::Exact(twips_to_pts(line)),
            Some("atLeast") => LineSpacing::AtLeast(twips_to_pts(line)),
            _ => LineSpacing::Multiple(line / 240.0),
        })
    });
    ParagraphProperties {
        alignment: ppr.val("w:jc").and_then(Alignment::from_jc),
        space_before: spacing.and_then(|s| twips_attr(s, "w:before")),
        space_after: spacing.and_then(|s| twips_attr(s, "w:after")),
        line_spacing,
    }
}

fn parse_paragraph(el: &Element, styles: &StylesInfo) -> Paragraph {
    let ppr = el
        .child("w:pPr")
        .cloned()
        .unwrap_or_else(|| Element::new("w:pPr"));
    let style = styles.resolve(ppr.val("w:pStyle"));
    let props = paragraph_properties(&ppr);

    let inlines = parse_inlines(&el.children);

    Paragraph {
        style,
        alignment: props.alignment,
        space_before: props.space_before,
        space_after: props.space_after,
        line_spacing: props.line_spacing,
        inlines,
        tag: shell(el),
        ppr,
    }
}

fn parse_inlines(nodes: &[Node]) -> Vec<Inline> {
    nodes
        .iter()
        .filter_map(|n| match n {
            Node::Element(e) if e.is("w:pPr") => None,
            Node::Element(e) if e.is("w:r") => Some(Inline::Run(parse_run(e))),
            Node::Element(e) if INLINE_GROUPS.contains(&e.name.as_str()) => {
                Some(Inline::Group(Group {
                    inlines: parse_inlines(&e.children),
                    tag: shell(e),
                }))
            }
            other => Some(Inline::Raw(other.clone())),
        })
        .collect()
}

fn parse_table(el: &Element, styles: &StylesInfo) -> Table {
    let mut rows = Vec::new();
    let mut layout = Layout::default();
    for node in &el.children {
        match node {
            Node::Element(tr) if tr.is("w:tr") => {
                rows.push(parse_row(tr, styles));
                layout.0.push(None);
            }
            other => layout.0.push(Some(other.clone())),
        }
    }
    Table {
        rows,
        tag: shell(el),
        layout,
    }
}

fn parse_row(el: &Element, styles: &StylesInfo) -> Row {
    let mut cells = Vec::new();
    let mut layout = Layout::default();
    for node in &el.children {
        match node {
            Node::Element(tc) if tc.is("w:tc") => {
                cells.push(Cell {
                    blocks: parse_blocks(&tc.children, styles),
                    tag: shell(tc),
                });
                layout.0.push(None);
            }
            other => layout.0.push(Some(other.clone())),
        }
    }
    Row {
        cells,
        tag: shell(el),
        layout,
    }
}

fn parse_blocks(nodes: &[Node], styles: &StylesInfo) -> Vec<Block> {
    nodes
        .iter()
        .map(|n| match n {
            Node::Element(e) if e.is("w:p") => Block::Paragraph(parse_paragraph(e, styles)),
            Node::Element(e) if e.is("w:tbl") => Block::Table(parse_table(e, styles)),
            other => Block::Raw(other.clone()),
        })
        .collect()
}

fn parse_core(xml_content: Option<&str>) -> CoreProperties {
    let mut props = CoreProperties::default();
    let Some(root) = xml_content.and_then(|s| xml::parse(s).ok()) else {
        return props;
    };
    for el in root.elements() {
        let value = el.text();
        match el.local_name() {
            "title" => props.title = value,
            "subject" => props.subject = value,
            "keywords" => props.keywords = value,
            "category" => props.category = value,
            "description" => props.comments = value,
            "creator" => props.author = value,
            "lastModifiedBy" => props.last_modified_by = value,
            _ => {}
        }
    }
    props.xml = Some(root);
    props
}

/// Relationship id -> (type, part name) from a `.rels` part whose source
/// lives in `base_dir`.
fn parse_relationships(xml_content: Option<&str>, base_dir: &str) -> HashMap<String, (String, String)> {
    let mut rels = HashMap::new();
    let Some(root) = xml_content.and_then(|s| xml::parse(s).ok()) else {
        return rels;
    };
    for rel in root.elements().filter(|e| e.local_name() == "Relationship") {
        let (Some(id), Some(kind), Some(target)) =
            (rel.attr("Id"), rel.attr("Type"), rel.attr("Target"))
        else {
            continue;
        };
        if rel.attr("TargetMode") == Some("External") {
            continue;
        }
        let part = match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("{base_dir}{target}"),
        };
        rels.insert(id.to_string(), (kind.to_string(), part));
    }
    rels
}

fn parse_sections(
    root: &Element,
    rels: &HashMap<String, (String, String)>,
) -> Vec<Section> {
    root.descendants()
        .filter(|e| e.is("w:sectPr"))
        .map(|sect| {
            let mut section = Section::default();
            for reference in sect.elements() {
                let Some((_, part)) = reference.attr("r:id").and_then(|id| rels.get(id)) else {
                    continue;
                };
                match reference.name.as_str() {
                    "w:headerReference" => section.headers.push(part.clone()),
                    "w:footerReference" => section.footers.push(part.clone()),
                    _ => {}
                }
            }
            section
        })
        .collect()
}

impl Package {
    /// Wraps an in-memory document in a minimal package.
    pub fn new(document: Document) -> Self {
        let content_types = Element::new("Types")
            .with_attr("xmlns", CONTENT_TYPES_NS)
            .with_child(
                Element::new("Default")
                    .with_attr("Extension", "rels")
                    .with_attr("ContentType", CT_RELS),
            )
            .with_child(
                Element::new("Default")
                    .with_attr("Extension", "xml")
                    .with_attr("ContentType", "application/xml"),
            )
            .with_child(
                Element::new("Override")
                    .with_attr("PartName", "/word/document.xml")
                    .with_attr("ContentType", CT_DOCUMENT),
            );
        let rels = Element::new("Relationships")
            .with_attr("xmlns", PACKAGE_RELS_NS)
            .with_child(
                Element::new("Relationship")
                    .with_attr("Id", "rId1")
                    .with_attr("Type", REL_TYPE_DOCUMENT)
                    .with_attr("Target", DOCUMENT_PART),
            );
        Package {
            document,
            entries: vec![
                (CONTENT_TYPES_PART.to_string(), content_types.to_xml().into_bytes()),
                (PACKAGE_RELS_PART.to_string(), rels.to_xml().into_bytes()),
                (DOCUMENT_PART.to_string(), Vec::new()),
            ],
        }
    }

    pub fn open(path: &Path) -> Result<Package, Error> {
        let file = std::fs::File::open(path)?;
        let mut zip = zip::ZipArchive::new(file)?;

        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            entries.push((name, data));
        }

        let part = |name: &str| -> Result<Option<String>, Error> {
            entries
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, data)| {
                    String::from_utf8(data.clone())
                        .map_err(|_| Error::InvalidDocx(format!("{name} is not UTF-8")))
                })
                .transpose()
        };

        let document_xml = part(DOCUMENT_PART)?
            .ok_or_else(|| Error::InvalidDocx(format!("missing {DOCUMENT_PART}")))?;
        let styles = parse_styles(part(STYLES_PART)?.as_deref());
        let properties = parse_core(part(CORE_PART)?.as_deref());
        let rels = parse_relationships(part(DOCUMENT_RELS_PART)?.as_deref(), "word/");

        let mut root = xml::parse(&document_xml)?;
        let body = root
            .child_mut("w:body")
            .ok_or_else(|| Error::InvalidDocx("missing w:body".into()))?;
        let body_nodes = std::mem::take(&mut body.children);
        let blocks = parse_blocks(&body_nodes, &styles);

        let sections = {
            let mut with_body = root.clone();
            if let Some(b) = with_body.child_mut("w:body") {
                b.children = body_nodes;
            }
            parse_sections(&with_body, &rels)
        };

        let mut stories: Vec<Story> = Vec::new();
        for (kind, part_name) in rels.values() {
            let kind = match kind.as_str() {
                REL_TYPE_HEADER => StoryKind::Header,
                REL_TYPE_FOOTER => StoryKind::Footer,
                _ => continue,
            };
            if stories.iter().any(|s| s.part == *part_name) {
                continue;
            }
            let Some(story_xml) = part(part_name)? else {
                log::warn!("{part_name} is referenced but missing from the package");
                continue;
            };
            let story_root = xml::parse(&story_xml)?;
            stories.push(Story {
                part: part_name.clone(),
                kind,
                blocks: parse_blocks(&story_root.children, &styles),
                root: shell(&story_root),
            });
        }
        stories.sort_by(|a, b| a.part.cmp(&b.part));

        log::debug!(
            "parsed {}: {} blocks, {} sections, {} header/footer parts",
            path.display(),
            blocks.len(),
            sections.len(),
            stories.len()
        );

        Ok(Package {
            document: Document {
                body: blocks,
                properties,
                sections,
                stories,
                root,
            },
            entries,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let mut entries = self.entries.clone();
        let doc = &self.document;

        put_entry(&mut entries, DOCUMENT_PART, write::document_xml(doc).into_bytes());
        for story in &doc.stories {
            put_entry(&mut entries, &story.part, write::story_xml(story).into_bytes());
        }

        if doc.properties.xml.is_some() || doc.properties != CoreProperties::default() {
            let had_core = entries.iter().any(|(n, _)| n == CORE_PART);
            put_entry(&mut entries, CORE_PART, write::core_xml(&doc.properties).into_bytes());
            if !had_core {
                register_core_part(&mut entries)?;
            }
        }

        write_zip(path, &entries)?;
        log::info!("wrote {}", path.display());
        Ok(())
    }
}

fn put_entry(entries: &mut Vec<(String, Vec<u8>)>, name: &str, data: Vec<u8>) {
    match entries.iter_mut().find(|(n, _)| n == name) {
        Some((_, existing)) => *existing = data,
        None => entries.push((name.to_string(), data)),
    }
}

fn entry_xml(entries: &[(String, Vec<u8>)], name: &str) -> Result<Element, Error> {
    let data = entries
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, d)| d.as_slice())
        .ok_or_else(|| Error::InvalidDocx(format!("missing {name}")))?;
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::InvalidDocx(format!("{name} is not UTF-8")))?;
    Ok(xml::parse(text)?)
}

/// Adds the content-type override and package relationship a new
/// `docProps/core.xml` needs to be found by Word.
fn register_core_part(entries: &mut Vec<(String, Vec<u8>)>) -> Result<(), Error> {
    let mut types = entry_xml(entries, CONTENT_TYPES_PART)?;
    types.children.push(Node::Element(
        Element::new("Override")
            .with_attr("PartName", &format!("/{CORE_PART}"))
            .with_attr("ContentType", CT_CORE),
    ));
    put_entry(entries, CONTENT_TYPES_PART, types.to_xml().into_bytes());

    let mut rels = entry_xml(entries, PACKAGE_RELS_PART)?;
    let ids: Vec<&str> = rels.elements().filter_map(|r| r.attr("Id")).collect();
    let id = (1..)
        .map(|n| format!("rId{n}"))
        .find(|candidate| !ids.contains(&candidate.as_str()))
        .unwrap_or_else(|| "rIdCore".to_string());
    rels.children.push(Node::Element(
        Element::new("Relationship")
            .with_attr("Id", &id)
            .with_attr("Type", REL_TYPE_CORE)
            .with_attr("Target", CORE_PART),
    ));
    put_entry(entries, PACKAGE_RELS_PART, rels.to_xml().into_bytes());
    Ok(())
}

/// Media is stored, everything else deflated, the layout Word itself writes.
fn write_zip(path: &Path, entries: &[(String, Vec<u8>)]) -> Result<(), Error> {
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let deflated = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    let stored = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        let opts = if name.starts_with("word/media/") {
            stored
        } else {
            deflated
        };
        zip.start_file(name.as_str(), opts)?;
        zip.write_all(data)?;
    }
    zip.finish()?;
    Ok(())
}
