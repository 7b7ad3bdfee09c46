//! Owned, mutable XML tree.
//!
//! `roxmltree` gives a fast read-only view; the fix pass has to rewrite parts
//! and write them back, so each part is copied into this tree once. Names are
//! kept qualified exactly as the document spells them (`w:p`, `dc:title`) and
//! namespace declarations are kept as ordinary `xmlns` attributes, so an
//! untouched subtree serialises back to equivalent markup.

use std::fmt::Write as _;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

pub fn parse(text: &str) -> Result<Element, roxmltree::Error> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();
    Ok(convert(root, None))
}

fn qualified(node: roxmltree::Node, namespace: Option<&str>, local: &str) -> String {
    let prefix = match namespace {
        Some(XML_NS) => Some("xml"),
        Some(uri) => node.lookup_prefix(uri),
        None => None,
    };
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}:{local}"),
        _ => local.to_string(),
    }
}

fn convert(node: roxmltree::Node, parent: Option<roxmltree::Node>) -> Element {
    let tag = node.tag_name();
    let mut el = Element::new(&qualified(node, tag.namespace(), tag.name()));

    // Only declare what the parent did not already have in scope.
    for ns in node.namespaces() {
        if ns.name() == Some("xml") {
            continue;
        }
        let inherited = parent.is_some_and(|p| {
            p.namespaces()
                .any(|pns| pns.name() == ns.name() && pns.uri() == ns.uri())
        });
        if inherited {
            continue;
        }
        let key = match ns.name() {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        };
        el.attrs.push((key, ns.uri().to_string()));
    }

    for attr in node.attributes() {
        el.attrs.push((
            qualified(node, attr.namespace(), attr.name()),
            attr.value().to_string(),
        ));
    }

    for child in node.children() {
        match child.node_type() {
            roxmltree::NodeType::Element => {
                el.children.push(Node::Element(convert(child, Some(node))));
            }
            roxmltree::NodeType::Text => {
                if let Some(t) = child.text() {
                    el.children.push(Node::Text(t.to_string()));
                }
            }
            roxmltree::NodeType::Comment => {
                if let Some(t) = child.text() {
                    el.children.push(Node::Comment(t.to_string()));
                }
            }
            _ => {}
        }
    }
    el
}

impl Element {
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(name))
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.is(name) => Some(e),
            _ => None,
        })
    }

    /// `w:val` of the named child, the common WordprocessingML property shape.
    pub fn val(&self, child: &str) -> Option<&str> {
        self.child(child).and_then(|c| c.attr("w:val"))
    }

    pub fn remove_children(&mut self, name: &str) {
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if e.is(name)));
    }

    /// Returns the named child, creating it at the position `order` dictates
    /// when it is missing. Children whose names are not in `order` are left
    /// where they are.
    pub fn ensure_child(&mut self, name: &str, order: &[&str]) -> &mut Element {
        let existing = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.is(name)));
        let idx = match existing {
            Some(idx) => idx,
            None => {
                let rank_of = |n: &Node| match n {
                    Node::Element(e) => order.iter().position(|o| *o == e.name),
                    _ => None,
                };
                let rank = order.iter().position(|o| *o == name).unwrap_or(order.len());
                let insert_at = self
                    .children
                    .iter()
                    .position(|n| rank_of(n).is_some_and(|r| r > rank))
                    .or_else(|| {
                        self.children
                            .iter()
                            .rposition(|n| rank_of(n).is_some_and(|r| r < rank))
                            .map(|i| i + 1)
                    })
                    .unwrap_or(self.children.len());
                self.children.insert(insert_at, Node::Element(Element::new(name)));
                insert_at
            }
        };
        match &mut self.children[idx] {
            Node::Element(e) => e,
            _ => unreachable!("index points at an element"),
        }
    }

    /// Depth-first iteration over this element and every element below it.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Concatenated character data of every descendant text node.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    pub fn to_xml(&self) -> String {
        let mut out =
            String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n");
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            let _ = write!(out, " {k}=\"{}\"", escape(v, true));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_to(out),
                Node::Text(t) => out.push_str(&escape(t, false)),
                Node::Comment(c) => {
                    let _ = write!(out, "<!--{c}-->");
                }
            }
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Element(e) => collect_text(e, out),
            Node::Text(t) => out.push_str(t),
            Node::Comment(_) => {}
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        let el = self.stack.pop()?;
        // Reverse so document order is preserved when popping.
        let kids: Vec<&Element> = el.elements().collect();
        self.stack.extend(kids.into_iter().rev());
        Some(el)
    }
}

fn escape(s: &str, attr: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            '\n' if attr => out.push_str("&#10;"),
            '\t' if attr => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="urn:r"><w:body><w:p><w:r><w:t xml:space="preserve"> a &amp; b </w:t></w:r></w:p><!--note--></w:body></w:document>"#;

    #[test]
    fn keeps_prefixes_and_declarations() {
        let root = parse(SAMPLE).unwrap();
        assert_eq!(root.name, "w:document");
        assert_eq!(
            root.attr("xmlns:w"),
            Some("http://schemas.openxmlformats.org/wordprocessingml/2006/main")
        );
        let body = root.child("w:body").unwrap();
        assert!(body.attr("xmlns:w").is_none());
        let t = body.descendants().find(|e| e.is("w:t")).unwrap();
        assert_eq!(t.attr("xml:space"), Some("preserve"));
        assert_eq!(t.text(), " a & b ");
    }

    #[test]
    fn serialises_back_to_parseable_markup() {
        let root = parse(SAMPLE).unwrap();
        let again = parse(&root.to_xml()).unwrap();
        assert_eq!(root, again);
        assert!(root.to_xml().contains("<!--note-->"));
        assert!(root.to_xml().contains("a &amp; b"));
    }

    #[test]
    fn ensure_child_respects_schema_order() {
        let order = ["w:rFonts", "w:b", "w:color", "w:sz"];
        let mut rpr = Element::new("w:rPr")
            .with_child(Element::new("w:b"))
            .with_child(Element::new("w:lang"));
        rpr.ensure_child("w:sz", &order).set_attr("w:val", "20");
        rpr.ensure_child("w:rFonts", &order);
        rpr.ensure_child("w:color", &order);
        let names: Vec<&str> = rpr.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["w:rFonts", "w:b", "w:color", "w:sz", "w:lang"]);
        assert_eq!(rpr.val("w:sz"), Some("20"));
    }
}
