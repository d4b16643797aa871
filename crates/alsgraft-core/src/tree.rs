//! Attributed element tree with formatting-fidelity parse and serialize.
//!
//! The tree is the substrate every typed view in this crate sits on. It
//! stores attribute order, inter-element whitespace (as `text`/`tail`, so
//! whitespace travels with the element it follows), and whether an empty
//! element was written self-closed, which together make serialization
//! reproduce an unmodified document byte for byte.

use std::fmt;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::error::{SetError, SetResult};

/// One element of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    tail: Option<String>,
    children: Vec<Element>,
}

impl Element {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            text: None,
            tail: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr_name, _)| attr_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets an attribute, keeping the position of an existing attribute and
    /// appending new names at the end.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(attr_name, _)| *attr_name == name)
        {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    #[must_use]
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    #[must_use]
    pub fn children_mut(&mut self) -> &mut [Element] {
        &mut self.children
    }

    /// First child with the given tag.
    #[must_use]
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    #[must_use]
    pub fn child_mut(&mut self, tag: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|child| child.tag == tag)
    }

    /// Inserts a child at the given element index.
    ///
    /// # Panics
    ///
    /// Panics if `index > children().len()`; callers bounds-check first.
    pub fn insert_child(&mut self, index: usize, child: Element) {
        self.children.insert(index, child);
    }

    /// Removes and returns the child at the given element index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= children().len()`; callers bounds-check first.
    pub fn remove_child(&mut self, index: usize) -> Element {
        self.children.remove(index)
    }

    /// Depth-first iterator over this element and every nested element.
    #[must_use]
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Calls `visit` on this element and every nested element, depth-first,
    /// allowing mutation.
    pub fn visit_mut(&mut self, visit: &mut impl FnMut(&mut Element)) {
        visit(self);
        for child in &mut self.children {
            child.visit_mut(visit);
        }
    }

    fn append_text(&mut self, text: &str) {
        let slot = match self.children.last_mut() {
            Some(last) => &mut last.tail,
            None => &mut self.text,
        };
        match slot {
            Some(existing) => existing.push_str(text),
            None => *slot = Some(text.to_string()),
        }
    }

    /// Serializes this element (and its tail) into `out`.
    pub fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_attr(value, out);
            out.push('"');
        }
        if self.children.is_empty() && self.text.is_none() {
            out.push_str(" />");
        } else {
            out.push('>');
            if let Some(text) = &self.text {
                escape_text(text, out);
            }
            for child in &self.children {
                child.write_xml(out);
            }
            out.push_str("</");
            out.push_str(&self.tag);
            out.push('>');
        }
        if let Some(tail) = &self.tail {
            escape_text(tail, out);
        }
    }

    #[must_use]
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

/// Parses an XML document into its root element.
///
/// The prolog is discarded (the container writes its own, verbatim) and
/// whitespace outside the root element is ignored. Comments, CDATA sections,
/// processing instructions, and doctypes are rejected: the set format never
/// contains them, and silently dropping them would break the round-trip
/// contract.
pub fn parse_document(xml: &str) -> SetResult<Element> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|error| {
            SetError::Format(format!(
                "xml parse error at byte {}: {error}",
                reader.buffer_position()
            ))
        })?;
        match event {
            Event::Decl(_) => {}
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| SetError::Format("unmatched closing tag".to_string()))?;
                if element.children.is_empty() && element.text.is_none() {
                    // Parsed from an expanded empty pair; record empty text
                    // so serialization keeps the expanded form.
                    element.text = Some(String::new());
                }
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let raw = std::str::from_utf8(text.as_ref())
                    .map_err(|error| SetError::Format(format!("invalid utf-8 in text: {error}")))?;
                let unescaped = unescape(raw)
                    .map_err(|error| SetError::Format(format!("invalid text escape: {error}")))?;
                match stack.last_mut() {
                    Some(parent) => parent.append_text(&unescaped),
                    None => {
                        if !unescaped.trim().is_empty() {
                            return Err(SetError::Format(
                                "text content outside the root element".to_string(),
                            ));
                        }
                    }
                }
            }
            Event::CData(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {
                return Err(SetError::Format(
                    "unsupported xml construct (comment, CDATA, PI, or doctype)".to_string(),
                ));
            }
            Event::Eof => break,
        }
    }

    if !stack.is_empty() {
        return Err(SetError::Format("unclosed element at end of input".to_string()));
    }
    root.ok_or_else(|| SetError::Format("document contains no root element".to_string()))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> SetResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(SetError::Format(
            "document contains more than one root element".to_string(),
        ));
    }
    *root = Some(element);
    Ok(())
}

fn element_from_start(start: &BytesStart<'_>) -> SetResult<Element> {
    let name = start.name();
    let tag = std::str::from_utf8(name.as_ref())
        .map_err(|error| SetError::Format(format!("invalid utf-8 in tag name: {error}")))?;
    let mut element = Element::new(tag);
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|error| SetError::Format(format!("malformed attribute on <{tag}>: {error}")))?;
        let name = std::str::from_utf8(attribute.key.as_ref()).map_err(|error| {
            SetError::Format(format!("invalid utf-8 in attribute name: {error}"))
        })?;
        let raw = std::str::from_utf8(&attribute.value).map_err(|error| {
            SetError::Format(format!("invalid utf-8 in attribute value: {error}"))
        })?;
        let value = unescape(raw)
            .map_err(|error| SetError::Format(format!("invalid attribute escape: {error}")))?;
        element
            .attributes
            .push((name.to_string(), value.into_owned()));
    }
    Ok(element)
}

// The set format's own writer escapes `& < >` in text and additionally `"`
// in attribute values; escaping more (e.g. apostrophes) would break the
// round-trip contract.

fn escape_text(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_formatting() {
        let xml = "<Root A=\"1\" B=\"two &amp; three\">\n\t<Leaf Value=\"0\" />\n\t<Pair></Pair>\n\t<Text>hello &lt;world&gt;</Text>\n</Root>";
        let root = parse_document(xml).expect("document should parse");
        assert_eq!(root.to_xml_string(), xml);
    }

    #[test]
    fn prolog_and_trailing_whitespace_are_ignored() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Root />\n";
        let root = parse_document(xml).expect("document should parse");
        assert_eq!(root.tag(), "Root");
        assert_eq!(root.to_xml_string(), "<Root />");
    }

    #[test]
    fn set_attr_keeps_first_write_order() {
        let mut element = Element::new("Node").with_attr("Id", "0").with_attr("Value", "x");
        element.set_attr("Id", "7");
        assert_eq!(element.to_xml_string(), "<Node Id=\"7\" Value=\"x\" />");
    }

    #[test]
    fn attribute_values_are_unescaped_and_reescaped() {
        let xml = "<Node Value=\"a &quot;b&quot; &amp; c\" />";
        let root = parse_document(xml).expect("document should parse");
        assert_eq!(root.attr("Value"), Some("a \"b\" & c"));
        assert_eq!(root.to_xml_string(), xml);
    }

    #[test]
    fn multiple_roots_are_rejected() {
        let error = parse_document("<A /><B />").expect_err("two roots should fail");
        assert!(matches!(error, SetError::Format(_)));
    }

    #[test]
    fn descendants_walk_is_depth_first() {
        let xml = "<A><B><C /></B><D /></A>";
        let root = parse_document(xml).expect("document should parse");
        let tags: Vec<&str> = root.descendants().map(Element::tag).collect();
        assert_eq!(tags, ["A", "B", "C", "D"]);
    }
}
