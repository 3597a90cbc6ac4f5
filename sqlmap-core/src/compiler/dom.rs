//! A minimal, generic XML DOM used as the common substrate for both the
//! `<configuration>` document and `<mapper>` documents (`spec.md` §6).
//!
//! `quick-xml`'s pull [`Reader`] is used purely as a tokenizer; this module
//! builds an owned tree on top of it rather than deserializing into a
//! fixed shape, because mapper-statement bodies are mixed content (text
//! interleaved with control-flow tags) which `serde`'s data model can't
//! represent. Building a tree first — instead of driving the dynamic-SQL
//! AST straight off the streaming reader — keeps `<include>` splicing
//! (`spec.md` §4.4) simple: it is just subtree substitution.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ConfigurationError;

/// One parsed element: a tag name, its attributes in declaration order, and
/// its mixed-content children.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub name: String,
    pub attrs: HashMap<String, String>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child_elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.child_elements().filter(move |e| e.name == name)
    }

    pub fn first_child_named(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements_named(name).next()
    }

    /// Concatenation of every direct text child, ignoring nested elements.
    /// Used for leaf elements like `<property>`'s value attribute cousins
    /// that some dialects express as text instead.
    pub fn own_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Parses a whole document, returning its single root element.
pub fn parse_document(xml: &str) -> Result<XmlElement, ConfigurationError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|e| ConfigurationError::MalformedDocument {
            namespace: String::new(),
            reason: e.to_string(),
        })?;
        match event {
            Event::Eof => break,
            Event::Start(start) => {
                let name = decode_str(start.name().as_ref());
                let attrs = read_attrs(&start)?;
                stack.push(XmlElement { name, attrs, children: Vec::new() });
            }
            Event::Empty(start) => {
                let name = decode_str(start.name().as_ref());
                let attrs = read_attrs(&start)?;
                let element = XmlElement { name, attrs, children: Vec::new() };
                push_child(&mut stack, &mut root, XmlNode::Element(element))?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| ConfigurationError::MalformedDocument {
                    namespace: String::new(),
                    reason: "unbalanced closing tag".into(),
                })?;
                push_child(&mut stack, &mut root, XmlNode::Element(element))?;
            }
            Event::Text(text) => {
                let decoded = text.unescape().map_err(|e| ConfigurationError::MalformedDocument {
                    namespace: String::new(),
                    reason: e.to_string(),
                })?;
                if !decoded.is_empty() {
                    push_text(&mut stack, decoded.into_owned());
                }
            }
            Event::CData(cdata) => {
                let bytes = cdata.into_inner();
                push_text(&mut stack, decode_str(&bytes));
            }
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    root.ok_or_else(|| ConfigurationError::MalformedDocument { namespace: String::new(), reason: "empty document".into() })
}

/// Parses a bare fragment (no single root required) — used to reparse a
/// `<sql>` fragment's stored inner content when splicing an `<include>`.
pub fn parse_fragment(xml: &str) -> Result<Vec<XmlNode>, ConfigurationError> {
    let wrapped = format!("<__frag__>{xml}</__frag__>");
    let root = parse_document(&wrapped)?;
    Ok(root.children)
}

/// Serializes a node list back to XML text, for storing a `<sql>`
/// fragment's inner content in the catalogue's fragment table.
pub fn serialize_children(children: &[XmlNode]) -> String {
    let mut out = String::new();
    for child in children {
        serialize_node(child, &mut out);
    }
    out
}

fn serialize_node(node: &XmlNode, out: &mut String) {
    match node {
        XmlNode::Text(t) => out.push_str(&escape(t)),
        XmlNode::Element(e) => {
            out.push('<');
            out.push_str(&e.name);
            for (k, v) in &e.attrs {
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                out.push_str(&escape(v));
                out.push('"');
            }
            if e.children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                out.push_str(&serialize_children(&e.children));
                out.push_str("</");
                out.push_str(&e.name);
                out.push('>');
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn read_attrs(start: &quick_xml::events::BytesStart<'_>) -> Result<HashMap<String, String>, ConfigurationError> {
    let mut attrs = HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ConfigurationError::MalformedDocument {
            namespace: String::new(),
            reason: e.to_string(),
        })?;
        let key = decode_str(attr.key.as_ref());
        let value = attr
            .unescape_value()
            .map_err(|e| ConfigurationError::MalformedDocument { namespace: String::new(), reason: e.to_string() })?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn decode_str(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn push_child(
    stack: &mut Vec<XmlElement>,
    root: &mut Option<XmlElement>,
    node: XmlNode,
) -> Result<(), ConfigurationError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if let XmlNode::Element(e) = node {
                *root = Some(e);
            }
        }
    }
    Ok(())
}

fn push_text(stack: &mut [XmlElement], text: String) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Text(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attrs() {
        let root = parse_document(r#"<mapper namespace="ns"><select id="find">select 1</select></mapper>"#).unwrap();
        assert_eq!(root.name, "mapper");
        assert_eq!(root.attr("namespace"), Some("ns"));
        let select = root.first_child_named("select").unwrap();
        assert_eq!(select.attr("id"), Some("find"));
        assert_eq!(select.own_text(), "select 1");
    }

    #[test]
    fn mixed_content_preserves_element_and_text_order() {
        let root = parse_document(r#"<select>a <if test="x">b</if> c</select>"#).unwrap();
        assert_eq!(root.children.len(), 3);
        assert!(matches!(&root.children[0], XmlNode::Text(t) if t == "a "));
        assert!(matches!(&root.children[1], XmlNode::Element(e) if e.name == "if"));
        assert!(matches!(&root.children[2], XmlNode::Text(t) if t == " c"));
    }

    #[test]
    fn roundtrips_through_serialize_and_reparse() {
        let root = parse_document(r#"<sql>where id = #{id} <if test="x">and y</if></sql>"#).unwrap();
        let text = serialize_children(&root.children);
        let reparsed = parse_fragment(&text).unwrap();
        assert_eq!(reparsed.len(), root.children.len());
    }
}
