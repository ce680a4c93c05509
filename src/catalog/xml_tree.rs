use crate::error::{QuickloadError, Result};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesDecl, BytesEnd, BytesRef, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Write;

/// Owned element tree of a whole XML document.
///
/// Element and attribute names are kept as written (including any namespace
/// prefix), values and text are unescaped. Whitespace-only text is treated as
/// formatting and dropped, so a parsed document can be written back with fresh
/// indentation without losing any element or attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Leaf element holding only text
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Parses a whole document and returns its root element.
    pub fn parse(content: &str) -> Result<XmlNode> {
        let mut reader = Reader::from_str(content);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                QuickloadError::CatalogParsing(format!(
                    "XML error at byte {}: {e}",
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(start) => {
                    stack.push(open_node(&start)?);
                }
                Event::Empty(start) => {
                    let node = open_node(&start)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let mut node = stack.pop().ok_or_else(|| {
                        QuickloadError::CatalogParsing("Unbalanced closing tag".to_string())
                    })?;
                    if node.text.trim().is_empty() {
                        node.text.clear();
                    }
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let text = text.xml10_content().map_err(decoding_error)?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        let data = data.xml10_content().map_err(decoding_error)?;
                        current.text.push_str(&data);
                    }
                }
                Event::GeneralRef(reference) => {
                    let resolved = resolve_reference(&reference)?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&resolved);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(QuickloadError::CatalogParsing(format!(
                "Unclosed element <{}>",
                open.name
            )));
        }

        root.ok_or_else(|| QuickloadError::CatalogParsing("Document has no root element".into()))
    }

    /// Element name without its namespace prefix
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child with this local name
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.local_name() == name)
    }

    /// Text of the first child with this local name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text.as_str())
    }

    /// Renders the tree as a document with an XML declaration and two-space indentation.
    pub fn to_document(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        self.write_to(&mut writer)?;

        let mut document = String::from_utf8(writer.into_inner())
            .map_err(|e| QuickloadError::CatalogSerialization(e.to_string()))?;
        document.push('\n');
        Ok(document)
    }

    fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if !self.text.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&self.text)))?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// Strips a `prefix:` from a qualified name.
pub fn local_part(qualified: &str) -> &str {
    qualified
        .rsplit_once(':')
        .map_or(qualified, |(_, local)| local)
}

fn open_node(start: &BytesStart<'_>) -> Result<XmlNode> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            QuickloadError::CatalogParsing(format!("Invalid attribute on <{name}>: {e}"))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| {
            QuickloadError::CatalogParsing(format!("Invalid value for '{key}' on <{name}>: {e}"))
        })?;
        attributes.push((key, value.into_owned()));
    }

    Ok(XmlNode {
        name,
        attributes,
        ..XmlNode::default()
    })
}

fn resolve_reference(reference: &BytesRef<'_>) -> Result<String> {
    let invalid = |e: &dyn std::fmt::Display| {
        QuickloadError::CatalogParsing(format!("Invalid character reference: {e}"))
    };

    if let Some(ch) = reference.resolve_char_ref().map_err(|e| invalid(&e))? {
        return Ok(ch.to_string());
    }

    let name = reference.decode().map_err(|e| invalid(&e))?;
    resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| QuickloadError::CatalogParsing(format!("Undefined entity '&{name};'")))
}

fn decoding_error(e: quick_xml::encoding::EncodingError) -> QuickloadError {
    QuickloadError::CatalogParsing(format!("Undecodable text: {e}"))
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => {
            return Err(QuickloadError::CatalogParsing(format!(
                "Unexpected second root element <{}>",
                node.name
            )));
        }
    }
    Ok(())
}
