//! A small XML element tree for the document read path.
//!
//! The dashboard's XML encoding is element-only, so a name + attributes +
//! text + children shape is enough to merge `data` elements across pages
//! and rewrite the root metadata afterwards.

use std::fmt;
use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::errors::Error;

/// One XML element: its tag name, attributes, text content, and children.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_text(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            ..Self::default()
        }
    }

    /// Parses a document and returns its root element.
    pub fn parse(xml: &str) -> Result<XmlNode, Error> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    stack.push(node_from_start(&e)?);
                }
                Ok(Event::Empty(e)) => {
                    let node = node_from_start(&e)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::Text(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = e.unescape().map_err(|e| Error::Decode(e.to_string()))?;
                        parent.text.push_str(&text);
                    }
                }
                Ok(Event::End(_)) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| Error::Decode("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(Error::Decode(e.to_string())),
            }
        }

        if !stack.is_empty() {
            return Err(Error::Decode("unclosed element".to_string()));
        }
        root.ok_or_else(|| Error::Decode("document has no root element".to_string()))
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn push(&mut self, node: XmlNode) {
        self.children.push(node);
    }

    /// All elements below this one with the given name, in document order.
    /// Does not include this element itself.
    pub fn descendants(&self, name: &str) -> Vec<&XmlNode> {
        let mut found = Vec::new();
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            found.extend(child.descendants(name));
        }
        found
    }

    /// Detaches and returns every descendant with the given name, in
    /// document order.
    pub(crate) fn take_descendants(&mut self, name: &str) -> Vec<XmlNode> {
        let mut taken = Vec::new();
        let mut kept = Vec::new();
        for mut child in self.children.drain(..) {
            if child.name == name {
                taken.push(child);
            } else {
                taken.extend(child.take_descendants(name));
                kept.push(child);
            }
        }
        self.children = kept;
        taken
    }

    /// Drops every descendant with the given name.
    pub(crate) fn remove_descendants(&mut self, name: &str) {
        self.children.retain(|c| c.name != name);
        for child in &mut self.children {
            child.remove_descendants(name);
        }
    }

    fn write_into<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<(), quick_xml::Error> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.text.is_empty() && self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if !self.text.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&self.text)))?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

impl fmt::Display for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        self.write_into(&mut writer).map_err(|_| fmt::Error)?;
        let buf = writer.into_inner().into_inner();
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

fn node_from_start(e: &BytesStart<'_>) -> Result<XmlNode, Error> {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::Decode(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Decode(e.to_string()))?
            .to_string();
        attributes.push((key, value));
    }
    Ok(XmlNode {
        name,
        attributes,
        ..XmlNode::default()
    })
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
) -> Result<(), Error> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    if root.is_some() {
        return Err(Error::Decode("multiple root elements".to_string()));
    }
    *root = Some(node);
    Ok(())
}
