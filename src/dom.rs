//! A small read-only XML element tree.
//!
//! The GML parser walks the document the way a DOM does (descendant lookup by
//! qualified tag name, first child element, leading text value), so the
//! streaming `quick-xml` events are folded into a tree first.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{GmlError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Qualified tag name, prefix included (`gml:featureMember`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// The first child element, whatever its tag name.
    pub fn first_child_element(&self) -> Option<&Element> {
        self.child_elements().next()
    }

    /// All descendant elements in document order (not including `self`).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.children.iter()],
        }
    }

    pub fn descendants_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.descendants().filter(move |element| element.name == name)
    }

    pub fn find(&self, name: &str) -> Option<&Element> {
        self.descendants().find(|element| element.name == name)
    }

    /// The leading text of the first descendant named `name`.
    ///
    /// Returns `None` when there is no such element, when it is empty, or
    /// when its first child is an element rather than text.
    pub fn single_value(&self, name: &str) -> Option<&str> {
        match self.find(name)?.children.first()? {
            Node::Text(text) => Some(text.as_str()),
            Node::Element(_) => None,
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, Node>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        while let Some(iter) = self.stack.last_mut() {
            match iter.next() {
                Some(Node::Element(element)) => {
                    self.stack.push(element.children.iter());
                    return Some(element);
                }
                Some(Node::Text(_)) => {}
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Elements named `name` in document order, the root included.
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        std::iter::once(&self.root)
            .filter(move |root| root.name == name)
            .chain(self.root.descendants_named(name))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(xml: &str) -> Result<Self> {
        Self::from_reader(xml.as_bytes())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(source: R) -> Result<Self> {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| GmlError::Xml {
                position: reader.buffer_position(),
                source: e,
            })?;

            match event {
                Event::Start(start) => {
                    stack.push(element_from_start(&start, reader.buffer_position())?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start, reader.buffer_position())?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // quick-xml has already matched the end tag against its start tag
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element)?;
                    }
                }
                Event::Text(text) => {
                    let value = text.unescape().map_err(|e| GmlError::Xml {
                        position: reader.buffer_position(),
                        source: e,
                    })?;
                    push_text(&mut stack, value.into_owned())?;
                }
                Event::CData(data) => {
                    let value = String::from_utf8(data.into_inner().into_owned())?;
                    push_text(&mut stack, value)?;
                }
                Event::Eof => break,
                _ => (),
            }
            buf.clear();
        }

        if let Some(open) = stack.pop() {
            return Err(GmlError::UnclosedElement(open.name));
        }

        let root = root.ok_or(GmlError::NoRootElement)?;
        debug!("Loaded XML document with root <{}>", root.name);
        Ok(Self { root })
    }
}

fn element_from_start(start: &BytesStart, position: u64) -> Result<Element> {
    let name = String::from_utf8(start.name().as_ref().to_vec())?;
    let mut element = Element::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| GmlError::Xml {
            position,
            source: quick_xml::Error::from(e),
        })?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())?;
        let value = attr.unescape_value().map_err(|e| GmlError::Xml {
            position,
            source: e,
        })?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_some() => return Err(GmlError::MultipleRootElements(element.name)),
        None => *root = Some(element),
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: String) -> Result<()> {
    if text.trim().is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Text(text)),
        None => return Err(GmlError::TextOutsideRoot(text)),
    }
    Ok(())
}
