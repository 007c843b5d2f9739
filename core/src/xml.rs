//! An owned model for parsed header documents.
//!
//! das headers are small XML documents, so the model favors simplicity
//! over zero-copy: elements own their names, attributes and children.
//! Every element records the source line it was read from, which is
//! carried into diagnostics produced by downstream consumers such as
//! schema validators.
use smallvec::SmallVec;

/// An attribute name/value pair of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// the attribute name
    pub name: String,
    /// the attribute value, with XML escapes resolved
    pub value: String,
}

/// A node in the document tree: either a child element or character data.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A child element.
    Element(Element),
    /// A run of character data.
    Text(String),
}

/// A single element of a header document.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attributes: SmallVec<[Attribute; 4]>,
    children: Vec<Node>,
    line: u32,
}

impl Element {
    /// Create an empty element with the given name and source line.
    pub fn new(name: impl Into<String>, line: u32) -> Self {
        Element {
            name: name.into(),
            attributes: SmallVec::new(),
            children: Vec::new(),
            line,
        }
    }

    /// The element's tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The 1-based source line the element's start tag was read from.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// The element's attributes, in document order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Look up an attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Append an attribute.
    pub fn push_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push(Attribute {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Append a child element.
    pub fn push_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Append a run of character data.
    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// All child nodes, in document order.
    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// The direct child elements, in document order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// The first direct child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children().find(|el| el.name == name)
    }

    /// The element's direct character data, concatenated.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }
}

/// A parsed header document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Create a document from its root element.
    pub fn new(root: Element) -> Self {
        Document { root }
    }

    /// The document's root element.
    pub fn root(&self) -> &Element {
        &self.root
    }
}
