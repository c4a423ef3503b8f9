use std::collections::HashMap;
use std::fmt::Display;

mod parsing;

pub use parsing::{document, parse, ParseError, MAX_TREE_DEPTH};

/// A node of the parsed document
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DOMContent {
    Element(DOMElement),
    Text(String),
    /// A run of inter-element whitespace
    Whitespace,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DOMElement {
    pub name: String,
    pub attributes: DOMAttributes,
    pub contents: Vec<DOMContent>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct DOMAttributes(pub HashMap<String, String>);

/// Builds a [`DOMAttributes`] from `"name" => "value"` pairs
#[macro_export]
macro_rules! attributes {
    ($($name:expr => $value:expr),* $(,)?) => {
        $crate::DOMAttributes(::std::collections::HashMap::from([
            $(($name.to_string(), $value.to_string())),*
        ]))
    };
}

impl DOMAttributes {
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl DOMElement {
    pub fn new(
        name: impl Display,
        attributes: Option<DOMAttributes>,
        contents: Vec<DOMContent>,
    ) -> Self {
        Self {
            name: name.to_string(),
            attributes: attributes.unwrap_or_default(),
            contents,
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name)
    }

    pub fn id(&self) -> Option<&str> {
        self.get_attribute("id")
    }

    pub fn class(&self) -> Option<&str> {
        self.get_attribute("class")
    }

    /// Whether the whole `class` attribute is exactly `class`.
    ///
    /// Multi-class values (`"a b"`) do not match either of their parts.
    pub fn class_is(&self, class: &str) -> bool {
        self.class() == Some(class)
    }

    pub fn id_is(&self, id: &str) -> bool {
        self.id() == Some(id)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Direct children which are elements, in document order
    pub fn child_elements(&self) -> impl Iterator<Item = &DOMElement> {
        self.contents.iter().filter_map(|c| match c {
            DOMContent::Element(e) => Some(e),
            _ => None,
        })
    }
}

impl From<DOMElement> for DOMContent {
    fn from(element: DOMElement) -> Self {
        DOMContent::Element(element)
    }
}

impl From<&str> for DOMContent {
    fn from(text: &str) -> Self {
        if parsing::is_whitespace(text) {
            DOMContent::Whitespace
        } else {
            DOMContent::Text(text.to_string())
        }
    }
}
