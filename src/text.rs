use html::{DOMContent, DOMElement};

/// Class of the pronunciation audio widgets, which have no useful text
const AUDIO_TABLE_CLASS: &str = "audiotable";

/// How an element takes part in the flow of text around it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Contributes nothing
    Ignored,
    /// Continues the current line
    Inline,
    /// Starts on a new line
    Block,
}

impl Flow {
    pub fn of(element: &DOMElement) -> Self {
        if element.class_is(AUDIO_TABLE_CLASS) {
            return Flow::Ignored;
        }
        match element.name.as_str() {
            "style" => Flow::Ignored,
            "span" | "i" | "a" | "b" | "em" | "u" | "strong" | "sub" | "sup" | "abbr" => {
                Flow::Inline
            }
            _ => Flow::Block,
        }
    }
}

/// Starts a new line unless `text` is empty or already on one
pub fn break_line(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

/// Appends the plain text of `content` to `text`
pub fn flatten_into(content: &DOMContent, text: &mut String) {
    match content {
        DOMContent::Text(t) => text.push_str(t),
        DOMContent::Whitespace => text.push(' '),
        DOMContent::Element(element) => flatten_children_into(element, text),
    }
}

/// Appends the plain text of the children of `element` to `text`
pub fn flatten_children_into(element: &DOMElement, text: &mut String) {
    for child in &element.contents {
        if let DOMContent::Element(e) = child {
            match Flow::of(e) {
                Flow::Ignored => continue,
                Flow::Inline => {}
                Flow::Block => break_line(text),
            }
        }
        flatten_into(child, text);
    }
}

pub fn flatten(element: &DOMElement) -> String {
    let mut text = String::new();
    flatten_children_into(element, &mut text);
    text
}

/// Text which would render as nothing at all
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
