use crate::blocks::{classify_into, header_text, header_text_or_default, Block};
use html::{DOMContent, DOMElement};
use tracing::{debug, span, Level};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionHeading {
    /// Content before the first language heading
    Preamble,
    /// A language heading without a label; it cannot be collapsed
    Unlabeled,
    Language(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: SectionHeading,
    pub blocks: Vec<Block>,
}

/// The content of one page, split at its language headings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    pub sections: Vec<Section>,
}

impl Section {
    fn new(heading: SectionHeading) -> Self {
        Self {
            heading,
            blocks: vec![],
        }
    }

    /// Whether the section starts out expanded
    pub fn default_open(&self, default_language: &str) -> bool {
        match &self.heading {
            SectionHeading::Preamble | SectionHeading::Unlabeled => true,
            SectionHeading::Language(label) => label == default_language,
        }
    }
}

impl Article {
    pub fn from_content(root: &DOMElement) -> Self {
        let span = span!(Level::DEBUG, "Classifying content");
        let _enter = span.enter();

        let mut sections = Vec::new();
        let mut current = Section::new(SectionHeading::Preamble);
        // The part-of-speech heading right under a language heading needs no separator
        let mut first_heading = true;
        for child in &root.contents {
            match child {
                DOMContent::Element(e) if e.is("h2") => {
                    let heading = match header_text(e) {
                        Some(label) => SectionHeading::Language(label.to_string()),
                        None => SectionHeading::Unlabeled,
                    };
                    sections.push(std::mem::replace(&mut current, Section::new(heading)));
                    first_heading = true;
                }
                DOMContent::Element(e) if first_heading && e.is("h3") => {
                    current.blocks.push(Block::Heading {
                        level: 3,
                        text: header_text_or_default(e),
                    });
                    first_heading = false;
                }
                _ => classify_into(child, &mut current.blocks),
            }
        }
        sections.push(current);
        sections.retain(|s| s.heading != SectionHeading::Preamble || !s.blocks.is_empty());
        debug!("Found {} sections", sections.len());
        Self { sections }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.blocks.is_empty())
    }
}
