use crate::table::{self, Table};
use crate::text::{break_line, flatten, flatten_into, is_blank, Flow};
use html::{DOMContent, DOMElement};
use tracing::trace;

/// Shown in place of a heading whose label could not be found
pub const MISSING_HEADER_TEXT: &str = "(Error getting text)";

const HEADLINE_CLASS: &str = "mw-headline";
const EMPTY_ELEMENT_CLASS: &str = "mw-empty-elt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    BulletList(Vec<ListEntry>),
    NumberedDefinitionList(Vec<DefinitionEntry>),
    Table(Table),
    /// A table whose grid could not be worked out
    InvalidTable,
    Separator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    Bullet(String),
    /// Something other than an item inside the list, shown as wrapped text
    Plain(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionEntry {
    Numbered {
        index: usize,
        parts: Vec<DefinitionPart>,
    },
    /// Something other than an item inside the list, shown after a `.`
    Aside(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionPart {
    Text(String),
    /// Examples, quotations and the like, indented under the definition
    SubList(Vec<ListEntry>),
}

fn first_text(element: &DOMElement) -> Option<&str> {
    element.contents.iter().find_map(|c| match c {
        DOMContent::Text(t) => Some(t.as_str()),
        DOMContent::Element(e) => first_text(e),
        DOMContent::Whitespace => None,
    })
}

/// The label of a heading, found in its `.mw-headline` child
pub fn header_text(heading: &DOMElement) -> Option<&str> {
    let headline = heading.child_elements().find(|e| e.class_is(HEADLINE_CLASS))?;
    first_text(headline)
}

pub fn header_text_or_default(heading: &DOMElement) -> String {
    header_text(heading)
        .unwrap_or(MISSING_HEADER_TEXT)
        .to_string()
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Whether a list item should be left out of its list
fn is_skipped_item(item: &DOMElement, text: &str) -> bool {
    item.class_is(EMPTY_ELEMENT_CLASS) || is_blank(text)
}

/// The entries of a `<ul>` or `<dl>`
pub fn list_entries(list: &DOMElement) -> Vec<ListEntry> {
    list.child_elements()
        .filter_map(|child| match child.name.as_str() {
            "li" | "dd" | "dt" => {
                let text = flatten(child);
                (!is_skipped_item(child, &text)).then(|| ListEntry::Bullet(text))
            }
            _ => Some(ListEntry::Plain(flatten(child))),
        })
        .collect()
}

/// Renders one definition, keeping nested lists apart from the running text
pub fn definition_parts(item: &DOMElement) -> Vec<DefinitionPart> {
    let mut parts = Vec::new();
    let mut text = String::new();
    for child in &item.contents {
        if let DOMContent::Element(e) = child {
            if e.is("dl") || e.is("ul") {
                // Leading whitespace keeps accumulating until there is real text
                if !is_blank(&text) {
                    parts.push(DefinitionPart::Text(std::mem::take(&mut text)));
                }
                parts.push(DefinitionPart::SubList(list_entries(e)));
                continue;
            }
            match Flow::of(e) {
                Flow::Ignored => continue,
                Flow::Inline => {}
                Flow::Block => break_line(&mut text),
            }
        }
        flatten_into(child, &mut text);
    }
    if !is_blank(&text) {
        parts.push(DefinitionPart::Text(text));
    }
    parts
}

/// The entries of an `<ol>`, which on these pages always holds definitions
pub fn definitions(list: &DOMElement) -> Vec<DefinitionEntry> {
    let mut index = 0;
    let mut entries = Vec::new();
    for child in list.child_elements() {
        if child.is("li") {
            if is_skipped_item(child, &flatten(child)) {
                continue;
            }
            index += 1;
            entries.push(DefinitionEntry::Numbered {
                index,
                parts: definition_parts(child),
            });
        } else {
            entries.push(DefinitionEntry::Aside(flatten(child)));
        }
    }
    entries
}

/// Appends the blocks `content` stands for to `blocks`
pub fn classify_into(content: &DOMContent, blocks: &mut Vec<Block>) {
    match content {
        DOMContent::Text(t) if !is_blank(t) => blocks.push(Block::Paragraph(t.clone())),
        DOMContent::Text(_) | DOMContent::Whitespace => {}
        DOMContent::Element(element) => classify_element(element, blocks),
    }
}

fn classify_element(element: &DOMElement, blocks: &mut Vec<Block>) {
    match element.name.as_str() {
        "h3" => {
            blocks.push(Block::Separator);
            blocks.push(Block::Heading {
                level: 3,
                text: header_text_or_default(element),
            });
        }
        "h4" | "h5" | "h6" => blocks.push(Block::Heading {
            level: heading_level(&element.name).unwrap_or(4),
            text: header_text_or_default(element),
        }),
        "p" => blocks.push(Block::Paragraph(flatten(element))),
        "ul" | "dl" => blocks.push(Block::BulletList(list_entries(element))),
        "ol" => blocks.push(Block::NumberedDefinitionList(definitions(element))),
        "tbody" => blocks.push(match table::layout(element) {
            Ok(table) => Block::Table(table),
            Err(e) => {
                trace!("{}", e);
                Block::InvalidTable
            }
        }),
        "hr" | "style" | "script" | "link" | "meta" => {}
        _ => element
            .contents
            .iter()
            .for_each(|child| classify_into(child, blocks)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use html::parse;

    fn classify_html(input: &str) -> Vec<Block> {
        let dom = parse(input).unwrap();
        let mut blocks = Vec::new();
        dom.contents.iter().for_each(|c| classify_into(c, &mut blocks));
        blocks
    }

    fn numbered_text(entry: &DefinitionEntry) -> (usize, String) {
        match entry {
            DefinitionEntry::Numbered { index, parts } => {
                let text = parts
                    .iter()
                    .filter_map(|p| match p {
                        DefinitionPart::Text(t) => Some(t.as_str()),
                        DefinitionPart::SubList(_) => None,
                    })
                    .collect::<Vec<_>>()
                    .join("|");
                (*index, text)
            }
            DefinitionEntry::Aside(t) => panic!("unexpected aside {:?}", t),
        }
    }

    #[test]
    fn empty_definition_items_keep_numbering_contiguous() {
        let blocks =
            classify_html(r#"<ol><li>first</li><li class="mw-empty-elt"></li><li>second</li></ol>"#);
        assert_eq!(blocks.len(), 1);
        let Block::NumberedDefinitionList(entries) = &blocks[0] else {
            panic!("expected a definition list, got {:?}", blocks[0]);
        };
        let numbered: Vec<_> = entries.iter().map(numbered_text).collect();
        assert_eq!(numbered, vec![(1, "first".to_string()), (2, "second".to_string())]);
    }

    #[test]
    fn blank_definition_items_do_not_consume_numbers() {
        let blocks = classify_html("<ol><li> </li><li>only</li></ol>");
        let Block::NumberedDefinitionList(entries) = &blocks[0] else {
            panic!("expected a definition list");
        };
        assert_eq!(entries.iter().map(numbered_text).collect::<Vec<_>>(), vec![(1, "only".to_string())]);
    }

    #[test]
    fn non_items_in_ordered_list_are_asides() {
        let blocks = classify_html("<ol><li>one</li><div>note</div></ol>");
        let Block::NumberedDefinitionList(entries) = &blocks[0] else {
            panic!("expected a definition list");
        };
        assert_eq!(entries[1], DefinitionEntry::Aside("note".to_string()));
    }

    #[test]
    fn nested_lists_become_sublists() {
        let blocks = classify_html(
            "<ol><li>A <a>domestic</a> cat.<dl><dd>The cat sat.</dd><dd class=\"mw-empty-elt\"></dd></dl> trailing</li></ol>",
        );
        let Block::NumberedDefinitionList(entries) = &blocks[0] else {
            panic!("expected a definition list");
        };
        let DefinitionEntry::Numbered { index, parts } = &entries[0] else {
            panic!("expected a numbered entry");
        };
        assert_eq!(*index, 1);
        assert_eq!(
            parts,
            &vec![
                DefinitionPart::Text("A domestic cat.".to_string()),
                DefinitionPart::SubList(vec![ListEntry::Bullet("The cat sat.".to_string())]),
                DefinitionPart::Text(" trailing".to_string()),
            ]
        );
    }

    #[test]
    fn whitespace_before_sublist_is_not_flushed() {
        let item = parse("<li> <ul><li>quote</li></ul></li>").unwrap();
        let li = item.child_elements().next().unwrap();
        let parts = definition_parts(li);
        assert_eq!(
            parts,
            vec![DefinitionPart::SubList(vec![ListEntry::Bullet("quote".to_string())])]
        );
    }

    #[test]
    fn block_children_of_definitions_break_lines() {
        let item = parse("<li>sense<div>gloss</div><style>.x{}</style></li>").unwrap();
        let li = item.child_elements().next().unwrap();
        assert_eq!(definition_parts(li), vec![DefinitionPart::Text("sense\ngloss".to_string())]);
    }

    #[test]
    fn bullet_lists_skip_empty_items() {
        let blocks = classify_html(
            "<ul><li>one</li><li class=\"mw-empty-elt\">hidden</li><li><span></span></li><p>aside</p></ul>",
        );
        assert_eq!(
            blocks,
            vec![Block::BulletList(vec![
                ListEntry::Bullet("one".to_string()),
                ListEntry::Plain("aside".to_string()),
            ])]
        );
    }

    #[test]
    fn headings() {
        let blocks = classify_html(
            "<h3><span class=\"mw-headline\" id=\"Noun\">Noun</span></h3>\
             <h4><span class=\"mw-headline\"><i>Derived</i> terms</span></h4>\
             <h5>no label</h5>",
        );
        assert_eq!(
            blocks,
            vec![
                Block::Separator,
                Block::Heading { level: 3, text: "Noun".to_string() },
                Block::Heading { level: 4, text: "Derived".to_string() },
                Block::Heading { level: 5, text: MISSING_HEADER_TEXT.to_string() },
            ]
        );
    }

    #[test]
    fn containers_are_passed_through() {
        let blocks = classify_html("<div><section><p>inner</p></section><hr><style>p{}</style></div>");
        assert_eq!(blocks, vec![Block::Paragraph("inner".to_string())]);
    }

    #[test]
    fn deeply_nested_tag_soup_is_classified() {
        let input = format!("{}<p>deep</p>", "<div>".repeat(20_000));
        let blocks = classify_html(&input);
        assert_eq!(blocks.last(), Some(&Block::Paragraph("deep".to_string())));
        let dom = parse(&input).unwrap();
        assert_eq!(flatten(&dom).trim(), "deep");
    }

    #[test]
    fn tables_are_laid_out() {
        let blocks = classify_html(
            "<div><table><tbody><tr><th>sg</th><th>pl</th></tr><tr><td>cat</td><td>cats</td></tr></tbody></table></div>\
             <table><tbody><tr></tr></tbody></table>",
        );
        assert_eq!(blocks.len(), 2);
        let Block::Table(table) = &blocks[0] else {
            panic!("expected a table, got {:?}", blocks[0]);
        };
        assert_eq!(table.columns, 2);
        assert_eq!(table.rows[1].cells[1].text, "cats");
        assert_eq!(blocks[1], Block::InvalidTable);
    }
}
