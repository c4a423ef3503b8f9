use html::{DOMContent, DOMElement};
use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::combinator::{all_consuming, map};
use nom::sequence::preceded;
use nom::IResult;
use tracing::{debug, span, Level};

/// Class marking the element whose children are the article body
pub const CONTENT_CLASS: &str = "mw-parser-output";

/// `body > #content > #bodyContent > #mw-content-text > .mw-parser-output`
const CONTENT_PATH: &[&str] = &[
    "body",
    "#content",
    "#bodyContent",
    "#mw-content-text",
    ".mw-parser-output",
];

/// A very simplified CSS selector, matched against a single element
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Selector<'a> {
    Tag(&'a str),
    Id(&'a str),
    Class(&'a str),
}

impl<'a> Selector<'a> {
    pub fn parse(input: &'a str) -> Option<Self> {
        all_consuming(parse_selector)(input).ok().map(|(_, s)| s)
    }

    pub fn matches(&self, element: &DOMElement) -> bool {
        match self {
            Selector::Tag(name) => element.name.eq_ignore_ascii_case(name),
            Selector::Id(id) => element.id_is(id),
            Selector::Class(class) => element.class_is(class),
        }
    }
}

fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_')(input)
}

fn parse_selector(input: &str) -> IResult<&str, Selector<'_>> {
    alt((
        map(preceded(char('#'), parse_identifier), Selector::Id),
        map(preceded(char('.'), parse_identifier), Selector::Class),
        map(parse_identifier, Selector::Tag),
    ))(input)
}

#[cfg(test)]
#[test]
fn test_parse_selector() {
    assert_eq!(Selector::parse("body"), Some(Selector::Tag("body")));
    assert_eq!(Selector::parse("#mw-content-text"), Some(Selector::Id("mw-content-text")));
    assert_eq!(Selector::parse(".mw-parser-output"), Some(Selector::Class("mw-parser-output")));
    assert_eq!(Selector::parse("div > p"), None);
    assert_eq!(Selector::parse(""), None);
}

/// Returns the first direct child of `element` matching `selector`
pub fn query_child<'a>(element: &'a DOMElement, selector: &Selector) -> Option<&'a DOMElement> {
    element.contents.iter().find_map(|c| match c {
        DOMContent::Element(e) if selector.matches(e) => Some(e),
        _ => None,
    })
}

/// Walks `path` one level at a time from `root`.
///
/// A step which matches no child leaves the walk where it was instead of
/// aborting it, so the result is only meaningful once the caller checks it.
pub fn query_path<'a>(root: &'a DOMElement, path: &[&str]) -> &'a DOMElement {
    path.iter().fold(root, |node, step| {
        match Selector::parse(step).and_then(|s| query_child(node, &s)) {
            Some(child) => child,
            None => {
                debug!("No child of <{}> matches {:?}, staying put", node.name, step);
                node
            }
        }
    })
}

/// Finds the element holding the article body, if the page has one
pub fn locate(root: &DOMElement) -> Option<&DOMElement> {
    let span = span!(Level::DEBUG, "Locating content");
    let _enter = span.enter();
    let node = query_path(root, CONTENT_PATH);
    node.class_is(CONTENT_CLASS).then_some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use html::{attributes, DOMElement};

    fn el(name: &str, attrs: Option<html::DOMAttributes>, contents: Vec<DOMContent>) -> DOMContent {
        DOMElement::new(name, attrs, contents).into()
    }

    fn page(content: DOMContent) -> DOMElement {
        DOMElement::new(
            "html",
            None,
            vec![
                el("head", None, vec![]),
                el(
                    "body",
                    None,
                    vec![el(
                        "div",
                        Some(attributes!("id" => "content")),
                        vec![el(
                            "div",
                            Some(attributes!("id" => "bodyContent")),
                            vec![el(
                                "div",
                                Some(attributes!("id" => "mw-content-text")),
                                vec![content],
                            )],
                        )],
                    )],
                ),
            ],
        )
    }

    #[test]
    fn finds_parser_output() {
        let root = page(el(
            "div",
            Some(attributes!("class" => CONTENT_CLASS)),
            vec!["word".into()],
        ));
        let found = locate(&root).unwrap();
        assert!(found.class_is(CONTENT_CLASS));
        assert_eq!(found.contents, vec![DOMContent::Text("word".to_string())]);
    }

    #[test]
    fn missing_wrapper_is_none() {
        let root = page(el("div", Some(attributes!("class" => "noarticletext")), vec![]));
        assert!(locate(&root).is_none());
        let bare = DOMElement::new("html", None, vec![el("body", None, vec![])]);
        assert!(locate(&bare).is_none());
    }

    #[test]
    fn only_direct_children_are_searched() {
        // The marker exists, but one level deeper than `#mw-content-text`
        let root = page(el(
            "div",
            None,
            vec![el("div", Some(attributes!("class" => CONTENT_CLASS)), vec![])],
        ));
        assert!(locate(&root).is_none());
    }

    #[test]
    fn failed_step_keeps_walking_from_same_node() {
        // No `#content` wrapper: the walk stays on <body> and still finds the
        // rest of the chain below it.
        let root = DOMElement::new(
            "html",
            None,
            vec![el(
                "body",
                None,
                vec![el(
                    "div",
                    Some(attributes!("id" => "bodyContent")),
                    vec![el(
                        "div",
                        Some(attributes!("id" => "mw-content-text")),
                        vec![el("div", Some(attributes!("class" => CONTENT_CLASS)), vec![])],
                    )],
                )],
            )],
        );
        assert!(locate(&root).is_some());
    }

    #[test]
    fn multi_class_wrapper_does_not_match() {
        let root = page(el(
            "div",
            Some(attributes!("class" => "mw-parser-output other")),
            vec![],
        ));
        assert!(locate(&root).is_none());
    }
}
