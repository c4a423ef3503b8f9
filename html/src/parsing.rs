use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, tag_no_case, take_till, take_till1, take_until, take_while1},
    character::complete::{anychar, char, multispace0, multispace1},
    combinator::{map, opt, peek, recognize, rest, value, verify},
    multi::{many0, many_till},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;
use tracing::{span, trace, Level};

use super::{DOMAttributes, DOMContent, DOMElement};
use std::collections::HashMap;

/// Elements which never have contents
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose contents run verbatim up to the matching close tag
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Deeper elements are added as empty siblings instead of being opened
pub const MAX_TREE_DEPTH: usize = 256;

/// Opening any of these while a `<p>` is the current element closes the `<p>`
const P_CLOSERS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "ul",
];

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("could not tokenize input: {0}")]
    Syntax(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Open {
        name: String,
        attributes: DOMAttributes,
        self_closing: bool,
    },
    Close(String),
    Text(&'a str),
    RawText(&'a str),
    /// Comments, doctypes and processing instructions
    Ignored,
}

pub(crate) fn is_whitespace(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_whitespace())
}

fn decode(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Attempt to parse a string as a valid tag name, lower-casing it
fn parse_tag_name(input: &str) -> IResult<&str, String> {
    map(
        verify(
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == ':'),
            |s: &str| s.starts_with(|c: char| c.is_ascii_alphabetic()),
        ),
        |s: &str| s.to_ascii_lowercase(),
    )(input)
}

/// Parse a tag in the form `</name>`, returning `name`
fn parse_close_tag(input: &str) -> IResult<&str, Token<'_>> {
    let (remaining, (_, name, _, _)) =
        tuple((tag("</"), parse_tag_name, take_till(|c: char| c == '>'), char('>')))(input)?;
    Ok((remaining, Token::Close(name)))
}

/// Parse a tag in the form `<name attr=value ...>` or `<name ... />`
fn parse_open_tag(input: &str) -> IResult<&str, Token<'_>> {
    let (remaining, (_, name, attrs, _, slash, _)) = tuple((
        char('<'),
        parse_tag_name,
        many0(preceded(multispace1, single_attr_parser)),
        multispace0,
        opt(char('/')),
        char('>'),
    ))(input)?;
    let mut attributes = HashMap::new();
    for (k, v) in attrs {
        // The first occurrence of a duplicated attribute wins
        attributes
            .entry(k.to_ascii_lowercase())
            .or_insert_with(|| decode(v));
    }
    Ok((
        remaining,
        Token::Open {
            name,
            attributes: DOMAttributes(attributes),
            self_closing: slash.is_some(),
        },
    ))
}

#[cfg(test)]
#[test]
fn test_tag_parse() {
    let data = r#"<div>"#;
    let target = Token::Open {
        name: "div".to_string(),
        attributes: DOMAttributes::empty(),
        self_closing: false,
    };
    assert_eq!(parse_open_tag(data).unwrap(), ("", target));

    let data = r#"<DIV class=nothing>"#;
    let target = Token::Open {
        name: "div".to_string(),
        attributes: crate::attributes!("class" => "nothing"),
        self_closing: false,
    };
    assert_eq!(parse_open_tag(data).unwrap(), ("", target));

    let data = r#"<a attr1 attr2=two attr3='three' attr4="number four" href="/wiki/a&amp;b">"#;
    let target = Token::Open {
        name: "a".to_string(),
        attributes: crate::attributes!(
            "attr1" => "",
            "attr2" => "two",
            "attr3" => "three",
            "attr4" => "number four",
            "href" => "/wiki/a&b",
        ),
        self_closing: false,
    };
    assert_eq!(parse_open_tag(data).unwrap(), ("", target));

    let data = r#"<br/>"#;
    let target = Token::Open {
        name: "br".to_string(),
        attributes: DOMAttributes::empty(),
        self_closing: true,
    };
    assert_eq!(parse_open_tag(data).unwrap(), ("", target));
}

#[cfg(test)]
#[test]
fn test_close_tag_parse() {
    assert_eq!(
        parse_close_tag("</Span >rest").unwrap(),
        ("rest", Token::Close("span".to_string()))
    );
    assert!(parse_close_tag("</>").is_err());
}

fn parse_comment(input: &str) -> IResult<&str, Token<'_>> {
    value(
        Token::Ignored,
        preceded(
            tag("<!--"),
            alt((terminated(take_until("-->"), tag("-->")), rest)),
        ),
    )(input)
}

fn parse_markup_declaration(input: &str) -> IResult<&str, Token<'_>> {
    value(
        Token::Ignored,
        tuple((
            alt((tag("<!"), tag("<?"))),
            take_till(|c: char| c == '>'),
            opt(char('>')),
        )),
    )(input)
}

fn parse_text(input: &str) -> IResult<&str, Token<'_>> {
    map(take_till1(|c: char| c == '<'), Token::Text)(input)
}

/// A `<` which does not start any markup is plain text
fn parse_stray_lt(input: &str) -> IResult<&str, Token<'_>> {
    map(tag("<"), Token::Text)(input)
}

fn parse_token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        parse_comment,
        parse_markup_declaration,
        parse_close_tag,
        parse_open_tag,
        parse_text,
        parse_stray_lt,
    ))(input)
}

/// Everything up to (not including) `</name`, or the rest of the input if it never closes
fn parse_raw_text<'a>(name: &str, input: &'a str) -> IResult<&'a str, &'a str> {
    let closing = format!("</{}", name);
    let result = alt((
        recognize(many_till(anychar, peek(tag_no_case(closing.as_str())))),
        rest,
    ))(input);
    result
}

#[cfg(test)]
#[test]
fn test_raw_text_parse() {
    assert_eq!(
        parse_raw_text("style", "a > b { x: 1 }</STYLE>").unwrap(),
        ("</STYLE>", "a > b { x: 1 }")
    );
    assert_eq!(parse_raw_text("script", "if (a<b) {}").unwrap(), ("", "if (a<b) {}"));
}

fn tokenize(input: &str) -> IResult<&str, Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut input = input;
    while !input.is_empty() {
        let (remaining, token) = parse_token(input)?;
        input = remaining;
        let raw = match &token {
            Token::Open {
                name,
                self_closing: false,
                ..
            } if RAW_TEXT_ELEMENTS.contains(&name.as_str()) => Some(name.clone()),
            _ => None,
        };
        tokens.push(token);
        if let Some(name) = raw {
            let (remaining, text) = parse_raw_text(&name, input)?;
            input = remaining;
            if !text.is_empty() {
                tokens.push(Token::RawText(text));
            }
        }
    }
    Ok((input, tokens))
}

/// Whether opening `opening` while `open` is the current element ends `open`
fn closes_implicitly(opening: &str, open: &str) -> bool {
    match open {
        "p" => P_CLOSERS.contains(&opening),
        "li" => opening == "li",
        "dt" | "dd" => matches!(opening, "dt" | "dd"),
        "td" | "th" => matches!(opening, "td" | "th" | "tr" | "tbody" | "thead" | "tfoot"),
        "tr" => matches!(opening, "tr" | "tbody" | "thead" | "tfoot"),
        "tbody" | "thead" | "tfoot" => matches!(opening, "tbody" | "thead" | "tfoot"),
        "option" => opening == "option",
        _ => false,
    }
}

/// Assembles tokens into a tree, recovering from the usual tag soup
struct TreeBuilder {
    root: DOMElement,
    open: Vec<DOMElement>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            root: DOMElement::new("#document", None, vec![]),
            open: vec![],
        }
    }

    fn current_name(&self) -> Option<&str> {
        self.open.last().map(|e| e.name.as_str())
    }

    fn append(&mut self, content: DOMContent) {
        let parent = self.open.last_mut().unwrap_or(&mut self.root);
        if let DOMContent::Text(next) = &content {
            if let Some(DOMContent::Text(prev)) = parent.contents.last_mut() {
                prev.push_str(next);
                return;
            }
        }
        parent.contents.push(content);
    }

    fn pop(&mut self) {
        if let Some(element) = self.open.pop() {
            self.append(element.into());
        }
    }

    fn feed(&mut self, token: Token) {
        match token {
            Token::Open {
                name,
                attributes,
                self_closing,
            } => self.open_element(name, attributes, self_closing),
            Token::Close(name) => self.close_element(&name),
            Token::Text(text) => {
                let content = if is_whitespace(text) {
                    DOMContent::Whitespace
                } else {
                    DOMContent::Text(decode(text))
                };
                self.append(content);
            }
            Token::RawText(text) => {
                let text = match self.current_name() {
                    Some("script") | Some("style") => text.to_string(),
                    _ => decode(text),
                };
                self.append(DOMContent::Text(text));
            }
            Token::Ignored => {}
        }
    }

    fn open_element(&mut self, name: String, attributes: DOMAttributes, self_closing: bool) {
        while self
            .current_name()
            .map_or(false, |open| closes_implicitly(&name, open))
        {
            self.pop();
        }
        if name == "tr" && self.current_name() == Some("table") {
            self.open.push(DOMElement::new("tbody", None, vec![]));
        }
        let element = DOMElement::new(name, Some(attributes), vec![]);
        let too_deep = self.open.len() >= MAX_TREE_DEPTH;
        if too_deep {
            trace!("Not opening <{}> past the depth limit", element.name);
        }
        if too_deep || self_closing || VOID_ELEMENTS.contains(&element.name.as_str()) {
            self.append(element.into());
        } else {
            self.open.push(element);
        }
    }

    fn close_element(&mut self, name: &str) {
        match self.open.iter().rposition(|e| e.name == name) {
            Some(index) => {
                while self.open.len() > index {
                    self.pop();
                }
            }
            None => trace!("Ignoring stray closing tag </{}>", name),
        }
    }

    /// Closes everything still open and returns the `html` element
    fn finish(mut self) -> DOMElement {
        while !self.open.is_empty() {
            self.pop();
        }
        let mut contents = self.root.contents;
        match contents
            .iter()
            .position(|c| matches!(c, DOMContent::Element(e) if e.is("html")))
        {
            Some(index) => match contents.swap_remove(index) {
                DOMContent::Element(html) => html,
                other => DOMElement::new("html", None, vec![other]),
            },
            None => DOMElement::new("html", None, contents),
        }
    }
}

/// Parse a complete document, returning its `html` element
pub fn document(input: &str) -> IResult<&str, DOMElement> {
    let (remaining, tokens) = tokenize(input)?;
    let mut builder = TreeBuilder::new();
    tokens.into_iter().for_each(|t| builder.feed(t));
    Ok((remaining, builder.finish()))
}

pub fn parse(input: &str) -> Result<DOMElement, ParseError> {
    let span = span!(Level::DEBUG, "Parsing HTML", bytes = input.len());
    let _enter = span.enter();
    document(input)
        .map(|(_, dom)| dom)
        .map_err(|e| ParseError::Syntax(e.to_string()))
}

// Attribute parsing below

fn parse_single_quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('\''), take_till(|c: char| c == '\''), char('\''))(input)
}

fn parse_double_quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_till(|c: char| c == '"'), char('"'))(input)
}

fn parse_unquoted(input: &str) -> IResult<&str, &str> {
    is_not(" \t\r\n\"'=<>`")(input)
}

fn value_parser(input: &str) -> IResult<&str, &str> {
    alt((parse_single_quoted, parse_double_quoted, parse_unquoted))(input)
}

fn name_parser(input: &str) -> IResult<&str, &str> {
    is_not(" \t\r\n\"'>/=")(input)
}

fn single_attr_parser(input: &str) -> IResult<&str, (&str, &str)> {
    let (remaining, (name, value)) = pair(
        name_parser,
        opt(preceded(
            tuple((multispace0, char('='), multispace0)),
            value_parser,
        )),
    )(input)?;
    Ok((remaining, (name, value.unwrap_or(""))))
}

#[cfg(test)]
#[test]
fn test_attr_parse() {
    assert_eq!(single_attr_parser("colspan = \"2\"").unwrap(), ("", ("colspan", "2")));
    assert_eq!(single_attr_parser("hidden>").unwrap(), (">", ("hidden", "")));
    assert_eq!(single_attr_parser("title=''").unwrap(), ("", ("title", "")));
}
