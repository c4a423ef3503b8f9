use crate::article::{Article, Section, SectionHeading};
use crate::blocks::{Block, DefinitionEntry, DefinitionPart, ListEntry};
use crate::query::{ContentError, Query};
use crate::table::Table;
use std::fmt::{self, Display, Formatter, Write};

const RULE_WIDTH: usize = 40;
const LOADING_FRAMES: [&str; 4] = ["... ", ".. .", ". ..", " ..."];
const FRAMES_PER_STEP: u64 = 30;

/// The animation shown while a query is pending, advanced once per frame
pub fn loading_indicator(frame: u64) -> &'static str {
    LOADING_FRAMES[(frame / FRAMES_PER_STEP % LOADING_FRAMES.len() as u64) as usize]
}

fn width(text: &str) -> usize {
    text.chars().count()
}

/// Writes `text` after `prefix`, lining continuation lines up under the first
fn write_hanging(f: &mut impl Write, indent: usize, prefix: &str, text: &str) -> fmt::Result {
    let mut lines = text.trim_end().lines();
    let first = lines.next().unwrap_or_default();
    writeln!(f, "{:indent$}{}{}", "", prefix, first, indent = indent)?;
    let hang = indent + width(prefix);
    for line in lines {
        writeln!(f, "{:hang$}{}", "", line, hang = hang)?;
    }
    Ok(())
}

fn write_list(f: &mut impl Write, indent: usize, entries: &[ListEntry]) -> fmt::Result {
    for entry in entries {
        match entry {
            ListEntry::Bullet(text) => write_hanging(f, indent, "• ", text)?,
            ListEntry::Plain(text) => write_hanging(f, indent, "", text)?,
        }
    }
    Ok(())
}

fn write_definitions(f: &mut impl Write, entries: &[DefinitionEntry]) -> fmt::Result {
    for entry in entries {
        match entry {
            DefinitionEntry::Numbered { index, parts } => {
                let number = format!("{}. ", index);
                let mut prefix = number.as_str();
                for part in parts {
                    match part {
                        DefinitionPart::Text(text) => {
                            let indent = if prefix.is_empty() { width(&number) } else { 0 };
                            write_hanging(f, indent, prefix, text.trim_start())?;
                        }
                        DefinitionPart::SubList(entries) => {
                            if !prefix.is_empty() {
                                writeln!(f, "{}", number.trim_end())?;
                            }
                            write_list(f, width(&number) + 2, entries)?;
                        }
                    }
                    prefix = "";
                }
                if parts.is_empty() {
                    writeln!(f, "{}", number.trim_end())?;
                }
            }
            DefinitionEntry::Aside(text) => write_hanging(f, 0, ". ", text)?,
        }
    }
    Ok(())
}

fn write_table(f: &mut impl Write, table: &Table) -> fmt::Result {
    let cell_text = |text: &str| text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut widths = vec![0; table.columns];
    for cell in table.rows.iter().flat_map(|r| &r.cells) {
        if cell.column_span == 1 {
            widths[cell.column] = widths[cell.column].max(width(&cell_text(&cell.text)));
        }
    }
    for row in &table.rows {
        let mut line = String::new();
        let mut column = 0;
        while column < table.columns {
            if column > 0 {
                line.push_str(" | ");
            }
            let (text, end) = match row.cell_at(column) {
                Some(cell) => (
                    cell_text(&cell.text),
                    (column + cell.column_span).min(table.columns),
                ),
                None => (String::new(), column + 1),
            };
            let span_width =
                widths[column..end].iter().sum::<usize>() + 3 * (end - column - 1);
            write!(line, "{:<w$}", text, w = span_width)?;
            column = end;
        }
        writeln!(f, "{}", line.trim_end())?;
    }
    Ok(())
}

fn write_block(f: &mut impl Write, block: &Block) -> fmt::Result {
    match block {
        Block::Heading { level, text } => {
            let underline = if *level <= 3 { "=" } else { "-" };
            writeln!(f, "{}", text)?;
            writeln!(f, "{}", underline.repeat(width(text)))
        }
        Block::Paragraph(text) => write_hanging(f, 0, "", text.trim_start()),
        Block::BulletList(entries) => write_list(f, 0, entries),
        Block::NumberedDefinitionList(entries) => write_definitions(f, entries),
        Block::Table(table) => write_table(f, table),
        Block::InvalidTable => writeln!(f, "(Invalid table)"),
        Block::Separator => writeln!(f, "{}", "─".repeat(RULE_WIDTH)),
    }
}

/// Renders extracted articles as plain text for a terminal
#[derive(Debug, Clone)]
pub struct TextRenderer {
    default_language: String,
    show_all: bool,
}

impl TextRenderer {
    pub fn new(default_language: &str, show_all: bool) -> Self {
        Self {
            default_language: default_language.to_string(),
            show_all,
        }
    }

    fn is_open(&self, section: &Section) -> bool {
        self.show_all || section.default_open(&self.default_language)
    }

    fn write_section(&self, f: &mut impl Write, section: &Section) -> fmt::Result {
        let open = self.is_open(section);
        match &section.heading {
            SectionHeading::Preamble => {}
            SectionHeading::Unlabeled => writeln!(f, "{}", "═".repeat(RULE_WIDTH))?,
            SectionHeading::Language(label) => {
                writeln!(f, "{} {}", if open { "▾" } else { "▸" }, label)?
            }
        }
        if open {
            for block in &section.blocks {
                writeln!(f)?;
                write_block(f, block)?;
            }
        }
        Ok(())
    }

    pub fn write_article(&self, f: &mut impl Write, article: &Article) -> fmt::Result {
        for (i, section) in article.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            self.write_section(f, section)?;
        }
        Ok(())
    }

    pub fn write_result(
        &self,
        f: &mut impl Write,
        result: &Result<Article, ContentError>,
    ) -> fmt::Result {
        match result {
            Ok(article) => self.write_article(f, article),
            Err(e) => writeln!(f, "{}", e.user_message()),
        }
    }

    /// A [`Display`] for a query: its term, then its article or the
    /// loading indicator
    pub fn query<'a>(&'a self, query: &'a Query, frame: u64) -> RenderedQuery<'a> {
        RenderedQuery {
            renderer: self,
            query,
            frame,
        }
    }
}

pub struct RenderedQuery<'a> {
    renderer: &'a TextRenderer,
    query: &'a Query,
    frame: u64,
}

impl Display for RenderedQuery<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.query.term())?;
        writeln!(f, "{}", "━".repeat(width(self.query.term())))?;
        match self.query.result() {
            Some(result) => self.renderer.write_result(f, result),
            None => writeln!(f, "{}", loading_indicator(self.frame)),
        }
    }
}
