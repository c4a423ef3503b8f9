use crate::text::flatten;
use html::DOMElement;
use thiserror::Error;
use tracing::{span, trace, Level};

/// Spans, and the width of a whole table, above this are treated as this
const MAX_SPAN: usize = 1000;

/// Rows carrying this class are the duplicate summary shown when a table is collapsed
const COLLAPSED_ROW_CLASS: &str = "vsShow";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub columns: usize,
    pub rows: Vec<TableRow>,
}

/// The cells placed in one grid row. Columns covered by a span have no cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCell {
    pub column: usize,
    pub column_span: usize,
    pub text: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("table has no row with header or data cells")]
    NoCells,
}

impl TableRow {
    pub fn cell_at(&self, column: usize) -> Option<&TableCell> {
        self.cells.iter().find(|c| c.column == column)
    }
}

fn is_cell(element: &DOMElement) -> bool {
    element.is("th") || element.is("td")
}

fn rows(tbody: &DOMElement) -> impl Iterator<Item = &DOMElement> {
    tbody.child_elements().filter(|e| e.is("tr"))
}

fn cells(row: &DOMElement) -> impl Iterator<Item = &DOMElement> {
    row.child_elements().filter(|e| is_cell(e))
}

/// Parses a `colspan`/`rowspan` value the way `%d` would, falling back to 1
/// and capping at [`MAX_SPAN`]
fn parse_span(value: Option<&str>) -> usize {
    value
        .map(|v| {
            let v = v.trim_start();
            let digits = v.find(|c: char| !c.is_ascii_digit()).unwrap_or(v.len());
            match &v[..digits] {
                "" => 1,
                // Too many digits for usize is still a number, just a huge one
                d => d.parse::<usize>().unwrap_or(MAX_SPAN),
            }
        })
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

#[cfg(test)]
#[test]
fn test_parse_span() {
    assert_eq!(parse_span(None), 1);
    assert_eq!(parse_span(Some("3")), 3);
    assert_eq!(parse_span(Some(" 2px")), 2);
    assert_eq!(parse_span(Some("wide")), 1);
    assert_eq!(parse_span(Some("0")), 1);
    assert_eq!(parse_span(Some("-2")), 1);
    assert_eq!(parse_span(Some("1000000000")), MAX_SPAN);
    assert_eq!(parse_span(Some("18446744073709551615")), MAX_SPAN);
    assert_eq!(parse_span(Some("99999999999999999999999")), MAX_SPAN);
}

/// Returns the amount of columns occupied by the table cell
fn cell_width(cell: &DOMElement) -> usize {
    parse_span(cell.get_attribute("colspan"))
}

/// Returns the amount of rows occupied by the table cell
fn cell_height(cell: &DOMElement) -> usize {
    parse_span(cell.get_attribute("rowspan"))
}

/// The number of columns, taken from the first row which has any cells
fn table_width(tbody: &DOMElement) -> Result<usize, TableError> {
    rows(tbody)
        .find(|row| cells(row).next().is_some())
        .map(|row| {
            cells(row)
                .map(cell_width)
                .fold(0, usize::saturating_add)
                .min(MAX_SPAN)
        })
        .ok_or(TableError::NoCells)
}

/// Places the cells of one `<tr>`.
///
/// `rowspans[i] = n` means column `i` is still covered by a cell from an
/// earlier row for the next `n` rows.
fn layout_row(tr: &DOMElement, columns: usize, rowspans: &mut [usize]) -> TableRow {
    let mut row = TableRow::default();
    let mut column = 0;
    'cells: for cell in cells(tr) {
        if column >= columns {
            break;
        }
        while rowspans[column] > 0 {
            rowspans[column] -= 1;
            column += 1;
            if column >= columns {
                break 'cells;
            }
        }
        let width = cell_width(cell);
        row.cells.push(TableCell {
            column,
            column_span: width,
            text: flatten(cell),
        });
        let height = cell_height(cell);
        for covered in rowspans.iter_mut().skip(column).take(width) {
            *covered = height - 1;
        }
        column += width;
    }
    // Columns the row never reached still count the row against their spans
    for covered in rowspans.iter_mut().skip(column) {
        *covered = covered.saturating_sub(1);
    }
    row
}

/// Reconstructs the grid of a `<tbody>`
pub fn layout(tbody: &DOMElement) -> Result<Table, TableError> {
    let span = span!(Level::DEBUG, "Laying out table");
    let _enter = span.enter();
    let columns = table_width(tbody)?;
    let mut rowspans = vec![0; columns];
    let rows = rows(tbody)
        .filter(|tr| {
            let collapsed = tr.class_is(COLLAPSED_ROW_CLASS);
            if collapsed {
                trace!("Skipping collapsed-only row");
            }
            !collapsed
        })
        .map(|tr| layout_row(tr, columns, &mut rowspans))
        .collect();
    Ok(Table { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use html::parse;

    fn tbody(rows: &str) -> DOMElement {
        let dom = parse(&format!("<table><tbody>{}</tbody></table>", rows)).unwrap();
        let table = dom.child_elements().next().unwrap();
        let tbody = table.child_elements().next().unwrap().clone();
        tbody
    }

    fn placed(row: &TableRow) -> Vec<(usize, &str)> {
        row.cells.iter().map(|c| (c.column, c.text.as_str())).collect()
    }

    #[test]
    fn plain_row() {
        let table = layout(&tbody("<tr><td>a</td><td>b</td><td>c</td></tr>")).unwrap();
        assert_eq!(table.columns, 3);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(placed(&table.rows[0]), vec![(0, "a"), (1, "b"), (2, "c")]);
    }

    #[test]
    fn width_comes_from_first_row_with_cells() {
        let table = layout(&tbody(
            "<tr></tr><tr><th colspan=\"2\">head</th><th>x</th></tr><tr><td>1</td><td>2</td><td>3</td></tr>",
        ))
        .unwrap();
        assert_eq!(table.columns, 3);
        assert!(table.rows[0].cells.is_empty());
        assert_eq!(table.rows[1].cells[0].column_span, 2);
        assert_eq!(placed(&table.rows[1]), vec![(0, "head"), (2, "x")]);
    }

    #[test]
    fn spanning_cell_covers_next_row() {
        let table = layout(&tbody(
            "<tr><td colspan=\"2\" rowspan=\"2\">big</td><td>r</td></tr>\
             <tr><td>next</td></tr>\
             <tr><td>a</td><td>b</td><td>c</td></tr>",
        ))
        .unwrap();
        assert_eq!(table.columns, 3);
        assert_eq!(placed(&table.rows[0]), vec![(0, "big"), (2, "r")]);
        // Columns 0 and 1 are taken by "big"
        assert_eq!(placed(&table.rows[1]), vec![(2, "next")]);
        assert!(table.rows[1].cell_at(0).is_none());
        assert_eq!(placed(&table.rows[2]), vec![(0, "a"), (1, "b"), (2, "c")]);
    }

    #[test]
    fn column_after_span_is_available() {
        let table = layout(&tbody(
            "<tr><td rowspan=\"2\">left</td><td>a</td></tr><tr><td>b</td></tr>",
        ))
        .unwrap();
        assert_eq!(table.columns, 2);
        assert_eq!(placed(&table.rows[1]), vec![(1, "b")]);
    }

    #[test]
    fn short_row_still_counts_down_spans() {
        // The second row ends before reaching column 2, which must still be
        // released for the third row.
        let table = layout(&tbody(
            "<tr><td>a</td><td>b</td><td rowspan=\"2\">tall</td></tr>\
             <tr><td>c</td></tr>\
             <tr><td>d</td><td>e</td><td>f</td></tr>",
        ))
        .unwrap();
        assert_eq!(placed(&table.rows[1]), vec![(0, "c")]);
        assert_eq!(placed(&table.rows[2]), vec![(0, "d"), (1, "e"), (2, "f")]);
    }

    #[test]
    fn overflowing_cells_are_dropped() {
        let table = layout(&tbody(
            "<tr><td>a</td><td>b</td></tr><tr><td>1</td><td>2</td><td>3</td></tr>",
        ))
        .unwrap();
        assert_eq!(placed(&table.rows[1]), vec![(0, "1"), (1, "2")]);
    }

    #[test]
    fn oversized_colspan_is_clamped() {
        let table = layout(&tbody(
            "<tr><td>a</td><td>b</td></tr><tr><td colspan=\"5\" rowspan=\"2\">wide</td></tr><tr><td>x</td></tr>",
        ))
        .unwrap();
        assert_eq!(placed(&table.rows[1]), vec![(0, "wide")]);
        assert!(table.rows[2].cells.is_empty());
    }

    #[test]
    fn collapsed_rows_are_skipped() {
        let table = layout(&tbody(
            "<tr class=\"vsShow\"><td>summary</td><td>s</td></tr><tr><td>full</td><td>f</td></tr>",
        ))
        .unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(placed(&table.rows[0]), vec![(0, "full"), (1, "f")]);
    }

    #[test]
    fn malformed_spans_default_to_one() {
        let table = layout(&tbody("<tr><td colspan=\"x\">a</td><td rowspan=\"\">b</td></tr><tr><td>c</td><td>d</td></tr>")).unwrap();
        assert_eq!(table.columns, 2);
        assert_eq!(placed(&table.rows[1]), vec![(0, "c"), (1, "d")]);
    }

    #[test]
    fn huge_spans_are_capped() {
        let table = layout(&tbody(
            "<tr><td colspan=\"18446744073709551615\">a</td><td colspan=\"2\">b</td></tr>\
             <tr><td rowspan=\"1000000000\">c</td><td>d</td></tr><tr><td>e</td></tr>",
        ))
        .unwrap();
        assert_eq!(table.columns, MAX_SPAN);
        assert_eq!(table.rows[0].cells[0].column_span, MAX_SPAN);
        // "a" fills the whole grid, leaving no room for "b"
        assert_eq!(placed(&table.rows[0]), vec![(0, "a")]);
        assert_eq!(placed(&table.rows[1]), vec![(0, "c"), (1, "d")]);
        // Column 0 is still covered by "c"
        assert_eq!(placed(&table.rows[2]), vec![(1, "e")]);
    }

    #[test]
    fn many_wide_cells_stay_within_limit() {
        let row = "<td colspan=\"1000\">w</td>".repeat(5);
        let table = layout(&tbody(&format!("<tr>{}</tr>", row))).unwrap();
        assert_eq!(table.columns, MAX_SPAN);
        assert_eq!(table.rows[0].cells.len(), 1);
    }

    #[test]
    fn table_without_cells_is_invalid() {
        assert_eq!(layout(&tbody("<tr></tr>")), Err(TableError::NoCells));
        assert_eq!(layout(&tbody("")), Err(TableError::NoCells));
    }
}
