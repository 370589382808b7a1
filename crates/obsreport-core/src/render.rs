//! Table-driven text/HTML/XML rendering.
//!
//! Each output mode owns one small table mapping every logical [`Field`] to an
//! (open, close) tag pair. Rendering is a fold over a record stream: a record
//! is its entry tag pair wrapped around the tagged cells, and a document adds
//! the mode's header and footer. Text mode has no tags; each record carries
//! its own preformatted text line instead.

use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Output flavour of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Text,
    Html,
    Xml,
}

impl OutputMode {
    /// File extension for reports in this mode.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Html => "html",
            Self::Xml => "xml",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" | "txt" => Some(Self::Text),
            "html" => Some(Self::Html),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Html => write!(f, "html"),
            Self::Xml => write!(f, "xml"),
        }
    }
}

/// Logical fields of a rendered record. The discriminant indexes the tag tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Entry = 0,
    Event,
    Host,
    Pm,
    Ip,
    Date,
    Q,
    Average,
    Deviation,
    Version,
    Reference,
    Filename,
    Index,
}

const FIELD_COUNT: usize = 13;

type TagTable = [(&'static str, &'static str); FIELD_COUNT];

const XML_TAGS: TagTable = [
    ("<entry>\n", "\n</entry>\n"),
    ("<event>\n", "\n</event>\n"),
    ("<hostname>\n", "\n</hostname>\n"),
    ("<pm>\n", "\n</pm>\n"),
    ("<ip>\n", "\n</ip>\n"),
    ("<date>\n", "\n</date>\n"),
    ("<q>\n", "\n</q>\n"),
    ("<expect>\n", "\n</expect>\n"),
    ("<sigma>\n", "\n</sigma>\n"),
    ("<version>\n", "\n</version>\n"),
    ("<ref>\n", "\n</ref>\n"),
    ("<filename>\n", "\n</filename>\n"),
    ("<index>\n", "\n</index>\n"),
];

const HTML_TAGS: TagTable = [
    ("<tr>", "</tr>\n\n"),
    ("<td>", "</td>\n"),
    ("<td>", "</td>\n"),
    ("<td bgcolor=#add8e6>", "</td>\n"),
    ("<td bgcolor=#e0ffff>", "</td>\n"),
    ("<td bgcolor=#f0f8ff>", "</td>\n"),
    ("<td bgcolor=#fafafa>", "</td>\n"),
    ("<td bgcolor=#ededed>", "</td>\n"),
    ("<td bgcolor=#e0e0e0>", "</td>\n"),
    ("<td bgcolor=#add8e6>", "</td>\n"),
    ("<td bgcolor=#e0ffff>", "</td>\n"),
    ("<td bgcolor=#fafafa><small>", "</small></td>\n"),
    ("<td bgcolor=#fafafa><small>", "</small></td>\n"),
];

const TEXT_TAGS: TagTable = [("", ""); FIELD_COUNT];

fn tag_table(mode: OutputMode) -> &'static TagTable {
    match mode {
        OutputMode::Text => &TEXT_TAGS,
        OutputMode::Html => &HTML_TAGS,
        OutputMode::Xml => &XML_TAGS,
    }
}

/// (open, close) tags for `field` in `mode`.
pub fn tags(mode: OutputMode, field: Field) -> (&'static str, &'static str) {
    tag_table(mode)[field as usize]
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One formatted field value.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub field: Field,
    pub value: String,
    /// HTML-only label text around the value, e.g. `" Av "` / `" hrs "`.
    pub html_prefix: &'static str,
    pub html_suffix: &'static str,
    /// HTML-only line width; long values get `<br>` breaks.
    pub html_wrap: Option<usize>,
}

impl Cell {
    pub fn new(field: Field, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            html_prefix: "",
            html_suffix: "",
            html_wrap: None,
        }
    }

    pub fn labelled(mut self, prefix: &'static str, suffix: &'static str) -> Self {
        self.html_prefix = prefix;
        self.html_suffix = suffix;
        self
    }

    pub fn wrapped(mut self, width: usize) -> Self {
        self.html_wrap = Some(width);
        self
    }
}

/// One report row: tagged cells for markup modes, one line for text mode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub cells: Vec<Cell>,
    pub text: String,
}

impl Record {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            cells: Vec::new(),
            text: text.into(),
        }
    }

    pub fn cell(mut self, cell: Cell) -> Self {
        self.cells.push(cell);
        self
    }
}

/// Document-level decoration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub title: String,
    pub stylesheet: String,
    pub web_driver: String,
    pub banner: String,
    /// Extra header row written after the table opens (HTML only).
    pub column_headings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Fold
// ---------------------------------------------------------------------------

/// Escape markup-significant characters.
pub fn escape_markup(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Write the document header for `mode`.
pub fn write_header<W: Write>(out: &mut W, mode: OutputMode, doc: &Document) -> io::Result<()> {
    match mode {
        OutputMode::Text => Ok(()),
        OutputMode::Xml => write!(out, "<?xml version=\"1.0\"?>\n<output>\n"),
        OutputMode::Html => {
            let title = escape_markup(&doc.title);
            writeln!(out, "<html>")?;
            writeln!(out, "<head>")?;
            writeln!(out, "<title>{title}</title>")?;
            if !doc.stylesheet.is_empty() {
                writeln!(
                    out,
                    "<link rel=\"stylesheet\" href=\"{}\" type=\"text/css\">",
                    escape_markup(&doc.stylesheet)
                )?;
            }
            writeln!(out, "</head>")?;
            writeln!(out, "<body>")?;
            if !doc.banner.is_empty() {
                // Banner is trusted site markup.
                writeln!(out, "{}", doc.banner)?;
            }
            if !doc.web_driver.is_empty() {
                writeln!(
                    out,
                    "<div id=\"nav\"><a href=\"{}\">Back</a></div>",
                    escape_markup(&doc.web_driver)
                )?;
            }
            writeln!(out, "<h1>{title}</h1>")?;
            writeln!(out, "<table>")?;
            for heading in &doc.column_headings {
                write!(out, "<th> {} </th>", escape_markup(heading))?;
            }
            if !doc.column_headings.is_empty() {
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

/// Write the document footer for `mode`.
pub fn write_footer<W: Write>(out: &mut W, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Text => Ok(()),
        OutputMode::Xml => writeln!(out, "</output>"),
        OutputMode::Html => writeln!(out, "</table>\n</body>\n</html>"),
    }
}

/// Write one record.
pub fn write_record<W: Write>(out: &mut W, mode: OutputMode, record: &Record) -> io::Result<()> {
    if mode == OutputMode::Text {
        return writeln!(out, "{}", record.text);
    }
    let (entry_open, entry_close) = tags(mode, Field::Entry);
    out.write_all(entry_open.as_bytes())?;
    for cell in &record.cells {
        let (open, close) = tags(mode, cell.field);
        let value = escape_markup(&cell.value);
        if mode == OutputMode::Html {
            let value = match cell.html_wrap {
                Some(width) => crate::format::wrap_markup(&value, width),
                None => value,
            };
            write!(
                out,
                "{open}{}{value}{}{close}",
                cell.html_prefix, cell.html_suffix
            )?;
        } else {
            write!(out, "{open}{value}{close}")?;
        }
    }
    out.write_all(entry_close.as_bytes())
}

/// Render a complete document: header, every record, footer.
pub fn render<W, I>(out: &mut W, mode: OutputMode, doc: &Document, records: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = Record>,
{
    write_header(out, mode, doc)?;
    for record in records {
        write_record(out, mode, &record)?;
    }
    write_footer(out, mode)
}

/// Render to a `String` (convenience for tests and small reports).
pub fn render_to_string<I>(mode: OutputMode, doc: &Document, records: I) -> String
where
    I: IntoIterator<Item = Record>,
{
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = render(&mut buf, mode, doc, records);
    String::from_utf8_lossy(&buf).into_owned()
}
