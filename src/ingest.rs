//! Document ingestion: location CSV files and web pages

use crate::{Error, Result, SourceRecord};
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Node, Selector};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Default title column of the location dataset
pub const DEFAULT_TITLE_COLUMN: &str = "제목명";

const USER_AGENT: &str = concat!("feelko/", env!("CARGO_PKG_VERSION"));

/// Elements whose text never reaches a record
const SKIPPED_TAGS: [&str; 6] = ["script", "style", "template", "noscript", "svg", "nav"];

/// Elements that start a new run of text
const BLOCK_TAGS: [&str; 24] = [
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "li", "main", "p", "pre", "section",
    "td",
];

/// Kind of source a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Tabular location dataset
    Csv,
    /// Fetched web page
    Web,
}

impl SourceKind {
    /// Default `(chunk_size, overlap)` in characters for this source kind
    #[must_use]
    pub const fn default_chunking(self) -> (usize, usize) {
        match self {
            Self::Csv => (300, 50),
            Self::Web => (800, 80),
        }
    }
}

/// Loader for the filming-location CSV dataset.
///
/// Each row becomes one record whose content is the `header: value` lines of
/// its non-empty columns, in column order.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    title_column: String,
    delimiter: u8,
}

impl Default for CsvLoader {
    fn default() -> Self {
        Self {
            title_column: DEFAULT_TITLE_COLUMN.to_string(),
            delimiter: b',',
        }
    }
}

impl CsvLoader {
    /// Create a loader using the default title column
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different title column
    #[must_use]
    pub fn with_title_column(mut self, column: impl Into<String>) -> Self {
        self.title_column = column.into();
        self
    }

    /// Use a different field delimiter
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Title column name
    #[must_use]
    pub fn title_column(&self) -> &str {
        &self.title_column
    }

    /// Lazily read records from any reader
    pub fn records<R: Read>(&self, reader: R, origin: &str) -> Result<CsvRecords<R>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let title_index = headers
            .iter()
            .position(|h| *h == self.title_column)
            .ok_or_else(|| {
                Error::Ingestion(format!(
                    "{origin}: title column '{}' not found",
                    self.title_column
                ))
            })?;

        Ok(CsvRecords {
            reader,
            headers,
            title_index,
            origin: origin.to_string(),
            row: 0,
            row_buf: csv::StringRecord::new(),
        })
    }

    /// Lazily read records from a file
    pub fn open(&self, path: &Path) -> Result<CsvRecords<File>> {
        let file = File::open(path)
            .map_err(|e| Error::Ingestion(format!("{}: {e}", path.display())))?;
        self.records(file, &path.display().to_string())
    }

    /// Read every record of a file
    pub fn load(&self, path: &Path) -> Result<Vec<SourceRecord>> {
        let records = self.open(path)?.collect::<Result<Vec<_>>>()?;
        tracing::info!(path = %path.display(), records = records.len(), "loaded CSV");
        Ok(records)
    }
}

/// Iterator over CSV rows as records
pub struct CsvRecords<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    title_index: usize,
    origin: String,
    row: usize,
    row_buf: csv::StringRecord,
}

impl<R: Read> CsvRecords<R> {
    /// Column names in file order
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn build_record(&self) -> SourceRecord {
        let content = self
            .headers
            .iter()
            .zip(self.row_buf.iter())
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(header, value)| format!("{header}: {}", value.trim()))
            .collect::<Vec<_>>()
            .join("\n");

        let mut record = SourceRecord::new(content)
            .with_metadata("row", serde_json::json!(self.row))
            .with_metadata("file", serde_json::json!(self.origin));

        if let Some(title) = self
            .row_buf
            .get(self.title_index)
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            record = record.with_title(title).with_source(title);
        }
        record
    }
}

impl<R: Read> Iterator for CsvRecords<R> {
    type Item = Result<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.row_buf) {
            Ok(true) => {
                self.row += 1;
                Some(Ok(self.build_record()))
            }
            Ok(false) => None,
            Err(e) => Some(Err(Error::Ingestion(format!(
                "{}: row {}: {e}",
                self.origin,
                self.row + 1
            )))),
        }
    }
}

/// Loader that fetches web pages and keeps their visible text
pub struct WebLoader {
    client: Client,
    selectors: PageSelectors,
}

struct PageSelectors {
    title: Selector,
    article: Selector,
    main: Selector,
    body: Selector,
}

impl PageSelectors {
    fn new() -> Result<Self> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| Error::Ingestion(format!("selector {css}: {e}")))
        };
        Ok(Self {
            title: parse("title")?,
            article: parse("article")?,
            main: parse("main")?,
            body: parse("body")?,
        })
    }

    fn pick_root<'a>(&self, document: &'a Html) -> ElementRef<'a> {
        document
            .select(&self.article)
            .next()
            .or_else(|| document.select(&self.main).next())
            .or_else(|| document.select(&self.body).next())
            .unwrap_or_else(|| document.root_element())
    }
}

impl WebLoader {
    /// Create a loader with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Ingestion(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            selectors: PageSelectors::new()?,
        })
    }

    /// Fetch one page
    pub fn fetch(&self, url: &str) -> Result<SourceRecord> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Ingestion(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Ingestion(format!("{url}: HTTP {status}")));
        }

        let html = response
            .text()
            .map_err(|e| Error::Ingestion(format!("{url}: {e}")))?;
        self.parse(url, &html)
    }

    /// Fetch every page, stopping at the first failure
    pub fn load(&self, urls: &[String]) -> Result<Vec<SourceRecord>> {
        urls.iter()
            .map(|url| {
                tracing::info!(url, "loading page");
                self.fetch(url)
            })
            .collect()
    }

    /// Turn an HTML document into a record
    pub fn parse(&self, url: &str, html: &str) -> Result<SourceRecord> {
        let document = Html::parse_document(html);
        let root = self.selectors.pick_root(&document);

        let mut raw = String::new();
        collect_text(root, &mut raw);
        let text = collapse_whitespace(&raw);
        if text.is_empty() {
            return Err(Error::Ingestion(format!("{url}: no text content")));
        }

        let mut record = SourceRecord::new(text).with_source(url);
        if let Some(title) = document
            .select(&self.selectors.title)
            .next()
            .map(|t| collapse_whitespace(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty())
        {
            record = record.with_title(title);
        }
        Ok(record)
    }
}

/// Visible text of `element`, with blocks separated by a space
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if !SKIPPED_TAGS.contains(&el.name()) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_TAGS.contains(&el.name());
                if block {
                    out.push(' ');
                }
                collect_text(child, out);
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim_end().to_string()
}
