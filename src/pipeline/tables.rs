//! Replacement table sources: load the tables that will be drawn into the
//! covered regions.
//!
//! Three formats are read, chosen by file extension:
//!
//! | Extension            | Reader                                         |
//! |----------------------|------------------------------------------------|
//! | `.docx`              | every `w:tbl` in `word/document.xml`           |
//! | `.md`, `.markdown`   | GFM pipe tables                                |
//! | `.json`              | `[[[..header..], [..row..]], ..]` or `{"tables": ..}` |
//!
//! Tables come back in document order; the orchestrator pairs them with
//! located regions by position. The first row of every table is its header.

use crate::error::ReplaceError;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// A replacement table: one header row plus body rows, all the same width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReplacementTable {
    /// Build a table from raw rows, the first being the header.
    ///
    /// Returns `None` when there is no row with any content. Every row is
    /// padded with empty cells, or truncated, to the header width; the header
    /// is widened first if a body row is longer.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Option<Self> {
        let mut rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|r| r.into_iter().map(|c| collapse(&c)).collect::<Vec<_>>())
            .filter(|r| !r.is_empty())
            .collect();
        if rows.iter().all(|r| r.iter().all(String::is_empty)) {
            return None;
        }

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }

        let headers = rows.remove(0);
        Some(Self { headers, rows })
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Row count including the header.
    pub fn row_count(&self) -> usize {
        self.rows.len() + 1
    }

    /// Header followed by body rows.
    pub fn all_rows(&self) -> impl Iterator<Item = &Vec<String>> {
        std::iter::once(&self.headers).chain(self.rows.iter())
    }
}

/// Load replacement tables from `path`, picking a reader by extension.
pub fn load_tables(path: &Path) -> Result<Vec<ReplacementTable>, ReplaceError> {
    if !path.exists() {
        return Err(ReplaceError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let fail = |detail: String| ReplaceError::TableSourceRead {
        path: path.to_path_buf(),
        detail,
    };

    let raw = match ext.as_str() {
        "docx" => {
            let file = std::fs::File::open(path).map_err(|e| fail(e.to_string()))?;
            let mut archive =
                zip::ZipArchive::new(std::io::BufReader::new(file)).map_err(|e| fail(e.to_string()))?;
            let mut xml = String::new();
            archive
                .by_name("word/document.xml")
                .map_err(|e| fail(format!("cannot find word/document.xml: {}", e)))?
                .read_to_string(&mut xml)
                .map_err(|e| fail(e.to_string()))?;
            parse_docx_tables(&xml).map_err(fail)?
        }
        "md" | "markdown" => {
            let text = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
            parse_markdown_tables(&text)
        }
        "json" => {
            let text = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
            parse_json_tables(&text).map_err(fail)?
        }
        other => {
            return Err(fail(format!(
                "unsupported table source extension '{}' (expected .docx, .md or .json)",
                other
            )))
        }
    };

    let total = raw.len();
    let tables: Vec<ReplacementTable> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(i, rows)| {
            let table = ReplacementTable::from_rows(rows);
            if table.is_none() {
                warn!("Skipping empty table #{} in '{}'", i + 1, path.display());
            }
            table
        })
        .collect();

    info!(
        "Loaded {} replacement tables from '{}' ({} skipped)",
        tables.len(),
        path.display(),
        total - tables.len()
    );
    Ok(tables)
}

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse(s: &str) -> String {
    RE_WS.replace_all(s.trim(), " ").into_owned()
}

// ── DOCX ─────────────────────────────────────────────────────────────────

/// Extract the rows of every top-level `w:tbl` from a WordprocessingML body.
///
/// Cell text is the concatenation of its `w:t` runs; separate paragraphs
/// inside one cell are joined by a space. Tables nested in a cell contribute
/// their text to that cell.
pub fn parse_docx_tables(xml: &str) -> Result<Vec<Vec<Vec<String>>>, String> {
    let mut reader = Reader::from_str(xml);

    let mut tables = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => depth += 1,
                b"w:tr" if depth == 1 => row.clear(),
                b"w:tc" if depth == 1 => cell.clear(),
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" | b"w:br" if depth >= 1 => cell.push(' '),
                b"w:tc" if depth == 1 => row.push(String::new()),
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:tbl" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        tables.push(std::mem::take(&mut rows));
                    }
                }
                b"w:tr" if depth == 1 => rows.push(std::mem::take(&mut row)),
                b"w:tc" if depth == 1 => row.push(collapse(&cell)),
                b"w:p" if depth >= 1 => cell.push(' '),
                b"w:t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text && depth >= 1 {
                    let text = e.unescape().map_err(|e| e.to_string())?;
                    cell.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {:?}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }

    debug!("Parsed {} tables from document.xml", tables.len());
    Ok(tables)
}

// ── Markdown ─────────────────────────────────────────────────────────────

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.len() > 1
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| c == '|' || c == '-' || c == ':' || c == ' ')
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(collapse).collect()
}

/// Extract every GFM pipe table: a header row directly followed by a
/// separator row, then body rows until the first non-row line.
pub fn parse_markdown_tables(text: &str) -> Vec<Vec<Vec<String>>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut tables = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let header = lines[i];
        let next = lines.get(i + 1).copied().unwrap_or("");
        if !(is_table_row(header) && !is_separator_row(header) && is_separator_row(next)) {
            i += 1;
            continue;
        }

        let mut rows = vec![split_row(header)];
        i += 2;
        while i < lines.len() && is_table_row(lines[i]) {
            if !is_separator_row(lines[i]) {
                rows.push(split_row(lines[i]));
            }
            i += 1;
        }
        tables.push(rows);
    }

    tables
}

// ── JSON ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonSource {
    Bare(Vec<Vec<Vec<String>>>),
    Wrapped { tables: Vec<Vec<Vec<String>>> },
}

/// Parse `[[["h1","h2"],["a","b"]], ...]` or the same under a `tables` key.
pub fn parse_json_tables(text: &str) -> Result<Vec<Vec<Vec<String>>>, String> {
    match serde_json::from_str::<JsonSource>(text) {
        Ok(JsonSource::Bare(t)) | Ok(JsonSource::Wrapped { tables: t }) => Ok(t),
        Err(e) => Err(format!(
            "expected an array of tables (each an array of string rows): {}",
            e
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    const DOC_XML: &str = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Intro paragraph</w:t></w:r></w:p>
    <w:tbl>
      <w:tr>
        <w:tc><w:p><w:r><w:t xml:space="preserve">Plan </w:t></w:r><w:r><w:t>Name</w:t></w:r></w:p></w:tc>
        <w:tc><w:p><w:r><w:t>Premium</w:t></w:r></w:p></w:tc>
      </w:tr>
      <w:tr>
        <w:tc><w:p><w:r><w:t>Gold</w:t></w:r></w:p><w:p><w:r><w:t>PPO</w:t></w:r></w:p></w:tc>
        <w:tc><w:p><w:r><w:t>$420 &amp; up</w:t></w:r></w:p></w:tc>
      </w:tr>
    </w:tbl>
    <w:tbl>
      <w:tr><w:tc><w:p><w:r><w:t>Only</w:t></w:r></w:p></w:tc></w:tr>
    </w:tbl>
  </w:body>
</w:document>"#;

    #[test]
    fn docx_tables_are_read_in_order() {
        let tables = parse_docx_tables(DOC_XML).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(
            tables[0],
            strings(&[&["Plan Name", "Premium"], &["Gold PPO", "$420 & up"]])
        );
        assert_eq!(tables[1], strings(&[&["Only"]]));
    }

    #[test]
    fn docx_nested_table_text_stays_in_its_cell() {
        let xml = r#"<w:body><w:tbl><w:tr>
            <w:tc><w:p><w:r><w:t>Outer</w:t></w:r></w:p>
              <w:tbl><w:tr><w:tc><w:p><w:r><w:t>inner</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
            </w:tc>
            <w:tc><w:p><w:r><w:t>Next</w:t></w:r></w:p></w:tc>
        </w:tr></w:tbl></w:body>"#;
        let tables = parse_docx_tables(xml).unwrap();
        assert_eq!(tables, vec![strings(&[&["Outer inner", "Next"]])]);
    }

    #[test]
    fn load_tables_reads_a_docx_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.docx");
        let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(DOC_XML.as_bytes()).unwrap();
        zip.finish().unwrap();

        let tables = load_tables(&path).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].headers, vec!["Plan Name", "Premium"]);
        assert_eq!(tables[0].rows, strings(&[&["Gold PPO", "$420 & up"]]));
    }

    #[test]
    fn markdown_tables_need_a_separator_row() {
        let md = "\
# Plans

| Plan | Deductible |
|:-----|-----------:|
| Bronze | $6,000 |
| Silver | $3,500 |

| not | a table |
| because | no separator |

Text

| A | B |
|---|---|
| 1 | 2 |
";
        let tables = parse_markdown_tables(md);
        assert_eq!(tables.len(), 2);
        assert_eq!(
            tables[0],
            strings(&[&["Plan", "Deductible"], &["Bronze", "$6,000"], &["Silver", "$3,500"]])
        );
        assert_eq!(tables[1], strings(&[&["A", "B"], &["1", "2"]]));
    }

    #[test]
    fn json_accepts_bare_and_wrapped_forms() {
        let bare = r#"[[["h1","h2"],["a","b"]]]"#;
        let wrapped = r#"{"tables": [[["h1","h2"],["a","b"]]]}"#;
        assert_eq!(parse_json_tables(bare).unwrap(), parse_json_tables(wrapped).unwrap());
        assert!(parse_json_tables(r#"{"rows": 1}"#).is_err());
    }

    #[test]
    fn ragged_rows_are_padded() {
        let t = ReplacementTable::from_rows(strings(&[&["a", "b", "c"], &["1"], &["1", "2", "3", "4"]]))
            .unwrap();
        assert_eq!(t.column_count(), 4);
        assert_eq!(t.headers, vec!["a", "b", "c", ""]);
        assert_eq!(t.rows[0], vec!["1", "", "", ""]);
        assert_eq!(t.row_count(), 3);
    }

    #[test]
    fn empty_tables_are_rejected() {
        assert!(ReplacementTable::from_rows(vec![]).is_none());
        assert!(ReplacementTable::from_rows(strings(&[&["", " "]])).is_none());
    }

    #[test]
    fn load_tables_skips_empty_tables_and_rejects_unknown_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("t.json");
        std::fs::write(&json, r#"[[], [["x"]], [[""]]]"#).unwrap();
        let tables = load_tables(&json).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].headers, vec!["x"]);

        let csv = dir.path().join("t.csv");
        std::fs::write(&csv, "a,b").unwrap();
        assert!(matches!(
            load_tables(&csv).unwrap_err(),
            ReplaceError::TableSourceRead { .. }
        ));
    }

    #[test]
    fn missing_source_is_file_not_found() {
        let err = load_tables(Path::new("/nonexistent/tables.json")).unwrap_err();
        assert!(matches!(err, ReplaceError::FileNotFound { .. }));
    }
}
