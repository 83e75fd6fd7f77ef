//! Word (`.docx`) and spreadsheet (`.xlsx`) extraction.
//!
//! Both formats are ZIP packages of XML parts. Parts are read with a size
//! bound and streamed through `quick-xml`; no DOM is built.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{truncate_chars, ExtractError, MAX_TITLE_CHARS};
use crate::models::Extracted;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Last column a worksheet can address (`XFD`).
const XLSX_MAX_COLUMNS: usize = 16_384;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const WORD_FALLBACK_TITLE: &str = "Word document";
const WORD_EMPTY_TEXT: &str = "No content could be extracted from the document";
const SHEET_EMPTY_MARKER: &str = "(no data)";

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Zip(e.to_string()))
}

fn has_entry(archive: &mut Archive<'_>, name: &str) -> bool {
    archive.by_name(name).is_ok()
}

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|_| ExtractError::MissingPart(name.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Zip(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::TooLarge(name.to_string()));
    }
    Ok(out)
}

fn xml_reader(xml: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(xml);
    // Whitespace inside runs is significant ("Hello" + " world").
    reader.config_mut().trim_text(false);
    reader
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref() == local {
            a.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

// ============ Word ============

/// Collects body paragraphs and tables from `word/document.xml`.
#[derive(Default)]
struct WordBody {
    paragraphs: Vec<String>,
    tables: Vec<String>,
}

pub fn extract_docx(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let body = parse_word_document(&xml)?;

    let title = body
        .paragraphs
        .first()
        .map(|p| truncate_chars(p, MAX_TITLE_CHARS).to_string())
        .unwrap_or_else(|| WORD_FALLBACK_TITLE.to_string());

    let mut parts = body.paragraphs;
    parts.extend(body.tables);
    let mut text = parts.join("\n\n");
    if text.trim().is_empty() {
        text = WORD_EMPTY_TEXT.to_string();
    }

    Ok(Extracted::new(title, text))
}

fn parse_word_document(xml: &[u8]) -> Result<WordBody, ExtractError> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut out = WordBody::default();

    let mut table_depth = 0usize;
    let mut in_run = false;
    let mut in_text = false;
    let mut paragraph = String::new();
    let mut cell_paragraphs: Vec<String> = Vec::new();
    let mut row_cells: Vec<String> = Vec::new();
    let mut table_rows: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        table_rows.clear();
                    }
                }
                b"tr" if table_depth == 1 => row_cells.clear(),
                b"tc" if table_depth == 1 => cell_paragraphs.clear(),
                b"p" => paragraph.clear(),
                b"r" => in_run = true,
                b"t" => in_text = true,
                _ => {}
            },
            // Tab stops in paragraph properties are also `w:tab`.
            Ok(Event::Empty(e)) if in_run => match e.local_name().as_ref() {
                b"tab" => paragraph.push('\t'),
                b"br" | b"cr" => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::Xml(e.to_string()))?;
                paragraph.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"r" => in_run = false,
                b"t" => in_text = false,
                b"p" => {
                    let text = paragraph.trim();
                    if table_depth == 0 {
                        if !text.is_empty() {
                            out.paragraphs.push(text.to_string());
                        }
                    } else {
                        cell_paragraphs.push(text.to_string());
                    }
                    paragraph.clear();
                }
                b"tc" if table_depth == 1 => {
                    row_cells.push(cell_paragraphs.join("\n").trim().to_string());
                }
                b"tr" if table_depth == 1 => {
                    let row: Vec<&str> = row_cells
                        .iter()
                        .map(String::as_str)
                        .filter(|c| !c.is_empty())
                        .collect();
                    if !row.is_empty() {
                        table_rows.push(row.join(" | "));
                    }
                }
                b"tbl" => {
                    if table_depth == 1 && !table_rows.is_empty() {
                        out.tables.push(table_rows.join("\n"));
                    }
                    table_depth = table_depth.saturating_sub(1);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

// ============ Spreadsheet ============

struct Sheet {
    name: String,
    part: String,
}

pub fn extract_xlsx(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheets = list_sheets(&mut archive)?;

    let title = format!("Spreadsheet document ({} sheets)", sheets.len());
    let mut blocks = Vec::new();
    for sheet in sheets.iter().take(XLSX_MAX_SHEETS) {
        blocks.push(format!("--- sheet: {} ---", sheet.name));
        let rows = if has_entry(&mut archive, &sheet.part) {
            let xml = read_zip_entry_bounded(&mut archive, &sheet.part, MAX_XML_ENTRY_BYTES)?;
            render_rows(&read_sheet_cells(&xml, &shared_strings)?)
        } else {
            Vec::new()
        };
        if rows.is_empty() {
            blocks.push(SHEET_EMPTY_MARKER.to_string());
        } else {
            blocks.push(rows.join("\n"));
        }
    }

    Ok(Extracted::new(title, blocks.join("\n\n")))
}

/// Sheet names in workbook order, with the worksheet part each one lives in.
fn list_sheets(archive: &mut Archive<'_>) -> Result<Vec<Sheet>, ExtractError> {
    let workbook = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;
    let targets = if has_entry(archive, "xl/_rels/workbook.xml.rels") {
        let rels =
            read_zip_entry_bounded(archive, "xl/_rels/workbook.xml.rels", MAX_XML_ENTRY_BYTES)?;
        read_relationship_targets(&rels)?
    } else {
        HashMap::new()
    };

    let mut reader = xml_reader(&workbook);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                let index = sheets.len() + 1;
                let name = attr(&e, b"name").unwrap_or_else(|| format!("Sheet{}", index));
                let part = attr(&e, b"id")
                    .and_then(|rid| targets.get(&rid).cloned())
                    .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index));
                sheets.push(Sheet { name, part });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

/// Maps relationship ids to package part paths.
fn read_relationship_targets(xml: &[u8]) -> Result<HashMap<String, String>, ExtractError> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut targets = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    let part = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target),
                    };
                    targets.insert(id, part);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(targets)
}

fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractError> {
    if !has_entry(archive, "xl/sharedStrings.xml") {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = xml_reader(&xml);
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_t = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => in_phonetic = true,
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t && !in_phonetic => {
                let text = te.unescape().map_err(|e| ExtractError::Xml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// One populated row: `(1-based column, value)` pairs.
type SheetRow = Vec<(usize, String)>;

fn read_sheet_cells(xml: &[u8], shared_strings: &[String]) -> Result<Vec<SheetRow>, ExtractError> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<SheetRow> = Vec::new();
    let mut row: SheetRow = Vec::new();
    let mut cell_count = 0usize;

    let mut next_col = 1usize;
    let mut cell_col = 0usize;
    let mut cell_type = String::new();
    let mut value = String::new();
    let mut in_value = false;

    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row = Vec::new();
                    next_col = 1;
                }
                b"c" => {
                    cell_col = attr(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_col);
                    next_col = cell_col.saturating_add(1);
                    cell_type = attr(&e, b"t").unwrap_or_default();
                    value.clear();
                }
                // <v> holds the value; <t> holds inline string runs.
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let text = te.unescape().map_err(|e| ExtractError::Xml(e.to_string()))?;
                value.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let resolved = resolve_cell(&cell_type, &value, shared_strings);
                    if !resolved.is_empty() && cell_col <= XLSX_MAX_COLUMNS {
                        row.push((cell_col, resolved));
                        cell_count += 1;
                    }
                }
                b"row" => {
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                _ => {}
            },
            // A self-closing <c/> still occupies its column.
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                let col = attr(&e, b"r")
                    .and_then(|r| column_index(&r))
                    .unwrap_or(next_col);
                next_col = col.saturating_add(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row);
    }
    Ok(rows)
}

fn resolve_cell(cell_type: &str, raw: &str, shared_strings: &[String]) -> String {
    match cell_type {
        "s" => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared_strings.get(i).cloned())
            .unwrap_or_default(),
        "b" => match raw.trim() {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        _ => raw.to_string(),
    }
}

/// `"AB12"` → `Some(28)`. References past `XFD` give `None`.
fn column_index(cell_ref: &str) -> Option<usize> {
    let mut col = 0usize;
    let mut seen = false;
    for c in cell_ref.chars().take_while(|c| c.is_ascii_alphabetic()) {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
        if col > XLSX_MAX_COLUMNS {
            return None;
        }
        seen = true;
    }
    seen.then_some(col)
}

/// Pads every row to the widest populated column and drops rows whose
/// cells are all blank.
fn render_rows(rows: &[SheetRow]) -> Vec<String> {
    let width = rows
        .iter()
        .flat_map(|r| r.iter().map(|(c, _)| *c))
        .max()
        .unwrap_or(0)
        .min(XLSX_MAX_COLUMNS);

    rows.iter()
        .filter(|r| r.iter().any(|(_, v)| !v.trim().is_empty()))
        .map(|r| {
            let mut cells = vec![""; width];
            for (col, value) in r {
                if let Some(slot) = cells.get_mut(col.saturating_sub(1)) {
                    *slot = value.as_str();
                }
            }
            cells.join(" | ")
        })
        .collect()
}
