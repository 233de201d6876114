//! Minimal xlsx reader/writer.
//!
//! An .xlsx file is a zip of XML parts. This module writes the handful
//! of parts a spreadsheet viewer needs (content types, relationships,
//! workbook, worksheets with inline strings) and reads cells back with
//! regex extraction, including shared strings from files produced by
//! other programs. No styling beyond a bold header font.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use regex::Regex;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Error;
use crate::Result;

/// One cell. Formulas store the formula text without the leading '='.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Formula(String),
    Empty,
}

impl CellValue {
    /// Coerce free text: numeric strings become numbers, a leading '='
    /// marks a formula.
    pub fn from_input(raw: &str) -> Self {
        if let Some(formula) = raw.strip_prefix('=') {
            return CellValue::Formula(formula.to_string());
        }
        if let Ok(n) = raw.trim().parse::<f64>() {
            return CellValue::Number(n);
        }
        if raw.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(raw.to_string())
        }
    }

    pub fn display(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Formula(f) => format!("={}", f),
            CellValue::Empty => String::new(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Formatting applied to a cell range. Registered on the workbook and
/// referenced from cells by style id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStyle {
    pub bold: bool,
    /// RGB hex like "FFFF00"; a leading alpha pair is accepted.
    pub bg_color: Option<String>,
    pub font_size: Option<u32>,
}

/// One worksheet. Cells are keyed by (row, col), both 1-based, in a
/// BTreeMap so serialization order is stable.
#[derive(Debug, Default)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(u32, u32), CellValue>,
    style_ids: BTreeMap<(u32, u32), u32>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            style_ids: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, row: u32, col: u32, value: CellValue) {
        if row == 0 || col == 0 {
            return;
        }
        self.cells.insert((row, col), value);
    }

    pub fn get(&self, row: u32, col: u32) -> CellValue {
        self.cells.get(&(row, col)).cloned().unwrap_or(CellValue::Empty)
    }

    /// (rows, cols) extent of the populated region.
    pub fn dims(&self) -> (u32, u32) {
        self.cells.keys().fold((0, 0), |(r, c), &(row, col)| {
            (r.max(row), c.max(col))
        })
    }

    /// Attach a registered style to a cell. Styling an unpopulated cell
    /// materializes it as empty so the formatting is still written out.
    pub fn set_style_id(&mut self, row: u32, col: u32, style_id: u32) {
        if row == 0 || col == 0 {
            return;
        }
        self.cells.entry((row, col)).or_insert(CellValue::Empty);
        self.style_ids.insert((row, col), style_id);
    }

    /// Append rows below the current extent.
    pub fn append_rows(&mut self, rows: &[Vec<CellValue>]) {
        let (mut next, _) = self.dims();
        for row in rows {
            next += 1;
            for (i, value) in row.iter().enumerate() {
                self.set(next, i as u32 + 1, value.clone());
            }
        }
    }
}

/// In-memory workbook with load-modify-save round trips.
///
/// Cell values and formulas survive a round trip; style information is
/// write-only (reloading a file discards formatting applied earlier).
#[derive(Debug, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    styles: Vec<CellStyle>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn add_sheet(&mut self, name: impl Into<String>) -> &mut Sheet {
        self.sheets.push(Sheet::new(name));
        self.sheets.last_mut().unwrap()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Register a style and return its cell xf index. Indices 0 and 1
    /// are reserved for the default and bold-header styles.
    pub fn add_style(&mut self, style: CellStyle) -> u32 {
        if let Some(pos) = self.styles.iter().position(|s| *s == style) {
            return pos as u32 + 2;
        }
        self.styles.push(style);
        self.styles.len() as u32 + 1
    }

    /// Write the workbook as an .xlsx zip.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.sheets.is_empty() {
            return Err(Error::Tool("Workbook has no sheets".to_string()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path)?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(self.content_types().as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(ROOT_RELS.as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(self.workbook_xml().as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(self.workbook_rels().as_bytes())?;

        zip.start_file("xl/styles.xml", options)?;
        zip.write_all(self.styles_xml().as_bytes())?;

        for (i, sheet) in self.sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
            zip.write_all(sheet_xml(sheet).as_bytes())?;
        }

        zip.finish()?;
        Ok(())
    }

    /// Read an .xlsx file back into memory.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Tool(format!("Cannot open {}: {}", path.display(), e)))?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| Error::Tool(format!("Not a valid xlsx file: {}", e)))?;

        let shared = read_shared_strings(&mut archive)?;
        let names = read_sheet_names(&mut archive)?;

        let mut workbook = Workbook::new();
        for (i, name) in names.into_iter().enumerate() {
            let part = format!("xl/worksheets/sheet{}.xml", i + 1);
            let xml = read_entry(&mut archive, &part).unwrap_or_default();
            let mut sheet = Sheet::new(name);
            parse_sheet_xml(&xml, &shared, &mut sheet);
            workbook.sheets.push(sheet);
        }

        if workbook.sheets.is_empty() {
            return Err(Error::Tool("Workbook has no sheets".to_string()));
        }
        Ok(workbook)
    }

    fn content_types(&self) -> String {
        let mut overrides = String::new();
        for i in 1..=self.sheets.len() {
            overrides.push_str(&format!(
                "<Override PartName=\"/xl/worksheets/sheet{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>",
                i
            ));
        }
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
{}</Types>",
            overrides
        )
    }

    fn workbook_xml(&self) -> String {
        let mut sheets = String::new();
        for (i, sheet) in self.sheets.iter().enumerate() {
            sheets.push_str(&format!(
                "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
                xml_escape(&sheet.name),
                i + 1,
                i + 1
            ));
        }
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
<sheets>{}</sheets></workbook>",
            sheets
        )
    }

    fn workbook_rels(&self) -> String {
        let mut rels = String::new();
        for i in 1..=self.sheets.len() {
            rels.push_str(&format!(
                "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{}.xml\"/>",
                i, i
            ));
        }
        rels.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>",
            self.sheets.len() + 1
        ));
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{}</Relationships>",
            rels
        )
    }
}

const ROOT_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
</Relationships>";

impl Workbook {
    /// Emit the styles part: two fixed entries (default, bold header)
    /// followed by one font/fill/xf triple per registered style.
    fn styles_xml(&self) -> String {
        let mut fonts = String::from(
            "<font><sz val=\"11\"/><name val=\"Calibri\"/></font>\
<font><b/><sz val=\"11\"/><name val=\"Calibri\"/></font>",
        );
        let mut fills = String::from(
            "<fill><patternFill patternType=\"none\"/></fill>\
<fill><patternFill patternType=\"gray125\"/></fill>",
        );
        let mut xfs = String::from("<xf/><xf fontId=\"1\" applyFont=\"1\"/>");

        for (i, style) in self.styles.iter().enumerate() {
            let bold = if style.bold { "<b/>" } else { "" };
            let size = style.font_size.unwrap_or(11);
            fonts.push_str(&format!(
                "<font>{}<sz val=\"{}\"/><name val=\"Calibri\"/></font>",
                bold, size
            ));

            match &style.bg_color {
                Some(color) => {
                    let rgb = if color.len() == 6 {
                        format!("FF{}", color)
                    } else {
                        color.clone()
                    };
                    fills.push_str(&format!(
                        "<fill><patternFill patternType=\"solid\"><fgColor rgb=\"{}\"/></patternFill></fill>",
                        rgb
                    ));
                }
                None => fills.push_str("<fill><patternFill patternType=\"none\"/></fill>"),
            }

            let idx = i + 2;
            xfs.push_str(&format!(
                "<xf fontId=\"{}\" fillId=\"{}\" applyFont=\"1\" applyFill=\"1\"/>",
                idx, idx
            ));
        }

        let count = self.styles.len() + 2;
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
<fonts count=\"{count}\">{fonts}</fonts>\
<fills count=\"{count}\">{fills}</fills>\
<borders count=\"1\"><border/></borders>\
<cellStyleXfs count=\"1\"><xf/></cellStyleXfs>\
<cellXfs count=\"{count}\">{xfs}</cellXfs>\
</styleSheet>"
        )
    }
}

fn sheet_xml(sheet: &Sheet) -> String {
    let mut rows: BTreeMap<u32, Vec<(u32, &CellValue)>> = BTreeMap::new();
    for (&(row, col), value) in &sheet.cells {
        rows.entry(row).or_default().push((col, value));
    }

    let mut body = String::new();
    for (row, cells) in rows {
        body.push_str(&format!("<row r=\"{}\">", row));
        for (col, value) in cells {
            let reference = format!("{}{}", column_letter(col), row);
            // Explicit style wins; otherwise row 1 gets the bold header.
            let style = match sheet.style_ids.get(&(row, col)) {
                Some(id) => format!(" s=\"{}\"", id),
                None if row == 1 => " s=\"1\"".to_string(),
                None => String::new(),
            };
            match value {
                CellValue::Text(s) => body.push_str(&format!(
                    "<c r=\"{}\"{} t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                    reference,
                    style,
                    xml_escape(s)
                )),
                CellValue::Number(n) => {
                    body.push_str(&format!("<c r=\"{}\"{}><v>{}</v></c>", reference, style, n))
                }
                CellValue::Formula(f) => body.push_str(&format!(
                    "<c r=\"{}\"{}><f>{}</f></c>",
                    reference,
                    style,
                    xml_escape(f)
                )),
                CellValue::Empty => body.push_str(&format!("<c r=\"{}\"{}/>", reference, style)),
            }
        }
        body.push_str("</row>");
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
<sheetData>{}</sheetData></worksheet>",
        body
    )
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Option<String> {
    let mut entry = archive.by_name(name).ok()?;
    let mut content = String::new();
    entry.read_to_string(&mut content).ok()?;
    Some(content)
}

fn read_sheet_names(archive: &mut ZipArchive<File>) -> Result<Vec<String>> {
    let xml = read_entry(archive, "xl/workbook.xml")
        .ok_or_else(|| Error::Tool("xlsx is missing xl/workbook.xml".to_string()))?;
    let re = Regex::new(r#"<sheet[^>]*\bname="([^"]*)""#).unwrap();
    Ok(re
        .captures_iter(&xml)
        .map(|c| xml_unescape(&c[1]))
        .collect())
}

fn read_shared_strings(archive: &mut ZipArchive<File>) -> Result<Vec<String>> {
    let xml = match read_entry(archive, "xl/sharedStrings.xml") {
        Some(xml) => xml,
        None => return Ok(Vec::new()),
    };
    let si = Regex::new(r"(?s)<si>(.*?)</si>").unwrap();
    let t = Regex::new(r"(?s)<t[^>]*>(.*?)</t>").unwrap();
    Ok(si
        .captures_iter(&xml)
        .map(|item| {
            // Rich-text runs split one string across several <t> nodes.
            t.captures_iter(&item[1])
                .map(|run| xml_unescape(&run[1]))
                .collect::<Vec<_>>()
                .join("")
        })
        .collect())
}

fn parse_sheet_xml(xml: &str, shared: &[String], sheet: &mut Sheet) {
    let cell_re = Regex::new(r#"(?s)<c\s+([^>]*?)(?:/>|>(.*?)</c>)"#).unwrap();
    let r_re = Regex::new(r#"\br="([A-Z]+)(\d+)""#).unwrap();
    let t_re = Regex::new(r#"\bt="([^"]*)""#).unwrap();
    let v_re = Regex::new(r"(?s)<v>(.*?)</v>").unwrap();
    let f_re = Regex::new(r"(?s)<f[^>]*>(.*?)</f>").unwrap();
    let is_re = Regex::new(r"(?s)<is>.*?<t[^>]*>(.*?)</t>").unwrap();

    for cap in cell_re.captures_iter(xml) {
        let attrs = &cap[1];
        let inner = cap.get(2).map(|m| m.as_str()).unwrap_or("");

        let (row, col) = match r_re.captures(attrs) {
            Some(r) => (r[2].parse::<u32>().unwrap_or(0), column_index(&r[1])),
            None => continue,
        };
        let cell_type = t_re.captures(attrs).map(|t| t[1].to_string());

        let value = if let Some(f) = f_re.captures(inner) {
            CellValue::Formula(xml_unescape(&f[1]))
        } else if cell_type.as_deref() == Some("inlineStr") {
            match is_re.captures(inner) {
                Some(t) => CellValue::Text(xml_unescape(&t[1])),
                None => CellValue::Empty,
            }
        } else if cell_type.as_deref() == Some("s") {
            let index = v_re
                .captures(inner)
                .and_then(|v| v[1].trim().parse::<usize>().ok());
            match index.and_then(|i| shared.get(i)) {
                Some(s) => CellValue::Text(s.clone()),
                None => CellValue::Empty,
            }
        } else {
            match v_re.captures(inner) {
                Some(v) => {
                    let raw = xml_unescape(v[1].trim());
                    match raw.parse::<f64>() {
                        Ok(n) => CellValue::Number(n),
                        Err(_) => CellValue::Text(raw),
                    }
                }
                None => CellValue::Empty,
            }
        };

        if value != CellValue::Empty {
            sheet.set(row, col, value);
        }
    }
}

/// 1-based column index to letters: 1 -> A, 27 -> AA.
pub fn column_letter(mut col: u32) -> String {
    let mut letters = String::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.insert(0, (b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    letters
}

/// Letters to 1-based column index: A -> 1, AA -> 27.
pub fn column_index(letters: &str) -> u32 {
    letters
        .bytes()
        .fold(0, |acc, b| acc * 26 + (b - b'A' + 1) as u32)
}

/// Parse "B3" into (row, col), both 1-based.
pub fn parse_cell_ref(reference: &str) -> Result<(u32, u32)> {
    let reference = reference.trim().to_uppercase();
    let split = reference.find(|c: char| c.is_ascii_digit());
    let (letters, digits) = match split {
        Some(i) if i > 0 => reference.split_at(i),
        _ => return Err(Error::Tool(format!("Invalid cell reference: {}", reference))),
    };
    if !letters.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(Error::Tool(format!("Invalid cell reference: {}", reference)));
    }
    let row: u32 = digits
        .parse()
        .map_err(|_| Error::Tool(format!("Invalid cell reference: {}", reference)))?;
    if row == 0 {
        return Err(Error::Tool(format!("Invalid cell reference: {}", reference)));
    }
    Ok((row, column_index(letters)))
}

/// Parse "A1:C3" (or a single "B2") into an inclusive
/// ((top, left), (bottom, right)) pair, normalized so the first corner
/// is the smaller one.
pub fn parse_range(range: &str) -> Result<((u32, u32), (u32, u32))> {
    let (first, second) = match range.split_once(':') {
        Some((a, b)) => (parse_cell_ref(a)?, parse_cell_ref(b)?),
        None => {
            let cell = parse_cell_ref(range)?;
            (cell, cell)
        }
    };
    let top = first.0.min(second.0);
    let bottom = first.0.max(second.0);
    let left = first.1.min(second.1);
    let right = first.1.max(second.1);
    Ok(((top, left), (bottom, right)))
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn xml_unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
