//! Single-sheet XLSX writer
//!
//! Produces the smallest OOXML package spreadsheet apps accept: content
//! types, package and workbook relationships, a workbook, one worksheet with
//! inline strings, and a stylesheet with a regular and a bold font.

use std::io::{Cursor, Write};

use chrono::{DateTime, TimeZone};
use dialogue_core::SurveyReport;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

pub const SHEET_NAME: &str = "Результаты";
const MISSING_USERNAME: &str = "нет данных";

const STYLE_BOLD: &str = "1";

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<String>,
    pub bold: bool,
}

impl Row {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
            bold: false,
        }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    pub name: String,
    pub column_widths: Vec<f64>,
    pub rows: Vec<Row>,
}

/// The results sheet for one finished walk.
pub fn survey_sheet<Tz>(report: &SurveyReport, completed_at: &DateTime<Tz>) -> Worksheet
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let username = report
        .username
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(MISSING_USERNAME);

    let mut rows = vec![
        Row::new(["Пользователь (username)", username]).bold(),
        Row::new(["Ветка", report.branch_label.as_str()]).bold(),
        Row::new([
            "Дата прохождения".to_string(),
            completed_at.format("%d.%m.%Y, %H:%M:%S").to_string(),
        ])
        .bold(),
        Row::blank(),
    ];

    for (index, record) in report.answers.iter().enumerate() {
        let number = index + 1;
        rows.push(Row::new([format!("Вопрос {}", number), record.question.clone()]));
        rows.push(Row::new([format!("Ответ {}", number), record.answer.clone()]));
        rows.push(Row::blank());
    }

    Worksheet {
        name: SHEET_NAME.to_string(),
        column_widths: vec![20.0, 50.0],
        rows,
    }
}

impl Worksheet {
    /// Serialize as an `.xlsx` package.
    pub fn to_xlsx(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts: [(&str, Vec<u8>); 6] = [
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes().to_vec()),
            ("_rels/.rels", PACKAGE_RELS.as_bytes().to_vec()),
            ("xl/workbook.xml", self.workbook_xml()?),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes().to_vec()),
            ("xl/styles.xml", STYLES.as_bytes().to_vec()),
            ("xl/worksheets/sheet1.xml", self.sheet_xml()?),
        ];

        for (name, body) in parts {
            zip.start_file(name, options)?;
            zip.write_all(&body)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    fn workbook_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(declaration())?;
        writer.write_event(Event::Start(BytesStart::new("workbook").with_attributes([
            ("xmlns", MAIN_NS),
            ("xmlns:r", RELATIONSHIPS_NS),
        ])))?;
        writer.write_event(Event::Start(BytesStart::new("sheets")))?;
        writer.write_event(Event::Empty(BytesStart::new("sheet").with_attributes([
            ("name", self.name.as_str()),
            ("sheetId", "1"),
            ("r:id", "rId1"),
        ])))?;
        writer.write_event(Event::End(BytesEnd::new("sheets")))?;
        writer.write_event(Event::End(BytesEnd::new("workbook")))?;
        Ok(writer.into_inner())
    }

    fn sheet_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(declaration())?;
        writer.write_event(Event::Start(
            BytesStart::new("worksheet").with_attributes([("xmlns", MAIN_NS)]),
        ))?;

        if !self.column_widths.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("cols")))?;
            for (index, width) in self.column_widths.iter().enumerate() {
                let column = (index + 1).to_string();
                let width = width.to_string();
                writer.write_event(Event::Empty(BytesStart::new("col").with_attributes([
                    ("min", column.as_str()),
                    ("max", column.as_str()),
                    ("width", width.as_str()),
                    ("customWidth", "1"),
                ])))?;
            }
            writer.write_event(Event::End(BytesEnd::new("cols")))?;
        }

        writer.write_event(Event::Start(BytesStart::new("sheetData")))?;
        for (index, row) in self.rows.iter().enumerate() {
            let number = (index + 1).to_string();
            let start = BytesStart::new("row").with_attributes([("r", number.as_str())]);
            if row.cells.is_empty() {
                writer.write_event(Event::Empty(start))?;
                continue;
            }
            writer.write_event(Event::Start(start))?;
            for (column, value) in row.cells.iter().enumerate() {
                let reference = format!("{}{}", column_name(column), number);
                let mut cell = BytesStart::new("c")
                    .with_attributes([("r", reference.as_str()), ("t", "inlineStr")]);
                if row.bold {
                    cell.push_attribute(("s", STYLE_BOLD));
                }
                let text = printable(value);
                writer.write_event(Event::Start(cell))?;
                writer.write_event(Event::Start(BytesStart::new("is")))?;
                writer.write_event(Event::Start(
                    BytesStart::new("t").with_attributes([("xml:space", "preserve")]),
                ))?;
                writer.write_event(Event::Text(BytesText::new(&text)))?;
                writer.write_event(Event::End(BytesEnd::new("t")))?;
                writer.write_event(Event::End(BytesEnd::new("is")))?;
                writer.write_event(Event::End(BytesEnd::new("c")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("row")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
        writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
        Ok(writer.into_inner())
    }
}

fn declaration() -> Event<'static> {
    Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes")))
}

/// Zero-based column index to its letter name (`0` → `A`, `26` → `AA`).
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Drops control characters that XML 1.0 cannot carry at all.
fn printable(value: &str) -> String {
    value
        .chars()
        .filter(|&c| (c as u32) >= 0x20 || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    r#"</Types>"#
);

const PACKAGE_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#
);

const WORKBOOK_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"</Relationships>"#
);

const STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="2">"#,
    r#"<font><sz val="11"/><name val="Calibri"/></font>"#,
    r#"<font><b/><sz val="11"/><name val="Calibri"/></font>"#,
    r#"</fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="2">"#,
    r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
    r#"<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/>"#,
    r#"</cellXfs>"#,
    r#"</styleSheet>"#
);
