use anyhow::Context;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const TEMPLATE_SHEET_NAME: &str = "Eleves";
pub const TEMPLATE_HEADER: [&str; 4] = ["Nom", "Prénom", "Date de naissance", "Âge"];
pub const TEMPLATE_COLUMN_WIDTHS: [f64; 4] = [20.0, 20.0, 20.0, 10.0];
pub const TEMPLATE_ROWS: [[&str; 4]; 3] = [
    ["Ben Ali", "Ahmed", "15/06/2018", ""],
    ["Trabelsi", "Yasmine", "03/09/2017", ""],
    ["Haddad", "Omar", "", "7"],
];

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

#[derive(Debug, Clone)]
pub struct TemplateSummary {
    pub sample_rows: usize,
    pub entry_count: usize,
}

fn xml_escape(s: &str) -> String {
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

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
fn column_name(mut idx: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).to_string()
}

fn cell_xml(col: usize, row: usize, value: &str) -> String {
    let r = format!("{}{}", column_name(col), row);
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        format!(r#"<c r="{}"><v>{}</v></c>"#, r, value)
    } else {
        format!(
            r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
            r,
            xml_escape(value)
        )
    }
}

fn row_xml(row: usize, values: &[&str]) -> String {
    let cells: String = values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_empty())
        .map(|(col, v)| cell_xml(col, row, v))
        .collect();
    format!(r#"<row r="{}">{}</row>"#, row, cells)
}

pub fn worksheet_xml() -> String {
    let cols: String = TEMPLATE_COLUMN_WIDTHS
        .iter()
        .enumerate()
        .map(|(i, w)| {
            format!(
                r#"<col min="{n}" max="{n}" width="{w}" customWidth="1"/>"#,
                n = i + 1,
                w = w
            )
        })
        .collect();

    let mut rows = row_xml(1, &TEMPLATE_HEADER);
    for (i, sample) in TEMPLATE_ROWS.iter().enumerate() {
        rows.push_str(&row_xml(i + 2, sample));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cols>{}</cols><sheetData>{}</sheetData></worksheet>"#,
        cols, rows
    )
}

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        xml_escape(TEMPLATE_SHEET_NAME)
    )
}

pub fn write_template_to<W: Write + Seek>(out: W) -> anyhow::Result<TemplateSummary> {
    let mut zip = ZipWriter::new(out);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let entries: [(&str, String); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", worksheet_xml()),
    ];
    for (name, body) in &entries {
        zip.start_file(*name, opts)
            .with_context(|| format!("failed to start {} entry", name))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write {} entry", name))?;
    }
    zip.finish().context("failed to finalize template workbook")?;

    Ok(TemplateSummary {
        sample_rows: TEMPLATE_ROWS.len(),
        entry_count: entries.len(),
    })
}

pub fn write_template(out_path: &Path) -> anyhow::Result<TemplateSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    write_template_to(out_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_roll_over_after_z() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(3), "D");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
    }

    #[test]
    fn worksheet_carries_widths_and_blank_cells_are_omitted() {
        let xml = worksheet_xml();
        assert!(xml.contains(r#"<col min="4" max="4" width="10" customWidth="1"/>"#));
        assert!(xml.contains(r#"<c r="B1" t="inlineStr"><is><t>Prénom</t></is></c>"#));
        assert!(xml.contains(r#"<c r="D4"><v>7</v></c>"#));
        assert!(!xml.contains(r#"r="D2""#));
    }
}
