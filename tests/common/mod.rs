//! Shared fixtures: minimal `.xlsx` snapshots and config files.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Estoque" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// Title line, generation-date line, then the header on the third row,
/// followed by `rows` as (code, description, quantity, location).
pub fn stock_sheet(rows: &[[&str; 4]]) -> Vec<Vec<String>> {
    let mut out = vec![
        vec!["RELATÓRIO DE ESTOQUE".to_string()],
        vec!["Data de geração: 15/01/2024".to_string()],
        ["Código", "Descrição", "Qtd", "Localização"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    ];
    out.extend(rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()));
    out
}

/// Workbook with inline-string cells; numeric-looking text is written as numbers.
pub fn write_xlsx<S: AsRef<str>>(path: &Path, rows: &[Vec<S>]) {
    let sheet = sheet_xml(rows);
    write_parts(path, &[
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", WORKBOOK.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", sheet),
    ]);
}

fn write_parts(path: &Path, parts: &[(&str, String)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, body) in parts {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn sheet_xml<S: AsRef<str>>(rows: &[Vec<S>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        let number = r + 1;
        xml.push_str(&format!(r#"<row r="{}">"#, number));
        for (c, value) in row.iter().enumerate() {
            let value = value.as_ref();
            if value.is_empty() {
                continue;
            }
            let reference = format!("{}{}", column_letters(c), number);
            if is_numeric(value) {
                xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, value));
            } else {
                xml.push_str(&format!(
                    r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    reference,
                    escape(value)
                ));
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn is_numeric(value: &str) -> bool {
    let leading_zero = value.len() > 1 && value.starts_with('0') && !value.starts_with("0.");
    !leading_zero && value.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

fn column_letters(mut col: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Writes `config/stock.toml` under `root` reading spreadsheets from `data_dir`.
/// `extra` is appended verbatim (additional TOML sections).
pub fn write_config(root: &Path, data_dir: &Path, extra: &str) -> PathBuf {
    let config_dir = root.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    let content = format!(
        r#"[data]
dir = "{}"

[reload]
interval_secs = 0
{}
"#,
        data_dir.display(),
        extra
    );
    let path = config_dir.join("stock.toml");
    std::fs::write(&path, content).unwrap();
    path
}

/// One stock snapshot file in `dir` named `name`.
pub fn write_snapshot(dir: &Path, name: &str, rows: &[[&str; 4]]) {
    std::fs::create_dir_all(dir).unwrap();
    write_xlsx(&dir.join(name), &stock_sheet(rows));
}
