//! Minimal `.xlsx` writers for unit tests.

use std::io::Write;
use std::path::Path;

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
    let sheet = sheet_xml(rows, None);
    write_parts(path, &[
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", WORKBOOK.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", sheet),
    ]);
}

/// Same as [`write_xlsx`] but text goes through `xl/sharedStrings.xml`.
pub fn write_xlsx_shared<S: AsRef<str>>(path: &Path, rows: &[Vec<S>]) {
    let mut strings = Vec::new();
    let sheet = sheet_xml(rows, Some(&mut strings));
    let shared = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{n}" uniqueCount="{n}">{}</sst>"#,
        strings
            .iter()
            .map(|s| format!("<si><t>{}</t></si>", escape(s)))
            .collect::<String>(),
        n = strings.len()
    );
    write_parts(path, &[
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", WORKBOOK.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/sharedStrings.xml", shared),
        ("xl/worksheets/sheet1.xml", sheet),
    ]);
}

/// Archive holding only the worksheet part, which structured readers reject.
pub fn write_bare_sheet<S: AsRef<str>>(path: &Path, rows: &[Vec<S>]) {
    write_parts(path, &[("xl/worksheets/sheet1.xml", sheet_xml(rows, None))]);
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

fn sheet_xml<S: AsRef<str>>(rows: &[Vec<S>], mut shared: Option<&mut Vec<String>>) -> String {
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
            } else if let Some(strings) = shared.as_deref_mut() {
                strings.push(value.to_string());
                xml.push_str(&format!(
                    r#"<c r="{}" t="s"><v>{}</v></c>"#,
                    reference,
                    strings.len() - 1
                ));
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
