//! Cell stringification, accent folding and part-code normalization.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::sheet::CellValue;

/// Words whose presence in a part-code cell marks the row as a leaked
/// header or title line (compared accent-folded and lowercased).
const HEADER_WORDS: &[&str] = &[
    "codigo",
    "cod",
    "data",
    "geracao",
    "item",
    "descricao",
    "quantidade",
    "qtd",
    "localizacao",
    "local",
    "nome",
    "peca",
    "estoque",
    "preco",
];

/// Characters dropped from part codes when building lookup keys, on top
/// of whitespace.
const CODE_SEPARATORS: &[char] = &['-', '.', '/', '_', '\\'];

/// Trimmed text form of a cell. Empty and error cells become `""`.
pub fn safe_string(value: &CellValue) -> String {
    match value {
        CellValue::Empty | CellValue::Error(_) => String::new(),
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Int(i) => i.to_string(),
        CellValue::Float(f) => format_float(*f),
        CellValue::Bool(b) => b.to_string(),
        CellValue::DateTime(dt) => {
            if dt.time() == chrono::NaiveTime::MIN {
                dt.format("%Y-%m-%d").to_string()
            } else {
                dt.format("%Y-%m-%d %H:%M:%S").to_string()
            }
        }
    }
}

fn format_float(f: f64) -> String {
    if !f.is_finite() {
        return String::new();
    }
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Decomposes to NFD and drops combining marks: `"Localização"` → `"Localizacao"`.
pub fn strip_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Lowercased, trimmed, accent-free form used for headers and free-text matching.
pub fn fold(text: &str) -> String {
    strip_accents(text.trim()).to_lowercase()
}

/// Uppercase with every whitespace character removed. Idempotent.
pub fn normalize_part_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// [`normalize_part_code`] plus accent folding and removal of separator
/// punctuation, so `"A 00018-089 09"` and `"a0001808909"` share a key.
pub fn compact_code(code: &str) -> String {
    strip_accents(&normalize_part_code(code))
        .chars()
        .filter(|c| !CODE_SEPARATORS.contains(c))
        .collect()
}

/// True when the value looks like header or title text rather than a code.
pub fn is_header_artifact(code: &str) -> bool {
    let folded = fold(code);
    HEADER_WORDS.iter().any(|w| folded.contains(w))
}

/// A usable part code is non-empty and not a header artifact.
pub fn is_valid_part_code(code: &str) -> bool {
    !code.trim().is_empty() && !is_header_artifact(code)
}
