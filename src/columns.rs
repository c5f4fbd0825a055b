//! Header normalization onto the four canonical stock fields.
//!
//! Spreadsheet templates drift between years and authors ("Cod. Item",
//! "Número da Peça", "Qtd", "Locação", ...). Matching is driven entirely by
//! the tables below:
//!
//! 1. [`SYNONYMS`]: exact matches on the folded header.
//! 2. [`REWRITES`]: substring rewrites collapsing abbreviations toward
//!    canonical stems.
//! 3. [`MARKERS`]: stems that must all be present for a field to match.
//!
//! Adding a new header variant means adding a table row, not a branch.

use serde::{Deserialize, Serialize};

use crate::sanitize::fold;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    PartCode,
    Description,
    Quantity,
    Location,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 4] = [
        CanonicalField::PartCode,
        CanonicalField::Description,
        CanonicalField::Quantity,
        CanonicalField::Location,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CanonicalField::PartCode => "part_code",
            CanonicalField::Description => "description",
            CanonicalField::Quantity => "quantity",
            CanonicalField::Location => "location",
        }
    }

    fn slot(&self) -> usize {
        match self {
            CanonicalField::PartCode => 0,
            CanonicalField::Description => 1,
            CanonicalField::Quantity => 2,
            CanonicalField::Location => 3,
        }
    }
}

/// Known header spellings, compared after [`fold`].
const SYNONYMS: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::PartCode,
        &[
            "cod. item",
            "cod item",
            "codigo item",
            "cod_item",
            "codigo",
            "cod",
            "cod.",
            "codigo da peca",
        ],
    ),
    (
        CanonicalField::Description,
        &["descric?o", "descricao", "descri", "descr.", "nome"],
    ),
    (CanonicalField::Quantity, &["estoque", "quantidade", "qtd", "qtde"]),
    (
        CanonicalField::Location,
        &["locacao", "localizacao", "local", "loc."],
    ),
];

/// Applied in order; a rewrite is skipped when its replacement is already
/// present so stems are never doubled.
const REWRITES: &[(&str, &str)] = &[
    ("numero", "num"),
    ("nº", "num"),
    ("n°", "num"),
    ("descri", "descricao"),
    ("quant.", "quantidade"),
    ("quant", "quantidade"),
    ("qtd", "quantidade"),
    ("locacao", "localizacao"),
];

/// Every stem listed must occur in the rewritten header.
const MARKERS: &[(CanonicalField, &[&str])] = &[
    (CanonicalField::PartCode, &["num", "peca"]),
    (CanonicalField::Description, &["descricao"]),
    (CanonicalField::Quantity, &["quantidade"]),
    (CanonicalField::Location, &["localizacao"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedHeader {
    Canonical(CanonicalField),
    /// Unmapped header text after folding and rewrites; the column is dropped.
    Free(String),
}

impl NormalizedHeader {
    pub fn field(&self) -> Option<CanonicalField> {
        match self {
            NormalizedHeader::Canonical(f) => Some(*f),
            NormalizedHeader::Free(_) => None,
        }
    }
}

pub fn normalize_header(raw: &str) -> NormalizedHeader {
    let folded = fold(raw);
    if folded.is_empty() {
        return NormalizedHeader::Free(folded);
    }

    for (field, variants) in SYNONYMS {
        if variants.iter().any(|v| *v == folded) {
            return NormalizedHeader::Canonical(*field);
        }
    }

    let mut rewritten = folded;
    for (from, to) in REWRITES {
        if rewritten.contains(from) && !rewritten.contains(to) {
            rewritten = rewritten.replace(from, to);
        }
    }

    for (field, stems) in MARKERS {
        if stems.iter().all(|s| rewritten.contains(s)) {
            return NormalizedHeader::Canonical(*field);
        }
    }

    NormalizedHeader::Free(rewritten)
}

/// Column position of each canonical field within a header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    slots: [Option<usize>; 4],
}

impl ColumnMap {
    /// Maps a header row. When two columns normalize to the same field the
    /// leftmost one wins.
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut map = ColumnMap::default();
        for (col, header) in headers.iter().enumerate() {
            if let Some(field) = normalize_header(header.as_ref()).field() {
                let slot = &mut map.slots[field.slot()];
                if slot.is_none() {
                    *slot = Some(col);
                }
            }
        }
        map
    }

    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.slots[field.slot()]
    }

    pub fn mapped_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn missing(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.mapped_count() == CanonicalField::ALL.len()
    }
}
