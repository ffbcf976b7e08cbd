//! Schema resolution: canonical field name to column index via alias tables

use super::reader::RawRow;
use std::collections::HashMap;

/// Accepted header names for one canonical field, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAliases {
    /// Canonical field name
    pub field: &'static str,
    /// Lowercase header aliases; the first one present in the header wins
    pub aliases: &'static [&'static str],
}

impl FieldAliases {
    /// Create a new alias entry
    #[must_use]
    pub const fn new(field: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { field, aliases }
    }
}

/// Declarative alias table for a record type
#[derive(Debug, Clone, Copy)]
pub struct AliasTable {
    entries: &'static [FieldAliases],
}

impl AliasTable {
    /// Create a table over static entries
    #[must_use]
    pub const fn new(entries: &'static [FieldAliases]) -> Self {
        Self { entries }
    }

    /// Table entries
    #[must_use]
    pub const fn entries(&self) -> &'static [FieldAliases] {
        self.entries
    }

    /// Build the column map for a header row
    #[must_use]
    pub fn resolve<S: AsRef<str>>(&self, header: &[S]) -> ColumnMap {
        let normalized: Vec<String> = header
            .iter()
            .map(|cell| cell.as_ref().trim().to_lowercase())
            .collect();

        let columns: HashMap<&'static str, usize> = self
            .entries
            .iter()
            .filter_map(|entry| {
                entry.aliases.iter().find_map(|alias| {
                    normalized
                        .iter()
                        .position(|cell| cell.as_str() == *alias)
                        .map(|idx| (entry.field, idx))
                })
            })
            .collect();

        let unresolved = self
            .entries
            .iter()
            .map(|entry| entry.field)
            .filter(|field| !columns.contains_key(field))
            .collect();

        ColumnMap {
            columns,
            unresolved,
        }
    }
}

/// Immutable field-to-column mapping built once per job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<&'static str, usize>,
    unresolved: Vec<&'static str>,
}

impl ColumnMap {
    /// Column index for a field, if the header carries it
    #[must_use]
    pub fn index(&self, field: &str) -> Option<usize> {
        self.columns.get(field).copied()
    }

    /// Trimmed cell for `field`, or `""` when the field is unmapped or the
    /// row is too short
    #[must_use]
    pub fn cell<'a>(&self, row: &'a RawRow, field: &str) -> &'a str {
        self.index(field)
            .and_then(|idx| row.cells.get(idx))
            .map_or("", |cell| cell.trim())
    }

    /// Fields no header cell resolved to
    #[must_use]
    pub fn unresolved(&self) -> &[&'static str] {
        &self.unresolved
    }

    /// Number of resolved fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether no field resolved
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: AliasTable = AliasTable::new(&[
        FieldAliases::new("account_number", &["norek", "no_rek", "account_number"]),
        FieldAliases::new("name", &["nama", "name"]),
        FieldAliases::new("segment", &["segment", "segmen"]),
    ]);

    fn row(cells: &[&str]) -> RawRow {
        RawRow {
            line: 2,
            cells: cells.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    #[test]
    fn test_resolution_is_case_insensitive_and_trimmed() {
        let map = TABLE.resolve(&["  NAMA ", "No_Rek"]);
        assert_eq!(map.index("account_number"), Some(1));
        assert_eq!(map.index("name"), Some(0));
        assert_eq!(map.unresolved(), &["segment"]);
    }

    #[test]
    fn test_earlier_alias_wins_over_column_order() {
        let map = TABLE.resolve(&["account_number", "norek"]);
        assert_eq!(map.index("account_number"), Some(1));
    }

    #[test]
    fn test_cell_defaults_to_empty() {
        let map = TABLE.resolve(&["norek", "nama"]);
        let short = row(&["100"]);
        assert_eq!(map.cell(&short, "account_number"), "100");
        assert_eq!(map.cell(&short, "name"), "");
        assert_eq!(map.cell(&short, "segment"), "");
    }
}
