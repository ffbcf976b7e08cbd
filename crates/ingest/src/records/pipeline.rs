//! Generic importer record

use super::normalize::Cells;
use super::{any_contains, Record};
use crate::error::RowError;
use crate::source::{AliasTable, ColumnMap, FieldAliases, HeaderProbe, RawRow};
use crate::types::JobKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const ALIASES: AliasTable = AliasTable::new(&[
    FieldAliases::new("pn", &["pn", "pn_rmft", "personal_number"]),
    FieldAliases::new("rm_name", &["nama_rmft", "nama rmft", "rmft", "rm_name"]),
    FieldAliases::new("branch_code", &["kode_uker", "kode uker", "branch_code"]),
    FieldAliases::new("branch_office", &["kc", "kanca", "branch_office"]),
    FieldAliases::new("product", &["prod", "product", "produk"]),
    FieldAliases::new("account_number", &["norek", "no_rek", "no rek", "account_number"]),
    FieldAliases::new("duplicate_flag", &["dup", "duplicate"]),
    FieldAliases::new("customer_name", &["nama", "nama_nasabah", "customer_name", "name"]),
    FieldAliases::new("entry_date", &["tgl", "tanggal", "date", "entry_date"]),
    FieldAliases::new("strategy", &["strategy", "strategi"]),
    FieldAliases::new("segment", &["segment", "segmen"]),
    FieldAliases::new("pipeline_stage", &["pipeline", "pipeline_stage"]),
    FieldAliases::new("projection", &["proyeksi", "projection"]),
]);

const MARKERS: &[&str] = &[
    "kode_uker",
    "kode uker",
    "nama_rmft",
    "nama rmft",
    "norek",
    "no_rek",
    "proyeksi",
];

const PROBES: &[HeaderProbe] = &[HeaderProbe::new(b',', MARKERS), HeaderProbe::new(b';', MARKERS)];

/// Sales pipeline entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    /// Relationship manager personal number
    pub pn: String,
    /// Relationship manager name
    pub rm_name: String,
    /// Branch unit code
    pub branch_code: String,
    /// Branch office
    pub branch_office: String,
    /// Product
    pub product: String,
    /// Customer account number
    pub account_number: String,
    /// Duplicate marker as supplied
    pub duplicate_flag: String,
    /// Customer name
    pub customer_name: String,
    /// Entry date
    pub entry_date: NaiveDate,
    /// Sales strategy
    pub strategy: String,
    /// Customer segment
    pub segment: String,
    /// Pipeline stage
    pub pipeline_stage: String,
    /// Projected amount, in whole currency units
    pub projection: Option<i64>,
}

impl Record for PipelineRecord {
    const KIND: JobKind = JobKind::Pipeline;

    fn aliases() -> AliasTable {
        ALIASES
    }

    fn header_probes() -> &'static [HeaderProbe] {
        PROBES
    }

    fn normalize(row: &RawRow, columns: &ColumnMap) -> Result<Self, RowError> {
        let cells = Cells::new(row, columns);
        Ok(Self {
            pn: cells.required("pn")?,
            rm_name: cells.descriptive("rm_name"),
            branch_code: cells.descriptive("branch_code"),
            branch_office: cells.descriptive("branch_office"),
            product: cells.descriptive("product"),
            account_number: cells.required("account_number")?,
            duplicate_flag: cells.descriptive("duplicate_flag"),
            customer_name: cells.descriptive("customer_name"),
            entry_date: cells.required_date("entry_date")?,
            strategy: cells.descriptive("strategy"),
            segment: cells.descriptive("segment"),
            pipeline_stage: cells.descriptive("pipeline_stage"),
            projection: cells.optional_amount("projection"),
        })
    }

    fn sort_date(&self) -> Option<NaiveDate> {
        Some(self.entry_date)
    }

    fn matches_search(&self, needle: &str) -> bool {
        any_contains(
            &[
                self.pn.as_str(),
                self.rm_name.as_str(),
                self.customer_name.as_str(),
                self.account_number.as_str(),
                self.branch_code.as_str(),
                self.product.as_str(),
            ],
            needle,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::normalize::SENTINEL;

    fn row(cells: &[&str]) -> RawRow {
        RawRow {
            line: 2,
            cells: cells.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    #[test]
    fn test_normalize_full_row() -> Result<(), RowError> {
        let columns = ALIASES.resolve(&[
            "PN", "NAMA_RMFT", "KODE_UKER", "KC", "PROD", "NOREK", "DUP", "NAMA", "TGL",
            "STRATEGY", "SEGMENT", "PIPELINE", "PROYEKSI",
        ]);
        let record = PipelineRecord::normalize(
            &row(&[
                "123", "Sari", "U01", "KC Jakarta", "KPR", "0012", "-", "Budi", "2024-01-31",
                "", "Mikro", "Prospek", "1,500,000",
            ]),
            &columns,
        )?;
        assert_eq!(record.pn, "123");
        assert_eq!(record.duplicate_flag, SENTINEL);
        assert_eq!(record.strategy, SENTINEL);
        assert_eq!(Some(record.entry_date), NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(record.projection, Some(1_500_000));
        Ok(())
    }

    #[test]
    fn test_missing_identifier_rejects() {
        let columns = ALIASES.resolve(&["pn", "norek", "tgl"]);
        let err = PipelineRecord::normalize(&row(&["", "0012", "2024-01-31"]), &columns);
        assert_eq!(err, Err(RowError::MissingField { field: "pn" }));
    }

    #[test]
    fn test_unparsable_projection_is_unset() -> Result<(), RowError> {
        let columns = ALIASES.resolve(&["pn", "norek", "tgl", "proyeksi"]);
        let record =
            PipelineRecord::normalize(&row(&["1", "0012", "31/01/2024", "n/a"]), &columns)?;
        assert_eq!(record.projection, None);
        assert_eq!(record.customer_name, SENTINEL);
        Ok(())
    }
}
