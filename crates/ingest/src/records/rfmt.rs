//! Staff roster record: relationship manager assignments

use super::normalize::Cells;
use super::{any_contains, Record};
use crate::error::RowError;
use crate::source::{AliasTable, ColumnMap, FieldAliases, HeaderProbe, RawRow};
use crate::types::JobKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const ALIASES: AliasTable = AliasTable::new(&[
    FieldAliases::new("pn", &["pn", "personal_number"]),
    FieldAliases::new("full_name", &["nama lengkap", "nama_lengkap", "full_name", "nama"]),
    FieldAliases::new("job_grade", &["jg", "job_grade"]),
    FieldAliases::new("employee_group", &["esgdesc", "employee_group"]),
    FieldAliases::new("branch_office", &["kanca", "kc", "branch_office"]),
    FieldAliases::new("unit", &["uker", "unit"]),
    FieldAliases::new("target_unit", &["uker tujuan", "uker_tujuan", "target_unit"]),
    FieldAliases::new("remarks", &["keterangan", "remarks"]),
    FieldAliases::new(
        "position_group",
        &[
            "kelompok jabatan rmft baru",
            "kelompok jabatan rmft",
            "kelompok_jabatan_rmft_baru",
            "kelompok_jabatan_rmft",
            "position_group",
        ],
    ),
]);

const MARKERS: &[&str] = &[
    "esgdesc",
    "nama lengkap",
    "nama_lengkap",
    "uker tujuan",
    "uker_tujuan",
    "kelompok jabatan",
];

// Roster exports are semicolon-separated; comma is the fallback.
const PROBES: &[HeaderProbe] = &[HeaderProbe::new(b';', MARKERS), HeaderProbe::new(b',', MARKERS)];

/// One staff member's current and target assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfmtRecord {
    /// Personal number
    pub pn: String,
    /// Full name
    pub full_name: String,
    /// Job grade
    pub job_grade: String,
    /// Employee subgroup description
    pub employee_group: String,
    /// Branch office
    pub branch_office: String,
    /// Current unit
    pub unit: String,
    /// Unit the staff member moves to
    pub target_unit: String,
    /// Free-text remarks
    pub remarks: String,
    /// Relationship manager position group
    pub position_group: String,
}

impl Record for RfmtRecord {
    const KIND: JobKind = JobKind::Rfmt;

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
            full_name: cells.required("full_name")?,
            job_grade: cells.descriptive("job_grade"),
            employee_group: cells.descriptive("employee_group"),
            branch_office: cells.descriptive("branch_office"),
            unit: cells.descriptive("unit"),
            target_unit: cells.descriptive("target_unit"),
            remarks: cells.descriptive("remarks"),
            position_group: cells.descriptive("position_group"),
        })
    }

    fn sort_date(&self) -> Option<NaiveDate> {
        None
    }

    fn matches_search(&self, needle: &str) -> bool {
        any_contains(
            &[
                self.pn.as_str(),
                self.full_name.as_str(),
                self.job_grade.as_str(),
                self.branch_office.as_str(),
            ],
            needle,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::normalize::SENTINEL;
    use crate::source::SourceReader;

    const HEADER: [&str; 9] = [
        "PN",
        "Nama Lengkap",
        "JG",
        "ESGDESC",
        "Kanca",
        "Uker",
        "Uker Tujuan",
        "Keterangan",
        "Kelompok Jabatan RMFT Baru",
    ];

    fn row(cells: &[&str]) -> RawRow {
        RawRow {
            line: 2,
            cells: cells.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    #[test]
    fn test_roster_header_resolves_every_field() {
        let columns = ALIASES.resolve(&HEADER);
        assert!(columns.unresolved().is_empty());
        assert_eq!(columns.index("position_group"), Some(8));
    }

    #[test]
    fn test_normalize_roster_row() -> Result<(), RowError> {
        let columns = ALIASES.resolve(&HEADER);
        let record = RfmtRecord::normalize(
            &row(&[
                "00012345", "Sari Dewi", "JG08", "Pelaksana", "KC Bandung", "KCP Dago", "", "",
                "RM Mikro",
            ]),
            &columns,
        )?;
        assert_eq!(record.pn, "00012345");
        assert_eq!(record.full_name, "Sari Dewi");
        assert_eq!(record.target_unit, SENTINEL);
        assert_eq!(record.position_group, "RM Mikro");
        assert!(record.matches_search("bandung"));
        assert!(!record.matches_search("dago"));
        Ok(())
    }

    #[test]
    fn test_short_row_rejected() {
        let columns = ALIASES.resolve(&HEADER);
        let err = RfmtRecord::normalize(&row(&["00012345"]), &columns);
        assert_eq!(err, Err(RowError::MissingField { field: "full_name" }));
    }

    #[test]
    fn test_semicolon_header_with_stray_quotes() -> crate::error::IngestResult<()> {
        let data = "PN;Nama Lengkap;JG;ESGDESC;Kanca;Uker;Uker Tujuan;Keterangan;Kelompok Jabatan RMFT\n\
                    1;Budi \"Ucok\" S;JG07;Staf;KC A;U1;U2;mutasi;RM\n";
        let reader = SourceReader::detect(data.as_bytes(), 10, PROBES)?;
        assert_eq!(reader.header().delimiter, b';');
        let columns = ALIASES.resolve(&reader.header().cells);

        let mut records = Vec::new();
        for item in reader {
            if let crate::source::ReadOutcome::Row(row) = item? {
                records.extend(RfmtRecord::normalize(&row, &columns).ok());
            }
        }
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].full_name, "Budi \"Ucok\" S");
        Ok(())
    }
}
