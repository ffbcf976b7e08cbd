//! Filtered importer record: account balance snapshot

use super::normalize::Cells;
use super::{any_contains, Record};
use crate::error::RowError;
use crate::pipeline::filter::DropMetric;
use crate::source::{AliasTable, ColumnMap, FieldAliases, HeaderProbe, RawRow};
use crate::types::JobKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::trace;

const ALIASES: AliasTable = AliasTable::new(&[
    FieldAliases::new("period", &["periode", "period"]),
    FieldAliases::new("main_branch", &["main_branch", "main branch", "kanwil"]),
    FieldAliases::new("branch", &["branch", "kode_uker", "kode uker"]),
    FieldAliases::new("cif", &["cif"]),
    FieldAliases::new("account_number", &["norek", "no_rek", "no rek", "account_number"]),
    FieldAliases::new("account_type", &["type", "account_type", "jenis"]),
    FieldAliases::new("name", &["nama", "name", "nama_nasabah"]),
    FieldAliases::new("officer_pn", &["pn_pengelola", "pn pengelola", "officer_pn"]),
    FieldAliases::new("balance", &["balance", "saldo"]),
    FieldAliases::new("available_balance", &["aval_balance", "available_balance"]),
    FieldAliases::new(
        "average_balance",
        &["avg_balance", "average_balance", "saldo_rata_rata"],
    ),
    FieldAliases::new("open_date", &["open_date", "tanggal_buka"]),
]);

const MARKERS: &[&str] = &["periode", "cif", "avg_balance", "main_branch"];

const PROBES: &[HeaderProbe] = &[HeaderProbe::new(b',', MARKERS), HeaderProbe::new(b';', MARKERS)];

/// Account balance snapshot for one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    /// Reporting period
    pub period: NaiveDate,
    /// Regional office
    pub main_branch: String,
    /// Branch unit
    pub branch: String,
    /// Customer information file number
    pub cif: String,
    /// Account number
    pub account_number: String,
    /// Account type
    pub account_type: String,
    /// Account holder
    pub name: String,
    /// Officer personal number
    pub officer_pn: String,
    /// Balance at period end
    pub balance: i64,
    /// Available balance
    pub available_balance: Option<i64>,
    /// Average balance over the period
    pub average_balance: Option<i64>,
    /// Account opening date; the period when absent
    pub open_date: NaiveDate,
}

impl Record for BalanceRecord {
    const KIND: JobKind = JobKind::BalanceDrop;

    fn aliases() -> AliasTable {
        ALIASES
    }

    fn header_probes() -> &'static [HeaderProbe] {
        PROBES
    }

    fn normalize(row: &RawRow, columns: &ColumnMap) -> Result<Self, RowError> {
        let cells = Cells::new(row, columns);
        let period = cells.required_date("period")?;
        let open_date = cells.optional_date("open_date").unwrap_or_else(|| {
            if !cells.raw("open_date").is_empty() {
                trace!(line = row.line, value = cells.raw("open_date"), "open_date unparsable, using period");
            }
            period
        });

        Ok(Self {
            period,
            main_branch: cells.descriptive("main_branch"),
            branch: cells.required("branch")?,
            cif: cells.required("cif")?,
            account_number: cells.required("account_number")?,
            account_type: cells.descriptive("account_type"),
            name: cells.descriptive("name"),
            officer_pn: cells.descriptive("officer_pn"),
            balance: cells.required_amount("balance")?,
            available_balance: cells.optional_amount("available_balance"),
            average_balance: cells.optional_amount("average_balance"),
            open_date,
        })
    }

    fn sort_date(&self) -> Option<NaiveDate> {
        Some(self.period)
    }

    fn matches_search(&self, needle: &str) -> bool {
        any_contains(
            &[
                self.name.as_str(),
                self.cif.as_str(),
                self.account_number.as_str(),
                self.branch.as_str(),
                self.main_branch.as_str(),
                self.officer_pn.as_str(),
            ],
            needle,
        )
    }
}

impl DropMetric for BalanceRecord {
    fn current(&self) -> i64 {
        self.balance
    }

    fn average(&self) -> Option<i64> {
        self.average_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &[&str] = &[
        "periode",
        "main_branch",
        "branch",
        "cif",
        "norek",
        "type",
        "nama",
        "pn_pengelola",
        "balance",
        "aval_balance",
        "avg_balance",
        "open_date",
    ];

    fn row(cells: &[&str]) -> RawRow {
        RawRow {
            line: 5,
            cells: cells.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    #[test]
    fn test_normalize_full_row() -> Result<(), RowError> {
        let columns = ALIASES.resolve(HEADER);
        let record = BalanceRecord::normalize(
            &row(&[
                "2024-06-30", "Jakarta", "U01", "C001", "0012", "TAB", "Budi", "-", "250,000",
                "240,000", "1,000,000", "15/01/2019",
            ]),
            &columns,
        )?;
        assert_eq!(record.balance, 250_000);
        assert_eq!(record.average_balance, Some(1_000_000));
        assert_eq!(record.officer_pn, "N/A");
        assert_eq!(Some(record.open_date), NaiveDate::from_ymd_opt(2019, 1, 15));
        Ok(())
    }

    #[test]
    fn test_open_date_defaults_to_period() -> Result<(), RowError> {
        let columns = ALIASES.resolve(HEADER);
        let record = BalanceRecord::normalize(
            &row(&[
                "2024-06-30", "", "U01", "C001", "0012", "", "", "", "500", "", "", "",
            ]),
            &columns,
        )?;
        assert_eq!(record.open_date, record.period);
        assert_eq!(record.average_balance, None);
        Ok(())
    }

    #[test]
    fn test_short_row_rejected_on_required_amount() {
        let columns = ALIASES.resolve(HEADER);
        let result = BalanceRecord::normalize(
            &row(&["2024-06-30", "Jakarta", "U01", "C001", "0012"]),
            &columns,
        );
        assert_eq!(result, Err(RowError::MissingField { field: "balance" }));
    }

    #[test]
    fn test_invalid_period_rejected() {
        let columns = ALIASES.resolve(HEADER);
        let result = BalanceRecord::normalize(
            &row(&["June 2024", "", "U01", "C001", "0012", "", "", "", "500"]),
            &columns,
        );
        assert!(matches!(
            result,
            Err(RowError::InvalidDate { field: "period", .. })
        ));
    }
}
