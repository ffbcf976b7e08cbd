//! `SQLite` record store
//!
//! One table per record type. Each batch is one transaction: any row error
//! rolls the whole batch back. Blocking calls run on the blocking pool.

use super::{RecordStore, StoredRecord};
use crate::error::{IngestError, IngestResult};
use crate::records::{BalanceRecord, PipelineRecord, Record, RfmtRecord};
use crate::types::{Pagination, RecordFilter, SortOrder};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Mapping between a record type and its table
pub trait SqlRecord: Record {
    /// Table name
    const TABLE: &'static str;

    /// Column definitions, excluding `id` and `imported_at`
    const COLUMNS: &'static [(&'static str, &'static str)];

    /// Columns matched by search
    const SEARCH_COLUMNS: &'static [&'static str];

    /// Date column used for ordering ahead of `id`, if the table has one
    const DATE_COLUMN: Option<&'static str>;

    /// Values in `COLUMNS` order
    fn to_sql_values(&self) -> Vec<Value>;

    /// Decode from a row selected with `COLUMNS` by name
    ///
    /// # Errors
    ///
    /// Returns error if a column is missing or has the wrong type.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Shared `SQLite` connection; one per database file
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Open a database file (created if missing) for sharing between stores
///
/// # Errors
///
/// Returns error if the file cannot be opened.
pub fn open_shared(path: impl AsRef<Path>) -> IngestResult<SharedConnection> {
    let conn = Connection::open(path)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// `SQLite`-backed store for one record type
#[derive(Debug)]
pub struct SqliteStore<R> {
    conn: SharedConnection,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for SqliteStore<R> {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            _record: PhantomData,
        }
    }
}

impl<R: SqlRecord> SqliteStore<R> {
    /// Open a database file and create the table
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or the schema created.
    pub fn open(path: impl AsRef<Path>) -> IngestResult<Self> {
        Self::attach(open_shared(path)?)
    }

    /// Private in-memory database
    ///
    /// # Errors
    ///
    /// Returns error if the schema cannot be created.
    pub fn in_memory() -> IngestResult<Self> {
        Self::attach(Arc::new(Mutex::new(Connection::open_in_memory()?)))
    }

    /// Use an existing connection, creating the table if needed
    ///
    /// # Errors
    ///
    /// Returns error if the schema cannot be created.
    pub fn attach(conn: SharedConnection) -> IngestResult<Self> {
        {
            let guard = conn.lock();
            register_functions(&guard)?;
            guard.execute_batch(&create_table_sql::<R>())?;
        }
        debug!(table = R::TABLE, "sqlite schema ready");
        Ok(Self {
            conn,
            _record: PhantomData,
        })
    }

    async fn blocking<T, F>(&self, operation: &'static str, f: F) -> IngestResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| IngestError::storage(operation, format!("task failed: {e}")))?
        .map_err(|e| IngestError::storage(operation, e.to_string()))
    }
}

#[async_trait]
impl<R: SqlRecord> RecordStore<R> for SqliteStore<R> {
    async fn batch_insert(&self, records: &[R]) -> IngestResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Vec<Value>> = records.iter().map(R::to_sql_values).collect();
        let imported_at = Value::Text(Utc::now().format("%F %T%.f%:z").to_string());
        let sql = insert_sql::<R>();

        self.blocking("batch_insert", move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(&sql)?;
                for row in rows.iter() {
                    stmt.execute(params_from_iter(
                        std::iter::once(&imported_at).chain(row.iter()),
                    ))?;
                }
            }
            tx.commit()?;
            Ok(rows.len() as u64)
        })
        .await
    }

    async fn count(&self, filter: &RecordFilter) -> IngestResult<u64> {
        let (clause, params) = where_clause::<R>(filter);
        let sql = format!("SELECT COUNT(*) FROM {}{clause}", R::TABLE);

        let count: i64 = self
            .blocking("count", move |conn| {
                conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
            })
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn query(
        &self,
        filter: &RecordFilter,
        page: &Pagination,
        order: SortOrder,
    ) -> IngestResult<Vec<StoredRecord<R>>> {
        let (clause, mut params) = where_clause::<R>(filter);
        let direction = match order {
            SortOrder::NewestFirst => "DESC",
            SortOrder::OldestFirst => "ASC",
        };
        let ordering = match R::DATE_COLUMN {
            Some(date) => format!("{date} {direction}, id {direction}"),
            None => format!("id {direction}"),
        };
        let sql = format!(
            "SELECT id, imported_at, {columns} FROM {table}{clause} \
             ORDER BY {ordering} LIMIT ? OFFSET ?",
            columns = column_list::<R>(),
            table = R::TABLE,
        );
        params.push(Value::Integer(i64::try_from(page.limit).unwrap_or(i64::MAX)));
        params.push(Value::Integer(i64::try_from(page.offset).unwrap_or(i64::MAX)));

        self.blocking("query", move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                Ok(StoredRecord {
                    id: row.get("id")?,
                    imported_at: row.get::<_, DateTime<Utc>>("imported_at")?,
                    record: R::from_row(row)?,
                })
            })?;
            let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

/// Lowercases with full Unicode rules, the same folding the in-memory
/// store applies; `LIKE` alone only folds ASCII
const FOLD_FN: &str = "bulkload_fold";

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        FOLD_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|text| text.to_lowercase())),
    )
}

fn column_list<R: SqlRecord>() -> String {
    R::COLUMNS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn create_table_sql<R: SqlRecord>() -> String {
    let columns = R::COLUMNS
        .iter()
        .map(|(name, ty)| format!("{name} {ty}"))
        .collect::<Vec<_>>()
        .join(",\n  ");
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n  \
         id INTEGER PRIMARY KEY AUTOINCREMENT,\n  \
         imported_at TEXT NOT NULL,\n  {columns}\n);",
        table = R::TABLE,
    );
    if let Some(date) = R::DATE_COLUMN {
        sql.push_str(&format!(
            "\nCREATE INDEX IF NOT EXISTS idx_{table}_{date} ON {table} ({date}, id);",
            table = R::TABLE,
        ));
    }
    sql
}

fn insert_sql<R: SqlRecord>() -> String {
    let placeholders = vec!["?"; R::COLUMNS.len() + 1].join(", ");
    format!(
        "INSERT INTO {} (imported_at, {}) VALUES ({placeholders})",
        R::TABLE,
        column_list::<R>()
    )
}

/// `WHERE` clause and its parameters; search terms match as escaped,
/// case-folded substrings
fn where_clause<R: SqlRecord>(filter: &RecordFilter) -> (String, Vec<Value>) {
    let Some(term) = filter.search.as_deref() else {
        return (String::new(), Vec::new());
    };
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let pattern = format!("%{escaped}%");
    let conditions = R::SEARCH_COLUMNS
        .iter()
        .map(|column| format!("{FOLD_FN}({column}) LIKE ? ESCAPE '\\'"))
        .collect::<Vec<_>>()
        .join(" OR ");
    let params = vec![Value::Text(pattern); R::SEARCH_COLUMNS.len()];
    (format!(" WHERE ({conditions})"), params)
}

fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format("%F").to_string())
}

fn optional_amount(amount: Option<i64>) -> Value {
    amount.map_or(Value::Null, Value::Integer)
}

impl SqlRecord for PipelineRecord {
    const TABLE: &'static str = "pipelines";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("pn", "TEXT NOT NULL"),
        ("rm_name", "TEXT NOT NULL"),
        ("branch_code", "TEXT NOT NULL"),
        ("branch_office", "TEXT NOT NULL"),
        ("product", "TEXT NOT NULL"),
        ("account_number", "TEXT NOT NULL"),
        ("duplicate_flag", "TEXT NOT NULL"),
        ("customer_name", "TEXT NOT NULL"),
        ("entry_date", "TEXT NOT NULL"),
        ("strategy", "TEXT NOT NULL"),
        ("segment", "TEXT NOT NULL"),
        ("pipeline_stage", "TEXT NOT NULL"),
        ("projection", "INTEGER"),
    ];
    const SEARCH_COLUMNS: &'static [&'static str] = &[
        "pn",
        "rm_name",
        "customer_name",
        "account_number",
        "branch_code",
        "product",
    ];
    const DATE_COLUMN: Option<&'static str> = Some("entry_date");

    fn to_sql_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.pn.clone()),
            Value::Text(self.rm_name.clone()),
            Value::Text(self.branch_code.clone()),
            Value::Text(self.branch_office.clone()),
            Value::Text(self.product.clone()),
            Value::Text(self.account_number.clone()),
            Value::Text(self.duplicate_flag.clone()),
            Value::Text(self.customer_name.clone()),
            date_value(self.entry_date),
            Value::Text(self.strategy.clone()),
            Value::Text(self.segment.clone()),
            Value::Text(self.pipeline_stage.clone()),
            optional_amount(self.projection),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pn: row.get("pn")?,
            rm_name: row.get("rm_name")?,
            branch_code: row.get("branch_code")?,
            branch_office: row.get("branch_office")?,
            product: row.get("product")?,
            account_number: row.get("account_number")?,
            duplicate_flag: row.get("duplicate_flag")?,
            customer_name: row.get("customer_name")?,
            entry_date: row.get("entry_date")?,
            strategy: row.get("strategy")?,
            segment: row.get("segment")?,
            pipeline_stage: row.get("pipeline_stage")?,
            projection: row.get("projection")?,
        })
    }
}

impl SqlRecord for BalanceRecord {
    const TABLE: &'static str = "balances";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("period", "TEXT NOT NULL"),
        ("main_branch", "TEXT NOT NULL"),
        ("branch", "TEXT NOT NULL"),
        ("cif", "TEXT NOT NULL"),
        ("account_number", "TEXT NOT NULL"),
        ("account_type", "TEXT NOT NULL"),
        ("name", "TEXT NOT NULL"),
        ("officer_pn", "TEXT NOT NULL"),
        ("balance", "INTEGER NOT NULL"),
        ("available_balance", "INTEGER"),
        ("average_balance", "INTEGER"),
        ("open_date", "TEXT NOT NULL"),
    ];
    const SEARCH_COLUMNS: &'static [&'static str] = &[
        "name",
        "cif",
        "account_number",
        "branch",
        "main_branch",
        "officer_pn",
    ];
    const DATE_COLUMN: Option<&'static str> = Some("period");

    fn to_sql_values(&self) -> Vec<Value> {
        vec![
            date_value(self.period),
            Value::Text(self.main_branch.clone()),
            Value::Text(self.branch.clone()),
            Value::Text(self.cif.clone()),
            Value::Text(self.account_number.clone()),
            Value::Text(self.account_type.clone()),
            Value::Text(self.name.clone()),
            Value::Text(self.officer_pn.clone()),
            Value::Integer(self.balance),
            optional_amount(self.available_balance),
            optional_amount(self.average_balance),
            date_value(self.open_date),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            period: row.get("period")?,
            main_branch: row.get("main_branch")?,
            branch: row.get("branch")?,
            cif: row.get("cif")?,
            account_number: row.get("account_number")?,
            account_type: row.get("account_type")?,
            name: row.get("name")?,
            officer_pn: row.get("officer_pn")?,
            balance: row.get("balance")?,
            available_balance: row.get("available_balance")?,
            average_balance: row.get("average_balance")?,
            open_date: row.get("open_date")?,
        })
    }
}

impl SqlRecord for RfmtRecord {
    const TABLE: &'static str = "rfmts";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("pn", "TEXT NOT NULL"),
        ("full_name", "TEXT NOT NULL"),
        ("job_grade", "TEXT NOT NULL"),
        ("employee_group", "TEXT NOT NULL"),
        ("branch_office", "TEXT NOT NULL"),
        ("unit", "TEXT NOT NULL"),
        ("target_unit", "TEXT NOT NULL"),
        ("remarks", "TEXT NOT NULL"),
        ("position_group", "TEXT NOT NULL"),
    ];
    const SEARCH_COLUMNS: &'static [&'static str] =
        &["pn", "full_name", "job_grade", "branch_office"];
    const DATE_COLUMN: Option<&'static str> = None;

    fn to_sql_values(&self) -> Vec<Value> {
        [
            &self.pn,
            &self.full_name,
            &self.job_grade,
            &self.employee_group,
            &self.branch_office,
            &self.unit,
            &self.target_unit,
            &self.remarks,
            &self.position_group,
        ]
        .into_iter()
        .map(|text| Value::Text(text.clone()))
        .collect()
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pn: row.get("pn")?,
            full_name: row.get("full_name")?,
            job_grade: row.get("job_grade")?,
            employee_group: row.get("employee_group")?,
            branch_office: row.get("branch_office")?,
            unit: row.get("unit")?,
            target_unit: row.get("target_unit")?,
            remarks: row.get("remarks")?,
            position_group: row.get("position_group")?,
        })
    }
}
