use super::query::{where_clause, Condition, ConditionOperator, Record, SelectQuery};
use crate::error::{CatalogError, Result};
use crate::sqlite_persistence::{create_table_sql, Column};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a connection with foreign-key enforcement and a busy timeout.
pub fn open_connection<P: AsRef<Path>>(path: P) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    Ok(conn)
}

pub(crate) fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON;", [])?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

/// Column names and rows of a select, in projection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Read access to tabular data, as consumed by the view models.
pub trait TableSource {
    fn select(&self, query: &SelectQuery) -> Result<ResultSet>;
}

/// Generic table management on top of a shared SQLite connection.
///
/// Keeps a snapshot of every table's columns. Table and column names are
/// checked against that snapshot before they are put into a statement, and
/// every value is bound as a parameter.
#[derive(Clone)]
pub struct TableHandler {
    conn: Arc<Mutex<Connection>>,
    db_name: String,
    description: Arc<Mutex<BTreeMap<String, Vec<String>>>>,
}

impl TableHandler {
    pub fn new(conn: Arc<Mutex<Connection>>, db_name: impl Into<String>) -> Result<Self> {
        let handler = TableHandler {
            conn,
            db_name: db_name.into(),
            description: Arc::new(Mutex::new(BTreeMap::new())),
        };
        handler.update_db_description()?;
        Ok(handler)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = open_connection(path.as_ref())?;
        Self::new(
            Arc::new(Mutex::new(conn)),
            path.as_ref().display().to_string(),
        )
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        Self::new(Arc::new(Mutex::new(conn)), ":memory:")
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// A handle to the shared connection, for handlers layered on top.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache(&self) -> MutexGuard<'_, BTreeMap<String, Vec<String>>> {
        self.description.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Database information
    // =========================================================================

    /// Lists the user tables currently in the database.
    pub fn fetch_table_list(&self) -> Result<Vec<String>> {
        Ok(read_table_list(&self.lock())?)
    }

    /// Column names of `table` in declared order.
    pub fn fetch_table_description(&self, table: &str) -> Result<Vec<String>> {
        let conn = self.lock();
        if !table_exists(&conn, table)? {
            return Err(self.missing_table(table));
        }
        Ok(read_columns(&conn, table)?)
    }

    /// Re-reads the table → columns snapshot. Run after any DDL change.
    pub fn update_db_description(&self) -> Result<()> {
        let conn = self.lock();
        self.refresh_description(&conn)
    }

    /// Tables in the cached snapshot.
    pub fn tables(&self) -> Vec<String> {
        self.cache().keys().cloned().collect()
    }

    /// Cached columns of `table`, if the snapshot knows it.
    pub fn cached_columns(&self, table: &str) -> Option<Vec<String>> {
        self.cache().get(table).cloned()
    }

    pub(crate) fn refresh_description(&self, conn: &Connection) -> Result<()> {
        let mut snapshot = BTreeMap::new();
        for table in read_table_list(conn)? {
            let columns = read_columns(conn, &table)?;
            snapshot.insert(table, columns);
        }
        *self.cache() = snapshot;
        Ok(())
    }

    /// Columns of `table`, refreshing the snapshot once on a miss.
    pub(crate) fn known_columns(&self, conn: &Connection, table: &str) -> Result<Vec<String>> {
        if let Some(columns) = self.cached_columns(table) {
            return Ok(columns);
        }
        self.refresh_description(conn)?;
        self.cached_columns(table)
            .ok_or_else(|| self.missing_table(table))
    }

    pub(crate) fn check_columns(
        &self,
        table: &str,
        known: &[String],
        requested: &[&str],
    ) -> Result<()> {
        let invalid: Vec<&str> = requested
            .iter()
            .filter(|c| !known.iter().any(|k| k == *c))
            .copied()
            .collect();
        if invalid.is_empty() {
            return Ok(());
        }
        warn!(
            "Table {} has no column(s) {:?}, valid columns: {:?}",
            table, invalid, known
        );
        Err(CatalogError::invalid_column(
            table,
            invalid,
            known.iter().cloned(),
        ))
    }

    pub(crate) fn missing_table(&self, table: &str) -> CatalogError {
        warn!("The table {} doesn't exist in {}", table, self.db_name);
        CatalogError::missing_table(table, &self.db_name)
    }

    // =========================================================================
    // Table management
    // =========================================================================

    /// Creates `table` with the given columns. An existing table is left as is.
    pub fn create_table<S: AsRef<str>>(&self, table: &str, columns: &[Column<'_, S>]) -> Result<()> {
        check_identifier(table)?;
        for column in columns {
            check_identifier(column.name.as_ref())?;
        }
        let conn = self.lock();
        let sql = create_table_sql(table, columns, &[]);
        debug!("{}", sql);
        conn.execute(&sql, [])?;
        self.refresh_description(&conn)?;
        info!("Table {} ready in {}", table, self.db_name);
        Ok(())
    }

    /// Rebuilds `table` with a new column set.
    ///
    /// Values survive only in columns present in both the old and the new
    /// schema. Foreign-key enforcement is suspended while the table is
    /// swapped so rows in other tables that reference it are left alone.
    pub fn alter_table<S: AsRef<str>>(&self, table: &str, columns: &[Column<'_, S>]) -> Result<()> {
        for column in columns {
            check_identifier(column.name.as_ref())?;
        }
        let mut conn = self.lock();
        self.refresh_description(&conn)?;
        let old_columns = self
            .cached_columns(table)
            .ok_or_else(|| self.missing_table(table))?;

        let shared: Vec<&str> = columns
            .iter()
            .map(|c| c.name.as_ref())
            .filter(|name| old_columns.iter().any(|old| old == name))
            .collect();
        let temp_table = (0..)
            .map(|n| match n {
                0 => format!("{}_temp", table),
                n => format!("{}_temp{}", table, n),
            })
            .find(|name| self.cached_columns(name).is_none())
            .unwrap_or_else(|| format!("{}_temp", table));
        info!(
            "Altering table {}, keeping columns {:?}",
            table, shared
        );

        let foreign_keys_enabled: bool =
            conn.query_row("PRAGMA foreign_keys;", [], |row| row.get(0))?;
        if foreign_keys_enabled {
            conn.execute("PRAGMA foreign_keys = OFF;", [])?;
        }

        let rebuild = (|| -> Result<()> {
            let tx = conn.transaction()?;
            tx.execute(&create_table_sql(&temp_table, columns, &[]), [])?;
            copy_rows(&tx, table, &temp_table, &shared)?;
            tx.execute(&format!("DROP TABLE {}", table), [])?;
            tx.execute(
                &format!("ALTER TABLE {} RENAME TO {}", temp_table, table),
                [],
            )?;
            tx.commit()?;
            Ok(())
        })();

        if foreign_keys_enabled {
            conn.execute("PRAGMA foreign_keys = ON;", [])?;
        }
        rebuild?;
        self.refresh_description(&conn)
    }

    /// Copies `columns` from every row of `source` into `target`.
    pub fn copy_data_into_table(
        &self,
        source: &str,
        target: &str,
        columns: &[&str],
    ) -> Result<usize> {
        let conn = self.lock();
        let source_columns = self.known_columns(&conn, source)?;
        let target_columns = self.known_columns(&conn, target)?;

        let invalid: Vec<&str> = columns
            .iter()
            .filter(|c| {
                !source_columns.iter().any(|s| s == *c) || !target_columns.iter().any(|t| t == *c)
            })
            .copied()
            .collect();
        if !invalid.is_empty() {
            let common: Vec<String> = source_columns
                .iter()
                .filter(|c| target_columns.contains(c))
                .cloned()
                .collect();
            let tables = format!("{}, {}", source, target);
            warn!(
                "Cannot copy {:?} between {}, common columns: {:?}",
                invalid, tables, common
            );
            return Err(CatalogError::invalid_column(tables, invalid, common));
        }

        Ok(copy_rows(&conn, source, target, columns)?)
    }

    pub fn drop_table(&self, table: &str) -> Result<()> {
        check_identifier(table)?;
        let conn = self.lock();
        conn.execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
        self.refresh_description(&conn)?;
        info!("Table {} dropped from {}", table, self.db_name);
        Ok(())
    }

    // =========================================================================
    // Data management
    // =========================================================================

    /// Inserts one row per record, ignoring keys that are not columns of
    /// `table`. Returns the row id of the last inserted row.
    pub fn insert_into_table(&self, table: &str, rows: &[Record]) -> Result<Option<i64>> {
        self.insert_rows(table, rows, InsertMode::Insert)
    }

    /// Like [`TableHandler::insert_into_table`], replacing rows on conflict.
    pub fn upsert_into_table(&self, table: &str, rows: &[Record]) -> Result<Option<i64>> {
        self.insert_rows(table, rows, InsertMode::Replace)
    }

    fn insert_rows(&self, table: &str, rows: &[Record], mode: InsertMode) -> Result<Option<i64>> {
        let mut conn = self.lock();
        let known = self.known_columns(&conn, table)?;
        let tx = conn.transaction()?;
        let last_row_id = insert_filtered(&tx, table, &known, rows, mode)?;
        tx.commit()?;
        Ok(last_row_id)
    }

    /// Deletes the rows where `column` equals `value`.
    pub fn delete_from_table(
        &self,
        table: &str,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<usize> {
        let conn = self.lock();
        let known = self.known_columns(&conn, table)?;
        self.check_columns(table, &known, &[column])?;
        let sql = format!("DELETE FROM {} WHERE {} = ?1", table, column);
        debug!("{}", sql);
        Ok(conn.execute(&sql, params![value.into()])?)
    }

    /// Sets the `assignments` on every row matching `conditions`.
    ///
    /// An empty condition list updates the whole table.
    pub fn update_table(
        &self,
        table: &str,
        assignments: &Record,
        conditions: &[Condition],
        operator: ConditionOperator,
    ) -> Result<usize> {
        if assignments.is_empty() {
            return Ok(0);
        }
        let conn = self.lock();
        let known = self.known_columns(&conn, table)?;
        let mut referenced: Vec<&str> = assignments.columns().collect();
        referenced.extend(conditions.iter().map(|c| c.column.as_str()));
        self.check_columns(table, &known, &referenced)?;

        let set_clause = assignments
            .columns()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");
        let (where_sql, where_values) = where_clause(conditions, operator);
        let sql = format!("UPDATE {} SET {}{}", table, set_clause, where_sql);
        debug!("{}", sql);

        let values = assignments.values().chain(where_values.iter());
        Ok(conn.execute(&sql, params_from_iter(values))?)
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Rows matching `query` as ordered tuples.
    pub fn fetch_table(&self, query: &SelectQuery) -> Result<Vec<Vec<Value>>> {
        Ok(self.select(query)?.rows)
    }

    /// Rows matching `query` keyed by column name.
    pub fn fetch_table_records(&self, query: &SelectQuery) -> Result<Vec<Record>> {
        let ResultSet { columns, rows } = self.select(query)?;
        Ok(rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect())
    }

    /// Every row of `table` with its header.
    pub fn output_table(&self, table: &str) -> Result<ResultSet> {
        self.select(&SelectQuery::new(table))
    }

    /// Get-or-create: the `key_column` of the row whose `value_column` equals
    /// `value`, inserting such a row first if none exists.
    ///
    /// Lookup and insert share one `IMMEDIATE` transaction, so two writers
    /// on the same file cannot both insert the value.
    pub fn get_foreign_key_value(
        &self,
        table: &str,
        key_column: &str,
        value_column: &str,
        value: impl Into<Value>,
    ) -> Result<i64> {
        let mut conn = self.lock();
        let known = self.known_columns(&conn, table)?;
        self.check_columns(table, &known, &[key_column, value_column])?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let key = find_or_insert(&tx, table, key_column, value_column, &value.into())?;
        tx.commit()?;
        Ok(key)
    }
}

impl TableSource for TableHandler {
    fn select(&self, query: &SelectQuery) -> Result<ResultSet> {
        let conn = self.lock();
        let known = self.known_columns(&conn, &query.table)?;
        let columns = if query.columns.is_empty() {
            known.clone()
        } else {
            query.columns.clone()
        };
        let mut referenced: Vec<&str> = columns.iter().map(String::as_str).collect();
        referenced.extend(query.conditions.iter().map(|c| c.column.as_str()));
        self.check_columns(&query.table, &known, &referenced)?;

        let (where_sql, where_values) = where_clause(&query.conditions, query.operator);
        let sql = format!(
            "SELECT {} FROM {}{}",
            columns.join(", "),
            query.table,
            where_sql
        );
        debug!("{}", sql);

        let width = columns.len();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(where_values.iter()), |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ResultSet { columns, rows })
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum InsertMode {
    Insert,
    Replace,
}

impl InsertMode {
    fn verb(&self) -> &'static str {
        match self {
            InsertMode::Insert => "INSERT",
            InsertMode::Replace => "INSERT OR REPLACE",
        }
    }
}

/// Table names must be plain identifiers since they are spliced into DDL.
pub(crate) fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CatalogError::InvalidIdentifier(name.to_string()))
    }
}

fn read_table_list(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
    )?;
    let tables = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(tables)
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

/// Only called with names read back from `sqlite_master`.
fn read_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", table))?;
    let columns = stmt
        .query_map([], |row| row.get(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(columns)
}

fn copy_rows(
    conn: &Connection,
    source: &str,
    target: &str,
    columns: &[&str],
) -> rusqlite::Result<usize> {
    if columns.is_empty() {
        return Ok(0);
    }
    let column_list = columns.join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        target, column_list, column_list, source
    );
    debug!("{}", sql);
    conn.execute(&sql, [])
}

pub(crate) fn insert_filtered(
    conn: &Connection,
    table: &str,
    known: &[String],
    rows: &[Record],
    mode: InsertMode,
) -> rusqlite::Result<Option<i64>> {
    let mut last_row_id = None;
    for row in rows {
        let (kept, dropped) = row.retain_known(known);
        if !dropped.is_empty() {
            debug!("Ignoring unknown columns {:?} for table {}", dropped, table);
        }
        if kept.is_empty() {
            continue;
        }
        let sql = format!(
            "{} INTO {} ({}) VALUES ({})",
            mode.verb(),
            table,
            kept.columns().collect::<Vec<_>>().join(", "),
            vec!["?"; kept.len()].join(", ")
        );
        debug!("{}", sql);
        conn.execute(&sql, params_from_iter(kept.values()))?;
        last_row_id = Some(conn.last_insert_rowid());
    }
    Ok(last_row_id)
}

pub(crate) fn find_or_insert(
    conn: &Connection,
    table: &str,
    key_column: &str,
    value_column: &str,
    value: &Value,
) -> rusqlite::Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            &format!(
                "SELECT {} FROM {} WHERE {} IS ?1 ORDER BY rowid LIMIT 1",
                key_column, table, value_column
            ),
            params![value],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(key) = existing {
        return Ok(key);
    }

    conn.execute(
        &format!("INSERT INTO {} ({}) VALUES (?1)", table, value_column),
        params![value],
    )?;
    let row_id = conn.last_insert_rowid();
    debug!("Inserted {:?} into {}.{}", value, table, value_column);
    conn.query_row(
        &format!("SELECT {} FROM {} WHERE rowid = ?1", key_column, table),
        params![row_id],
        |row| row.get(0),
    )
}
