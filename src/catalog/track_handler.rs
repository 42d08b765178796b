use super::models::{Dimension, EntryFilter, NewTrack, TrackEntry};
use super::schema::{latest_schema, CATALOG_TABLES};
use crate::error::{CatalogError, Result};
use crate::sqlite_persistence::BASE_DB_VERSION;
use crate::table_handler::{
    find_or_insert, insert_filtered, Condition, ConditionOperator, InsertMode, Record,
    SelectQuery, TableHandler,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const ID_CHUNK_SIZE: usize = 500;

const ENTRY_SELECT: &str = "SELECT
        tracks.track_id,
        tracks.track_name,
        tracks.year,
        interpreters.interpreter_name,
        composers.composer_name,
        genres.genre_name,
        tracks.media_location,
        tracks.sheet_location,
        tracks.thumbnail_location
    FROM tracks
        LEFT JOIN interpreters USING (interpreter_id)
        LEFT JOIN composers USING (composer_id)
        LEFT JOIN genres USING (genre_id)";

const JOINED_TABLES: [&str; 4] = ["tracks", "interpreters", "composers", "genres"];

/// Track-specific operations on top of [`TableHandler`].
#[derive(Clone)]
pub struct TrackDbHandler {
    tables: TableHandler,
}

impl TrackDbHandler {
    /// Wraps a shared connection, creating the catalog tables if `initialize`.
    pub fn new(conn: Arc<Mutex<Connection>>, db_name: impl Into<String>, initialize: bool) -> Result<Self> {
        let handler = TrackDbHandler {
            tables: TableHandler::new(conn, db_name)?,
        };
        if initialize {
            handler.initialize_schema()?;
        }
        Ok(handler)
    }

    pub fn open<P: AsRef<Path>>(path: P, initialize: bool) -> Result<Self> {
        let handler = TrackDbHandler {
            tables: TableHandler::open(path)?,
        };
        if initialize {
            handler.initialize_schema()?;
        }
        Ok(handler)
    }

    pub fn open_in_memory() -> Result<Self> {
        let handler = TrackDbHandler {
            tables: TableHandler::open_in_memory()?,
        };
        handler.initialize_schema()?;
        Ok(handler)
    }

    pub fn table_handler(&self) -> &TableHandler {
        &self.tables
    }

    /// Creates any missing catalog table. A database without a version yet
    /// is stamped with the current schema version.
    pub fn initialize_schema(&self) -> Result<()> {
        let conn = self.tables.lock();
        let user_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        for table in CATALOG_TABLES {
            table.create(&conn)?;
        }
        if user_version == 0 {
            let version = BASE_DB_VERSION + latest_schema().version;
            conn.pragma_update(None, "user_version", version as i64)?;
            info!(
                "Created catalog schema in {} (version {})",
                self.tables.db_name(),
                version
            );
        }
        self.tables.refresh_description(&conn)
    }

    /// Compares the live database against the declared catalog schema.
    pub fn validate_schema(&self) -> anyhow::Result<()> {
        let conn = self.tables.lock();
        latest_schema().validate(&conn)
    }

    /// Tracks with their dimension names, optionally narrowed by one
    /// equality filter on a column of any of the joined tables.
    pub fn get_entries(&self, filter: Option<&EntryFilter>) -> Result<Vec<TrackEntry>> {
        let conn = self.tables.lock();
        let mut sql = ENTRY_SELECT.to_string();
        let mut values = Vec::new();
        if let Some(filter) = filter {
            if !JOINED_TABLES.contains(&filter.table.as_str()) {
                return Err(self.tables.missing_table(&filter.table));
            }
            let known = self.tables.known_columns(&conn, &filter.table)?;
            self.tables
                .check_columns(&filter.table, &known, &[filter.column.as_str()])?;
            sql.push_str(&format!(" WHERE {}.{} = ?", filter.table, filter.column));
            values.push(filter.value.clone());
        } else {
            self.tables.known_columns(&conn, "tracks")?;
        }
        sql.push_str(" ORDER BY tracks.track_id");
        query_entries(&conn, &sql, &values)
    }

    /// The joined rows of exactly the given tracks.
    pub fn get_entries_by_ids(&self, ids: &[i64]) -> Result<Vec<TrackEntry>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.tables.lock();
        self.tables.known_columns(&conn, "tracks")?;

        // Sorted ids in sorted chunks keep the overall track_id order.
        let mut entries = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let sql = format!(
                "{} WHERE tracks.track_id IN ({}) ORDER BY tracks.track_id",
                ENTRY_SELECT,
                vec!["?"; chunk.len()].join(", ")
            );
            let values: Vec<Value> = chunk.iter().map(|id| Value::Integer(*id)).collect();
            entries.extend(query_entries(&conn, &sql, &values)?);
        }
        Ok(entries)
    }

    /// The joined rows of every member of a collection.
    pub fn get_collection_entries(&self, collection_id: i64) -> Result<Vec<TrackEntry>> {
        let conn = self.tables.lock();
        self.tables.known_columns(&conn, "tracks")?;
        self.tables.known_columns(&conn, "collections_tracks")?;
        let sql = format!(
            "{} WHERE tracks.track_id IN
                (SELECT track_id FROM collections_tracks WHERE collection_id = ?)
             ORDER BY tracks.track_id",
            ENTRY_SELECT
        );
        query_entries(&conn, &sql, &[Value::Integer(collection_id)])
    }

    /// Inserts new tracks, resolving dimension names to ids and creating
    /// dimension rows as needed.
    ///
    /// A row identical to an existing track in all eight value columns is
    /// skipped, including rows repeated within `rows`. Returns how many
    /// tracks were inserted.
    pub fn input_entries(&self, rows: &[NewTrack]) -> Result<usize> {
        let mut conn = self.tables.lock();
        let known = self.tables.known_columns(&conn, "tracks")?;
        for dimension in Dimension::ALL {
            self.tables.known_columns(&conn, dimension.table())?;
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0;
        for row in rows {
            let record = resolve_track(&tx, row)?;
            if track_exists(&tx, &record)? {
                debug!("Skipping duplicate track {:?}", row.track_name);
                continue;
            }
            insert_filtered(&tx, "tracks", &known, &[record], InsertMode::Replace)?;
            inserted += 1;
        }
        tx.commit()?;
        info!("Inserted {} of {} track(s)", inserted, rows.len());
        Ok(inserted)
    }

    /// Sets one column on the rows matching `conditions`.
    ///
    /// For the dimension key columns of `tracks` the value is a name, which
    /// is resolved (or created) in `key_table` first.
    pub fn change_value(
        &self,
        table: &str,
        column: &str,
        value: impl Into<Value>,
        key_table: Option<&str>,
        conditions: &[Condition],
    ) -> Result<usize> {
        let mut value = value.into();
        if let Some(dimension) = Dimension::from_key_column(column) {
            let key_table = key_table.ok_or_else(|| CatalogError::UnresolvedForeignKey {
                column: column.to_string(),
            })?;
            if value != Value::Null {
                let id = self.tables.get_foreign_key_value(
                    key_table,
                    dimension.id_column(),
                    dimension.name_column(),
                    value,
                )?;
                value = Value::Integer(id);
            }
        }
        self.tables.update_table(
            table,
            &Record::new().with(column, value),
            conditions,
            ConditionOperator::And,
        )
    }

    /// Keeps only the newest of tracks identical in all eight value columns.
    pub fn remove_duplicates(&self) -> Result<usize> {
        let conn = self.tables.lock();
        self.tables.known_columns(&conn, "tracks")?;
        let removed = conn.execute(
            "DELETE FROM tracks WHERE track_id NOT IN (
                SELECT MAX(track_id) FROM tracks
                GROUP BY track_name, year, interpreter_id, composer_id, genre_id,
                         media_location, sheet_location, thumbnail_location
            )",
            [],
        )?;
        info!("Removed {} duplicate track(s)", removed);
        Ok(removed)
    }

    /// Drops every table in the database.
    pub fn wipe_db(&self) -> Result<()> {
        let mut tables = self.tables.fetch_table_list()?;
        // Children before parents.
        tables.reverse();
        for table in tables {
            self.tables.drop_table(&table)?;
        }
        Ok(())
    }

    /// Returns the id of the collection called `name`, creating it if needed.
    pub fn ensure_collection(&self, name: &str) -> Result<i64> {
        self.tables.get_foreign_key_value(
            "collections",
            "collection_id",
            "collection_name",
            name.to_string(),
        )
    }

    /// Distinct collection names in creation order. A name stored twice
    /// resolves to its first row, so it is listed once.
    pub fn collection_names(&self) -> Result<Vec<String>> {
        let rows = self
            .tables
            .fetch_table(&SelectQuery::new("collections").columns(["collection_name"]))?;
        let mut seen = HashSet::new();
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_iter().next() {
                Some(Value::Text(name)) => Some(name),
                _ => None,
            })
            .filter(|name| seen.insert(name.clone()))
            .collect())
    }

    /// Id of the first dimension row called `name`, without creating one.
    pub fn find_dimension_id(&self, dimension: Dimension, name: &str) -> Result<Option<i64>> {
        let conn = self.tables.lock();
        self.tables.known_columns(&conn, dimension.table())?;
        let id = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE {} = ?1 ORDER BY rowid LIMIT 1",
                    dimension.id_column(),
                    dimension.table(),
                    dimension.name_column()
                ),
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

fn query_entries(conn: &Connection, sql: &str, values: &[Value]) -> Result<Vec<TrackEntry>> {
    debug!("{}", sql);
    let mut stmt = conn.prepare(sql)?;
    let entries = stmt
        .query_map(params_from_iter(values.iter()), TrackEntry::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

fn resolve_track(conn: &Connection, row: &NewTrack) -> rusqlite::Result<Record> {
    let mut record = Record::new()
        .with("track_name", row.track_name.clone())
        .with("year", row.year);
    for dimension in Dimension::ALL {
        let id = match row.dimension_name(dimension) {
            Some(name) => Value::Integer(find_or_insert(
                conn,
                dimension.table(),
                dimension.id_column(),
                dimension.name_column(),
                &Value::Text(name.to_string()),
            )?),
            None => Value::Null,
        };
        record.set(dimension.id_column(), id);
    }
    record.set("media_location", row.media_location.clone());
    record.set("sheet_location", row.sheet_location.clone());
    record.set("thumbnail_location", row.thumbnail_location.clone());
    Ok(record)
}

/// Null-safe comparison over every column of the record.
fn track_exists(conn: &Connection, record: &Record) -> rusqlite::Result<bool> {
    let predicate = record
        .columns()
        .map(|c| format!("{} IS ?", c))
        .collect::<Vec<_>>()
        .join(" AND ");
    let sql = format!("SELECT 1 FROM tracks WHERE {} LIMIT 1", predicate);
    conn.query_row(&sql, params_from_iter(record.values()), |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
}
