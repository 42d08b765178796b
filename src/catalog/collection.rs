use super::models::{Dimension, TrackEntry};
use super::track_handler::TrackDbHandler;
use crate::error::Result;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, TransactionBehavior};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// A navigation group of a collection: the distinct values of one dimension
/// among the collection's tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Facet {
    Interpreters,
    Composers,
    Genres,
}

impl Facet {
    pub const ALL: [Facet; 3] = [Facet::Interpreters, Facet::Composers, Facet::Genres];

    pub fn label(&self) -> &'static str {
        match self {
            Facet::Interpreters => "Interpreten",
            Facet::Composers => "Komponisten",
            Facet::Genres => "Genres",
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Facet::Interpreters => Dimension::Interpreter,
            Facet::Composers => Dimension::Composer,
            Facet::Genres => Dimension::Genre,
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named set of tracks, stored as rows of `collections_tracks`.
pub struct CollectionHandler {
    name: String,
    id: i64,
    db: TrackDbHandler,
    groups: BTreeMap<Facet, Vec<String>>,
}

impl CollectionHandler {
    /// Opens the collection called `name`, creating it if it does not exist.
    pub fn new(name: impl Into<String>, db: &TrackDbHandler) -> Result<Self> {
        let name = name.into();
        let id = db.ensure_collection(&name)?;
        let mut handler = CollectionHandler {
            name,
            id,
            db: db.clone(),
            groups: BTreeMap::new(),
        };
        handler.update_groups()?;
        Ok(handler)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Member track ids in the order they were added.
    pub fn track_ids(&self) -> Result<Vec<i64>> {
        let tables = self.db.table_handler();
        let conn = tables.lock();
        tables.known_columns(&conn, "collections_tracks")?;
        let mut stmt = conn.prepare(
            "SELECT track_id FROM collections_tracks WHERE collection_id = ?1 ORDER BY rowid",
        )?;
        let ids = stmt
            .query_map(params![self.id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// The joined track rows of every member.
    pub fn get_all_entries(&self) -> Result<Vec<TrackEntry>> {
        self.db.get_collection_entries(self.id)
    }

    /// Distinct values of `name_column` in `group_table` referenced by the
    /// member tracks, sorted alphabetically.
    ///
    /// `id_column` is the key shared by `tracks` and `group_table`; it
    /// defaults to the first column of `group_table`.
    pub fn get_groupmembers(
        &self,
        group_table: &str,
        name_column: &str,
        id_column: Option<&str>,
    ) -> Result<Vec<String>> {
        let tables = self.db.table_handler();
        let conn = tables.lock();

        let group_columns = tables.known_columns(&conn, group_table)?;
        let id_column = match id_column {
            Some(column) => column.to_string(),
            None => match group_columns.first() {
                Some(column) => column.clone(),
                None => return Ok(Vec::new()),
            },
        };
        tables.check_columns(group_table, &group_columns, &[id_column.as_str(), name_column])?;
        let track_columns = tables.known_columns(&conn, "tracks")?;
        tables.check_columns("tracks", &track_columns, &[id_column.as_str()])?;
        tables.known_columns(&conn, "collections_tracks")?;

        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT tracks.{id} FROM tracks
                JOIN collections_tracks USING (track_id)
                WHERE collections_tracks.collection_id = ?1 AND tracks.{id} IS NOT NULL",
            id = id_column
        ))?;
        let ids = stmt
            .query_map(params![self.id], |row| row.get::<_, Value>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT DISTINCT {} FROM {} WHERE {} IN ({})",
            name_column,
            group_table,
            id_column,
            vec!["?"; ids.len()].join(", ")
        );
        debug!("{}", sql);
        let mut stmt = conn.prepare(&sql)?;
        let mut members = stmt
            .query_map(params_from_iter(ids.iter()), |row| row.get::<_, Option<String>>(0))?
            .filter_map(|name| name.transpose())
            .collect::<rusqlite::Result<Vec<String>>>()?;
        members.sort();
        members.dedup();
        Ok(members)
    }

    /// Recomputes every facet from the current membership.
    pub fn update_groups(&mut self) -> Result<()> {
        let mut groups = BTreeMap::new();
        for facet in Facet::ALL {
            let dimension = facet.dimension();
            let members = self.get_groupmembers(
                dimension.table(),
                dimension.name_column(),
                Some(dimension.id_column()),
            )?;
            groups.insert(facet, members);
        }
        self.groups = groups;
        Ok(())
    }

    /// Facets as of the last add/delete.
    pub fn groups(&self) -> &BTreeMap<Facet, Vec<String>> {
        &self.groups
    }

    /// Adds a track. Returns false if it already was a member.
    pub fn add_entry(&mut self, track_id: i64) -> Result<bool> {
        let inserted = {
            let tables = self.db.table_handler();
            let mut conn = tables.lock();
            tables.known_columns(&conn, "collections_tracks")?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let present = tx
                .query_row(
                    "SELECT 1 FROM collections_tracks WHERE track_id = ?1 AND collection_id = ?2",
                    params![track_id, self.id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !present {
                tx.execute(
                    "INSERT INTO collections_tracks (track_id, collection_id) VALUES (?1, ?2)",
                    params![track_id, self.id],
                )?;
            }
            tx.commit()?;
            !present
        };
        if inserted {
            info!("Added track {} to collection {}", track_id, self.name);
        }
        self.update_groups()?;
        Ok(inserted)
    }

    /// Removes a track from this collection. Returns the rows removed.
    pub fn delete_entry(&mut self, track_id: i64) -> Result<usize> {
        let removed = {
            let tables = self.db.table_handler();
            let conn = tables.lock();
            tables.known_columns(&conn, "collections_tracks")?;
            conn.execute(
                "DELETE FROM collections_tracks WHERE track_id = ?1 AND collection_id = ?2",
                params![track_id, self.id],
            )?
        };
        if removed > 0 {
            info!("Removed track {} from collection {}", track_id, self.name);
        }
        self.update_groups()?;
        Ok(removed)
    }
}
