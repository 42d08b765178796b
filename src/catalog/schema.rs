//! SQLite schema of the catalog database.
//!
//! Three dimension tables (composers, interpreters, genres) referenced from
//! `tracks`, plus named collections joined to tracks through
//! `collections_tracks`. Dimension names are not unique; lookups return the
//! first match.

use crate::sqlite_column;
use crate::sqlite_persistence::{ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema};

// =============================================================================
// Dimension tables
// =============================================================================

const COMPOSERS_TABLE: Table = Table {
    name: "composers",
    columns: &[
        sqlite_column!("composer_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("composer_name", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

const INTERPRETERS_TABLE: Table = Table {
    name: "interpreters",
    columns: &[
        sqlite_column!("interpreter_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("interpreter_name", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

const GENRES_TABLE: Table = Table {
    name: "genres",
    columns: &[
        sqlite_column!("genre_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("genre_name", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

const COLLECTIONS_TABLE: Table = Table {
    name: "collections",
    columns: &[
        sqlite_column!("collection_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("collection_name", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

// =============================================================================
// Tracks
// =============================================================================

const INTERPRETER_FK: ForeignKey = ForeignKey {
    foreign_table: "interpreters",
    foreign_column: "interpreter_id",
    on_delete: ForeignKeyOnChange::SetNull,
    on_update: ForeignKeyOnChange::Cascade,
};

const COMPOSER_FK: ForeignKey = ForeignKey {
    foreign_table: "composers",
    foreign_column: "composer_id",
    on_delete: ForeignKeyOnChange::SetNull,
    on_update: ForeignKeyOnChange::Cascade,
};

const GENRE_FK: ForeignKey = ForeignKey {
    foreign_table: "genres",
    foreign_column: "genre_id",
    on_delete: ForeignKeyOnChange::SetNull,
    on_update: ForeignKeyOnChange::Cascade,
};

const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("track_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("track_name", &SqlType::Text),
        sqlite_column!("year", &SqlType::Integer),
        sqlite_column!("interpreter_id", &SqlType::Integer, foreign_key = Some(&INTERPRETER_FK)),
        sqlite_column!("composer_id", &SqlType::Integer, foreign_key = Some(&COMPOSER_FK)),
        sqlite_column!("genre_id", &SqlType::Integer, foreign_key = Some(&GENRE_FK)),
        sqlite_column!("media_location", &SqlType::Text),
        sqlite_column!("sheet_location", &SqlType::Text),
        sqlite_column!("thumbnail_location", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

// =============================================================================
// Collection membership
// =============================================================================

const TRACK_FK: ForeignKey = ForeignKey {
    foreign_table: "tracks",
    foreign_column: "track_id",
    on_delete: ForeignKeyOnChange::Cascade,
    on_update: ForeignKeyOnChange::Cascade,
};

const COLLECTION_FK: ForeignKey = ForeignKey {
    foreign_table: "collections",
    foreign_column: "collection_id",
    on_delete: ForeignKeyOnChange::Cascade,
    on_update: ForeignKeyOnChange::Cascade,
};

/// No unique constraint: membership is checked before insert.
const COLLECTIONS_TRACKS_TABLE: Table = Table {
    name: "collections_tracks",
    columns: &[
        sqlite_column!("track_id", &SqlType::Integer, foreign_key = Some(&TRACK_FK)),
        sqlite_column!("collection_id", &SqlType::Integer, foreign_key = Some(&COLLECTION_FK)),
    ],
    indices: &[("idx_collections_tracks_collection", "collection_id")],
    unique_constraints: &[],
};

/// Tables in creation order; referenced tables come first.
pub const CATALOG_TABLES: &[Table] = &[
    COMPOSERS_TABLE,
    INTERPRETERS_TABLE,
    GENRES_TABLE,
    COLLECTIONS_TABLE,
    TRACKS_TABLE,
    COLLECTIONS_TRACKS_TABLE,
];

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: CATALOG_TABLES,
}];

/// The schema a fresh database is created with.
pub fn latest_schema() -> &'static VersionedSchema {
    &CATALOG_VERSIONED_SCHEMAS[CATALOG_VERSIONED_SCHEMAS.len() - 1]
}
