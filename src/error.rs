//! Error types for catalog operations.
//!
//! Library code returns [`CatalogError`]; the binary wraps it in `anyhow`
//! where it needs extra context.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The operation referenced a table absent from the live schema.
    #[error("The table {table} doesn't exist in {db}")]
    MissingTable { table: String, db: String },

    /// The operation referenced columns absent from a table's schema.
    #[error(
        "The table(s) {table} do(es) not contain all of these columns: {}. The following columns exist: {}",
        .requested.join(", "),
        .valid.join(", ")
    )]
    InvalidColumn {
        table: String,
        requested: Vec<String>,
        valid: Vec<String>,
    },

    /// A table or column name that cannot be spliced into a statement.
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// A foreign-key column was changed without naming the lookup table.
    #[error("Column {column} is a foreign key, a lookup table is required to resolve its value")]
    UnresolvedForeignKey { column: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl CatalogError {
    pub fn missing_table(table: impl Into<String>, db: impl Into<String>) -> Self {
        CatalogError::MissingTable {
            table: table.into(),
            db: db.into(),
        }
    }

    pub fn invalid_column<R, V>(table: impl Into<String>, requested: R, valid: V) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        CatalogError::InvalidColumn {
            table: table.into(),
            requested: requested.into_iter().map(Into::into).collect(),
            valid: valid.into_iter().map(Into::into).collect(),
        }
    }

    /// True for the two schema-reference faults, as opposed to engine errors.
    pub fn is_schema_fault(&self) -> bool {
        matches!(
            self,
            CatalogError::MissingTable { .. } | CatalogError::InvalidColumn { .. }
        )
    }
}
