use anyhow::{bail, Result};
use rusqlite::{params, Connection};

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // Only mutated when optional field assignments are passed.
            #[allow(unused_mut)]
            let mut column = $crate::sqlite_persistence::Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }

    /// Parses a declared column type as reported by `PRAGMA table_info`.
    pub fn parse(declared: &str) -> Option<SqlType> {
        match declared.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Some(SqlType::Text),
            "INTEGER" => Some(SqlType::Integer),
            "REAL" => Some(SqlType::Real),
            "BLOB" => Some(SqlType::Blob),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyOnChange {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ForeignKeyOnChange {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyOnChange::NoAction => "NO ACTION",
            ForeignKeyOnChange::Restrict => "RESTRICT",
            ForeignKeyOnChange::SetNull => "SET NULL",
            ForeignKeyOnChange::SetDefault => "SET DEFAULT",
            ForeignKeyOnChange::Cascade => "CASCADE",
        }
    }
}

#[derive(Debug)]
pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: ForeignKeyOnChange,
    pub on_update: ForeignKeyOnChange,
}

#[derive(Debug)]
pub struct Column<'a, S: AsRef<str>> {
    pub name: S,
    pub sql_type: &'a SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<S>,
    pub foreign_key: Option<&'a ForeignKey>,
}

impl<S: AsRef<str>> Column<'_, S> {
    /// Renders the column as it appears inside a `CREATE TABLE` statement.
    pub fn definition(&self) -> String {
        let mut sql = format!("{} {}", self.name.as_ref(), self.sql_type.as_sql());
        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.non_null {
            sql.push_str(" NOT NULL");
        }
        if self.is_unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default_value) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default_value.as_ref()));
        }
        if let Some(foreign_key) = self.foreign_key {
            sql.push_str(&format!(
                " REFERENCES {}({}) ON DELETE {} ON UPDATE {}",
                foreign_key.foreign_table,
                foreign_key.foreign_column,
                foreign_key.on_delete.as_sql(),
                foreign_key.on_update.as_sql(),
            ));
        }
        sql
    }
}

/// Builds an idempotent `CREATE TABLE IF NOT EXISTS` statement.
pub fn create_table_sql<S: AsRef<str>>(
    table_name: &str,
    columns: &[Column<'_, S>],
    unique_constraints: &[&[&str]],
) -> String {
    let mut parts: Vec<String> = columns.iter().map(Column::definition).collect();
    for unique_constraint in unique_constraints {
        parts.push(format!("UNIQUE ({})", unique_constraint.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        table_name,
        parts.join(", ")
    )
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column<'static, &'static str>],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    /// Creates the table and its indices. Existing tables are left untouched.
    pub fn create(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            &create_table_sql(self.name, self.columns, self.unique_constraints),
            params![],
        )?;
        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}({});",
                    index_name, self.name, column_name
                ),
                params![],
            )?;
        }
        Ok(())
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
}

struct LiveColumn {
    name: String,
    sql_type: Option<SqlType>,
    non_null: bool,
    is_primary_key: bool,
}

struct LiveForeignKey {
    from_column: String,
    to_table: String,
    to_column: String,
    on_update: String,
    on_delete: String,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        self.stamp(conn)?;
        Ok(())
    }

    /// Writes this schema's version into `PRAGMA user_version`.
    pub fn stamp(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", table.name))?;
            let live_columns = stmt
                .query_map(params![], |row| {
                    let declared: String = row.get(2)?;
                    Ok(LiveColumn {
                        name: row.get(1)?,
                        sql_type: SqlType::parse(&declared),
                        non_null: row.get::<_, i32>(3)? == 1,
                        is_primary_key: row.get::<_, i32>(5)? > 0,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            if live_columns.is_empty() {
                bail!("Table {} does not exist", table.name);
            }

            if live_columns.len() != table.columns.len() {
                bail!(
                    "Table {} has {} columns, expected {}. Found column names: {}, expected: {}",
                    table.name,
                    live_columns.len(),
                    table.columns.len(),
                    live_columns
                        .iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    table.column_names().join(", ")
                );
            }

            for (live, expected) in live_columns.iter().zip(table.columns.iter()) {
                if live.name != expected.name {
                    bail!(
                        "Table {} Column name mismatch: expected {}, got {}",
                        table.name,
                        expected.name,
                        live.name
                    );
                }
                if live.sql_type.as_ref() != Some(expected.sql_type) {
                    bail!(
                        "Table {} Column {} type mismatch: expected {:?}, got {:?}",
                        table.name,
                        expected.name,
                        expected.sql_type,
                        live.sql_type
                    );
                }
                if live.non_null != expected.non_null {
                    bail!(
                        "Table {} Column {} non-null mismatch: expected {}, got {}",
                        table.name,
                        expected.name,
                        expected.non_null,
                        live.non_null
                    );
                }
                if live.is_primary_key != expected.is_primary_key {
                    bail!(
                        "Table {} Column {} primary key mismatch: expected {}, got {}",
                        table.name,
                        expected.name,
                        expected.is_primary_key,
                        live.is_primary_key
                    );
                }
            }

            for (index_name, _column) in table.indices {
                let index_exists = conn
                    .query_row(
                        "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                        params![index_name, table.name],
                        |_| Ok(true),
                    )
                    .unwrap_or(false);
                if !index_exists {
                    bail!("Table {} is missing index '{}'", table.name, index_name);
                }
            }

            // PRAGMA foreign_key_list: id, seq, table, from, to, on_update, on_delete, match
            let mut fk_stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", table.name))?;
            let live_fks = fk_stmt
                .query_map([], |row| {
                    Ok(LiveForeignKey {
                        to_table: row.get(2)?,
                        from_column: row.get(3)?,
                        to_column: row.get(4)?,
                        on_update: row.get(5)?,
                        on_delete: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            for column in table.columns {
                let Some(expected) = column.foreign_key else {
                    continue;
                };
                let Some(live) = live_fks.iter().find(|fk| fk.from_column == column.name) else {
                    bail!(
                        "Table {} column {} is missing foreign key: expected REFERENCES {}({})",
                        table.name,
                        column.name,
                        expected.foreign_table,
                        expected.foreign_column
                    );
                };
                if live.to_table != expected.foreign_table
                    || live.to_column != expected.foreign_column
                    || live.on_delete != expected.on_delete.as_sql()
                    || live.on_update != expected.on_update.as_sql()
                {
                    bail!(
                        "Table {} column {} has foreign key mismatch: expected REFERENCES {}({}) ON DELETE {} ON UPDATE {}, got REFERENCES {}({}) ON DELETE {} ON UPDATE {}",
                        table.name,
                        column.name,
                        expected.foreign_table,
                        expected.foreign_column,
                        expected.on_delete.as_sql(),
                        expected.on_update.as_sql(),
                        live.to_table,
                        live.to_column,
                        live.on_delete,
                        live.on_update
                    );
                }
            }
        }
        Ok(())
    }
}

pub const BASE_DB_VERSION: usize = 99999;

#[cfg(test)]
mod tests {
    use super::*;

    const PARENT_FK: ForeignKey = ForeignKey {
        foreign_table: "parent",
        foreign_column: "id",
        on_delete: ForeignKeyOnChange::SetNull,
        on_update: ForeignKeyOnChange::Cascade,
    };

    const PARENT_TABLE: Table = Table {
        name: "parent",
        columns: &[sqlite_column!("id", &SqlType::Integer, is_primary_key = true)],
        indices: &[],
        unique_constraints: &[],
    };

    const CHILD_TABLE: Table = Table {
        name: "child",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("label", &SqlType::Text, non_null = true),
            sqlite_column!("parent_id", &SqlType::Integer, foreign_key = Some(&PARENT_FK)),
        ],
        indices: &[("idx_child_parent", "parent_id")],
        unique_constraints: &[],
    };

    const SCHEMA: VersionedSchema = VersionedSchema {
        version: 0,
        tables: &[PARENT_TABLE, CHILD_TABLE],
    };

    #[test]
    fn column_definition_renders_constraints() {
        let column = sqlite_column!(
            "parent_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PARENT_FK)
        );
        assert_eq!(
            column.definition(),
            "parent_id INTEGER NOT NULL REFERENCES parent(id) ON DELETE SET NULL ON UPDATE CASCADE"
        );
    }

    #[test]
    fn create_is_idempotent_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        SCHEMA.create(&conn).unwrap();
        SCHEMA.create(&conn).unwrap();
        SCHEMA.validate(&conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version as usize, BASE_DB_VERSION);
    }

    #[test]
    fn validate_detects_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        PARENT_TABLE.create(&conn).unwrap();

        let err = SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("child"));
        assert!(err.contains("does not exist"));
    }

    #[test]
    fn validate_detects_missing_index() {
        let conn = Connection::open_in_memory().unwrap();
        PARENT_TABLE.create(&conn).unwrap();
        conn.execute(
            "CREATE TABLE child (
                id INTEGER PRIMARY KEY,
                label TEXT NOT NULL,
                parent_id INTEGER REFERENCES parent(id) ON DELETE SET NULL ON UPDATE CASCADE
            )",
            [],
        )
        .unwrap();

        let err = SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing index"));
        assert!(err.contains("idx_child_parent"));
    }

    #[test]
    fn validate_detects_wrong_on_update_action() {
        let conn = Connection::open_in_memory().unwrap();
        PARENT_TABLE.create(&conn).unwrap();
        conn.execute(
            "CREATE TABLE child (
                id INTEGER PRIMARY KEY,
                label TEXT NOT NULL,
                parent_id INTEGER REFERENCES parent(id) ON DELETE SET NULL
            )",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_child_parent ON child(parent_id)", [])
            .unwrap();

        let err = SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("foreign key mismatch"));
        assert!(err.contains("NO ACTION"));
    }

    #[test]
    fn validate_detects_non_null_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        PARENT_TABLE.create(&conn).unwrap();
        conn.execute(
            "CREATE TABLE child (
                id INTEGER PRIMARY KEY,
                label TEXT,
                parent_id INTEGER REFERENCES parent(id) ON DELETE SET NULL ON UPDATE CASCADE
            )",
            [],
        )
        .unwrap();

        let err = SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("non-null mismatch"));
    }
}
