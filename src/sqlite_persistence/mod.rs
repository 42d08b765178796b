mod versioned_schema;

pub use versioned_schema::{
    create_table_sql, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
    BASE_DB_VERSION,
};
