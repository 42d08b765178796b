mod handler;
mod query;

pub use handler::{open_connection, ResultSet, TableHandler, TableSource};
pub(crate) use handler::{find_or_insert, insert_filtered, InsertMode};
pub use query::{Comparison, Condition, ConditionOperator, Record, SelectQuery};
