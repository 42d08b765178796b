//! Toolkit-independent models a front-end binds to.

mod collection_tree;
mod table_model;

pub use collection_tree::{CollectionNode, CollectionTree, FacetNode, ROOT_LABEL};
pub use table_model::{display_value, SortOrder, TableModel};
