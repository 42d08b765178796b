use crate::catalog::{CollectionHandler, Facet, TrackDbHandler};
use tracing::warn;

pub const ROOT_LABEL: &str = "Sammlungen";

#[derive(Debug, Clone, PartialEq)]
pub struct FacetNode {
    pub facet: Facet,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionNode {
    pub name: String,
    pub facets: Vec<FacetNode>,
}

/// Hierarchical data source: root → collections → facets → values.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionTree {
    collections: Vec<CollectionNode>,
}

impl CollectionTree {
    /// Builds the tree from every collection in `db`. Collections that fail
    /// to load are left out.
    pub fn build(db: &TrackDbHandler) -> Self {
        let names = match db.collection_names() {
            Ok(names) => names,
            Err(err) => {
                warn!("Could not list collections: {}", err);
                Vec::new()
            }
        };

        let mut collections = Vec::with_capacity(names.len());
        for name in names {
            match CollectionHandler::new(name.as_str(), db) {
                Ok(handler) => collections.push(Self::node(&handler)),
                Err(err) => warn!("Skipping collection {}: {}", name, err),
            }
        }
        CollectionTree { collections }
    }

    pub fn node(handler: &CollectionHandler) -> CollectionNode {
        CollectionNode {
            name: handler.name().to_string(),
            facets: handler
                .groups()
                .iter()
                .map(|(facet, members)| FacetNode {
                    facet: *facet,
                    members: members.clone(),
                })
                .collect(),
        }
    }

    pub fn root_label(&self) -> &'static str {
        ROOT_LABEL
    }

    pub fn collections(&self) -> &[CollectionNode] {
        &self.collections
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionNode> {
        self.collections.iter().find(|c| c.name == name)
    }
}
