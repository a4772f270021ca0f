//! Schema declaration for collections and their secondary indexes.

/// Declaration of a single collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDef {
    name: String,
    indexes: Vec<String>,
}

impl CollectionDef {
    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared secondary index names.
    #[must_use]
    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    /// Returns true if the named index is declared.
    #[must_use]
    pub fn has_index(&self, index: &str) -> bool {
        self.indexes.iter().any(|i| i == index)
    }
}

/// The store's fixed schema: collection names plus their secondary
/// indexes.
///
/// Declared exactly once when the store is opened; reopening with the
/// same schema is idempotent. Schema changes would require a version
/// bump and an upgrade path, which this store does not implement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    collections: Vec<CollectionDef>,
}

impl Schema {
    /// Starts building a schema.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Looks up a collection declaration by name.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionDef> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Returns all declared collections.
    #[must_use]
    pub fn collections(&self) -> &[CollectionDef] {
        &self.collections
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    collections: Vec<CollectionDef>,
}

impl SchemaBuilder {
    /// Declares a collection with the given secondary indexes.
    #[must_use]
    pub fn collection(mut self, name: impl Into<String>, indexes: &[&str]) -> Self {
        self.collections.push(CollectionDef {
            name: name.into(),
            indexes: indexes.iter().map(|i| (*i).to_string()).collect(),
        });
        self
    }

    /// Finishes the schema.
    #[must_use]
    pub fn build(self) -> Schema {
        Schema {
            collections: self.collections,
        }
    }
}
