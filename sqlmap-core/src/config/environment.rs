use std::collections::HashMap;

/// One `<environment id="...">` entry (`spec.md` §6): a data-source
/// descriptor plus the transaction-manager choice, consumed by the backend
/// crate at connection-establishment time. The data source itself is left
/// as an opaque property bag — this crate doesn't know a backend's
/// connection-string shape, matching `spec.md` §1's "out of scope" note on
/// connection pooling internals.
#[derive(Debug, Clone)]
pub struct Environment {
    pub id: String,
    pub transaction_manager: String,
    pub data_source_type: String,
    pub properties: HashMap<String, String>,
}

impl Environment {
    pub fn new(id: impl Into<String>, transaction_manager: impl Into<String>, data_source_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transaction_manager: transaction_manager.into(),
            data_source_type: data_source_type.into(),
            properties: HashMap::new(),
        }
    }
}

/// Resolves an environment-specific `database_id` tag from a vendor
/// product-name string (`spec.md` §6's `<databaseIdProvider>`), used to
/// pick between `databaseId`-qualified statement variants.
pub struct DatabaseIdProvider {
    aliases: HashMap<String, String>,
}

impl DatabaseIdProvider {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self { aliases }
    }

    pub fn resolve(&self, product_name: &str) -> Option<&str> {
        self.aliases.get(product_name).map(|s| s.as_str())
    }
}
