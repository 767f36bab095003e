//! Catalog schema used for name resolution during rewriting.
//!
//! The catalog is owned by the caller and shared read-only across all
//! rules within a request. Lookups are case-insensitive.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// One table known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTable {
    /// Owning schema. Blank-schema entries are never used for resolution.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Declared columns.
    #[serde(default)]
    pub columns: Vec<String>,
}

impl CatalogTable {
    /// Whether this table declares the given column (case-insensitive).
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }
}

/// Read-only catalog of tables and columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSchema {
    #[serde(default)]
    pub tables: Vec<CatalogTable>,
}

impl CatalogSchema {
    /// Load a catalog from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a catalog from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// All tables with the given name, across schemas. Entries with a blank
    /// schema are skipped: they cannot serve as a qualification target.
    pub fn tables_named(&self, name: &str) -> Vec<&CatalogTable> {
        self.tables
            .iter()
            .filter(|t| !t.schema.trim().is_empty() && t.name.eq_ignore_ascii_case(name))
            .collect()
    }

    /// Look up a table by schema and name.
    pub fn table(&self, schema: &str, name: &str) -> Option<&CatalogTable> {
        self.tables.iter().find(|t| {
            t.schema.eq_ignore_ascii_case(schema) && t.name.eq_ignore_ascii_case(name)
        })
    }

    /// Resolve a possibly-unqualified table reference to a catalog entry.
    /// Unqualified names resolve only when exactly one schema declares them.
    pub fn resolve(&self, schema: Option<&str>, name: &str) -> Option<&CatalogTable> {
        match schema {
            Some(schema) => self.table(schema, name),
            None => {
                let candidates = self.tables_named(name);
                if candidates.len() == 1 {
                    Some(candidates[0])
                } else {
                    None
                }
            }
        }
    }
}
