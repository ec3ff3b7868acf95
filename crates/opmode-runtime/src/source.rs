//! Data sources the router chooses between

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::SourceError;

/// Something that can answer a keyed query with a JSON document
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch the document for `key`
    async fn fetch(&self, key: &str) -> Result<Value, SourceError>;
}

/// Canned documents, used as the demo-data source
#[derive(Debug, Default)]
pub struct FixtureSource {
    fixtures: RwLock<HashMap<String, Value>>,
}

impl FixtureSource {
    /// Create empty source
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With fixture for `key`
    #[must_use]
    pub fn with_fixture(self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace fixture
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.fixtures.write().insert(key.into(), value);
    }

    /// Number of fixtures
    #[must_use]
    pub fn len(&self) -> usize {
        self.fixtures.read().len()
    }

    /// Check if no fixture is loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DataSource for FixtureSource {
    async fn fetch(&self, key: &str) -> Result<Value, SourceError> {
        self.fixtures
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::http(404, format!("no demo fixture for '{key}'")))
    }
}
