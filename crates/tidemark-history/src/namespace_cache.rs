// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Read-through namespace record cache.
//!
//! Namespace records are read-mostly; the cache serves them from memory and
//! falls through to the metadata provider on miss. Records carry a monotone
//! `notification_version`, and the cache never replaces an entry with an
//! older one, so readers can race refreshes safely.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tidemark_protocol::error::{ServiceError, ServiceResult};
use tidemark_protocol::Namespace;
use tokio::sync::RwLock;

/// Source of namespace records, typically the metadata store.
#[async_trait]
pub trait NamespaceProvider: Send + Sync {
    /// Fetch a namespace by name.
    async fn fetch_by_name(&self, name: &str) -> ServiceResult<Namespace>;

    /// Fetch a namespace by id.
    async fn fetch_by_id(&self, id: &str) -> ServiceResult<Namespace>;
}

/// In-memory provider used by tests and embedded deployments.
#[derive(Default)]
pub struct InMemoryNamespaceProvider {
    records: std::sync::Mutex<HashMap<String, Namespace>>,
}

impl InMemoryNamespaceProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a namespace record.
    pub fn put(&self, namespace: Namespace) {
        self.records
            .lock()
            .unwrap()
            .insert(namespace.id.clone(), namespace);
    }
}

#[async_trait]
impl NamespaceProvider for InMemoryNamespaceProvider {
    async fn fetch_by_name(&self, name: &str) -> ServiceResult<Namespace> {
        self.records
            .lock()
            .unwrap()
            .values()
            .find(|ns| ns.name == name)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("namespace {name} not found")))
    }

    async fn fetch_by_id(&self, id: &str) -> ServiceResult<Namespace> {
        self.records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("namespace id {id} not found")))
    }
}

/// Read-through cache over a [`NamespaceProvider`].
pub struct NamespaceCache {
    provider: Arc<dyn NamespaceProvider>,
    by_id: RwLock<HashMap<String, Arc<Namespace>>>,
    name_to_id: RwLock<HashMap<String, String>>,
}

impl NamespaceCache {
    /// Create a cache over the given provider.
    pub fn new(provider: Arc<dyn NamespaceProvider>) -> Self {
        Self {
            provider,
            by_id: RwLock::new(HashMap::new()),
            name_to_id: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a namespace by name, reading through on miss.
    pub async fn get_namespace(&self, name: &str) -> ServiceResult<Arc<Namespace>> {
        if let Some(id) = self.name_to_id.read().await.get(name).cloned() {
            if let Some(entry) = self.by_id.read().await.get(&id).cloned() {
                return Ok(entry);
            }
        }
        let record = self.provider.fetch_by_name(name).await?;
        Ok(self.insert(record).await)
    }

    /// Look up a namespace by id, reading through on miss.
    pub async fn get_namespace_by_id(&self, id: &str) -> ServiceResult<Arc<Namespace>> {
        if let Some(entry) = self.by_id.read().await.get(id).cloned() {
            return Ok(entry);
        }
        let record = self.provider.fetch_by_id(id).await?;
        Ok(self.insert(record).await)
    }

    /// Install a record, keeping whichever of the cached and incoming
    /// versions is newer. Returns the entry now in the cache.
    pub async fn insert(&self, namespace: Namespace) -> Arc<Namespace> {
        let mut by_id = self.by_id.write().await;
        let mut name_to_id = self.name_to_id.write().await;
        if let Some(existing) = by_id.get(&namespace.id) {
            if existing.notification_version >= namespace.notification_version {
                return existing.clone();
            }
            // The record may have been renamed; drop the stale alias.
            name_to_id.remove(&existing.name);
        }
        let entry = Arc::new(namespace);
        name_to_id.insert(entry.name.clone(), entry.id.clone());
        by_id.insert(entry.id.clone(), entry.clone());
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_protocol::ReplicationConfig;

    fn namespace(id: &str, name: &str, version: i64) -> Namespace {
        Namespace {
            id: id.to_string(),
            name: name.to_string(),
            global: false,
            replication: ReplicationConfig::default(),
            failover_version: 0,
            notification_version: version,
            retention_days: 7,
        }
    }

    #[tokio::test]
    async fn reads_through_on_miss() {
        let provider = Arc::new(InMemoryNamespaceProvider::new());
        provider.put(namespace("id-1", "orders", 1));
        let cache = NamespaceCache::new(provider.clone());

        let by_name = cache.get_namespace("orders").await.unwrap();
        assert_eq!(by_name.id, "id-1");
        let by_id = cache.get_namespace_by_id("id-1").await.unwrap();
        assert_eq!(by_id.name, "orders");

        let missing = cache.get_namespace("nope").await.unwrap_err();
        assert_eq!(missing.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn never_regresses_to_an_older_record() {
        let provider = Arc::new(InMemoryNamespaceProvider::new());
        let cache = NamespaceCache::new(provider.clone());

        cache.insert(namespace("id-1", "orders", 5)).await;
        let stale = cache.insert(namespace("id-1", "orders-old", 3)).await;
        assert_eq!(stale.name, "orders");
        assert_eq!(stale.notification_version, 5);

        let renamed = cache.insert(namespace("id-1", "orders-v2", 6)).await;
        assert_eq!(renamed.name, "orders-v2");
        let found = cache.get_namespace("orders-v2").await.unwrap();
        assert_eq!(found.id, "id-1");
    }
}
