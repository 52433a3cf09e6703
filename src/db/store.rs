// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-file JSON document store keyed by user id.
//!
//! The whole document is held in memory and flushed to disk after every
//! mutation. All mutations run inside one store-wide critical section that
//! covers read-modify-write *and* persist, so concurrent requests cannot
//! lose updates. The section is store-wide rather than per-user because
//! every write rewrites the single backing file anyway.
//!
//! An absent file is treated as an empty store (cold start); a present but
//! malformed file is a hard startup error, never silently discarded.

use crate::error::AppError;
use crate::models::UserRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// JSON document store. Cheap to clone; clones share state.
#[derive(Clone, Debug)]
pub struct JsonStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// None for in-memory test stores
    path: Option<PathBuf>,
    records: RwLock<HashMap<String, UserRecord>>,
}

impl JsonStore {
    /// Open (or initialize) the store backed by a file on disk.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::Store(format!("Malformed store file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Store file absent, starting empty");
                HashMap::new()
            }
            Err(e) => {
                return Err(AppError::Store(format!(
                    "Failed to read store file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::info!(
            path = %path.display(),
            users = records.len(),
            "Document store opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                path: Some(path),
                records: RwLock::new(records),
            }),
        })
    }

    /// Create an in-memory store for testing. Nothing touches disk.
    pub fn new_in_memory() -> Self {
        Self {
            inner: Arc::new(Inner {
                path: None,
                records: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Get a user's record by provider identity.
    pub async fn get_user(&self, user_id: &str) -> Option<UserRecord> {
        self.inner.records.read().await.get(user_id).cloned()
    }

    /// All user ids currently in the store.
    pub async fn user_ids(&self) -> Vec<String> {
        self.inner.records.read().await.keys().cloned().collect()
    }

    /// Insert or replace a user's record.
    pub async fn put_user(&self, user_id: &str, record: UserRecord) -> Result<(), AppError> {
        let mut records = self.inner.records.write().await;
        records.insert(user_id.to_string(), record);
        self.persist(&records).await
    }

    /// Mutate an existing user's record inside the store critical section.
    ///
    /// The closure runs against a working copy; the copy is committed and
    /// persisted only if the closure succeeds. Fails with `NotFound` if the
    /// user has no record.
    pub async fn update_user<T, F>(&self, user_id: &str, mutate: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut UserRecord) -> Result<T, AppError>,
    {
        let mut records = self.inner.records.write().await;

        let mut working = records
            .get(user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let result = mutate(&mut working)?;

        records.insert(user_id.to_string(), working);
        self.persist(&records).await?;

        Ok(result)
    }

    /// Remove a user's record entirely.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), AppError> {
        let mut records = self.inner.records.write().await;
        records.remove(user_id);
        self.persist(&records).await
    }

    /// Flush the full document to disk. Caller must hold the write lock.
    ///
    /// Writes to a sibling temp file then renames, so readers never observe
    /// a torn document.
    async fn persist(&self, records: &HashMap<String, UserRecord>) -> Result<(), AppError> {
        let Some(path) = &self.inner.path else {
            return Ok(()); // in-memory store
        };

        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| AppError::Store(format!("Failed to serialize store: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::Store(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| AppError::Store(format!("Failed to write {}: {}", tmp.display(), e)))?;

        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| AppError::Store(format!("Failed to commit {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;

    fn record(email: &str) -> UserRecord {
        UserRecord::new(UserProfile::new(
            email.to_string(),
            "Test User".to_string(),
            None,
            true,
        ))
    }

    #[tokio::test]
    async fn get_missing_user_is_none() {
        let store = JsonStore::new_in_memory();
        assert!(store.get_user("nobody").await.is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = JsonStore::new_in_memory();
        store.put_user("u1", record("a@example.com")).await.unwrap();

        let got = store.get_user("u1").await.unwrap();
        assert_eq!(got.profile.email, "a@example.com");
        assert!(got.subscriptions.is_empty());
    }

    #[tokio::test]
    async fn update_missing_user_is_not_found() {
        let store = JsonStore::new_in_memory();
        let err = store
            .update_user("ghost", |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_mutation_does_not_commit() {
        let store = JsonStore::new_in_memory();
        store.put_user("u1", record("a@example.com")).await.unwrap();

        let err = store
            .update_user::<(), _>("u1", |rec| {
                rec.profile.name = "Mutated".to_string();
                Err(AppError::InvalidInput("nope".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        // The working copy was discarded
        assert_eq!(store.get_user("u1").await.unwrap().profile.name, "Test User");
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let store = JsonStore::new_in_memory();
        store.put_user("u1", record("a@example.com")).await.unwrap();

        store.delete_user("u1").await.unwrap();
        assert!(store.get_user("u1").await.is_none());
        assert!(store.user_ids().await.is_empty());

        // Deleting an absent user is a no-op
        store.delete_user("u1").await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let store = JsonStore::new_in_memory();
        store.put_user("u1", record("a@example.com")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_user("u1", |rec| {
                        rec.subscriptions.push(crate::models::Subscription {
                            id: format!("sub-{i}"),
                            name: format!("Service {i}"),
                            expiry: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                            cost: 1.0,
                            notes: None,
                            cycle: crate::models::BillingCycle::Monthly,
                            auto_renew: false,
                            final_expiry: None,
                            created_at: "2026-01-01T00:00:00Z".to_string(),
                            updated_at: None,
                        });
                        Ok(())
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Every concurrent insert survived; nothing was clobbered.
        assert_eq!(store.get_user("u1").await.unwrap().subscriptions.len(), 20);
    }

    #[tokio::test]
    async fn absent_file_starts_empty_and_persists() {
        let dir = std::env::temp_dir().join(format!("subwatch-store-{}", std::process::id()));
        let path = dir.join("store.json");
        let _ = tokio::fs::remove_file(&path).await;

        let store = JsonStore::open(&path).await.unwrap();
        assert!(store.user_ids().await.is_empty());

        store.put_user("u1", record("a@example.com")).await.unwrap();

        // Re-open and observe the persisted record
        let reopened = JsonStore::open(&path).await.unwrap();
        assert!(reopened.get_user("u1").await.is_some());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn malformed_file_fails_loudly() {
        let dir = std::env::temp_dir().join(format!("subwatch-bad-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("store.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let err = JsonStore::open(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
