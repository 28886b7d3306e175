use anyhow::{Context, Result};
use futures_util::TryStreamExt;
use mongodb::Database;
use mongodb::bson::{doc, oid::ObjectId};

use crate::models::qr_record::QrRecord;

pub const QR_COLLECTION: &str = "qrcodes";

/// Storage seam for the scan-tracking path. CRUD handlers talk to the
/// collection directly; the Scan Recorder and the aggregator go through this
/// trait so they can be exercised without a running MongoDB.
#[allow(async_fn_in_trait)]
pub trait QrStore {
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<QrRecord>>;

    async fn find_by_owner(&self, user_id: &str) -> Result<Vec<QrRecord>>;

    /// Compare-and-swap on the record's version field. Returns false when
    /// another writer got there first and the caller should reload.
    async fn save_versioned(&self, record: &QrRecord, expected_version: i64) -> Result<bool>;
}

pub struct MongoQrStore {
    collection: mongodb::Collection<QrRecord>,
}

impl MongoQrStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<QrRecord>(QR_COLLECTION),
        }
    }
}

impl QrStore for MongoQrStore {
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<QrRecord>> {
        self.collection
            .find_one(doc! { "_id": id })
            .await
            .context("Failed to load QR record")
    }

    async fn find_by_owner(&self, user_id: &str) -> Result<Vec<QrRecord>> {
        self.collection
            .find(doc! { "user_id": user_id })
            .await
            .context("Failed to query QR records")?
            .try_collect()
            .await
            .context("Failed to read QR record cursor")
    }

    async fn save_versioned(&self, record: &QrRecord, expected_version: i64) -> Result<bool> {
        let id = record.id.context("QR record has no id")?;
        let result = self
            .collection
            .replace_one(doc! { "_id": id, "version": expected_version }, record)
            .await
            .context("Failed to save QR record")?;
        Ok(result.matched_count == 1)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Drop-in store for recorder tests.
    pub(crate) struct MemoryQrStore {
        records: Mutex<HashMap<ObjectId, QrRecord>>,
    }

    impl MemoryQrStore {
        pub(crate) fn with(records: Vec<QrRecord>) -> Self {
            let map = records
                .into_iter()
                .filter_map(|r| r.id.map(|id| (id, r)))
                .collect();
            Self {
                records: Mutex::new(map),
            }
        }

        pub(crate) fn get(&self, id: &ObjectId) -> Option<QrRecord> {
            self.records.lock().unwrap().get(id).cloned()
        }
    }

    impl QrStore for MemoryQrStore {
        async fn find_by_id(&self, id: &ObjectId) -> Result<Option<QrRecord>> {
            Ok(self.get(id))
        }

        async fn find_by_owner(&self, user_id: &str) -> Result<Vec<QrRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .values()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn save_versioned(&self, record: &QrRecord, expected_version: i64) -> Result<bool> {
            let id = record.id.context("QR record has no id")?;
            let mut map = self.records.lock().unwrap();
            match map.get(&id) {
                Some(existing) if existing.version == expected_version => {
                    map.insert(id, record.clone());
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }
}
