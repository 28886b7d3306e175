use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use std::collections::HashMap;

use crate::db::qr_store::QrStore;
use crate::models::qr_record::{PasswordCheck, QrRecord, ScanAnalytics, ScanLocation};
use crate::utils::device::classify_device;

pub const UNKNOWN_PLACE: &str = "Unknown";

/// Retries when a concurrent scan or an owner edit wins the version race.
const MAX_SAVE_ATTEMPTS: usize = 3;

/// Everything we know about one inbound scan.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub user_agent: String,
    pub ip: String,
    pub referer: Option<String>,
    pub country: String,
    pub city: String,
}

impl ScanContext {
    pub fn new(
        user_agent: String,
        ip: String,
        referer: Option<String>,
        country: Option<String>,
        city: Option<String>,
    ) -> Self {
        Self {
            user_agent,
            ip,
            referer,
            country: country
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| UNKNOWN_PLACE.to_string()),
            city: city
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| UNKNOWN_PLACE.to_string()),
        }
    }

    /// A location entry is only appended when the lookup actually resolved
    /// something.
    pub fn has_location(&self) -> bool {
        self.country != UNKNOWN_PLACE || self.city != UNKNOWN_PLACE
    }
}

/// The URL a printed code encodes. Scans land on the tracking endpoint, so
/// owners can edit the destination without reprinting.
pub fn create_tracking_url(base_url: &str, record: &QrRecord) -> String {
    format!(
        "{}/track/{}/{}",
        base_url,
        record.id.map(|id| id.to_hex()).unwrap_or_default(),
        record.tracking_id
    )
}

/// Record one scan against a record. Returns the updated record, or `None`
/// when the record is missing, already expired, or the write failed. Callers
/// treat all of those the same and must not block on the result.
pub async fn record_scan<S: QrStore>(
    store: &S,
    qr_id: &ObjectId,
    ctx: &ScanContext,
) -> Option<QrRecord> {
    for _ in 0..MAX_SAVE_ATTEMPTS {
        let now = chrono::Utc::now().timestamp_millis();

        let mut record = match store.find_by_id(qr_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                log::error!("Failed to load QR record {}: {:#}", qr_id, e);
                return None;
            }
        };
        let expected = record.version;

        // Expired records take no scan, but the sticky flag still gets
        // persisted so later checks can short-circuit on it.
        if record.is_expired_at(now) {
            if record.is_expired {
                return None;
            }
            record.is_expired = true;
            record.version += 1;
            match store.save_versioned(&record, expected).await {
                Ok(true) => return None,
                Ok(false) => continue,
                Err(e) => {
                    log::error!("Failed to persist expiry for {}: {:#}", qr_id, e);
                    return None;
                }
            }
        }

        apply_scan(&mut record, ctx, now);
        record.version += 1;
        match store.save_versioned(&record, expected).await {
            Ok(true) => return Some(record),
            Ok(false) => continue,
            Err(e) => {
                log::error!("Failed to record scan for {}: {:#}", qr_id, e);
                return None;
            }
        }
    }

    log::warn!(
        "Gave up recording scan for {} after {} contended writes",
        qr_id,
        MAX_SAVE_ATTEMPTS
    );
    None
}

/// The in-memory half of a scan: counters, device upsert, location log, and
/// the post-increment ceiling check.
fn apply_scan(record: &mut QrRecord, ctx: &ScanContext, now: i64) {
    let device = classify_device(&ctx.user_agent);

    record.analytics.scan_count += 1;
    record.analytics.last_scanned = Some(now);

    if ctx.has_location() {
        record.analytics.scan_locations.push(ScanLocation {
            country: ctx.country.clone(),
            city: ctx.city.clone(),
            timestamp: now,
        });
    }

    *record
        .analytics
        .devices
        .entry(device.as_str().to_string())
        .or_insert(0) += 1;

    if let Some(max) = record.security.scan_ceiling() {
        if record.analytics.scan_count >= max {
            record.is_expired = true;
        }
    }
}

/// What the password gate decided for one unlock attempt.
#[derive(Debug)]
pub enum UnlockOutcome {
    NotFound,
    /// Storage failure; the caller answers with a generic error.
    Unavailable,
    Expired,
    MissingPassword,
    InvalidPassword,
    /// The destination may be handed out. Carries the post-scan snapshot for
    /// protected records, the untouched record for open ones.
    Unlocked(QrRecord),
}

/// Resolve an unlock attempt against a protected record. A scan is counted
/// exactly once, and only when the password checks out; a failed attempt
/// leaves the counters untouched. Open records pass through uncounted, the
/// tracking endpoint already counted them.
pub async fn unlock_protected<S: QrStore>(
    store: &S,
    qr_id: &ObjectId,
    supplied: Option<&str>,
    ctx: &ScanContext,
) -> UnlockOutcome {
    let record = match store.find_by_id(qr_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return UnlockOutcome::NotFound,
        Err(e) => {
            log::error!("Failed to load QR record {}: {:#}", qr_id, e);
            return UnlockOutcome::Unavailable;
        }
    };

    // Expiry wins over everything, including a correct password.
    if record.has_expired() {
        return UnlockOutcome::Expired;
    }

    match record.check_password(supplied) {
        PasswordCheck::Open => UnlockOutcome::Unlocked(record),
        PasswordCheck::Missing => UnlockOutcome::MissingPassword,
        PasswordCheck::Invalid => UnlockOutcome::InvalidPassword,
        PasswordCheck::Verified => {
            // A failed write must not block the unlock; the caller still gets
            // the destination, with the pre-scan counters.
            let snapshot = record_scan(store, qr_id, ctx).await.unwrap_or(record);
            UnlockOutcome::Unlocked(snapshot)
        }
    }
}

#[derive(Serialize, Debug)]
pub struct MostScanned {
    pub id: String,
    pub content: String,
    pub scan_count: i64,
}

#[derive(Serialize, Debug, Default)]
pub struct OwnerAnalytics {
    pub total_qr_codes: usize,
    pub total_scans: i64,
    pub scans_by_device: HashMap<String, i64>,
    pub scans_by_location: HashMap<String, i64>,
    pub most_scanned: Option<MostScanned>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
pub enum AnalyticsView {
    Record(ScanAnalytics),
    Owner(OwnerAnalytics),
}

/// Read-side rollup across a user's records. A materialized snapshot, not a
/// live view.
pub fn aggregate_owner(records: &[QrRecord]) -> OwnerAnalytics {
    let mut view = OwnerAnalytics {
        total_qr_codes: records.len(),
        ..Default::default()
    };
    let mut best = 0i64;

    for record in records {
        view.total_scans += record.analytics.scan_count;

        // Strict comparison: ties keep the first record encountered.
        if record.analytics.scan_count > best {
            best = record.analytics.scan_count;
            view.most_scanned = Some(MostScanned {
                id: record.id.map(|id| id.to_hex()).unwrap_or_default(),
                content: record.content.clone(),
                scan_count: record.analytics.scan_count,
            });
        }

        for (device, count) in &record.analytics.devices {
            *view.scans_by_device.entry(device.clone()).or_insert(0) += count;
        }

        // Occurrences by country, not unique visitors.
        for location in &record.analytics.scan_locations {
            let key = if location.country.is_empty() {
                UNKNOWN_PLACE
            } else {
                location.country.as_str()
            };
            *view.scans_by_location.entry(key.to_string()).or_insert(0) += 1;
        }
    }

    view
}

/// Analytics for one record or for all of a user's records. The record id
/// takes precedence when both are given; neither yields `None`.
pub async fn get_analytics<S: QrStore>(
    store: &S,
    qr_id: Option<&ObjectId>,
    user_id: Option<&str>,
) -> Option<AnalyticsView> {
    if let Some(qr_id) = qr_id {
        return match store.find_by_id(qr_id).await {
            Ok(Some(record)) => Some(AnalyticsView::Record(record.analytics)),
            Ok(None) => None,
            Err(e) => {
                log::error!("Failed to load analytics for {}: {:#}", qr_id, e);
                None
            }
        };
    }

    let user_id = user_id?;
    match store.find_by_owner(user_id).await {
        Ok(records) => Some(AnalyticsView::Owner(aggregate_owner(&records))),
        Err(e) => {
            log::error!("Failed to load analytics for user {}: {:#}", user_id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::qr_store::memory::MemoryQrStore;
    use crate::models::qr_record::{Customization, QrType, Security};

    fn record(security: Security) -> QrRecord {
        QrRecord::new(
            "user-1".to_string(),
            "https://example.com".to_string(),
            QrType::Url,
            Customization::default(),
            security,
            vec![],
        )
    }

    fn record_with_count(count: i64) -> QrRecord {
        let mut rec = record(Security::default());
        rec.analytics.scan_count = count;
        rec
    }

    fn ctx() -> ScanContext {
        ScanContext::new(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)".to_string(),
            "203.0.113.9".to_string(),
            None,
            Some("DE".to_string()),
            Some("Berlin".to_string()),
        )
    }

    #[actix_web::test]
    async fn each_scan_increments_by_one() {
        let rec = record(Security::default());
        let id = rec.id.unwrap();
        let store = MemoryQrStore::with(vec![rec]);

        for expected in 1..=5i64 {
            let updated = record_scan(&store, &id, &ctx()).await.unwrap();
            assert_eq!(updated.analytics.scan_count, expected);
        }

        let stored = store.get(&id).unwrap();
        assert_eq!(stored.analytics.scan_count, 5);
        assert_eq!(stored.analytics.devices.get("mobile"), Some(&5));
        assert_eq!(stored.analytics.scan_locations.len(), 5);
        assert!(stored.analytics.last_scanned.is_some());
    }

    #[actix_web::test]
    async fn scan_ceiling_expires_on_the_last_allowed_scan() {
        let rec = record(Security {
            max_scans: Some(3),
            ..Security::default()
        });
        let id = rec.id.unwrap();
        let store = MemoryQrStore::with(vec![rec]);

        for _ in 0..2 {
            let updated = record_scan(&store, &id, &ctx()).await.unwrap();
            assert!(!updated.is_expired);
        }
        let third = record_scan(&store, &id, &ctx()).await.unwrap();
        assert_eq!(third.analytics.scan_count, 3);
        assert!(third.is_expired);

        // A fourth scan is refused and the counter stays put.
        assert!(record_scan(&store, &id, &ctx()).await.is_none());
        assert_eq!(store.get(&id).unwrap().analytics.scan_count, 3);
    }

    #[actix_web::test]
    async fn past_expiry_date_refuses_the_scan_and_sticks() {
        let rec = record(Security {
            expires_at: Some(1_000),
            ..Security::default()
        });
        let id = rec.id.unwrap();
        let store = MemoryQrStore::with(vec![rec]);

        assert!(record_scan(&store, &id, &ctx()).await.is_none());
        let stored = store.get(&id).unwrap();
        assert_eq!(stored.analytics.scan_count, 0);
        assert!(stored.is_expired);
    }

    #[actix_web::test]
    async fn missing_record_returns_none() {
        let store = MemoryQrStore::with(vec![]);
        assert!(record_scan(&store, &ObjectId::new(), &ctx()).await.is_none());
    }

    #[actix_web::test]
    async fn unknown_location_is_not_logged() {
        let rec = record(Security::default());
        let id = rec.id.unwrap();
        let store = MemoryQrStore::with(vec![rec]);

        let no_geo = ScanContext::new(
            "curl/8.5.0".to_string(),
            "198.51.100.1".to_string(),
            None,
            None,
            None,
        );
        let updated = record_scan(&store, &id, &no_geo).await.unwrap();
        assert!(updated.analytics.scan_locations.is_empty());
        assert_eq!(updated.analytics.devices.get("unknown"), Some(&1));
    }

    fn protected(password: &str) -> QrRecord {
        record(Security {
            password: Some(password.to_string()),
            is_password_protected: true,
            ..Security::default()
        })
    }

    #[actix_web::test]
    async fn correct_password_counts_exactly_one_scan() {
        let rec = protected("letmein");
        let id = rec.id.unwrap();
        let store = MemoryQrStore::with(vec![rec]);

        match unlock_protected(&store, &id, Some("letmein"), &ctx()).await {
            UnlockOutcome::Unlocked(snapshot) => assert_eq!(snapshot.analytics.scan_count, 1),
            other => panic!("expected unlock, got {:?}", other),
        }
        assert_eq!(store.get(&id).unwrap().analytics.scan_count, 1);
    }

    #[actix_web::test]
    async fn failed_password_counts_nothing() {
        let rec = protected("letmein");
        let id = rec.id.unwrap();
        let store = MemoryQrStore::with(vec![rec]);

        assert!(matches!(
            unlock_protected(&store, &id, Some("wrong"), &ctx()).await,
            UnlockOutcome::InvalidPassword
        ));
        assert!(matches!(
            unlock_protected(&store, &id, None, &ctx()).await,
            UnlockOutcome::MissingPassword
        ));
        assert_eq!(store.get(&id).unwrap().analytics.scan_count, 0);
    }

    #[actix_web::test]
    async fn open_record_unlocks_without_counting() {
        let rec = record(Security::default());
        let id = rec.id.unwrap();
        let store = MemoryQrStore::with(vec![rec]);

        assert!(matches!(
            unlock_protected(&store, &id, None, &ctx()).await,
            UnlockOutcome::Unlocked(_)
        ));
        assert_eq!(store.get(&id).unwrap().analytics.scan_count, 0);
    }

    #[actix_web::test]
    async fn expired_record_refuses_even_the_right_password() {
        let rec = protected("letmein");
        let id = rec.id.unwrap();
        let store = MemoryQrStore::with(vec![{
            let mut rec = rec;
            rec.security.expires_at = Some(1_000);
            rec
        }]);

        assert!(matches!(
            unlock_protected(&store, &id, Some("letmein"), &ctx()).await,
            UnlockOutcome::Expired
        ));
        assert_eq!(store.get(&id).unwrap().analytics.scan_count, 0);
    }

    /// Store that loses the version race a fixed number of times: each
    /// injected conflict lands a competing version bump first, as an owner
    /// edit would.
    struct ContendedStore {
        inner: MemoryQrStore,
        conflicts: std::sync::Mutex<usize>,
    }

    impl ContendedStore {
        fn with(records: Vec<QrRecord>, conflicts: usize) -> Self {
            Self {
                inner: MemoryQrStore::with(records),
                conflicts: std::sync::Mutex::new(conflicts),
            }
        }
    }

    impl QrStore for ContendedStore {
        async fn find_by_id(&self, id: &ObjectId) -> anyhow::Result<Option<QrRecord>> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_owner(&self, user_id: &str) -> anyhow::Result<Vec<QrRecord>> {
            self.inner.find_by_owner(user_id).await
        }

        async fn save_versioned(
            &self,
            record: &QrRecord,
            expected_version: i64,
        ) -> anyhow::Result<bool> {
            let contend = {
                let mut left = self.conflicts.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    true
                } else {
                    false
                }
            };
            if contend {
                if let Some(mut current) = self.inner.get(&record.id.unwrap()) {
                    let expected = current.version;
                    current.version += 1;
                    self.inner.save_versioned(&current, expected).await?;
                }
                return Ok(false);
            }
            self.inner.save_versioned(record, expected_version).await
        }
    }

    #[actix_web::test]
    async fn lost_version_race_is_retried_and_lands_one_increment() {
        let rec = record(Security::default());
        let id = rec.id.unwrap();
        let store = ContendedStore::with(vec![rec], 1);

        let updated = record_scan(&store, &id, &ctx()).await.unwrap();
        assert_eq!(updated.analytics.scan_count, 1);

        let stored = store.inner.get(&id).unwrap();
        assert_eq!(stored.analytics.scan_count, 1);
        // Competing edit and scan each bumped the version once.
        assert_eq!(stored.version, 2);
    }

    #[actix_web::test]
    async fn sustained_contention_gives_up_without_counting() {
        let rec = record(Security::default());
        let id = rec.id.unwrap();
        let store = ContendedStore::with(vec![rec], MAX_SAVE_ATTEMPTS);

        assert!(record_scan(&store, &id, &ctx()).await.is_none());
        assert_eq!(store.inner.get(&id).unwrap().analytics.scan_count, 0);
    }

    struct FailingStore;

    impl QrStore for FailingStore {
        async fn find_by_id(&self, _id: &ObjectId) -> anyhow::Result<Option<QrRecord>> {
            Err(anyhow::anyhow!("connection reset"))
        }

        async fn find_by_owner(&self, _user_id: &str) -> anyhow::Result<Vec<QrRecord>> {
            Err(anyhow::anyhow!("connection reset"))
        }

        async fn save_versioned(
            &self,
            _record: &QrRecord,
            _expected_version: i64,
        ) -> anyhow::Result<bool> {
            Err(anyhow::anyhow!("connection reset"))
        }
    }

    #[actix_web::test]
    async fn storage_failure_surfaces_as_unavailable() {
        assert!(matches!(
            unlock_protected(&FailingStore, &ObjectId::new(), None, &ctx()).await,
            UnlockOutcome::Unavailable
        ));
    }

    #[test]
    fn owner_rollup_sums_and_picks_most_scanned() {
        let mut a = record_with_count(5);
        a.analytics.devices.insert("mobile".to_string(), 5);
        a.analytics.scan_locations.push(ScanLocation {
            country: "DE".to_string(),
            city: "Berlin".to_string(),
            timestamp: 1,
        });
        let mut b = record_with_count(12);
        b.content = "https://example.org/top".to_string();
        b.analytics.devices.insert("mobile".to_string(), 8);
        b.analytics.devices.insert("desktop".to_string(), 4);
        let mut c = record_with_count(3);
        c.analytics.scan_locations.push(ScanLocation {
            country: "DE".to_string(),
            city: "Hamburg".to_string(),
            timestamp: 2,
        });

        let view = aggregate_owner(&[a, b.clone(), c]);
        assert_eq!(view.total_qr_codes, 3);
        assert_eq!(view.total_scans, 20);
        let top = view.most_scanned.unwrap();
        assert_eq!(top.scan_count, 12);
        assert_eq!(top.id, b.id.unwrap().to_hex());
        assert_eq!(view.scans_by_device.get("mobile"), Some(&13));
        assert_eq!(view.scans_by_device.get("desktop"), Some(&4));
        assert_eq!(view.scans_by_location.get("DE"), Some(&2));
    }

    #[test]
    fn rollup_over_unscanned_records_has_no_most_scanned() {
        let view = aggregate_owner(&[record_with_count(0), record_with_count(0)]);
        assert_eq!(view.total_scans, 0);
        assert!(view.most_scanned.is_none());
    }

    #[actix_web::test]
    async fn analytics_lookup_prefers_record_id_and_requires_one_key() {
        let mut rec = record_with_count(7);
        rec.user_id = "owner".to_string();
        let id = rec.id.unwrap();
        let store = MemoryQrStore::with(vec![rec]);

        match get_analytics(&store, Some(&id), Some("owner")).await {
            Some(AnalyticsView::Record(analytics)) => assert_eq!(analytics.scan_count, 7),
            other => panic!("expected record view, got {:?}", other),
        }
        match get_analytics(&store, None, Some("owner")).await {
            Some(AnalyticsView::Owner(view)) => assert_eq!(view.total_scans, 7),
            other => panic!("expected owner view, got {:?}", other),
        }
        assert!(get_analytics(&store, None, None).await.is_none());
        assert!(get_analytics(&store, Some(&ObjectId::new()), None).await.is_none());
    }
}
