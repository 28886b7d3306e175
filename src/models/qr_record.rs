use mongodb::bson::oid::ObjectId;
use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the encoded content represents.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QrType {
    #[default]
    Url,
    Text,
    Vcard,
    Wifi,
    Email,
    Sms,
    Geo,
    Event,
    Phone,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Customization {
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_background")]
    pub background_color: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default = "default_margin")]
    pub margin: u32,
}

fn default_color() -> String {
    String::from("#000000")
}

fn default_background() -> String {
    String::from("#ffffff")
}

fn default_margin() -> u32 {
    4
}

impl Default for Customization {
    fn default() -> Self {
        Self {
            color: default_color(),
            background_color: default_background(),
            logo: None,
            margin: default_margin(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Security {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub is_password_protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_scans: Option<i64>,
}

impl Security {
    /// The scan ceiling, if one is actually configured. Zero and negative
    /// values mean "unlimited", matching how records are created.
    pub fn scan_ceiling(&self) -> Option<i64> {
        self.max_scans.filter(|max| *max > 0)
    }

    /// Exact, case-sensitive comparison against the stored secret. Isolated
    /// here so a hashed scheme can replace it without touching the gate flow.
    pub fn password_matches(&self, supplied: &str) -> bool {
        self.password.as_deref() == Some(supplied)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanLocation {
    pub country: String,
    pub city: String,
    pub timestamp: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanAnalytics {
    #[serde(default)]
    pub scan_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scanned: Option<i64>,
    #[serde(default)]
    pub scan_locations: Vec<ScanLocation>,
    #[serde(default)]
    pub devices: HashMap<String, i64>,
}

/// Outcome of checking a supplied password against a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    /// The record is not password protected at all.
    Open,
    Missing,
    Invalid,
    Verified,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QrRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    /// The destination the code resolves to (URL, vCard text, etc.).
    pub content: String,
    /// Rendered SVG of the tracking URL.
    pub qr_image: String,
    /// Distinguishes physical printed instances of the same record.
    pub tracking_id: String,
    #[serde(default)]
    pub qr_type: QrType,
    #[serde(default)]
    pub customization: Customization,
    #[serde(default)]
    pub security: Security,
    #[serde(default)]
    pub analytics: ScanAnalytics,
    /// Sticky: once true it is never unset.
    #[serde(default)]
    pub is_expired: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: i64,
    /// Optimistic-concurrency counter; bumped on every write.
    #[serde(default)]
    pub version: i64,
}

impl QrRecord {
    pub fn new(
        user_id: String,
        content: String,
        qr_type: QrType,
        customization: Customization,
        security: Security,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id: Some(ObjectId::new()),
            user_id,
            content,
            qr_image: String::new(),
            tracking_id: nanoid!(8),
            qr_type,
            customization,
            security,
            analytics: ScanAnalytics::default(),
            is_expired: false,
            tags,
            created_at: chrono::Utc::now().timestamp_millis(),
            version: 0,
        }
    }

    /// Pure expiry predicate. Rules short-circuit in order: the sticky stored
    /// flag, then the expiry date, then the scan ceiling.
    pub fn is_expired_at(&self, now: i64) -> bool {
        if self.is_expired {
            return true;
        }
        if let Some(expiry) = self.security.expires_at {
            if now > expiry {
                return true;
            }
        }
        if let Some(max) = self.security.scan_ceiling() {
            if self.analytics.scan_count >= max {
                return true;
            }
        }
        false
    }

    pub fn has_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp_millis())
    }

    pub fn check_password(&self, supplied: Option<&str>) -> PasswordCheck {
        if !self.security.is_password_protected {
            return PasswordCheck::Open;
        }
        match supplied {
            None | Some("") => PasswordCheck::Missing,
            Some(password) if self.security.password_matches(password) => PasswordCheck::Verified,
            Some(_) => PasswordCheck::Invalid,
        }
    }
}

/// A record that does not exist is treated as expired, so lookups and expiry
/// can be checked in one place.
pub fn is_record_expired(record: Option<&QrRecord>, now: i64) -> bool {
    record.is_none_or(|r| r.is_expired_at(now))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> QrRecord {
        QrRecord::new(
            "user-1".to_string(),
            "https://example.com".to_string(),
            QrType::Url,
            Customization::default(),
            Security::default(),
            vec![],
        )
    }

    #[test]
    fn fresh_record_is_not_expired() {
        let rec = record();
        assert!(!rec.is_expired_at(rec.created_at + 1));
    }

    #[test]
    fn stored_flag_wins_over_everything() {
        let mut rec = record();
        rec.is_expired = true;
        assert!(rec.is_expired_at(0));
    }

    #[test]
    fn past_expiry_date_expires() {
        let mut rec = record();
        rec.security.expires_at = Some(1_000);
        assert!(!rec.is_expired_at(1_000));
        assert!(rec.is_expired_at(1_001));
    }

    #[test]
    fn scan_ceiling_expires_when_reached() {
        let mut rec = record();
        rec.security.max_scans = Some(3);
        rec.analytics.scan_count = 2;
        assert!(!rec.is_expired_at(0));
        rec.analytics.scan_count = 3;
        assert!(rec.is_expired_at(0));
    }

    #[test]
    fn zero_max_scans_means_unlimited() {
        let mut rec = record();
        rec.security.max_scans = Some(0);
        rec.analytics.scan_count = 1_000;
        assert!(!rec.is_expired_at(0));
    }

    #[test]
    fn missing_record_counts_as_expired() {
        assert!(is_record_expired(None, 0));
        let rec = record();
        assert!(!is_record_expired(Some(&rec), rec.created_at));
    }

    #[test]
    fn password_gate_decisions() {
        let mut rec = record();
        assert_eq!(rec.check_password(None), PasswordCheck::Open);

        rec.security.is_password_protected = true;
        rec.security.password = Some("Secret".to_string());
        assert_eq!(rec.check_password(None), PasswordCheck::Missing);
        assert_eq!(rec.check_password(Some("")), PasswordCheck::Missing);
        assert_eq!(rec.check_password(Some("secret")), PasswordCheck::Invalid);
        assert_eq!(rec.check_password(Some("Secret")), PasswordCheck::Verified);
    }
}
