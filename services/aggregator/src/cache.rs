//! Cached dashboard record.
//!
//! Holds the most recent upload: one JSON file with the aggregate plus the
//! period label and upload time. Lifecycle:
//! - load at start (absent or unreadable record => built-in data)
//! - overwrite on every upload
//! - clear on reset
//!
//! Callers that may upload concurrently must serialize their writes; the last
//! `save` wins.

use crate::defaults::{default_aggregate, DEFAULT_PERIOD};
use crate::model::AggregateResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Label used when neither the user nor the file name gives one.
pub const CUSTOM_PERIOD: &str = "Custom Period";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache record could not be encoded: {0}")]
    Codec(#[from] serde_json::Error),
}

/// An aggregate tagged for local caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDashboard {
    /// Missing, null or empty labels read as [`CUSTOM_PERIOD`].
    #[serde(
        rename = "dateRange",
        default = "custom_period",
        deserialize_with = "label_or_custom"
    )]
    pub date_range: String,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub aggregate: AggregateResult,
}

impl CachedDashboard {
    pub fn new(aggregate: AggregateResult, date_range: String, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            date_range,
            uploaded_at,
            aggregate,
        }
    }
}

fn custom_period() -> String {
    CUSTOM_PERIOD.to_string()
}

fn label_or_custom<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let label = Option::<String>::deserialize(deserializer)?;
    Ok(label.filter(|l| !l.is_empty()).unwrap_or_else(custom_period))
}

/// What the dashboard should show right now.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveDashboard {
    Cached(CachedDashboard),
    Default(AggregateResult),
}

impl ActiveDashboard {
    pub fn date_range(&self) -> &str {
        match self {
            ActiveDashboard::Cached(record) => &record.date_range,
            ActiveDashboard::Default(_) => DEFAULT_PERIOD,
        }
    }

    pub fn aggregate(&self) -> &AggregateResult {
        match self {
            ActiveDashboard::Cached(record) => &record.aggregate,
            ActiveDashboard::Default(aggregate) => aggregate,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, ActiveDashboard::Cached(_))
    }
}

/// File-backed slot for a single [`CachedDashboard`].
#[derive(Debug, Clone)]
pub struct DashboardCache {
    path: PathBuf,
}

impl DashboardCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path from `DASHBOARD_CACHE`, default `./data/dashboardData.json`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("DASHBOARD_CACHE")
                .unwrap_or_else(|_| "./data/dashboardData.json".to_string()),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached record. A record that no longer parses is logged and
    /// treated as absent.
    pub async fn load(&self) -> Result<Option<CachedDashboard>, CacheError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable cached dashboard");
                Ok(None)
            }
        }
    }

    /// Overwrite the cached record.
    pub async fn save(&self, record: &CachedDashboard) -> Result<(), CacheError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let body = serde_json::to_vec_pretty(record)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), bytes = body.len(), "cached dashboard saved");
        Ok(())
    }

    /// Remove the cached record. Returns whether one existed.
    pub async fn clear(&self) -> Result<bool, CacheError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Cached record if present, otherwise the built-in main dashboard.
    pub async fn active(&self) -> Result<ActiveDashboard, CacheError> {
        match self.load().await? {
            Some(record) => Ok(ActiveDashboard::Cached(record)),
            None => Ok(ActiveDashboard::Default(default_aggregate()?)),
        }
    }
}

/// Period label for an upload: the explicit label if given, otherwise a
/// month-year token from the file name (`Sales_Jan2026.csv` -> `Jan2026`),
/// otherwise [`CUSTOM_PERIOD`].
pub fn period_label(explicit: Option<&str>, file_name: &str) -> String {
    if let Some(label) = explicit.map(str::trim).filter(|l| !l.is_empty()) {
        return label.to_string();
    }
    month_year_token(file_name)
        .map(str::to_string)
        .unwrap_or_else(|| CUSTOM_PERIOD.to_string())
}

/// First run of ASCII letters immediately followed by four digits.
fn month_year_token(name: &str) -> Option<&str> {
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_alphabetic() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let digits = bytes[i..].iter().take(4).take_while(|b| b.is_ascii_digit()).count();
        if digits == 4 {
            return Some(&name[start..i + 4]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, AggregateOptions};
    use chrono::TimeZone;

    fn sample_record(label: &str) -> CachedDashboard {
        let aggregate = aggregate(
            "country,units,sales\nUK,5,100\nUS,3,50\n",
            &AggregateOptions::default(),
        )
        .unwrap();
        let uploaded_at = Utc.with_ymd_and_hms(2026, 2, 3, 10, 30, 0).unwrap();
        CachedDashboard::new(aggregate, label.to_string(), uploaded_at)
    }

    #[tokio::test]
    async fn test_load_without_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DashboardCache::new(dir.path().join("dashboardData.json"));
        assert!(cache.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DashboardCache::new(dir.path().join("nested/dashboardData.json"));
        let record = sample_record("February 2026");

        cache.save(&record).await.unwrap();
        assert_eq!(cache.load().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DashboardCache::new(dir.path().join("dashboardData.json"));

        cache.save(&sample_record("January")).await.unwrap();
        cache.save(&sample_record("February")).await.unwrap();

        let loaded = cache.load().await.unwrap().unwrap();
        assert_eq!(loaded.date_range, "February");
    }

    #[tokio::test]
    async fn test_record_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DashboardCache::new(dir.path().join("dashboardData.json"));
        cache.save(&sample_record("Jan2026")).await.unwrap();

        let raw = std::fs::read_to_string(cache.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["dateRange"], "Jan2026");
        assert!(json["uploadedAt"].as_str().unwrap().starts_with("2026-02-03T10:30:00"));
        assert_eq!(json["summary"]["uk_units"], 5);
        assert!(json["devices_comparison"].is_array());
    }

    #[tokio::test]
    async fn test_clear_reverts_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DashboardCache::new(dir.path().join("dashboardData.json"));
        cache.save(&sample_record("Custom")).await.unwrap();
        assert!(cache.active().await.unwrap().is_cached());

        assert!(cache.clear().await.unwrap());
        assert!(!cache.clear().await.unwrap());

        let active = cache.active().await.unwrap();
        assert!(!active.is_cached());
        assert_eq!(active.date_range(), DEFAULT_PERIOD);
        assert_eq!(active.aggregate().summary.total_units, 15194);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboardData.json");
        std::fs::write(&path, "{not json").unwrap();

        let cache = DashboardCache::new(path);
        assert!(cache.load().await.unwrap().is_none());
        assert!(!cache.active().await.unwrap().is_cached());
    }

    #[tokio::test]
    async fn test_record_without_period_label_is_still_shown() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DashboardCache::new(dir.path().join("dashboardData.json"));
        let mut json = serde_json::to_value(sample_record("Jan2026")).unwrap();
        json.as_object_mut().unwrap().remove("dateRange");
        std::fs::write(cache.path(), serde_json::to_vec(&json).unwrap()).unwrap();

        let active = cache.active().await.unwrap();
        assert!(active.is_cached());
        assert_eq!(active.date_range(), CUSTOM_PERIOD);
        assert_eq!(active.aggregate().summary.uk_units, 5);
    }

    #[tokio::test]
    async fn test_record_with_empty_period_label_reads_custom() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DashboardCache::new(dir.path().join("dashboardData.json"));
        let mut json = serde_json::to_value(sample_record("Jan2026")).unwrap();
        json["dateRange"] = serde_json::Value::String(String::new());
        std::fs::write(cache.path(), serde_json::to_vec(&json).unwrap()).unwrap();

        let record = cache.load().await.unwrap().unwrap();
        assert_eq!(record.date_range, CUSTOM_PERIOD);
    }

    #[test]
    fn test_period_label_prefers_explicit_label() {
        assert_eq!(period_label(Some("February 2026"), "Sales_Jan2026.csv"), "February 2026");
    }

    #[test]
    fn test_period_label_from_file_name() {
        assert_eq!(period_label(None, "Sales_Jan2026.csv"), "Jan2026");
        assert_eq!(period_label(Some("  "), "report-March2025-final.csv"), "March2025");
        assert_eq!(period_label(None, "Q4Dec2025.csv"), "Dec2025");
    }

    #[test]
    fn test_period_label_fallback() {
        assert_eq!(period_label(None, "sales.csv"), CUSTOM_PERIOD);
        assert_eq!(period_label(None, "2026.csv"), CUSTOM_PERIOD);
        assert_eq!(period_label(None, "Jan202.csv"), CUSTOM_PERIOD);
    }
}
