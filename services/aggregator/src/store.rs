//! Dashboard document store.
//!
//! Documents live at a two-level path (`collection/doc_id`) and are always
//! written whole and read whole. Backends:
//! - `postgres`: one JSONB row per document (`documents` table)
//! - `fs`: one JSON file per document under `DOC_FS_DIR`
//! - in-memory, for tests

use crate::defaults::{DashboardDocument, DASHBOARD_COLLECTION};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document is not valid JSON: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// Fetch outcome for a document that must exist.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("document {0} not found")]
    NotFound(DocumentPath),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    pub collection: String,
    pub doc_id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            doc_id: doc_id.into(),
        }
    }

    /// `dashboards/<doc_id>` for one of the dashboard documents.
    pub fn dashboard(doc: DashboardDocument) -> Self {
        Self::new(DASHBOARD_COLLECTION, doc.doc_id())
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.doc_id)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    /// Whole document at `path`, or `None` when it does not exist.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError>;

    /// Create or replace the whole document at `path`.
    async fn put(&self, path: &DocumentPath, data: &Value) -> Result<(), StoreError>;
}

/// Read a dashboard document, turning absence into [`FetchError::NotFound`].
pub async fn fetch_document(
    store: &dyn DocumentStore,
    doc: DashboardDocument,
) -> Result<Value, FetchError> {
    let path = DocumentPath::dashboard(doc);
    match store.get(&path).await? {
        Some(data) => Ok(data),
        None => Err(FetchError::NotFound(path)),
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Postgres { db_url: String },
    Fs { root: PathBuf },
}

impl StoreConfig {
    /// `DOC_STORE` selects the backend (`fs` by default, or `postgres` with `DB_URL`).
    pub fn from_env() -> Result<Self, StoreError> {
        let kind = std::env::var("DOC_STORE").unwrap_or_else(|_| "fs".to_string());
        match kind.as_str() {
            "postgres" => Ok(StoreConfig::Postgres {
                db_url: std::env::var("DB_URL")
                    .map_err(|_| StoreError::Config("DB_URL env var missing".to_string()))?,
            }),
            "fs" => Ok(StoreConfig::Fs {
                root: PathBuf::from(
                    std::env::var("DOC_FS_DIR").unwrap_or_else(|_| "./data/documents".to_string()),
                ),
            }),
            other => Err(StoreError::Config(format!(
                "DOC_STORE must be 'fs' or 'postgres', got '{}'",
                other
            ))),
        }
    }

    /// Open the configured backend. Postgres connections also ensure the schema.
    pub async fn open(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        match self {
            StoreConfig::Postgres { db_url } => {
                let store = PgDocumentStore::connect(db_url).await?;
                store.ensure_schema().await?;
                Ok(Arc::new(store))
            }
            StoreConfig::Fs { root } => Ok(Arc::new(FsDocumentStore::new(root.clone()))),
        }
    }
}

// =============================================================================
// Postgres
// =============================================================================

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(db_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;
        info!("document store connected (postgres)");
        Ok(Self { pool })
    }

    /// Create the documents table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                data JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection, doc_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND doc_id = $2")
                .bind(&path.collection)
                .bind(&path.doc_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(data,)| data))
    }

    async fn put(&self, path: &DocumentPath, data: &Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_id, data, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (collection, doc_id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&path.collection)
        .bind(&path.doc_id)
        .bind(data)
        .execute(&self.pool)
        .await?;

        debug!(%path, "document written (postgres)");
        Ok(())
    }
}

// =============================================================================
// Filesystem
// =============================================================================

pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn file_path(&self, path: &DocumentPath) -> Result<PathBuf, StoreError> {
        for part in [&path.collection, &path.doc_id] {
            let valid = !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(StoreError::Config(format!(
                    "document path segment '{}' is not allowed",
                    part
                )));
            }
        }
        Ok(self
            .root
            .join(&path.collection)
            .join(format!("{}.json", path.doc_id)))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    fn backend_tag(&self) -> &'static str {
        "fs"
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError> {
        let file = self.file_path(path)?;
        let content = match fs::read_to_string(&file).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn put(&self, path: &DocumentPath, data: &Value) -> Result<(), StoreError> {
        let file = self.file_path(path)?;
        if let Some(dir) = file.parent() {
            fs::create_dir_all(dir).await?;
        }

        // Write to a sibling file first so readers never see a partial document
        let tmp = file.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(data)?).await?;
        fs::rename(&tmp, &file).await?;

        debug!(%path, file = %file.display(), "document written (fs)");
        Ok(())
    }
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<DocumentPath, Value>>,
    /// When set, every call fails with this message.
    pub fail_with: Option<String>,
}

impl MemoryDocumentStore {
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            fail_with: Some(message.into()),
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        match &self.fail_with {
            Some(message) => Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                message.clone(),
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError> {
        self.check()?;
        Ok(self.documents.lock().await.get(path).cloned())
    }

    async fn put(&self, path: &DocumentPath, data: &Value) -> Result<(), StoreError> {
        self.check()?;
        self.documents
            .lock()
            .await
            .insert(path.clone(), data.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fs_store_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path().to_path_buf());
        let path = DocumentPath::dashboard(DashboardDocument::Main);

        assert_eq!(store.get(&path).await.unwrap(), None);

        store.put(&path, &json!({ "summary": { "total_units": 3 } })).await.unwrap();
        let data = store.get(&path).await.unwrap().unwrap();
        assert_eq!(data["summary"]["total_units"], 3);
        assert!(dir.path().join("dashboards/main.json").exists());
    }

    #[tokio::test]
    async fn test_fs_store_put_replaces_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path().to_path_buf());
        let path = DocumentPath::dashboard(DashboardDocument::PhoneCases);

        store.put(&path, &json!({ "a": 1, "b": 2 })).await.unwrap();
        store.put(&path, &json!({ "c": 3 })).await.unwrap();

        assert_eq!(store.get(&path).await.unwrap(), Some(json!({ "c": 3 })));
    }

    #[tokio::test]
    async fn test_fs_store_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path().to_path_buf());
        let path = DocumentPath::new("dashboards", "../secrets");

        assert!(matches!(store.get(&path).await, Err(StoreError::Config(_))));
        assert!(matches!(store.put(&path, &json!({})).await, Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_fs_store_corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("dashboards")).unwrap();
        std::fs::write(dir.path().join("dashboards/main.json"), "{oops").unwrap();

        let store = FsDocumentStore::new(dir.path().to_path_buf());
        let result = store.get(&DocumentPath::dashboard(DashboardDocument::Main)).await;
        assert!(matches!(result, Err(StoreError::Codec(_))));
    }

    #[tokio::test]
    async fn test_fetch_document_not_found() {
        let store = MemoryDocumentStore::default();
        let err = fetch_document(&store, DashboardDocument::Main).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
        assert_eq!(err.to_string(), "document dashboards/main not found");
    }

    #[tokio::test]
    async fn test_fetch_document_store_failure() {
        let store = MemoryDocumentStore::failing("connection reset");
        let err = fetch_document(&store, DashboardDocument::PhoneCases).await.unwrap_err();
        assert!(matches!(err, FetchError::Store(_)));
    }

    #[tokio::test]
    async fn test_fetch_document_found() {
        let store = MemoryDocumentStore::default();
        let path = DocumentPath::dashboard(DashboardDocument::PhoneCases);
        store.put(&path, &json!({ "summary": {} })).await.unwrap();

        let data = fetch_document(&store, DashboardDocument::PhoneCases).await.unwrap();
        assert_eq!(data, json!({ "summary": {} }));
        // The other document is independent.
        assert!(fetch_document(&store, DashboardDocument::Main).await.is_err());
    }

    #[test]
    fn test_document_path_display() {
        let path = DocumentPath::dashboard(DashboardDocument::PhoneCases);
        assert_eq!(path.to_string(), "dashboards/phone-cases");
    }
}
