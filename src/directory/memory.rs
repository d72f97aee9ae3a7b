//! In-memory directory session
//!
//! Serves searches from a snapshot of entries held in memory, typically
//! loaded from a JSON file. It behaves like a small directory server for the
//! purposes of an export: scopes, filters, attribute selection, size and time
//! limits, and an optional administrative limit are all enforced lazily while
//! the cursor is advanced.
//!
//! Snapshot format:
//!
//! ```json
//! {
//!   "entries": [
//!     {
//!       "dn": "uid=jdoe,ou=People,dc=example,dc=com",
//!       "attributes": {
//!         "objectClass": ["top", "inetOrgPerson"],
//!         "jpegPhoto": [{ "base64": "/9j/4AAQ" }]
//!       }
//!     }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{DirectoryError, ExportError, Result, StatusCode};

use super::cursor::{DirectorySession, QuerySpec, ResultCursor, Scope};
use super::dn::Dn;
use super::entry::{AttributeValue, Entry, Value};
use super::filter::Filter;

#[derive(Debug, Deserialize)]
struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    dn: String,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotValue {
    Text(String),
    Binary { base64: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotValues {
    One(SnapshotValue),
    Many(Vec<SnapshotValue>),
}

/// A directory session answering searches from memory.
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    entries: Arc<Vec<Entry>>,
    admin_limit: Option<u32>,
    latency: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Open,
    Exhausted,
    Failed,
}

/// Cursor over a [`MemoryDirectory`] search.
pub struct MemoryCursor {
    entries: Arc<Vec<Entry>>,
    position: usize,
    base: Dn,
    scope: Scope,
    filter: Filter,
    attributes: Vec<String>,
    size_limit: u32,
    admin_limit: Option<u32>,
    deadline: Option<Instant>,
    latency: Option<Duration>,
    pending: Option<Entry>,
    returned: u32,
    state: CursorState,
}

impl MemoryDirectory {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries: Arc::new(entries),
            admin_limit: None,
            latency: None,
        }
    }

    /// Load a snapshot from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExportError::Snapshot(format!("Failed to read {}: {e}", path.display()))
        })?;
        let directory = Self::from_json(&content)?;
        info!(
            "Loaded {} entries from snapshot {}",
            directory.len(),
            path.display()
        );
        Ok(directory)
    }

    /// Parse a snapshot from its JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(content)
            .map_err(|e| ExportError::Snapshot(format!("Invalid snapshot: {e}")))?;

        let mut entries = Vec::with_capacity(snapshot.entries.len());
        for raw in snapshot.entries {
            let dn = Dn::parse(&raw.dn).map_err(|e| ExportError::Snapshot(e.to_string()))?;
            let mut entry = Entry::new(dn);
            for (name, values) in raw.attributes {
                let values: SnapshotValues = serde_json::from_value(values).map_err(|e| {
                    ExportError::Snapshot(format!("Invalid values for '{name}' in {}: {e}", raw.dn))
                })?;
                let values = match values {
                    SnapshotValues::One(v) => vec![v],
                    SnapshotValues::Many(v) => v,
                };
                for value in values {
                    let value = match value {
                        SnapshotValue::Text(s) => Value::Text(s),
                        SnapshotValue::Binary { base64 } => {
                            Value::Binary(STANDARD.decode(base64.trim()).map_err(|e| {
                                ExportError::Snapshot(format!(
                                    "Invalid base64 for '{name}' in {}: {e}",
                                    raw.dn
                                ))
                            })?)
                        }
                    };
                    entry.push(AttributeValue::new(name.clone(), value));
                }
            }
            entries.push(entry);
        }

        Ok(Self::new(entries))
    }

    /// Simulate a server-side administrative limit on returned entries.
    pub fn with_admin_limit(mut self, limit: u32) -> Self {
        self.admin_limit = Some(limit);
        self
    }

    /// Delay every fetch, as a remote server would.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The closest existing ancestor of `dn`, reported as matched DN when the
    /// search base does not exist.
    fn matched_dn(&self, dn: &Dn) -> Option<String> {
        let mut candidate = dn.parent();
        while let Some(current) = candidate {
            if current.is_root() {
                return None;
            }
            if self.entries.iter().any(|e| e.dn() == &current) {
                return Some(current.to_string());
            }
            candidate = current.parent();
        }
        None
    }
}

#[async_trait]
impl DirectorySession for MemoryDirectory {
    async fn search(
        &self,
        query: &QuerySpec,
    ) -> std::result::Result<Box<dyn ResultCursor>, DirectoryError> {
        let filter = Filter::parse(&query.filter).map_err(|e| {
            DirectoryError::new(StatusCode::ProtocolError, format!("Invalid filter: {e}"))
        })?;
        let base = Dn::parse(&query.base)?;

        if !base.is_root() && !self.entries.iter().any(|e| e.dn() == &base) {
            let err =
                DirectoryError::new(StatusCode::NoSuchObject, format!("No such object: {base}"));
            return Err(match self.matched_dn(&base) {
                Some(matched) => err.with_matched_dn(matched),
                None => err,
            });
        }

        debug!(
            "Search base='{}' scope={} filter='{}' size_limit={} time_limit={}",
            query.base, query.scope, query.filter, query.size_limit, query.time_limit
        );

        let deadline = (query.time_limit > 0)
            .then(|| Instant::now() + Duration::from_secs(u64::from(query.time_limit)));

        Ok(Box::new(MemoryCursor {
            entries: Arc::clone(&self.entries),
            position: 0,
            base,
            scope: query.scope,
            filter,
            attributes: query.returning_attributes.clone(),
            size_limit: query.size_limit,
            admin_limit: self.admin_limit,
            deadline,
            latency: self.latency,
            pending: None,
            returned: 0,
            state: CursorState::Open,
        }))
    }
}

impl MemoryCursor {
    fn in_scope(&self, entry: &Entry) -> bool {
        match self.scope {
            Scope::Base => entry.dn() == &self.base,
            Scope::OneLevel => entry.dn().is_child_of(&self.base),
            Scope::Subtree => entry.dn().is_within(&self.base),
        }
    }

    fn fail(&mut self, err: DirectoryError) -> DirectoryError {
        self.state = CursorState::Failed;
        self.pending = None;
        err
    }

    fn next_match(&mut self) -> Option<Entry> {
        while self.position < self.entries.len() {
            let entry = &self.entries[self.position];
            self.position += 1;
            if self.in_scope(entry) && self.filter.matches(entry) {
                let mut entry = entry.clone();
                entry.project(&self.attributes);
                return Some(entry);
            }
        }
        None
    }
}

#[async_trait]
impl ResultCursor for MemoryCursor {
    async fn has_next(&mut self) -> std::result::Result<bool, DirectoryError> {
        match self.state {
            CursorState::Exhausted => return Ok(false),
            CursorState::Failed => {
                return Err(DirectoryError::without_status(
                    "Cursor already failed; run a new search",
                ));
            }
            CursorState::Open => {}
        }
        if self.pending.is_some() {
            return Ok(true);
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(self.fail(DirectoryError::new(
                StatusCode::TimeLimitExceeded,
                "Time limit exceeded",
            )));
        }

        let Some(entry) = self.next_match() else {
            debug!("Memory cursor exhausted after {} entries", self.returned);
            self.state = CursorState::Exhausted;
            return Ok(false);
        };

        if self.size_limit > 0 && self.returned >= self.size_limit {
            return Err(self.fail(DirectoryError::new(
                StatusCode::SizeLimitExceeded,
                "Size limit exceeded",
            )));
        }
        if self.admin_limit.is_some_and(|limit| self.returned >= limit) {
            return Err(self.fail(DirectoryError::new(
                StatusCode::AdminLimitExceeded,
                "Administrative limit exceeded",
            )));
        }

        self.pending = Some(entry);
        Ok(true)
    }

    async fn next(&mut self) -> std::result::Result<Entry, DirectoryError> {
        if self.pending.is_none() && !self.has_next().await? {
            return Err(DirectoryError::without_status("No more entries in cursor"));
        }
        let entry = self
            .pending
            .take()
            .ok_or_else(|| DirectoryError::without_status("No more entries in cursor"))?;
        self.returned += 1;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "entries": [
            { "dn": "dc=example,dc=com",
              "attributes": { "objectClass": ["top", "domain"], "dc": "example" } },
            { "dn": "ou=People,dc=example,dc=com",
              "attributes": { "objectClass": ["organizationalUnit"], "ou": ["People"] } },
            { "dn": "uid=alice,ou=People,dc=example,dc=com",
              "attributes": { "objectClass": ["person"], "uid": ["alice"], "cn": ["Alice"],
                              "jpegPhoto": [{ "base64": "AAEC" }] } },
            { "dn": "uid=bob,ou=People,dc=example,dc=com",
              "attributes": { "objectClass": ["person"], "uid": ["bob"], "cn": ["Bob"] } },
            { "dn": "uid=carol,ou=People,dc=example,dc=com",
              "attributes": { "objectClass": ["person"], "uid": ["carol"], "cn": ["Carol"] } }
        ]
    }"#;

    fn directory() -> MemoryDirectory {
        MemoryDirectory::from_json(SNAPSHOT).unwrap()
    }

    async fn drain(cursor: &mut Box<dyn ResultCursor>) -> (Vec<String>, Option<DirectoryError>) {
        let mut dns = Vec::new();
        loop {
            match cursor.has_next().await {
                Ok(true) => dns.push(cursor.next().await.unwrap().dn().to_string()),
                Ok(false) => return (dns, None),
                Err(e) => return (dns, Some(e)),
            }
        }
    }

    #[test]
    fn test_snapshot_loading() {
        let dir = directory();
        assert_eq!(dir.len(), 5);
        let alice = &dir.entries[2];
        let photo: Vec<_> = alice.values("jpegPhoto").collect();
        assert_eq!(photo, vec![&Value::Binary(vec![0, 1, 2])]);
        assert!(MemoryDirectory::from_json(r#"{"entries":[{"dn":"bad"}]}"#).is_err());
        assert!(MemoryDirectory::from_json("not json").is_err());
    }

    #[tokio::test]
    async fn test_value_kind_is_kept_per_value() {
        let dir = MemoryDirectory::from_json(
            r#"{"entries": [{"dn": "cn=m", "attributes": {"x": ["plain", {"base64": "cGxhaW4="}]}}]}"#,
        )
        .unwrap();
        let mut cursor = dir.search(&QuerySpec::new("cn=m", "(x=plain)", Scope::Base)).await.unwrap();
        let entry = cursor.next().await.unwrap();

        let values: Vec<_> = entry.values("x").collect();
        assert_eq!(
            values,
            vec![&Value::Text("plain".to_string()), &Value::Binary(b"plain".to_vec())]
        );
    }

    #[tokio::test]
    async fn test_scopes() {
        let dir = directory();
        let base = "ou=People,dc=example,dc=com";

        let mut cursor = dir.search(&QuerySpec::new(base, "(objectClass=*)", Scope::Base)).await.unwrap();
        assert_eq!(drain(&mut cursor).await.0, vec![base.to_string()]);

        let mut cursor = dir
            .search(&QuerySpec::new("dc=example,dc=com", "(objectClass=*)", Scope::OneLevel))
            .await
            .unwrap();
        assert_eq!(drain(&mut cursor).await.0, vec![base.to_string()]);

        let mut cursor = dir
            .search(&QuerySpec::new("dc=example,dc=com", "(objectClass=person)", Scope::Subtree))
            .await
            .unwrap();
        assert_eq!(drain(&mut cursor).await.0.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_base_reports_matched_dn() {
        let dir = directory();
        let err = dir
            .search(&QuerySpec::new("ou=Groups,dc=example,dc=com", "(cn=*)", Scope::Subtree))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), Some(StatusCode::NoSuchObject));
        assert_eq!(err.matched_dn(), Some("dc=example,dc=com"));
    }

    #[tokio::test]
    async fn test_invalid_filter_is_protocol_error() {
        let err = directory()
            .search(&QuerySpec::new("", "(cn=", Scope::Subtree))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), Some(StatusCode::ProtocolError));
    }

    #[tokio::test]
    async fn test_size_limit_after_n_entries() {
        let query = QuerySpec::new("dc=example,dc=com", "(uid=*)", Scope::Subtree).with_size_limit(2);
        let mut cursor = directory().search(&query).await.unwrap();
        let (dns, err) = drain(&mut cursor).await;
        assert_eq!(dns.len(), 2);
        assert_eq!(err.unwrap().status(), Some(StatusCode::SizeLimitExceeded));
        // a failed cursor stays failed
        assert!(cursor.has_next().await.unwrap_err().status().is_none());
    }

    #[tokio::test]
    async fn test_size_limit_equal_to_result_count_is_not_an_error() {
        let query = QuerySpec::new("dc=example,dc=com", "(uid=*)", Scope::Subtree).with_size_limit(3);
        let mut cursor = directory().search(&query).await.unwrap();
        let (dns, err) = drain(&mut cursor).await;
        assert_eq!(dns.len(), 3);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_admin_limit() {
        let dir = directory().with_admin_limit(1);
        let mut cursor = dir
            .search(&QuerySpec::new("", "(objectClass=*)", Scope::Subtree))
            .await
            .unwrap();
        let (dns, err) = drain(&mut cursor).await;
        assert_eq!(dns.len(), 1);
        assert_eq!(err.unwrap().status(), Some(StatusCode::AdminLimitExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_limit() {
        let dir = directory().with_latency(Duration::from_millis(400));
        let query = QuerySpec::new("", "(objectClass=*)", Scope::Subtree).with_time_limit(1);
        let mut cursor = dir.search(&query).await.unwrap();
        let (dns, err) = drain(&mut cursor).await;
        assert_eq!(dns.len(), 2);
        assert_eq!(err.unwrap().status(), Some(StatusCode::TimeLimitExceeded));
    }

    #[tokio::test]
    async fn test_next_after_exhaustion_is_an_error() {
        let mut cursor = directory()
            .search(&QuerySpec::new("uid=bob,ou=People,dc=example,dc=com", "(objectClass=*)", Scope::Base))
            .await
            .unwrap();
        assert!(cursor.next().await.is_ok());
        assert!(!cursor.has_next().await.unwrap());
        assert!(cursor.next().await.is_err());
    }

    #[tokio::test]
    async fn test_returning_attributes() {
        let query = QuerySpec::new("uid=alice,ou=People,dc=example,dc=com", "(objectClass=*)", Scope::Base)
            .with_attributes(vec!["cn".to_string()]);
        let mut cursor = directory().search(&query).await.unwrap();
        let entry = cursor.next().await.unwrap();
        assert_eq!(entry.attribute_names(), vec!["cn"]);
    }
}
