use crate::errors::AutomationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Lifecycle of one automation process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Pending,
    Running,
    Partial,
    Completed,
    Failed,
}

impl ProcessStatus {
    /// Terminal states are absorbing: no further mutation is accepted.
    /// `Partial` stays open for a compensating upgrade outside this core.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessStatus::Completed | ProcessStatus::Failed)
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessStatus::Pending => "pending",
            ProcessStatus::Running => "running",
            ProcessStatus::Partial => "partial",
            ProcessStatus::Completed => "completed",
            ProcessStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Who the run is acting for. Secrets are deliberately absent; the record
/// is externally readable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectIdentity {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// The persisted state of one pipeline run, keyed by process id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: String,
    pub subject: SubjectIdentity,
    pub stage: String,
    pub progress: u8,
    pub status: ProcessStatus,
    pub log: Vec<LogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessRecord {
    pub fn new(id: impl Into<String>, subject: SubjectIdentity) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            subject,
            stage: String::new(),
            progress: 0,
            status: ProcessStatus::Pending,
            log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Storage interface the controller persists through.
///
/// Implementations must accept concurrent, independent upserts keyed by
/// process id (no cross-process transactions), keep progress monotonic,
/// and refuse mutation once a record is terminal. The collaborator that
/// hosts the real store owns its schema; this crate ships
/// [`MemoryStore`] as the reference implementation.
#[async_trait::async_trait]
pub trait ProcessStore: Send + Sync {
    /// Create the record for a new run. Fails if the id already exists.
    async fn create(&self, record: ProcessRecord) -> Result<(), AutomationError>;

    /// Upsert status/stage/progress for one process.
    async fn update_status(
        &self,
        id: &str,
        status: ProcessStatus,
        stage: &str,
        progress: u8,
    ) -> Result<(), AutomationError>;

    /// Append one log entry. Append-only; entries are never rewritten.
    async fn append_log(&self, id: &str, message: &str) -> Result<(), AutomationError>;

    async fn get(&self, id: &str) -> Result<Option<ProcessRecord>, AutomationError>;
}

/// In-memory reference store. One mutex over the whole map is enough here:
/// upserts are tiny and runs touch disjoint keys.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, ProcessRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProcessStore for MemoryStore {
    async fn create(&self, record: ProcessRecord) -> Result<(), AutomationError> {
        let mut records = self.records.lock().expect("store poisoned");
        if records.contains_key(&record.id) {
            return Err(AutomationError::StoreError(format!(
                "process '{}' already exists",
                record.id
            )));
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: ProcessStatus,
        stage: &str,
        progress: u8,
    ) -> Result<(), AutomationError> {
        let mut records = self.records.lock().expect("store poisoned");
        let record = records
            .get_mut(id)
            .ok_or_else(|| AutomationError::StoreError(format!("unknown process '{id}'")))?;

        if record.status.is_terminal() {
            debug!(%id, "ignoring update for terminal process");
            return Ok(());
        }

        record.status = status;
        record.stage = stage.to_string();
        // Progress never decreases within a process lifetime.
        record.progress = record.progress.max(progress);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn append_log(&self, id: &str, message: &str) -> Result<(), AutomationError> {
        let mut records = self.records.lock().expect("store poisoned");
        let record = records
            .get_mut(id)
            .ok_or_else(|| AutomationError::StoreError(format!("unknown process '{id}'")))?;
        if record.status.is_terminal() {
            debug!(%id, "ignoring log append for terminal process");
            return Ok(());
        }
        record.log.push(LogEntry {
            message: message.to_string(),
            timestamp: Utc::now(),
        });
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ProcessRecord>, AutomationError> {
        let records = self.records.lock().expect("store poisoned");
        Ok(records.get(id).cloned())
    }
}
