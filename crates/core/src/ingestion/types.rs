//! Core ingestion data types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Item and Priority Types
// ============================================================================

/// Opaque identifier for one unit of work.
///
/// Clients may send integers or strings; both are kept as-is and echoed
/// back in status responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(id) => write!(f, "{}", id),
            ItemId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        ItemId::Int(id)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        ItemId::Text(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        ItemId::Text(id)
    }
}

/// Priority tier of a submission.
///
/// Dispatch order is by [`Priority::rank`], lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    #[serde(alias = "high")]
    High,
    #[default]
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "low")]
    Low,
}

impl Priority {
    /// Dispatch rank: High=0, Medium=1, Low=2.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

// ============================================================================
// Batch Types
// ============================================================================

/// Lifecycle status of a batch.
///
/// Transitions are monotonic: `NotStarted -> Triggered -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStatus {
    #[serde(rename = "yet_to_start", alias = "not_started")]
    NotStarted,
    #[serde(rename = "triggered")]
    Triggered,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl BatchStatus {
    /// Returns the status as a string for filtering and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::NotStarted => "yet_to_start",
            BatchStatus::Triggered => "triggered",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }

    /// Whether `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::NotStarted, BatchStatus::Triggered)
                | (BatchStatus::Triggered, BatchStatus::Completed)
                | (BatchStatus::Triggered, BatchStatus::Failed)
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed-size group of items processed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub ids: Vec<ItemId>,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure description, set only when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Batch {
    /// Create a not-yet-started batch with a fresh id.
    pub fn new(ids: Vec<ItemId>) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            ids,
            status: BatchStatus::NotStarted,
            triggered_at: None,
            completed_at: None,
            error: None,
        }
    }
}

/// Status change applied to a batch by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchUpdate {
    Triggered,
    Completed,
    Failed { error: String },
}

impl BatchUpdate {
    /// The status this update moves the batch into.
    pub fn target_status(&self) -> BatchStatus {
        match self {
            BatchUpdate::Triggered => BatchStatus::Triggered,
            BatchUpdate::Completed => BatchStatus::Completed,
            BatchUpdate::Failed { .. } => BatchStatus::Failed,
        }
    }
}

// ============================================================================
// Ingestion Types
// ============================================================================

/// A client submission and the batches it was split into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingestion {
    pub id: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    /// Batches in submission order.
    pub batches: Vec<Batch>,
}

impl Ingestion {
    /// Aggregate status derived from the current batch statuses.
    pub fn status(&self) -> BatchStatus {
        overall_status(self.batches.iter().map(|b| b.status))
    }
}

/// Derive the overall status of an ingestion from its batch statuses.
///
/// - all batches `Completed` (or no batches at all): `Completed`
/// - all batches terminal, at least one `Failed`: `Failed`
/// - any batch `Triggered`: `Triggered`
/// - otherwise: `NotStarted`
pub fn overall_status<I>(statuses: I) -> BatchStatus
where
    I: IntoIterator<Item = BatchStatus>,
{
    let mut all_completed = true;
    let mut all_terminal = true;
    let mut any_triggered = false;

    for status in statuses {
        all_completed &= status == BatchStatus::Completed;
        all_terminal &= status.is_terminal();
        any_triggered |= status == BatchStatus::Triggered;
    }

    if all_completed {
        BatchStatus::Completed
    } else if all_terminal {
        BatchStatus::Failed
    } else if any_triggered {
        BatchStatus::Triggered
    } else {
        BatchStatus::NotStarted
    }
}

/// Request to create a new ingestion.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub ids: Vec<ItemId>,
    pub priority: Priority,
}

/// Snapshot returned by a status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionStatus {
    pub ingestion_id: String,
    pub status: BatchStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub batches: Vec<Batch>,
}

impl From<Ingestion> for IngestionStatus {
    fn from(ingestion: Ingestion) -> Self {
        Self {
            status: ingestion.status(),
            ingestion_id: ingestion.id,
            priority: ingestion.priority,
            created_at: ingestion.created_at,
            batches: ingestion.batches,
        }
    }
}

/// Number of batches in each status across the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub not_started: usize,
    pub triggered: usize,
    pub completed: usize,
    pub failed: usize,
}

impl BatchCounts {
    pub fn record(&mut self, status: BatchStatus) {
        match status {
            BatchStatus::NotStarted => self.not_started += 1,
            BatchStatus::Triggered => self.triggered += 1,
            BatchStatus::Completed => self.completed += 1,
            BatchStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.not_started + self.triggered + self.completed + self.failed
    }
}
