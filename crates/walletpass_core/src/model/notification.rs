//! Propagation ledger records.

use crate::model::instance::ObjectId;
use crate::model::template::ClassId;
use serde::{Deserialize, Serialize};

/// Outcome of one push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Ledger row as stored. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub class_id: ClassId,
    pub object_id: ObjectId,
    pub status: NotificationStatus,
    pub message: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Ledger row to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub class_id: ClassId,
    pub object_id: ObjectId,
    pub status: NotificationStatus,
    pub message: String,
}

impl NewNotification {
    pub fn sent(class_id: &str, object_id: &str, message: impl Into<String>) -> Self {
        Self {
            class_id: class_id.to_string(),
            object_id: object_id.to_string(),
            status: NotificationStatus::Sent,
            message: message.into(),
        }
    }

    pub fn failed(class_id: &str, object_id: &str, message: impl Into<String>) -> Self {
        Self {
            class_id: class_id.to_string(),
            object_id: object_id.to_string(),
            status: NotificationStatus::Failed,
            message: message.into(),
        }
    }
}
