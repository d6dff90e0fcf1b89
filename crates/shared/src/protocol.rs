use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CardId, ColumnId, ProcessId};

/// Every endpoint answers with this envelope; `data` and `error` are
/// mutually exclusive in practice but both optional on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Board actions posted to `/actions`, dispatched on the `action` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BoardAction {
    #[serde(rename_all = "camelCase")]
    MoveCard { card_id: CardId, column_id: ColumnId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub title: String,
    pub column_id: ColumnId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub process_ids: Vec<ProcessId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_per_robot: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_to_make: Option<u32>,
}

/// Partial update for `PATCH /cards/{id}`; absent fields are left
/// untouched. Clearing the assignee goes through `/cards/{id}/assign`,
/// which accepts an explicit null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<ColumnId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_ids: Option<Vec<ProcessId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_per_robot: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_to_make: Option<u32>,
}

impl CardPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.column_id.is_none()
            && self.assignee.is_none()
            && self.machine.is_none()
            && self.due_date.is_none()
            && self.process_ids.is_none()
            && self.quantity_per_robot.is_none()
            && self.quantity_to_make.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub assignee: Option<String>,
}
