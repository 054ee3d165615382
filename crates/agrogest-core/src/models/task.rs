//! Task model

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::id::{entity_id, string_enum};
use super::{Collection, Entity, IndexValue};

entity_id!(
    /// A unique identifier for a task
    TaskId
);

string_enum!(
    /// Kind of field work a task schedules
    TaskType {
        Planting => "planting",
        Irrigation => "irrigation",
        Spraying => "spraying",
        Harvest => "harvest",
    }
);

string_enum!(
    /// Task progress. The UI only moves forward; the store accepts any value.
    TaskStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
    }
);

/// A scheduled piece of farm work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub task_type: TaskType,
    /// Label of the field the work happens on
    pub field: String,
    pub scheduled_date: NaiveDate,
    /// Time of day as `HH:MM`
    pub scheduled_time: String,
    pub status: TaskStatus,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    pub owner_id: String,
}

/// Caller-supplied fields for a new task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub field: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub status: TaskStatus,
    pub owner_id: String,
}

/// Partial update merged into an existing task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<TaskType>,
    pub field: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<String>,
    pub status: Option<TaskStatus>,
}

impl NewTask {
    /// Validate and stamp the task with a fresh id and timestamps.
    pub fn into_task(self) -> Result<Task> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidInput("task title cannot be empty".into()));
        }
        let scheduled_time = normalize_time(&self.scheduled_time)?;

        let now = chrono::Utc::now().timestamp_millis();
        Ok(Task {
            id: TaskId::new(),
            title,
            description: crate::util::normalize_text_option(self.description),
            task_type: self.task_type,
            field: self.field.trim().to_string(),
            scheduled_date: self.scheduled_date,
            scheduled_time,
            status: self.status,
            created_at: now,
            updated_at: now,
            owner_id: self.owner_id,
        })
    }
}

impl TaskPatch {
    /// Status-only patch
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// True when the patch would change nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.task_type.is_none()
            && self.field.is_none()
            && self.scheduled_date.is_none()
            && self.scheduled_time.is_none()
            && self.status.is_none()
    }
}

impl Task {
    /// Return a copy with the patch applied and `updated_at` bumped.
    pub fn patched(&self, patch: TaskPatch) -> Result<Self> {
        let mut task = self.clone();
        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(Error::InvalidInput("task title cannot be empty".into()));
            }
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = crate::util::normalize_text_option(Some(description));
        }
        if let Some(task_type) = patch.task_type {
            task.task_type = task_type;
        }
        if let Some(field) = patch.field {
            task.field = field.trim().to_string();
        }
        if let Some(date) = patch.scheduled_date {
            task.scheduled_date = date;
        }
        if let Some(time) = patch.scheduled_time {
            task.scheduled_time = normalize_time(&time)?;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        task.updated_at = crate::util::next_timestamp(self.updated_at);
        Ok(task)
    }

    /// Whether the task falls on the given calendar day, whatever the time.
    #[must_use]
    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        self.scheduled_date == date
    }
}

impl Entity for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn key(&self) -> String {
        self.id.as_str()
    }

    fn owner(&self) -> &str {
        &self.owner_id
    }

    fn index_values(&self) -> Vec<IndexValue> {
        vec![
            IndexValue::Text(self.status.as_str().to_string()),
            IndexValue::Text(self.scheduled_date.to_string()),
            IndexValue::Text(self.field.clone()),
        ]
    }
}

fn normalize_time(raw: &str) -> Result<String> {
    let parsed = NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| Error::InvalidInput(format!("time must be HH:MM, got '{raw}'")))?;
    Ok(parsed.format("%H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewTask {
        NewTask {
            title: "  Rega do Campo A ".to_string(),
            description: Some("Rega matinal".to_string()),
            task_type: TaskType::Irrigation,
            field: "Campo A - Milho".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            scheduled_time: "7:00".to_string(),
            status: TaskStatus::Pending,
            owner_id: "user-1".to_string(),
        }
    }

    #[test]
    fn test_into_task_stamps_fields() {
        let task = sample().into_task().unwrap();
        assert_eq!(task.title, "Rega do Campo A");
        assert_eq!(task.scheduled_time, "07:00");
        assert_eq!(task.created_at, task.updated_at);
        assert!(task.created_at > 0);
    }

    #[test]
    fn test_into_task_rejects_bad_time() {
        let mut new_task = sample();
        new_task.scheduled_time = "late".to_string();
        assert!(matches!(new_task.into_task(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_into_task_rejects_empty_title() {
        let mut new_task = sample();
        new_task.title = "   ".to_string();
        assert!(new_task.into_task().is_err());
    }

    #[test]
    fn test_patched_bumps_updated_at() {
        let task = sample().into_task().unwrap();
        let patched = task.patched(TaskPatch::status(TaskStatus::Completed)).unwrap();
        assert_eq!(patched.status, TaskStatus::Completed);
        assert!(patched.updated_at > task.updated_at);
        assert_eq!(patched.created_at, task.created_at);
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!(
            "in_progress".parse::<TaskStatus>().unwrap(),
            TaskStatus::InProgress
        );
        assert_eq!(TaskType::Spraying.to_string(), "spraying");
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case_strings() {
        let json = serde_json::to_value(TaskStatus::InProgress).unwrap();
        assert_eq!(json, serde_json::json!("in_progress"));
    }
}
