use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;

/// Task as it travels on the queue.
///
/// `id` and `arrived_at` are assigned by the publisher; callers only ever supply a
/// [`NewTask`]. Serialized as a JSON object with the fields `id`, `name`,
/// `description` and `arrivedAt` (ISO-8601 instant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    pub arrived_at: DateTime<Utc>,
}

impl Task {
    /// Encode the task as the string body of a queue message.
    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a queue message body back into a task.
    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

impl Display for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "Task(id={}, name={}, description={}, arrivedAt={})",
            self.id,
            self.name,
            self.description,
            self.arrived_at.to_rfc3339()
        )
    }
}

/// Client-supplied part of a task, as bound from the `POST /task` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NewTask {
    pub name: String,
    pub description: String,
}

impl NewTask {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Complete the task with its server-generated identity.
    pub fn complete(self, id: String, arrived_at: DateTime<Utc>) -> Task {
        Task {
            id,
            name: self.name,
            description: self.description,
            arrived_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Task {
        NewTask::new("backup", "nightly").complete(
            "3f1c2a9e-0000-4000-8000-000000000001".to_string(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        )
    }

    #[test]
    fn body_uses_wire_field_names() {
        let body = sample().to_body().unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 4);
        assert_eq!(obj["id"], "3f1c2a9e-0000-4000-8000-000000000001");
        assert_eq!(obj["name"], "backup");
        assert_eq!(obj["description"], "nightly");
        assert_eq!(obj["arrivedAt"], "2024-05-01T12:30:00Z");
    }

    #[test]
    fn body_decodes_iso_instant_with_fraction() {
        let body = r#"{"id":"a","name":"n","description":"d","arrivedAt":"2024-05-01T12:30:00.123456Z"}"#;
        let task = Task::from_body(body).unwrap();
        assert_eq!(task.name, "n");
        assert_eq!(task.arrived_at.timestamp_subsec_micros(), 123456);
    }

    #[test]
    fn body_missing_field_is_rejected() {
        let body = r#"{"id":"a","name":"n","arrivedAt":"2024-05-01T12:30:00Z"}"#;
        assert!(Task::from_body(body).is_err());
    }

    #[test]
    fn display_is_structural() {
        let rendered = sample().to_string();
        assert!(rendered.contains("name=backup"));
        assert!(rendered.contains("description=nightly"));
    }
}
