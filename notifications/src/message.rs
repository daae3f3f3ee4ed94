use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A notification as delivered by the backend, on the stream or in a page.
///
/// Only `id` and `read` drive delivery state. Everything else the server sends
/// (title, message, type, createdAt, userId, ...) is kept in `details` and
/// handed to the presentation layer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub read: bool,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Notification {
    pub fn new(id: impl Into<String>, read: bool) -> Self {
        Self {
            id: id.into(),
            read,
            details: Map::new(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.details.get("title").and_then(Value::as_str)
    }
}

/// Page of notifications, most recent first, as returned by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub content: Vec<Notification>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_keeps_unknown_fields() {
        let raw = json!({
            "id": "n1",
            "read": false,
            "title": "Your idea was approved",
            "type": "IDEA_STATUS",
            "createdAt": "2025-03-01T10:00:00Z",
            "userId": 42
        });

        let notification: Notification = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(notification.id, "n1");
        assert!(!notification.read);
        assert_eq!(notification.title(), Some("Your idea was approved"));
        assert_eq!(notification.details.get("userId"), Some(&json!(42)));

        assert_eq!(serde_json::to_value(&notification).unwrap(), raw);
    }

    #[test]
    fn test_notification_read_defaults_to_false() {
        let notification: Notification = serde_json::from_str(r#"{"id":"n2"}"#).unwrap();
        assert!(!notification.read);
        assert!(notification.details.is_empty());
    }

    #[test]
    fn test_notification_without_id_is_rejected() {
        assert!(serde_json::from_str::<Notification>(r#"{"read":true}"#).is_err());
    }

    #[test]
    fn test_page_parses_spring_layout() {
        let raw = json!({
            "content": [{"id": "a", "read": true}, {"id": "b", "read": false}],
            "totalElements": 12,
            "totalPages": 3,
            "number": 0,
            "size": 5,
            "pageable": {"pageNumber": 0}
        });

        let page: Page = serde_json::from_value(raw).unwrap();
        assert_eq!(page.content.len(), 2);
        assert_eq!(page.content[1].id, "b");
        assert_eq!(page.total_elements, 12);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_page_metadata_is_optional() {
        let page: Page = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert_eq!(page, Page::default());
    }
}
