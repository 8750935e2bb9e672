//! Integration tests for the protocol module
//!
//! These tests verify request/response serialization, ID generation, and
//! the wire shape of the typed payloads.

#[cfg(test)]
mod tests {
    use super::super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_request_creation() {
        let req = Request::new("get", json!({"filename": "movie", "chunk": 0}));
        assert_eq!(req.method, "get");
        assert_eq!(req.args, json!({"filename": "movie", "chunk": 0}));
    }

    #[test]
    fn test_request_id_uniqueness() {
        let ids: HashSet<_> = (0..1000)
            .map(|_| Request::new("ping", json!({})).id)
            .collect();
        assert_eq!(ids.len(), 1000, "All request IDs should be unique");
    }

    #[test]
    fn test_response_success() {
        let resp = Response::success(123, json!({"data": "movie:0"}));
        assert!(resp.success);
        assert_eq!(resp.id, 123);
        assert_eq!(resp.result, Some(json!({"data": "movie:0"})));
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_response_error() {
        let resp = Response::error(456, "Unknown peer: leaf-3");
        assert!(!resp.success);
        assert_eq!(resp.id, 456);
        assert_eq!(resp.error, Some("Unknown peer: leaf-3".to_string()));
        assert!(resp.result.is_none());
    }

    #[test]
    fn test_request_serialization_roundtrip() {
        let req = Request::new("query", json!({"filename": "movie", "chunk": 7}));
        let serialized = serde_json::to_value(&req).unwrap();
        let deserialized: Request = serde_json::from_value(serialized).unwrap();
        assert_eq!(req, deserialized);
    }

    #[test]
    fn test_report_action_wire_names() {
        // Reports use the uppercase action names on the wire.
        let report = Report {
            from: "leaf-1".to_string(),
            action: ReportAction::Added,
            filename: "movie".to_string(),
            chunk: 3,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["action"], json!("ADDED"));

        let deleted: Report = serde_json::from_value(json!({
            "from": "leaf-1",
            "action": "DELETED",
            "filename": "movie",
            "chunk": 3,
        }))
        .unwrap();
        assert_eq!(deleted.action, ReportAction::Deleted);
    }

    #[test]
    fn test_unknown_report_action_rejected() {
        let result: std::result::Result<Report, _> = serde_json::from_value(json!({
            "from": "leaf-1",
            "action": "TRUNCATED",
            "filename": "movie",
            "chunk": 3,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_get_args_defaults() {
        // A bare peer fetch omits from_child and stream_id.
        let args: GetArgs =
            serde_json::from_value(json!({"filename": "movie", "chunk": 0})).unwrap();
        assert!(!args.from_child);
        assert!(args.stream_id.is_none());
    }

    #[test]
    fn test_register_args_chunk_list_optional() {
        let args: RegisterArgs =
            serde_json::from_value(json!({"name": "leaf-1", "address": "127.0.0.1:9001"}))
                .unwrap();
        assert!(args.chunks.is_empty());
    }

    #[test]
    fn test_get_reply_empty_data_roundtrip() {
        let reply = GetReply {
            data: None,
            stream_id: Some("stream-1".to_string()),
        };
        let value = serde_json::to_value(&reply).unwrap();
        let back: GetReply = serde_json::from_value(value).unwrap();
        assert_eq!(reply, back);
    }
}
