//! Integration tests for the transport layer
//!
//! These tests verify codec behavior and a full request/response exchange
//! against a live in-process server.

#[cfg(test)]
mod tests {
    use crate::protocol::{Request, Response};
    use crate::transport::{JsonCodec, TcpServer, TcpTransport};
    use serde_json::json;

    #[test]
    fn test_encode_decode_request() {
        let original = Request::new("get", json!({"filename": "movie", "chunk": 42}));

        let encoded = JsonCodec::encode_request(&original).unwrap();
        assert!(!encoded.is_empty());

        let decoded = JsonCodec::decode_request(&encoded).unwrap();
        assert_eq!(original.method, decoded.method);
        assert_eq!(original.args, decoded.args);
        assert_eq!(original.id, decoded.id);
    }

    #[test]
    fn test_encode_decode_response() {
        let original = Response::success(123, json!({"data": "movie:42"}));

        let encoded = JsonCodec::encode_response(&original).unwrap();
        let decoded = JsonCodec::decode_response(&encoded).unwrap();

        assert_eq!(original.id, decoded.id);
        assert_eq!(original.success, decoded.success);
        assert_eq!(original.result, decoded.result);
    }

    #[test]
    fn test_invalid_request_data_returns_error() {
        let invalid_data = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result = JsonCodec::decode_request(&invalid_data);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_request_response_over_tcp() {
        let server = TcpServer::new("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = server
                .run_with_handler(|req: Request| async move {
                    Ok(Response::success(req.id, json!({"echo": req.method})))
                })
                .await;
        });

        let transport = TcpTransport::new().unwrap();
        let mut stream = transport.connect(&addr.to_string()).await.unwrap();

        let request = Request::new("ping", json!({}));
        let response = transport.send_request(&mut stream, &request).await.unwrap();

        assert!(response.success);
        assert_eq!(response.id, request.id);
        assert_eq!(response.result, Some(json!({"echo": "ping"})));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_error_response() {
        use crate::protocol::error::ChunkcastError;

        let server = TcpServer::new("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = server
                .run_with_handler(|_req: Request| async move {
                    Err(ChunkcastError::UnknownPeer("leaf-3".to_string()))
                })
                .await;
        });

        let transport = TcpTransport::new().unwrap();
        let mut stream = transport.connect(&addr.to_string()).await.unwrap();

        let request = Request::new("report", json!({}));
        let response = transport.send_request(&mut stream, &request).await.unwrap();

        assert!(!response.success);
        assert!(response.error.unwrap().contains("leaf-3"));

        // Connection stays usable after a handler error (keep-alive).
        let request = Request::new("report", json!({}));
        let response = transport.send_request(&mut stream, &request).await.unwrap();
        assert!(!response.success);
    }
}
