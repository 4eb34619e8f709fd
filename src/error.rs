use thiserror::Error;

/// GatewayError はメッセージングゲートウェイの操作に関するエラーを表す。
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("stream context error: {0}")]
    StreamContextError(String),

    #[error("publish error: {0}")]
    PublishError(String),

    #[error("subscription error: {0}")]
    SubscriptionError(String),

    #[error("fetch error: {0}")]
    FetchError(String),

    #[error("not connected")]
    NotConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = GatewayError::ConnectionError("broker unreachable".to_string());
        assert!(err.to_string().contains("broker unreachable"));
    }

    #[test]
    fn test_publish_error_display() {
        let err = GatewayError::PublishError("no responders".to_string());
        assert_eq!(err.to_string(), "publish error: no responders");
    }

    #[test]
    fn test_not_connected_display() {
        let err = GatewayError::NotConnected;
        assert_eq!(err.to_string(), "not connected");
    }
}
