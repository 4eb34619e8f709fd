use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Message はゲートウェイがやり取りする唯一のメッセージ型。
/// ブローカー固有のメッセージ表現には依存しない（呼び出し側が
/// ブローカーライブラリの語彙を知らずに済むよう意図的に分離している）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// サブジェクト（例: "orders.created"）
    pub subject: String,
    /// ペイロードのバイト列
    pub payload: Vec<u8>,
}

impl Message {
    /// 新しい Message を生成する。
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
        }
    }

    /// JSON シリアライズしたペイロードで Message を生成する。
    pub fn json<T: Serialize>(
        subject: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            subject: subject.into(),
            payload: serde_json::to_vec(payload)?,
        })
    }

    /// ペイロードを JSON としてデシリアライズする。
    pub fn deserialize_json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// MessageHandler は subscribe で登録するメッセージハンドラー。
/// ブローカー側の配信タスクから呼ばれるため、呼び出し側コードと
/// 並行に実行されうる。必要な同期はハンドラー内部で行うこと。
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_new() {
        let msg = Message::new("orders.created", b"payload".to_vec());
        assert_eq!(msg.subject, "orders.created");
        assert_eq!(msg.payload, b"payload");
    }

    #[test]
    fn test_message_json() {
        let payload = serde_json::json!({"id": 1});
        let msg = Message::json("orders.created", &payload).unwrap();
        assert_eq!(msg.subject, "orders.created");
        assert!(!msg.payload.is_empty());
    }

    #[test]
    fn test_message_deserialize_json() {
        let payload = serde_json::json!({"id": 1, "status": "created"});
        let msg = Message::json("orders.created", &payload).unwrap();

        let parsed: serde_json::Value = msg.deserialize_json().unwrap();
        assert_eq!(parsed["id"], 1);
        assert_eq!(parsed["status"], "created");
    }

    #[test]
    fn test_payload_bytes_preserved() {
        let raw: Vec<u8> = vec![0x00, 0xff, 0x7f, 0x80, 0x01];
        let msg = Message::new("bin.subject", raw.clone());
        assert_eq!(msg.payload, raw);
    }
}
