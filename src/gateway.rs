use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::GatewayError;
use crate::message::{Message, MessageHandler};

/// MessageGateway はブローカーに対する発行・購読・プル取得のインターフェース。
///
/// 実装は接続済みブローカーセッションを所有し、shutdown 後の呼び出しは
/// すべて `GatewayError::NotConnected` で失敗する。
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// ペイロードを永続メッセージとして発行する。
    /// ブローカーが永続化を応答するまでブロックする。
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), GatewayError>;

    /// 名前付き durable コンシューマーを登録し、受信メッセージを
    /// ハンドラーへ非同期に配信する。ハンドラーは配信タスク上で
    /// 呼ばれるため、長時間ブロックすると配信が滞る。
    async fn subscribe(
        &self,
        consumer_name: &str,
        subject: &str,
        handler: MessageHandler,
    ) -> Result<(), GatewayError>;

    /// `stream_name` に対する一時プルコンシューマーを `start_time` 以降の
    /// 位置に作成し、バッチ上限・待機時間の範囲でメッセージを取得する。
    /// 返却されるメッセージはすべて ack 済み（consume-and-commit）。
    async fn pull_from_date(
        &self,
        start_time: DateTime<Utc>,
        stream_name: &str,
        subject: &str,
    ) -> Result<Vec<Message>, GatewayError>;

    /// 送信バッファをフラッシュして接続を閉じる。2 回目以降の呼び出しは
    /// 何もしない。以降の他操作は NotConnected で失敗する。
    async fn shutdown(&self);
}

/// NoOpGateway はテスト・スタブ用の何もしないゲートウェイ実装。
/// subscribe で登録したハンドラーが呼ばれることはない。
pub struct NoOpGateway;

#[async_trait]
impl MessageGateway for NoOpGateway {
    async fn publish(&self, _subject: &str, _payload: &[u8]) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn subscribe(
        &self,
        _consumer_name: &str,
        _subject: &str,
        _handler: MessageHandler,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn pull_from_date(
        &self,
        _start_time: DateTime<Utc>,
        _stream_name: &str,
        _subject: &str,
    ) -> Result<Vec<Message>, GatewayError> {
        Ok(Vec::new())
    }

    async fn shutdown(&self) {}
}
