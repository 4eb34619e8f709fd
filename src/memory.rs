use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::MessageGateway;
use crate::message::{Message, MessageHandler};

/// サブジェクトフィルターの一致判定（NATS 形式）。
/// `*` は 1 トークン、`>` は末尾の残り全部に一致する。
fn subject_matches(filter: &str, subject: &str) -> bool {
    let mut filter_tokens = filter.split('.');
    let mut subject_tokens = subject.split('.');
    loop {
        match (filter_tokens.next(), subject_tokens.next()) {
            (Some(">"), _) => return true,
            (Some("*"), Some(_)) => {}
            (Some(f), Some(s)) if f == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    subject: String,
    payload: Vec<u8>,
    timestamp: DateTime<Utc>,
}

struct Subscription {
    consumer_name: String,
    filter: String,
    handler: MessageHandler,
}

/// 接続中のブローカー状態。shutdown で破棄される。
struct BrokerState {
    /// 追記専用のメッセージログ
    log: Vec<StoredMessage>,
    /// ストリーム名 → バインドされたサブジェクトフィルター
    streams: HashMap<String, Vec<String>>,
    subscriptions: Vec<Subscription>,
    /// durable コンシューマー名 → 配信済みログ位置
    cursors: HashMap<String, usize>,
}

/// InMemoryGateway はブローカー契約のインメモリ実装。
/// テストおよびブローカー未接続環境でのスタブとして使用する。
///
/// サブジェクトフィルター付きストリーム・durable カーソル・
/// タイムスタンプによるプル開始位置を模倣する。ストリームは
/// `add_stream` で事前に宣言しておくこと（カバーされていない
/// サブジェクトへの publish / subscribe は実ブローカーと同様に失敗する）。
pub struct InMemoryGateway {
    config: GatewayConfig,
    state: RwLock<Option<BrokerState>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::new("mem://local"))
    }

    /// プル取得の上限などを指定して生成する。
    pub fn with_config(config: GatewayConfig) -> Self {
        Self {
            config,
            state: RwLock::new(Some(BrokerState {
                log: Vec::new(),
                streams: HashMap::new(),
                subscriptions: Vec::new(),
                cursors: HashMap::new(),
            })),
        }
    }

    /// ストリームを宣言し、サブジェクトフィルターをバインドする。
    pub async fn add_stream(
        &self,
        name: impl Into<String>,
        subjects: Vec<String>,
    ) -> Result<(), GatewayError> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(GatewayError::NotConnected)?;
        state.streams.insert(name.into(), subjects);
        Ok(())
    }

    /// タイムスタンプを指定して発行するテスト用ヘルパー。
    /// 日時起点のプル取得を決定的にテストするために使う。
    pub async fn publish_with_timestamp(
        &self,
        subject: &str,
        payload: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        // ハンドラー呼び出し中はロックを保持しない
        let (message, handlers) = {
            let mut guard = self.state.write().await;
            let state = guard.as_mut().ok_or(GatewayError::NotConnected)?;

            let covered = state
                .streams
                .values()
                .any(|filters| filters.iter().any(|f| subject_matches(f, subject)));
            if !covered {
                return Err(GatewayError::PublishError(format!(
                    "no stream bound to subject {subject}"
                )));
            }

            state.log.push(StoredMessage {
                subject: subject.to_string(),
                payload: payload.to_vec(),
                timestamp,
            });
            let position = state.log.len();

            let mut handlers = Vec::new();
            for sub in &state.subscriptions {
                if subject_matches(&sub.filter, subject) {
                    handlers.push(sub.handler.clone());
                    state.cursors.insert(sub.consumer_name.clone(), position);
                }
            }
            (Message::new(subject, payload.to_vec()), handlers)
        };

        for handler in handlers {
            handler(message.clone());
        }
        Ok(())
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageGateway for InMemoryGateway {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), GatewayError> {
        self.publish_with_timestamp(subject, payload, Utc::now())
            .await
    }

    async fn subscribe(
        &self,
        consumer_name: &str,
        subject: &str,
        handler: MessageHandler,
    ) -> Result<(), GatewayError> {
        // durable コンシューマー: カーソル以降のバックログを再生してから追従する
        let (backlog, replay_handler) = {
            let mut guard = self.state.write().await;
            let state = guard.as_mut().ok_or(GatewayError::NotConnected)?;

            let covered = state
                .streams
                .values()
                .any(|filters| filters.iter().any(|f| subject_matches(f, subject)));
            if !covered {
                return Err(GatewayError::SubscriptionError(format!(
                    "no stream bound to subject {subject}"
                )));
            }

            let start = state.cursors.get(consumer_name).copied().unwrap_or(0);
            let backlog: Vec<Message> = state.log[start..]
                .iter()
                .filter(|stored| subject_matches(subject, &stored.subject))
                .map(|stored| Message::new(stored.subject.clone(), stored.payload.clone()))
                .collect();

            state.cursors.insert(consumer_name.to_string(), state.log.len());
            // 同名 durable の再購読は既存登録を置き換える（コンシューマー名ごとに配信は 1 回）
            state
                .subscriptions
                .retain(|sub| sub.consumer_name != consumer_name);
            state.subscriptions.push(Subscription {
                consumer_name: consumer_name.to_string(),
                filter: subject.to_string(),
                handler: handler.clone(),
            });
            (backlog, handler)
        };

        for message in backlog {
            replay_handler(message);
        }
        Ok(())
    }

    async fn pull_from_date(
        &self,
        start_time: DateTime<Utc>,
        stream_name: &str,
        subject: &str,
    ) -> Result<Vec<Message>, GatewayError> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(GatewayError::NotConnected)?;

        let filters = state.streams.get(stream_name).ok_or_else(|| {
            GatewayError::FetchError(format!("stream not found: {stream_name}"))
        })?;

        let batch: Vec<Message> = state
            .log
            .iter()
            .filter(|stored| stored.timestamp >= start_time)
            .filter(|stored| filters.iter().any(|f| subject_matches(f, &stored.subject)))
            .filter(|stored| subject_matches(subject, &stored.subject))
            .take(self.config.pull_batch_size)
            .map(|stored| Message::new(stored.subject.clone(), stored.payload.clone()))
            .collect();

        Ok(batch)
    }

    async fn shutdown(&self) {
        let mut guard = self.state.write().await;
        *guard = None;
    }
}
