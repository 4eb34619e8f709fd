//! NatsGateway: async-nats を使用した MessageGateway 実装。
//! feature = "nats" で有効化される。

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_nats::jetstream::consumer::{pull, push, DeliverPolicy};
use async_nats::jetstream::{self, Context};
use async_nats::{Client, ConnectOptions, HeaderMap};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::MessageGateway;
use crate::message::{Message, MessageHandler};

/// 接続とストリームコンテキストの組。両方有効か、shutdown 後に両方破棄されるかの
/// いずれかで、片方だけが生きている状態は外部から観測されない。
#[derive(Clone)]
struct Handles {
    client: Client,
    jetstream: Context,
}

/// NatsGateway は NATS JetStream をブローカーとする本番用ゲートウェイ。
/// 再接続・配信スケジューリングはすべて async-nats 側に委譲する。
pub struct NatsGateway {
    config: GatewayConfig,
    handles: RwLock<Option<Handles>>,
}

impl NatsGateway {
    /// ブローカーへ接続し、JetStream コンテキストを取得する。
    /// TLS 設定がある場合はクライアント証明書と資格情報を使用する。
    /// コンテキストが使用不能な場合は接続を閉じてからエラーを返す。
    pub async fn connect(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = match &config.tls {
            Some(tls) => {
                ConnectOptions::new()
                    .require_tls(true)
                    .add_client_certificate(
                        PathBuf::from(&tls.cert_path),
                        PathBuf::from(&tls.key_path),
                    )
                    .user_and_password(tls.user_id.clone(), tls.password.clone())
                    .connect(config.url.as_str())
                    .await
            }
            None => async_nats::connect(config.url.as_str()).await,
        }
        .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;

        let jetstream = jetstream::new(client.clone());
        if let Err(e) = jetstream.query_account().await {
            let _ = client.drain().await;
            return Err(GatewayError::StreamContextError(e.to_string()));
        }

        Ok(Self {
            config,
            handles: RwLock::new(Some(Handles { client, jetstream })),
        })
    }

    async fn handles(&self) -> Result<Handles, GatewayError> {
        self.handles
            .read()
            .await
            .clone()
            .ok_or(GatewayError::NotConnected)
    }
}

#[async_trait]
impl MessageGateway for NatsGateway {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), GatewayError> {
        let handles = self.handles().await?;

        let mut headers = HeaderMap::new();
        headers.insert("Nats-Msg-Subject", subject);

        // 発行自体は非同期だが、ブローカーの永続化応答を待ってから返す
        let ack = handles
            .jetstream
            .publish_with_headers(subject.to_string(), headers, Bytes::copy_from_slice(payload))
            .await
            .map_err(|e| GatewayError::PublishError(e.to_string()))?;
        ack.await
            .map_err(|e| GatewayError::PublishError(e.to_string()))?;

        Ok(())
    }

    async fn subscribe(
        &self,
        consumer_name: &str,
        subject: &str,
        handler: MessageHandler,
    ) -> Result<(), GatewayError> {
        let handles = self.handles().await?;

        let stream_name = handles
            .jetstream
            .stream_by_subject(subject)
            .await
            .map_err(|e| GatewayError::SubscriptionError(e.to_string()))?;
        let stream = handles
            .jetstream
            .get_stream(stream_name)
            .await
            .map_err(|e| GatewayError::SubscriptionError(e.to_string()))?;

        // deliver subject はコンシューマー名から決定的に導出する。再購読時に
        // 既存 durable の設定と一致し、保存された配信位置へそのまま接続できる。
        let consumer = stream
            .get_or_create_consumer(
                consumer_name,
                push::Config {
                    durable_name: Some(consumer_name.to_string()),
                    deliver_subject: format!("_DELIVER.{consumer_name}"),
                    filter_subject: subject.to_string(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| GatewayError::SubscriptionError(e.to_string()))?;

        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| GatewayError::SubscriptionError(e.to_string()))?;

        let consumer_name = consumer_name.to_string();
        tokio::spawn(async move {
            while let Some(delivery) = messages.next().await {
                match delivery {
                    Ok(msg) => {
                        handler(Message::new(msg.subject.to_string(), msg.payload.to_vec()));
                        if let Err(e) = msg.ack().await {
                            tracing::warn!(consumer = %consumer_name, error = %e, "ack failed");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(consumer = %consumer_name, error = %e, "delivery error");
                    }
                }
            }
            tracing::debug!(consumer = %consumer_name, "delivery loop terminated");
        });

        Ok(())
    }

    async fn pull_from_date(
        &self,
        start_time: DateTime<Utc>,
        stream_name: &str,
        subject: &str,
    ) -> Result<Vec<Message>, GatewayError> {
        let handles = self.handles().await?;

        let stream = handles
            .jetstream
            .get_stream(stream_name)
            .await
            .map_err(|e| GatewayError::FetchError(e.to_string()))?;

        // durable 名なし = 一時コンシューマー。開始位置はタイムスタンプで指定する。
        let consumer = stream
            .create_consumer(pull::Config {
                deliver_policy: DeliverPolicy::ByStartTime {
                    start_time: OffsetDateTime::from(SystemTime::from(start_time)),
                },
                filter_subject: subject.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| GatewayError::FetchError(e.to_string()))?;

        let mut batch = consumer
            .fetch()
            .max_messages(self.config.pull_batch_size)
            .expires(Duration::from_millis(self.config.pull_max_wait_ms))
            .messages()
            .await
            .map_err(|e| GatewayError::FetchError(e.to_string()))?;

        let mut fetched = Vec::new();
        while let Some(delivery) = batch.next().await {
            let msg = delivery.map_err(|e| GatewayError::FetchError(e.to_string()))?;
            msg.ack()
                .await
                .map_err(|e| GatewayError::FetchError(e.to_string()))?;
            fetched.push(Message::new(msg.subject.to_string(), msg.payload.to_vec()));
        }

        Ok(fetched)
    }

    async fn shutdown(&self) {
        let handles = self.handles.write().await.take();
        if let Some(handles) = handles {
            if let Err(e) = handles.client.flush().await {
                tracing::warn!(error = %e, "flush on shutdown failed");
            }
            if let Err(e) = handles.client.drain().await {
                tracing::warn!(error = %e, "drain on shutdown failed");
            }
        }
    }
}
