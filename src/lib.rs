//! cdsi-messaging: メッセージストリームブローカーの薄いアダプターライブラリ。
//!
//! 発行（publish）・durable 購読（subscribe）・日時起点のプル取得
//! （pull_from_date）・切断（shutdown）の 4 操作を `MessageGateway`
//! トレイトとして公開する。呼び出し側はブローカークライアントの型に
//! 依存せず、`Message { subject, payload }` のみを扱う。

pub mod config;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod message;

#[cfg(feature = "nats")]
pub mod nats_gateway;

pub use config::{GatewayConfig, TlsConfig};
pub use error::GatewayError;
pub use gateway::{MessageGateway, NoOpGateway};
pub use memory::InMemoryGateway;
pub use message::{Message, MessageHandler};

#[cfg(feature = "nats")]
pub use nats_gateway::NatsGateway;

#[cfg(feature = "mock")]
pub use gateway::MockMessageGateway;
