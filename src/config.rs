use serde::{Deserialize, Serialize};

/// GatewayConfig はブローカー接続とプル取得の設定を表す。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// ブローカー URL（例: "nats://localhost:4222"）
    pub url: String,
    /// TLS 設定。None の場合は平文接続となる。
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// pull_from_date の 1 回あたりの最大取得件数
    #[serde(default = "default_pull_batch_size")]
    pub pull_batch_size: usize,
    /// pull_from_date の最大待機時間（ミリ秒）
    #[serde(default = "default_pull_max_wait_ms")]
    pub pull_max_wait_ms: u64,
}

/// TlsConfig はクライアント証明書と資格情報による TLS 接続設定。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// クライアント証明書のパス
    pub cert_path: String,
    /// クライアント秘密鍵のパス
    pub key_path: String,
    /// ユーザー ID
    pub user_id: String,
    /// パスワード
    pub password: String,
}

fn default_pull_batch_size() -> usize {
    500
}

fn default_pull_max_wait_ms() -> u64 {
    5000
}

impl GatewayConfig {
    /// URL を指定して新しい GatewayConfig を生成する。
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tls: None,
            pull_batch_size: default_pull_batch_size(),
            pull_max_wait_ms: default_pull_max_wait_ms(),
        }
    }

    /// クライアント証明書と資格情報による TLS 接続を有効化する。
    pub fn with_tls(
        mut self,
        cert_path: impl Into<String>,
        key_path: impl Into<String>,
        user_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.tls = Some(TlsConfig {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            user_id: user_id.into(),
            password: password.into(),
        });
        self
    }

    pub fn pull_batch_size(mut self, size: usize) -> Self {
        self.pull_batch_size = size;
        self
    }

    pub fn pull_max_wait_ms(mut self, ms: u64) -> Self {
        self.pull_max_wait_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let cfg = GatewayConfig::new("nats://localhost:4222");
        assert_eq!(cfg.url, "nats://localhost:4222");
        assert!(cfg.tls.is_none());
        assert_eq!(cfg.pull_batch_size, 500);
        assert_eq!(cfg.pull_max_wait_ms, 5000);
    }

    #[test]
    fn test_with_tls() {
        let cfg = GatewayConfig::new("nats://broker:4222")
            .with_tls("/certs/client.crt", "/certs/client.key", "svc", "secret");

        let tls = cfg.tls.expect("tls config");
        assert_eq!(tls.cert_path, "/certs/client.crt");
        assert_eq!(tls.key_path, "/certs/client.key");
        assert_eq!(tls.user_id, "svc");
        assert_eq!(tls.password, "secret");
    }

    #[test]
    fn test_builder_pull_settings() {
        let cfg = GatewayConfig::new("nats://localhost:4222")
            .pull_batch_size(100)
            .pull_max_wait_ms(1000);
        assert_eq!(cfg.pull_batch_size, 100);
        assert_eq!(cfg.pull_max_wait_ms, 1000);
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"url": "nats://localhost:4222"}"#;
        let cfg: GatewayConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.tls.is_none());
        assert_eq!(cfg.pull_batch_size, 500);
        assert_eq!(cfg.pull_max_wait_ms, 5000);
    }

    #[test]
    fn test_deserialize_with_tls() {
        let json = r#"{
            "url": "tls://broker:4222",
            "tls": {
                "cert_path": "/c.crt",
                "key_path": "/c.key",
                "user_id": "svc",
                "password": "pw"
            }
        }"#;
        let cfg: GatewayConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.tls.is_some());
    }
}
