//! 应用运行配置加载。

use std::collections::HashMap;
use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// Messenger 后端选择。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessengerBackend {
    Native,
    Mqtt,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub broker_addr: String,
    pub tls_cert_file: Option<String>,
    pub tls_key_file: Option<String>,
    pub tls_ca_file: Option<String>,
    pub password_file: String,
    pub acl_file: String,
    pub directory_file: String,
    pub app_config_file: String,
    pub database_url: Option<String>,
    pub jwt_private_key_file: Option<String>,
    pub jwt_public_key_file: Option<String>,
    pub jwt_access_ttl_seconds: u64,
    pub jwt_refresh_ttl_seconds: u64,
    pub autosave_interval_ms: u64,
    pub broker_queue_depth: usize,
    pub broker_clients: HashMap<String, String>,
    pub ingest_enabled: bool,
    /// 采集客户端在通道服务上的 clientID。
    pub ingest_client_id: String,
    /// TLS 模式下采集客户端的证书与私钥。
    pub ingest_cert_file: Option<String>,
    pub ingest_key_file: Option<String>,
    pub messenger: MessengerBackend,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub connect_timeout_seconds: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("HUB_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8443".to_string());
        let broker_addr =
            env::var("HUB_BROKER_ADDR").unwrap_or_else(|_| "127.0.0.1:9883".to_string());
        let tls_cert_file = read_optional("HUB_TLS_CERT_FILE");
        let tls_key_file = read_optional("HUB_TLS_KEY_FILE");
        let tls_ca_file = read_optional("HUB_TLS_CA_FILE");
        if tls_cert_file.is_some() != tls_key_file.is_some() {
            let missing = if tls_cert_file.is_none() {
                "HUB_TLS_CERT_FILE"
            } else {
                "HUB_TLS_KEY_FILE"
            };
            return Err(ConfigError::Missing(missing.to_string()));
        }
        let password_file =
            env::var("HUB_PASSWORD_FILE").unwrap_or_else(|_| "config/hub.passwd".to_string());
        let acl_file = env::var("HUB_ACL_FILE").unwrap_or_else(|_| "config/hub.acl".to_string());
        let directory_file =
            env::var("HUB_DIRECTORY_FILE").unwrap_or_else(|_| "data/directory.json".to_string());
        let app_config_file =
            env::var("HUB_APP_CONFIG_FILE").unwrap_or_else(|_| "data/appconfig.json".to_string());
        let database_url = read_optional("HUB_DATABASE_URL");
        let jwt_private_key_file = read_optional("HUB_JWT_PRIVATE_KEY_FILE");
        let jwt_public_key_file = read_optional("HUB_JWT_PUBLIC_KEY_FILE");
        let jwt_access_ttl_seconds = read_u64_with_default("HUB_JWT_ACCESS_TTL_SECONDS", 3600)?;
        let jwt_refresh_ttl_seconds =
            read_u64_with_default("HUB_JWT_REFRESH_TTL_SECONDS", 14 * 24 * 3600)?;
        let autosave_interval_ms = read_u64_with_default("HUB_AUTOSAVE_INTERVAL_MS", 3000)?;
        let broker_queue_depth = read_u64_with_default("HUB_BROKER_QUEUE_DEPTH", 10)? as usize;
        if broker_queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "HUB_BROKER_QUEUE_DEPTH".to_string(),
                "0".to_string(),
            ));
        }
        let broker_clients = read_client_map("HUB_BROKER_CLIENTS")?;
        let ingest_enabled = read_bool_with_default("HUB_INGEST", false);
        let ingest_client_id =
            env::var("HUB_INGEST_CLIENT_ID").unwrap_or_else(|_| "hub-ingest".to_string());
        let ingest_cert_file = read_optional("HUB_INGEST_CERT_FILE");
        let ingest_key_file = read_optional("HUB_INGEST_KEY_FILE");
        let messenger = match env::var("HUB_MESSENGER") {
            Ok(value) => match value.to_ascii_lowercase().as_str() {
                "native" | "" => MessengerBackend::Native,
                "mqtt" => MessengerBackend::Mqtt,
                _ => return Err(ConfigError::Invalid("HUB_MESSENGER".to_string(), value)),
            },
            Err(_) => MessengerBackend::Native,
        };
        let mqtt_host = env::var("HUB_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("HUB_MQTT_PORT", 1883)?;
        let connect_timeout_seconds = read_u64_with_default("HUB_CONNECT_TIMEOUT_SECONDS", 3)?;

        Ok(Self {
            http_addr,
            broker_addr,
            tls_cert_file,
            tls_key_file,
            tls_ca_file,
            password_file,
            acl_file,
            directory_file,
            app_config_file,
            database_url,
            jwt_private_key_file,
            jwt_public_key_file,
            jwt_access_ttl_seconds,
            jwt_refresh_ttl_seconds,
            autosave_interval_ms,
            broker_queue_depth,
            broker_clients,
            ingest_enabled,
            ingest_client_id,
            ingest_cert_file,
            ingest_key_file,
            messenger,
            mqtt_host,
            mqtt_port,
            connect_timeout_seconds,
        })
    }

    /// 是否配置了服务端证书（TLS 模式）。
    pub fn tls_enabled(&self) -> bool {
        self.tls_cert_file.is_some() && self.tls_key_file.is_some()
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}

/// 解析 `id:token,id:token` 形式的静态客户端表。
fn read_client_map(key: &str) -> Result<HashMap<String, String>, ConfigError> {
    let Some(value) = read_optional(key) else {
        return Ok(HashMap::new());
    };
    parse_client_map(&value).ok_or_else(|| ConfigError::Invalid(key.to_string(), value.clone()))
}

fn parse_client_map(value: &str) -> Option<HashMap<String, String>> {
    let mut clients = HashMap::new();
    for entry in value.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (client_id, token) = entry.split_once(':')?;
        if client_id.is_empty() || token.is_empty() {
            return None;
        }
        clients.insert(client_id.to_string(), token.to_string());
    }
    Some(clients)
}
