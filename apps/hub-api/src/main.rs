//! Hub 服务入口：认证、目录、历史 HTTP 接口，通道服务与采集链路。

mod handlers;
mod ingest;
mod middleware;
mod routes;
mod utils;

use hub_auth::{AclStore, AuthService, Authenticator, CredentialStore, TokenIssuer};
use hub_broker::{BrokerConfig, ChannelBroker};
use hub_config::{AppConfig, ConfigError, MessengerBackend};
use hub_messenger::{Messenger, MqttMessenger, NativeMessenger, NativeOptions};
use hub_server::{TlsSettings, Transport, client_config, serve, server_config, tls};
use hub_storage::{ConfigStore, DirectoryStore, HistoryStore, InMemoryHistoryStore, PgHistoryStore};
use hub_telemetry::init_tracing;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub authenticator: Arc<Authenticator>,
    pub directory: Arc<DirectoryStore>,
    pub history: Arc<dyn HistoryStore>,
    pub app_config: Arc<ConfigStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    // 口令库与 ACL（外部修改后自动重载）
    let credentials = Arc::new(CredentialStore::open(&config.password_file)?);
    let acl = Arc::new(AclStore::open(&config.acl_file)?);
    let authenticator = Arc::new(Authenticator::new(credentials.clone(), acl.clone()));
    let issuer = Arc::new(build_issuer(&config)?);
    let auth = Arc::new(AuthService::with_authenticator(
        authenticator.clone(),
        issuer.clone(),
    ));

    let autosave = Duration::from_millis(config.autosave_interval_ms);
    let directory = Arc::new(DirectoryStore::open(&config.directory_file)?);
    directory.start(autosave)?;
    let app_config = Arc::new(ConfigStore::open(&config.app_config_file)?);
    app_config.start(autosave)?;

    // 配置了 HUB_DATABASE_URL 时使用 Postgres，否则内存历史库
    let history: Arc<dyn HistoryStore> = match &config.database_url {
        Some(url) => {
            let store = PgHistoryStore::connect(url).await?;
            store.ensure_schema().await?;
            info!(target: "hub.api", backend = "postgres", "history_store_ready");
            Arc::new(store)
        }
        None => {
            warn!(target: "hub.api", backend = "memory", "history_store_ready");
            Arc::new(InMemoryHistoryStore::new())
        }
    };

    let transport = build_transport(&config)?;

    let broker = ChannelBroker::new(BrokerConfig {
        queue_depth: config.broker_queue_depth,
        clients: config.broker_clients.clone(),
    });
    let broker_listener = tokio::net::TcpListener::bind(&config.broker_addr).await?;
    broker.start(broker_listener, transport.clone())?;

    let mut ingest_link = None;
    if config.ingest_enabled {
        let messenger = build_messenger(&config)?;
        let handle =
            ingest::spawn_ingest(messenger.clone(), directory.clone(), history.clone()).await?;
        let host_port = match config.messenger {
            MessengerBackend::Native => config.broker_addr.clone(),
            MessengerBackend::Mqtt => format!("{}:{}", config.mqtt_host, config.mqtt_port),
        };
        let timeout = Duration::from_secs(config.connect_timeout_seconds);
        if let Err(err) = messenger
            .connect(&host_port, &config.ingest_client_id, timeout)
            .await
        {
            warn!(target: "hub.ingest", host_port = %host_port, error = %err, "ingest_connect_failed");
        }
        ingest_link = Some((messenger, handle));
    }

    let state = AppState {
        auth,
        authenticator,
        directory: directory.clone(),
        history,
        app_config: app_config.clone(),
    };
    let app = routes::create_router(state, issuer.verifier());

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: "hub.api", "shutdown_requested");
        }
        signal.cancel();
    });

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    let served = serve(listener, transport, app, shutdown).await;

    if let Some((messenger, handle)) = ingest_link {
        handle.stop().await;
        messenger.disconnect().await;
    }
    broker.stop().await;
    if let Err(err) = directory.close() {
        warn!(target: "hub.api", error = %err, "directory_close_failed");
    }
    if let Err(err) = app_config.close() {
        warn!(target: "hub.api", error = %err, "app_config_close_failed");
    }
    credentials.close();
    acl.close();
    info!(target: "hub.api", "hub_stopped");
    served?;
    Ok(())
}

/// 有 PEM 密钥时加载，否则生成临时密钥（重启后已签发的 token 失效）。
fn build_issuer(config: &AppConfig) -> Result<TokenIssuer, Box<dyn std::error::Error>> {
    let issuer = match (&config.jwt_private_key_file, &config.jwt_public_key_file) {
        (Some(private_key), Some(public_key)) => TokenIssuer::from_pem(
            &std::fs::read(private_key)?,
            &std::fs::read(public_key)?,
            config.jwt_access_ttl_seconds,
            config.jwt_refresh_ttl_seconds,
        )?,
        _ => {
            warn!(target: "hub.api", "jwt_keys_generated");
            TokenIssuer::generate(config.jwt_access_ttl_seconds, config.jwt_refresh_ttl_seconds)?
        }
    };
    Ok(issuer)
}

/// TLS 模式下 HTTP 与通道服务共用服务端证书；CA 用于校验客户端证书。
fn build_transport(config: &AppConfig) -> Result<Transport, Box<dyn std::error::Error>> {
    let (Some(cert_file), Some(key_file)) = (&config.tls_cert_file, &config.tls_key_file) else {
        warn!(target: "hub.api", "tls_disabled");
        return Ok(Transport::Plain);
    };
    let settings = TlsSettings::from_files(
        Path::new(cert_file),
        Path::new(key_file),
        config.tls_ca_file.as_deref().map(Path::new),
    )?;
    Ok(Transport::Tls(server_config(&settings)?))
}

fn build_messenger(config: &AppConfig) -> Result<Arc<dyn Messenger>, Box<dyn std::error::Error>> {
    let messenger: Arc<dyn Messenger> = match config.messenger {
        MessengerBackend::Native if config.tls_enabled() => {
            let ca_file = config
                .tls_ca_file
                .as_deref()
                .ok_or_else(|| ConfigError::Missing("HUB_TLS_CA_FILE".to_string()))?;
            let (Some(cert_file), Some(key_file)) =
                (&config.ingest_cert_file, &config.ingest_key_file)
            else {
                return Err(ConfigError::Missing("HUB_INGEST_CERT_FILE".to_string()).into());
            };
            let identity = (
                tls::load_certs(Path::new(cert_file))?,
                tls::load_private_key(Path::new(key_file))?,
            );
            let ca = tls::load_certs(Path::new(ca_file))?;
            Arc::new(NativeMessenger::new(NativeOptions {
                tls: Some(client_config(&ca, Some(identity))?),
                token: None,
            }))
        }
        MessengerBackend::Native => Arc::new(NativeMessenger::new(NativeOptions {
            tls: None,
            token: config.broker_clients.get(&config.ingest_client_id).cloned(),
        })),
        MessengerBackend::Mqtt => Arc::new(MqttMessenger::new()),
    };
    Ok(messenger)
}
