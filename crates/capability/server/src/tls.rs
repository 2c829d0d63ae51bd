//! rustls 服务端 / 客户端配置。
//!
//! 统一使用 ring 加密后端。服务端可选地要求客户端证书（CA 池校验）；
//! 未要求时客户端证书仍会被校验并透传给 cert 路由。

use crate::ServerError;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// 服务端 TLS 设置。
#[derive(Debug)]
pub struct TlsSettings {
    pub cert_chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
    /// 客户端证书 CA 池；为空时不请求客户端证书。
    pub client_ca: Vec<CertificateDer<'static>>,
    pub require_client_cert: bool,
}

impl TlsSettings {
    pub fn new(cert_chain: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        Self {
            cert_chain,
            key,
            client_ca: Vec::new(),
            require_client_cert: false,
        }
    }

    /// 从 PEM 文件加载证书链、私钥与可选 CA。
    pub fn from_files(
        cert_file: &Path,
        key_file: &Path,
        ca_file: Option<&Path>,
    ) -> Result<Self, ServerError> {
        let mut settings = Self::new(load_certs(cert_file)?, load_private_key(key_file)?);
        if let Some(ca_file) = ca_file {
            settings.client_ca = load_certs(ca_file)?;
        }
        Ok(settings)
    }

    pub fn with_client_ca(mut self, ca: Vec<CertificateDer<'static>>, required: bool) -> Self {
        self.client_ca = ca;
        self.require_client_cert = required;
        self
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn root_store(certs: &[CertificateDer<'static>]) -> Result<RootCertStore, ServerError> {
    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots.add(cert.clone())?;
    }
    Ok(roots)
}

/// 构造服务端配置。
pub fn server_config(settings: &TlsSettings) -> Result<Arc<ServerConfig>, ServerError> {
    let provider = provider();
    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;
    let builder = if settings.client_ca.is_empty() {
        builder.with_no_client_auth()
    } else {
        let roots = Arc::new(root_store(&settings.client_ca)?);
        let verifier = WebPkiClientVerifier::builder_with_provider(roots, provider);
        let verifier = if settings.require_client_cert {
            verifier
        } else {
            verifier.allow_unauthenticated()
        };
        let verifier = verifier
            .build()
            .map_err(|err| ServerError::Tls(err.to_string()))?;
        builder.with_client_cert_verifier(verifier)
    };
    let mut config =
        builder.with_single_cert(settings.cert_chain.clone(), settings.key.clone_key())?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

/// 构造客户端配置；`identity` 为客户端证书链与私钥。
pub fn client_config(
    ca: &[CertificateDer<'static>],
    identity: Option<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)>,
) -> Result<Arc<ClientConfig>, ServerError> {
    let builder = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store(ca)?);
    let config = match identity {
        Some((certs, key)) => builder.with_client_auth_cert(certs, key)?,
        None => builder.with_no_client_auth(),
    };
    Ok(Arc::new(config))
}

pub fn server_name(host: &str) -> Result<ServerName<'static>, ServerError> {
    ServerName::try_from(host.to_string()).map_err(|err| ServerError::Tls(err.to_string()))
}

/// 读取 PEM 文件中的全部证书。
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let file = std::fs::File::open(path)?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file)).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(ServerError::MissingPem {
            kind: "certificate",
            path: path.display().to_string(),
        });
    }
    Ok(certs)
}

/// 读取 PEM 文件中的第一个私钥（PKCS#8 / PKCS#1 / SEC1）。
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ServerError> {
    let file = std::fs::File::open(path)?;
    rustls_pemfile::private_key(&mut BufReader::new(file))?.ok_or_else(|| {
        ServerError::MissingPem {
            kind: "private key",
            path: path.display().to_string(),
        }
    })
}
