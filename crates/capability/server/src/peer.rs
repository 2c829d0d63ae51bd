//! 对端证书身份。

use x509_parser::prelude::{FromDer, X509Certificate};

/// TLS 客户端证书中的 CN / OU，由 TLS 监听写入请求扩展。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub common_name: String,
    pub organizational_unit: Option<String>,
}

impl PeerIdentity {
    /// 从 DER 证书解析；无法解析或缺少 CN 时返回 None。
    pub fn from_der(der: &[u8]) -> Option<Self> {
        let (_, cert) = X509Certificate::from_der(der).ok()?;
        let subject = cert.subject();
        let common_name = subject
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())?
            .to_string();
        let organizational_unit = subject
            .iter_organizational_unit()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);
        Some(Self {
            common_name,
            organizational_unit,
        })
    }

    pub fn ou(&self) -> Option<&str> {
        self.organizational_unit.as_deref()
    }
}
