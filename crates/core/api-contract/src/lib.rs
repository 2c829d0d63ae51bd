//! 稳定的 DTO、API 响应契约与总线帧格式。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 登录请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(rename = "loginID", alias = "loginId", alias = "login_id")]
    pub login_id: String,
    pub password: String,
}

/// 登录响应体。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// access token 过期时间（Unix 毫秒）。
    pub expires: u64,
    #[serde(rename = "loginID")]
    pub login_id: String,
}

/// 刷新 token 请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
}

/// 刷新 token 响应体。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires: u64,
}

/// 应用配置（每用户、每应用的不透明文本）。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfigDto {
    #[serde(rename = "appID")]
    pub app_id: String,
    pub config: String,
}

/// 写入应用配置的请求体。
#[derive(Debug, Deserialize)]
pub struct UpdateAppConfigRequest {
    pub config: String,
}

/// 分页参数；limit 为 0 或缺省时使用默认页大小。
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// 目录 JSONPath 查询参数。
#[derive(Debug, Deserialize)]
pub struct DirectoryQuery {
    pub path: String,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// 历史查询参数（时间窗口为开区间，RFC 3339）。
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQueryParams {
    pub name: Option<String>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub limit: Option<usize>,
}

/// 总线 WebSocket 帧（`GET /bus`）。
///
/// 客户端发送 subscribe / unsubscribe / publish，服务端推送 receive。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BusFrame {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Publish { channel: String, payload: String },
    Receive { channel: String, payload: String },
}

impl BusFrame {
    pub fn channel(&self) -> &str {
        match self {
            BusFrame::Subscribe { channel }
            | BusFrame::Unsubscribe { channel }
            | BusFrame::Publish { channel, .. }
            | BusFrame::Receive { channel, .. } => channel,
        }
    }
}
