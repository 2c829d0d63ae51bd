//! HTTP 响应辅助函数
//!
//! 所有错误返回统一的 ApiResponse 格式，HTTP 状态码与错误码一一对应：
//! - 400 INVALID.REQUEST
//! - 401 AUTH.UNAUTHORIZED
//! - 403 AUTH.FORBIDDEN
//! - 404 RESOURCE.NOT_FOUND
//! - 409 RESOURCE.CONFLICT
//! - 500 INTERNAL.ERROR
//! - 504 UPSTREAM.TIMEOUT

use api_contract::ApiResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::ErrorKind;
use serde::Serialize;

/// 成功响应
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

fn error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message.into()))).into_response()
}

/// 认证失败响应
pub fn unauthorized(message: impl Into<String>) -> Response {
    error(StatusCode::UNAUTHORIZED, "AUTH.UNAUTHORIZED", message)
}

/// 禁止访问响应
pub fn forbidden(message: impl Into<String>) -> Response {
    error(StatusCode::FORBIDDEN, "AUTH.FORBIDDEN", message)
}

/// 错误请求响应
pub fn bad_request(message: impl Into<String>) -> Response {
    error(StatusCode::BAD_REQUEST, "INVALID.REQUEST", message)
}

pub fn not_found(message: impl Into<String>) -> Response {
    error(StatusCode::NOT_FOUND, "RESOURCE.NOT_FOUND", message)
}

pub fn conflict(message: impl Into<String>) -> Response {
    error(StatusCode::CONFLICT, "RESOURCE.CONFLICT", message)
}

pub fn internal_error(message: impl Into<String>) -> Response {
    error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL.ERROR", message)
}

pub fn timeout(message: impl Into<String>) -> Response {
    error(StatusCode::GATEWAY_TIMEOUT, "UPSTREAM.TIMEOUT", message)
}

/// 按错误分类选择状态码
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Authn => StatusCode::UNAUTHORIZED,
        ErrorKind::Authz => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

/// 按错误分类构造错误响应
pub fn error_response(kind: ErrorKind, message: impl Into<String>) -> Response {
    match kind {
        ErrorKind::Validation => bad_request(message),
        ErrorKind::Authn => unauthorized(message),
        ErrorKind::Authz => forbidden(message),
        ErrorKind::NotFound => not_found(message),
        ErrorKind::Conflict => conflict(message),
        ErrorKind::Io | ErrorKind::Internal => internal_error(message),
        ErrorKind::Timeout => timeout(message),
    }
}

#[cfg(test)]
mod tests {
    use super::{error_response, status_for};
    use axum::http::StatusCode;
    use domain::ErrorKind;

    #[test]
    fn kinds_map_to_status() {
        let cases = [
            (ErrorKind::Validation, StatusCode::BAD_REQUEST),
            (ErrorKind::Authn, StatusCode::UNAUTHORIZED),
            (ErrorKind::Authz, StatusCode::FORBIDDEN),
            (ErrorKind::NotFound, StatusCode::NOT_FOUND),
            (ErrorKind::Conflict, StatusCode::CONFLICT),
            (ErrorKind::Io, StatusCode::INTERNAL_SERVER_ERROR),
            (ErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
            (ErrorKind::Timeout, StatusCode::GATEWAY_TIMEOUT),
        ];
        for (kind, status) in cases {
            assert_eq!(status_for(kind), status);
            assert_eq!(error_response(kind, "x").status(), status);
        }
    }
}
