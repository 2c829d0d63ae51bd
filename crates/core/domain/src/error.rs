/// 与传输无关的错误分类，各 crate 的错误类型都可映射到此处。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 输入格式错误（缺字段、时间戳非法、未知角色）。
    Validation,
    /// 键或 Thing 不存在。
    NotFound,
    /// 凭据无效或 token 无效/过期。
    Authn,
    /// 已认证但无权限。
    Authz,
    /// 组件已在运行。
    Conflict,
    /// 文件或网络错误，通常是暂时的。
    Io,
    /// 等待超时。
    Timeout,
    /// 不变量被破坏。
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Authn => "authn",
            ErrorKind::Authz => "authz",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Io => "io",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
