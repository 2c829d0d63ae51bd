//! 路由注册：public / JWT / cert 三类守卫。

use crate::guard::{request_context, require_cert, require_jwt};
use axum::{Router, middleware, routing::MethodRouter};
use hub_auth::TokenVerifier;
use std::sync::Arc;

/// 按守卫分组注册路由，`build` 时合并并挂载请求上下文中间件。
pub struct HubRouter<S> {
    public: Router<S>,
    jwt: Option<Router<S>>,
    cert: Option<Router<S>>,
    verifier: Arc<TokenVerifier>,
}

impl<S> HubRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self {
            public: Router::new(),
            jwt: None,
            cert: None,
            verifier,
        }
    }

    /// 无需认证（登录、刷新、健康检查）。
    pub fn public(mut self, path: &str, route: MethodRouter<S>) -> Self {
        self.public = self.public.route(path, route);
        self
    }

    /// `Authorization: Bearer <access-token>`。
    pub fn jwt(mut self, path: &str, route: MethodRouter<S>) -> Self {
        let router = self.jwt.take().unwrap_or_else(Router::new);
        self.jwt = Some(router.route(path, route));
        self
    }

    /// 需要 TLS 客户端证书。
    pub fn cert(mut self, path: &str, route: MethodRouter<S>) -> Self {
        let router = self.cert.take().unwrap_or_else(Router::new);
        self.cert = Some(router.route(path, route));
        self
    }

    pub fn build(self, state: S) -> Router {
        let mut router = self.public;
        if let Some(jwt) = self.jwt {
            router = router.merge(
                jwt.route_layer(middleware::from_fn_with_state(self.verifier, require_jwt)),
            );
        }
        if let Some(cert) = self.cert {
            router = router.merge(cert.route_layer(middleware::from_fn(require_cert)));
        }
        router
            .with_state(state)
            .layer(middleware::from_fn(request_context))
    }
}
