use axum::{
    Extension,
    body::Body,
    http::{Request, StatusCode, header},
    routing::get,
};
use http_body_util::BodyExt;
use hub_auth::TokenIssuer;
use hub_server::{AuthenticatedUser, HubRouter, PeerIdentity};
use std::sync::Arc;
use tower::ServiceExt;

fn router(issuer: &TokenIssuer) -> axum::Router {
    HubRouter::new(issuer.verifier())
        .public("/health", get(|| async { "ok" }))
        .jwt(
            "/me",
            get(|Extension(user): Extension<AuthenticatedUser>| async move { user.login_id }),
        )
        .cert(
            "/device",
            get(|Extension(peer): Extension<PeerIdentity>| async move { peer.common_name }),
        )
        .build(())
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

#[tokio::test]
async fn public_route_needs_no_credentials() {
    let issuer = TokenIssuer::generate(60, 120).expect("issuer");
    let response = router(&issuer)
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn jwt_route_passes_login_id() {
    let issuer = TokenIssuer::generate(60, 120).expect("issuer");
    let pair = issuer.issue("alice").expect("tokens");
    let response = router(&issuer)
        .oneshot(
            Request::get("/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", pair.access_token))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "alice");
}

#[tokio::test]
async fn jwt_route_rejects_missing_and_refresh_tokens() {
    let issuer = TokenIssuer::generate(60, 120).expect("issuer");
    let pair = issuer.issue("alice").expect("tokens");

    let missing = router(&issuer)
        .oneshot(Request::get("/me").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value =
        serde_json::from_str(&body_text(missing).await).expect("json");
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTH.UNAUTHORIZED");

    let refresh = router(&issuer)
        .oneshot(
            Request::get("/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", pair.refresh_token))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cert_route_requires_peer_identity() {
    let issuer = TokenIssuer::generate(60, 120).expect("issuer");
    let denied = router(&issuer)
        .oneshot(Request::get("/device").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let mut request = Request::get("/device").body(Body::empty()).expect("request");
    request.extensions_mut().insert(PeerIdentity {
        common_name: "dev-1".to_string(),
        organizational_unit: Some("iot-device".to_string()),
    });
    let allowed = router(&issuer).oneshot(request).await.expect("response");
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(body_text(allowed).await, "dev-1");
}
