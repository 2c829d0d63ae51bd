use api_contract::{BusFrame, LoginRequest, LoginResponse, RefreshTokenRequest};
use serde_json::Value;

#[test]
fn login_request_uses_login_id() {
    let req: LoginRequest =
        serde_json::from_str(r#"{"loginID":"alice","password":"s3cret"}"#).expect("parse");
    assert_eq!(req.login_id, "alice");
    assert_eq!(req.password, "s3cret");

    let req: LoginRequest =
        serde_json::from_str(r#"{"loginId":"bob","password":"x"}"#).expect("parse alias");
    assert_eq!(req.login_id, "bob");
}

#[test]
fn login_response_is_camel_case() {
    let response = LoginResponse {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        expires: 1_700_000_000_000,
        login_id: "alice".to_string(),
    };
    let value = serde_json::to_value(response).expect("serialize");
    assert!(value.get("accessToken").is_some());
    assert!(value.get("refreshToken").is_some());
    assert_eq!(value["loginID"], "alice");
    assert!(value.get("access_token").is_none());
}

#[test]
fn refresh_token_request_accepts_both_spellings() {
    let req: RefreshTokenRequest =
        serde_json::from_str(r#"{"refreshToken":"token-1"}"#).expect("parse");
    assert_eq!(req.refresh_token, "token-1");
    let req: RefreshTokenRequest =
        serde_json::from_str(r#"{"refresh_token":"token-2"}"#).expect("parse");
    assert_eq!(req.refresh_token, "token-2");
}

#[test]
fn bus_frames_are_tagged() {
    let frame = BusFrame::Publish {
        channel: "things.event".to_string(),
        payload: "hello".to_string(),
    };
    let value: Value = serde_json::to_value(&frame).expect("serialize");
    assert_eq!(value["type"], "publish");
    assert_eq!(value["channel"], "things.event");

    let parsed: BusFrame =
        serde_json::from_str(r#"{"type":"subscribe","channel":"c1"}"#).expect("parse");
    assert_eq!(parsed.channel(), "c1");
    assert!(serde_json::from_str::<BusFrame>(r#"{"type":"bogus","channel":"c1"}"#).is_err());
}
