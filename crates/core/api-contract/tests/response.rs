use api_contract::{ApiResponse, AppConfigDto};
use serde_json::json;

#[test]
fn success_envelope_carries_data() {
    let response = ApiResponse::success(AppConfigDto {
        app_id: "dashboard".to_string(),
        config: "theme: dark".to_string(),
    });
    let value = serde_json::to_value(&response).expect("serialize");
    assert_eq!(
        value,
        json!({
            "success": true,
            "data": { "appID": "dashboard", "config": "theme: dark" },
            "error": null
        })
    );
}

#[test]
fn error_envelope_has_null_data() {
    let response = ApiResponse::<()>::error("AUTH.FORBIDDEN", "role too low");
    let value = serde_json::to_value(&response).expect("serialize");
    assert_eq!(value["success"], false);
    assert!(value["data"].is_null());
    assert_eq!(value["error"]["code"], "AUTH.FORBIDDEN");
    assert_eq!(value["error"]["message"], "role too low");
}
