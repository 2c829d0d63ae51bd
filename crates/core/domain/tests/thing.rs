use domain::{ThingId, ThingValue};

#[test]
fn canonical_thing_id_has_publisher() {
    let id = ThingId::parse("urn:z:pubA:dev:sense");
    assert_eq!(id.zone, "z");
    assert_eq!(id.publisher(), Some("pubA"));
    assert_eq!(id.device_id, "dev");
    assert_eq!(id.device_type, "sense");
}

#[test]
fn publisher_without_device_type() {
    let id = ThingId::parse("urn:home:gateway1:sensor3");
    assert_eq!(id.zone, "home");
    assert_eq!(id.publisher(), Some("gateway1"));
    assert_eq!(id.device_id, "sensor3");
    assert!(id.device_type.is_empty());
}

#[test]
fn short_forms_have_no_publisher() {
    assert_eq!(ThingId::parse("urn:dev:sense").publisher(), None);
    assert_eq!(ThingId::parse("urn:dev").publisher(), None);
    let plain = ThingId::parse("thing-1");
    assert_eq!(plain.publisher(), None);
    assert_eq!(plain.device_id, "thing-1");
}

#[test]
fn format_round_trips_through_parse() {
    let formatted = ThingId::format("z", "pub", "dev", "sensor");
    assert_eq!(formatted, "urn:z:pub:dev:sensor");
    assert_eq!(ThingId::parse(&formatted).publisher(), Some("pub"));
}

#[test]
fn thing_value_uses_wire_field_names() {
    let value = ThingValue::new("urn:z:p:d", "temp", "20.0").created_at("2024-01-01T00:00:00Z");
    let json = serde_json::to_value(&value).expect("json");
    assert_eq!(json["thingID"], "urn:z:p:d");
    assert_eq!(json["created"], "2024-01-01T00:00:00Z");
    assert!(json.get("valueID").is_none());

    let parsed: ThingValue =
        serde_json::from_str(r#"{"thingID":"t1","name":"temp","value":"1"}"#).expect("parse");
    assert!(parsed.created.is_empty());
    assert_eq!(parsed.thing_id, "t1");
}
