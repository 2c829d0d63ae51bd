use hub_auth::{HashAlgorithm, create_hash, verify_hash};

#[test]
fn argon2id_hash_verifies() {
    let hash = create_hash("s3cret", HashAlgorithm::Argon2id, 1).expect("hash");
    assert!(hash.starts_with("$argon2id$"));
    assert!(hash.contains("t=1"));
    assert!(verify_hash(&hash, "s3cret"));
    assert!(!verify_hash(&hash, "wrong"));
}

#[test]
fn bcrypt_hash_verifies() {
    let hash = create_hash("s3cret", HashAlgorithm::Bcrypt, 4).expect("hash");
    assert!(hash.starts_with("$2"));
    assert!(verify_hash(&hash, "s3cret"));
    assert!(!verify_hash(&hash, "s3cret "));
}

#[test]
fn bcrypt_cost_is_clamped() {
    let hash = create_hash("pw", HashAlgorithm::Bcrypt, 1).expect("hash");
    assert!(hash.contains("$04$"));
}

#[test]
fn malformed_or_unknown_hashes_never_verify() {
    assert!(!verify_hash("", "anything"));
    assert!(!verify_hash("plaintext", "plaintext"));
    assert!(!verify_hash("$argon2id$garbage", "pw"));
    assert!(!verify_hash("$2b$04$short", "pw"));
    assert!(!verify_hash("$md5$abc", "pw"));
}
