use hub_auth::{AuthError, TokenIssuer, TokenKind, TokenVerifier};

#[test]
fn issue_and_verify_round_trip() {
    let issuer = TokenIssuer::generate(3600, 7200).expect("issuer");
    let pair = issuer.issue("alice").expect("tokens");

    let access = issuer.verify(&pair.access_token).expect("access");
    assert_eq!(access.login_id, "alice");
    assert_eq!(access.kind, TokenKind::Access);
    assert_eq!(access.expires_at - access.issued_at, 3600);

    let refresh = issuer.verify(&pair.refresh_token).expect("refresh");
    assert_eq!(refresh.kind, TokenKind::Refresh);
    assert_eq!(refresh.expires_at - refresh.issued_at, 7200);
}

#[test]
fn public_key_verifier_accepts_issued_tokens() {
    let issuer = TokenIssuer::generate(60, 120).expect("issuer");
    let verifier =
        TokenVerifier::from_public_pem(issuer.public_key_pem().as_bytes()).expect("verifier");
    let pair = issuer.issue("bob").expect("tokens");
    assert_eq!(verifier.verify_access(&pair.access_token).expect("access").login_id, "bob");
    assert!(matches!(
        verifier.verify_access(&pair.refresh_token),
        Err(AuthError::TokenInvalid)
    ));
}

#[test]
fn foreign_key_signature_is_rejected() {
    let issuer = TokenIssuer::generate(60, 120).expect("issuer");
    let other = TokenIssuer::generate(60, 120).expect("other");
    let pair = other.issue("mallory").expect("tokens");
    assert!(matches!(issuer.verify(&pair.access_token), Err(AuthError::TokenInvalid)));
    assert!(matches!(issuer.verify("not-a-token"), Err(AuthError::TokenInvalid)));
}
