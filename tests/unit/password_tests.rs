//! Unit tests for credential verification through the public API
use sessionkeep_backend::{
    auth::{
        hash_password, validate_password_strength, verify_password, CredentialCheck, CredentialVerifier,
        PasswordRequirements,
    },
    store::{InMemoryUserStore, User},
};
use sessionkeep_common::Role;

use crate::test_utils::TEST_COST;

fn store_with(email: &str, password: &str) -> InMemoryUserStore {
    let store = InMemoryUserStore::new();
    store.insert(User::new(
        email,
        "Test",
        "User",
        hash_password(password, &TEST_COST).unwrap(),
        Role::User,
    ));
    store
}

#[tokio::test]
async fn test_alice_correct_and_wrong() {
    let verifier = CredentialVerifier::new(store_with("alice@example.com", "correct"), &TEST_COST).unwrap();

    let check = verifier.verify("alice@example.com", "correct").await.unwrap();
    let CredentialCheck::Match(user) = check else {
        panic!("expected a match, got {check:?}");
    };
    assert_eq!(user.role, Role::User);

    let check = verifier.verify("alice@example.com", "wrong").await.unwrap();
    assert!(matches!(check, CredentialCheck::NoMatch));
}

#[tokio::test]
async fn test_identity_lookup_ignores_case() {
    let verifier = CredentialVerifier::new(store_with("Bob@Example.com", "builder"), &TEST_COST).unwrap();
    let check = verifier.verify("bob@example.COM", "builder").await.unwrap();
    assert!(matches!(check, CredentialCheck::Match(_)));
}

#[tokio::test]
async fn test_unknown_identity_is_no_match() {
    let verifier = CredentialVerifier::new(InMemoryUserStore::new(), &TEST_COST).unwrap();
    let check = verifier.verify("nobody@example.com", "").await.unwrap();
    assert!(matches!(check, CredentialCheck::NoMatch));
}

#[test]
fn test_hash_roundtrip_and_strength() {
    let hash = hash_password("Str0ng-Enough!", &TEST_COST).unwrap();
    assert!(verify_password(&hash, "Str0ng-Enough!"));
    assert!(!verify_password(&hash, "Str0ng-Enough?"));

    let requirements = PasswordRequirements::default();
    assert!(validate_password_strength("Str0ng-Enough!", &requirements));
    assert!(!validate_password_strength("weak", &requirements));
}
