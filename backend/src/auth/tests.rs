use super::*;
use anyhow::anyhow;
use axum::http::Request;
use crates::domain::interfaces::identity::MockIdentityVerifier;

fn verifier_accepting(token: &'static str) -> SharedIdentityVerifier {
    let mut verifier = MockIdentityVerifier::new();
    verifier.expect_strategy_name().return_const("mock");
    verifier.expect_verify().returning(move |candidate| {
        if candidate == token {
            Ok(VerifiedIdentity {
                uid: "uid_1".to_string(),
                email: Some("ada@example.com".to_string()),
                name: Some("Ada".to_string()),
                picture: None,
            })
        } else {
            Err(anyhow!("token rejected"))
        }
    });
    Arc::new(verifier)
}

fn parts(authorization: Option<&str>, verifier: Option<SharedIdentityVerifier>) -> Parts {
    let mut builder = Request::builder().uri("/api/v1/user");
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    let (mut parts, _) = builder.body(()).unwrap().into_parts();
    if let Some(verifier) = verifier {
        parts.extensions.insert(verifier);
    }
    parts
}

#[test]
fn bearer_prefix_is_required() {
    assert_eq!(bearer_token("Bearer abc"), Some("abc"));
    assert_eq!(bearer_token("Bearer   "), None);
    assert_eq!(bearer_token("Basic abc"), None);
    assert_eq!(bearer_token("bearer abc"), None);
}

#[tokio::test]
async fn valid_token_yields_auth_user() {
    let mut parts = parts(Some("Bearer good"), Some(verifier_accepting("good")));

    let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();

    assert_eq!(user.uid, "uid_1");
    assert_eq!(user.email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn missing_header_is_rejected() {
    let mut parts = parts(None, Some(verifier_accepting("good")));

    let err = AuthUser::from_request_parts(&mut parts, &()).await.unwrap_err();

    assert!(matches!(err, AuthError::MissingHeader));
    assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejected_token_is_unauthorized() {
    let mut parts = parts(Some("Bearer forged"), Some(verifier_accepting("good")));

    let err = AuthUser::from_request_parts(&mut parts, &()).await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidToken));
    assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_bearer_scheme_is_rejected() {
    let mut parts = parts(Some("Token good"), Some(verifier_accepting("good")));

    let err = AuthUser::from_request_parts(&mut parts, &()).await.unwrap_err();

    assert!(matches!(err, AuthError::MalformedHeader));
}
