// tests/auth_service_test.rs

mod common;

use chrono::{Duration, Utc};
use realty_backend::{
    common::error::AppError,
    db::{MemoryStore, Store},
    models::auth::{NewRefreshToken, Role},
    services::{auth::AuthService, token_service::TokenService},
};

use common::{token_service, Fixture, PASSWORD};

fn service(fixture: &Fixture) -> AuthService<MemoryStore> {
    AuthService::new(fixture.store.clone(), token_service())
}

#[tokio::test]
async fn login_returns_tokens_and_user_summary() {
    let fx = Fixture::new().await;
    let auth = service(&fx);

    let outcome = auth.login_user("agente.a", PASSWORD).await.unwrap();

    assert_eq!(outcome.user.id, fx.agent_a.id);
    assert_eq!(outcome.user.role, Role::Agent);
    assert_eq!(outcome.user.company_id, Some(fx.company_a));

    let principal = auth.validate_token(&outcome.tokens.access_token).unwrap();
    assert_eq!(principal.id, fx.agent_a.id);
    assert_eq!(principal.company_id, Some(fx.company_a));

    let stored = fx.store.refresh_tokens_of(fx.agent_a.id).await;
    assert_eq!(stored.len(), 1);
    assert!(stored[0].is_active);
    // Só o hash fica persistido
    assert_ne!(stored[0].token_hash, outcome.tokens.refresh_token);
    assert_eq!(
        stored[0].token_hash,
        TokenService::hash_refresh_token(&outcome.tokens.refresh_token)
    );
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let fx = Fixture::new().await;
    fx.store.set_user_active(fx.admin_a.id, false).await;
    let auth = service(&fx);

    let unknown = auth.login_user("ninguem", PASSWORD).await.unwrap_err();
    let wrong_password = auth.login_user("agente.a", "senha-errada").await.unwrap_err();
    let inactive = auth.login_user("admin.a", PASSWORD).await.unwrap_err();

    for err in [&unknown, &wrong_password, &inactive] {
        assert!(matches!(err, AppError::InvalidCredentials), "{err:?}");
    }
    assert!(fx.store.refresh_tokens_of(fx.admin_a.id).await.is_empty());
}

#[tokio::test]
async fn refresh_rotates_the_token() {
    let fx = Fixture::new().await;
    let auth = service(&fx);
    let first = auth.login_user("agente.a", PASSWORD).await.unwrap().tokens;

    let second = auth.refresh(&first.refresh_token).await.unwrap();

    assert_ne!(second.refresh_token, first.refresh_token);
    let principal = auth.validate_token(&second.access_token).unwrap();
    assert_eq!(principal.id, fx.agent_a.id);

    let tokens = fx.store.refresh_tokens_of(fx.agent_a.id).await;
    assert_eq!(tokens.len(), 2);
    let old_hash = TokenService::hash_refresh_token(&first.refresh_token);
    let new_hash = TokenService::hash_refresh_token(&second.refresh_token);
    assert!(tokens.iter().any(|t| t.token_hash == old_hash && !t.is_active));
    assert!(tokens.iter().any(|t| t.token_hash == new_hash && t.is_active));
}

#[tokio::test]
async fn replaying_a_rotated_token_revokes_every_session() {
    let fx = Fixture::new().await;
    let auth = service(&fx);

    let session_one = auth.login_user("agente.a", PASSWORD).await.unwrap().tokens;
    let session_two = auth.login_user("agente.a", PASSWORD).await.unwrap().tokens;
    let rotated = auth.refresh(&session_one.refresh_token).await.unwrap();

    let err = auth.refresh(&session_one.refresh_token).await.unwrap_err();
    assert!(matches!(err, AppError::ReuseDetected));

    // A revogação foi persistida apesar do erro
    let tokens = fx.store.refresh_tokens_of(fx.agent_a.id).await;
    assert_eq!(tokens.len(), 3);
    assert!(tokens.iter().all(|t| !t.is_active));

    // Os herdeiros legítimos também caíram
    for raw in [&rotated.refresh_token, &session_two.refresh_token] {
        let err = auth.refresh(raw).await.unwrap_err();
        assert!(matches!(err, AppError::ReuseDetected));
    }
}

#[tokio::test]
async fn replay_does_not_touch_other_users() {
    let fx = Fixture::new().await;
    let auth = service(&fx);

    let victim = auth.login_user("agente.a", PASSWORD).await.unwrap().tokens;
    let bystander = auth.login_user("agente.b", PASSWORD).await.unwrap().tokens;
    auth.refresh(&victim.refresh_token).await.unwrap();
    auth.refresh(&victim.refresh_token).await.unwrap_err();

    assert!(auth.refresh(&bystander.refresh_token).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_rotation_of_the_same_token_is_treated_as_reuse() {
    let fx = Fixture::new().await;
    let auth = service(&fx);
    let raw = auth.login_user("agente.a", PASSWORD).await.unwrap().tokens.refresh_token;

    let first = tokio::spawn({
        let auth = auth.clone();
        let raw = raw.clone();
        async move { auth.refresh(&raw).await }
    });
    let second = tokio::spawn({
        let auth = auth.clone();
        let raw = raw.clone();
        async move { auth.refresh(&raw).await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let reuses = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::ReuseDetected)))
        .count();
    assert_eq!((successes, reuses), (1, 1));

    let tokens = fx.store.refresh_tokens_of(fx.agent_a.id).await;
    assert!(tokens.iter().all(|t| !t.is_active));
}

#[tokio::test]
async fn unknown_and_expired_tokens_are_rejected_without_cascade() {
    let fx = Fixture::new().await;
    let auth = service(&fx);
    let live = auth.login_user("agente.a", PASSWORD).await.unwrap().tokens;

    let err = auth.refresh("token-que-nunca-existiu").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidOrExpired));

    let expired_raw = TokenService::generate_refresh_token();
    fx.store
        .insert_refresh_token(NewRefreshToken {
            token_hash: TokenService::hash_refresh_token(&expired_raw),
            user_id: fx.agent_a.id,
            company_id: Some(fx.company_a),
            expires_at: Utc::now() - Duration::minutes(1),
        })
        .await
        .unwrap();

    let err = auth.refresh(&expired_raw).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidOrExpired));

    // Nenhuma cascata: a sessão viva continua funcionando
    assert!(auth.refresh(&live.refresh_token).await.is_ok());
}

#[tokio::test]
async fn disabled_user_cannot_refresh() {
    let fx = Fixture::new().await;
    let auth = service(&fx);
    let tokens = auth.login_user("agente.a", PASSWORD).await.unwrap().tokens;

    fx.store.set_user_active(fx.agent_a.id, false).await;

    let err = auth.refresh(&tokens.refresh_token).await.unwrap_err();
    assert!(matches!(err, AppError::UserDisabled));
    // O token não foi rotacionado
    let stored = fx.store.refresh_tokens_of(fx.agent_a.id).await;
    assert_eq!(stored.len(), 1);
    assert!(stored[0].is_active);
}

#[tokio::test]
async fn refresh_signs_with_the_current_role() {
    let fx = Fixture::new().await;
    let auth = service(&fx);
    let tokens = auth.login_user("agente.a", PASSWORD).await.unwrap().tokens;

    let mut promoted = fx.agent_a.clone();
    promoted.role = Role::CompanyAdmin;
    fx.store.insert_user(promoted).await;

    let rotated = auth.refresh(&tokens.refresh_token).await.unwrap();
    let principal = auth.validate_token(&rotated.access_token).unwrap();
    assert_eq!(principal.role, Role::CompanyAdmin);
}

#[tokio::test]
async fn logout_is_idempotent_and_later_refresh_counts_as_reuse() {
    let fx = Fixture::new().await;
    let auth = service(&fx);
    let tokens = auth.login_user("agente.a", PASSWORD).await.unwrap().tokens;
    let other_session = auth.login_user("agente.a", PASSWORD).await.unwrap().tokens;

    auth.logout(&tokens.refresh_token).await.unwrap();
    auth.logout(&tokens.refresh_token).await.unwrap();
    auth.logout("token-desconhecido").await.unwrap();

    // Logout não derruba as outras sessões
    let stored = fx.store.refresh_tokens_of(fx.agent_a.id).await;
    assert_eq!(stored.iter().filter(|t| t.is_active).count(), 1);

    let err = auth.refresh(&tokens.refresh_token).await.unwrap_err();
    assert!(matches!(err, AppError::ReuseDetected));
    let err = auth.refresh(&other_session.refresh_token).await.unwrap_err();
    assert!(matches!(err, AppError::ReuseDetected));
}

#[tokio::test]
async fn tampered_access_token_is_rejected() {
    let fx = Fixture::new().await;
    let auth = service(&fx);
    let tokens = auth.login_user("agente.a", PASSWORD).await.unwrap().tokens;

    let mut tampered = tokens.access_token.clone();
    tampered.push('x');
    assert!(matches!(
        auth.validate_token(&tampered),
        Err(AppError::InvalidToken)
    ));
    assert!(matches!(
        auth.validate_token("nao-e-um-jwt"),
        Err(AppError::InvalidToken)
    ));
}
