// src/handlers/auth.rs

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    db::Store,
    middleware::auth::AuthenticatedUser,
    models::auth::{LoginResponse, LoginUserPayload, RefreshResponse, UserSummary},
};

pub const REFRESH_COOKIE: &str = "refreshToken";
// O cookie só é enviado de volta para as rotas de auth
const REFRESH_COOKIE_PATH: &str = "/api/auth";

fn refresh_cookie<S: Store>(app_state: &AppState<S>, token: String) -> Cookie<'static> {
    let ttl = app_state.auth_service.tokens().refresh_token_ttl();

    Cookie::build((REFRESH_COOKIE, token))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(app_state.cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

fn clear_refresh_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(REFRESH_COOKIE).path(REFRESH_COOKIE_PATH))
}

// Handler de login
pub async fn login<S: Store>(
    State(app_state): State<AppState<S>>,
    jar: CookieJar,
    Json(payload): Json<LoginUserPayload>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let outcome = app_state
        .auth_service
        .login_user(&payload.username, &payload.password)
        .await?;

    let jar = jar.add(refresh_cookie(&app_state, outcome.tokens.refresh_token));

    Ok((
        jar,
        Json(LoginResponse {
            access_token: outcome.tokens.access_token,
            user: outcome.user,
        }),
    ))
}

// Handler de refresh: qualquer falha também apaga o cookie no cliente
pub async fn refresh<S: Store>(
    State(app_state): State<AppState<S>>,
    jar: CookieJar,
) -> Response {
    let Some(raw_token) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_owned()) else {
        return (clear_refresh_cookie(jar), AppError::InvalidOrExpired).into_response();
    };

    match app_state.auth_service.refresh(&raw_token).await {
        Ok(tokens) => {
            let jar = jar.add(refresh_cookie(&app_state, tokens.refresh_token));
            let body = RefreshResponse {
                access_token: tokens.access_token,
            };
            (jar, Json(body)).into_response()
        }
        Err(err) => (clear_refresh_cookie(jar), err).into_response(),
    }
}

// Handler de logout: idempotente, sempre responde 200
pub async fn logout<S: Store>(
    State(app_state): State<AppState<S>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        app_state.auth_service.logout(cookie.value()).await?;
    }

    Ok((
        clear_refresh_cookie(jar),
        Json(json!({ "message": "Logout realizado com sucesso." })),
    ))
}

// Handler da rota protegida /me
pub async fn get_me<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> Result<Json<UserSummary>, AppError> {
    let user = app_state.auth_service.current_user(&principal).await?;
    Ok(Json(user))
}
