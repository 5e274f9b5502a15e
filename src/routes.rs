// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{config::AppState, db::Store, handlers, middleware::auth::auth_guard};

// Monta o router completo. Genérico no store para os testes rodarem em memória.
pub fn build_router<S: Store>(app_state: AppState<S>) -> Router {
    // Rotas de autenticação (públicas; o refresh usa o cookie)
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth::login::<S>))
        .route("/refresh", post(handlers::auth::refresh::<S>))
        .route("/logout", post(handlers::auth::logout::<S>));

    let user_routes = Router::new().route("/me", get(handlers::auth::get_me::<S>));

    let unit_routes = Router::new()
        .route(
            "/",
            get(handlers::units::list_units::<S>).post(handlers::units::create_unit::<S>),
        )
        .route(
            "/{id}",
            get(handlers::units::get_unit::<S>)
                .put(handlers::units::update_unit::<S>)
                .delete(handlers::units::delete_unit::<S>),
        );

    let booking_routes = Router::new()
        .route("/", post(handlers::bookings::create_booking::<S>))
        .route("/{id}/cancel", patch(handlers::bookings::cancel_booking::<S>));

    let sale_routes = Router::new()
        .route(
            "/",
            post(handlers::sales::create_sale::<S>).get(handlers::sales::list_sales::<S>),
        )
        .route(
            "/{id}",
            get(handlers::sales::get_sale::<S>)
                .patch(handlers::sales::update_sale::<S>)
                .delete(handlers::sales::delete_sale::<S>),
        );

    let dashboard_routes =
        Router::new().route("/summary", get(handlers::dashboard::get_summary::<S>));

    // Tudo abaixo exige um access token válido
    let protected = Router::new()
        .nest("/users", user_routes)
        .nest("/units", unit_routes)
        .nest("/bookings", booking_routes)
        .nest("/sales", sale_routes)
        .nest("/dashboard", dashboard_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard::<S>,
        ));

    let api = Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/auth", auth_routes)
        .merge(protected);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
