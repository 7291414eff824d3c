use axum::{
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::server::config::ServerConfig;
use crate::web::{middleware::auth, routes::*};

pub use crate::web::error::AppError;

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    match config.frontend_url.as_deref().map(str::parse::<HeaderValue>) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(e)) => {
            warn!(error = %e, "FRONTEND_URL is not a valid origin, allowing any origin.");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}

pub fn create_axum_router(db_pool: DatabaseConnection, config: Arc<ServerConfig>) -> Router {
    let cors = cors_layer(&config);
    let app_state = Arc::new(AppState { db_pool, config });

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest(
            "/api/snippets",
            snippet_routes::snippet_routes()
                .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)),
        )
        .nest(
            "/api/tags",
            tag_routes::create_tags_router()
                .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)),
        )
        .nest(
            "/api/languages",
            language_routes::create_languages_router()
                .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)),
        )
        .with_state(app_state)
        .layer(cors)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::db::test_db;
    use crate::server::config::ServerConfig;
    use crate::web::create_axum_router;
    use crate::web::models::Claims;

    pub const SECRET: &str = "test-secret";

    pub fn test_config() -> ServerConfig {
        ServerConfig {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: SECRET.to_string(),
            listen_addr: "127.0.0.1:0".to_string(),
            log_dir: "logs".to_string(),
            frontend_url: None,
            max_connections: 1,
        }
    }

    pub fn token_for(user_id: &str, secret: &str) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    pub struct TestApp {
        pub router: Router,
        pub token: String,
    }

    impl TestApp {
        pub const USER: &'static str = "user_test";

        pub async fn new() -> Self {
            let db = test_db().await;
            TestApp {
                router: create_axum_router(db, Arc::new(test_config())),
                token: token_for(Self::USER, SECRET),
            }
        }

        pub async fn request(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
            (status, body)
        }

        pub async fn send(
            &self,
            method: Method,
            uri: &str,
            body: Option<serde_json::Value>,
        ) -> (StatusCode, serde_json::Value) {
            let builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
            let request = match body {
                Some(json) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            self.request(request).await
        }
    }
}
