use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as AxumError, Header},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use std::sync::Arc;

use crate::{loans, notifications, splits};
use engine::{Engine, users};

static AUTH_SUBJECT_HEADER: axum::http::HeaderName =
    axum::http::HeaderName::from_static("auth-subject");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
}

/// `TypedHeader` for the external auth subject.
///
/// Requests must carry the subject id minted by the identity provider in an
/// "auth-subject" entry in the header; the middleware resolves it to an
/// internal user.
#[derive(Debug)]
struct AuthSubjectHeader(String);

impl Header for AuthSubjectHeader {
    fn name() -> &'static axum::http::HeaderName {
        &AUTH_SUBJECT_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        if value.is_empty() {
            return Err(AxumError::invalid());
        }

        Ok(AuthSubjectHeader(value.to_string()))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        match axum::http::HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode auth-subject header"),
        }
    }
}

async fn auth(
    subject_header: TypedHeader<AuthSubjectHeader>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user: Option<users::Model> = users::Entity::find()
        .filter(users::Column::AuthSubject.eq(subject_header.0.0.as_str()))
        .filter(users::Column::DeletedAt.is_null())
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let Some(user) = user else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/loans", post(loans::create))
        .route(
            "/loans/{id}",
            get(loans::get_details)
                .patch(loans::update)
                .delete(loans::delete),
        )
        .route("/loans/{id}/transfer", post(loans::transfer))
        .route("/splitLoans", post(splits::create))
        .route(
            "/splitLoans/{id}",
            axum::routing::patch(splits::update).delete(splits::delete),
        )
        .route("/splitLoans/{id}/children", get(splits::children))
        .route("/notifications", get(notifications::list))
        .route("/notifications/readAll", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        // Operational scan triggers; deliberately outside the auth layer.
        .route("/loans/reminders/run", post(loans::run_reminders))
        .route("/loans/overdue/run", post(loans::run_overdue))
        .with_state(state)
}

pub async fn run(engine: Arc<Engine>, db: DatabaseConnection) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, db, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Arc<Engine>,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState { engine, db };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Arc<Engine>,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use migration::MigratorTrait;
    use tower::ServiceExt;

    async fn test_state() -> ServerState {
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Arc::new(Engine::builder().database(db.clone()).build());
        ServerState { engine, db }
    }

    #[tokio::test]
    async fn missing_auth_subject_is_rejected() {
        let state = test_state().await;
        let res = router(state)
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/notifications")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(res.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_auth_subject_is_unauthorized() {
        let state = test_state().await;
        let res = router(state)
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/notifications")
                    .header("auth-subject", "nobody")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn scan_triggers_do_not_require_auth() {
        let state = test_state().await;
        let res = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/loans/reminders/run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = http_body_util::BodyExt::collect(res.into_body())
            .await
            .unwrap()
            .to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["processed"], 0);
    }
}
