use crate::config::ServiceConfig;
use crate::server_security::{
    AccessDenied, AccessGate, CredentialSources, KEY_QUERY_PARAM, LEGACY_KEY_QUERY_PARAM,
};
use axum::{
    extract::{Query, Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER, WWW_AUTHENTICATE},
        HeaderValue, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use dtm_matrix_store::MatrixReader;
use dtm_protocol::{serialize_json, ErrorBody, HealthResponse};
use dtm_query::{QueryEngine, QueryError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

type Params = HashMap<String, String>;

/// Shared by every handler of the HTTP shell.
pub struct AppState {
    pub engine: QueryEngine,
    pub gate: AccessGate,
    /// Origin used by the nearest-location route.
    pub default_origin: String,
}

impl AppState {
    pub fn new(config: &ServiceConfig, store: Arc<dyn MatrixReader>) -> Self {
        Self {
            engine: QueryEngine::new(store, config.client_profiles()),
            gate: AccessGate::from_config(&config.access),
            default_origin: config.default_origin.clone(),
        }
    }
}

/// Key that passed the gate, available to handlers behind it.
#[derive(Debug, Clone)]
pub struct ClientKey(pub String);

pub fn router(state: Arc<AppState>) -> Router {
    let gated = Router::new()
        .route("/dtm", get(row))
        .route("/pair", get(pair))
        .route("/origins", get(origins))
        .route("/profile", get(profile))
        .route("/api/v1/nearest-location", get(nearest_location))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_access));

    Router::new()
        .route("/health", get(health))
        .merge(gated)
        .with_state(state)
}

async fn require_access(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let params = Query::<Params>::try_from_uri(request.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();

    let sources = CredentialSources {
        authorization: authorization.as_deref(),
        key_param: params.get(KEY_QUERY_PARAM).map(String::as_str),
        legacy_key_param: params.get(LEGACY_KEY_QUERY_PARAM).map(String::as_str),
    };
    match state.gate.admit(sources) {
        Ok(key) => {
            let key = ClientKey(key.to_string());
            request.extensions_mut().insert(key);
            next.run(request).await
        }
        Err(denied) => {
            log::debug!("{} {} rejected: {:?}", request.method(), request.uri().path(), denied);
            denied_response(denied)
        }
    }
}

async fn row(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> Response {
    run_query(&state, move |engine| {
        engine.row(param(&params, "origin"), param(&params, "maxTime"))
    })
    .await
}

async fn pair(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> Response {
    run_query(&state, move |engine| {
        engine.pair(param(&params, "origin"), param(&params, "dest"))
    })
    .await
}

async fn origins(State(state): State<Arc<AppState>>) -> Response {
    run_query(&state, |engine| engine.origins()).await
}

async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(ClientKey(key)): Extension<ClientKey>,
) -> Response {
    json_response(StatusCode::OK, &state.engine.profile(&key))
}

async fn nearest_location(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Response {
    let origin = state.default_origin.clone();
    run_query(&state, move |engine| {
        let pc4 = param(&params, "pc4")
            .filter(|value| !value.trim().is_empty())
            .ok_or(QueryError::MissingParameter("pc4"))?;
        engine.pair(Some(origin.as_str()), Some(pc4))
    })
    .await
}

async fn health() -> Response {
    json_response(StatusCode::OK, &HealthResponse::ok())
}

fn param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params.get(name).map(String::as_str)
}

/// Store reads are blocking SQLite calls, so they leave the async workers.
async fn run_query<T, F>(state: &AppState, query: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&QueryEngine) -> dtm_query::Result<T> + Send + 'static,
{
    let engine = state.engine.clone();
    match tokio::task::spawn_blocking(move || query(&engine)).await {
        Ok(Ok(body)) => json_response(StatusCode::OK, &body),
        Ok(Err(err)) => query_error_response(err),
        Err(err) => {
            log::error!("query task failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn query_error_response(err: QueryError) -> Response {
    let status = match &err {
        QueryError::MissingParameter(_) | QueryError::InvalidParameter { .. } => {
            StatusCode::BAD_REQUEST
        }
        QueryError::NotFound(_) => StatusCode::NOT_FOUND,
        QueryError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if err.is_client_error() {
        error_response(status, &err.to_string())
    } else {
        log::error!("{}: {err}", err.code());
        error_response(status, "internal error")
    }
}

fn denied_response(denied: AccessDenied) -> Response {
    let status = match denied {
        AccessDenied::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        AccessDenied::MissingCredential => StatusCode::UNAUTHORIZED,
        AccessDenied::InvalidCredential => StatusCode::FORBIDDEN,
        AccessDenied::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
    };
    let mut response = error_response(status, denied.message());
    match denied {
        AccessDenied::MissingCredential => {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        AccessDenied::RateLimited { retry_after_secs } => {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        _ => {}
    }
    response
}

fn error_response(status: StatusCode, message: &str) -> Response {
    json_response(status, &ErrorBody::new(message))
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serialize_json(body) {
        Ok(json) => (status, [(CONTENT_TYPE, "application/json")], json).into_response(),
        Err(err) => {
            log::error!("failed to encode response: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
