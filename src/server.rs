//! HTTP page-serving shell.
//!
//! Routes, all under the configured plugin path:
//!
//! ```text
//! GET|POST /:page?id=<logical id>&kind=<kind>   render pass + claim
//! POST     /messages                            inbound message delivery (full access only)
//! GET      /static/*                            static assets
//! GET      /health                              store counters
//! ```
//!
//! A POST may carry `id` and `kind` as an urlencoded form body instead.
//!
//! A page that is still waiting for its reply renders a meta refresh, so the
//! browser re-issues the claim on the next request instead of the server
//! blocking.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, OriginalUri, Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use handlebars::html_escape;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::config::BridgeConfig;
use crate::gate::{CallerTrust, RenderPass};
use crate::identifier::LogicalId;
use crate::ingest::MessageSender;
use crate::message::Message;
use crate::page::{PageRegistry, PageRenderer, Refresh};
use crate::properties::PropertyStore;
use crate::service::{CorrelationService, StoreStats};

// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub service: Arc<CorrelationService>,
    pub pages: Arc<PageRegistry>,
    pub renderer: Arc<PageRenderer>,
    pub properties: Arc<dyn PropertyStore>,
    pub inbound: MessageSender,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimQuery {
    pub id: Option<String>,
    pub kind: Option<String>,
}

impl ClaimQuery {
    /// Fill whatever the query string left out from a form body.
    fn or(self, body: ClaimQuery) -> Self {
        Self {
            id: self.id.or(body.id),
            kind: self.kind.or(body.kind),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub messages: usize,
    pub redirects: usize,
}

pub fn create_router(state: AppState) -> Router {
    let plugin = Router::new()
        .route("/health", get(health_check))
        .route("/messages", post(deliver_message))
        .route("/:page", get(serve_page).post(serve_page))
        .nest_service("/static", ServeDir::new(&state.config.static_dir));

    let base = state.config.plugin_path.clone();
    let app = if base.is_empty() || base == "/" {
        Router::new().merge(plugin)
    } else {
        Router::new().nest(&base, plugin)
    };

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    match state.service.stats() {
        Ok(StoreStats {
            messages,
            redirects,
        }) => Ok(Json(HealthResponse {
            status: "ok".to_string(),
            messages,
            redirects,
        })),
        Err(e) => {
            error!(?e, "Health check failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn deliver_message(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(message): Json<Message>,
) -> StatusCode {
    if state.config.trust_for(peer.ip()) != CallerTrust::Full {
        warn!(%peer, "Message delivery refused for restricted host");
        return StatusCode::FORBIDDEN;
    }
    match state.inbound.send(message).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            error!("Ingest loop is not running");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn serve_page(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(page): Path<String>,
    Query(query): Query<ClaimQuery>,
    OriginalUri(uri): OriginalUri,
    form: Option<Form<ClaimQuery>>,
) -> Response {
    let query = match form {
        Some(Form(body)) => query.or(body),
        None => query,
    };

    let Some(spec) = state.pages.get(&page).await else {
        return (StatusCode::NOT_FOUND, "Page not found").into_response();
    };

    let trust = state.config.trust_for(peer.ip());
    let mut pass = RenderPass::begin(trust, spec.full_access_only);
    let mut refresh = None;

    if pass.is_rendering() {
        match (query.id, query.kind) {
            (Some(id), Some(kind)) => {
                let id = LogicalId::new(id);
                match state.service.claim(&id, &kind) {
                    Ok(Some(claim)) => {
                        record_claim(state.properties.as_ref(), &spec.name).await;
                        match claim.redirect.as_deref().filter(|t| !t.is_empty()) {
                            Some(target) if HeaderValue::try_from(target).is_ok() => {
                                info!(
                                    page = %spec.name,
                                    id = %id,
                                    %target,
                                    "Redirecting claimed request"
                                );
                                return Redirect::to(target).into_response();
                            }
                            Some(target) => {
                                warn!(
                                    page = %spec.name,
                                    id = %id,
                                    ?target,
                                    "Redirect target is not a valid Location, rendering reply"
                                );
                            }
                            None => {}
                        }
                        pass.add_box(
                            format!("{kind} for {id}"),
                            &fields_table(&claim.message),
                            Some("reply"),
                        );
                    }
                    Ok(None) => {
                        pass.add_box(
                            "Waiting",
                            &format!(
                                "<p>Waiting for {} on request {}.</p>",
                                html_escape(&kind),
                                html_escape(id.as_str())
                            ),
                            None,
                        );
                        refresh = Some(Refresh::every(state.config.refresh_secs));
                    }
                    Err(e) => {
                        error!(?e, page = %spec.name, "Claim failed");
                        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                    }
                }
            }
            _ => pass.add_box(spec.title.clone(), "<p>No request pending.</p>", None),
        }
    }

    let finished = pass.finish();
    match state.renderer.render(
        &spec.title,
        &finished,
        refresh.as_ref(),
        uri.path(),
        uri.query(),
    ) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(?e, request_id = %finished.request_id, "Page render failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn fields_table(message: &Message) -> String {
    let mut html = String::from("<table>");
    for (name, value) in &message.fields {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            html_escape(name),
            html_escape(value)
        ));
    }
    html.push_str("</table>");
    html
}

/// Bump the per-page claim counter. Failures are logged, never surfaced.
async fn record_claim(properties: &dyn PropertyStore, page: &str) {
    let key = format!("claims.{page}");
    if let Err(e) = properties.increment_int(&key, 1).await {
        warn!(error = %e, %key, "Failed to record claim");
        return;
    }
    if let Err(e) = properties.save().await {
        warn!(error = %e, "Failed to save properties");
    }
}
