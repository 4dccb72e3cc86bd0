use std::sync::Arc;

use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ConsoleConfig;
use crate::error::ConsoleError;
use crate::model::{parse_events, Event};
use crate::roster::{GlDirectory, GroupLeader, LeaderSource};
use crate::selection::{
    DeepLink, FinalizeOptions, NoopRenderer, ScheduleOverride, ScheduleView, SelectionReconciler,
    SessionState,
};
use crate::store::StoreReader;
use crate::tokens::TokenRegistry;

pub struct AppState {
    pub store: Arc<dyn StoreReader>,
    pub directory: GlDirectory,
    pub tokens: TokenRegistry,
    pub config: ConsoleConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn StoreReader>, config: ConsoleConfig) -> Self {
        Self {
            directory: GlDirectory::new(
                Arc::clone(&store),
                config.store.clone(),
                config.groups.clone(),
            ),
            tokens: TokenRegistry::new(Arc::clone(&store), config.store.tokens_path.clone(), &config.tokens),
            store,
            config,
        }
    }

    async fn events(&self) -> crate::error::Result<Vec<Event>> {
        let raw = self.store.fetch_value(&self.config.store.events_path).await?;
        Ok(parse_events(raw.as_ref()))
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Deserialize)]
pub struct LeadersQuery {
    group: String,
    schedule: Option<String>,
    #[serde(default)]
    reload: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadersResponse {
    event_id: String,
    group: String,
    schedule_id: Option<String>,
    leaders: Vec<GroupLeader>,
}

#[derive(Deserialize)]
pub struct MintRequest {
    count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    selected_event_id: Option<String>,
    selected_schedule_id: Option<String>,
    schedule: Option<ScheduleView>,
    overrides: Vec<ScheduleOverride>,
    notice: Option<String>,
    known_locations: Vec<String>,
}

const MAX_MINT: usize = 500;

fn error_response(err: &ConsoleError) -> HttpResponse {
    let body = serde_json::json!({"success": false, "error": err.to_string()});
    match err {
        ConsoleError::NotFound(_) => HttpResponse::NotFound().json(body),
        ConsoleError::Auth(_) => HttpResponse::Unauthorized().json(body),
        _ => HttpResponse::BadGateway().json(body),
    }
}

fn is_admin(req: &HttpRequest, state: &AppState) -> bool {
    req.headers()
        .get("X-Admin-Password")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|password| password == state.config.server.admin_password)
}

// Admin login endpoint
async fn admin_login(req: web::Json<LoginRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if req.password == state.config.server.admin_password {
        Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
    } else {
        Ok(HttpResponse::Unauthorized().json(serde_json::json!({"success": false, "error": "Invalid password"})))
    }
}

async fn list_events(state: web::Data<AppState>) -> Result<HttpResponse> {
    match state.events().await {
        Ok(events) => Ok(HttpResponse::Ok().json(events)),
        Err(err) => Ok(error_response(&err)),
    }
}

async fn group_leaders(
    path: web::Path<String>,
    query: web::Query<LeadersQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let event_id = path.into_inner();
    let query = query.into_inner();

    if query.reload {
        if let Err(err) = state.directory.load_event(&event_id, true).await {
            return Ok(error_response(&err));
        }
    }

    let schedule_id = query.schedule.unwrap_or_default();
    match state
        .directory
        .collect_leaders(&query.group, LeaderSource::Event(&event_id), &schedule_id)
        .await
    {
        Ok(leaders) => Ok(HttpResponse::Ok().json(LeadersResponse {
            event_id,
            group: query.group,
            schedule_id: Some(schedule_id).filter(|s| !s.is_empty()),
            leaders,
        })),
        Err(err) => Ok(error_response(&err)),
    }
}

async fn mint_tokens(
    req: HttpRequest,
    body: web::Json<MintRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&req, &state) {
        return Ok(HttpResponse::Unauthorized().json(serde_json::json!({"success": false, "error": "Unauthorized"})));
    }
    if body.count == 0 || body.count > MAX_MINT {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": format!("count must be between 1 and {}", MAX_MINT)
        })));
    }

    match state.tokens.mint(body.count).await {
        Ok(tokens) => Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "tokens": tokens}))),
        Err(err) => Ok(error_response(&err)),
    }
}

/// Resolves a deep link against the current events, the way a freshly
/// opened console would.
async fn resolve_session(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    let events = match state.events().await {
        Ok(events) => events,
        Err(err) => return Ok(error_response(&err)),
    };

    let mut session = SessionState::new(DeepLink::from_query(req.query_string()));
    session.events = events;
    SelectionReconciler::new(NoopRenderer).finalize_load(&mut session, FinalizeOptions::default());

    Ok(HttpResponse::Ok().json(SessionResponse {
        schedule: session.effective_schedule(),
        selected_event_id: session.selected_event_id,
        selected_schedule_id: session.selected_schedule_id,
        overrides: session.overrides.into_values().collect(),
        notice: session.notice,
        known_locations: session.known_locations.into_iter().collect(),
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/login", web::post().to(admin_login))
        .route("/api/events", web::get().to(list_events))
        .route("/api/events/{event_id}/leaders", web::get().to(group_leaders))
        .route("/api/tokens", web::post().to(mint_tokens))
        .route("/api/session", web::get().to(resolve_session));
}

pub async fn start_server(state: AppState) -> std::io::Result<()> {
    let port = state.config.server.port;
    let app_state = web::Data::new(state);
    info!(port, "Starting web server");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
