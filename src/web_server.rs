use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    serve, Form, Json, Router,
};
use minijinja::{context, path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::advisory::{self, AdvisoryResult, ModelSettings};
use crate::backend::{should_use_live_backend, CompletionBackend};
use crate::chat::{self, ChatTranscript, ChatTurn};
use crate::config::Settings;
use crate::constants::{PAIN_POINT_CATALOG, SESSION_COOKIE, SOFTWARE_CATALOG};
use crate::error::AdvisoryError;
use crate::export::{self, ExportError};
use crate::prompt::{self, AdvisoryRequest};
use crate::questionnaire::{ApproachPreference, QuestionnaireInput};
use crate::session::{SessionState, SessionStore};
use crate::tokens;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    sessions: SessionStore,
    backend: Option<Arc<dyn CompletionBackend>>,
    settings: Arc<Settings>,
}

impl AppState {
    /// The backend to call for this session, or `None` for stub mode.
    fn live_backend(&self, ai_enabled: bool) -> Option<&dyn CompletionBackend> {
        let live = should_use_live_backend(
            ai_enabled,
            self.settings.credential_present(),
            self.settings.capabilities.live_backend,
        );
        if live {
            self.backend.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error(transparent)]
    Advisory(#[from] AdvisoryError),
    #[error("Er is nog geen advies om te downloaden.")]
    NothingToExport,
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            WebError::Template(e) => {
                error!("Failed to get or render template: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(format!("Internal Server Error: {}", e)),
                )
                    .into_response()
            }
            WebError::Advisory(AdvisoryError::InputIncomplete { missing }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "error": message, "missing": missing })),
            )
                .into_response(),
            WebError::Advisory(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": message })),
            )
                .into_response(),
            WebError::NothingToExport | WebError::Export(ExportError::Unavailable) => {
                (StatusCode::NOT_FOUND, message).into_response()
            }
            WebError::Export(ExportError::Write(_)) => {
                error!("Export failed: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

// Minijinja Environment setup
fn create_minijinja_env(settings: &Settings) -> AutoReloader {
    let dir = settings.templates_dir.clone();
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(dir.clone()));
        notifier.watch_path(&dir, true);
        Ok(env)
    })
}

fn render(state: &AppState, name: &str, ctx: minijinja::Value) -> Result<Html<String>, WebError> {
    let env = state.templates.acquire_env()?;
    let html = env.get_template(name)?.render(ctx)?;
    Ok(Html(html))
}

fn session_cookie(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

fn set_cookie(id: Uuid) -> [(header::HeaderName, String); 1] {
    [(
        header::SET_COOKIE,
        format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax"),
    )]
}

async fn session_id(state: &AppState, headers: &HeaderMap) -> Uuid {
    state.sessions.ensure(session_cookie(headers)).await
}

#[derive(Serialize)]
struct PainPointOption<'a> {
    label: &'a str,
    selected: bool,
    weight: Option<u8>,
}

#[derive(Serialize)]
struct ApproachOption {
    key: &'static str,
    label: String,
    selected: bool,
}

#[derive(Serialize)]
struct AdviceView {
    text: String,
    generated_at: String,
    source: advisory::AdvisorySource,
}

impl From<&AdvisoryResult> for AdviceView {
    fn from(result: &AdvisoryResult) -> Self {
        Self {
            text: result.text.clone(),
            generated_at: result.generated_at_display(),
            source: result.source,
        }
    }
}

/// Status line shown on every page.
fn backend_status(state: &AppState, session: &SessionState) -> String {
    if let Some(missing) = state.settings.configuration_status() {
        format!("Gratis modus: {missing}")
    } else if !session.ai_enabled {
        "Gratis modus: AI staat uit".to_string()
    } else {
        format!("AI actief ({})", session.model.model)
    }
}

fn index_context(state: &AppState, session: &SessionState, errors: &[String]) -> minijinja::Value {
    let input = session.questionnaire.clone().unwrap_or_default();
    let pain_points: Vec<PainPointOption> = PAIN_POINT_CATALOG
        .iter()
        .copied()
        .map(|label| PainPointOption {
            label,
            selected: input.pain_points.iter().any(|p| p == label),
            weight: input.weights.get(label).copied(),
        })
        .collect();
    let approaches: Vec<ApproachOption> = ApproachPreference::ALL
        .into_iter()
        .map(|a| ApproachOption {
            key: a.key(),
            label: a.to_string(),
            selected: a == input.approach,
        })
        .collect();
    let token_estimate = session
        .questionnaire
        .as_ref()
        .map(|q| tokens::estimate_request(&prompt::compose(q)));

    context! {
        title => "Procesadvies",
        software => &input.software,
        notes => &input.notes,
        software_catalog => SOFTWARE_CATALOG,
        pain_points => pain_points,
        weight_range => (1u8..=5).collect::<Vec<_>>(),
        approaches => approaches,
        ai_enabled => session.ai_enabled,
        model => &session.model.model,
        temperature => session.model.temperature,
        status => backend_status(state, session),
        missing_weights => input.missing_weights(),
        errors => errors,
        advice => session.last_advice.as_ref().map(AdviceView::from),
        token_estimate => token_estimate,
        docx_available => state.settings.capabilities.docx_export,
    }
}

async fn index_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, WebError> {
    let id = session_id(&state, &headers).await;
    let session = state.sessions.snapshot(id).await;
    let page = render(&state, "index.html", index_context(&state, &session, &[]))?;
    Ok((set_cookie(id), page).into_response())
}

/// Fields posted by the questionnaire form.
struct AdviceForm {
    input: QuestionnaireInput,
    ai_enabled: bool,
    model: Option<String>,
    temperature: Option<f32>,
}

fn parse_advice_form(fields: Vec<(String, String)>) -> AdviceForm {
    let mut form = AdviceForm {
        input: QuestionnaireInput::default(),
        ai_enabled: false,
        model: None,
        temperature: None,
    };
    for (key, value) in fields {
        let value = value.trim().to_string();
        match key.as_str() {
            "software" => form.input.software = value,
            "pain_point" => form.input.pain_points.push(value),
            "notes" => form.input.notes = value,
            "approach" => {
                form.input.approach = ApproachPreference::from_key(&value).unwrap_or_default();
            }
            "ai_enabled" => form.ai_enabled = true,
            "model" if !value.is_empty() => form.model = Some(value),
            "temperature" => {
                form.temperature = value
                    .parse::<f32>()
                    .ok()
                    .filter(|t| t.is_finite())
                    .map(|t| t.clamp(0.0, 2.0));
            }
            _ => match key.strip_prefix("weight:") {
                Some(label) if !value.is_empty() => match value.parse::<u8>() {
                    Ok(weight) => {
                        form.input.weights.insert(label.to_string(), weight);
                    }
                    Err(_) => warn!(%label, %value, "Ignoring invalid weight"),
                },
                _ => {}
            },
        }
    }
    form
}

/// Stores the questionnaire, then generates advice unless required fields are missing.
/// A refused questionnaire drops the previous advice.
async fn run_advice(state: &AppState, id: Uuid, form: AdviceForm) -> Result<(AdvisoryRequest, AdvisoryResult), AdvisoryError> {
    let mut session = state.sessions.lock(id).await;
    session.ai_enabled = form.ai_enabled;
    if let Some(model) = form.model {
        session.model.model = model;
    }
    if let Some(temperature) = form.temperature {
        session.model.temperature = temperature;
    }
    let validation = form.input.validate();
    let input = session.questionnaire.insert(form.input).clone();
    if let Err(e) = validation {
        session.last_advice = None;
        return Err(e);
    }

    let request = prompt::compose(&input);
    let backend = state.live_backend(session.ai_enabled);
    let result = advisory::generate(&request, backend.is_some(), backend, &session.model).await;
    info!(%id, source = ?result.source, "Advice generated");

    session.last_advice = Some(result.clone());
    Ok((request, result))
}

async fn advice_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let id = session_id(&state, &headers).await;
    let errors = match run_advice(&state, id, parse_advice_form(fields)).await {
        Ok(_) => Vec::new(),
        Err(e) => {
            warn!(%id, error = %e, "Advice refused");
            vec![e.to_string()]
        }
    };
    let session = state.sessions.snapshot(id).await;
    let page = render(&state, "index.html", index_context(&state, &session, &errors))?;
    Ok((set_cookie(id), page).into_response())
}

#[derive(Deserialize)]
pub struct AdviceApiRequest {
    #[serde(flatten)]
    input: QuestionnaireInput,
    ai_enabled: Option<bool>,
    model: Option<String>,
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct AdviceApiResponse {
    advice: AdvisoryResult,
    prompt: AdvisoryRequest,
    token_estimate: usize,
}

async fn api_advice_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AdviceApiRequest>,
) -> Result<Response, WebError> {
    let id = session_id(&state, &headers).await;
    let ai_enabled = match body.ai_enabled {
        Some(enabled) => enabled,
        None => state.sessions.snapshot(id).await.ai_enabled,
    };
    let form = AdviceForm {
        input: body.input,
        ai_enabled,
        model: body.model,
        temperature: body.temperature,
    };
    let (request, advice) = run_advice(&state, id, form).await?;
    let response = AdviceApiResponse {
        token_estimate: tokens::estimate_request(&request),
        prompt: request,
        advice,
    };
    Ok((set_cookie(id), Json(response)).into_response())
}

async fn chat_page(state: &AppState, id: Uuid) -> Result<Response, WebError> {
    let session = state.sessions.snapshot(id).await;
    let ctx = context! {
        title => "Vraag het de adviseur",
        turns => session.transcript.turns(),
        status => backend_status(state, &session),
    };
    let page = render(state, "chat.html", ctx)?;
    Ok((set_cookie(id), page).into_response())
}

async fn chat_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, WebError> {
    let id = session_id(&state, &headers).await;
    chat_page(&state, id).await
}

/// Runs one chat turn while holding the session, so concurrent turns and resets queue up.
async fn run_chat_turn(state: &AppState, id: Uuid, message: &str) -> (ChatTurn, ChatTranscript) {
    let mut session = state.sessions.lock(id).await;
    let backend = state.live_backend(session.ai_enabled);
    let model = session.model.clone();
    let reply = chat::respond(&mut session.transcript, message, backend.is_some(), backend, &model).await;
    (reply, session.transcript.clone())
}

#[derive(Deserialize)]
pub struct ChatInput {
    message: String,
}

async fn chat_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(input): Form<ChatInput>,
) -> Result<Response, WebError> {
    let id = session_id(&state, &headers).await;
    if !input.message.trim().is_empty() {
        run_chat_turn(&state, id, input.message.trim()).await;
    }
    chat_page(&state, id).await
}

#[derive(Serialize)]
struct ChatApiResponse {
    reply: ChatTurn,
    transcript: ChatTranscript,
}

async fn api_chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ChatInput>,
) -> Response {
    let id = session_id(&state, &headers).await;
    let (reply, transcript) = run_chat_turn(&state, id, input.message.trim()).await;
    (set_cookie(id), Json(ChatApiResponse { reply, transcript })).into_response()
}

async fn reset_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let id = session_id(&state, &headers).await;
    state.sessions.update(id, SessionState::reset).await;
    info!(%id, "Session reset");
    (set_cookie(id), Redirect::to("/")).into_response()
}

async fn api_reset_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let id = session_id(&state, &headers).await;
    state.sessions.update(id, SessionState::reset).await;
    info!(%id, "Session reset");
    (set_cookie(id), StatusCode::NO_CONTENT).into_response()
}

#[derive(Serialize)]
struct StatusResponse {
    backend_ready: bool,
    credential_present: bool,
    ai_enabled: bool,
    live: bool,
    capabilities: crate::config::Capabilities,
    model: ModelSettings,
    message: String,
}

async fn api_status_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let id = session_id(&state, &headers).await;
    let session = state.sessions.snapshot(id).await;
    let status = StatusResponse {
        backend_ready: state.settings.backend_ready(),
        credential_present: state.settings.credential_present(),
        ai_enabled: session.ai_enabled,
        live: state.live_backend(session.ai_enabled).is_some(),
        capabilities: state.settings.capabilities,
        model: session.model.clone(),
        message: backend_status(&state, &session),
    };
    (set_cookie(id), Json(status)).into_response()
}

async fn exportable(state: &AppState, headers: &HeaderMap) -> Result<(QuestionnaireInput, AdvisoryResult), WebError> {
    let id = session_id(state, headers).await;
    let session = state.sessions.snapshot(id).await;
    match (session.questionnaire, session.last_advice) {
        (Some(input), Some(advice)) => Ok((input, advice)),
        _ => Err(WebError::NothingToExport),
    }
}

fn attachment(filename: &str, content_type: &'static str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response()
}

async fn markdown_download_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, WebError> {
    let (input, advice) = exportable(&state, &headers).await?;
    let filename = export::export_filename(&input.software, &advice.generated_at, "md");
    let body = export::markdown_document(&input, &advice);
    Ok(attachment(&filename, "text/markdown; charset=utf-8", body.into_bytes()))
}

async fn docx_download_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, WebError> {
    let (input, advice) = exportable(&state, &headers).await?;
    let filename = export::export_filename(&input.software, &advice.generated_at, "docx");
    let bytes = export::docx_document(&export::document_title(&input.software), &advice.text)?;
    Ok(attachment(
        &filename,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        bytes,
    ))
}

/// Builds the application router. `backend` is the live client, if any.
pub fn router(settings: Settings, backend: Option<Arc<dyn CompletionBackend>>) -> Router {
    let templates = create_minijinja_env(&settings);
    let state = AppState {
        templates: Arc::new(templates),
        sessions: SessionStore::new(settings.ai_enabled, settings.model.clone()),
        backend,
        settings: Arc::new(settings),
    };

    // Serve static files from the configured directory
    let static_files_service = ServeDir::new(&state.settings.static_dir).not_found_service(
        tower::service_fn(|_: Request| async {
            Ok::<_, Infallible>((StatusCode::NOT_FOUND, "Niet gevonden").into_response())
        }),
    );

    Router::new()
        .route("/", get(index_handler))
        .route("/advice", post(advice_form_handler))
        .route("/chat", get(chat_handler).post(chat_form_handler))
        .route("/reset", post(reset_handler))
        .route("/download/advies.md", get(markdown_download_handler))
        .route("/download/advies.docx", get(docx_download_handler))
        .route("/api/status", get(api_status_handler))
        .route("/api/advice", post(api_advice_handler))
        .route("/api/chat", post(api_chat_handler))
        .route("/api/reset", post(api_reset_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(host: &str, port: u16, settings: Settings) -> Result<()> {
    let backend = settings.build_backend().map(Arc::from);
    let app = router(settings, backend);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context(format!("Invalid listen address {host}:{port}"))?;
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
