use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::AppConfig;
use crate::dashboard::{self, Dashboard, DashboardView};
use crate::downloader;
use crate::error::DashboardError;
use crate::filter::{FilterSet, Selection};
use crate::graph::{self, GraphOptions};
use crate::loader::{self, LoadedTable};
use crate::mailer::{MailAttachment, Mailer};
use crate::profile::DashboardProfile;
use crate::report;
use crate::session::SessionStore;
use crate::table::Table;

const SESSION_COOKIE: &str = "session";
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// A table loaded at startup, shared by every session that never uploaded
struct Preloaded {
    name: String,
    table: Arc<Table>,
    sheet_names: Vec<String>,
}

pub struct AppState {
    config: AppConfig,
    profile: DashboardProfile,
    preloaded: Option<Preloaded>,
    sessions: Mutex<SessionStore>,
}

impl AppState {
    /// Build the state from configuration, loading `data_path` if set
    pub fn new(config: AppConfig) -> Result<Self, DashboardError> {
        let profile = config.dashboard_profile()?;
        let preloaded = match &config.data_path {
            Some(path) => {
                let mut loaded = loader::load_table(path)?;
                loaded.table = dashboard::prepare_table(loaded.table, &profile)?;
                Some((path.display().to_string(), loaded))
            }
            None => None,
        };
        Ok(Self::with_data(config, profile, preloaded))
    }

    /// Build the state around an already loaded table
    pub fn with_data(
        config: AppConfig,
        profile: DashboardProfile,
        preloaded: Option<(String, LoadedTable)>,
    ) -> Self {
        AppState {
            config,
            profile,
            preloaded: preloaded.map(|(name, loaded)| Preloaded {
                name,
                table: Arc::new(loaded.table),
                sheet_names: loaded.sheet_names,
            }),
            sessions: Mutex::new(SessionStore::new()),
        }
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    fn sessions(&self) -> MutexGuard<'_, SessionStore> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The id of the caller's live session, if the cookie names one
    fn existing_session(&self, jar: &CookieJar) -> Option<String> {
        let cookie = jar.get(SESSION_COOKIE)?;
        let mut store = self.sessions();
        store.get_mut(cookie.value())?;
        Some(cookie.value().to_string())
    }

    /// Find the caller's session, creating one (and its cookie) if needed
    fn session_id(&self, jar: CookieJar) -> (CookieJar, String) {
        if let Some(id) = self.existing_session(&jar) {
            return (jar, id);
        }
        let id = self.sessions().create();
        let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
            .path("/")
            .http_only(true);
        (jar.add(cookie), id)
    }

    /// The session's table and its current filters
    ///
    /// Sessions that never uploaded anything fall back to the preloaded
    /// table, if one is configured.
    fn current(
        &self,
        id: &str,
        requested: &HashMap<String, Selection>,
    ) -> Result<(Arc<Table>, FilterSet), DashboardError> {
        let mut store = self.sessions();
        let session = store.get_mut(id).ok_or(DashboardError::NoSession)?;

        if session.table.is_none() {
            if let Some(preloaded) = &self.preloaded {
                session.load_shared(
                    preloaded.name.clone(),
                    Arc::clone(&preloaded.table),
                    preloaded.sheet_names.clone(),
                );
            }
        }
        let table = session.table.clone().ok_or(DashboardError::NoSession)?;
        let filters = session.update_filters(&table, &self.profile.filters, requested);
        Ok((table, filters))
    }

    /// Table and filters for a read-only request
    ///
    /// Never creates a session: callers without one see the preloaded table
    /// unfiltered.
    fn snapshot(&self, jar: &CookieJar) -> Result<(Arc<Table>, FilterSet), DashboardError> {
        match self.existing_session(jar) {
            Some(id) => self.current(&id, &HashMap::new()),
            None => self
                .preloaded
                .as_ref()
                .map(|p| (Arc::clone(&p.table), FilterSet::new()))
                .ok_or(DashboardError::NoSession),
        }
    }

    fn snapshot_view(&self, jar: &CookieJar) -> Result<DashboardView, DashboardError> {
        let (table, filters) = self.snapshot(jar)?;
        Ok(Dashboard::new(&table, &self.profile)?.build(&filters))
    }
}

/// Errors returned by the JSON API
#[derive(Debug)]
pub enum ApiError {
    Dashboard(DashboardError),
    BadRequest(String),
}

impl From<DashboardError> for ApiError {
    fn from(e: DashboardError) -> Self {
        ApiError::Dashboard(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Dashboard(e) => {
                let status = match &e {
                    DashboardError::MissingColumns(_)
                    | DashboardError::InvalidNumber { .. }
                    | DashboardError::UnsupportedFormat(_)
                    | DashboardError::EmptyFile
                    | DashboardError::Csv(_)
                    | DashboardError::Excel(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    DashboardError::NoSession
                    | DashboardError::UnknownChart(_)
                    | DashboardError::UnknownProfile(_) => StatusCode::NOT_FOUND,
                    DashboardError::EmptySeries(_) => StatusCode::CONFLICT,
                    DashboardError::Mail(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };
        if status.is_server_error() {
            error!("{}", message);
        }
        (
            status,
            Json(StatusResponse {
                status: "error".to_string(),
                message: Some(message),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct UploadResponse {
    status: String,
    filename: String,
    columns: Vec<String>,
    rows: usize,
    sheet_names: Vec<String>,
}

#[derive(Deserialize, Default)]
struct DashboardRequest {
    #[serde(default)]
    filters: HashMap<String, Selection>,
}

#[derive(Deserialize)]
struct EmailRequest {
    to: String,
    chart: String,
}

/// Build the router for a given state
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();
    Router::new()
        .route("/", get(serve_dashboard))
        .route("/api/upload", post(upload))
        .route("/api/dashboard", get(get_dashboard).post(update_dashboard))
        .route("/api/chart/:name", get(chart_png))
        .route("/api/export/csv", get(export_csv))
        .route("/api/export/xlsx", get(export_xlsx))
        .route("/api/export/pdf", get(export_pdf))
        .route("/api/export/summary/:name", get(export_summary))
        .route("/api/email", post(email_chart))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bind = config.bind.clone();
    let state = Arc::new(AppState::new(config)?);
    info!("Using dashboard profile {}", state.profile.name);

    let listener = TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", bind);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(CookieJar, Json<UploadResponse>), ApiError> {
    let mut multipart = multipart?;
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload.csv").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            file = Some((filename, bytes.to_vec()));
        }
    }

    let Some((filename, bytes)) = file else {
        return Err(ApiError::BadRequest("No file data received".to_string()));
    };
    if bytes.is_empty() {
        return Err(DashboardError::EmptyFile.into());
    }

    let loaded = loader::load_upload(&filename, bytes)?;
    let table = dashboard::prepare_table(loaded.table, &state.profile)?;

    let (jar, id) = state.session_id(jar);
    let response = UploadResponse {
        status: "ok".to_string(),
        filename: filename.clone(),
        columns: table.columns.clone(),
        rows: table.len(),
        sheet_names: loaded.sheet_names.clone(),
    };

    let mut store = state.sessions();
    let session = store.get_mut(&id).ok_or(DashboardError::NoSession)?;
    session.load(filename, table, loaded.sheet_names);

    Ok((jar, Json(response)))
}

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<DashboardView>), ApiError> {
    render_dashboard(&state, jar, &HashMap::new())
}

async fn update_dashboard(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Result<Json<DashboardRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<DashboardView>), ApiError> {
    let Json(request) = request?;
    render_dashboard(&state, jar, &request.filters)
}

fn render_dashboard(
    state: &AppState,
    jar: CookieJar,
    requested: &HashMap<String, Selection>,
) -> Result<(CookieJar, Json<DashboardView>), ApiError> {
    let (jar, id) = state.session_id(jar);
    let (table, filters) = state.current(&id, requested)?;
    let view = Dashboard::new(&table, &state.profile)?.build(&filters);
    Ok((jar, Json(view)))
}

async fn chart_png(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let view = state.snapshot_view(&jar)?;
    let chart = view.chart(&name)?.clone();
    let png = tokio::task::spawn_blocking(move || {
        graph::create_graph(&chart.series, &GraphOptions::for_chart(&chart))
    })
    .await
    .map_err(|e| DashboardError::Chart(e.to_string()))??;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn export_csv(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let (table, filters) = state.snapshot(&jar)?;
    let filtered = Dashboard::new(&table, &state.profile)?.filtered(&filters);
    let csv = downloader::to_csv(&filtered)?;
    info!("Exported {} rows as CSV", filtered.len());
    Ok(download(csv.into_bytes(), "text/csv", downloader::CSV_FILENAME))
}

async fn export_xlsx(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let (table, filters) = state.snapshot(&jar)?;
    let filtered = Dashboard::new(&table, &state.profile)?.filtered(&filters);
    let xlsx = downloader::to_xlsx(&filtered, "Filtered")?;
    info!("Exported {} rows as XLSX", filtered.len());
    Ok(download(xlsx, XLSX_MIME, downloader::XLSX_FILENAME))
}

async fn export_summary(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let view = state.snapshot_view(&jar)?;
    let summary = dashboard::summary_table(view.chart(&name)?);
    let xlsx = downloader::to_xlsx(&summary, "Summary")?;
    Ok(download(xlsx, XLSX_MIME, &downloader::summary_filename(&name)))
}

async fn export_pdf(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let view = state.snapshot_view(&jar)?;
    let pdf = tokio::task::spawn_blocking(move || report::dashboard_pdf(&view))
        .await
        .map_err(|e| DashboardError::Pdf(e.to_string()))??;
    Ok(download(pdf, "application/pdf", report::PDF_FILENAME))
}

async fn email_chart(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(request) = request?;
    let view = state.snapshot_view(&jar)?;
    let chart = view.chart(&request.chart)?.clone();
    let settings = state.config.smtp.clone();

    tokio::task::spawn_blocking(move || {
        let mailer = Mailer::new(&settings)?;
        let png = graph::create_graph(&chart.series, &GraphOptions::for_chart(&chart))?;
        mailer.send_report(
            &request.to,
            &chart.title,
            &format!("{} ({} rows).", view.title, view.filtered_row_count),
            &[MailAttachment {
                filename: format!("{}.png", chart.name),
                content_type: "image/png".to_string(),
                data: png,
            }],
        )
    })
    .await
    .map_err(|e| DashboardError::Mail(e.to_string()))??;

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        message: None,
    }))
}

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn download(bytes: Vec<u8>, content_type: &'static str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}
