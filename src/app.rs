use crate::chain;
use crate::chain::StageData;
use crate::error::PipelineError;
use crate::normalize::SummaryRecord;
use crate::sessions;
use crate::transcription;
use crate::transcription::TranscriptionError;
use crate::AppState;
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, Registry};
use tracing_tree::HierarchicalLayer;

// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

fn pipeline_error(e: PipelineError) -> (StatusCode, String) {
    (e.status(), e.to_string())
}

fn transcription_error(e: TranscriptionError) -> (StatusCode, String) {
    let status = match e {
        TranscriptionError::AudioFileMissing(_) => StatusCode::NOT_FOUND,
        TranscriptionError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

#[derive(Debug, Deserialize)]
struct StartSessionRequest {
    session_type: String,
    /// Start timestamp in milliseconds
    timestamp: i64,
}

#[derive(Debug, Serialize)]
struct StartSessionResponse {
    session_id: String,
}

#[axum::debug_handler]
async fn start_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, (StatusCode, String)> {
    let session_id = sessions::create_session(
        &state,
        &request.session_type,
        request.timestamp,
    )
    .await
    .map_err(pipeline_error)?;

    Ok(Json(StartSessionResponse { session_id }))
}

#[derive(Debug, Deserialize)]
struct StoreSessionRequest {
    session_id: String,
    transcript: String,
    summary: String,
    notes: Option<String>,
    /// End timestamp in milliseconds
    timestamp: i64,
}

#[axum::debug_handler]
async fn store_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StoreSessionRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    if sessions::get_session(&state, &request.session_id)
        .await
        .map_err(pipeline_error)?
        .is_none()
    {
        return Err((
            StatusCode::NOT_FOUND,
            "Session not found".to_string(),
        ));
    }

    let updated = sessions::update_session_end(
        &state,
        &request.session_id,
        request.timestamp,
        request.notes.as_deref(),
    )
    .await
    .map_err(pipeline_error)?;
    if !updated {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update session".to_string(),
        ));
    }

    if !request.transcript.is_empty() {
        sessions::insert_transcript(
            &state,
            &request.session_id,
            &request.transcript,
            None,
            None,
        )
        .await
        .map_err(pipeline_error)?;
    }

    if !request.summary.is_empty() {
        let record = SummaryRecord {
            summary: request.summary.clone(),
            ..SummaryRecord::default()
        };
        sessions::insert_summary(&state, &request.session_id, &record)
            .await
            .map_err(pipeline_error)?;
    }

    Ok(Json(json!({ "message": "Session stored successfully" })))
}

#[axum::debug_handler]
async fn get_session_detail(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<sessions::SessionDetail>, (StatusCode, String)> {
    let detail = sessions::get_session_detail(&state, &session_id)
        .await
        .map_err(pipeline_error)?
        .ok_or_else(|| {
            (StatusCode::NOT_FOUND, "Session not found".to_string())
        })?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
struct SessionListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SessionListResponse {
    sessions: Vec<sessions::SessionListItem>,
}

#[axum::debug_handler]
async fn get_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<SessionListResponse>, (StatusCode, String)> {
    let sessions = sessions::get_sessions_list(
        &state,
        query.limit.unwrap_or(100),
        query.offset.unwrap_or(0),
    )
    .await
    .map_err(pipeline_error)?;
    Ok(Json(SessionListResponse { sessions }))
}

#[axum::debug_handler]
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let deleted = sessions::delete_session(&state, &session_id)
        .await
        .map_err(pipeline_error)?;
    if !deleted {
        return Err((
            StatusCode::NOT_FOUND,
            "Session not found".to_string(),
        ));
    }
    Ok(Json(json!({ "message": "Session deleted successfully" })))
}

#[derive(Debug, Deserialize)]
struct TranscribeRequest {
    session_id: String,
    audio_path: String,
}

#[derive(Debug, Serialize)]
struct TranscribeResponse {
    transcript: String,
}

#[axum::debug_handler]
async fn transcribe_audio(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TranscribeRequest>,
) -> Result<Json<TranscribeResponse>, (StatusCode, String)> {
    if sessions::get_session(&state, &request.session_id)
        .await
        .map_err(pipeline_error)?
        .is_none()
    {
        return Err((
            StatusCode::NOT_FOUND,
            "Session not found".to_string(),
        ));
    }

    let audio_path = PathBuf::from(&request.audio_path);

    // whisper.cpp only reads flac, mp3, ogg, and wav; anything else
    // (typically browser-recorded WebM) is converted first.
    let supported = matches!(
        audio_path.extension().and_then(|e| e.to_str()),
        Some("flac") | Some("mp3") | Some("ogg") | Some("wav")
    );
    let transcript = if supported {
        state
            .transcriber
            .transcribe(&audio_path)
            .await
            .map_err(transcription_error)?
    } else {
        let wav_path = audio_path.with_extension("wav");
        transcription::convert_to_wav(
            &audio_path,
            &wav_path,
            state.transcriber.timeout,
        )
        .await
        .map_err(transcription_error)?;
        state
            .transcriber
            .transcribe(&wav_path)
            .await
            .map_err(transcription_error)?
    };

    let chunk_id = sessions::insert_audio_chunk(
        &state,
        &request.session_id,
        &request.audio_path,
        None,
    )
    .await
    .map_err(pipeline_error)?;

    sessions::insert_transcript(
        &state,
        &request.session_id,
        &transcript,
        Some(chunk_id),
        Some("en"),
    )
    .await
    .map_err(pipeline_error)?;

    Ok(Json(TranscribeResponse { transcript }))
}

#[derive(Debug, Deserialize)]
struct SummarizeRequest {
    session_id: String,
    transcript: String,
    session_type: String,
}

#[derive(Debug, Serialize)]
struct SummarizeResponse {
    summary: String,
    repetition_json: Vec<String>,
    agitation_score: f64,
    mood_label: String,
}

// Single-stage pipeline: summary straight from the transcript.
#[axum::debug_handler]
async fn summarize_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, (StatusCode, String)> {
    let record = chain::summarize_session(
        &state,
        &request.session_id,
        &request.session_type,
        &request.transcript,
    )
    .await
    .map_err(pipeline_error)?;

    Ok(Json(SummarizeResponse {
        summary: record.summary,
        repetition_json: record.repeated_questions,
        agitation_score: record.agitation_score,
        mood_label: record.mood_label,
    }))
}

#[derive(Debug, Deserialize)]
struct ExtractRequest {
    transcript: String,
}

#[derive(Debug, Serialize)]
struct StageDataResponse {
    data: StageData,
}

#[axum::debug_handler]
async fn chain_extract(
    State(state): State<Arc<AppState>>,
    Path(pipeline): Path<String>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<StageDataResponse>, (StatusCode, String)> {
    let data = chain::run_extract(&state, &pipeline, &request.transcript)
        .await
        .map_err(pipeline_error)?;
    Ok(Json(StageDataResponse { data }))
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    extracted_data: StageData,
}

#[axum::debug_handler]
async fn chain_analyze(
    State(state): State<Arc<AppState>>,
    Path(pipeline): Path<String>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<StageDataResponse>, (StatusCode, String)> {
    let data = chain::run_analyze(&state, &pipeline, &request.extracted_data)
        .await
        .map_err(pipeline_error)?;
    Ok(Json(StageDataResponse { data }))
}

#[derive(Debug, Deserialize)]
struct ChainSummarizeRequest {
    session_id: String,
    extracted_data: StageData,
    analyzed_data: StageData,
}

#[derive(Debug, Serialize)]
struct ChainSummarizeResponse {
    summary: String,
    tone: String,
    repeated_questions: Vec<String>,
    key_moments: Vec<String>,
    tags: Vec<String>,
    agitation_score: f64,
    mood_label: String,
}

#[axum::debug_handler]
async fn chain_summarize(
    State(state): State<Arc<AppState>>,
    Path(pipeline): Path<String>,
    Json(request): Json<ChainSummarizeRequest>,
) -> Result<Json<ChainSummarizeResponse>, (StatusCode, String)> {
    let record = chain::run_summarize(
        &state,
        &pipeline,
        &request.session_id,
        &request.extracted_data,
        &request.analyzed_data,
    )
    .await
    .map_err(pipeline_error)?;

    Ok(Json(ChainSummarizeResponse {
        summary: record.summary,
        tone: record.mood_label.clone(),
        repeated_questions: record.repeated_questions,
        key_moments: record.key_moments,
        tags: record.tags,
        agitation_score: record.agitation_score,
        mood_label: record.mood_label,
    }))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/start-session", post(start_session))
        .route("/api/store-session", post(store_session))
        .route("/api/sessions", get(get_sessions))
        .route(
            "/api/session/{session_id}",
            get(get_session_detail).delete(delete_session),
        )
        .route("/api/transcribe", post(transcribe_audio))
        .route("/api/summarize", post(summarize_session))
        .route("/api/chain/{pipeline}/extract", post(chain_extract))
        .route("/api/chain/{pipeline}/analyze", post(chain_analyze))
        .route("/api/chain/{pipeline}/summarize", post(chain_summarize))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Parser, Debug)]
struct Args {
    /// Path to the carelink database
    #[arg(long, default_value = "data/carelink.db", env = "CARELINK_DB")]
    db: String,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 3020)]
    port: u16,

    /// Ollama API base URL
    #[arg(
        long,
        default_value = "http://localhost:11434",
        env = "OLLAMA_URL"
    )]
    ollama_url: String,

    /// Model used for summary generation
    #[arg(
        long,
        default_value = "gemma3n:latest",
        env = "GENERATION_MODEL"
    )]
    generation_model: String,

    /// Generation request timeout in seconds
    #[arg(long, default_value_t = 120)]
    generation_timeout: u64,

    /// Path to the whisper-cli binary
    #[arg(
        long,
        default_value = "whisper.cpp/build/bin/whisper-cli",
        env = "WHISPER_BINARY"
    )]
    whisper_binary: PathBuf,

    /// Path to the whisper model
    #[arg(
        long,
        default_value = "whisper.cpp/models/ggml-base.en.bin",
        env = "WHISPER_MODEL"
    )]
    whisper_model: PathBuf,

    /// Transcription timeout in seconds
    #[arg(long, default_value_t = 300)]
    transcription_timeout: u64,
}

fn check_file_is_writable(path: &str) -> Result<()> {
    let file_path = std::path::Path::new(path);
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(anyhow::anyhow!(
                "Directory for database at '{}' does not exist. Please create it manually.",
                parent.display()
            ));
        }
    }
    Ok(())
}

pub async fn serve() -> Result<()> {
    // Initialize logging with tracing
    let subscriber = Registry::default()
        .with(
            HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        );

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Parse command line arguments
    let args = Args::parse();

    info!("Starting carelink service");

    info!("Checking if carelink database is writable");
    check_file_is_writable(&args.db)?;

    let manager = crate::connection_manager(&args.db);
    let db_pool = r2d2::Pool::new(manager)?;

    // Initialize database schema
    {
        let mut conn = db_pool.get()?;
        crate::init_carelink_db(&mut conn)?;
    }

    info!("Using Ollama API URL: {}", args.ollama_url);

    let state = crate::create_app_state(crate::AppConfig {
        db_pool,
        ollama_url: args.ollama_url,
        generation_model: args.generation_model,
        generation_timeout_secs: args.generation_timeout,
        whisper_binary: args.whisper_binary,
        whisper_model: args.whisper_model,
        transcription_timeout_secs: args.transcription_timeout,
    });

    // Start web server
    let app = routes(state);
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received CTRL-C, shutting down");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
