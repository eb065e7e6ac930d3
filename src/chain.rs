use crate::error::PipelineError;
use crate::normalize::{self, SummaryRecord};
use crate::sessions;
use crate::templates::{self, Stage};
use crate::AppState;
use serde_json::{Map, Value};
use tracing::{info, instrument};

/// Opaque payload passed between chain stages. The model decides the
/// shape; downstream stages treat it as an arbitrary JSON mapping.
pub type StageData = Map<String, Value>;

fn pretty_json(data: &StageData) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// Extract stage: structured facts out of a raw transcript.
#[instrument(skip(state, transcript), err)]
pub async fn run_extract(
    state: &AppState,
    pipeline: &str,
    transcript: &str,
) -> Result<StageData, PipelineError> {
    let prompt = templates::render(
        pipeline,
        Stage::Extract,
        &[("transcript", transcript)],
    )?;
    let raw = state
        .generation_client
        .generate(&prompt, state.generation_timeout)
        .await?;
    normalize::extract_object(&raw)
}

/// Analyze stage: analysis signals from the extracted mapping. The
/// mapping was already validated by the extract stage; its internal
/// shape is not re-checked here.
#[instrument(skip(state, extracted), err)]
pub async fn run_analyze(
    state: &AppState,
    pipeline: &str,
    extracted: &StageData,
) -> Result<StageData, PipelineError> {
    let extracted_json = pretty_json(extracted);
    let prompt = templates::render(
        pipeline,
        Stage::Analyze,
        &[("extracted_data", extracted_json.as_str())],
    )?;
    let raw = state
        .generation_client
        .generate(&prompt, state.generation_timeout)
        .await?;
    normalize::extract_object(&raw)
}

/// Summarize stage: the terminal stage and the only one with a durable
/// side effect. The session is verified up front so a missing session
/// fails fast instead of wasting a slow generation call.
#[instrument(skip(state, extracted, analyzed), err)]
pub async fn run_summarize(
    state: &AppState,
    pipeline: &str,
    session_id: &str,
    extracted: &StageData,
    analyzed: &StageData,
) -> Result<SummaryRecord, PipelineError> {
    if sessions::get_session(state, session_id).await?.is_none() {
        return Err(PipelineError::SessionNotFound(session_id.to_string()));
    }

    let extracted_json = pretty_json(extracted);
    let analyzed_json = pretty_json(analyzed);
    let prompt = templates::render(
        pipeline,
        Stage::Summarize,
        &[
            ("extracted_data", extracted_json.as_str()),
            ("analyzed_data", analyzed_json.as_str()),
        ],
    )?;
    let raw = state
        .generation_client
        .generate(&prompt, state.generation_timeout)
        .await?;

    // Summary normalization never fails; a malformed response degrades
    // to a placeholder record rather than aborting the request.
    let record = normalize::summary_record(&raw);
    sessions::insert_summary(state, session_id, &record).await?;
    info!("Summarized session {} via {} chain", session_id, pipeline);
    Ok(record)
}

/// Single-stage pipeline: summarize straight from a transcript for
/// session types that do not need the full chain.
#[instrument(skip(state, transcript), err)]
pub async fn summarize_session(
    state: &AppState,
    session_id: &str,
    session_type: &str,
    transcript: &str,
) -> Result<SummaryRecord, PipelineError> {
    if sessions::get_session(state, session_id).await?.is_none() {
        return Err(PipelineError::SessionNotFound(session_id.to_string()));
    }

    let prompt = templates::render(
        session_type,
        Stage::Session,
        &[("transcript", transcript)],
    )?;
    let raw = state
        .generation_client
        .generate(&prompt, state.generation_timeout)
        .await?;

    let record = normalize::summary_record(&raw);
    sessions::insert_summary(state, session_id, &record).await?;
    info!("Summarized {} session {}", session_type, session_id);
    Ok(record)
}
