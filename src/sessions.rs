use crate::error::PipelineError;
use crate::normalize::SummaryRecord;
use crate::AppState;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub session_type: String,
    pub start_ts: i64,
    pub end_ts: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AudioChunk {
    pub chunk_id: i64,
    pub file_path: String,
    pub duration_sec: Option<i64>,
    pub created_ts: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptRow {
    pub transcript_id: i64,
    pub chunk_id: Option<i64>,
    pub text: String,
    pub language: Option<String>,
    pub word_count: i64,
    pub created_ts: i64,
}

/// A persisted summary. `repetition_json` holds the repeated-questions
/// sequence as serialized JSON text; readers deserialize it back with
/// [`SummaryRow::repeated_questions`].
#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryRow {
    pub summary_id: i64,
    pub summary_text: String,
    pub repetition_json: Option<String>,
    pub agitation_score: Option<f64>,
    pub mood_label: Option<String>,
    pub suggestions: Option<String>,
    pub created_ts: i64,
}

impl SummaryRow {
    pub fn repeated_questions(&self) -> Vec<String> {
        self.repetition_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: Session,
    pub audio_chunks: Vec<AudioChunk>,
    pub transcripts: Vec<TranscriptRow>,
    pub summary: Option<SummaryRow>,
}

#[derive(Debug, Serialize)]
pub struct SessionListItem {
    pub session_id: String,
    pub session_type: String,
    pub start_ts: i64,
    pub summary_snippet: Option<String>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[instrument(skip(state), err)]
pub async fn create_session(
    state: &AppState,
    session_type: &str,
    start_ts: i64,
) -> Result<String, PipelineError> {
    let session_id = Uuid::new_v4().to_string();
    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO sessions (session_id, session_type, start_ts)
         VALUES (?, ?, ?)",
        params![session_id, session_type, start_ts],
    )?;
    info!("Created {} session {}", session_type, session_id);
    Ok(session_id)
}

#[instrument(skip(state), err)]
pub async fn get_session(
    state: &AppState,
    session_id: &str,
) -> Result<Option<Session>, PipelineError> {
    let conn = state.db.get()?;
    let session = conn
        .query_row(
            "SELECT session_id, session_type, start_ts, end_ts, notes
             FROM sessions WHERE session_id = ?",
            params![session_id],
            |row| {
                Ok(Session {
                    session_id: row.get(0)?,
                    session_type: row.get(1)?,
                    start_ts: row.get(2)?,
                    end_ts: row.get(3)?,
                    notes: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(session)
}

#[instrument(skip(state), err)]
pub async fn update_session_end(
    state: &AppState,
    session_id: &str,
    end_ts: i64,
    notes: Option<&str>,
) -> Result<bool, PipelineError> {
    let conn = state.db.get()?;
    let updated = conn.execute(
        "UPDATE sessions SET end_ts = ?, notes = ? WHERE session_id = ?",
        params![end_ts, notes, session_id],
    )?;
    Ok(updated > 0)
}

#[instrument(skip(state), err)]
pub async fn insert_audio_chunk(
    state: &AppState,
    session_id: &str,
    file_path: &str,
    duration_sec: Option<i64>,
) -> Result<i64, PipelineError> {
    let conn = state.db.get()?;
    let chunk_id = conn.query_row(
        "INSERT INTO audio_chunks (session_id, file_path, duration_sec, created_ts)
         VALUES (?, ?, ?, ?)
         RETURNING chunk_id",
        params![session_id, file_path, duration_sec, now_ms()],
        |row| row.get(0),
    )?;
    Ok(chunk_id)
}

#[instrument(skip(state, text), err)]
pub async fn insert_transcript(
    state: &AppState,
    session_id: &str,
    text: &str,
    chunk_id: Option<i64>,
    language: Option<&str>,
) -> Result<i64, PipelineError> {
    let word_count = text.split_whitespace().count() as i64;
    let conn = state.db.get()?;
    let transcript_id = conn.query_row(
        "INSERT INTO transcripts (session_id, chunk_id, text, language, word_count, created_ts)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING transcript_id",
        params![session_id, chunk_id, text, language, word_count, now_ms()],
        |row| row.get(0),
    )?;
    Ok(transcript_id)
}

/// Persist a summary for a session, replacing any prior one. A session
/// has at most one summary row; concurrent writers are last-write-wins.
#[instrument(skip(state, record), err)]
pub async fn insert_summary(
    state: &AppState,
    session_id: &str,
    record: &SummaryRecord,
) -> Result<i64, PipelineError> {
    let repetition_json =
        serde_json::to_string(&record.repeated_questions).map_err(|e| {
            PipelineError::Database(format!(
                "failed to serialize repeated questions: {}",
                e
            ))
        })?;

    let conn = state.db.get()?;
    let summary_id = conn.query_row(
        "INSERT INTO summaries (
            session_id, summary_text, repetition_json,
            agitation_score, mood_label, suggestions, created_ts
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            summary_text = excluded.summary_text,
            repetition_json = excluded.repetition_json,
            agitation_score = excluded.agitation_score,
            mood_label = excluded.mood_label,
            suggestions = excluded.suggestions,
            created_ts = excluded.created_ts
        RETURNING summary_id",
        params![
            session_id,
            record.summary,
            repetition_json,
            record.agitation_score,
            record.mood_label,
            record.suggestions,
            now_ms(),
        ],
        |row| row.get(0),
    )?;
    info!("Saved summary {} for session {}", summary_id, session_id);
    Ok(summary_id)
}

#[instrument(skip(state), err)]
pub async fn get_session_detail(
    state: &AppState,
    session_id: &str,
) -> Result<Option<SessionDetail>, PipelineError> {
    let Some(session) = get_session(state, session_id).await? else {
        return Ok(None);
    };

    let conn = state.db.get()?;

    let mut stmt = conn.prepare(
        "SELECT chunk_id, file_path, duration_sec, created_ts
         FROM audio_chunks WHERE session_id = ? ORDER BY created_ts",
    )?;
    let audio_chunks = stmt
        .query_map(params![session_id], |row| {
            Ok(AudioChunk {
                chunk_id: row.get(0)?,
                file_path: row.get(1)?,
                duration_sec: row.get(2)?,
                created_ts: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT transcript_id, chunk_id, text, language, word_count, created_ts
         FROM transcripts WHERE session_id = ? ORDER BY created_ts",
    )?;
    let transcripts = stmt
        .query_map(params![session_id], |row| {
            Ok(TranscriptRow {
                transcript_id: row.get(0)?,
                chunk_id: row.get(1)?,
                text: row.get(2)?,
                language: row.get(3)?,
                word_count: row.get(4)?,
                created_ts: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let summary = conn
        .query_row(
            "SELECT summary_id, summary_text, repetition_json,
                    agitation_score, mood_label, suggestions, created_ts
             FROM summaries WHERE session_id = ?",
            params![session_id],
            |row| {
                Ok(SummaryRow {
                    summary_id: row.get(0)?,
                    summary_text: row.get(1)?,
                    repetition_json: row.get(2)?,
                    agitation_score: row.get(3)?,
                    mood_label: row.get(4)?,
                    suggestions: row.get(5)?,
                    created_ts: row.get(6)?,
                })
            },
        )
        .optional()?;

    Ok(Some(SessionDetail {
        session,
        audio_chunks,
        transcripts,
        summary,
    }))
}

#[instrument(skip(state), err)]
pub async fn get_sessions_list(
    state: &AppState,
    limit: usize,
    offset: usize,
) -> Result<Vec<SessionListItem>, PipelineError> {
    let conn = state.db.get()?;
    let mut stmt = conn.prepare(
        "SELECT
            s.session_id,
            s.session_type,
            s.start_ts,
            SUBSTR(sum.summary_text, 1, 100) AS summary_snippet
         FROM sessions s
         LEFT JOIN summaries sum ON s.session_id = sum.session_id
         ORDER BY s.start_ts DESC
         LIMIT ? OFFSET ?",
    )?;
    let sessions = stmt
        .query_map(params![limit as i64, offset as i64], |row| {
            Ok(SessionListItem {
                session_id: row.get(0)?,
                session_type: row.get(1)?,
                start_ts: row.get(2)?,
                summary_snippet: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sessions)
}

/// Delete a session; dependent chunks, transcripts, and summaries go
/// with it via foreign-key cascade.
#[instrument(skip(state), err)]
pub async fn delete_session(
    state: &AppState,
    session_id: &str,
) -> Result<bool, PipelineError> {
    let conn = state.db.get()?;
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE session_id = ?",
        params![session_id],
    )?;
    Ok(deleted > 0)
}
