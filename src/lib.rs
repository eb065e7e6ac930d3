use crate::generation::fake::FakeGenerationClient;
use crate::generation::ollama::OllamaClient;
use crate::generation::GenerationClient;
use crate::transcription::Transcriber;
use anyhow::Result;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

pub mod app;
pub mod chain;
pub mod error;
pub mod generation;
pub mod normalize;
pub mod prompts;
pub mod sessions;
pub mod templates;
pub mod transcription;

// Define the AppState struct for both main app and testing
pub struct AppState {
    pub db: Pool<SqliteConnectionManager>,
    pub generation_client: Arc<dyn GenerationClient>,
    pub generation_timeout: Duration,
    pub transcriber: Transcriber,
    // Keeps the temp database alive for the lifetime of a test state
    #[allow(dead_code)]
    temp_db_file: Option<tempfile::NamedTempFile>,
}

impl AppState {
    pub fn new_for_testing() -> Self {
        Self::new_for_testing_with_client(Arc::new(
            FakeGenerationClient::new(),
        ))
    }

    // Create a new AppState for testing with a caller-supplied
    // generation client
    pub fn new_for_testing_with_client(
        generation_client: Arc<dyn GenerationClient>,
    ) -> Self {
        let temp_db_file = tempfile::NamedTempFile::new()
            .expect("Failed to create temporary database file");
        let db_path = temp_db_file
            .path()
            .to_str()
            .expect("Failed to get temp file path")
            .to_string();

        let manager = connection_manager(&db_path);
        let pool = Pool::new(manager).expect("Failed to create pool");

        let mut conn = pool.get().expect("Failed to get connection");
        init_carelink_db(&mut conn).expect("Failed to initialize carelink db");
        drop(conn);

        Self {
            db: pool,
            generation_client,
            generation_timeout: Duration::from_secs(30),
            transcriber: Transcriber::new(
                PathBuf::from("/usr/local/bin/whisper-cli"),
                PathBuf::from("/usr/local/share/whisper/ggml-base.en.bin"),
                Duration::from_secs(60),
            ),
            temp_db_file: Some(temp_db_file),
        }
    }
}

// Create a config struct to hold AppState configuration
pub struct AppConfig {
    pub db_pool: Pool<SqliteConnectionManager>,
    pub ollama_url: String,
    pub generation_model: String,
    pub generation_timeout_secs: u64,
    pub whisper_binary: PathBuf,
    pub whisper_model: PathBuf,
    pub transcription_timeout_secs: u64,
}

// Function to create AppState from parameters
pub fn create_app_state(config: AppConfig) -> Arc<AppState> {
    let generation_client: Arc<dyn GenerationClient> = Arc::new(
        OllamaClient::new(config.ollama_url, config.generation_model),
    );

    Arc::new(AppState {
        db: config.db_pool,
        generation_client,
        generation_timeout: Duration::from_secs(
            config.generation_timeout_secs,
        ),
        transcriber: Transcriber::new(
            config.whisper_binary,
            config.whisper_model,
            Duration::from_secs(config.transcription_timeout_secs),
        ),
        temp_db_file: None,
    })
}

/// Connection manager with foreign keys enforced on every connection;
/// the cascade deletes in the schema depend on it.
pub fn connection_manager(path: &str) -> SqliteConnectionManager {
    SqliteConnectionManager::file(path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON"))
}

const CARELINK_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        session_id TEXT PRIMARY KEY,
        session_type TEXT NOT NULL,
        start_ts INTEGER NOT NULL,
        end_ts INTEGER,
        notes TEXT
    );

    CREATE TABLE IF NOT EXISTS audio_chunks (
        chunk_id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        file_path TEXT NOT NULL,
        duration_sec INTEGER,
        created_ts INTEGER NOT NULL,
        FOREIGN KEY(session_id) REFERENCES sessions(session_id)
            ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS transcripts (
        transcript_id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        chunk_id INTEGER,
        text TEXT NOT NULL,
        language TEXT,
        word_count INTEGER NOT NULL,
        created_ts INTEGER NOT NULL,
        FOREIGN KEY(session_id) REFERENCES sessions(session_id)
            ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS summaries (
        summary_id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL UNIQUE,
        summary_text TEXT NOT NULL,
        repetition_json TEXT,
        agitation_score REAL,
        mood_label TEXT,
        suggestions TEXT,
        created_ts INTEGER NOT NULL,
        FOREIGN KEY(session_id) REFERENCES sessions(session_id)
            ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_start_ts
        ON sessions(start_ts DESC);
"#;

// Database initialization
#[instrument]
pub fn init_carelink_db(conn: &mut Connection) -> Result<()> {
    info!("Initializing carelink database");
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(CARELINK_SCHEMA)?;
    Ok(())
}

#[cfg(test)]
mod schema_tests {
    use super::init_carelink_db;
    use anyhow::Result;
    use rusqlite::{Connection, OptionalExtension};

    fn has_table(conn: &Connection, name: &str) -> Result<bool> {
        Ok(conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    #[test]
    fn schema_applies_on_fresh_database() -> Result<()> {
        let mut conn = Connection::open_in_memory()?;

        init_carelink_db(&mut conn)?;

        assert!(has_table(&conn, "sessions")?);
        assert!(has_table(&conn, "audio_chunks")?);
        assert!(has_table(&conn, "transcripts")?);
        assert!(has_table(&conn, "summaries")?);

        Ok(())
    }

    #[test]
    fn schema_init_is_idempotent() -> Result<()> {
        let mut conn = Connection::open_in_memory()?;

        init_carelink_db(&mut conn)?;
        init_carelink_db(&mut conn)?;

        assert!(has_table(&conn, "sessions")?);
        Ok(())
    }
}
