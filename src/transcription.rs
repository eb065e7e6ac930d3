use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Failures of the speech-to-text subprocess, distinguishable so the
/// routing layer can tell a deployment problem (missing binary/model)
/// from a bad request (missing audio) or an operational one (timeout).
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Audio file not found: {0}")]
    AudioFileMissing(PathBuf),

    #[error("Whisper binary not found at {0}")]
    BinaryMissing(PathBuf),

    #[error("Whisper model not found at {0}")]
    ModelMissing(PathBuf),

    #[error("Transcription failed: {stderr}")]
    Failed { stderr: String },

    #[error("Transcription timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to run transcription: {0}")]
    Io(#[from] std::io::Error),
}

/// Wrapper around the whisper.cpp CLI. Transcription of a long
/// recording takes minutes, so every invocation runs under a timeout.
#[derive(Debug, Clone)]
pub struct Transcriber {
    pub binary_path: PathBuf,
    pub model_path: PathBuf,
    pub timeout: Duration,
}

impl Transcriber {
    pub fn new(
        binary_path: PathBuf,
        model_path: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            binary_path,
            model_path,
            timeout,
        }
    }

    #[instrument(skip(self), err)]
    pub async fn transcribe(
        &self,
        audio_path: &Path,
    ) -> Result<String, TranscriptionError> {
        if !audio_path.exists() {
            return Err(TranscriptionError::AudioFileMissing(
                audio_path.to_path_buf(),
            ));
        }
        if !self.binary_path.exists() {
            return Err(TranscriptionError::BinaryMissing(
                self.binary_path.clone(),
            ));
        }
        if !self.model_path.exists() {
            return Err(TranscriptionError::ModelMissing(
                self.model_path.clone(),
            ));
        }

        let mut command = Command::new(&self.binary_path);
        command
            .arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg(audio_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!("Running whisper command: {:?}", command);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| TranscriptionError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(TranscriptionError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let transcript =
            String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(
            "Transcribed {} chars from {:?}",
            transcript.len(),
            audio_path
        );
        Ok(transcript)
    }
}

/// Convert browser-recorded audio (typically WebM) to the 16 kHz mono
/// WAV whisper.cpp expects.
#[instrument(err)]
pub async fn convert_to_wav(
    input: &Path,
    output: &Path,
    timeout: Duration,
) -> Result<(), TranscriptionError> {
    if !input.exists() {
        return Err(TranscriptionError::AudioFileMissing(input.to_path_buf()));
    }

    let mut command = Command::new("ffmpeg");
    command
        .arg("-i")
        .arg(input)
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg("-ar")
        .arg("16000")
        .arg("-ac")
        .arg("1")
        .arg(output)
        .arg("-y")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!("Running FFmpeg command: {:?}", command);

    let result = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| TranscriptionError::Timeout(timeout))??;

    if !result.status.success() {
        return Err(TranscriptionError::Failed {
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Transcriber, TranscriptionError};
    use std::path::PathBuf;
    use std::time::Duration;

    fn temp_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().expect("temp file")
    }

    /// Write an executable shell script to stand in for whisper-cli.
    /// The write handle is closed before returning so the script can be
    /// executed without tripping ETXTBSY.
    fn fake_binary(body: &str) -> tempfile::TempPath {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let mut file = temp_file();
        writeln!(file, "#!/bin/sh\n{}", body).expect("write script");
        let path = file.into_temp_path();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn missing_audio_file_is_distinguished() {
        let transcriber = Transcriber::new(
            PathBuf::from("/bin/true"),
            PathBuf::from("/bin/true"),
            Duration::from_secs(5),
        );
        let err = transcriber
            .transcribe(&PathBuf::from("/no/such/audio.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::AudioFileMissing(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_distinguished() {
        let audio = temp_file();
        let model = temp_file();
        let transcriber = Transcriber::new(
            PathBuf::from("/no/such/whisper-cli"),
            model.path().to_path_buf(),
            Duration::from_secs(5),
        );
        let err = transcriber.transcribe(audio.path()).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::BinaryMissing(_)));
    }

    #[tokio::test]
    async fn missing_model_is_distinguished() {
        let audio = temp_file();
        let transcriber = Transcriber::new(
            PathBuf::from("/bin/true"),
            PathBuf::from("/no/such/model.bin"),
            Duration::from_secs(5),
        );
        let err = transcriber.transcribe(audio.path()).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::ModelMissing(_)));
    }

    #[tokio::test]
    async fn successful_run_returns_trimmed_stdout() {
        let audio = temp_file();
        let model = temp_file();
        let binary = fake_binary("echo '  hello from whisper  '");
        let transcriber = Transcriber::new(
            binary.to_path_buf(),
            model.path().to_path_buf(),
            Duration::from_secs(5),
        );
        let transcript = transcriber.transcribe(audio.path()).await.unwrap();
        assert_eq!(transcript, "hello from whisper");
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let audio = temp_file();
        let model = temp_file();
        let binary = fake_binary("echo 'model load failed' >&2; exit 3");
        let transcriber = Transcriber::new(
            binary.to_path_buf(),
            model.path().to_path_buf(),
            Duration::from_secs(5),
        );
        let err = transcriber.transcribe(audio.path()).await.unwrap_err();
        match err {
            TranscriptionError::Failed { stderr } => {
                assert!(stderr.contains("model load failed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn slow_binary_times_out() {
        let audio = temp_file();
        let model = temp_file();
        let binary = fake_binary("sleep 10");
        let transcriber = Transcriber::new(
            binary.to_path_buf(),
            model.path().to_path_buf(),
            Duration::from_millis(100),
        );
        let err = transcriber.transcribe(audio.path()).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Timeout(_)));
    }
}
