//! Voice note transcription through a remote speech-to-text backend.
//!
//! Telegram voice notes arrive as OGG Opus; they are converted to MP3 with
//! an ffmpeg subprocess, then uploaded to an OpenAI-compatible
//! `/audio/transcriptions` endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct Transcriber {
    base_url: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl Transcriber {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Transcribe an OGG Opus voice payload to text.
    pub async fn transcribe(&self, ogg_data: &[u8]) -> Result<String, String> {
        debug!("Transcribing {} bytes of audio", ogg_data.len());
        let mp3_data = convert_ogg_to_mp3(ogg_data).await?;

        let part = reqwest::multipart::Part::bytes(mp3_data)
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| format!("Invalid audio mime: {e}"))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let url = format!("{}/audio/transcriptions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Transcription request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Transcription failed: {status} {body}"));
        }

        #[derive(Deserialize)]
        struct TranscriptionResponse {
            text: String,
        }

        let payload: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to decode transcription response: {e}"))?;

        let text = payload.text.trim().to_string();
        info!("Transcribed: \"{}\"", truncate(&text, 100));
        Ok(text)
    }
}

/// Convert OGG Opus audio to MP3 using ffmpeg (it needs seekable input, so
/// the source goes through a temp file; output is piped back).
async fn convert_ogg_to_mp3(ogg_data: &[u8]) -> Result<Vec<u8>, String> {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let input_path = std::env::temp_dir().join(format!("voice_{}_{n}.ogg", std::process::id()));

    tokio::fs::write(&input_path, ogg_data)
        .await
        .map_err(|e| format!("Failed to write temp audio: {e}"))?;

    let output = Command::new("ffmpeg")
        .args([
            "-i",
            input_path.to_str().ok_or("Invalid temp path")?,
            "-acodec",
            "libmp3lame",
            "-f",
            "mp3",
            "pipe:1",
        ])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .output()
        .await
        .map_err(|e| format!("Failed to run ffmpeg: {e}"));

    let _ = tokio::fs::remove_file(&input_path).await;
    let output = output?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("ffmpeg failed: {stderr}"));
    }

    debug!("Converted to {} bytes of MP3", output.stdout.len());
    Ok(output.stdout)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
    }
}
