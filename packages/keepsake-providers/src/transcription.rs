use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{self, Instant};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
	pub text: String,
	/// Milliseconds from the start of the recording.
	pub start: i64,
	pub end: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
	pub text: String,
	#[serde(default)]
	pub words: Vec<TranscriptWord>,
}

#[derive(Debug, PartialEq)]
enum PollState {
	Pending,
	Completed(Transcript),
	Failed(String),
}

/// Submits `audio_url` for transcription and polls until the job settles or `timeout_ms` passes.
pub async fn transcribe(
	cfg: &keepsake_config::TranscriptionProviderConfig,
	audio_url: &str,
) -> Result<Transcript> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let headers = crate::auth_headers(&cfg.api_key, &cfg.default_headers)?;
	let res = client
		.post(&url)
		.headers(headers.clone())
		.json(&serde_json::json!({ "audio_url": audio_url }))
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let job_id = json
		.get("id")
		.and_then(|v| v.as_str())
		.ok_or_else(|| eyre::eyre!("Transcription response is missing job id."))?
		.to_string();
	let deadline = Instant::now() + Duration::from_millis(cfg.timeout_ms);
	let poll_url = format!("{url}/{job_id}");

	tracing::info!(job_id = %job_id, "Transcription job submitted.");

	loop {
		let res = client.get(&poll_url).headers(headers.clone()).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		match parse_poll_response(json)? {
			PollState::Completed(transcript) => return Ok(transcript),
			PollState::Failed(message) =>
				return Err(eyre::eyre!("Transcription job {job_id} failed: {message}")),
			PollState::Pending => {},
		}

		if Instant::now() >= deadline {
			return Err(eyre::eyre!("Transcription job {job_id} did not finish in time."));
		}

		time::sleep(Duration::from_millis(cfg.poll_interval_ms)).await;
	}
}

fn parse_poll_response(json: Value) -> Result<PollState> {
	let status = json
		.get("status")
		.and_then(|v| v.as_str())
		.ok_or_else(|| eyre::eyre!("Transcription poll response is missing status."))?;

	match status {
		"queued" | "processing" => Ok(PollState::Pending),
		"error" => Ok(PollState::Failed(
			json.get("error").and_then(|v| v.as_str()).unwrap_or("unknown error").to_string(),
		)),
		"completed" => {
			let transcript: Transcript = serde_json::from_value(json)?;

			Ok(PollState::Completed(transcript))
		},
		other => Err(eyre::eyre!("Unexpected transcription status: {other}.")),
	}
}
