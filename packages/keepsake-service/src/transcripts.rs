use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use keepsake_domain::media::MediaType;
use keepsake_providers::transcription::{Transcript, TranscriptWord};
use keepsake_storage::models::RawMemory;

use crate::{Error, KeepsakeService, Result};

const SEARCH_CONTEXT_WORDS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranscriptFormat {
	Text,
	Srt,
	Vtt,
}
impl FromStr for TranscriptFormat {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"text" | "txt" => Ok(Self::Text),
			"srt" => Ok(Self::Srt),
			"vtt" | "webvtt" => Ok(Self::Vtt),
			other => Err(Error::InvalidRequest {
				message: format!("Unsupported transcript format: {other}."),
			}),
		}
	}
}

/// One transcript word containing the search term, with its neighbours for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TranscriptMatch {
	pub word: TranscriptWord,
	pub index: usize,
	pub context: String,
	pub timestamp_seconds: f64,
}

impl KeepsakeService {
	/// Exports the stored transcript of an audio or video memory.
	pub async fn memory_transcript(
		&self,
		user_id: &str,
		memory_id: Uuid,
		format: TranscriptFormat,
	) -> Result<String> {
		let memory = self.owned_memory(user_id, memory_id).await?;
		let transcript = self.memory_transcript_data(&memory).await?;

		Ok(render_transcript(&transcript, format))
	}

	/// Finds transcript words containing `query`. Case-insensitive unless `case_sensitive`.
	pub async fn search_transcript(
		&self,
		user_id: &str,
		memory_id: Uuid,
		query: &str,
		case_sensitive: bool,
	) -> Result<Vec<TranscriptMatch>> {
		if query.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "Transcript search needs a query.".to_string(),
			});
		}

		let memory = self.owned_memory(user_id, memory_id).await?;
		let transcript = self.memory_transcript_data(&memory).await?;

		Ok(search_words(&transcript.words, query.trim(), case_sensitive))
	}

	pub(crate) async fn load_transcript(&self, key: &str) -> Result<Transcript> {
		let json = self.download_text(key).await?;

		serde_json::from_str(&json).map_err(|err| Error::ObjectStore {
			message: format!("Stored transcript {key} is unreadable: {err}"),
		})
	}

	async fn memory_transcript_data(&self, memory: &RawMemory) -> Result<Transcript> {
		if memory.media_type == MediaType::Text.as_str() {
			return Err(Error::InvalidRequest {
				message: "Text memories have no transcript.".to_string(),
			});
		}

		let Some(key) = memory.transcript_key.as_deref() else {
			return Err(Error::NotFound {
				message: format!("Memory {} has no transcript yet.", memory.memory_id),
			});
		};

		self.load_transcript(key).await
	}
}

/// Subtitle formats emit one cue per transcript word.
pub fn render_transcript(transcript: &Transcript, format: TranscriptFormat) -> String {
	match format {
		TranscriptFormat::Text => transcript.text.clone(),
		TranscriptFormat::Srt => {
			let mut out = String::new();

			for (idx, word) in transcript.words.iter().enumerate() {
				out.push_str(&format!(
					"{}\n{} --> {}\n{}\n\n",
					idx + 1,
					cue_time(word.start, ','),
					cue_time(word.end, ','),
					word.text
				));
			}

			out
		},
		TranscriptFormat::Vtt => {
			let mut out = String::from("WEBVTT\n\n");

			for word in &transcript.words {
				out.push_str(&format!(
					"{} --> {}\n{}\n\n",
					cue_time(word.start, '.'),
					cue_time(word.end, '.'),
					word.text
				));
			}

			out
		},
	}
}

pub fn search_words(
	words: &[TranscriptWord],
	query: &str,
	case_sensitive: bool,
) -> Vec<TranscriptMatch> {
	let needle = if case_sensitive { query.to_string() } else { query.to_lowercase() };

	if needle.is_empty() {
		return Vec::new();
	}

	words
		.iter()
		.enumerate()
		.filter(|(_, word)| {
			if case_sensitive {
				word.text.contains(&needle)
			} else {
				word.text.to_lowercase().contains(&needle)
			}
		})
		.map(|(index, word)| {
			let from = index.saturating_sub(SEARCH_CONTEXT_WORDS);
			let to = (index + SEARCH_CONTEXT_WORDS + 1).min(words.len());
			let context = words[from..to]
				.iter()
				.map(|word| word.text.as_str())
				.collect::<Vec<_>>()
				.join(" ");

			TranscriptMatch {
				word: word.clone(),
				index,
				context,
				timestamp_seconds: word.start.max(0) as f64 / 1_000.0,
			}
		})
		.collect()
}

/// `HH:MM:SS<sep>mmm`; SRT separates milliseconds with a comma, WebVTT with a dot.
fn cue_time(millis: i64, separator: char) -> String {
	let millis = millis.max(0);
	let hours = millis / 3_600_000;
	let minutes = millis / 60_000 % 60;
	let seconds = millis / 1_000 % 60;

	format!("{hours:02}:{minutes:02}:{seconds:02}{separator}{:03}", millis % 1_000)
}
