use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

const AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "wav", "m4a", "ogg", "flac", "aac", "opus"];
const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mov", "mkv", "avi", "webm", "m4v"];
const TEXT_EXTENSIONS: [&str; 3] = ["txt", "md", "text"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
	Audio,
	Video,
	Text,
}
impl MediaType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Audio => "audio",
			Self::Video => "video",
			Self::Text => "text",
		}
	}

	pub fn needs_transcription(self) -> bool {
		matches!(self, Self::Audio | Self::Video)
	}
}
impl fmt::Display for MediaType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for MediaType {
	type Err = UnknownVariant;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"audio" => Ok(Self::Audio),
			"video" => Ok(Self::Video),
			"text" => Ok(Self::Text),
			other => Err(UnknownVariant { kind: "media_type", value: other.to_string() }),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}
impl ProcessingStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed)
	}
}
impl fmt::Display for ProcessingStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for ProcessingStatus {
	type Err = UnknownVariant;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(Self::Pending),
			"processing" => Ok(Self::Processing),
			"completed" => Ok(Self::Completed),
			"failed" => Ok(Self::Failed),
			other => Err(UnknownVariant { kind: "status", value: other.to_string() }),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} value: {value}.")]
pub struct UnknownVariant {
	pub kind: &'static str,
	pub value: String,
}

/// Resolves the media type from the declared content type, falling back to the file extension.
pub fn detect_media_type(content_type: Option<&str>, filename: &str) -> Option<MediaType> {
	if let Some(content_type) = content_type {
		let essence = content_type.split(';').next().unwrap_or_default().trim().to_lowercase();

		if essence.starts_with("audio/") {
			return Some(MediaType::Audio);
		}
		if essence.starts_with("video/") {
			return Some(MediaType::Video);
		}
		if essence.starts_with("text/") {
			return Some(MediaType::Text);
		}
	}

	let (_, extension) = filename.rsplit_once('.')?;
	let extension = extension.to_lowercase();

	if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
		Some(MediaType::Audio)
	} else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
		Some(MediaType::Video)
	} else if TEXT_EXTENSIONS.contains(&extension.as_str()) {
		Some(MediaType::Text)
	} else {
		None
	}
}

pub fn is_valid_mood(mood: i32) -> bool {
	(1..=5).contains(&mood)
}
