use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use keepsake_chunking::TimedWord;
use keepsake_domain::{
	entity,
	media::{self, MediaType, ProcessingStatus},
};
use keepsake_providers::transcription::{Transcript, TranscriptWord};
use keepsake_storage::{
	models::{NewRawMemory, RawMemory},
	queries,
};

use crate::{
	Error, KeepsakeService, Result, collapse_whitespace,
	prompts::DISTILL_SYSTEM_PROMPT,
	require_user,
	save::{LayerPlan, RawAnchor, normalize_keywords, title_from},
};

const DISTILL_TEMPERATURE: f32 = 0.1;
const AUDIO_EXTRACTION_LIMIT: Duration = Duration::from_secs(330);

/// User-supplied descriptors of a memory. All fields are optional.
#[derive(Clone, Debug, Default)]
pub struct MemoryMetadata {
	pub title: Option<String>,
	pub description: Option<String>,
	pub topic: Option<String>,
	pub mood: Option<i32>,
	pub people: Vec<String>,
	pub memory_date: Option<OffsetDateTime>,
	pub tag_ids: Vec<Uuid>,
}

#[derive(Clone, Debug)]
pub struct RegisterUploadRequest {
	pub user_id: String,
	pub filename: String,
	pub content_type: Option<String>,
	pub bytes: Vec<u8>,
	pub metadata: MemoryMetadata,
}

#[derive(Clone, Debug)]
pub struct CreateTextMemoryRequest {
	pub user_id: String,
	pub text: String,
	pub metadata: MemoryMetadata,
}

/// Input of the background-eligible save: final text (typed or transcribed) plus metadata.
#[derive(Clone, Debug)]
pub struct SaveFromUploadRequest {
	pub user_id: String,
	/// Raw memory registered by the upload pipeline. `None` creates a new text memory.
	pub memory_id: Option<Uuid>,
	pub text: String,
	/// Word timestamps from a transcript; chunks follow them when present.
	pub words: Vec<TranscriptWord>,
	pub metadata: MemoryMetadata,
}

impl KeepsakeService {
	/// Distills, chunks and embeds `text`, then writes all three memory layers in one
	/// transaction. Returns the memory id.
	pub async fn save_from_upload(&self, req: SaveFromUploadRequest) -> Result<Uuid> {
		let user_id = require_user(&req.user_id)?;
		let text = req.text.trim();

		if text.is_empty() {
			return Err(Error::InvalidRequest { message: "Memory text is empty.".to_string() });
		}

		validate_metadata(&req.metadata)?;

		if let Some(memory_id) = req.memory_id
			&& queries::get_raw_memory(&self.db.pool, user_id, memory_id).await?.is_none()
		{
			return Err(Error::NotFound { message: format!("Memory {memory_id} not found.") });
		}

		let keywords = self.tag_keywords(user_id, &req.metadata.tag_ids).await?;
		let summary = self.distill(text).await?;
		let drafts = if req.words.is_empty() {
			self.text_chunks(text)
		} else {
			self.word_chunks(&timed_words(&req.words))
		};
		let chunks = self.embed_drafts(drafts).await?;
		let summary_embedding = self.embed_text(&summary).await?;
		let entities = entity::normalize_entities(&req.metadata.people);
		let now = OffsetDateTime::now_utc();
		let tag_ids =
			if req.memory_id.is_none() { req.metadata.tag_ids.clone() } else { Vec::new() };
		let anchor = match req.memory_id {
			Some(memory_id) => RawAnchor::Existing(memory_id),
			None => {
				let source_key = self
					.objects
					.upload(user_id, "memory.txt", text.as_bytes())
					.await
					.map_err(Error::object_store)?;

				RawAnchor::New(NewRawMemory {
					memory_id: Uuid::new_v4(),
					user_id: user_id.to_string(),
					title: req.metadata.title.clone().unwrap_or_else(|| title_from(&summary)),
					description: req.metadata.description.clone(),
					media_type: MediaType::Text.as_str().to_string(),
					source_key,
					topic: req.metadata.topic.clone(),
					mood: req.metadata.mood,
					people: req.metadata.people.clone(),
					status: ProcessingStatus::Completed.as_str().to_string(),
					memory_date: req.metadata.memory_date,
					now,
				})
			},
		};

		self.persist_layers(LayerPlan {
			anchor,
			user_id: user_id.to_string(),
			summary,
			summary_embedding,
			keywords,
			emotion_weight: req.metadata.mood.unwrap_or(self.cfg.memory.default_emotion_weight),
			chunks,
			entities,
			tag_ids,
			now,
		})
		.await
	}

	/// Stores an uploaded file and registers a pending memory for background processing.
	pub async fn register_upload(&self, req: RegisterUploadRequest) -> Result<RawMemory> {
		let user_id = require_user(&req.user_id)?;
		let filename = req.filename.trim();

		if filename.is_empty() || req.bytes.is_empty() {
			return Err(Error::InvalidRequest {
				message: "An upload needs a filename and content.".to_string(),
			});
		}

		let Some(media_type) = media::detect_media_type(req.content_type.as_deref(), filename)
		else {
			return Err(Error::InvalidRequest {
				message: format!("Unsupported file type for {filename}."),
			});
		};

		validate_metadata(&req.metadata)?;
		self.tag_keywords(user_id, &req.metadata.tag_ids).await?;

		let source_key =
			self.objects.upload(user_id, filename, &req.bytes).await.map_err(Error::object_store)?;
		let raw = NewRawMemory {
			memory_id: Uuid::new_v4(),
			user_id: user_id.to_string(),
			title: req.metadata.title.clone().unwrap_or_else(|| default_title(filename)),
			description: req.metadata.description.clone(),
			media_type: media_type.as_str().to_string(),
			source_key: source_key.clone(),
			topic: req.metadata.topic.clone(),
			mood: req.metadata.mood,
			people: req.metadata.people.clone(),
			status: ProcessingStatus::Pending.as_str().to_string(),
			memory_date: req.metadata.memory_date,
			now: OffsetDateTime::now_utc(),
		};

		match self.insert_pending(&raw, &req.metadata.tag_ids).await {
			Ok(memory) => {
				tracing::info!(
					memory_id = %memory.memory_id,
					media_type = %media_type,
					"Registered upload for processing."
				);

				Ok(memory)
			},
			Err(err) => {
				self.discard_objects([source_key.as_str()]).await;

				Err(err)
			},
		}
	}

	/// Registers typed text as a pending text memory.
	pub async fn create_text_memory(&self, req: CreateTextMemoryRequest) -> Result<RawMemory> {
		if req.text.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "Memory text is empty.".to_string() });
		}

		self.register_upload(RegisterUploadRequest {
			user_id: req.user_id,
			filename: "memory.txt".to_string(),
			content_type: Some("text/plain".to_string()),
			bytes: req.text.into_bytes(),
			metadata: req.metadata,
		})
		.await
	}

	/// Leases the next memory waiting for processing.
	pub async fn claim_next_pending(&self) -> Result<Option<RawMemory>> {
		let now = OffsetDateTime::now_utc();
		let lease_until = now + time::Duration::seconds(self.cfg.worker.lease_seconds);

		Ok(queries::claim_next_pending(&self.db.pool, now, lease_until).await?)
	}

	/// Turns a registered memory into its three layers. Video is reduced to audio, audio is
	/// transcribed, text is read back from the object store. Failures mark the memory `failed`
	/// with a sanitized message and are returned.
	pub async fn process_memory(&self, memory_id: Uuid) -> Result<()> {
		let Some(memory) = queries::get_raw_memory_by_id(&self.db.pool, memory_id).await? else {
			return Err(Error::NotFound { message: format!("Memory {memory_id} not found.") });
		};

		if memory.status == ProcessingStatus::Completed.as_str() {
			tracing::info!(memory_id = %memory_id, "Memory already processed.");

			return Ok(());
		}

		match self.run_processing(&memory).await {
			Ok(()) => Ok(()),
			Err(err) => {
				let message = err.sanitized();
				let now = OffsetDateTime::now_utc();
				let failed = ProcessingStatus::Failed.as_str();
				let error_message = Some(message.as_str());
				let recorded =
					queries::set_memory_status(&self.db.pool, memory_id, failed, error_message, now)
						.await;

				if let Err(record_err) = recorded {
					tracing::error!(
						memory_id = %memory_id,
						error = %record_err,
						"Failed to record processing failure."
					);
				}

				Err(err)
			},
		}
	}

	/// Moves a failed memory back to pending.
	pub async fn requeue_memory(&self, user_id: &str, memory_id: Uuid) -> Result<()> {
		let user_id = require_user(user_id)?;
		let now = OffsetDateTime::now_utc();

		if queries::requeue_failed(&self.db.pool, user_id, memory_id, now).await? {
			return Ok(());
		}

		match queries::get_raw_memory(&self.db.pool, user_id, memory_id).await? {
			Some(memory) => Err(Error::Conflict {
				message: format!("Memory {memory_id} is {}, not failed.", memory.status),
			}),
			None => Err(Error::NotFound { message: format!("Memory {memory_id} not found.") }),
		}
	}

	async fn insert_pending(&self, raw: &NewRawMemory, tag_ids: &[Uuid]) -> Result<RawMemory> {
		let mut tx = self.db.pool.begin().await?;

		queries::insert_raw_memory(&mut *tx, raw).await?;

		if !tag_ids.is_empty() {
			queries::attach_tags(&mut *tx, raw.memory_id, tag_ids).await?;
		}

		let memory = queries::get_raw_memory(&mut *tx, &raw.user_id, raw.memory_id)
			.await?
			.ok_or_else(|| Error::Storage { message: "Inserted memory is missing.".to_string() })?;

		tx.commit().await?;

		Ok(memory)
	}

	async fn run_processing(&self, memory: &RawMemory) -> Result<()> {
		let media_type: MediaType =
			memory.media_type.parse().map_err(|err: media::UnknownVariant| {
				Error::InvalidRequest { message: err.to_string() }
			})?;
		let (text, words) = if media_type.needs_transcription() {
			let transcript = self.transcript_for(memory, media_type).await?;

			(transcript.text, transcript.words)
		} else {
			(self.download_text(&memory.source_key).await?, Vec::new())
		};
		let tag_ids = queries::tags_for_memory(&self.db.pool, memory.memory_id)
			.await?
			.into_iter()
			.map(|tag| tag.tag_id)
			.collect();

		self.save_from_upload(SaveFromUploadRequest {
			user_id: memory.user_id.clone(),
			memory_id: Some(memory.memory_id),
			text,
			words,
			metadata: MemoryMetadata {
				title: Some(memory.title.clone()),
				description: memory.description.clone(),
				topic: memory.topic.clone(),
				mood: memory.mood,
				people: memory.people.clone(),
				memory_date: memory.memory_date,
				tag_ids,
			},
		})
		.await?;

		Ok(())
	}

	/// Returns the stored transcript, or produces one. Intermediate artifacts (extracted audio,
	/// transcript JSON) are recorded on the memory so a retry resumes after them.
	async fn transcript_for(
		&self,
		memory: &RawMemory,
		media_type: MediaType,
	) -> Result<Transcript> {
		if let Some(key) = memory.transcript_key.as_deref() {
			return self.load_transcript(key).await;
		}

		let audio_key = match (media_type, memory.audio_key.as_deref()) {
			(MediaType::Video, Some(key)) => key.to_string(),
			(MediaType::Video, None) => self.extract_and_store_audio(memory).await?,
			_ => memory.source_key.clone(),
		};
		let now = OffsetDateTime::now_utc();
		let audio_url = self.objects.signed_url(&audio_key, now).map_err(Error::object_store)?;
		let cfg = &self.cfg.providers.transcription;
		let limit = Duration::from_millis(cfg.timeout_ms) + self.request_timeout();
		let transcript = self
			.bounded(
				"Transcription",
				limit,
				self.providers.transcription.transcribe(cfg, &audio_url),
			)
			.await?;

		if transcript.text.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "Transcript is empty.".to_string() });
		}

		let json = serde_json::to_vec(&transcript).map_err(|err| Error::ObjectStore {
			message: format!("Failed to encode transcript: {err}"),
		})?;
		let transcript_key = self
			.objects
			.upload(&memory.user_id, "transcript.json", &json)
			.await
			.map_err(Error::object_store)?;

		queries::set_transcript_key(&self.db.pool, memory.memory_id, &transcript_key, now).await?;

		tracing::info!(
			memory_id = %memory.memory_id,
			words = transcript.words.len(),
			"Stored transcript."
		);

		Ok(transcript)
	}

	async fn extract_and_store_audio(&self, memory: &RawMemory) -> Result<String> {
		let video = self.objects.download(&memory.source_key).await.map_err(Error::object_store)?;
		let audio = self
			.bounded(
				"Audio extraction",
				AUDIO_EXTRACTION_LIMIT,
				self.providers.audio.extract_audio(&video),
			)
			.await?;
		let audio_key = self
			.objects
			.upload(&memory.user_id, "audio.mp3", &audio)
			.await
			.map_err(Error::object_store)?;
		let now = OffsetDateTime::now_utc();

		queries::set_audio_key(&self.db.pool, memory.memory_id, &audio_key, now).await?;

		Ok(audio_key)
	}

	async fn distill(&self, text: &str) -> Result<String> {
		let snapshot = self.complete(DISTILL_SYSTEM_PROMPT, text, DISTILL_TEMPERATURE).await?;
		let snapshot = collapse_whitespace(&snapshot);

		if snapshot.is_empty() {
			return Err(Error::Provider {
				message: "Distillation returned an empty snapshot.".to_string(),
			});
		}

		Ok(snapshot)
	}

	/// Names of `tag_ids` as semantic keywords. Every id must belong to the user.
	async fn tag_keywords(&self, user_id: &str, tag_ids: &[Uuid]) -> Result<Vec<String>> {
		if tag_ids.is_empty() {
			return Ok(Vec::new());
		}

		let tags = queries::tags_by_ids(&self.db.pool, user_id, tag_ids).await?;
		let mut requested = tag_ids.to_vec();

		requested.sort_unstable();
		requested.dedup();

		if tags.len() != requested.len() {
			return Err(Error::InvalidRequest { message: "Unknown tag id.".to_string() });
		}

		let names: Vec<String> = tags.into_iter().map(|tag| tag.name).collect();

		Ok(normalize_keywords(&names))
	}
}

pub(crate) fn validate_metadata(metadata: &MemoryMetadata) -> Result<()> {
	if let Some(mood) = metadata.mood
		&& !media::is_valid_mood(mood)
	{
		return Err(Error::InvalidRequest { message: "mood must be between 1 and 5.".to_string() });
	}
	if metadata.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
		return Err(Error::InvalidRequest { message: "title must not be blank.".to_string() });
	}

	Ok(())
}

fn timed_words(words: &[TranscriptWord]) -> Vec<TimedWord> {
	words
		.iter()
		.map(|word| TimedWord { text: word.text.clone(), start_ms: word.start, end_ms: word.end })
		.collect()
}

fn default_title(filename: &str) -> String {
	let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem).trim();

	if stem.is_empty() { "Untitled memory".to_string() } else { stem.to_string() }
}
