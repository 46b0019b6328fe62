use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use keepsake_chunking::{ChunkingConfig, TimedWord};
use keepsake_domain::{
	entity::{self, USER_SELF},
	media::{MediaType, ProcessingStatus},
};
use keepsake_storage::{
	models::{ChunkOwner, NewChunk, NewRawMemory, NewSemanticMemory},
	queries,
};

use crate::{Error, KeepsakeService, Result, collapse_whitespace, require_user};

const MAX_TITLE_CHARS: usize = 80;

/// A chat message accepted as a memory, with the classifier's summary and extractions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveMemoryRequest {
	pub user_id: String,
	/// The original message; archived verbatim and chunked.
	pub text: String,
	pub summary: String,
	#[serde(default)]
	pub entities: Vec<String>,
	#[serde(default)]
	pub tags: Vec<String>,
}

/// Where the raw-archive row comes from: written in the same transaction, or already registered
/// by the upload pipeline.
pub(crate) enum RawAnchor {
	New(NewRawMemory),
	Existing(Uuid),
}

pub(crate) struct ChunkDraft {
	pub(crate) chunk_index: i32,
	pub(crate) start_offset: Option<i32>,
	pub(crate) end_offset: Option<i32>,
	pub(crate) start_seconds: Option<f64>,
	pub(crate) end_seconds: Option<f64>,
	pub(crate) content: String,
}

/// Everything one memory needs across the three layers, computed before the transaction opens.
pub(crate) struct LayerPlan {
	pub(crate) anchor: RawAnchor,
	pub(crate) user_id: String,
	pub(crate) summary: String,
	pub(crate) summary_embedding: Vec<f32>,
	pub(crate) keywords: Vec<String>,
	pub(crate) emotion_weight: i32,
	pub(crate) chunks: Vec<(ChunkDraft, Vec<f32>)>,
	pub(crate) entities: Vec<String>,
	pub(crate) tag_ids: Vec<Uuid>,
	pub(crate) now: OffsetDateTime,
}

impl KeepsakeService {
	/// Writes a chat memory to all three layers and returns the new memory id.
	///
	/// `summary_embedding` is the vector computed by the duplicate check, when there was one.
	pub async fn save_memory(
		&self,
		req: SaveMemoryRequest,
		summary_embedding: Option<Vec<f32>>,
	) -> Result<Uuid> {
		let user_id = require_user(&req.user_id)?;
		let text = req.text.trim();
		let summary = collapse_whitespace(&req.summary);

		if text.is_empty() || summary.is_empty() {
			return Err(Error::InvalidRequest {
				message: "A memory needs both text and a summary.".to_string(),
			});
		}

		let summary_embedding = match summary_embedding {
			Some(embedding) => embedding,
			None => self.embed_text(&summary).await?,
		};
		let chunks = self.embed_drafts(self.text_chunks(text)).await?;
		let entities = entity::normalize_entities(&req.entities);
		let source_key = self
			.objects
			.upload(user_id, "memory.txt", text.as_bytes())
			.await
			.map_err(Error::object_store)?;
		let now = OffsetDateTime::now_utc();
		let raw = NewRawMemory {
			memory_id: Uuid::new_v4(),
			user_id: user_id.to_string(),
			title: title_from(&summary),
			description: None,
			media_type: MediaType::Text.as_str().to_string(),
			source_key,
			topic: None,
			mood: None,
			people: entities.iter().filter(|name| *name != USER_SELF).cloned().collect(),
			status: ProcessingStatus::Completed.as_str().to_string(),
			memory_date: None,
			now,
		};

		self.persist_layers(LayerPlan {
			anchor: RawAnchor::New(raw),
			user_id: user_id.to_string(),
			summary,
			summary_embedding,
			keywords: normalize_keywords(&req.tags),
			emotion_weight: self.cfg.memory.default_emotion_weight,
			chunks,
			entities,
			tag_ids: Vec::new(),
			now,
		})
		.await
	}

	pub(crate) fn text_chunks(&self, text: &str) -> Vec<ChunkDraft> {
		let cfg = ChunkingConfig {
			max_units: self.cfg.chunking.max_units,
			overlap_units: self.cfg.chunking.overlap_units,
		};

		keepsake_chunking::split_text(text, &cfg, self.measure())
			.into_iter()
			.map(|chunk| ChunkDraft {
				chunk_index: chunk.chunk_index,
				start_offset: i32::try_from(chunk.start_offset).ok(),
				end_offset: i32::try_from(chunk.end_offset).ok(),
				start_seconds: None,
				end_seconds: None,
				content: chunk.text,
			})
			.collect()
	}

	pub(crate) fn word_chunks(&self, words: &[TimedWord]) -> Vec<ChunkDraft> {
		let size = self.cfg.chunking.words_per_transcript_chunk as usize;

		keepsake_chunking::split_words(words, size)
			.into_iter()
			.map(|chunk| ChunkDraft {
				chunk_index: chunk.chunk_index,
				start_offset: None,
				end_offset: None,
				start_seconds: Some(chunk.start_seconds),
				end_seconds: Some(chunk.end_seconds),
				content: chunk.text,
			})
			.collect()
	}

	pub(crate) async fn embed_drafts(
		&self,
		drafts: Vec<ChunkDraft>,
	) -> Result<Vec<(ChunkDraft, Vec<f32>)>> {
		let texts: Vec<String> = drafts.iter().map(|draft| draft.content.clone()).collect();
		let embeddings = self.embed_texts(&texts).await?;

		Ok(drafts.into_iter().zip(embeddings).collect())
	}

	/// Commits a [`LayerPlan`] in one transaction. When the plan created a new raw memory and the
	/// transaction fails, its uploaded source object is deleted again.
	pub(crate) async fn persist_layers(&self, plan: LayerPlan) -> Result<Uuid> {
		let orphan_key = match &plan.anchor {
			RawAnchor::New(raw) => Some(raw.source_key.clone()),
			RawAnchor::Existing(_) => None,
		};

		match self.write_layers(&plan).await {
			Ok(memory_id) => Ok(memory_id),
			Err(err) => {
				if let Some(key) = orphan_key.as_deref() {
					self.discard_objects([key]).await;
				}

				Err(err)
			},
		}
	}

	async fn write_layers(&self, plan: &LayerPlan) -> Result<Uuid> {
		let mut tx = self.db.pool.begin().await?;
		let memory_id = match &plan.anchor {
			RawAnchor::New(raw) => {
				queries::insert_raw_memory(&mut *tx, raw).await?;

				raw.memory_id
			},
			RawAnchor::Existing(memory_id) => {
				queries::set_memory_status(
					&mut *tx,
					*memory_id,
					ProcessingStatus::Completed.as_str(),
					None,
					plan.now,
				)
				.await?;

				*memory_id
			},
		};

		if !plan.tag_ids.is_empty() {
			queries::attach_tags(&mut *tx, memory_id, &plan.tag_ids).await?;
		}

		queries::delete_memory_chunks(&mut *tx, memory_id).await?;

		for (draft, embedding) in &plan.chunks {
			let chunk = NewChunk {
				chunk_id: chunk_id(memory_id, draft.chunk_index),
				user_id: plan.user_id.clone(),
				owner: ChunkOwner::Memory(memory_id),
				chunk_index: draft.chunk_index,
				start_offset: draft.start_offset,
				end_offset: draft.end_offset,
				start_seconds: draft.start_seconds,
				end_seconds: draft.end_seconds,
				content: draft.content.clone(),
				embedding: embedding.clone(),
			};

			queries::insert_chunk(&mut *tx, &chunk).await?;
		}

		let semantic = NewSemanticMemory {
			semantic_id: Uuid::new_v4(),
			user_id: plan.user_id.clone(),
			memory_id,
			content: plan.summary.clone(),
			emotion_weight: Some(plan.emotion_weight),
			keywords: plan.keywords.clone(),
			embedding: plan.summary_embedding.clone(),
			now: plan.now,
		};

		if queries::insert_semantic_memory(&mut *tx, &semantic).await? {
			let max_chars = self.cfg.memory.max_entity_summary_chars as usize;

			for name in lock_order(&plan.entities) {
				upsert_entity(&mut tx, &plan.user_id, name, &plan.summary, max_chars, plan.now)
					.await?;
			}
		} else {
			// Reprocessing keeps the first snapshot and does not count its entities twice.
			tracing::info!(memory_id = %memory_id, "Semantic memory already exists for memory.");
		}

		tx.commit().await?;

		tracing::info!(
			memory_id = %memory_id,
			chunks = plan.chunks.len(),
			entities = plan.entities.len(),
			"Memory layers written."
		);

		Ok(memory_id)
	}
}

/// Entity rows are locked in case-folded name order so that concurrent saves naming the same
/// entities cannot wait on each other in a cycle.
pub(crate) fn lock_order(entities: &[String]) -> Vec<&String> {
	let mut ordered: Vec<&String> = entities.iter().collect();

	ordered.sort_by_cached_key(|name| name.to_lowercase());

	ordered
}

/// Records one observation of `name`: increments an existing row, or inserts a new one. A
/// concurrent insert of the same name surfaces as a unique violation inside a savepoint; the row
/// is then re-read and updated once.
pub(crate) async fn upsert_entity(
	tx: &mut Transaction<'_, Postgres>,
	user_id: &str,
	name: &str,
	observation: &str,
	max_chars: usize,
	now: OffsetDateTime,
) -> Result<()> {
	if let Some(existing) = queries::find_entity_for_update(&mut **tx, user_id, name).await? {
		let summary = entity::merge_summary(&existing.summary, observation, max_chars);

		queries::record_entity_observation(&mut **tx, existing.entity_id, &summary, now).await?;

		return Ok(());
	}

	let summary = entity::merge_summary("", observation, max_chars);
	let entity_type = entity::entity_type_for(name);
	let mut savepoint = (&mut **tx).begin().await?;
	let inserted = queries::insert_entity(
		&mut *savepoint,
		Uuid::new_v4(),
		user_id,
		name,
		entity_type,
		&summary,
		now,
	)
	.await;

	match inserted {
		Ok(()) => {
			savepoint.commit().await?;

			Ok(())
		},
		Err(err) if err.is_unique_violation() => {
			savepoint.rollback().await?;

			tracing::debug!(name, "Entity insert raced with another writer; updating instead.");

			let Some(existing) = queries::find_entity_for_update(&mut **tx, user_id, name).await?
			else {
				return Err(Error::Conflict {
					message: format!("Entity {name} changed concurrently; retry the save."),
				});
			};
			let summary = entity::merge_summary(&existing.summary, observation, max_chars);

			queries::record_entity_observation(&mut **tx, existing.entity_id, &summary, now)
				.await?;

			Ok(())
		},
		Err(err) => Err(err.into()),
	}
}

pub(crate) fn chunk_id(memory_id: Uuid, chunk_index: i32) -> Uuid {
	Uuid::new_v5(&memory_id, format!("chunk:{chunk_index}").as_bytes())
}

pub(crate) fn normalize_keywords(tags: &[String]) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();

	for tag in tags {
		let keyword = collapse_whitespace(tag).to_lowercase();

		if keyword.is_empty() || out.contains(&keyword) {
			continue;
		}

		out.push(keyword);
	}

	out
}

pub(crate) fn title_from(summary: &str) -> String {
	let first_sentence = summary.split_inclusive(['.', '!', '?']).next().unwrap_or(summary).trim();

	if first_sentence.chars().count() <= MAX_TITLE_CHARS {
		return first_sentence.to_string();
	}

	let cut: String = first_sentence.chars().take(MAX_TITLE_CHARS - 3).collect();

	format!("{}...", cut.trim_end())
}
