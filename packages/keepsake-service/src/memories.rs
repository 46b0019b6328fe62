use time::OffsetDateTime;
use uuid::Uuid;

use keepsake_domain::media::{MediaType, is_valid_mood};
use keepsake_storage::{
	models::{ChunkOwner, ChunkRow, MemoryFilter, RawMemory, RawMemoryPatch, SemanticMemory, Tag},
	queries,
};

use crate::{Error, KeepsakeService, Result, require_user};

const MAX_PER_PAGE: u32 = 100;

#[derive(Clone, Debug)]
pub struct MemoryDetail {
	pub memory: RawMemory,
	pub tags: Vec<Tag>,
	pub semantic: Option<SemanticMemory>,
}

#[derive(Clone, Debug, Default)]
pub struct ListMemoriesRequest {
	pub user_id: String,
	pub filter: MemoryFilter,
	/// One-based.
	pub page: u32,
	pub per_page: u32,
}

#[derive(Clone, Debug)]
pub struct ListMemoriesResponse {
	pub items: Vec<RawMemory>,
	pub total: i64,
	pub page: u32,
	pub per_page: u32,
}

/// Partial update. `tag_ids: Some(..)` replaces the memory's tag set.
#[derive(Clone, Debug, Default)]
pub struct UpdateMemoryRequest {
	pub user_id: String,
	pub memory_id: Uuid,
	pub patch: RawMemoryPatch,
	pub tag_ids: Option<Vec<Uuid>>,
}

impl KeepsakeService {
	pub async fn get_memory(&self, user_id: &str, memory_id: Uuid) -> Result<MemoryDetail> {
		let memory = self.owned_memory(user_id, memory_id).await?;
		let tags = queries::tags_for_memory(&self.db.pool, memory_id).await?;
		let semantic = queries::semantic_for_memory(&self.db.pool, memory_id).await?;

		Ok(MemoryDetail { memory, tags, semantic })
	}

	/// Newest first. Filters combine with AND.
	pub async fn list_memories(&self, req: ListMemoriesRequest) -> Result<ListMemoriesResponse> {
		let user_id = require_user(&req.user_id)?;

		if let Some(mood) = req.filter.mood
			&& !is_valid_mood(mood)
		{
			return Err(Error::InvalidRequest {
				message: "mood must be between 1 and 5.".to_string(),
			});
		}
		if let (Some(from), Some(to)) = (req.filter.created_from, req.filter.created_to)
			&& from > to
		{
			return Err(Error::InvalidRequest {
				message: "created_from must not be after created_to.".to_string(),
			});
		}

		let page = req.page.max(1);
		let per_page = req.per_page.clamp(1, MAX_PER_PAGE);
		let offset = i64::from(page - 1) * i64::from(per_page);
		let items = queries::list_raw_memories(
			&self.db.pool,
			user_id,
			&req.filter,
			i64::from(per_page),
			offset,
		)
		.await?;
		let total = queries::count_raw_memories(&self.db.pool, user_id, &req.filter).await?;

		Ok(ListMemoriesResponse { items, total, page, per_page })
	}

	/// Applies the patch and, when given, reassigns tags as a set: links outside the new set are
	/// removed in one statement and missing ones inserted in another.
	pub async fn update_memory(&self, req: UpdateMemoryRequest) -> Result<MemoryDetail> {
		let user_id = require_user(&req.user_id)?;

		if let Some(mood) = req.patch.mood
			&& !is_valid_mood(mood)
		{
			return Err(Error::InvalidRequest {
				message: "mood must be between 1 and 5.".to_string(),
			});
		}
		if req.patch.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
			return Err(Error::InvalidRequest { message: "title must not be blank.".to_string() });
		}

		let mut tx = self.db.pool.begin().await?;
		let now = OffsetDateTime::now_utc();
		let Some(memory) =
			queries::update_raw_memory(&mut *tx, user_id, req.memory_id, &req.patch, now).await?
		else {
			return Err(Error::NotFound { message: format!("Memory {} not found.", req.memory_id) });
		};

		if let Some(tag_ids) = req.tag_ids.as_deref() {
			let mut target = tag_ids.to_vec();

			target.sort_unstable();
			target.dedup();

			let owned = queries::tags_by_ids(&mut *tx, user_id, &target).await?;

			if owned.len() != target.len() {
				return Err(Error::InvalidRequest { message: "Unknown tag id.".to_string() });
			}

			queries::detach_tags_except(&mut *tx, memory.memory_id, &target).await?;
			queries::attach_tags(&mut *tx, memory.memory_id, &target).await?;
		}

		let tags = queries::tags_for_memory(&mut *tx, memory.memory_id).await?;
		let semantic = queries::semantic_for_memory(&mut *tx, memory.memory_id).await?;

		tx.commit().await?;

		Ok(MemoryDetail { memory, tags, semantic })
	}

	/// Deletes the memory and, through the schema's cascades, its chunks, semantic snapshot and
	/// tag links. Stored objects are removed afterwards on a best-effort basis.
	pub async fn delete_memory(&self, user_id: &str, memory_id: Uuid) -> Result<()> {
		let memory = self.owned_memory(user_id, memory_id).await?;

		if !queries::delete_raw_memory(&self.db.pool, &memory.user_id, memory_id).await? {
			return Err(Error::NotFound { message: format!("Memory {memory_id} not found.") });
		}

		let keys = [
			Some(memory.source_key.as_str()),
			memory.audio_key.as_deref(),
			memory.transcript_key.as_deref(),
		];

		self.discard_objects(keys.into_iter().flatten()).await;

		tracing::info!(memory_id = %memory_id, "Deleted memory.");

		Ok(())
	}

	/// Signed URL for the original audio or video.
	pub async fn memory_media_url(&self, user_id: &str, memory_id: Uuid) -> Result<String> {
		let memory = self.owned_memory(user_id, memory_id).await?;

		if memory.media_type == MediaType::Text.as_str() {
			return Err(Error::InvalidRequest {
				message: "Text memories have no media to stream.".to_string(),
			});
		}

		self.objects
			.signed_url(&memory.source_key, OffsetDateTime::now_utc())
			.map_err(Error::object_store)
	}

	/// The archived text: the typed text, or the transcript for audio and video.
	pub async fn memory_text(&self, user_id: &str, memory_id: Uuid) -> Result<String> {
		let memory = self.owned_memory(user_id, memory_id).await?;

		if memory.media_type == MediaType::Text.as_str() {
			return self.download_text(&memory.source_key).await;
		}

		let Some(key) = memory.transcript_key.as_deref() else {
			return Err(Error::NotFound {
				message: format!("Memory {memory_id} has no transcript yet."),
			});
		};

		Ok(self.load_transcript(key).await?.text)
	}

	pub async fn memory_chunks(&self, user_id: &str, memory_id: Uuid) -> Result<Vec<ChunkRow>> {
		self.owned_memory(user_id, memory_id).await?;

		Ok(queries::list_chunks(&self.db.pool, ChunkOwner::Memory(memory_id)).await?)
	}

	pub(crate) async fn owned_memory(&self, user_id: &str, memory_id: Uuid) -> Result<RawMemory> {
		let user_id = require_user(user_id)?;

		queries::get_raw_memory(&self.db.pool, user_id, memory_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: format!("Memory {memory_id} not found.") })
	}
}
