use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct RawMemory {
	pub memory_id: Uuid,
	pub user_id: String,
	pub title: String,
	pub description: Option<String>,
	pub media_type: String,
	pub source_key: String,
	pub audio_key: Option<String>,
	pub transcript_key: Option<String>,
	pub topic: Option<String>,
	pub mood: Option<i32>,
	pub people: Vec<String>,
	pub status: String,
	pub error_message: Option<String>,
	pub attempts: i32,
	pub lease_expires_at: Option<OffsetDateTime>,
	pub memory_date: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct NewRawMemory {
	pub memory_id: Uuid,
	pub user_id: String,
	pub title: String,
	pub description: Option<String>,
	pub media_type: String,
	pub source_key: String,
	pub topic: Option<String>,
	pub mood: Option<i32>,
	pub people: Vec<String>,
	pub status: String,
	pub memory_date: Option<OffsetDateTime>,
	pub now: OffsetDateTime,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Clone, Debug, Default)]
pub struct RawMemoryPatch {
	pub title: Option<String>,
	pub description: Option<String>,
	pub topic: Option<String>,
	pub mood: Option<i32>,
	pub people: Option<Vec<String>>,
	pub memory_date: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryFilter {
	pub media_type: Option<String>,
	pub topic: Option<String>,
	pub mood: Option<i32>,
	pub status: Option<String>,
	pub tag_ids: Vec<Uuid>,
	pub search: Option<String>,
	pub created_from: Option<OffsetDateTime>,
	pub created_to: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Document {
	pub document_id: Uuid,
	pub user_id: String,
	pub title: String,
	pub content_type: String,
	pub source_key: Option<String>,
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct DocumentWithCount {
	pub document_id: Uuid,
	pub title: String,
	pub content_type: String,
	pub source_key: Option<String>,
	pub created_at: OffsetDateTime,
	pub chunk_count: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkOwner {
	Memory(Uuid),
	Document(Uuid),
}

#[derive(Clone, Debug)]
pub struct NewChunk {
	pub chunk_id: Uuid,
	pub user_id: String,
	pub owner: ChunkOwner,
	pub chunk_index: i32,
	pub start_offset: Option<i32>,
	pub end_offset: Option<i32>,
	pub start_seconds: Option<f64>,
	pub end_seconds: Option<f64>,
	pub content: String,
	pub embedding: Vec<f32>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ChunkRow {
	pub chunk_id: Uuid,
	pub user_id: String,
	pub document_id: Option<Uuid>,
	pub memory_id: Option<Uuid>,
	pub chunk_index: i32,
	pub start_offset: Option<i32>,
	pub end_offset: Option<i32>,
	pub start_seconds: Option<f64>,
	pub end_seconds: Option<f64>,
	pub content: String,
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct SemanticMemory {
	pub semantic_id: Uuid,
	pub user_id: String,
	pub memory_id: Uuid,
	pub content: String,
	pub emotion_weight: Option<i32>,
	pub keywords: Vec<String>,
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct NewSemanticMemory {
	pub semantic_id: Uuid,
	pub user_id: String,
	pub memory_id: Uuid,
	pub content: String,
	pub emotion_weight: Option<i32>,
	pub keywords: Vec<String>,
	pub embedding: Vec<f32>,
	pub now: OffsetDateTime,
}

/// A semantic memory together with its L2 distance to the query vector.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct SemanticHit {
	pub semantic_id: Uuid,
	pub memory_id: Uuid,
	pub content: String,
	pub emotion_weight: Option<i32>,
	pub keywords: Vec<String>,
	pub created_at: OffsetDateTime,
	pub distance: f64,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct EntityMemory {
	pub entity_id: Uuid,
	pub user_id: String,
	pub name: String,
	pub entity_type: String,
	pub summary: String,
	pub observation_count: i32,
	pub last_interaction: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Tag {
	pub tag_id: Uuid,
	pub user_id: String,
	pub name: String,
	pub color: Option<String>,
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct TagWithCount {
	pub tag_id: Uuid,
	pub name: String,
	pub color: Option<String>,
	pub created_at: OffsetDateTime,
	pub memory_count: i64,
}
