use sqlx::{PgExecutor, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	models::{
		ChunkOwner, ChunkRow, Document, DocumentWithCount, EntityMemory, MemoryFilter, NewChunk,
		NewRawMemory, NewSemanticMemory, RawMemory, RawMemoryPatch, SemanticHit, SemanticMemory,
		Tag, TagWithCount,
	},
	vector_text,
};

pub async fn insert_raw_memory<'e, E>(executor: E, memory: &NewRawMemory) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO raw_memories (
	memory_id,
	user_id,
	title,
	description,
	media_type,
	source_key,
	topic,
	mood,
	people,
	status,
	memory_date,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)",
	)
	.bind(memory.memory_id)
	.bind(memory.user_id.as_str())
	.bind(memory.title.as_str())
	.bind(memory.description.as_deref())
	.bind(memory.media_type.as_str())
	.bind(memory.source_key.as_str())
	.bind(memory.topic.as_deref())
	.bind(memory.mood)
	.bind(&memory.people)
	.bind(memory.status.as_str())
	.bind(memory.memory_date)
	.bind(memory.now)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn get_raw_memory<'e, E>(
	executor: E,
	user_id: &str,
	memory_id: Uuid,
) -> Result<Option<RawMemory>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, RawMemory>(
		"SELECT * FROM raw_memories WHERE memory_id = $1 AND user_id = $2",
	)
	.bind(memory_id)
	.bind(user_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

/// Unscoped lookup for background processing, which runs outside any user request.
pub async fn get_raw_memory_by_id<'e, E>(executor: E, memory_id: Uuid) -> Result<Option<RawMemory>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, RawMemory>("SELECT * FROM raw_memories WHERE memory_id = $1")
		.bind(memory_id)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

pub async fn list_raw_memories<'e, E>(
	executor: E,
	user_id: &str,
	filter: &MemoryFilter,
	limit: i64,
	offset: i64,
) -> Result<Vec<RawMemory>>
where
	E: PgExecutor<'e>,
{
	let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM raw_memories WHERE ");

	push_memory_filters(&mut builder, user_id, filter);

	builder.push(" ORDER BY created_at DESC, memory_id DESC LIMIT ");
	builder.push_bind(limit);
	builder.push(" OFFSET ");
	builder.push_bind(offset);

	let rows = builder.build_query_as::<RawMemory>().fetch_all(executor).await?;

	Ok(rows)
}

/// Memories whose day falls in `[from, to)`, where the day is the user-given `memory_date` or,
/// without one, the upload time. Newest first.
pub async fn raw_memories_between<'e, E>(
	executor: E,
	user_id: &str,
	from: OffsetDateTime,
	to: OffsetDateTime,
) -> Result<Vec<RawMemory>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, RawMemory>(
		"\
SELECT *
FROM raw_memories
WHERE user_id = $1
	AND COALESCE(memory_date, created_at) >= $2
	AND COALESCE(memory_date, created_at) < $3
ORDER BY COALESCE(memory_date, created_at) DESC, memory_id DESC",
	)
	.bind(user_id)
	.bind(from)
	.bind(to)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn count_raw_memories<'e, E>(
	executor: E,
	user_id: &str,
	filter: &MemoryFilter,
) -> Result<i64>
where
	E: PgExecutor<'e>,
{
	let mut builder = QueryBuilder::<Postgres>::new("SELECT count(*) FROM raw_memories WHERE ");

	push_memory_filters(&mut builder, user_id, filter);

	let count: i64 = builder.build_query_scalar().fetch_one(executor).await?;

	Ok(count)
}

pub async fn update_raw_memory<'e, E>(
	executor: E,
	user_id: &str,
	memory_id: Uuid,
	patch: &RawMemoryPatch,
	now: OffsetDateTime,
) -> Result<Option<RawMemory>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, RawMemory>(
		"\
UPDATE raw_memories
SET
	title = COALESCE($3, title),
	description = COALESCE($4, description),
	topic = COALESCE($5, topic),
	mood = COALESCE($6, mood),
	people = COALESCE($7, people),
	memory_date = COALESCE($8, memory_date),
	updated_at = $9
WHERE memory_id = $1 AND user_id = $2
RETURNING *",
	)
	.bind(memory_id)
	.bind(user_id)
	.bind(patch.title.as_deref())
	.bind(patch.description.as_deref())
	.bind(patch.topic.as_deref())
	.bind(patch.mood)
	.bind(patch.people.as_ref())
	.bind(patch.memory_date)
	.bind(now)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn delete_raw_memory<'e, E>(executor: E, user_id: &str, memory_id: Uuid) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM raw_memories WHERE memory_id = $1 AND user_id = $2")
		.bind(memory_id)
		.bind(user_id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() > 0)
}

/// Leases the oldest pending memory, or one whose processing lease has expired.
pub async fn claim_next_pending<'e, E>(
	executor: E,
	now: OffsetDateTime,
	lease_until: OffsetDateTime,
) -> Result<Option<RawMemory>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, RawMemory>(
		"\
UPDATE raw_memories
SET
	status = 'processing',
	attempts = attempts + 1,
	lease_expires_at = $2,
	updated_at = $1
WHERE memory_id = (
	SELECT memory_id
	FROM raw_memories
	WHERE status = 'pending'
		OR (status = 'processing' AND lease_expires_at IS NOT NULL AND lease_expires_at < $1)
	ORDER BY created_at ASC
	LIMIT 1
	FOR UPDATE SKIP LOCKED
)
RETURNING *",
	)
	.bind(now)
	.bind(lease_until)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn set_memory_status<'e, E>(
	executor: E,
	memory_id: Uuid,
	status: &str,
	error_message: Option<&str>,
	now: OffsetDateTime,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
UPDATE raw_memories
SET
	status = $2,
	error_message = $3,
	lease_expires_at = CASE WHEN $2 = 'processing' THEN lease_expires_at ELSE NULL END,
	updated_at = $4
WHERE memory_id = $1",
	)
	.bind(memory_id)
	.bind(status)
	.bind(error_message)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn set_audio_key<'e, E>(
	executor: E,
	memory_id: Uuid,
	audio_key: &str,
	now: OffsetDateTime,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query("UPDATE raw_memories SET audio_key = $2, updated_at = $3 WHERE memory_id = $1")
		.bind(memory_id)
		.bind(audio_key)
		.bind(now)
		.execute(executor)
		.await?;

	Ok(())
}

pub async fn set_transcript_key<'e, E>(
	executor: E,
	memory_id: Uuid,
	transcript_key: &str,
	now: OffsetDateTime,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"UPDATE raw_memories SET transcript_key = $2, updated_at = $3 WHERE memory_id = $1",
	)
	.bind(memory_id)
	.bind(transcript_key)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(())
}

/// Moves a failed memory back to pending. Returns `false` when the memory is not failed.
pub async fn requeue_failed<'e, E>(
	executor: E,
	user_id: &str,
	memory_id: Uuid,
	now: OffsetDateTime,
) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
UPDATE raw_memories
SET status = 'pending', error_message = NULL, lease_expires_at = NULL, updated_at = $3
WHERE memory_id = $1 AND user_id = $2 AND status = 'failed'",
	)
	.bind(memory_id)
	.bind(user_id)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn insert_chunk<'e, E>(executor: E, chunk: &NewChunk) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let (memory_id, document_id) = match chunk.owner {
		ChunkOwner::Memory(id) => (Some(id), None),
		ChunkOwner::Document(id) => (None, Some(id)),
	};

	sqlx::query(
		"\
INSERT INTO chunks (
	chunk_id,
	user_id,
	memory_id,
	document_id,
	chunk_index,
	start_offset,
	end_offset,
	start_seconds,
	end_seconds,
	content,
	embedding
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11::text::vector)
ON CONFLICT (chunk_id) DO NOTHING",
	)
	.bind(chunk.chunk_id)
	.bind(chunk.user_id.as_str())
	.bind(memory_id)
	.bind(document_id)
	.bind(chunk.chunk_index)
	.bind(chunk.start_offset)
	.bind(chunk.end_offset)
	.bind(chunk.start_seconds)
	.bind(chunk.end_seconds)
	.bind(chunk.content.as_str())
	.bind(vector_text(&chunk.embedding))
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn delete_memory_chunks<'e, E>(executor: E, memory_id: Uuid) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM chunks WHERE memory_id = $1")
		.bind(memory_id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

pub async fn list_chunks<'e, E>(executor: E, owner: ChunkOwner) -> Result<Vec<ChunkRow>>
where
	E: PgExecutor<'e>,
{
	let (column, id) = match owner {
		ChunkOwner::Memory(id) => ("memory_id", id),
		ChunkOwner::Document(id) => ("document_id", id),
	};
	let sql = format!(
		"\
SELECT
	chunk_id,
	user_id,
	document_id,
	memory_id,
	chunk_index,
	start_offset,
	end_offset,
	start_seconds,
	end_seconds,
	content,
	created_at
FROM chunks
WHERE {column} = $1
ORDER BY chunk_index ASC"
	);
	let rows = sqlx::query_as::<_, ChunkRow>(&sql).bind(id).fetch_all(executor).await?;

	Ok(rows)
}

/// Inserts the semantic layer row. Returns `false` when the memory already has one.
pub async fn insert_semantic_memory<'e, E>(
	executor: E,
	semantic: &NewSemanticMemory,
) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO semantic_memories (
	semantic_id,
	user_id,
	memory_id,
	content,
	emotion_weight,
	keywords,
	embedding,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7::text::vector, $8)
ON CONFLICT (memory_id) DO NOTHING",
	)
	.bind(semantic.semantic_id)
	.bind(semantic.user_id.as_str())
	.bind(semantic.memory_id)
	.bind(semantic.content.as_str())
	.bind(semantic.emotion_weight)
	.bind(&semantic.keywords)
	.bind(vector_text(&semantic.embedding))
	.bind(semantic.now)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn nearest_semantic<'e, E>(
	executor: E,
	user_id: &str,
	query_vec: &[f32],
	limit: i64,
) -> Result<Vec<SemanticHit>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, SemanticHit>(
		"\
SELECT
	semantic_id,
	memory_id,
	content,
	emotion_weight,
	keywords,
	created_at,
	(embedding <-> $2::text::vector)::float8 AS distance
FROM semantic_memories
WHERE user_id = $1
ORDER BY embedding <-> $2::text::vector ASC, created_at DESC
LIMIT $3",
	)
	.bind(user_id)
	.bind(vector_text(query_vec))
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn recent_semantic<'e, E>(
	executor: E,
	user_id: &str,
	limit: i64,
) -> Result<Vec<SemanticMemory>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, SemanticMemory>(
		"\
SELECT semantic_id, user_id, memory_id, content, emotion_weight, keywords, created_at
FROM semantic_memories
WHERE user_id = $1
ORDER BY created_at DESC, semantic_id DESC
LIMIT $2",
	)
	.bind(user_id)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn semantic_for_memory<'e, E>(
	executor: E,
	memory_id: Uuid,
) -> Result<Option<SemanticMemory>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, SemanticMemory>(
		"\
SELECT semantic_id, user_id, memory_id, content, emotion_weight, keywords, created_at
FROM semantic_memories
WHERE memory_id = $1",
	)
	.bind(memory_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

/// Every keyword stored on the user's semantic memories, lowercased and de-duplicated.
pub async fn semantic_keywords<'e, E>(executor: E, user_id: &str) -> Result<Vec<String>>
where
	E: PgExecutor<'e>,
{
	let rows: Vec<String> = sqlx::query_scalar(
		"\
SELECT DISTINCT lower(keyword)
FROM semantic_memories, unnest(keywords) AS keyword
WHERE user_id = $1",
	)
	.bind(user_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn find_entity_for_update<'e, E>(
	executor: E,
	user_id: &str,
	name: &str,
) -> Result<Option<EntityMemory>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, EntityMemory>(
		"\
SELECT *
FROM entity_memories
WHERE user_id = $1 AND lower(name) = lower($2)
FOR UPDATE",
	)
	.bind(user_id)
	.bind(name)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn get_entity<'e, E>(
	executor: E,
	user_id: &str,
	name: &str,
) -> Result<Option<EntityMemory>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, EntityMemory>(
		"SELECT * FROM entity_memories WHERE user_id = $1 AND lower(name) = lower($2)",
	)
	.bind(user_id)
	.bind(name)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn insert_entity<'e, E>(
	executor: E,
	entity_id: Uuid,
	user_id: &str,
	name: &str,
	entity_type: &str,
	summary: &str,
	now: OffsetDateTime,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO entity_memories (
	entity_id,
	user_id,
	name,
	entity_type,
	summary,
	observation_count,
	last_interaction,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, 1, $6, $6, $6)",
	)
	.bind(entity_id)
	.bind(user_id)
	.bind(name)
	.bind(entity_type)
	.bind(summary)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn record_entity_observation<'e, E>(
	executor: E,
	entity_id: Uuid,
	summary: &str,
	now: OffsetDateTime,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
UPDATE entity_memories
SET
	observation_count = observation_count + 1,
	summary = $2,
	last_interaction = $3,
	updated_at = $3
WHERE entity_id = $1",
	)
	.bind(entity_id)
	.bind(summary)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn recent_entities<'e, E>(
	executor: E,
	user_id: &str,
	exclude_name: &str,
	limit: i64,
) -> Result<Vec<EntityMemory>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, EntityMemory>(
		"\
SELECT *
FROM entity_memories
WHERE user_id = $1 AND lower(name) <> lower($2)
ORDER BY last_interaction DESC, entity_id DESC
LIMIT $3",
	)
	.bind(user_id)
	.bind(exclude_name)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn insert_tag<'e, E>(executor: E, tag: &Tag) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"INSERT INTO tags (tag_id, user_id, name, color, created_at) VALUES ($1, $2, $3, $4, $5)",
	)
	.bind(tag.tag_id)
	.bind(tag.user_id.as_str())
	.bind(tag.name.as_str())
	.bind(tag.color.as_deref())
	.bind(tag.created_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn get_tag<'e, E>(executor: E, user_id: &str, tag_id: Uuid) -> Result<Option<Tag>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE tag_id = $1 AND user_id = $2")
		.bind(tag_id)
		.bind(user_id)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

pub async fn tags_by_ids<'e, E>(executor: E, user_id: &str, tag_ids: &[Uuid]) -> Result<Vec<Tag>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, Tag>(
		"SELECT * FROM tags WHERE user_id = $1 AND tag_id = ANY($2) ORDER BY lower(name)",
	)
	.bind(user_id)
	.bind(tag_ids)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn tags_by_names<'e, E>(executor: E, user_id: &str, names: &[String]) -> Result<Vec<Tag>>
where
	E: PgExecutor<'e>,
{
	let lowered: Vec<String> = names.iter().map(|name| name.to_lowercase()).collect();
	let rows = sqlx::query_as::<_, Tag>(
		"SELECT * FROM tags WHERE user_id = $1 AND lower(name) = ANY($2) ORDER BY lower(name)",
	)
	.bind(user_id)
	.bind(&lowered)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn list_tags_with_counts<'e, E>(executor: E, user_id: &str) -> Result<Vec<TagWithCount>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, TagWithCount>(
		"\
SELECT t.tag_id, t.name, t.color, t.created_at, count(mt.memory_id) AS memory_count
FROM tags t
LEFT JOIN memory_tags mt ON mt.tag_id = t.tag_id
WHERE t.user_id = $1
GROUP BY t.tag_id, t.name, t.color, t.created_at
ORDER BY lower(t.name)",
	)
	.bind(user_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn tag_names<'e, E>(executor: E, user_id: &str) -> Result<Vec<String>>
where
	E: PgExecutor<'e>,
{
	let rows: Vec<String> =
		sqlx::query_scalar("SELECT name FROM tags WHERE user_id = $1 ORDER BY lower(name)")
			.bind(user_id)
			.fetch_all(executor)
			.await?;

	Ok(rows)
}

pub async fn update_tag<'e, E>(
	executor: E,
	user_id: &str,
	tag_id: Uuid,
	name: Option<&str>,
	color: Option<&str>,
) -> Result<Option<Tag>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, Tag>(
		"\
UPDATE tags
SET name = COALESCE($3, name), color = COALESCE($4, color)
WHERE tag_id = $1 AND user_id = $2
RETURNING *",
	)
	.bind(tag_id)
	.bind(user_id)
	.bind(name)
	.bind(color)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn delete_tags<'e, E>(executor: E, user_id: &str, tag_ids: &[Uuid]) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM tags WHERE user_id = $1 AND tag_id = ANY($2)")
		.bind(user_id)
		.bind(tag_ids)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

pub async fn tags_for_memory<'e, E>(executor: E, memory_id: Uuid) -> Result<Vec<Tag>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, Tag>(
		"\
SELECT t.*
FROM tags t
JOIN memory_tags mt ON mt.tag_id = t.tag_id
WHERE mt.memory_id = $1
ORDER BY lower(t.name)",
	)
	.bind(memory_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn attach_tags<'e, E>(executor: E, memory_id: Uuid, tag_ids: &[Uuid]) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO memory_tags (memory_id, tag_id)
SELECT $1, tag_id FROM unnest($2::uuid[]) AS tag_id
ON CONFLICT DO NOTHING",
	)
	.bind(memory_id)
	.bind(tag_ids)
	.execute(executor)
	.await?;

	Ok(())
}

/// Removes every link of `memory_id` whose tag is not in `keep`.
pub async fn detach_tags_except<'e, E>(executor: E, memory_id: Uuid, keep: &[Uuid]) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query("DELETE FROM memory_tags WHERE memory_id = $1 AND NOT (tag_id = ANY($2))")
		.bind(memory_id)
		.bind(keep)
		.execute(executor)
		.await?;

	Ok(())
}

/// Links `target` to every memory currently linked to any of `sources`, in one statement.
pub async fn relink_tags<'e, E>(executor: E, sources: &[Uuid], target: Uuid) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO memory_tags (memory_id, tag_id)
SELECT DISTINCT memory_id, $2
FROM memory_tags
WHERE tag_id = ANY($1)
ON CONFLICT DO NOTHING",
	)
	.bind(sources)
	.bind(target)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

pub async fn insert_document<'e, E>(executor: E, document: &Document) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO documents (document_id, user_id, title, content_type, source_key, created_at)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(document.document_id)
	.bind(document.user_id.as_str())
	.bind(document.title.as_str())
	.bind(document.content_type.as_str())
	.bind(document.source_key.as_deref())
	.bind(document.created_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn get_document<'e, E>(
	executor: E,
	user_id: &str,
	document_id: Uuid,
) -> Result<Option<Document>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, Document>(
		"SELECT * FROM documents WHERE document_id = $1 AND user_id = $2",
	)
	.bind(document_id)
	.bind(user_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn list_documents<'e, E>(executor: E, user_id: &str) -> Result<Vec<DocumentWithCount>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, DocumentWithCount>(
		"\
SELECT
	d.document_id,
	d.title,
	d.content_type,
	d.source_key,
	d.created_at,
	count(c.chunk_id) AS chunk_count
FROM documents d
LEFT JOIN chunks c ON c.document_id = d.document_id
WHERE d.user_id = $1
GROUP BY d.document_id, d.title, d.content_type, d.source_key, d.created_at
ORDER BY d.created_at DESC",
	)
	.bind(user_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Documents created in `[from, to)`, newest first.
pub async fn documents_between<'e, E>(
	executor: E,
	user_id: &str,
	from: OffsetDateTime,
	to: OffsetDateTime,
) -> Result<Vec<Document>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, Document>(
		"\
SELECT *
FROM documents
WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
ORDER BY created_at DESC, document_id DESC",
	)
	.bind(user_id)
	.bind(from)
	.bind(to)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn delete_document<'e, E>(executor: E, user_id: &str, document_id: Uuid) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM documents WHERE document_id = $1 AND user_id = $2")
		.bind(document_id)
		.bind(user_id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() > 0)
}

fn push_memory_filters<'a>(
	builder: &mut QueryBuilder<'a, Postgres>,
	user_id: &'a str,
	filter: &'a MemoryFilter,
) {
	builder.push("user_id = ");
	builder.push_bind(user_id);

	if let Some(media_type) = filter.media_type.as_deref() {
		builder.push(" AND media_type = ");
		builder.push_bind(media_type);
	}
	if let Some(topic) = filter.topic.as_deref() {
		builder.push(" AND topic ILIKE ");
		builder.push_bind(like_pattern(topic));
	}
	if let Some(mood) = filter.mood {
		builder.push(" AND mood = ");
		builder.push_bind(mood);
	}
	if let Some(status) = filter.status.as_deref() {
		builder.push(" AND status = ");
		builder.push_bind(status);
	}
	if !filter.tag_ids.is_empty() {
		builder.push(
			" AND EXISTS (SELECT 1 FROM memory_tags mt \
			WHERE mt.memory_id = raw_memories.memory_id AND mt.tag_id = ANY(",
		);
		builder.push_bind(filter.tag_ids.as_slice());
		builder.push("))");
	}
	if let Some(search) = filter.search.as_deref() {
		let pattern = like_pattern(search);

		builder.push(" AND (title ILIKE ");
		builder.push_bind(pattern.clone());
		builder.push(" OR description ILIKE ");
		builder.push_bind(pattern.clone());
		builder.push(" OR topic ILIKE ");
		builder.push_bind(pattern);
		builder.push(")");
	}
	if let Some(from) = filter.created_from {
		builder.push(" AND created_at >= ");
		builder.push_bind(from);
	}
	if let Some(to) = filter.created_to {
		builder.push(" AND created_at < ");
		builder.push_bind(to);
	}
}

fn like_pattern(needle: &str) -> String {
	let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");

	format!("%{escaped}%")
}
