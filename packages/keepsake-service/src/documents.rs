use time::OffsetDateTime;
use uuid::Uuid;

use keepsake_storage::{
	models::{ChunkOwner, Document, DocumentWithCount, NewChunk},
	queries,
};

use crate::{Error, KeepsakeService, Result, require_user};

/// Reference text outside the memory timeline. Only its chunks are stored.
#[derive(Clone, Debug)]
pub struct IngestDocumentRequest {
	pub user_id: String,
	pub title: String,
	pub content_type: String,
	pub text: String,
}

impl KeepsakeService {
	pub async fn ingest_document(&self, req: IngestDocumentRequest) -> Result<Document> {
		let user_id = require_user(&req.user_id)?;
		let title = req.title.trim();
		let text = req.text.trim();

		if title.is_empty() || text.is_empty() {
			return Err(Error::InvalidRequest {
				message: "A document needs a title and text.".to_string(),
			});
		}

		let chunks = self.embed_drafts(self.text_chunks(text)).await?;
		let source_key = self
			.objects
			.upload(user_id, "document.txt", text.as_bytes())
			.await
			.map_err(Error::object_store)?;
		let document = Document {
			document_id: Uuid::new_v4(),
			user_id: user_id.to_string(),
			title: title.to_string(),
			content_type: req.content_type.trim().to_string(),
			source_key: Some(source_key.clone()),
			created_at: OffsetDateTime::now_utc(),
		};

		if let Err(err) = self.write_document(&document, chunks).await {
			self.discard_objects([source_key.as_str()]).await;

			return Err(err);
		}

		tracing::info!(document_id = %document.document_id, "Ingested document.");

		Ok(document)
	}

	pub async fn list_documents(&self, user_id: &str) -> Result<Vec<DocumentWithCount>> {
		let user_id = require_user(user_id)?;

		Ok(queries::list_documents(&self.db.pool, user_id).await?)
	}

	pub async fn delete_document(&self, user_id: &str, document_id: Uuid) -> Result<()> {
		let user_id = require_user(user_id)?;
		let Some(document) = queries::get_document(&self.db.pool, user_id, document_id).await?
		else {
			return Err(Error::NotFound { message: format!("Document {document_id} not found.") });
		};

		if !queries::delete_document(&self.db.pool, user_id, document_id).await? {
			return Err(Error::NotFound { message: format!("Document {document_id} not found.") });
		}

		self.discard_objects(document.source_key.as_deref()).await;

		Ok(())
	}

	async fn write_document(
		&self,
		document: &Document,
		chunks: Vec<(crate::save::ChunkDraft, Vec<f32>)>,
	) -> Result<()> {
		let mut tx = self.db.pool.begin().await?;

		queries::insert_document(&mut *tx, document).await?;

		for (draft, embedding) in chunks {
			let chunk = NewChunk {
				chunk_id: Uuid::new_v4(),
				user_id: document.user_id.clone(),
				owner: ChunkOwner::Document(document.document_id),
				chunk_index: draft.chunk_index,
				start_offset: draft.start_offset,
				end_offset: draft.end_offset,
				start_seconds: None,
				end_seconds: None,
				content: draft.content,
				embedding,
			};

			queries::insert_chunk(&mut *tx, &chunk).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
