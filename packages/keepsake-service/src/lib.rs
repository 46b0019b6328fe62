pub mod ask;
pub mod calendar;
pub mod classify;
pub mod dedup;
pub mod documents;
pub mod memories;
pub mod meta;
pub mod prompts;
pub mod respond;
pub mod retrieve;
pub mod save;
pub mod tags;
pub mod transcripts;
pub mod upload;

mod error;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use time::OffsetDateTime;

pub use ask::{AskRequest, AskResponse, AskRoute};
pub use calendar::CalendarDay;
pub use dedup::DuplicateCheck;
pub use documents::IngestDocumentRequest;
pub use error::{Error, Result};
use keepsake_chunking::{Measure, Tokenizer};
use keepsake_config::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, TranscriptionProviderConfig,
};
use keepsake_providers::{completion, embedding, media, transcription, transcription::Transcript};
use keepsake_storage::{db::Db, objects::LocalObjectStore};
pub use memories::{ListMemoriesRequest, ListMemoriesResponse, MemoryDetail, UpdateMemoryRequest};
pub use retrieve::{MemoryContext, Retrieval};
pub use save::SaveMemoryRequest;
pub use tags::MergeTagsResponse;
pub use transcripts::{TranscriptFormat, TranscriptMatch};
pub use upload::{
	CreateTextMemoryRequest, MemoryMetadata, RegisterUploadRequest, SaveFromUploadRequest,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system_prompt: &'a str,
		user_prompt: &'a str,
		temperature: f32,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait TranscriptionProvider
where
	Self: Send + Sync,
{
	fn transcribe<'a>(
		&'a self,
		cfg: &'a TranscriptionProviderConfig,
		audio_url: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Transcript>>;
}

pub trait AudioExtractor
where
	Self: Send + Sync,
{
	fn extract_audio<'a>(&'a self, video: &'a [u8]) -> BoxFuture<'a, color_eyre::Result<Vec<u8>>>;
}

/// Opaque-key blob storage for uploaded media, extracted audio and transcripts.
pub trait ObjectStore
where
	Self: Send + Sync,
{
	fn upload<'a>(
		&'a self,
		user_id: &'a str,
		filename: &'a str,
		content: &'a [u8],
	) -> BoxFuture<'a, keepsake_storage::Result<String>>;

	fn download<'a>(&'a self, key: &'a str) -> BoxFuture<'a, keepsake_storage::Result<Vec<u8>>>;

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, keepsake_storage::Result<bool>>;

	fn signed_url(&self, key: &str, now: OffsetDateTime) -> keepsake_storage::Result<String>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub completion: Arc<dyn CompletionProvider>,
	pub transcription: Arc<dyn TranscriptionProvider>,
	pub audio: Arc<dyn AudioExtractor>,
}

pub struct KeepsakeService {
	pub cfg: Config,
	pub db: Db,
	pub objects: Arc<dyn ObjectStore>,
	pub providers: Providers,
	tokenizer: Option<Arc<Tokenizer>>,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system_prompt: &'a str,
		user_prompt: &'a str,
		temperature: f32,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(completion::complete(cfg, system_prompt, user_prompt, temperature))
	}
}

impl TranscriptionProvider for DefaultProviders {
	fn transcribe<'a>(
		&'a self,
		cfg: &'a TranscriptionProviderConfig,
		audio_url: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Transcript>> {
		Box::pin(transcription::transcribe(cfg, audio_url))
	}
}

impl AudioExtractor for DefaultProviders {
	fn extract_audio<'a>(&'a self, video: &'a [u8]) -> BoxFuture<'a, color_eyre::Result<Vec<u8>>> {
		Box::pin(media::extract_audio(video))
	}
}

impl ObjectStore for LocalObjectStore {
	fn upload<'a>(
		&'a self,
		user_id: &'a str,
		filename: &'a str,
		content: &'a [u8],
	) -> BoxFuture<'a, keepsake_storage::Result<String>> {
		Box::pin(LocalObjectStore::upload(self, user_id, filename, content))
	}

	fn download<'a>(&'a self, key: &'a str) -> BoxFuture<'a, keepsake_storage::Result<Vec<u8>>> {
		Box::pin(LocalObjectStore::download(self, key))
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, keepsake_storage::Result<bool>> {
		Box::pin(LocalObjectStore::delete(self, key))
	}

	fn signed_url(&self, key: &str, now: OffsetDateTime) -> keepsake_storage::Result<String> {
		LocalObjectStore::signed_url(self, key, now)
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		completion: Arc<dyn CompletionProvider>,
		transcription: Arc<dyn TranscriptionProvider>,
		audio: Arc<dyn AudioExtractor>,
	) -> Self {
		Self { embedding, completion, transcription, audio }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			completion: provider.clone(),
			transcription: provider.clone(),
			audio: provider,
		}
	}
}

impl KeepsakeService {
	pub fn new(cfg: Config, db: Db) -> Self {
		let objects = Arc::new(LocalObjectStore::new(&cfg.storage.objects));

		Self { cfg, db, objects, providers: Providers::default(), tokenizer: None }
	}

	pub fn with_providers(
		cfg: Config,
		db: Db,
		objects: Arc<dyn ObjectStore>,
		providers: Providers,
	) -> Self {
		Self { cfg, db, objects, providers, tokenizer: None }
	}

	/// Measures chunk sizes in tokens instead of characters.
	pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
		self.tokenizer = Some(Arc::new(tokenizer));

		self
	}

	pub(crate) fn measure(&self) -> Measure<'_> {
		match self.tokenizer.as_deref() {
			Some(tokenizer) => Measure::Tokens(tokenizer),
			None => Measure::Chars,
		}
	}

	pub(crate) fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.cfg.memory.request_timeout_ms)
	}

	/// Runs one external call under `limit`, mapping its failure to a retryable error kind.
	pub(crate) async fn bounded<T, F>(&self, what: &str, limit: Duration, call: F) -> Result<T>
	where
		F: Future<Output = color_eyre::Result<T>>,
	{
		match tokio::time::timeout(limit, call).await {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(err)) => Err(Error::Provider { message: format!("{what} failed: {err}") }),
			Err(_) => Err(Error::Timeout {
				message: format!("{what} did not finish within {} ms.", limit.as_millis()),
			}),
		}
	}

	/// Embeds `texts` in one batch and checks count and dimensionality of the result.
	pub(crate) async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() {
			return Ok(Vec::new());
		}

		let cfg = &self.cfg.providers.embedding;
		let vectors = self
			.bounded(
				"Embedding",
				self.request_timeout(),
				self.providers.embedding.embed(cfg, texts),
			)
			.await?;

		if vectors.len() != texts.len() {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} vectors for {} inputs.",
					vectors.len(),
					texts.len()
				),
			});
		}
		if vectors.iter().any(|vector| vector.len() != cfg.dimensions as usize) {
			return Err(Error::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		Ok(vectors)
	}

	pub(crate) async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
		let mut vectors = self.embed_texts(&[text.to_string()]).await?;

		vectors.pop().ok_or_else(|| Error::Provider {
			message: "Embedding provider returned no vectors.".to_string(),
		})
	}

	pub(crate) async fn complete(
		&self,
		system_prompt: &str,
		user_prompt: &str,
		temperature: f32,
	) -> Result<String> {
		let cfg = &self.cfg.providers.llm;

		self.bounded(
			"Completion",
			self.request_timeout(),
			self.providers.completion.complete(cfg, system_prompt, user_prompt, temperature),
		)
		.await
	}

	pub(crate) async fn download_text(&self, key: &str) -> Result<String> {
		let bytes = self.objects.download(key).await.map_err(Error::object_store)?;

		String::from_utf8(bytes).map_err(|_| Error::InvalidRequest {
			message: format!("Object {key} is not valid UTF-8 text."),
		})
	}

	/// Deletes objects that no longer have an owning row. Failures are logged and dropped.
	pub(crate) async fn discard_objects<'a, I>(&self, keys: I)
	where
		I: IntoIterator<Item = &'a str>,
	{
		for key in keys {
			if let Err(err) = self.objects.delete(key).await {
				tracing::warn!(key, error = %err, "Failed to delete orphaned object.");
			}
		}
	}
}

pub(crate) fn require_user(user_id: &str) -> Result<&str> {
	let user_id = user_id.trim();

	if user_id.is_empty() {
		return Err(Error::InvalidRequest { message: "user_id is required.".to_string() });
	}

	Ok(user_id)
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}
