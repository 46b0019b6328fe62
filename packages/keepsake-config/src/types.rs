use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub memory: Memory,
	pub chunking: Chunking,
	#[serde(default)]
	pub worker: Worker,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub objects: Objects,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Objects {
	/// Directory backing the local object store.
	pub root: String,
	/// Prefix used when minting signed URLs, e.g. "https://media.example.com/objects".
	pub public_base_url: String,
	pub signing_key: String,
	#[serde(default = "default_signed_url_ttl_seconds")]
	pub signed_url_ttl_seconds: i64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
	pub transcription: TranscriptionProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub poll_interval_ms: u64,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Memory {
	/// L2 distance below which a new summary is treated as a duplicate.
	#[serde(default = "default_dup_distance_threshold")]
	pub dup_distance_threshold: f32,
	#[serde(default = "default_semantic_top_k")]
	pub semantic_top_k: u32,
	#[serde(default = "default_entity_context_limit")]
	pub entity_context_limit: u32,
	#[serde(default = "default_meta_recent_limit")]
	pub meta_recent_limit: u32,
	pub request_timeout_ms: u64,
	#[serde(default = "default_max_entity_summary_chars")]
	pub max_entity_summary_chars: u32,
	#[serde(default = "default_emotion_weight")]
	pub default_emotion_weight: i32,
	#[serde(default)]
	pub identity: Identity,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Identity {
	/// Phrases that mark a query as asking about the user themself.
	pub keywords: Vec<String>,
	/// Subset of identity phrases that ask specifically for the user's name.
	pub name_keywords: Vec<String>,
}
impl Default for Identity {
	fn default() -> Self {
		Self {
			keywords: [
				"who am i",
				"my name",
				"what am i called",
				"my job",
				"my occupation",
				"my profession",
				"my role",
				"what do i do for work",
				"what do i do for a living",
				"where do i work",
				"about me",
			]
			.into_iter()
			.map(str::to_string)
			.collect(),
			name_keywords: ["my name", "what am i called"]
				.into_iter()
				.map(str::to_string)
				.collect(),
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Chunking {
	pub max_units: u32,
	pub overlap_units: u32,
	#[serde(default = "default_words_per_transcript_chunk")]
	pub words_per_transcript_chunk: u32,
	pub tokenizer_repo: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Worker {
	pub poll_interval_ms: u64,
	pub lease_seconds: i64,
}
impl Default for Worker {
	fn default() -> Self {
		Self { poll_interval_ms: 500, lease_seconds: 300 }
	}
}

fn default_signed_url_ttl_seconds() -> i64 {
	3_600
}

fn default_dup_distance_threshold() -> f32 {
	0.15
}

fn default_semantic_top_k() -> u32 {
	5
}

fn default_entity_context_limit() -> u32 {
	5
}

fn default_meta_recent_limit() -> u32 {
	5
}

fn default_max_entity_summary_chars() -> u32 {
	1_000
}

fn default_emotion_weight() -> i32 {
	3
}

fn default_words_per_transcript_chunk() -> u32 {
	40
}
