mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Chunking, Config, EmbeddingProviderConfig, Identity, LlmProviderConfig, Memory, Objects,
	Postgres, Providers, Service, Storage, TranscriptionProviderConfig, Worker,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.objects.root.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.objects.root must be non-empty.".to_string(),
		});
	}
	if cfg.storage.objects.signing_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.objects.signing_key must be non-empty.".to_string(),
		});
	}
	if cfg.storage.objects.signed_url_ttl_seconds <= 0 {
		return Err(Error::Validation {
			message: "storage.objects.signed_url_ttl_seconds must be greater than zero."
				.to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("llm", &cfg.providers.llm.api_key),
		("transcription", &cfg.providers.transcription.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if !cfg.providers.llm.temperature.is_finite() || cfg.providers.llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number, zero or greater."
				.to_string(),
		});
	}
	if cfg.providers.transcription.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "providers.transcription.poll_interval_ms must be greater than zero."
				.to_string(),
		});
	}
	if !cfg.memory.dup_distance_threshold.is_finite() {
		return Err(Error::Validation {
			message: "memory.dup_distance_threshold must be a finite number.".to_string(),
		});
	}
	if cfg.memory.dup_distance_threshold <= 0.0 {
		return Err(Error::Validation {
			message: "memory.dup_distance_threshold must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("memory.semantic_top_k", cfg.memory.semantic_top_k),
		("memory.entity_context_limit", cfg.memory.entity_context_limit),
		("memory.meta_recent_limit", cfg.memory.meta_recent_limit),
		("memory.max_entity_summary_chars", cfg.memory.max_entity_summary_chars),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.memory.request_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "memory.request_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !(1..=5).contains(&cfg.memory.default_emotion_weight) {
		return Err(Error::Validation {
			message: "memory.default_emotion_weight must be in the range 1-5.".to_string(),
		});
	}
	if cfg.memory.identity.keywords.is_empty() {
		return Err(Error::Validation {
			message: "memory.identity.keywords must be non-empty.".to_string(),
		});
	}
	if cfg.memory.identity.name_keywords.is_empty() {
		return Err(Error::Validation {
			message: "memory.identity.name_keywords must be non-empty.".to_string(),
		});
	}
	if cfg.chunking.max_units == 0 {
		return Err(Error::Validation {
			message: "chunking.max_units must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.overlap_units >= cfg.chunking.max_units {
		return Err(Error::Validation {
			message: "chunking.overlap_units must be less than chunking.max_units.".to_string(),
		});
	}
	if cfg.chunking.words_per_transcript_chunk == 0 {
		return Err(Error::Validation {
			message: "chunking.words_per_transcript_chunk must be greater than zero.".to_string(),
		});
	}
	if cfg.worker.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "worker.poll_interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.worker.lease_seconds <= 0 {
		return Err(Error::Validation {
			message: "worker.lease_seconds must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.chunking.tokenizer_repo.as_deref().map(|repo| repo.trim().is_empty()).unwrap_or(false) {
		cfg.chunking.tokenizer_repo = None;
	}

	for list in [&mut cfg.memory.identity.keywords, &mut cfg.memory.identity.name_keywords] {
		for keyword in list.iter_mut() {
			*keyword = keyword.trim().to_lowercase();
		}

		list.retain(|keyword| !keyword.is_empty());
	}
}
