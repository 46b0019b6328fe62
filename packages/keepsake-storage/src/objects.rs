use std::{
	io::ErrorKind,
	path::{Component, Path, PathBuf},
};

use time::{Duration, OffsetDateTime};
use tokio::fs;
use uuid::Uuid;

use crate::{Error, Result};

/// Filesystem-backed object store addressed by opaque keys of the form `{user}/{uuid}{ext}`.
pub struct LocalObjectStore {
	root: PathBuf,
	public_base_url: String,
	signing_key: [u8; 32],
	ttl: Duration,
}
impl LocalObjectStore {
	pub fn new(cfg: &keepsake_config::Objects) -> Self {
		Self {
			root: PathBuf::from(&cfg.root),
			public_base_url: cfg.public_base_url.trim_end_matches('/').to_string(),
			signing_key: *blake3::hash(cfg.signing_key.as_bytes()).as_bytes(),
			ttl: Duration::seconds(cfg.signed_url_ttl_seconds),
		}
	}

	pub async fn upload(&self, user_id: &str, filename: &str, content: &[u8]) -> Result<String> {
		let key = object_key(user_id, filename);
		let path = self.path_for(&key)?;

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await?;
		}

		fs::write(&path, content).await?;

		Ok(key)
	}

	pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
		let path = self.path_for(key)?;

		match fs::read(&path).await {
			Ok(bytes) => Ok(bytes),
			Err(err) if err.kind() == ErrorKind::NotFound =>
				Err(Error::NotFound(format!("Object {key} does not exist."))),
			Err(err) => Err(err.into()),
		}
	}

	pub async fn download_text(&self, key: &str) -> Result<String> {
		let bytes = self.download(key).await?;

		String::from_utf8(bytes)
			.map_err(|_| Error::InvalidArgument(format!("Object {key} is not valid UTF-8 text.")))
	}

	/// Returns `false` when the object was already gone.
	pub async fn delete(&self, key: &str) -> Result<bool> {
		let path = self.path_for(key)?;

		match fs::remove_file(&path).await {
			Ok(()) => Ok(true),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
			Err(err) => Err(err.into()),
		}
	}

	pub fn signed_url(&self, key: &str, now: OffsetDateTime) -> Result<String> {
		self.path_for(key)?;

		let expires = (now + self.ttl).unix_timestamp();
		let signature = self.signature(key, expires);

		Ok(format!("{}/{key}?expires={expires}&signature={signature}", self.public_base_url))
	}

	pub fn verify_signature(
		&self,
		key: &str,
		expires: i64,
		signature: &str,
		now: OffsetDateTime,
	) -> bool {
		if now.unix_timestamp() > expires {
			return false;
		}

		let Ok(expected) = blake3::Hash::from_hex(self.signature(key, expires)) else {
			return false;
		};
		let Ok(provided) = blake3::Hash::from_hex(signature) else {
			return false;
		};

		// Hash equality is constant-time.
		expected == provided
	}

	fn signature(&self, key: &str, expires: i64) -> String {
		blake3::keyed_hash(&self.signing_key, format!("{key}\n{expires}").as_bytes())
			.to_hex()
			.to_string()
	}

	fn path_for(&self, key: &str) -> Result<PathBuf> {
		let relative = Path::new(key);
		let safe = !key.is_empty()
			&& relative.components().all(|component| matches!(component, Component::Normal(_)));

		if !safe {
			return Err(Error::InvalidArgument(format!(
				"Object key {key:?} is not a relative path."
			)));
		}

		Ok(self.root.join(relative))
	}
}

fn object_key(user_id: &str, filename: &str) -> String {
	let owner: String = user_id
		.chars()
		.map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
		.collect();
	let extension = Path::new(filename)
		.extension()
		.and_then(|ext| ext.to_str())
		.filter(|ext| !ext.is_empty() && ext.chars().all(|ch| ch.is_ascii_alphanumeric()))
		.map(|ext| format!(".{}", ext.to_lowercase()))
		.unwrap_or_default();
	let owner = if owner.is_empty() { "_".to_string() } else { owner };

	format!("{owner}/{}{extension}", Uuid::new_v4())
}
