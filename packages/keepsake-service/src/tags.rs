use time::OffsetDateTime;
use uuid::Uuid;

use keepsake_storage::{
	models::{Tag, TagWithCount},
	queries,
};

use crate::{Error, KeepsakeService, Result, collapse_whitespace, require_user};

const MAX_TAG_NAME_CHARS: usize = 64;

#[derive(Clone, Debug)]
pub struct MergeTagsResponse {
	pub target: Tag,
	/// Source tags removed by the merge.
	pub merged: u64,
	/// Memory links added to the target.
	pub relinked: u64,
}

impl KeepsakeService {
	pub async fn create_tag(&self, user_id: &str, name: &str, color: Option<&str>) -> Result<Tag> {
		let user_id = require_user(user_id)?;
		let name = validate_name(name)?;
		let color = color.map(validate_color).transpose()?;
		let tag = Tag {
			tag_id: Uuid::new_v4(),
			user_id: user_id.to_string(),
			name,
			color,
			created_at: OffsetDateTime::now_utc(),
		};

		match queries::insert_tag(&self.db.pool, &tag).await {
			Ok(()) => Ok(tag),
			Err(err) if err.is_unique_violation() =>
				Err(Error::Conflict { message: format!("Tag {} already exists.", tag.name) }),
			Err(err) => Err(err.into()),
		}
	}

	/// Every tag of the user with the number of memories it is attached to.
	pub async fn list_tags(&self, user_id: &str) -> Result<Vec<TagWithCount>> {
		let user_id = require_user(user_id)?;

		Ok(queries::list_tags_with_counts(&self.db.pool, user_id).await?)
	}

	pub async fn update_tag(
		&self,
		user_id: &str,
		tag_id: Uuid,
		name: Option<&str>,
		color: Option<&str>,
	) -> Result<Tag> {
		let user_id = require_user(user_id)?;
		let name = name.map(validate_name).transpose()?;
		let color = color.map(validate_color).transpose()?;
		let updated =
			queries::update_tag(&self.db.pool, user_id, tag_id, name.as_deref(), color.as_deref())
				.await;

		match updated {
			Ok(Some(tag)) => Ok(tag),
			Ok(None) => Err(Error::NotFound { message: format!("Tag {tag_id} not found.") }),
			Err(err) if err.is_unique_violation() => Err(Error::Conflict {
				message: format!("Tag {} already exists.", name.unwrap_or_default()),
			}),
			Err(err) => Err(err.into()),
		}
	}

	pub async fn delete_tag(&self, user_id: &str, tag_id: Uuid) -> Result<()> {
		let user_id = require_user(user_id)?;

		if queries::delete_tags(&self.db.pool, user_id, &[tag_id]).await? == 0 {
			return Err(Error::NotFound { message: format!("Tag {tag_id} not found.") });
		}

		Ok(())
	}

	/// Folds `source_ids` into `target_id`. The target's final memory set is computed in one
	/// insert-select, then the sources are deleted in one statement, which also drops their links.
	pub async fn merge_tags(
		&self,
		user_id: &str,
		source_ids: &[Uuid],
		target_id: Uuid,
	) -> Result<MergeTagsResponse> {
		let user_id = require_user(user_id)?;
		let mut sources: Vec<Uuid> =
			source_ids.iter().copied().filter(|id| *id != target_id).collect();

		sources.sort_unstable();
		sources.dedup();

		if sources.is_empty() {
			return Err(Error::InvalidRequest {
				message: "At least one source tag other than the target is required.".to_string(),
			});
		}

		let mut tx = self.db.pool.begin().await?;
		let Some(target) = queries::get_tag(&mut *tx, user_id, target_id).await? else {
			return Err(Error::NotFound { message: format!("Tag {target_id} not found.") });
		};

		if queries::tags_by_ids(&mut *tx, user_id, &sources).await?.len() != sources.len() {
			return Err(Error::NotFound { message: "Source tag not found.".to_string() });
		}

		let relinked = queries::relink_tags(&mut *tx, &sources, target_id).await?;
		let merged = queries::delete_tags(&mut *tx, user_id, &sources).await?;

		tx.commit().await?;

		tracing::info!(target_id = %target_id, merged, relinked, "Merged tags.");

		Ok(MergeTagsResponse { target, merged, relinked })
	}
}

fn validate_name(name: &str) -> Result<String> {
	let name = collapse_whitespace(name);

	if name.is_empty() || name.chars().count() > MAX_TAG_NAME_CHARS {
		return Err(Error::InvalidRequest {
			message: format!("Tag names must be 1 to {MAX_TAG_NAME_CHARS} characters."),
		});
	}

	Ok(name)
}

/// Accepts `#rgb` or `#rrggbb`, returned lowercased.
fn validate_color(color: &str) -> Result<String> {
	let color = color.trim();
	let valid = color.strip_prefix('#').is_some_and(|hex| {
		matches!(hex.len(), 3 | 6) && hex.chars().all(|ch| ch.is_ascii_hexdigit())
	});

	if !valid {
		return Err(Error::InvalidRequest {
			message: format!("Tag color {color:?} is not a hex color."),
		});
	}

	Ok(color.to_lowercase())
}
