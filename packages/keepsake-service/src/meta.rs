use keepsake_domain::query::MetaQuery;
use keepsake_storage::{models::SemanticMemory, queries};

use crate::{KeepsakeService, Result};

pub const NO_MEMORIES_ANSWER: &str = "You don't have any memories stored yet.";

impl KeepsakeService {
	/// Answers a keyword-triggered request straight from storage, with no model call.
	pub async fn answer_meta(&self, user_id: &str, meta: MetaQuery) -> Result<String> {
		match meta {
			MetaQuery::Tags => {
				let keywords = queries::semantic_keywords(&self.db.pool, user_id).await?;
				let names = queries::tag_names(&self.db.pool, user_id).await?;

				Ok(format_tags(tag_union(keywords.into_iter().chain(names))))
			},
			MetaQuery::Recent { limit } => {
				let recent =
					queries::recent_semantic(&self.db.pool, user_id, i64::from(limit.max(1)))
						.await?;

				Ok(format_recent(&recent))
			},
		}
	}
}

/// Case-insensitive union, sorted, keeping the first spelling seen.
pub fn tag_union<I>(values: I) -> Vec<String>
where
	I: IntoIterator<Item = String>,
{
	let mut out: Vec<String> = Vec::new();

	for value in values {
		let value = value.trim();
		let lowered = value.to_lowercase();

		if value.is_empty() || out.iter().any(|seen| seen.to_lowercase() == lowered) {
			continue;
		}

		out.push(value.to_string());
	}

	out.sort_by_key(|value| value.to_lowercase());

	out
}

fn format_tags(tags: Vec<String>) -> String {
	if tags.is_empty() {
		return NO_MEMORIES_ANSWER.to_string();
	}

	format!("Your tags: {}.", tags.join(", "))
}

fn format_recent(memories: &[SemanticMemory]) -> String {
	match memories {
		[] => NO_MEMORIES_ANSWER.to_string(),
		[only] => format!("Your most recent memory: {}", only.content),
		many => {
			let lines: Vec<String> = many
				.iter()
				.enumerate()
				.map(|(idx, memory)| format!("{}. {}", idx + 1, memory.content))
				.collect();

			format!("Your most recent memories:\n{}", lines.join("\n"))
		},
	}
}
