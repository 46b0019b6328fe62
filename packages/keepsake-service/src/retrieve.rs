use std::fmt::Write as _;

use keepsake_domain::{entity::USER_SELF, query};
use keepsake_storage::{
	models::{EntityMemory, SemanticHit},
	queries,
};

use crate::{KeepsakeService, Result};

const NONE_FOUND: &str = "none found";

#[derive(Clone, Debug)]
pub enum Retrieval {
	/// The query asks for the user's name and no identity record exists.
	NameNotStored,
	Context(MemoryContext),
}

/// Layered context for one query, in priority order.
#[derive(Clone, Debug)]
pub struct MemoryContext {
	pub identity_query: bool,
	pub identity: Option<EntityMemory>,
	pub semantic: Vec<SemanticHit>,
	pub entities: Vec<EntityMemory>,
}
impl MemoryContext {
	/// No semantic memories and no identity record: nothing to ground an answer on.
	pub fn is_empty(&self) -> bool {
		self.semantic.is_empty() && self.identity.is_none()
	}

	pub fn render(&self) -> String {
		let mut out = String::from("Identity (authority, highest priority):\n");

		match &self.identity {
			Some(identity) => {
				let _ = writeln!(out, "- {}", identity.summary);
			},
			None => {
				let _ = writeln!(out, "- {NONE_FOUND}");
			},
		}

		out.push_str("\nSemantic memories:\n");

		if self.semantic.is_empty() {
			let _ = writeln!(out, "- {NONE_FOUND}");
		}

		for hit in &self.semantic {
			let _ = writeln!(out, "- ({}) {}", hit.created_at.date(), hit.content);
		}

		out.push_str("\nEntity context:\n");

		if self.entities.is_empty() {
			let _ = writeln!(out, "- {NONE_FOUND}");
		}

		for entity in &self.entities {
			let _ = writeln!(
				out,
				"- {} (mentioned {} times): {}",
				entity.name, entity.observation_count, entity.summary
			);
		}

		out
	}
}

impl KeepsakeService {
	/// Builds the layered context for `query`. The identity record is read before any similarity
	/// search so that self-referential questions are answered from it alone.
	pub async fn retrieve_context(&self, user_id: &str, query_text: &str) -> Result<Retrieval> {
		let identity_cfg = &self.cfg.memory.identity;
		let identity_query = query::is_identity_query(query_text, identity_cfg);
		let identity = queries::get_entity(&self.db.pool, user_id, USER_SELF).await?;

		if identity_query && identity.is_none() && query::asks_for_name(query_text, identity_cfg) {
			return Ok(Retrieval::NameNotStored);
		}

		let query_vec = self.embed_text(query_text).await?;
		let semantic = queries::nearest_semantic(
			&self.db.pool,
			user_id,
			&query_vec,
			i64::from(self.cfg.memory.semantic_top_k),
		)
		.await?;
		let entities = queries::recent_entities(
			&self.db.pool,
			user_id,
			USER_SELF,
			i64::from(self.cfg.memory.entity_context_limit),
		)
		.await?;

		tracing::debug!(
			identity_query,
			has_identity = identity.is_some(),
			semantic = semantic.len(),
			entities = entities.len(),
			"Retrieved memory context."
		);

		Ok(Retrieval::Context(MemoryContext { identity_query, identity, semantic, entities }))
	}
}
