use serde::{Deserialize, Serialize};

use keepsake_domain::{intent::Intent, query};

use crate::{
	Error, KeepsakeService, Result,
	respond::{self, DUPLICATE_ANSWER, FALLBACK_ANSWER, INSUFFICIENT_MEMORY_ANSWER},
	retrieve::Retrieval,
	save::SaveMemoryRequest,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AskRequest {
	pub user_id: String,
	pub query: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AskResponse {
	pub answer: String,
	pub route: AskRoute,
}

/// The terminal state a query reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskRoute {
	Meta,
	Saved,
	Duplicate,
	Grounded,
	NameNotStored,
	Insufficient,
	Casual,
	Fallback,
}

impl KeepsakeService {
	/// Routes one chat message through meta shortcut, classification, and the save, query or
	/// casual branch.
	///
	/// Read-side failures become a fallback answer. Errors are returned only when a save could
	/// not be completed, so the caller can decide whether to retry.
	pub async fn ask(&self, req: AskRequest) -> Result<AskResponse> {
		let user_id = crate::require_user(&req.user_id)?;
		let message = req.query.trim();

		if message.is_empty() {
			return Err(Error::InvalidRequest { message: "query is required.".to_string() });
		}
		if let Some(meta) = query::detect_meta(message, self.cfg.memory.meta_recent_limit) {
			return Ok(match self.answer_meta(user_id, meta).await {
				Ok(answer) => AskResponse { answer, route: AskRoute::Meta },
				Err(err) => fallback("meta", &err),
			});
		}

		let classification = self.classify_intent(message).await;

		tracing::info!(action = ?classification.action, "Classified message.");

		match classification.action {
			Intent::SaveMemory => {
				let Some(summary) = classification.memory_summary else {
					return Ok(self.casual(message).await);
				};
				let check = self.find_duplicate(user_id, &summary).await?;

				if check.is_duplicate {
					return Ok(AskResponse {
						answer: DUPLICATE_ANSWER.to_string(),
						route: AskRoute::Duplicate,
					});
				}

				let req = SaveMemoryRequest {
					user_id: user_id.to_string(),
					text: message.to_string(),
					summary: summary.clone(),
					entities: classification.entities,
					tags: classification.tags,
				};
				let memory_id = self.save_memory(req, Some(check.embedding)).await?;

				tracing::info!(memory_id = %memory_id, "Saved memory from chat.");

				Ok(AskResponse {
					answer: format!("Got it. I've saved that: {summary}"),
					route: AskRoute::Saved,
				})
			},
			Intent::QueryMemory => Ok(self.answer_query(user_id, message).await),
			Intent::OutOfScope => Ok(self.casual(message).await),
		}
	}

	async fn answer_query(&self, user_id: &str, message: &str) -> AskResponse {
		let context = match self.retrieve_context(user_id, message).await {
			Ok(Retrieval::NameNotStored) =>
				return AskResponse {
					answer: respond::NAME_NOT_STORED_ANSWER.to_string(),
					route: AskRoute::NameNotStored,
				},
			Ok(Retrieval::Context(context)) => context,
			Err(err) => return fallback("retrieval", &err),
		};

		if context.is_empty() {
			return AskResponse {
				answer: INSUFFICIENT_MEMORY_ANSWER.to_string(),
				route: AskRoute::Insufficient,
			};
		}

		match self.shape_grounded(message, &context).await {
			Ok(answer) => AskResponse { answer, route: AskRoute::Grounded },
			Err(err) => fallback("grounded answer", &err),
		}
	}

	async fn casual(&self, message: &str) -> AskResponse {
		match self.shape_casual(message).await {
			Ok(answer) => AskResponse { answer, route: AskRoute::Casual },
			Err(err) => fallback("casual reply", &err),
		}
	}
}

fn fallback(stage: &str, err: &Error) -> AskResponse {
	tracing::warn!(stage, error = %err, "Answering with fallback message.");

	AskResponse { answer: FALLBACK_ANSWER.to_string(), route: AskRoute::Fallback }
}
