use keepsake_domain::intent::{self, IntentClassification};

use crate::{KeepsakeService, prompts::CLASSIFIER_SYSTEM_PROMPT};

const CLASSIFIER_TEMPERATURE: f32 = 0.0;

impl KeepsakeService {
	/// Labels a chat message. Never fails: provider errors and malformed output both yield
	/// [`IntentClassification::out_of_scope`].
	pub async fn classify_intent(&self, message: &str) -> IntentClassification {
		if intent::is_casual(message) {
			return IntentClassification::out_of_scope();
		}

		let reply = self.complete(CLASSIFIER_SYSTEM_PROMPT, message, CLASSIFIER_TEMPERATURE).await;
		let raw = match reply {
			Ok(raw) => raw,
			Err(err) => {
				tracing::warn!(error = %err, "Intent classifier call failed.");

				return IntentClassification::out_of_scope();
			},
		};
		let classification = match intent::decode(&raw) {
			Ok(classification) => classification,
			Err(err) => {
				tracing::warn!(error = %err, "Intent classifier output rejected.");

				return IntentClassification::out_of_scope();
			},
		};

		intent::apply_guards(message, classification)
	}
}
