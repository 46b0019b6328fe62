use keepsake_domain::{contains_phrase, fold_text};

use crate::{
	KeepsakeService, Result,
	prompts::{CASUAL_SYSTEM_PROMPT, GROUNDED_SYSTEM_PROMPT},
	retrieve::MemoryContext,
};

pub const FALLBACK_ANSWER: &str = "I'm having trouble retrieving memories right now.";
pub const INSUFFICIENT_MEMORY_ANSWER: &str =
	"I don't have enough stored memories to answer that yet.";
pub const NAME_NOT_STORED_ANSWER: &str =
	"I don't have your name stored yet. Tell me and I'll remember it.";
pub const IDENTITY_NOT_STORED_ANSWER: &str =
	"I don't have anything stored about who you are yet. Tell me and I'll remember it.";
pub const DUPLICATE_ANSWER: &str = "A similar memory already exists, so I didn't save it again.";

const CASUAL_TEMPERATURE: f32 = 0.5;
const COMPARATIVE_FRAMES: [&str; 4] = ["like", "similar to", "same as", "just as"];

impl KeepsakeService {
	/// Answers from the supplied context only. Identity answers that compare the user to another
	/// stored entity are replaced with the identity record itself.
	pub async fn shape_grounded(
		&self,
		query_text: &str,
		context: &MemoryContext,
	) -> Result<String> {
		let user_prompt = format!("Memory context:\n{}\nQuestion: {query_text}", context.render());
		let temperature = self.cfg.providers.llm.temperature;
		let answer = self.complete(GROUNDED_SYSTEM_PROMPT, &user_prompt, temperature).await?;
		let answer = answer.trim().to_string();

		if answer.is_empty() {
			return Ok(INSUFFICIENT_MEMORY_ANSWER.to_string());
		}
		if context.identity_query {
			return Ok(guard_identity_answer(answer, context));
		}

		Ok(answer)
	}

	pub async fn shape_casual(&self, message: &str) -> Result<String> {
		let answer = self.complete(CASUAL_SYSTEM_PROMPT, message, CASUAL_TEMPERATURE).await?;
		let answer = answer.trim();

		if answer.is_empty() {
			return Ok("Hi! I can save a memory or help you recall one.".to_string());
		}

		Ok(answer.to_string())
	}
}

/// Rejects identity answers that characterize the user through another entity's name.
pub fn guard_identity_answer(answer: String, context: &MemoryContext) -> String {
	let folded = fold_text(&answer);
	let compares_to_other = context.entities.iter().any(|entity| {
		COMPARATIVE_FRAMES
			.iter()
			.any(|frame| contains_phrase(&folded, &format!("{frame} {}", entity.name)))
	});

	if !compares_to_other {
		return answer;
	}

	tracing::warn!("Identity answer compared the user to another entity; using the stored record.");

	literal_identity_answer(context)
}

/// The identity record restated without any model involvement.
pub fn literal_identity_answer(context: &MemoryContext) -> String {
	match &context.identity {
		Some(identity) => format!("Here's what I have stored about you: {}", identity.summary),
		None => IDENTITY_NOT_STORED_ANSWER.to_string(),
	}
}
