use keepsake_config::Identity;

use crate::{contains_phrase, fold_text};

const TAG_PHRASES: [&str; 7] = [
	"list tags",
	"list my tags",
	"show tags",
	"show my tags",
	"what tags",
	"which tags",
	"all my tags",
];
const LAST_MEMORY_PHRASES: [&str; 4] =
	["last memory", "latest memory", "most recent memory", "newest memory"];
const RECENT_PHRASES: [&str; 7] = [
	"summarize",
	"summarise",
	"recent memories",
	"list memories",
	"list my memories",
	"show my memories",
	"what have i saved",
];

/// Keyword-triggered requests answered from structured queries without any model call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetaQuery {
	Tags,
	Recent { limit: u32 },
}

pub fn detect_meta(query: &str, recent_limit: u32) -> Option<MetaQuery> {
	let folded = fold_text(query);

	if TAG_PHRASES.iter().any(|phrase| contains_phrase(&folded, phrase)) {
		return Some(MetaQuery::Tags);
	}
	if LAST_MEMORY_PHRASES.iter().any(|phrase| contains_phrase(&folded, phrase)) {
		return Some(MetaQuery::Recent { limit: 1 });
	}
	if RECENT_PHRASES.iter().any(|phrase| contains_phrase(&folded, phrase)) {
		return Some(MetaQuery::Recent { limit: recent_limit });
	}

	None
}

pub fn is_identity_query(query: &str, identity: &Identity) -> bool {
	let folded = fold_text(query);

	identity.keywords.iter().any(|keyword| contains_phrase(&folded, keyword))
		|| asks_for_name(query, identity)
}

pub fn asks_for_name(query: &str, identity: &Identity) -> bool {
	let folded = fold_text(query);

	identity.name_keywords.iter().any(|keyword| contains_phrase(&folded, keyword))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn detects_tag_listing() {
		assert_eq!(detect_meta("List tags", 5), Some(MetaQuery::Tags));
		assert_eq!(detect_meta("what tags do I have?", 5), Some(MetaQuery::Tags));
	}

	#[test]
	fn detects_recent_requests() {
		assert_eq!(detect_meta("show me my last memory", 5), Some(MetaQuery::Recent { limit: 1 }));
		assert_eq!(detect_meta("Summarize my memories", 7), Some(MetaQuery::Recent { limit: 7 }));
		assert_eq!(detect_meta("where do I live", 5), None);
	}

	#[test]
	fn identity_detection_uses_configured_phrases() {
		let identity = Identity::default();

		assert!(is_identity_query("What is my occupation?", &identity));
		assert!(is_identity_query("who am I", &identity));
		assert!(asks_for_name("What's my name?", &identity));
		assert!(!asks_for_name("what is my occupation", &identity));
		assert!(!is_identity_query("where did Alex move", &identity));
	}
}
