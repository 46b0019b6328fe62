use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fold_text;

const CASUAL_PHRASES: [&str; 40] = [
	"hi",
	"hello",
	"hey",
	"hiya",
	"yo",
	"sup",
	"ok",
	"okay",
	"k",
	"kk",
	"thanks",
	"thank you",
	"thx",
	"ty",
	"cool",
	"nice",
	"great",
	"awesome",
	"perfect",
	"sure",
	"yes",
	"yeah",
	"yep",
	"no",
	"nope",
	"bye",
	"goodbye",
	"good morning",
	"good afternoon",
	"good evening",
	"good night",
	"lol",
	"haha",
	"got it",
	"sounds good",
	"alright",
	"all right",
	"hmm",
	"cheers",
	"noted",
];
const CASUAL_WORDS: [&str; 36] = [
	"hi", "hello", "hey", "there", "ok", "okay", "k", "thanks", "thank", "you", "so", "much", "a",
	"lot", "cool", "nice", "great", "awesome", "perfect", "sure", "yes", "yeah", "yep", "bye",
	"good", "morning", "night", "lol", "haha", "got", "it", "alright", "cheers", "very", "noted",
	"again",
];
const MAX_CASUAL_WORDS: usize = 5;
const WH_WORDS: [&str; 9] =
	["who", "whom", "whose", "what", "when", "where", "why", "how", "which"];
const WH_CONTRACTIONS: [&str; 6] = ["whats", "wheres", "hows", "whos", "whens", "whys"];
const AUXILIARIES: [&str; 16] = [
	"am", "is", "are", "was", "were", "do", "does", "did", "can", "could", "should", "would",
	"will", "have", "has", "had",
];
const SUBJECTS: [&str; 12] =
	["i", "you", "he", "she", "it", "we", "they", "my", "your", "the", "this", "that"];
const QUESTION_PREFIXES: [&str; 2] = ["tell me", "remind me"];
const EPHEMERAL_PATTERNS: [&str; 1] = [
	r"^(?:im|i am|i feel|i am feeling|im feeling|feeling|i got|getting)\s+(?:so\s+|really\s+|very\s+|kinda\s+|kind of\s+|a bit\s+|a little\s+|pretty\s+|super\s+)?(?:hungry|thirsty|tired|sleepy|bored|cold|hot|sick|full|sweaty|late|cranky|grumpy|jetlagged)\b",
];

static EPHEMERAL: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	EPHEMERAL_PATTERNS.iter().filter_map(|pattern| Regex::new(pattern).ok()).collect()
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
	SaveMemory,
	QueryMemory,
	OutOfScope,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntentClassification {
	pub action: Intent,
	pub memory_summary: Option<String>,
	pub entities: Vec<String>,
	pub tags: Vec<String>,
}
impl IntentClassification {
	pub fn out_of_scope() -> Self {
		Self {
			action: Intent::OutOfScope,
			memory_summary: None,
			entities: Vec::new(),
			tags: Vec::new(),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
	#[error("Classifier output is malformed: {0}.")]
	Malformed(#[from] serde_json::Error),
	#[error("SAVE_MEMORY classification carried no summary.")]
	MissingSummary,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClassifierOutput {
	action: Intent,
	#[serde(default)]
	memory_summary: Option<String>,
	#[serde(default)]
	entities: Vec<String>,
	#[serde(default)]
	tags: Vec<String>,
}

/// Decodes raw classifier output against the fixed schema. Anything outside the schema is an
/// error; callers fail closed with [`IntentClassification::out_of_scope`].
pub fn decode(raw: &str) -> Result<IntentClassification, DecodeError> {
	let output: ClassifierOutput =
		serde_json::from_str(raw.trim())?;
	let memory_summary = output
		.memory_summary
		.map(|summary| summary.split_whitespace().collect::<Vec<_>>().join(" "))
		.filter(|summary| !summary.is_empty());

	if output.action == Intent::SaveMemory && memory_summary.is_none() {
		return Err(DecodeError::MissingSummary);
	}

	Ok(IntentClassification {
		action: output.action,
		memory_summary: if output.action == Intent::SaveMemory { memory_summary } else { None },
		entities: dedupe_trimmed(output.entities, false),
		tags: dedupe_trimmed(output.tags, true),
	})
}

/// Enforces the classification contract on top of whatever the model produced: casual messages
/// are never saved, questions are never saved, and short-lived states fail the durability filter.
pub fn apply_guards(message: &str, classification: IntentClassification) -> IntentClassification {
	if is_casual(message) {
		return IntentClassification::out_of_scope();
	}
	if classification.action != Intent::SaveMemory {
		return classification;
	}
	if is_question(message) {
		return IntentClassification {
			action: Intent::QueryMemory,
			memory_summary: None,
			entities: classification.entities,
			tags: classification.tags,
		};
	}
	if is_ephemeral(message) {
		return IntentClassification::out_of_scope();
	}

	classification
}

pub fn is_casual(message: &str) -> bool {
	let folded = fold_text(message);

	if folded.is_empty() {
		return true;
	}
	if CASUAL_PHRASES.contains(&folded.as_str()) {
		return true;
	}

	let words: Vec<&str> = folded.split(' ').collect();

	words.len() <= MAX_CASUAL_WORDS && words.iter().all(|word| CASUAL_WORDS.contains(word))
}

/// A trailing "?" always marks a question. Without one, the opening words must read as an
/// interrogative: a wh-word followed by an auxiliary ("where do I"), an auxiliary followed by a
/// subject ("did I", "is my"), or a request prefix. A wh-word opening a subordinate clause
/// ("when I was ten") and a name that doubles as an auxiliary ("Will is") stay statements.
pub fn is_question(message: &str) -> bool {
	if message.trim_end().ends_with('?') {
		return true;
	}

	let folded = fold_text(message);

	if QUESTION_PREFIXES.iter().any(|prefix| folded.starts_with(&format!("{prefix} "))) {
		return true;
	}

	let mut words = folded.split(' ');
	let (Some(first), Some(second)) = (words.next(), words.next()) else {
		return false;
	};

	if WH_CONTRACTIONS.contains(&first) {
		return true;
	}
	if WH_WORDS.contains(&first) {
		return AUXILIARIES.contains(&second);
	}

	AUXILIARIES.contains(&first) && SUBJECTS.contains(&second)
}

/// Bodily or momentary states expected to lapse within hours (hunger, fatigue).
pub fn is_ephemeral(message: &str) -> bool {
	let folded = fold_text(message);

	EPHEMERAL.iter().any(|re| re.is_match(&folded))
}

fn dedupe_trimmed(values: Vec<String>, lowercase: bool) -> Vec<String> {
	let mut out: Vec<String> = Vec::with_capacity(values.len());

	for value in values {
		let trimmed = value.split_whitespace().collect::<Vec<_>>().join(" ");
		let value = if lowercase { trimmed.to_lowercase() } else { trimmed };

		if value.is_empty() || out.iter().any(|existing| existing.eq_ignore_ascii_case(&value)) {
			continue;
		}

		out.push(value);
	}

	out
}
