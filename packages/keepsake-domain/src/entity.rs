use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

pub const USER_SELF: &str = "USER_SELF";
pub const ENTITY_TYPE_SELF: &str = "self";
pub const ENTITY_TYPE_MENTION: &str = "mention";

const SELF_ALIASES: [&str; 9] =
	["me", "i", "myself", "user", "my self", "the user", "self", "user self", "user_self"];
const TRIM_CHARS: &[char] = &[
	'.', ',', ';', ':', '!', '?', '"', '\'', '`', '(', ')', '[', ']', '{', '}', '<', '>', '*',
	'\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}',
];

/// Canonical form of an extracted entity name, or `None` when nothing meaningful is left.
///
/// Self references collapse to [`USER_SELF`]. Other names are NFKC-normalized, stripped of
/// surrounding punctuation and a trailing possessive, and title-cased when the model emitted
/// them in a single case.
pub fn normalize_entity_name(raw: &str) -> Option<String> {
	let nfkc: String = raw.nfkc().collect();
	let collapsed = nfkc.split_whitespace().collect::<Vec<_>>().join(" ");
	let mut name = collapsed.trim_matches(TRIM_CHARS);

	for suffix in ["'s", "'S", "\u{2019}s", "\u{2019}S"] {
		if let Some(stripped) = name.strip_suffix(suffix) {
			name = stripped;

			break;
		}
	}

	let name = name.trim_matches(TRIM_CHARS).trim().to_string();

	if name.is_empty() {
		return None;
	}

	let lowered = name.to_lowercase();

	if SELF_ALIASES.contains(&lowered.as_str()) {
		return Some(USER_SELF.to_string());
	}

	let mut letters = name.chars().filter(|ch| ch.is_alphabetic());
	let single_case = letters.clone().all(char::is_lowercase) || letters.all(char::is_uppercase);

	if single_case { Some(title_case(&lowered)) } else { Some(name) }
}

/// Normalizes every name and drops repeats, keeping first-seen order.
pub fn normalize_entities<I, S>(names: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let mut out: Vec<String> = Vec::new();

	for name in names {
		let Some(normalized) = normalize_entity_name(name.as_ref()) else {
			continue;
		};

		if out.iter().any(|existing| existing.to_lowercase() == normalized.to_lowercase()) {
			continue;
		}

		out.push(normalized);
	}

	out
}

pub fn entity_type_for(name: &str) -> &'static str {
	if name == USER_SELF { ENTITY_TYPE_SELF } else { ENTITY_TYPE_MENTION }
}

/// Folds a new observation into a running entity summary.
///
/// Observations already present are not repeated. When the merged text exceeds `max_chars`,
/// whole sentences are dropped from the front; a single remaining sentence is cut at a char
/// boundary.
pub fn merge_summary(existing: &str, observation: &str, max_chars: usize) -> String {
	let observation = observation.split_whitespace().collect::<Vec<_>>().join(" ");
	let existing = existing.trim();

	if observation.is_empty() {
		return clamp_summary(existing, max_chars);
	}
	if existing.to_lowercase().contains(&observation.to_lowercase()) {
		return clamp_summary(existing, max_chars);
	}

	let merged =
		if existing.is_empty() { observation } else { format!("{existing} {observation}") };

	clamp_summary(&merged, max_chars)
}

fn clamp_summary(summary: &str, max_chars: usize) -> String {
	let mut sentences: Vec<&str> = summary
		.split_sentence_bounds()
		.map(str::trim)
		.filter(|sentence| !sentence.is_empty())
		.collect();

	while sentences.len() > 1 && joined_len(&sentences) > max_chars {
		sentences.remove(0);
	}

	let joined = sentences.join(" ");

	if joined.chars().count() <= max_chars {
		return joined;
	}

	joined.chars().take(max_chars).collect::<String>().trim_end().to_string()
}

fn joined_len(sentences: &[&str]) -> usize {
	sentences.iter().map(|sentence| sentence.chars().count()).sum::<usize>()
		+ sentences.len().saturating_sub(1)
}

fn title_case(lowered: &str) -> String {
	lowered
		.split(' ')
		.map(|word| {
			let mut chars = word.chars();

			match chars.next() {
				Some(first) => first.to_uppercase().chain(chars).collect(),
				None => String::new(),
			}
		})
		.collect::<Vec<_>>()
		.join(" ")
}
