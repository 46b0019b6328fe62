pub mod entity;
pub mod intent;
pub mod media;
pub mod query;

/// Lowercases, folds punctuation to spaces, and collapses whitespace. Apostrophes are dropped so
/// "what's" and "whats" compare equal.
pub fn fold_text(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	let mut pending_space = false;

	for ch in text.chars().flat_map(char::to_lowercase) {
		if ch == '\'' || ch == '\u{2019}' {
			continue;
		}
		if ch.is_alphanumeric() {
			if pending_space && !out.is_empty() {
				out.push(' ');
			}

			pending_space = false;

			out.push(ch);
		} else {
			pending_space = true;
		}
	}

	out
}

/// Word-boundary phrase match on folded text.
pub fn contains_phrase(folded_text: &str, phrase: &str) -> bool {
	let phrase = fold_text(phrase);

	if phrase.is_empty() {
		return false;
	}

	format!(" {folded_text} ").contains(&format!(" {phrase} "))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn folds_punctuation_and_case() {
		assert_eq!(fold_text("  What's   MY name?! "), "whats my name");
		assert_eq!(fold_text("hi..."), "hi");
		assert_eq!(fold_text(""), "");
	}

	#[test]
	fn phrase_match_respects_word_bounds() {
		assert!(contains_phrase("what is my name", "my name"));
		assert!(!contains_phrase("what is my namesake", "my name"));
		assert!(!contains_phrase("anything", ""));
	}
}
