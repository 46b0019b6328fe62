pub use tokenizers::Tokenizer;
use unicode_segmentation::UnicodeSegmentation;

pub type TokenizerError = tokenizers::Error;

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub max_units: u32,
	pub overlap_units: u32,
}

/// A slice of the source text. `text` is always `source[start_offset..end_offset]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
	pub chunk_index: i32,
	pub start_offset: usize,
	pub end_offset: usize,
	pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimedWord {
	pub text: String,
	pub start_ms: i64,
	pub end_ms: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimedChunk {
	pub chunk_index: i32,
	pub text: String,
	pub start_seconds: f64,
	pub end_seconds: f64,
}

/// How chunk sizes are counted.
#[derive(Clone, Copy)]
pub enum Measure<'a> {
	Chars,
	Tokens(&'a Tokenizer),
}
impl Measure<'_> {
	pub fn units(&self, text: &str) -> usize {
		match self {
			Self::Chars => text.chars().count(),
			Self::Tokens(tokenizer) => match tokenizer.encode(text, false) {
				Ok(encoding) => encoding.len(),
				Err(err) => {
					tracing::error!(error = %err, "Tokenizer failed to encode chunk candidate.");

					text.chars().count()
				},
			},
		}
	}
}

pub fn load_tokenizer(repo: &str) -> Result<Tokenizer, TokenizerError> {
	Tokenizer::from_pretrained(repo, None)
}

/// Packs sentences greedily into chunks of at most `max_units`, carrying whole trailing sentences
/// of up to `overlap_units` into the next chunk.
pub fn split_text(text: &str, cfg: &ChunkingConfig, measure: Measure<'_>) -> Vec<Chunk> {
	let max = cfg.max_units.max(1) as usize;
	let overlap = cfg.overlap_units as usize;
	let pieces = pieces(text, max, measure);
	let mut chunks = Vec::new();
	let mut members: Vec<usize> = Vec::new();
	let mut start = 0_usize;
	let mut end = 0_usize;

	for (piece_start, piece_end) in pieces {
		if !members.is_empty() && measure.units(&text[start..piece_end]) > max {
			push_chunk(&mut chunks, text, start, end);

			let next_start = members
				.iter()
				.copied()
				.filter(|member| *member > start)
				.find(|member| {
					measure.units(&text[*member..end]) <= overlap
						&& measure.units(&text[*member..piece_end]) <= max
				})
				.unwrap_or(piece_start);

			members.retain(|member| *member >= next_start);

			start = next_start;
		}
		if members.is_empty() {
			start = piece_start;
		}

		members.push(piece_start);

		end = piece_end;
	}

	if !members.is_empty() {
		push_chunk(&mut chunks, text, start, end);
	}

	chunks
}

/// Stitches chunks back into the source text using their offsets, skipping overlap.
pub fn reassemble(chunks: &[Chunk]) -> String {
	let mut out = String::new();
	let mut covered = 0_usize;

	for chunk in chunks {
		if chunk.end_offset <= covered {
			continue;
		}

		let skip = covered.saturating_sub(chunk.start_offset);

		out.push_str(chunk.text.get(skip..).unwrap_or_default());

		covered = chunk.end_offset;
	}

	out
}

/// Groups timestamped transcript words into fixed-size chunks with second-resolution bounds.
pub fn split_words(words: &[TimedWord], words_per_chunk: usize) -> Vec<TimedChunk> {
	let size = words_per_chunk.max(1);
	let mut chunks = Vec::new();

	for group in words.chunks(size) {
		let (Some(first), Some(last)) = (group.first(), group.last()) else {
			continue;
		};
		let text = group
			.iter()
			.map(|word| word.text.trim())
			.filter(|word| !word.is_empty())
			.collect::<Vec<_>>()
			.join(" ");

		if text.is_empty() {
			continue;
		}

		chunks.push(TimedChunk {
			chunk_index: chunks.len() as i32,
			text,
			start_seconds: first.start_ms as f64 / 1_000.0,
			end_seconds: last.end_ms as f64 / 1_000.0,
		});
	}

	chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: &str, start: usize, end: usize) {
	let slice = &text[start..end];

	if slice.trim().is_empty() {
		return;
	}

	chunks.push(Chunk {
		chunk_index: chunks.len() as i32,
		start_offset: start,
		end_offset: end,
		text: slice.to_string(),
	});
}

// Contiguous byte ranges covering `text`, each within `max` units where possible.
fn pieces(text: &str, max: usize, measure: Measure<'_>) -> Vec<(usize, usize)> {
	let mut out = Vec::new();

	for (idx, sentence) in text.split_sentence_bound_indices() {
		let end = idx + sentence.len();

		if measure.units(sentence) <= max {
			out.push((idx, end));
		} else {
			split_oversize(text, idx, end, max, measure, &mut out);
		}
	}

	out
}

fn split_oversize(
	text: &str,
	start: usize,
	end: usize,
	max: usize,
	measure: Measure<'_>,
	out: &mut Vec<(usize, usize)>,
) {
	let mut segment_start = start;

	for (offset, word) in text[start..end].split_word_bound_indices() {
		let word_start = start + offset;
		let word_end = word_start + word.len();

		if segment_start < word_start && measure.units(&text[segment_start..word_end]) > max {
			out.push((segment_start, word_start));

			segment_start = word_start;
		}
		if measure.units(&text[segment_start..word_end]) > max {
			let mut window_start = segment_start;

			for (char_offset, ch) in text[segment_start..word_end].char_indices() {
				let char_start = segment_start + char_offset;
				let char_end = char_start + ch.len_utf8();

				if window_start < char_start && measure.units(&text[window_start..char_end]) > max
				{
					out.push((window_start, char_start));

					window_start = char_start;
				}
			}

			out.push((window_start, word_end));

			segment_start = word_end;
		}
	}

	if segment_start < end {
		out.push((segment_start, end));
	}
}
