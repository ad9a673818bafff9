use std::collections::HashSet;

use unicode_segmentation::UnicodeSegmentation;

pub const ELLIPSIS: &str = "...";

/// Input sent to the embedding provider. Writes and queries both go through here so that long
/// near-duplicate texts are cut at the same place.
pub fn embedding_input(text: &str, max_graphemes: usize) -> &str {
	truncate_graphemes(text.trim(), max_graphemes)
}

pub fn truncate_graphemes(text: &str, max_graphemes: usize) -> &str {
	match text.grapheme_indices(true).nth(max_graphemes) {
		Some((offset, _)) => &text[..offset],
		None => text,
	}
}

pub fn grapheme_len(text: &str) -> usize {
	text.graphemes(true).count()
}

/// Cuts `text` so the result, including a trailing ellipsis when cut, fits in `max_graphemes`.
pub fn shorten(text: &str, max_graphemes: usize) -> String {
	if grapheme_len(text) <= max_graphemes {
		return text.to_string();
	}

	let keep = max_graphemes.saturating_sub(ELLIPSIS.len());
	let head = truncate_graphemes(text, keep).trim_end();

	format!("{head}{ELLIPSIS}")
}

pub fn leading_words(text: &str, count: usize) -> (String, bool) {
	let mut words = text.split_whitespace();
	let head = words.by_ref().take(count).collect::<Vec<_>>().join(" ");
	let more = words.next().is_some();

	(head, more)
}

/// Lowercased alphanumeric terms of two or more characters, deduplicated, in first-seen order.
pub fn terms(text: &str, max_terms: usize) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for token in text.split(|c: char| !c.is_alphanumeric()).map(str::to_lowercase) {
		if out.len() >= max_terms {
			break;
		}
		if token.chars().count() < 2 {
			continue;
		}
		if seen.insert(token.clone()) {
			out.push(token);
		}
	}

	out
}

/// Share of `query_terms` that occur in `text`, from 0 to 1.
pub fn lexical_overlap(query_terms: &[String], text: &str) -> f32 {
	if query_terms.is_empty() {
		return 0.0;
	}

	let text_terms = terms(text, usize::MAX).into_iter().collect::<HashSet<_>>();
	let matched = query_terms.iter().filter(|term| text_terms.contains(*term)).count();

	matched as f32 / query_terms.len() as f32
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn embedding_input_trims_and_truncates_deterministically() {
		let text = "  héllo wörld  ";

		assert_eq!(embedding_input(text, 100), "héllo wörld");
		assert_eq!(embedding_input(text, 5), "héllo");
		assert_eq!(embedding_input(text, 5), embedding_input(text, 5));
	}

	#[test]
	fn truncation_never_splits_a_grapheme() {
		let text = "e\u{301}e\u{301}e\u{301}";

		assert_eq!(truncate_graphemes(text, 2), "e\u{301}e\u{301}");
	}

	#[test]
	fn shorten_keeps_short_text_and_marks_cuts() {
		assert_eq!(shorten("short", 10), "short");
		assert_eq!(shorten("a much longer sentence", 10), "a much...");
		assert!(grapheme_len(&shorten("a much longer sentence", 10)) <= 10);
	}

	#[test]
	fn leading_words_reports_remaining_words() {
		assert_eq!(leading_words("one two three", 5), ("one two three".to_string(), false));
		assert_eq!(leading_words("one  two three", 2), ("one two".to_string(), true));
	}

	#[test]
	fn terms_are_lowercased_deduplicated_and_capped() {
		assert_eq!(terms("Buy MILK, buy eggs! a", 10), vec!["buy", "milk", "eggs"]);
		assert_eq!(terms("one two three", 2), vec!["one", "two"]);
		assert!(terms("a b c", 5).is_empty());
	}

	#[test]
	fn lexical_overlap_counts_matched_query_terms() {
		let query = terms("milk delivery", 8);

		assert_eq!(lexical_overlap(&query, "Buy milk tomorrow"), 0.5);
		assert_eq!(lexical_overlap(&query, "Milk delivery on Monday"), 1.0);
		assert_eq!(lexical_overlap(&query, "Rocket launch"), 0.0);
		assert_eq!(lexical_overlap(&[], "anything"), 0.0);
	}
}
