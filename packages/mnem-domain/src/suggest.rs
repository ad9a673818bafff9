use std::collections::HashSet;

use mnem_config::Suggestions;

use crate::text;

pub struct SuggestionSource<'a> {
	pub title: Option<&'a str>,
	pub content: &'a str,
}

/// Derives candidate queries from notes ordered newest first.
///
/// Each note contributes its title, or its leading words followed by an ellipsis. Candidates are
/// capped at `max_chars`, deduplicated case-insensitively in first-seen order, and at most
/// `max_suggestions` are returned.
pub fn derive_suggestions<'a, I>(notes: I, cfg: &Suggestions) -> Vec<String>
where
	I: IntoIterator<Item = SuggestionSource<'a>>,
{
	let max = cfg.max_suggestions as usize;
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for note in notes {
		if out.len() >= max {
			break;
		}

		let Some(candidate) = candidate_for(&note, cfg) else {
			continue;
		};

		if seen.insert(candidate.to_lowercase()) {
			out.push(candidate);
		}
	}

	out
}

fn candidate_for(note: &SuggestionSource<'_>, cfg: &Suggestions) -> Option<String> {
	let max_chars = cfg.max_chars as usize;

	if let Some(title) = note.title.map(str::trim).filter(|title| !title.is_empty()) {
		return Some(text::shorten(title, max_chars));
	}

	let (head, _) = text::leading_words(note.content, cfg.fragment_words as usize);

	if head.is_empty() {
		return None;
	}

	let head = text::truncate_graphemes(&head, max_chars.saturating_sub(text::ELLIPSIS.len()));

	Some(format!("{}{}", head.trim_end(), text::ELLIPSIS))
}
