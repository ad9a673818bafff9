use mnem_config::{Hybrid, Memory, Suggestions};
use mnem_domain::writegate::{self, NoteInput, RejectCode};

fn memory() -> Memory {
	Memory {
		max_content_chars: 20,
		max_title_chars: 5,
		default_top_k: 10,
		max_top_k: 50,
		max_batch_queries: 10,
		score_threshold: None,
		suggestions: Suggestions::default(),
		hybrid: Hybrid::default(),
	}
}

#[test]
fn rejects_blank_content() {
	let note = NoteInput { content: " \n\t ", title: None };

	assert_eq!(writegate::writegate(&note, &memory()), Err(RejectCode::RejectEmpty));
	assert_eq!(RejectCode::RejectEmpty.reason_code(), "REJECT_EMPTY");
}

#[test]
fn content_limit_counts_characters_not_bytes() {
	let fits = "é".repeat(20);
	let over = "é".repeat(21);

	assert!(writegate::writegate(&NoteInput { content: &fits, title: None }, &memory()).is_ok());
	assert_eq!(
		writegate::writegate(&NoteInput { content: &over, title: None }, &memory()),
		Err(RejectCode::RejectTooLong)
	);
}

#[test]
fn rejects_overlong_title() {
	let note = NoteInput { content: "body", title: Some("too long") };
	let err = writegate::writegate(&note, &memory()).expect_err("Expected title rejection.");

	assert_eq!(err, RejectCode::RejectTitleTooLong);
	assert_eq!(err.field(), "title");
}

#[test]
fn blank_titles_normalize_to_none() {
	assert_eq!(writegate::normalize_title(Some("   ")), None);
	assert_eq!(writegate::normalize_title(Some(" Plan ")), Some("Plan".to_string()));
	assert_eq!(writegate::normalize_title(None), None);
}
