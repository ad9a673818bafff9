use mnem_config::Memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
	RejectEmpty,
	RejectTooLong,
	RejectTitleTooLong,
}

pub struct NoteInput<'a> {
	pub content: &'a str,
	pub title: Option<&'a str>,
}

impl RejectCode {
	pub fn reason_code(self) -> &'static str {
		match self {
			Self::RejectEmpty => "REJECT_EMPTY",
			Self::RejectTooLong => "REJECT_TOO_LONG",
			Self::RejectTitleTooLong => "REJECT_TITLE_TOO_LONG",
		}
	}

	pub fn field(self) -> &'static str {
		match self {
			Self::RejectEmpty | Self::RejectTooLong => "content",
			Self::RejectTitleTooLong => "title",
		}
	}
}

pub fn writegate(note: &NoteInput<'_>, cfg: &Memory) -> Result<(), RejectCode> {
	if note.content.trim().is_empty() {
		return Err(RejectCode::RejectEmpty);
	}
	if note.content.chars().count() as u32 > cfg.max_content_chars {
		return Err(RejectCode::RejectTooLong);
	}
	if let Some(title) = note.title
		&& title.chars().count() as u32 > cfg.max_title_chars
	{
		return Err(RejectCode::RejectTitleTooLong);
	}

	Ok(())
}

/// Blank titles are stored as absent.
pub fn normalize_title(title: Option<&str>) -> Option<String> {
	title.map(str::trim).filter(|title| !title.is_empty()).map(str::to_string)
}
