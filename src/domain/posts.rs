//! Text-derived labels for posts and comments.

use crate::domain::entities::{CommentRecord, PostRecord};

/// Characters of post text used as the detail page title.
pub const TITLE_TEXT_CHARS: usize = 30;
/// Characters of post text used as its short label.
pub const POST_LABEL_CHARS: usize = 15;
/// Characters of comment text used as its short label.
pub const COMMENT_LABEL_CHARS: usize = 30;

/// Leading `max_chars` characters of `text`, cut on a char boundary.
pub fn leading_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

impl PostRecord {
    pub fn title_text(&self) -> &str {
        leading_chars(&self.text, TITLE_TEXT_CHARS)
    }

    pub fn label(&self) -> &str {
        leading_chars(&self.text, POST_LABEL_CHARS)
    }

    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.author.id == user_id
    }
}

impl CommentRecord {
    pub fn label(&self) -> &str {
        leading_chars(&self.text, COMMENT_LABEL_CHARS)
    }
}
