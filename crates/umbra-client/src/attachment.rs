use serde::{Deserialize, Serialize};

/// Text extracted from an uploaded file
///
/// Extraction (PDF to text and so on) happens before the file reaches the
/// conversation; only the flattened text is kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name
    pub name: String,
    /// Flattened text content
    pub content: String,
    /// Original file size in bytes
    pub size: u64,
    /// Media type of the original file
    pub media_type: String,
}

impl Attachment {
    /// Plain-text attachment sized from its content
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: u64::try_from(content.len()).unwrap_or(u64::MAX),
            content,
            media_type: "text/plain".to_owned(),
        }
    }
}

/// Message body sent for a user turn: typed text then one block per file
pub fn compose_user_content(text: &str, attachments: &[Attachment]) -> String {
    attachments.iter().fold(text.to_owned(), |mut content, file| {
        content.push_str("\n\n[File: ");
        content.push_str(&file.name);
        content.push_str("]\n");
        content.push_str(&file.content);
        content
    })
}
