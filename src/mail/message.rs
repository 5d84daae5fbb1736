//! Email message and attachment types.

use std::fmt;
use uuid::Uuid;

/// A file attached to an outbound message.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name presented to the recipient.
    pub filename: String,
    /// Raw file bytes.
    pub content: Vec<u8>,
    /// MIME type (e.g., "application/pdf").
    pub content_type: String,
}

impl Attachment {
    pub fn new(
        filename: impl Into<String>,
        content: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            content_type: content_type.into(),
        }
    }

    /// Reject attachments no vendor would accept: an empty file name, or a
    /// content type that is not `type/subtype[; name=value]*`.
    pub fn validate(&self) -> Result<(), String> {
        if self.filename.trim().is_empty() {
            return Err("attachment file name is empty".to_string());
        }
        if !is_media_type(&self.content_type) {
            return Err(format!(
                "attachment '{}' has invalid content type '{}'",
                self.filename, self.content_type
            ));
        }
        Ok(())
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b))
}

fn is_media_type(value: &str) -> bool {
    let mut parts = value.split(';');
    let essence = parts.next().unwrap_or_default().trim();
    let Some((kind, subtype)) = essence.split_once('/') else {
        return false;
    };
    is_token(kind)
        && is_token(subtype)
        && parts.all(|param| {
            matches!(
                param.trim().split_once('='),
                Some((name, value)) if is_token(name.trim()) && !value.trim().is_empty()
            )
        })
}

// Attachment bytes can be megabytes; keep them out of debug output.
impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.content.len())
            .finish()
    }
}

/// A fully assembled outbound email.
///
/// Built once per logical send and reused unchanged for every attempt.
#[derive(Clone)]
pub struct EmailMessage {
    id: Uuid,
    to: String,
    from: String,
    subject: String,
    html: String,
    text: String,
    attachments: Vec<Attachment>,
}

impl EmailMessage {
    /// Assemble a message with a freshly generated id.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        html: impl Into<String>,
        text: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            to: to.into(),
            from: from.into(),
            subject: subject.into(),
            html: html.into(),
            text: text.into(),
            attachments,
        }
    }

    /// Correlation id for log lines belonging to this send.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attachments in the order the caller supplied them.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}

// Bodies never reach logs, not even through `{:?}`.
impl fmt::Debug for EmailMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailMessage")
            .field("id", &self.id)
            .field("to", &self.to)
            .field("from", &self.from)
            .field("subject", &self.subject)
            .field("attachments", &self.attachments)
            .finish_non_exhaustive()
    }
}
