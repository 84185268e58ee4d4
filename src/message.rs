//! Canonical message records and normalization of raw fetches.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};

use crate::contacts::{ContactDirectory, Sender};
use crate::graph::{RawAttachment, RawMessage};

/// Subject sentinel for messages the provider reports without one.
pub const EMPTY_SUBJECT: &str = "EMPTY SUBJECT";
/// Body sentinel used downstream when no text/plain attachment exists.
pub const NO_SMS_BODY: &str = "No SMS body found";
/// Body sentinel for a text/plain attachment with undecodable bytes.
pub const UNDECODABLE_BODY: &str = "[undecodable text attachment]";

/// Reference to one attachment of a message; content bytes are fetched
/// separately at delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub attachment_id: String,
    pub name: String,
    pub content_type: String,
}

impl AttachmentRef {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Canonical message produced by normalization. Never mutated afterwards;
/// retained only inside the rolling snapshot.
#[derive(Debug, Clone)]
pub struct Message {
    pub message_id: String,
    pub sender: Sender,
    pub subject: String,
    /// Trimmed content of the first text/plain attachment, if any.
    pub sms_body: Option<String>,
    pub received_at: DateTime<Utc>,
    /// All attachments in encounter order.
    pub attachments: Vec<AttachmentRef>,
}

impl Message {
    pub fn is_whitelisted(&self) -> bool {
        self.sender.is_known()
    }

    /// Image attachments in encounter order.
    pub fn image_attachments(&self) -> impl Iterator<Item = &AttachmentRef> {
        self.attachments.iter().filter(|a| a.is_image())
    }

    pub fn body_or_sentinel(&self) -> &str {
        self.sms_body.as_deref().unwrap_or(NO_SMS_BODY)
    }
}

/// Convert one raw fetch into a canonical record: resolve the sender,
/// default the subject, and extract the SMS body from the first text/plain
/// attachment.
pub fn normalize(raw: &RawMessage, contacts: &ContactDirectory) -> Message {
    let sender = contacts.resolve(&raw.from_address);

    let subject = raw
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(EMPTY_SUBJECT)
        .to_string();

    let mut sms_body = None;
    for attachment in &raw.attachments {
        if attachment.content_type == "text/plain" && sms_body.is_none() {
            sms_body = Some(decode_text_body(attachment));
        }
    }

    let attachments = raw
        .attachments
        .iter()
        .map(|a| AttachmentRef {
            attachment_id: a.id.clone(),
            name: a.name.clone(),
            content_type: a.content_type.clone(),
        })
        .collect();

    Message {
        message_id: raw.id.clone(),
        sender,
        subject,
        sms_body,
        received_at: raw.received_at,
        attachments,
    }
}

/// Decode a text/plain attachment body; malformed content degrades to a
/// sentinel instead of failing the message.
fn decode_text_body(attachment: &RawAttachment) -> String {
    let Some(encoded) = attachment.content_bytes.as_deref() else {
        return UNDECODABLE_BODY.to_string();
    };
    match BASE64_STANDARD.decode(encoded.trim()) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text.trim().to_string(),
            Err(_) => UNDECODABLE_BODY.to_string(),
        },
        Err(_) => UNDECODABLE_BODY.to_string(),
    }
}
