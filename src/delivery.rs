//! Per-message delivery: one task per qualifying message, image uploads,
//! and local archiving of the originals.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::archive::AttachmentStore;
use crate::error::BridgeError;
use crate::graph::{FileBlob, MailGateway, TaskGateway};
use crate::message::{AttachmentRef, Message, EMPTY_SUBJECT};

/// Outcome of a single delivery attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Task created; counts how many image attachments uploaded cleanly.
    Delivered {
        task_id: String,
        images_uploaded: usize,
    },
    /// Message was not whitelisted; nothing was created.
    Unauthorized,
}

/// Drives task creation for messages the delta detector reports. Callers
/// filter unauthorized senders already; the pipeline re-checks anyway.
pub struct DeliveryPipeline<'a, M: MailGateway, T: TaskGateway> {
    mail: &'a M,
    tasks: &'a T,
    store: &'a AttachmentStore,
    list_id: &'a str,
}

impl<'a, M: MailGateway, T: TaskGateway> DeliveryPipeline<'a, M, T> {
    pub fn new(mail: &'a M, tasks: &'a T, store: &'a AttachmentStore, list_id: &'a str) -> Self {
        Self {
            mail,
            tasks,
            store,
            list_id,
        }
    }

    /// Create exactly one task for the message, upload its images, and
    /// archive its attachments locally. A failed image upload or archive
    /// write never rolls back the created task.
    pub async fn deliver(&self, message: &Message) -> Result<DeliveryOutcome, BridgeError> {
        if !message.is_whitelisted() {
            tracing::warn!(
                "Refusing delivery of message {} from unauthorized sender",
                message.message_id
            );
            return Ok(DeliveryOutcome::Unauthorized);
        }

        let title = task_title(message);
        let task_id = self
            .tasks
            .create_task(self.list_id, &title)
            .await
            .map_err(|e| {
                BridgeError::delivery(format!(
                    "create task for message {}: {e}",
                    message.message_id
                ))
            })?;
        tracing::info!(
            "Created task {} for message {}: {}",
            task_id,
            message.message_id,
            title
        );

        // Each attachment's content is downloaded once and reused for both
        // the task upload and the local archive.
        let files = self.fetch_attachments(message).await;

        let mut images_uploaded = 0;
        for (attachment, bytes) in &files {
            if !attachment.is_image() {
                continue;
            }
            match self.upload_image(&task_id, attachment, bytes).await {
                Ok(()) => images_uploaded += 1,
                Err(e) => {
                    tracing::error!(
                        "Failed to attach {} to task {}: {}",
                        attachment.name,
                        task_id,
                        e
                    );
                }
            }
        }

        if let Err(e) = self.archive(message, &files) {
            tracing::error!(
                "Failed to archive attachments of message {}: {}",
                message.message_id,
                e
            );
        }

        Ok(DeliveryOutcome::Delivered {
            task_id,
            images_uploaded,
        })
    }

    /// Download every attachment's content. Attachments whose bytes cannot
    /// be fetched are skipped, not fatal.
    async fn fetch_attachments<'m>(
        &self,
        message: &'m Message,
    ) -> Vec<(&'m AttachmentRef, Vec<u8>)> {
        let mut files = Vec::with_capacity(message.attachments.len());
        for attachment in &message.attachments {
            match self
                .mail
                .fetch_attachment(&message.message_id, &attachment.attachment_id)
                .await
            {
                Ok(bytes) => files.push((attachment, bytes)),
                Err(e) => {
                    tracing::warn!("Skipping attachment {}: {}", attachment.name, e);
                }
            }
        }
        files
    }

    async fn upload_image(
        &self,
        task_id: &str,
        attachment: &AttachmentRef,
        bytes: &[u8],
    ) -> Result<(), BridgeError> {
        let blob = FileBlob {
            name: attachment.name.clone(),
            content_type: attachment.content_type.clone(),
            content_bytes: BASE64_STANDARD.encode(bytes),
        };
        self.tasks.attach_file(self.list_id, task_id, &blob).await
    }

    /// Persist the fetched attachments locally.
    fn archive(
        &self,
        message: &Message,
        files: &[(&AttachmentRef, Vec<u8>)],
    ) -> Result<(), BridgeError> {
        let named: Vec<(&str, &[u8])> = files
            .iter()
            .map(|(attachment, bytes)| (attachment.name.as_str(), bytes.as_slice()))
            .collect();
        self.store
            .save(
                chrono::Local::now().date_naive(),
                &message.message_id,
                message.body_or_sentinel(),
                &named,
            )
            .map_err(|e| BridgeError::delivery(format!("archive write failed: {e}")))?;
        Ok(())
    }
}

/// Build the task title: SMS body plus sender, falling back to the subject
/// (or an "image" label for text-less attachment-bearing messages) when the
/// message carried no text attachment.
pub fn task_title(message: &Message) -> String {
    match &message.sms_body {
        Some(body) => format!("{}, {}", body, message.sender),
        None if message.subject != EMPTY_SUBJECT => {
            format!("{}, {}", message.subject, message.sender)
        }
        None if !message.attachments.is_empty() => format!("image, {}", message.sender),
        None => format!("No subject or attachments found. {}", message.sender),
    }
}
