//! Shared fixtures and scripted gateways for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{TimeZone, Utc};

use crate::contacts::{ContactDirectory, Sender};
use crate::error::BridgeError;
use crate::graph::{
    FileBlob, MailGateway, RawAttachment, RawMessage, TaskGateway, TaskListInfo,
};
use crate::message::{AttachmentRef, Message};

pub fn directory() -> ContactDirectory {
    ContactDirectory::from_csv_str("phone_number,name\n5551234567,Alice\n5550001111,Bob\n")
        .expect("should parse test contacts")
}

pub fn raw_message(id: &str, from_address: &str) -> RawMessage {
    RawMessage {
        id: id.to_string(),
        from_address: from_address.to_string(),
        subject: Some("Fwd: SMS".to_string()),
        received_at: Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap(),
        attachments: Vec::new(),
    }
}

pub fn text_attachment(id: &str, body: &str) -> RawAttachment {
    RawAttachment {
        id: id.to_string(),
        name: "text_0.txt".to_string(),
        content_type: "text/plain".to_string(),
        content_bytes: Some(BASE64_STANDARD.encode(body)),
    }
}

pub fn image_attachment(id: &str, name: &str) -> RawAttachment {
    RawAttachment {
        id: id.to_string(),
        name: name.to_string(),
        content_type: "image/jpeg".to_string(),
        content_bytes: Some(BASE64_STANDARD.encode([0xff, 0xd8, 0xff])),
    }
}

pub fn known_message(id: &str) -> Message {
    Message {
        message_id: id.to_string(),
        sender: Sender::Known("Bob".to_string()),
        subject: crate::message::EMPTY_SUBJECT.to_string(),
        sms_body: None,
        received_at: Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap(),
        attachments: Vec::new(),
    }
}

pub fn unknown_message(id: &str) -> Message {
    Message {
        sender: Sender::Unknown,
        ..known_message(id)
    }
}

pub fn image_ref(id: &str, name: &str) -> AttachmentRef {
    AttachmentRef {
        attachment_id: id.to_string(),
        name: name.to_string(),
        content_type: "image/jpeg".to_string(),
    }
}

fn gateway_unavailable() -> BridgeError {
    BridgeError::GatewayStatus {
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        body: "scripted failure".to_string(),
    }
}

/// Mail gateway fed from a scripted queue of fetch results.
#[derive(Default)]
pub struct ScriptedMail {
    fetches: Mutex<VecDeque<Result<Vec<RawMessage>, BridgeError>>>,
    attachments: HashMap<String, Vec<u8>>,
    attachment_fetch_log: Mutex<Vec<String>>,
}

impl ScriptedMail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_fetch(&self, batch: Vec<RawMessage>) {
        self.fetches.lock().unwrap().push_back(Ok(batch));
    }

    pub fn push_fetch_error(&self) {
        self.fetches.lock().unwrap().push_back(Err(gateway_unavailable()));
    }

    pub fn insert_attachment(&mut self, attachment_id: &str, bytes: Vec<u8>) {
        self.attachments.insert(attachment_id.to_string(), bytes);
    }

    /// Attachment ids requested through `fetch_attachment`, in call order.
    pub fn attachment_fetch_log(&self) -> Vec<String> {
        self.attachment_fetch_log.lock().unwrap().clone()
    }
}

impl MailGateway for ScriptedMail {
    async fn fetch_recent(&self, _limit: u32) -> Result<Vec<RawMessage>, BridgeError> {
        self.fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_attachment(
        &self,
        _message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, BridgeError> {
        self.attachment_fetch_log
            .lock()
            .unwrap()
            .push(attachment_id.to_string());
        self.attachments
            .get(attachment_id)
            .cloned()
            .ok_or_else(|| BridgeError::decode(format!("no scripted bytes for {attachment_id}")))
    }
}

/// Task gateway that records calls and can be told to fail.
#[derive(Default)]
pub struct RecordingTasks {
    created: Mutex<Vec<(String, String)>>,
    attached: Mutex<Vec<String>>,
    fail_next_create: AtomicBool,
    fail_attach_names: Mutex<HashSet<String>>,
    next_task_id: AtomicUsize,
}

impl RecordingTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(list_id, title)` per created task, in call order.
    pub fn created(&self) -> Vec<(String, String)> {
        self.created.lock().unwrap().clone()
    }

    /// File names attached successfully, in call order.
    pub fn attached(&self) -> Vec<String> {
        self.attached.lock().unwrap().clone()
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_attach_named(&self, name: &str) {
        self.fail_attach_names.lock().unwrap().insert(name.to_string());
    }
}

impl TaskGateway for RecordingTasks {
    async fn create_task(&self, list_id: &str, title: &str) -> Result<String, BridgeError> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(gateway_unavailable());
        }
        let id = self.next_task_id.fetch_add(1, Ordering::SeqCst);
        self.created
            .lock()
            .unwrap()
            .push((list_id.to_string(), title.to_string()));
        Ok(format!("task-{id}"))
    }

    async fn attach_file(
        &self,
        _list_id: &str,
        _task_id: &str,
        file: &FileBlob,
    ) -> Result<(), BridgeError> {
        if self.fail_attach_names.lock().unwrap().contains(&file.name) {
            return Err(gateway_unavailable());
        }
        self.attached.lock().unwrap().push(file.name.clone());
        Ok(())
    }

    async fn list_task_lists(&self) -> Result<Vec<TaskListInfo>, BridgeError> {
        Ok(Vec::new())
    }
}
