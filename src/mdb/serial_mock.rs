//! Mock bus adapter for testing
//!
//! This module provides a scripted [`Transport`] that can be used to test the
//! coin changer handshake and poll loop without an adapter or changer attached.
//! Responses are queued per command; every command sent is recorded.

use crate::constants::*;
use crate::error::TransportError;
use crate::mdb::transport::{classify_response, Transport};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

type Reply = Result<String, TransportError>;

/// Mock adapter that answers commands from per-command scripts.
///
/// Clones share state, so a test can keep one clone to inspect traffic while
/// the controller owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    /// Commands sent, in order
    pub sent: Arc<Mutex<Vec<String>>>,
    /// One-shot replies, consumed front to back
    queued: Arc<Mutex<HashMap<String, VecDeque<Reply>>>>,
    /// Replies used once the queue for a command is empty
    defaults: Arc<Mutex<HashMap<String, Reply>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw response line for the next `command`.
    ///
    /// The line passes through the same classification as a serial response,
    /// so `"r,NACK"` becomes [`TransportError::Rejected`] and `""` becomes
    /// [`TransportError::NoResponse`].
    pub fn queue(&self, command: &str, response: &str) -> &Self {
        self.push(command, classify_response(response))
    }

    /// Queue a transport failure for the next `command`.
    pub fn queue_error(&self, command: &str, error: TransportError) -> &Self {
        self.push(command, Err(error))
    }

    /// Answer `command` with `response` whenever nothing is queued for it.
    pub fn set_default(&self, command: &str, response: &str) -> &Self {
        self.lock_defaults()
            .insert(command.to_string(), classify_response(response));
        self
    }

    /// Script a changer that passes every initialization step.
    ///
    /// `setup_payload` is the hex payload of the SETUP response (without the
    /// `r,` tag). Polls answer `r,ACK` by default once the handshake is done.
    pub fn script_startup(&self, setup_payload: &str) -> &Self {
        self.queue(CMD_VERSION, "v,MDB-USB 3.0.1")
            .queue(CMD_MASTER_MODE, "m,ACK")
            .queue(CMD_RESET, "r,ACK")
            .queue(CMD_POLL, "r,0B")
            .queue(CMD_SETUP, &format!("r,{setup_payload}"))
            .queue(CMD_IDENTIFY, &format!("r,{}", identify_fixture()))
            .queue(CMD_DIAGNOSE, "r,0300")
            .queue(CMD_TUBE_STATUS, &format!("r,0008{}", "05".repeat(16)))
            .queue(&format!("{CMD_COIN_TYPE_PREFIX},FFFFFFFF"), "r,ACK")
            .set_default(CMD_POLL, "r,ACK")
    }

    /// Commands sent so far.
    pub fn sent_commands(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// How many times `command` was sent.
    pub fn count_sent(&self, command: &str) -> usize {
        self.sent_commands().iter().filter(|c| *c == command).count()
    }

    /// Clear recorded traffic and all scripts.
    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
        if let Ok(mut queued) = self.queued.lock() {
            queued.clear();
        }
        self.lock_defaults().clear();
    }

    fn push(&self, command: &str, reply: Reply) -> &Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.entry(command.to_string()).or_default().push_back(reply);
        }
        self
    }

    fn lock_defaults(&self) -> std::sync::MutexGuard<'_, HashMap<String, Reply>> {
        self.defaults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_reply(&self, command: &str) -> Reply {
        let queued = self
            .queued
            .lock()
            .ok()
            .and_then(|mut q| q.get_mut(command).and_then(VecDeque::pop_front));

        match queued {
            Some(reply) => reply,
            None => self
                .lock_defaults()
                .get(command)
                .cloned()
                .unwrap_or(Err(TransportError::NoResponse)),
        }
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, command: &str) -> Result<String, TransportError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(command.to_string());
        }
        self.next_reply(command)
    }
}

/// IDENTIFICATION payload of a fictional changer: manufacturer "ABC",
/// serial "000000001234", model "CHANGER-1   ", software 0x0102, features 0x00000003.
pub fn identify_fixture() -> String {
    let mut payload = hex::encode_upper("ABC");
    payload.push_str(&hex::encode_upper("000000001234"));
    payload.push_str(&hex::encode_upper("CHANGER-1   "));
    payload.push_str("0102");
    payload.push_str("00000003");
    payload
}
