use std::cell::RefCell;

use consent_core::{MessageSink, OutboundMessage};

/// Sink keeping every outbound message, for offline runs and assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: RefCell<Vec<OutboundMessage>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.messages.borrow().iter().map(|m| m.kind()).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.kind() == kind)
            .count()
    }

    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.messages.borrow_mut())
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, message: OutboundMessage) {
        self.messages.borrow_mut().push(message);
    }
}
