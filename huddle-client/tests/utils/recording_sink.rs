use huddle_client::SignalSink;
use huddle_core::{Result, SignalMessage};
use std::sync::{Arc, Mutex};

/// Collects what a negotiator sends instead of putting it on a channel.
#[derive(Clone, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<SignalMessage>>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<SignalMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent().iter().map(|m| m.kind()).collect()
    }
}

impl SignalSink for RecordingSink {
    fn send(&self, msg: SignalMessage) -> Result<()> {
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }
}
