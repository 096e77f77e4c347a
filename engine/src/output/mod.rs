//! The outbound wire layer.
//!
//! The engine hands one batch of position updates per tick to a bounded queue; the output
//! worker coalesces them per track, enforces the sink's minimum inter-send interval and
//! encodes them for the wire (OSC over UDP).

mod osc;
mod worker;

pub use osc::*;
pub use worker::*;

use crate::EngineResult;
use animator_api::persistence::{Position, TrackId, WireFormat};
use rosc::OscMessage;
use std::sync::{Arc, Mutex};

/// One computed track position, ready for the wire.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PositionUpdate {
    pub track: TrackId,
    pub position: Position,
    pub format: WireFormat,
}

pub type WireBatch = Vec<PositionUpdate>;

/// Abstraction over the outbound wire channel.
pub trait WireSink: Send {
    fn send_batch(&mut self, messages: Vec<OscMessage>) -> EngineResult<()>;
}

/// Sink that keeps everything it was asked to send. For tests and dry runs.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<Vec<OscMessage>>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<OscMessage>> {
        crate::mutex_util::recovering_lock(&self.batches).clone()
    }

    pub fn messages(&self) -> Vec<OscMessage> {
        self.batches().into_iter().flatten().collect()
    }
}

impl WireSink for RecordingSink {
    fn send_batch(&mut self, messages: Vec<OscMessage>) -> EngineResult<()> {
        crate::mutex_util::recovering_lock(&self.batches).push(messages);
        Ok(())
    }
}
