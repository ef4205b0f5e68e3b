use serde::Serialize;

use crate::{
    common::{Hex, Word, address::Address},
    executor::Status,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    #[default]
    Call,
    Callcode,
    Static,
    Delegate,
    Create,
    Create2,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StateEvent {
    Get {
        address: Address,
        key: Word,
        val: Word,
    },
    Put {
        address: Address,
        key: Word,
        val: Word,
        new: Word,
    },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventData {
    Call {
        call_type: CallType,
        from: Address,
        to: Address,
        value: Word,
        gas: i64,
        data: Hex,
    },
    OpCode {
        pc: usize,
        op: u8,
        name: String,
        gas: i64,
        stack: usize,
    },
    State(StateEvent),
    Deploy {
        address: Address,
        size: usize,
    },
    Return {
        status: Status,
        data: Hex,
        gas_used: i64,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Event {
    #[serde(flatten)]
    pub data: EventData,
    pub depth: usize,
    pub reverted: bool,
}

#[allow(unused_variables)] // default impl ignores all arguments
pub trait EventTracer: Default + Send {
    /// Events are only built when this returns true.
    fn enabled(&self) -> bool {
        false
    }
    fn push(&mut self, event: Event) {}
    fn take(&mut self) -> Vec<Event> {
        vec![]
    }
    fn fork(&self) -> Self {
        Self::default()
    }
    fn join(&mut self, mut other: Self, reverted: bool) {
        for mut event in other.take() {
            event.reverted |= reverted;
            self.push(event);
        }
    }
}

#[derive(Debug, Default)]
pub struct NoopTracer;

impl EventTracer for NoopTracer {}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct LoggingTracer(Vec<Event>);

impl EventTracer for LoggingTracer {
    fn enabled(&self) -> bool {
        true
    }

    fn push(&mut self, event: Event) {
        self.0.push(event);
    }

    fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.0)
    }
}
