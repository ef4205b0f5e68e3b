use crate::common::{Word, address::Address};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Create,
    Call,
}

/// A single execution request handed to the executor.
#[derive(Clone, Debug)]
pub struct Message<'a> {
    pub kind: MessageKind,
    pub sender: Address,
    /// Absent for [`MessageKind::Create`].
    pub recipient: Option<Address>,
    pub value: Word,
    pub gas: i64,
    pub depth: usize,
    pub input: &'a [u8],
}

impl<'a> Message<'a> {
    pub fn create(sender: Address, init_code: &'a [u8], gas: i64) -> Self {
        Self {
            kind: MessageKind::Create,
            sender,
            recipient: None,
            value: Word::zero(),
            gas,
            depth: 0,
            input: init_code,
        }
    }

    pub fn call(sender: Address, recipient: Address, input: &'a [u8], gas: i64) -> Self {
        Self {
            kind: MessageKind::Call,
            sender,
            recipient: Some(recipient),
            value: Word::zero(),
            gas,
            depth: 0,
            input,
        }
    }

    pub fn with_value(self, value: Word) -> Self {
        Self { value, ..self }
    }
}

/// Frame-level view of a call: who runs, in whose storage, with what data.
#[derive(Clone, Debug)]
pub struct Call {
    pub data: Vec<u8>,
    pub value: Word,
    pub from: Address,
    pub to: Address,
    pub gas: i64,
}
