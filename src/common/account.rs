use std::collections::HashMap;

use crate::common::{Word, hash::keccak256};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: Word,
    pub nonce: u64,
    pub code: Vec<u8>,
    pub storage: HashMap<Word, Word>,
}

impl Account {
    pub fn code_hash(&self) -> Word {
        Word::from_bytes(&keccak256(&self.code))
    }
}
