use std::collections::HashMap;

use serde::Serialize;

use crate::common::{Hex, Word, account::Account, address::Address, hash::keccak256};

/// Block and transaction environment visible to executing code.
#[derive(Clone, Debug, Default)]
pub struct TxContext {
    pub gas_price: Word,
    pub origin: Address,
    pub coinbase: Address,
    pub number: u64,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub prev_randao: Word,
    pub chain_id: Word,
    pub base_fee: Word,
    pub blob_base_fee: Word,
    pub blob_hashes: Vec<Word>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Word>,
    pub data: Hex,
}

/// State and environment access required by the executor.
pub trait Host: Send {
    /// Snapshot of the account, zero-value when absent.
    fn get(&self, address: &Address) -> Account;

    fn exists(&self, address: &Address) -> bool;

    /// Drop an account created by a frame that was later rolled back.
    fn remove(&mut self, address: &Address);

    fn balance(&self, address: &Address) -> Word;

    fn set_balance(&mut self, address: &Address, value: Word);

    fn nonce(&self, address: &Address) -> u64;

    fn set_nonce(&mut self, address: &Address, nonce: u64);

    fn code(&self, address: &Address) -> Vec<u8>;

    fn code_size(&self, address: &Address) -> usize {
        self.code(address).len()
    }

    /// Zero for non-existent accounts, keccak of the code otherwise.
    fn code_hash(&self, address: &Address) -> Word {
        if !self.exists(address) {
            return Word::zero();
        }
        Word::from_bytes(&keccak256(&self.code(address)))
    }

    fn set_code(&mut self, address: &Address, code: Vec<u8>);

    fn get_storage(&self, address: &Address, key: &Word) -> Word;

    fn set_storage(&mut self, address: &Address, key: Word, value: Word);

    fn tx_context(&self) -> TxContext;

    fn block_hash(&self, number: u64) -> Word;

    fn emit_log(&mut self, log: Log);
}

/// In-memory host: accounts live in a map for the lifetime of the process.
#[derive(Clone, Debug, Default)]
pub struct MockedHost {
    pub accounts: HashMap<Address, Account>,
    pub tx_context: TxContext,
    pub block_hashes: HashMap<u64, Word>,
    pub logs: Vec<Log>,
}

impl MockedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tx_context(self, tx_context: TxContext) -> Self {
        Self { tx_context, ..self }
    }

    pub fn acc_mut(&mut self, address: &Address) -> &mut Account {
        self.accounts.entry(*address).or_default()
    }
}

impl Host for MockedHost {
    fn get(&self, address: &Address) -> Account {
        self.accounts.get(address).cloned().unwrap_or_default()
    }

    fn exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    fn remove(&mut self, address: &Address) {
        self.accounts.remove(address);
    }

    fn balance(&self, address: &Address) -> Word {
        self.accounts
            .get(address)
            .map(|acc| acc.balance)
            .unwrap_or_default()
    }

    fn set_balance(&mut self, address: &Address, value: Word) {
        self.acc_mut(address).balance = value;
    }

    fn nonce(&self, address: &Address) -> u64 {
        self.accounts
            .get(address)
            .map(|acc| acc.nonce)
            .unwrap_or_default()
    }

    fn set_nonce(&mut self, address: &Address, nonce: u64) {
        self.acc_mut(address).nonce = nonce;
    }

    fn code(&self, address: &Address) -> Vec<u8> {
        self.accounts
            .get(address)
            .map(|acc| acc.code.clone())
            .unwrap_or_default()
    }

    fn code_size(&self, address: &Address) -> usize {
        self.accounts
            .get(address)
            .map(|acc| acc.code.len())
            .unwrap_or_default()
    }

    fn code_hash(&self, address: &Address) -> Word {
        self.accounts
            .get(address)
            .map(|acc| acc.code_hash())
            .unwrap_or_default()
    }

    fn set_code(&mut self, address: &Address, code: Vec<u8>) {
        self.acc_mut(address).code = code;
    }

    fn get_storage(&self, address: &Address, key: &Word) -> Word {
        self.accounts
            .get(address)
            .and_then(|acc| acc.storage.get(key))
            .copied()
            .unwrap_or_default()
    }

    fn set_storage(&mut self, address: &Address, key: Word, value: Word) {
        let storage = &mut self.acc_mut(address).storage;
        if value.is_zero() {
            storage.remove(&key);
        } else {
            storage.insert(key, value);
        }
    }

    fn tx_context(&self) -> TxContext {
        self.tx_context.clone()
    }

    fn block_hash(&self, number: u64) -> Word {
        self.block_hashes.get(&number).copied().unwrap_or_default()
    }

    fn emit_log(&mut self, log: Log) {
        tracing::debug!(address = %log.address, topics = log.topics.len(), "LOG");
        self.logs.push(log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::address::addr;

    #[test]
    fn test_absent_account_is_zero() {
        let host = MockedHost::new();
        let address = addr("0x1000000000000000000000000000000000000001");
        assert_eq!(host.get(&address), Account::default());
        assert_eq!(host.balance(&address), Word::zero());
        assert_eq!(host.get_storage(&address, &Word::one()), Word::zero());
        assert_eq!(host.code_hash(&address), Word::zero());
        assert!(!host.exists(&address));
    }

    #[test]
    fn test_storage() {
        let mut host = MockedHost::new();
        let address = addr("0x1000000000000000000000000000000000000001");
        host.set_storage(&address, Word::one(), Word::from(42u64));
        assert_eq!(host.get_storage(&address, &Word::one()), Word::from(42u64));
        host.set_storage(&address, Word::one(), Word::zero());
        assert_eq!(host.get_storage(&address, &Word::one()), Word::zero());
        assert!(host.get(&address).storage.is_empty());
    }

    #[test]
    fn test_code() {
        let mut host = MockedHost::new();
        let address = addr("0x1000000000000000000000000000000000000001");
        host.set_code(&address, vec![0x60, 0x00]);
        assert_eq!(host.code(&address), vec![0x60, 0x00]);
        assert_eq!(host.code_size(&address), 2);
        assert_eq!(
            host.code_hash(&address),
            Word::from_bytes(&keccak256(&[0x60, 0x00]))
        );
    }
}
