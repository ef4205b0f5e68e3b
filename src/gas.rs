use crate::{common::Word, revision::Revision};

pub const CALL_STIPEND: i64 = 2300;
pub const CALL_VALUE: u64 = 9000;
pub const NEW_ACCOUNT: u64 = 25000;
pub const CREATE: u64 = 32000;
pub const CODE_DEPOSIT_PER_BYTE: u64 = 200;
pub const KECCAK_WORD: u64 = 6;
pub const COPY_WORD: u64 = 3;
pub const LOG_TOPIC: u64 = 375;
pub const LOG_DATA_BYTE: u64 = 8;
pub const EXP_BYTE: u64 = 50;

/// Per-revision gas costs and limits that differ between hard forks.
#[derive(Debug)]
pub struct Schedule {
    /// EIP-2929 warm/cold access pricing.
    pub access_lists: bool,
    /// SLOAD and account access costs before EIP-2929.
    pub sload: u64,
    pub account_access: u64,
    pub warm_read: u64,
    pub cold_sload: u64,
    pub cold_account: u64,
    pub sstore_set: u64,
    pub sstore_reset: u64,
    pub sstore_clears_refund: i64,
    pub selfdestruct: u64,
    pub refund_quotient: i64,
    pub max_code_size: usize,
    pub max_initcode_size: Option<usize>,
    pub initcode_word: u64,
    /// EIP-3541: deployed code must not start with 0xEF.
    pub reject_ef_code: bool,
    pub warm_coinbase: bool,
}

const ISTANBUL: Schedule = Schedule {
    access_lists: false,
    sload: 800,
    account_access: 700,
    warm_read: 800,
    cold_sload: 0,
    cold_account: 0,
    sstore_set: 20000,
    sstore_reset: 5000,
    sstore_clears_refund: 15000,
    selfdestruct: 5000,
    refund_quotient: 2,
    max_code_size: 0x6000,
    max_initcode_size: None,
    initcode_word: 0,
    reject_ef_code: false,
    warm_coinbase: false,
};

const BERLIN: Schedule = Schedule {
    access_lists: true,
    sload: 100,
    account_access: 100,
    warm_read: 100,
    cold_sload: 2100,
    cold_account: 2600,
    sstore_reset: 5000 - 2100,
    ..ISTANBUL
};

const LONDON: Schedule = Schedule {
    sstore_clears_refund: 4800,
    refund_quotient: 5,
    reject_ef_code: true,
    ..BERLIN
};

const SHANGHAI: Schedule = Schedule {
    max_initcode_size: Some(2 * 0x6000),
    initcode_word: 2,
    warm_coinbase: true,
    ..LONDON
};

const CANCUN: Schedule = Schedule { ..SHANGHAI };

impl Schedule {
    pub fn of(revision: Revision) -> &'static Schedule {
        match revision {
            Revision::Istanbul => &ISTANBUL,
            Revision::Berlin => &BERLIN,
            Revision::London => &LONDON,
            Revision::Shanghai => &SHANGHAI,
            Revision::Cancun => &CANCUN,
        }
    }

    /// Cost of touching an account (BALANCE, EXTCODE*, CALL*).
    pub fn account_access_cost(&self, cold: bool) -> u64 {
        if self.access_lists && cold {
            self.cold_account
        } else {
            self.account_access
        }
    }

    pub fn sload_cost(&self, cold: bool) -> u64 {
        if self.access_lists && cold {
            self.cold_sload
        } else {
            self.sload
        }
    }

    /// SSTORE cost and refund delta, EIP-2200 with EIP-2929/3529 adjustments.
    pub fn sstore_cost(&self, original: &Word, current: &Word, new: &Word, cold: bool) -> (u64, i64) {
        // https://www.evm.codes/?fork=cancun#55
        let mut cost = if current == new {
            self.warm_read
        } else if current == original {
            if original.is_zero() {
                self.sstore_set
            } else {
                self.sstore_reset
            }
        } else {
            self.warm_read
        };
        if self.access_lists && cold {
            cost += self.cold_sload;
        }

        let mut refund = 0i64;
        if current != new {
            if current == original {
                if !original.is_zero() && new.is_zero() {
                    refund += self.sstore_clears_refund;
                }
            } else {
                if !original.is_zero() {
                    if current.is_zero() {
                        refund -= self.sstore_clears_refund;
                    } else if new.is_zero() {
                        refund += self.sstore_clears_refund;
                    }
                }
                if new == original {
                    if original.is_zero() {
                        refund += (self.sstore_set - self.warm_read) as i64;
                    } else {
                        refund += (self.sstore_reset - self.warm_read) as i64;
                    }
                }
            }
        }
        (cost, refund)
    }
}

/// Total cost of a memory of `words` 32-byte words.
pub fn memory_cost(words: u64) -> u64 {
    3 * words + words * words / 512
}

/// Per-word cost of copying `size` bytes.
pub fn copy_cost(size: usize) -> u64 {
    COPY_WORD * (size as u64).div_ceil(32)
}

/// EIP-150: all but one 64th.
pub fn all_but_one_64th(gas: i64) -> i64 {
    gas - gas / 64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cost() {
        assert_eq!(memory_cost(0), 0);
        assert_eq!(memory_cost(1), 3);
        assert_eq!(memory_cost(32), 98);
        assert_eq!(memory_cost(1024), 3072 + 2048);
    }

    #[test]
    fn test_sstore_fresh_slot() {
        let schedule = Schedule::of(Revision::London);
        let zero = Word::zero();
        let one = Word::one();
        assert_eq!(schedule.sstore_cost(&zero, &zero, &one, true), (22100, 0));
        assert_eq!(schedule.sstore_cost(&zero, &zero, &one, false), (20000, 0));
        assert_eq!(schedule.sstore_cost(&zero, &zero, &zero, false), (100, 0));
    }

    #[test]
    fn test_sstore_refunds() {
        let london = Schedule::of(Revision::London);
        let istanbul = Schedule::of(Revision::Istanbul);
        let zero = Word::zero();
        let one = Word::one();
        let two = Word::from(2u64);

        // clear a clean slot
        assert_eq!(london.sstore_cost(&one, &one, &zero, false), (2900, 4800));
        assert_eq!(istanbul.sstore_cost(&one, &one, &zero, false), (5000, 15000));

        // dirty slot restored to its original zero
        assert_eq!(london.sstore_cost(&zero, &one, &zero, false), (100, 19900));

        // dirty slot restored to its original non-zero value
        assert_eq!(london.sstore_cost(&one, &two, &one, false), (100, 2800));

        // un-clear a slot cleared earlier in the transaction
        assert_eq!(london.sstore_cost(&one, &zero, &two, false), (100, -4800));
    }

    #[test]
    fn test_access_costs() {
        let berlin = Schedule::of(Revision::Berlin);
        let istanbul = Schedule::of(Revision::Istanbul);
        assert_eq!(berlin.account_access_cost(true), 2600);
        assert_eq!(berlin.account_access_cost(false), 100);
        assert_eq!(istanbul.account_access_cost(true), 700);
        assert_eq!(berlin.sload_cost(true), 2100);
        assert_eq!(istanbul.sload_cost(true), 800);
    }

    #[test]
    fn test_all_but_one_64th() {
        assert_eq!(all_but_one_64th(64), 63);
        assert_eq!(all_but_one_64th(100), 99);
        assert_eq!(all_but_one_64th(0), 0);
    }
}
