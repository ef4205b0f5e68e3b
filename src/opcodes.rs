use once_cell::sync::Lazy;

use crate::gas;

#[derive(Debug, Clone, Copy)]
pub struct Opcode {
    pub code: u8,
    pub name: &'static str,
    pub n: u8,
    /// Static gas, charged before the instruction runs. Revision dependent
    /// and dynamic costs are charged by the instruction itself.
    pub gas: u16,
}

impl Opcode {
    pub const fn new(code: u8, name: &'static str, n: u8, gas: u16) -> Self {
        Self { code, name, n, gas }
    }

    pub fn name(&self) -> String {
        self.name.replace('_', &self.n.to_string())
    }

    pub fn is_defined(&self) -> bool {
        self.name != "undefined"
    }

    pub(crate) fn push_len(&self) -> usize {
        if self.name != "PUSH_" {
            0
        } else {
            self.n as usize
        }
    }
}

static OPCODES: Lazy<[Opcode; 256]> = Lazy::new(|| {
    let mut table = [Opcode::new(0xfe, "undefined", 0, 0); 256];
    for (i, op) in table.iter_mut().enumerate() {
        op.code = i as u8;
    }

    // 0s: Stop and Arithmetic Operations
    table[0x00] = Opcode::new(0x00, "STOP", 0, 0);
    table[0x01] = Opcode::new(0x01, "ADD", 0, 3);
    table[0x02] = Opcode::new(0x02, "MUL", 0, 5);
    table[0x03] = Opcode::new(0x03, "SUB", 0, 3);
    table[0x04] = Opcode::new(0x04, "DIV", 0, 5);
    table[0x05] = Opcode::new(0x05, "SDIV", 0, 5);
    table[0x06] = Opcode::new(0x06, "MOD", 0, 5);
    table[0x07] = Opcode::new(0x07, "SMOD", 0, 5);
    table[0x08] = Opcode::new(0x08, "ADDMOD", 0, 8);
    table[0x09] = Opcode::new(0x09, "MULMOD", 0, 8);
    table[0x0a] = Opcode::new(0x0a, "EXP", 0, 10);
    table[0x0b] = Opcode::new(0x0b, "SIGNEXTEND", 0, 5);

    // 10s: Comparison & Bitwise Logic Operations
    table[0x10] = Opcode::new(0x10, "LT", 0, 3);
    table[0x11] = Opcode::new(0x11, "GT", 0, 3);
    table[0x12] = Opcode::new(0x12, "SLT", 0, 3);
    table[0x13] = Opcode::new(0x13, "SGT", 0, 3);
    table[0x14] = Opcode::new(0x14, "EQ", 0, 3);
    table[0x15] = Opcode::new(0x15, "ISZERO", 0, 3);
    table[0x16] = Opcode::new(0x16, "AND", 0, 3);
    table[0x17] = Opcode::new(0x17, "OR", 0, 3);
    table[0x18] = Opcode::new(0x18, "XOR", 0, 3);
    table[0x19] = Opcode::new(0x19, "NOT", 0, 3);
    table[0x1a] = Opcode::new(0x1a, "BYTE", 0, 3);
    table[0x1b] = Opcode::new(0x1b, "SHL", 0, 3);
    table[0x1c] = Opcode::new(0x1c, "SHR", 0, 3);
    table[0x1d] = Opcode::new(0x1d, "SAR", 0, 3);

    // 20s: SHA3
    table[0x20] = Opcode::new(0x20, "SHA3", 0, 30);

    // 30s: Environmental Information
    table[0x30] = Opcode::new(0x30, "ADDRESS", 0, 2);
    table[0x31] = Opcode::new(0x31, "BALANCE", 0, 0);
    table[0x32] = Opcode::new(0x32, "ORIGIN", 0, 2);
    table[0x33] = Opcode::new(0x33, "CALLER", 0, 2);
    table[0x34] = Opcode::new(0x34, "CALLVALUE", 0, 2);
    table[0x35] = Opcode::new(0x35, "CALLDATALOAD", 0, 3);
    table[0x36] = Opcode::new(0x36, "CALLDATASIZE", 0, 2);
    table[0x37] = Opcode::new(0x37, "CALLDATACOPY", 0, 3);
    table[0x38] = Opcode::new(0x38, "CODESIZE", 0, 2);
    table[0x39] = Opcode::new(0x39, "CODECOPY", 0, 3);
    table[0x3a] = Opcode::new(0x3a, "GASPRICE", 0, 2);
    table[0x3b] = Opcode::new(0x3b, "EXTCODESIZE", 0, 0);
    table[0x3c] = Opcode::new(0x3c, "EXTCODECOPY", 0, 0);
    table[0x3d] = Opcode::new(0x3d, "RETURNDATASIZE", 0, 2);
    table[0x3e] = Opcode::new(0x3e, "RETURNDATACOPY", 0, 3);
    table[0x3f] = Opcode::new(0x3f, "EXTCODEHASH", 0, 0);

    // 40s: Block Information
    table[0x40] = Opcode::new(0x40, "BLOCKHASH", 0, 20);
    table[0x41] = Opcode::new(0x41, "COINBASE", 0, 2);
    table[0x42] = Opcode::new(0x42, "TIMESTAMP", 0, 2);
    table[0x43] = Opcode::new(0x43, "NUMBER", 0, 2);
    table[0x44] = Opcode::new(0x44, "DIFFICULTY", 0, 2);
    table[0x45] = Opcode::new(0x45, "GASLIMIT", 0, 2);
    table[0x46] = Opcode::new(0x46, "CHAINID", 0, 2);
    table[0x47] = Opcode::new(0x47, "SELFBALANCE", 0, 5);
    table[0x48] = Opcode::new(0x48, "BASEFEE", 0, 2);
    table[0x49] = Opcode::new(0x49, "BLOBHASH", 0, 3);
    table[0x4a] = Opcode::new(0x4a, "BLOBBASEFEE", 0, 2);

    // 50s: Stack, Memory, Storage and Flow Operations
    table[0x50] = Opcode::new(0x50, "POP", 0, 2);
    table[0x51] = Opcode::new(0x51, "MLOAD", 0, 3);
    table[0x52] = Opcode::new(0x52, "MSTORE", 0, 3);
    table[0x53] = Opcode::new(0x53, "MSTORE8", 0, 3);
    table[0x54] = Opcode::new(0x54, "SLOAD", 0, 0);
    table[0x55] = Opcode::new(0x55, "SSTORE", 0, 0);
    table[0x56] = Opcode::new(0x56, "JUMP", 0, 8);
    table[0x57] = Opcode::new(0x57, "JUMPI", 0, 10);
    table[0x58] = Opcode::new(0x58, "PC", 0, 2);
    table[0x59] = Opcode::new(0x59, "MSIZE", 0, 2);
    table[0x5a] = Opcode::new(0x5a, "GAS", 0, 2);
    table[0x5b] = Opcode::new(0x5b, "JUMPDEST", 0, 1);
    table[0x5c] = Opcode::new(0x5c, "TLOAD", 0, 100);
    table[0x5d] = Opcode::new(0x5d, "TSTORE", 0, 100);
    table[0x5e] = Opcode::new(0x5e, "MCOPY", 0, 3);
    table[0x5f] = Opcode::new(0x5f, "PUSH0", 0, 2);

    // PUSH{1..32} Operations
    for i in 0..32 {
        table[0x60 + i] = Opcode::new(0x60 + i as u8, "PUSH_", i as u8 + 1, 3);
    }

    // DUP{1..16}
    for i in 0..16 {
        table[0x80 + i] = Opcode::new(0x80 + i as u8, "DUP_", i as u8 + 1, 3);
    }

    // SWAP{1..16}
    for i in 0..16 {
        table[0x90 + i] = Opcode::new(0x90 + i as u8, "SWAP_", i as u8 + 1, 3);
    }

    // LOG{0..4}
    for i in 0..5 {
        table[0xa0 + i] = Opcode::new(0xa0 + i as u8, "LOG_", i as u8, 375);
    }

    // System operations
    table[0xf0] = Opcode::new(0xf0, "CREATE", 0, gas::CREATE as u16);
    table[0xf1] = Opcode::new(0xf1, "CALL", 0, 0);
    table[0xf2] = Opcode::new(0xf2, "CALLCODE", 0, 0);
    table[0xf3] = Opcode::new(0xf3, "RETURN", 0, 0);
    table[0xf4] = Opcode::new(0xf4, "DELEGATECALL", 0, 0);
    table[0xf5] = Opcode::new(0xf5, "CREATE2", 0, gas::CREATE as u16);
    table[0xfa] = Opcode::new(0xfa, "STATICCALL", 0, 0);
    table[0xfd] = Opcode::new(0xfd, "REVERT", 0, 0);
    table[0xfe] = Opcode::new(0xfe, "INVALID", 0, 0);
    table[0xff] = Opcode::new(0xff, "SELFDESTRUCT", 0, 0);

    table
});

pub fn get_opcode(value: u8) -> Opcode {
    OPCODES[value as usize]
}
