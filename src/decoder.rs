use crate::opcodes::{Opcode, get_opcode};

#[derive(Debug)]
pub struct Instruction {
    pub opcode: Opcode,
    pub offset: usize,
    pub argument: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct Bytecode {
    pub bytecode: Vec<u8>,
    pub instructions: Vec<Instruction>,
    pub jumptable: Vec<(usize, usize)>,
}

impl Bytecode {
    pub fn resolve_jump(&self, offset: usize) -> Option<usize> {
        let index = self
            .jumptable
            .binary_search_by_key(&offset, |(key, _)| *key)
            .ok()?;
        Some(self.jumptable[index].1)
    }
}

pub struct Decoder;

impl Decoder {
    /// Split code into instructions. A PUSH running past the end of the code
    /// reads zeros, so decoding never fails.
    pub fn decode(code: Vec<u8>) -> Bytecode {
        let mut instructions = Vec::new();
        let mut jumptable = Vec::new();

        let mut pos = 0;
        while pos < code.len() {
            let opcode = get_opcode(code[pos]);
            let mut instruction = Instruction {
                opcode,
                offset: pos,
                argument: None,
            };

            // JUMPDEST opcode
            if opcode.code == 0x5b {
                jumptable.push((pos, instructions.len()));
            }

            pos += 1; // Move past the opcode byte

            let push_bytes = opcode.push_len();
            if push_bytes > 0 {
                let start = pos.min(code.len());
                let end = (pos + push_bytes).min(code.len());
                let mut argument = code[start..end].to_vec();
                argument.resize(push_bytes, 0);
                instruction.argument = Some(argument);
                pos += push_bytes;
            }

            instructions.push(instruction);
        }

        Bytecode {
            bytecode: code,
            instructions,
            jumptable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let code = Decoder::decode(hex::decode("600035600055").unwrap());
        let names = code
            .instructions
            .iter()
            .map(|i| i.opcode.name())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["PUSH1", "CALLDATALOAD", "PUSH1", "SSTORE"]);
        assert_eq!(code.instructions[2].offset, 3);
        assert_eq!(code.instructions[2].argument, Some(vec![0x00]));
    }

    #[test]
    fn test_jumpdest_inside_push_data_is_ignored() {
        // PUSH2 0x5b5b; JUMPDEST
        let code = Decoder::decode(vec![0x61, 0x5b, 0x5b, 0x5b]);
        assert_eq!(code.jumptable, vec![(3, 1)]);
        assert_eq!(code.resolve_jump(3), Some(1));
        assert_eq!(code.resolve_jump(1), None);
    }

    #[test]
    fn test_truncated_push() {
        let code = Decoder::decode(vec![0x62, 0xab]);
        assert_eq!(code.instructions.len(), 1);
        assert_eq!(code.instructions[0].argument, Some(vec![0xab, 0x00, 0x00]));
    }
}
