//! The assembled program: a flat vector of 32-bit words.
//!
//! The same vector is handed to the VM as both instruction memory and
//! working stack. Persistence is little-endian words, concatenated, no
//! header.

use crate::{
    bytecode::op::{self, Opcode},
    error::CompileError,
};

/// An assembled word stream ready to run, disassemble, or persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    words: Vec<u32>,
}

impl Program {
    pub fn new(words: Vec<u32>) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Serializes to little-endian bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.words.len() * 4);
        for word in &self.words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// Loads a program from little-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CompileError> {
        if bytes.len() % 4 != 0 {
            return Err(CompileError::lowering(format!(
                "bytecode length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let words = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self { words })
    }

    /// Renders every word as an instruction listing.
    ///
    /// Immediates with the top bit set print signed with the raw unsigned
    /// in parentheses. Words that do not decode print as raw data.
    pub fn disassemble(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let mut i = 0usize;
        while i < self.words.len() {
            let word = self.words[i];
            let _ = write!(out, "{i:>6}: ");
            match op::decode(word, i) {
                Ok((opcode, funccode, has_immediate)) => {
                    let _ = write!(out, "{opcode}");
                    if let Some(name) = op::funccode_name(opcode, funccode) {
                        let _ = write!(out, " {name}");
                    }
                    if has_immediate {
                        i += 1;
                        let imm = self.words.get(i).copied().unwrap_or(0);
                        if imm >> 31 != 0 {
                            let _ = write!(out, " {} ({imm})", imm as i32);
                        } else {
                            let _ = write!(out, " {imm}");
                        }
                    }
                }
                Err(_) => {
                    let _ = write!(out, ".word {word}");
                }
            }
            out.push('\n');
            i += 1;
        }
        out
    }
}

/// Decoded form of one instruction, used by the disassembler round-trip
/// tests and by tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstr {
    pub opcode: Opcode,
    pub funccode: u8,
    pub immediate: Option<u32>,
}

impl Program {
    /// Decodes the instruction stream, consuming immediate words.
    pub fn decode_all(&self) -> Result<Vec<DecodedInstr>, CompileError> {
        let mut instrs = vec![];
        let mut i = 0usize;
        while i < self.words.len() {
            let (opcode, funccode, has_immediate) = op::decode(self.words[i], i)
                .map_err(|err| CompileError::lowering(err.to_string()))?;
            let immediate = if has_immediate {
                i += 1;
                Some(self.words.get(i).copied().ok_or_else(|| {
                    CompileError::lowering("truncated immediate at end of program".to_owned())
                })?)
            } else {
                None
            };
            instrs.push(DecodedInstr {
                opcode,
                funccode,
                immediate,
            });
            i += 1;
        }
        Ok(instrs)
    }
}
