//! Opcodes and their byte encoding.
//!
//! We model only the opcodes the swap protocol and standard key-hash spends
//! need. Anything else in a decoded script is an error, not a no-op.

use std::fmt;

use super::interpreter::ScriptError;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_IF: u8 = 0x63;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_BLAKE160: u8 = 0xc0;
pub const OP_TYPE: u8 = 0xd0;

/// Largest push encoded with a bare length byte.
const MAX_DIRECT_PUSH: usize = 0x4b;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    /// Small integer. `0..=16` encode as `OP_n`; larger values have no
    /// `OP_n` form and are written (and shown) as a one-byte push of the
    /// same stack value.
    Int(u8),
    /// Raw data push.
    Push(Vec<u8>),
    /// Push the covenant type of the output at the input's own index.
    Type,
    Equal,
    EqualVerify,
    If,
    Else,
    EndIf,
    Dup,
    Blake160,
    CheckSig,
}

impl Opcode {
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Opcode::Int(0) => buf.push(OP_0),
            Opcode::Int(n @ 1..=16) => buf.push(OP_1 - 1 + n),
            Opcode::Int(n) => buf.extend_from_slice(&[1, *n]),
            Opcode::Push(data) => {
                let len = data.len();
                if len <= MAX_DIRECT_PUSH {
                    buf.push(len as u8);
                } else if len <= u8::MAX as usize {
                    buf.push(OP_PUSHDATA1);
                    buf.push(len as u8);
                } else {
                    buf.push(OP_PUSHDATA2);
                    buf.extend_from_slice(&(len as u16).to_le_bytes());
                }
                buf.extend_from_slice(data);
            }
            Opcode::Type => buf.push(OP_TYPE),
            Opcode::Equal => buf.push(OP_EQUAL),
            Opcode::EqualVerify => buf.push(OP_EQUALVERIFY),
            Opcode::If => buf.push(OP_IF),
            Opcode::Else => buf.push(OP_ELSE),
            Opcode::EndIf => buf.push(OP_ENDIF),
            Opcode::Dup => buf.push(OP_DUP),
            Opcode::Blake160 => buf.push(OP_BLAKE160),
            Opcode::CheckSig => buf.push(OP_CHECKSIG),
        }
    }

    /// Whether this opcode affects conditional flow. These run even inside
    /// an unexecuted branch.
    pub fn is_conditional(&self) -> bool {
        matches!(self, Opcode::If | Opcode::Else | Opcode::EndIf)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Int(n @ 0..=16) => write!(f, "OP_{}", n),
            Opcode::Int(n) => write!(f, "0x01 0x{:02x}", n),
            Opcode::Push(data) => write!(f, "0x{:02x} 0x{}", data.len(), hex::encode(data)),
            Opcode::Type => f.write_str("OP_TYPE"),
            Opcode::Equal => f.write_str("OP_EQUAL"),
            Opcode::EqualVerify => f.write_str("OP_EQUALVERIFY"),
            Opcode::If => f.write_str("OP_IF"),
            Opcode::Else => f.write_str("OP_ELSE"),
            Opcode::EndIf => f.write_str("OP_ENDIF"),
            Opcode::Dup => f.write_str("OP_DUP"),
            Opcode::Blake160 => f.write_str("OP_BLAKE160"),
            Opcode::CheckSig => f.write_str("OP_CHECKSIG"),
        }
    }
}

/// An ordered list of opcodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    ops: Vec<Opcode>,
}

impl Script {
    pub fn new(ops: Vec<Opcode>) -> Self {
        Self { ops }
    }

    /// The standard key-hash spend template:
    /// `OP_DUP OP_BLAKE160 <hash> OP_EQUALVERIFY OP_CHECKSIG`.
    pub fn pay_to_key_hash(hash: &[u8]) -> Self {
        Self::new(vec![
            Opcode::Dup,
            Opcode::Blake160,
            Opcode::Push(hash.to_vec()),
            Opcode::EqualVerify,
            Opcode::CheckSig,
        ])
    }

    pub fn ops(&self) -> &[Opcode] {
        &self.ops
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for op in &self.ops {
            op.encode_into(&mut buf);
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ScriptError> {
        let mut ops = Vec::new();
        let mut pos = 0;

        let take = |pos: &mut usize, n: usize| -> Result<Vec<u8>, ScriptError> {
            let end = pos
                .checked_add(n)
                .filter(|&end| end <= bytes.len())
                .ok_or(ScriptError::Truncated)?;
            let out = bytes[*pos..end].to_vec();
            *pos = end;
            Ok(out)
        };

        while pos < bytes.len() {
            let byte = bytes[pos];
            pos += 1;
            let op = match byte {
                OP_0 => Opcode::Int(0),
                0x01..=0x4b => Opcode::Push(take(&mut pos, byte as usize)?),
                OP_PUSHDATA1 => {
                    let len = take(&mut pos, 1)?[0] as usize;
                    Opcode::Push(take(&mut pos, len)?)
                }
                OP_PUSHDATA2 => {
                    let raw = take(&mut pos, 2)?;
                    let len = u16::from_le_bytes([raw[0], raw[1]]) as usize;
                    Opcode::Push(take(&mut pos, len)?)
                }
                OP_1..=OP_16 => Opcode::Int(byte - OP_1 + 1),
                OP_IF => Opcode::If,
                OP_ELSE => Opcode::Else,
                OP_ENDIF => Opcode::EndIf,
                OP_DUP => Opcode::Dup,
                OP_EQUAL => Opcode::Equal,
                OP_EQUALVERIFY => Opcode::EqualVerify,
                OP_CHECKSIG => Opcode::CheckSig,
                OP_BLAKE160 => Opcode::Blake160,
                OP_TYPE => Opcode::Type,
                other => return Err(ScriptError::UnknownOpcode(other)),
            };
            ops.push(op);
        }

        Ok(Self { ops })
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}
