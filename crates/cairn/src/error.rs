//! Error types for the compiler pipeline and the virtual machine.
//!
//! Every pass reports through [`CompileError`]; the first error aborts the
//! pipeline. There is no recovery layer: each pass is total and cheap, so
//! partial-failure semantics would add complexity without value.

use std::{borrow::Cow, fmt};

use crate::token::Position;

/// A fatal error raised anywhere between reading source text and emitting
/// the final word stream.
///
/// The variant is the error category; the payload carries the message and,
/// where one exists, the source position of the offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Error while turning bytes into tokens.
    Lexical {
        msg: Cow<'static, str>,
        position: Position,
    },
    /// Error in syntax.
    Syntax {
        msg: Cow<'static, str>,
        position: Position,
    },
    /// Error in name or type resolution.
    Semantic {
        msg: Cow<'static, str>,
        position: Position,
    },
    /// Internal invariant violated while lowering or assembling.
    ///
    /// These have no source position: by the time lowering runs, every
    /// token-level problem has already been rejected.
    Lowering { msg: Cow<'static, str> },
}

impl CompileError {
    pub(crate) fn lexical(msg: impl Into<Cow<'static, str>>, position: Position) -> Self {
        Self::Lexical {
            msg: msg.into(),
            position,
        }
    }

    pub(crate) fn syntax(msg: impl Into<Cow<'static, str>>, position: Position) -> Self {
        Self::Syntax {
            msg: msg.into(),
            position,
        }
    }

    pub(crate) fn semantic(msg: impl Into<Cow<'static, str>>, position: Position) -> Self {
        Self::Semantic {
            msg: msg.into(),
            position,
        }
    }

    pub(crate) fn lowering(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Lowering { msg: msg.into() }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical { msg, position } => write!(f, "lexical error at {position}: {msg}"),
            Self::Syntax { msg, position } => write!(f, "syntax error at {position}: {msg}"),
            Self::Semantic { msg, position } => write!(f, "semantic error at {position}: {msg}"),
            Self::Lowering { msg } => write!(f, "lowering error: {msg}"),
        }
    }
}

impl std::error::Error for CompileError {}

/// A fatal error raised by the virtual machine while executing a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// `BINARY Div` or `BINARY Mod` with a zero right operand.
    DivisionByZero { ip: usize },
    /// A word whose opcode or funccode byte decodes to nothing.
    BadInstruction { ip: usize, word: u32 },
    /// A load, store, or frame access outside the current stack.
    BadAddress { ip: usize, addr: i64 },
    /// An instruction needed an operand from an empty stack.
    StackUnderflow { ip: usize },
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DivisionByZero { ip } => write!(f, "division by zero at {ip}"),
            Self::BadInstruction { ip, word } => {
                write!(f, "unrecognized instruction {word:#010x} at {ip}")
            }
            Self::BadAddress { ip, addr } => write!(f, "address {addr} out of range at {ip}"),
            Self::StackUnderflow { ip } => write!(f, "stack underflow at {ip}"),
        }
    }
}

impl std::error::Error for VmError {}
