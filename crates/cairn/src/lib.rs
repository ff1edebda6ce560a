#![doc = include_str!("../../../README.md")]

mod ast;
mod bytecode;
mod error;
mod inline;
mod io;
mod parse;
mod prepare;
mod scanner;
mod symbol;
mod token;
mod tracer;
mod treeprint;
mod types;

mod run;

pub use crate::{
    ast::{Node, NodeKind, Param, Signature},
    bytecode::{
        BinaryFn, CodeBuilder, DecodedInstr, Instr, Label, Opcode, Program, StackEntry, SysFn,
        UnaryFn, Vm, combine, lower,
    },
    error::{CompileError, VmError},
    io::{BufferConsole, Console, StdConsole},
    parse::{DiskLoader, MapLoader, NoIncludes, SourceLoader, parse},
    prepare::{Prepared, prepare},
    run::Compilation,
    scanner::Scanner,
    symbol::{
        INTRINSICS, IntrinsicEntry, ScopeMap, ScopeTracker, StorageType, SymbolEntry, SymbolId,
        SymbolTable,
    },
    token::{Position, Token, TokenKind},
    tracer::{ExecStats, NoopTracer, RecordingTracer, StderrTracer, VmTracer},
    treeprint::{TreeOptions, TreePrinter},
    types::{TypeExpr, TypeMatch},
};
