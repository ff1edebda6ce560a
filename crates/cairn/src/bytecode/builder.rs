//! The typed entry stack, the peephole combiner, and the assembler.
//!
//! Lowering appends [`StackEntry`] values; after every append the combiner
//! fuses the trailing pair while it can. Assembly then runs two linear
//! passes: one to place labels, one to emit the packed word stream.

use ahash::AHashMap;

use crate::{
    bytecode::op::{self, Opcode},
    error::CompileError,
};

/// Symbolic placeholder for a code address; symbol ids double as labels.
pub type Label = u32;

/// One instruction before assembly.
///
/// `data` holds the immediate when `has_immediate` is set; with
/// `references_label` the immediate is a label id replaced by its word
/// index at assembly time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    pub opcode: Opcode,
    pub funccode: u8,
    pub data: i32,
    pub has_immediate: bool,
    pub references_label: bool,
}

impl Instr {
    pub fn plain(opcode: Opcode) -> Self {
        Self {
            opcode,
            funccode: 0,
            data: 0,
            has_immediate: false,
            references_label: false,
        }
    }

    pub fn with_fn(opcode: Opcode, funccode: u8) -> Self {
        Self {
            funccode,
            ..Self::plain(opcode)
        }
    }

    pub fn imm(opcode: Opcode, data: i32) -> Self {
        Self {
            data,
            has_immediate: true,
            ..Self::plain(opcode)
        }
    }

    pub fn imm_fn(opcode: Opcode, funccode: u8, data: i32) -> Self {
        Self {
            funccode,
            ..Self::imm(opcode, data)
        }
    }

    pub fn label_ref(opcode: Opcode, label: Label) -> Self {
        Self {
            references_label: true,
            ..Self::imm(opcode, label as i32)
        }
    }

    /// Words this instruction occupies in the output.
    pub fn size(&self) -> u32 {
        1 + u32::from(self.has_immediate)
    }

    /// True for instructions the combiner may erase outright.
    fn has_no_effect(&self) -> bool {
        if self.opcode == Opcode::Nop {
            return true;
        }
        self.opcode == Opcode::AddSp && self.has_immediate && self.data == 0
    }
}

/// An entry on the lowering stack: an instruction, a raw data word, or a
/// label marker pinning a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEntry {
    Instr(Instr),
    Data { value: i32, label: Option<Label> },
    Label(Label),
}

impl StackEntry {
    fn size(&self) -> u32 {
        match self {
            Self::Instr(instr) => instr.size(),
            Self::Data { .. } => 1,
            Self::Label(_) => 0,
        }
    }
}

/// Tries to fuse two adjacent instructions into one.
///
/// The combiner never reorders and never crosses a label or data entry;
/// a fused `PUSH` immediate is valid exactly because the pushed value had
/// no other observer.
pub fn combine(left: &Instr, right: &Instr) -> Option<Instr> {
    if left.has_no_effect() {
        return Some(*right);
    }
    if right.has_no_effect() {
        return Some(*left);
    }
    // Anything after an unconditional transfer is unreachable.
    if left.opcode == Opcode::Jump || left.opcode == Opcode::Ret {
        return Some(*left);
    }
    // Constant-fold a pushed condition into its branch.
    if left.opcode == Opcode::Push
        && left.has_immediate
        && !left.references_label
        && right.has_immediate
        && (right.opcode == Opcode::BrTrue || right.opcode == Opcode::BrFalse)
    {
        let taken = (left.data != 0) == (right.opcode == Opcode::BrTrue);
        if taken {
            let mut jump = Instr::imm(Opcode::Jump, right.data);
            jump.references_label = right.references_label;
            return Some(jump);
        }
        return Some(Instr::plain(Opcode::Nop));
    }
    // Fuse the pushed value into the following instruction's immediate.
    // Only valid when the second instruction would have popped the value:
    // an operand-less instruction (`SYSCALL GetC`) must leave it alone.
    if left.opcode == Opcode::Push
        && left.has_immediate
        && !right.has_immediate
        && takes_operand(right)
    {
        let mut fused = Instr::imm_fn(right.opcode, right.funccode, left.data);
        fused.references_label = left.references_label;
        return Some(fused);
    }
    None
}

/// Whether an instruction without an immediate pops its operand.
fn takes_operand(instr: &Instr) -> bool {
    !(instr.opcode == Opcode::Nop
        || (instr.opcode == Opcode::SysCall && instr.funccode == crate::bytecode::op::SysFn::GetC as u8))
}

/// Accumulates entries during lowering and assembles the word stream.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    entries: Vec<StackEntry>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, then combines the trailing pair to fixpoint.
    pub fn push(&mut self, entry: StackEntry) {
        self.entries.push(entry);
        while self.entries.len() > 1 {
            let n = self.entries.len();
            let (StackEntry::Instr(left), StackEntry::Instr(right)) =
                (self.entries[n - 2], self.entries[n - 1])
            else {
                return;
            };
            let Some(combined) = combine(&left, &right) else {
                return;
            };
            self.entries.pop();
            *self.entries.last_mut().expect("entry stack is non-empty") =
                StackEntry::Instr(combined);
        }
    }

    pub fn instr(&mut self, instr: Instr) {
        self.push(StackEntry::Instr(instr));
    }

    pub fn label(&mut self, label: Label) {
        self.push(StackEntry::Label(label));
    }

    pub fn data(&mut self, value: i32, label: Option<Label>) {
        self.push(StackEntry::Data { value, label });
    }

    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    /// Two linear passes: place labels, then emit packed words.
    pub fn assemble(&self) -> Result<Vec<u32>, CompileError> {
        let mut label_map: AHashMap<Label, u32> = AHashMap::new();
        let mut cursor = 0u32;
        for entry in &self.entries {
            if let StackEntry::Label(label) = entry {
                if label_map.insert(*label, cursor).is_some() {
                    return Err(CompileError::lowering(format!(
                        "redefinition of label {label}"
                    )));
                }
            }
            cursor += entry.size();
        }

        let resolve = |value: i32, references: bool| -> Result<u32, CompileError> {
            if !references {
                return Ok(value as u32);
            }
            label_map.get(&(value as u32)).copied().ok_or_else(|| {
                CompileError::lowering(format!("unresolved label: {value}"))
            })
        };

        let mut words = Vec::with_capacity(cursor as usize);
        for entry in &self.entries {
            match entry {
                StackEntry::Instr(instr) => {
                    words.push(op::encode(instr.opcode, instr.funccode, instr.has_immediate));
                    if instr.has_immediate {
                        words.push(resolve(instr.data, instr.references_label)?);
                    }
                }
                StackEntry::Data { value, label } => match label {
                    Some(label) => words.push(resolve(*label as i32, true)?),
                    None => words.push(*value as u32),
                },
                StackEntry::Label(_) => {}
            }
        }
        Ok(words)
    }
}
