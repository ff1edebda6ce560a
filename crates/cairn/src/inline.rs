//! Bindings for inline callable expansion.
//!
//! Inline callables are expanded during lowering, not called at run time.
//! Each call site binds the formal parameters to the argument expression
//! nodes; a record stack saves prior bindings so nested expansions restore
//! them on close. Parameters are single-use unless declared `writeback`.

use ahash::AHashMap;

use crate::{ast::Node, error::CompileError, symbol::SymbolId, token::Position};

/// What a use site of an inline parameter should expand to.
#[derive(Debug, Clone, Copy)]
pub enum InlineUse<'a> {
    /// Serialize the bound argument expression.
    Node(&'a Node),
    /// Load through the writeback address sitting at stack top.
    Writeback,
}

#[derive(Debug, Clone, Copy)]
struct Binding<'a> {
    node: &'a Node,
    used: bool,
    writeback: bool,
}

/// The active inline parameter bindings, with a shadow stack of saved
/// states for nested expansions.
#[derive(Debug, Default)]
pub struct InlineFrames<'a> {
    params: AHashMap<SymbolId, Binding<'a>>,
    records: Vec<(SymbolId, Option<Binding<'a>>)>,
}

impl<'a> InlineFrames<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds each parameter to its argument node, saving prior bindings.
    ///
    /// When `writeback_first` is set the caller has already materialized
    /// the first argument's address on the VM stack.
    pub fn open(&mut self, param_ids: &[SymbolId], args: &'a [Node], writeback_first: bool) {
        for (i, &id) in param_ids.iter().enumerate() {
            self.records.push((id, self.params.get(&id).copied()));
            self.params.insert(
                id,
                Binding {
                    node: &args[i],
                    used: false,
                    writeback: writeback_first && i == 0,
                },
            );
        }
    }

    /// Resolves a value use of an inline parameter.
    ///
    /// Non-writeback parameters are single-use; a second use is fatal.
    pub fn use_value(
        &mut self,
        id: SymbolId,
        position: Position,
    ) -> Result<InlineUse<'a>, CompileError> {
        let binding = self.get_mut(id)?;
        if binding.writeback {
            return Ok(InlineUse::Writeback);
        }
        if binding.used {
            return Err(CompileError::semantic(
                "inline parameter may only be used once",
                position,
            ));
        }
        binding.used = true;
        Ok(InlineUse::Node(binding.node))
    }

    /// Resolves an address use of an inline parameter.
    pub fn use_address(
        &mut self,
        id: SymbolId,
        position: Position,
    ) -> Result<&'a Node, CompileError> {
        let binding = self.get_mut(id)?;
        if binding.writeback {
            return Err(CompileError::semantic(
                "writeback is not supported at this position",
                position,
            ));
        }
        if binding.used {
            return Err(CompileError::semantic(
                "inline parameter may only be used once",
                position,
            ));
        }
        binding.used = true;
        Ok(binding.node)
    }

    /// Restores prior bindings in reverse order; returns whether any
    /// closed parameter was a writeback (the caller then commits with a
    /// trailing assign).
    pub fn close(&mut self, param_ids: &[SymbolId]) -> bool {
        let mut writeback = false;
        for _ in param_ids.iter().rev() {
            let (id, saved) = self.records.pop().expect("unbalanced inline frame");
            writeback = writeback || self.params.get(&id).is_some_and(|b| b.writeback);
            match saved {
                Some(binding) => {
                    self.params.insert(id, binding);
                }
                None => {
                    self.params.remove(&id);
                }
            }
        }
        writeback
    }

    fn get_mut(&mut self, id: SymbolId) -> Result<&mut Binding<'a>, CompileError> {
        self.params
            .get_mut(&id)
            .ok_or_else(|| CompileError::lowering(format!("unbound inline parameter id {id}")))
    }
}
