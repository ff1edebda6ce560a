//! Lowering from the resolved AST to stack entries.
//!
//! Expression nodes leave exactly one value on the VM stack; statement
//! nodes leave zero. Lvalues have a second, address-producing lowering.
//! Lambda bodies are deferred as code jobs so all code lives at the file
//! tail; global variables become data words after the last job.

use ahash::AHashMap;

use crate::{
    ast::{Node, NodeKind},
    bytecode::{
        builder::{CodeBuilder, Instr, Label},
        op::{BinaryFn, Opcode, SysFn, UnaryFn},
        program::Program,
    },
    error::CompileError,
    inline::{InlineFrames, InlineUse},
    prepare::Prepared,
    symbol::{INTRINSICS, ScopeMap, StorageType, SymbolId, SymbolTable},
    token::Position,
};

/// Lowers a prepared tree and assembles the final program.
pub fn lower(prepared: &mut Prepared) -> Result<Program, CompileError> {
    let Prepared {
        root,
        table,
        globals,
    } = prepared;
    let mut compiler = Compiler {
        table,
        globals,
        builder: CodeBuilder::new(),
        jobs: vec![],
        inline: InlineFrames::new(),
        inline_defs: AHashMap::new(),
        inline_depth: 0,
        data_jobs: vec![],
    };
    compiler.serialize(root)?;
    Ok(Program::new(compiler.builder.assemble()?))
}

/// A deferred inline body, re-serialized at every call site.
#[derive(Debug, Clone)]
struct InlineDef<'a> {
    param_ids: Vec<SymbolId>,
    writeback_first: bool,
    body: &'a Node,
}

/// A global variable awaiting data emission at the file tail.
#[derive(Debug, Clone, Copy)]
struct DataJob {
    label: Label,
    init: i32,
    size: u32,
}

struct Compiler<'a> {
    table: &'a mut SymbolTable,
    globals: &'a ScopeMap,
    builder: CodeBuilder,
    /// Deferred lambda bodies, drained after the main walk.
    jobs: Vec<(Label, &'a Node)>,
    inline: InlineFrames<'a>,
    inline_defs: AHashMap<SymbolId, InlineDef<'a>>,
    /// Non-zero while expanding an inline body: `return` then yields the
    /// expansion value instead of emitting `RET`.
    inline_depth: u32,
    data_jobs: Vec<DataJob>,
}

impl<'a> Compiler<'a> {
    fn serialize(&mut self, root: &'a Node) -> Result<(), CompileError> {
        self.collect_inline_defs(root);
        let entry = self.entry_label()?;

        // Start-up sequence: call the entry point with zero arguments and
        // exit with its return value.
        self.builder.instr(Instr::imm(Opcode::Push, 0));
        self.builder.instr(Instr::label_ref(Opcode::Push, entry));
        self.builder.instr(Instr::plain(Opcode::Call));
        self.builder
            .instr(Instr::with_fn(Opcode::SysCall, SysFn::Exit as u8));

        self.emit(root)?;

        // Jobs may enqueue further jobs (a lambda inside a lambda).
        let mut i = 0;
        while i < self.jobs.len() {
            let (label, node) = self.jobs[i];
            self.builder.label(label);
            self.emit(node)?;
            i += 1;
        }

        for job in std::mem::take(&mut self.data_jobs) {
            self.builder.label(job.label);
            self.builder.data(job.init, None);
            for _ in 1..job.size {
                self.builder.data(0, None);
            }
        }
        Ok(())
    }

    fn collect_inline_defs(&mut self, root: &'a Node) {
        let NodeKind::Block { statements } = &root.kind else {
            return;
        };
        for statement in statements {
            if let NodeKind::Inline { signature, body, .. } = &statement.kind {
                self.inline_defs.insert(
                    statement.id,
                    InlineDef {
                        param_ids: signature.params.iter().map(|p| p.id).collect(),
                        writeback_first: signature.params.first().is_some_and(|p| p.writeback),
                        body: &**body,
                    },
                );
            }
        }
    }

    /// Finds the label the start-up sequence calls.
    ///
    /// `main` may be any global symbol, not necessarily a function; an
    /// overload set must have exactly one member, and that member must
    /// exist at run time (inline callables have no address).
    fn entry_label(&mut self) -> Result<Label, CompileError> {
        let Some(&main) = self.globals.get("main") else {
            return Err(CompileError::semantic(
                "entry point 'main' was not defined",
                Position::default(),
            ));
        };
        let entry = self.table.resolve(main, Position::default())?;
        let label = if entry.storage == StorageType::Callable {
            let members = self.table.overloads(entry.id);
            let [member] = members else {
                return Err(CompileError::semantic(
                    "ambiguous entry point 'main'",
                    Position::default(),
                ));
            };
            member.id
        } else {
            entry.id
        };
        if self.inline_defs.contains_key(&label) {
            return Err(CompileError::semantic(
                "entry point 'main' cannot be an inline callable",
                Position::default(),
            ));
        }
        Ok(label)
    }

    /// Serializes a node; expressions leave one value, statements none.
    fn emit(&mut self, node: &'a Node) -> Result<(), CompileError> {
        let pos = node.token.pos;
        match &node.kind {
            NodeKind::IntLit { value } => {
                self.builder.instr(Instr::imm(Opcode::Push, *value));
            }
            NodeKind::BoolLit { value } => {
                self.builder.instr(Instr::imm(Opcode::Push, i32::from(*value)));
            }
            NodeKind::Variable => self.emit_variable(node)?,
            NodeKind::Unary { operand } => match node.token.text.as_str() {
                "&" => self.emit_address(operand)?,
                "+" => self.emit(operand)?,
                "-" => {
                    self.emit(operand)?;
                    self.builder
                        .instr(Instr::with_fn(Opcode::Unary, UnaryFn::Neg as u8));
                }
                "*" => {
                    self.emit(operand)?;
                    self.builder.instr(Instr::plain(Opcode::LoadAbs));
                }
                other => {
                    return Err(CompileError::semantic(
                        format!("unrecognized unary operator: {other}"),
                        pos,
                    ));
                }
            },
            NodeKind::Binary { left, right } => self.emit_binary(node, left, right)?,
            NodeKind::Subscript { .. } => {
                self.emit_address(node)?;
                self.builder.instr(Instr::plain(Opcode::LoadAbs));
            }
            NodeKind::Attribute { .. } => {
                return Err(CompileError::lowering(
                    "attribute access survived type resolution",
                ));
            }
            NodeKind::Ternary {
                cond,
                if_true,
                if_false,
            } => {
                let label_false = self.table.next_id();
                let label_end = self.table.next_id();
                self.emit(cond)?;
                self.builder
                    .instr(Instr::label_ref(Opcode::BrFalse, label_false));
                self.emit(if_true)?;
                self.builder.instr(Instr::label_ref(Opcode::Jump, label_end));
                self.builder.label(label_false);
                self.emit(if_false)?;
                self.builder.label(label_end);
            }
            NodeKind::Call { .. } => self.emit_call(node)?,
            NodeKind::ExprList { items } => {
                for item in items {
                    self.emit(item)?;
                }
            }
            NodeKind::Lambda { body, .. } => {
                let label = self.table.next_id();
                self.jobs.push((label, &**body));
                self.builder.instr(Instr::label_ref(Opcode::Push, label));
            }
            NodeKind::Function {
                body, frame_size, ..
            } => {
                if node.id == 0 {
                    return Err(CompileError::lowering("unresolved function name"));
                }
                self.builder.label(node.id);
                self.builder
                    .instr(Instr::imm(Opcode::AddSp, *frame_size as i32));
                self.emit(body)?;
                // Guard for bodies that fall off the end.
                self.builder.instr(Instr::imm(Opcode::Ret, 0));
            }
            // Inline bodies are emitted at call sites only.
            NodeKind::Inline { .. } => {}
            NodeKind::Block { statements } | NodeKind::ScopedBlock { statements } => {
                for statement in statements {
                    self.emit(statement)?;
                }
            }
            NodeKind::If { cond, body } => {
                let label_end = self.table.next_id();
                self.emit(cond)?;
                self.builder.instr(Instr::label_ref(Opcode::BrFalse, label_end));
                self.emit(body)?;
                self.builder.label(label_end);
            }
            NodeKind::IfElse { cond, body, orelse } => {
                let label_false = self.table.next_id();
                let label_end = self.table.next_id();
                self.emit(cond)?;
                self.builder
                    .instr(Instr::label_ref(Opcode::BrFalse, label_false));
                self.emit(body)?;
                self.builder.instr(Instr::label_ref(Opcode::Jump, label_end));
                self.builder.label(label_false);
                self.emit(orelse)?;
                self.builder.label(label_end);
            }
            NodeKind::For {
                init,
                cond,
                post,
                body,
            } => {
                let label_body = self.table.next_id();
                let label_cond = self.table.next_id();
                self.emit(init)?;
                self.builder.instr(Instr::label_ref(Opcode::Jump, label_cond));
                self.builder.label(label_body);
                self.emit(body)?;
                self.emit(post)?;
                self.builder.label(label_cond);
                self.emit(cond)?;
                self.builder.instr(Instr::label_ref(Opcode::BrTrue, label_body));
            }
            NodeKind::Return { value } => {
                if self.inline_depth > 0 {
                    // Inside an expansion, `return` yields the expansion's
                    // value; control never leaves the enclosing function.
                    if let Some(value) = value {
                        self.emit(value)?;
                    }
                } else if let Some(value) = value {
                    self.emit(value)?;
                    self.builder.instr(Instr::plain(Opcode::Ret));
                } else {
                    self.builder.instr(Instr::imm(Opcode::Ret, 0));
                }
            }
            NodeKind::VarDecl { init, .. } => {
                let entry = self.table.entry(node.id).clone();
                match entry.storage {
                    StorageType::Absolute => {
                        let value = match init {
                            Some(init) => init.constant_value().ok_or_else(|| {
                                CompileError::semantic(
                                    "global initializer must be a constant expression",
                                    pos,
                                )
                            })?,
                            None => 0,
                        };
                        self.data_jobs.push(DataJob {
                            label: entry.id,
                            init: value,
                            size: entry.size,
                        });
                    }
                    StorageType::Relative => {
                        if let Some(init) = init {
                            self.builder
                                .instr(Instr::imm(Opcode::LoadAddrRel, entry.value));
                            self.emit(init)?;
                            self.builder
                                .instr(Instr::with_fn(Opcode::Binary, BinaryFn::Assign as u8));
                            self.builder.instr(Instr::plain(Opcode::Pop));
                        }
                    }
                    _ => {
                        return Err(CompileError::lowering(format!(
                            "variable declared with {} storage",
                            entry.storage
                        )));
                    }
                }
            }
            NodeKind::ExprStatement { expr } => {
                self.emit(expr)?;
                self.builder.instr(Instr::plain(Opcode::Pop));
            }
            NodeKind::TypeDecl { .. } | NodeKind::AliasDecl { .. } | NodeKind::Empty => {}
        }
        Ok(())
    }

    fn emit_variable(&mut self, node: &'a Node) -> Result<(), CompileError> {
        let pos = node.token.pos;
        let entry = self.table.resolve(node.id, pos)?;
        match entry.storage {
            StorageType::Relative => {
                self.builder.instr(Instr::imm(Opcode::Push, entry.value));
                self.builder.instr(Instr::plain(Opcode::LoadRel));
            }
            StorageType::Label | StorageType::Absolute => {
                self.builder.instr(Instr::label_ref(Opcode::Push, entry.id));
            }
            StorageType::Callable => self.push_callable_addr(entry.id, &entry.name, pos)?,
            StorageType::InlineReference => match self.inline.use_value(entry.id, pos)? {
                InlineUse::Node(bound) => self.emit(bound)?,
                InlineUse::Writeback => {
                    self.builder.instr(Instr::plain(Opcode::Dup));
                    self.builder.instr(Instr::plain(Opcode::LoadAbs));
                }
            },
            StorageType::Intrinsic => {
                return Err(CompileError::semantic(
                    format!("intrinsic {} can only be called", entry.name),
                    pos,
                ));
            }
            StorageType::Invalid | StorageType::Alias => {
                return Err(CompileError::semantic(
                    format!("invalid storage type for {}", entry.name),
                    pos,
                ));
            }
        }
        Ok(())
    }

    /// Pushes the code address of a callable's sole overload.
    fn push_callable_addr(
        &mut self,
        callable: SymbolId,
        name: &str,
        pos: Position,
    ) -> Result<(), CompileError> {
        let [member] = self.table.overloads(callable) else {
            return Err(CompileError::semantic(
                format!("ambiguous reference to overloaded {name}"),
                pos,
            ));
        };
        let member_id = member.id;
        if self.inline_defs.contains_key(&member_id) {
            return Err(CompileError::semantic(
                format!("inline callable {name} has no address"),
                pos,
            ));
        }
        self.builder.instr(Instr::label_ref(Opcode::Push, member_id));
        Ok(())
    }

    fn emit_binary(
        &mut self,
        node: &'a Node,
        left: &'a Node,
        right: &'a Node,
    ) -> Result<(), CompileError> {
        let pos = node.token.pos;
        let op = node.token.text.as_str();
        match op {
            "=" => {
                self.emit_address(left)?;
                self.emit(right)?;
                self.builder
                    .instr(Instr::with_fn(Opcode::Binary, BinaryFn::Assign as u8));
                return Ok(());
            }
            // `>` and `>=` run as `<` and `<=` with swapped operands.
            ">" | ">=" => {
                let funccode = if op == ">=" {
                    BinaryFn::LessEquals
                } else {
                    BinaryFn::LessThan
                };
                self.emit(right)?;
                self.emit(left)?;
                self.builder
                    .instr(Instr::with_fn(Opcode::Binary, funccode as u8));
                return Ok(());
            }
            "||" => {
                let label_true = self.table.next_id();
                let label_end = self.table.next_id();
                self.emit(left)?;
                self.builder.instr(Instr::label_ref(Opcode::BrTrue, label_true));
                self.emit(right)?;
                self.builder.instr(Instr::label_ref(Opcode::BrTrue, label_true));
                self.builder.instr(Instr::imm(Opcode::Push, 0));
                self.builder.instr(Instr::label_ref(Opcode::Jump, label_end));
                self.builder.label(label_true);
                self.builder.instr(Instr::imm(Opcode::Push, 1));
                self.builder.label(label_end);
                return Ok(());
            }
            "&&" => {
                let label_false = self.table.next_id();
                let label_end = self.table.next_id();
                self.emit(left)?;
                self.builder
                    .instr(Instr::label_ref(Opcode::BrFalse, label_false));
                self.emit(right)?;
                self.builder
                    .instr(Instr::label_ref(Opcode::BrFalse, label_false));
                self.builder.instr(Instr::imm(Opcode::Push, 1));
                self.builder.instr(Instr::label_ref(Opcode::Jump, label_end));
                self.builder.label(label_false);
                self.builder.instr(Instr::imm(Opcode::Push, 0));
                self.builder.label(label_end);
                return Ok(());
            }
            _ => {}
        }
        let funccode = match op {
            "+" => BinaryFn::Add,
            "-" => BinaryFn::Sub,
            "*" => BinaryFn::Mul,
            "/" => BinaryFn::Div,
            "%" => BinaryFn::Mod,
            "==" => BinaryFn::Equals,
            "!=" => BinaryFn::NotEquals,
            "<" => BinaryFn::LessThan,
            "<=" => BinaryFn::LessEquals,
            other => {
                return Err(CompileError::semantic(
                    format!("unrecognized binary operator: {other}"),
                    pos,
                ));
            }
        };
        self.emit(left)?;
        self.emit(right)?;
        self.builder
            .instr(Instr::with_fn(Opcode::Binary, funccode as u8));
        Ok(())
    }

    /// Serializes the address of an lvalue.
    fn emit_address(&mut self, node: &'a Node) -> Result<(), CompileError> {
        let pos = node.token.pos;
        match &node.kind {
            NodeKind::Variable => {
                let entry = self.table.resolve(node.id, pos)?;
                match entry.storage {
                    StorageType::Relative => {
                        self.builder
                            .instr(Instr::imm(Opcode::LoadAddrRel, entry.value));
                    }
                    StorageType::InlineReference => {
                        let bound = self.inline.use_address(entry.id, pos)?;
                        self.emit_address(bound)?;
                    }
                    StorageType::Absolute => {
                        return Err(CompileError::semantic(
                            format!("cannot take the address of global {}", entry.name),
                            pos,
                        ));
                    }
                    _ => {
                        return Err(CompileError::semantic(
                            format!("{} has no address", entry.name),
                            pos,
                        ));
                    }
                }
            }
            NodeKind::Unary { operand } if node.token.text == "*" => {
                self.emit(operand)?;
            }
            // Subscript bases are pointer values: the element address is
            // the base value plus the index.
            NodeKind::Subscript { array, index } => {
                self.emit(array)?;
                self.emit(index)?;
                self.builder
                    .instr(Instr::with_fn(Opcode::Binary, BinaryFn::Add as u8));
            }
            _ => {
                return Err(CompileError::semantic(
                    "cannot take the address of this expression",
                    pos,
                ));
            }
        }
        Ok(())
    }

    fn emit_call(&mut self, node: &'a Node) -> Result<(), CompileError> {
        let NodeKind::Call { callee, args } = &node.kind else {
            unreachable!()
        };
        let items = args.expr_list();
        if callee.is_variable() {
            let entry = self.table.resolve(callee.id, callee.token.pos)?;
            match entry.storage {
                StorageType::Intrinsic => {
                    for item in items {
                        self.emit(item)?;
                    }
                    let intrinsic = INTRINSICS[entry.value as usize];
                    self.builder
                        .instr(Instr::with_fn(intrinsic.opcode, intrinsic.funccode));
                    return Ok(());
                }
                StorageType::Callable => {
                    if node.id == 0 {
                        return Err(CompileError::lowering(
                            "call site survived without overload selection",
                        ));
                    }
                    if let Some(def) = self.inline_defs.get(&node.id) {
                        let def = def.clone();
                        return self.expand_inline(&def, items);
                    }
                    for item in items {
                        self.emit(item)?;
                    }
                    self.builder
                        .instr(Instr::imm(Opcode::Push, items.len() as i32));
                    self.builder.instr(Instr::label_ref(Opcode::Push, node.id));
                    self.builder.instr(Instr::plain(Opcode::Call));
                    return Ok(());
                }
                _ => {}
            }
        }
        // Calling through a computed address: lambda values, parameters
        // holding function addresses, parenthesized expressions.
        for item in items {
            self.emit(item)?;
        }
        self.builder
            .instr(Instr::imm(Opcode::Push, items.len() as i32));
        self.emit(callee)?;
        self.builder.instr(Instr::plain(Opcode::Call));
        Ok(())
    }

    /// Expands an inline callable at its call site.
    fn expand_inline(
        &mut self,
        def: &InlineDef<'a>,
        args: &'a [Node],
    ) -> Result<(), CompileError> {
        if args.len() != def.param_ids.len() {
            return Err(CompileError::lowering(
                "inline call arity survived overload selection",
            ));
        }
        if def.writeback_first {
            // Materialize the lvalue address once; uses load through it.
            self.emit_address(&args[0])?;
        }
        self.inline.open(&def.param_ids, args, def.writeback_first);
        self.inline_depth += 1;
        let result = self.emit(def.body);
        self.inline_depth -= 1;
        let writeback = self.inline.close(&def.param_ids);
        result?;
        if writeback {
            // Commit through the captured address.
            self.builder
                .instr(Instr::with_fn(Opcode::Binary, BinaryFn::Assign as u8));
        }
        Ok(())
    }
}
