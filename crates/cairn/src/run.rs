//! One-call pipeline entry: parse, resolve, lower, assemble, run.

use crate::{
    ast::Node,
    bytecode::{Program, Vm, compiler},
    error::{CompileError, VmError},
    io::Console,
    parse::{SourceLoader, parse},
    prepare::prepare,
    symbol::SymbolTable,
    tracer::{ExecStats, VmTracer},
    treeprint::{TreeOptions, TreePrinter},
};

/// A fully compiled program plus the artifacts the CLI can print.
#[derive(Debug)]
pub struct Compilation {
    pub root: Node,
    pub table: SymbolTable,
    pub program: Program,
}

impl Compilation {
    /// Runs the whole front half of the pipeline on one source buffer.
    pub fn compile(source: &str, loader: &dyn SourceLoader) -> Result<Self, CompileError> {
        let root = parse(source, loader)?;
        let mut prepared = prepare(root)?;
        let program = compiler::lower(&mut prepared)?;
        Ok(Self {
            root: prepared.root,
            table: prepared.table,
            program,
        })
    }

    pub fn print_tree(&self, options: TreeOptions) -> String {
        TreePrinter::new(options).print(&self.root)
    }

    pub fn dump_symbols(&self) -> String {
        self.table.dump()
    }

    pub fn disassemble(&self) -> String {
        self.program.disassemble()
    }

    /// Loads the program into a fresh VM and runs it.
    ///
    /// Returns the exit code and the run statistics.
    pub fn run<C: Console, T: VmTracer>(
        &self,
        console: C,
        tracer: T,
    ) -> Result<(u32, ExecStats), VmError> {
        let mut vm = Vm::new(self.program.clone(), console, tracer);
        let exit_code = vm.run()?;
        Ok((exit_code, *vm.stats()))
    }
}
