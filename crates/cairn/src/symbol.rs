//! The symbol table: storage classes, scopes, containers, intrinsics, and
//! callable overload sets.
//!
//! Symbols are keyed by a process-unique integer id. Id 0 is reserved as
//! "invalid/unset" and id 1 as the program entry label. Symbol ids double
//! as code labels, so the same counter hands out both.

use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;

use crate::{
    bytecode::op::{BinaryFn, Opcode, SysFn, UnaryFn},
    error::CompileError,
    token::Position,
    types::TypeExpr,
};

pub type SymbolId = u32;

pub type ScopeMap = AHashMap<String, SymbolId>;

/// Reserved id for "invalid/unset".
pub const NULL_SYMBOL: SymbolId = 0;
/// Reserved id for the program entry label.
pub const ENTRY_SYMBOL: SymbolId = 1;

/// How a symbol's value is materialized at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StorageType {
    Invalid,
    /// Code address, resolved at assembly.
    Label,
    /// Global data address, resolved at assembly.
    Absolute,
    /// Signed frame offset from the base pointer.
    Relative,
    /// Index into the intrinsic table.
    Intrinsic,
    /// Redirect to another id; chains are chased on lookup.
    Alias,
    /// An overload set of callables.
    Callable,
    /// Formal parameter of an inline body, bound per call site.
    InlineReference,
}

/// One entry in the symbol table.
#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub name: String,
    pub id: SymbolId,
    pub storage: StorageType,
    /// Offset, intrinsic index, or alias target depending on storage.
    pub value: i32,
    /// Number of stack words the symbol occupies (arrays > 1).
    pub size: u32,
    pub usages: u64,
}

/// Which flavor of callable an overload member is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Function,
    Inline,
}

/// One overload of a callable symbol.
///
/// `id` is the member's own label id; the parameter type list drives
/// selection at call sites.
#[derive(Debug, Clone)]
pub struct CallableMember {
    pub id: SymbolId,
    pub kind: CallableKind,
    pub params: Vec<TypeExpr>,
    pub ret: TypeExpr,
    /// True when the first parameter of an inline member is `writeback`.
    pub writeback_first: bool,
}

type OverloadList = SmallVec<[CallableMember; 2]>;

/// A named VM instruction callable by its double-underscore name.
#[derive(Debug, Clone, Copy)]
pub struct IntrinsicEntry {
    pub name: &'static str,
    pub n_args: u32,
    pub opcode: Opcode,
    pub funccode: u8,
}

/// The fixed intrinsic table; an `Intrinsic` symbol's value indexes it.
pub const INTRINSICS: [IntrinsicEntry; 13] = [
    IntrinsicEntry { name: "__exit__", n_args: 1, opcode: Opcode::SysCall, funccode: SysFn::Exit as u8 },
    IntrinsicEntry { name: "__putc__", n_args: 1, opcode: Opcode::SysCall, funccode: SysFn::PutC as u8 },
    IntrinsicEntry { name: "__getc__", n_args: 0, opcode: Opcode::SysCall, funccode: SysFn::GetC as u8 },
    IntrinsicEntry { name: "__ineg__", n_args: 1, opcode: Opcode::Unary, funccode: UnaryFn::Neg as u8 },
    IntrinsicEntry { name: "__iadd__", n_args: 2, opcode: Opcode::Binary, funccode: BinaryFn::Add as u8 },
    IntrinsicEntry { name: "__isub__", n_args: 2, opcode: Opcode::Binary, funccode: BinaryFn::Sub as u8 },
    IntrinsicEntry { name: "__idiv__", n_args: 2, opcode: Opcode::Binary, funccode: BinaryFn::Div as u8 },
    IntrinsicEntry { name: "__imul__", n_args: 2, opcode: Opcode::Binary, funccode: BinaryFn::Mul as u8 },
    IntrinsicEntry { name: "__imod__", n_args: 2, opcode: Opcode::Binary, funccode: BinaryFn::Mod as u8 },
    IntrinsicEntry { name: "__ieq__", n_args: 2, opcode: Opcode::Binary, funccode: BinaryFn::Equals as u8 },
    IntrinsicEntry { name: "__ineq__", n_args: 2, opcode: Opcode::Binary, funccode: BinaryFn::NotEquals as u8 },
    IntrinsicEntry { name: "__ilt__", n_args: 2, opcode: Opcode::Binary, funccode: BinaryFn::LessThan as u8 },
    IntrinsicEntry { name: "__ile__", n_args: 2, opcode: Opcode::Binary, funccode: BinaryFn::LessEquals as u8 },
];

/// The three scope maps visible at any point of local resolution.
///
/// Lookup order is current, then enclosing, then global. The enclosing
/// scope is the surrounding callable's own scope; it is distinct from the
/// global scope and empty at file level.
#[derive(Debug, Default)]
pub struct ScopeTracker {
    pub global: ScopeMap,
    pub enclosing: ScopeMap,
    pub current: ScopeMap,
}

impl ScopeTracker {
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.current
            .get(name)
            .or_else(|| self.enclosing.get(name))
            .or_else(|| self.global.get(name))
            .copied()
    }
}

/// Process-wide registry of symbols, appended to during resolution.
///
/// Also owns the stack of open containers (frames and future struct
/// layouts) and the overload sets of `Callable` symbols.
#[derive(Debug)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    counter: SymbolId,
    containers: Vec<Vec<SymbolId>>,
    callables: AHashMap<SymbolId, OverloadList>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            entries: vec![
                SymbolEntry {
                    name: "<null>".to_owned(),
                    id: NULL_SYMBOL,
                    storage: StorageType::Invalid,
                    value: 0,
                    size: 0,
                    usages: 0,
                },
                SymbolEntry {
                    name: "<entry>".to_owned(),
                    id: ENTRY_SYMBOL,
                    storage: StorageType::Label,
                    value: 0,
                    size: 0,
                    usages: 0,
                },
            ],
            counter: 2,
            containers: vec![],
            callables: AHashMap::new(),
        }
    }

    /// Hands out the next fresh id. Also used for bare code labels, which
    /// never get a table entry.
    pub fn next_id(&mut self) -> SymbolId {
        let id = self.counter;
        self.counter += 1;
        id
    }

    /// Registers an entry; its id must be the next table slot.
    ///
    /// Labels allocated during lowering come after every registration, so
    /// a mismatch here means a resolver bug, not bad input.
    pub fn add(&mut self, entry: SymbolEntry) -> Result<(), CompileError> {
        if entry.id as usize != self.entries.len() {
            return Err(CompileError::lowering(format!(
                "registered symbol id does not match expected value: got {}, expected {}",
                entry.id,
                self.entries.len()
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Direct entry access without alias chasing.
    pub fn entry(&self, id: SymbolId) -> &SymbolEntry {
        &self.entries[id as usize]
    }

    /// Looks up an entry, chasing alias chains and counting the usage.
    ///
    /// Alias cycles are fatal.
    pub fn resolve(&mut self, id: SymbolId, position: Position) -> Result<SymbolEntry, CompileError> {
        let mut seen = AHashSet::new();
        let mut i = id;
        while self.entries[i as usize].storage == StorageType::Alias {
            if !seen.insert(i) {
                return Err(CompileError::semantic(
                    format!("circular alias definition: {}", self.entries[id as usize].name),
                    position,
                ));
            }
            i = self.entries[i as usize].value as SymbolId;
        }
        self.entries[i as usize].usages += 1;
        Ok(self.entries[i as usize].clone())
    }

    /// Declares `name` in `scope` with a fresh id and registers its entry.
    pub fn declare(
        &mut self,
        name: &str,
        scope: &mut ScopeMap,
        storage: StorageType,
        value: i32,
        size: u32,
        position: Position,
    ) -> Result<SymbolId, CompileError> {
        if scope.contains_key(name) {
            return Err(CompileError::semantic(
                format!("redeclared symbol: {name}"),
                position,
            ));
        }
        let id = self.next_id();
        scope.insert(name.to_owned(), id);
        self.add(SymbolEntry {
            name: name.to_owned(),
            id,
            storage,
            value,
            size,
            usages: 0,
        })?;
        Ok(id)
    }

    /// Declares every intrinsic into `scope`, in table order.
    pub fn load_intrinsics(&mut self, scope: &mut ScopeMap) -> Result<(), CompileError> {
        for (index, intrinsic) in INTRINSICS.iter().enumerate() {
            self.declare(
                intrinsic.name,
                scope,
                StorageType::Intrinsic,
                index as i32,
                0,
                Position::default(),
            )?;
        }
        Ok(())
    }

    /// Overwrites a symbol's value; used when alias targets and container
    /// offsets become known.
    pub fn set_value(&mut self, id: SymbolId, value: i32) {
        self.entries[id as usize].value = value;
    }

    /// Opens a new storage container (a function frame or field layout).
    pub fn open_container(&mut self) {
        self.containers.push(vec![]);
    }

    /// Adds a symbol to the innermost open container.
    pub fn add_to_container(&mut self, id: SymbolId) {
        self.containers
            .last_mut()
            .expect("no open container")
            .push(id);
    }

    /// Assigns each member of the innermost container its cumulative
    /// offset, closes the container, and returns the total size.
    pub fn resolve_container(&mut self) -> u32 {
        let members = self.containers.pop().expect("no open container");
        let mut position = 0u32;
        for id in members {
            self.entries[id as usize].value = position as i32;
            position += self.entries[id as usize].size;
        }
        position
    }

    /// Records an overload member under a `Callable` symbol.
    pub fn add_overload(&mut self, callable: SymbolId, member: CallableMember) {
        self.callables.entry(callable).or_default().push(member);
    }

    /// The overload members of a `Callable` symbol.
    pub fn overloads(&self, callable: SymbolId) -> &[CallableMember] {
        self.callables.get(&callable).map_or(&[], |list| list)
    }

    /// One line per entry: id, name, storage, signed value, usage count.
    pub fn dump(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "{:>6}: {} of type {} with value {} ({} usages)",
                entry.id, entry.name, entry.storage, entry.value, entry.usages
            );
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.entries.iter()
    }
}

/// Resolves a name against the three scope layers; failure is fatal.
pub fn lookup_symbol(
    name: &str,
    scopes: &ScopeTracker,
    position: Position,
) -> Result<SymbolId, CompileError> {
    scopes
        .lookup(name)
        .ok_or_else(|| CompileError::semantic(format!("undeclared symbol: {name}"), position))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ids_are_seeded() {
        let table = SymbolTable::new();
        assert_eq!(table.entry(NULL_SYMBOL).storage, StorageType::Invalid);
        assert_eq!(table.entry(ENTRY_SYMBOL).storage, StorageType::Label);
    }

    #[test]
    fn declare_rejects_redeclaration() {
        let mut table = SymbolTable::new();
        let mut scope = ScopeMap::new();
        table
            .declare("x", &mut scope, StorageType::Relative, 0, 1, Position::default())
            .unwrap();
        let err = table
            .declare("x", &mut scope, StorageType::Relative, 0, 1, Position::default())
            .unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn container_offsets_accumulate_by_size() {
        let mut table = SymbolTable::new();
        let mut scope = ScopeMap::new();
        table.open_container();
        for (name, size) in [("a", 1), ("buf", 4), ("b", 1)] {
            let id = table
                .declare(name, &mut scope, StorageType::Relative, 0, size, Position::default())
                .unwrap();
            table.add_to_container(id);
        }
        assert_eq!(table.resolve_container(), 6);
        assert_eq!(table.entry(scope["a"]).value, 0);
        assert_eq!(table.entry(scope["buf"]).value, 1);
        assert_eq!(table.entry(scope["b"]).value, 5);
    }

    #[test]
    fn alias_chains_resolve_and_cycles_fail() {
        let mut table = SymbolTable::new();
        let mut scope = ScopeMap::new();
        let target = table
            .declare("target", &mut scope, StorageType::Relative, 7, 1, Position::default())
            .unwrap();
        let first = table
            .declare("first", &mut scope, StorageType::Alias, target as i32, 0, Position::default())
            .unwrap();
        let second = table
            .declare("second", &mut scope, StorageType::Alias, first as i32, 0, Position::default())
            .unwrap();

        let entry = table.resolve(second, Position::default()).unwrap();
        assert_eq!(entry.id, target);
        assert_eq!(entry.value, 7);
        assert_eq!(table.entry(target).usages, 1);

        table.set_value(target, first as i32);
        table.entries[target as usize].storage = StorageType::Alias;
        assert!(table.resolve(second, Position::default()).is_err());
    }

    #[test]
    fn scope_lookup_order_is_current_enclosing_global() {
        let mut scopes = ScopeTracker::default();
        scopes.global.insert("x".to_owned(), 10);
        scopes.enclosing.insert("x".to_owned(), 20);
        scopes.current.insert("x".to_owned(), 30);
        assert_eq!(scopes.lookup("x"), Some(30));
        scopes.current.clear();
        assert_eq!(scopes.lookup("x"), Some(20));
        scopes.enclosing.clear();
        assert_eq!(scopes.lookup("x"), Some(10));
        assert_eq!(scopes.lookup("y"), None);
    }

    #[test]
    fn intrinsic_table_order_is_fixed() {
        assert_eq!(INTRINSICS[0].name, "__exit__");
        assert_eq!(INTRINSICS[2].name, "__getc__");
        assert_eq!(INTRINSICS[2].n_args, 0);
        assert_eq!(INTRINSICS[12].name, "__ile__");

        let mut table = SymbolTable::new();
        let mut scope = ScopeMap::new();
        table.load_intrinsics(&mut scope).unwrap();
        let entry = table.entry(scope["__imul__"]);
        assert_eq!(entry.storage, StorageType::Intrinsic);
        assert_eq!(entry.value, 7);
    }
}
