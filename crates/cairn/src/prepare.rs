//! Name and type resolution over the AST.
//!
//! Three passes:
//! 1. a global pass declaring forward-visible names (functions, inlines,
//!    typedefs, global variables),
//! 2. a local pass resolving every identifier to a symbol id, assigning
//!    storage classes, and computing frame layouts through containers,
//! 3. a light type pass annotating expressions and selecting overloads at
//!    call sites.

use ahash::AHashMap;

use crate::{
    ast::{Node, NodeKind, Signature},
    error::CompileError,
    symbol::{
        CallableKind, CallableMember, INTRINSICS, ScopeMap, ScopeTracker, StorageType, SymbolId,
        SymbolTable, lookup_symbol,
    },
    token::Position,
    types::{TypeExpr, TypeMatch},
};

/// Output of the prepare phase: the resolved tree, the symbol table, and
/// the global scope map used to find the entry point.
#[derive(Debug)]
pub struct Prepared {
    pub root: Node,
    pub table: SymbolTable,
    pub globals: ScopeMap,
}

/// Runs all three resolution passes over a parsed tree.
pub fn prepare(mut root: Node) -> Result<Prepared, CompileError> {
    let mut table = SymbolTable::new();
    let mut globals = ScopeMap::new();
    table.load_intrinsics(&mut globals)?;

    resolve_globals(&mut root, &mut table, &mut globals)?;

    let mut scopes = ScopeTracker {
        global: globals,
        enclosing: ScopeMap::new(),
        current: ScopeMap::new(),
    };
    let mut resolver = LocalResolver {
        table: &mut table,
        in_inline: false,
    };
    resolver.resolve(&mut root, &mut scopes)?;
    let globals = scopes.global;

    let mut types = TypePass {
        table: &mut table,
        var_types: AHashMap::new(),
        ret_types: vec![],
    };
    types.resolve(&mut root)?;

    Ok(Prepared {
        root,
        table,
        globals,
    })
}

/// Pass 1: declare forward-visible global names.
fn resolve_globals(
    node: &mut Node,
    table: &mut SymbolTable,
    scope: &mut ScopeMap,
) -> Result<(), CompileError> {
    let pos = node.token.pos;
    match &mut node.kind {
        NodeKind::Block { statements } => {
            for child in statements {
                resolve_globals(child, table, scope)?;
            }
        }
        NodeKind::Function {
            ident, signature, ..
        } => {
            node.id = declare_callable(table, scope, ident, signature, CallableKind::Function)?;
        }
        NodeKind::Inline {
            ident, signature, ..
        } => {
            node.id = declare_callable(table, scope, ident, signature, CallableKind::Inline)?;
        }
        NodeKind::TypeDecl { ident, like } => {
            // `like` targets are filled in during pass 2 so typedefs may
            // reference each other forward.
            let storage = if like.is_some() {
                StorageType::Alias
            } else {
                StorageType::Invalid
            };
            node.id = table.declare(&ident.text, scope, storage, 0, 0, ident.pos)?;
        }
        NodeKind::VarDecl { ident, size, .. } => {
            let words = declared_size(size.as_deref(), pos)?;
            node.id = table.declare(&ident.text, scope, StorageType::Absolute, 0, words, ident.pos)?;
        }
        NodeKind::AliasDecl { alias, .. } => {
            node.id = table.declare(&alias.text, scope, StorageType::Alias, 0, 0, alias.pos)?;
        }
        _ => {}
    }
    Ok(())
}

/// Declares a callable overload, creating the `Callable` symbol on first
/// sight and appending a member (with its own label id) every time.
fn declare_callable(
    table: &mut SymbolTable,
    scope: &mut ScopeMap,
    ident: &crate::token::Token,
    signature: &Signature,
    kind: CallableKind,
) -> Result<SymbolId, CompileError> {
    let callable_id = match scope.get(&ident.text) {
        Some(&existing) => {
            if table.entry(existing).storage != StorageType::Callable {
                return Err(CompileError::semantic(
                    format!("redeclared symbol: {}", ident.text),
                    ident.pos,
                ));
            }
            existing
        }
        None => table.declare(&ident.text, scope, StorageType::Callable, 0, 0, ident.pos)?,
    };

    let member_id = table.next_id();
    table.add(crate::symbol::SymbolEntry {
        name: ident.text.clone(),
        id: member_id,
        storage: StorageType::Label,
        value: 0,
        size: 0,
        usages: 0,
    })?;
    table.add_overload(
        callable_id,
        CallableMember {
            id: member_id,
            kind,
            params: signature.param_types(),
            ret: signature.ret.clone(),
            writeback_first: signature.params.first().is_some_and(|p| p.writeback),
        },
    );
    Ok(member_id)
}

/// Evaluates an array size expression; absent means one word.
fn declared_size(size: Option<&Node>, pos: Position) -> Result<u32, CompileError> {
    let Some(expr) = size else {
        return Ok(1);
    };
    let value = expr.constant_value().ok_or_else(|| {
        CompileError::semantic("array size must be a constant expression", pos)
    })?;
    if value <= 0 {
        return Err(CompileError::semantic("array size must be positive", pos));
    }
    Ok(value as u32)
}

/// Pass 2: resolve identifiers, assign storage, lay out frames.
struct LocalResolver<'t> {
    table: &'t mut SymbolTable,
    in_inline: bool,
}

impl LocalResolver<'_> {
    fn resolve(&mut self, node: &mut Node, scopes: &mut ScopeTracker) -> Result<(), CompileError> {
        // Callables and declarations rebind scope state around the walk,
        // so dispatch them on whole nodes before destructuring.
        match node.kind {
            NodeKind::Function { .. } => return self.resolve_function(node, scopes),
            NodeKind::Lambda { .. } => return self.resolve_lambda(node, scopes),
            NodeKind::Inline { .. } => return self.resolve_inline(node, scopes),
            NodeKind::VarDecl { .. } => return self.resolve_var_decl(node, scopes),
            _ => {}
        }
        let pos = node.token.pos;
        match &mut node.kind {
            NodeKind::Variable => {
                node.id = lookup_symbol(&node.token.text, scopes, pos)?;
            }
            NodeKind::Unary { operand } => self.resolve(operand, scopes)?,
            NodeKind::Binary { left, right } => {
                self.resolve(left, scopes)?;
                self.resolve(right, scopes)?;
            }
            NodeKind::Subscript { array, index } => {
                self.resolve(array, scopes)?;
                self.resolve(index, scopes)?;
            }
            NodeKind::Attribute { object, .. } => {
                // The attribute name resolves against the object's type in
                // the type pass, not against lexical scope.
                self.resolve(object, scopes)?;
            }
            NodeKind::Ternary {
                cond,
                if_true,
                if_false,
            } => {
                self.resolve(cond, scopes)?;
                self.resolve(if_true, scopes)?;
                self.resolve(if_false, scopes)?;
            }
            NodeKind::Call { callee, args } => {
                self.resolve(callee, scopes)?;
                self.resolve(args, scopes)?;
            }
            NodeKind::ExprList { items } | NodeKind::Block { statements: items } => {
                for item in items {
                    self.resolve(item, scopes)?;
                }
            }
            NodeKind::ScopedBlock { statements } => {
                let saved = scopes.current.clone();
                for statement in statements {
                    self.resolve(statement, scopes)?;
                }
                scopes.current = saved;
            }
            NodeKind::If { cond, body } => {
                self.resolve(cond, scopes)?;
                self.resolve(body, scopes)?;
            }
            NodeKind::IfElse { cond, body, orelse } => {
                self.resolve(cond, scopes)?;
                self.resolve(body, scopes)?;
                self.resolve(orelse, scopes)?;
            }
            NodeKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.resolve(init, scopes)?;
                self.resolve(cond, scopes)?;
                self.resolve(post, scopes)?;
                self.resolve(body, scopes)?;
            }
            NodeKind::Return { value } => {
                if let Some(value) = value {
                    self.resolve(value, scopes)?;
                }
            }
            NodeKind::ExprStatement { expr } => self.resolve(expr, scopes)?,
            NodeKind::Function { .. }
            | NodeKind::Lambda { .. }
            | NodeKind::Inline { .. }
            | NodeKind::VarDecl { .. } => unreachable!("dispatched above"),
            NodeKind::TypeDecl { like, .. } => {
                if let Some(like) = like {
                    let target = resolve_type(like, self.table, scopes)?;
                    self.table.set_value(node.id, target as i32);
                }
            }
            NodeKind::AliasDecl { alias, target } => {
                let target_id = lookup_symbol(&target.text, scopes, target.pos)?;
                if node.id != 0 {
                    // Declared globally in pass 1; fill in the target.
                    self.table.set_value(node.id, target_id as i32);
                } else {
                    node.id = self.table.declare(
                        &alias.text,
                        &mut scopes.current,
                        StorageType::Alias,
                        target_id as i32,
                        0,
                        alias.pos,
                    )?;
                }
            }
            NodeKind::IntLit { .. } | NodeKind::BoolLit { .. } | NodeKind::Empty => {}
        }
        Ok(())
    }

    /// Resolves a callable body under a fresh empty enclosing and current
    /// scope, with parameters at offsets `-3 - n .. -4`.
    fn resolve_callable_body(
        &mut self,
        signature: &mut Signature,
        body: &mut Node,
        scopes: &mut ScopeTracker,
        with_container: bool,
    ) -> Result<u32, CompileError> {
        let mut inner = ScopeTracker {
            global: std::mem::take(&mut scopes.global),
            enclosing: ScopeMap::new(),
            current: ScopeMap::new(),
        };
        let n_params = signature.params.len() as i32;
        let mut position = -3 - n_params;
        for param in &mut signature.params {
            param.id = self.table.declare(
                &param.token.text,
                &mut inner.current,
                StorageType::Relative,
                position,
                1,
                param.token.pos,
            )?;
            position += 1;
        }
        if with_container {
            self.table.open_container();
        }
        let result = self.resolve(body, &mut inner);
        let frame_size = if with_container {
            self.table.resolve_container()
        } else {
            0
        };
        scopes.global = inner.global;
        result?;
        Ok(frame_size)
    }

    fn resolve_function(
        &mut self,
        node: &mut Node,
        scopes: &mut ScopeTracker,
    ) -> Result<(), CompileError> {
        let NodeKind::Function {
            signature,
            body,
            frame_size,
            ..
        } = &mut node.kind
        else {
            unreachable!()
        };
        *frame_size = self.resolve_callable_body(signature, body, scopes, true)?;
        Ok(())
    }

    /// Lambda bodies are single return expressions, so no container opens;
    /// the frame size is always zero.
    fn resolve_lambda(
        &mut self,
        node: &mut Node,
        scopes: &mut ScopeTracker,
    ) -> Result<(), CompileError> {
        let NodeKind::Lambda { signature, body } = &mut node.kind else {
            unreachable!()
        };
        self.resolve_callable_body(signature, body, scopes, false)?;
        Ok(())
    }

    /// Inline parameters become `InlineReference` symbols; the body is
    /// resolved once and re-serialized per call site.
    fn resolve_inline(
        &mut self,
        node: &mut Node,
        scopes: &mut ScopeTracker,
    ) -> Result<(), CompileError> {
        let NodeKind::Inline {
            signature, body, ..
        } = &mut node.kind
        else {
            unreachable!()
        };
        let mut inner = ScopeTracker {
            global: std::mem::take(&mut scopes.global),
            enclosing: ScopeMap::new(),
            current: ScopeMap::new(),
        };
        for param in &mut signature.params {
            param.id = self.table.declare(
                &param.token.text,
                &mut inner.current,
                StorageType::InlineReference,
                0,
                0,
                param.token.pos,
            )?;
        }
        let was_inline = std::mem::replace(&mut self.in_inline, true);
        let result = self.resolve(body, &mut inner);
        self.in_inline = was_inline;
        scopes.global = inner.global;
        result
    }

    fn resolve_var_decl(
        &mut self,
        node: &mut Node,
        scopes: &mut ScopeTracker,
    ) -> Result<(), CompileError> {
        let pos = node.token.pos;
        let already_global = node.id != 0;
        let NodeKind::VarDecl {
            ident,
            declared_type,
            size,
            init,
        } = &mut node.kind
        else {
            unreachable!()
        };
        if !already_global {
            if self.in_inline {
                return Err(CompileError::semantic(
                    "declarations are not supported in inline bodies",
                    pos,
                ));
            }
            let words = declared_size(size.as_deref(), pos)?;
            let id = self.table.declare(
                &ident.text,
                &mut scopes.current,
                StorageType::Relative,
                0,
                words,
                ident.pos,
            )?;
            node.id = id;
            self.table.add_to_container(id);
        }
        if let Some(declared_type) = declared_type {
            resolve_type(declared_type, self.table, scopes)?;
        }
        if let Some(size) = size {
            self.resolve(size, scopes)?;
        }
        // The declaration is already in scope: initializers may refer to
        // the declared name (and to anything declared before it).
        if let Some(init) = init {
            self.resolve(init, scopes)?;
        }
        Ok(())
    }
}

/// Resolves a named type to its canonical symbol id (chasing `like`
/// aliases) and stamps it into the type expression.
fn resolve_type(
    ty: &mut TypeExpr,
    table: &mut SymbolTable,
    scopes: &ScopeTracker,
) -> Result<SymbolId, CompileError> {
    match ty {
        TypeExpr::Named { token, id } => {
            let found = lookup_symbol(&token.text, scopes, token.pos)?;
            let entry = table.resolve(found, token.pos)?;
            if entry.storage != StorageType::Invalid {
                return Err(CompileError::semantic(
                    format!("not a type: {}", token.text),
                    token.pos,
                ));
            }
            *id = entry.id;
            Ok(entry.id)
        }
        TypeExpr::Any => Ok(0),
        TypeExpr::List(items) => {
            for item in items {
                resolve_type(item, table, scopes)?;
            }
            Ok(0)
        }
        TypeExpr::Callable { params, ret } => {
            for param in params {
                resolve_type(param, table, scopes)?;
            }
            resolve_type(ret, table, scopes)?;
            Ok(0)
        }
    }
}

/// Pass 3: annotate expression types, verify agreement, select overloads.
struct TypePass<'t> {
    table: &'t mut SymbolTable,
    /// Declared types of variables, by symbol id.
    var_types: AHashMap<SymbolId, TypeExpr>,
    /// Stack of enclosing callable return types.
    ret_types: Vec<TypeExpr>,
}

impl TypePass<'_> {
    /// Resolves a node, returning its type (statements are `Any`).
    fn resolve(&mut self, node: &mut Node) -> Result<TypeExpr, CompileError> {
        if matches!(node.kind, NodeKind::Call { .. }) {
            let ty = self.resolve_call(node)?;
            node.ty = Some(ty.clone());
            return Ok(ty);
        }
        let pos = node.token.pos;
        let op = node.token.text.clone();
        let id = node.id;
        let ty = match &mut node.kind {
            NodeKind::IntLit { .. } | NodeKind::BoolLit { .. } => TypeExpr::Any,
            NodeKind::Variable => {
                let entry = self.table.resolve(id, pos)?;
                self.var_types.get(&entry.id).cloned().unwrap_or(TypeExpr::Any)
            }
            NodeKind::Unary { operand } => {
                let operand_ty = self.resolve(operand)?;
                match op.as_str() {
                    "&" | "*" => TypeExpr::Any,
                    _ => operand_ty,
                }
            }
            NodeKind::Binary { left, right } => {
                let left_ty = self.resolve(left)?;
                let right_ty = self.resolve(right)?;
                if left_ty.matching(&right_ty) == TypeMatch::NoMatch {
                    return Err(CompileError::semantic(
                        format!("operand types disagree: {left_ty} vs {right_ty}"),
                        pos,
                    ));
                }
                if op == "=" { right_ty } else { merged(left_ty, right_ty) }
            }
            NodeKind::Subscript { array, index } => {
                self.resolve(array)?;
                self.resolve(index)?;
                TypeExpr::Any
            }
            NodeKind::Attribute { object, attr } => {
                let object_ty = self.resolve(object)?;
                return Err(CompileError::semantic(
                    format!(
                        "type {object_ty} has no attribute {}",
                        attr.token.text
                    ),
                    pos,
                ));
            }
            NodeKind::Ternary {
                cond,
                if_true,
                if_false,
            } => {
                self.resolve(cond)?;
                let true_ty = self.resolve(if_true)?;
                let false_ty = self.resolve(if_false)?;
                if true_ty.matching(&false_ty) == TypeMatch::NoMatch {
                    return Err(CompileError::semantic(
                        format!("ternary branches disagree: {true_ty} vs {false_ty}"),
                        pos,
                    ));
                }
                merged(true_ty, false_ty)
            }
            NodeKind::Call { .. } => unreachable!("dispatched above"),
            NodeKind::ExprList { items }
            | NodeKind::Block { statements: items }
            | NodeKind::ScopedBlock { statements: items } => {
                for item in items {
                    self.resolve(item)?;
                }
                TypeExpr::Any
            }
            NodeKind::Lambda { signature, body } => {
                let ty = TypeExpr::Callable {
                    params: signature.param_types(),
                    ret: Box::new(signature.ret.clone()),
                };
                self.ret_types.push(signature.ret.clone());
                let result = self.resolve(body);
                self.ret_types.pop();
                result?;
                ty
            }
            NodeKind::Function {
                signature, body, ..
            }
            | NodeKind::Inline {
                signature, body, ..
            } => {
                self.ret_types.push(signature.ret.clone());
                let result = self.resolve(body);
                self.ret_types.pop();
                result?;
                TypeExpr::Any
            }
            NodeKind::If { cond, body } => {
                self.resolve(cond)?;
                self.resolve(body)?;
                TypeExpr::Any
            }
            NodeKind::IfElse { cond, body, orelse } => {
                self.resolve(cond)?;
                self.resolve(body)?;
                self.resolve(orelse)?;
                TypeExpr::Any
            }
            NodeKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.resolve(init)?;
                self.resolve(cond)?;
                self.resolve(post)?;
                self.resolve(body)?;
                TypeExpr::Any
            }
            NodeKind::Return { value } => {
                if let Some(value) = value {
                    let value_ty = self.resolve(value)?;
                    if let Some(expected) = self.ret_types.last()
                        && expected.matching(&value_ty) == TypeMatch::NoMatch
                    {
                        return Err(CompileError::semantic(
                            format!("return type disagrees: expected {expected}, got {value_ty}"),
                            pos,
                        ));
                    }
                }
                TypeExpr::Any
            }
            NodeKind::VarDecl {
                declared_type,
                init,
                ..
            } => {
                let declared = declared_type.clone();
                if let Some(declared) = &declared {
                    self.var_types.insert(id, declared.clone());
                }
                if let Some(init) = init {
                    let init_ty = self.resolve(init)?;
                    if let Some(declared) = &declared
                        && declared.matching(&init_ty) == TypeMatch::NoMatch
                    {
                        return Err(CompileError::semantic(
                            format!("initializer type disagrees: {declared} vs {init_ty}"),
                            pos,
                        ));
                    }
                }
                TypeExpr::Any
            }
            NodeKind::ExprStatement { expr } => {
                self.resolve(expr)?;
                TypeExpr::Any
            }
            NodeKind::TypeDecl { .. } | NodeKind::AliasDecl { .. } | NodeKind::Empty => {
                TypeExpr::Any
            }
        };
        node.ty = Some(ty.clone());
        Ok(ty)
    }

    /// Types a call site; for overloaded callees this is where the member
    /// is selected and stamped on the call node.
    fn resolve_call(&mut self, node: &mut Node) -> Result<TypeExpr, CompileError> {
        let pos = node.token.pos;
        let NodeKind::Call { callee, args } = &mut node.kind else {
            unreachable!()
        };
        let NodeKind::ExprList { items } = &mut args.kind else {
            unreachable!()
        };
        let mut arg_types = Vec::with_capacity(items.len());
        for item in items.iter_mut() {
            arg_types.push(self.resolve(item)?);
        }

        if callee.is_variable() {
            let entry = self.table.resolve(callee.id, callee.token.pos)?;
            match entry.storage {
                StorageType::Intrinsic => {
                    let intrinsic = INTRINSICS[entry.value as usize];
                    if arg_types.len() != intrinsic.n_args as usize {
                        return Err(CompileError::semantic(
                            format!(
                                "{} takes {} arguments, got {}",
                                intrinsic.name,
                                intrinsic.n_args,
                                arg_types.len()
                            ),
                            pos,
                        ));
                    }
                    return Ok(TypeExpr::Any);
                }
                StorageType::Callable => {
                    let member = select_overload(
                        self.table.overloads(entry.id),
                        &arg_types,
                        &entry.name,
                        pos,
                    )?;
                    node.id = member.id;
                    return Ok(member.ret);
                }
                _ => {
                    self.resolve(callee)?;
                    return Ok(TypeExpr::Any);
                }
            }
        }
        self.resolve(callee)?;
        Ok(TypeExpr::Any)
    }
}

/// Merges the types of two agreeing operands: exact named matches keep the
/// name, anything weaker degrades to `Any`.
fn merged(left: TypeExpr, right: TypeExpr) -> TypeExpr {
    if left.matching(&right) == TypeMatch::ExactMatch {
        left
    } else {
        TypeExpr::Any
    }
}

/// Selects the overload for an argument list: one exact match wins over
/// any-matches, and a tie within the winning tier is fatal.
fn select_overload(
    members: &[CallableMember],
    arg_types: &[TypeExpr],
    name: &str,
    pos: Position,
) -> Result<CallableMember, CompileError> {
    let mut exact: Option<&CallableMember> = None;
    let mut any: Option<&CallableMember> = None;
    let mut exact_count = 0usize;
    let mut any_count = 0usize;
    for member in members {
        match TypeExpr::match_lists(arg_types, &member.params) {
            TypeMatch::ExactMatch => {
                exact = Some(member);
                exact_count += 1;
            }
            TypeMatch::AnyMatch => {
                any = Some(member);
                any_count += 1;
            }
            TypeMatch::NoMatch => {}
        }
    }
    let (winner, count) = if exact_count > 0 {
        (exact, exact_count)
    } else {
        (any, any_count)
    };
    match (winner, count) {
        (Some(member), 1) => Ok(member.clone()),
        (Some(_), _) => Err(CompileError::semantic(
            format!("ambiguous call to {name}"),
            pos,
        )),
        (None, _) => Err(CompileError::semantic(
            format!("no matching overload for {name}"),
            pos,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{NoIncludes, parse};

    fn prepared(source: &str) -> Prepared {
        prepare(parse(source, &NoIncludes).unwrap()).expect("prepare should succeed")
    }

    fn prepare_err(source: &str) -> CompileError {
        prepare(parse(source, &NoIncludes).unwrap()).expect_err("prepare should fail")
    }

    #[test]
    fn parameters_get_negative_offsets() {
        let p = prepared("fn f(a, b) { return a; } fn main() { return f(1, 2); }");
        let f = &p.root.children()[0];
        let NodeKind::Function { signature, .. } = &f.kind else {
            panic!()
        };
        assert_eq!(p.table.entry(signature.params[0].id).value, -5);
        assert_eq!(p.table.entry(signature.params[1].id).value, -4);
        assert_eq!(
            p.table.entry(signature.params[0].id).storage,
            StorageType::Relative
        );
    }

    #[test]
    fn locals_are_laid_out_from_zero() {
        let p = prepared("fn main() { var a = 1; var buf[3]; var b = 2; return b; }");
        let NodeKind::Function { frame_size, body, .. } = &p.root.children()[0].kind else {
            panic!()
        };
        assert_eq!(*frame_size, 5);
        let decls = body.children();
        assert_eq!(p.table.entry(decls[0].id).value, 0);
        assert_eq!(p.table.entry(decls[1].id).value, 1);
        assert_eq!(p.table.entry(decls[2].id).value, 4);
    }

    #[test]
    fn every_identifier_gets_a_symbol_id() {
        let p = prepared("fn main() { var x = 1; return x; }");
        fn check(node: &Node) {
            if matches!(node.kind, NodeKind::Variable) {
                assert_ne!(node.id, 0, "unresolved identifier {}", node.token.text);
            }
            for child in node.children() {
                check(child);
            }
        }
        check(&p.root);
    }

    #[test]
    fn undeclared_symbol_is_fatal() {
        let err = prepare_err("fn main() { return y; }");
        assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
    }

    #[test]
    fn scoped_blocks_hide_their_names() {
        let err = prepare_err("fn main() { { var x = 1; } return x; }");
        assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
        // frame still reserves the slot
        let p = prepared("fn main() { { var x = 1; } var y = 2; return y; }");
        let NodeKind::Function { frame_size, .. } = &p.root.children()[0].kind else {
            panic!()
        };
        assert_eq!(*frame_size, 2);
    }

    #[test]
    fn forward_references_between_functions_work() {
        prepared("fn even(n) { return n == 0 || odd(n - 1); } fn odd(n) { return n != 0 && even(n - 1); } fn main() { return even(4); }");
    }

    #[test]
    fn overloads_select_by_arity() {
        let p = prepared("fn f(a) { return a; } fn f(a, b) { return a + b; } fn main() { return f(1) + f(1, 2); }");
        let callable_id = p.globals["f"];
        assert_eq!(p.table.overloads(callable_id).len(), 2);
    }

    #[test]
    fn same_arity_overloads_are_ambiguous_at_call() {
        let err = prepare_err(
            "fn f(a) { return a; } fn f(b) { return b; } fn main() { return f(1); }",
        );
        assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
    }

    #[test]
    fn alias_resolves_to_target() {
        let p = prepared("fn main() { var x = 1; alias y for x; return y; }");
        let NodeKind::Function { body, .. } = &p.root.children()[0].kind else {
            panic!()
        };
        let ret = body.children().last().unwrap().children()[0].id;
        let mut table = p.table;
        let entry = table.resolve(ret, Position::default()).unwrap();
        assert_eq!(entry.storage, StorageType::Relative);
    }

    #[test]
    fn intrinsic_arity_is_checked() {
        let err = prepare_err("fn main() { __iadd__(1); }");
        assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
    }

    #[test]
    fn inline_bodies_reject_declarations() {
        let err = prepare_err("inline f(x) { var y = x; } fn main() { f(1); }");
        assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
    }

    #[test]
    fn typedef_like_chains_to_canonical_type() {
        let p = prepared(
            "typedef word; typedef cell like word; fn main() { var a: word = 1; var b: cell = a; return b; }",
        );
        let NodeKind::Function { body, .. } = &p.root.children()[2].kind else {
            panic!()
        };
        let decls = body.children();
        let NodeKind::VarDecl { declared_type: Some(TypeExpr::Named { id: a_id, .. }), .. } =
            &decls[0].kind
        else {
            panic!()
        };
        let NodeKind::VarDecl { declared_type: Some(TypeExpr::Named { id: b_id, .. }), .. } =
            &decls[1].kind
        else {
            panic!()
        };
        assert_eq!(a_id, b_id, "like-alias should share the canonical id");
    }

    #[test]
    fn mismatched_named_types_are_rejected() {
        let err = prepare_err(
            "typedef word; typedef other; fn main() { var a: word = 1; var b: other = 2; b = a; }",
        );
        assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
    }
}
