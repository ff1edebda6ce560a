//! The abstract syntax tree.
//!
//! Nodes are a tagged variant; each node exclusively owns its children.
//! Every node carries its defining token, a symbol id slot stamped during
//! resolution (0 = unset), and an optional type annotation filled in by the
//! type pass.

use crate::{
    symbol::SymbolId,
    token::{Token, TokenKind},
    types::TypeExpr,
};

/// A formal parameter of a callable.
///
/// `writeback` is only legal on the first parameter of an `inline`
/// declaration; `id` is assigned during local resolution.
#[derive(Debug, Clone)]
pub struct Param {
    pub token: Token,
    pub writeback: bool,
    pub id: SymbolId,
}

impl Param {
    pub fn new(token: Token, writeback: bool) -> Self {
        Self {
            token,
            writeback,
            id: 0,
        }
    }
}

/// Parameter list plus return type of a callable declaration.
#[derive(Debug, Clone)]
pub struct Signature {
    pub params: Vec<Param>,
    pub ret: TypeExpr,
}

impl Signature {
    pub fn new(params: Vec<Param>, ret: TypeExpr) -> Self {
        Self { params, ret }
    }

    pub fn n_params(&self) -> u32 {
        self.params.len() as u32
    }

    /// The parameter type list used for overload matching.
    ///
    /// Parameters carry no surface type syntax, so every slot is `Any`;
    /// arity is what distinguishes overloads.
    pub fn param_types(&self) -> Vec<TypeExpr> {
        vec![TypeExpr::Any; self.params.len()]
    }
}

/// One AST node: defining token, kind-specific payload, resolved symbol id,
/// and the type annotation for expressions.
#[derive(Debug, Clone)]
pub struct Node {
    pub token: Token,
    pub kind: NodeKind,
    pub id: SymbolId,
    pub ty: Option<TypeExpr>,
}

/// Kind-specific payload of a node. The children a variant owns fix its
/// arity by construction.
#[derive(Debug, Clone)]
pub enum NodeKind {
    IntLit {
        value: i32,
    },
    BoolLit {
        value: bool,
    },
    Variable,
    /// Prefix `+ - & *`; the operator is the node's token.
    Unary {
        operand: Box<Node>,
    },
    /// Infix operator including assignment; the operator is the node's token.
    Binary {
        left: Box<Node>,
        right: Box<Node>,
    },
    Subscript {
        array: Box<Node>,
        index: Box<Node>,
    },
    Attribute {
        object: Box<Node>,
        attr: Box<Node>,
    },
    Ternary {
        cond: Box<Node>,
        if_true: Box<Node>,
        if_false: Box<Node>,
    },
    /// Call with an expression-list child holding the arguments.
    Call {
        callee: Box<Node>,
        args: Box<Node>,
    },
    ExprList {
        items: Vec<Node>,
    },
    Lambda {
        signature: Signature,
        /// Always a `Return` node wrapping the lambda expression.
        body: Box<Node>,
    },
    Function {
        ident: Token,
        signature: Signature,
        body: Box<Node>,
        /// Total size of the local frame, computed during resolution.
        frame_size: u32,
    },
    Inline {
        ident: Token,
        signature: Signature,
        body: Box<Node>,
    },
    Block {
        statements: Vec<Node>,
    },
    /// A braced statement block that opens a fresh name scope.
    ScopedBlock {
        statements: Vec<Node>,
    },
    If {
        cond: Box<Node>,
        body: Box<Node>,
    },
    IfElse {
        cond: Box<Node>,
        body: Box<Node>,
        orelse: Box<Node>,
    },
    For {
        init: Box<Node>,
        cond: Box<Node>,
        post: Box<Node>,
        body: Box<Node>,
    },
    Return {
        value: Option<Box<Node>>,
    },
    VarDecl {
        ident: Token,
        declared_type: Option<TypeExpr>,
        /// Element count expression for array declarations.
        size: Option<Box<Node>>,
        init: Option<Box<Node>>,
    },
    TypeDecl {
        ident: Token,
        like: Option<TypeExpr>,
    },
    AliasDecl {
        alias: Token,
        target: Token,
    },
    ExprStatement {
        expr: Box<Node>,
    },
    Empty,
}

impl Node {
    pub fn new(token: Token, kind: NodeKind) -> Self {
        Self {
            token,
            kind,
            id: 0,
            ty: None,
        }
    }

    /// True for expressions whose address can be taken or assigned to:
    /// variables, dereferences, subscripts, and attributes.
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            NodeKind::Variable | NodeKind::Subscript { .. } | NodeKind::Attribute { .. } => true,
            NodeKind::Unary { .. } => self.token.text == "*",
            _ => false,
        }
    }

    /// The compile-time constant value of this expression, if it has one.
    pub fn constant_value(&self) -> Option<i32> {
        match &self.kind {
            NodeKind::IntLit { value } => Some(*value),
            NodeKind::BoolLit { value } => Some(i32::from(*value)),
            _ => None,
        }
    }

    /// The argument expressions of an expression-list node.
    ///
    /// Call sites keep their arguments behind an `ExprList` child; this is
    /// the typed accessor for it.
    pub fn expr_list(&self) -> &[Node] {
        match &self.kind {
            NodeKind::ExprList { items } => items,
            _ => &[],
        }
    }

    /// All direct children, in source order. Used by the tree printer and
    /// by structural tests; the lowering passes match on the kind instead.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::IntLit { .. }
            | NodeKind::BoolLit { .. }
            | NodeKind::Variable
            | NodeKind::TypeDecl { .. }
            | NodeKind::AliasDecl { .. }
            | NodeKind::Empty => vec![],
            NodeKind::Unary { operand } => vec![operand],
            NodeKind::Binary { left, right } => vec![left, right],
            NodeKind::Subscript { array, index } => vec![array, index],
            NodeKind::Attribute { object, attr } => vec![object, attr],
            NodeKind::Ternary {
                cond,
                if_true,
                if_false,
            } => vec![cond, if_true, if_false],
            NodeKind::Call { callee, args } => vec![callee, args],
            NodeKind::ExprList { items } => items.iter().collect(),
            NodeKind::Lambda { body, .. } => vec![body],
            NodeKind::Function { body, .. } | NodeKind::Inline { body, .. } => vec![body],
            NodeKind::Block { statements } | NodeKind::ScopedBlock { statements } => {
                statements.iter().collect()
            }
            NodeKind::If { cond, body } => vec![cond, body],
            NodeKind::IfElse { cond, body, orelse } => vec![cond, body, orelse],
            NodeKind::For {
                init,
                cond,
                post,
                body,
            } => vec![init, cond, post, body],
            NodeKind::Return { value } => value.iter().map(|v| &**v).collect(),
            NodeKind::VarDecl { size, init, .. } => {
                size.iter().chain(init.iter()).map(|v| &**v).collect()
            }
            NodeKind::ExprStatement { expr } => vec![expr],
        }
    }

    /// Short description used by the tree printer.
    pub fn label(&self) -> String {
        match &self.kind {
            NodeKind::IntLit { value } => value.to_string(),
            NodeKind::BoolLit { value } => value.to_string(),
            NodeKind::Variable => self.token.text.clone(),
            NodeKind::Unary { .. } => format!("unary {}", self.token.text),
            NodeKind::Binary { .. } => self.token.text.clone(),
            NodeKind::Subscript { .. } => "subscript".to_owned(),
            NodeKind::Attribute { .. } => "attribute".to_owned(),
            NodeKind::Ternary { .. } => "ternary".to_owned(),
            NodeKind::Call { .. } => "call".to_owned(),
            NodeKind::ExprList { .. } => "<exprs>".to_owned(),
            NodeKind::Lambda { signature, .. } => format!("lambda/{}", signature.n_params()),
            NodeKind::Function {
                ident, signature, ..
            } => format!("fn {}/{}", ident.text, signature.n_params()),
            NodeKind::Inline {
                ident, signature, ..
            } => format!("inline {}/{}", ident.text, signature.n_params()),
            NodeKind::Block { .. } => "block".to_owned(),
            NodeKind::ScopedBlock { .. } => "scoped-block".to_owned(),
            NodeKind::If { .. } => "if".to_owned(),
            NodeKind::IfElse { .. } => "if-else".to_owned(),
            NodeKind::For { .. } => "for".to_owned(),
            NodeKind::Return { .. } => "return".to_owned(),
            NodeKind::VarDecl { ident, .. } => format!("var {}", ident.text),
            NodeKind::TypeDecl { ident, .. } => format!("typedef {}", ident.text),
            NodeKind::AliasDecl { alias, target } => {
                format!("alias {} for {}", alias.text, target.text)
            }
            NodeKind::ExprStatement { .. } => "expr-statement".to_owned(),
            NodeKind::Empty => "empty".to_owned(),
        }
    }

    /// True when this node is a variable reference, the only callee shape
    /// that can resolve to an overload set or intrinsic.
    pub fn is_variable(&self) -> bool {
        matches!(self.kind, NodeKind::Variable)
    }
}

/// Convenience for building an integer literal with a synthetic token.
pub fn int_lit(token: Token) -> Result<Node, crate::error::CompileError> {
    let value = token.to_int()?;
    Ok(Node::new(token, NodeKind::IntLit { value }))
}

impl Node {
    /// True when the token kind marks this node as coming from real source
    /// rather than parser synthesis.
    pub fn has_position(&self) -> bool {
        self.token.kind != TokenKind::Synthetic && self.token.kind != TokenKind::Null
    }
}
