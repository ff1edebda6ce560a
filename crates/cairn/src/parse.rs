//! The recursive-descent parser.
//!
//! Builds the heterogeneous AST from a stack of scanners. `include`
//! directives push a scanner for the referenced file; the token stream
//! continues from the topmost scanner and pops on end of file until only
//! the root scanner remains. Each file is included at most once.

use std::path::PathBuf;

use ahash::AHashSet;

use crate::{
    ast::{Node, NodeKind, Param, Signature, int_lit},
    error::CompileError,
    scanner::Scanner,
    token::{Token, TokenKind},
    types::TypeExpr,
};

/// Resolves `include` names to source text.
///
/// Returns `(canonical key, text)`; the key feeds the include-once set, so
/// two spellings of the same file must produce the same key.
pub trait SourceLoader {
    fn load(&self, name: &str) -> Result<(String, String), String>;
}

/// Loads `<name>.cairn` relative to a root directory.
#[derive(Debug, Clone)]
pub struct DiskLoader {
    root: PathBuf,
}

impl DiskLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceLoader for DiskLoader {
    fn load(&self, name: &str) -> Result<(String, String), String> {
        let path = self.root.join(format!("{name}.cairn"));
        let key = path
            .canonicalize()
            .unwrap_or_else(|_| path.clone())
            .to_string_lossy()
            .into_owned();
        let text = std::fs::read_to_string(&path)
            .map_err(|err| format!("could not read {}: {err}", path.display()))?;
        Ok((key, text))
    }
}

/// In-memory loader for tests and embedded use.
#[derive(Debug, Default, Clone)]
pub struct MapLoader {
    files: ahash::AHashMap<String, String>,
}

impl MapLoader {
    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.files.insert(name.to_owned(), text.to_owned());
        self
    }
}

impl SourceLoader for MapLoader {
    fn load(&self, name: &str) -> Result<(String, String), String> {
        self.files
            .get(name)
            .map(|text| (name.to_owned(), text.clone()))
            .ok_or_else(|| format!("unknown include: {name}"))
    }
}

/// Loader that rejects every include.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIncludes;

impl SourceLoader for NoIncludes {
    fn load(&self, name: &str) -> Result<(String, String), String> {
        Err(format!("includes are not available here: {name}"))
    }
}

/// Parses one source file (plus its includes) into an owned AST root.
pub fn parse(source: &str, loader: &dyn SourceLoader) -> Result<Node, CompileError> {
    Parser::new(source, loader)?.parse()
}

struct Parser<'a> {
    scanners: Vec<Scanner>,
    curr: Token,
    loader: &'a dyn SourceLoader,
    included: AHashSet<String>,
}

impl<'a> Parser<'a> {
    fn new(source: &str, loader: &'a dyn SourceLoader) -> Result<Self, CompileError> {
        let mut parser = Self {
            scanners: vec![Scanner::new(source)],
            curr: Token::null(),
            loader,
            included: AHashSet::new(),
        };
        parser.advance()?;
        Ok(parser)
    }

    fn parse(mut self) -> Result<Node, CompileError> {
        let root = self.parse_filebody()?;
        if self.curr.kind != TokenKind::EndOfFile {
            return Err(CompileError::syntax(
                format!("unexpected token: {}", self.curr),
                self.curr.pos,
            ));
        }
        Ok(root)
    }

    /// Advances to the next token, popping finished include scanners.
    fn advance(&mut self) -> Result<(), CompileError> {
        loop {
            let token = self
                .scanners
                .last_mut()
                .expect("scanner stack is never empty")
                .get_token()?;
            if token.kind == TokenKind::EndOfFile && self.scanners.len() > 1 {
                self.scanners.pop();
                continue;
            }
            self.curr = token;
            return Ok(());
        }
    }

    fn expect_data(&mut self, data: &str) -> Result<Token, CompileError> {
        if self.curr.text != data {
            return Err(CompileError::syntax(
                format!("expected '{data}', got {}", self.curr),
                self.curr.pos,
            ));
        }
        let token = std::mem::replace(&mut self.curr, Token::null());
        self.advance()?;
        Ok(token)
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Result<Token, CompileError> {
        if self.curr.kind != kind {
            return Err(CompileError::syntax(
                format!("expected {kind}, got {}", self.curr),
                self.curr.pos,
            ));
        }
        let token = std::mem::replace(&mut self.curr, Token::null());
        self.advance()?;
        Ok(token)
    }

    fn accept_data(&mut self, data: &str) -> Result<Option<Token>, CompileError> {
        if self.curr.text == data {
            let token = std::mem::replace(&mut self.curr, Token::null());
            self.advance()?;
            return Ok(Some(token));
        }
        Ok(None)
    }

    fn accept_kind(&mut self, kind: TokenKind) -> Result<Option<Token>, CompileError> {
        if self.curr.kind == kind {
            let token = std::mem::replace(&mut self.curr, Token::null());
            self.advance()?;
            return Ok(Some(token));
        }
        Ok(None)
    }

    fn parse_filebody(&mut self) -> Result<Node, CompileError> {
        let mut nodes = vec![];
        while self.curr.kind != TokenKind::EndOfFile {
            if let Some(node) = self.parse_top()? {
                nodes.push(node);
            }
        }
        Ok(Node::new(
            Token::synthetic("<file>"),
            NodeKind::Block { statements: nodes },
        ))
    }

    /// One top-level item; `include` yields no node.
    fn parse_top(&mut self) -> Result<Option<Node>, CompileError> {
        match self.curr.kind {
            TokenKind::Function => self.parse_function().map(Some),
            TokenKind::Inline => self.parse_inline().map(Some),
            TokenKind::TypeDef => {
                let node = self.parse_typedef()?;
                self.expect_data(";")?;
                Ok(Some(node))
            }
            TokenKind::Include => {
                self.parse_include()?;
                Ok(None)
            }
            TokenKind::Alias => {
                let node = self.parse_alias()?;
                self.expect_data(";")?;
                Ok(Some(node))
            }
            TokenKind::Var => {
                let node = self.parse_var_decl()?;
                self.expect_data(";")?;
                Ok(Some(node))
            }
            _ => Err(CompileError::syntax(
                format!("expected declaration, got {}", self.curr),
                self.curr.pos,
            )),
        }
    }

    /// `include name;` — pushes a scanner for the referenced file.
    ///
    /// The new scanner must be in place before the token after `;` is
    /// read, so the terminator is checked without the usual advance.
    fn parse_include(&mut self) -> Result<(), CompileError> {
        let include = self.expect_kind(TokenKind::Include)?;
        let name = self.expect_kind(TokenKind::Identifier)?;
        if self.curr.text != ";" {
            return Err(CompileError::syntax(
                format!("expected ';', got {}", self.curr),
                self.curr.pos,
            ));
        }
        let (key, text) = self
            .loader
            .load(&name.text)
            .map_err(|msg| CompileError::syntax(msg, include.pos))?;
        if self.included.insert(key) {
            self.scanners.push(Scanner::new(&text));
        }
        self.advance()
    }

    fn parse_function(&mut self) -> Result<Node, CompileError> {
        let fn_token = self.expect_kind(TokenKind::Function)?;
        let ident = self.expect_kind(TokenKind::Identifier)?;
        self.expect_data("(")?;
        let params = self.parse_param_declaration(")", false)?;
        let ret = self.parse_return_type()?;
        let body = self.parse_braced_block(false)?;
        Ok(Node::new(
            fn_token,
            NodeKind::Function {
                ident,
                signature: Signature::new(params, ret),
                body: Box::new(body),
                frame_size: 0,
            },
        ))
    }

    fn parse_inline(&mut self) -> Result<Node, CompileError> {
        let inline_token = self.expect_kind(TokenKind::Inline)?;
        let ident = self.expect_kind(TokenKind::Identifier)?;
        self.expect_data("(")?;
        let params = self.parse_param_declaration(")", true)?;
        let ret = self.parse_return_type()?;
        let body = self.parse_braced_block(false)?;
        Ok(Node::new(
            inline_token,
            NodeKind::Inline {
                ident,
                signature: Signature::new(params, ret),
                body: Box::new(body),
            },
        ))
    }

    /// An optional return type between the parameter list and the body.
    fn parse_return_type(&mut self) -> Result<TypeExpr, CompileError> {
        if self.curr.kind == TokenKind::Identifier {
            return self.parse_type();
        }
        Ok(TypeExpr::Any)
    }

    fn parse_type(&mut self) -> Result<TypeExpr, CompileError> {
        let ident = self.expect_kind(TokenKind::Identifier)?;
        Ok(TypeExpr::named(ident))
    }

    /// Parameter declarations up to (and consuming) `end`.
    ///
    /// `writeback` is accepted only for inline declarations and only on
    /// the first parameter.
    fn parse_param_declaration(
        &mut self,
        end: &str,
        allow_writeback: bool,
    ) -> Result<Vec<Param>, CompileError> {
        let mut params = vec![];
        if self.accept_data(end)?.is_some() {
            return Ok(params);
        }
        loop {
            let writeback = self.accept_kind(TokenKind::Writeback)?;
            if let Some(wb) = &writeback {
                if !allow_writeback {
                    return Err(CompileError::syntax(
                        "writeback is only supported in inline declarations",
                        wb.pos,
                    ));
                }
                if !params.is_empty() {
                    return Err(CompileError::syntax(
                        "writeback is only supported on the first parameter",
                        wb.pos,
                    ));
                }
            }
            let ident = self.expect_kind(TokenKind::Identifier)?;
            params.push(Param::new(ident, writeback.is_some()));
            if self.accept_data(",")?.is_none() {
                self.expect_data(end)?;
                return Ok(params);
            }
        }
    }

    fn parse_braced_block(&mut self, is_scope: bool) -> Result<Node, CompileError> {
        let brace = self.expect_data("{")?;
        let mut statements = vec![];
        while self.curr.text != "}" {
            if self.curr.kind == TokenKind::EndOfFile {
                return Err(CompileError::syntax("unexpected end of file", self.curr.pos));
            }
            statements.push(self.parse_statement()?);
        }
        self.advance()?;
        let kind = if is_scope {
            NodeKind::ScopedBlock { statements }
        } else {
            NodeKind::Block { statements }
        };
        Ok(Node::new(brace, kind))
    }

    fn parse_statement(&mut self) -> Result<Node, CompileError> {
        match self.curr.kind {
            TokenKind::If => self.parse_if_else(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => {
                let token = self.expect_kind(TokenKind::Return)?;
                let value = if self.curr.text == ";" {
                    None
                } else {
                    Some(Box::new(self.parse_expression()?))
                };
                self.expect_data(";")?;
                Ok(Node::new(token, NodeKind::Return { value }))
            }
            TokenKind::Var => {
                let node = self.parse_var_decl()?;
                self.expect_data(";")?;
                Ok(node)
            }
            TokenKind::Alias => {
                let node = self.parse_alias()?;
                self.expect_data(";")?;
                Ok(node)
            }
            _ if self.curr.text == "{" => self.parse_braced_block(true),
            _ if self.curr.text == ";" => {
                let token = self.expect_data(";")?;
                Ok(Node::new(token, NodeKind::Empty))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect_data(";")?;
                Ok(Node::new(
                    Token::synthetic("<expr>"),
                    NodeKind::ExprStatement {
                        expr: Box::new(expr),
                    },
                ))
            }
        }
    }

    fn parse_if_else(&mut self) -> Result<Node, CompileError> {
        let token = self.expect_kind(TokenKind::If)?;
        self.expect_data("(")?;
        let cond = self.parse_expression()?;
        self.expect_data(")")?;
        let body = self.parse_statement()?;
        if self.accept_kind(TokenKind::Else)?.is_some() {
            let orelse = self.parse_statement()?;
            return Ok(Node::new(
                token,
                NodeKind::IfElse {
                    cond: Box::new(cond),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                },
            ));
        }
        Ok(Node::new(
            token,
            NodeKind::If {
                cond: Box::new(cond),
                body: Box::new(body),
            },
        ))
    }

    fn parse_for(&mut self) -> Result<Node, CompileError> {
        let token = self.expect_kind(TokenKind::For)?;
        self.expect_data("(")?;
        let init = self.parse_expression()?;
        self.expect_data(";")?;
        let cond = self.parse_expression()?;
        self.expect_data(";")?;
        let post = self.parse_expression()?;
        self.expect_data(")")?;
        let body = self.parse_statement()?;
        Ok(Node::new(
            token,
            NodeKind::For {
                init: Box::new(statement_of(init)),
                cond: Box::new(cond),
                post: Box::new(statement_of(post)),
                body: Box::new(body),
            },
        ))
    }

    /// `while (cond) body` is the `for` lowering with empty init and post.
    fn parse_while(&mut self) -> Result<Node, CompileError> {
        let token = self.expect_kind(TokenKind::While)?;
        self.expect_data("(")?;
        let cond = self.parse_expression()?;
        self.expect_data(")")?;
        let body = self.parse_statement()?;
        Ok(Node::new(
            token,
            NodeKind::For {
                init: Box::new(empty_node()),
                cond: Box::new(cond),
                post: Box::new(empty_node()),
                body: Box::new(body),
            },
        ))
    }

    /// `var IDENT (':' type)? ('[' expr ']')? ('=' expr)? {',' ...}`
    fn parse_var_decl(&mut self) -> Result<Node, CompileError> {
        let token = self.expect_kind(TokenKind::Var)?;
        let mut nodes = vec![];
        loop {
            let ident = self.expect_kind(TokenKind::Identifier)?;
            let declared_type = if self.accept_data(":")?.is_some() {
                Some(self.parse_type()?)
            } else {
                None
            };
            let size = if self.accept_data("[")?.is_some() {
                let expr = self.parse_expression()?;
                self.expect_data("]")?;
                Some(Box::new(expr))
            } else {
                None
            };
            let init = if self.accept_data("=")?.is_some() {
                Some(Box::new(self.parse_expression()?))
            } else {
                None
            };
            nodes.push(Node::new(
                token.clone(),
                NodeKind::VarDecl {
                    ident,
                    declared_type,
                    size,
                    init,
                },
            ));
            if self.accept_data(",")?.is_none() {
                break;
            }
        }
        Ok(single_or_block(nodes))
    }

    /// `alias IDENT for IDENT {',' ...}`
    fn parse_alias(&mut self) -> Result<Node, CompileError> {
        let token = self.expect_kind(TokenKind::Alias)?;
        let mut nodes = vec![];
        loop {
            let alias = self.expect_kind(TokenKind::Identifier)?;
            self.expect_kind(TokenKind::For)?;
            let target = self.expect_kind(TokenKind::Identifier)?;
            nodes.push(Node::new(token.clone(), NodeKind::AliasDecl { alias, target }));
            if self.accept_data(",")?.is_none() {
                break;
            }
        }
        Ok(single_or_block(nodes))
    }

    /// `typedef NAME;` or `typedef NAME like TYPE;`
    fn parse_typedef(&mut self) -> Result<Node, CompileError> {
        let token = self.expect_kind(TokenKind::TypeDef)?;
        let ident = self.expect_kind(TokenKind::Identifier)?;
        let like = if self.accept_kind(TokenKind::Like)?.is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        Ok(Node::new(token, NodeKind::TypeDecl { ident, like }))
    }

    fn parse_expression(&mut self) -> Result<Node, CompileError> {
        if self.curr.kind == TokenKind::Lambda {
            return self.parse_lambda();
        }
        self.parse_assignment()
    }

    fn parse_lambda(&mut self) -> Result<Node, CompileError> {
        let token = self.expect_kind(TokenKind::Lambda)?;
        let params = self.parse_param_declaration(":", false)?;
        let expr = self.parse_expression()?;
        let body = Node::new(
            Token::synthetic("<lambda-return>"),
            NodeKind::Return {
                value: Some(Box::new(expr)),
            },
        );
        Ok(Node::new(
            token,
            NodeKind::Lambda {
                signature: Signature::new(params, TypeExpr::Any),
                body: Box::new(body),
            },
        ))
    }

    fn parse_assignment(&mut self) -> Result<Node, CompileError> {
        let left = self.parse_ternary()?;
        if let Some(token) = self.accept_data("=")? {
            if !left.is_lvalue() {
                return Err(CompileError::syntax("expected lvalue", token.pos));
            }
            let right = self.parse_expression()?;
            return Ok(Node::new(
                token,
                NodeKind::Binary {
                    left: Box::new(left),
                    right: Box::new(right),
                },
            ));
        }
        Ok(left)
    }

    fn parse_ternary(&mut self) -> Result<Node, CompileError> {
        let cond = self.parse_or()?;
        if let Some(token) = self.accept_data("?")? {
            let if_true = self.parse_expression()?;
            self.expect_data(":")?;
            let if_false = self.parse_expression()?;
            return Ok(Node::new(
                token,
                NodeKind::Ternary {
                    cond: Box::new(cond),
                    if_true: Box::new(if_true),
                    if_false: Box::new(if_false),
                },
            ));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_and()?;
        while let Some(token) = self.accept_data("||")? {
            let right = self.parse_and()?;
            left = binary(token, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_equality_1()?;
        while let Some(token) = self.accept_data("&&")? {
            let right = self.parse_equality_1()?;
            left = binary(token, left, right);
        }
        Ok(left)
    }

    fn parse_equality_1(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_equality_2()?;
        loop {
            let Some(token) = self.accept_any(&["==", "!="])? else {
                return Ok(left);
            };
            let right = self.parse_equality_2()?;
            left = binary(token, left, right);
        }
    }

    fn parse_equality_2(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_sum()?;
        loop {
            let Some(token) = self.accept_any(&["<=", ">=", "<", ">"])? else {
                return Ok(left);
            };
            let right = self.parse_sum()?;
            left = binary(token, left, right);
        }
    }

    fn parse_sum(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_term()?;
        loop {
            let Some(token) = self.accept_any(&["+", "-"])? else {
                return Ok(left);
            };
            let right = self.parse_term()?;
            left = binary(token, left, right);
        }
    }

    fn parse_term(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_value()?;
        loop {
            let Some(token) = self.accept_any(&["*", "/", "%"])? else {
                return Ok(left);
            };
            let right = self.parse_value()?;
            left = binary(token, left, right);
        }
    }

    fn accept_any(&mut self, ops: &[&str]) -> Result<Option<Token>, CompileError> {
        for op in ops {
            if let Some(token) = self.accept_data(op)? {
                return Ok(Some(token));
            }
        }
        Ok(None)
    }

    fn parse_value(&mut self) -> Result<Node, CompileError> {
        let expression = if let Some(token) = self.accept_any(&["+", "-", "&", "*"])? {
            let operand = self.parse_value()?;
            if token.text == "&" && !operand.is_lvalue() {
                return Err(CompileError::syntax("expected lvalue", token.pos));
            }
            Node::new(
                token,
                NodeKind::Unary {
                    operand: Box::new(operand),
                },
            )
        } else if let Some(token) = self.accept_kind(TokenKind::IntLit)? {
            int_lit(token)?
        } else if let Some(token) = self.accept_kind(TokenKind::True)? {
            Node::new(token, NodeKind::BoolLit { value: true })
        } else if let Some(token) = self.accept_kind(TokenKind::False)? {
            Node::new(token, NodeKind::BoolLit { value: false })
        } else if let Some(token) = self.accept_kind(TokenKind::Identifier)? {
            Node::new(token, NodeKind::Variable)
        } else if self.accept_data("(")?.is_some() {
            let expr = self.parse_expression()?;
            self.expect_data(")")?;
            expr
        } else {
            return Err(CompileError::syntax(
                format!("expected value, got {}", self.curr),
                self.curr.pos,
            ));
        };
        self.parse_postfix(expression)
    }

    /// Postfix operators: calls, subscripts, attribute access.
    fn parse_postfix(&mut self, mut expression: Node) -> Result<Node, CompileError> {
        loop {
            if let Some(paren) = self.accept_data("(")? {
                let args = self.parse_expr_list(")")?;
                expression = Node::new(
                    paren,
                    NodeKind::Call {
                        callee: Box::new(expression),
                        args: Box::new(args),
                    },
                );
            } else if self.accept_data("[")?.is_some() {
                let index = self.parse_expression()?;
                let bracket = self.expect_data("]")?;
                expression = Node::new(
                    bracket,
                    NodeKind::Subscript {
                        array: Box::new(expression),
                        index: Box::new(index),
                    },
                );
            } else if let Some(dot) = self.accept_data(".")? {
                let ident = self.expect_kind(TokenKind::Identifier)?;
                let attr = Node::new(ident, NodeKind::Variable);
                expression = Node::new(
                    dot,
                    NodeKind::Attribute {
                        object: Box::new(expression),
                        attr: Box::new(attr),
                    },
                );
            } else {
                return Ok(expression);
            }
        }
    }

    fn parse_expr_list(&mut self, end: &str) -> Result<Node, CompileError> {
        let mut items = vec![];
        if self.accept_data(end)?.is_some() {
            return Ok(expr_list(items));
        }
        loop {
            items.push(self.parse_expression()?);
            if self.accept_data(",")?.is_none() {
                self.expect_data(end)?;
                return Ok(expr_list(items));
            }
        }
    }
}

fn binary(token: Token, left: Node, right: Node) -> Node {
    Node::new(
        token,
        NodeKind::Binary {
            left: Box::new(left),
            right: Box::new(right),
        },
    )
}

fn expr_list(items: Vec<Node>) -> Node {
    Node::new(Token::synthetic("<exprs>"), NodeKind::ExprList { items })
}

fn empty_node() -> Node {
    Node::new(Token::synthetic("<empty>"), NodeKind::Empty)
}

/// Wraps an expression in a statement node for loop init/post slots.
fn statement_of(expr: Node) -> Node {
    Node::new(
        Token::synthetic("<expr>"),
        NodeKind::ExprStatement {
            expr: Box::new(expr),
        },
    )
}

fn single_or_block(mut nodes: Vec<Node>) -> Node {
    if nodes.len() == 1 {
        return nodes.remove(0);
    }
    Node::new(
        Token::synthetic("<decls>"),
        NodeKind::Block { statements: nodes },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Node {
        parse(source, &NoIncludes).expect("parse should succeed")
    }

    fn top(source: &str) -> Vec<Node> {
        match parse_ok(source).kind {
            NodeKind::Block { statements } => statements,
            _ => panic!("root should be a block"),
        }
    }

    #[test]
    fn parses_function_with_params() {
        let items = top("fn add(a, b) { return a + b; }");
        let NodeKind::Function { ident, signature, .. } = &items[0].kind else {
            panic!("expected function");
        };
        assert_eq!(ident.text, "add");
        assert_eq!(signature.n_params(), 2);
    }

    #[test]
    fn precedence_nests_term_under_sum() {
        let items = top("fn main() { return 1 + 2 * 3; }");
        let NodeKind::Function { body, .. } = &items[0].kind else {
            panic!()
        };
        let ret = &body.children()[0];
        let NodeKind::Return { value: Some(sum) } = &ret.kind else {
            panic!()
        };
        assert_eq!(sum.token.text, "+");
        let NodeKind::Binary { right, .. } = &sum.kind else {
            panic!()
        };
        assert_eq!(right.token.text, "*");
    }

    #[test]
    fn while_desugars_to_for() {
        let items = top("fn main() { while (1) ; }");
        let NodeKind::Function { body, .. } = &items[0].kind else {
            panic!()
        };
        let stmt = &body.children()[0];
        let NodeKind::For { init, post, .. } = &stmt.kind else {
            panic!("while should desugar to for");
        };
        assert!(matches!(init.kind, NodeKind::Empty));
        assert!(matches!(post.kind, NodeKind::Empty));
    }

    #[test]
    fn assignment_requires_lvalue() {
        let err = parse("fn main() { 1 = 2; }", &NoIncludes).unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }), "{err}");
    }

    #[test]
    fn address_of_requires_lvalue() {
        let err = parse("fn main() { var x = &3; }", &NoIncludes).unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }), "{err}");
    }

    #[test]
    fn multi_declarator_var_becomes_block() {
        let items = top("var a = 1, b = 2;");
        assert!(matches!(items[0].kind, NodeKind::Block { .. }));
    }

    #[test]
    fn writeback_requires_first_inline_param() {
        assert!(parse("inline f(writeback x) {}", &NoIncludes).is_ok());
        assert!(parse("inline f(a, writeback x) {}", &NoIncludes).is_err());
        assert!(parse("fn f(writeback x) {}", &NoIncludes).is_err());
    }

    #[test]
    fn includes_splice_tokens_once() {
        let loader = MapLoader::default().with("util", "fn util() { return 1; }\n");
        let items_once = top_with("include util; fn main() { return util(); }", &loader);
        assert_eq!(items_once.len(), 2);

        let items_twice = top_with(
            "include util; include util; fn main() { return util(); }",
            &loader,
        );
        assert_eq!(items_twice.len(), 2, "second include must be a no-op");
    }

    fn top_with(source: &str, loader: &dyn SourceLoader) -> Vec<Node> {
        match parse(source, loader).expect("parse should succeed").kind {
            NodeKind::Block { statements } => statements,
            _ => panic!("root should be a block"),
        }
    }

    #[test]
    fn unknown_include_fails() {
        let err = parse("include missing;", &NoIncludes).unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn lambda_wraps_body_in_return() {
        let items = top("var f = lambda x: x + 1;");
        let NodeKind::VarDecl { init: Some(init), .. } = &items[0].kind else {
            panic!()
        };
        let NodeKind::Lambda { body, .. } = &init.kind else {
            panic!("expected lambda");
        };
        assert!(matches!(body.kind, NodeKind::Return { .. }));
    }

    #[test]
    fn postfix_chain_parses() {
        let items = top("fn main() { return f(1)[2]; }");
        let NodeKind::Function { body, .. } = &items[0].kind else {
            panic!()
        };
        let NodeKind::Return { value: Some(expr) } = &body.children()[0].kind else {
            panic!()
        };
        assert!(matches!(expr.kind, NodeKind::Subscript { .. }));
    }
}
