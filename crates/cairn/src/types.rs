//! Type expressions and the three-valued matching relation.
//!
//! Types only exist at compile time: every runtime value is a 32-bit word.
//! The matcher drives overload selection at call sites, where an exact
//! match beats an any-match and ties are fatal.

use std::fmt;

use crate::{symbol::SymbolId, token::Token};

/// Result of matching one type against another.
///
/// Ordered so that `min` over a list of element matches yields the
/// combined match: one `NoMatch` poisons the list, one `AnyMatch` demotes
/// an otherwise exact list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeMatch {
    NoMatch,
    AnyMatch,
    ExactMatch,
}

/// A type expression, parallel to the AST.
///
/// `Named` carries the declaring token plus the canonical symbol id filled
/// in during resolution; `typedef a like b` aliases resolve both names to
/// the same canonical id, so exact matching is id equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// Matches every type with `AnyMatch`.
    Any,
    Named {
        token: Token,
        id: SymbolId,
    },
    List(Vec<TypeExpr>),
    Callable {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
}

impl TypeExpr {
    pub fn named(token: Token) -> Self {
        Self::Named { token, id: 0 }
    }

    /// A parameter type list of `n` unconstrained slots.
    pub fn any_list(n: usize) -> Self {
        Self::List(vec![Self::Any; n])
    }

    /// Matches `self` against `other`.
    pub fn matching(&self, other: &Self) -> TypeMatch {
        match (self, other) {
            (Self::Any, _) | (_, Self::Any) => TypeMatch::AnyMatch,
            (Self::Named { id: a, .. }, Self::Named { id: b, .. }) => {
                if a == b {
                    TypeMatch::ExactMatch
                } else {
                    TypeMatch::NoMatch
                }
            }
            (Self::List(a), Self::List(b)) => Self::match_lists(a, b),
            (
                Self::Callable {
                    params: pa,
                    ret: ra,
                },
                Self::Callable {
                    params: pb,
                    ret: rb,
                },
            ) => Self::match_lists(pa, pb).min(ra.matching(rb)),
            _ => TypeMatch::NoMatch,
        }
    }

    /// Matches two type lists element-wise; length mismatch is `NoMatch`.
    pub fn match_lists(a: &[Self], b: &[Self]) -> TypeMatch {
        if a.len() != b.len() {
            return TypeMatch::NoMatch;
        }
        a.iter()
            .zip(b)
            .map(|(x, y)| x.matching(y))
            .min()
            .unwrap_or(TypeMatch::ExactMatch)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Named { token, .. } => f.write_str(&token.text),
            Self::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Self::Callable { params, ret } => {
                write!(f, "fn{} {ret}", Self::List(params.clone()))
            }
        }
    }
}
