//! Type expressions as they appear in source annotations.
//!
//! These are syntactic: the analyzer elaborates them into its own type
//! representation, resolving names through the symbol table.

use vesper_common::Span;

use crate::NodeId;

/// A type expression node.
#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeExprKind,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    /// A named type, possibly module-qualified (`Geometry.Point`).
    Name(String),
    /// A type variable (lowercase in source).
    Var(String),
    /// A type application: `List<Int>`.
    App(Box<TypeExpr>, Vec<TypeExpr>),
    /// A function type.
    Func {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
        variadic: bool,
    },
    /// A tuple type.
    Tuple(Vec<TypeExpr>),
    /// A record type. Open records accept additional fields via a row.
    Record {
        fields: Vec<(String, TypeExpr)>,
        open: bool,
        /// An explicit row variable name: `{name: t | r}`.
        row: Option<String>,
    },
    /// A union of alternatives.
    Union(Vec<TypeExpr>),
}
