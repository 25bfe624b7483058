//! Top-level declarations.

use vesper_common::Span;

use crate::expr::{ConstraintDecl, Expr, FnExpr, LetStmt};
use crate::types::TypeExpr;
use crate::NodeId;

/// A top-level declaration node.
#[derive(Debug, Clone)]
pub struct Decl {
    pub id: NodeId,
    pub span: Span,
    pub kind: DeclKind,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    /// A named function definition.
    Fn(FnDecl),
    /// A top-level binding (constant unless declared otherwise).
    Let(LetStmt),
    /// A type declaration: ADT or alias.
    Type(TypeDecl),
    /// A trait declaration.
    Trait(TraitDecl),
    /// A trait instance.
    Instance(InstanceDecl),
    /// An import statement.
    Import(ImportDecl),
    /// A re-export statement.
    Reexport(ReexportDecl),
    /// A bare top-level expression.
    Expr(Expr),
}

/// A named function definition.
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: String,
    pub fn_expr: FnExpr,
}

/// A type declaration. `params` are the declared type parameter names.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: TypeDeclBody,
}

#[derive(Debug, Clone)]
pub enum TypeDeclBody {
    /// An algebraic data type with constructors.
    Adt(Vec<VariantDecl>),
    /// A structural alias: transparent for unification, nominal for display.
    Alias(TypeExpr),
}

/// One constructor of an ADT.
#[derive(Debug, Clone)]
pub struct VariantDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub fields: Vec<TypeExpr>,
}

/// A trait declaration.
#[derive(Debug, Clone)]
pub struct TraitDecl {
    pub name: String,
    pub type_params: Vec<String>,
    /// Superclass trait names.
    pub supers: Vec<String>,
    pub methods: Vec<TraitMethodDecl>,
}

/// A method signature inside a trait declaration.
#[derive(Debug, Clone)]
pub struct TraitMethodDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    /// The operator this method backs, if it is an operator method.
    pub operator: Option<String>,
    pub params: Vec<TypeExpr>,
    pub ret: TypeExpr,
    /// A default implementation, usable by instances that omit the method.
    pub default_body: Option<FnExpr>,
}

/// A trait instance declaration.
#[derive(Debug, Clone)]
pub struct InstanceDecl {
    /// Trait name, possibly qualified (`Mod.Trait`).
    pub trait_name: String,
    /// Target types, one per trait type parameter.
    pub targets: Vec<TypeExpr>,
    /// Constraints on the target's type variables
    /// (`instance Show for List<a> where a: Show`).
    pub constraints: Vec<ConstraintDecl>,
    pub methods: Vec<FnDecl>,
}

/// An import statement.
#[derive(Debug, Clone)]
pub struct ImportDecl {
    /// The imported module's name.
    pub module: String,
    /// Local alias for qualified access; defaults to the module name's last
    /// segment.
    pub alias: Option<String>,
    pub selector: ImportSelector,
}

/// What an import statement selects.
#[derive(Debug, Clone)]
pub enum ImportSelector {
    /// Qualified import: only the module record is installed.
    Qualified,
    /// `import M.*`: every export.
    All,
    /// A named subset.
    Names(Vec<String>),
    /// Every export except the listed names.
    Excluding(Vec<String>),
}

/// A re-export statement: republish names from an imported module.
#[derive(Debug, Clone)]
pub struct ReexportDecl {
    pub module: String,
    /// Empty means every export of the referenced module.
    pub names: Vec<String>,
}
