//! Analyzer error types.
//!
//! Errors are collected into vectors during analysis, never thrown across
//! passes: a failing subtree yields a fresh type variable and inference
//! continues. Before being returned, the collected list is deduplicated by
//! `(file, position, code)` and sorted by position.

use std::fmt;

use vesper_common::Span;

use crate::ty::{Kind, Ty};

/// An analyzer error: a kind plus its source location.
#[derive(Debug, Clone)]
pub struct SemaError {
    pub kind: SemaErrorKind,
    pub file: String,
    pub span: Span,
}

impl SemaError {
    pub fn new(kind: SemaErrorKind, file: impl Into<String>, span: Span) -> Self {
        SemaError {
            kind,
            file: file.into(),
            span,
        }
    }

    /// The diagnostic code for this error.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// The specific kind of analyzer error.
#[derive(Debug, Clone)]
pub enum SemaErrorKind {
    // ── Names ──────────────────────────────────────────────────────────
    /// A value name is used but not defined in scope.
    UndeclaredIdent { name: String },
    /// A type name is used but not defined.
    UnknownType { name: String },
    /// An import references a module the loader cannot provide.
    UnknownModule { name: String },
    /// A module does not export the requested name.
    UnknownExport { module: String, name: String },
    /// A re-export references a module that was never imported.
    ReexportNotImported { module: String },
    /// The same name was imported from two different origins.
    ConflictingImport {
        name: String,
        first: String,
        second: String,
    },
    /// An export list names a symbol the file does not define.
    ExportUndefined { name: String },
    /// An unknown infix operator (no trait claims it).
    UnknownOperator { op: String },
    /// A constructor pattern references an unknown constructor.
    UnknownConstructor { name: String },
    /// An instance references an unknown trait.
    UnknownTrait { name: String },

    // ── Redefinition ───────────────────────────────────────────────────
    /// A constant was re-declared in the same scope.
    ConstantRedefined { name: String },
    /// A type or trait was declared twice.
    TypeRedefined { name: String },
    /// An operator is already claimed by another trait.
    OperatorClaimed {
        op: String,
        trait_name: String,
        prior: String,
    },
    /// Assignment to a constant binding.
    AssignToConstant { name: String },

    // ── Kinds ──────────────────────────────────────────────────────────
    /// A type application disagrees with the constructor's kind.
    KindMismatch {
        expected: Kind,
        found: Kind,
        ty: Ty,
    },
    /// Type arguments applied to a ground (kind `*`) type.
    TypeArgsOnGround { ty: Ty },
    /// An instance target's kind disagrees with the trait's expected kind.
    InstanceKindMismatch {
        trait_name: String,
        expected: Kind,
        found: Kind,
    },

    // ── Types ──────────────────────────────────────────────────────────
    /// Two types that should be equal are not.
    Mismatch { expected: Ty, found: Ty },
    /// A type variable occurs in its own solution (infinite type).
    OccursCheck { var: String, ty: Ty },
    /// Wrong number of arguments or elements.
    ArityMismatch { expected: usize, found: usize },
    /// A non-function value is called.
    NotCallable { ty: Ty },
    /// A union callee has zero or several callable members.
    AmbiguousCallee { ty: Ty },
    /// A spread argument targets a non-variadic parameter position.
    SpreadIntoNonVariadic,
    /// Field access on a type without that field.
    NoSuchField { ty: Ty, field: String },
    /// Record destructuring of a non-record value.
    NonRecordDestructure { ty: Ty },
    /// A comprehension generator over a non-iterable type.
    NotIterable { ty: Ty },

    // ── Classes ────────────────────────────────────────────────────────
    /// No instance registered for the trait at these types.
    NoInstance {
        trait_name: String,
        ty_names: Vec<String>,
    },
    /// A constraint could not be grounded by the end of the module.
    AmbiguousConstraint { trait_name: String, ty: Ty },
    /// The instance target lacks a required superclass instance.
    MissingSuperclass {
        trait_name: String,
        super_name: String,
        target: String,
    },
    /// A return-type-dispatched method was called without an expected
    /// return type from annotation or context.
    PendingReturnContext { method: String },

    // ── Instances ──────────────────────────────────────────────────────
    /// An instance omits a method the trait requires (and has no default).
    MissingMethod {
        trait_name: String,
        method: String,
        target: String,
    },
    /// An instance method's signature disagrees with the trait's.
    MethodSignatureMismatch {
        trait_name: String,
        method: String,
        expected: Ty,
        found: Ty,
    },
    /// An instance provides a method the trait does not declare.
    ExtraMethod { trait_name: String, method: String },
    /// Two instances overlap for the same trait and target.
    OverlappingInstance {
        trait_name: String,
        target: String,
    },
}

impl SemaErrorKind {
    /// Diagnostic code for this error kind.
    ///
    /// `A001` names, `A002` unknown types, `A003` type/kind errors, `A004`
    /// redefinitions and conflicts, `A005` class/instance errors, `A006`
    /// unknown exports and unimportable names.
    pub fn code(&self) -> &'static str {
        use SemaErrorKind::*;
        match self {
            UndeclaredIdent { .. }
            | UnknownModule { .. }
            | UnknownOperator { .. }
            | UnknownConstructor { .. }
            | UnknownTrait { .. } => "A001",
            UnknownType { .. } => "A002",
            KindMismatch { .. }
            | TypeArgsOnGround { .. }
            | InstanceKindMismatch { .. }
            | Mismatch { .. }
            | OccursCheck { .. }
            | ArityMismatch { .. }
            | NotCallable { .. }
            | AmbiguousCallee { .. }
            | SpreadIntoNonVariadic
            | NoSuchField { .. }
            | NonRecordDestructure { .. }
            | NotIterable { .. } => "A003",
            ConstantRedefined { .. }
            | TypeRedefined { .. }
            | OperatorClaimed { .. }
            | AssignToConstant { .. }
            | ConflictingImport { .. } => "A004",
            NoInstance { .. }
            | AmbiguousConstraint { .. }
            | MissingSuperclass { .. }
            | PendingReturnContext { .. }
            | MissingMethod { .. }
            | MethodSignatureMismatch { .. }
            | ExtraMethod { .. }
            | OverlappingInstance { .. } => "A005",
            UnknownExport { .. } | ReexportNotImported { .. } | ExportUndefined { .. } => "A006",
        }
    }
}

impl fmt::Display for SemaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SemaErrorKind::*;
        match self {
            UndeclaredIdent { name } => write!(f, "undeclared identifier `{}`", name),
            UnknownType { name } => write!(f, "unknown type `{}`", name),
            UnknownModule { name } => write!(f, "module `{}` not found", name),
            UnknownExport { module, name } => {
                write!(f, "`{}` is not exported by module `{}`", name, module)
            }
            ReexportNotImported { module } => {
                write!(f, "cannot re-export from `{}`: module was not imported", module)
            }
            ConflictingImport {
                name,
                first,
                second,
            } => write!(
                f,
                "conflicting import of `{}`: from `{}` and `{}`",
                name, first, second
            ),
            ExportUndefined { name } => {
                write!(f, "exported symbol `{}` is not defined in this file", name)
            }
            UnknownOperator { op } => write!(f, "no trait claims operator `{}`", op),
            UnknownConstructor { name } => write!(f, "unknown constructor `{}`", name),
            UnknownTrait { name } => write!(f, "unknown trait `{}`", name),
            ConstantRedefined { name } => {
                write!(f, "constant `{}` is already defined in this scope", name)
            }
            TypeRedefined { name } => write!(f, "`{}` is already defined", name),
            OperatorClaimed {
                op,
                trait_name,
                prior,
            } => write!(
                f,
                "operator `{}` claimed by trait `{}` is already provided by `{}`",
                op, trait_name, prior
            ),
            AssignToConstant { name } => write!(f, "cannot assign to constant `{}`", name),
            KindMismatch {
                expected,
                found,
                ty,
            } => write!(
                f,
                "kind mismatch on `{}`: expected `{}`, found `{}`",
                ty, expected, found
            ),
            TypeArgsOnGround { ty } => {
                write!(f, "type `{}` takes no type arguments", ty)
            }
            InstanceKindMismatch {
                trait_name,
                expected,
                found,
            } => write!(
                f,
                "instance target for `{}` must have kind `{}`, found `{}`",
                trait_name, expected, found
            ),
            Mismatch { expected, found } => {
                write!(f, "type mismatch: expected `{}`, found `{}`", expected, found)
            }
            OccursCheck { var, ty } => {
                write!(f, "infinite type: `{}` occurs in `{}`", var, ty)
            }
            ArityMismatch { expected, found } => write!(
                f,
                "arity mismatch: expected {} arguments, found {}",
                expected, found
            ),
            NotCallable { ty } => write!(f, "`{}` is not a function", ty),
            AmbiguousCallee { ty } => write!(
                f,
                "cannot call `{}`: no single callable alternative",
                ty
            ),
            SpreadIntoNonVariadic => {
                write!(f, "spread argument requires a variadic parameter")
            }
            NoSuchField { ty, field } => {
                write!(f, "type `{}` has no field `{}`", ty, field)
            }
            NonRecordDestructure { ty } => {
                write!(f, "cannot destructure non-record type `{}`", ty)
            }
            NotIterable { ty } => {
                write!(f, "`{}` is not iterable (expected List or Range)", ty)
            }
            NoInstance {
                trait_name,
                ty_names,
            } => write!(
                f,
                "no instance of `{}` for `{}`",
                trait_name,
                ty_names.join(", ")
            ),
            AmbiguousConstraint { trait_name, ty } => write!(
                f,
                "ambiguous constraint `{}<{}>`: type could not be determined",
                trait_name, ty
            ),
            MissingSuperclass {
                trait_name,
                super_name,
                target,
            } => write!(
                f,
                "instance of `{}` for `{}` requires a `{}` instance",
                trait_name, target, super_name
            ),
            PendingReturnContext { method } => write!(
                f,
                "call to `{}` needs an expected return type; add an annotation",
                method
            ),
            MissingMethod {
                trait_name,
                method,
                target,
            } => write!(
                f,
                "instance of `{}` for `{}` is missing method `{}`",
                trait_name, target, method
            ),
            MethodSignatureMismatch {
                trait_name,
                method,
                expected,
                found,
            } => write!(
                f,
                "method `{}` in instance of `{}` has wrong signature: expected `{}`, found `{}`",
                method, trait_name, expected, found
            ),
            ExtraMethod { trait_name, method } => write!(
                f,
                "instance of `{}` provides method `{}` which the trait does not declare",
                trait_name, method
            ),
            OverlappingInstance { trait_name, target } => write!(
                f,
                "`{}` is already implemented for `{}`",
                trait_name, target
            ),
        }
    }
}

impl fmt::Display for SemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for SemaError {}

/// Deduplicate errors by `(file, position, code)` and sort by position.
pub fn dedup_and_sort(errors: &mut Vec<SemaError>) {
    errors.sort_by(|a, b| {
        (a.file.as_str(), a.span.start, a.code()).cmp(&(b.file.as_str(), b.span.start, b.code()))
    });
    errors.dedup_by(|a, b| a.file == b.file && a.span.start == b.span.start && a.code() == b.code());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_cover_the_taxonomy() {
        assert_eq!(
            SemaErrorKind::UndeclaredIdent { name: "x".into() }.code(),
            "A001"
        );
        assert_eq!(SemaErrorKind::UnknownType { name: "T".into() }.code(), "A002");
        assert_eq!(
            SemaErrorKind::Mismatch {
                expected: Ty::int(),
                found: Ty::bool(),
            }
            .code(),
            "A003"
        );
        assert_eq!(
            SemaErrorKind::ConstantRedefined { name: "x".into() }.code(),
            "A004"
        );
        assert_eq!(
            SemaErrorKind::NoInstance {
                trait_name: "Show".into(),
                ty_names: vec!["Int".into()],
            }
            .code(),
            "A005"
        );
        assert_eq!(
            SemaErrorKind::UnknownExport {
                module: "M".into(),
                name: "x".into(),
            }
            .code(),
            "A006"
        );
    }

    #[test]
    fn dedup_by_position_and_code() {
        let mut errors = vec![
            SemaError::new(
                SemaErrorKind::UndeclaredIdent { name: "b".into() },
                "a.vsp",
                Span::new(10, 11),
            ),
            SemaError::new(
                SemaErrorKind::UndeclaredIdent { name: "b".into() },
                "a.vsp",
                Span::new(10, 11),
            ),
            SemaError::new(
                SemaErrorKind::UndeclaredIdent { name: "a".into() },
                "a.vsp",
                Span::new(2, 3),
            ),
        ];
        dedup_and_sort(&mut errors);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].span.start, 2);
        assert_eq!(errors[1].span.start, 10);
    }
}
