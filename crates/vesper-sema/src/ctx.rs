//! The inference context: shared mutable state for one module's analysis.
//!
//! Owns the fresh-variable counter, the accumulated global substitution,
//! deferred class constraints, pending witnesses, expected-type maps, the
//! node-id → type side table, and the collected errors. Created fresh for a
//! module's Headers phase and carried through Instances and Bodies.

use rustc_hash::FxHashMap;
use vesper_ast::NodeId;
use vesper_common::Span;

use crate::error::{SemaError, SemaErrorKind};
use crate::ty::{ClassConstraint, Kind, Subst, Ty};

/// A class obligation recorded during inference.
#[derive(Clone, Debug)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub trait_name: String,
    pub args: Vec<Ty>,
    pub span: Span,
    /// The constrained type variable, when the obligation came from a
    /// single-variable constraint.
    pub var_name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    /// `args[0..]: trait` must hold.
    Implements,
    /// Deferred unification of `args[0]` and `args[1]`.
    Equal,
}

/// A witness slot reserved at a call site, to be filled after Bodies.
#[derive(Clone, Debug)]
pub struct PendingWitness {
    pub call: NodeId,
    pub trait_name: String,
    /// Name of the constrained type variable at registration time.
    pub var_name: String,
    pub args: Vec<Ty>,
    /// Position in the call's witness vector.
    pub index: usize,
    pub span: Span,
}

/// A dictionary expression attached to a call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WitnessExpr {
    /// The sentinel installed when the slot is reserved. None may survive
    /// to the end of analysis.
    Placeholder,
    /// A concrete dictionary: the instance for `trait_name` at the named
    /// types, applied to the witnesses its own obligations require
    /// (instance constraints first, then superclasses).
    Instance {
        trait_name: String,
        type_names: Vec<String>,
        args: Vec<WitnessExpr>,
    },
    /// A generic witness: the dictionary parameter of the enclosing
    /// function for a generalized type variable.
    Param { trait_name: String, var: String },
}

/// Derived per-call information attached by the analyzer.
#[derive(Clone, Debug, Default)]
pub struct CallInfo {
    /// One witness per class constraint on the callee, positionally aligned.
    pub witnesses: Vec<WitnessExpr>,
    /// Generic variable name → instantiated type, recorded at
    /// instantiation for later monomorphization.
    pub instantiation: FxHashMap<String, Ty>,
    /// Explicit type arguments of a parameterized constructor call.
    pub type_args: Vec<Ty>,
    /// Whether the call sits in tail position.
    pub is_tail: bool,
}

/// Shared inference state for one module.
pub struct InferCtx {
    /// Next fresh variable index.
    counter: u32,
    /// Indices at or below this are rigid; above are inference variables.
    base: u32,
    /// Fresh generic-name counter for generalization.
    gen_counter: u32,
    /// The accumulated global substitution.
    pub subst: Subst,
    /// Class obligations that could not be decided yet.
    pub deferred: Vec<Constraint>,
    /// Witness slots awaiting resolution.
    pub pending_witnesses: Vec<PendingWitness>,
    /// Expected type per node, used for contextual (rank-N) typing and
    /// return-type-directed dispatch.
    pub expected_types: FxHashMap<NodeId, Ty>,
    /// Expected return type per call node.
    pub expected_returns: FxHashMap<NodeId, Ty>,
    /// Active obligations indexed by type variable name.
    pub active: FxHashMap<String, Vec<ClassConstraint>>,
    /// Node id → inferred type.
    pub types: FxHashMap<NodeId, Ty>,
    /// Node id → call annotations.
    pub calls: FxHashMap<NodeId, CallInfo>,
    /// Collected diagnostics.
    pub errors: Vec<SemaError>,
    /// The file currently being analyzed, for error locations.
    pub file: String,
}

impl InferCtx {
    pub fn new() -> Self {
        InferCtx {
            counter: 0,
            base: 0,
            gen_counter: 0,
            subst: Subst::empty(),
            deferred: Vec::new(),
            pending_witnesses: Vec::new(),
            expected_types: FxHashMap::default(),
            expected_returns: FxHashMap::default(),
            active: FxHashMap::default(),
            types: FxHashMap::default(),
            calls: FxHashMap::default(),
            errors: Vec::new(),
            file: String::new(),
        }
    }

    // ── Fresh variables ────────────────────────────────────────────────

    /// A fresh inference variable of kind `*`.
    pub fn fresh_var(&mut self) -> Ty {
        self.fresh_var_k(Kind::Star)
    }

    /// A fresh inference variable with the given kind.
    pub fn fresh_var_k(&mut self, kind: Kind) -> Ty {
        let name = format!("t{}", self.counter);
        self.counter += 1;
        Ty::Var { name, kind }
    }

    /// A fresh row variable name for open records.
    pub fn fresh_row(&mut self) -> String {
        let name = format!("t{}", self.counter);
        self.counter += 1;
        name
    }

    /// A fresh generic name used when generalizing (`gen_t{n}`).
    pub fn fresh_gen_name(&mut self) -> String {
        let name = format!("gen_t{}", self.gen_counter);
        self.gen_counter += 1;
        name
    }

    /// Whether a variable name denotes an inference variable: `t{n}` with
    /// `n` above the base counter. Everything else is rigid/generic.
    pub fn is_inference_var(&self, name: &str) -> bool {
        match name.strip_prefix('t') {
            Some(rest) => match rest.parse::<u32>() {
                Ok(n) => n >= self.base,
                Err(_) => false,
            },
            None => false,
        }
    }

    /// Whether a type contains any free inference variable after applying
    /// the global substitution.
    pub fn has_free_inference_var(&self, ty: &Ty) -> bool {
        ty.apply(&self.subst)
            .free_vars()
            .iter()
            .any(|v| self.is_inference_var(v))
    }

    // ── Substitution ───────────────────────────────────────────────────

    /// Fold a local substitution into the global one:
    /// `global := s ∘ global`.
    pub fn extend(&mut self, s: &Subst) {
        if s.is_empty() {
            return;
        }
        self.subst = Subst::compose(s, &self.subst);
    }

    /// Apply the global substitution to a type.
    pub fn resolve(&self, ty: &Ty) -> Ty {
        ty.apply(&self.subst)
    }

    // ── Errors ─────────────────────────────────────────────────────────

    /// Record an error at a span in the current file.
    pub fn error(&mut self, kind: SemaErrorKind, span: Span) {
        let file = self.file.clone();
        self.errors.push(SemaError::new(kind, file, span));
    }

    // ── Obligations ────────────────────────────────────────────────────

    /// Record an instantiated obligation on the deferred list. The active
    /// index is reserved for signature-scope constraints, installed when a
    /// function body is entered.
    pub fn add_obligation(&mut self, constraint: ClassConstraint, span: Span) {
        let var_name = constraint.args.first().and_then(|a| match a {
            Ty::Var { name, .. } => Some(name.clone()),
            _ => None,
        });
        self.deferred.push(Constraint {
            kind: ConstraintKind::Implements,
            trait_name: constraint.trait_name,
            args: constraint.args,
            span,
            var_name,
        });
    }

    /// Record a deferred unification between two types.
    pub fn defer_equal(&mut self, a: Ty, b: Ty, span: Span) {
        self.deferred.push(Constraint {
            kind: ConstraintKind::Equal,
            trait_name: String::new(),
            args: vec![a, b],
            span,
            var_name: None,
        });
    }
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_vars_are_distinct() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var();
        let b = ctx.fresh_var();
        assert_ne!(a, b);
    }

    #[test]
    fn inference_var_classification() {
        let ctx = InferCtx::new();
        assert!(ctx.is_inference_var("t0"));
        assert!(ctx.is_inference_var("t42"));
        assert!(!ctx.is_inference_var("a"));
        assert!(!ctx.is_inference_var("gen_t0"));
        assert!(!ctx.is_inference_var("twice"));
    }

    #[test]
    fn extend_accumulates() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var();
        let b = ctx.fresh_var();
        let (an, bn) = match (&a, &b) {
            (Ty::Var { name: an, .. }, Ty::Var { name: bn, .. }) => (an.clone(), bn.clone()),
            _ => unreachable!(),
        };
        ctx.extend(&Subst::singleton(an.clone(), b.clone()));
        ctx.extend(&Subst::singleton(bn, Ty::int()));
        assert_eq!(ctx.resolve(&a), Ty::int());
        assert_eq!(ctx.resolve(&b), Ty::int());
        // Idempotence of the accumulated substitution.
        let once = ctx.resolve(&a);
        assert_eq!(once.apply(&ctx.subst), once);
    }
}
