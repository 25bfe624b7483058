//! Vesper semantic analyzer: type inference with trait elaboration.
//!
//! Consumes the AST produced by the parser, runs the four-phase module
//! protocol (Naming → Headers → Instances → Bodies), and produces a type
//! for every expression, a witness vector for every constrained call, the
//! populated symbol table, and collected diagnostics.
//!
//! # Architecture
//!
//! - [`ty`]: type representation, kinds, substitutions
//! - [`unify`]: unification with occurs check, rows, aliases, kinds
//! - [`env`]: symbol table, trait metadata, instance registry
//! - [`ctx`]: per-module inference context
//! - [`builtins`]: ground types and compiler-known operator traits
//! - [`decls`]: Naming/Headers/Instances walkers
//! - [`infer`]: Bodies walker (expressions, patterns, generalization)
//! - [`witness`]: dictionary elaboration and deferred-constraint solving
//! - [`modules`]: the four-phase module driver and loader interface
//! - [`tailcall`]: tail-position marking post-pass
//! - [`error`], [`diagnostics`]: collected errors and rendering

pub mod builtins;
pub mod ctx;
pub mod decls;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod infer;
pub mod modules;
pub mod tailcall;
pub mod ty;
pub mod unify;
pub mod witness;

use rustc_hash::FxHashMap;
use vesper_ast::expr::FnExpr;
use vesper_ast::module::{File, Module};
use vesper_ast::NodeId;
use vesper_common::Span;

use crate::ctx::{CallInfo, InferCtx};
use crate::env::SymbolTable;
use crate::error::SemaError;
use crate::modules::{Analyzer, ModuleLoader, NullLoader};
use crate::ty::{ClassConstraint, Ty};

/// The header-level signature of a named function, kept for body
/// inference and witness elaboration.
#[derive(Clone, Debug)]
pub struct FnSig {
    /// Declared type parameter name → rigid variable.
    pub type_params: FxHashMap<String, Ty>,
    pub params: Vec<Ty>,
    pub ret: Ty,
    pub constraints: Vec<ClassConstraint>,
    pub variadic: bool,
    pub default_count: usize,
}

/// Per-module analysis state: the inference context, the symbol table, and
/// the auxiliary maps the walkers share. One `Analysis` belongs to exactly
/// one module.
pub struct Analysis {
    pub module_name: String,
    pub ctx: InferCtx,
    pub symbols: SymbolTable,
    /// `Trait.method` → default method body, for the evaluator.
    pub trait_defaults: FxHashMap<String, FnExpr>,
    /// Function name → header signature.
    pub fn_sigs: FxHashMap<String, FnSig>,
    /// Names seeded by builtins registration; excluded from exports.
    pub builtin_names: rustc_hash::FxHashSet<String>,
    /// Modules this module has imported, for re-export validation.
    pub imported_modules: rustc_hash::FxHashSet<String>,
}

impl Analysis {
    /// A fresh analysis with builtins registered.
    pub fn new(module_name: impl Into<String>) -> Self {
        let mut symbols = SymbolTable::new();
        builtins::register_builtins(&mut symbols);
        let builtin_names = symbols.globals().map(|s| s.name.clone()).collect();
        Analysis {
            module_name: module_name.into(),
            ctx: InferCtx::new(),
            symbols,
            trait_defaults: FxHashMap::default(),
            fn_sigs: FxHashMap::default(),
            builtin_names,
            imported_modules: rustc_hash::FxHashSet::default(),
        }
    }

    /// Unify two types at a span, folding the result into the global
    /// substitution; on failure records the error and reports `false`.
    pub fn unify_at(&mut self, span: Span, a: &Ty, b: &Ty) -> bool {
        let ra = self.ctx.resolve(a);
        let rb = self.ctx.resolve(b);
        match self.ctx.unify(&ra, &rb, &self.symbols) {
            Ok(s) => {
                self.ctx.extend(&s);
                true
            }
            Err(kind) => {
                self.ctx.error(kind, span);
                false
            }
        }
    }

    /// Like [`Analysis::unify_at`] but tolerates extra fields on the
    /// right-hand record (structural subtyping for arguments).
    pub fn unify_arg_at(&mut self, span: Span, param: &Ty, arg: &Ty) -> bool {
        let rp = self.ctx.resolve(param);
        let ra = self.ctx.resolve(arg);
        match self.ctx.unify_allow_extra(&rp, &ra, &self.symbols) {
            Ok(s) => {
                self.ctx.extend(&s);
                true
            }
            Err(kind) => {
                self.ctx.error(kind, span);
                false
            }
        }
    }
}

/// The result of analyzing a module.
pub struct AnalysisResult {
    /// Node id → inferred type, fully resolved.
    pub types: FxHashMap<NodeId, Ty>,
    /// Node id → call annotations (witnesses, instantiation, type args,
    /// tail flag).
    pub calls: FxHashMap<NodeId, CallInfo>,
    /// Collected diagnostics, deduplicated and sorted by position.
    pub errors: Vec<SemaError>,
    /// `Trait.method` → default body, for the evaluator.
    pub trait_defaults: FxHashMap<String, FnExpr>,
    /// The module's populated symbol table.
    pub symbols: SymbolTable,
    /// The type of the last top-level expression or binding, when any.
    pub result_type: Option<Ty>,
}

impl AnalysisResult {
    /// Look up the final type of a global by name.
    pub fn type_of_global(&self, name: &str) -> Option<&Ty> {
        self.symbols.lookup_global(name).map(|sym| &sym.ty)
    }
}

/// Analyze a single file as its own module, with no imports available.
pub fn analyze_file(file: &File) -> AnalysisResult {
    let module = Module {
        name: "Main".to_string(),
        path: "main".to_string(),
        files: vec![file.clone()],
    };
    analyze(&module, &NullLoader)
}

/// Analyze a module, resolving imports through the loader.
pub fn analyze(module: &Module, loader: &dyn ModuleLoader) -> AnalysisResult {
    let mut analyzer = Analyzer::new(loader);
    analyzer.analyze(module)
}
