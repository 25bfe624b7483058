//! The symbol table: lexical scopes plus the per-module registries.
//!
//! Scopes form a stack; lookup searches from the innermost scope outward.
//! Alongside the scopes the table carries the trait metadata maps, the
//! instance registry, the kind registry, the variant registry, extension
//! methods, and module aliases. One symbol table belongs to exactly one
//! module's analyzer.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::SemaErrorKind;
use crate::ty::{ClassConstraint, Kind, Subst, Ty};
use crate::unify::ResolveTypeAlias;

/// What a name denotes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    /// A mutable value binding.
    Variable,
    /// An immutable binding; define-once within a scope.
    Constant,
    /// A type name.
    Type,
    /// An ADT constructor.
    Constructor,
    /// A trait name.
    Trait,
    /// A module record bound by a qualified import.
    Module,
}

/// One entry in a scope.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Ty,
    /// Set during Naming, cleared when the real type is known.
    pub pending: bool,
    /// The module this symbol was imported from, if any.
    pub module: Option<String>,
    /// The alias target for alias types.
    pub underlying: Option<Ty>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: Ty) -> Self {
        Symbol {
            name: name.into(),
            kind,
            ty,
            pending: false,
            module: None,
            underlying: None,
        }
    }

    pub fn pending(name: impl Into<String>, kind: SymbolKind) -> Self {
        Symbol {
            name: name.into(),
            kind,
            ty: Ty::nil(),
            pending: true,
            module: None,
            underlying: None,
        }
    }
}

/// A registered trait instance.
#[derive(Clone, Debug)]
pub struct InstanceDef {
    pub trait_name: String,
    /// Canonical head names of the target types; the registry key.
    pub type_names: Vec<String>,
    /// The target types themselves (may contain rigid variables).
    pub targets: Vec<Ty>,
    /// Constraints the instance places on its target's variables.
    pub constraints: Vec<ClassConstraint>,
    /// Method name → method type for this instance.
    pub methods: FxHashMap<String, Ty>,
    /// The defining module, when imported.
    pub module: Option<String>,
}

/// The canonical head name of a type, used as an instance registry key.
pub fn canonical_type_name(ty: &Ty) -> String {
    match ty {
        Ty::Var { name, .. } => name.clone(),
        Ty::Con(con) => match &con.module {
            Some(m) => format!("{}.{}", m, con.name),
            None => con.name.clone(),
        },
        Ty::App(con, _) => canonical_type_name(con),
        Ty::Func { .. } => "Fn".to_string(),
        Ty::Tuple(_) => "Tuple".to_string(),
        Ty::Record { .. } => "Record".to_string(),
        Ty::Union(_) => "Union".to_string(),
        Ty::Forall { ty, .. } => canonical_type_name(ty),
        Ty::TypeOfType(_) => "Type".to_string(),
    }
}

/// Strip any module tag from a canonical name.
fn untagged(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// The symbol table for one module.
#[derive(Debug, Default)]
pub struct SymbolTable {
    /// The scope stack. Index 0 is the global scope.
    scopes: Vec<FxHashMap<String, Symbol>>,
    /// Trait name → declared type parameter names.
    pub trait_type_params: FxHashMap<String, Vec<String>>,
    /// Trait name → inferred kinds of its type parameters.
    pub trait_param_kinds: FxHashMap<String, Vec<Kind>>,
    /// Trait name → superclass names.
    pub trait_supers: FxHashMap<String, Vec<String>>,
    /// Trait name → method names.
    pub trait_methods: FxHashMap<String, Vec<String>>,
    /// Trait name → methods that carry default bodies.
    pub trait_default_methods: FxHashMap<String, Vec<String>>,
    /// Method name → owning trait (reverse index).
    pub trait_for_method: FxHashMap<String, String>,
    /// Methods whose only dispatch position is the return type.
    pub return_dispatch_methods: FxHashSet<String>,
    /// Operator → (trait, method).
    pub operator_traits: FxHashMap<String, (String, String)>,
    /// Canonical type name → method name → method type.
    pub extension_methods: FxHashMap<String, FxHashMap<String, Ty>>,
    /// Trait name → registered instances.
    instances: FxHashMap<String, Vec<InstanceDef>>,
    /// Type constructor name → kind.
    pub kinds: FxHashMap<String, Kind>,
    /// Type name → declared type parameter names.
    pub type_params: FxHashMap<String, Vec<String>>,
    /// Type name → constructor names.
    pub variants: FxHashMap<String, Vec<String>>,
    /// Import alias → module name.
    pub module_aliases: FxHashMap<String, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![FxHashMap::default()],
            ..Default::default()
        }
    }

    // ── Scopes ─────────────────────────────────────────────────────────

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    /// # Panics
    ///
    /// Panics if called when only the global scope remains.
    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Insert a symbol into the current scope.
    ///
    /// Re-declaring a non-pending constant (or a type/trait) in the same
    /// scope is an error; a pending symbol may be finalized by a second
    /// insert.
    pub fn insert(&mut self, symbol: Symbol) -> Result<(), SemaErrorKind> {
        let scope = self
            .scopes
            .last_mut()
            .expect("scope stack should never be empty");
        if let Some(existing) = scope.get(&symbol.name) {
            if !existing.pending {
                match existing.kind {
                    SymbolKind::Constant => {
                        return Err(SemaErrorKind::ConstantRedefined {
                            name: symbol.name.clone(),
                        });
                    }
                    SymbolKind::Type | SymbolKind::Trait
                        if matches!(symbol.kind, SymbolKind::Type | SymbolKind::Trait)
                            && existing.module == symbol.module =>
                    {
                        return Err(SemaErrorKind::TypeRedefined {
                            name: symbol.name.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }
        scope.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Insert, overwriting whatever is there. Used when finalizing pending
    /// symbols and when refreshing imports.
    pub fn insert_unchecked(&mut self, symbol: Symbol) {
        self.scopes
            .last_mut()
            .expect("scope stack should never be empty")
            .insert(symbol.name.clone(), symbol);
    }

    /// Insert into the global (outermost) scope regardless of depth.
    pub fn insert_global(&mut self, symbol: Symbol) {
        self.scopes[0].insert(symbol.name.clone(), symbol);
    }

    /// Look up a name, searching from the innermost scope outward.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        for scope in self.scopes.iter().rev() {
            if let Some(sym) = scope.get(name) {
                return Some(sym);
            }
        }
        None
    }

    /// Look up only in the current scope.
    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .last()
            .expect("scope stack should never be empty")
            .get(name)
    }

    /// Look up only in the global scope.
    pub fn lookup_global(&self, name: &str) -> Option<&Symbol> {
        self.scopes[0].get(name)
    }

    /// Mutable lookup, innermost first.
    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(sym) = scope.get_mut(name) {
                return Some(sym);
            }
        }
        None
    }

    /// Iterate the symbols of the global scope.
    pub fn globals(&self) -> impl Iterator<Item = &Symbol> {
        self.scopes[0].values()
    }

    /// All variable names free in the environment's value bindings after
    /// applying a substitution. Used by generalization.
    pub fn free_type_vars(&self, subst: &Subst, excluding: Option<&str>) -> FxHashSet<String> {
        let mut out = FxHashSet::default();
        for scope in &self.scopes {
            for sym in scope.values() {
                if Some(sym.name.as_str()) == excluding {
                    continue;
                }
                if matches!(sym.kind, SymbolKind::Variable | SymbolKind::Constant) && !sym.pending {
                    for v in sym.ty.apply(subst).free_vars() {
                        out.insert(v);
                    }
                }
            }
        }
        out
    }

    // ── Instance registry ──────────────────────────────────────────────

    /// Register an instance. Overlap with an existing instance for the
    /// same trait and canonical target names is an error; the instance is
    /// still stored so method lookup keeps working.
    pub fn register_instance(&mut self, instance: InstanceDef) -> Result<(), SemaErrorKind> {
        let existing = self.instances.entry(instance.trait_name.clone()).or_default();
        let overlap = existing
            .iter()
            .any(|i| i.type_names == instance.type_names);
        let result = if overlap {
            Err(SemaErrorKind::OverlappingInstance {
                trait_name: instance.trait_name.clone(),
                target: instance.type_names.join(", "),
            })
        } else {
            Ok(())
        };
        existing.push(instance);
        result
    }

    /// Register without the overlap check (used when copying instances
    /// from imported modules, where duplicates via diamond imports are
    /// expected).
    pub fn adopt_instance(&mut self, instance: InstanceDef) {
        let existing = self.instances.entry(instance.trait_name.clone()).or_default();
        if !existing.iter().any(|i| i.type_names == instance.type_names) {
            existing.push(instance);
        }
    }

    /// Find the instance for a trait at the given canonical type names.
    /// Falls back to module-untagged names so a type imported both
    /// qualified and selectively resolves either way.
    pub fn find_instance(&self, trait_name: &str, type_names: &[String]) -> Option<&InstanceDef> {
        let list = self.instances.get(trait_name)?;
        if let Some(found) = list.iter().find(|i| i.type_names == type_names) {
            return Some(found);
        }
        list.iter().find(|i| {
            i.type_names.len() == type_names.len()
                && i.type_names
                    .iter()
                    .zip(type_names)
                    .all(|(a, b)| untagged(a) == untagged(b))
        })
    }

    pub fn has_instance(&self, trait_name: &str, type_names: &[String]) -> bool {
        self.find_instance(trait_name, type_names).is_some()
    }

    /// All registered instances, flattened.
    pub fn all_instances(&self) -> impl Iterator<Item = &InstanceDef> {
        self.instances.values().flat_map(|v| v.iter())
    }

    /// Instances registered for one trait.
    pub fn instances_of(&self, trait_name: &str) -> &[InstanceDef] {
        self.instances
            .get(trait_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

impl ResolveTypeAlias for SymbolTable {
    /// The resolver callback used by unification to peel aliases: returns
    /// the underlying structure of an alias type name.
    fn resolve_type_alias(&self, name: &str) -> Option<Ty> {
        let sym = self.lookup(name)?;
        if sym.kind == SymbolKind::Type {
            sym.underlying.clone()
        } else {
            None
        }
    }
}
