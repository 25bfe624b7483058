//! The module analysis driver.
//!
//! Walks each module four times (Naming → Headers → Instances → Bodies).
//! Imports are resolved through the [`ModuleLoader`]: before a module's
//! headers are elaborated, its dependencies' headers (and instances) run;
//! before its bodies, its dependencies' bodies run. Cycles are broken by
//! the per-module `headers_analyzing`/`bodies_analyzing` flags: a module
//! that is already mid-phase is simply not re-entered, which is safe
//! because Naming has completed for every module before any cycle forms.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use vesper_ast::decl::{DeclKind, ImportDecl, ImportSelector};
use vesper_ast::expr::FnExpr;
use vesper_ast::module::Module;
use vesper_common::Span;

use crate::decls;
use crate::env::{InstanceDef, Symbol, SymbolKind};
use crate::error::{dedup_and_sort, SemaErrorKind};
use crate::infer;
use crate::tailcall;
use crate::ty::{Kind, Ty};
use crate::witness;
use crate::{Analysis, AnalysisResult};

/// Why the loader could not produce a module.
#[derive(Debug, Clone)]
pub enum LoadError {
    NotFound,
    /// The module exists but failed to parse.
    Syntax(String),
}

/// The analyzer's window onto the rest of the project: parsed modules on
/// demand, by path or by declared package name.
pub trait ModuleLoader {
    fn module_by_path(&self, path: &str) -> Result<Arc<Module>, LoadError>;
    fn module_by_name(&self, name: &str) -> Option<Arc<Module>>;
}

/// A loader with no modules, for single-file analysis.
pub struct NullLoader;

impl ModuleLoader for NullLoader {
    fn module_by_path(&self, _path: &str) -> Result<Arc<Module>, LoadError> {
        Err(LoadError::NotFound)
    }

    fn module_by_name(&self, _name: &str) -> Option<Arc<Module>> {
        None
    }
}

/// An in-memory loader backed by a map, used by embedders and tests.
#[derive(Default)]
pub struct MapLoader {
    by_name: FxHashMap<String, Arc<Module>>,
    by_path: FxHashMap<String, Arc<Module>>,
}

impl MapLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, module: Module) {
        let module = Arc::new(module);
        self.by_name.insert(module.name.clone(), module.clone());
        self.by_path.insert(module.path.clone(), module);
    }
}

impl ModuleLoader for MapLoader {
    fn module_by_path(&self, path: &str) -> Result<Arc<Module>, LoadError> {
        self.by_path.get(path).cloned().ok_or(LoadError::NotFound)
    }

    fn module_by_name(&self, name: &str) -> Option<Arc<Module>> {
        self.by_name.get(name).cloned()
    }
}

/// The four analysis-state flags of one module.
#[derive(Debug, Default)]
struct ModuleState {
    headers_analyzed: bool,
    headers_analyzing: bool,
    bodies_analyzed: bool,
    bodies_analyzing: bool,
}

/// Everything a module publishes to its importers.
#[derive(Debug, Default, Clone)]
pub struct ModuleExports {
    pub module_name: String,
    pub symbols: FxHashMap<String, Symbol>,
    pub trait_type_params: FxHashMap<String, Vec<String>>,
    pub trait_param_kinds: FxHashMap<String, Vec<Kind>>,
    pub trait_supers: FxHashMap<String, Vec<String>>,
    pub trait_methods: FxHashMap<String, Vec<String>>,
    pub trait_default_methods: FxHashMap<String, Vec<String>>,
    pub trait_for_method: FxHashMap<String, String>,
    pub return_dispatch: FxHashSet<String>,
    pub operator_traits: FxHashMap<String, (String, String)>,
    pub instances: Vec<InstanceDef>,
    pub kinds: FxHashMap<String, Kind>,
    pub type_params: FxHashMap<String, Vec<String>>,
    pub variants: FxHashMap<String, Vec<String>>,
    pub extension_methods: FxHashMap<String, FxHashMap<String, Ty>>,
    pub trait_defaults: FxHashMap<String, FnExpr>,
}

/// Drives the four-phase protocol over the module graph.
pub struct Analyzer<'a> {
    loader: &'a dyn ModuleLoader,
    states: FxHashMap<String, ModuleState>,
    analyses: FxHashMap<String, Analysis>,
    exports: FxHashMap<String, ModuleExports>,
}

impl<'a> Analyzer<'a> {
    pub fn new(loader: &'a dyn ModuleLoader) -> Self {
        Analyzer {
            loader,
            states: FxHashMap::default(),
            analyses: FxHashMap::default(),
            exports: FxHashMap::default(),
        }
    }

    /// Full analysis of the entry module: all four passes, dependencies
    /// included.
    pub fn analyze(&mut self, module: &Module) -> AnalysisResult {
        self.ensure_headers(module);
        let result_type = self.ensure_bodies(module);

        let mut an = self
            .analyses
            .remove(&module.name)
            .unwrap_or_else(|| Analysis::new(module.name.as_str()));
        let mut errors = std::mem::take(&mut an.ctx.errors);
        for (_, other) in self.analyses.drain() {
            errors.extend(other.ctx.errors);
        }
        dedup_and_sort(&mut errors);
        AnalysisResult {
            types: an.ctx.types,
            calls: an.ctx.calls,
            errors,
            trait_defaults: an.trait_defaults,
            symbols: an.symbols,
            result_type,
        }
    }

    /// Naming → Headers → Instances for a module and (recursively) its
    /// dependencies' headers.
    fn ensure_headers(&mut self, module: &Module) {
        {
            let state = self.states.entry(module.name.clone()).or_default();
            if state.headers_analyzed || state.headers_analyzing {
                return;
            }
            state.headers_analyzing = true;
        }
        let mut an = self
            .analyses
            .remove(&module.name)
            .unwrap_or_else(|| Analysis::new(module.name.as_str()));

        for file in &module.files {
            decls::declare_file(&mut an, file);
        }
        self.process_imports(&mut an, module, false);
        for file in &module.files {
            decls::resolve_headers(&mut an, file);
        }
        for file in &module.files {
            decls::register_instances(&mut an, file);
        }

        let mut exports = self.collect_exports(&mut an, module);
        self.apply_reexports(&mut an, module, &mut exports);
        self.exports.insert(module.name.clone(), exports);
        self.analyses.insert(module.name.clone(), an);

        let state = self
            .states
            .get_mut(&module.name)
            .expect("state was created above");
        state.headers_analyzing = false;
        state.headers_analyzed = true;
    }

    /// Bodies for a module and (recursively) its dependencies' bodies.
    fn ensure_bodies(&mut self, module: &Module) -> Option<Ty> {
        {
            let state = self.states.entry(module.name.clone()).or_default();
            if state.bodies_analyzed || state.bodies_analyzing {
                return None;
            }
            state.bodies_analyzing = true;
        }

        // Dependencies' bodies run first (cycles return immediately).
        for file in &module.files {
            for decl in &file.decls {
                if let DeclKind::Import(imp) = &decl.kind {
                    if let Some(dep) = self.load(&imp.module) {
                        self.ensure_headers(&dep);
                        self.ensure_bodies(&dep);
                    }
                }
            }
        }

        let mut an = self
            .analyses
            .remove(&module.name)
            .unwrap_or_else(|| Analysis::new(module.name.as_str()));

        // Refresh imported symbols: header-time installs may predate the
        // exporter finishing its own headers (cycles).
        self.reinstall_imports(&mut an, module);

        let mut last = None;
        for file in &module.files {
            last = infer::infer_bodies(&mut an, file).or(last);
        }
        witness::finalize_module(&mut an);
        for file in &module.files {
            tailcall::mark_file(&mut an.ctx.calls, file);
        }
        let result = last.map(|t| an.ctx.resolve(&t));

        // Re-collect exports so importers see generalized body types.
        let mut exports = self.collect_exports(&mut an, module);
        self.apply_reexports(&mut an, module, &mut exports);
        self.exports.insert(module.name.clone(), exports);
        self.analyses.insert(module.name.clone(), an);

        let state = self
            .states
            .get_mut(&module.name)
            .expect("state was created above");
        state.bodies_analyzing = false;
        state.bodies_analyzed = true;
        result
    }

    fn load(&self, name: &str) -> Option<Arc<Module>> {
        self.loader
            .module_by_name(name)
            .or_else(|| self.loader.module_by_path(name).ok())
    }

    /// Resolve and install every import of a module's files. With
    /// `quiet`, installation errors are suppressed (used when
    /// re-installing at the Bodies phase).
    fn process_imports(&mut self, an: &mut Analysis, module: &Module, quiet: bool) {
        for file in &module.files {
            an.ctx.file = file.path.clone();
            for decl in &file.decls {
                let DeclKind::Import(imp) = &decl.kind else {
                    continue;
                };
                let Some(dep) = self.load(&imp.module) else {
                    if !quiet {
                        an.ctx.error(
                            SemaErrorKind::UnknownModule {
                                name: imp.module.clone(),
                            },
                            decl.span,
                        );
                    }
                    continue;
                };
                self.ensure_headers(&dep);
                an.imported_modules.insert(dep.name.clone());
                let lenient = self
                    .states
                    .get(&dep.name)
                    .map_or(false, |s| s.headers_analyzing);
                if let Some(exports) = self.exports.get(&dep.name) {
                    install_import(an, imp, exports, decl.span, quiet || lenient);
                }
                // A dependency still mid-headers (cycle) publishes its
                // exports later; the Bodies-phase refresh picks them up.
            }
        }
    }

    fn reinstall_imports(&mut self, an: &mut Analysis, module: &Module) {
        self.process_imports(an, module, true);
    }

    /// Gather a module's exports from its analysis: explicit export lists
    /// when present, otherwise every non-builtin global.
    fn collect_exports(&mut self, an: &mut Analysis, module: &Module) -> ModuleExports {
        let mut explicit: Option<FxHashSet<String>> = None;
        for file in &module.files {
            if let Some(list) = &file.exports {
                an.ctx.file = file.path.clone();
                let set = explicit.get_or_insert_with(FxHashSet::default);
                for name in list {
                    if an.symbols.lookup_global(name).is_none() {
                        an.ctx.error(
                            SemaErrorKind::ExportUndefined { name: name.clone() },
                            Span::dummy(),
                        );
                    } else {
                        set.insert(name.clone());
                    }
                }
            }
        }

        let mut exports = ModuleExports {
            module_name: module.name.clone(),
            ..Default::default()
        };
        // Implicit exports cover locally defined symbols only; imported
        // symbols travel further only through explicit re-exports.
        let exported_names: Vec<String> = match &explicit {
            Some(set) => set.iter().cloned().collect(),
            None => an
                .symbols
                .globals()
                .filter(|s| !an.builtin_names.contains(&s.name) && s.module.is_none())
                .map(|s| s.name.clone())
                .collect(),
        };

        for name in &exported_names {
            let Some(sym) = an.symbols.lookup_global(name) else {
                continue;
            };
            let mut sym = sym.clone();
            if sym.module.is_none() {
                sym.module = Some(module.name.clone());
            }
            exports.symbols.insert(name.clone(), sym);
        }

        // Trait metadata for exported traits, type metadata for exported
        // types.
        for name in &exported_names {
            if let Some(params) = an.symbols.trait_type_params.get(name) {
                exports
                    .trait_type_params
                    .insert(name.clone(), params.clone());
                if let Some(kinds) = an.symbols.trait_param_kinds.get(name) {
                    exports.trait_param_kinds.insert(name.clone(), kinds.clone());
                }
                if let Some(supers) = an.symbols.trait_supers.get(name) {
                    exports.trait_supers.insert(name.clone(), supers.clone());
                }
                if let Some(methods) = an.symbols.trait_methods.get(name) {
                    exports.trait_methods.insert(name.clone(), methods.clone());
                    for method in methods {
                        exports
                            .trait_for_method
                            .insert(method.clone(), name.clone());
                        if an.symbols.return_dispatch_methods.contains(method) {
                            exports.return_dispatch.insert(method.clone());
                        }
                    }
                }
                if let Some(defaults) = an.symbols.trait_default_methods.get(name) {
                    exports
                        .trait_default_methods
                        .insert(name.clone(), defaults.clone());
                }
            }
            if let Some(kind) = an.symbols.kinds.get(name) {
                exports.kinds.insert(name.clone(), kind.clone());
            }
            if let Some(params) = an.symbols.type_params.get(name) {
                exports.type_params.insert(name.clone(), params.clone());
            }
            if let Some(variants) = an.symbols.variants.get(name) {
                exports.variants.insert(name.clone(), variants.clone());
            }
        }

        for (op, (trait_name, method)) in &an.symbols.operator_traits {
            if exports.trait_type_params.contains_key(trait_name) {
                exports
                    .operator_traits
                    .insert(op.clone(), (trait_name.clone(), method.clone()));
            }
        }
        exports.instances = an.symbols.all_instances().cloned().collect();
        exports.extension_methods = an.symbols.extension_methods.clone();
        exports.trait_defaults = an.trait_defaults.clone();
        exports
    }

    /// Apply re-export declarations: each republished name must come from
    /// a module this one imported.
    fn apply_reexports(&mut self, an: &mut Analysis, module: &Module, exports: &mut ModuleExports) {
        for file in &module.files {
            an.ctx.file = file.path.clone();
            for decl in &file.decls {
                let DeclKind::Reexport(re) = &decl.kind else {
                    continue;
                };
                if !an.imported_modules.contains(&re.module) {
                    an.ctx.error(
                        SemaErrorKind::ReexportNotImported {
                            module: re.module.clone(),
                        },
                        decl.span,
                    );
                    continue;
                }
                let Some(dep_exports) = self.exports.get(&re.module) else {
                    continue;
                };
                let names: Vec<String> = if re.names.is_empty() {
                    dep_exports.symbols.keys().cloned().collect()
                } else {
                    re.names.clone()
                };
                for name in names {
                    match dep_exports.symbols.get(&name) {
                        Some(sym) => {
                            exports.symbols.insert(name.clone(), sym.clone());
                        }
                        None => {
                            an.ctx.error(
                                SemaErrorKind::UnknownExport {
                                    module: re.module.clone(),
                                    name,
                                },
                                decl.span,
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Install one import's selection into the importing module's scope.
fn install_import(
    an: &mut Analysis,
    imp: &ImportDecl,
    exports: &ModuleExports,
    span: Span,
    quiet: bool,
) {
    match &imp.selector {
        ImportSelector::Qualified => install_qualified(an, imp, exports),
        ImportSelector::All => {
            let names: Vec<String> = exports.symbols.keys().cloned().collect();
            install_selective(an, exports, &names, span, quiet);
        }
        ImportSelector::Names(names) => {
            install_selective(an, exports, names, span, quiet);
        }
        ImportSelector::Excluding(excluded) => {
            let names: Vec<String> = exports
                .symbols
                .keys()
                .filter(|n| !excluded.contains(*n))
                .cloned()
                .collect();
            install_selective(an, exports, &names, span, quiet);
        }
    }
}

fn last_segment(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_string()
}

/// Qualified import: a module record plus module-tagged trait and
/// instance copies. Type constructors are tagged with the alias so
/// `Alias.Type` resolves in annotations.
fn install_qualified(an: &mut Analysis, imp: &ImportDecl, exports: &ModuleExports) {
    let alias = imp
        .alias
        .clone()
        .unwrap_or_else(|| last_segment(&exports.module_name));
    an.symbols
        .module_aliases
        .insert(alias.clone(), exports.module_name.clone());

    // The module record: one field per export.
    let fields: std::collections::BTreeMap<String, Ty> = exports
        .symbols
        .iter()
        .map(|(name, sym)| (name.clone(), sym.ty.clone()))
        .collect();
    let mut record_sym = Symbol::new(
        alias.as_str(),
        SymbolKind::Module,
        Ty::Record {
            fields,
            open: false,
            row: None,
        },
    );
    record_sym.module = Some(exports.module_name.clone());
    an.symbols.insert_global(record_sym);

    // Qualified type names: `Alias.Type` resolves in annotations, with
    // the kind registry extended to match.
    for (name, sym) in &exports.symbols {
        if sym.kind == SymbolKind::Type {
            let qualified = format!("{}.{}", alias, name);
            let mut qsym = sym.clone();
            qsym.name = qualified.clone();
            an.symbols.insert_global(qsym);
            if let Some(kind) = exports.kinds.get(name) {
                an.symbols.kinds.insert(qualified.clone(), kind.clone());
            }
            if let Some(params) = exports.type_params.get(name) {
                an.symbols.type_params.insert(qualified, params.clone());
            }
        }
    }

    // Trait definitions duplicated under the qualified name.
    for (trait_name, params) in &exports.trait_type_params {
        let qualified = format!("{}.{}", alias, trait_name);
        an.symbols
            .trait_type_params
            .insert(qualified.clone(), params.clone());
        if let Some(kinds) = exports.trait_param_kinds.get(trait_name) {
            an.symbols
                .trait_param_kinds
                .insert(qualified.clone(), kinds.clone());
        }
        if let Some(supers) = exports.trait_supers.get(trait_name) {
            an.symbols.trait_supers.insert(qualified.clone(), supers.clone());
        }
        if let Some(methods) = exports.trait_methods.get(trait_name) {
            an.symbols.trait_methods.insert(qualified.clone(), methods.clone());
        }
        if let Some(defaults) = exports.trait_default_methods.get(trait_name) {
            an.symbols
                .trait_default_methods
                .insert(qualified, defaults.clone());
        }
    }

    // Instances for exported types are copied with module-tagged names.
    for inst in &exports.instances {
        let mut tagged = inst.clone();
        tagged.type_names = tagged
            .type_names
            .iter()
            .map(|n| {
                let is_exported_type = exports
                    .symbols
                    .get(n)
                    .map_or(false, |s| s.kind == SymbolKind::Type);
                if is_exported_type {
                    format!("{}.{}", alias, n)
                } else {
                    n.clone()
                }
            })
            .collect();
        tagged.module = Some(exports.module_name.clone());
        an.symbols.adopt_instance(tagged);
    }

    for (key, body) in &exports.trait_defaults {
        an.trait_defaults
            .entry(key.clone())
            .or_insert_with(|| body.clone());
    }
}

/// Selective import: install each chosen symbol under its own name.
/// Importing a trait method implicitly imports its trait; importing a
/// type implicitly imports its constructors. Duplicates from the same
/// origin are fine; from different origins, fatal. Type constructors are
/// deliberately *not* module-tagged on this path.
fn install_selective(
    an: &mut Analysis,
    exports: &ModuleExports,
    names: &[String],
    span: Span,
    quiet: bool,
) {
    let mut to_install: Vec<String> = Vec::new();
    for name in names {
        if !exports.symbols.contains_key(name) {
            if !quiet {
                an.ctx.error(
                    SemaErrorKind::UnknownExport {
                        module: exports.module_name.clone(),
                        name: name.clone(),
                    },
                    span,
                );
            }
            continue;
        }
        to_install.push(name.clone());
        if let Some(trait_name) = exports.trait_for_method.get(name) {
            to_install.push(trait_name.clone());
        }
        if let Some(ctors) = exports.variants.get(name) {
            to_install.extend(ctors.iter().cloned());
        }
    }
    let mut seen = FxHashSet::default();
    to_install.retain(|n| seen.insert(n.clone()));

    for name in &to_install {
        let Some(sym) = exports.symbols.get(name) else {
            continue;
        };
        // The symbol's origin is the module that defined it, surviving
        // re-export chains: the same symbol reached via several paths is
        // no conflict, two different symbols under one name are.
        let origin = sym
            .module
            .clone()
            .unwrap_or_else(|| exports.module_name.clone());
        if let Some(existing) = an.symbols.lookup_global(name) {
            let conflict = match &existing.module {
                Some(prior) => prior != &origin,
                None => !existing.pending,
            };
            if conflict {
                if !quiet {
                    let first = existing
                        .module
                        .clone()
                        .unwrap_or_else(|| an.module_name.clone());
                    an.ctx.error(
                        SemaErrorKind::ConflictingImport {
                            name: name.clone(),
                            first,
                            second: origin.clone(),
                        },
                        span,
                    );
                }
                continue;
            }
        }
        let mut installed = sym.clone();
        installed.module = Some(origin);
        an.symbols.insert_global(installed);

        if let Some(trait_name) = exports.trait_for_method.get(name) {
            an.symbols
                .trait_for_method
                .insert(name.clone(), trait_name.clone());
            if exports.return_dispatch.contains(name) {
                an.symbols.return_dispatch_methods.insert(name.clone());
            }
        }
        if let Some(params) = exports.trait_type_params.get(name) {
            an.symbols
                .trait_type_params
                .insert(name.clone(), params.clone());
            if let Some(kinds) = exports.trait_param_kinds.get(name) {
                an.symbols.trait_param_kinds.insert(name.clone(), kinds.clone());
            }
            if let Some(supers) = exports.trait_supers.get(name) {
                an.symbols.trait_supers.insert(name.clone(), supers.clone());
            }
            if let Some(methods) = exports.trait_methods.get(name) {
                an.symbols.trait_methods.insert(name.clone(), methods.clone());
            }
            if let Some(defaults) = exports.trait_default_methods.get(name) {
                an.symbols
                    .trait_default_methods
                    .insert(name.clone(), defaults.clone());
            }
        }
        if sym.kind == SymbolKind::Type {
            if let Some(kind) = exports.kinds.get(name) {
                an.symbols.kinds.insert(name.clone(), kind.clone());
            }
            if let Some(params) = exports.type_params.get(name) {
                an.symbols.type_params.insert(name.clone(), params.clone());
            }
            if let Some(variants) = exports.variants.get(name) {
                an.symbols.variants.insert(name.clone(), variants.clone());
            }
        }
    }

    // Operators travel with their traits.
    for (op, (trait_name, method)) in &exports.operator_traits {
        if to_install.iter().any(|n| n == trait_name) {
            an.symbols
                .operator_traits
                .entry(op.clone())
                .or_insert_with(|| (trait_name.clone(), method.clone()));
        }
    }

    // Imported instances are globally visible to the importer.
    for inst in &exports.instances {
        an.symbols.adopt_instance(inst.clone());
    }
    for (type_name, methods) in &exports.extension_methods {
        let entry = an
            .symbols
            .extension_methods
            .entry(type_name.clone())
            .or_default();
        for (method, ty) in methods {
            entry.entry(method.clone()).or_insert_with(|| ty.clone());
        }
    }
    for (key, body) in &exports.trait_defaults {
        an.trait_defaults
            .entry(key.clone())
            .or_insert_with(|| body.clone());
    }
}
