//! Declaration handling: the Naming, Headers, and Instances phases.
//!
//! Naming installs every top-level name as a pending symbol so forward
//! references resolve. Headers elaborates type declarations, trait
//! declarations, and function signatures. Instances registers trait
//! implementations, checking kinds, superclasses, and method signatures.

use rustc_hash::FxHashMap;
use vesper_ast::decl::{
    Decl, DeclKind, FnDecl, InstanceDecl, TraitDecl, TypeDecl, TypeDeclBody,
};
use vesper_ast::expr::{FnExpr, LetTarget};
use vesper_ast::module::File;
use vesper_ast::types::{TypeExpr, TypeExprKind};
use vesper_common::Span;

use crate::env::{canonical_type_name, InstanceDef, Symbol, SymbolKind};
use crate::error::SemaErrorKind;
use crate::ty::{ClassConstraint, Kind, Subst, Ty, TyCon};
use crate::unify::{check_app_kinds, kind_of};
use crate::{Analysis, FnSig};

// ── Naming ─────────────────────────────────────────────────────────────

/// Install every top-level declaration of a file as a pending symbol.
pub fn declare_file(an: &mut Analysis, file: &File) {
    an.ctx.file = file.path.clone();
    for decl in &file.decls {
        declare_decl(an, decl);
    }
}

fn declare_decl(an: &mut Analysis, decl: &Decl) {
    match &decl.kind {
        DeclKind::Fn(f) => {
            pending(an, &f.name, SymbolKind::Constant, decl.span);
        }
        DeclKind::Let(l) => {
            if let LetTarget::Name(name) = &l.target {
                let kind = if l.constant {
                    SymbolKind::Constant
                } else {
                    SymbolKind::Variable
                };
                pending(an, name, kind, decl.span);
            }
        }
        DeclKind::Type(t) => {
            if an.symbols.lookup_local(&t.name).is_some() {
                an.ctx.error(
                    SemaErrorKind::TypeRedefined {
                        name: t.name.clone(),
                    },
                    decl.span,
                );
            }
            pending(an, &t.name, SymbolKind::Type, decl.span);
            an.symbols
                .kinds
                .insert(t.name.clone(), Kind::of_arity(t.params.len()));
            an.symbols
                .type_params
                .insert(t.name.clone(), t.params.clone());
            if let TypeDeclBody::Adt(variants) = &t.body {
                let names: Vec<String> = variants.iter().map(|v| v.name.clone()).collect();
                for v in variants {
                    pending(an, &v.name, SymbolKind::Constructor, v.span);
                }
                an.symbols.variants.insert(t.name.clone(), names);
            }
        }
        DeclKind::Trait(t) => {
            if an.symbols.lookup_local(&t.name).is_some() {
                an.ctx.error(
                    SemaErrorKind::TypeRedefined {
                        name: t.name.clone(),
                    },
                    decl.span,
                );
            }
            pending(an, &t.name, SymbolKind::Trait, decl.span);
            for m in &t.methods {
                pending(an, &m.name, SymbolKind::Constant, m.span);
            }
        }
        DeclKind::Instance(_)
        | DeclKind::Import(_)
        | DeclKind::Reexport(_)
        | DeclKind::Expr(_) => {}
    }
}

fn pending(an: &mut Analysis, name: &str, kind: SymbolKind, span: Span) {
    if let Err(err) = an.symbols.insert(Symbol::pending(name, kind)) {
        an.ctx.error(err, span);
    }
}

// ── Headers ────────────────────────────────────────────────────────────

/// Resolve headers: type declarations, trait declarations, function
/// signatures, annotated bindings. Imports are handled by the driver.
pub fn resolve_headers(an: &mut Analysis, file: &File) {
    an.ctx.file = file.path.clone();
    for decl in &file.decls {
        match &decl.kind {
            DeclKind::Type(t) => resolve_type_decl(an, t, decl.span),
            DeclKind::Trait(t) => resolve_trait_decl(an, t, decl.span),
            DeclKind::Fn(f) => resolve_fn_header(an, f, decl.span),
            DeclKind::Let(l) => {
                if let (LetTarget::Name(name), Some(ann)) = (&l.target, &l.ann) {
                    let ty = build_type(an, ann, &FxHashMap::default());
                    let kind = if l.constant {
                        SymbolKind::Constant
                    } else {
                        SymbolKind::Variable
                    };
                    // Still pending: the Bodies phase finalizes the
                    // binding after checking its initializer.
                    let mut sym = Symbol::new(name.as_str(), kind, ty);
                    sym.pending = true;
                    an.symbols.insert_unchecked(sym);
                }
            }
            DeclKind::Instance(_)
            | DeclKind::Import(_)
            | DeclKind::Reexport(_)
            | DeclKind::Expr(_) => {}
        }
    }
}

fn resolve_type_decl(an: &mut Analysis, t: &TypeDecl, _span: Span) {
    let mut params: FxHashMap<String, Ty> = FxHashMap::default();
    for p in &t.params {
        params.insert(p.clone(), Ty::var(p.clone()));
    }
    match &t.body {
        TypeDeclBody::Alias(underlying_expr) => {
            let underlying = build_type(an, underlying_expr, &params);
            let con = Ty::Con(TyCon::alias(t.name.as_str(), underlying.clone()));
            let mut sym = Symbol::new(t.name.as_str(), SymbolKind::Type, Ty::TypeOfType(Box::new(con)));
            sym.underlying = Some(underlying);
            an.symbols.insert_unchecked(sym);
        }
        TypeDeclBody::Adt(variants) => {
            let applied = if t.params.is_empty() {
                Ty::con(t.name.as_str())
            } else {
                Ty::App(
                    Box::new(Ty::con(t.name.as_str())),
                    t.params.iter().map(|p| Ty::var(p.clone())).collect(),
                )
            };
            for v in variants {
                let fields: Vec<Ty> = v
                    .fields
                    .iter()
                    .map(|f| build_type(an, f, &params))
                    .collect();
                let ctor_ty = if fields.is_empty() {
                    applied.clone()
                } else {
                    Ty::func(fields, applied.clone())
                };
                let ctor_ty = if t.params.is_empty() {
                    ctor_ty
                } else {
                    Ty::forall(t.params.clone(), vec![], ctor_ty)
                };
                an.symbols.insert_unchecked(Symbol::new(
                v.name.as_str(),
                    SymbolKind::Constructor,
                    ctor_ty,
                ));
            }
            an.symbols.insert_unchecked(Symbol::new(
                t.name.as_str(),
                SymbolKind::Type,
                Ty::TypeOfType(Box::new(Ty::con(t.name.as_str()))),
            ));
        }
    }
}

fn resolve_trait_decl(an: &mut Analysis, t: &TraitDecl, _span: Span) {
    an.symbols
        .trait_type_params
        .insert(t.name.clone(), t.type_params.clone());
    an.symbols
        .trait_supers
        .insert(t.name.clone(), t.supers.clone());
    an.symbols.trait_methods.insert(
        t.name.clone(),
        t.methods.iter().map(|m| m.name.clone()).collect(),
    );

    // Infer each type parameter's kind from the method signatures: a
    // parameter applied to n arguments anywhere has an n-arrow kind.
    let mut param_kinds = Vec::new();
    let mut param_tys: FxHashMap<String, Ty> = FxHashMap::default();
    for p in &t.type_params {
        let mut arity = 0usize;
        for m in &t.methods {
            for te in m.params.iter().chain(std::iter::once(&m.ret)) {
                arity = arity.max(applied_arity(te, p));
            }
        }
        let kind = Kind::of_arity(arity);
        param_kinds.push(kind.clone());
        param_tys.insert(p.clone(), Ty::var_k(p.clone(), kind));
    }
    an.symbols
        .trait_param_kinds
        .insert(t.name.clone(), param_kinds);

    let constraint = ClassConstraint::new(
        t.name.clone(),
        t.type_params.iter().map(|p| param_tys[p].clone()).collect(),
    );

    let mut defaults = Vec::new();
    for m in &t.methods {
        let params: Vec<Ty> = m.params.iter().map(|p| build_type(an, p, &param_tys)).collect();
        let ret = build_type(an, &m.ret, &param_tys);

        // Return-type-directed dispatch: the method's only mention of a
        // trait parameter is in return position.
        let params_mention = m
            .params
            .iter()
            .any(|p| t.type_params.iter().any(|tp| mentions(p, tp)));
        let ret_mentions = t.type_params.iter().any(|tp| mentions(&m.ret, tp));
        if !params_mention && ret_mentions {
            an.symbols.return_dispatch_methods.insert(m.name.clone());
        }

        let fn_ty = Ty::Func {
            params,
            ret: Box::new(ret),
            variadic: false,
            default_count: 0,
            constraints: vec![constraint.clone()],
        };
        // Quantify the trait parameters and the method-local variables, so
        // call sites instantiate both.
        let mut qvars = t.type_params.clone();
        for v in fn_ty.free_vars() {
            if !qvars.contains(&v) {
                qvars.push(v);
            }
        }
        let scheme = Ty::forall(qvars, vec![constraint.clone()], fn_ty);
        an.symbols
            .insert_unchecked(Symbol::new(m.name.as_str(), SymbolKind::Constant, scheme));
        an.symbols
            .trait_for_method
            .insert(m.name.clone(), t.name.clone());

        if let Some(op) = &m.operator {
            match an.symbols.operator_traits.get(op) {
                Some((prior, _)) if prior != &t.name => {
                    let prior = prior.clone();
                    an.ctx.error(
                        SemaErrorKind::OperatorClaimed {
                            op: op.clone(),
                            trait_name: t.name.clone(),
                            prior,
                        },
                        m.span,
                    );
                }
                _ => {
                    an.symbols
                        .operator_traits
                        .insert(op.clone(), (t.name.clone(), m.name.clone()));
                }
            }
        }

        if let Some(body) = &m.default_body {
            defaults.push(m.name.clone());
            an.trait_defaults
                .insert(format!("{}.{}", t.name, m.name), body.clone());
        }
    }
    an.symbols
        .trait_default_methods
        .insert(t.name.clone(), defaults);

    an.symbols
        .insert_unchecked(Symbol::new(t.name.as_str(), SymbolKind::Trait, Ty::con(t.name.as_str())));
}

fn resolve_fn_header(an: &mut Analysis, f: &FnDecl, span: Span) {
    let sig = build_fn_sig(an, &f.fn_expr);
    let fn_ty = Ty::Func {
        params: sig.params.clone(),
        ret: Box::new(sig.ret.clone()),
        variadic: sig.variadic,
        default_count: sig.default_count,
        constraints: sig.constraints.clone(),
    };
    let rigid: Vec<String> = fn_ty
        .free_vars()
        .into_iter()
        .filter(|v| !an.ctx.is_inference_var(v))
        .collect();
    let header_ty = if rigid.is_empty() {
        fn_ty
    } else {
        Ty::forall(rigid, sig.constraints.clone(), fn_ty)
    };
    if let Err(err) = an
        .symbols
        .insert(Symbol::new(f.name.as_str(), SymbolKind::Constant, header_ty))
    {
        an.ctx.error(err, span);
    }
    an.fn_sigs.insert(f.name.clone(), sig);
}

/// Build the open (unquantified) signature of a function expression.
pub fn build_fn_sig(an: &mut Analysis, f: &FnExpr) -> FnSig {
    let mut type_params: FxHashMap<String, Ty> = FxHashMap::default();
    for p in &f.type_params {
        type_params.insert(p.clone(), Ty::var(p.clone()));
    }

    let mut params = Vec::new();
    for (i, p) in f.params.iter().enumerate() {
        let base = match &p.ann {
            Some(ann) => build_type(an, ann, &type_params),
            None => an.ctx.fresh_var(),
        };
        // Variadic parameters collect into a List.
        let ty = if f.variadic && i == f.params.len() - 1 {
            Ty::list(base)
        } else {
            base
        };
        params.push(ty);
    }

    let ret = match &f.ret {
        Some(ann) => build_type(an, ann, &type_params),
        None => an.ctx.fresh_var(),
    };

    let constraints: Vec<ClassConstraint> = f
        .constraints
        .iter()
        .map(|c| {
            let mut args = vec![type_params
                .get(&c.var)
                .cloned()
                .unwrap_or_else(|| Ty::var(c.var.clone()))];
            for extra in &c.extra {
                args.push(build_type(an, extra, &type_params));
            }
            ClassConstraint::new(c.trait_name.clone(), args)
        })
        .collect();

    FnSig {
        type_params,
        params,
        ret,
        constraints,
        variadic: f.variadic,
        default_count: f.default_count,
    }
}

// ── Instances ──────────────────────────────────────────────────────────

/// Register every instance declaration of a file.
pub fn register_instances(an: &mut Analysis, file: &File) {
    an.ctx.file = file.path.clone();
    for decl in &file.decls {
        if let DeclKind::Instance(inst) = &decl.kind {
            register_instance_decl(an, inst, decl.span);
        }
    }
}

fn register_instance_decl(an: &mut Analysis, inst: &InstanceDecl, span: Span) {
    // Resolve the trait, qualified names included.
    let trait_name = if an.symbols.trait_type_params.contains_key(&inst.trait_name) {
        inst.trait_name.clone()
    } else {
        an.ctx.error(
            SemaErrorKind::UnknownTrait {
                name: inst.trait_name.clone(),
            },
            span,
        );
        return;
    };
    let trait_params = an.symbols.trait_type_params[&trait_name].clone();
    let expected_kinds = an
        .symbols
        .trait_param_kinds
        .get(&trait_name)
        .cloned()
        .unwrap_or_else(|| vec![Kind::Star; trait_params.len()]);

    if inst.targets.len() != trait_params.len() {
        an.ctx.error(
            SemaErrorKind::ArityMismatch {
                expected: trait_params.len(),
                found: inst.targets.len(),
            },
            span,
        );
        return;
    }

    // Build target types; variables mentioned in the targets are rigid.
    // Variables colliding with trait parameter names are renamed to avoid
    // accidental capture during the signature substitution below.
    let mut target_params: FxHashMap<String, Ty> = FxHashMap::default();
    for target_expr in &inst.targets {
        collect_type_vars(target_expr, &mut |name| {
            let fixed = if trait_params.iter().any(|p| p == name) {
                format!("{}_", name)
            } else {
                name.to_string()
            };
            target_params
                .entry(name.to_string())
                .or_insert_with(|| Ty::var(fixed));
        });
    }
    let targets: Vec<Ty> = inst
        .targets
        .iter()
        .map(|te| build_type(an, te, &target_params))
        .collect();

    // Kind check each target against the trait's expected parameter kind.
    for (target, expected) in targets.iter().zip(&expected_kinds) {
        let found = kind_of(target, &an.symbols.kinds);
        if &found != expected {
            an.ctx.error(
                SemaErrorKind::InstanceKindMismatch {
                    trait_name: trait_name.clone(),
                    expected: expected.clone(),
                    found,
                },
                span,
            );
        }
    }

    let type_names: Vec<String> = targets.iter().map(canonical_type_name).collect();

    // Superclasses must already be implemented for the target.
    for super_name in an.symbols.trait_supers.get(&trait_name).cloned().unwrap_or_default() {
        if !an.symbols.has_instance(&super_name, &type_names) {
            an.ctx.error(
                SemaErrorKind::MissingSuperclass {
                    trait_name: trait_name.clone(),
                    super_name,
                    target: type_names.join(", "),
                },
                span,
            );
        }
    }

    // Substitute the trait's type parameters with the targets in each
    // method's trait signature, then check the instance's declared
    // signature against it.
    let mut trait_subst = Subst::empty();
    for (p, target) in trait_params.iter().zip(&targets) {
        trait_subst.insert(p.clone(), target.clone());
    }

    let declared_methods = an
        .symbols
        .trait_methods
        .get(&trait_name)
        .cloned()
        .unwrap_or_default();
    let defaults = an
        .symbols
        .trait_default_methods
        .get(&trait_name)
        .cloned()
        .unwrap_or_default();

    let mut methods: FxHashMap<String, Ty> = FxHashMap::default();
    for method in &inst.methods {
        if !declared_methods.iter().any(|m| m == &method.name) {
            an.ctx.error(
                SemaErrorKind::ExtraMethod {
                    trait_name: trait_name.clone(),
                    method: method.name.clone(),
                },
                span,
            );
            continue;
        }
        let expected = expected_method_ty(an, &method.name, &trait_subst);
        let declared = declared_method_ty(an, &method.fn_expr, &target_params);
        if let Some(expected) = expected {
            let re = an.ctx.resolve(&expected);
            let rd = an.ctx.resolve(&declared);
            match an.ctx.unify(&re, &rd, &an.symbols) {
                Ok(s) => an.ctx.extend(&s),
                Err(_) => {
                    an.ctx.error(
                        SemaErrorKind::MethodSignatureMismatch {
                            trait_name: trait_name.clone(),
                            method: method.name.clone(),
                            expected: re,
                            found: rd,
                        },
                        span,
                    );
                }
            }
            let resolved = an.ctx.resolve(&expected);
            an.fn_sigs.insert(
                instance_method_key(&trait_name, &type_names, &method.name),
                method_sig_of(&resolved, &target_params),
            );
            methods.insert(method.name.clone(), resolved);
        }
    }

    // Required methods without a default must be provided.
    for required in &declared_methods {
        if !methods.contains_key(required) && !defaults.iter().any(|d| d == required) {
            an.ctx.error(
                SemaErrorKind::MissingMethod {
                    trait_name: trait_name.clone(),
                    method: required.clone(),
                    target: type_names.join(", "),
                },
                span,
            );
        }
    }

    // Extension methods: member access on the target type can reach the
    // instance's methods.
    if let Some(primary) = type_names.first() {
        let entry = an
            .symbols
            .extension_methods
            .entry(primary.clone())
            .or_default();
        for (name, ty) in &methods {
            entry.insert(name.clone(), ty.clone());
        }
    }

    let constraints: Vec<ClassConstraint> = inst
        .constraints
        .iter()
        .map(|c| {
            let mut args = vec![target_params
                .get(&c.var)
                .cloned()
                .unwrap_or_else(|| Ty::var(c.var.clone()))];
            for extra in &c.extra {
                args.push(build_type(an, extra, &target_params));
            }
            ClassConstraint::new(c.trait_name.clone(), args)
        })
        .collect();

    if let Err(err) = an.symbols.register_instance(InstanceDef {
        trait_name,
        type_names,
        targets,
        constraints,
        methods,
        module: None,
    }) {
        an.ctx.error(err, span);
    }
}

/// The registry key for an instance method's checked signature.
pub fn instance_method_key(trait_name: &str, type_names: &[String], method: &str) -> String {
    format!("{}#{}#{}", trait_name, type_names.join(","), method)
}

/// The trait signature of a method with the trait parameters substituted
/// by the instance targets.
fn expected_method_ty(an: &Analysis, method: &str, trait_subst: &Subst) -> Option<Ty> {
    let sym = an.symbols.lookup_global(method)?;
    match &sym.ty {
        Ty::Forall { ty, .. } => Some(ty.apply(trait_subst)),
        other => Some(other.apply(trait_subst)),
    }
}

/// The signature an instance method declares through its annotations.
fn declared_method_ty(an: &mut Analysis, f: &FnExpr, params_scope: &FxHashMap<String, Ty>) -> Ty {
    let params: Vec<Ty> = f
        .params
        .iter()
        .map(|p| match &p.ann {
            Some(ann) => build_type(an, ann, params_scope),
            None => an.ctx.fresh_var(),
        })
        .collect();
    let ret = match &f.ret {
        Some(ann) => build_type(an, ann, params_scope),
        None => an.ctx.fresh_var(),
    };
    Ty::func(params, ret)
}

/// Turn a checked instance-method type into a signature for body
/// inference.
fn method_sig_of(ty: &Ty, target_params: &FxHashMap<String, Ty>) -> FnSig {
    match ty {
        Ty::Func {
            params,
            ret,
            variadic,
            default_count,
            constraints,
        } => FnSig {
            type_params: target_params.clone(),
            params: params.clone(),
            ret: (**ret).clone(),
            constraints: constraints.clone(),
            variadic: *variadic,
            default_count: *default_count,
        },
        other => FnSig {
            type_params: target_params.clone(),
            params: Vec::new(),
            ret: other.clone(),
            constraints: Vec::new(),
            variadic: false,
            default_count: 0,
        },
    }
}

// ── Type elaboration ───────────────────────────────────────────────────

/// Elaborate a syntactic type expression into a `Ty`, resolving names
/// through the symbol table. `params` maps in-scope type parameter names
/// to their (rigid) variables.
pub fn build_type(an: &mut Analysis, te: &TypeExpr, params: &FxHashMap<String, Ty>) -> Ty {
    match &te.kind {
        TypeExprKind::Name(name) => {
            let found = an.symbols.lookup(name).map(|s| (s.kind, s.ty.clone()));
            match found {
                Some((SymbolKind::Type, Ty::TypeOfType(inner))) => *inner,
                Some((SymbolKind::Type, _)) => Ty::con(name.clone()),
                _ => {
                    an.ctx.error(
                        SemaErrorKind::UnknownType { name: name.clone() },
                        te.span,
                    );
                    an.ctx.fresh_var()
                }
            }
        }
        TypeExprKind::Var(name) => params
            .get(name)
            .cloned()
            .unwrap_or_else(|| Ty::var(name.clone())),
        TypeExprKind::App(head, args) => {
            let head_ty = build_type(an, head, params);
            let arg_tys: Vec<Ty> = args.iter().map(|a| build_type(an, a, params)).collect();
            if let Err(err) = check_app_kinds(&head_ty, &arg_tys, &an.symbols.kinds) {
                an.ctx.error(err, te.span);
            }
            Ty::App(Box::new(head_ty), arg_tys)
        }
        TypeExprKind::Func {
            params: ps,
            ret,
            variadic,
        } => Ty::Func {
            params: ps.iter().map(|p| build_type(an, p, params)).collect(),
            ret: Box::new(build_type(an, ret, params)),
            variadic: *variadic,
            default_count: 0,
            constraints: Vec::new(),
        },
        TypeExprKind::Tuple(items) => {
            Ty::Tuple(items.iter().map(|i| build_type(an, i, params)).collect())
        }
        TypeExprKind::Record { fields, open, row } => {
            let fields = fields
                .iter()
                .map(|(n, t)| (n.clone(), build_type(an, t, params)))
                .collect();
            let row = if *open {
                Some(row.clone().unwrap_or_else(|| an.ctx.fresh_row()))
            } else {
                None
            };
            Ty::Record {
                fields,
                open: *open,
                row,
            }
        }
        TypeExprKind::Union(alts) => crate::ty::normalize_union(
            alts.iter().map(|a| build_type(an, a, params)).collect(),
        ),
    }
}

/// The maximum number of arguments a type parameter is applied to in a
/// type expression (0 when never applied).
fn applied_arity(te: &TypeExpr, param: &str) -> usize {
    match &te.kind {
        TypeExprKind::App(head, args) => {
            let head_arity = match &head.kind {
                TypeExprKind::Var(v) | TypeExprKind::Name(v) if v == param => args.len(),
                _ => 0,
            };
            args.iter()
                .map(|a| applied_arity(a, param))
                .fold(head_arity.max(applied_arity(head, param)), usize::max)
        }
        TypeExprKind::Func { params, ret, .. } => params
            .iter()
            .map(|p| applied_arity(p, param))
            .fold(applied_arity(ret, param), usize::max),
        TypeExprKind::Tuple(items) | TypeExprKind::Union(items) => items
            .iter()
            .map(|i| applied_arity(i, param))
            .fold(0, usize::max),
        TypeExprKind::Record { fields, .. } => fields
            .iter()
            .map(|(_, t)| applied_arity(t, param))
            .fold(0, usize::max),
        TypeExprKind::Name(_) | TypeExprKind::Var(_) => 0,
    }
}

/// Whether a type expression mentions the given variable or name.
fn mentions(te: &TypeExpr, name: &str) -> bool {
    match &te.kind {
        TypeExprKind::Name(n) | TypeExprKind::Var(n) => n == name,
        TypeExprKind::App(head, args) => {
            mentions(head, name) || args.iter().any(|a| mentions(a, name))
        }
        TypeExprKind::Func { params, ret, .. } => {
            params.iter().any(|p| mentions(p, name)) || mentions(ret, name)
        }
        TypeExprKind::Tuple(items) | TypeExprKind::Union(items) => {
            items.iter().any(|i| mentions(i, name))
        }
        TypeExprKind::Record { fields, row, .. } => {
            fields.iter().any(|(_, t)| mentions(t, name))
                || row.as_deref() == Some(name)
        }
    }
}

/// Visit every type variable name in a type expression.
pub(crate) fn collect_type_vars(te: &TypeExpr, visit: &mut dyn FnMut(&str)) {
    match &te.kind {
        TypeExprKind::Var(name) => visit(name),
        TypeExprKind::Name(_) => {}
        TypeExprKind::App(head, args) => {
            collect_type_vars(head, visit);
            for a in args {
                collect_type_vars(a, visit);
            }
        }
        TypeExprKind::Func { params, ret, .. } => {
            for p in params {
                collect_type_vars(p, visit);
            }
            collect_type_vars(ret, visit);
        }
        TypeExprKind::Tuple(items) | TypeExprKind::Union(items) => {
            for i in items {
                collect_type_vars(i, visit);
            }
        }
        TypeExprKind::Record { fields, .. } => {
            for (_, t) in fields {
                collect_type_vars(t, visit);
            }
        }
    }
}
