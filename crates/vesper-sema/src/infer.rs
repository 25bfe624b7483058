//! The Bodies phase: expression and pattern inference.
//!
//! One recursive function per expression shape. Inference never throws:
//! a failing subtree records its error and continues with a fresh type
//! variable, so a single run reports as many problems as possible. Each
//! inferred type is written into the node-id → type side table.

use rustc_hash::FxHashMap;
use vesper_ast::decl::{DeclKind, FnDecl, InstanceDecl, TraitDecl};
use vesper_ast::expr::{
    CallExpr, Expr, ExprKind, FnExpr, ForClause, LetStmt, LetTarget, MatchArm, Stmt,
};
use vesper_ast::module::File;
use vesper_ast::pat::{Pat, PatKind};
use vesper_ast::NodeId;
use vesper_common::Span;

use crate::ctx::{ConstraintKind, PendingWitness, WitnessExpr};
use crate::decls::{build_fn_sig, build_type, collect_type_vars, instance_method_key};
use crate::env::{canonical_type_name, Symbol, SymbolKind};
use crate::error::SemaErrorKind;
use crate::ty::{ClassConstraint, Kind, Subst, Ty};
use crate::unify::{peel_aliases, var_kind_in, variadic_elem};
use crate::Analysis;

/// Run body inference over every declaration of a file. Returns the type
/// of the last top-level expression or binding.
pub fn infer_bodies(an: &mut Analysis, file: &File) -> Option<Ty> {
    an.ctx.file = file.path.clone();
    let mut last = None;
    for decl in &file.decls {
        match &decl.kind {
            DeclKind::Fn(f) => {
                infer_fn_body(an, f, decl.span);
                last = an.symbols.lookup_global(&f.name).map(|s| s.ty.clone());
            }
            DeclKind::Let(l) => {
                infer_let_stmt(an, l, true);
                last = an.ctx.types.get(&l.id).cloned();
            }
            DeclKind::Expr(e) => {
                let ty = infer_expr(an, e);
                last = Some(ty);
            }
            DeclKind::Instance(inst) => infer_instance_bodies(an, inst, decl.span),
            DeclKind::Trait(t) => infer_trait_defaults(an, t),
            DeclKind::Type(_) | DeclKind::Import(_) | DeclKind::Reexport(_) => {}
        }
    }
    last
}

/// Check a named function's body against its header signature, then
/// generalize and finalize the symbol.
fn infer_fn_body(an: &mut Analysis, f: &FnDecl, span: Span) {
    let Some(sig) = an.fn_sigs.get(&f.name).cloned() else {
        return;
    };
    an.symbols.push_scope();
    for (param, ty) in f.fn_expr.params.iter().zip(&sig.params) {
        an.symbols
            .insert_unchecked(Symbol::new(param.name.as_str(), SymbolKind::Variable, ty.clone()));
    }
    // Signature constraints become active for the body, so witness
    // resolution recognizes generic witnesses over the rigid parameters.
    for c in &sig.constraints {
        for arg in &c.args {
            if let Ty::Var { name, .. } = arg {
                an.ctx
                    .active
                    .entry(name.clone())
                    .or_default()
                    .push(c.clone());
            }
        }
    }
    let body_ty = infer_expr(an, &f.fn_expr.body);
    an.unify_at(span, &sig.ret, &body_ty);
    an.symbols.pop_scope();

    let fn_ty = Ty::Func {
        params: sig.params,
        ret: Box::new(sig.ret),
        variadic: sig.variadic,
        default_count: sig.default_count,
        constraints: sig.constraints,
    };
    let final_ty = generalize(an, fn_ty, Some(&f.name));
    an.symbols
        .insert_global(Symbol::new(f.name.as_str(), SymbolKind::Constant, final_ty));
}

/// Check instance method bodies against their verified signatures.
fn infer_instance_bodies(an: &mut Analysis, inst: &InstanceDecl, span: Span) {
    let Some(trait_params) = an.symbols.trait_type_params.get(&inst.trait_name).cloned() else {
        return; // unknown trait was reported during Instances
    };
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
    let type_names: Vec<String> = targets.iter().map(|t| canonical_type_name(t)).collect();

    for method in &inst.methods {
        let key = instance_method_key(&inst.trait_name, &type_names, &method.name);
        let Some(sig) = an.fn_sigs.get(&key).cloned() else {
            continue;
        };
        an.symbols.push_scope();
        for (param, ty) in method.fn_expr.params.iter().zip(&sig.params) {
            an.symbols
                .insert_unchecked(Symbol::new(param.name.as_str(), SymbolKind::Variable, ty.clone()));
        }
        let body_ty = infer_expr(an, &method.fn_expr.body);
        an.unify_at(span, &sig.ret, &body_ty);
        an.symbols.pop_scope();
    }
}

/// Check trait default method bodies against the trait signatures.
fn infer_trait_defaults(an: &mut Analysis, t: &TraitDecl) {
    for m in &t.methods {
        let Some(body_fn) = &m.default_body else {
            continue;
        };
        let method_ty = an.symbols.lookup_global(&m.name).map(|s| s.ty.clone());
        let Some(Ty::Forall { ty, .. }) = method_ty else {
            continue;
        };
        let Ty::Func { params, ret, .. } = *ty else {
            continue;
        };
        an.symbols.push_scope();
        for (param, ty) in body_fn.params.iter().zip(&params) {
            an.symbols
                .insert_unchecked(Symbol::new(param.name.as_str(), SymbolKind::Variable, ty.clone()));
        }
        let body_ty = infer_expr(an, &body_fn.body);
        an.unify_at(m.span, &ret, &body_ty);
        an.symbols.pop_scope();
    }
}

/// Infer a let binding. Top-level bindings generalize; local ones stay
/// monomorphic.
pub fn infer_let_stmt(an: &mut Analysis, l: &LetStmt, top_level: bool) {
    if let Some(ann) = &l.ann {
        let t = build_type(an, ann, &FxHashMap::default());
        an.ctx.expected_types.insert(l.value.id, t);
    }
    let value_ty = infer_expr(an, &l.value);
    let ty = match an.ctx.expected_types.get(&l.value.id).cloned() {
        Some(ann_ty) => {
            an.unify_at(l.span, &ann_ty, &value_ty);
            ann_ty
        }
        None => value_ty,
    };

    match &l.target {
        LetTarget::Name(name) => {
            // Link a forward-referenced placeholder variable to the final
            // type.
            let placeholder = an
                .symbols
                .lookup(name)
                .filter(|s| s.pending && s.ty != Ty::nil())
                .map(|s| s.ty.clone());
            if let Some(ph) = placeholder {
                an.unify_at(l.span, &ph, &ty);
            }
            let final_ty = if top_level {
                generalize(an, ty.clone(), Some(name))
            } else {
                an.ctx.resolve(&ty)
            };
            let kind = if l.constant {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            };
            if let Err(err) = an.symbols.insert(Symbol::new(name.as_str(), kind, final_ty)) {
                an.ctx.error(err, l.span);
            }
        }
        LetTarget::Pattern(pat) => {
            let resolved = an.ctx.resolve(&ty);
            infer_pattern(an, pat, &resolved);
        }
    }
    let resolved = an.ctx.resolve(&ty);
    an.ctx.types.insert(l.id, resolved);
}

// ── Expression inference ───────────────────────────────────────────────

/// Infer the type of an expression and record it in the type map.
pub fn infer_expr(an: &mut Analysis, expr: &Expr) -> Ty {
    let ty = match &expr.kind {
        ExprKind::Int(_) => Ty::int(),
        ExprKind::Float(_) => Ty::float(),
        ExprKind::BigInt(_) => Ty::bigint(),
        ExprKind::Rational(_) => Ty::rational(),
        ExprKind::Bool(_) => Ty::bool(),
        ExprKind::Nil => Ty::nil(),
        ExprKind::Char(_) => Ty::char(),
        ExprKind::Str(_) => Ty::string(),
        ExprKind::Bytes(_) => Ty::bytes(),
        ExprKind::Bits(_) => Ty::bits(),
        ExprKind::FormatStr(_) => {
            // A format string is a variadic function over heterogeneous
            // arguments producing a string.
            let elem = an.ctx.fresh_var();
            Ty::Func {
                params: vec![Ty::list(elem)],
                ret: Box::new(Ty::string()),
                variadic: true,
                default_count: 0,
                constraints: Vec::new(),
            }
        }
        ExprKind::List(items) => infer_list(an, items),
        ExprKind::Map(entries) => infer_map(an, entries),
        ExprKind::Tuple(items) => {
            Ty::Tuple(items.iter().map(|i| infer_expr(an, i)).collect())
        }
        ExprKind::RecordLit(fields) => infer_record_lit(an, fields),
        ExprKind::Ident(name) => infer_ident(an, expr, name),
        ExprKind::Lambda(f) => infer_lambda(an, f, expr.span),
        ExprKind::Call(call) => infer_call(an, expr, call),
        ExprKind::Infix { op, lhs, rhs } => infer_infix(an, expr, op, lhs, rhs),
        ExprKind::Member { target, field } => infer_member(an, expr, target, field),
        ExprKind::Match { scrutinee, arms } => infer_match(an, scrutinee, arms),
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => infer_if(an, cond, then_branch, else_branch.as_deref()),
        ExprKind::Assign { name, value } => infer_assign(an, expr, name, value),
        ExprKind::Block(stmts) => infer_block(an, stmts),
        ExprKind::For { clauses, body } => infer_for(an, clauses, body),
        ExprKind::Range { start, step, end } => infer_range(an, start, step.as_deref(), end),
        ExprKind::Spread(inner) => infer_expr(an, inner),
        ExprKind::Placeholder => an.ctx.fresh_var(),
    };
    let resolved = an.ctx.resolve(&ty);
    an.ctx.types.insert(expr.id, resolved.clone());
    resolved
}

fn infer_list(an: &mut Analysis, items: &[Expr]) -> Ty {
    let elem = an.ctx.fresh_var();
    for item in items {
        if let ExprKind::Spread(inner) = &item.kind {
            let t = infer_expr(an, inner);
            let expected = Ty::list(elem.clone());
            an.unify_at(item.span, &expected, &t);
        } else {
            let t = infer_expr(an, item);
            an.unify_at(item.span, &elem, &t);
        }
    }
    Ty::list(elem)
}

fn infer_map(an: &mut Analysis, entries: &[(Expr, Expr)]) -> Ty {
    let key = an.ctx.fresh_var();
    let value = an.ctx.fresh_var();
    for (k, v) in entries {
        let kt = infer_expr(an, k);
        an.unify_at(k.span, &key, &kt);
        let vt = infer_expr(an, v);
        an.unify_at(v.span, &value, &vt);
    }
    Ty::map_ty(key, value)
}

fn infer_record_lit(an: &mut Analysis, fields: &[(String, Expr)]) -> Ty {
    if fields.is_empty() {
        // The empty record literal is open: it can flow anywhere a record
        // is expected.
        let row = an.ctx.fresh_row();
        return Ty::Record {
            fields: Default::default(),
            open: true,
            row: Some(row),
        };
    }
    let fields = fields
        .iter()
        .map(|(name, value)| (name.clone(), infer_expr(an, value)))
        .collect();
    Ty::Record {
        fields,
        open: false,
        row: None,
    }
}

fn infer_ident(an: &mut Analysis, expr: &Expr, name: &str) -> Ty {
    let found = an.symbols.lookup(name).map(|s| (s.ty.clone(), s.pending));
    match found {
        None => {
            an.ctx.error(
                SemaErrorKind::UndeclaredIdent {
                    name: name.to_string(),
                },
                expr.span,
            );
            an.ctx.fresh_var()
        }
        Some((ty, pending)) => {
            if pending && ty == Ty::nil() {
                // Forward reference to an unannotated binding: hand out a
                // placeholder variable the defining site will unify with.
                let fresh = an.ctx.fresh_var();
                if let Some(sym) = an.symbols.lookup_mut(name) {
                    sym.ty = fresh.clone();
                }
                fresh
            } else {
                instantiate_use(an, &ty, expr.span, expr.id)
            }
        }
    }
}

/// Instantiate a possibly quantified type at a use site: fresh variables
/// for the bound ones, the mapping recorded on the node, and the
/// instantiated constraints activated as obligations.
pub fn instantiate_use(an: &mut Analysis, ty: &Ty, span: Span, node: NodeId) -> Ty {
    let resolved = an.ctx.resolve(ty);
    let (inst, mapping) = an.ctx.instantiate(&resolved);
    if mapping.is_empty() {
        return inst;
    }
    {
        let info = an.ctx.calls.entry(node).or_default();
        for (generic, fresh) in &mapping {
            info.instantiation.insert(generic.clone(), fresh.clone());
        }
    }
    if let Ty::Func { constraints, .. } = &inst {
        for c in constraints.clone() {
            an.ctx.add_obligation(c, span);
        }
    }
    inst
}

fn infer_lambda(an: &mut Analysis, f: &FnExpr, span: Span) -> Ty {
    let sig = build_fn_sig(an, f);

    an.symbols.push_scope();
    for (param, ty) in f.params.iter().zip(&sig.params) {
        an.symbols
            .insert_unchecked(Symbol::new(param.name.as_str(), SymbolKind::Variable, ty.clone()));
    }
    for c in &sig.constraints {
        for arg in &c.args {
            if let Ty::Var { name, .. } = arg {
                an.ctx
                    .active
                    .entry(name.clone())
                    .or_default()
                    .push(c.clone());
            }
        }
    }
    let body_ty = infer_expr(an, &f.body);
    an.unify_at(span, &sig.ret, &body_ty);
    an.symbols.pop_scope();

    Ty::Func {
        params: sig.params,
        ret: Box::new(sig.ret),
        variadic: sig.variadic,
        default_count: sig.default_count,
        constraints: sig.constraints,
    }
}

// ── Calls ──────────────────────────────────────────────────────────────

/// A prepared call argument: an AST node still to infer, or a type
/// supplied by desugaring (pipes, tuple spreads).
enum ArgV<'a> {
    Node(&'a Expr),
    Typed(Ty, Span),
    SpreadList(Ty, Span),
}

fn infer_call(an: &mut Analysis, expr: &Expr, call: &CallExpr) -> Ty {
    let raw = infer_expr(an, &call.callee);
    let callee_ty = instantiate_use(an, &raw, expr.span, expr.id);
    let callee_ty = peel_aliases(&an.ctx.resolve(&callee_ty), &an.symbols);
    let argv: Vec<ArgV> = call.args.iter().map(ArgV::Node).collect();
    dispatch_call(an, expr.id, expr.span, callee_ty, argv)
}

fn dispatch_call(
    an: &mut Analysis,
    call_id: NodeId,
    span: Span,
    callee_ty: Ty,
    argv: Vec<ArgV>,
) -> Ty {
    match callee_ty {
        Ty::Forall { .. } => {
            let inst = instantiate_use(an, &callee_ty, span, call_id);
            dispatch_call(an, call_id, span, inst, argv)
        }
        Ty::Func {
            params,
            ret,
            variadic,
            default_count,
            constraints,
        } => infer_call_func(
            an,
            call_id,
            span,
            params,
            *ret,
            variadic,
            default_count,
            constraints,
            argv,
        ),
        Ty::TypeOfType(base) => infer_type_call(an, call_id, span, *base, argv),
        Ty::Var { .. } => {
            let mut arg_tys = Vec::new();
            for arg in argv {
                match arg {
                    ArgV::Node(e) => arg_tys.push(infer_expr(an, e)),
                    ArgV::Typed(t, _) => arg_tys.push(t),
                    ArgV::SpreadList(t, sp) => {
                        an.ctx.error(SemaErrorKind::SpreadIntoNonVariadic, sp);
                        arg_tys.push(t);
                    }
                }
            }
            let ret = an.ctx.fresh_var();
            let wanted = Ty::func(arg_tys, ret.clone());
            an.unify_at(span, &callee_ty, &wanted);
            an.ctx.resolve(&ret)
        }
        Ty::Union(alts) => {
            let mut funcs: Vec<Ty> = alts
                .iter()
                .filter(|t| matches!(t, Ty::Func { .. }))
                .cloned()
                .collect();
            if funcs.len() == 1 {
                dispatch_call(an, call_id, span, funcs.remove(0), argv)
            } else {
                an.ctx.error(
                    SemaErrorKind::AmbiguousCallee {
                        ty: Ty::Union(alts),
                    },
                    span,
                );
                an.ctx.fresh_var()
            }
        }
        other => {
            for arg in argv {
                if let ArgV::Node(e) = arg {
                    infer_expr(an, e);
                }
            }
            an.ctx.error(SemaErrorKind::NotCallable { ty: other }, span);
            an.ctx.fresh_var()
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn infer_call_func(
    an: &mut Analysis,
    call_id: NodeId,
    span: Span,
    params: Vec<Ty>,
    ret: Ty,
    variadic: bool,
    default_count: usize,
    constraints: Vec<ClassConstraint>,
    argv: Vec<ArgV>,
) -> Ty {
    // Expand tuple spreads into positional arguments; list spreads stay
    // whole and must land in the variadic slot.
    let mut expanded: Vec<ArgV> = Vec::new();
    for arg in argv {
        match arg {
            ArgV::Node(e) => {
                if let ExprKind::Spread(inner) = &e.kind {
                    let t = infer_expr(an, inner);
                    let rt = peel_aliases(&an.ctx.resolve(&t), &an.symbols);
                    match rt {
                        Ty::Tuple(elems) => {
                            for elem in elems {
                                expanded.push(ArgV::Typed(elem, e.span));
                            }
                        }
                        other => expanded.push(ArgV::SpreadList(other, e.span)),
                    }
                } else {
                    expanded.push(ArgV::Node(e));
                }
            }
            other => expanded.push(other),
        }
    }

    let fixed = params.len() - usize::from(variadic);

    // Partial application: fewer arguments than the required fixed arity
    // yields a function of the remaining parameters.
    if expanded.len() < fixed.saturating_sub(default_count) {
        for (i, arg) in expanded.iter().enumerate() {
            let param_ty = an.ctx.resolve(&params[i]);
            check_arg(an, arg, &param_ty);
        }
        let remaining: Vec<Ty> = params[expanded.len()..]
            .iter()
            .map(|p| an.ctx.resolve(p))
            .collect();
        let remaining_defaults = default_count.min(remaining.len());
        return Ty::Func {
            params: remaining,
            ret: Box::new(an.ctx.resolve(&ret)),
            variadic,
            default_count: remaining_defaults,
            constraints,
        };
    }

    if !variadic && expanded.len() > params.len() {
        an.ctx.error(
            SemaErrorKind::ArityMismatch {
                expected: params.len(),
                found: expanded.len(),
            },
            span,
        );
    }

    // Positional arguments, each inferred under its parameter as the
    // expected type.
    let n_fixed = expanded.len().min(fixed);
    for i in 0..n_fixed {
        let param_ty = an.ctx.resolve(&params[i]);
        check_arg(an, &expanded[i], &param_ty);
    }

    // Trailing arguments against the variadic slot. A bare-variable
    // element type that does not flow into the return type accepts
    // heterogeneous arguments.
    if variadic && expanded.len() > fixed {
        let last = an
            .ctx
            .resolve(params.last().expect("variadic function has parameters"));
        let elem = variadic_elem(&last);
        let heterogeneous = match &elem {
            Ty::Var { name, .. } => {
                an.ctx.is_inference_var(name) && !ret.free_vars().iter().any(|v| v == name)
            }
            _ => false,
        };
        for arg in &expanded[fixed..] {
            match arg {
                ArgV::Node(e) => {
                    let t = infer_expr(an, e);
                    if !heterogeneous {
                        an.unify_arg_at(e.span, &elem, &t);
                    }
                }
                ArgV::Typed(t, sp) => {
                    if !heterogeneous {
                        an.unify_arg_at(*sp, &elem, t);
                    }
                }
                ArgV::SpreadList(t, sp) => {
                    if !heterogeneous {
                        let expected = Ty::list(elem.clone());
                        an.unify_at(*sp, &expected, t);
                    }
                }
            }
        }
    } else {
        for arg in expanded.iter().skip(fixed) {
            if let ArgV::SpreadList(_, sp) = arg {
                an.ctx.error(SemaErrorKind::SpreadIntoNonVariadic, *sp);
            }
        }
    }

    // Reserve a witness slot per callee constraint.
    if !constraints.is_empty() {
        an.ctx
            .calls
            .entry(call_id)
            .or_default()
            .witnesses = vec![WitnessExpr::Placeholder; constraints.len()];
        for (index, c) in constraints.iter().enumerate() {
            let args: Vec<Ty> = c.args.iter().map(|a| an.ctx.resolve(a)).collect();
            let var_name = args
                .first()
                .and_then(|a| match a {
                    Ty::Var { name, .. } => Some(name.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            an.ctx.pending_witnesses.push(PendingWitness {
                call: call_id,
                trait_name: c.trait_name.clone(),
                var_name,
                args,
                index,
                span,
            });
        }
    }

    // An expected type on the call node (annotation or context) grounds
    // return-type-directed dispatch.
    if let Some(expected) = an.ctx.expected_types.get(&call_id).cloned() {
        an.unify_at(span, &expected, &ret);
    }
    an.ctx.resolve(&ret)
}

/// Infer or compare one prepared argument against its parameter type.
fn check_arg(an: &mut Analysis, arg: &ArgV, param_ty: &Ty) {
    match arg {
        ArgV::Node(e) => {
            an.ctx.expected_types.insert(e.id, param_ty.clone());
            let t = infer_expr(an, e);
            an.unify_arg_at(e.span, param_ty, &t);
        }
        ArgV::Typed(t, sp) => {
            an.unify_arg_at(*sp, param_ty, t);
        }
        ArgV::SpreadList(_, sp) => {
            an.ctx.error(SemaErrorKind::SpreadIntoNonVariadic, *sp);
        }
    }
}

/// A call whose callee is a reified type: either a type application
/// (`List(Int)`) or a construction/cast (`Int(x)`).
fn infer_type_call(
    an: &mut Analysis,
    call_id: NodeId,
    span: Span,
    base: Ty,
    argv: Vec<ArgV>,
) -> Ty {
    let mut arg_tys: Vec<(Ty, Span)> = Vec::new();
    for arg in argv {
        match arg {
            ArgV::Node(e) => {
                let t = infer_expr(an, e);
                arg_tys.push((t, e.span));
            }
            ArgV::Typed(t, sp) | ArgV::SpreadList(t, sp) => arg_tys.push((t, sp)),
        }
    }
    let all_types = !arg_tys.is_empty()
        && arg_tys
            .iter()
            .all(|(t, _)| matches!(an.ctx.resolve(t), Ty::TypeOfType(_)));
    if all_types {
        let inner: Vec<Ty> = arg_tys
            .iter()
            .map(|(t, _)| match an.ctx.resolve(t) {
                Ty::TypeOfType(inner) => *inner,
                other => other,
            })
            .collect();
        if let Err(err) = crate::unify::check_app_kinds(&base, &inner, &an.symbols.kinds) {
            an.ctx.error(err, span);
        }
        an.ctx.calls.entry(call_id).or_default().type_args = inner.clone();
        Ty::TypeOfType(Box::new(Ty::App(Box::new(base), inner)))
    } else {
        // Construction or cast: the base must match the value's type. A
        // still-unknown argument defers the equation to global solving.
        if let Some((t, sp)) = arg_tys.first() {
            let rt = an.ctx.resolve(t);
            if matches!(rt, Ty::Var { .. }) {
                an.ctx.defer_equal(base.clone(), rt, *sp);
            } else {
                an.unify_at(*sp, &base, &rt);
            }
        }
        base
    }
}

// ── Infix operators ────────────────────────────────────────────────────

fn infer_infix(an: &mut Analysis, expr: &Expr, op: &str, lhs: &Expr, rhs: &Expr) -> Ty {
    match op {
        "|>" => infer_pipe(an, lhs, rhs, false),
        "|>>" => infer_pipe(an, lhs, rhs, true),
        _ => {
            let Some((_, method)) = an.symbols.operator_traits.get(op).cloned() else {
                infer_expr(an, lhs);
                infer_expr(an, rhs);
                an.ctx.error(
                    SemaErrorKind::UnknownOperator { op: op.to_string() },
                    expr.span,
                );
                return an.ctx.fresh_var();
            };
            let method_ty = an.symbols.lookup(&method).map(|s| s.ty.clone());
            match method_ty {
                None => {
                    an.ctx.error(
                        SemaErrorKind::UndeclaredIdent { name: method },
                        expr.span,
                    );
                    an.ctx.fresh_var()
                }
                Some(mt) => {
                    let inst = instantiate_use(an, &mt, expr.span, expr.id);
                    let inst = peel_aliases(&an.ctx.resolve(&inst), &an.symbols);
                    dispatch_call(
                        an,
                        expr.id,
                        expr.span,
                        inst,
                        vec![ArgV::Node(lhs), ArgV::Node(rhs)],
                    )
                }
            }
        }
    }
}

/// The two built-in pipes. `|>` threads the left value into the call on
/// the right (into a lone `_` placeholder, or appended); `|>>` first
/// unwraps a `Result`/`Option`.
fn infer_pipe(an: &mut Analysis, lhs: &Expr, rhs: &Expr, unwrap: bool) -> Ty {
    let mut piped = infer_expr(an, lhs);
    if unwrap {
        let resolved = peel_aliases(&an.ctx.resolve(&piped), &an.symbols);
        piped = match &resolved {
            Ty::App(head, args) => match head.as_ref() {
                Ty::Con(c) if c.name == "Result" && args.len() == 2 => args[0].clone(),
                Ty::Con(c) if c.name == "Option" && args.len() == 1 => args[0].clone(),
                _ => {
                    pipe_unwrap_error(an, &resolved, lhs.span);
                    an.ctx.fresh_var()
                }
            },
            _ => {
                pipe_unwrap_error(an, &resolved, lhs.span);
                an.ctx.fresh_var()
            }
        };
    }

    match &rhs.kind {
        ExprKind::Call(call) => {
            let raw = infer_expr(an, &call.callee);
            let callee = instantiate_use(an, &raw, rhs.span, rhs.id);
            let callee = peel_aliases(&an.ctx.resolve(&callee), &an.symbols);
            let mut argv: Vec<ArgV> = Vec::new();
            let mut placed = false;
            for arg in &call.args {
                if matches!(arg.kind, ExprKind::Placeholder) && !placed {
                    let resolved = an.ctx.resolve(&piped);
                    an.ctx.types.insert(arg.id, resolved);
                    argv.push(ArgV::Typed(piped.clone(), arg.span));
                    placed = true;
                } else {
                    argv.push(ArgV::Node(arg));
                }
            }
            if !placed {
                argv.push(ArgV::Typed(piped.clone(), rhs.span));
            }
            let ret = dispatch_call(an, rhs.id, rhs.span, callee, argv);
            an.ctx.types.insert(rhs.id, ret.clone());
            ret
        }
        _ => {
            let f = infer_expr(an, rhs);
            let callee = peel_aliases(&an.ctx.resolve(&f), &an.symbols);
            dispatch_call(
                an,
                rhs.id,
                rhs.span,
                callee,
                vec![ArgV::Typed(piped, rhs.span)],
            )
        }
    }
}

fn pipe_unwrap_error(an: &mut Analysis, found: &Ty, span: Span) {
    let ok = an.ctx.fresh_var();
    let err = an.ctx.fresh_var();
    an.ctx.error(
        SemaErrorKind::Mismatch {
            expected: Ty::result(ok, err),
            found: found.clone(),
        },
        span,
    );
}

// ── Member access ──────────────────────────────────────────────────────

fn infer_member(an: &mut Analysis, expr: &Expr, target: &Expr, field: &str) -> Ty {
    // Module access: `Alias.export`.
    if let ExprKind::Ident(name) = &target.kind {
        let module_record = an
            .symbols
            .lookup(name)
            .filter(|s| s.kind == SymbolKind::Module)
            .map(|s| s.ty.clone());
        if let Some(Ty::Record { fields, .. }) = module_record {
            an.ctx
                .types
                .insert(target.id, Ty::con(format!("Module<{}>", name)));
            return match fields.get(field) {
                Some(t) => {
                    let t = t.clone();
                    instantiate_use(an, &t, expr.span, expr.id)
                }
                None => {
                    an.ctx.error(
                        SemaErrorKind::UnknownExport {
                            module: name.clone(),
                            name: field.to_string(),
                        },
                        expr.span,
                    );
                    an.ctx.fresh_var()
                }
            };
        }
    }

    let target_ty = infer_expr(an, target);
    let resolved = peel_aliases(&an.ctx.resolve(&target_ty), &an.symbols);
    match &resolved {
        Ty::Record { fields, open, .. } => {
            if let Some(t) = fields.get(field) {
                t.clone()
            } else if *open {
                extend_row_with_field(an, &resolved, field, expr.span)
            } else {
                an.ctx.error(
                    SemaErrorKind::NoSuchField {
                        ty: resolved.clone(),
                        field: field.to_string(),
                    },
                    expr.span,
                );
                an.ctx.fresh_var()
            }
        }
        Ty::Var { .. } => extend_row_with_field(an, &resolved, field, expr.span),
        Ty::TypeOfType(inner) => {
            // Variant access through the type name: `Shape.Circle`.
            let type_name = canonical_type_name(inner);
            let is_variant = an
                .symbols
                .variants
                .get(&type_name)
                .map_or(false, |vs| vs.iter().any(|v| v == field));
            if is_variant {
                let ctor = an.symbols.lookup(field).map(|s| s.ty.clone());
                match ctor {
                    Some(t) => instantiate_use(an, &t, expr.span, expr.id),
                    None => {
                        an.ctx.error(
                            SemaErrorKind::UnknownConstructor {
                                name: field.to_string(),
                            },
                            expr.span,
                        );
                        an.ctx.fresh_var()
                    }
                }
            } else {
                an.ctx.error(
                    SemaErrorKind::NoSuchField {
                        ty: resolved.clone(),
                        field: field.to_string(),
                    },
                    expr.span,
                );
                an.ctx.fresh_var()
            }
        }
        other => {
            // Extension methods registered for the target's type.
            let cname = canonical_type_name(other);
            let method_ty = an
                .symbols
                .extension_methods
                .get(&cname)
                .and_then(|m| m.get(field))
                .cloned();
            match method_ty {
                Some(mt) => {
                    let inst = instantiate_use(an, &mt, expr.span, expr.id);
                    match inst {
                        Ty::Func {
                            params,
                            ret,
                            variadic,
                            default_count,
                            constraints,
                        } if !params.is_empty() => {
                            an.unify_arg_at(expr.span, &params[0], other);
                            Ty::Func {
                                params: params[1..].to_vec(),
                                ret,
                                variadic,
                                default_count,
                                constraints,
                            }
                        }
                        non_fn => non_fn,
                    }
                }
                None => {
                    an.ctx.error(
                        SemaErrorKind::NoSuchField {
                            ty: other.clone(),
                            field: field.to_string(),
                        },
                        expr.span,
                    );
                    an.ctx.fresh_var()
                }
            }
        }
    }
}

/// Require a field on an open record or variable by unifying with a
/// one-field open record, the core of row polymorphism.
fn extend_row_with_field(an: &mut Analysis, target: &Ty, field: &str, span: Span) -> Ty {
    let field_ty = an.ctx.fresh_var();
    let row = an.ctx.fresh_row();
    let wanted = Ty::Record {
        fields: std::iter::once((field.to_string(), field_ty.clone())).collect(),
        open: true,
        row: Some(row),
    };
    an.unify_at(span, &wanted, target);
    an.ctx.resolve(&field_ty)
}

// ── Control flow ───────────────────────────────────────────────────────

fn infer_match(an: &mut Analysis, scrutinee: &Expr, arms: &[MatchArm]) -> Ty {
    let scrutinee_ty = infer_expr(an, scrutinee);
    let result = an.ctx.fresh_var();
    for arm in arms {
        an.symbols.push_scope();
        let expected = an.ctx.resolve(&scrutinee_ty);
        infer_pattern(an, &arm.pat, &expected);
        let arm_ty = infer_expr(an, &arm.body);
        an.unify_at(arm.span, &result, &arm_ty);
        an.symbols.pop_scope();
    }
    an.ctx.resolve(&result)
}

fn infer_if(
    an: &mut Analysis,
    cond: &Expr,
    then_branch: &Expr,
    else_branch: Option<&Expr>,
) -> Ty {
    let cond_ty = infer_expr(an, cond);
    an.unify_at(cond.span, &Ty::bool(), &cond_ty);
    let then_ty = infer_expr(an, then_branch);
    if let Some(else_branch) = else_branch {
        let else_ty = infer_expr(an, else_branch);
        an.unify_at(else_branch.span, &then_ty, &else_ty);
    }
    an.ctx.resolve(&then_ty)
}

fn infer_assign(an: &mut Analysis, expr: &Expr, name: &str, value: &Expr) -> Ty {
    let found = an.symbols.lookup(name).map(|s| (s.ty.clone(), s.kind));
    let value_ty = infer_expr(an, value);
    match found {
        None => {
            an.ctx.error(
                SemaErrorKind::UndeclaredIdent {
                    name: name.to_string(),
                },
                expr.span,
            );
        }
        Some((_, SymbolKind::Constant)) => {
            an.ctx.error(
                SemaErrorKind::AssignToConstant {
                    name: name.to_string(),
                },
                expr.span,
            );
        }
        Some((existing, _)) => {
            an.unify_at(expr.span, &existing, &value_ty);
        }
    }
    Ty::nil()
}

fn infer_block(an: &mut Analysis, stmts: &[Stmt]) -> Ty {
    an.symbols.push_scope();
    let mut last = Ty::nil();
    for stmt in stmts {
        match stmt {
            Stmt::Let(l) => {
                infer_let_stmt(an, l, false);
                last = Ty::nil();
            }
            Stmt::Expr(e) => {
                last = infer_expr(an, e);
            }
        }
    }
    an.symbols.pop_scope();
    last
}

fn infer_for(an: &mut Analysis, clauses: &[ForClause], body: &Expr) -> Ty {
    an.symbols.push_scope();
    for clause in clauses {
        match clause {
            ForClause::Generator { pat, iter } => {
                let iter_ty = infer_expr(an, iter);
                let resolved = peel_aliases(&an.ctx.resolve(&iter_ty), &an.symbols);
                let elem = match &resolved {
                    Ty::App(head, args) if args.len() == 1 => match head.as_ref() {
                        Ty::Con(c) if c.name == "List" || c.name == "Range" => args[0].clone(),
                        _ => {
                            an.ctx.error(
                                SemaErrorKind::NotIterable {
                                    ty: resolved.clone(),
                                },
                                iter.span,
                            );
                            an.ctx.fresh_var()
                        }
                    },
                    Ty::Var { .. } => {
                        let elem = an.ctx.fresh_var();
                        let wanted = Ty::list(elem.clone());
                        an.unify_at(iter.span, &wanted, &resolved);
                        elem
                    }
                    _ => {
                        an.ctx.error(
                            SemaErrorKind::NotIterable {
                                ty: resolved.clone(),
                            },
                            iter.span,
                        );
                        an.ctx.fresh_var()
                    }
                };
                let elem = an.ctx.resolve(&elem);
                infer_pattern(an, pat, &elem);
            }
            ForClause::Filter(cond) => {
                let cond_ty = infer_expr(an, cond);
                an.unify_at(cond.span, &Ty::bool(), &cond_ty);
            }
        }
    }
    let body_ty = infer_expr(an, body);
    an.symbols.pop_scope();
    Ty::list(body_ty)
}

fn infer_range(an: &mut Analysis, start: &Expr, step: Option<&Expr>, end: &Expr) -> Ty {
    let start_ty = infer_expr(an, start);
    if let Some(step) = step {
        let step_ty = infer_expr(an, step);
        an.unify_at(step.span, &start_ty, &step_ty);
    }
    let end_ty = infer_expr(an, end);
    an.unify_at(end.span, &start_ty, &end_ty);
    Ty::range(an.ctx.resolve(&start_ty))
}

// ── Patterns ───────────────────────────────────────────────────────────

/// Infer a pattern against its expected type, binding its variables in
/// the current scope.
pub fn infer_pattern(an: &mut Analysis, pat: &Pat, expected: &Ty) {
    match &pat.kind {
        PatKind::Wildcard => {}
        PatKind::Bind(name) => {
            let resolved = an.ctx.resolve(expected);
            an.symbols
                .insert_unchecked(Symbol::new(name.as_str(), SymbolKind::Variable, resolved));
        }
        PatKind::Int(_) => {
            an.unify_at(pat.span, expected, &Ty::int());
        }
        PatKind::Bool(_) => {
            an.unify_at(pat.span, expected, &Ty::bool());
        }
        PatKind::Str(_) => {
            an.unify_at(pat.span, expected, &Ty::string());
        }
        PatKind::Char(_) => {
            an.unify_at(pat.span, expected, &Ty::char());
        }
        PatKind::Nil => {
            an.unify_at(pat.span, expected, &Ty::nil());
        }
        PatKind::Tuple(items) => {
            let elems: Vec<Ty> = items.iter().map(|_| an.ctx.fresh_var()).collect();
            let wanted = Ty::Tuple(elems.clone());
            an.unify_at(pat.span, expected, &wanted);
            for (item, elem) in items.iter().zip(&elems) {
                let resolved = an.ctx.resolve(elem);
                infer_pattern(an, item, &resolved);
            }
        }
        PatKind::Record { fields, rest } => {
            let resolved = peel_aliases(&an.ctx.resolve(expected), &an.symbols);
            match &resolved {
                Ty::Record { .. } | Ty::Var { .. } => {
                    let field_tys: Vec<(String, Ty)> = fields
                        .iter()
                        .map(|(n, _)| (n.clone(), an.ctx.fresh_var()))
                        .collect();
                    let row = an.ctx.fresh_row();
                    let wanted = Ty::Record {
                        fields: field_tys.iter().cloned().collect(),
                        // A closed record pattern without `..` must match
                        // the record exactly; with `..` extras flow into
                        // the row.
                        open: *rest || matches!(resolved, Ty::Var { .. }),
                        row: if *rest || matches!(resolved, Ty::Var { .. }) {
                            Some(row)
                        } else {
                            None
                        },
                    };
                    an.unify_at(pat.span, &wanted, &resolved);
                    for ((_, p), (_, t)) in fields.iter().zip(&field_tys) {
                        let resolved = an.ctx.resolve(t);
                        infer_pattern(an, p, &resolved);
                    }
                }
                other => {
                    an.ctx.error(
                        SemaErrorKind::NonRecordDestructure { ty: other.clone() },
                        pat.span,
                    );
                }
            }
        }
        PatKind::Constructor { name, args } => {
            let found = an.symbols.lookup(name).map(|s| (s.kind, s.ty.clone()));
            match found {
                Some((SymbolKind::Constructor, ty)) => {
                    let (inst, _) = an.ctx.instantiate(&ty);
                    match inst {
                        Ty::Func { params, ret, .. } => {
                            if params.len() != args.len() {
                                an.ctx.error(
                                    SemaErrorKind::ArityMismatch {
                                        expected: params.len(),
                                        found: args.len(),
                                    },
                                    pat.span,
                                );
                            }
                            an.unify_at(pat.span, expected, &ret);
                            for (arg, param) in args.iter().zip(&params) {
                                let resolved = an.ctx.resolve(param);
                                infer_pattern(an, arg, &resolved);
                            }
                        }
                        nullary => {
                            if !args.is_empty() {
                                an.ctx.error(
                                    SemaErrorKind::ArityMismatch {
                                        expected: 0,
                                        found: args.len(),
                                    },
                                    pat.span,
                                );
                            }
                            an.unify_at(pat.span, expected, &nullary);
                        }
                    }
                }
                _ => {
                    an.ctx.error(
                        SemaErrorKind::UnknownConstructor { name: name.clone() },
                        pat.span,
                    );
                }
            }
        }
        PatKind::List { items, rest } => {
            let elem = an.ctx.fresh_var();
            let wanted = Ty::list(elem.clone());
            an.unify_at(pat.span, expected, &wanted);
            for item in items {
                let resolved = an.ctx.resolve(&elem);
                infer_pattern(an, item, &resolved);
            }
            if let Some(rest_name) = rest {
                let list_ty = Ty::list(an.ctx.resolve(&elem));
                an.symbols
                    .insert_unchecked(Symbol::new(rest_name.as_str(), SymbolKind::Variable, list_ty));
            }
        }
    }
}

// ── Generalization ─────────────────────────────────────────────────────

/// Generalize a type at a binding site: quantify the inference variables
/// free in the type but not in the environment, renaming them to stable
/// generic names. Single-variable deferred constraints over generalized
/// variables migrate into the signature; pending witnesses over them
/// become dictionary parameters.
pub fn generalize(an: &mut Analysis, ty: Ty, excluding: Option<&str>) -> Ty {
    let resolved = an.ctx.resolve(&ty);
    if matches!(resolved, Ty::Forall { .. }) {
        return resolved;
    }
    let env_free = an.symbols.free_type_vars(&an.ctx.subst, excluding);
    let mut qvars: Vec<String> = Vec::new();
    let mut rename = Subst::empty();
    for v in resolved.free_vars() {
        if env_free.contains(&v) {
            continue;
        }
        if an.ctx.is_inference_var(&v) {
            let kind = var_kind_in(&resolved, &v).unwrap_or(Kind::Star);
            let generic = an.ctx.fresh_gen_name();
            rename.insert(v.clone(), Ty::var_k(generic.clone(), kind));
            qvars.push(generic);
        } else {
            qvars.push(v.clone());
        }
    }
    if qvars.is_empty() {
        return resolved;
    }
    let mut body = resolved.apply(&rename);

    // Migrate single-variable obligations over generalized variables into
    // the signature; compound shapes stay deferred.
    let mut migrated: Vec<ClassConstraint> = Vec::new();
    let mut kept = Vec::new();
    for c in std::mem::take(&mut an.ctx.deferred) {
        if c.kind == ConstraintKind::Implements && c.args.len() == 1 {
            let arg = an.ctx.resolve(&c.args[0]).apply(&rename);
            if let Ty::Var { ref name, .. } = arg {
                if qvars.iter().any(|q| q == name) {
                    migrated.push(ClassConstraint::new(c.trait_name.clone(), vec![arg]));
                    continue;
                }
            }
        }
        kept.push(c);
    }
    an.ctx.deferred = kept;
    if let Ty::Func { constraints, .. } = &mut body {
        for m in &migrated {
            if !constraints.contains(m) {
                constraints.push(m.clone());
            }
        }
    }
    let forall_constraints = match &body {
        Ty::Func { constraints, .. } => constraints.clone(),
        _ => migrated,
    };

    // Witness slots over generalized variables become dictionary
    // parameters supplied by the caller.
    let mut remaining = Vec::new();
    for w in std::mem::take(&mut an.ctx.pending_witnesses) {
        let args: Vec<Ty> = w
            .args
            .iter()
            .map(|a| an.ctx.resolve(a).apply(&rename))
            .collect();
        let gen_var = args.iter().find_map(|a| match a {
            Ty::Var { name, .. } if qvars.iter().any(|q| q == name) => Some(name.clone()),
            _ => None,
        });
        match gen_var {
            Some(var) => {
                if let Some(info) = an.ctx.calls.get_mut(&w.call) {
                    if let Some(slot) = info.witnesses.get_mut(w.index) {
                        *slot = WitnessExpr::Param {
                            trait_name: w.trait_name.clone(),
                            var,
                        };
                    }
                }
            }
            None => remaining.push(w),
        }
    }
    an.ctx.pending_witnesses = remaining;

    Ty::Forall {
        vars: qvars,
        constraints: forall_constraints,
        ty: Box::new(body),
    }
}
