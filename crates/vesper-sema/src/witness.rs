//! Witness resolution: dictionary elaboration after the Bodies phase.
//!
//! Drains the pending witness slots reserved at call sites, applying the
//! final global substitution. Obligations over variables still in scope
//! become *generic witnesses* (dictionary parameters of the enclosing
//! function); ground obligations are solved through the instance
//! registry, recursing into instance constraints and superclasses.
//! Remaining deferred constraints are then discharged or reported as
//! ambiguous.

use rustc_hash::FxHashSet;
use vesper_ast::NodeId;

use crate::ctx::{ConstraintKind, WitnessExpr};
use crate::env::canonical_type_name;
use crate::error::SemaErrorKind;
use crate::ty::{Subst, Ty};
use crate::unify::peel_aliases;
use crate::Analysis;

/// Resolve witnesses, solve deferred constraints, and ground the side
/// tables. Called once per module at the end of its Bodies phase.
pub fn finalize_module(an: &mut Analysis) {
    let mut reported_vars = FxHashSet::default();
    resolve_pending_witnesses(an, &mut reported_vars);
    solve_deferred(an, &reported_vars);

    // Ground every side table under the final substitution.
    let subst = an.ctx.subst.clone();
    for ty in an.ctx.types.values_mut() {
        *ty = ty.apply(&subst);
    }
    for info in an.ctx.calls.values_mut() {
        for ty in info.instantiation.values_mut() {
            *ty = ty.apply(&subst);
        }
        for ty in info.type_args.iter_mut() {
            *ty = ty.apply(&subst);
        }
    }
    an.ctx.active.clear();
    an.ctx.expected_types.clear();
    an.ctx.expected_returns.clear();
}

fn resolve_pending_witnesses(an: &mut Analysis, reported_vars: &mut FxHashSet<String>) {
    let pending = std::mem::take(&mut an.ctx.pending_witnesses);
    for w in pending {
        let args: Vec<Ty> = w.args.iter().map(|a| an.ctx.resolve(a)).collect();
        let var_arg = args.iter().find_map(|a| match a {
            Ty::Var { name, .. } => Some(name.clone()),
            _ => None,
        });
        if let Some(var) = var_arg {
            let in_scope = an
                .ctx
                .active
                .get(&var)
                .map_or(false, |cs| cs.iter().any(|c| c.trait_name == w.trait_name));
            if in_scope {
                // A generic witness: the enclosing function receives the
                // dictionary from its caller.
                set_witness(
                    an,
                    w.call,
                    w.index,
                    WitnessExpr::Param {
                        trait_name: w.trait_name.clone(),
                        var,
                    },
                );
            } else if !an.ctx.is_inference_var(&var) {
                // A rigid variable with no matching constraint in scope:
                // the trait cannot be satisfied for a bare parameter.
                reported_vars.insert(var.clone());
                an.ctx.error(
                    SemaErrorKind::NoInstance {
                        trait_name: w.trait_name.clone(),
                        ty_names: vec![var],
                    },
                    w.span,
                );
            } else {
                reported_vars.insert(var.clone());
                let ret_method = an
                    .symbols
                    .trait_methods
                    .get(&w.trait_name)
                    .and_then(|ms| {
                        ms.iter()
                            .find(|m| an.symbols.return_dispatch_methods.contains(*m))
                    })
                    .cloned();
                match ret_method {
                    Some(method) => {
                        an.ctx
                            .error(SemaErrorKind::PendingReturnContext { method }, w.span);
                    }
                    None => {
                        an.ctx.error(
                            SemaErrorKind::AmbiguousConstraint {
                                trait_name: w.trait_name.clone(),
                                ty: Ty::var(var),
                            },
                            w.span,
                        );
                    }
                }
            }
            continue;
        }
        match solve(an, &w.trait_name, &args) {
            Ok(witness) => set_witness(an, w.call, w.index, witness),
            Err(kind) => an.ctx.error(kind, w.span),
        }
    }
}

/// Solve a ground obligation into a dictionary expression.
///
/// The instance is located by the canonical head names of the (alias
/// peeled) argument vector. Its own constraints are solved first under
/// the bindings learned by matching the targets, then each superclass at
/// the same arguments; together they form the dictionary's arguments.
pub fn solve(
    an: &mut Analysis,
    trait_name: &str,
    args: &[Ty],
) -> Result<WitnessExpr, SemaErrorKind> {
    let args: Vec<Ty> = args
        .iter()
        .map(|a| peel_aliases(&an.ctx.resolve(a), &an.symbols))
        .collect();
    let type_names: Vec<String> = args.iter().map(canonical_type_name).collect();
    let Some(inst) = an.symbols.find_instance(trait_name, &type_names).cloned() else {
        return Err(SemaErrorKind::NoInstance {
            trait_name: trait_name.to_string(),
            ty_names: type_names,
        });
    };

    // Freshen the instance's rigid parameters, then match the targets
    // against the query to learn their bindings.
    let mut rename = Subst::empty();
    for target in inst.targets.iter() {
        for v in target.free_vars() {
            if !an.ctx.is_inference_var(&v) && rename.get(&v).is_none() {
                let fresh = an.ctx.fresh_var();
                rename.insert(v, fresh);
            }
        }
    }
    for c in &inst.constraints {
        for arg in &c.args {
            for v in arg.free_vars() {
                if !an.ctx.is_inference_var(&v) && rename.get(&v).is_none() {
                    let fresh = an.ctx.fresh_var();
                    rename.insert(v, fresh);
                }
            }
        }
    }
    let mut local = Subst::empty();
    for (target, arg) in inst.targets.iter().zip(&args) {
        let freshened = target.apply(&rename).apply(&local);
        let queried = arg.apply(&local);
        match an.ctx.unify(&freshened, &queried, &an.symbols) {
            Ok(s) => local = Subst::compose(&s, &local),
            Err(_) => {
                return Err(SemaErrorKind::NoInstance {
                    trait_name: trait_name.to_string(),
                    ty_names: type_names,
                });
            }
        }
    }

    let mut dict_args = Vec::new();
    for c in &inst.constraints {
        let cargs: Vec<Ty> = c
            .args
            .iter()
            .map(|a| a.apply(&rename).apply(&local))
            .collect();
        dict_args.push(solve(an, &c.trait_name, &cargs)?);
    }
    for super_name in an
        .symbols
        .trait_supers
        .get(trait_name)
        .cloned()
        .unwrap_or_default()
    {
        dict_args.push(solve(an, &super_name, &args)?);
    }

    Ok(WitnessExpr::Instance {
        trait_name: trait_name.to_string(),
        type_names: inst.type_names.clone(),
        args: dict_args,
    })
}

fn solve_deferred(an: &mut Analysis, reported_vars: &FxHashSet<String>) {
    let deferred = std::mem::take(&mut an.ctx.deferred);
    for c in deferred {
        match c.kind {
            ConstraintKind::Equal => {
                if c.args.len() == 2 {
                    let a = an.ctx.resolve(&c.args[0]);
                    let b = an.ctx.resolve(&c.args[1]);
                    an.unify_at(c.span, &a, &b);
                }
            }
            ConstraintKind::Implements => {
                let args: Vec<Ty> = c.args.iter().map(|a| an.ctx.resolve(a)).collect();
                let free: Vec<String> = args.iter().flat_map(|a| a.free_vars()).collect();
                // Rigid variables are discharged by the caller's
                // dictionary; variables already reported stay quiet.
                if free.iter().any(|v| !an.ctx.is_inference_var(v)) {
                    continue;
                }
                if free.iter().any(|v| reported_vars.contains(v)) {
                    continue;
                }
                if let Some(var) = free.first() {
                    // Ungrounded at module end: ambiguous, unless the
                    // witness pass already flagged a return-context need.
                    let has_return_dispatch = an
                        .symbols
                        .trait_methods
                        .get(&c.trait_name)
                        .map_or(false, |ms| {
                            ms.iter()
                                .any(|m| an.symbols.return_dispatch_methods.contains(m))
                        });
                    if !has_return_dispatch {
                        an.ctx.error(
                            SemaErrorKind::AmbiguousConstraint {
                                trait_name: c.trait_name.clone(),
                                ty: Ty::var(var),
                            },
                            c.span,
                        );
                    }
                    continue;
                }
                let peeled: Vec<Ty> = args
                    .iter()
                    .map(|a| peel_aliases(a, &an.symbols))
                    .collect();
                let names: Vec<String> = peeled.iter().map(canonical_type_name).collect();
                if !an.symbols.has_instance(&c.trait_name, &names) {
                    an.ctx.error(
                        SemaErrorKind::NoInstance {
                            trait_name: c.trait_name.clone(),
                            ty_names: names,
                        },
                        c.span,
                    );
                }
            }
        }
    }
}

fn set_witness(an: &mut Analysis, call: NodeId, index: usize, witness: WitnessExpr) {
    if let Some(info) = an.ctx.calls.get_mut(&call) {
        if let Some(slot) = info.witnesses.get_mut(index) {
            *slot = witness;
        }
    }
}
