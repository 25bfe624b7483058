//! Unification and kind checking.
//!
//! `unify` computes the most general substitution making two types equal,
//! or reports why none exists. Aliases are peeled through the
//! [`ResolveTypeAlias`] callback so that `String` and `List<Char>` unify
//! while `String` keeps its own name for display. Records unify
//! row-polymorphically; open rows absorb each other's residue fields.

use rustc_hash::FxHashMap;

use crate::ctx::InferCtx;
use crate::env::SymbolTable;
use crate::error::SemaErrorKind;
use crate::ty::{Kind, Subst, Ty};

/// Callback used to peel type aliases during unification: given an alias
/// name, return its underlying structure.
pub trait ResolveTypeAlias {
    fn resolve_type_alias(&self, name: &str) -> Option<Ty>;
}

/// How strictly records are compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnifyMode {
    /// Field sets must agree exactly (modulo rows).
    Exact,
    /// The right-hand side must provide at least the left-hand side's
    /// fields; extras are tolerated. Used for call arguments.
    AllowExtra,
}

/// Compute the kind of a type, consulting the constructor kind registry.
pub fn kind_of(ty: &Ty, kinds: &FxHashMap<String, Kind>) -> Kind {
    match ty {
        Ty::Var { kind, .. } => kind.clone(),
        Ty::Con(con) => kinds.get(&con.name).cloned().unwrap_or(Kind::Star),
        Ty::App(con, args) => {
            let mut k = kind_of(con, kinds);
            for _ in args {
                k = match k {
                    Kind::Arrow(_, rest) => *rest,
                    Kind::Star => Kind::Star,
                };
            }
            k
        }
        _ => Kind::Star,
    }
}

/// Check a type application against the head's kind: every argument's kind
/// must equal the corresponding arrow domain. Returns the result kind.
pub fn check_app_kinds(
    head: &Ty,
    args: &[Ty],
    kinds: &FxHashMap<String, Kind>,
) -> Result<Kind, SemaErrorKind> {
    let mut k = kind_of(head, kinds);
    for arg in args {
        match k {
            Kind::Arrow(dom, rest) => {
                let ak = kind_of(arg, kinds);
                if ak != *dom {
                    return Err(SemaErrorKind::KindMismatch {
                        expected: *dom,
                        found: ak,
                        ty: arg.clone(),
                    });
                }
                k = *rest;
            }
            Kind::Star => {
                return Err(SemaErrorKind::TypeArgsOnGround { ty: head.clone() });
            }
        }
    }
    Ok(k)
}

/// Peel one alias layer: `Con` with an underlying, a name resolving to an
/// alias through the symbol table, or an application of a parameterized
/// alias (substituting its declared parameters).
fn peel_alias(ty: &Ty, symbols: &SymbolTable) -> Option<Ty> {
    match ty {
        Ty::Con(con) => con
            .underlying
            .as_deref()
            .cloned()
            .or_else(|| symbols.resolve_type_alias(&con.name)),
        Ty::App(head, args) => {
            let con_name = match head.as_ref() {
                Ty::Con(c) => c.name.clone(),
                _ => return None,
            };
            let body = peel_alias(head, symbols)?;
            let params = symbols.type_params.get(&con_name)?;
            if params.len() != args.len() {
                return None;
            }
            let mut subst = Subst::empty();
            for (p, a) in params.iter().zip(args) {
                subst.insert(p.clone(), a.clone());
            }
            Some(body.apply(&subst))
        }
        _ => None,
    }
}

impl InferCtx {
    /// Unify two types exactly.
    pub fn unify(
        &mut self,
        a: &Ty,
        b: &Ty,
        symbols: &SymbolTable,
    ) -> Result<Subst, SemaErrorKind> {
        self.unify_mode(a, b, symbols, UnifyMode::Exact)
    }

    /// Unify, letting the right-hand record supply extra fields.
    pub fn unify_allow_extra(
        &mut self,
        a: &Ty,
        b: &Ty,
        symbols: &SymbolTable,
    ) -> Result<Subst, SemaErrorKind> {
        self.unify_mode(a, b, symbols, UnifyMode::AllowExtra)
    }

    fn unify_mode(
        &mut self,
        a: &Ty,
        b: &Ty,
        symbols: &SymbolTable,
        mode: UnifyMode,
    ) -> Result<Subst, SemaErrorKind> {
        if a == b {
            return Ok(Subst::empty());
        }

        match (a, b) {
            // Quantified types are instantiated, then unified.
            (Ty::Forall { .. }, _) => {
                let (inst, _) = self.instantiate(a);
                self.unify_mode(&inst, b, symbols, mode)
            }
            (_, Ty::Forall { .. }) => {
                let (inst, _) = self.instantiate(b);
                self.unify_mode(a, &inst, symbols, mode)
            }

            // Variables bind, with occurs and kind checks. Rigid variables
            // only unify with themselves (handled by the equality check
            // above).
            (Ty::Var { name, kind }, other) if self.is_inference_var(name) => {
                self.bind_var(name, kind, other, symbols)
            }
            (other, Ty::Var { name, kind }) if self.is_inference_var(name) => {
                self.bind_var(name, kind, other, symbols)
            }

            // Constructors: equal names were caught above; otherwise try
            // alias transparency before giving up.
            (Ty::Con(_), _) | (_, Ty::Con(_)) | (Ty::App(..), Ty::App(..))
                if peel_alias(a, symbols).is_some() || peel_alias(b, symbols).is_some() =>
            {
                let pa = peel_alias(a, symbols).unwrap_or_else(|| a.clone());
                let pb = peel_alias(b, symbols).unwrap_or_else(|| b.clone());
                self.unify_mode(&pa, &pb, symbols, mode)
            }

            // Nullary-application identity: `Con(T)` is `App(Con(T), [])`.
            (Ty::Con(c), Ty::App(head, args)) | (Ty::App(head, args), Ty::Con(c))
                if args.is_empty()
                    && matches!(head.as_ref(), Ty::Con(hc) if hc.name == c.name) =>
            {
                Ok(Subst::empty())
            }

            (Ty::App(c1, args1), Ty::App(c2, args2)) => {
                if args1.len() != args2.len() {
                    return Err(SemaErrorKind::ArityMismatch {
                        expected: args1.len(),
                        found: args2.len(),
                    });
                }
                let mut pairs = vec![(c1.as_ref().clone(), c2.as_ref().clone())];
                pairs.extend(args1.iter().cloned().zip(args2.iter().cloned()));
                self.unify_pairs(pairs, symbols)
            }

            (
                Ty::Func {
                    params: p1,
                    ret: r1,
                    variadic: v1,
                    ..
                },
                Ty::Func {
                    params: p2,
                    ret: r2,
                    variadic: v2,
                    ..
                },
            ) => self.unify_funcs(p1, r1, *v1, p2, r2, *v2, symbols),

            (Ty::Tuple(e1), Ty::Tuple(e2)) => {
                if e1.len() != e2.len() {
                    return Err(SemaErrorKind::ArityMismatch {
                        expected: e1.len(),
                        found: e2.len(),
                    });
                }
                self.unify_pairs(e1.iter().cloned().zip(e2.iter().cloned()).collect(), symbols)
            }

            (Ty::Record { .. }, Ty::Record { .. }) => {
                self.unify_records(a, b, symbols, mode)
            }

            (Ty::Union(_), _) | (_, Ty::Union(_)) => {
                self.unify_unions(a, b, symbols, mode)
            }

            (Ty::TypeOfType(t1), Ty::TypeOfType(t2)) => {
                self.unify_mode(t1, t2, symbols, mode)
            }

            _ => Err(SemaErrorKind::Mismatch {
                expected: a.clone(),
                found: b.clone(),
            }),
        }
    }

    /// Bind an inference variable to a type.
    fn bind_var(
        &mut self,
        name: &str,
        kind: &Kind,
        other: &Ty,
        symbols: &SymbolTable,
    ) -> Result<Subst, SemaErrorKind> {
        if let Ty::Var { name: other_name, .. } = other {
            if other_name == name {
                return Ok(Subst::empty());
            }
        }
        if other.free_vars().iter().any(|v| v == name) {
            return Err(SemaErrorKind::OccursCheck {
                var: name.to_string(),
                ty: other.clone(),
            });
        }
        let other_kind = kind_of(other, &symbols.kinds);
        if *kind != other_kind {
            return Err(SemaErrorKind::KindMismatch {
                expected: kind.clone(),
                found: other_kind,
                ty: other.clone(),
            });
        }
        Ok(Subst::singleton(name, other.clone()))
    }

    /// Unify a list of pairs, threading the accumulated substitution.
    fn unify_pairs(
        &mut self,
        pairs: Vec<(Ty, Ty)>,
        symbols: &SymbolTable,
    ) -> Result<Subst, SemaErrorKind> {
        let mut s = Subst::empty();
        for (x, y) in pairs {
            let s1 = self.unify_mode(&x.apply(&s), &y.apply(&s), symbols, UnifyMode::Exact)?;
            s = Subst::compose(&s1, &s);
        }
        Ok(s)
    }

    fn unify_funcs(
        &mut self,
        p1: &[Ty],
        r1: &Ty,
        v1: bool,
        p2: &[Ty],
        r2: &Ty,
        v2: bool,
        symbols: &SymbolTable,
    ) -> Result<Subst, SemaErrorKind> {
        if v1 == v2 {
            if p1.len() != p2.len() {
                return Err(SemaErrorKind::ArityMismatch {
                    expected: p1.len(),
                    found: p2.len(),
                });
            }
            let mut pairs: Vec<(Ty, Ty)> =
                p1.iter().cloned().zip(p2.iter().cloned()).collect();
            pairs.push((r1.clone(), r2.clone()));
            return self.unify_pairs(pairs, symbols);
        }
        // One side is variadic: the other must supply at least the fixed
        // prefix; its trailing parameters match the variadic element type.
        let (vparams, vret, fparams, fret) = if v1 {
            (p1, r1, p2, r2)
        } else {
            (p2, r2, p1, r1)
        };
        let fixed = vparams.len().saturating_sub(1);
        if fparams.len() < fixed {
            return Err(SemaErrorKind::ArityMismatch {
                expected: fixed,
                found: fparams.len(),
            });
        }
        let elem = variadic_elem(vparams.last().expect("variadic function has parameters"));
        let mut pairs: Vec<(Ty, Ty)> = vparams[..fixed]
            .iter()
            .cloned()
            .zip(fparams[..fixed].iter().cloned())
            .collect();
        for trailing in &fparams[fixed..] {
            pairs.push((elem.clone(), trailing.clone()));
        }
        pairs.push((vret.clone(), fret.clone()));
        self.unify_pairs(pairs, symbols)
    }

    fn unify_records(
        &mut self,
        a: &Ty,
        b: &Ty,
        symbols: &SymbolTable,
        mode: UnifyMode,
    ) -> Result<Subst, SemaErrorKind> {
        let (af, aopen, arow) = match a {
            Ty::Record { fields, open, row } => (fields, *open, row.clone()),
            _ => unreachable!("unify_records called on non-records"),
        };
        let (bf, bopen, brow) = match b {
            Ty::Record { fields, open, row } => (fields, *open, row.clone()),
            _ => unreachable!("unify_records called on non-records"),
        };

        let mut s = Subst::empty();
        for (name, at) in af {
            if let Some(bt) = bf.get(name) {
                let s1 =
                    self.unify_mode(&at.apply(&s), &bt.apply(&s), symbols, UnifyMode::Exact)?;
                s = Subst::compose(&s1, &s);
            }
        }
        let a_only: Vec<(String, Ty)> = af
            .iter()
            .filter(|(n, _)| !bf.contains_key(*n))
            .map(|(n, t)| (n.clone(), t.apply(&s)))
            .collect();
        let b_only: Vec<(String, Ty)> = bf
            .iter()
            .filter(|(n, _)| !af.contains_key(*n))
            .map(|(n, t)| (n.clone(), t.apply(&s)))
            .collect();

        match (aopen, bopen) {
            (false, false) => {
                let extras_ok = match mode {
                    UnifyMode::Exact => a_only.is_empty() && b_only.is_empty(),
                    UnifyMode::AllowExtra => a_only.is_empty(),
                };
                if extras_ok {
                    Ok(s)
                } else {
                    Err(SemaErrorKind::Mismatch {
                        expected: a.clone(),
                        found: b.clone(),
                    })
                }
            }
            (true, false) => {
                // Every field the open side names must exist on the closed
                // side; the closed side's residue solves the row.
                if let Some((field, _)) = a_only.first() {
                    return Err(SemaErrorKind::NoSuchField {
                        ty: b.clone(),
                        field: field.clone(),
                    });
                }
                if let Some(row) = arow {
                    let residue = Ty::Record {
                        fields: b_only.into_iter().collect(),
                        open: false,
                        row: None,
                    };
                    s = Subst::compose(&Subst::singleton(row, residue), &s);
                }
                Ok(s)
            }
            (false, true) => {
                if let Some((field, _)) = b_only.first() {
                    return Err(SemaErrorKind::NoSuchField {
                        ty: a.clone(),
                        field: field.clone(),
                    });
                }
                if let Some(row) = brow {
                    let residue = Ty::Record {
                        fields: a_only.into_iter().collect(),
                        open: false,
                        row: None,
                    };
                    s = Subst::compose(&Subst::singleton(row, residue), &s);
                }
                Ok(s)
            }
            (true, true) => {
                if arow == brow {
                    // Same row variable on both sides: residues must agree.
                    if a_only.is_empty() && b_only.is_empty() {
                        return Ok(s);
                    }
                    return Err(SemaErrorKind::Mismatch {
                        expected: a.clone(),
                        found: b.clone(),
                    });
                }
                // Fresh row absorbing both residues.
                let fresh = self.fresh_row();
                if let Some(row) = arow {
                    let residue = Ty::Record {
                        fields: b_only.into_iter().collect(),
                        open: true,
                        row: Some(fresh.clone()),
                    };
                    s = Subst::compose(&Subst::singleton(row, residue), &s);
                }
                if let Some(row) = brow {
                    let residue = Ty::Record {
                        fields: a_only.into_iter().collect(),
                        open: true,
                        row: Some(fresh),
                    };
                    s = Subst::compose(&Subst::singleton(row, residue), &s);
                }
                Ok(s)
            }
        }
    }

    fn unify_unions(
        &mut self,
        a: &Ty,
        b: &Ty,
        symbols: &SymbolTable,
        mode: UnifyMode,
    ) -> Result<Subst, SemaErrorKind> {
        let na = crate::ty::normalize_union(match a {
            Ty::Union(alts) => alts.clone(),
            other => vec![other.clone()],
        });
        let nb = crate::ty::normalize_union(match b {
            Ty::Union(alts) => alts.clone(),
            other => vec![other.clone()],
        });
        match (&na, &nb) {
            (Ty::Union(xs), Ty::Union(ys)) => {
                if xs.len() != ys.len() {
                    return Err(SemaErrorKind::Mismatch {
                        expected: na.clone(),
                        found: nb.clone(),
                    });
                }
                self.unify_pairs(xs.iter().cloned().zip(ys.iter().cloned()).collect(), symbols)
            }
            (Ty::Union(_), single) | (single, Ty::Union(_)) => {
                // A singleton collapsed; the remaining union cannot match.
                let _ = single;
                Err(SemaErrorKind::Mismatch {
                    expected: na.clone(),
                    found: nb.clone(),
                })
            }
            (x, y) => self.unify_mode(x, y, symbols, mode),
        }
    }

    // ── Instantiation and freshening ───────────────────────────────────

    /// Instantiate a `Forall` with fresh inference variables. Returns the
    /// instantiated type and the generic-name → fresh-type mapping (empty
    /// for non-quantified types).
    pub fn instantiate(&mut self, ty: &Ty) -> (Ty, FxHashMap<String, Ty>) {
        match ty {
            Ty::Forall { vars, ty: body, .. } => {
                let mut mapping = FxHashMap::default();
                let mut subst = Subst::empty();
                for v in vars {
                    let kind = var_kind_in(body, v).unwrap_or(Kind::Star);
                    let fresh = self.fresh_var_k(kind);
                    mapping.insert(v.clone(), fresh.clone());
                    subst.insert(v.clone(), fresh);
                }
                (body.apply(&subst), mapping)
            }
            _ => (ty.clone(), FxHashMap::default()),
        }
    }

    /// Replace every rigid variable in a type with a consistent fresh
    /// inference variable. Used to match instance targets structurally
    /// without capturing their parameter names.
    pub fn freshen_rigid(&mut self, ty: &Ty) -> Ty {
        let mut subst = Subst::empty();
        for v in ty.free_vars() {
            if !self.is_inference_var(&v) {
                let kind = var_kind_in(ty, &v).unwrap_or(Kind::Star);
                subst.insert(v, self.fresh_var_k(kind));
            }
        }
        ty.apply(&subst)
    }
}

/// The declared kind of a named variable's first occurrence in a type.
pub fn var_kind_in(ty: &Ty, target: &str) -> Option<Kind> {
    match ty {
        Ty::Var { name, kind } if name == target => Some(kind.clone()),
        Ty::Var { .. } | Ty::Con(_) => None,
        Ty::App(con, args) => var_kind_in(con, target)
            .or_else(|| args.iter().find_map(|a| var_kind_in(a, target))),
        Ty::Func {
            params,
            ret,
            constraints,
            ..
        } => params
            .iter()
            .find_map(|p| var_kind_in(p, target))
            .or_else(|| var_kind_in(ret, target))
            .or_else(|| {
                constraints
                    .iter()
                    .flat_map(|c| c.args.iter())
                    .find_map(|a| var_kind_in(a, target))
            }),
        Ty::Tuple(elems) => elems.iter().find_map(|e| var_kind_in(e, target)),
        Ty::Record { fields, .. } => fields.values().find_map(|t| var_kind_in(t, target)),
        Ty::Union(alts) => alts.iter().find_map(|a| var_kind_in(a, target)),
        Ty::Forall { vars, ty, .. } => {
            if vars.iter().any(|v| v == target) {
                None
            } else {
                var_kind_in(ty, target)
            }
        }
        Ty::TypeOfType(t) => var_kind_in(t, target),
    }
}

/// Fully peel alias layers off a type.
pub fn peel_aliases(ty: &Ty, symbols: &SymbolTable) -> Ty {
    let mut current = ty.clone();
    let mut fuel = 32;
    while fuel > 0 {
        match peel_alias(&current, symbols) {
            Some(next) => current = next,
            None => break,
        }
        fuel -= 1;
    }
    current
}

/// The element type of a variadic parameter (declared as `List<elem>`).
pub fn variadic_elem(param: &Ty) -> Ty {
    match param {
        Ty::App(head, args) if args.len() == 1 => match head.as_ref() {
            Ty::Con(c) if c.name == "List" => args[0].clone(),
            _ => param.clone(),
        },
        _ => param.clone(),
    }
}
