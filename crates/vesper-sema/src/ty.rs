//! Type representation for the Vesper type system.
//!
//! Defines the core `Ty` enum, kinds, class constraints, and substitutions.
//! Inference variables are *named* (`t0`, `t1`, …) and resolved through an
//! explicit global [`Subst`]; composition follows `s2 ∘ s1` = apply `s2` to
//! the range of `s1`, then union with `s2`.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;

/// The kind of a type: `*` for proper types, arrows for constructors.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Star,
    Arrow(Box<Kind>, Box<Kind>),
}

impl Kind {
    pub fn arrow(from: Kind, to: Kind) -> Kind {
        Kind::Arrow(Box::new(from), Box::new(to))
    }

    /// The kind of a constructor taking `n` proper-type parameters:
    /// `* -> * -> … -> *`.
    pub fn of_arity(n: usize) -> Kind {
        let mut k = Kind::Star;
        for _ in 0..n {
            k = Kind::arrow(Kind::Star, k);
        }
        k
    }

    /// Number of parameters before the kind bottoms out at `*`.
    pub fn arity(&self) -> usize {
        match self {
            Kind::Star => 0,
            Kind::Arrow(_, rest) => 1 + rest.arity(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Star => write!(f, "*"),
            Kind::Arrow(a, b) => {
                if matches!(**a, Kind::Arrow(..)) {
                    write!(f, "({}) -> {}", a, b)
                } else {
                    write!(f, "{} -> {}", a, b)
                }
            }
        }
    }
}

/// A class constraint: a trait applied to one or more argument types.
/// Multi-parameter classes carry the full argument vector.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassConstraint {
    pub trait_name: String,
    pub args: Vec<Ty>,
}

impl ClassConstraint {
    pub fn new(trait_name: impl Into<String>, args: Vec<Ty>) -> Self {
        ClassConstraint {
            trait_name: trait_name.into(),
            args,
        }
    }
}

impl fmt::Display for ClassConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<", self.trait_name)?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", a)?;
        }
        write!(f, ">")
    }
}

/// A named type constructor.
///
/// `underlying` is set for aliases, making the alias transparent during
/// unification while keeping its own printable name. `module` records the
/// defining module for qualified display and module-tagged instance lookup.
/// Both are excluded from `PartialEq` and `Hash`: type identity is the name.
#[derive(Clone, Debug)]
pub struct TyCon {
    pub name: String,
    pub underlying: Option<Box<Ty>>,
    pub module: Option<String>,
}

impl PartialEq for TyCon {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name // underlying and module intentionally excluded
    }
}

impl Eq for TyCon {}

impl std::hash::Hash for TyCon {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state); // underlying and module intentionally excluded
    }
}

impl TyCon {
    pub fn new(name: impl Into<String>) -> Self {
        TyCon {
            name: name.into(),
            underlying: None,
            module: None,
        }
    }

    pub fn alias(name: impl Into<String>, underlying: Ty) -> Self {
        TyCon {
            name: name.into(),
            underlying: Some(Box::new(underlying)),
            module: None,
        }
    }

    pub fn with_module(name: impl Into<String>, module: impl Into<String>) -> Self {
        TyCon {
            name: name.into(),
            underlying: None,
            module: Some(module.into()),
        }
    }
}

impl fmt::Display for TyCon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(m) = &self.module {
            write!(f, "{}.{}", m, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// A Vesper type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// A type variable: inference (`t{n}`) or rigid/generic (anything else).
    Var { name: String, kind: Kind },
    /// A named nominal or alias type.
    Con(TyCon),
    /// Curried type application: `List<Int>`.
    App(Box<Ty>, Vec<Ty>),
    /// A function type with attached class constraints.
    Func {
        params: Vec<Ty>,
        ret: Box<Ty>,
        variadic: bool,
        default_count: usize,
        constraints: Vec<ClassConstraint>,
    },
    /// A tuple type.
    Tuple(Vec<Ty>),
    /// A record type. Open records carry a row variable naming the rest.
    Record {
        fields: BTreeMap<String, Ty>,
        open: bool,
        row: Option<String>,
    },
    /// A normalized union of alternatives.
    Union(Vec<Ty>),
    /// A quantified polytype produced by generalization.
    Forall {
        vars: Vec<String>,
        constraints: Vec<ClassConstraint>,
        ty: Box<Ty>,
    },
    /// A type reified as a first-class value (`List` in `List(Int)`).
    TypeOfType(Box<Ty>),
}

impl Ty {
    pub fn var(name: impl Into<String>) -> Ty {
        Ty::Var {
            name: name.into(),
            kind: Kind::Star,
        }
    }

    pub fn var_k(name: impl Into<String>, kind: Kind) -> Ty {
        Ty::Var {
            name: name.into(),
            kind,
        }
    }

    pub fn con(name: impl Into<String>) -> Ty {
        Ty::Con(TyCon::new(name))
    }

    pub fn int() -> Ty {
        Ty::con("Int")
    }

    pub fn float() -> Ty {
        Ty::con("Float")
    }

    pub fn bigint() -> Ty {
        Ty::con("BigInt")
    }

    pub fn rational() -> Ty {
        Ty::con("Rational")
    }

    pub fn bool() -> Ty {
        Ty::con("Bool")
    }

    pub fn nil() -> Ty {
        Ty::con("Nil")
    }

    pub fn char() -> Ty {
        Ty::con("Char")
    }

    pub fn bytes() -> Ty {
        Ty::con("Bytes")
    }

    pub fn bits() -> Ty {
        Ty::con("Bits")
    }

    /// Strings are lists of characters.
    pub fn string() -> Ty {
        Ty::list(Ty::char())
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::App(Box::new(Ty::con("List")), vec![elem])
    }

    pub fn map_ty(key: Ty, value: Ty) -> Ty {
        Ty::App(Box::new(Ty::con("Map")), vec![key, value])
    }

    pub fn range(elem: Ty) -> Ty {
        Ty::App(Box::new(Ty::con("Range")), vec![elem])
    }

    pub fn option(inner: Ty) -> Ty {
        Ty::App(Box::new(Ty::con("Option")), vec![inner])
    }

    pub fn result(ok: Ty, err: Ty) -> Ty {
        Ty::App(Box::new(Ty::con("Result")), vec![ok, err])
    }

    pub fn func(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Func {
            params,
            ret: Box::new(ret),
            variadic: false,
            default_count: 0,
            constraints: Vec::new(),
        }
    }

    pub fn record_closed(fields: Vec<(&str, Ty)>) -> Ty {
        Ty::Record {
            fields: fields
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
            open: false,
            row: None,
        }
    }

    pub fn record_open(fields: Vec<(&str, Ty)>, row: impl Into<String>) -> Ty {
        Ty::Record {
            fields: fields
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
            open: true,
            row: Some(row.into()),
        }
    }

    pub fn forall(vars: Vec<String>, constraints: Vec<ClassConstraint>, ty: Ty) -> Ty {
        Ty::Forall {
            vars,
            constraints,
            ty: Box::new(ty),
        }
    }

    /// Collect all variable names (including row variables) reachable in
    /// this type, in order of first appearance, without duplicates.
    pub fn free_vars(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_free_vars(&mut out);
        let mut seen = std::collections::HashSet::new();
        out.retain(|v| seen.insert(v.clone()));
        out
    }

    fn collect_free_vars(&self, out: &mut Vec<String>) {
        match self {
            Ty::Var { name, .. } => out.push(name.clone()),
            Ty::Con(_) => {}
            Ty::App(con, args) => {
                con.collect_free_vars(out);
                for a in args {
                    a.collect_free_vars(out);
                }
            }
            Ty::Func {
                params,
                ret,
                constraints,
                ..
            } => {
                for p in params {
                    p.collect_free_vars(out);
                }
                ret.collect_free_vars(out);
                for c in constraints {
                    for a in &c.args {
                        a.collect_free_vars(out);
                    }
                }
            }
            Ty::Tuple(elems) => {
                for e in elems {
                    e.collect_free_vars(out);
                }
            }
            Ty::Record { fields, row, .. } => {
                for t in fields.values() {
                    t.collect_free_vars(out);
                }
                if let Some(r) = row {
                    out.push(r.clone());
                }
            }
            Ty::Union(alts) => {
                for a in alts {
                    a.collect_free_vars(out);
                }
            }
            Ty::Forall { vars, ty, .. } => {
                let mut inner = Vec::new();
                ty.collect_free_vars(&mut inner);
                for v in inner {
                    if !vars.contains(&v) {
                        out.push(v);
                    }
                }
            }
            Ty::TypeOfType(t) => t.collect_free_vars(out),
        }
    }

    /// Apply a substitution, descending into composites. Bound variables of
    /// a `Forall` shadow the substitution.
    pub fn apply(&self, subst: &Subst) -> Ty {
        if subst.is_empty() {
            return self.clone();
        }
        match self {
            Ty::Var { name, .. } => match subst.get(name) {
                Some(t) => t.clone(),
                None => self.clone(),
            },
            Ty::Con(_) => self.clone(),
            Ty::App(con, args) => Ty::App(
                Box::new(con.apply(subst)),
                args.iter().map(|a| a.apply(subst)).collect(),
            ),
            Ty::Func {
                params,
                ret,
                variadic,
                default_count,
                constraints,
            } => Ty::Func {
                params: params.iter().map(|p| p.apply(subst)).collect(),
                ret: Box::new(ret.apply(subst)),
                variadic: *variadic,
                default_count: *default_count,
                constraints: constraints
                    .iter()
                    .map(|c| ClassConstraint {
                        trait_name: c.trait_name.clone(),
                        args: c.args.iter().map(|a| a.apply(subst)).collect(),
                    })
                    .collect(),
            },
            Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| e.apply(subst)).collect()),
            Ty::Record { fields, open, row } => {
                let mut new_fields: BTreeMap<String, Ty> = fields
                    .iter()
                    .map(|(n, t)| (n.clone(), t.apply(subst)))
                    .collect();
                let mut new_open = *open;
                let mut new_row = row.clone();
                if let Some(r) = row {
                    if let Some(bound) = subst.get(r) {
                        match bound {
                            // The row was solved to a residue record: absorb
                            // its fields and adopt its openness.
                            Ty::Record {
                                fields: extra,
                                open: o2,
                                row: r2,
                            } => {
                                for (n, t) in extra {
                                    new_fields.entry(n.clone()).or_insert_with(|| t.apply(subst));
                                }
                                new_open = *o2;
                                new_row = r2.clone();
                            }
                            Ty::Var { name, .. } => {
                                new_row = Some(name.clone());
                            }
                            _ => {}
                        }
                    }
                }
                Ty::Record {
                    fields: new_fields,
                    open: new_open,
                    row: new_row,
                }
            }
            Ty::Union(alts) => {
                normalize_union(alts.iter().map(|a| a.apply(subst)).collect())
            }
            Ty::Forall {
                vars,
                constraints,
                ty,
            } => {
                let restricted = subst.without(vars);
                Ty::Forall {
                    vars: vars.clone(),
                    constraints: constraints
                        .iter()
                        .map(|c| ClassConstraint {
                            trait_name: c.trait_name.clone(),
                            args: c.args.iter().map(|a| a.apply(&restricted)).collect(),
                        })
                        .collect(),
                    ty: Box::new(ty.apply(&restricted)),
                }
            }
            Ty::TypeOfType(t) => Ty::TypeOfType(Box::new(t.apply(subst))),
        }
    }

    /// The alias target, if this is an alias `Con`.
    pub fn alias_underlying(&self) -> Option<&Ty> {
        match self {
            Ty::Con(con) => con.underlying.as_deref(),
            _ => None,
        }
    }
}

/// Normalize a union: flatten nested unions, drop duplicates, sort for a
/// canonical order, and collapse singletons.
pub fn normalize_union(alts: Vec<Ty>) -> Ty {
    let mut flat = Vec::new();
    for alt in alts {
        match alt {
            Ty::Union(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    let mut seen = std::collections::HashSet::new();
    flat.retain(|t| seen.insert(t.clone()));
    flat.sort_by_key(|t| format!("{}", t));
    if flat.len() == 1 {
        flat.into_iter().next().unwrap()
    } else {
        Ty::Union(flat)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Var { name, .. } => write!(f, "{}", name),
            Ty::Con(con) => write!(f, "{}", con),
            Ty::App(con, args) => {
                write!(f, "{}", con)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", a)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Ty::Func {
                params,
                ret,
                variadic,
                ..
            } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if *variadic && i == params.len() - 1 {
                        write!(f, "...")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", ret)
            }
            Ty::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Ty::Record { fields, open, row } => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                if *open {
                    match row {
                        Some(r) => write!(f, " | {}", r)?,
                        None => write!(f, ", ..")?,
                    }
                }
                write!(f, "}}")
            }
            Ty::Union(alts) => {
                for (i, a) in alts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", a)?;
                }
                Ok(())
            }
            Ty::Forall {
                vars,
                constraints,
                ty,
            } => {
                write!(f, "forall")?;
                for v in vars {
                    write!(f, " {}", v)?;
                }
                write!(f, ".")?;
                if !constraints.is_empty() {
                    write!(f, " ")?;
                    for (i, c) in constraints.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", c)?;
                    }
                    write!(f, " =>")?;
                }
                write!(f, " {}", ty)
            }
            Ty::TypeOfType(t) => write!(f, "Type<{}>", t),
        }
    }
}

// ── Substitutions ──────────────────────────────────────────────────────

/// A finite map from type variable names to types.
#[derive(Clone, Debug, Default)]
pub struct Subst {
    map: FxHashMap<String, Ty>,
}

impl Subst {
    pub fn empty() -> Self {
        Subst::default()
    }

    pub fn singleton(name: impl Into<String>, ty: Ty) -> Self {
        let mut map = FxHashMap::default();
        map.insert(name.into(), ty);
        Subst { map }
    }

    pub fn get(&self, name: &str) -> Option<&Ty> {
        self.map.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: Ty) {
        self.map.insert(name.into(), ty);
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Ty)> {
        self.map.iter()
    }

    /// Composition `s2 ∘ s1`: apply `s2` to the range of `s1`, then union
    /// with `s2`, with `s1`'s entries winning for keys present in both.
    pub fn compose(s2: &Subst, s1: &Subst) -> Subst {
        let mut out = s2.clone();
        for (name, ty) in &s1.map {
            out.map.insert(name.clone(), ty.apply(s2));
        }
        out
    }

    /// A copy with the given variable names removed (used under binders).
    pub fn without(&self, vars: &[String]) -> Subst {
        let map = self
            .map
            .iter()
            .filter(|(k, _)| !vars.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Subst { map }
    }
}
