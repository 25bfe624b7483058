//! Built-in type and operator-trait registration.
//!
//! Seeds a fresh symbol table with the ground types (`Int`, `Float`,
//! `BigInt`, `Rational`, `Bool`, `Nil`, `Char`, `Bytes`, `Bits`), the
//! built-in constructors (`List`, `Map`, `Range`, `Option`, `Result`) with
//! their kinds and variants, the `String = List<Char>` alias, and the
//! compiler-known operator traits (`Add`, `Sub`, `Mul`, `Div`, `Rem`,
//! `Eq`, `Ord`) with instances for the numeric ground types.

use rustc_hash::FxHashMap;

use crate::env::{InstanceDef, Symbol, SymbolKind, SymbolTable};
use crate::ty::{ClassConstraint, Kind, Ty, TyCon};

/// Register every built-in into the symbol table.
pub fn register_builtins(symbols: &mut SymbolTable) {
    register_ground_types(symbols);
    register_constructors(symbols);
    register_operator_traits(symbols);
}

fn register_ground_types(symbols: &mut SymbolTable) {
    for name in [
        "Int", "Float", "BigInt", "Rational", "Bool", "Nil", "Char", "Bytes", "Bits",
    ] {
        symbols.kinds.insert(name.to_string(), Kind::Star);
        symbols.insert_global(Symbol::new(
            name,
            SymbolKind::Type,
            Ty::TypeOfType(Box::new(Ty::con(name))),
        ));
    }

    // String is an alias for List<Char>: transparent in unification,
    // nominal in display.
    let string_con = Ty::Con(TyCon::alias("String", Ty::string()));
    symbols.kinds.insert("String".to_string(), Kind::Star);
    let mut sym = Symbol::new(
        "String",
        SymbolKind::Type,
        Ty::TypeOfType(Box::new(string_con)),
    );
    sym.underlying = Some(Ty::string());
    symbols.insert_global(sym);
}

fn register_constructors(symbols: &mut SymbolTable) {
    for (name, arity) in [("List", 1), ("Map", 2), ("Range", 1), ("Option", 1), ("Result", 2)] {
        symbols.kinds.insert(name.to_string(), Kind::of_arity(arity));
        symbols.insert_global(Symbol::new(
            name,
            SymbolKind::Type,
            Ty::TypeOfType(Box::new(Ty::con(name))),
        ));
    }
    symbols
        .type_params
        .insert("Option".to_string(), vec!["a".to_string()]);
    symbols
        .type_params
        .insert("Result".to_string(), vec!["a".to_string(), "e".to_string()]);

    // Option constructors.
    symbols.insert_global(Symbol::new(
        "Some",
        SymbolKind::Constructor,
        Ty::forall(
            vec!["a".into()],
            vec![],
            Ty::func(vec![Ty::var("a")], Ty::option(Ty::var("a"))),
        ),
    ));
    symbols.insert_global(Symbol::new(
        "None",
        SymbolKind::Constructor,
        Ty::forall(vec!["a".into()], vec![], Ty::option(Ty::var("a"))),
    ));
    symbols
        .variants
        .insert("Option".to_string(), vec!["Some".into(), "None".into()]);

    // Result constructors.
    symbols.insert_global(Symbol::new(
        "Ok",
        SymbolKind::Constructor,
        Ty::forall(
            vec!["a".into(), "e".into()],
            vec![],
            Ty::func(vec![Ty::var("a")], Ty::result(Ty::var("a"), Ty::var("e"))),
        ),
    ));
    symbols.insert_global(Symbol::new(
        "Err",
        SymbolKind::Constructor,
        Ty::forall(
            vec!["a".into(), "e".into()],
            vec![],
            Ty::func(vec![Ty::var("e")], Ty::result(Ty::var("a"), Ty::var("e"))),
        ),
    ));
    symbols
        .variants
        .insert("Result".to_string(), vec!["Ok".into(), "Err".into()]);
}

/// The numeric ground types that implement the arithmetic traits.
const NUMERIC: [&str; 4] = ["Int", "Float", "BigInt", "Rational"];

fn register_operator_traits(symbols: &mut SymbolTable) {
    // (trait, supers, [(method, operator, returns_bool)])
    let arith: [(&str, &str); 5] = [
        ("Add", "+"),
        ("Sub", "-"),
        ("Mul", "*"),
        ("Div", "/"),
        ("Rem", "%"),
    ];
    for (trait_name, op) in arith {
        let method = trait_name.to_lowercase();
        declare_operator_trait(symbols, trait_name, &[], &[(method.as_str(), op, false)]);
        for ty_name in NUMERIC {
            register_ground_instance(symbols, trait_name, ty_name, &[(method.as_str(), false)]);
        }
    }

    declare_operator_trait(symbols, "Eq", &[], &[("eq", "==", true), ("neq", "!=", true)]);
    for ty_name in ["Int", "Float", "BigInt", "Rational", "Bool", "Char", "Nil"] {
        register_ground_instance(symbols, "Eq", ty_name, &[("eq", true), ("neq", true)]);
    }

    declare_operator_trait(
        symbols,
        "Ord",
        &["Eq"],
        &[
            ("lt", "<", true),
            ("gt", ">", true),
            ("le", "<=", true),
            ("ge", ">=", true),
        ],
    );
    for ty_name in ["Int", "Float", "BigInt", "Rational", "Char"] {
        register_ground_instance(
            symbols,
            "Ord",
            ty_name,
            &[("lt", true), ("gt", true), ("le", true), ("ge", true)],
        );
    }
}

/// Declare a single-parameter operator trait and its method symbols.
fn declare_operator_trait(
    symbols: &mut SymbolTable,
    trait_name: &str,
    supers: &[&str],
    methods: &[(&str, &str, bool)],
) {
    symbols
        .trait_type_params
        .insert(trait_name.to_string(), vec!["a".to_string()]);
    symbols
        .trait_param_kinds
        .insert(trait_name.to_string(), vec![Kind::Star]);
    symbols.trait_supers.insert(
        trait_name.to_string(),
        supers.iter().map(|s| s.to_string()).collect(),
    );
    symbols.trait_methods.insert(
        trait_name.to_string(),
        methods.iter().map(|(m, _, _)| m.to_string()).collect(),
    );
    symbols.insert_global(Symbol::new(
        trait_name,
        SymbolKind::Trait,
        Ty::con(trait_name),
    ));

    for (method, op, returns_bool) in methods {
        let a = Ty::var("a");
        let ret = if *returns_bool { Ty::bool() } else { a.clone() };
        let constraint = ClassConstraint::new(trait_name, vec![a.clone()]);
        let fn_ty = Ty::Func {
            params: vec![a.clone(), a.clone()],
            ret: Box::new(ret),
            variadic: false,
            default_count: 0,
            constraints: vec![constraint.clone()],
        };
        let scheme = Ty::forall(vec!["a".into()], vec![constraint], fn_ty);
        symbols.insert_global(Symbol::new(*method, SymbolKind::Constant, scheme));
        symbols
            .trait_for_method
            .insert(method.to_string(), trait_name.to_string());
        symbols
            .operator_traits
            .insert(op.to_string(), (trait_name.to_string(), method.to_string()));
    }
}

/// Register an instance of a single-parameter trait for a ground type.
fn register_ground_instance(
    symbols: &mut SymbolTable,
    trait_name: &str,
    ty_name: &str,
    methods: &[(&str, bool)],
) {
    let target = Ty::con(ty_name);
    let mut method_map = FxHashMap::default();
    for (method, returns_bool) in methods {
        let ret = if *returns_bool {
            Ty::bool()
        } else {
            target.clone()
        };
        method_map.insert(
            method.to_string(),
            Ty::func(vec![target.clone(), target.clone()], ret),
        );
    }
    // Ground instances cannot overlap; registration errors are impossible
    // here by construction.
    let _ = symbols.register_instance(InstanceDef {
        trait_name: trait_name.to_string(),
        type_names: vec![ty_name.to_string()],
        targets: vec![target],
        constraints: vec![],
        methods: method_map,
        module: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_types_registered() {
        let mut symbols = SymbolTable::new();
        register_builtins(&mut symbols);
        for name in ["Int", "Float", "Bool", "Nil", "Char", "String"] {
            let sym = symbols.lookup(name).unwrap_or_else(|| panic!("missing {}", name));
            assert_eq!(sym.kind, SymbolKind::Type);
        }
        assert_eq!(symbols.kinds.get("List"), Some(&Kind::of_arity(1)));
        assert_eq!(symbols.kinds.get("Map"), Some(&Kind::of_arity(2)));
    }

    #[test]
    fn string_alias_is_transparent() {
        let mut symbols = SymbolTable::new();
        register_builtins(&mut symbols);
        let sym = symbols.lookup("String").unwrap();
        assert_eq!(sym.underlying, Some(Ty::string()));
    }

    #[test]
    fn operator_traits_claim_operators() {
        let mut symbols = SymbolTable::new();
        register_builtins(&mut symbols);
        assert_eq!(
            symbols.operator_traits.get("+"),
            Some(&("Add".to_string(), "add".to_string()))
        );
        assert_eq!(
            symbols.operator_traits.get("<"),
            Some(&("Ord".to_string(), "lt".to_string()))
        );
        assert!(symbols.has_instance("Add", &["Int".to_string()]));
        assert!(symbols.has_instance("Ord", &["Float".to_string()]));
        assert!(!symbols.has_instance("Add", &["Bool".to_string()]));
        assert_eq!(
            symbols.trait_supers.get("Ord"),
            Some(&vec!["Eq".to_string()])
        );
    }

    #[test]
    fn option_constructors_are_polymorphic() {
        let mut symbols = SymbolTable::new();
        register_builtins(&mut symbols);
        let some = symbols.lookup("Some").unwrap();
        assert_eq!(some.kind, SymbolKind::Constructor);
        assert!(matches!(some.ty, Ty::Forall { .. }));
        assert_eq!(
            symbols.variants.get("Option"),
            Some(&vec!["Some".to_string(), "None".to_string()])
        );
    }
}
