//! Integration tests for core inference: let-polymorphism, literals,
//! control flow, calls, pipes, and comprehension typing.

use vesper_ast::build::AstBuilder;
use vesper_sema::error::SemaErrorKind;
use vesper_sema::ty::Ty;
use vesper_sema::{analyze_file, AnalysisResult};

// ── Helpers ────────────────────────────────────────────────────────────

fn assert_no_errors(result: &AnalysisResult) {
    assert!(
        result.errors.is_empty(),
        "expected no errors, got: {:?}",
        result.errors
    );
}

fn assert_has_error<F: Fn(&SemaErrorKind) -> bool>(result: &AnalysisResult, pred: F, desc: &str) {
    assert!(
        result.errors.iter().any(|e| pred(&e.kind)),
        "expected error matching `{}`, got errors: {:?}",
        desc,
        result.errors
    );
}

// ── Let-polymorphism ───────────────────────────────────────────────────

/// `id = fn x -> x`, then `a = id(1)` and `b = id("x")`: the identity
/// generalizes to one quantified variable and instantiates freshly at
/// each use.
#[test]
fn polymorphic_identity() {
    let mut b = AstBuilder::new();
    let body = b.ident("x");
    let lam = b.lambda(&["x"], body);
    let id_decl = b.let_decl("id", None, lam);
    let one = b.int(1);
    let call_a = b.call_name("id", vec![one]);
    let a_decl = b.let_decl("a", None, call_a);
    let s = b.str("x");
    let call_b = b.call_name("id", vec![s]);
    let b_decl = b.let_decl("b", None, call_b);
    let file = b.file("main.vsp", vec![id_decl, a_decl, b_decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);

    match result.type_of_global("id") {
        Some(Ty::Forall { vars, ty, .. }) => {
            assert_eq!(vars.len(), 1, "identity quantifies one variable");
            assert!(matches!(**ty, Ty::Func { .. }));
        }
        other => panic!("expected a quantified function, got {:?}", other),
    }
    assert_eq!(result.type_of_global("a"), Some(&Ty::int()));
    assert_eq!(result.type_of_global("b"), Some(&Ty::string()));
}

/// Every instantiation is independent: using `id` at `Int` does not pin
/// later uses.
#[test]
fn instantiation_map_recorded_on_identifier() {
    let mut b = AstBuilder::new();
    let body = b.ident("x");
    let lam = b.lambda(&["x"], body);
    let id_decl = b.let_decl("id", None, lam);
    let callee = b.ident("id");
    let callee_id = callee.id;
    let one = b.int(1);
    let call = b.call(callee, vec![one]);
    let a_decl = b.let_decl("a", None, call);
    let file = b.file("main.vsp", vec![id_decl, a_decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    let info = result
        .calls
        .get(&callee_id)
        .expect("identifier use records its instantiation");
    assert_eq!(info.instantiation.len(), 1);
    assert!(info.instantiation.values().all(|t| t == &Ty::int()));
}

// ── Literals and collections ───────────────────────────────────────────

#[test]
fn list_elements_must_unify() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let s = b.str("x");
    let list = b.list(vec![one, s]);
    let decl = b.expr_decl(list);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::Mismatch { .. }),
        "Mismatch",
    );
}

#[test]
fn homogeneous_list_is_list_of_elem() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let two = b.int(2);
    let list = b.list(vec![one, two]);
    let decl = b.let_decl("xs", None, list);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("xs"), Some(&Ty::list(Ty::int())));
}

#[test]
fn map_literal_unifies_keys_and_values() {
    let mut b = AstBuilder::new();
    let k1 = b.str("a");
    let v1 = b.int(1);
    let k2 = b.str("b");
    let v2 = b.int(2);
    let map = b.map(vec![(k1, v1), (k2, v2)]);
    let decl = b.let_decl("m", None, map);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(
        result.type_of_global("m"),
        Some(&Ty::map_ty(Ty::string(), Ty::int()))
    );
}

#[test]
fn tuple_literal() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let s = b.str("x");
    let tup = b.tuple(vec![one, s]);
    let decl = b.let_decl("t", None, tup);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(
        result.type_of_global("t"),
        Some(&Ty::Tuple(vec![Ty::int(), Ty::string()]))
    );
}

// ── Names and scoping ──────────────────────────────────────────────────

#[test]
fn undeclared_identifier_is_reported_and_recovered() {
    let mut b = AstBuilder::new();
    let y = b.ident("y");
    let decl = b.expr_decl(y);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::UndeclaredIdent { name } if name == "y"),
        "UndeclaredIdent(y)",
    );
    assert_eq!(result.errors[0].code(), "A001");
}

#[test]
fn constants_are_define_once() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let first = b.let_decl("k", None, one);
    let two = b.int(2);
    let second = b.let_decl("k", None, two);
    let file = b.file("main.vsp", vec![first, second]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::ConstantRedefined { name } if name == "k"),
        "ConstantRedefined(k)",
    );
}

#[test]
fn forward_references_resolve_through_headers() {
    let mut b = AstBuilder::new();
    // fn caller() -> Int do callee(1) end, with callee defined after.
    let one = b.int(1);
    let call = b.call_name("callee", vec![one]);
    let ret_int = b.t_name("Int");
    let caller_fn = b.fn_expr(vec![], Some(ret_int), call);
    let caller = b.fn_decl("caller", caller_fn);

    let x_ann = b.t_name("Int");
    let x_param = b.param("x", Some(x_ann));
    let ret_int2 = b.t_name("Int");
    let body = b.ident("x");
    let callee_fn = b.fn_expr(vec![x_param], Some(ret_int2), body);
    let callee = b.fn_decl("callee", callee_fn);

    let file = b.file("main.vsp", vec![caller, callee]);
    let result = analyze_file(&file);
    assert_no_errors(&result);
}

// ── Control flow ───────────────────────────────────────────────────────

#[test]
fn if_branches_unify() {
    let mut b = AstBuilder::new();
    let cond = b.bool(true);
    let then_b = b.int(1);
    let else_b = b.int(2);
    let if_e = b.if_(cond, then_b, Some(else_b));
    let decl = b.let_decl("v", None, if_e);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("v"), Some(&Ty::int()));
}

#[test]
fn if_branch_mismatch_is_reported() {
    let mut b = AstBuilder::new();
    let cond = b.bool(true);
    let then_b = b.int(1);
    let else_b = b.str("x");
    let if_e = b.if_(cond, then_b, Some(else_b));
    let decl = b.expr_decl(if_e);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::Mismatch { .. }),
        "Mismatch",
    );
}

#[test]
fn if_condition_must_be_bool() {
    let mut b = AstBuilder::new();
    let cond = b.int(1);
    let then_b = b.int(1);
    let if_e = b.if_(cond, then_b, None);
    let decl = b.expr_decl(if_e);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::Mismatch { expected, .. } if expected == &Ty::bool()),
        "condition Mismatch against Bool",
    );
}

#[test]
fn match_on_option_binds_and_unifies_arms() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let scrutinee = b.call_name("Some", vec![one]);
    let n_pat = b.p_bind("n");
    let some_pat = b.p_ctor("Some", vec![n_pat]);
    let some_body = b.ident("n");
    let none_pat = b.p_ctor("None", vec![]);
    let none_body = b.int(0);
    let m = b.match_(scrutinee, vec![(some_pat, some_body), (none_pat, none_body)]);
    let decl = b.let_decl("v", None, m);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("v"), Some(&Ty::int()));
}

#[test]
fn constructor_pattern_arity_is_checked() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let scrutinee = b.call_name("Some", vec![one]);
    let p1 = b.p_bind("a");
    let p2 = b.p_bind("c");
    let bad_pat = b.p_ctor("Some", vec![p1, p2]);
    let body = b.int(0);
    let m = b.match_(scrutinee, vec![(bad_pat, body)]);
    let decl = b.expr_decl(m);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::ArityMismatch { expected: 1, found: 2 }),
        "ArityMismatch(1, 2)",
    );
}

// ── Assignment ─────────────────────────────────────────────────────────

#[test]
fn assignment_to_variable_unifies() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let decl = b.var_decl("m", None, one);
    let two = b.int(2);
    let assign = b.assign("m", two);
    let assign_decl = b.expr_decl(assign);
    let file = b.file("main.vsp", vec![decl, assign_decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
}

#[test]
fn assignment_to_constant_is_rejected() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let decl = b.let_decl("k", None, one);
    let two = b.int(2);
    let assign = b.assign("k", two);
    let assign_decl = b.expr_decl(assign);
    let file = b.file("main.vsp", vec![decl, assign_decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::AssignToConstant { name } if name == "k"),
        "AssignToConstant(k)",
    );
}

#[test]
fn assignment_type_mismatch_is_reported() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let decl = b.var_decl("m", None, one);
    let s = b.str("x");
    let assign = b.assign("m", s);
    let assign_decl = b.expr_decl(assign);
    let file = b.file("main.vsp", vec![decl, assign_decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::Mismatch { .. }),
        "Mismatch",
    );
}

// ── Calls ──────────────────────────────────────────────────────────────

#[test]
fn partial_application_returns_remaining_function() {
    let mut b = AstBuilder::new();
    let x_ann = b.t_name("Int");
    let y_ann = b.t_name("Int");
    let ret_ann = b.t_name("Int");
    let x_param = b.param("x", Some(x_ann));
    let y_param = b.param("y", Some(y_ann));
    let lhs = b.ident("x");
    let rhs = b.ident("y");
    let body = b.infix("+", lhs, rhs);
    let add2_fn = b.fn_expr(vec![x_param, y_param], Some(ret_ann), body);
    let add2 = b.fn_decl("add2", add2_fn);

    let one = b.int(1);
    let partial = b.call_name("add2", vec![one]);
    let inc = b.let_decl("inc", None, partial);
    let file = b.file("main.vsp", vec![add2, inc]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    match result.type_of_global("inc") {
        Some(Ty::Func { params, ret, .. }) => {
            assert_eq!(params, &vec![Ty::int()]);
            assert_eq!(**ret, Ty::int());
        }
        other => panic!("expected a function of one argument, got {:?}", other),
    }
}

#[test]
fn too_many_arguments_is_reported() {
    let mut b = AstBuilder::new();
    let x_ann = b.t_name("Int");
    let x_param = b.param("x", Some(x_ann));
    let body = b.ident("x");
    let f_fn = b.fn_expr(vec![x_param], None, body);
    let f = b.fn_decl("f", f_fn);
    let one = b.int(1);
    let two = b.int(2);
    let call = b.call_name("f", vec![one, two]);
    let decl = b.expr_decl(call);
    let file = b.file("main.vsp", vec![f, decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::ArityMismatch { expected: 1, found: 2 }),
        "ArityMismatch(1, 2)",
    );
}

#[test]
fn calling_a_non_function_is_reported() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let k = b.let_decl("k", None, one);
    let arg = b.int(2);
    let call = b.call_name("k", vec![arg]);
    let decl = b.expr_decl(call);
    let file = b.file("main.vsp", vec![k, decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::NotCallable { ty } if ty == &Ty::int()),
        "NotCallable(Int)",
    );
}

#[test]
fn tuple_spread_distributes_positionally() {
    let mut b = AstBuilder::new();
    let x_ann = b.t_name("Int");
    let y_ann = b.t_name("Int");
    let x_param = b.param("x", Some(x_ann));
    let y_param = b.param("y", Some(y_ann));
    let lhs = b.ident("x");
    let rhs = b.ident("y");
    let body = b.infix("+", lhs, rhs);
    let add2_fn = b.fn_expr(vec![x_param, y_param], None, body);
    let add2 = b.fn_decl("add2", add2_fn);

    let one = b.int(1);
    let two = b.int(2);
    let pair = b.tuple(vec![one, two]);
    let pair_decl = b.let_decl("pair", None, pair);
    let pair_ref = b.ident("pair");
    let spread = b.spread(pair_ref);
    let call = b.call_name("add2", vec![spread]);
    let sum = b.let_decl("sum", None, call);
    let file = b.file("main.vsp", vec![add2, pair_decl, sum]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("sum"), Some(&Ty::int()));
}

// ── Pipes ──────────────────────────────────────────────────────────────

#[test]
fn pipe_appends_value_as_argument() {
    let mut b = AstBuilder::new();
    let x_ann = b.t_name("Int");
    let x_param = b.param("x", Some(x_ann));
    let lhs = b.ident("x");
    let rhs = b.ident("x");
    let body = b.infix("+", lhs, rhs);
    let double_fn = b.fn_expr(vec![x_param], None, body);
    let double = b.fn_decl("double", double_fn);

    let one = b.int(1);
    let target = b.call_name("double", vec![]);
    let piped = b.infix("|>", one, target);
    let decl = b.let_decl("v", None, piped);
    let file = b.file("main.vsp", vec![double, decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("v"), Some(&Ty::int()));
}

#[test]
fn pipe_placeholder_receives_value() {
    let mut b = AstBuilder::new();
    let x_ann = b.t_name("Int");
    let y_ann = b.t_name("Int");
    let x_param = b.param("x", Some(x_ann));
    let y_param = b.param("y", Some(y_ann));
    let lhs = b.ident("x");
    let rhs = b.ident("y");
    let body = b.infix("-", lhs, rhs);
    let sub_fn = b.fn_expr(vec![x_param, y_param], None, body);
    let sub = b.fn_decl("sub", sub_fn);

    let ten = b.int(10);
    let hole = b.placeholder();
    let three = b.int(3);
    let target = b.call_name("sub", vec![hole, three]);
    let piped = b.infix("|>", ten, target);
    let decl = b.let_decl("v", None, piped);
    let file = b.file("main.vsp", vec![sub, decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("v"), Some(&Ty::int()));
}

#[test]
fn pipe_unwrap_extracts_ok_type() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let wrapped = b.call_name("Ok", vec![one]);
    let ok_decl = b.let_decl("r", None, wrapped);

    let x_ann = b.t_name("Int");
    let x_param = b.param("x", Some(x_ann));
    let body = b.ident("x");
    let keep_fn = b.fn_expr(vec![x_param], None, body);
    let keep = b.fn_decl("keep", keep_fn);

    let r = b.ident("r");
    let target = b.call_name("keep", vec![]);
    let piped = b.infix("|>>", r, target);
    let decl = b.let_decl("v", None, piped);
    let file = b.file("main.vsp", vec![ok_decl, keep, decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("v"), Some(&Ty::int()));
}

// ── Comprehensions and ranges ──────────────────────────────────────────

#[test]
fn list_comprehension_yields_list_of_body_type() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let two = b.int(2);
    let three = b.int(3);
    let xs = b.list(vec![one, two, three]);
    let x_pat = b.p_bind("x");
    let generator = b.generator(x_pat, xs);
    let lhs = b.ident("x");
    let two_b = b.int(2);
    let body = b.infix("*", lhs, two_b);
    let comp = b.for_(vec![generator], body);
    let decl = b.let_decl("doubled", None, comp);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(
        result.type_of_global("doubled"),
        Some(&Ty::list(Ty::int()))
    );
}

#[test]
fn comprehension_filter_must_be_bool() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let xs = b.list(vec![one]);
    let x_pat = b.p_bind("x");
    let generator = b.generator(x_pat, xs);
    let bad_filter = b.int(7);
    let body = b.ident("x");
    let comp = b.for_(
        vec![generator, vesper_ast::expr::ForClause::Filter(bad_filter)],
        body,
    );
    let decl = b.expr_decl(comp);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::Mismatch { expected, .. } if expected == &Ty::bool()),
        "filter Mismatch against Bool",
    );
}

#[test]
fn range_bounds_unify() {
    let mut b = AstBuilder::new();
    let start = b.int(1);
    let end = b.int(10);
    let range = b.range(start, end);
    let decl = b.let_decl("r", None, range);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("r"), Some(&Ty::range(Ty::int())));
}

// ── Output invariants ──────────────────────────────────────────────────

/// Every node in an error-free module has a ground (or quantified) type
/// in the type map; applying the final substitution again changes
/// nothing.
#[test]
fn type_map_is_ground_after_analysis() {
    let mut b = AstBuilder::new();
    let body = b.ident("x");
    let lam = b.lambda(&["x"], body);
    let id_decl = b.let_decl("id", None, lam);
    let one = b.int(1);
    let call = b.call_name("id", vec![one]);
    let a_decl = b.let_decl("a", None, call);
    let file = b.file("main.vsp", vec![id_decl, a_decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert!(!result.types.is_empty());
}
