//! Integration tests for records: row polymorphism, closed-record
//! checking, destructuring, and alias transparency.

use vesper_ast::build::AstBuilder;
use vesper_sema::error::SemaErrorKind;
use vesper_sema::ty::Ty;
use vesper_sema::{analyze_file, AnalysisResult};

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

/// `get_name = fn r -> r.name` generalizes over both the field type and
/// the row; calling it with `{name: "a", age: 3}` yields the field type.
#[test]
fn row_polymorphic_field_access() {
    let mut b = AstBuilder::new();
    let r_param = b.param("r", None);
    let r_ref = b.ident("r");
    let access = b.member(r_ref, "name");
    let get_name_fn = b.fn_expr(vec![r_param], None, access);
    let get_name = b.fn_decl("get_name", get_name_fn);

    let name_val = b.str("a");
    let age_val = b.int(3);
    let record = b.record(vec![("name", name_val), ("age", age_val)]);
    let call = b.call_name("get_name", vec![record]);
    let out = b.let_decl("out", None, call);
    let file = b.file("main.vsp", vec![get_name, out]);

    let result = analyze_file(&file);
    assert_no_errors(&result);

    match result.type_of_global("get_name") {
        Some(Ty::Forall { vars, .. }) => {
            assert_eq!(vars.len(), 2, "field type and row variable are quantified");
        }
        other => panic!("expected a quantified function, got {:?}", other),
    }
    assert_eq!(result.type_of_global("out"), Some(&Ty::string()));
}

/// The same accessor works at a second record shape: the row variable is
/// instantiated freshly per call.
#[test]
fn row_polymorphism_is_reusable_across_shapes() {
    let mut b = AstBuilder::new();
    let r_param = b.param("r", None);
    let r_ref = b.ident("r");
    let access = b.member(r_ref, "name");
    let get_name_fn = b.fn_expr(vec![r_param], None, access);
    let get_name = b.fn_decl("get_name", get_name_fn);

    let n1 = b.str("a");
    let a1 = b.int(3);
    let rec1 = b.record(vec![("name", n1), ("age", a1)]);
    let call1 = b.call_name("get_name", vec![rec1]);
    let first = b.let_decl("first", None, call1);

    let n2 = b.int(7);
    let rec2 = b.record(vec![("name", n2)]);
    let call2 = b.call_name("get_name", vec![rec2]);
    let second = b.let_decl("second", None, call2);

    let file = b.file("main.vsp", vec![get_name, first, second]);
    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("first"), Some(&Ty::string()));
    assert_eq!(result.type_of_global("second"), Some(&Ty::int()));
}

#[test]
fn missing_field_on_closed_record_is_reported() {
    let mut b = AstBuilder::new();
    let x_val = b.int(1);
    let record = b.record(vec![("x", x_val)]);
    let rec_decl = b.let_decl("p", None, record);
    let p_ref = b.ident("p");
    let access = b.member(p_ref, "y");
    let decl = b.expr_decl(access);
    let file = b.file("main.vsp", vec![rec_decl, decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::NoSuchField { field, .. } if field == "y"),
        "NoSuchField(y)",
    );
}

#[test]
fn record_pattern_destructures_in_match() {
    let mut b = AstBuilder::new();
    let name_val = b.str("a");
    let record = b.record(vec![("name", name_val)]);
    let n_pat = b.p_bind("n");
    let pat = b.p_record(vec![("name", n_pat)], false);
    let body = b.ident("n");
    let m = b.match_(record, vec![(pat, body)]);
    let decl = b.let_decl("v", None, m);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("v"), Some(&Ty::string()));
}

#[test]
fn record_pattern_with_rest_tolerates_extra_fields() {
    let mut b = AstBuilder::new();
    let name_val = b.str("a");
    let age_val = b.int(3);
    let record = b.record(vec![("name", name_val), ("age", age_val)]);
    let n_pat = b.p_bind("n");
    let pat = b.p_record(vec![("name", n_pat)], true);
    let body = b.ident("n");
    let m = b.match_(record, vec![(pat, body)]);
    let decl = b.let_decl("v", None, m);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("v"), Some(&Ty::string()));
}

#[test]
fn destructuring_a_non_record_is_reported() {
    let mut b = AstBuilder::new();
    let scrutinee = b.int(1);
    let n_pat = b.p_bind("n");
    let pat = b.p_record(vec![("name", n_pat)], false);
    let body = b.int(0);
    let m = b.match_(scrutinee, vec![(pat, body)]);
    let decl = b.expr_decl(m);
    let file = b.file("main.vsp", vec![decl]);

    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::NonRecordDestructure { .. }),
        "NonRecordDestructure",
    );
}

// ── Aliases ────────────────────────────────────────────────────────────

/// `type Person = {name: String}` is transparent to calls and field
/// access but keeps its own name for display.
#[test]
fn alias_is_transparent_and_nominal() {
    let mut b = AstBuilder::new();
    let name_field = b.t_name("String");
    let person_body = b.t_record(vec![("name", name_field)], false, None);
    let person = b.type_alias("Person", &[], person_body);

    let p_ann = b.t_name("Person");
    let p_param = b.param("p", Some(p_ann));
    let p_ref = b.ident("p");
    let access = b.member(p_ref, "name");
    let get_fn = b.fn_expr(vec![p_param], None, access);
    let get = b.fn_decl("get_name", get_fn);

    let name_val = b.str("ada");
    let record = b.record(vec![("name", name_val)]);
    let call = b.call_name("get_name", vec![record]);
    let out = b.let_decl("out", None, call);

    let file = b.file("main.vsp", vec![person, get, out]);
    let result = analyze_file(&file);
    assert_no_errors(&result);

    // The parameter displays as Person, not as its underlying record.
    match result.type_of_global("get_name") {
        Some(Ty::Func { params, .. }) => {
            assert_eq!(format!("{}", params[0]), "Person");
        }
        other => panic!("expected a function, got {:?}", other),
    }
    assert_eq!(
        result.type_of_global("out").map(|t| format!("{}", t)),
        Some("String".to_string())
    );
}

/// A parameterized alias unifies through its expansion.
#[test]
fn parameterized_alias_expands_in_calls() {
    let mut b = AstBuilder::new();
    // type Pair<a> = (a, a)
    let a1 = b.t_var("a");
    let a2 = b.t_var("a");
    let pair_body = b.t_tuple(vec![a1, a2]);
    let pair = b.type_alias("Pair", &["a"], pair_body);

    // fn first(p: Pair<Int>) -> Int via tuple pattern match
    let int_arg = b.t_name("Int");
    let pair_int = b.t_app_name("Pair", vec![int_arg]);
    let p_param = b.param("p", Some(pair_int));
    let x_pat = b.p_bind("x");
    let wild = b.p_wild();
    let tup_pat = b.p_tuple(vec![x_pat, wild]);
    let p_ref = b.ident("p");
    let body = b.ident("x");
    let m = b.match_(p_ref, vec![(tup_pat, body)]);
    let first_fn = b.fn_expr(vec![p_param], None, m);
    let first = b.fn_decl("first", first_fn);

    let one = b.int(1);
    let two = b.int(2);
    let tup = b.tuple(vec![one, two]);
    let call = b.call_name("first", vec![tup]);
    let out = b.let_decl("out", None, call);

    let file = b.file("main.vsp", vec![pair, first, out]);
    let result = analyze_file(&file);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("out"), Some(&Ty::int()));
}

/// Nominal ADTs are not unwrapped structurally: a single-constructor
/// type wrapping a record stays distinct from the bare record.
#[test]
fn nominal_adt_is_not_transparently_unwrapped() {
    let mut b = AstBuilder::new();
    // type Box do MkBox({v: Int}) end
    let v_field = b.t_name("Int");
    let rec = b.t_record(vec![("v", v_field)], false, None);
    let adt = b.type_adt("Box", &[], vec![("MkBox", vec![rec])]);

    // fn open(x: Box) -> ... expects the nominal type; passing the bare
    // record must fail.
    let box_ann = b.t_name("Box");
    let x_param = b.param("x", Some(box_ann));
    let body = b.int(0);
    let open_fn = b.fn_expr(vec![x_param], None, body);
    let open = b.fn_decl("open", open_fn);

    let v_val = b.int(1);
    let bare = b.record(vec![("v", v_val)]);
    let call = b.call_name("open", vec![bare]);
    let decl = b.expr_decl(call);

    let file = b.file("main.vsp", vec![adt, open, decl]);
    let result = analyze_file(&file);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::Mismatch { .. }),
        "Mismatch between nominal Box and bare record",
    );
}
