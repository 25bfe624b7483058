//! Integration tests for the four-phase module driver: selective and
//! qualified imports, re-exports, conflicts, and import cycles.

use vesper_ast::build::AstBuilder;
use vesper_ast::module::Module;
use vesper_sema::analyze;
use vesper_sema::error::SemaErrorKind;
use vesper_sema::modules::MapLoader;
use vesper_sema::ty::Ty;
use vesper_sema::AnalysisResult;

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

/// A module exporting `base: Int` and `twice: (Int) -> Int`.
fn math_module(b: &mut AstBuilder) -> Module {
    let int_ann = b.t_name("Int");
    let one = b.int(1);
    let base = b.let_decl("base", Some(int_ann), one);

    let x_ann = b.t_name("Int");
    let x_param = b.param("x", Some(x_ann));
    let lhs = b.ident("x");
    let rhs = b.ident("x");
    let body = b.infix("+", lhs, rhs);
    let twice_fn = b.fn_expr(vec![x_param], None, body);
    let twice = b.fn_decl("twice", twice_fn);

    let file = b.file("math.vsp", vec![base, twice]);
    b.module("Math", vec![file])
}

// ── Selective imports ──────────────────────────────────────────────────

#[test]
fn selective_import_installs_named_symbols() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();
    loader.add(math_module(&mut b));

    let import = b.import_names("Math", &["twice"]);
    let arg = b.int(3);
    let call = b.call_name("twice", vec![arg]);
    let out = b.let_decl("out", None, call);
    let file = b.file("main.vsp", vec![import, out]);
    let main = b.module("Main", vec![file]);

    let result = analyze(&main, &loader);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("out"), Some(&Ty::int()));
}

#[test]
fn unknown_export_is_reported() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();
    loader.add(math_module(&mut b));

    let import = b.import_names("Math", &["nope"]);
    let file = b.file("main.vsp", vec![import]);
    let main = b.module("Main", vec![file]);

    let result = analyze(&main, &loader);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::UnknownExport { name, .. } if name == "nope"),
        "UnknownExport(nope)",
    );
}

#[test]
fn unknown_module_is_reported() {
    let mut b = AstBuilder::new();
    let loader = MapLoader::new();

    let import = b.import_names("Nowhere", &["x"]);
    let file = b.file("main.vsp", vec![import]);
    let main = b.module("Main", vec![file]);

    let result = analyze(&main, &loader);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::UnknownModule { name } if name == "Nowhere"),
        "UnknownModule(Nowhere)",
    );
}

/// The same name imported from two different modules is a conflict; the
/// same name re-imported from the same module is not.
#[test]
fn conflicting_import_origins_are_fatal() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();

    let int_ann = b.t_name("Int");
    let one = b.int(1);
    let f1 = b.let_decl("shared", Some(int_ann), one);
    let file1 = b.file("m1.vsp", vec![f1]);
    loader.add(b.module("M1", vec![file1]));

    let int_ann2 = b.t_name("Int");
    let two = b.int(2);
    let f2 = b.let_decl("shared", Some(int_ann2), two);
    let file2 = b.file("m2.vsp", vec![f2]);
    loader.add(b.module("M2", vec![file2]));

    let import1 = b.import_names("M1", &["shared"]);
    let import2 = b.import_names("M2", &["shared"]);
    let file = b.file("main.vsp", vec![import1, import2]);
    let main = b.module("Main", vec![file]);

    let result = analyze(&main, &loader);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::ConflictingImport { name, .. } if name == "shared"),
        "ConflictingImport(shared)",
    );
}

#[test]
fn duplicate_import_from_same_origin_is_permitted() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();
    loader.add(math_module(&mut b));

    let import1 = b.import_names("Math", &["twice"]);
    let import2 = b.import_names("Math", &["twice"]);
    let file = b.file("main.vsp", vec![import1, import2]);
    let main = b.module("Main", vec![file]);

    let result = analyze(&main, &loader);
    assert_no_errors(&result);
}

/// Importing a type brings its constructors along.
#[test]
fn importing_a_type_imports_its_constructors() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();

    let float_ann = b.t_name("Float");
    let shape = b.type_adt("Shape", &[], vec![("Circle", vec![float_ann]), ("Dot", vec![])]);
    let shapes_file = b.file("shapes.vsp", vec![shape]);
    loader.add(b.module("Shapes", vec![shapes_file]));

    let import = b.import_names("Shapes", &["Shape"]);
    let radius = b.float(1.0);
    let circle = b.call_name("Circle", vec![radius]);
    let out = b.let_decl("c", None, circle);
    let file = b.file("main.vsp", vec![import, out]);
    let main = b.module("Main", vec![file]);

    let result = analyze(&main, &loader);
    assert_no_errors(&result);
    assert_eq!(
        result.type_of_global("c").map(|t| format!("{}", t)),
        Some("Shape".to_string())
    );
}

// ── Qualified imports ──────────────────────────────────────────────────

#[test]
fn qualified_import_exposes_module_record() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();
    loader.add(math_module(&mut b));

    let import = b.import("Math", vesper_ast::decl::ImportSelector::Qualified);
    let math_ref = b.ident("Math");
    let twice_ref = b.member(math_ref, "twice");
    let arg = b.int(5);
    let call = b.call(twice_ref, vec![arg]);
    let out = b.let_decl("out", None, call);
    let file = b.file("main.vsp", vec![import, out]);
    let main = b.module("Main", vec![file]);

    let result = analyze(&main, &loader);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("out"), Some(&Ty::int()));
}

#[test]
fn qualified_access_to_unknown_export_is_reported() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();
    loader.add(math_module(&mut b));

    let import = b.import("Math", vesper_ast::decl::ImportSelector::Qualified);
    let math_ref = b.ident("Math");
    let missing = b.member(math_ref, "nope");
    let decl = b.expr_decl(missing);
    let file = b.file("main.vsp", vec![import, decl]);
    let main = b.module("Main", vec![file]);

    let result = analyze(&main, &loader);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::UnknownExport { name, .. } if name == "nope"),
        "UnknownExport(nope)",
    );
}

// ── Re-exports ─────────────────────────────────────────────────────────

#[test]
fn reexported_symbols_flow_through() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();
    loader.add(math_module(&mut b));

    // Hub imports Math and republishes `twice`.
    let hub_import = b.import_names("Math", &["twice"]);
    let hub_reexport = b.reexport("Math", &["twice"]);
    let hub_file = b.file("hub.vsp", vec![hub_import, hub_reexport]);
    loader.add(b.module("Hub", vec![hub_file]));

    let import = b.import_names("Hub", &["twice"]);
    let arg = b.int(2);
    let call = b.call_name("twice", vec![arg]);
    let out = b.let_decl("out", None, call);
    let file = b.file("main.vsp", vec![import, out]);
    let main = b.module("Main", vec![file]);

    let result = analyze(&main, &loader);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("out"), Some(&Ty::int()));
}

#[test]
fn reexport_requires_prior_import() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();
    loader.add(math_module(&mut b));

    let reexport = b.reexport("Math", &["twice"]);
    let file = b.file("main.vsp", vec![reexport]);
    let main = b.module("Main", vec![file]);

    let result = analyze(&main, &loader);
    assert_has_error(
        &result,
        |e| matches!(e, SemaErrorKind::ReexportNotImported { module } if module == "Math"),
        "ReexportNotImported(Math)",
    );
}

// ── Cycles ─────────────────────────────────────────────────────────────

/// Module A imports B.x and module B imports A.y; both carry annotations
/// so headers resolve across the cycle, and bodies complete without
/// recursion or duplicate diagnostics.
#[test]
fn mutual_import_cycle_terminates() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();

    // B: import A.{y}; let x: Int = y + 1
    let import_a = b.import_names("A", &["y"]);
    let int_ann = b.t_name("Int");
    let y_ref = b.ident("y");
    let one = b.int(1);
    let x_val = b.infix("+", y_ref, one);
    let x_decl = b.let_decl("x", Some(int_ann), x_val);
    let b_file = b.file("b.vsp", vec![import_a, x_decl]);
    loader.add(b.module("B", vec![b_file]));

    // A: import B.{x}; let y: Int = 1; let z = x + 1
    let import_b = b.import_names("B", &["x"]);
    let int_ann2 = b.t_name("Int");
    let one2 = b.int(1);
    let y_decl = b.let_decl("y", Some(int_ann2), one2);
    let x_ref = b.ident("x");
    let one3 = b.int(1);
    let z_val = b.infix("+", x_ref, one3);
    let z_decl = b.let_decl("z", None, z_val);
    let a_file = b.file("a.vsp", vec![import_b, y_decl, z_decl]);
    let a_module = b.module("A", vec![a_file]);
    loader.add(a_module.clone());

    let result = analyze(&a_module, &loader);
    assert_no_errors(&result);
    assert_eq!(result.type_of_global("z"), Some(&Ty::int()));
}

/// A module importing itself indirectly through a longer chain also
/// terminates.
#[test]
fn three_module_cycle_terminates() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();

    let import_c = b.import_names("C", &["c"]);
    let int_a = b.t_name("Int");
    let one_a = b.int(1);
    let a_decl = b.let_decl("a", Some(int_a), one_a);
    let a_file = b.file("a.vsp", vec![import_c, a_decl]);
    let module_a = b.module("A", vec![a_file]);
    loader.add(module_a.clone());

    let import_a = b.import_names("A", &["a"]);
    let int_b = b.t_name("Int");
    let one_b = b.int(2);
    let b_decl = b.let_decl("bee", Some(int_b), one_b);
    let b_file = b.file("b.vsp", vec![import_a, b_decl]);
    loader.add(b.module("B", vec![b_file]));

    let import_b = b.import_names("B", &["bee"]);
    let int_c = b.t_name("Int");
    let one_c = b.int(3);
    let c_decl = b.let_decl("c", Some(int_c), one_c);
    let c_file = b.file("c.vsp", vec![import_b, c_decl]);
    loader.add(b.module("C", vec![c_file]));

    let result = analyze(&module_a, &loader);
    assert_no_errors(&result);
}

// ── Cross-module traits ────────────────────────────────────────────────

/// A trait and its instance defined in one module dispatch correctly
/// from an importing module.
#[test]
fn imported_trait_instances_resolve() {
    let mut b = AstBuilder::new();
    let mut loader = MapLoader::new();

    // Display module: trait Show + instance for Int.
    let a = b.t_var("a");
    let ret = b.t_name("String");
    let method = b.trait_method("show", vec![a], ret);
    let trait_decl = b.trait_decl("Show", &["a"], &[], vec![method]);
    let int_ann = b.t_name("Int");
    let str_ret = b.t_name("String");
    let x_param = b.param("x", Some(int_ann));
    let body = b.str("int");
    let show_impl = b.fn_expr(vec![x_param], Some(str_ret), body);
    let int_target = b.t_name("Int");
    let instance = b.instance("Show", vec![int_target], vec![("show", show_impl)]);
    let display_file = b.file("display.vsp", vec![trait_decl, instance]);
    loader.add(b.module("Display", vec![display_file]));

    // Main imports the method; the trait and instances come along.
    let import = b.import_names("Display", &["show"]);
    let arg = b.int(7);
    let call = b.call_name("show", vec![arg]);
    let out = b.let_decl("s", None, call);
    let file = b.file("main.vsp", vec![import, out]);
    let main = b.module("Main", vec![file]);

    let result = analyze(&main, &loader);
    assert_no_errors(&result);
    assert_eq!(
        result.type_of_global("s").map(|t| format!("{}", t)),
        Some("String".to_string())
    );
}
