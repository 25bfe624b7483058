//! Programmatic AST construction.
//!
//! [`AstBuilder`] hands out fresh node ids and synthetic, strictly
//! increasing spans so trees built without a parser still have distinct,
//! ordered positions for diagnostics. The analyzer's test harness is the
//! main consumer.

use vesper_common::Span;

use crate::decl::{
    Decl, DeclKind, FnDecl, ImportDecl, ImportSelector, InstanceDecl, ReexportDecl, TraitDecl,
    TraitMethodDecl, TypeDecl, TypeDeclBody, VariantDecl,
};
use crate::expr::{
    CallExpr, ConstraintDecl, Expr, ExprKind, FnExpr, ForClause, LetStmt, LetTarget, MatchArm,
    Param, Stmt,
};
use crate::module::{File, Module};
use crate::pat::{Pat, PatKind};
use crate::types::{TypeExpr, TypeExprKind};
use crate::NodeId;

/// Allocates node ids and synthetic spans.
pub struct AstBuilder {
    next_id: u32,
    next_pos: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        AstBuilder {
            next_id: 0,
            next_pos: 0,
        }
    }

    fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Each node gets a fresh one-byte span so positions are distinct and
    /// ordered by construction order.
    fn span(&mut self) -> Span {
        let start = self.next_pos;
        self.next_pos += 1;
        Span::new(start, start + 1)
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.id(),
            span: self.span(),
            kind,
        }
    }

    // ── Expressions ────────────────────────────────────────────────────

    pub fn int(&mut self, v: i64) -> Expr {
        self.expr(ExprKind::Int(v))
    }

    pub fn float(&mut self, v: f64) -> Expr {
        self.expr(ExprKind::Float(v))
    }

    pub fn bool(&mut self, v: bool) -> Expr {
        self.expr(ExprKind::Bool(v))
    }

    pub fn str(&mut self, s: &str) -> Expr {
        self.expr(ExprKind::Str(s.to_string()))
    }

    pub fn char(&mut self, c: char) -> Expr {
        self.expr(ExprKind::Char(c))
    }

    pub fn nil(&mut self) -> Expr {
        self.expr(ExprKind::Nil)
    }

    pub fn ident(&mut self, name: &str) -> Expr {
        self.expr(ExprKind::Ident(name.to_string()))
    }

    pub fn list(&mut self, items: Vec<Expr>) -> Expr {
        self.expr(ExprKind::List(items))
    }

    pub fn map(&mut self, entries: Vec<(Expr, Expr)>) -> Expr {
        self.expr(ExprKind::Map(entries))
    }

    pub fn tuple(&mut self, items: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Tuple(items))
    }

    pub fn record(&mut self, fields: Vec<(&str, Expr)>) -> Expr {
        let fields = fields
            .into_iter()
            .map(|(n, e)| (n.to_string(), e))
            .collect();
        self.expr(ExprKind::RecordLit(fields))
    }

    pub fn spread(&mut self, inner: Expr) -> Expr {
        self.expr(ExprKind::Spread(Box::new(inner)))
    }

    pub fn placeholder(&mut self) -> Expr {
        self.expr(ExprKind::Placeholder)
    }

    pub fn call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call(CallExpr {
            callee: Box::new(callee),
            args,
        }))
    }

    pub fn call_name(&mut self, name: &str, args: Vec<Expr>) -> Expr {
        let callee = self.ident(name);
        self.call(callee, args)
    }

    pub fn infix(&mut self, op: &str, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Infix {
            op: op.to_string(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn member(&mut self, target: Expr, field: &str) -> Expr {
        self.expr(ExprKind::Member {
            target: Box::new(target),
            field: field.to_string(),
        })
    }

    pub fn if_(&mut self, cond: Expr, then_branch: Expr, else_branch: Option<Expr>) -> Expr {
        self.expr(ExprKind::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn assign(&mut self, name: &str, value: Expr) -> Expr {
        self.expr(ExprKind::Assign {
            name: name.to_string(),
            value: Box::new(value),
        })
    }

    pub fn block(&mut self, stmts: Vec<Stmt>) -> Expr {
        self.expr(ExprKind::Block(stmts))
    }

    pub fn match_(&mut self, scrutinee: Expr, arms: Vec<(Pat, Expr)>) -> Expr {
        let arms = arms
            .into_iter()
            .map(|(pat, body)| MatchArm {
                id: self.id(),
                span: self.span(),
                pat,
                body,
            })
            .collect();
        self.expr(ExprKind::Match {
            scrutinee: Box::new(scrutinee),
            arms,
        })
    }

    pub fn for_(&mut self, clauses: Vec<ForClause>, body: Expr) -> Expr {
        self.expr(ExprKind::For {
            clauses,
            body: Box::new(body),
        })
    }

    pub fn generator(&mut self, pat: Pat, iter: Expr) -> ForClause {
        ForClause::Generator { pat, iter }
    }

    pub fn range(&mut self, start: Expr, end: Expr) -> Expr {
        self.expr(ExprKind::Range {
            start: Box::new(start),
            step: None,
            end: Box::new(end),
        })
    }

    /// A lambda with unannotated parameters.
    pub fn lambda(&mut self, params: &[&str], body: Expr) -> Expr {
        let params = params.iter().map(|p| self.param(p, None)).collect();
        let f = FnExpr {
            type_params: Vec::new(),
            params,
            variadic: false,
            default_count: 0,
            ret: None,
            constraints: Vec::new(),
            body,
        };
        self.expr(ExprKind::Lambda(Box::new(f)))
    }

    pub fn lambda_fn(&mut self, f: FnExpr) -> Expr {
        self.expr(ExprKind::Lambda(Box::new(f)))
    }

    pub fn param(&mut self, name: &str, ann: Option<TypeExpr>) -> Param {
        Param {
            id: self.id(),
            span: self.span(),
            name: name.to_string(),
            ann,
        }
    }

    pub fn fn_expr(&mut self, params: Vec<Param>, ret: Option<TypeExpr>, body: Expr) -> FnExpr {
        FnExpr {
            type_params: Vec::new(),
            params,
            variadic: false,
            default_count: 0,
            ret,
            constraints: Vec::new(),
            body,
        }
    }

    pub fn constraint(&mut self, var: &str, trait_name: &str) -> ConstraintDecl {
        ConstraintDecl {
            var: var.to_string(),
            trait_name: trait_name.to_string(),
            extra: Vec::new(),
        }
    }

    // ── Statements ─────────────────────────────────────────────────────

    pub fn let_stmt(&mut self, name: &str, ann: Option<TypeExpr>, value: Expr) -> Stmt {
        Stmt::Let(self.let_raw(name, ann, value, false))
    }

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        Stmt::Expr(expr)
    }

    fn let_raw(&mut self, name: &str, ann: Option<TypeExpr>, value: Expr, constant: bool) -> LetStmt {
        LetStmt {
            id: self.id(),
            span: self.span(),
            target: LetTarget::Name(name.to_string()),
            ann,
            value,
            constant,
        }
    }

    // ── Patterns ───────────────────────────────────────────────────────

    fn pat(&mut self, kind: PatKind) -> Pat {
        Pat {
            id: self.id(),
            span: self.span(),
            kind,
        }
    }

    pub fn p_wild(&mut self) -> Pat {
        self.pat(PatKind::Wildcard)
    }

    pub fn p_bind(&mut self, name: &str) -> Pat {
        self.pat(PatKind::Bind(name.to_string()))
    }

    pub fn p_int(&mut self, v: i64) -> Pat {
        self.pat(PatKind::Int(v))
    }

    pub fn p_tuple(&mut self, items: Vec<Pat>) -> Pat {
        self.pat(PatKind::Tuple(items))
    }

    pub fn p_record(&mut self, fields: Vec<(&str, Pat)>, rest: bool) -> Pat {
        let fields = fields
            .into_iter()
            .map(|(n, p)| (n.to_string(), p))
            .collect();
        self.pat(PatKind::Record { fields, rest })
    }

    pub fn p_ctor(&mut self, name: &str, args: Vec<Pat>) -> Pat {
        self.pat(PatKind::Constructor {
            name: name.to_string(),
            args,
        })
    }

    pub fn p_list(&mut self, items: Vec<Pat>, rest: Option<&str>) -> Pat {
        self.pat(PatKind::List {
            items,
            rest: rest.map(|s| s.to_string()),
        })
    }

    // ── Type expressions ───────────────────────────────────────────────

    fn ty(&mut self, kind: TypeExprKind) -> TypeExpr {
        TypeExpr {
            id: self.id(),
            span: self.span(),
            kind,
        }
    }

    pub fn t_name(&mut self, name: &str) -> TypeExpr {
        self.ty(TypeExprKind::Name(name.to_string()))
    }

    pub fn t_var(&mut self, name: &str) -> TypeExpr {
        self.ty(TypeExprKind::Var(name.to_string()))
    }

    pub fn t_app(&mut self, head: TypeExpr, args: Vec<TypeExpr>) -> TypeExpr {
        self.ty(TypeExprKind::App(Box::new(head), args))
    }

    pub fn t_app_name(&mut self, name: &str, args: Vec<TypeExpr>) -> TypeExpr {
        let head = self.t_name(name);
        self.t_app(head, args)
    }

    pub fn t_func(&mut self, params: Vec<TypeExpr>, ret: TypeExpr) -> TypeExpr {
        self.ty(TypeExprKind::Func {
            params,
            ret: Box::new(ret),
            variadic: false,
        })
    }

    pub fn t_tuple(&mut self, items: Vec<TypeExpr>) -> TypeExpr {
        self.ty(TypeExprKind::Tuple(items))
    }

    pub fn t_record(&mut self, fields: Vec<(&str, TypeExpr)>, open: bool, row: Option<&str>) -> TypeExpr {
        let fields = fields
            .into_iter()
            .map(|(n, t)| (n.to_string(), t))
            .collect();
        self.ty(TypeExprKind::Record {
            fields,
            open,
            row: row.map(|s| s.to_string()),
        })
    }

    pub fn t_union(&mut self, items: Vec<TypeExpr>) -> TypeExpr {
        self.ty(TypeExprKind::Union(items))
    }

    // ── Declarations ───────────────────────────────────────────────────

    fn decl(&mut self, kind: DeclKind) -> Decl {
        Decl {
            id: self.id(),
            span: self.span(),
            kind,
        }
    }

    pub fn fn_decl(&mut self, name: &str, f: FnExpr) -> Decl {
        self.decl(DeclKind::Fn(FnDecl {
            name: name.to_string(),
            fn_expr: f,
        }))
    }

    /// A top-level constant binding.
    pub fn let_decl(&mut self, name: &str, ann: Option<TypeExpr>, value: Expr) -> Decl {
        let stmt = self.let_raw(name, ann, value, true);
        self.decl(DeclKind::Let(stmt))
    }

    /// A top-level mutable binding.
    pub fn var_decl(&mut self, name: &str, ann: Option<TypeExpr>, value: Expr) -> Decl {
        let stmt = self.let_raw(name, ann, value, false);
        self.decl(DeclKind::Let(stmt))
    }

    pub fn expr_decl(&mut self, expr: Expr) -> Decl {
        self.decl(DeclKind::Expr(expr))
    }

    pub fn type_adt(&mut self, name: &str, params: &[&str], variants: Vec<(&str, Vec<TypeExpr>)>) -> Decl {
        let variants = variants
            .into_iter()
            .map(|(vname, fields)| VariantDecl {
                id: self.id(),
                span: self.span(),
                name: vname.to_string(),
                fields,
            })
            .collect();
        self.decl(DeclKind::Type(TypeDecl {
            name: name.to_string(),
            params: params.iter().map(|s| s.to_string()).collect(),
            body: TypeDeclBody::Adt(variants),
        }))
    }

    pub fn type_alias(&mut self, name: &str, params: &[&str], underlying: TypeExpr) -> Decl {
        self.decl(DeclKind::Type(TypeDecl {
            name: name.to_string(),
            params: params.iter().map(|s| s.to_string()).collect(),
            body: TypeDeclBody::Alias(underlying),
        }))
    }

    pub fn trait_decl(
        &mut self,
        name: &str,
        type_params: &[&str],
        supers: &[&str],
        methods: Vec<TraitMethodDecl>,
    ) -> Decl {
        self.decl(DeclKind::Trait(TraitDecl {
            name: name.to_string(),
            type_params: type_params.iter().map(|s| s.to_string()).collect(),
            supers: supers.iter().map(|s| s.to_string()).collect(),
            methods,
        }))
    }

    pub fn trait_method(&mut self, name: &str, params: Vec<TypeExpr>, ret: TypeExpr) -> TraitMethodDecl {
        TraitMethodDecl {
            id: self.id(),
            span: self.span(),
            name: name.to_string(),
            operator: None,
            params,
            ret,
            default_body: None,
        }
    }

    pub fn operator_method(
        &mut self,
        name: &str,
        op: &str,
        params: Vec<TypeExpr>,
        ret: TypeExpr,
    ) -> TraitMethodDecl {
        TraitMethodDecl {
            id: self.id(),
            span: self.span(),
            name: name.to_string(),
            operator: Some(op.to_string()),
            params,
            ret,
            default_body: None,
        }
    }

    pub fn instance(
        &mut self,
        trait_name: &str,
        targets: Vec<TypeExpr>,
        methods: Vec<(&str, FnExpr)>,
    ) -> Decl {
        let methods = methods
            .into_iter()
            .map(|(name, f)| FnDecl {
                name: name.to_string(),
                fn_expr: f,
            })
            .collect();
        self.decl(DeclKind::Instance(InstanceDecl {
            trait_name: trait_name.to_string(),
            targets,
            constraints: Vec::new(),
            methods,
        }))
    }

    pub fn import(&mut self, module: &str, selector: ImportSelector) -> Decl {
        self.decl(DeclKind::Import(ImportDecl {
            module: module.to_string(),
            alias: None,
            selector,
        }))
    }

    pub fn import_names(&mut self, module: &str, names: &[&str]) -> Decl {
        self.import(
            module,
            ImportSelector::Names(names.iter().map(|s| s.to_string()).collect()),
        )
    }

    pub fn reexport(&mut self, module: &str, names: &[&str]) -> Decl {
        self.decl(DeclKind::Reexport(ReexportDecl {
            module: module.to_string(),
            names: names.iter().map(|s| s.to_string()).collect(),
        }))
    }

    // ── Files and modules ──────────────────────────────────────────────

    pub fn file(&mut self, path: &str, decls: Vec<Decl>) -> File {
        File {
            path: path.to_string(),
            decls,
            exports: None,
        }
    }

    pub fn module(&mut self, name: &str, files: Vec<File>) -> Module {
        Module {
            name: name.to_string(),
            path: name.to_lowercase(),
            files,
        }
    }
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let mut b = AstBuilder::new();
        let a = b.int(1);
        let c = b.ident("x");
        let call = b.call(c, vec![a]);
        let inner_ids = match &call.kind {
            ExprKind::Call(CallExpr { callee, args }) => {
                vec![callee.id, args[0].id]
            }
            _ => unreachable!(),
        };
        assert_ne!(call.id, inner_ids[0]);
        assert_ne!(call.id, inner_ids[1]);
        assert_ne!(inner_ids[0], inner_ids[1]);
    }

    #[test]
    fn spans_increase_in_construction_order() {
        let mut b = AstBuilder::new();
        let first = b.int(1);
        let second = b.int(2);
        assert!(first.span.start < second.span.start);
    }

    #[test]
    fn lambda_builder_wires_params() {
        let mut b = AstBuilder::new();
        let body = b.ident("x");
        let lam = b.lambda(&["x", "y"], body);
        match &lam.kind {
            ExprKind::Lambda(f) => {
                assert_eq!(f.params.len(), 2);
                assert_eq!(f.params[0].name, "x");
                assert!(f.params[0].ann.is_none());
            }
            _ => unreachable!(),
        }
    }
}
