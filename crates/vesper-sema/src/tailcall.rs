//! Tail-call marking.
//!
//! A post-pass over the analyzed AST: a call is in tail position when it
//! is the last expression of a block or expression-statement, or an arm
//! of a conditional/match that is itself in tail position. The flag is
//! recorded on the call's [`CallInfo`].

use rustc_hash::FxHashMap;
use vesper_ast::decl::DeclKind;
use vesper_ast::expr::{Expr, ExprKind, ForClause, Stmt};
use vesper_ast::module::File;
use vesper_ast::NodeId;

use crate::ctx::CallInfo;

/// Mark tail calls in every declaration of a file.
pub fn mark_file(calls: &mut FxHashMap<NodeId, CallInfo>, file: &File) {
    for decl in &file.decls {
        match &decl.kind {
            DeclKind::Fn(f) => mark_expr(calls, &f.fn_expr.body, true),
            DeclKind::Let(l) => mark_expr(calls, &l.value, false),
            DeclKind::Expr(e) => mark_expr(calls, e, true),
            DeclKind::Instance(inst) => {
                for method in &inst.methods {
                    mark_expr(calls, &method.fn_expr.body, true);
                }
            }
            DeclKind::Trait(t) => {
                for method in &t.methods {
                    if let Some(body) = &method.default_body {
                        mark_expr(calls, &body.body, true);
                    }
                }
            }
            DeclKind::Type(_) | DeclKind::Import(_) | DeclKind::Reexport(_) => {}
        }
    }
}

fn mark_expr(calls: &mut FxHashMap<NodeId, CallInfo>, expr: &Expr, tail: bool) {
    match &expr.kind {
        ExprKind::Call(call) => {
            if tail {
                calls.entry(expr.id).or_default().is_tail = true;
            }
            mark_expr(calls, &call.callee, false);
            for arg in &call.args {
                mark_expr(calls, arg, false);
            }
        }
        ExprKind::Block(stmts) => {
            for (i, stmt) in stmts.iter().enumerate() {
                let last = i == stmts.len() - 1;
                match stmt {
                    Stmt::Let(l) => mark_expr(calls, &l.value, false),
                    Stmt::Expr(e) => mark_expr(calls, e, tail && last),
                }
            }
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            mark_expr(calls, cond, false);
            mark_expr(calls, then_branch, tail);
            if let Some(else_branch) = else_branch {
                mark_expr(calls, else_branch, tail);
            }
        }
        ExprKind::Match { scrutinee, arms } => {
            mark_expr(calls, scrutinee, false);
            for arm in arms {
                mark_expr(calls, &arm.body, tail);
            }
        }
        // A lambda body starts its own tail context.
        ExprKind::Lambda(f) => mark_expr(calls, &f.body, true),
        ExprKind::Infix { lhs, rhs, .. } => {
            mark_expr(calls, lhs, false);
            mark_expr(calls, rhs, false);
        }
        ExprKind::Member { target, .. } => mark_expr(calls, target, false),
        ExprKind::Assign { value, .. } => mark_expr(calls, value, false),
        ExprKind::List(items) | ExprKind::Tuple(items) => {
            for item in items {
                mark_expr(calls, item, false);
            }
        }
        ExprKind::Map(entries) => {
            for (k, v) in entries {
                mark_expr(calls, k, false);
                mark_expr(calls, v, false);
            }
        }
        ExprKind::RecordLit(fields) => {
            for (_, value) in fields {
                mark_expr(calls, value, false);
            }
        }
        ExprKind::For { clauses, body } => {
            for clause in clauses {
                match clause {
                    ForClause::Generator { iter, .. } => mark_expr(calls, iter, false),
                    ForClause::Filter(cond) => mark_expr(calls, cond, false),
                }
            }
            mark_expr(calls, body, false);
        }
        ExprKind::Range { start, step, end } => {
            mark_expr(calls, start, false);
            if let Some(step) = step {
                mark_expr(calls, step, false);
            }
            mark_expr(calls, end, false);
        }
        ExprKind::Spread(inner) => mark_expr(calls, inner, false),
        ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::BigInt(_)
        | ExprKind::Rational(_)
        | ExprKind::Bool(_)
        | ExprKind::Nil
        | ExprKind::Char(_)
        | ExprKind::Str(_)
        | ExprKind::Bytes(_)
        | ExprKind::Bits(_)
        | ExprKind::FormatStr(_)
        | ExprKind::Ident(_)
        | ExprKind::Placeholder => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_ast::build::AstBuilder;

    #[test]
    fn call_in_fn_body_is_tail() {
        let mut b = AstBuilder::new();
        let callee = b.ident("f");
        let arg = b.int(1);
        let call = b.call(callee, vec![arg]);
        let call_id = call.id;
        let body = call;
        let f = b.fn_expr(vec![], None, body);
        let decl = b.fn_decl("loop_forever", f);
        let file = b.file("t.vsp", vec![decl]);

        let mut calls = FxHashMap::default();
        mark_file(&mut calls, &file);
        assert!(calls.get(&call_id).map_or(false, |c| c.is_tail));
    }

    #[test]
    fn branches_inherit_tail_position() {
        let mut b = AstBuilder::new();
        let cond_callee = b.ident("p");
        let cond = b.call(cond_callee, vec![]);
        let cond_id = cond.id;
        let then_callee = b.ident("f");
        let then_call = b.call(then_callee, vec![]);
        let then_id = then_call.id;
        let else_callee = b.ident("g");
        let else_call = b.call(else_callee, vec![]);
        let else_id = else_call.id;
        let body = b.if_(cond, then_call, Some(else_call));
        let f = b.fn_expr(vec![], None, body);
        let decl = b.fn_decl("choose", f);
        let file = b.file("t.vsp", vec![decl]);

        let mut calls = FxHashMap::default();
        mark_file(&mut calls, &file);
        assert!(!calls.get(&cond_id).map_or(false, |c| c.is_tail));
        assert!(calls.get(&then_id).map_or(false, |c| c.is_tail));
        assert!(calls.get(&else_id).map_or(false, |c| c.is_tail));
    }

    #[test]
    fn arguments_are_not_tail() {
        let mut b = AstBuilder::new();
        let inner_callee = b.ident("g");
        let inner = b.call(inner_callee, vec![]);
        let inner_id = inner.id;
        let outer_callee = b.ident("f");
        let outer = b.call(outer_callee, vec![inner]);
        let outer_id = outer.id;
        let f = b.fn_expr(vec![], None, outer);
        let decl = b.fn_decl("wrap", f);
        let file = b.file("t.vsp", vec![decl]);

        let mut calls = FxHashMap::default();
        mark_file(&mut calls, &file);
        assert!(calls.get(&outer_id).map_or(false, |c| c.is_tail));
        assert!(!calls.get(&inner_id).map_or(false, |c| c.is_tail));
    }
}
