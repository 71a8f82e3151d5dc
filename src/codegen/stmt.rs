//! Statement emission (§4.6): `Let`/`Const` declare a C-level slot that's released on scope
//! exit; `If`/`ForC`/`ForEach` translate close to 1:1; `Return` either releases a void body's
//! last temp or moves the result into the function's reserved `__ret` slot.
use crate::ast::{Block, Stmt, StmtKind};
use crate::ast::Type;

use super::context::FnEmit;
use super::expr::emit_expr;
use super::mangle;

pub fn emit_block(f: &mut FnEmit, indent: usize, block: &Block<Type>) {
    f.push_scope();
    for stmt in &block.stmts {
        emit_stmt(f, indent, stmt);
    }
    f.pop_scope(indent);
}

fn emit_stmt(f: &mut FnEmit, indent: usize, stmt: &Stmt<Type>) {
    match &stmt.kind {
        StmtKind::Let { name, value, .. } | StmtKind::Const { name, value } => {
            let t = emit_expr(f, indent, value);
            let slot = mangle::mangle_local(name);
            f.cg.line(indent, &format!("ErgoVal {slot} = {t};"));
            f.named_locals.insert(name.clone());
            f.declare_local(&slot);
        }
        StmtKind::If { arms, else_block } => emit_if(f, indent, arms, else_block),
        StmtKind::ForC {
            init,
            cond,
            step,
            body,
        } => emit_for_c(f, indent, init, cond, step, body),
        StmtKind::ForEach { name, iter, body } => emit_for_each(f, indent, name, iter, body),
        StmtKind::Return(value) => emit_return(f, indent, value.as_ref()),
        StmtKind::Expr(e) => {
            let t = emit_expr(f, indent, e);
            f.cg.line(indent, &format!("ergo_release({t});"));
        }
        StmtKind::Block(b) => emit_block(f, indent, b),
    }
}

fn emit_if(
    f: &mut FnEmit,
    indent: usize,
    arms: &[(crate::ast::Expr<Type>, Block<Type>)],
    else_block: &Option<Block<Type>>,
) {
    for (i, (cond, block)) in arms.iter().enumerate() {
        let cond_t = emit_expr(f, indent, cond);
        let keyword = if i == 0 { "if" } else { "else if" };
        f.cg.line(indent, &format!("{keyword} ({cond_t}.as.b) {{"));
        f.cg.line(indent + 1, &format!("ergo_release({cond_t});"));
        emit_block(f, indent + 1, block);
        f.cg.line(indent, "}");
    }
    if let Some(b) = else_block {
        f.cg.line(indent, "else {");
        emit_block(f, indent + 1, b);
        f.cg.line(indent, "}");
    }
}

fn emit_for_c(
    f: &mut FnEmit,
    indent: usize,
    init: &Option<Box<Stmt<Type>>>,
    cond: &Option<crate::ast::Expr<Type>>,
    step: &Option<Box<Stmt<Type>>>,
    body: &Block<Type>,
) {
    f.push_scope();
    if let Some(i) = init {
        emit_stmt(f, indent, i);
    }
    f.cg.line(indent, "for (;;) {");
    if let Some(c) = cond {
        let cond_t = emit_expr(f, indent + 1, c);
        f.cg.line(indent + 1, &format!("if (!{cond_t}.as.b) {{"));
        f.cg.line(indent + 2, &format!("ergo_release({cond_t});"));
        f.cg.line(indent + 2, "break;");
        f.cg.line(indent + 1, "}");
        f.cg.line(indent + 1, &format!("ergo_release({cond_t});"));
    }
    emit_block(f, indent + 1, body);
    if let Some(s) = step {
        emit_stmt(f, indent + 1, s);
    }
    f.cg.line(indent, "}");
    f.pop_scope(indent);
}

fn emit_for_each(f: &mut FnEmit, indent: usize, name: &str, iter: &crate::ast::Expr<Type>, body: &Block<Type>) {
    let iter_t = emit_expr(f, indent, iter);
    let idx = f.cg.new_temp();
    let is_str = matches!(iter.info.strip_nullable(), Type::Str);
    f.cg.line(indent, &format!("for (size_t {idx} = 0; {idx} < ((ErgoArr*){iter_t}.as.p)->len; {idx}++) {{"));
    f.push_scope();
    let slot = mangle::mangle_local(name);
    if is_str {
        f.cg.line(indent + 1, &format!("ErgoVal {slot} = ergo_str_at({iter_t}, {idx});"));
    } else {
        f.cg.line(indent + 1, &format!("ErgoVal {slot} = ergo_arr_get({iter_t}, {idx});"));
    }
    f.named_locals.insert(name.to_string());
    f.declare_local(&slot);
    emit_block(f, indent + 1, body);
    f.pop_scope(indent + 1);
    f.cg.line(indent, "}");
    f.cg.line(indent, &format!("ergo_release({iter_t});"));
}

fn emit_return(f: &mut FnEmit, indent: usize, value: Option<&crate::ast::Expr<Type>>) {
    match value {
        Some(e) => {
            let t = emit_expr(f, indent, e);
            f.cg.line(indent, &format!("ergo_move_into(&__ret, {t});"));
        }
        None => {}
    }
    f.cg.line(indent, "goto __cleanup;");
}
