//! Expression emission (§4.6): every `ExprKind<Type>` lowers to a sequence of C statements that
//! leave a freshly owned `ErgoVal` in a temp variable, which is what every caller gets back.
//! Builtins and the ownership primitives (`ergo_retain`/`ergo_release`/`ergo_move_into`) are the
//! ones defined in `runtime::PRELUDE`; name mangling comes from `mangle.rs`.
use crate::ast::{BinaryOp, Expr, ExprKind, StrPart, Type, UnaryOp};

use super::class;
use super::context::FnEmit;
use super::mangle;

const BUILTIN_NAMES: &[&str] = &["len", "str", "write", "writef", "readf", "is_null"];

pub fn emit_expr(f: &mut FnEmit, indent: usize, expr: &Expr<Type>) -> String {
    match &expr.kind {
        ExprKind::Int(v) => {
            let t = f.cg.new_temp();
            f.cg.line(indent, &format!("ErgoVal {t} = ergo_int({v}LL);"));
            t
        }
        ExprKind::Float(v) => {
            let t = f.cg.new_temp();
            f.cg.line(indent, &format!("ErgoVal {t} = ergo_float({v});"));
            t
        }
        ExprKind::Bool(v) => {
            let t = f.cg.new_temp();
            f.cg.line(indent, &format!("ErgoVal {t} = ergo_bool({v});"));
            t
        }
        ExprKind::Null => {
            let t = f.cg.new_temp();
            f.cg.line(indent, &format!("ErgoVal {t} = ergo_null();"));
            t
        }
        ExprKind::Str(parts) => emit_str(f, indent, parts),
        ExprKind::Array(items) => emit_seq(f, indent, items, "ergo_arr_add"),
        ExprKind::Tuple(items) => emit_seq(f, indent, items, "ergo_arr_add"),
        ExprKind::Ident(name) => {
            let t = f.cg.new_temp();
            let slot = mangle::mangle_local(name);
            f.cg.line(indent, &format!("ErgoVal {t} = {slot};"));
            f.cg.line(indent, &format!("ergo_retain({t});"));
            t
        }
        ExprKind::Paren(inner) => emit_expr(f, indent, inner),
        ExprKind::Unary(op, inner) => emit_unary(f, indent, *op, inner),
        ExprKind::Binary(op, l, r) => emit_binary(f, indent, *op, l, r),
        ExprKind::Assign(lhs, rhs) => emit_assign(f, indent, lhs, rhs),
        ExprKind::Index(arr, idx) => {
            let arr_t = emit_expr(f, indent, arr);
            let idx_t = emit_expr(f, indent, idx);
            let t = f.cg.new_temp();
            f.cg.line(
                indent,
                &format!("ErgoVal {t} = ergo_arr_get({arr_t}, (int64_t)({idx_t}.as.i));"),
            );
            f.cg.line(indent, &format!("ergo_release({arr_t});"));
            f.cg.line(indent, &format!("ergo_release({idx_t});"));
            t
        }
        ExprKind::Member(obj, name) => emit_member(f, indent, obj, name),
        ExprKind::Conditional(cond, then_e, else_e) => emit_conditional(f, indent, cond, then_e, else_e),
        ExprKind::New(name, args) => emit_new(f, indent, name, args, &expr.info),
        ExprKind::Lambda(params, body) => emit_lambda(f, indent, params, body),
        ExprKind::Move(inner) => emit_move(f, indent, inner),
        ExprKind::Match(scrutinee, arms) => emit_match(f, indent, scrutinee, arms),
        ExprKind::Call(callee, args) => emit_call(f, indent, callee, args),
    }
}

fn emit_str(f: &mut FnEmit, indent: usize, parts: &[StrPart<Type>]) -> String {
    let mut acc = f.cg.new_temp();
    f.cg
        .line(indent, &format!("ErgoVal {acc} = ergo_str_from_cstr(\"\");"));
    for part in parts {
        let piece = match part {
            StrPart::Text(text) => {
                let lit = c_string_literal(text);
                let piece = f.cg.new_temp();
                f.cg
                    .line(indent, &format!("ErgoVal {piece} = ergo_str_from_cstr({lit});"));
                piece
            }
            StrPart::Var(name, _) => {
                let slot = mangle::mangle_local(name);
                let piece = f.cg.new_temp();
                f.cg
                    .line(indent, &format!("ErgoVal {piece} = ergo_str({slot});"));
                piece
            }
        };
        let next = f.cg.new_temp();
        f.cg
            .line(indent, &format!("ErgoVal {next} = ergo_str_concat({acc}, {piece});"));
        f.cg.line(indent, &format!("ergo_release({acc});"));
        f.cg.line(indent, &format!("ergo_release({piece});"));
        acc = next;
    }
    acc
}

fn emit_seq(f: &mut FnEmit, indent: usize, items: &[Expr<Type>], add_fn: &str) -> String {
    let arr = f.cg.new_temp();
    f.cg.line(indent, &format!("ErgoVal {arr} = ergo_arr_new();"));
    for item in items {
        let item_t = emit_expr(f, indent, item);
        f.cg.line(indent, &format!("{add_fn}({arr}, {item_t});"));
    }
    arr
}

fn emit_unary(f: &mut FnEmit, indent: usize, op: UnaryOp, inner: &Expr<Type>) -> String {
    let inner_t = emit_expr(f, indent, inner);
    let t = f.cg.new_temp();
    match op {
        UnaryOp::Not => f
            .cg
            .line(indent, &format!("ErgoVal {t} = ergo_bool(!{inner_t}.as.b);")),
        UnaryOp::Neg => f.cg.line(indent, &format!("ErgoVal {t} = ergo_neg({inner_t});")),
        UnaryOp::Len => f.cg.line(indent, &format!("ErgoVal {t} = ergo_int(ergo_len({inner_t}));")),
    }
    f.cg.line(indent, &format!("ergo_release({inner_t});"));
    t
}

fn emit_binary(f: &mut FnEmit, indent: usize, op: BinaryOp, l: &Expr<Type>, r: &Expr<Type>) -> String {
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        return emit_short_circuit(f, indent, op, l, r);
    }
    let l_t = emit_expr(f, indent, l);
    let r_t = emit_expr(f, indent, r);
    let t = f.cg.new_temp();
    let call = match op {
        BinaryOp::Add => format!("ergo_add({l_t}, {r_t})"),
        BinaryOp::Sub => format!("ergo_sub({l_t}, {r_t})"),
        BinaryOp::Mul => format!("ergo_mul({l_t}, {r_t})"),
        BinaryOp::Div => format!("ergo_div({l_t}, {r_t})"),
        BinaryOp::Mod => format!("ergo_mod({l_t}, {r_t})"),
        BinaryOp::Eq => format!("ergo_bool(ergo_eq({l_t}, {r_t}))"),
        BinaryOp::Ne => format!("ergo_bool(!ergo_eq({l_t}, {r_t}))"),
        BinaryOp::Lt => format!("ergo_bool(ergo_as_num({l_t}) < ergo_as_num({r_t}))"),
        BinaryOp::Le => format!("ergo_bool(ergo_as_num({l_t}) <= ergo_as_num({r_t}))"),
        BinaryOp::Gt => format!("ergo_bool(ergo_as_num({l_t}) > ergo_as_num({r_t}))"),
        BinaryOp::Ge => format!("ergo_bool(ergo_as_num({l_t}) >= ergo_as_num({r_t}))"),
        BinaryOp::And | BinaryOp::Or => unreachable!(),
    };
    f.cg.line(indent, &format!("ErgoVal {t} = {call};"));
    f.cg.line(indent, &format!("ergo_release({l_t});"));
    f.cg.line(indent, &format!("ergo_release({r_t});"));
    t
}

fn emit_short_circuit(f: &mut FnEmit, indent: usize, op: BinaryOp, l: &Expr<Type>, r: &Expr<Type>) -> String {
    let l_t = emit_expr(f, indent, l);
    let t = f.cg.new_temp();
    f.cg.line(indent, &format!("ErgoVal {t};"));
    let short_is_true = matches!(op, BinaryOp::Or);
    f.cg.line(
        indent,
        &format!("if ({l_t}.as.b == {}) {{", if short_is_true { "true" } else { "false" }),
    );
    f.cg.line(indent + 1, &format!("{t} = ergo_bool({short_is_true});"));
    f.cg.line(indent, "} else {");
    let r_t = emit_expr(f, indent + 1, r);
    f.cg.line(indent + 1, &format!("{t} = {r_t};"));
    f.cg.line(indent, "}");
    t
}

fn emit_assign(f: &mut FnEmit, indent: usize, lhs: &Expr<Type>, rhs: &Expr<Type>) -> String {
    let rhs_t = emit_expr(f, indent, rhs);
    match &lhs.kind {
        ExprKind::Ident(name) => {
            let slot = mangle::mangle_local(name);
            f.cg.line(indent, &format!("ergo_move_into(&{slot}, {rhs_t});"));
            let t = f.cg.new_temp();
            f.cg.line(indent, &format!("ErgoVal {t} = {slot};"));
            f.cg.line(indent, &format!("ergo_retain({t});"));
            t
        }
        ExprKind::Index(arr, idx) => {
            let arr_t = emit_expr(f, indent, arr);
            let idx_t = emit_expr(f, indent, idx);
            f.cg.line(
                indent,
                &format!("ergo_arr_set({arr_t}, (int64_t)({idx_t}.as.i), {rhs_t});"),
            );
            f.cg.line(indent, &format!("ergo_release({arr_t});"));
            f.cg.line(indent, &format!("ergo_release({idx_t});"));
            rhs_t
        }
        ExprKind::Member(obj, name) => {
            let obj_t = emit_expr(f, indent, obj);
            let qname = class::qname_of_type(&obj.info).expect("assignment target field on a class value");
            let field_slot = format!("(({}*){obj_t}.as.p)->f_{name}", mangle::mangle_class_q(&qname));
            f.cg.line(indent, &format!("ergo_move_into(&{field_slot}, {rhs_t});"));
            f.cg.line(indent, &format!("ergo_release({obj_t});"));
            rhs_t
        }
        _ => unreachable!("assignment target is always an lvalue shape after type checking"),
    }
}

fn emit_member(f: &mut FnEmit, indent: usize, obj: &Expr<Type>, name: &str) -> String {
    if let Type::Mod(m) = &obj.info {
        let t = f.cg.new_temp();
        let g = mangle::mangle_const(m, name);
        f.cg.line(indent, &format!("ErgoVal {t} = {g};"));
        f.cg.line(indent, &format!("ergo_retain({t});"));
        return t;
    }
    let obj_t = emit_expr(f, indent, obj);
    let qname = class::qname_of_type(&obj.info).expect("member access always targets a class value");
    let t = f.cg.new_temp();
    f.cg.line(
        indent,
        &format!(
            "ErgoVal {t} = (({}*){obj_t}.as.p)->f_{name};",
            mangle::mangle_class_q(&qname)
        ),
    );
    f.cg.line(indent, &format!("ergo_retain({t});"));
    f.cg.line(indent, &format!("ergo_release({obj_t});"));
    t
}

fn emit_conditional(f: &mut FnEmit, indent: usize, cond: &Expr<Type>, then_e: &Expr<Type>, else_e: &Expr<Type>) -> String {
    let cond_t = emit_expr(f, indent, cond);
    let t = f.cg.new_temp();
    f.cg.line(indent, &format!("ErgoVal {t};"));
    f.cg.line(indent, &format!("if ({cond_t}.as.b) {{"));
    f.cg.line(indent, &format!("ergo_release({cond_t});"));
    let then_t = emit_expr(f, indent + 1, then_e);
    f.cg.line(indent + 1, &format!("{t} = {then_t};"));
    f.cg.line(indent, "} else {");
    let else_t = emit_expr(f, indent + 1, else_e);
    f.cg.line(indent + 1, &format!("{t} = {else_t};"));
    f.cg.line(indent, "}");
    t
}

/// `move(x)`: the checker only ever accepts a bare mutable-local identifier as `x`, so this
/// extracts the local's current value and leaves the slot null, transferring ownership to the
/// caller's argument temp without a retain (the sealed-move protocol of §4.5).
fn emit_move(f: &mut FnEmit, indent: usize, inner: &Expr<Type>) -> String {
    let ExprKind::Ident(name) = &inner.kind else {
        return emit_expr(f, indent, inner);
    };
    let slot = mangle::mangle_local(name);
    let t = f.cg.new_temp();
    f.cg.line(indent, &format!("ErgoVal {t} = ergo_move(&{slot});"));
    t
}

fn emit_new(f: &mut FnEmit, indent: usize, name: &str, args: &[Expr<Type>], result_ty: &Type) -> String {
    let qname = class::qname_of_type(result_ty).unwrap_or_else(|| name.to_string());
    let (module, class_name) = mangle::split_qname(&qname);
    let ctor = mangle::mangle_new(module, class_name);
    let arg_temps: Vec<String> = args.iter().map(|a| emit_expr(f, indent, a)).collect();
    let t = f.cg.new_temp();
    f.cg.line(
        indent,
        &format!("ErgoVal {t} = {ctor}({});", arg_temps.join(", ")),
    );
    t
}

fn emit_lambda(f: &mut FnEmit, indent: usize, params: &[crate::ast::LambdaParam], body: &Expr<Type>) -> String {
    let name = f.cg.reserve_lambda_name();
    let source = render_lambda(&name, params, body, f);
    f.cg.lambdas.push(super::context::LambdaDef { name: name.clone(), source });

    let wrapper = f.cg.new_temp();
    f.cg.line(
        indent,
        &format!("ErgoVal {wrapper} = ergo_fn_new({name}, {});", params.len()),
    );
    wrapper
}

fn render_lambda(name: &str, params: &[crate::ast::LambdaParam], body: &Expr<Type>, f: &mut FnEmit) -> String {
    let mut sub = super::context::Codegen::new();
    let module = f.module.clone();
    {
        let mut inner = super::context::FnEmit::new(&mut sub, module, None);
        for p in params {
            inner.named_locals.insert(p.name.clone());
        }
        let body_t = emit_expr(&mut inner, 1, body);
        inner.cg.line(1, &format!("return {body_t};"));
    }
    f.cg.lambdas.extend(sub.lambdas);
    let mut out = format!("static ErgoVal {name}(void* env, int argc, ErgoVal* argv) {{\n    (void)env;\n    (void)argc;\n");
    for (i, p) in params.iter().enumerate() {
        out.push_str(&format!("    ErgoVal {} = argv[{i}];\n", mangle::mangle_local(&p.name)));
    }
    out.push_str(&sub.out);
    out.push_str("}\n");
    out
}

fn emit_match(f: &mut FnEmit, indent: usize, scrutinee: &Expr<Type>, arms: &[crate::ast::MatchArm<Type>]) -> String {
    let s_t = emit_expr(f, indent, scrutinee);
    let t = f.cg.new_temp();
    f.cg.line(indent, &format!("ErgoVal {t} = ergo_null();"));
    for (i, arm) in arms.iter().enumerate() {
        let cond = match &arm.pattern {
            crate::ast::Pattern::Wildcard => "true".to_string(),
            crate::ast::Pattern::Ident(_) => "true".to_string(),
            crate::ast::Pattern::Int(v) => format!("ergo_eq({s_t}, ergo_int({v}LL))"),
            crate::ast::Pattern::Str(v) => format!("ergo_eq({s_t}, ergo_str_from_cstr({}))", c_string_literal(v)),
            crate::ast::Pattern::Bool(v) => format!("ergo_eq({s_t}, ergo_bool({v}))"),
            crate::ast::Pattern::Null => format!("ergo_eq({s_t}, ergo_null())"),
        };
        let keyword = if i == 0 { "if" } else { "else if" };
        f.cg.line(indent, &format!("{keyword} ({cond}) {{"));
        f.push_scope();
        if let crate::ast::Pattern::Ident(name) = &arm.pattern {
            let slot = mangle::mangle_local(name);
            f.cg.line(indent + 1, &format!("ErgoVal {slot} = {s_t};"));
            f.cg.line(indent + 1, &format!("ergo_retain({slot});"));
            f.named_locals.insert(name.clone());
            f.declare_local(&slot);
        }
        let arm_t = emit_expr(f, indent + 1, &arm.body);
        f.cg.line(indent + 1, &format!("{t} = {arm_t};"));
        f.pop_scope(indent + 1);
        f.cg.line(indent, "}");
    }
    f.cg.line(indent, &format!("ergo_release({s_t});"));
    t
}

fn emit_call(f: &mut FnEmit, indent: usize, callee: &Expr<Type>, args: &[Expr<Type>]) -> String {
    match &callee.kind {
        ExprKind::Member(obj, method) if matches!(&obj.info, Type::Mod(_)) => {
            let Type::Mod(module) = &obj.info else { unreachable!() };
            let arg_ts = emit_args(f, indent, args);
            call_into_temp(f, indent, &mangle::mangle_fn(module, method), &arg_ts)
        }
        ExprKind::Member(obj, method) => emit_method_call(f, indent, obj, method, args),
        ExprKind::Ident(name) if f.named_locals.contains(name) => {
            let callee_t = emit_expr(f, indent, callee);
            let arg_ts = emit_args(f, indent, args);
            emit_dynamic_call(f, indent, &callee_t, &arg_ts)
        }
        ExprKind::Ident(name) if BUILTIN_NAMES.contains(&name.as_str()) => emit_builtin(f, indent, name, args),
        ExprKind::Ident(name) => {
            let arg_ts = emit_args(f, indent, args);
            call_into_temp(f, indent, &mangle::mangle_fn(&f.module.clone(), name), &arg_ts)
        }
        _ => {
            let callee_t = emit_expr(f, indent, callee);
            let arg_ts = emit_args(f, indent, args);
            emit_dynamic_call(f, indent, &callee_t, &arg_ts)
        }
    }
}

fn emit_dynamic_call(f: &mut FnEmit, indent: usize, callee_t: &str, arg_ts: &[String]) -> String {
    let argv = f.cg.new_temp();
    f.cg.line(
        indent,
        &format!("ErgoVal {argv}[] = {{ {} }};", array_init(arg_ts)),
    );
    let t = f.cg.new_temp();
    f.cg.line(
        indent,
        &format!("ErgoVal {t} = ergo_call_fn({callee_t}, {}, {argv});", arg_ts.len()),
    );
    f.cg.line(indent, &format!("ergo_release({callee_t});"));
    t
}

fn emit_args(f: &mut FnEmit, indent: usize, args: &[Expr<Type>]) -> Vec<String> {
    args.iter().map(|a| emit_expr(f, indent, a)).collect()
}

fn array_init(temps: &[String]) -> String {
    if temps.is_empty() {
        "ergo_null()".to_string()
    } else {
        temps.join(", ")
    }
}

fn call_into_temp(f: &mut FnEmit, indent: usize, fn_name: &str, args: &[String]) -> String {
    let t = f.cg.new_temp();
    f.cg.line(
        indent,
        &format!("ErgoVal {t} = {fn_name}({});", args.join(", ")),
    );
    t
}

fn emit_method_call(f: &mut FnEmit, indent: usize, obj: &Expr<Type>, method: &str, args: &[Expr<Type>]) -> String {
    let obj_ty = obj.info.strip_nullable();
    if let Type::Array(_) = &obj_ty {
        let obj_t = emit_expr(f, indent, obj);
        return match method {
            "add" => {
                let arg_t = emit_expr(f, indent, &args[0]);
                f.cg.line(indent, &format!("ergo_arr_add({obj_t}, {arg_t});"));
                obj_t
            }
            "remove" => {
                let idx_t = emit_expr(f, indent, &args[0]);
                let t = f.cg.new_temp();
                f.cg.line(
                    indent,
                    &format!("ErgoVal {t} = ergo_arr_remove({obj_t}, (int64_t)({idx_t}.as.i));"),
                );
                f.cg.line(indent, &format!("ergo_release({idx_t});"));
                f.cg.line(indent, &format!("ergo_release({obj_t});"));
                t
            }
            other => unreachable!("unknown array builtin method '{other}'"),
        };
    }
    if matches!(obj_ty, Type::Num | Type::Bool) && method == "to_string" {
        let obj_t = emit_expr(f, indent, obj);
        let t = f.cg.new_temp();
        f.cg.line(indent, &format!("ErgoVal {t} = ergo_str({obj_t});"));
        f.cg.line(indent, &format!("ergo_release({obj_t});"));
        return t;
    }
    let qname = class::qname_of_type(&obj.info).expect("method call target is always a class value");
    let obj_t = emit_expr(f, indent, obj);
    let arg_ts = emit_args(f, indent, args);
    let mut all = vec![obj_t.clone()];
    all.extend(arg_ts);
    call_into_temp(f, indent, &mangle::mangle_method_q(&qname, method), &all)
}

fn emit_builtin(f: &mut FnEmit, indent: usize, name: &str, args: &[Expr<Type>]) -> String {
    match name {
        "len" => {
            let a = emit_expr(f, indent, &args[0]);
            let t = f.cg.new_temp();
            f.cg.line(indent, &format!("ErgoVal {t} = ergo_int(ergo_len({a}));"));
            f.cg.line(indent, &format!("ergo_release({a});"));
            t
        }
        "str" => {
            let a = emit_expr(f, indent, &args[0]);
            let t = f.cg.new_temp();
            f.cg.line(indent, &format!("ErgoVal {t} = ergo_str({a});"));
            f.cg.line(indent, &format!("ergo_release({a});"));
            t
        }
        "is_null" => {
            let a = emit_expr(f, indent, &args[0]);
            let t = f.cg.new_temp();
            f.cg.line(indent, &format!("ErgoVal {t} = ergo_bool(ergo_is_null({a}));"));
            f.cg.line(indent, &format!("ergo_release({a});"));
            t
        }
        "write" => {
            let a = emit_expr(f, indent, &args[0]);
            f.cg.line(indent, &format!("ergo_write({a});"));
            let t = f.cg.new_temp();
            f.cg.line(indent, &format!("ErgoVal {t} = ergo_null();"));
            f.cg.line(indent, &format!("ergo_release({a});"));
            t
        }
        "writef" => {
            let fmt_t = emit_expr(f, indent, &args[0]);
            if args.len() == 2 {
                let tuple_t = emit_expr(f, indent, &args[1]);
                f.cg.line(
                    indent,
                    &format!(
                        "ergo_writef({fmt_t}, ((ErgoArr*){tuple_t}.as.p)->items, (int)((ErgoArr*){tuple_t}.as.p)->len);"
                    ),
                );
                f.cg.line(indent, &format!("ergo_release({tuple_t});"));
            } else {
                f.cg.line(indent, &format!("ergo_writef({fmt_t}, NULL, 0);"));
            }
            let t = f.cg.new_temp();
            f.cg.line(indent, &format!("ErgoVal {t} = ergo_null();"));
            f.cg.line(indent, &format!("ergo_release({fmt_t});"));
            t
        }
        "readf" => {
            let fmt_t = emit_expr(f, indent, &args[0]);
            let line_t = emit_expr(f, indent, &args[1]);
            let hints_t = emit_expr(f, indent, &args[2]);
            let t = f.cg.new_temp();
            f.cg.line(
                indent,
                &format!(
                    "ErgoVal {t} = ergo_readf({fmt_t}, {line_t}, ((ErgoArr*){hints_t}.as.p)->items, (int)((ErgoArr*){hints_t}.as.p)->len);"
                ),
            );
            f.cg.line(indent, &format!("ergo_release({fmt_t});"));
            f.cg.line(indent, &format!("ergo_release({line_t});"));
            f.cg.line(indent, &format!("ergo_release({hints_t});"));
            t
        }
        other => unreachable!("unknown builtin '{other}'"),
    }
}

fn c_string_literal(s: &str) -> String {
    let mut out = String::from("\"");
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
