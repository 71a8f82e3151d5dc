//! Top-level C11 code generator orchestration (§4.6): assembles the embedded runtime, every
//! class's struct/destructor/constructor, forward declarations, lambda definitions, function and
//! method bodies, and the `main` wrapper into one in-memory `String` — nothing is written to disk
//! until the whole file exists in memory, matching the determinism requirement on this stage.
pub mod class;
pub mod context;
pub mod expr;
pub mod mangle;
pub mod runtime;
pub mod stmt;

use crate::ast::{Decl, FunctionDecl, Module, ReturnSpec, Type};

use context::{Codegen, FnEmit, LambdaDef};

pub fn generate(program: &[Module<Type>]) -> String {
    let mut structs = String::new();
    let mut const_globals = String::new();
    let mut forward_decls = String::new();
    let mut bodies = String::new();
    let mut lambdas: Vec<LambdaDef> = vec![];

    for module in program {
        for class in module.classes() {
            let mut cg = Codegen::new();
            class::emit_struct(&mut cg, &module.name, class);
            structs.push_str(&cg.out);
        }
    }

    for module in program {
        for class in module.classes() {
            let mut cg = Codegen::new();
            class::emit_destructor(&mut cg, &module.name, class);
            structs.push_str(&cg.out);
        }
    }

    for module in module_consts_with_name(program) {
        let (module_name, name) = module;
        const_globals.push_str(&format!(
            "static ErgoVal {} = {{ .tag = ERGO_NULL }};\n",
            mangle::mangle_const(&module_name, &name)
        ));
    }

    for module in program {
        for f in module.functions() {
            forward_decls.push_str(&fn_prototype(&module.name, None, f));
            forward_decls.push(';');
            forward_decls.push('\n');
        }
        for class in module.classes() {
            for m in &class.methods {
                forward_decls.push_str(&fn_prototype(&module.name, Some(&class.name), m));
                forward_decls.push(';');
                forward_decls.push('\n');
            }
            let qname = format!("{}.{}", module.name, class.name);
            let (mod_part, class_part) = mangle::split_qname(&qname);
            let ctor = mangle::mangle_new(mod_part, class_part);
            let init = class.methods.iter().find(|m| m.name == "init");
            let arity = init.map(|m| m.params.len()).unwrap_or(class.fields.len());
            let params = if arity == 0 {
                "void".to_string()
            } else {
                (0..arity).map(|_| "ErgoVal".to_string()).collect::<Vec<_>>().join(", ")
            };
            forward_decls.push_str(&format!("static ErgoVal {ctor}({params});\n"));
        }
    }

    for module in program {
        for class in module.classes() {
            let mut cg = Codegen::new();
            class::emit_constructor(&mut cg, &module.name, class);
            bodies.push_str(&cg.out);
        }
    }

    forward_decls.push_str("static void ergo_init_consts(void);\n");
    let mut const_init = String::from("static void ergo_init_consts(void) {\n");
    for module in program {
        for c in module.consts() {
            let mut cg = Codegen::new();
            {
                let mut fe = FnEmit::new(&mut cg, module.name.clone(), None);
                let t = expr::emit_expr(&mut fe, 1, &c.value);
                let slot = mangle::mangle_const(&module.name, &c.name);
                fe.cg.line(1, &format!("ergo_move_into(&{slot}, {t});"));
            }
            lambdas.extend(cg.lambdas);
            const_init.push_str(&cg.out);
        }
    }
    const_init.push_str("}\n\n");

    let mut entry_ref = None;
    for module in program {
        for f in module.functions() {
            let (body, fn_lambdas) = emit_function_body(&module.name, None, f);
            bodies.push_str(&body);
            lambdas.extend(fn_lambdas);
        }
        for class in module.classes() {
            for m in &class.methods {
                let (body, fn_lambdas) = emit_function_body(&module.name, Some(&class.name), m);
                bodies.push_str(&body);
                lambdas.extend(fn_lambdas);
            }
        }
        for decl in &module.decls {
            if let Decl::Entry(f) = decl {
                let (body, fn_lambdas) = emit_function_body(&module.name, None, f);
                bodies.push_str(&body);
                lambdas.extend(fn_lambdas);
                entry_ref = Some(mangle::mangle_fn(&module.name, &f.name));
            }
        }
    }
    let entry_fn = entry_ref.expect("exactly one entry() is guaranteed by the environment builder");

    let mut lambda_forward = String::new();
    let mut lambda_defs = String::new();
    for l in &lambdas {
        lambda_forward.push_str(&format!(
            "static ErgoVal {}(void* env, int argc, ErgoVal* argv);\n",
            l.name
        ));
        lambda_defs.push_str(&l.source);
        lambda_defs.push('\n');
    }

    let mut out = String::new();
    out.push_str(runtime::PRELUDE);
    out.push('\n');
    out.push_str(&structs);
    out.push_str(&const_globals);
    out.push('\n');
    out.push_str(&lambda_forward);
    out.push('\n');
    out.push_str(&forward_decls);
    out.push('\n');
    out.push_str(&lambda_defs);
    out.push('\n');
    out.push_str(&const_init);
    out.push_str(&bodies);
    out.push_str(&format!(
        "int main(void) {{\n    ergo_init_consts();\n    {entry_fn}();\n    return 0;\n}}\n"
    ));
    out
}

fn module_consts_with_name(program: &[Module<Type>]) -> Vec<(String, String)> {
    let mut out = vec![];
    for module in program {
        for c in module.consts() {
            out.push((module.name.clone(), c.name.clone()));
        }
    }
    out
}

fn fn_prototype(module: &str, class: Option<&str>, f: &FunctionDecl<Type>) -> String {
    let name = match class {
        Some(c) => mangle::mangle_method(module, c, &f.name),
        None => mangle::mangle_fn(module, &f.name),
    };
    let is_void = matches!(f.ret, ReturnSpec::Void);
    let ret_ty = if is_void { "void" } else { "ErgoVal" };

    let mut params = vec![];
    if f.receiver.is_some() {
        params.push("ErgoVal v_this".to_string());
    }
    for p in &f.params {
        params.push(format!("ErgoVal {}", mangle::mangle_local(&p.name)));
    }
    let param_list = if params.is_empty() {
        "void".to_string()
    } else {
        params.join(", ")
    };
    format!("static {ret_ty} {name}({param_list})")
}

/// Renders one function/method/entry body in an isolated scratch buffer (so its discovered
/// lambdas don't interleave with a sibling function's) and returns the definition plus the
/// lambdas it discovered.
fn emit_function_body(module: &str, class: Option<&str>, f: &FunctionDecl<Type>) -> (String, Vec<LambdaDef>) {
    let is_void = matches!(f.ret, ReturnSpec::Void);
    let mut cg = Codegen::new();
    {
        let mut fe = FnEmit::new(&mut cg, module.to_string(), class.map(|c| format!("{module}.{c}")));
        if f.receiver.is_some() {
            fe.named_locals.insert("this".to_string());
            fe.declare_local(&mangle::mangle_local("this"));
        }
        for p in &f.params {
            fe.named_locals.insert(p.name.clone());
            fe.declare_local(&mangle::mangle_local(&p.name));
        }
        if !is_void {
            fe.cg.line(1, "ErgoVal __ret = ergo_null();");
        }
        stmt::emit_block(&mut fe, 1, &f.body);
        fe.pop_scope(1);
        fe.cg.line(0, "__cleanup:;");
        if !is_void {
            fe.cg.line(1, "return __ret;");
        }
    }
    let proto = fn_prototype(module, class, f);
    let def = format!("{proto} {{\n{}}}\n\n", cg.out);
    (def, cg.lambdas)
}
