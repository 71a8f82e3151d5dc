//! Global environment builder (§4.4): walks every module once, before any function body is
//! checked, to collect class shells, signatures, and module constants.
use std::collections::{HashMap, HashSet};

use crate::ast::{Block, ClassDecl, Decl, ExprKind, FunctionDecl, Module, ReturnSpec, Stmt, StmtKind, Type, Visibility};

use super::{
    constfold::{eval_const, ConstValue},
    error::{TResult, TypeError},
};

#[derive(Debug, Clone)]
pub struct Sig {
    pub params: Vec<Type>,
    pub ret: Type,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub sig: Sig,
    pub receiver_mutable: bool,
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub qname: String,
    pub declaring_module: String,
    pub sealed: bool,
    pub visibility: Visibility,
    pub fields: Vec<(String, Type)>,
    pub methods: HashMap<String, MethodInfo>,
}

impl ClassInfo {
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
    pub imports: Vec<String>,
    pub functions: HashMap<String, Sig>,
    pub consts: HashMap<String, (Type, ConstValue)>,
}

#[derive(Debug, Clone, Default)]
pub struct Env {
    pub modules: HashMap<String, ModuleInfo>,
    pub classes: HashMap<String, ClassInfo>,
    pub entry_module: String,
}

pub fn build_env(program: &[Module<()>]) -> TResult<Env> {
    let mut env = Env {
        entry_module: program
            .first()
            .map(|m| m.name.clone())
            .unwrap_or_default(),
        ..Default::default()
    };

    for module in program {
        if env
            .modules
            .insert(
                module.name.clone(),
                ModuleInfo {
                    imports: module.imports.iter().map(|i| i.name.clone()).collect(),
                    ..Default::default()
                },
            )
            .is_some()
        {
            return Err(TypeError::global(format!(
                "duplicate module '{}'",
                module.name
            )));
        }
    }

    for module in program {
        build_module_consts(&mut env, module)?;
        build_module_classes(&mut env, module)?;
        build_module_functions(&mut env, module)?;
    }

    qualify_env(&mut env)?;

    let entry_count: usize = program.iter().filter(|m| m.entry().is_some()).count();
    if entry_count != 1 {
        return Err(TypeError::global(format!(
            "expected exactly one `entry()` in the whole program, found {entry_count}"
        )));
    }

    Ok(env)
}

/// Field types, parameter types and return types are parsed as bare `Type::Class(name)` (the
/// grammar has no module-qualified type syntax); this pass resolves every such bare name to its
/// `"<module>.<class>"` qname the same way `new C(...)` and method dispatch already do, now that
/// every module's classes are registered.
fn qualify_env(env: &mut Env) -> TResult<()> {
    let class_names: Vec<String> = env.classes.keys().cloned().collect();
    for qname in class_names {
        let home = env.classes[&qname].declaring_module.clone();

        let fields = env.classes[&qname].fields.clone();
        let mut new_fields = Vec::with_capacity(fields.len());
        for (name, ty) in fields {
            new_fields.push((name, qualify_type(&ty, &home, env, &qname)?));
        }

        let method_names: Vec<String> = env.classes[&qname].methods.keys().cloned().collect();
        let mut new_methods = HashMap::new();
        for mname in method_names {
            let m = env.classes[&qname].methods[&mname].clone();
            let params = m
                .sig
                .params
                .iter()
                .map(|t| qualify_type(t, &home, env, &qname))
                .collect::<TResult<Vec<_>>>()?;
            let ret = qualify_type(&m.sig.ret, &home, env, &qname)?;
            new_methods.insert(
                mname,
                MethodInfo {
                    sig: Sig { params, ret },
                    receiver_mutable: m.receiver_mutable,
                },
            );
        }

        let entry = env.classes.get_mut(&qname).unwrap();
        entry.fields = new_fields;
        entry.methods = new_methods;
    }

    let module_names: Vec<String> = env.modules.keys().cloned().collect();
    for module in module_names {
        let fn_names: Vec<String> = env.modules[&module].functions.keys().cloned().collect();
        let mut updated = HashMap::new();
        for fname in fn_names {
            let sig = env.modules[&module].functions[&fname].clone();
            let params = sig
                .params
                .iter()
                .map(|t| qualify_type(t, &module, env, &fname))
                .collect::<TResult<Vec<_>>>()?;
            let ret = qualify_type(&sig.ret, &module, env, &fname)?;
            updated.insert(fname, Sig { params, ret });
        }
        env.modules.get_mut(&module).unwrap().functions = updated;
    }

    Ok(())
}

fn qualify_type(ty: &Type, home_module: &str, env: &Env, ctx: &str) -> TResult<Type> {
    Ok(match ty {
        Type::Class(bare) => Type::Class(resolve_class_name(bare, home_module, env).ok_or_else(
            || TypeError::global(format!("unknown class '{bare}' referenced in '{ctx}'")),
        )?),
        Type::Array(elem) => Type::Array(Box::new(qualify_type(elem, home_module, env, ctx)?)),
        Type::Tuple(items) => Type::Tuple(
            items
                .iter()
                .map(|t| qualify_type(t, home_module, env, ctx))
                .collect::<TResult<Vec<_>>>()?,
        ),
        Type::Fn(params, ret) => Type::Fn(
            params
                .iter()
                .map(|t| qualify_type(t, home_module, env, ctx))
                .collect::<TResult<Vec<_>>>()?,
            Box::new(qualify_type(ret, home_module, env, ctx)?),
        ),
        Type::Nullable(inner) => Type::Nullable(Box::new(qualify_type(inner, home_module, env, ctx)?)),
        other => other.clone(),
    })
}

fn resolve_class_name(bare: &str, home_module: &str, env: &Env) -> Option<String> {
    let own = format!("{home_module}.{bare}");
    if env.classes.contains_key(&own) {
        return Some(own);
    }
    for import in &env.modules[home_module].imports {
        let candidate = format!("{import}.{bare}");
        if env.classes.contains_key(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn build_module_consts(env: &mut Env, module: &Module<()>) -> TResult<()> {
    let is_stdlib = module.name == "stdr" || module.name == "math";
    for c in module.consts() {
        if !is_stdlib {
            return Err(TypeError::new(
                format!(
                    "module-level constants are only permitted in 'stdr'/'math', found in '{}'",
                    module.name
                ),
                c.pos.clone(),
            ));
        }
        let value = eval_const(&c.value).map_err(|msg| TypeError::new(msg, c.pos.clone()))?;
        let ty = value.ty();
        let info = env.modules.get_mut(&module.name).unwrap();
        if info.consts.insert(c.name.clone(), (ty, value)).is_some() {
            return Err(TypeError::new(
                format!("duplicate constant '{}'", c.name),
                c.pos.clone(),
            ));
        }
    }
    Ok(())
}

fn build_module_classes(env: &mut Env, module: &Module<()>) -> TResult<()> {
    for class in module.classes() {
        let qname = format!("{}.{}", module.name, class.name);
        if env.classes.contains_key(&qname) {
            return Err(TypeError::new(
                format!("duplicate class '{qname}'"),
                class.pos.clone(),
            ));
        }

        let fields = build_class_fields(&qname, class)?;
        let methods = build_class_methods(&qname, class)?;

        if let Some(init) = methods.get("init") {
            if init.sig.ret != Type::Void {
                return Err(TypeError::new(
                    format!("'{qname}.init' must return void"),
                    class.pos.clone(),
                ));
            }
        }

        env.classes.insert(
            qname.clone(),
            ClassInfo {
                qname,
                declaring_module: module.name.clone(),
                sealed: class.sealed,
                visibility: class.visibility,
                fields,
                methods,
            },
        );
    }
    Ok(())
}

fn build_class_fields(qname: &str, class: &ClassDecl<()>) -> TResult<Vec<(String, Type)>> {
    let mut fields = vec![];
    let mut seen = HashSet::new();
    for field in &class.fields {
        if !seen.insert(field.name.clone()) {
            return Err(TypeError::new(
                format!("duplicate field '{}' in class '{qname}'", field.name),
                field.pos.clone(),
            ));
        }
        fields.push((field.name.clone(), field.ty.clone()));
    }
    Ok(fields)
}

fn build_class_methods(
    qname: &str,
    class: &ClassDecl<()>,
) -> TResult<HashMap<String, MethodInfo>> {
    let mut methods = HashMap::new();
    for m in &class.methods {
        let Some(receiver_mutable) = m.receiver else {
            return Err(TypeError::new(
                format!(
                    "method '{}' in class '{qname}' must take `this`/`?this` as its first parameter",
                    m.name
                ),
                m.pos.clone(),
            ));
        };
        if methods.contains_key(&m.name) {
            return Err(TypeError::new(
                format!("duplicate method '{}' in class '{qname}'", m.name),
                m.pos.clone(),
            ));
        }
        methods.insert(
            m.name.clone(),
            MethodInfo {
                sig: function_sig(m)?,
                receiver_mutable,
            },
        );
    }
    Ok(methods)
}

fn build_module_functions(env: &mut Env, module: &Module<()>) -> TResult<()> {
    for f in module.functions() {
        if f.receiver.is_some() {
            return Err(TypeError::new(
                format!("free function '{}' may not take a `this` receiver", f.name),
                f.pos.clone(),
            ));
        }
        let info = env.modules.get_mut(&module.name).unwrap();
        if info.functions.contains_key(&f.name) {
            return Err(TypeError::new(
                format!(
                    "duplicate function '{}' in module '{}'",
                    f.name, module.name
                ),
                f.pos.clone(),
            ));
        }
        let sig = function_sig(f)?;
        env.modules
            .get_mut(&module.name)
            .unwrap()
            .functions
            .insert(f.name.clone(), sig);
    }
    Ok(())
}

fn function_sig<T>(f: &FunctionDecl<T>) -> TResult<Sig> {
    let mut params = vec![];
    for p in &f.params {
        let Some(ty) = &p.ty else {
            return Err(TypeError::new(
                format!(
                    "parameter '{}' of '{}' must have an explicit type",
                    p.name, f.name
                ),
                p.pos.clone(),
            ));
        };
        params.push(ty.clone());
    }
    let mut ret = match &f.ret {
        ReturnSpec::Void => Type::Void,
        ReturnSpec::Single(t) => t.clone(),
        ReturnSpec::Multi(ts) => Type::Tuple(ts.clone()),
    };
    if body_returns_null_literal(&f.body) {
        ret = ret.nullable();
    }
    Ok(Sig { params, ret })
}

/// A declared return type is promoted to nullable when the body can return the literal `null`
/// (§4.5: "unification of `null` with any non-null type produces `nullable(T)`"), since the
/// surface grammar has no explicit nullable-type annotation.
pub fn body_returns_null_literal<T>(body: &Block<T>) -> bool {
    body.stmts.iter().any(stmt_returns_null_literal)
}

fn stmt_returns_null_literal<T>(stmt: &Stmt<T>) -> bool {
    match &stmt.kind {
        StmtKind::Return(Some(e)) => matches!(e.kind, ExprKind::Null),
        StmtKind::If { arms, else_block } => {
            arms.iter().any(|(_, b)| body_returns_null_literal(b))
                || else_block
                    .as_ref()
                    .map(body_returns_null_literal)
                    .unwrap_or(false)
        }
        StmtKind::ForC { body, .. } | StmtKind::ForEach { body, .. } => {
            body_returns_null_literal(body)
        }
        StmtKind::Block(b) => body_returns_null_literal(b),
        _ => false,
    }
}
