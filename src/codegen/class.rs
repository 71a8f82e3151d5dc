//! Per-class C emission (§4.6): the object struct, its destructor, and its constructor. Every
//! instance begins with the shared `ErgoObj` header so `ergo_release` can walk any OBJ through
//! a single `drop` function pointer without knowing its concrete layout.
use crate::ast::{ClassDecl, FunctionDecl, Type};

use super::context::Codegen;
use super::mangle;

/// Recovers `"<module>.<class>"` from a checked expression's type, looking through `Nullable`.
pub fn qname_of_type(ty: &Type) -> Option<String> {
    match ty {
        Type::Class(q) => Some(q.clone()),
        Type::Nullable(inner) => qname_of_type(inner),
        _ => None,
    }
}

pub fn emit_struct(cg: &mut Codegen, module: &str, class: &ClassDecl<Type>) {
    let struct_name = mangle::mangle_class(module, &class.name);
    cg.raw(&format!("typedef struct {{\n    ErgoObj base;\n"));
    for field in &class.fields {
        cg.raw(&format!("    ErgoVal f_{};\n", field.name));
    }
    cg.raw(&format!("}} {struct_name};\n\n"));
}

pub fn emit_destructor(cg: &mut Codegen, module: &str, class: &ClassDecl<Type>) {
    let struct_name = mangle::mangle_class(module, &class.name);
    let drop_name = mangle::mangle_drop(module, &class.name);
    cg.raw(&format!("static void {drop_name}(ErgoObj* obj) {{\n"));
    cg.raw(&format!("    {struct_name}* self = ({struct_name}*)obj;\n"));
    for field in &class.fields {
        cg.raw(&format!("    ergo_release(self->f_{});\n", field.name));
    }
    cg.raw("    free(self);\n}\n\n");
}

pub fn emit_constructor(cg: &mut Codegen, module: &str, class: &ClassDecl<Type>) {
    let struct_name = mangle::mangle_class(module, &class.name);
    let drop_name = mangle::mangle_drop(module, &class.name);
    let ctor_name = mangle::mangle_new(module, &class.name);
    let qname = format!("{module}.{}", class.name);

    let init = class.methods.iter().find(|m: &&FunctionDecl<Type>| m.name == "init");
    let params: &[crate::ast::Param] = init.map(|m| m.params.as_slice()).unwrap_or(&[]);

    let param_list = if params.is_empty() {
        "void".to_string()
    } else {
        params
            .iter()
            .enumerate()
            .map(|(i, _)| format!("ErgoVal a{i}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    cg.raw(&format!("static ErgoVal {ctor_name}({param_list}) {{\n"));
    cg.raw(&format!(
        "    {struct_name}* obj = malloc(sizeof({struct_name}));\n"
    ));
    cg.raw("    obj->base.rc.refcount = 1;\n");
    cg.raw(&format!("    obj->base.class_name = \"{qname}\";\n"));
    cg.raw(&format!("    obj->base.drop = {drop_name};\n"));
    for field in &class.fields {
        cg.raw(&format!("    obj->f_{} = ergo_null();\n", field.name));
    }
    cg.raw("    ErgoVal self = { .tag = ERGO_OBJ, .as = { .p = obj } };\n");

    if let Some(init) = init {
        let call_args: Vec<String> = (0..params.len()).map(|i| format!("a{i}")).collect();
        let mut all = vec!["self".to_string()];
        all.extend(call_args);
        cg.raw(&format!(
            "    {}({});\n",
            mangle::mangle_method_q(&qname, "init"),
            all.join(", ")
        ));
    } else {
        for (i, field) in class.fields.iter().enumerate() {
            cg.raw(&format!("    obj->f_{} = a{i};\n", field.name));
        }
    }
    cg.raw("    return self;\n}\n\n");
}
