//! Stable, injective C identifier mangling (§4.6).
pub fn mangle_module(module: &str) -> String {
    module
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn mangle_fn(module: &str, name: &str) -> String {
    format!("ergo_{}_{name}", mangle_module(module))
}

pub fn mangle_method(module: &str, class: &str, name: &str) -> String {
    format!("ergo_m_{}_{class}_{name}", mangle_module(module))
}

pub fn mangle_class(module: &str, class: &str) -> String {
    format!("ErgoObj_{}_{class}", mangle_module(module))
}

pub fn mangle_drop(module: &str, class: &str) -> String {
    format!("ergo_drop_{}_{class}", mangle_module(module))
}

pub fn mangle_new(module: &str, class: &str) -> String {
    format!("ergo_new_{}_{class}", mangle_module(module))
}

pub fn mangle_const(module: &str, name: &str) -> String {
    format!("ergo_const_{}_{name}", mangle_module(module))
}

pub fn mangle_local(name: &str) -> String {
    format!("v_{name}")
}

/// Splits a `"<module>.<class>"` qualified name back into its two parts.
pub fn split_qname(qname: &str) -> (&str, &str) {
    qname.split_once('.').expect("qualified class names always contain a '.'")
}

pub fn mangle_class_q(qname: &str) -> String {
    let (module, class) = split_qname(qname);
    mangle_class(module, class)
}

pub fn mangle_drop_q(qname: &str) -> String {
    let (module, class) = split_qname(qname);
    mangle_drop(module, class)
}

pub fn mangle_method_q(qname: &str, name: &str) -> String {
    let (module, class) = split_qname(qname);
    mangle_method(module, class, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_non_alphanumeric_module_names() {
        assert_eq!(mangle_module("my-mod.e"), "my_mod_e");
    }

    #[test]
    fn mangles_function_and_method_names() {
        assert_eq!(mangle_fn("main", "greet"), "ergo_main_greet");
        assert_eq!(mangle_method("shapes", "Box", "area"), "ergo_m_shapes_Box_area");
    }
}
