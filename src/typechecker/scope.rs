//! Scoped local symbol table (§4.5, §5): push/pop scopes, explicit cloning at `if`-arm
//! boundaries so that null-narrowing never leaks across arms.
use std::collections::HashMap;

use crate::ast::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: Type,
    pub mutable: bool,
    pub constant: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Locals {
    scopes: Vec<HashMap<String, Binding>>,
}

impl Locals {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    pub fn declare(&mut self, name: impl Into<String>, binding: Binding) {
        self.scopes
            .last_mut()
            .expect("at least one scope is always open")
            .insert(name.into(), binding);
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// Re-inserts a binding for `name` under a new type, instead of mutating the existing one in
    /// place (§9: `Locals::update` avoids the aliasing pitfalls of mutating `Binding.ty`
    /// directly when scopes get cloned for null-narrowing).
    pub fn update(&mut self, name: &str, ty: Type) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(binding) = scope.get_mut(name) {
                binding.ty = ty;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_does_not_leak_across_cloned_scopes() {
        let mut locals = Locals::new();
        locals.declare(
            "x",
            Binding {
                ty: Type::Nullable(Box::new(Type::Str)),
                mutable: false,
                constant: false,
            },
        );

        let mut arm_a = locals.clone();
        arm_a.update("x", Type::Null);
        let mut arm_b = locals.clone();
        arm_b.update("x", Type::Str);

        assert_eq!(arm_a.get("x").unwrap().ty, Type::Null);
        assert_eq!(arm_b.get("x").unwrap().ty, Type::Str);
        assert_eq!(
            locals.get("x").unwrap().ty,
            Type::Nullable(Box::new(Type::Str))
        );
    }
}
