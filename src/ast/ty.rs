//! The type language (§3, §4.5): a small tagged union shared by the environment builder, the
//! checker, and the code generator.
use std::fmt::Display;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    Bool,
    Str,
    Num,
    Void,
    /// `"<module>.<class>"`.
    Class(String),
    Array(Box<Type>),
    Tuple(Vec<Type>),
    Fn(Vec<Type>, Box<Type>),
    Null,
    Nullable(Box<Type>),
    /// A reference to a module used only at expression level (`stdr.write(...)`).
    Mod(String),
    /// Unification variable introduced by an unannotated lambda parameter.
    Gen(u32),
}

impl Type {
    pub fn nullable(self) -> Type {
        match self {
            Type::Null | Type::Nullable(_) => self,
            other => Type::Nullable(Box::new(other)),
        }
    }

    /// `strip_nullable` from §4.5's null-narrowing rule.
    pub fn strip_nullable(&self) -> Type {
        match self {
            Type::Nullable(inner) => (**inner).clone(),
            other => other.clone(),
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_) | Type::Null)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "string"),
            Type::Num => write!(f, "num"),
            Type::Void => write!(f, "void"),
            Type::Class(name) => write!(f, "{name}"),
            Type::Array(elem) => write!(f, "[{elem}]"),
            Type::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Type::Fn(params, ret) => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Null => write!(f, "null"),
            Type::Nullable(inner) => write!(f, "{inner}?"),
            Type::Mod(name) => write!(f, "module {name}"),
            Type::Gen(id) => write!(f, "'g{id}"),
        }
    }
}
