//! Small constant-folder (§4.4) used to evaluate module-level constants in `stdr`/`math`:
//! literals, unary `-`/`!`, and numeric `+ - * / %`.
use crate::ast::{BinaryOp, Expr, ExprKind, StrPart, Type, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl ConstValue {
    pub fn ty(&self) -> Type {
        match self {
            ConstValue::Int(_) | ConstValue::Float(_) => Type::Num,
            ConstValue::Bool(_) => Type::Bool,
            ConstValue::Str(_) => Type::Str,
        }
    }
}

pub fn eval_const<T>(expr: &Expr<T>) -> Result<ConstValue, String> {
    match &expr.kind {
        ExprKind::Int(v) => Ok(ConstValue::Int(*v)),
        ExprKind::Float(v) => Ok(ConstValue::Float(*v)),
        ExprKind::Bool(v) => Ok(ConstValue::Bool(*v)),
        ExprKind::Str(parts) => {
            let mut s = String::new();
            for p in parts {
                match p {
                    StrPart::Text(t) => s.push_str(t),
                    StrPart::Var(..) => {
                        return Err("module constants may not interpolate".into())
                    }
                }
            }
            Ok(ConstValue::Str(s))
        }
        ExprKind::Paren(e) => eval_const(e),
        ExprKind::Unary(UnaryOp::Neg, e) => match eval_const(e)? {
            ConstValue::Int(v) => Ok(ConstValue::Int(-v)),
            ConstValue::Float(v) => Ok(ConstValue::Float(-v)),
            _ => Err("unary '-' requires a numeric constant".into()),
        },
        ExprKind::Unary(UnaryOp::Not, e) => match eval_const(e)? {
            ConstValue::Bool(v) => Ok(ConstValue::Bool(!v)),
            _ => Err("unary '!' requires a boolean constant".into()),
        },
        ExprKind::Unary(UnaryOp::Len, _) => Err("'#' is not a constant expression".into()),
        ExprKind::Binary(op, l, r) => eval_binary(*op, eval_const(l)?, eval_const(r)?),
        _ => Err("not a constant expression".into()),
    }
}

fn eval_binary(op: BinaryOp, l: ConstValue, r: ConstValue) -> Result<ConstValue, String> {
    use BinaryOp::*;

    if let (ConstValue::Int(a), ConstValue::Int(b)) = (&l, &r) {
        return match op {
            Add => Ok(ConstValue::Int(a + b)),
            Sub => Ok(ConstValue::Int(a - b)),
            Mul => Ok(ConstValue::Int(a * b)),
            Mod => Ok(ConstValue::Int(a % b)),
            Div => Ok(ConstValue::Float(*a as f64 / *b as f64)),
            _ => Err("only arithmetic operators are constant-foldable".into()),
        };
    }

    let (ConstValue::Int(_) | ConstValue::Float(_), ConstValue::Int(_) | ConstValue::Float(_)) =
        (&l, &r)
    else {
        return Err("arithmetic constant folding requires numeric operands".into());
    };
    let as_f = |v: &ConstValue| match v {
        ConstValue::Int(v) => *v as f64,
        ConstValue::Float(v) => *v,
        _ => unreachable!(),
    };
    let (lf, rf) = (as_f(&l), as_f(&r));
    match op {
        Add => Ok(ConstValue::Float(lf + rf)),
        Sub => Ok(ConstValue::Float(lf - rf)),
        Mul => Ok(ConstValue::Float(lf * rf)),
        Div => Ok(ConstValue::Float(lf / rf)),
        Mod => Err("'%' on a float is a trap, not a constant expression".into()),
        _ => Err("only arithmetic operators are constant-foldable".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer::Lexer, parser};

    fn const_value(src: &str) -> ConstValue {
        let tokens = Lexer::new("math.e", src).lex().unwrap();
        let module = parser::parse(tokens, "math", "math.e").unwrap();
        let c = module.consts().next().unwrap();
        eval_const(&c.value).unwrap()
    }

    #[test]
    fn folds_negative_float() {
        assert_eq!(const_value("const x = -1.5;"), ConstValue::Float(-1.5));
    }

    #[test]
    fn folds_integer_arithmetic() {
        assert_eq!(const_value("const x = 2 * (3 + 4);"), ConstValue::Int(14));
    }
}
