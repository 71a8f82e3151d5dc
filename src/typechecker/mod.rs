//! Type checker (§4.5): walks a lowered, loaded program and produces `Module<Type>` bodies,
//! or the first `TypeError` encountered. Runs in two passes: [`env::build_env`] collects every
//! module/class/function shell up front, then each function body is checked against it so that
//! forward references and mutual recursion both just work.
pub mod constfold;
pub mod env;
pub mod error;
pub mod scope;

use crate::{
    ast::{
        BinaryOp, Block, ClassDecl, ConstDecl, Decl, Expr, ExprKind, FunctionDecl, LambdaParam,
        MatchArm, Module, Pattern, ReturnSpec, Stmt, StmtKind, StrPart, Type, UnaryOp, Visibility,
    },
    position::Position,
};

use env::{body_returns_null_literal, build_env, ClassInfo, Env};
use error::{TResult, TypeError};
use scope::{Binding, Locals};

pub fn check_program(program: &[Module<()>]) -> TResult<Vec<Module<Type>>> {
    let env = build_env(program)?;
    program
        .iter()
        .map(|module| check_module(&env, module))
        .collect()
}

fn check_module(env: &Env, module: &Module<()>) -> TResult<Module<Type>> {
    let decls = module
        .decls
        .iter()
        .map(|decl| check_decl(env, &module.name, decl))
        .collect::<TResult<Vec<_>>>()?;

    Ok(Module {
        name: module.name.clone(),
        path: module.path.clone(),
        imports: module.imports.clone(),
        decls,
    })
}

fn check_decl(env: &Env, module_name: &str, decl: &Decl<()>) -> TResult<Decl<Type>> {
    Ok(match decl {
        Decl::Function(f) => Decl::Function(check_function(env, module_name, None, f)?),
        Decl::Entry(f) => Decl::Entry(check_function(env, module_name, None, f)?),
        Decl::Class(c) => Decl::Class(check_class(env, module_name, c)?),
        Decl::Const(c) => Decl::Const(check_const(env, module_name, c)?),
    })
}

fn check_const(env: &Env, module_name: &str, c: &ConstDecl<()>) -> TResult<ConstDecl<Type>> {
    let (ty, _) = &env.modules[module_name].consts[&c.name];
    let mut ctx = FnCtx {
        env,
        module: module_name,
        class: None,
        ret_ty: ty.clone(),
        locals: Locals::new(),
    };
    let value = ctx.check_expr(&c.value)?;
    Ok(ConstDecl {
        name: c.name.clone(),
        value,
        pos: c.pos.clone(),
    })
}

fn check_class(env: &Env, module_name: &str, class: &ClassDecl<()>) -> TResult<ClassDecl<Type>> {
    let qname = format!("{module_name}.{}", class.name);
    let methods = class
        .methods
        .iter()
        .map(|m| check_function(env, module_name, Some(&qname), m))
        .collect::<TResult<Vec<_>>>()?;

    Ok(ClassDecl {
        name: class.name.clone(),
        visibility: class.visibility,
        sealed: class.sealed,
        fields: class.fields.clone(),
        methods,
        pos: class.pos.clone(),
    })
}

fn check_function(
    env: &Env,
    module_name: &str,
    class_qname: Option<&str>,
    f: &FunctionDecl<()>,
) -> TResult<FunctionDecl<Type>> {
    let mut locals = Locals::new();

    if let Some(qname) = class_qname {
        if let Some(receiver_mutable) = f.receiver {
            locals.declare(
                "this",
                Binding {
                    ty: Type::Class(qname.to_string()),
                    mutable: receiver_mutable,
                    constant: false,
                },
            );
        }
    }

    for p in &f.params {
        let ty = p
            .ty
            .clone()
            .ok_or_else(|| TypeError::new("parameter must have an explicit type", p.pos.clone()))?;
        locals.declare(
            p.name.clone(),
            Binding {
                ty,
                mutable: p.mutable,
                constant: false,
            },
        );
    }

    let mut ret_ty = match &f.ret {
        ReturnSpec::Void => Type::Void,
        ReturnSpec::Single(t) => t.clone(),
        ReturnSpec::Multi(ts) => Type::Tuple(ts.clone()),
    };
    if body_returns_null_literal(&f.body) {
        ret_ty = ret_ty.nullable();
    }

    let mut ctx = FnCtx {
        env,
        module: module_name,
        class: class_qname,
        ret_ty: ret_ty.clone(),
        locals,
    };
    let body = ctx.check_block(&f.body)?;

    Ok(FunctionDecl {
        name: f.name.clone(),
        visibility: f.visibility,
        receiver: f.receiver,
        params: f.params.clone(),
        ret: f.ret.clone(),
        body,
        pos: f.pos.clone(),
    })
}

/// Per-function checking context: the function/method currently under check, its declared
/// return type, and its scope stack.
struct FnCtx<'a> {
    env: &'a Env,
    module: &'a str,
    class: Option<&'a str>,
    ret_ty: Type,
    locals: Locals,
}

/// Two types are compatible at an assignment/parameter/return boundary. `null` is compatible
/// with any nullable type; a `T` is compatible with `T?` (the narrowed-to-non-null case).
fn compatible(expected: &Type, actual: &Type) -> bool {
    if expected == actual {
        return true;
    }
    match (expected, actual) {
        (Type::Nullable(_), Type::Null) => true,
        (Type::Nullable(inner), actual) => compatible(inner, actual),
        (Type::Array(a), Type::Array(b)) => compatible(a, b),
        _ => false,
    }
}

impl<'a> FnCtx<'a> {
    fn check_block(&mut self, block: &Block<()>) -> TResult<Block<Type>> {
        self.locals.push();
        let stmts = block
            .stmts
            .iter()
            .map(|s| self.check_stmt(s))
            .collect::<TResult<Vec<_>>>();
        self.locals.pop();
        Ok(Block {
            stmts: stmts?,
            pos: block.pos.clone(),
        })
    }

    fn check_stmt(&mut self, stmt: &Stmt<()>) -> TResult<Stmt<Type>> {
        let pos = stmt.pos.clone();
        let kind = match &stmt.kind {
            StmtKind::Let { name, mutable, value } => {
                let value = self.check_expr(value)?;
                let ty = value.info.clone();
                self.locals.declare(
                    name.clone(),
                    Binding {
                        ty,
                        mutable: *mutable,
                        constant: false,
                    },
                );
                StmtKind::Let {
                    name: name.clone(),
                    mutable: *mutable,
                    value,
                }
            }
            StmtKind::Const { name, value } => {
                let value = self.check_expr(value)?;
                let ty = value.info.clone();
                self.locals.declare(
                    name.clone(),
                    Binding {
                        ty,
                        mutable: false,
                        constant: true,
                    },
                );
                StmtKind::Const {
                    name: name.clone(),
                    value,
                }
            }
            StmtKind::If { arms, else_block } => self.check_if(arms, else_block, &pos)?,
            StmtKind::ForC { init, cond, step, body } => {
                self.locals.push();
                let init = init
                    .as_ref()
                    .map(|s| self.check_stmt(s).map(Box::new))
                    .transpose()?;
                let cond = cond.as_ref().map(|c| self.check_expr(c)).transpose()?;
                if let Some(cond) = &cond {
                    if cond.info != Type::Bool {
                        return Err(TypeError::new(
                            format!("for-loop condition must be bool, found {}", cond.info),
                            cond.pos.clone(),
                        ));
                    }
                }
                let step = step
                    .as_ref()
                    .map(|s| self.check_stmt(s).map(Box::new))
                    .transpose()?;
                let body = self.check_block(body)?;
                self.locals.pop();
                StmtKind::ForC { init, cond, step, body }
            }
            StmtKind::ForEach { name, iter, body } => {
                let iter = self.check_expr(iter)?;
                let elem_ty = match &iter.info {
                    Type::Array(elem) => (**elem).clone(),
                    other => {
                        return Err(TypeError::new(
                            format!("`for ... in` requires an array, found {other}"),
                            iter.pos.clone(),
                        ))
                    }
                };
                self.locals.push();
                self.locals.declare(
                    name.clone(),
                    Binding {
                        ty: elem_ty,
                        mutable: false,
                        constant: false,
                    },
                );
                let body = self.check_block(body)?;
                self.locals.pop();
                StmtKind::ForEach {
                    name: name.clone(),
                    iter,
                    body,
                }
            }
            StmtKind::Return(value) => match value {
                None => {
                    if self.ret_ty != Type::Void {
                        return Err(TypeError::new(
                            format!("expected a return value of type {}", self.ret_ty),
                            pos.clone(),
                        ));
                    }
                    StmtKind::Return(None)
                }
                Some(e) => {
                    let e = self.check_expr(e)?;
                    if !compatible(&self.ret_ty, &e.info) {
                        return Err(TypeError::new(
                            format!("expected return type {}, found {}", self.ret_ty, e.info),
                            e.pos.clone(),
                        ));
                    }
                    StmtKind::Return(Some(e))
                }
            },
            StmtKind::Expr(e) => StmtKind::Expr(self.check_expr(e)?),
            StmtKind::Block(b) => StmtKind::Block(self.check_block(b)?),
        };
        Ok(Stmt { kind, pos })
    }

    /// `if`/`elif`/`else` with null-narrowing (§4.5, §5) on `if x == null` / `if x != null`
    /// where `x` is a bare, nullable identifier: inside the arm taken on that branch, `x`'s
    /// type narrows to `null` or to its non-null payload respectively. Each arm gets its own
    /// cloned scope so narrowing in one arm never leaks into a sibling.
    fn check_if(
        &mut self,
        arms: &[(Expr<()>, Block<()>)],
        else_block: &Option<Block<()>>,
        pos: &Position,
    ) -> TResult<StmtKind<Type>> {
        let mut checked_arms = vec![];
        for (cond, block) in arms {
            let cond = self.check_expr(cond)?;
            if cond.info != Type::Bool {
                return Err(TypeError::new(
                    format!("if-condition must be bool, found {}", cond.info),
                    cond.pos.clone(),
                ));
            }

            let narrow = narrowing_target(&cond);
            let saved = self.locals.clone();
            if let Some((name, is_eq_null)) = &narrow {
                if let Some(binding) = self.locals.get(name).cloned() {
                    let narrowed = if *is_eq_null {
                        Type::Null
                    } else {
                        binding.ty.strip_nullable()
                    };
                    self.locals.update(name, narrowed);
                }
            }
            let block = self.check_block(block)?;
            self.locals = saved;

            checked_arms.push((cond, block));
        }

        let else_block = match else_block {
            Some(b) => {
                let narrow = if checked_arms.len() == 1 {
                    narrowing_target(&checked_arms[0].0)
                } else {
                    None
                };
                let saved = self.locals.clone();
                if let Some((name, is_eq_null)) = &narrow {
                    if let Some(binding) = self.locals.get(name).cloned() {
                        let narrowed = if *is_eq_null {
                            binding.ty.strip_nullable()
                        } else {
                            Type::Null
                        };
                        self.locals.update(name, narrowed);
                    }
                }
                let checked = self.check_block(b)?;
                self.locals = saved;
                Some(checked)
            }
            None => None,
        };

        Ok(StmtKind::If {
            arms: checked_arms,
            else_block,
        })
    }

    fn check_expr(&mut self, expr: &Expr<()>) -> TResult<Expr<Type>> {
        let pos = expr.pos.clone();
        let (kind, ty) = match &expr.kind {
            ExprKind::Int(v) => (ExprKind::Int(*v), Type::Num),
            ExprKind::Float(v) => (ExprKind::Float(*v), Type::Num),
            ExprKind::Bool(v) => (ExprKind::Bool(*v), Type::Bool),
            ExprKind::Null => (ExprKind::Null, Type::Null),
            ExprKind::Str(parts) => {
                let parts = parts
                    .iter()
                    .map(|p| self.check_str_part(p, &pos))
                    .collect::<TResult<Vec<_>>>()?;
                (ExprKind::Str(parts), Type::Str)
            }
            ExprKind::Array(items) => {
                let items = items
                    .iter()
                    .map(|i| self.check_expr(i))
                    .collect::<TResult<Vec<_>>>()?;
                let elem = match items.first() {
                    Some(first) => {
                        for item in &items[1..] {
                            if item.info != first.info {
                                return Err(TypeError::new(
                                    format!(
                                        "array elements must share one type: found {} and {}",
                                        first.info, item.info
                                    ),
                                    item.pos.clone(),
                                ));
                            }
                        }
                        first.info.clone()
                    }
                    None => {
                        return Err(TypeError::new(
                            "cannot infer the type of an empty array literal",
                            pos,
                        ))
                    }
                };
                let arr_ty = Type::Array(Box::new(elem));
                (ExprKind::Array(items), arr_ty)
            }
            ExprKind::Tuple(items) => {
                let items = items
                    .iter()
                    .map(|i| self.check_expr(i))
                    .collect::<TResult<Vec<_>>>()?;
                let ty = Type::Tuple(items.iter().map(|i| i.info.clone()).collect());
                (ExprKind::Tuple(items), ty)
            }
            ExprKind::Ident(name) => {
                let ty = self.resolve_ident(name, &pos)?;
                (ExprKind::Ident(name.clone()), ty)
            }
            ExprKind::Paren(inner) => {
                let inner = self.check_expr(inner)?;
                let ty = inner.info.clone();
                (ExprKind::Paren(Box::new(inner)), ty)
            }
            ExprKind::Unary(op, inner) => self.check_unary(*op, inner)?,
            ExprKind::Binary(op, l, r) => self.check_binary(*op, l, r)?,
            ExprKind::Assign(lhs, rhs) => self.check_assign(lhs, rhs)?,
            ExprKind::Call(callee, args) => self.check_call(callee, args, &pos)?,
            ExprKind::Index(arr, idx) => self.check_index(arr, idx)?,
            ExprKind::Member(obj, name) => self.check_member(obj, name, &pos)?,
            ExprKind::Conditional(cond, then_e, else_e) => {
                let cond = self.check_expr(cond)?;
                let then_e = self.check_expr(then_e)?;
                let else_e = self.check_expr(else_e)?;
                if then_e.info != else_e.info {
                    return Err(TypeError::new(
                        format!(
                            "conditional branches disagree: {} vs {}",
                            then_e.info, else_e.info
                        ),
                        pos,
                    ));
                }
                let ty = then_e.info.clone();
                (
                    ExprKind::Conditional(Box::new(cond), Box::new(then_e), Box::new(else_e)),
                    ty,
                )
            }
            ExprKind::New(name, args) => self.check_new(name, args, &pos)?,
            ExprKind::Lambda(params, body) => self.check_lambda(params, body)?,
            ExprKind::Move(inner) => self.check_move(inner)?,
            ExprKind::Match(scrutinee, arms) => self.check_match(scrutinee, arms, &pos)?,
        };
        Ok(Expr::new(kind, pos, ty))
    }

    fn check_str_part(&mut self, part: &StrPart<()>, pos: &Position) -> TResult<StrPart<Type>> {
        Ok(match part {
            StrPart::Text(t) => StrPart::Text(t.clone()),
            StrPart::Var(name, ()) => {
                let ty = self.resolve_ident(name, pos)?;
                StrPart::Var(name.clone(), ty)
            }
        })
    }

    fn resolve_ident(&self, name: &str, pos: &Position) -> TResult<Type> {
        if let Some(binding) = self.locals.get(name) {
            return Ok(binding.ty.clone());
        }
        if self.env.modules.contains_key(name) {
            return Ok(Type::Mod(name.to_string()));
        }
        Err(TypeError::new(format!("unknown identifier '{name}'"), pos.clone()))
    }

    fn check_unary(&mut self, op: UnaryOp, inner: &Expr<()>) -> TResult<(ExprKind<Type>, Type)> {
        let inner = self.check_expr(inner)?;
        let ty = match op {
            UnaryOp::Not => {
                if inner.info != Type::Bool {
                    return Err(TypeError::new(
                        format!("'!' requires bool, found {}", inner.info),
                        inner.pos.clone(),
                    ));
                }
                Type::Bool
            }
            UnaryOp::Neg => {
                if inner.info != Type::Num {
                    return Err(TypeError::new(
                        format!("unary '-' requires num, found {}", inner.info),
                        inner.pos.clone(),
                    ));
                }
                Type::Num
            }
            UnaryOp::Len => {
                return Err(TypeError::new(
                    "'#' should have been lowered to a call to len()",
                    inner.pos.clone(),
                ))
            }
        };
        Ok((ExprKind::Unary(op, Box::new(inner)), ty))
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        l: &Expr<()>,
        r: &Expr<()>,
    ) -> TResult<(ExprKind<Type>, Type)> {
        let l = self.check_expr(l)?;
        let r = self.check_expr(r)?;
        use BinaryOp::*;
        let ty = match op {
            Add if l.info == Type::Str || r.info == Type::Str => {
                if !(l.info == Type::Str || l.info == Type::Num)
                    || !(r.info == Type::Str || r.info == Type::Num)
                {
                    return Err(TypeError::new(
                        format!("'+' cannot combine {} and {}", l.info, r.info),
                        l.pos.clone(),
                    ));
                }
                Type::Str
            }
            Add | Sub | Mul | Div | Mod => {
                if l.info != Type::Num || r.info != Type::Num {
                    return Err(TypeError::new(
                        format!("arithmetic requires num, found {} and {}", l.info, r.info),
                        l.pos.clone(),
                    ));
                }
                Type::Num
            }
            Lt | Le | Gt | Ge => {
                if l.info != Type::Num || r.info != Type::Num {
                    return Err(TypeError::new(
                        format!("comparison requires num, found {} and {}", l.info, r.info),
                        l.pos.clone(),
                    ));
                }
                Type::Bool
            }
            Eq | Ne => {
                let bare_null_compare = matches!(l.kind, ExprKind::Ident(_)) && r.info == Type::Null
                    || matches!(r.kind, ExprKind::Ident(_)) && l.info == Type::Null;
                if l.info != r.info && !bare_null_compare && !compatible(&l.info, &r.info) && !compatible(&r.info, &l.info) {
                    return Err(TypeError::new(
                        format!("cannot compare {} and {}", l.info, r.info),
                        l.pos.clone(),
                    ));
                }
                Type::Bool
            }
            And | Or => {
                if l.info != Type::Bool || r.info != Type::Bool {
                    return Err(TypeError::new(
                        format!("'{op:?}' requires bool operands"),
                        l.pos.clone(),
                    ));
                }
                Type::Bool
            }
        };
        Ok((ExprKind::Binary(op, Box::new(l), Box::new(r)), ty))
    }

    fn check_assign(&mut self, lhs: &Expr<()>, rhs: &Expr<()>) -> TResult<(ExprKind<Type>, Type)> {
        let lhs = self.check_expr(lhs)?;
        match &lhs.kind {
            ExprKind::Ident(name) => {
                let binding = self
                    .locals
                    .get(name)
                    .ok_or_else(|| TypeError::new(format!("unknown identifier '{name}'"), lhs.pos.clone()))?;
                if binding.constant {
                    return Err(TypeError::new(format!("'{name}' is const"), lhs.pos.clone()));
                }
                if !binding.mutable {
                    return Err(TypeError::new(
                        format!("'{name}' is not declared mutable"),
                        lhs.pos.clone(),
                    ));
                }
            }
            ExprKind::Index(_, _) | ExprKind::Member(_, _) => {}
            _ => return Err(TypeError::new("invalid assignment target", lhs.pos.clone())),
        }
        let rhs = self.check_expr(rhs)?;
        if !compatible(&lhs.info, &rhs.info) {
            return Err(TypeError::new(
                format!("cannot assign {} to {}", rhs.info, lhs.info),
                rhs.pos.clone(),
            ));
        }
        let ty = lhs.info.clone();
        Ok((ExprKind::Assign(Box::new(lhs), Box::new(rhs)), ty))
    }

    fn check_index(&mut self, arr: &Expr<()>, idx: &Expr<()>) -> TResult<(ExprKind<Type>, Type)> {
        let arr = self.check_expr(arr)?;
        let idx = self.check_expr(idx)?;
        if idx.info != Type::Num {
            return Err(TypeError::new(
                format!("index must be num, found {}", idx.info),
                idx.pos.clone(),
            ));
        }
        let elem = match &arr.info {
            Type::Array(elem) => (**elem).clone(),
            other => {
                return Err(TypeError::new(
                    format!("cannot index into {other}"),
                    arr.pos.clone(),
                ))
            }
        };
        Ok((ExprKind::Index(Box::new(arr), Box::new(idx)), elem))
    }

    fn check_member(&mut self, obj: &Expr<()>, name: &str, pos: &Position) -> TResult<(ExprKind<Type>, Type)> {
        let obj = self.check_expr(obj)?;
        let ty = match &obj.info {
            Type::Mod(m) => {
                let (ty, _) = self
                    .env
                    .modules
                    .get(m)
                    .and_then(|info| info.consts.get(name))
                    .ok_or_else(|| TypeError::new(format!("no constant '{m}.{name}'"), pos.clone()))?;
                ty.clone()
            }
            _ if qname_of(&obj.info).is_some() => {
                let qname = qname_of(&obj.info).expect("checked above");
                self.field_type(&qname, name, pos)?
            }
            other => {
                return Err(TypeError::new(
                    format!("cannot access member '{name}' on {other}"),
                    pos.clone(),
                ))
            }
        };
        Ok((ExprKind::Member(Box::new(obj), name.to_string()), ty))
    }

    fn field_type(&self, qname: &str, field: &str, pos: &Position) -> TResult<Type> {
        let class = self
            .env
            .classes
            .get(qname)
            .ok_or_else(|| TypeError::new(format!("unknown class '{qname}'"), pos.clone()))?;
        if class.visibility == Visibility::Lock && class.declaring_module != self.module {
            return Err(TypeError::new(
                format!("'{qname}' is locked to its declaring module"),
                pos.clone(),
            ));
        }
        class
            .field(field)
            .cloned()
            .ok_or_else(|| TypeError::new(format!("'{qname}' has no field '{field}'"), pos.clone()))
    }

    fn check_new(&mut self, name: &str, args: &[Expr<()>], pos: &Position) -> TResult<(ExprKind<Type>, Type)> {
        let qname = self.resolve_class(name, pos)?;
        let class = self.env.classes.get(&qname).expect("resolved above");
        let args = self.check_call_args_for_class(class, args, pos)?;
        Ok((ExprKind::New(qname.clone(), args), Type::Class(qname)))
    }

    fn resolve_class(&self, name: &str, pos: &Position) -> TResult<String> {
        let own = format!("{}.{name}", self.module);
        if self.env.classes.contains_key(&own) {
            return Ok(own);
        }
        for module in self.env.modules[self.module].imports.iter() {
            let candidate = format!("{module}.{name}");
            if self.env.classes.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(TypeError::new(format!("unknown class '{name}'"), pos.clone()))
    }

    fn check_call_args_for_class(
        &mut self,
        class: &ClassInfo,
        args: &[Expr<()>],
        pos: &Position,
    ) -> TResult<Vec<Expr<Type>>> {
        if let Some(init) = class.methods.get("init") {
            self.check_args_against(&init.sig.params, args, &class.qname, pos)
        } else {
            let field_types: Vec<Type> = class.fields.iter().map(|(_, t)| t.clone()).collect();
            self.check_args_against(&field_types, args, &class.qname, pos)
        }
    }

    fn check_args_against(
        &mut self,
        params: &[Type],
        args: &[Expr<()>],
        callee_desc: &str,
        pos: &Position,
    ) -> TResult<Vec<Expr<Type>>> {
        if params.len() != args.len() {
            return Err(TypeError::new(
                format!(
                    "'{callee_desc}' expects {} argument(s), found {}",
                    params.len(),
                    args.len()
                ),
                pos.clone(),
            ));
        }
        let mut checked = vec![];
        for (param_ty, arg) in params.iter().zip(args) {
            let arg = self.check_expr(arg)?;
            if is_sealed_class(self.env, param_ty) && !matches!(arg.kind, ExprKind::Null | ExprKind::Move(_)) {
                return Err(TypeError::new(
                    "a sealed parameter may only be passed `null` or `move(x)`",
                    arg.pos.clone(),
                ));
            }
            if !compatible(param_ty, &arg.info) {
                return Err(TypeError::new(
                    format!("expected {param_ty}, found {}", arg.info),
                    arg.pos.clone(),
                ));
            }
            checked.push(arg);
        }
        Ok(checked)
    }

    fn check_lambda(
        &mut self,
        params: &[LambdaParam],
        body: &Expr<()>,
    ) -> TResult<(ExprKind<Type>, Type)> {
        self.locals.push();
        let mut param_types = vec![];
        let mut next_gen = 0u32;
        for p in params {
            let ty = p.ty.clone().unwrap_or_else(|| {
                let g = Type::Gen(next_gen);
                next_gen += 1;
                g
            });
            self.locals.declare(
                p.name.clone(),
                Binding {
                    ty: ty.clone(),
                    mutable: false,
                    constant: false,
                },
            );
            param_types.push(ty);
        }
        let body = self.check_expr(body)?;
        self.locals.pop();
        let ret = body.info.clone();
        Ok((
            ExprKind::Lambda(params.to_vec(), Box::new(body)),
            Type::Fn(param_types, Box::new(ret)),
        ))
    }

    fn check_move(&mut self, inner: &Expr<()>) -> TResult<(ExprKind<Type>, Type)> {
        let ExprKind::Ident(name) = &inner.kind else {
            return Err(TypeError::new("move() requires a bare local identifier", inner.pos.clone()));
        };
        let binding = self
            .locals
            .get(name)
            .ok_or_else(|| TypeError::new(format!("unknown identifier '{name}'"), inner.pos.clone()))?;
        if !binding.mutable {
            return Err(TypeError::new(
                format!("move() requires '{name}' to be a mutable local"),
                inner.pos.clone(),
            ));
        }
        let ty = binding.ty.clone();
        let inner = Expr::new(ExprKind::Ident(name.clone()), inner.pos.clone(), ty.clone());
        Ok((ExprKind::Move(Box::new(inner)), ty))
    }

    fn check_match(
        &mut self,
        scrutinee: &Expr<()>,
        arms: &[MatchArm<()>],
        pos: &Position,
    ) -> TResult<(ExprKind<Type>, Type)> {
        let scrutinee = self.check_expr(scrutinee)?;
        let mut checked_arms = vec![];
        let mut result_ty: Option<Type> = None;
        for arm in arms {
            self.locals.push();
            if let Pattern::Ident(name) = &arm.pattern {
                self.locals.declare(
                    name.clone(),
                    Binding {
                        ty: scrutinee.info.clone(),
                        mutable: false,
                        constant: false,
                    },
                );
            }
            let body = self.check_expr(&arm.body)?;
            self.locals.pop();
            match &result_ty {
                None => result_ty = Some(body.info.clone()),
                Some(t) if *t == body.info => {}
                Some(t) => {
                    return Err(TypeError::new(
                        format!("match arms disagree: {t} vs {}", body.info),
                        body.pos.clone(),
                    ))
                }
            }
            checked_arms.push(MatchArm {
                pattern: arm.pattern.clone(),
                pos: arm.pos.clone(),
                body,
            });
        }
        let ty = result_ty.ok_or_else(|| TypeError::new("match has no arms", pos.clone()))?;
        Ok((ExprKind::Match(Box::new(scrutinee), checked_arms), ty))
    }

    fn check_call(
        &mut self,
        callee: &Expr<()>,
        args: &[Expr<()>],
        pos: &Position,
    ) -> TResult<(ExprKind<Type>, Type)> {
        if let ExprKind::Member(obj, method) = &callee.kind {
            if let ExprKind::Ident(maybe_module) = &obj.kind {
                let shadowed = self.locals.get(maybe_module).is_some();
                if !shadowed && self.env.modules.contains_key(maybe_module) {
                    return self.check_qualified_call(maybe_module, method, args, pos);
                }
            }
            return self.check_method_call(obj, method, args, pos);
        }
        if let ExprKind::Ident(name) = &callee.kind {
            return self.check_bare_call(name, args, pos);
        }

        let callee = self.check_expr(callee)?;
        let Type::Fn(params, ret) = callee.info.clone() else {
            return Err(TypeError::new(
                format!("cannot call a value of type {}", callee.info),
                pos.clone(),
            ));
        };
        let args = self.check_args_against(&params, args, "<lambda>", pos)?;
        Ok((
            ExprKind::Call(Box::new(callee), args),
            *ret,
        ))
    }

    fn check_qualified_call(
        &mut self,
        module: &str,
        method: &str,
        args: &[Expr<()>],
        pos: &Position,
    ) -> TResult<(ExprKind<Type>, Type)> {
        let sig = self
            .env
            .modules
            .get(module)
            .and_then(|info| info.functions.get(method))
            .cloned()
            .ok_or_else(|| TypeError::new(format!("unknown function '{module}.{method}'"), pos.clone()))?;
        let args = self.check_args_against(&sig.params, args, &format!("{module}.{method}"), pos)?;
        let callee = Expr::new(
            ExprKind::Member(
                Box::new(Expr::new(
                    ExprKind::Ident(module.to_string()),
                    pos.clone(),
                    Type::Mod(module.to_string()),
                )),
                method.to_string(),
            ),
            pos.clone(),
            Type::Fn(sig.params.clone(), Box::new(sig.ret.clone())),
        );
        Ok((ExprKind::Call(Box::new(callee), args), sig.ret))
    }

    fn check_method_call(
        &mut self,
        obj: &Expr<()>,
        method: &str,
        args: &[Expr<()>],
        pos: &Position,
    ) -> TResult<(ExprKind<Type>, Type)> {
        let obj = self.check_expr(obj)?;

        // Builtin array methods: mutable-receiver required, matching the sealed-object
        // mutation story used elsewhere.
        if let Type::Array(elem) = obj.info.strip_nullable() {
            match method {
                "add" => {
                    let args = self.check_args_against(&[(*elem).clone()], args, "[T].add", pos)?;
                    let callee = Expr::new(
                        ExprKind::Member(Box::new(obj), method.to_string()),
                        pos.clone(),
                        Type::Void,
                    );
                    return Ok((ExprKind::Call(Box::new(callee), args), Type::Void));
                }
                "remove" => {
                    let args = self.check_args_against(&[Type::Num], args, "[T].remove", pos)?;
                    let callee = Expr::new(
                        ExprKind::Member(Box::new(obj), method.to_string()),
                        pos.clone(),
                        (*elem).clone(),
                    );
                    return Ok((ExprKind::Call(Box::new(callee), args), (*elem).clone()));
                }
                _ => {}
            }
        }

        if method == "to_string" && matches!(obj.info.strip_nullable(), Type::Num | Type::Bool) {
            if !args.is_empty() {
                return Err(TypeError::new("to_string() takes no arguments", pos.clone()));
            }
            let callee = Expr::new(
                ExprKind::Member(Box::new(obj), method.to_string()),
                pos.clone(),
                Type::Str,
            );
            return Ok((ExprKind::Call(Box::new(callee), vec![]), Type::Str));
        }

        let qname = match &obj.info {
            Type::Class(q) => q.clone(),
            Type::Nullable(inner) if matches!(**inner, Type::Class(_)) => {
                return Err(TypeError::new(
                    "method call on a possibly-null value; narrow with `if x != null` first",
                    obj.pos.clone(),
                ))
            }
            other => {
                return Err(TypeError::new(
                    format!("cannot call method '{method}' on {other}"),
                    obj.pos.clone(),
                ))
            }
        };
        let class = self
            .env
            .classes
            .get(&qname)
            .ok_or_else(|| TypeError::new(format!("unknown class '{qname}'"), pos.clone()))?;
        let info = class
            .methods
            .get(method)
            .ok_or_else(|| TypeError::new(format!("'{qname}' has no method '{method}'"), pos.clone()))?
            .clone();
        let args = self.check_args_against(&info.sig.params, args, &format!("{qname}.{method}"), pos)?;
        let callee = Expr::new(
            ExprKind::Member(Box::new(obj), method.to_string()),
            pos.clone(),
            Type::Fn(info.sig.params.clone(), Box::new(info.sig.ret.clone())),
        );
        Ok((ExprKind::Call(Box::new(callee), args), info.sig.ret))
    }

    /// Bare-identifier call resolution order (§4.5): a local fn-typed binding, then the
    /// `stdr`/builtin intrinsics, then the current module's own function, then `stdr`'s
    /// prelude (when imported, or when we *are* `stdr`).
    fn check_bare_call(
        &mut self,
        name: &str,
        args: &[Expr<()>],
        pos: &Position,
    ) -> TResult<(ExprKind<Type>, Type)> {
        if let Some(binding) = self.locals.get(name).cloned() {
            if let Type::Fn(params, ret) = binding.ty {
                let args = self.check_args_against(&params, args, name, pos)?;
                let callee = Expr::new(
                    ExprKind::Ident(name.to_string()),
                    pos.clone(),
                    Type::Fn(params, ret.clone()),
                );
                return Ok((ExprKind::Call(Box::new(callee), args), *ret));
            }
        }

        if let Some(result) = self.check_builtin_call(name, args, pos) {
            return result;
        }

        if let Some(sig) = self.env.modules[self.module].functions.get(name).cloned() {
            let args = self.check_args_against(&sig.params, args, name, pos)?;
            let callee = Expr::new(
                ExprKind::Ident(name.to_string()),
                pos.clone(),
                Type::Fn(sig.params.clone(), Box::new(sig.ret.clone())),
            );
            return Ok((ExprKind::Call(Box::new(callee), args), sig.ret));
        }

        let imports_stdr = self.module == "stdr" || self.env.modules[self.module].imports.iter().any(|m| m == "stdr");
        if imports_stdr {
            if let Some(sig) = self.env.modules.get("stdr").and_then(|m| m.functions.get(name)).cloned() {
                let args = self.check_args_against(&sig.params, args, name, pos)?;
                let callee = Expr::new(
                    ExprKind::Ident(name.to_string()),
                    pos.clone(),
                    Type::Fn(sig.params.clone(), Box::new(sig.ret.clone())),
                );
                return Ok((ExprKind::Call(Box::new(callee), args), sig.ret));
            }
        }

        Err(TypeError::new(format!("unknown function '{name}'"), pos.clone()))
    }

    /// `writef`/`readf`/`str`/`len`/`is_null` are implemented directly by the code generator's
    /// runtime (they have no `.e` declaration, per `prelude/stdr.e`'s header comment), so each
    /// gets its own ad hoc arity/type rule rather than a `Sig` from the environment: `len`
    /// polymorphically accepts any array or string, and `is_null` accepts any type at all.
    fn check_builtin_call(
        &mut self,
        name: &str,
        args: &[Expr<()>],
        pos: &Position,
    ) -> Option<TResult<(ExprKind<Type>, Type)>> {
        let ret = match name {
            "len" => {
                let [arg] = args else {
                    return Some(Err(TypeError::new("len() takes exactly one argument", pos.clone())));
                };
                let arg = match self.check_expr(arg) {
                    Ok(a) => a,
                    Err(e) => return Some(Err(e)),
                };
                if !matches!(arg.info, Type::Array(_) | Type::Str) {
                    return Some(Err(TypeError::new(
                        format!("len() requires an array or string, found {}", arg.info),
                        arg.pos.clone(),
                    )));
                }
                let callee = Expr::new(ExprKind::Ident(name.to_string()), pos.clone(), Type::Void);
                return Some(Ok((ExprKind::Call(Box::new(callee), vec![arg]), Type::Num)));
            }
            "str" => (vec![Type::Num], Type::Str),
            "write" => {
                let [arg] = args else {
                    return Some(Err(TypeError::new("write() takes exactly one argument", pos.clone())));
                };
                let arg = match self.check_expr(arg) {
                    Ok(a) => a,
                    Err(e) => return Some(Err(e)),
                };
                let callee = Expr::new(ExprKind::Ident(name.to_string()), pos.clone(), Type::Void);
                return Some(Ok((ExprKind::Call(Box::new(callee), vec![arg]), Type::Void)));
            }
            "writef" => return Some(self.check_writef_call(args, pos)),
            "readf" => {
                return Some(self.check_args_against_ret(
                    args,
                    &[Type::Str, Type::Str, Type::Array(Box::new(Type::Num))],
                    Type::Array(Box::new(Type::Num)),
                    name,
                    pos,
                ))
            }
            "is_null" => {
                let [arg] = args else {
                    return Some(Err(TypeError::new("is_null() takes exactly one argument", pos.clone())));
                };
                let arg = match self.check_expr(arg) {
                    Ok(a) => a,
                    Err(e) => return Some(Err(e)),
                };
                let callee = Expr::new(ExprKind::Ident(name.to_string()), pos.clone(), Type::Void);
                return Some(Ok((ExprKind::Call(Box::new(callee), vec![arg]), Type::Bool)));
            }
            _ => return None,
        };
        Some(self.check_args_against_ret(args, &ret.0, ret.1, name, pos))
    }

    /// `writef(fmt, (a, b, ...))` after lowering's tail-tuple wrap: one or two arguments, the
    /// first always a format string, the second (if present) the interpolated-value tuple of
    /// whatever types the call site actually supplies.
    fn check_writef_call(&mut self, args: &[Expr<()>], pos: &Position) -> TResult<(ExprKind<Type>, Type)> {
        if args.is_empty() || args.len() > 2 {
            return Err(TypeError::new(
                format!("writef() expects 1 or 2 arguments, found {}", args.len()),
                pos.clone(),
            ));
        }
        let mut checked = vec![];
        let fmt = self.check_expr(&args[0])?;
        if fmt.info != Type::Str {
            return Err(TypeError::new(
                format!("writef()'s format string must be a string, found {}", fmt.info),
                fmt.pos.clone(),
            ));
        }
        checked.push(fmt);
        if let Some(rest) = args.get(1) {
            checked.push(self.check_expr(rest)?);
        }
        let callee = Expr::new(ExprKind::Ident("writef".to_string()), pos.clone(), Type::Void);
        Ok((ExprKind::Call(Box::new(callee), checked), Type::Void))
    }

    fn check_args_against_ret(
        &mut self,
        args: &[Expr<()>],
        params: &[Type],
        ret: Type,
        name: &str,
        pos: &Position,
    ) -> TResult<(ExprKind<Type>, Type)> {
        let args = self.check_args_against(params, args, name, pos)?;
        let callee = Expr::new(
            ExprKind::Ident(name.to_string()),
            pos.clone(),
            Type::Fn(params.to_vec(), Box::new(ret.clone())),
        );
        Ok((ExprKind::Call(Box::new(callee), args), ret))
    }
}

fn is_sealed_class(env: &Env, ty: &Type) -> bool {
    if let Type::Class(qname) = ty.strip_nullable() {
        env.classes.get(&qname).map(|c| c.sealed).unwrap_or(false)
    } else {
        false
    }
}

fn qname_of(ty: &Type) -> Option<String> {
    match ty {
        Type::Class(q) => Some(q.clone()),
        Type::Nullable(inner) => qname_of(inner),
        _ => None,
    }
}

/// For `if x == null` / `if x != null` where `x` is a bare identifier: `Some((x, true))` when
/// the arm taken narrows `x` to `null` (the `==` branch), `Some((x, false))` when it narrows to
/// the non-null payload (the `!=` branch).
fn narrowing_target(cond: &Expr<Type>) -> Option<(String, bool)> {
    let ExprKind::Binary(op, l, r) = &cond.kind else {
        return None;
    };
    if !matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
        return None;
    }
    let is_eq = matches!(op, BinaryOp::Eq);
    match (&l.kind, &r.kind) {
        (ExprKind::Ident(name), ExprKind::Null) => Some((name.clone(), is_eq)),
        (ExprKind::Null, ExprKind::Ident(name)) => Some((name.clone(), is_eq)),
        _ => None,
    }
}
