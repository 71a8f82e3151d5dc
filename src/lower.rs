//! AST-to-AST lowering (§4.3): normalizes surface sugar into the canonical core that the type
//! checker and code generator both consume.
use crate::{
    ast::{
        BinaryOp, Block, ClassDecl, Decl, Expr, ExprKind, FunctionDecl, MatchArm, Module, Stmt,
        StmtKind, UnaryOp,
    },
    position::Position,
};

const VARIADIC_PRELUDE_FNS: [&str; 2] = ["writef", "readf"];

pub fn lower_module(module: Module<()>) -> Module<()> {
    Module {
        name: module.name,
        path: module.path,
        imports: module.imports,
        decls: module.decls.into_iter().map(lower_decl).collect(),
    }
}

fn lower_decl(decl: Decl<()>) -> Decl<()> {
    match decl {
        Decl::Function(f) => Decl::Function(lower_function(f)),
        Decl::Entry(f) => Decl::Entry(lower_function(f)),
        Decl::Class(c) => Decl::Class(lower_class(c)),
        Decl::Const(mut c) => {
            c.value = lower_expr(c.value);
            Decl::Const(c)
        }
    }
}

fn lower_class(class: ClassDecl<()>) -> ClassDecl<()> {
    ClassDecl {
        methods: class.methods.into_iter().map(lower_function).collect(),
        ..class
    }
}

fn lower_function(f: FunctionDecl<()>) -> FunctionDecl<()> {
    // Function/method/entry bodies are always parsed as a block (§4.2's grammar has no
    // brace-less form here), so the "wrap a single statement into a block" rule is already
    // satisfied by construction.
    FunctionDecl {
        body: lower_block(f.body),
        ..f
    }
}

fn lower_block(block: Block<()>) -> Block<()> {
    Block {
        stmts: block.stmts.into_iter().map(lower_stmt).collect(),
        pos: block.pos,
    }
}

fn lower_stmt(stmt: Stmt<()>) -> Stmt<()> {
    let kind = match stmt.kind {
        StmtKind::Let {
            name,
            mutable,
            value,
        } => StmtKind::Let {
            name,
            mutable,
            value: lower_expr(value),
        },
        StmtKind::Const { name, value } => StmtKind::Const {
            name,
            value: lower_expr(value),
        },
        StmtKind::If { arms, else_block } => StmtKind::If {
            arms: arms
                .into_iter()
                .map(|(c, b)| (lower_expr(c), lower_block(b)))
                .collect(),
            else_block: else_block.map(lower_block),
        },
        StmtKind::ForC {
            init,
            cond,
            step,
            body,
        } => StmtKind::ForC {
            init: init.map(|s| Box::new(lower_stmt(*s))),
            cond: cond.map(lower_expr),
            step: step.map(|s| Box::new(lower_stmt(*s))),
            body: lower_block(body),
        },
        StmtKind::ForEach { name, iter, body } => StmtKind::ForEach {
            name,
            iter: lower_expr(iter),
            body: lower_block(body),
        },
        StmtKind::Return(e) => StmtKind::Return(e.map(lower_expr)),
        StmtKind::Expr(e) => StmtKind::Expr(lower_expr(e)),
        StmtKind::Block(b) => StmtKind::Block(lower_block(b)),
    };
    Stmt {
        kind,
        pos: stmt.pos,
    }
}

fn lower_expr(expr: Expr<()>) -> Expr<()> {
    let pos = expr.pos;
    match expr.kind {
        // `#x` -> `len(x)` (folding the intermediate `stdr.len` name from §4.3 directly, since
        // the unary operator never produces a `Member` node to begin with).
        ExprKind::Unary(UnaryOp::Len, inner) => {
            let inner = lower_expr(*inner);
            let callee = Expr::new(ExprKind::Ident("len".into()), pos.clone(), ());
            Expr::new(ExprKind::Call(Box::new(callee), vec![inner]), pos, ())
        }
        ExprKind::Unary(op, inner) => {
            Expr::new(ExprKind::Unary(op, Box::new(lower_expr(*inner))), pos, ())
        }
        ExprKind::Binary(op, l, r) => Expr::new(
            ExprKind::Binary(op, Box::new(lower_expr(*l)), Box::new(lower_expr(*r))),
            pos,
            (),
        ),
        ExprKind::Assign(l, r) => Expr::new(
            ExprKind::Assign(Box::new(lower_expr(*l)), Box::new(lower_expr(*r))),
            pos,
            (),
        ),
        ExprKind::Paren(e) => Expr::new(ExprKind::Paren(Box::new(lower_expr(*e))), pos, ()),
        ExprKind::Array(items) => Expr::new(
            ExprKind::Array(items.into_iter().map(lower_expr).collect()),
            pos,
            (),
        ),
        ExprKind::Tuple(items) => Expr::new(
            ExprKind::Tuple(items.into_iter().map(lower_expr).collect()),
            pos,
            (),
        ),
        ExprKind::Index(b, i) => Expr::new(
            ExprKind::Index(Box::new(lower_expr(*b)), Box::new(lower_expr(*i))),
            pos,
            (),
        ),
        ExprKind::Member(b, name) => {
            Expr::new(ExprKind::Member(Box::new(lower_expr(*b)), name), pos, ())
        }
        ExprKind::Conditional(c, t, e) => Expr::new(
            ExprKind::Conditional(
                Box::new(lower_expr(*c)),
                Box::new(lower_expr(*t)),
                Box::new(lower_expr(*e)),
            ),
            pos,
            (),
        ),
        ExprKind::New(name, args) => Expr::new(
            ExprKind::New(name, args.into_iter().map(lower_expr).collect()),
            pos,
            (),
        ),
        ExprKind::Lambda(params, body) => Expr::new(
            ExprKind::Lambda(params, Box::new(lower_expr(*body))),
            pos,
            (),
        ),
        ExprKind::Move(e) => Expr::new(ExprKind::Move(Box::new(lower_expr(*e))), pos, ()),
        ExprKind::Match(scrutinee, arms) => Expr::new(
            ExprKind::Match(
                Box::new(lower_expr(*scrutinee)),
                arms.into_iter()
                    .map(|a| MatchArm {
                        pattern: a.pattern,
                        pos: a.pos,
                        body: lower_expr(a.body),
                    })
                    .collect(),
            ),
            pos,
            (),
        ),
        ExprKind::Call(callee, args) => lower_call(*callee, args, pos),
        leaf => Expr::new(leaf, pos, ()),
    }
}

fn lower_call(callee: Expr<()>, args: Vec<Expr<()>>, pos: Position) -> Expr<()> {
    let args: Vec<_> = args.into_iter().map(lower_expr).collect();

    if let ExprKind::Ident(name) = &callee.kind {
        if name == "move" && args.len() == 1 {
            let mut args = args;
            return Expr::new(ExprKind::Move(Box::new(args.remove(0))), pos, ());
        }
    }

    let callee = unqualify_stdr_call(callee);

    if let ExprKind::Ident(name) = &callee.kind {
        if VARIADIC_PRELUDE_FNS.contains(&name.as_str()) && args.len() >= 2 {
            let already_tuple = args.len() == 2 && matches!(args[1].kind, ExprKind::Tuple(_));
            if !already_tuple {
                let mut args = args;
                let fmt = args.remove(0);
                let tail_pos = args[0].pos.clone();
                let tuple = Expr::new(ExprKind::Tuple(args), tail_pos, ());
                return Expr::new(
                    ExprKind::Call(Box::new(callee), vec![fmt, tuple]),
                    pos,
                    (),
                );
            }
        }
    }

    Expr::new(ExprKind::Call(Box::new(callee), args), pos, ())
}

/// `stdr.writef(...)` / `stdr.readf(...)` / `stdr.str(...)` -> the unqualified call.
fn unqualify_stdr_call(callee: Expr<()>) -> Expr<()> {
    let ExprKind::Member(base, member) = &callee.kind else {
        return callee;
    };
    let ExprKind::Ident(base_name) = &base.kind else {
        return callee;
    };
    if base_name == "stdr" && matches!(member.as_str(), "writef" | "readf" | "str") {
        Expr::new(ExprKind::Ident(member.clone()), callee.pos.clone(), ())
    } else {
        callee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer::Lexer, parser};

    fn lower_src(src: &str) -> Module<()> {
        let tokens = Lexer::new("test.e", src).lex().expect("lex");
        let module = parser::parse(tokens, "test", "test.e").expect("parse");
        lower_module(module)
    }

    fn first_return_expr(module: &Module<()>) -> &Expr<()> {
        let f = module.functions().next().unwrap();
        let StmtKind::Return(Some(e)) = &f.body.stmts[0].kind else {
            panic!("expected a return statement");
        };
        e
    }

    #[test]
    fn length_operator_lowers_to_len_call() {
        let module = lower_src("fun f(a = [num]) (( num )) { return #a; }");
        let e = first_return_expr(&module);
        let ExprKind::Call(callee, args) = &e.kind else {
            panic!("expected a call");
        };
        assert!(matches!(&callee.kind, ExprKind::Ident(n) if n == "len"));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn move_call_lowers_to_move_sentinel() {
        let module = lower_src("fun f(x = num) (( num )) { return move(x); }");
        let e = first_return_expr(&module);
        assert!(matches!(e.kind, ExprKind::Move(_)));
    }

    #[test]
    fn qualified_writef_is_unqualified_and_tail_wrapped() {
        let module = lower_src(
            "fun f(a = num, b = num) (( -- )) { stdr.writef(\"{}+{}\\n\", a, b); }",
        );
        let f = module.functions().next().unwrap();
        let StmtKind::Expr(e) = &f.body.stmts[0].kind else {
            panic!("expected an expression statement");
        };
        let ExprKind::Call(callee, args) = &e.kind else {
            panic!("expected a call");
        };
        assert!(matches!(&callee.kind, ExprKind::Ident(n) if n == "writef"));
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1].kind, ExprKind::Tuple(_)));
    }

    #[test]
    fn already_tupled_writef_is_left_alone() {
        let module = lower_src("fun f(t = (num, num)) (( -- )) { writef(\"{}{}\", t); }");
        let f = module.functions().next().unwrap();
        let StmtKind::Expr(e) = &f.body.stmts[0].kind else {
            panic!("expected an expression statement");
        };
        let ExprKind::Call(_, args) = &e.kind else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1].kind, ExprKind::Ident(_)));
    }

    #[test]
    fn lowering_is_idempotent() {
        let module = lower_src(
            "fun f(a = [num]) (( num )) { return #a; } fun g(x = num) (( num )) { return move(x); }",
        );
        let twice = lower_module(module.clone());
        assert_eq!(module, twice);
    }
}
