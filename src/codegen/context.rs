//! Emission context shared across `expr.rs`/`stmt.rs`/`class.rs` (§4.6): an in-memory output
//! buffer (the file is only written to disk once this has been fully assembled, per the
//! determinism requirement on the generator) plus the bookkeeping needed to give every lambda
//! in the program a stable top-level name and a separately-emitted definition.
pub struct LambdaDef {
    pub name: String,
    /// Fully rendered C function definition, ready to be concatenated verbatim.
    pub source: String,
}

pub struct Codegen {
    pub out: String,
    temps: u32,
    lambda_counter: u32,
    pub lambdas: Vec<LambdaDef>,
}

impl Codegen {
    pub fn new() -> Self {
        Codegen {
            out: String::new(),
            temps: 0,
            lambda_counter: 0,
            lambdas: Vec::new(),
        }
    }

    pub fn new_temp(&mut self) -> String {
        let name = format!("_t{}", self.temps);
        self.temps += 1;
        name
    }

    pub fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Reserves the next stable lambda name. The caller is responsible for pushing the
    /// rendered `LambdaDef` once the body has been emitted (which may itself reserve further
    /// names for nested lambdas).
    pub fn reserve_lambda_name(&mut self) -> String {
        let n = self.lambda_counter;
        self.lambda_counter += 1;
        format!("ergo_lambda_{n}")
    }
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-function emission state: which module/class we're generating code for, and the stack of
/// block scopes whose locals must be released (in reverse declaration order) on scope exit.
pub struct FnEmit<'a> {
    pub cg: &'a mut Codegen,
    pub module: String,
    pub class: Option<String>,
    scopes: Vec<Vec<String>>,
    /// Ergo-level names bound to a local in the current function (params + `let`/`const`),
    /// used to tell a call to a local function-valued binding apart from a call to a module
    /// function or a builtin without needing the checker's environment at codegen time.
    pub named_locals: std::collections::HashSet<String>,
}

impl<'a> FnEmit<'a> {
    pub fn new(cg: &'a mut Codegen, module: String, class: Option<String>) -> Self {
        FnEmit {
            cg,
            module,
            class,
            scopes: vec![vec![]],
            named_locals: std::collections::HashSet::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(vec![]);
    }

    /// Declares a C-level local (already assigned its initial value) to be released when its
    /// scope ends.
    pub fn declare_local(&mut self, c_name: &str) {
        self.scopes.last_mut().unwrap().push(c_name.to_string());
    }

    /// Emits `ergo_release` for every local declared in the current scope, reverse order, then
    /// pops it. Does not emit the locals' own `ErgoVal` declarations.
    pub fn pop_scope(&mut self, indent: usize) {
        let locals = self.scopes.pop().unwrap();
        for name in locals.iter().rev() {
            self.cg.line(indent, &format!("ergo_release({name});"));
        }
    }
}
