//! External/mechanical loader (§6): resolves `bring` imports to files, embeds `stdr`/`math`,
//! lexes, parses and lowers each module, in load order (entry file first).
use std::{
    collections::{HashSet, VecDeque},
    error::Error,
    fmt::Display,
    fs,
    path::Path,
    rc::Rc,
};

use crate::{
    ast::{Decl, Module, ReturnSpec},
    lexer::{LexError, Lexer},
    lower::lower_module,
    parser::{self, ParseError},
};

const STDR_SRC: &str = include_str!("../prelude/stdr.e");
const MATH_SRC: &str = include_str!("../prelude/math.e");

#[derive(Debug)]
pub enum LoadError {
    Lex(LexError),
    Parse(ParseError),
    Io { path: String, message: String },
    Rule { path: String, message: String },
}

impl Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Lex(e) => write!(f, "{e}"),
            LoadError::Parse(e) => write!(f, "{e}"),
            LoadError::Io { path, message } => write!(f, "{path}: {message}"),
            LoadError::Rule { path, message } => write!(f, "{path}: {message}"),
        }
    }
}

impl Error for LoadError {}

impl From<LexError> for LoadError {
    fn from(e: LexError) -> Self {
        LoadError::Lex(e)
    }
}

impl From<ParseError> for LoadError {
    fn from(e: ParseError) -> Self {
        LoadError::Parse(e)
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

/// Loads the entry file and every module it transitively imports, in discovery order.
pub fn load_program(entry_path: &Path) -> LoadResult<Vec<Module<()>>> {
    let entry_name = module_name(entry_path);
    let dir = entry_path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut seen = HashSet::new();
    seen.insert(entry_name.clone());
    let mut queue = VecDeque::new();
    queue.push_back((entry_name.clone(), entry_path.to_path_buf()));

    let mut modules = vec![];
    while let Some((name, path)) = queue.pop_front() {
        log::debug!("loading module '{name}' from {}", path.display());
        let module = load_one(&name, &path)?;

        for import in &module.imports {
            if seen.insert(import.name.clone()) {
                queue.push_back((import.name.clone(), dir.join(format!("{}.e", import.name))));
            }
        }

        validate_module_rules(&name, &path, &module, name == entry_name)?;
        modules.push(module);
    }

    Ok(modules)
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

fn load_one(name: &str, path: &Path) -> LoadResult<Module<()>> {
    let source = match name {
        "stdr" => STDR_SRC.to_string(),
        "math" => MATH_SRC.to_string(),
        _ => fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?,
    };

    let file: Rc<str> = Rc::from(format!("{name}.e"));
    let tokens = Lexer::new(file, &source).lex()?;
    let module = parser::parse(tokens, name.to_string(), path.display().to_string())?;
    Ok(lower_module(module))
}

fn validate_module_rules(
    name: &str,
    path: &Path,
    module: &Module<()>,
    is_entry_file: bool,
) -> LoadResult<()> {
    let is_stdlib = name == "stdr" || name == "math";

    if !is_stdlib && !module.imports.iter().any(|i| i.name == "stdr") {
        return Err(LoadError::Rule {
            path: path.display().to_string(),
            message: "every non-standard-library module must `bring stdr;`".into(),
        });
    }

    let entries: Vec<_> = module
        .decls
        .iter()
        .filter_map(|d| match d {
            Decl::Entry(f) => Some(f),
            _ => None,
        })
        .collect();

    if !entries.is_empty() && !is_entry_file {
        return Err(LoadError::Rule {
            path: path.display().to_string(),
            message: "only the entry file may declare `entry()`".into(),
        });
    }

    if is_entry_file {
        if entries.len() != 1 {
            return Err(LoadError::Rule {
                path: path.display().to_string(),
                message: format!(
                    "the entry file must declare exactly one `entry()`, found {}",
                    entries.len()
                ),
            });
        }
        if !matches!(entries[0].ret, ReturnSpec::Void) {
            return Err(LoadError::Rule {
                path: path.display().to_string(),
                message: "`entry()`'s return spec must be `(( -- ))`".into(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_entry_and_sibling_import() {
        let dir = std::env::temp_dir().join(format!("ergo-loader-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        write_file(&dir, "helper.e", "bring stdr;\nfun greet() (( -- )) { write(\"hi\"); }\n");
        let entry = write_file(
            &dir,
            "main.e",
            "bring stdr;\nbring helper;\nentry() (( -- )) { helper.greet(); }\n",
        );

        let program = load_program(&entry).expect("load");
        let names: Vec<_> = program.iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["main", "stdr", "helper"]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_missing_bring_stdr() {
        let dir = std::env::temp_dir().join(format!("ergo-loader-test2-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let entry = write_file(&dir, "main.e", "entry() (( -- )) {}\n");

        assert!(load_program(&entry).is_err());
        fs::remove_dir_all(&dir).ok();
    }
}
