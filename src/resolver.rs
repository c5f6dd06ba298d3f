//! Module search path and interface loader.
//!
//! The resolver locates `.tn` and `.tnlib` files on an ordered list of
//! directories; the loader turns an `import` name into a list of
//! [`ImportedFunction`]s, triggering a bind-only sub-compilation when no
//! prebuilt interface exists on disk yet.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::binder::{Binder, ImportLoader, ImportedFunction};
use crate::ir::IrBuilder;
use crate::parser::Parser;
use crate::tnlib;

/// An ordered list of directories searched, in order, for module files.
pub struct ModulePath {
    dirs: Vec<PathBuf>,
}

impl ModulePath {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        ModulePath { dirs }
    }

    pub fn push(&mut self, dir: PathBuf) {
        self.dirs.push(dir);
    }

    /// First existing `<dir>/<name>.tnlib`, if any.
    pub fn resolve_tnlib(&self, name: &str) -> Option<PathBuf> {
        self.resolve(name, "tnlib")
    }

    /// First existing `<dir>/<name>.tn`, if any.
    pub fn resolve_tn(&self, name: &str) -> Option<PathBuf> {
        self.resolve(name, "tn")
    }

    fn resolve(&self, name: &str, ext: &str) -> Option<PathBuf> {
        for dir in &self.dirs {
            let candidate = dir.join(format!("{}.{}", name, ext));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}

/// Find the standard library directory.
///
/// Searches in order:
/// 1. `TANEC_STDLIB` environment variable
/// 2. A `stdlib` directory next to the running executable
/// 3. A `stdlib` directory one level above the executable (development
///    builds where the binary lives in `target/<profile>/`)
///
/// Returns `None` if none of these exist; callers fall back to a search
/// path containing only the directories they already have.
pub fn find_stdlib() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("TANEC_STDLIB") {
        let path = PathBuf::from(path);
        if path.is_dir() {
            return Some(path);
        }
        tracing::warn!(path = %path.display(), "TANEC_STDLIB is set but is not a directory");
        return None;
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let candidate = exe_dir.join("stdlib");
            if candidate.is_dir() {
                return Some(candidate);
            }
            if let Some(parent) = exe_dir.parent() {
                let candidate = parent.join("stdlib");
                if candidate.is_dir() {
                    return Some(candidate);
                }
            }
        }
    }

    None
}

/// Loads `.tnlib` interfaces for `import` statements, compiling missing
/// ones in bind-only mode and writing the resulting interface file next
/// to its `.tn` source.
///
/// The `loaded` set is shared for the lifetime of one top-level
/// compilation. A name already in the set returns an empty symbol list
/// instead of re-entering sub-compilation — this is how import cycles
/// resolve: the importer sees itself as already loaded and the cyclic
/// half of the pair silently exposes nothing.
pub struct InterfaceLoader<'p> {
    path: &'p ModulePath,
    loaded: HashSet<String>,
}

impl<'p> InterfaceLoader<'p> {
    pub fn new(path: &'p ModulePath) -> Self {
        InterfaceLoader {
            path,
            loaded: HashSet::new(),
        }
    }

    fn compile_bind_only(&mut self, module_name: &str, tn_path: &Path) -> Result<PathBuf, String> {
        let source = std::fs::read_to_string(tn_path)
            .map_err(|e| format!("cannot read {}: {}", tn_path.display(), e))?;

        let (ast, root) = Parser::new(&source)?.parse()?;
        tracing::debug!(module = module_name, "bind-only: parsed");

        let bound = Binder::new(&ast).bind_module(root, self)?;
        tracing::debug!(module = module_name, "bind-only: bound");

        let module = IrBuilder::new(&ast, bound).lower_module(root)?;
        tracing::debug!(
            module = module_name,
            functions = module.public_functions.len(),
            "bind-only: lowered, skipping register allocation and emission"
        );

        let text = tnlib::render(module_name, &module.public_functions);
        let out_path = tn_path.with_extension("tnlib");
        std::fs::write(&out_path, text)
            .map_err(|e| format!("cannot write {}: {}", out_path.display(), e))?;
        Ok(out_path)
    }
}

impl ImportLoader for InterfaceLoader<'_> {
    fn load(&mut self, module_name: &str) -> Result<Vec<ImportedFunction>, String> {
        if self.loaded.contains(module_name) {
            tracing::warn!(
                module = module_name,
                "re-entrant import during its own compilation; exposing no symbols"
            );
            return Ok(Vec::new());
        }
        self.loaded.insert(module_name.to_string());

        let tnlib_path = if let Some(path) = self.path.resolve_tnlib(module_name) {
            path
        } else if let Some(tn_path) = self.path.resolve_tn(module_name) {
            self.compile_bind_only(module_name, &tn_path)?
        } else {
            return Err(format!(
                "cannot find module '{}' (.tnlib or .tn) on the search path",
                module_name
            ));
        };

        let text = std::fs::read_to_string(&tnlib_path)
            .map_err(|e| format!("cannot read {}: {}", tnlib_path.display(), e))?;
        let interface = tnlib::parse(&text)?;
        Ok(interface.functions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn resolves_tnlib_before_tn() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "m.tn", "fn f() { return 1; }");
        write_file(dir.path(), "m.tnlib", "tnlib 1\nmodule m\nfn f();\nend\n");
        let mp = ModulePath::new(vec![dir.path().to_path_buf()]);
        let found = mp.resolve_tnlib("m").unwrap();
        assert_eq!(found, dir.path().join("m.tnlib"));
    }

    #[test]
    fn missing_module_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mp = ModulePath::new(vec![dir.path().to_path_buf()]);
        let mut loader = InterfaceLoader::new(&mp);
        assert!(loader.load("nope").is_err());
    }

    #[test]
    fn loads_prebuilt_tnlib_without_touching_filesystem_source() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "util.tnlib",
            "tnlib 1\nmodule util\nfn add(a, b);\nend\n",
        );
        let mp = ModulePath::new(vec![dir.path().to_path_buf()]);
        let mut loader = InterfaceLoader::new(&mp);
        let funcs = loader.load("util").unwrap();
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "add");
        assert_eq!(funcs[0].params, vec!["a", "b"]);
    }

    #[test]
    fn bind_only_compiles_missing_tnlib_from_tn_source() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "shapes.tn",
            "pub fn area(w, h) { return w * h; } fn helper() { return 0; }",
        );
        let mp = ModulePath::new(vec![dir.path().to_path_buf()]);
        let mut loader = InterfaceLoader::new(&mp);
        let funcs = loader.load("shapes").unwrap();
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "area");
        assert!(dir.path().join("shapes.tnlib").is_file());
    }

    #[test]
    fn reentrant_load_of_the_same_module_returns_no_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let mp = ModulePath::new(vec![dir.path().to_path_buf()]);
        let mut loader = InterfaceLoader::new(&mp);
        loader.loaded.insert("self".to_string());
        let funcs = loader.load("self").unwrap();
        assert!(funcs.is_empty());
    }
}
