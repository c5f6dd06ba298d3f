//! Tane compiler library.
//!
//! Compiles a small imperative language to x86-64 GNU-assembler text,
//! in six phases: tokenize, parse, bind, lower to a virtual-register IR,
//! allocate registers, emit assembly.

pub mod ast;
pub mod binder;
pub mod config;
pub mod emitter;
pub mod ir;
pub mod parser;
pub mod regalloc;
pub mod resolver;
pub mod span;
pub mod symbol;
pub mod tnlib;
pub mod token;

pub use ast::Ast;
pub use binder::Binder;
pub use config::CompilerConfig;
pub use emitter::Emitter;
pub use ir::IrBuilder;
pub use parser::Parser;
pub use resolver::{InterfaceLoader, ModulePath};

use std::fs;
use std::path::Path;

/// Build the default module search path: the current working directory,
/// any extra directories from `config`, then the standard library
/// directory if one can be found.
fn build_module_path(current_dir: &Path, config: &CompilerConfig) -> ModulePath {
    let mut dirs = vec![current_dir.to_path_buf()];
    dirs.extend(config.search_dirs.iter().cloned());
    if let Some(stdlib) = resolver::find_stdlib() {
        dirs.push(stdlib);
    }
    ModulePath::new(dirs)
}

/// Compile source text already in memory, under `module_name`, writing
/// assembly to `config.output_path` unless `config.bind_only` is set (in
/// which case only a `.tnlib` is written to `base_dir`, and no assembly
/// is produced).
pub fn compile_source(
    source: &str,
    module_name: &str,
    base_dir: &Path,
    config: &CompilerConfig,
) -> Result<(), String> {
    tracing::debug!(module = module_name, bytes = source.len(), "compiling");

    let (ast, root) = Parser::new(source)?.parse()?;
    tracing::debug!(nodes = ast.len(), "parsed");

    let module_path = build_module_path(base_dir, config);
    let mut loader = InterfaceLoader::new(&module_path);
    let bound = Binder::new(&ast).bind_module(root, &mut loader)?;
    tracing::debug!(functions = bound.func_sem.len(), "bound");

    let module = IrBuilder::new(&ast, bound).lower_module(root)?;
    tracing::debug!(
        functions = module.functions.len(),
        strings = module.strings.len(),
        "lowered"
    );

    if config.bind_only {
        let text = tnlib::render(module_name, &module.public_functions);
        let out_path = base_dir.join(format!("{}.tnlib", module_name));
        fs::write(&out_path, text)
            .map_err(|e| format!("cannot write {}: {}", out_path.display(), e))?;
        tracing::debug!(path = %out_path.display(), "wrote tnlib, skipping assembly");
        return Ok(());
    }

    let text = Emitter::new(&module).emit()?;
    tracing::debug!(function_count = module.functions.len(), "emitted");

    fs::write(&config.output_path, text).map_err(|e| {
        tracing::error!(error = %e, path = %config.output_path.display(), "failed to write assembly");
        format!("cannot write {}: {}", config.output_path.display(), e)
    })?;
    tracing::debug!(path = %config.output_path.display(), "wrote assembly");

    let tnlib_text = tnlib::render(module_name, &module.public_functions);
    let tnlib_path = config.output_path.with_extension("tnlib");
    fs::write(&tnlib_path, tnlib_text)
        .map_err(|e| format!("cannot write {}: {}", tnlib_path.display(), e))?;

    Ok(())
}

/// Read `source_path`, compile it, and write assembly (or a `.tnlib` in
/// bind-only mode) per `config`.
pub fn compile_file(source_path: &Path, config: &CompilerConfig) -> Result<(), String> {
    let source = fs::read_to_string(source_path)
        .map_err(|e| format!("cannot read {}: {}", source_path.display(), e))?;

    let module_name = source_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| format!("cannot derive a module name from {}", source_path.display()))?;

    let base_dir = source_path.parent().unwrap_or_else(|| Path::new("."));
    compile_source(&source, module_name, base_dir, config)
}
