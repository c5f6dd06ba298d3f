//! Compiler configuration.
//!
//! `CompilerConfig` is the programmatic entry point's option bag: the
//! output path, extra module search directories, and whether to stop
//! after binding instead of emitting assembly.
//!
//! # Example
//!
//! ```rust,ignore
//! use tanec::CompilerConfig;
//!
//! let config = CompilerConfig::new()
//!     .with_output("out.s")
//!     .with_search_dir("lib")
//!     .with_search_dir("vendor");
//!
//! tanec::compile_file_with_config(source_path, &config)?;
//! ```

use std::path::PathBuf;

/// Configuration for one compilation.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Where generated assembly is written. Ignored in bind-only mode.
    pub output_path: PathBuf,

    /// Extra directories appended to the module search path, after the
    /// current working directory and before the standard library.
    pub search_dirs: Vec<PathBuf>,

    /// Stop after binding and IR lowering; write only the `.tnlib` for
    /// the compiled module, emitting no assembly.
    pub bind_only: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            output_path: PathBuf::from("out.s"),
            search_dirs: Vec::new(),
            bind_only: false,
        }
    }
}

impl CompilerConfig {
    /// Create a new configuration with default output path `out.s`.
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    /// Set the output assembly path (builder pattern).
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Append one directory to the module search path.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    /// Append multiple directories to the module search path.
    pub fn with_search_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.search_dirs.extend(dirs);
        self
    }

    /// Stop after binding; produce only a `.tnlib`.
    pub fn with_bind_only(mut self, bind_only: bool) -> Self {
        self.bind_only = bind_only;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_path_is_out_s() {
        let config = CompilerConfig::new();
        assert_eq!(config.output_path, PathBuf::from("out.s"));
        assert!(!config.bind_only);
    }

    #[test]
    fn builder_accumulates_search_dirs_in_order() {
        let config = CompilerConfig::new()
            .with_search_dir("lib")
            .with_search_dir("vendor");
        assert_eq!(
            config.search_dirs,
            vec![PathBuf::from("lib"), PathBuf::from("vendor")]
        );
    }

    #[test]
    fn bind_only_and_output_are_independent() {
        let config = CompilerConfig::new()
            .with_output("module.s")
            .with_bind_only(true);
        assert_eq!(config.output_path, PathBuf::from("module.s"));
        assert!(config.bind_only);
    }
}
