//! Tane compiler CLI.
//!
//! Compiles a `.tn` source file, or a literal string passed with `-c`,
//! to x86-64 GNU-assembler text.

use clap::Parser as ClapParser;
use std::path::PathBuf;
use std::process;

use tanec::CompilerConfig;

#[derive(ClapParser)]
#[command(name = "tanec")]
#[command(about = "Tane compiler - compile .tn programs to x86-64 assembly", long_about = None)]
struct Cli {
    /// Input .tn source file. Mutually exclusive with -c.
    input: Option<PathBuf>,

    /// Compile this literal source string instead of a file.
    #[arg(short = 'c', long = "code")]
    code: Option<String>,

    /// Output assembly path.
    #[arg(short = 'o', long = "output", default_value = "out.s")]
    output: PathBuf,

    /// Append a directory to the module search path. May repeat.
    #[arg(short = 'i', long = "include", value_name = "DIR")]
    search_dirs: Vec<PathBuf>,

    /// Raise the log level from `warn` to `debug`.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = CompilerConfig::new()
        .with_output(cli.output)
        .with_search_dirs(cli.search_dirs);

    let result = match (&cli.input, &cli.code) {
        (Some(_), Some(_)) => Err("cannot pass both an input file and -c".to_string()),
        (None, None) => Err("missing input: pass a source file or -c <code>".to_string()),
        (Some(path), None) => tanec::compile_file(path, &config),
        (None, Some(code)) => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            tanec::compile_source(code, "main", &cwd, &config)
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "compilation failed");
        eprintln!("tanec: {}", e);
        process::exit(1);
    }
}
