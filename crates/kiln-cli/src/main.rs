mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::exit_code_for;
use kiln_core::{Engine, GeneratorConfig, Selection};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(
    name = "kiln",
    version,
    about = "Deterministic manifest-driven generator for idempotent bootstrap scripts"
)]
struct Cli {
    /// Path to the module manifest (TOML, or YAML with a .yaml/.yml extension).
    #[arg(long, default_value = "kiln.toml", global = true)]
    manifest: PathBuf,

    /// Directory that receives the generated artifacts.
    #[arg(long, default_value = "scripts/generated", global = true)]
    out: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    /// Helper library directory sourced by installers, relative to --out unless absolute.
    /// Pass the same value to `generate` and `check`.
    #[arg(long, global = true)]
    lib_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate the index, installers, and doctor checks from the manifest.
    Generate,
    /// Report drift between the manifest and the generated artifacts (exit 1 on drift).
    Check,
    /// Parse and resolve the manifest without writing anything.
    Validate,
    /// Print modules in install order.
    Order,
    /// Print the transitive dependencies of a module.
    Deps {
        /// Module id.
        module: String,
        /// Print modules that depend on it instead.
        #[arg(long, default_value_t = false)]
        reverse: bool,
    },
    /// Print the install plan for a selection of modules.
    Plan {
        /// Install only these modules (and their dependencies).
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
        /// Leave these modules out.
        #[arg(long, value_delimiter = ',')]
        skip: Vec<String>,
        /// Install modules carrying any of these tags (and their dependencies).
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Also include modules that are disabled by default.
        #[arg(long, default_value_t = false)]
        include_disabled: bool,
    },
    /// Write a starter manifest.
    Init {
        /// Starter template (minimal, workstation).
        #[arg(long, default_value = "minimal")]
        template: String,
        /// Overwrite an existing manifest.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("KILN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let mut config = GeneratorConfig::default();
    if let Some(lib_dir) = &cli.lib_dir {
        config.lib_dir.clone_from(lib_dir);
    }
    let engine = Engine::new(config);
    debug!(
        "manifest {}, output {}",
        cli.manifest.display(),
        cli.out.display()
    );
    let json_output = cli.json;
    let manifest = &cli.manifest;

    let result = match cli.command {
        Commands::Generate => {
            commands::generate::run(&engine, manifest, &cli.out, json_output)
        }
        Commands::Check => commands::check::run(&engine, manifest, &cli.out, json_output),
        Commands::Validate => commands::validate::run(&engine, manifest, json_output),
        Commands::Order => commands::order::run(&engine, manifest, json_output),
        Commands::Deps { module, reverse } => {
            commands::deps::run(&engine, manifest, &module, reverse, json_output)
        }
        Commands::Plan {
            only,
            skip,
            tags,
            include_disabled,
        } => commands::plan::run(
            &engine,
            manifest,
            &Selection {
                only,
                skip,
                tags,
                include_disabled,
            },
            json_output,
        ),
        Commands::Init { template, force } => {
            commands::init::run(manifest, &template, force, json_output)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}
