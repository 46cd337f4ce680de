use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

/// BlockScript compiler and virtual machine.
///
/// BlockScript is a small statically typed language for embedding in host
/// applications. This CLI compiles scripts, runs functions and shows the
/// generated code.
///
/// EXAMPLES:
///     blockscript run light.bs                 Call main()
///     blockscript run light.bs -f shade        Call shade()
///     blockscript check light.bs --json        Report diagnostics as JSON
///     blockscript disasm light.bs              Print the assembly listing
///
/// ENVIRONMENT VARIABLES:
///     BLOCKSCRIPT_JSON              Set to 'true' for JSON diagnostics
///     BLOCKSCRIPT_MAX_RAM_BYTES     Override vm.max_ram_bytes
///     BLOCKSCRIPT_MAX_STACK_LEVELS  Override vm.max_stack_levels
///     BLOCKSCRIPT_MAX_STEPS         Override vm.max_steps
///     RUST_LOG                      Log filter (default: warn)
#[derive(Parser)]
#[command(name = "blockscript")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a script and call one of its functions
    ///
    /// The function must take no arguments. Its result, if any, is printed
    /// to stdout.
    ///
    /// EXAMPLES:
    ///     blockscript run main.bs
    ///     blockscript run main.bs --function test --config ci.toml
    #[command(visible_alias = "r")]
    Run {
        /// Path to the BlockScript source file
        file: PathBuf,
        /// Function to call
        #[arg(long, short = 'f', default_value = "main")]
        function: String,
        /// Configuration file (default: nearest blockscript.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Compile a script and report diagnostics without running it
    #[command(visible_alias = "c")]
    Check {
        /// Path to the BlockScript source file
        file: PathBuf,
        /// Output diagnostics in JSON format
        #[arg(long, env = "BLOCKSCRIPT_JSON")]
        json: bool,
    },

    /// Print the compiled assembly of a script
    Disasm {
        /// Path to the BlockScript source file
        file: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            function,
            config,
        } => commands::run::run(&file, &function, config.as_deref()),
        Commands::Check { file, json } => commands::check::run(&file, json),
        Commands::Disasm { file } => commands::disasm::run(&file),
    }
}
