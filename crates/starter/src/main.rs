use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use starter::catalog::format_core_signature;
use starter::parser::{BinaryKind, ParsedBinary};
use starter::{check, expected_exports, inspect, CheckOptions, Example, PackageName, Severity};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// starter — inspect and check the export surface of starter WebAssembly components.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the export names and signatures an example is generated with
    Symbols {
        #[arg(value_enum)]
        example: Example,
        #[command(flatten)]
        naming: NamingArgs,
    },
    /// List the exports of a core module or component
    Exports {
        /// Input WebAssembly binary (.wasm)
        input: PathBuf,
    },
    /// Verify that a binary exports everything an example must export
    Check {
        /// Input WebAssembly binary (.wasm)
        input: PathBuf,
        #[arg(value_enum)]
        example: Example,
        #[command(flatten)]
        naming: NamingArgs,
        /// Fail on interface exports the example does not define
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Args, Debug)]
struct NamingArgs {
    /// Package name as `namespace:name` (defaults to the example's own)
    #[arg(long, short)]
    package: Option<PackageName>,

    /// Exported interface name
    #[arg(long, short)]
    interface: Option<String>,
}

impl NamingArgs {
    fn options(&self, example: Example) -> Result<CheckOptions> {
        let mut options = CheckOptions::new(example);
        if let Some(package) = &self.package {
            options = options.with_package(package.clone());
        }
        if let Some(interface) = &self.interface {
            options = options.with_interface(interface)?;
        }
        Ok(options)
    }
}

fn read_wasm(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_symbols(options: &CheckOptions) {
    println!(
        "{} ({})",
        options.example,
        options.package.interface(&options.interface)
    );
    for export in expected_exports(options) {
        println!("  {}", export.function.wit_signature());
        println!("    c symbol:    {}", export.c_symbol);
        println!("    core export: {}", export.canonical);
        println!("    core type:   {}", export.function.core_signature());
        if let Some(post_return) = &export.post_return {
            println!("    post-return: {post_return}");
        }
    }
}

fn print_exports(binary: &ParsedBinary) {
    let kind = match binary.kind {
        BinaryKind::Module => "core module",
        BinaryKind::Component => "component",
    };
    println!("{kind}");
    for export in &binary.component_exports {
        println!("  {} {}", export.kind, export.name);
        for function in export.functions.iter().flatten() {
            match &function.sig {
                Some(sig) => println!("    {}: {sig}", function.name),
                None => println!("    {}: ?", function.name),
            }
        }
    }
    for (index, module) in binary.modules.iter().enumerate() {
        println!("  core module {index}");
        for export in module.exported_functions() {
            let signature = module
                .func_type(export.index)
                .map(|ty| format_core_signature(ty.params(), ty.results()))
                .unwrap_or_else(|| "?".to_string());
            match module.symbol(export.index) {
                Some(symbol) => println!("    {} {signature} [{symbol}]", export.name),
                None => println!("    {} {signature}", export.name),
            }
        }
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Symbols { example, naming } => {
            print_symbols(&naming.options(example)?);
        }
        Command::Exports { input } => {
            let binary = inspect(&read_wasm(&input)?)?;
            print_exports(&binary);
        }
        Command::Check {
            input,
            example,
            naming,
            strict,
        } => {
            let options = naming.options(example)?.strict(strict);
            tracing::info!(
                input = %input.display(),
                example = %example,
                package = %options.package,
                "checking export surface"
            );
            let report = check(&read_wasm(&input)?, &options).context("check failed")?;

            for export in &report.matched {
                println!("ok      {export}");
            }
            for finding in &report.findings {
                match finding.severity {
                    Severity::Error => tracing::error!("{}", finding.message),
                    Severity::Warning => tracing::warn!("{}", finding.message),
                    Severity::Info => tracing::info!("{}", finding.message),
                }
            }

            if !report.is_ok() {
                tracing::error!(
                    errors = report.errors().count(),
                    "{} does not export the {example} surface",
                    input.display()
                );
                return Ok(ExitCode::FAILURE);
            }
            tracing::info!("{} exports the {example} surface", input.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
