//! CLI binary for assembling and validating routeweave context definitions.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use routeweave_core::{
    load_context, render_route, validate, AssembledContext, ContextDefinition, RouteAssembler,
    Severity, WeaveOptions,
};

#[derive(Parser)]
#[command(name = "routeweave", version, about = "Assemble message routes with woven intercepts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble every route of a context file and print the woven trees
    Weave {
        /// Path to the context .json file
        definition: PathBuf,

        /// Print the assembled routes as JSON instead of a tree
        #[arg(long)]
        json: bool,

        /// Drop the wrapped outputs of intercepts without a proceed marker instead of failing
        #[arg(long)]
        allow_missing_proceed: bool,
    },

    /// Validate a context file
    Validate {
        /// Path to the context .json file
        definition: PathBuf,
    },

    /// Show information about a context file
    Info {
        /// Path to the context .json file
        definition: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Weave {
            definition,
            json,
            allow_missing_proceed,
        } => {
            cmd_weave(&definition, json, allow_missing_proceed)?;
        }
        Commands::Validate { definition } => {
            cmd_validate(&definition)?;
        }
        Commands::Info { definition } => {
            cmd_info(&definition)?;
        }
    }

    Ok(())
}

fn cmd_weave(path: &Path, json: bool, allow_missing_proceed: bool) -> anyhow::Result<()> {
    let mut ctx = load_context(path)?;
    if allow_missing_proceed {
        ctx.options = WeaveOptions::lenient();
    }

    let assembled = RouteAssembler::new().assemble(ctx).map_err(|err| {
        if let Some(route) = err.route() {
            tracing::error!(route, "route could not be assembled; no route was activated");
        }
        err
    })?;
    tracing::debug!(routes = assembled.routes.len(), "assembly complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&assembled.routes)?);
        return Ok(());
    }

    print_assembled(&assembled);
    Ok(())
}

fn print_assembled(assembled: &AssembledContext) {
    println!("Context: {}", assembled.id);
    if let Some(ref handler) = assembled.error_handler {
        println!("Error handler: {}", handler);
    }
    for route in &assembled.routes {
        println!();
        print!("{}", render_route(route));
        if let Some(report) = assembled.report(route.id()) {
            if let Some(block) = report.blocks.current() {
                println!("  (insertion point {})", block);
            }
            if report.dropped() > 0 {
                println!("  (WARNING: {} node(s) dropped)", report.dropped());
            }
        }
    }
}

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let ctx = load_context(path)?;
    let diagnostics = validate(&ctx);

    if diagnostics.is_empty() {
        println!("Context is valid");
        return Ok(());
    }

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        println!("[{}] {}: {}", severity, diag.rule, diag.message);
        if let Some(ref fix) = diag.fix {
            println!("        fix: {}", fix);
        }
    }

    if has_error {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_info(path: &Path) -> anyhow::Result<()> {
    let ctx: ContextDefinition = load_context(path)?;

    println!("Context: {}", ctx.id);
    println!("Beans: {}", ctx.beans.len());
    println!("Exception clauses: {}", ctx.on_exception.len());
    println!("Intercepts: {}", ctx.intercepts.len());
    println!("Routes: {}", ctx.routes.len());
    if let Some(trace) = ctx.trace {
        println!("Trace: {}", trace);
    }
    if let Some(delay) = ctx.delay {
        println!("Delay: {}ms", delay);
    }

    if !ctx.intercepts.is_empty() {
        println!("\nIntercepts (innermost first):");
        for intercept in &ctx.intercepts {
            let proceeds = routeweave_core::count_proceeds(&intercept.outputs);
            println!(
                "  {} outputs={} proceed_markers={} requires={}",
                intercept.id,
                intercept.outputs.len(),
                proceeds,
                intercept.requires.len()
            );
        }
    }

    println!("\nRoutes:");
    for (pos, route) in ctx.routes.iter().enumerate() {
        let id = if route.id().is_empty() {
            format!("(route{})", pos + 1)
        } else {
            route.id().to_string()
        };
        println!("  {} outputs={}", id, route.outputs().len());
    }

    Ok(())
}
