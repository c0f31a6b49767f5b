mod cli;
mod commands;

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use modhost_modules::{ModuleRecord, Orchestrator, OrchestratorConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use commands::{COMMAND_HINTS, Command, parse_command};

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    info!(
        modules_dir = %config.modules_dir.display(),
        root_dir = %config.root_dir.display(),
        "starting module host"
    );

    let mut orchestrator = Orchestrator::from_config(&config).context("build orchestrator")?;
    let report = orchestrator.load_all(cli.no_staging);
    for (name, error) in &report.failed {
        warn!(module = %name, "initial load failed: {error}");
    }

    let loop_result = run_command_loop(&mut orchestrator, &config);
    let unloaded = orchestrator.unload_all();
    for (name, error) in &unloaded.failed {
        warn!(module = %name, "unload failed: {error}");
    }
    info!(unloaded = unloaded.unloaded.len(), "module host stopped");
    loop_result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn resolve_config(cli: &Cli) -> Result<OrchestratorConfig> {
    let mut config = match cli.config.as_ref() {
        Some(path) => OrchestratorConfig::from_json_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => OrchestratorConfig::default(),
    };
    if let Some(modules_dir) = cli.modules_dir.as_ref() {
        config.modules_dir = modules_dir.clone();
    }
    if let Some(root_dir) = cli.root_dir.as_ref() {
        config.root_dir = root_dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run_command_loop(orchestrator: &mut Orchestrator, config: &OrchestratorConfig) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print_modules(&mut stdout, orchestrator.modules())?;

    for line in stdin.lock().lines() {
        let line = line.context("read command")?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                writeln!(stdout, "{message}")?;
                continue;
            },
        };
        match command {
            Command::Quit => break,
            Command::Help => {
                for hint in COMMAND_HINTS {
                    writeln!(stdout, "  {hint}")?;
                }
            },
            Command::List => print_modules(&mut stdout, orchestrator.modules())?,
            Command::Rescan => {
                let added = orchestrator.register_discovered(&config.modules_dir)?;
                writeln!(stdout, "registered {added} new module(s)")?;
            },
            Command::Load { name } => {
                report(&mut stdout, &name, "loaded", orchestrator.load_module(&name, false))?
            },
            Command::Unload { name } => {
                report(&mut stdout, &name, "unloaded", orchestrator.unload_module(&name))?
            },
            Command::Reload { name } => {
                report(&mut stdout, &name, "reloaded", orchestrator.reload_module(&name))?
            },
            Command::Update { name } => match orchestrator.update_module(&name) {
                Ok(true) => writeln!(stdout, "{name}: updated")?,
                Ok(false) => writeln!(stdout, "{name}: no staged update")?,
                Err(e) => writeln!(stdout, "{name}: {e}")?,
            },
        }
        stdout.flush()?;
    }
    Ok(())
}

fn report(
    out: &mut impl Write,
    name: &str,
    verb: &str,
    outcome: modhost_modules::Result<()>,
) -> io::Result<()> {
    match outcome {
        Ok(()) => writeln!(out, "{name}: {verb}"),
        Err(e) => writeln!(out, "{name}: {e}"),
    }
}

fn print_modules(out: &mut impl Write, modules: &[ModuleRecord]) -> io::Result<()> {
    if modules.is_empty() {
        return writeln!(out, "no modules registered");
    }
    for record in modules {
        let staged = if record.is_update_needed() {
            " (update staged)"
        } else {
            ""
        };
        writeln!(
            out,
            "{:<24} {:<12} {:<10} {}{staged}",
            record.name(),
            format!("{:?}", record.state()),
            record.version().to_string(),
            record.display_name(),
        )?;
    }
    Ok(())
}
