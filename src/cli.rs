//! CLI for resolving form field rules from a JSON config

use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use formrule::{parse_config, RuleManager, Store};

#[derive(Parser)]
#[command(name = "formrule")]
#[command(about = "Resolve form field rules against a sequence of changes")]
#[command(version)]
pub struct Cli {
    /// Path to the field config file (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Path to a JSON object with initial field values
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Change events to apply in order, as key=value pairs
    pub changes: Vec<String>,

    /// Skip the initial master pass
    #[arg(long)]
    pub no_master: bool,

    /// Dispatch empty values instead of suppressing them
    #[arg(long)]
    pub empty: bool,

    /// Print each committed (key, value, display) pair to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn run(cli: Cli) -> Result<()> {
    let raw = fs::read_to_string(&cli.config)
        .with_context(|| format!("failed to read config file: {}", cli.config.display()))?;
    let json: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file: {}", cli.config.display()))?;
    let fields = parse_config(&json).context("invalid field config")?;

    let mut store = Store::new();
    if let Some(path) = &cli.data {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read data file: {}", path.display()))?;
        let values: std::collections::HashMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse data file: {}", path.display()))?;
        for (key, value) in values {
            store.set(key, value);
        }
    }
    let store = store.shared();

    let mut manager = RuleManager::new(Rc::clone(&store));
    if cli.verbose {
        manager = manager.with_subscriber(|event| {
            eprintln!(
                "commit {}: value={:?} display={:?}",
                event.key, event.value, event.display
            );
        });
    }
    let manager = manager.with_fields(fields);

    if !cli.no_master {
        manager.master();
    }

    for change in &cli.changes {
        let (key, value) = change
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid change '{}': expected key=value", change))?;
        if cli.empty {
            manager.use_value_allow_empty(key, value);
        } else {
            manager.use_value(key, value);
        }
    }

    let output =
        serde_json::to_string_pretty(&*store.borrow()).context("failed to serialize store")?;
    println!("{}", output);
    Ok(())
}
