//! sqlclause - compile JSON predicate definitions into SQL

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use log::debug;
use sqlclause::clause::PredicateExpression;
use sqlclause::database::splice_where;
use std::io::Read;
use std::path::PathBuf;

/// Compile a JSON predicate definition into a SQL fragment
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Definition file; reads stdin when omitted or "-"
    input: Option<PathBuf>,

    /// Statement template with a {where} placeholder for the fragment
    #[arg(short, long)]
    template: Option<String>,

    /// Print the diagnostic record as JSON instead of SQL
    #[arg(long)]
    diagnostic: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let definition = read_definition(args.input.as_ref())?;
    let predicate =
        PredicateExpression::from_json(&definition).context("Failed to load predicate definition")?;

    if args.diagnostic {
        let record = predicate
            .to_json()
            .context("Failed to compile predicate")?;
        println!("{}", record);
        return Ok(());
    }

    let fragment = predicate.compile().context("Failed to compile predicate")?;
    debug!("Compiled fragment: {}", fragment);

    let output = match &args.template {
        Some(template) => splice_where(template, &fragment).context("Failed to apply template")?,
        None => fragment,
    };
    println!("{}", output);

    Ok(())
}

fn read_definition(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read definition from stdin")?;
            Ok(buf)
        }
    }
}
