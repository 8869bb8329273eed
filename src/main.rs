use anyhow::{bail, Context, Result};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

use spend_ledger::{Config, ConsoleResolver, Ledger, TimeUnit, VERSION};

const HELP: &str = "\
Commands:
  pc <start> <end>               spending share per category
  hd <category> <start> <end>    daily history ('*' for every category)
  hw <category> <start> <end>    weekly history
  hm <category> <start> <end>    monthly history
  save [path]                    snapshot the database to a file
  exit                           quit";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let config = match args.get(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .apply_env();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.rust_log))
        .init();

    println!("💰 Spend Ledger v{}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Loading {} ...", config.history_path.display());
    let mut ledger = Ledger::from_config(&config)?;

    // The resolver holds the stdin lock; release it before the prompt loop
    let report = {
        let mut resolver = ConsoleResolver::stdio();
        ledger.classify(&mut resolver)?
    };
    println!(
        "✓ {} merchants known, {} newly classified, {} unresolved",
        report.known,
        report.resolved.len(),
        report.unresolved.len()
    );
    for merchant in &report.unresolved {
        println!("⚠️  {} has no category and is left out of reports", merchant);
    }

    println!("\n{}", HELP);
    run_prompt(&ledger, &config)
}

fn run_prompt(ledger: &Ledger, config: &Config) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line.context("Failed to read command")?,
            None => break,
        };

        match run_command(ledger, config, &line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => eprintln!("❌ {:#}", err),
        }
    }

    println!("👋 Bye");
    Ok(())
}

/// Returns `false` when the prompt should stop
fn run_command(ledger: &Ledger, config: &Config, line: &str) -> Result<bool> {
    let words: Vec<&str> = line.split_whitespace().collect();

    match words.as_slice() {
        [] => {}
        ["exit"] | ["quit"] => return Ok(false),
        ["help"] => println!("{}", HELP),
        ["pc", start, end] => print_category_percentage(ledger, start, end)?,
        [verb @ ("hd" | "hw" | "hm"), category, start, end] => {
            let unit = match *verb {
                "hd" => TimeUnit::Day,
                "hw" => TimeUnit::Week,
                _ => TimeUnit::Month,
            };
            print_history(ledger, category, start, end, unit)?;
        }
        ["save"] => match &config.snapshot_path {
            Some(path) => save_snapshot(ledger, path)?,
            None => bail!("No snapshot path configured, use: save <path>"),
        },
        ["save", path] => save_snapshot(ledger, Path::new(path))?,
        _ => bail!("Unrecognized command: {}", line.trim()),
    }

    Ok(true)
}

fn print_category_percentage(ledger: &Ledger, start: &str, end: &str) -> Result<()> {
    let shares = ledger.percentage_by_category(start, end)?;

    println!("{:<20}{:>12}{:>14}", "Category", "Percentage", "Amount");
    println!("{}", "-".repeat(46));
    for share in &shares {
        println!(
            "{:<20}{:>11.2}%{:>14.2}",
            share.category, share.percentage, share.amount
        );
    }

    Ok(())
}

fn print_history(ledger: &Ledger, category: &str, start: &str, end: &str, unit: TimeUnit) -> Result<()> {
    let series = ledger.history(category, start, end, unit)?;
    let date_format = &ledger.options().date_format;

    for (name, buckets) in &series {
        println!("\n📊 {} by {}", name, unit);
        for bucket in buckets {
            println!("  {}  {:>12.2}", bucket.date.format(date_format), bucket.amount);
        }
    }

    Ok(())
}

fn save_snapshot(ledger: &Ledger, path: &Path) -> Result<()> {
    ledger.snapshot_to(path)?;
    println!("💾 Snapshot written to {}", path.display());
    Ok(())
}
