use clap::Parser;
use eyre::{Context, Result, eyre};

use sessionstore::Store;
use sessionstore::cli::{Cli, Command};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut store = Store::open(&cli.store).context("Failed to open store")?;

    match cli.command {
        Command::Collections => {
            for name in store.collection_names() {
                println!("{}", name);
            }
        }
        Command::List { collection } => {
            for record in store.list_raw(&collection) {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        Command::Get { collection, id } => {
            let record = store
                .get_raw(&collection, &id)
                .ok_or_else(|| eyre!("Record not found: {}/{}", collection, id))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Stats => {
            let stats = store.stats();
            for (name, count) in &stats.collections {
                println!("{:<24} {}", name, count);
            }
            println!("{:<24} {}", "total", stats.total_records);
        }
        Command::Compact => {
            store.compact().context("Failed to compact store")?;
            println!("Compacted {} collections", store.collection_names().len());
        }
    }

    Ok(())
}
