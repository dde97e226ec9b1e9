//! Ledger maintenance for spellgate. Lists the addresses that have cast
//! the spell and erases individual records so an address can cast again.
use clap::{Parser, Subcommand};

use spellgate::{config::Config, storage::Ledger};

#[derive(Parser, Debug)]
#[command(author, version, about = "Spellgate ledger maintenance")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every address that has cast the spell.
    List,
    /// Erase one address record so the spell can be cast from it again.
    Erase { address: String },
}

fn main() {
    let args = Args::parse();
    let config = Config::load();

    let ledger = match Ledger::open(&config.database_path) {
        Ok(ledger) => ledger,
        Err(e) => {
            eprintln!("Failed to open ledger at {}: {e}", config.database_path);
            std::process::exit(1);
        }
    };

    let result = match args.command {
        Command::List => list_casts(&ledger),
        Command::Erase { address } => erase_cast(&ledger, &address),
    };

    if let Err(e) = result {
        eprintln!("An error occurred: {e}");
        std::process::exit(1);
    }
}

fn list_casts(ledger: &Ledger) -> Result<(), spellgate::storage::LedgerError> {
    let casts = ledger.list_casts()?;

    if casts.is_empty() {
        println!("No addresses found in the spell ledger.");
        return Ok(());
    }

    println!("{:<20} {:<40} {:<30}", "Address", "Identity", "Cast Time");
    println!("{}", "-".repeat(90));
    for (address, record) in casts {
        println!(
            "{:<20} {:<40} {:<30}",
            address,
            record.identity,
            record.cast_time.to_string()
        );
    }

    Ok(())
}

fn erase_cast(ledger: &Ledger, address: &str) -> Result<(), spellgate::storage::LedgerError> {
    if ledger.erase_cast(address)? {
        println!("Successfully erased address: {address}");
    } else {
        println!("Address not found: {address}");
    }

    Ok(())
}
