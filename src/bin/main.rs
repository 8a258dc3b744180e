// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::{Parser, Subcommand};
use coffee_ledger::{
    BillId, BillStore, BillSummary, Catalog, Directory, ItemLine, LedgerError, UserLedger,
};
use csv::Writer;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Coffee Ledger - Track coffee consumption and bills per person
///
/// Bills live as one file per billing period under the data root. Listings
/// are written to stdout as CSV.
#[derive(Parser, Debug)]
#[command(name = "coffee-ledger")]
#[command(about = "Keeps per-person coffee bills", long_about = None)]
struct Args {
    /// Directory holding the bill files
    #[arg(long, env = "COFFEE_DATA_ROOT", default_value = "data/coffee")]
    data_root: PathBuf,

    /// CSV file with the product catalog (`name,price`)
    ///
    /// Without it the built-in menu is used.
    #[arg(long, env = "COFFEE_CATALOG", value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// CSV file listing the users (`username,payer_id`)
    ///
    /// Without it any valid username is accepted.
    #[arg(long, env = "COFFEE_USERS", value_name = "FILE")]
    users: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the users of the directory
    Users,
    /// List the bills of a user
    Bills { user: String },
    /// List the items of a bill, newest first (default: current bill)
    Items { user: String, bill: Option<String> },
    /// Book a product on the user's current bill
    Add { user: String, product: String },
    /// Exclude the item at a listing position from the bill's sum
    Delete {
        user: String,
        bill: String,
        position: usize,
    },
    /// Count the item at a listing position again
    Restore {
        user: String,
        bill: String,
        position: usize,
    },
    /// Record an externally settled payment for the current bill
    Pay { user: String, transaction_id: String },
}

fn main() {
    setup_tracing();
    let args = Args::parse();

    let stdout = std::io::stdout();
    if let Err(e) = run(args, stdout.lock()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Logs go to stderr so stdout stays clean CSV; `RUST_LOG` overrides the
/// default `warn` level.
fn setup_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// CLI failures: ledger errors or broken output.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("no user directory configured (use --users)")]
    NoDirectory,

    #[error("writing output failed: {0}")]
    Output(#[from] csv::Error),
}

/// Loaded configuration shared by all commands.
struct Context {
    store: BillStore,
    catalog: Catalog,
    directory: Option<Directory>,
}

impl Context {
    fn load(args: &Args) -> Result<Self, LedgerError> {
        let catalog = match &args.catalog {
            Some(path) => Catalog::from_path(path)?,
            None => Catalog::standard(),
        };
        let directory = args
            .users
            .as_deref()
            .map(Directory::from_path)
            .transpose()?;
        let store = BillStore::open(&args.data_root)?;
        Ok(Self {
            store,
            catalog,
            directory,
        })
    }

    /// Opens a ledger, checking the directory when one is configured.
    fn ledger(&self, user: &str) -> Result<UserLedger, LedgerError> {
        match &self.directory {
            Some(directory) => directory.open_ledger(user, &self.store, &self.catalog),
            None => UserLedger::open(&self.store, &self.catalog, user),
        }
    }
}

/// Executes one command, writing its listing to `out`.
fn run<W: Write>(args: Args, out: W) -> Result<(), CliError> {
    let ctx = Context::load(&args)?;

    match args.command {
        Command::Users => {
            let directory = ctx.directory.as_ref().ok_or(CliError::NoDirectory)?;
            #[derive(Serialize)]
            struct UserLine<'a> {
                user: &'a str,
                payer: String,
            }
            let lines = directory.members().iter().map(|m| UserLine {
                user: m.name(),
                payer: m.payer().map(|p| p.to_string()).unwrap_or_default(),
            });
            write_rows(lines, out)?;
        }
        Command::Bills { user } => {
            let ledger = ctx.ledger(&user)?;
            write_bills(&ledger, out)?;
        }
        Command::Items { user, bill } => {
            let ledger = ctx.ledger(&user)?;
            let bill = match bill {
                Some(id) => ledger.bill(&BillId::from(id.as_str()))?,
                None => ledger.current_bill(),
            };
            write_rows(ItemLine::for_bill(bill), out)?;
        }
        Command::Add { user, product } => {
            let mut ledger = ctx.ledger(&user)?;
            let coffee = ctx.catalog.lookup(&product)?;
            ledger.add(coffee)?;
            write_rows([BillSummary(ledger.current_bill())], out)?;
        }
        Command::Delete {
            user,
            bill,
            position,
        } => {
            let mut ledger = ctx.ledger(&user)?;
            let bill = ledger.bill_mut(&BillId::from(bill.as_str()))?;
            bill.delete_at(position)?;
            write_rows(ItemLine::for_bill(bill), out)?;
        }
        Command::Restore {
            user,
            bill,
            position,
        } => {
            let mut ledger = ctx.ledger(&user)?;
            let bill = ledger.bill_mut(&BillId::from(bill.as_str()))?;
            bill.restore_at(position)?;
            write_rows(ItemLine::for_bill(bill), out)?;
        }
        Command::Pay {
            user,
            transaction_id,
        } => {
            let mut ledger = ctx.ledger(&user)?;
            ledger.pay_bill(&transaction_id)?;
            write_bills(&ledger, out)?;
        }
    }
    Ok(())
}

/// Write bill summaries to a CSV writer, oldest bill first.
///
/// # CSV Format
///
/// Columns: `bill, user, items, sum, status, transaction, paid_at`
///
/// ```csv
/// bill,user,items,sum,status,transaction,paid_at
/// Test_0001,Test,2,0.60,paid,T1,2024-03-01_18-00-00
/// Test_0002,Test,0,0,open,,
/// ```
fn write_bills<W: Write>(ledger: &UserLedger, writer: W) -> Result<(), csv::Error> {
    write_rows(ledger.bills().map(BillSummary), writer)
}

fn write_rows<T, I, W>(rows: I, writer: W) -> Result<(), csv::Error>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
    W: Write,
{
    let mut wtr = Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
