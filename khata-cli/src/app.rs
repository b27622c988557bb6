use std::io::{self, Write as _};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use khata_core::{CounterpartyAccount, CounterpartyId, Direction, OwnerId, Standing};
use khata_service::{ContactDetails, ContactPatch, LedgerService, RetryPolicy};
use khata_store::{AccountQuery, SqliteAccountStore};

use crate::render;

/// Digital ledger for the money you give and take.
#[derive(Parser)]
#[command(name = "khata", version, about)]
pub struct Cli {
    /// Configuration file (defaults to ./khata.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Operate on this owner's ledger instead of the configured one.
    #[arg(long, global = true)]
    pub owner: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add a counterparty to the ledger.
    Add {
        name: String,
        #[arg(long, default_value = "")]
        mobile: String,
        #[arg(long, default_value = "")]
        address: String,
    },
    /// Record money you handed to a counterparty.
    Gave(TransactionArgs),
    /// Record money you received from a counterparty.
    Took(TransactionArgs),
    /// List accounts, most recently touched first.
    List {
        /// Keep only receivable, payable, or settled accounts.
        #[arg(long)]
        standing: Option<String>,
        /// Keep only names containing this fragment.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one account with its full history.
    Show { account: String },
    /// Update a counterparty's contact details.
    Edit {
        account: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        mobile: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Delete an account and its whole history. There is no undo.
    Remove {
        account: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Check every stored balance against its replayed history.
    Audit,
    /// Follow ledger changes as they are committed.
    Watch,
}

#[derive(Args)]
pub struct TransactionArgs {
    /// Counterparty id or an unambiguous name fragment.
    pub account: String,
    pub amount: Decimal,
    /// Treat the argument as a new counterparty's name and create it with
    /// this first transaction.
    #[arg(long)]
    pub new: bool,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = khata_config::load(cli.config.as_deref())?;
    let owner = OwnerId::new(cli.owner.unwrap_or(cfg.owner.id));
    let store = Arc::new(SqliteAccountStore::new(&cfg.store.path)?);
    let service = LedgerService::new(store).with_retry(RetryPolicy {
        max_attempts: cfg.retry.max_attempts,
    });

    match cli.command {
        Command::Add {
            name,
            mobile,
            address,
        } => {
            let account = service.create(
                &owner,
                ContactDetails {
                    name,
                    mobile,
                    address,
                },
            )?;
            println!("{}", render::account_line(&account));
        }
        Command::Gave(args) => transact(&service, &owner, Direction::Gave, args)?,
        Command::Took(args) => transact(&service, &owner, Direction::Took, args)?,
        Command::List {
            standing,
            name,
            limit,
        } => {
            let mut query = AccountQuery::default();
            if let Some(standing) = standing.as_deref() {
                query = query.with_standing(Standing::from_str(standing).map_err(|err| anyhow!(err))?);
            }
            if let Some(name) = name {
                query = query.with_name_contains(name);
            }
            if let Some(limit) = limit {
                query = query.with_limit(limit);
            }
            let accounts = service.list(&owner, query)?;
            if accounts.is_empty() {
                println!("no accounts");
            }
            for account in &accounts {
                println!("{}", render::account_line(account));
            }
        }
        Command::Show { account } => {
            let account = resolve(&service, &owner, &account)?;
            println!("{}", render::account_details(&account));
            for event in &account.history {
                println!("{}", render::event_line(event));
            }
        }
        Command::Edit {
            account,
            name,
            mobile,
            address,
        } => {
            if name.is_none() && mobile.is_none() && address.is_none() {
                bail!("nothing to change; pass --name, --mobile, or --address");
            }
            let account = resolve(&service, &owner, &account)?;
            let updated = service.update_contact(
                &owner,
                account.id,
                ContactPatch {
                    name,
                    mobile,
                    address,
                },
            )?;
            println!("{}", render::account_details(&updated));
        }
        Command::Remove { account, yes } => {
            let account = resolve(&service, &owner, &account)?;
            let prompt = format!(
                "delete {} and its {} history entries?",
                account.name,
                account.history.len()
            );
            if !yes && !confirm(&prompt)? {
                println!("kept {}", account.name);
                return Ok(());
            }
            service.remove(&owner, account.id)?;
            println!("deleted {}", account.name);
        }
        Command::Audit => {
            let reports = service.audit_all(&owner)?;
            let mut drifted = 0;
            for report in &reports {
                if !report.is_consistent() {
                    drifted += 1;
                    println!("{}", render::audit_line(report));
                }
            }
            println!("{} accounts audited, {drifted} drifted", reports.len());
        }
        Command::Watch => {
            let mut watcher = service.subscribe();
            println!("watching {}; ctrl-c to stop", cfg.store.path.display());
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    change = watcher.recv() => match change {
                        Ok(change) if change.owner() == &owner => {
                            println!("{}", render::change_line(&change));
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "watcher fell behind the feed");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        }
    }
    Ok(())
}

fn transact(
    service: &LedgerService,
    owner: &OwnerId,
    direction: Direction,
    args: TransactionArgs,
) -> Result<()> {
    let outcome = if args.new {
        service.record_new(
            owner,
            ContactDetails {
                name: args.account,
                ..ContactDetails::default()
            },
            direction,
            args.amount,
        )?
    } else {
        let account = resolve(service, owner, &args.account)?;
        service.record(owner, account.id, direction, args.amount)?
    };
    for event in &outcome.events {
        println!("{}", render::event_line(event));
    }
    println!("{}", render::account_line(&outcome.account));
    Ok(())
}

/// Accept either a full account id or a name fragment matching exactly one
/// account.
fn resolve(service: &LedgerService, owner: &OwnerId, key: &str) -> Result<CounterpartyAccount> {
    if let Ok(id) = CounterpartyId::from_str(key) {
        return Ok(service.get(owner, id)?);
    }
    let mut matches = service.list(owner, AccountQuery::default().with_name_contains(key))?;
    if matches.is_empty() {
        bail!("no account matches '{key}'");
    }
    if matches.len() > 1 {
        bail!("'{key}' matches {} accounts; use the id", matches.len());
    }
    Ok(matches.remove(0))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
