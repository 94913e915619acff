use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::application::LedgerStore;
use crate::config::{DEFAULT_DATABASE_PATH, LedgerConfig};
use crate::domain::{
    AccountId, Direction, Pagination, TransactionDraft, TransactionRecord, TransactionStatus,
    TransitionPolicy, format_cents, parse_cents,
};
use crate::io::Exporter;

/// txledger - validated ledger of money movements
#[derive(Parser)]
#[command(name = "txledger")]
#[command(about = "Record, query and settle money movements between accounts")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "TXLEDGER_DB", default_value = DEFAULT_DATABASE_PATH)]
    pub database: String,

    /// Deadline for each storage call, in milliseconds
    #[arg(long, env = "TXLEDGER_TIMEOUT_MS", default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Which status changes are accepted
    #[arg(long, env = "TXLEDGER_POLICY", value_enum, default_value_t = PolicyArg::Strict)]
    pub policy: PolicyArg,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolicyArg {
    Strict,
    Permissive,
}

impl From<PolicyArg> for TransitionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Strict => TransitionPolicy::Strict,
            PolicyArg::Permissive => TransitionPolicy::Permissive,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Record a new transaction
    Create {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Source account (name or id)
        #[arg(long)]
        from: String,

        /// Destination account (name or id)
        #[arg(long)]
        to: String,

        /// Transaction type: sent or received
        #[arg(short = 't', long = "type")]
        transaction_type: String,

        /// External transaction id (stored upper-case)
        #[arg(long = "id")]
        transaction_id: String,

        /// Short note (max 200 characters)
        #[arg(short, long)]
        note: Option<String>,

        /// Description (max 500 characters)
        #[arg(short, long)]
        description: Option<String>,

        /// Fee (e.g., "0.50")
        #[arg(long)]
        fee: Option<String>,
    },

    /// List transactions for an account, most recent first
    List {
        /// Account name or id
        account: String,

        /// Match the account as sender (from) or receiver (to)
        #[arg(long, default_value = "from")]
        direction: String,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<u32>,

        /// Number of transactions to skip
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Show a transaction by its transaction id
    Show {
        /// Transaction id (case-insensitive)
        id: String,
    },

    /// List transactions in a status
    Status {
        /// pending, completed or failed
        status: String,
    },

    /// Change the status of a transaction
    Update {
        /// Transaction id (case-insensitive)
        id: String,

        /// New status: pending, completed or failed
        status: String,
    },

    /// Set the description of a transaction
    Describe {
        /// Transaction id (case-insensitive)
        id: String,

        /// New description (omit to clear)
        description: Option<String>,
    },

    /// Verify ledger integrity
    Check,

    /// Export the ledger
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Register a new account
    Add {
        /// Account name (must be unique)
        name: String,
    },

    /// List all accounts
    List,
}

impl Cli {
    pub fn config(&self) -> LedgerConfig {
        LedgerConfig::new(&self.database)
            .with_storage_timeout(Duration::from_millis(self.timeout_ms))
            .with_transition_policy(self.policy.into())
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();

        match self.command {
            Commands::Init => {
                LedgerStore::init(&config).await?;
                println!("Database initialized: {}", config.database_path);
            }

            Commands::Account(cmd) => {
                let store = LedgerStore::connect(&config).await?;
                run_account_command(&store, cmd).await?;
            }

            Commands::Create {
                amount,
                from,
                to,
                transaction_type,
                transaction_id,
                note,
                description,
                fee,
            } => {
                let store = LedgerStore::connect(&config).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let fee_cents = fee
                    .map(|f| parse_cents(&f))
                    .transpose()
                    .context("Invalid fee format. Use '0.50'")?;

                let from = resolve_account(&store, &from).await?;
                let to = resolve_account(&store, &to).await?;

                let mut draft =
                    TransactionDraft::new(from, to, amount_cents, transaction_type, transaction_id);
                draft.note = note;
                draft.description = description;
                draft.fee_cents = fee_cents;

                let record = store.create(draft).await?;
                println!(
                    "Recorded transaction {}: {} ({})",
                    record.transaction_id,
                    format_cents(record.amount_cents),
                    record.status
                );
            }

            Commands::List {
                account,
                direction,
                limit,
                offset,
            } => {
                let store = LedgerStore::connect(&config).await?;
                let direction = Direction::from_str(&direction)
                    .ok_or_else(|| anyhow::anyhow!("Direction must be 'from' or 'to'"))?;
                let account_id = resolve_account(&store, &account).await?;
                let pagination = Pagination { limit, offset };

                let records = store
                    .find_by_account(account_id, direction, pagination)
                    .await?;
                print_transactions(&store, &records).await?;
            }

            Commands::Show { id } => {
                let store = LedgerStore::connect(&config).await?;
                let record = store.get_by_transaction_id(&id).await?;
                run_show_command(&store, &record).await?;
            }

            Commands::Status { status } => {
                let store = LedgerStore::connect(&config).await?;
                let status = parse_status(&status)?;
                let records = store.find_by_status(status).await?;
                print_transactions(&store, &records).await?;
            }

            Commands::Update { id, status } => {
                let store = LedgerStore::connect(&config).await?;
                let status = parse_status(&status)?;
                let record = store.update_status(&id, status).await?;
                println!("{} is now {}", record.transaction_id, record.status);
            }

            Commands::Describe { id, description } => {
                let store = LedgerStore::connect(&config).await?;
                let record = store.update_description(&id, description).await?;
                println!("Updated description of {}", record.transaction_id);
            }

            Commands::Check => {
                let store = LedgerStore::connect(&config).await?;
                run_check_command(&store).await?;
            }

            Commands::Export { format, output } => {
                let store = LedgerStore::connect(&config).await?;
                run_export_command(&store, format, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

async fn run_account_command(store: &LedgerStore, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Add { name } => {
            let account = store.register_account(&name).await?;
            println!("Created account: {} ({})", account.name, account.id);
        }
        AccountCommands::List => {
            let accounts = store.list_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<20} {:<36} CREATED", "NAME", "ID");
                println!("{}", "-".repeat(70));
                for account in accounts {
                    println!(
                        "{:<20} {:<36} {}",
                        truncate(&account.name, 20),
                        account.id,
                        account.created_at.format("%Y-%m-%d")
                    );
                }
            }
        }
    }
    Ok(())
}

/// Accept either an account id or a registered account name.
async fn resolve_account(store: &LedgerStore, input: &str) -> Result<AccountId> {
    if let Some(id) = AccountId::parse(input) {
        return Ok(id);
    }
    Ok(store.get_account(input).await?.id)
}

fn parse_status(input: &str) -> Result<TransactionStatus> {
    TransactionStatus::from_str(input)
        .ok_or_else(|| anyhow::anyhow!("Status must be pending, completed or failed"))
}

async fn account_names(store: &LedgerStore) -> Result<HashMap<AccountId, String>> {
    Ok(store
        .list_accounts()
        .await?
        .into_iter()
        .map(|a| (a.id, a.name))
        .collect())
}

async fn print_transactions(store: &LedgerStore, records: &[TransactionRecord]) -> Result<()> {
    if records.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let names = account_names(store).await?;
    let name_of = |id: &AccountId| names.get(id).cloned().unwrap_or_else(|| id.to_string());

    println!(
        "{:<12} {:<16} {:>10} {:<9} {:<10} {:<15} {:<15}",
        "DATE", "ID", "AMOUNT", "TYPE", "STATUS", "FROM", "TO"
    );
    println!("{}", "-".repeat(93));

    for record in records {
        println!(
            "{:<12} {:<16} {:>10} {:<9} {:<10} {:<15} {:<15}",
            record.created_at.format("%Y-%m-%d"),
            truncate(&record.transaction_id, 16),
            format_cents(record.amount_cents),
            record.transaction_type,
            record.status,
            truncate(&name_of(&record.from), 15),
            truncate(&name_of(&record.to), 15),
        );
    }
    Ok(())
}

async fn run_show_command(store: &LedgerStore, record: &TransactionRecord) -> Result<()> {
    let names = account_names(store).await?;
    let name_of = |id: &AccountId| names.get(id).cloned().unwrap_or_else(|| id.to_string());

    println!("Transaction: {}", record.transaction_id);
    println!("  Record id:   {}", record.id);
    println!("  Sequence:    {}", record.sequence);
    println!("  Type:        {}", record.transaction_type);
    println!("  Status:      {}", record.status);
    println!("  Amount:      {}", format_cents(record.amount_cents));
    println!("  Fee:         {}", format_cents(record.fee_cents));
    println!("  From:        {}", name_of(&record.from));
    println!("  To:          {}", name_of(&record.to));
    if let Some(note) = &record.note {
        println!("  Note:        {}", note);
    }
    if let Some(desc) = &record.description {
        println!("  Description: {}", desc);
    }
    println!(
        "  Created at:  {}",
        record.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  Updated at:  {}",
        record.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

async fn run_check_command(store: &LedgerStore) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = store.check_integrity().await?;

    println!("Accounts:     {}", report.account_count);
    println!("Transactions: {}", report.transaction_count);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    store: &LedgerStore,
    format: ExportFormat,
    output: Option<&str>,
) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let exporter = Exporter::new(store);
    let count = match format {
        ExportFormat::Csv => exporter.export_transactions_csv(writer).await?,
        ExportFormat::Json => exporter.export_snapshot_json(writer).await?,
    };

    if let Some(path) = output {
        eprintln!("Exported {} transaction(s) to {}", count, path);
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
