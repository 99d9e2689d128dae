use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
mod auth;
use pwsafe3::{Record, Safe, Storage};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Args)]
struct RecordArgs {
    /// Group the entry is filed under
    #[arg(long, short)]
    group: Option<String>,

    /// Entry title
    #[arg(long, short)]
    title: Option<String>,

    #[arg(long, short)]
    username: Option<String>,

    #[arg(long, short)]
    password: Option<String>,

    #[arg(long)]
    url: Option<String>,

    #[arg(long, short)]
    email: Option<String>,

    #[arg(long, short)]
    notes: Option<String>,
}

impl RecordArgs {
    /// Overwrites only the attributes that were given on the command line.
    fn apply(self, record: &mut Record) {
        let updates = [
            (self.group, &mut record.group),
            (self.title, &mut record.title),
            (self.username, &mut record.username),
            (self.password, &mut record.password),
            (self.url, &mut record.url),
            (self.email, &mut record.email),
            (self.notes, &mut record.notes),
        ];
        for (value, slot) in updates {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "pwsafe3")]
#[command(version, about = "Read and edit Password Safe v3 databases.")]
struct Cli {
    /// Path to the .psafe3 file
    #[arg(long, short = 'f', global = true, value_name = "PATH", env = "PWSAFE_PATH")]
    file: Option<PathBuf>,

    /// Log decoding details to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Creates an empty safe
    Init,

    /// Shows when and by whom the safe was last saved
    Info,

    /// Lists entries sorted by group and title
    List,

    /// Shows one entry
    #[command(arg_required_else_help = true)]
    Show {
        /// Index from `list`
        index: usize,

        /// Print the password instead of masking it
        #[arg(long, default_value_t = false)]
        reveal: bool,
    },

    /// Adds an entry
    #[command(arg_required_else_help = true)]
    Add {
        #[command(flatten)]
        fields: RecordArgs,
    },

    /// Changes attributes of an entry
    #[command(arg_required_else_help = true)]
    Edit {
        /// Index from `list`
        index: usize,

        #[command(flatten)]
        fields: RecordArgs,
    },

    /// Removes an entry
    #[command(arg_required_else_help = true)]
    Remove {
        /// Index from `list`
        index: usize,
    },

    /// Re-encrypts the safe under a new passphrase
    Passwd,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Maps an index of the sorted listing to a position in `safe.records`.
fn resolve(safe: &Safe, index: usize) -> Result<usize> {
    safe.sorted_indices()
        .get(index)
        .copied()
        .with_context(|| format!("no entry with index {index}"))
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_record(record: &Record, reveal: bool) {
    let password = if reveal {
        record.password.clone()
    } else {
        "*".repeat(record.password.chars().count().min(8))
    };

    println!("UUID:     {}", record.uuid);
    println!("Group:    {}", record.group);
    println!("Title:    {}", record.title);
    println!("Username: {}", record.username);
    println!("Password: {password}");
    println!("Url:      {}", record.url);
    println!("Email:    {}", record.email);
    println!("Created:  {}", format_time(record.created));
    println!("Notes:    {}", record.notes);
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let path = args
        .file
        .context("no safe file given; pass --file or set PWSAFE_PATH")?;
    let storage = Storage::new(path);

    match args.command {
        Commands::Init => {
            if storage.exists() {
                bail!("{} already exists", storage.path().display());
            }
            let password = auth::read_new_password(auth::PASSWORD_ENV)?;
            storage.write(&Safe::new(), &password)?;
            println!("safe initialized");
        }
        Commands::Info => {
            let password = auth::read_password()?;
            let safe = storage.open(&password)?;
            let h = &safe.headers;

            println!("File:         {}", storage.path().display());
            println!("Version:      {}.{}", h.version_major, h.version_minor);
            println!("Last saved:   {}", format_time(h.last_save));
            println!("Saved by:     {} @ {}", h.user, h.host);
            println!("Last program: {}", h.program);
            println!("Records:      {}", safe.records.len());
        }
        Commands::List => {
            let password = auth::read_password()?;
            let safe = storage.open(&password)?;

            if safe.records.is_empty() {
                println!("No entries stored.");
                return Ok(());
            }
            for (i, record) in safe.sorted_records().iter().enumerate() {
                println!("[{i:02}] {}/{}", record.group, record.title);
            }
        }
        Commands::Show { index, reveal } => {
            let password = auth::read_password()?;
            let safe = storage.open(&password)?;
            let pos = resolve(&safe, index)?;
            print_record(&safe.records[pos], reveal);
        }
        Commands::Add { fields } => {
            let password = auth::read_password()?;
            let mut safe = storage.open(&password)?;

            let mut record = Record::new();
            fields.apply(&mut record);
            if record.title.is_empty() {
                bail!("an entry needs a title");
            }
            let title = record.title.clone();
            safe.records.push(record);

            storage.write(&safe, &password)?;
            println!("added '{title}'");
        }
        Commands::Edit { index, fields } => {
            let password = auth::read_password()?;
            let mut safe = storage.open(&password)?;
            let pos = resolve(&safe, index)?;

            fields.apply(&mut safe.records[pos]);
            let title = safe.records[pos].title.clone();

            storage.write(&safe, &password)?;
            println!("updated '{title}'");
        }
        Commands::Remove { index } => {
            let password = auth::read_password()?;
            let mut safe = storage.open(&password)?;
            let pos = resolve(&safe, index)?;

            let removed = safe.records.remove(pos);
            storage.write(&safe, &password)?;
            println!("removed '{}'", removed.title);
        }
        Commands::Passwd => {
            let password = auth::read_password()?;
            let safe = storage.open(&password)?;
            let new_password = auth::read_new_password(auth::NEW_PASSWORD_ENV)?;

            storage.write(&safe, &new_password)?;
            println!("passphrase changed");
        }
    }

    Ok(())
}
