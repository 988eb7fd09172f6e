use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use keepsafe_core::{
    consume::ConsumerFn, import, vault, CategoryStore, Database, Entry, KeepsafeConfig, Key, User,
    UserStore,
};
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zeroize::Zeroizing;

/// Keepsafe CLI - administration utilities for keepsafe password vaults
#[derive(Parser)]
#[command(name = "keepsafe")]
#[command(about = "Administration utilities for keepsafe password vaults", long_about = None)]
struct Cli {
    /// Vault database file (overrides the config file)
    #[arg(long, global = true, env = "KEEPSAFE_DB")]
    db: Option<PathBuf>,

    /// Configuration file
    #[arg(long, global = true, env = "KEEPSAFE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Change a user's password
    Passwd {
        /// User name
        #[arg(long)]
        name: String,
    },

    /// Import entries for a user from a JSON array
    Import {
        /// User name
        #[arg(long)]
        name: String,

        /// JSON file to read (stdin if omitted)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// List a user's entries that use a given password
    FindPassword {
        /// User name
        #[arg(long)]
        name: String,
    },

    /// Search a user's entries by url, title and description
    Search {
        /// User name
        #[arg(long)]
        name: String,

        /// Text to look for; matches everything when empty
        #[arg(long, default_value = "")]
        query: String,

        /// Only entries in this category id
        #[arg(long, default_value_t = 0)]
        category: i64,

        /// Result order
        #[arg(long, value_enum, default_value_t = SortOrder::Id)]
        sort: SortOrder,
    },

    /// Manage a user's categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List users
    List,

    /// Add a user
    Add {
        /// User name
        #[arg(long)]
        name: String,

        /// Password (will prompt if not provided)
        #[arg(long)]
        password: Option<String>,

        /// Share the key of this existing user
        #[arg(long)]
        master: Option<String>,

        /// Password of the master user (will prompt if not provided)
        #[arg(long, alias = "mp", requires = "master")]
        master_password: Option<String>,
    },

    /// Remove a user
    Remove {
        /// User name
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// List categories
    List {
        #[arg(long)]
        name: String,
    },

    /// Add a category
    Add {
        #[arg(long)]
        name: String,

        /// Category name
        category: String,
    },

    /// Rename a category
    Rename {
        #[arg(long)]
        name: String,

        /// Category id
        id: i64,

        /// New category name
        new_name: String,
    },

    /// Remove a category
    Remove {
        #[arg(long)]
        name: String,

        /// Category id
        id: i64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortOrder {
    /// Insertion order
    Id,
    /// Title, ignoring case
    Title,
    /// Newest first
    Newest,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = KeepsafeConfig::load_or_default(cli.config.as_deref())?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let db_path = cli.db.unwrap_or(config.database_path);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    debug!(path = %db_path.display(), "opening vault");
    let mut db = Database::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;
    db.initialize_schema()?;

    match cli.command {
        Commands::User { command } => run_user(&mut db, command),
        Commands::Passwd { name } => change_password(&mut db, &name),
        Commands::Import { name, file } => import_entries(&mut db, &name, file),
        Commands::FindPassword { name } => find_password(&db, &name),
        Commands::Search {
            name,
            query,
            category,
            sort,
        } => search(&db, &name, &query, category, sort),
        Commands::Category { command } => run_category(&mut db, command),
    }
}

fn prompt(label: &str) -> Result<Zeroizing<String>> {
    Ok(Zeroizing::new(rpassword::prompt_password(label)?))
}

fn prompt_new_password(label: &str) -> Result<Zeroizing<String>> {
    let password = prompt(&format!("{}: ", label))?;
    let confirm = prompt(&format!("Confirm {}: ", label.to_lowercase()))?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}

fn or_prompt(given: Option<String>, label: &str) -> Result<Zeroizing<String>> {
    match given {
        Some(password) => Ok(Zeroizing::new(password)),
        None => prompt_new_password(label),
    }
}

fn find_user(db: &Database, name: &str) -> Result<User> {
    db.store()
        .user_by_name(name)
        .with_context(|| format!("looking up user {:?}", name))
}

fn unlock(db: &Database, name: &str) -> Result<Key> {
    let user = find_user(db, name)?;
    let password = prompt(&format!("Password for {}: ", name))?;
    Ok(user.verify_password(&password)?)
}

fn print_entry(entry: &Entry) {
    println!(
        "{:>6}  {}  {}",
        entry.id,
        entry.title,
        entry.url.as_deref().unwrap_or("")
    );
}

fn run_user(db: &mut Database, command: UserCommands) -> Result<()> {
    match command {
        UserCommands::List => {
            db.store().users(&mut ConsumerFn(|user: User| {
                println!("{:>6}  {:>6}  {}", user.id, user.owner, user.name);
            }))?;
        }
        UserCommands::Add {
            name,
            password,
            master,
            master_password,
        } => {
            let password = or_prompt(password, "Password")?;
            let master_password = match &master {
                Some(master) => Some(match master_password {
                    Some(given) => Zeroizing::new(given),
                    None => prompt(&format!("Password for {}: ", master))?,
                }),
                None => None,
            };
            let master = master
                .as_deref()
                .zip(master_password.as_ref().map(|p| p.as_str()));
            let user = db.transact(|store| vault::add_user(store, &name, &password, master))?;
            info!(user_id = user.id, "user added");
            println!("Added user {} with id {}", user.name, user.id);
        }
        UserCommands::Remove { name } => {
            db.transact(|store| {
                store.user_by_name(&name)?;
                store.remove_user(&name)
            })?;
            println!("Removed user {}", name);
        }
    }
    Ok(())
}

fn change_password(db: &mut Database, name: &str) -> Result<()> {
    let user = find_user(db, name)?;
    let old_password = prompt("Old password: ")?;
    let new_password = prompt_new_password("New password")?;
    db.transact(|store| vault::change_password(store, user.id, &old_password, &new_password))?;
    println!("Password changed for {}", name);
    Ok(())
}

fn import_entries(db: &mut Database, name: &str, file: Option<PathBuf>) -> Result<()> {
    let key = unlock(db, name)?;
    let reader: Box<dyn Read> = match &file {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Box::new(io::stdin().lock()),
    };
    let count = db.transact(|store| import::import_entries(store, &key, reader))?;
    println!("Imported {} entries", count);
    Ok(())
}

fn find_password(db: &Database, name: &str) -> Result<()> {
    let key = unlock(db, name)?;
    let wanted = prompt("Password to find: ")?;
    let found = vault::find_by_password(&db.store(), &key, &wanted)?;
    for entry in &found {
        print_entry(entry);
    }
    println!("{} matching entries", found.len());
    Ok(())
}

fn search(db: &Database, name: &str, query: &str, category: i64, sort: SortOrder) -> Result<()> {
    let owner = find_user(db, name)?.owner_id();
    let mut entries = vault::entries(&db.store(), owner, query, category)?;
    match sort {
        SortOrder::Id => {}
        SortOrder::Title => vault::sort_by_title(&mut entries),
        SortOrder::Newest => vault::reverse(&mut entries),
    }
    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

fn run_category(db: &mut Database, command: CategoryCommands) -> Result<()> {
    match command {
        CategoryCommands::List { name } => {
            let owner = find_user(db, &name)?.owner_id();
            for category in db.store().categories_by_owner(owner)? {
                println!("{:>6}  {}", category.id, category.name);
            }
        }
        CategoryCommands::Add { name, category } => {
            let owner = find_user(db, &name)?.owner_id();
            let added = vault::add_category(&db.store(), owner, &category)?;
            println!("Added category {} with id {}", added.name, added.id);
        }
        CategoryCommands::Rename { name, id, new_name } => {
            let owner = find_user(db, &name)?.owner_id();
            let old = db.transact(|store| vault::update_category(store, id, owner, &new_name))?;
            println!("Renamed category {} to {}", old, new_name);
        }
        CategoryCommands::Remove { name, id } => {
            let owner = find_user(db, &name)?.owner_id();
            let old = db.transact(|store| vault::remove_category(store, id, owner))?;
            println!("Removed category {}", old);
        }
    }
    Ok(())
}
