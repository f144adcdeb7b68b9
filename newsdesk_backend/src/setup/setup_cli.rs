use bcrypt::DEFAULT_COST;
use clap::{Parser, Subcommand};
use newsdesk_backend::config::Config;
use newsdesk_backend::helper::account_helpers;
use newsdesk_backend::models::db_operations::accounts_db_operations;
use newsdesk_backend::models::Role;
use newsdesk_backend::setup::db_setup;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial newsdesk setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Superadmin {
        #[command(subcommand)]
        action: SuperadminAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Creates the schema. Safe to run again.
    Setup,
}

#[derive(Subcommand, Debug)]
enum SuperadminAction {
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
    List,
    ChangePassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        new_password: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action: DbAction::Setup } => setup_database(&config),
        Commands::Superadmin { action } => match action {
            SuperadminAction::Create { email, name, password } => create_superadmin(&config, email, name, password),
            SuperadminAction::List => list_superadmins(&config),
            SuperadminAction::ChangePassword { email, new_password } => {
                change_password(&config, email, new_password)
            }
        },
    }
}

fn setup_database(config: &Config) {
    let db_path = config.database_file();
    println!("\nSetting up newsdesk database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create database file.");
    match db_setup::setup_newsdesk_db(&mut conn) {
        Ok(_) => println!("✅ Database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up database: {}", e),
    }
}

fn open_existing(config: &Config) -> Option<Connection> {
    let db_path = config.database_file();
    if !db_path.exists() {
        eprintln!("❌ Error: Database not found at '{}'. Please run `setup_cli db setup` first.", db_path.display());
        return None;
    }
    match Connection::open(&db_path) {
        Ok(conn) => Some(conn),
        Err(e) => {
            eprintln!("❌ Error: Could not open database: {}", e);
            None
        }
    }
}

fn create_superadmin(config: &Config, email: &str, name: &str, password: &str) {
    let Some(conn) = open_existing(config) else { return };
    match account_helpers::create_superadmin(&conn, email, name, password, DEFAULT_COST) {
        Ok(account) => println!("✅ Superadmin '{}' created with id {}.", account.email, account.id),
        Err(e) => eprintln!("❌ Error creating superadmin: {}", e),
    }
}

fn list_superadmins(config: &Config) {
    let Some(conn) = open_existing(config) else { return };
    match accounts_db_operations::list_by_role(&conn, Role::Superadmin) {
        Ok(accounts) if accounts.is_empty() => println!("No superadmin accounts found."),
        Ok(accounts) => {
            println!("Superadmin accounts:");
            for account in accounts {
                println!("- {} <{}> ({})", account.display_name, account.email, account.id);
            }
        }
        Err(e) => eprintln!("❌ Error listing superadmins: {}", e),
    }
}

fn change_password(config: &Config, email: &str, new_password: &str) {
    let Some(conn) = open_existing(config) else { return };
    match account_helpers::change_password(&conn, email, new_password, DEFAULT_COST) {
        Ok(()) => println!("✅ Password for '{}' changed successfully.", email),
        Err(e) => eprintln!("❌ Error changing password: {}", e),
    }
}
