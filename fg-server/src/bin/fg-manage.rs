use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fg::basic_models::UserRegistration;
use fg_server::{auth, config::Config, database::Database, seed};

/// Maintenance tasks for a Foodgram database
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yml")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load ingredients from a JSON file of {name, measurement_unit} objects
    LoadIngredients {
        #[arg(default_value = "data/ingredients.json")]
        path: String,
    },
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "Admin")]
        first_name: String,
        #[arg(long, default_value = "Admin")]
        last_name: String,
        #[arg(long)]
        password: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let config = Config::load_or_default(&args.config).context("Loading configuration")?;
    let db = Database::connect(&config.database).context("Connecting to database")?;
    let mut conn = db.conn()?;

    match args.command {
        Command::LoadIngredients { path } => {
            let added = seed::load_ingredients(&mut conn, &path)?;
            println!("Added {} ingredients from {}", added, path);
        }
        Command::CreateAdmin {
            email,
            username,
            first_name,
            last_name,
            password,
        } => {
            let registration = UserRegistration {
                email,
                username,
                first_name,
                last_name,
                password,
            };
            let user = auth::register(&conn, &registration, true)
                .map_err(|e| anyhow::anyhow!("{}", e))
                .context("Creating administrator")?;
            println!("Created administrator {} (id {})", user.username, user.id);
        }
    }
    Ok(())
}
