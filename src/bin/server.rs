use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use serde::Deserialize;

use common::api;
use common::auth::StaticIdentity;
use common::cli::{self, CLIError};
use common::database::{sqlite::SQLiteConnection, Database};
use common::domain::{Address, Driver, Food, Restaurant, User};
use common::errors::Result;
use common::http::HttpServer;
use common::notify::LogNotifier;
use common::routes;

/// Entity records fed in at startup, standing in for the sync feeds of the
/// owning services. Every section is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Seed {
    users: Vec<User>,
    addresses: Vec<Address>,
    foods: Vec<Food>,
    restaurants: Vec<Restaurant>,
    drivers: Vec<Driver>,
}

#[derive(Debug)]
struct ServerOptions {
    address: String,
    database: String,
    tokens: Option<String>,
    seed: Option<String>,
}

/// Parse `[address] [--db path] [--tokens file] [--seed file]`, with the
/// environment variables as fallback for everything.
fn parse_cli_args<I>(mut args: I) -> std::result::Result<ServerOptions, CLIError>
where
    I: Iterator<Item = String>,
{
    assert!(args.next().is_some()); // Skip the program name

    let mut options = ServerOptions {
        address: cli::env_or(cli::ADDRESS_VAR, cli::DEFAULT_ADDRESS),
        database: cli::env_or(cli::DATABASE_VAR, cli::DEFAULT_DATABASE),
        tokens: std::env::var(cli::TOKENS_VAR).ok(),
        seed: std::env::var(cli::SEED_VAR).ok(),
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                options.database = args.next().ok_or(CLIError::MissingParameter("--db"))?;
            }
            "--tokens" => {
                options.tokens = Some(args.next().ok_or(CLIError::MissingParameter("--tokens"))?);
            }
            "--seed" => {
                options.seed = Some(args.next().ok_or(CLIError::MissingParameter("--seed"))?);
            }
            address => {
                options.address = cli::validate_address(address)?.to_string();
            }
        }
    }
    Ok(options)
}

fn open_database(options: &ServerOptions) -> Result<SQLiteConnection> {
    if options.database == cli::DEFAULT_DATABASE {
        SQLiteConnection::new()
    } else {
        SQLiteConnection::open(&options.database)
    }
}

fn load_identity(options: &ServerOptions) -> Result<StaticIdentity> {
    match &options.tokens {
        Some(path) => StaticIdentity::from_json(&std::fs::read_to_string(path)?),
        None => {
            warn!("no token table given, falling back to the dev tokens");
            Ok(StaticIdentity::dev_tokens())
        }
    }
}

fn seed_database(db: &mut dyn Database, path: &str) -> Result<()> {
    let seed: Seed = serde_json::from_str(&std::fs::read_to_string(path)?)
        .map_err(|err| common::errors::Error::Validation(err.to_string()))?;
    for user in &seed.users {
        db.put_user(user)?;
    }
    for address in &seed.addresses {
        db.put_address(address)?;
    }
    for food in &seed.foods {
        db.put_food(food)?;
    }
    for restaurant in &seed.restaurants {
        db.put_restaurant(restaurant)?;
    }
    for driver in &seed.drivers {
        db.put_driver(driver)?;
    }
    info!(
        "seeded {} users, {} addresses, {} foods, {} restaurants, {} drivers",
        seed.users.len(),
        seed.addresses.len(),
        seed.foods.len(),
        seed.restaurants.len(),
        seed.drivers.len()
    );
    Ok(())
}

fn run(options: ServerOptions) -> Result<()> {
    let mut db = open_database(&options)?;
    if let Some(path) = &options.seed {
        seed_database(&mut db, path)?;
    }
    let identity = Arc::new(load_identity(&options)?);
    let router = Arc::new(routes::create_http_router()?);
    let notifier = Arc::new(LogNotifier);
    let db: Arc<Mutex<Box<dyn Database>>> = Arc::new(Mutex::new(Box::new(db)));

    let server = HttpServer::new(&options.address)?;
    info!("listening on {}", options.address);

    server.serve(move |request| {
        let mut db = db.lock().unwrap();
        match router.route(request, identity.as_ref(), &mut **db, notifier.as_ref()) {
            Ok(response) => response,
            Err(err) => {
                if err.status_code() == 500 {
                    error!("request failed: {}", err);
                } else {
                    debug!("request rejected: {}", err);
                }
                api::error_response(&err)
            }
        }
    });
    Ok(())
}

fn main() {
    env_logger::init();
    let options = match parse_cli_args(std::env::args()) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(2);
        }
    };
    if let Err(err) = run(options) {
        error!("server stopped: {}", err);
        std::process::exit(1);
    }
}
