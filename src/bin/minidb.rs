use minidb::config::{default_config_path, load_config};
use minidb::{Database, DatabaseConfig, Dialect, Value};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};

const USAGE: &str = "\
Usage: minidb [--config <file> | --dsn <dsn>] [--import <file>]... [--exec <sql>]... [<query> [<binding>...]]

Runs SQL against the configured database and prints selected rows as JSON lines.

Options:
  --config <file>   TOML configuration with a [database] section
  --dsn <dsn>       SQLite DSN to open instead of a configuration file
  --import <file>   Run the statements of an SQL file
  --exec <sql>      Run a block of statements
  -h, --help        Show this message

Bindings are read as integers, reals, true/false or null when they parse as such, text otherwise.";

/// One thing to do against the database, in command line order
#[derive(Debug, PartialEq)]
enum Action {
    Import(PathBuf),
    Exec(String),
    Query { sql: String, bindings: Vec<Value> },
}

#[derive(Debug, Default, PartialEq)]
struct Options {
    config: Option<PathBuf>,
    dsn: Option<String>,
    actions: Vec<Action>,
    help: bool,
}

fn parse_binding(arg: &str) -> Value {
    match arg {
        "null" | "NULL" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => arg
            .parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| arg.parse::<f64>().map(Value::Real))
            .unwrap_or_else(|_| Value::Text(arg.to_string())),
    }
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| iter.next().cloned().ok_or_else(|| format!("{} needs a value", flag));
        match arg.as_str() {
            "-h" | "--help" => options.help = true,
            "--config" => options.config = Some(PathBuf::from(value("--config")?)),
            "--dsn" => options.dsn = Some(value("--dsn")?),
            "--import" => options.actions.push(Action::Import(PathBuf::from(value("--import")?))),
            "--exec" => options.actions.push(Action::Exec(value("--exec")?)),
            flag if flag.starts_with("--") => return Err(format!("Unknown option {}", flag)),
            positional => match options.actions.last_mut() {
                Some(Action::Query { bindings, .. }) => bindings.push(parse_binding(positional)),
                _ => options.actions.push(Action::Query {
                    sql: positional.to_string(),
                    bindings: Vec::new(),
                }),
            },
        }
    }
    Ok(options)
}

/// Picks the database configuration: `--config`, then `--dsn`, then the default config file, then memory
fn resolve_config(options: &Options) -> Result<DatabaseConfig, Box<dyn Error>> {
    if let Some(path) = &options.config {
        return Ok(load_config(path)?.database);
    }
    if let Some(dsn) = &options.dsn {
        return Ok(DatabaseConfig {
            driver: Some(Dialect::Sqlite),
            dsn: dsn.clone(),
            prefix: None,
            sqlite: None,
        });
    }
    match default_config_path() {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "Using default config");
            Ok(load_config(path)?.database)
        }
        _ => Ok(DatabaseConfig::memory()),
    }
}

fn run(options: Options) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(&options)?;
    let database = Database::create(&config)?;

    for action in options.actions {
        match action {
            Action::Import(path) => {
                info!(path = %path.display(), "Importing");
                database.import(path)?;
            }
            Action::Exec(sql) => database.statements(&sql)?,
            Action::Query { sql, bindings } => {
                for row in database.select(&sql, &bindings)? {
                    println!("{}", serde_json::to_string(&row)?);
                }
            }
        }
    }
    Ok(())
}

fn main() {
    // Logs go to stderr so stdout only carries rows
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}\n\n{}", message, USAGE);
            process::exit(2);
        }
    };
    if options.help || options.actions.is_empty() {
        println!("{}", USAGE);
        return;
    }

    if let Err(e) = run(options) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
