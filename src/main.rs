//! p3270 - script 3270 host sessions through s3270

use clap::Parser;
use p3270::{Cli, Client, ClientBuilder, ClientError, Command, Config, LogConfig, Script};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{error, warn};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("p3270=debug")
    } else {
        EnvFilter::new("p3270=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.config_builder()?.build()?;

    match &cli.command {
        Command::Config { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{config}");
            }
            Ok(())
        }
        Command::Screen => {
            let mut client = open(cli, config)?;
            let ready = client.wait_for_field();
            check(&client, ready)?;
            let printed = client.print_screen();
            check(&client, printed)?;
            client.end_session();
            Ok(())
        }
        Command::Read { row, col, length } => {
            let mut client = open(cli, config)?;
            let ready = client.wait_for_field();
            check(&client, ready)?;
            let text = client.read_text_at_position(*row, *col, *length);
            let text = text.ok_or_else(|| failure(&client))?;
            println!("{text}");
            client.end_session();
            Ok(())
        }
        Command::Run { script } => {
            let text = match script {
                Some(path) => std::fs::read_to_string(path)
                    .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
                None => {
                    let mut text = String::new();
                    std::io::stdin().read_to_string(&mut text)?;
                    text
                }
            };
            let script = Script::parse(&text)?;

            let mut client = open(cli, config)?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let result = script.run(&mut client, &mut out);
            out.flush()?;
            client.end_session();
            result.map_err(Into::into)
        }
    }
}

/// Build a client for the command line options and connect it.
fn builder(cli: &Cli, config: Config) -> ClientBuilder {
    Client::builder(config)
        .emulator(&cli.emulator)
        .timeout(Duration::from_secs(cli.timeout))
}

fn open(cli: &Cli, config: Config) -> Result<Client, Box<dyn std::error::Error>> {
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let logging = match &cli.log_file {
        Some(file) => LogConfig::new(level, file),
        None => LogConfig {
            level,
            ..LogConfig::default()
        },
    };

    // An unusable default log location is not fatal; an explicit one is.
    let mut client = match builder(cli, config.clone()).logging(logging.clone()).build() {
        Err(ClientError::Log(e)) if cli.log_file.is_none() => {
            warn!(file = %logging.file.display(), error = %e, "client log disabled");
            builder(cli, config).build()?
        }
        built => built?,
    };
    let connected = client.connect();
    check(&client, connected)?;
    Ok(client)
}

fn check(client: &Client, ok: bool) -> Result<(), Box<dyn std::error::Error>> {
    if ok { Ok(()) } else { Err(failure(client)) }
}

fn failure(client: &Client) -> Box<dyn std::error::Error> {
    client
        .last_error()
        .map_or_else(|| "operation failed".into(), |e| e.to_string().into())
}
