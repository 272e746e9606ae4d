//! Directory admin and smoke tool.
//!
//! # Responsibility
//! - Open a directory database and run list/get/load/remove against it.
//! - Print documents as JSON so runs can be diffed.

use channeldir_core::{
    init_from_config, Access, Channel, ChannelQuery, DirectoryConfig, DirectoryError,
    DirectoryService, Entity, Property, Resolvable, SqliteDocumentStore, Tag,
};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

type Service = DirectoryService<SqliteDocumentStore>;

#[derive(Debug, Parser)]
#[command(name = "channeldir", about = "Channel directory admin tool")]
struct Args {
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Database file; overrides `database_path` from the config.
    #[arg(long)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core linkage information.
    Ping,
    /// List a collection; channel lists accept `key=glob` filters.
    List {
        kind: Kind,
        #[arg(long = "filter", value_parser = parse_pair)]
        filters: Vec<(String, String)>,
    },
    /// Print one document, with its channel edges unless told otherwise.
    Get {
        kind: Kind,
        name: String,
        #[arg(long)]
        without_channels: bool,
    },
    /// Create or replace every document of a JSON array file.
    Load { kind: Kind, file: PathBuf },
    /// Delete one document with its edges.
    Remove { kind: Kind, name: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Channels,
    Properties,
    Tags,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Command::Ping = args.command {
        println!("channeldir_core ping={}", channeldir_core::ping());
        println!("channeldir_core version={}", channeldir_core::core_version());
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), String> {
    let mut config = match &args.config {
        Some(path) => DirectoryConfig::load(path).map_err(|err| err.to_string())?,
        None => DirectoryConfig::default(),
    };
    if let Some(db) = args.db {
        config.database_path = db;
    }
    init_from_config(&config).map_err(|err| err.to_string())?;

    let store = SqliteDocumentStore::open(&config.database_path).map_err(|err| err.to_string())?;
    let service = DirectoryService::with_config(store, &config);
    info!(
        "event=cli_command module=cli status=start database={}",
        config.database_path.display()
    );

    match args.command {
        Command::Ping => Ok(()),
        Command::List { kind, filters } => match kind {
            Kind::Channels => {
                let query = ChannelQuery::from_pairs(filters).map_err(|err| err.to_string())?;
                print_json(&service.list_channels(&query).map_err(describe)?)
            }
            Kind::Properties => print_json(&service.list::<Property>().map_err(describe)?),
            Kind::Tags => print_json(&service.list::<Tag>().map_err(describe)?),
        },
        Command::Get {
            kind,
            name,
            without_channels,
        } => match kind {
            Kind::Channels => print_json(&service.retrieve_channel(&name).map_err(describe)?),
            Kind::Properties => print_json(
                &service
                    .retrieve::<Property>(&name, !without_channels)
                    .map_err(describe)?,
            ),
            Kind::Tags => print_json(
                &service
                    .retrieve::<Tag>(&name, !without_channels)
                    .map_err(describe)?,
            ),
        },
        Command::Load { kind, file } => {
            let raw = fs::read_to_string(&file)
                .map_err(|err| format!("failed to read `{}`: {err}", file.display()))?;
            match kind {
                Kind::Channels => load::<Channel>(&service, &raw),
                Kind::Properties => load::<Property>(&service, &raw),
                Kind::Tags => load::<Tag>(&service, &raw),
            }
        }
        Command::Remove { kind, name } => {
            match kind {
                Kind::Channels => service.remove::<Channel>(Access::Modifier, &name),
                Kind::Properties => service.remove::<Property>(Access::Modifier, &name),
                Kind::Tags => service.remove::<Tag>(Access::Modifier, &name),
            }
            .map_err(describe)?;
            println!("removed {name}");
            Ok(())
        }
    }
}

fn load<E: Resolvable>(service: &Service, raw: &str) -> Result<(), String> {
    let written = service
        .create_or_replace_many_json::<E>(Access::Modifier, raw)
        .map_err(describe)?;
    let names: Vec<&str> = written.iter().map(Entity::name).collect();
    print_json(&names)
}

fn describe(err: DirectoryError) -> String {
    format!("{err} (status {})", err.outcome().status_code())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}
