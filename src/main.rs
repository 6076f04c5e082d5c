use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use recstore::config::Config;
use recstore::{logging, Fields, HttpGateway, Record, Store};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "recstore")]
#[command(about = "Fetch, edit and save remote records through a local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/recstore/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Server root URL; overrides the config file
  #[arg(short, long)]
  url: Option<String>,

  /// Model (resource type) to work with
  #[arg(short, long, default_value = "event")]
  model: String,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Records matching the filters, cache first
  Find(Filters),
  /// One record by id, cache first
  FindRecord { id: String },
  /// Records matching the filters, always from the server
  Query(Filters),
  /// One record by id, always from the server
  QueryRecord { id: String },
  /// Fetch a record, apply field changes and save it
  Save {
    id: String,
    /// Field assignment as name=value (value parsed as JSON when possible)
    #[arg(short, long = "set", value_parser = parse_assignment)]
    set: Vec<(String, Value)>,
  },
  /// Create a new record on the server
  Create {
    #[arg(short, long = "set", value_parser = parse_assignment)]
    set: Vec<(String, Value)>,
  },
  /// Delete a record on the server
  Destroy { id: String },
}

#[derive(ClapArgs, Debug)]
struct Filters {
  /// Filter as name=value (value parsed as JSON when possible)
  #[arg(short, long = "param", value_parser = parse_assignment)]
  params: Vec<(String, Value)>,
}

fn parse_assignment(raw: &str) -> std::result::Result<(String, Value), String> {
  let (name, value) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
  let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
  Ok((name.to_string(), value))
}

fn load_config(args: &Args) -> Result<Config> {
  match (Config::locate(args.config.as_deref())?, &args.url) {
    (Some(path), url) => {
      let mut config = Config::load_from_path(&path)?;
      if let Some(url) = url {
        config.remote.base_url = url.clone();
      }
      Ok(config)
    }
    (None, Some(url)) => Ok(Config::for_url(url.clone())),
    (None, None) => Config::load(None),
  }
}

fn print_records(records: &[Record]) -> Result<()> {
  for record in records {
    println!("{}", serde_json::to_string_pretty(&record.data())?);
  }
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = load_config(&args)?;
  let _log_guard = logging::init(&config.log)?;

  let gateway = HttpGateway::new(&config.remote)?.with_token(Config::api_token());
  let store = Store::new(gateway);
  for (name, defaults) in &config.models {
    store.define_model(name, defaults.clone())?;
  }
  if store.model(&args.model).is_none() {
    store.define_model(&args.model, Fields::new())?;
  }

  let model = args.model.as_str();
  match args.command {
    Command::Find(filters) => {
      let records = store.find(model, filters.params.into_iter().collect()).await?;
      print_records(&records)?;
    }
    Command::FindRecord { id } => {
      let record = store.find_record(model, id.as_str()).await?;
      print_records(record.as_slice())?;
    }
    Command::Query(filters) => {
      let records = store.query(model, filters.params.into_iter().collect()).await?;
      print_records(&records)?;
    }
    Command::QueryRecord { id } => {
      let record = store.query_record(model, id.as_str()).await?;
      print_records(record.as_slice())?;
    }
    Command::Save { id, set } => {
      let record = store
        .find_record(model, id.as_str())
        .await?
        .ok_or_else(|| eyre!("{} {} not found", model, id))?;
      for (name, value) in set {
        record.set(&name, value)?;
      }
      let response = record.save().await?;
      println!("{}", serde_json::to_string_pretty(&response)?);
    }
    Command::Create { set } => {
      let record = store.create_record(model, set.into_iter().collect())?;
      let response = record.save().await?;
      println!("{}", serde_json::to_string_pretty(&response)?);
    }
    Command::Destroy { id } => {
      let record = store
        .find_record(model, id.as_str())
        .await?
        .ok_or_else(|| eyre!("{} {} not found", model, id))?;
      let response = record.destroy_record().await?;
      println!("{}", serde_json::to_string_pretty(&response)?);
    }
  }

  Ok(())
}
