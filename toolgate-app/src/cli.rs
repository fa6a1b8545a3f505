use anyhow::{bail, Result};
use std::path::PathBuf;

pub const DEFAULT_CONFIG: &str = "toolgate.yaml";

pub const USAGE: &str = "\
Usage: toolgate [--config <path>] <command>

Commands:
  discover                Re-scan the tools directory and rewrite the manifest
  list                    List every tool in the manifest
  search <query>          Rank tools by name and description
  summary <name>          Budgeted summary of one tool
  schema <name>           Full descriptor of one tool
  scan <file>             Check a file for PII and print it tokenized
  report <telemetry.jsonl>  Replay a telemetry sink file and print the report
";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Discover,
    List,
    Search(String),
    Summary(String),
    Schema(String),
    Scan(PathBuf),
    Report(PathBuf),
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
    pub config_path: PathBuf,
    pub command: Command,
}

/// Parse arguments, excluding the program name.
pub fn parse_args<I>(args: I) -> Result<Cli>
where
    I: IntoIterator<Item = String>,
{
    let mut config_path = PathBuf::from(DEFAULT_CONFIG);
    let mut positional = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => config_path = PathBuf::from(path),
                None => bail!("--config requires a path"),
            },
            "--help" | "-h" => {
                return Ok(Cli {
                    config_path,
                    command: Command::Help,
                })
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        None | Some("help") => Command::Help,
        Some("discover") => Command::Discover,
        Some("list") => Command::List,
        Some("search") => {
            let query = positional.by_ref().collect::<Vec<_>>().join(" ");
            if query.trim().is_empty() {
                bail!("search requires a query");
            }
            Command::Search(query)
        }
        Some("summary") => Command::Summary(required(positional.next(), "summary", "tool name")?),
        Some("schema") => Command::Schema(required(positional.next(), "schema", "tool name")?),
        Some("scan") => Command::Scan(required(positional.next(), "scan", "file")?.into()),
        Some("report") => Command::Report(required(positional.next(), "report", "telemetry file")?.into()),
        Some(other) => bail!("Unknown command: {}", other),
    };

    if let Some(extra) = positional.next() {
        bail!("Unexpected argument: {}", extra);
    }

    Ok(Cli { config_path, command })
}

fn required(value: Option<String>, command: &str, what: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => bail!("{} requires a {}", command, what),
    }
}
