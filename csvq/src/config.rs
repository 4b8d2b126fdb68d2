//! Command line and environment configuration.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use csvq_csv::{CsvReadOptions, DEFAULT_INFER_SCHEMA_LENGTH};
use thiserror::Error;

use crate::policy::AccessPolicy;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_FILES_PATH: &str = "./files";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot prepare files directory '{path}': {source}")]
    FilesPath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Policy(#[from] csvq_result::Error),
}

#[derive(Parser, Debug)]
#[command(
    name = "csvq",
    version,
    about = "Run read-only SQL over CSV files, on stdio or over HTTP"
)]
pub struct Cli {
    #[command(flatten)]
    pub csv: CsvArgs,
    #[command(flatten)]
    pub query: QueryArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Subcommand to run; stdio when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Stdio)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve line-delimited JSON-RPC on stdin/stdout. Only absolute file paths are accepted.
    Stdio,
    /// Serve HTTP. Relative file paths resolve inside the files directory.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CsvArgs {
    /// Data rows sampled when inferring column types.
    #[arg(
        long = "infer-schema-length",
        value_name = "ROWS",
        env = "CSVQ_INFER_SCHEMA_LENGTH",
        default_value_t = DEFAULT_INFER_SCHEMA_LENGTH,
        value_parser = parse_infer_schema_length,
        global = true
    )]
    pub infer_schema_length: usize,
    /// Field delimiter, a single ASCII character (`\t` and `tab` are accepted).
    #[arg(
        long,
        value_name = "CHAR",
        default_value = ",",
        value_parser = parse_delimiter,
        global = true
    )]
    pub delimiter: u8,
    /// Additional case-insensitive token read as null, e.g. `NA`.
    #[arg(long = "null-token", value_name = "TOKEN", global = true)]
    pub null_token: Option<String>,
}

impl CsvArgs {
    pub fn read_options(&self) -> CsvReadOptions {
        CsvReadOptions {
            delimiter: self.delimiter,
            max_read_records: Some(self.infer_schema_length),
            null_token: self.null_token.clone(),
            ..CsvReadOptions::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Lowercase unquoted identifiers before resolving them. Mixed-case headers then need
    /// double quotes, e.g. `SELECT "Name" FROM self`.
    #[arg(long = "lowercase-identifiers", global = true)]
    pub lowercase_identifiers: bool,
}

impl QueryArgs {
    pub fn preserve_identifier_case(&self) -> bool {
        !self.lowercase_identifiers
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, value_name = "ADDR", env = "CSVQ_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,
    /// Directory relative file paths resolve against. Created when missing.
    #[arg(
        long = "files-path",
        value_name = "DIR",
        env = "FILES_PATH",
        default_value = DEFAULT_FILES_PATH
    )]
    pub files_path: PathBuf,
}

impl ServeArgs {
    /// Create the files directory if needed and build a scoped policy over its absolute path.
    pub fn scoped_policy(&self) -> Result<AccessPolicy, ConfigError> {
        let files_path_error = |source| ConfigError::FilesPath {
            path: self.files_path.clone(),
            source,
        };
        std::fs::create_dir_all(&self.files_path).map_err(files_path_error)?;
        let root = std::fs::canonicalize(&self.files_path).map_err(files_path_error)?;
        Ok(AccessPolicy::scoped(root)?)
    }
}

fn parse_infer_schema_length(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|err| format!("invalid schema inference length '{value}': {err}"))?;
    if parsed == 0 {
        return Err("schema inference length must be greater than zero".into());
    }
    Ok(parsed)
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "\\t" | "tab" => return Ok(b'\t'),
        _ => {}
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && c != '\n' && c != '\r' => Ok(c as u8),
        _ => Err(format!(
            "delimiter must be a single ASCII character, got '{value}'"
        )),
    }
}
