//! Cellscope - resolve spreadsheet references and evaluate formulas from the command line

mod config;
mod error;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cellscope_core::Workbook;
use cellscope_core::storage::parse_grd;
use cellscope_engine::engine::{CellRef, Value};
use cellscope_engine::provider::{ParserSelector, SpreadsheetParserProvider};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    eprintln!("Usage: cellscope [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [FILE]                      Workbook file to load (.grd)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -r, --resolve <REF>         Resolve a cell, range, label or value (can be repeated)");
    eprintln!("  -c, --command <FORMULA>     Evaluate a formula and print the result");
    eprintln!("  -p, --parse <SELECTOR> <TEXT>");
    eprintln!("                              Parse text with a parser, e.g. 'date-parse-pattern %Y-%m-%d'");
    eprintln!("  --list-parsers              List the available parsers");
    eprintln!("  --config <FILE>             Read configuration from FILE");
    eprintln!("  --no-config                 Ignore the user configuration file");
    eprintln!("  -h, --help                  Print help");
}

#[derive(Debug, Default)]
struct Options {
    file_path: Option<PathBuf>,
    resolve: Vec<String>,
    command: Option<String>,
    parse: Option<(String, String)>,
    list_parsers: bool,
    config_path: Option<PathBuf>,
    no_config: bool,
}

impl Options {
    fn has_action(&self) -> bool {
        !self.resolve.is_empty()
            || self.command.is_some()
            || self.parse.is_some()
            || self.list_parsers
    }
}

/// `Ok(None)` means help was requested.
fn parse_args(args: &[String]) -> std::result::Result<Option<Options>, String> {
    let mut options = Options::default();

    let value = |i: usize, flag: &str, what: &str| -> std::result::Result<String, String> {
        args.get(i)
            .cloned()
            .ok_or_else(|| format!("{} requires {}", flag, what))
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "-h" | "--help" => return Ok(None),
            "-r" | "--resolve" => {
                i += 1;
                options.resolve.push(value(i, flag, "a reference")?);
            }
            "-c" | "--command" => {
                i += 1;
                options.command = Some(value(i, flag, "a formula")?);
            }
            "-p" | "--parse" => {
                let selector = value(i + 1, flag, "a selector and text")?;
                let text = value(i + 2, flag, "a selector and text")?;
                options.parse = Some((selector, text));
                i += 2;
            }
            "--list-parsers" => options.list_parsers = true,
            "--config" => {
                i += 1;
                options.config_path = Some(PathBuf::from(value(i, flag, "a file path")?));
            }
            "--no-config" => options.no_config = true,
            arg if arg.starts_with('-') => return Err(format!("Unknown option: {}", arg)),
            arg => {
                if options.file_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                options.file_path = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    Ok(Some(options))
}

fn init_logging(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print a result one line per list item; blank for null.
fn print_value(value: &Option<Value>) {
    match value {
        None => println!(),
        Some(Value::List(items)) => {
            for item in items {
                print_value(item);
            }
        }
        Some(value) => println!("{}", value),
    }
}

/// Cells in row-major order with their displayed values.
fn print_workbook(workbook: &Workbook) {
    let mut cells: Vec<CellRef> = workbook
        .grid()
        .iter()
        .map(|entry| entry.key().clone())
        .collect();
    cells.sort_by(|a, b| a.row.cmp(&b.row).then(a.col.cmp(&b.col)));
    for cell in cells {
        println!("{}: {}", cell, workbook.cell_display(&cell));
    }
}

fn parse_text(
    provider: &Arc<dyn SpreadsheetParserProvider>,
    selector: &str,
    text: &str,
) -> Result<Value> {
    let selector = ParserSelector::parse(selector)?;
    let parser = provider.spreadsheet_parser(&selector)?;
    debug!(%selector, resolved = %parser.selector(), "parsing");
    Ok(parser.parse(text)?)
}

/// Returns whether every requested action succeeded.
fn run(options: &Options) -> Result<bool> {
    let (config, mut warnings) = if options.no_config && options.config_path.is_none() {
        (config::Config::default(), Vec::new())
    } else {
        config::load_config(options.config_path.as_deref())
    };
    init_logging(config.logging.filter.as_deref());

    let workbook = match &options.file_path {
        Some(path) => parse_grd(path).with_context(|| format!("loading {}", path.display()))?,
        None => Workbook::new(),
    };
    warnings.extend(config.apply_environment(&workbook));

    let (provider, alias_warning) = config.parser_provider();
    warnings.extend(alias_warning);

    for warning in &warnings {
        warn!("{}", warning);
    }

    if !options.has_action() {
        print_workbook(&workbook);
        return Ok(true);
    }

    let mut ok = true;

    if options.list_parsers {
        for info in provider.spreadsheet_parser_infos().iter() {
            println!("{}", info);
        }
    }

    for reference in &options.resolve {
        match workbook.resolve_text(reference) {
            Ok(value) => print_value(&value),
            Err(err) => {
                println!("#ERR: {}", err);
                ok = false;
            }
        }
    }

    if let Some(formula) = &options.command {
        match workbook.evaluate(formula) {
            Ok(value) => print_value(&value),
            Err(err) => {
                println!("#ERR: {}", err);
                ok = false;
            }
        }
    }

    if let Some((selector, text)) = &options.parse {
        match parse_text(&provider, selector, text) {
            Ok(value) => println!("{}", value),
            Err(err) => {
                println!("#ERR: {}", err);
                ok = false;
            }
        }
    }

    Ok(ok)
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return;
        }
        Err(message) => {
            eprintln!("Error: {}", message);
            print_usage();
            std::process::exit(1);
        }
    };

    if !options.has_action() && options.file_path.is_none() {
        print_usage();
        std::process::exit(1);
    }

    match run(&options) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
