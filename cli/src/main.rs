use clap::Parser;
use skua_compiler::{Options, Render, Translator};
use std::io::{self, Read};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// Search-request translator: prints the SQL plan for a `_search` body.
struct Args {
    #[arg(short, long)]
    /// Path to the schema JSON file
    schema: String,
    #[arg(short, long)]
    /// Table the request targets
    table: String,
    /// The request body to translate. If empty, stdin will be used.
    request: Option<String>,
}

/// Get the request from the CLI argument if it exists, otherwise read it from stdin
fn get_request_body(args: &mut Args) -> io::Result<String> {
    match std::mem::take(&mut args.request) {
        Some(request) => Ok(request),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let mut args = Args::parse();
    let body = match get_request_body(&mut args) {
        Ok(body) => body,
        Err(err) => {
            eprintln!("cannot read request body: {err}");
            return ExitCode::FAILURE;
        }
    };
    let schema_json = match std::fs::read_to_string(&args.schema) {
        Ok(schema_json) => schema_json,
        Err(err) => {
            eprintln!("cannot read schema {}: {err}", args.schema);
            return ExitCode::FAILURE;
        }
    };
    let translator = match Translator::new(&schema_json, Options::default()) {
        Ok(translator) => translator,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    match translator.translate(&args.table, &body) {
        Ok(plan) => {
            for entry in &plan.entries {
                println!("{};", entry.render(translator.dialect()));
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
