// Command-line interface for chatmd
//
// A thin shell over chatmd-babel. Every command reads one file (or stdin when
// the path is "-") and writes to stdout unless -o is given.
//
// Usage:
//  chatmd render <input.md> [-o FILE] [--code-blocks full|placeholder] [--no-sanitize] [--timeout MS]
//  chatmd validate <input.md>                    - ValidationResult as JSON
//  chatmd extract <input.html> [-o FILE]          - protected HTML + placeholders as JSON
//  chatmd restore <input.md> --placeholders FILE  - substitute placeholders back
//  chatmd repair <input.html>                     - repair emphasis eaten inside $...$
//
// Configuration is layered: embedded defaults, then ./chatmd.toml if present,
// then --config PATH, then command flags.
//
// Exit codes: 0 on success, 1 on an I/O or configuration error, 2 when render
// produced a failure result (the fallback is still printed).

mod error;

use chatmd_babel::{
    repair_math_emphasis, CapturePipeline, InputValidator, MarkdownRenderer, ProtectedHtml,
    RenderOptions,
};
use chatmd_config::{ChatmdConfig, Loader};
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use error::CliError;
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const CODE_BLOCK_MODES: &[&str] = &["full", "placeholder"];

fn input_arg(help: &'static str) -> Arg {
    Arg::new("input")
        .help(help)
        .required(true)
        .index(1)
        .value_hint(ValueHint::FilePath)
}

fn output_arg() -> Arg {
    Arg::new("output")
        .long("output")
        .short('o')
        .help("Output file path (defaults to stdout)")
        .value_hint(ValueHint::FilePath)
}

fn build_cli() -> Command {
    Command::new("chatmd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Render chat Markdown safely and capture rendered messages back to Markdown")
        .long_about(
            "chatmd moves chat content between Markdown and HTML without losing code,\n\
            tables or formulas.\n\n\
            Examples:\n  \
            chatmd render reply.md                         # Sanitized HTML to stdout\n  \
            chatmd render reply.md --code-blocks placeholder\n  \
            chatmd extract message.html -o protected.json  # Protect constructs\n  \
            chatmd restore converted.md --placeholders protected.json",
        )
        .arg_required_else_help(true)
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to a chatmd.toml configuration file")
                .value_hint(ValueHint::FilePath)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log pipeline steps to stderr")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("render")
                .about("Render Markdown to sanitized HTML")
                .arg(input_arg("Markdown file, or - for stdin"))
                .arg(output_arg())
                .arg(
                    Arg::new("code-blocks")
                        .long("code-blocks")
                        .help("How fenced code is rendered")
                        .value_parser(clap::builder::PossibleValuesParser::new(
                            CODE_BLOCK_MODES,
                        )),
                )
                .arg(
                    Arg::new("no-sanitize")
                        .long("no-sanitize")
                        .help("Skip the HTML allow-list pass")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("MS")
                        .help("Render deadline in milliseconds")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate Markdown and print the result as JSON")
                .arg(input_arg("Markdown file, or - for stdin")),
        )
        .subcommand(
            Command::new("extract")
                .about("Protect code, tables and formulas in rendered HTML")
                .arg(input_arg("HTML file, or - for stdin"))
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("restore")
                .about("Substitute placeholders back into converted Markdown")
                .arg(input_arg("Markdown file, or - for stdin"))
                .arg(
                    Arg::new("placeholders")
                        .long("placeholders")
                        .value_name("FILE")
                        .help("JSON written by `chatmd extract`")
                        .required(true)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("repair")
                .about("Repair emphasis markup that a converter inserted inside $...$")
                .arg(input_arg("HTML file, or - for stdin"))
                .arg(output_arg()),
        )
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let matches = build_cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    match run(&matches) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(matches: &ArgMatches) -> Result<ExitCode, CliError> {
    let config_path = matches.get_one::<String>("config").map(String::as_str);

    match matches.subcommand() {
        Some(("render", sub)) => handle_render(sub, config_path),
        Some(("validate", sub)) => handle_validate(sub, config_path),
        Some(("extract", sub)) => handle_extract(sub),
        Some(("restore", sub)) => handle_restore(sub),
        Some(("repair", sub)) => handle_repair(sub),
        _ => unreachable!("clap enforces a subcommand"),
    }
}

fn loader(explicit_path: Option<&str>) -> Loader {
    let loader = Loader::new().with_optional_file("chatmd.toml");
    match explicit_path {
        Some(path) => loader.with_file(path),
        None => loader,
    }
}

fn load_config(explicit_path: Option<&str>) -> Result<ChatmdConfig, CliError> {
    Ok(loader(explicit_path).build()?)
}

/// Config with the render command's flags layered on top
fn load_render_config(
    sub: &ArgMatches,
    explicit_path: Option<&str>,
) -> Result<ChatmdConfig, CliError> {
    let mut loader = loader(explicit_path);
    if let Some(mode) = sub.get_one::<String>("code-blocks") {
        loader = loader.set_override("render.code_block_mode", mode.as_str())?;
    }
    if sub.get_flag("no-sanitize") {
        loader = loader.set_override("render.sanitize", false)?;
    }
    if let Some(&ms) = sub.get_one::<u64>("timeout") {
        loader = loader.set_override("render.timeout_ms", i64::try_from(ms).unwrap_or(i64::MAX))?;
    }
    Ok(loader.build()?)
}

fn handle_render(sub: &ArgMatches, config_path: Option<&str>) -> Result<ExitCode, CliError> {
    let config = load_render_config(sub, config_path)?;
    let options = RenderOptions::from(&config.render);
    let renderer = MarkdownRenderer::new(Arc::new(config.breaker.build()));

    let markdown = read_input(input_path(sub))?;
    let result = renderer.render(&markdown, &options);
    write_output(sub, result.html())?;

    match result.error() {
        None => Ok(ExitCode::SUCCESS),
        Some(error) => {
            eprintln!("Render failed: {error}");
            Ok(ExitCode::from(2))
        }
    }
}

fn handle_validate(sub: &ArgMatches, config_path: Option<&str>) -> Result<ExitCode, CliError> {
    let config = load_config(config_path)?;
    let markdown = read_input(input_path(sub))?;
    let result = InputValidator::with_max_nesting_depth(config.render.max_nesting_depth)
        .validate(&markdown, config.render.max_input_size);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(ExitCode::SUCCESS)
}

fn handle_extract(sub: &ArgMatches) -> Result<ExitCode, CliError> {
    let html = read_input(input_path(sub))?;
    let protected = CapturePipeline::new().extract(&html);
    write_output(sub, &serde_json::to_string_pretty(&protected)?)?;
    Ok(ExitCode::SUCCESS)
}

fn handle_restore(sub: &ArgMatches) -> Result<ExitCode, CliError> {
    let markdown = read_input(input_path(sub))?;
    let path = sub
        .get_one::<String>("placeholders")
        .expect("placeholders is required");
    let json = read_input(path)?;
    let protected: ProtectedHtml =
        serde_json::from_str(&json).map_err(|source| CliError::Placeholders {
            path: path.clone(),
            source,
        })?;
    let restored = CapturePipeline::new().restore(&markdown, &protected);
    write_output(sub, &restored)?;
    Ok(ExitCode::SUCCESS)
}

fn handle_repair(sub: &ArgMatches) -> Result<ExitCode, CliError> {
    let html = read_input(input_path(sub))?;
    write_output(sub, &repair_math_emphasis(&html))?;
    Ok(ExitCode::SUCCESS)
}

fn input_path(sub: &ArgMatches) -> &str {
    sub.get_one::<String>("input")
        .map(String::as_str)
        .expect("input is required")
}

fn read_input(path: &str) -> Result<String, CliError> {
    if path == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_string(),
        source,
    })
}

fn write_output(sub: &ArgMatches, content: &str) -> Result<(), CliError> {
    match sub.get_one::<String>("output") {
        Some(path) => fs::write(path, content).map_err(|source| CliError::Write {
            path: path.clone(),
            source,
        }),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            Ok(())
        }
    }
}
