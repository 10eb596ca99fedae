use clap::{Arg, ArgAction, Command, ValueHint};
use clap_complete::{generate_to, shells::*};
use std::env;
use std::io::Error;

// Mirror of the command tree in src/main.rs
// Build scripts can't access src/ modules, so the definition is repeated here
fn input_arg() -> Arg {
    Arg::new("input")
        .required(true)
        .index(1)
        .value_hint(ValueHint::FilePath)
}

fn output_arg() -> Arg {
    Arg::new("output")
        .long("output")
        .short('o')
        .value_hint(ValueHint::FilePath)
}

fn main() -> Result<(), Error> {
    let outdir = match env::var_os("OUT_DIR") {
        None => return Ok(()),
        Some(outdir) => outdir,
    };

    let mut cmd = Command::new("chatmd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Render chat Markdown safely and capture rendered messages back to Markdown")
        .arg(
            Arg::new("config")
                .long("config")
                .value_hint(ValueHint::FilePath)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("render")
                .arg(input_arg())
                .arg(output_arg())
                .arg(
                    Arg::new("code-blocks")
                        .long("code-blocks")
                        .value_parser(["full", "placeholder"]),
                )
                .arg(
                    Arg::new("no-sanitize")
                        .long("no-sanitize")
                        .action(ArgAction::SetTrue),
                )
                .arg(Arg::new("timeout").long("timeout").value_hint(ValueHint::Other)),
        )
        .subcommand(Command::new("validate").arg(input_arg()))
        .subcommand(Command::new("extract").arg(input_arg()).arg(output_arg()))
        .subcommand(
            Command::new("restore")
                .arg(input_arg())
                .arg(
                    Arg::new("placeholders")
                        .long("placeholders")
                        .required(true)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(output_arg()),
        )
        .subcommand(Command::new("repair").arg(input_arg()).arg(output_arg()));

    // Generate completions for bash
    generate_to(Bash, &mut cmd, "chatmd", &outdir)?;

    // Generate completions for zsh
    generate_to(Zsh, &mut cmd, "chatmd", &outdir)?;

    // Generate completions for fish
    generate_to(Fish, &mut cmd, "chatmd", &outdir)?;

    println!("cargo:warning=Shell completions generated in {outdir:?}");

    Ok(())
}
