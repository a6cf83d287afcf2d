use std::{env::args, path::PathBuf, str::FromStr};

use anyhow::{anyhow, bail, Context};
use pegc::{
    codegen::{constants::Constants, listing::list_rule},
    CompileError, Grammar, Options, Passes,
};
use serde::Serialize;

const USAGE: &str =
    "usage: pegc <grammar.json> [--options FILE] [--start-rule NAME]... [--emit ast|bytecode|listing|json]";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Emit {
    Ast,
    Bytecode,
    Listing,
    Json,
}

impl FromStr for Emit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ast" => Ok(Emit::Ast),
            "bytecode" => Ok(Emit::Bytecode),
            "listing" => Ok(Emit::Listing),
            "json" => Ok(Emit::Json),
            _ => bail!("Unknown output kind `{s}`, expected one of ast, bytecode, listing, json"),
        }
    }
}

struct Args {
    grammar: PathBuf,
    options: Option<PathBuf>,
    start_rules: Vec<String>,
    emit: Emit,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut grammar = None;
    let mut options = None;
    let mut start_rules = Vec::new();
    let mut emit = Emit::Json;

    let mut iter = args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .with_context(|| format!("Expected an argument to {flag}"))
        };
        match arg.as_str() {
            "--options" => options = Some(PathBuf::from(value("--options")?)),
            "--start-rule" => start_rules.push(value("--start-rule")?),
            "--emit" => emit = value("--emit")?.parse()?,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            _ if arg.starts_with("--") => bail!("Unknown flag `{arg}`\n{USAGE}"),
            _ if grammar.is_some() => bail!("Only one grammar may be provided"),
            _ => grammar = Some(PathBuf::from(&arg)),
        }
    }

    let Some(grammar) = grammar else {
        bail!("No grammar provided\n{USAGE}");
    };
    Ok(Args {
        grammar,
        options,
        start_rules,
        emit,
    })
}

#[derive(Serialize)]
struct RuleOutput<'a> {
    name: &'a str,
    bytecode: &'a [u32],
}

/// What a code emitter needs to produce a parser.
#[derive(Serialize)]
struct Output<'a> {
    rules: Vec<RuleOutput<'a>>,
    #[serde(flatten)]
    constants: &'a Constants,
}

fn init_logging() -> anyhow::Result<()> {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_owned());
    let level = log::LevelFilter::from_str(&level)
        .map_err(|_| anyhow!("Invalid RUST_LOG level `{level}`"))?;

    simplelog::TermLogger::init(
        level,
        simplelog::ConfigBuilder::new()
            .set_time_format_custom(&[])
            .build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Never,
    )
    .map_err(|err| anyhow!("Failed to initialize logging: {err}"))
}

fn load(args: &Args) -> anyhow::Result<(Grammar, Options)> {
    let path = &args.grammar;
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read `{}`", path.display()))?;
    let grammar: Grammar = serde_json::from_str(&src)
        .with_context(|| format!("Failed to parse grammar `{}`", path.display()))?;

    let mut options = match &args.options {
        Some(path) => {
            let src = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read options `{}`", path.display()))?;
            serde_json::from_str(&src)
                .with_context(|| format!("Failed to parse options `{}`", path.display()))?
        }
        None => Options::default(),
    };
    apply_overrides(&mut options, args);
    Ok((grammar, options))
}

/// Flags take precedence over the options file.
fn apply_overrides(options: &mut Options, args: &Args) {
    if !args.start_rules.is_empty() {
        options.allowed_start_rules = Some(args.start_rules.clone());
    }
}

fn run() -> anyhow::Result<()> {
    let args = parse_args()?;
    let (mut grammar, options) = load(&args)?;
    log::debug!("loaded {} rules from {}", grammar.rules.len(), args.grammar.display());

    pegc::compile(&mut grammar, &Passes::default(), options).map_err(|err| match err {
        CompileError::Grammar(err) => anyhow!("{}", err.report().trim_end()),
        CompileError::Options(err) => anyhow::Error::new(err).context("Invalid options"),
    })?;

    match args.emit {
        Emit::Ast => print!("{}", grammar.display_string()),
        Emit::Bytecode => {
            for rule in &grammar.rules {
                let bytecode = rule.bytecode.as_deref().unwrap_or_default();
                let words: Vec<_> = bytecode.iter().map(u32::to_string).collect();
                println!("{}: [{}]", rule.name, words.join(", "));
            }
        }
        Emit::Listing => {
            for rule in &grammar.rules {
                let listing = list_rule(&grammar, rule)
                    .map_err(|err| anyhow!("{}", err.report().trim_end()))?;
                println!("{listing}\n");
            }
        }
        Emit::Json => {
            let constants = grammar
                .constants
                .as_ref()
                .context("The pipeline produced no constants")?;
            let output = Output {
                rules: grammar
                    .rules
                    .iter()
                    .map(|rule| RuleOutput {
                        name: &rule.name,
                        bytecode: rule.bytecode.as_deref().unwrap_or_default(),
                    })
                    .collect(),
                constants,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn main() {
    if let Err(err) = init_logging() {
        eprintln!("{err:#}");
    }
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
