use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use packlift::driver::{run_invocation, Invocation};
use packlift::loader::ContentLoader;
use packlift::registry::SchemaRegistry;
use packlift::runners::RunnerRegistry;

#[derive(Parser, Debug)]
#[command(name="packlift", version, about="Run pack actions from event payloads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Verbose logs
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an action against an event payload
    Run(RunArgs),
    /// List installed actions and registered runner types
    List {
        #[arg(long)]
        packs_dir: Option<String>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Action ref like pack.name (falls back to PACKLIFT_ACTION)
    #[arg(long)]
    action: Option<String>,
    /// Event JSON: inline, @file, or '-' for stdin (falls back to PACKLIFT_EVENT)
    #[arg(long)]
    event: Option<String>,
    /// Caller params as a JSON object (falls back to PACKLIFT_PARAMETERS)
    #[arg(long)]
    params: Option<String>,
    /// Pack config as a JSON object (falls back to PACKLIFT_CONFIG)
    #[arg(long)]
    config: Option<String>,
    /// Output-rendering template as a JSON object (falls back to PACKLIFT_OUTPUT)
    #[arg(long)]
    output: Option<String>,
    /// Content root holding the packs (falls back to PACKLIFT_PACKS_DIR)
    #[arg(long)]
    packs_dir: Option<String>,
    /// Echo resolved action params back instead of running the real runner
    #[arg(long)]
    passthrough: bool,
    /// Debug logging, plus log_level=DEBUG for the runner
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let debug = match &cli.command {
        Commands::Run(args) => args.debug || env_flag("PACKLIFT_DEBUG"),
        _ => false,
    };
    let filter = if debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("PACKLIFT_LOG").unwrap_or_else(|_| filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run(args) => cmd_run(args).await?,
        Commands::List { packs_dir } => cmd_list(packs_dir)?,
    }
    Ok(())
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let action = select(args.action, "PACKLIFT_ACTION")
        .ok_or_else(|| anyhow!("no action given: pass --action or set PACKLIFT_ACTION"))?;

    let params = select(args.params, "PACKLIFT_PARAMETERS")
        .map(|raw| parse_json_arg("params", &raw))
        .transpose()?;
    let config = select(args.config, "PACKLIFT_CONFIG")
        .map(|raw| parse_json_arg("config", &raw))
        .transpose()?;
    let output_template = select(args.output, "PACKLIFT_OUTPUT")
        .map(|raw| parse_json_arg("output", &raw))
        .transpose()?;
    let debug = args.debug || env_flag("PACKLIFT_DEBUG");
    let event = read_event(args.event)?;

    let loader = ContentLoader::new(packs_root(args.packs_dir));
    let registry = SchemaRegistry::new(
        loader.load_actions()?,
        loader.load_runner_types(),
        loader.load_config_schemas()?,
    );
    let drivers = RunnerRegistry::builtin();

    let invocation = Invocation {
        action,
        params,
        config,
        output_template,
        passthrough: args.passthrough,
        debug,
    };
    let envelope = run_invocation(&registry, &drivers, loader.root(), event, &invocation).await?;

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn cmd_list(packs_dir: Option<String>) -> Result<()> {
    let loader = ContentLoader::new(packs_root(packs_dir));
    let registry = SchemaRegistry::new(
        loader.load_actions()?,
        loader.load_runner_types(),
        loader.load_config_schemas()?,
    );

    println!("actions:");
    for action_ref in registry.action_refs() {
        if let Ok(action) = registry.action(action_ref) {
            println!("  {action_ref}  ({})", action.runner_type);
        }
    }

    println!("runner types:");
    for name in registry.runner_type_names() {
        if let Ok(def) = registry.runner_type(name) {
            if def.aliases.is_empty() {
                println!("  {name}  -> {}", def.driver);
            } else {
                println!("  {name} ({})  -> {}", def.aliases.join(", "), def.driver);
            }
        }
    }
    Ok(())
}

fn packs_root(flag: Option<String>) -> PathBuf {
    select(flag, "PACKLIFT_PACKS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(ContentLoader::default_root)
}

fn select(flag: Option<String>, env: &str) -> Option<String> {
    flag.or_else(|| std::env::var(env).ok())
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).unwrap_or_default().to_lowercase().as_str(),
        "true" | "1"
    )
}

fn parse_json_arg(name: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("parsing --{name} as JSON"))
}

fn read_event(arg: Option<String>) -> Result<Value> {
    let raw = match select(arg, "PACKLIFT_EVENT") {
        Some(raw) => raw,
        None => return Ok(json!({})),
    };

    let text = if raw == "-" {
        use std::io::Read;
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else if let Some(path) = raw.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("reading event file '{path}'"))?
    } else {
        raw
    };

    // Hand the text over as a string event; the normalizer insists on JSON.
    Ok(Value::String(text))
}
