use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use nbprov_cli::{graph_from_notebook, read_notebook, render_plan, render_tree, CheckReport};
use nbprov_core::{NodeId, TraversalPlan};
use nbprov_notebook::config::DEFAULT_METADATA_KEY;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn file_arg() -> Arg {
    Arg::new("file")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Notebook file (.ipynb JSON)")
}

fn key_arg() -> Arg {
    Arg::new("key")
        .long("key")
        .default_value(DEFAULT_METADATA_KEY)
        .help("Metadata key holding the provenance graph")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn cli() -> Command {
    Command::new("nbprov")
        .version(nbprov_core::VERSION)
        .about("Inspect notebook provenance graphs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging unless RUST_LOG is set"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("show")
                .about("Print the history tree, current node marked with *")
                .arg(file_arg())
                .arg(key_arg()),
        )
        .subcommand(
            Command::new("plan")
                .about("Print the steps a traversal from the current node would run")
                .arg(file_arg())
                .arg(key_arg())
                .arg(
                    Arg::new("to")
                        .long("to")
                        .required(true)
                        .value_parser(value_parser!(NodeId))
                        .help("Target node id"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Validate the stored snapshot and summarize it")
                .arg(file_arg())
                .arg(key_arg())
                .arg(json_arg()),
        )
}

fn init_tracing(matches: &ArgMatches) {
    let default = if matches.get_flag("verbose") { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if matches.get_flag("log-json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn load(args: &ArgMatches) -> Result<nbprov_core::ProvenanceGraph> {
    let path = args.get_one::<PathBuf>("file").context("missing file")?;
    let key = args.get_one::<String>("key").context("missing key")?;
    let notebook = read_notebook(path).await?;
    let graph = graph_from_notebook(&notebook, key)?;
    tracing::debug!(file = %path.display(), nodes = graph.len(), "loaded provenance graph");
    Ok(graph)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(&matches);

    match matches.subcommand() {
        Some(("show", args)) => {
            let graph = load(args).await?;
            print!("{}", render_tree(&graph));
        }
        Some(("plan", args)) => {
            let graph = load(args).await?;
            let target = *args.get_one::<NodeId>("to").context("missing --to")?;
            if args.get_flag("json") {
                let plan = TraversalPlan::compute(&graph, target)?;
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                match render_plan(&graph, target) {
                    Ok(text) => print!("{text}"),
                    Err(err) => {
                        println!("blocked: {err}");
                        std::process::exit(1);
                    }
                }
            }
        }
        Some(("check", args)) => {
            let graph = load(args).await?;
            let report = CheckReport::new(&graph);
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render());
            }
        }
        _ => {}
    }
    Ok(())
}
