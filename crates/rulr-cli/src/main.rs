use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use rulr::{
    automaton::{Automaton, AugmentedGrammar},
    lalr,
    table::ParseTable,
};
use std::{fs, path::PathBuf, time::Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The automaton construction to drive the table from.
    #[arg(long, value_enum, default_value_t = LRAlgorithm::Lalr)]
    algorithm: LRAlgorithm,

    /// Specify the path of the exported parse table.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the FIRST/FOLLOW sets to stdout.
    #[arg(long)]
    dump_sets: bool,

    /// Print the item sets of every state to stdout.
    #[arg(long)]
    dump_states: bool,

    /// The path of the grammar document.
    input: PathBuf,
}

#[derive(Debug, Copy, Clone, PartialEq, ValueEnum)]
enum LRAlgorithm {
    Canonical,
    Lalr,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!("parsed CLI args = {:?}", args);

    process_file(&args)
        .with_context(|| anyhow::anyhow!("errored during processing {}", args.input.display()))?;

    Ok(())
}

fn process_file(args: &Args) -> anyhow::Result<()> {
    let in_file = fs::canonicalize(&args.input) //
        .context("failed to canonicalize the input file name")?;

    let out_file = args
        .output
        .clone()
        .unwrap_or_else(|| in_file.with_extension("table.json"));

    let s = Instant::now();
    let grammar = rulr::syntax::parse_file(&in_file)?;
    tracing::info!("parse_file: {:?} elapsed", s.elapsed());

    let mut idle_variables = vec![];
    for variable in grammar.variables() {
        if grammar.bodies_of(variable).is_empty() {
            idle_variables.push(variable.clone());
        }
    }
    if !idle_variables.is_empty() {
        println!(
            "[warning] The following variables have no associated production rule: {:?}",
            idle_variables
        );
    }

    let grammar = AugmentedGrammar::new(grammar);

    if args.dump_sets {
        print!("{}", grammar.grammar().display_first_sets());
        print!("{}", grammar.follow());
    }

    let s = Instant::now();
    let automaton = Automaton::build(&grammar)?;
    let automaton = match args.algorithm {
        LRAlgorithm::Canonical => automaton,
        LRAlgorithm::Lalr => lalr::merge(&automaton),
    };
    tracing::info!("build_automaton: {:?} elapsed", s.elapsed());

    if args.dump_states {
        println!("{}", automaton.display(&grammar));
    }

    let s = Instant::now();
    let table = ParseTable::build(&grammar, &automaton)?;
    tracing::info!("build_table: {:?} elapsed", s.elapsed());

    let exported = serde_json::to_string_pretty(&table) //
        .context("failed to serialize the parse table")?;
    fs::write(&out_file, exported).with_context(|| {
        anyhow::anyhow!("failed to write exported table to {}", out_file.display())
    })?;

    Ok(())
}
