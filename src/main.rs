//! AOMDD bucket-elimination compiler: compiles a UAI factor network into
//! an AND/OR multi-valued decision diagram and answers P(e) queries.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use num_bigint::BigUint;

use aomdd::graph::graphviz::pseudo_tree_dot;
use aomdd::input::order::{parse_evidence, parse_order};
use aomdd::input::uai::Model;
use aomdd::{Assignment, BucketTree, CompileBucketTree, Graph, NodeManager, PseudoTree, Scope};

/// Compiled output beyond this many tuples is not printed or verified.
const OUTPUT_COMPLEXITY_LIMIT: u64 = 2048;

#[derive(Parser, Debug)]
#[command(name = "aomdd")]
#[command(about = "AND/OR multi-valued decision diagram compiler", long_about = None)]
struct Args {
    /// Problem file in UAI format
    #[arg(short = 'f', value_name = "FILE")]
    input: PathBuf,

    /// Elimination ordering file
    #[arg(short = 'o', value_name = "FILE")]
    ordering: PathBuf,

    /// Evidence file
    #[arg(short = 'e', value_name = "FILE")]
    evidence: Option<PathBuf>,

    /// Write the generated pseudo tree to a Graphviz DOT file
    #[arg(short = 't', value_name = "FILE")]
    dot: Option<PathBuf>,

    /// Compile the full AOMDD
    #[arg(short = 'c')]
    compile: bool,

    /// Compute P(e)
    #[arg(short = 'p')]
    pe: bool,

    /// Use vanilla (dense) bucket elimination
    #[arg(long)]
    vbe: bool,

    /// Operate in log space
    #[arg(long)]
    log: bool,

    /// Compare the compiled diagram against the raw tables
    #[arg(long)]
    verify: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    println!("Reading from input file: {}", args.input.display());
    let mut model = Model::parse_uai(&args.input)?;

    println!("Reading from ordering file: {}", args.ordering.display());
    let ordering = parse_order(&args.ordering)?;

    let mut evidence_pairs = Vec::new();
    if let Some(path) = &args.evidence {
        println!("Reading from evidence file: {}", path.display());
        evidence_pairs = parse_evidence(path)?;
        for &(var, val) in &evidence_pairs {
            println!("{} {}", var.0, val);
        }
    }

    if ordering.len() != model.num_vars {
        return Err(format!(
            "ordering lists {} variables, model has {}",
            ordering.len(),
            model.num_vars
        )
        .into());
    }

    model.set_ordering(&ordering);

    let graph = Graph::new(model.num_vars, &model.scopes());
    let pt = PseudoTree::new(&graph, &ordering);
    println!("w/h : {}/{}", pt.induced_width(), pt.height());

    if let Some(path) = &args.dot {
        println!("Writing pseudo tree to: {}", path.display());
        fs::write(path, pseudo_tree_dot(&pt))?;
    }

    let mut evidence = Assignment::new(&Scope::new());
    for &(var, val) in &evidence_pairs {
        if var.0 < 0 || var.0 as usize >= model.num_vars {
            return Err(format!("evidence variable {} does not exist", var.0).into());
        }
        evidence.add_var(var, model.domains[var.0 as usize]);
        if !evidence.set_val(var, val) {
            return Err(format!(
                "evidence value {} out of range for variable {}",
                val, var.0
            )
            .into());
        }
    }

    let mut mgr = NodeManager::default();
    let cbt = CompileBucketTree::new(&mut mgr, &model.functions, &pt, &ordering, evidence.clone());

    let mut compiled = None;
    if args.compile {
        let mut combined = cbt.compile(&mut mgr);
        if !evidence_pairs.is_empty() {
            combined.condition(&mut mgr, &evidence);
        }
        let total_card = combined.scope().card_exact();
        println!("Total complexity: {}", total_card);
        if total_card <= BigUint::from(OUTPUT_COMPLEXITY_LIMIT) {
            println!("{}", combined.save(&mgr));
            println!("{}", combined.print_as_table(&mgr));
        }
        let (num_meta, num_and) = combined.size(&mgr);
        println!("AOMDD size: ({}, {})", num_meta, num_and);
        log::info!("{:?}", mgr);
        compiled = Some(combined);
    }

    if args.pe {
        let pr = if args.vbe {
            BucketTree::new(&model.functions, &ordering, &evidence).prob(args.log)
        } else {
            cbt.prob(&mut mgr, args.log)
        };
        let prefix = if args.log { "log P(e) = " } else { "P(e) = " };
        println!("{}{}", prefix, pr);
    }

    if args.verify {
        if let Some(combined) = &compiled {
            verify(&mgr, combined, &model, args.log);
        } else {
            eprintln!("-verify requires -c");
        }
    }

    Ok(())
}

/// Walk up to [OUTPUT_COMPLEXITY_LIMIT] full assignments and compare the
/// diagram's value with the product of the original tables.
fn verify(mgr: &NodeManager, combined: &aomdd::AomddFunction, model: &Model, log_out: bool) {
    let mut a = Assignment::new(&model.complete_scope);
    a.set_all(0);
    for _ in 0..OUTPUT_COMPLEXITY_LIMIT {
        let compiled_val = combined.get_val(mgr, &a, log_out);
        let mut flat_val = if log_out { 0.0 } else { 1.0 };
        for tf in &model.functions {
            if log_out {
                flat_val += tf.get_val(&a, true);
            } else {
                flat_val *= tf.get_val(&a, false);
            }
        }
        print!("cv={}, fv={}", compiled_val, flat_val);
        if (compiled_val - flat_val).abs() > 1e-20 {
            println!("...not matching!");
        } else {
            println!();
        }
        if !a.iterate() {
            break;
        }
    }
}
