//! Reduce and solve PACE-format Steiner tree instances from the command line.
//! Results go to stdout, progress and errors to stderr.

use std::error::Error;
use std::time::{Duration, Instant};
use std::{env, fs, process};

use steiner_reduce::{DreyfusWagner, Graph, Reducer, TakahashiMatsuyama};

/// Above this many terminals the exact solver is hopeless; fall back to the
/// heuristic.
const EXACT_TERMINAL_LIMIT: usize = 16;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.len() != 2 {
        eprintln!("usage: {{stats, reduce, solve}} <FILENAME>");
        process::exit(1);
    }
    let filename = &args[1];
    eprintln!("reading graph...");
    let content = fs::read_to_string(filename)?;
    let graph: Graph = content.parse()?;
    match &args[0] as &str {
        "stats" => {
            let stats = GraphStatistics::new(&graph);
            println!(
                "{fp}, {nn}, {ne}, {nt}, {ad:.2}, {md}, {Md}",
                fp = filename,
                nn = stats.num_nodes,
                ne = stats.num_edges,
                nt = stats.num_terminals,
                ad = stats.average_degree,
                md = stats.min_degree,
                Md = stats.max_degree,
            );
        }
        "reduce" => {
            let mut reducer = Reducer::new(&graph)?;
            let (_, time) = measure_time(|| reducer.reduce_fast());
            eprintln!("reduction took {:?}", time);
            println!(
                "{}, {} -> {} nodes, {} -> {} edges, {} -> {} terminals, {} inserted",
                filename,
                graph.num_nodes(),
                reducer.graph().num_nodes(),
                graph.num_edges(),
                reducer.graph().num_edges(),
                graph.num_terminals(),
                reducer.terminals().len(),
                reducer.cost_inserted(),
            );
        }
        "solve" => {
            let mut reducer = Reducer::new(&graph)?;
            let (_, reduce_time) = measure_time(|| reducer.reduce_fast());
            eprintln!(
                "reduced to {} nodes / {} edges in {:?}",
                reducer.graph().num_nodes(),
                reducer.graph().num_edges(),
                reduce_time
            );
            let exact = reducer.terminals().len() <= EXACT_TERMINAL_LIMIT;
            let ((weight, solution), solve_time) = measure_time(|| {
                if exact {
                    reducer.solve(&DreyfusWagner)
                } else {
                    eprintln!("too many terminals for the exact solver, approximating");
                    reducer.solve(&TakahashiMatsuyama)
                }
            });
            eprintln!("solving took {:?}", solve_time);
            if !weight.is_finite() {
                eprintln!("the terminals cannot be connected");
                process::exit(1);
            }
            println!("VALUE {}", weight.finite_value());
            for &i in &solution.edges {
                let (a, b, _) = graph.edges().nth(i).expect("solution edge exists");
                println!("E {} {}", a + 1, b + 1);
            }
        }
        arg => {
            eprintln!("invalid argument: {}", arg);
            eprintln!("expected one of: stats, reduce, solve");
            process::exit(1);
        }
    }
    Ok(())
}

struct GraphStatistics {
    num_nodes: usize,
    num_edges: usize,
    num_terminals: usize,
    average_degree: f64,
    min_degree: usize,
    max_degree: usize,
}

impl GraphStatistics {
    fn new(graph: &Graph) -> Self {
        let degrees = graph
            .node_indices()
            .map(|ni| graph.neighbors(ni).count())
            .collect::<Vec<_>>();
        let average_degree = degrees.iter().sum::<usize>() as f64 / degrees.len() as f64;
        Self {
            num_nodes: graph.num_nodes(),
            num_edges: graph.num_edges(),
            num_terminals: graph.num_terminals(),
            average_degree,
            min_degree: degrees.iter().min().copied().unwrap_or(0),
            max_degree: degrees.iter().max().copied().unwrap_or(0),
        }
    }
}

// measure running time of a closure
fn measure_time<F: FnOnce() -> R, R>(closure: F) -> (R, Duration) {
    let before = Instant::now();
    let result = closure();
    (result, before.elapsed())
}
