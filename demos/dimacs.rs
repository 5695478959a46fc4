use std::path::PathBuf;

use clap::Parser;

use tseitin_rs::cnf::Cnf;
use tseitin_rs::sat::{SatEngine, Varisat};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Input file in DIMACS CNF format.
    #[arg(value_name = "FILE")]
    path: PathBuf,

    /// Print the model as a DIMACS `v` line.
    #[clap(long)]
    model: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let cnf = Cnf::load(&args.path)?;
    println!("Loaded {} variables and {} clauses", cnf.num_vars, cnf.num_clauses());

    match Varisat.solve_cnf(&cnf)? {
        Some(model) => {
            assert!(cnf.eval(&model));
            println!("s SATISFIABLE");
            if args.model {
                let lits: Vec<String> = (1..=cnf.num_vars)
                    .map(|v| if model[v] { v.to_string() } else { format!("-{}", v) })
                    .collect();
                println!("v {} 0", lits.join(" "));
            }
        }
        None => println!("s UNSATISFIABLE"),
    }

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
