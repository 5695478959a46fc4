use clap::Parser;
use num_bigint::BigUint;

use tseitin_rs::context::Context;
use tseitin_rs::sat::Varisat;
use tseitin_rs::solve::{all_models, Outcome, Problem};
use tseitin_rs::types::Valtype;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number to factor.
    #[arg(value_name = "INT", default_value = "143")]
    n: u64,

    /// Pool size (in bits, so the initial number of buckets is `2^size`).
    #[clap(long, value_name = "INT", default_value = "16")]
    size: usize,

    /// Enumerate all factorizations instead of stopping at the first one.
    #[clap(long)]
    all: bool,

    /// Write the CNF to this file instead of solving.
    #[clap(long, value_name = "PATH")]
    dimacs: Option<std::path::PathBuf>,
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

    let n = args.n;
    let width = (u64::BITS - n.leading_zeros()).max(1);
    println!("Factoring n = {} ({} bits)", n, width);

    let ctx = Context::new(args.size);

    // n = p * q, with both factors of `width` bits and neither equal to 1.
    let p = ctx.mk_var("p", Valtype::bitvector(width))?;
    let q = ctx.mk_var("q", Valtype::bitvector(width))?;
    let one = ctx.mk_bv(width, 1u32)?;
    let target = ctx.mk_bv(2 * width, n)?;
    let product = ctx.apply_mul(p, q, 2 * width)?;
    let constraints = vec![
        ctx.apply_eq(product, target)?,
        ctx.apply_not(ctx.apply_eq(p, one)?)?,
        ctx.apply_not(ctx.apply_eq(q, one)?)?,
    ];
    println!(
        "Total {} constraints of total size {}",
        constraints.len(),
        ctx.descendants(constraints.iter().copied()).len()
    );

    let mut problem = Problem::new(&ctx);
    for &c in &constraints {
        problem.add(c)?;
    }

    if let Some(path) = &args.dimacs {
        let cnf = problem.compile()?;
        cnf.save(path)?;
        println!("Wrote {} variables and {} clauses to {}", cnf.num_vars, cnf.num_clauses(), path.display());
        return Ok(());
    }

    if args.all {
        let models = all_models(&ctx, &constraints, &mut Varisat, usize::MAX)?;
        for model in &models {
            println!("{} = {} * {}", n, model.get("p").unwrap(), model.get("q").unwrap());
        }
        if models.is_empty() {
            println!("{} is prime", n);
        }
    } else {
        match problem.solve(&mut Varisat)? {
            Outcome::Sat(model) => {
                let p = model.get("p").and_then(|v| v.as_biguint()).cloned().unwrap_or_default();
                let q = model.get("q").and_then(|v| v.as_biguint()).cloned().unwrap_or_default();
                assert_eq!(&p * &q, BigUint::from(n));
                println!("{} = {} * {}", n, p, q);
            }
            Outcome::Unsat => println!("{} is prime", n),
        }
    }
    println!("ctx = {:?}", ctx);

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
