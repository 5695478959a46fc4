//! Knights and knaves.
//!
//! Knights always tell the truth, knaves always lie. On an island of `n`
//! inhabitants, inhabitant `i` says: "inhabitant `i+1` is a knave" (the last
//! one talks about the first). Who is what?

use clap::Parser;

use tseitin_rs::context::Context;
use tseitin_rs::dot::DotConfig;
use tseitin_rs::sat::Varisat;
use tseitin_rs::solve::all_models;
use tseitin_rs::types::Value;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of inhabitants.
    #[arg(value_name = "INT", default_value = "4")]
    n: usize,

    /// Print the constraints in DOT format.
    #[clap(long)]
    dot: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);

    let ctx = Context::default();
    let n = args.n.max(1);
    let knights = (0..n)
        .map(|i| ctx.mk_bool_var(&format!("knight{}", i)))
        .collect::<Result<Vec<_>, _>>()?;

    // A statement is true exactly when its speaker is a knight.
    let mut constraints = Vec::new();
    for i in 0..n {
        let claim = ctx.apply_not(knights[(i + 1) % n])?;
        constraints.push(ctx.apply_eq(knights[i], claim)?);
    }
    for &c in &constraints {
        println!("{}", ctx.to_bracket_string(c));
    }

    if args.dot {
        let config = DotConfig {
            show_valtypes: true,
            ..DotConfig::default()
        };
        println!("{}", ctx.to_dot_with_config(&constraints, &config)?);
    }

    let models = all_models(&ctx, &constraints, &mut Varisat, 16)?;
    println!("Found {} solution(s)", models.len());
    for model in &models {
        let line: Vec<&str> = model
            .values()
            .map(|(_, v)| if *v == Value::Bool(true) { "knight" } else { "knave" })
            .collect();
        println!("{}", line.join(" "));
    }

    Ok(())
}
