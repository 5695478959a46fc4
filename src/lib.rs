//! # tseitin-rs: boolean and bitvector constraints to CNF
//!
//! **`tseitin-rs`** compiles typed boolean/bitvector expressions into CNF, so an
//! off-the-shelf SAT engine can decide them.
//!
//! ## Pipeline
//!
//! 1. Build expressions through a [`Context`][crate::context::Context]. Every node is
//!    interned: structurally equal expressions share one [`Expr`][crate::reference::Expr] handle.
//! 2. Rewrite them with the passes in [`rewrite`]: simplification, decomposition
//!    of composite operators (`implies`, `ite`, `add`, `mul`), negation pushing and
//!    canonical operand ordering.
//! 3. Lower the result to clauses with the [`tseitin`] backend.
//! 4. Number the clauses densely ([`cnf`]) and hand them to a [`SatEngine`][crate::sat::SatEngine].
//! 5. Map the engine's model back to values of the original variables.
//!
//! Steps 2 to 5 are driven by [`Problem`][crate::solve::Problem].
//!
//! ## Basic Usage
//!
//! ```rust
//! use tseitin_rs::context::Context;
//! use tseitin_rs::sat::Varisat;
//! use tseitin_rs::solve::{Outcome, Problem};
//! use tseitin_rs::types::Valtype;
//!
//! let ctx = Context::default();
//!
//! // Two 3-bit unsigned integers whose 6-bit product is 35.
//! let p = ctx.mk_var("p", Valtype::bitvector(3)).unwrap();
//! let q = ctx.mk_var("q", Valtype::bitvector(3)).unwrap();
//! let product = ctx.apply_mul(p, q, 6).unwrap();
//! let n = ctx.mk_bv(6, 35u32).unwrap();
//!
//! let mut problem = Problem::new(&ctx);
//! problem.add(ctx.apply_eq(product, n).unwrap()).unwrap();
//!
//! let Outcome::Sat(model) = problem.solve(&mut Varisat).unwrap() else {
//!     panic!("35 = 5 * 7");
//! };
//! let p = model.get("p").unwrap().as_biguint().unwrap().clone();
//! let q = model.get("q").unwrap().as_biguint().unwrap().clone();
//! assert_eq!(p * q, 35u32.into());
//! ```
//!
//! ## Core Components
//!
//! - **[`types`]**: value domains ([`Valtype`][crate::types::Valtype]) and their bit-level encoding.
//! - **[`context`]**: the expression manager and pool.
//! - **[`ops`]**: the operator table: validation, typing, evaluation and rewrite rules.
//! - **[`rewrite`]**: rewrite passes over the expression DAG.
//! - **[`tseitin`]**: lowering to CNF.
//! - **[`cnf`]**, **[`dimacs`]**: numbered CNF and the DIMACS text format.
//! - **[`sat`]**, **[`solve`]**: the SAT engine adapter and the solving pipeline.
//! - **[`dot`]**: Graphviz rendering of expression DAGs.

pub mod cnf;
pub mod context;
pub mod dimacs;
pub mod dot;
pub mod error;
pub mod lit;
pub mod node;
pub mod ops;
pub mod reference;
pub mod rewrite;
pub mod sat;
pub mod solve;
pub mod table;
pub mod tseitin;
pub mod types;
pub mod utils;
