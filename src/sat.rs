//! SAT engine adapter.
//!
//! The core never decides satisfiability itself: it hands a numbered CNF to a
//! [`SatEngine`]. [`Varisat`] wraps the `varisat` CDCL solver.

use log::debug;

use crate::cnf::Cnf;
use crate::error::SolverError;

/// A complete SAT decision procedure over DIMACS-numbered clauses.
pub trait SatEngine {
    /// Decides `clauses` over variables `1..=num_vars`.
    ///
    /// Returns `Some(model)` with `model[v]` the value of variable `v`
    /// (index 0 unused), or `None` if the clauses are unsatisfiable.
    fn solve(&mut self, num_vars: usize, clauses: &[Vec<i32>]) -> Result<Option<Vec<bool>>, SolverError>;

    fn solve_cnf(&mut self, cnf: &Cnf) -> Result<Option<Vec<bool>>, SolverError> {
        self.solve(cnf.num_vars, &cnf.clauses)
    }
}

/// The `varisat` solver. A fresh solver instance is used for every call.
#[derive(Debug, Default, Copy, Clone)]
pub struct Varisat;

impl SatEngine for Varisat {
    fn solve(&mut self, num_vars: usize, clauses: &[Vec<i32>]) -> Result<Option<Vec<bool>>, SolverError> {
        use varisat::{CnfFormula, ExtendFormula, Lit, Solver};

        debug!("varisat: {} variables, {} clauses", num_vars, clauses.len());

        let mut formula = CnfFormula::new();
        formula.set_var_count(num_vars);
        for clause in clauses {
            let lits: Vec<Lit> = clause.iter().map(|&l| Lit::from_dimacs(l as isize)).collect();
            formula.add_clause(&lits);
        }

        let mut solver = Solver::new();
        solver.add_formula(&formula);

        match solver.solve() {
            Ok(true) => {
                let model = solver
                    .model()
                    .ok_or_else(|| SolverError("satisfiable, but no model available".to_string()))?;
                let mut values = vec![false; num_vars + 1];
                for lit in model {
                    let v = lit.var().to_dimacs() as usize;
                    if v <= num_vars {
                        values[v] = lit.is_positive();
                    }
                }
                Ok(Some(values))
            }
            Ok(false) => Ok(None),
            Err(e) => Err(SolverError(e.to_string())),
        }
    }
}
