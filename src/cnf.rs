//! Numbered CNF formulas, as handed to a SAT engine or written as DIMACS.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::dimacs;
use crate::error::Error;
use crate::lit::Lit;

/// Dense renumbering of internal variables, assigned on first encounter.
#[derive(Debug, Default, Clone)]
pub struct Numbering {
    map: HashMap<u32, u32>,
}

impl Numbering {
    /// DIMACS number of an internal variable, if it occurs in some clause.
    pub fn get(&self, var: u32) -> Option<u32> {
        self.map.get(&var).copied()
    }

    /// Renumbers a literal whose variable occurs in some clause.
    pub fn lit(&self, lit: Lit) -> Option<i32> {
        let v = self.get(lit.var())? as i32;
        Some(if lit.is_negated() { -v } else { v })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A CNF formula over variables `1..=num_vars`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Cnf {
    pub num_vars: usize,
    pub clauses: Vec<Vec<i32>>,
}

impl Cnf {
    pub fn new(num_vars: usize, clauses: Vec<Vec<i32>>) -> Self {
        Self { num_vars, clauses }
    }

    /// Numbers the variables of `clauses` densely, in order of first encounter.
    ///
    /// Literal order inside each clause and clause order are kept.
    pub fn from_clauses<'c>(clauses: impl IntoIterator<Item = &'c [Lit]>) -> (Self, Numbering) {
        let mut numbering = Numbering::default();
        let mut out = Vec::new();
        for clause in clauses {
            let numbered = clause
                .iter()
                .map(|&lit| {
                    let next = numbering.map.len() as u32 + 1;
                    let v = *numbering.map.entry(lit.var()).or_insert(next) as i32;
                    if lit.is_negated() {
                        -v
                    } else {
                        v
                    }
                })
                .collect();
            out.push(numbered);
        }
        let num_vars = numbering.len();
        (Self::new(num_vars, out), numbering)
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Evaluates the formula under a model indexed by variable (index 0 unused).
    pub fn eval(&self, model: &[bool]) -> bool {
        self.clauses.iter().all(|clause| {
            clause
                .iter()
                .any(|&l| Lit::new(l).eval(model[l.unsigned_abs() as usize]))
        })
    }

    pub fn to_dimacs_string(&self) -> String {
        let mut s = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(s, "p cnf {} {}", self.num_vars, self.clauses.len());
        for clause in &self.clauses {
            for lit in clause {
                let _ = write!(s, "{} ", lit);
            }
            s.push_str("0\n");
        }
        s
    }

    pub fn write_dimacs<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "p cnf {} {}", self.num_vars, self.clauses.len())?;
        for clause in &self.clauses {
            for lit in clause {
                write!(writer, "{} ", lit)?;
            }
            writeln!(writer, "0")?;
        }
        Ok(())
    }

    /// Reads a DIMACS file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Ok(dimacs::parse(&text)?)
    }

    /// Writes the formula to a DIMACS file.
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_dimacs(&mut writer)?;
        writer.flush()
    }
}
