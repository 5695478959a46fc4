//! Solving: from a set of boolean constraints to a model.
//!
//! A [`Problem`] collects constraints, then [`Problem::solve`] runs the whole
//! pipeline: normalize every constraint, lower it with [`Tseitin`], number the
//! clauses densely, call the [`SatEngine`], and invert the engine's model back
//! into values of the surface variables.
//!
//! ```
//! use tseitin_rs::context::Context;
//! use tseitin_rs::sat::Varisat;
//! use tseitin_rs::solve::{Outcome, Problem};
//! use tseitin_rs::types::Value;
//!
//! let ctx = Context::default();
//! let x = ctx.mk_bool_var("x").unwrap();
//! let y = ctx.mk_bool_var("y").unwrap();
//!
//! let mut problem = Problem::new(&ctx);
//! problem.add(ctx.apply_or(&[x, y]).unwrap()).unwrap();
//! problem.add(ctx.apply_not(x).unwrap()).unwrap();
//!
//! match problem.solve(&mut Varisat).unwrap() {
//!     Outcome::Sat(model) => {
//!         assert_eq!(model.get("x"), Some(&Value::Bool(false)));
//!         assert_eq!(model.get("y"), Some(&Value::Bool(true)));
//!     }
//!     Outcome::Unsat => unreachable!(),
//! }
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info};

use crate::cnf::{Cnf, Numbering};
use crate::context::Context;
use crate::error::{ConstructionError, Error, LoweringError};
use crate::reference::Expr;
use crate::rewrite;
use crate::sat::SatEngine;
use crate::tseitin::{LoweringOptions, Tseitin};
use crate::types::{Valtype, Value, ValueDomain};

/// Configuration of [`Problem::solve`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SolveOptions {
    pub lowering: LoweringOptions,
    /// Build the generating expression of every model.
    pub generator: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            lowering: LoweringOptions::default(),
            generator: true,
        }
    }
}

/// Lifecycle of a [`Problem`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SolveState {
    Unsolved,
    Solving,
    Sat,
    Unsat,
    Error,
}

/// Values of the surface variables in a satisfying assignment.
#[derive(Debug, Clone)]
pub struct Model {
    values: Vec<(Expr, Rc<str>, Value)>,
    unconstrained: Vec<(Expr, Vec<usize>)>,
    generator: Option<Expr>,
}

impl Model {
    /// Value of the variable named `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(_, n, _)| n.as_ref() == name).map(|(_, _, v)| v)
    }

    /// Value of the variable `var`.
    pub fn value(&self, var: Expr) -> Option<&Value> {
        self.values.iter().find(|(e, _, _)| *e == var).map(|(_, _, v)| v)
    }

    /// `(name, value)` pairs, in order of first occurrence in the constraints.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.values.iter().map(|(_, n, v)| (n.as_ref(), v))
    }

    /// The model as an environment for [`Context::evaluate`].
    pub fn assignment(&self) -> HashMap<String, Value> {
        self.values.iter().map(|(_, n, v)| (n.to_string(), v.clone())).collect()
    }

    /// Variables with bits that occur in no clause, with those bit indices.
    ///
    /// Such bits are set to `false` in the model; any other value gives a model too.
    pub fn unconstrained(&self) -> &[(Expr, Vec<usize>)] {
        &self.unconstrained
    }

    pub fn is_fully_constrained(&self) -> bool {
        self.unconstrained.is_empty()
    }

    /// An expression whose solutions are exactly the completions of this model's
    /// constrained bits. `None` if no bit is constrained (or generation is disabled).
    pub fn generator(&self) -> Option<Expr> {
        self.generator
    }

    /// Checks that every constraint evaluates to `true` under this model.
    pub fn verify(&self, ctx: &Context, constraints: &[Expr]) -> bool {
        let env = self.assignment();
        constraints
            .iter()
            .all(|&c| ctx.evaluate(c, &env) == Some(Value::Bool(true)))
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Sat(Model),
    Unsat,
}

impl Outcome {
    pub fn is_sat(&self) -> bool {
        matches!(self, Outcome::Sat(_))
    }

    pub fn model(&self) -> Option<&Model> {
        match self {
            Outcome::Sat(model) => Some(model),
            Outcome::Unsat => None,
        }
    }
}

struct Compiled<'a> {
    tseitin: Tseitin<'a>,
    surface: Vec<Expr>,
    cnf: Cnf,
    numbering: Numbering,
}

fn compile<'a>(ctx: &'a Context, constraints: &[Expr], options: &SolveOptions) -> Result<Compiled<'a>, Error> {
    let surface = ctx.variables(constraints.iter().copied());
    let mut tseitin = Tseitin::with_options(ctx, options.lowering);
    for &c in constraints {
        let normal = rewrite::normalize(ctx, c)?;
        debug!(
            "normalize: {} (size {}) => {} (size {})",
            c,
            ctx.size(c),
            normal,
            ctx.size(normal)
        );
        tseitin.assert(normal)?;
    }
    // Variables eliminated by rewriting still get (unconstrained) literals.
    for &v in &surface {
        tseitin.lower(v)?;
    }
    let (cnf, numbering) = Cnf::from_clauses(tseitin.clauses().iter());
    Ok(Compiled {
        tseitin,
        surface,
        cnf,
        numbering,
    })
}

/// Constraints over `bits` of `e` (`None` = unconstrained), as equalities.
fn bit_constraints(
    ctx: &Context,
    e: Expr,
    valtype: &Valtype,
    bits: &[Option<bool>],
) -> Result<Vec<Expr>, ConstructionError> {
    if bits.iter().all(|b| b.is_none()) {
        return Ok(Vec::new());
    }
    if let Some(bits) = bits.iter().copied().collect::<Option<Vec<bool>>>() {
        let value = ctx.mk_const(valtype.clone(), valtype.from_bits(&bits))?;
        return Ok(vec![ctx.apply_eq(e, value)?]);
    }
    let mut result = Vec::new();
    match valtype {
        Valtype::Bool => unreachable!("a single bit is either constrained or not"),
        Valtype::BitVector(_) => {
            for (i, b) in bits.iter().enumerate() {
                if let Some(b) = *b {
                    let bit = ctx.apply_bit(e, i as u32)?;
                    result.push(ctx.apply_eq(bit, ctx.mk_bool(b))?);
                }
            }
        }
        Valtype::Product(fields) => {
            let mut offset = 0;
            for (j, field) in fields.iter().enumerate() {
                let size = field.bit_size();
                let sub = ctx.apply_field(e, j as u32)?;
                result.extend(bit_constraints(ctx, sub, field, &bits[offset..offset + size])?);
                offset += size;
            }
        }
    }
    Ok(result)
}

fn invert_model(ctx: &Context, compiled: &Compiled, model: &[bool], generate: bool) -> Result<Model, Error> {
    let mut values = Vec::new();
    let mut unconstrained = Vec::new();
    let mut parts = Vec::new();

    for &var in &compiled.surface {
        let lits = compiled
            .tseitin
            .literals(var)
            .ok_or_else(|| LoweringError::Unsupported {
                op: "variable",
                reason: format!("{} was not lowered", ctx.to_bracket_string(var)),
            })?;
        let bits: Vec<Option<bool>> = lits
            .iter()
            .map(|&l| {
                compiled
                    .numbering
                    .lit(l)
                    .map(|d| model[d.unsigned_abs() as usize] != (d < 0))
            })
            .collect();
        let free: Vec<usize> = (0..bits.len()).filter(|&i| bits[i].is_none()).collect();
        let valtype = ctx.valtype(var);
        let value = valtype.from_bits(&bits.iter().map(|b| b.unwrap_or(false)).collect::<Vec<_>>());
        if generate {
            parts.extend(bit_constraints(ctx, var, &valtype, &bits)?);
        }
        if !free.is_empty() {
            unconstrained.push((var, free));
        }
        let name = ctx.variable_name(var).unwrap_or_else(|| Rc::from(""));
        values.push((var, name, value));
    }

    let generator = match parts.len() {
        0 => None,
        1 => Some(parts[0]),
        _ => Some(ctx.apply_and(&parts)?),
    };

    Ok(Model {
        values,
        unconstrained,
        generator,
    })
}

/// A single-shot satisfiability problem over one [`Context`].
pub struct Problem<'a> {
    ctx: &'a Context,
    constraints: Vec<Expr>,
    options: SolveOptions,
    state: SolveState,
}

impl<'a> Problem<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self::with_options(ctx, SolveOptions::default())
    }

    pub fn with_options(ctx: &'a Context, options: SolveOptions) -> Self {
        Self {
            ctx,
            constraints: Vec::new(),
            options,
            state: SolveState::Unsolved,
        }
    }

    pub fn state(&self) -> SolveState {
        self.state
    }

    pub fn constraints(&self) -> &[Expr] {
        &self.constraints
    }

    /// Adds a boolean constraint.
    pub fn add(&mut self, constraint: Expr) -> Result<(), Error> {
        if self.state != SolveState::Unsolved {
            return Err(Error::AlreadySolved);
        }
        let valtype = self.ctx.valtype(constraint);
        if !valtype.is_bool() {
            return Err(LoweringError::NotBoolean {
                valtype: valtype.to_string(),
            }
            .into());
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Lowers the constraints to a numbered CNF without solving.
    pub fn compile(&self) -> Result<Cnf, Error> {
        Ok(compile(self.ctx, &self.constraints, &self.options)?.cnf)
    }

    /// Solves the problem. Can be called once; the constraints are consumed.
    pub fn solve<E>(&mut self, engine: &mut E) -> Result<Outcome, Error>
    where
        E: SatEngine + ?Sized,
    {
        if self.state != SolveState::Unsolved {
            return Err(Error::AlreadySolved);
        }
        self.state = SolveState::Solving;
        let result = self.run(engine);
        self.state = match &result {
            Ok(Outcome::Sat(_)) => SolveState::Sat,
            Ok(Outcome::Unsat) => SolveState::Unsat,
            Err(_) => SolveState::Error,
        };
        result
    }

    fn run<E>(&mut self, engine: &mut E) -> Result<Outcome, Error>
    where
        E: SatEngine + ?Sized,
    {
        let constraints = std::mem::take(&mut self.constraints);
        let compiled = compile(self.ctx, &constraints, &self.options)?;
        info!(
            "solve: {} constraints, {} variables, {} clauses",
            constraints.len(),
            compiled.cnf.num_vars,
            compiled.cnf.num_clauses()
        );
        match engine.solve_cnf(&compiled.cnf)? {
            None => {
                info!("solve: UNSAT");
                Ok(Outcome::Unsat)
            }
            Some(model) => {
                info!("solve: SAT");
                let model = invert_model(self.ctx, &compiled, &model, self.options.generator)?;
                Ok(Outcome::Sat(model))
            }
        }
    }
}

/// Enumerates up to `limit` models of `constraints`, blocking each found
/// model's generating expression before searching for the next one.
///
/// Models that differ only in unconstrained bits are reported once.
pub fn all_models<E>(ctx: &Context, constraints: &[Expr], engine: &mut E, limit: usize) -> Result<Vec<Model>, Error>
where
    E: SatEngine + ?Sized,
{
    let mut current = constraints.to_vec();
    let mut models = Vec::new();
    while models.len() < limit {
        let mut problem = Problem::new(ctx);
        for &c in &current {
            problem.add(c)?;
        }
        match problem.solve(engine)? {
            Outcome::Unsat => break,
            Outcome::Sat(model) => {
                let generator = model.generator();
                models.push(model);
                match generator {
                    Some(g) => current.push(ctx.apply_not(g)?),
                    None => break,
                }
            }
        }
    }
    debug!("all_models: found {}", models.len());
    Ok(models)
}
