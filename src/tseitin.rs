//! Tseitin lowering of expressions to CNF.
//!
//! Every lowered node gets one literal per bit of its valtype, tied to the
//! literals of its operands by biconditional clauses. The literal of a node is
//! cached, so a shared subexpression is encoded once. A dedicated literal `T`
//! stands for `true` (and `-T` for `false`); it is allocated on first use and
//! asserted by the unit clause `(T)`.
//!
//! Literals produced here use *internal* variable numbers. [`Cnf::from_clauses`][crate::cnf::Cnf::from_clauses]
//! later renumbers them densely for the SAT engine.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::debug;

use crate::context::Context;
use crate::error::LoweringError;
use crate::lit::Lit;
use crate::node::NodeKind;
use crate::ops::Op;
use crate::reference::Expr;
use crate::types::ValueDomain;

/// Configuration of the lowering backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LoweringOptions {
    /// Assert the conjuncts of a top-level `and` one by one, instead of
    /// introducing a literal for the conjunction.
    pub flatten_conjunctions: bool,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            flatten_conjunctions: true,
        }
    }
}

/// Deduplicated clause list, kept in insertion order.
///
/// Clauses are expected in normal form: literals sorted by variable, no
/// duplicates. Two clauses with the same literal set are the same clause.
#[derive(Debug, Default, Clone)]
pub struct ClauseSet {
    clauses: Vec<Vec<Lit>>,
    seen: HashSet<Vec<Lit>>,
}

impl ClauseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a clause. Returns `false` if it was already present.
    pub fn insert(&mut self, clause: Vec<Lit>) -> bool {
        if self.seen.contains(&clause) {
            return false;
        }
        self.seen.insert(clause.clone());
        self.clauses.push(clause);
        true
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[Lit]> + '_ {
        self.clauses.iter().map(|c| c.as_slice())
    }

    pub fn into_vec(self) -> Vec<Vec<Lit>> {
        self.clauses
    }
}

/// A lowering session: literal cache, clause set and the surface variables met so far.
pub struct Tseitin<'a> {
    ctx: &'a Context,
    options: LoweringOptions,
    num_vars: u32,
    cache: HashMap<Expr, Rc<[Lit]>>,
    true_lit: Option<Lit>,
    surface: Vec<(Expr, Rc<[Lit]>)>,
    clauses: ClauseSet,
}

impl<'a> Tseitin<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self::with_options(ctx, LoweringOptions::default())
    }

    pub fn with_options(ctx: &'a Context, options: LoweringOptions) -> Self {
        Self {
            ctx,
            options,
            num_vars: 0,
            cache: HashMap::new(),
            true_lit: None,
            surface: Vec::new(),
            clauses: ClauseSet::new(),
        }
    }

    /// Number of internal variables allocated so far.
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn clauses(&self) -> &ClauseSet {
        &self.clauses
    }

    pub fn into_clauses(self) -> ClauseSet {
        self.clauses
    }

    /// The literal standing for `true`, if it has been allocated.
    pub fn true_literal(&self) -> Option<Lit> {
        self.true_lit
    }

    /// Variables lowered so far, in order of first encounter, with their bit literals.
    pub fn surface_variables(&self) -> &[(Expr, Rc<[Lit]>)] {
        &self.surface
    }

    /// Bit literals of an already-lowered expression.
    pub fn literals(&self, e: Expr) -> Option<Rc<[Lit]>> {
        self.cache.get(&e).cloned()
    }

    fn fresh(&mut self) -> Lit {
        self.num_vars += 1;
        Lit::positive(self.num_vars)
    }

    fn true_lit(&mut self) -> Lit {
        if let Some(t) = self.true_lit {
            return t;
        }
        let t = self.fresh();
        debug!("allocated the true literal {}", t);
        self.true_lit = Some(t);
        self.clauses.insert(vec![t]);
        t
    }

    /// Adds a clause in normal form.
    ///
    /// Literals are sorted by variable and deduplicated, `-T` is removed, and
    /// tautologies or clauses containing `T` are dropped.
    pub fn add_clause(&mut self, lits: impl IntoIterator<Item = Lit>) {
        let t = self.true_lit;
        let mut clause: Vec<Lit> = lits.into_iter().filter(|&l| Some(-l) != t).collect();
        if t.is_some_and(|t| clause.contains(&t)) {
            return;
        }
        clause.sort_by_key(|l| (l.var(), l.is_negated()));
        clause.dedup();
        if clause.windows(2).any(|w| w[0].var() == w[1].var()) {
            return;
        }
        self.clauses.insert(clause);
    }

    fn single(&mut self, e: Expr) -> Result<Lit, LoweringError> {
        let lits = self.lower(e)?;
        if lits.len() != 1 {
            return Err(LoweringError::NotBoolean {
                valtype: self.ctx.valtype(e).to_string(),
            });
        }
        Ok(lits[0])
    }

    /// `out <-> and(inputs)`
    fn and_gate(&mut self, inputs: &[Lit]) -> Lit {
        if let [only] = inputs {
            return *only;
        }
        let out = self.fresh();
        for &x in inputs {
            self.add_clause([-out, x]);
        }
        self.add_clause(std::iter::once(out).chain(inputs.iter().map(|&x| -x)));
        out
    }

    /// `out <-> or(inputs)`
    fn or_gate(&mut self, inputs: &[Lit]) -> Lit {
        if let [only] = inputs {
            return *only;
        }
        let out = self.fresh();
        for &x in inputs {
            self.add_clause([out, -x]);
        }
        self.add_clause(std::iter::once(-out).chain(inputs.iter().copied()));
        out
    }

    /// `out <-> xor(a, b)`
    fn xor_gate(&mut self, a: Lit, b: Lit) -> Lit {
        let out = self.fresh();
        self.add_clause([-out, a, b]);
        self.add_clause([-out, -a, -b]);
        self.add_clause([out, -a, b]);
        self.add_clause([out, a, -b]);
        out
    }

    /// Lowers `e`, returning one literal per bit of its valtype.
    pub fn lower(&mut self, e: Expr) -> Result<Rc<[Lit]>, LoweringError> {
        if let Some(lits) = self.cache.get(&e) {
            return Ok(Rc::clone(lits));
        }
        let node = self.ctx.node(e);
        let lits: Rc<[Lit]> = match &node.kind {
            NodeKind::Variable(name) => {
                let lits: Rc<[Lit]> = (0..node.valtype.bit_size()).map(|_| self.fresh()).collect();
                debug!("lower: variable {} -> {:?}", name, lits);
                self.surface.push((e, Rc::clone(&lits)));
                lits
            }
            NodeKind::Constant(value) => {
                let t = self.true_lit();
                node.valtype
                    .to_bits(value)
                    .into_iter()
                    .map(|b| if b { t } else { -t })
                    .collect()
            }
            NodeKind::Apply { op, operands } => self.lower_apply(*op, operands)?,
        };
        self.cache.insert(e, Rc::clone(&lits));
        Ok(lits)
    }

    fn lower_apply(&mut self, op: Op, operands: &[Expr]) -> Result<Rc<[Lit]>, LoweringError> {
        let lits: Rc<[Lit]> = match op {
            Op::Not => {
                let a = self.single(operands[0])?;
                Rc::from([-a])
            }
            Op::And | Op::Or | Op::Clause => {
                let inputs = operands
                    .iter()
                    .map(|&x| self.single(x))
                    .collect::<Result<Vec<_>, _>>()?;
                let out = if op == Op::And {
                    self.and_gate(&inputs)
                } else {
                    self.or_gate(&inputs)
                };
                Rc::from([out])
            }
            Op::Xor => {
                let a = self.single(operands[0])?;
                let b = self.single(operands[1])?;
                Rc::from([self.xor_gate(a, b)])
            }
            Op::Eq => {
                let xs = self.lower(operands[0])?;
                let ys = self.lower(operands[1])?;
                let same: Vec<Lit> = xs
                    .iter()
                    .zip(ys.iter())
                    .map(|(&x, &y)| -self.xor_gate(x, y))
                    .collect();
                Rc::from([self.and_gate(&same)])
            }
            Op::Bit { index } => {
                let xs = self.lower(operands[0])?;
                Rc::from([xs[index as usize]])
            }
            Op::Bits | Op::Tuple => {
                let mut out = Vec::new();
                for &x in operands {
                    out.extend(self.lower(x)?.iter().copied());
                }
                Rc::from(out)
            }
            Op::Field { index } => {
                let product = self.ctx.valtype(operands[0]);
                let xs = self.lower(operands[0])?;
                let (offset, size) = match (product.field_offset(index as usize), product.fields()) {
                    (Some(offset), Some(fields)) => (offset, fields[index as usize].bit_size()),
                    _ => unreachable!("field of a non-product"),
                };
                Rc::from(&xs[offset..offset + size])
            }
            Op::Implies | Op::Ite | Op::Add { .. } | Op::Mul { .. } => {
                return Err(LoweringError::Unsupported {
                    op: op.name(),
                    reason: "no direct encoding, decompose it first".to_string(),
                });
            }
        };
        Ok(lits)
    }

    /// Asserts a boolean root expression.
    pub fn assert(&mut self, e: Expr) -> Result<(), LoweringError> {
        let valtype = self.ctx.valtype(e);
        if !valtype.is_bool() {
            return Err(LoweringError::NotBoolean {
                valtype: valtype.to_string(),
            });
        }
        match self.ctx.op(e) {
            Some(Op::And) if self.options.flatten_conjunctions => {
                for &x in self.ctx.operands(e).iter() {
                    self.assert(x)?;
                }
            }
            Some(Op::Or | Op::Clause) => {
                let lits = self
                    .ctx
                    .operands(e)
                    .iter()
                    .map(|&x| self.single(x))
                    .collect::<Result<Vec<_>, _>>()?;
                self.add_clause(lits);
            }
            _ => {
                let lit = self.single(e)?;
                self.add_clause([lit]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::{Valtype, Value};

    /// All assignments of `n` internal variables that satisfy `clauses`.
    fn models(n: u32, clauses: &ClauseSet) -> Vec<Vec<bool>> {
        let mut result = Vec::new();
        for mask in 0u64..(1 << n) {
            let value = |v: u32| mask >> (v - 1) & 1 == 1;
            if clauses.iter().all(|c| c.iter().any(|l| l.eval(value(l.var())))) {
                result.push((1..=n).map(value).collect());
            }
        }
        result
    }

    #[test]
    fn test_clause_normalization() {
        let ctx = Context::default();
        let mut ts = Tseitin::new(&ctx);
        ts.add_clause([Lit::new(3), Lit::new(-1), Lit::new(3)]);
        ts.add_clause([Lit::new(-1), Lit::new(3)]);
        ts.add_clause([Lit::new(2), Lit::new(-2)]);
        let clauses: Vec<&[Lit]> = ts.clauses().iter().collect();
        assert_eq!(clauses, vec![&[Lit::new(-1), Lit::new(3)][..]]);
    }

    #[test]
    fn test_true_literal_is_asserted_once() {
        let ctx = Context::default();
        let mut ts = Tseitin::new(&ctx);
        let t = ts.lower(ctx.mk_bool(true)).unwrap();
        let f = ts.lower(ctx.mk_bool(false)).unwrap();
        assert_eq!(f[0], -t[0]);
        assert_eq!(ts.true_literal(), Some(t[0]));
        assert_eq!(ts.clauses().len(), 1);
        // Clauses containing T vanish, -T is dropped.
        let x = ts.lower(ctx.mk_bool_var("x").unwrap()).unwrap()[0];
        ts.add_clause([x, t[0]]);
        ts.add_clause([x, f[0]]);
        let clauses: Vec<&[Lit]> = ts.clauses().iter().collect();
        assert_eq!(clauses, vec![&[t[0]][..], &[x][..]]);
    }

    #[test]
    fn test_cache_shares_literals() {
        let ctx = Context::default();
        let x = ctx.mk_bool_var("x").unwrap();
        let y = ctx.mk_bool_var("y").unwrap();
        let xy = ctx.apply_and(&[x, y]).unwrap();
        let mut ts = Tseitin::new(&ctx);
        let a = ts.lower(xy).unwrap();
        let n = ts.num_vars();
        let b = ts.lower(xy).unwrap();
        assert_eq!(a, b);
        assert_eq!(ts.num_vars(), n);
        assert_eq!(ts.surface_variables().len(), 2);
    }

    #[test]
    fn test_equisatisfiable_or_not() {
        // {a or b, not a} has exactly one model: a = false, b = true.
        let ctx = Context::default();
        let a = ctx.mk_bool_var("a").unwrap();
        let b = ctx.mk_bool_var("b").unwrap();
        let mut ts = Tseitin::new(&ctx);
        ts.assert(ctx.apply_or(&[a, b]).unwrap()).unwrap();
        ts.assert(ctx.apply_not(a).unwrap()).unwrap();
        let la = ts.literals(a).unwrap()[0];
        let lb = ts.literals(b).unwrap()[0];
        let ms = models(ts.num_vars(), ts.clauses());
        assert_eq!(ms.len(), 1);
        assert!(!la.eval(ms[0][la.var() as usize - 1]));
        assert!(lb.eval(ms[0][lb.var() as usize - 1]));
    }

    #[test]
    fn test_gates_match_evaluation() {
        let ctx = Context::default();
        let a = ctx.mk_bool_var("a").unwrap();
        let b = ctx.mk_bool_var("b").unwrap();
        let c = ctx.mk_bool_var("c").unwrap();
        let ab = ctx.apply_xor(a, b).unwrap();
        let e = ctx.apply_or(&[ctx.apply_and(&[ab, c]).unwrap(), ctx.apply_eq(a, c).unwrap()]).unwrap();
        let mut ts = Tseitin::new(&ctx);
        let root = ts.lower(e).unwrap()[0];
        let ms = models(ts.num_vars(), ts.clauses());
        // Every input assignment extends to exactly one model, in which the root agrees with evaluation.
        assert_eq!(ms.len(), 8);
        for m in ms {
            let get = |x: Expr| {
                let l = ts.literals(x).unwrap()[0];
                l.eval(m[l.var() as usize - 1])
            };
            let env = HashMap::from([
                ("a".to_string(), Value::Bool(get(a))),
                ("b".to_string(), Value::Bool(get(b))),
                ("c".to_string(), Value::Bool(get(c))),
            ]);
            let expected = ctx.evaluate(e, &env).unwrap();
            assert_eq!(expected, Value::Bool(root.eval(m[root.var() as usize - 1])));
        }
    }

    #[test]
    fn test_bitvector_eq() {
        let ctx = Context::default();
        let x = ctx.mk_var("x", Valtype::bitvector(2)).unwrap();
        let two = ctx.mk_bv(2, 2u32).unwrap();
        let mut ts = Tseitin::new(&ctx);
        ts.assert(ctx.apply_eq(x, two).unwrap()).unwrap();
        let lx = ts.literals(x).unwrap();
        let ms = models(ts.num_vars(), ts.clauses());
        assert_eq!(ms.len(), 1);
        let bits: Vec<bool> = lx.iter().map(|l| l.eval(ms[0][l.var() as usize - 1])).collect();
        assert_eq!(bits, vec![false, true]);
    }

    #[test]
    fn test_composites_are_unsupported() {
        let ctx = Context::default();
        let a = ctx.mk_bool_var("a").unwrap();
        let b = ctx.mk_bool_var("b").unwrap();
        let mut ts = Tseitin::new(&ctx);
        let err = ts.assert(ctx.apply_implies(a, b).unwrap()).unwrap_err();
        assert!(matches!(err, LoweringError::Unsupported { op: "implies", .. }));
        let x = ctx.mk_var("x", Valtype::bitvector(2)).unwrap();
        let err = ts.assert(x).unwrap_err();
        assert!(matches!(err, LoweringError::NotBoolean { .. }));
    }

    #[test]
    fn test_flatten_option() {
        let ctx = Context::default();
        let a = ctx.mk_bool_var("a").unwrap();
        let b = ctx.mk_bool_var("b").unwrap();
        let ab = ctx.apply_and(&[a, b]).unwrap();

        let mut flat = Tseitin::new(&ctx);
        flat.assert(ab).unwrap();
        assert_eq!(flat.clauses().len(), 2);
        assert_eq!(flat.num_vars(), 2);

        let options = LoweringOptions { flatten_conjunctions: false };
        let mut gated = Tseitin::with_options(&ctx, options);
        gated.assert(ab).unwrap();
        assert_eq!(gated.num_vars(), 3);
        assert_eq!(gated.clauses().len(), 4);
    }
}
