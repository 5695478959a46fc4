//! The expression manager.
//!
//! A [`Context`] owns the expression pool, the variable registry, the product
//! valtype cache and the rewrite memo. Every expression is built through it,
//! and every [`Expr`] handle is only meaningful together with the context that
//! produced it.
//!
//! ```
//! use tseitin_rs::context::Context;
//!
//! let ctx = Context::default();
//! let x = ctx.mk_bool_var("x").unwrap();
//! let y = ctx.mk_bool_var("y").unwrap();
//! let f = ctx.apply_and(&[x, y]).unwrap();
//! let g = ctx.apply_and(&[x, y]).unwrap();
//! assert_eq!(f, g);
//! assert_eq!(ctx.to_bracket_string(f), "(and x y)");
//! ```

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Write as _};
use std::rc::Rc;

use log::debug;
use num_bigint::BigUint;

use crate::error::ConstructionError;
use crate::node::{Node, NodeKind};
use crate::ops::Op;
use crate::reference::Expr;
use crate::rewrite::Pass;
use crate::table::Table;
use crate::types::{Valtype, Value, ValueDomain};

pub struct Context {
    storage: RefCell<Table<Node>>,
    variables: RefCell<HashMap<Rc<str>, Expr>>,
    products: RefCell<HashMap<Rc<[Valtype]>, Valtype>>,
    rewrites: RefCell<HashMap<(Pass, Expr), Expr>>,
}

impl Context {
    /// Creates a context whose pool starts with `2^storage_bits` buckets.
    pub fn new(storage_bits: usize) -> Self {
        assert!(
            storage_bits <= 31,
            "Storage bits should be in the range 0..=31"
        );
        Self {
            storage: RefCell::new(Table::new(storage_bits)),
            variables: RefCell::new(HashMap::new()),
            products: RefCell::new(HashMap::new()),
            rewrites: RefCell::new(HashMap::new()),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(16)
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        f.debug_struct("Context")
            .field("nodes", &storage.len())
            .field("buckets", &storage.buckets())
            .field("variables", &self.variables.borrow().len())
            .field("rewrites", &self.rewrites.borrow().len())
            .finish()
    }
}

// Pool access
impl Context {
    /// Returns the canonical handle of `node`, storing it on first occurrence.
    pub(crate) fn intern(&self, node: Node) -> Expr {
        let mut storage = self.storage.borrow_mut();
        let before = storage.len();
        let index = storage.put(node);
        if storage.len() > before {
            debug!("intern: new node @{}", index);
        }
        Expr::new(index as u32)
    }

    /// Number of distinct nodes in the pool.
    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().len()
    }

    /// Returns a copy of the pooled node.
    pub fn node(&self, e: Expr) -> Node {
        self.storage.borrow().value(e.index()).clone()
    }

    pub fn valtype(&self, e: Expr) -> Valtype {
        self.storage.borrow().value(e.index()).valtype.clone()
    }

    pub fn op(&self, e: Expr) -> Option<Op> {
        self.storage.borrow().value(e.index()).op()
    }

    /// Operands of an operator application; empty for leaves.
    pub fn operands(&self, e: Expr) -> Rc<[Expr]> {
        match &self.storage.borrow().value(e.index()).kind {
            NodeKind::Apply { operands, .. } => Rc::clone(operands),
            _ => Rc::from([]),
        }
    }

    pub fn constant(&self, e: Expr) -> Option<Value> {
        match &self.storage.borrow().value(e.index()).kind {
            NodeKind::Constant(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn bool_constant(&self, e: Expr) -> Option<bool> {
        match &self.storage.borrow().value(e.index()).kind {
            NodeKind::Constant(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn variable_name(&self, e: Expr) -> Option<Rc<str>> {
        match &self.storage.borrow().value(e.index()).kind {
            NodeKind::Variable(name) => Some(Rc::clone(name)),
            _ => None,
        }
    }

    pub fn is_variable(&self, e: Expr) -> bool {
        matches!(self.storage.borrow().value(e.index()).kind, NodeKind::Variable(_))
    }

    /// If `e` is `not(x)`, returns `x`.
    pub fn negated(&self, e: Expr) -> Option<Expr> {
        match &self.storage.borrow().value(e.index()).kind {
            NodeKind::Apply { op: Op::Not, operands } => Some(operands[0]),
            _ => None,
        }
    }

    /// Checks whether `e` is a boolean atom: a variable, or a `bit`/`field`
    /// selection whose chain of selections ends at a variable.
    pub fn is_atom(&self, e: Expr) -> bool {
        if !self.valtype(e).is_bool() {
            return false;
        }
        let mut current = e;
        loop {
            match self.op(current) {
                None => return self.is_variable(current),
                Some(Op::Bit { .. } | Op::Field { .. }) => current = self.operands(current)[0],
                Some(_) => return false,
            }
        }
    }

    /// Checks whether `e` is an atom or the negation of one.
    pub fn is_literal(&self, e: Expr) -> bool {
        self.is_atom(self.negated(e).unwrap_or(e))
    }

    /// Looks up a declared variable by name.
    pub fn variable(&self, name: &str) -> Option<Expr> {
        self.variables.borrow().get(name).copied()
    }
}

// Leaves and valtypes
impl Context {
    /// Declares (or retrieves) the variable `name` of the given valtype.
    pub fn mk_var(&self, name: &str, valtype: Valtype) -> Result<Expr, ConstructionError> {
        if let Some(e) = self.variable(name) {
            let existing = self.valtype(e);
            if existing != valtype {
                return Err(ConstructionError::VariableRedeclared {
                    name: name.to_string(),
                    existing: existing.to_string(),
                    requested: valtype.to_string(),
                });
            }
            return Ok(e);
        }
        let name: Rc<str> = Rc::from(name);
        let e = self.intern(Node {
            valtype,
            kind: NodeKind::Variable(Rc::clone(&name)),
        });
        debug!("mk_var({}) -> {}", name, e);
        self.variables.borrow_mut().insert(name, e);
        Ok(e)
    }

    /// Declares (or retrieves) the boolean variable `name`.
    pub fn mk_bool_var(&self, name: &str) -> Result<Expr, ConstructionError> {
        self.mk_var(name, Valtype::Bool)
    }

    pub fn mk_bool(&self, value: bool) -> Expr {
        self.intern(Node {
            valtype: Valtype::Bool,
            kind: NodeKind::Constant(Value::Bool(value)),
        })
    }

    pub fn mk_const(&self, valtype: Valtype, value: Value) -> Result<Expr, ConstructionError> {
        if !valtype.is_valid(&value) {
            return Err(ConstructionError::InvalidConstant {
                valtype: valtype.to_string(),
                value: value.to_string(),
            });
        }
        Ok(self.intern(Node {
            valtype,
            kind: NodeKind::Constant(value),
        }))
    }

    /// Creates the bitvector constant `value:uint<width>`.
    pub fn mk_bv(&self, width: u32, value: impl Into<BigUint>) -> Result<Expr, ConstructionError> {
        let value = Value::BitVector(value.into());
        if width == 0 {
            return Err(ConstructionError::InvalidConstant {
                valtype: "uint0".to_string(),
                value: value.to_string(),
            });
        }
        self.mk_const(Valtype::bitvector(width), value)
    }

    /// Returns the product valtype over `fields`, sharing one allocation per distinct field list.
    pub fn mk_product_valtype(&self, fields: &[Valtype]) -> Valtype {
        if let Some(valtype) = self.products.borrow().get(fields) {
            return valtype.clone();
        }
        let fields: Rc<[Valtype]> = Rc::from(fields);
        let valtype = Valtype::Product(Rc::clone(&fields));
        self.products.borrow_mut().insert(fields, valtype.clone());
        valtype
    }
}

// Operator applications
impl Context {
    /// Builds `op(operands)`, validating it against the operator's contract.
    pub fn apply(&self, op: Op, operands: &[Expr]) -> Result<Expr, ConstructionError> {
        op.validate(self, operands)?;
        let valtypes: Vec<Valtype> = operands.iter().map(|&e| self.valtype(e)).collect();
        let valtype = match op {
            Op::Tuple => self.mk_product_valtype(&valtypes),
            _ => op.result_valtype(&valtypes),
        };
        let e = self.intern(Node {
            valtype,
            kind: NodeKind::Apply {
                op,
                operands: Rc::from(operands),
            },
        });
        debug!("apply({}, {:?}) -> {}", op, operands, e);
        Ok(e)
    }

    pub fn apply_not(&self, a: Expr) -> Result<Expr, ConstructionError> {
        self.apply(Op::Not, &[a])
    }

    pub fn apply_and(&self, operands: &[Expr]) -> Result<Expr, ConstructionError> {
        self.apply(Op::And, operands)
    }

    pub fn apply_or(&self, operands: &[Expr]) -> Result<Expr, ConstructionError> {
        self.apply(Op::Or, operands)
    }

    pub fn apply_clause(&self, literals: &[Expr]) -> Result<Expr, ConstructionError> {
        self.apply(Op::Clause, literals)
    }

    pub fn apply_xor(&self, a: Expr, b: Expr) -> Result<Expr, ConstructionError> {
        self.apply(Op::Xor, &[a, b])
    }

    pub fn apply_implies(&self, a: Expr, b: Expr) -> Result<Expr, ConstructionError> {
        self.apply(Op::Implies, &[a, b])
    }

    pub fn apply_ite(&self, cond: Expr, then: Expr, other: Expr) -> Result<Expr, ConstructionError> {
        self.apply(Op::Ite, &[cond, then, other])
    }

    pub fn apply_eq(&self, a: Expr, b: Expr) -> Result<Expr, ConstructionError> {
        self.apply(Op::Eq, &[a, b])
    }

    pub fn apply_bit(&self, v: Expr, index: u32) -> Result<Expr, ConstructionError> {
        self.apply(Op::Bit { index }, &[v])
    }

    pub fn apply_bits(&self, bits: &[Expr]) -> Result<Expr, ConstructionError> {
        self.apply(Op::Bits, bits)
    }

    pub fn apply_add(&self, a: Expr, b: Expr, width: u32) -> Result<Expr, ConstructionError> {
        self.apply(Op::Add { width }, &[a, b])
    }

    pub fn apply_mul(&self, a: Expr, b: Expr, width: u32) -> Result<Expr, ConstructionError> {
        self.apply(Op::Mul { width }, &[a, b])
    }

    pub fn apply_tuple(&self, fields: &[Expr]) -> Result<Expr, ConstructionError> {
        self.apply(Op::Tuple, fields)
    }

    pub fn apply_field(&self, v: Expr, index: u32) -> Result<Expr, ConstructionError> {
        self.apply(Op::Field { index }, &[v])
    }
}

// Rewrite memo
impl Context {
    pub(crate) fn cached_rewrite(&self, pass: Pass, e: Expr) -> Option<Expr> {
        self.rewrites.borrow().get(&(pass, e)).copied()
    }

    pub(crate) fn cache_rewrite(&self, pass: Pass, e: Expr, result: Expr) {
        self.rewrites.borrow_mut().insert((pass, e), result);
    }
}

fn kind_rank(kind: &NodeKind) -> u8 {
    match kind {
        NodeKind::Constant(_) => 0,
        NodeKind::Variable(_) => 1,
        NodeKind::Apply { .. } => 2,
    }
}

// Queries
impl Context {
    /// Structural total order on expressions.
    ///
    /// Constants come first, then variables, then applications. Ties are broken
    /// by valtype and value, by name, or by operator and then the operands
    /// lexicographically. The order never depends on construction order.
    pub fn compare(&self, a: Expr, b: Expr) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let na = self.node(a);
        let nb = self.node(b);
        match (&na.kind, &nb.kind) {
            (NodeKind::Constant(x), NodeKind::Constant(y)) => {
                na.valtype.cmp(&nb.valtype).then_with(|| x.cmp(y))
            }
            (NodeKind::Variable(x), NodeKind::Variable(y)) => x.cmp(y),
            (
                NodeKind::Apply { op: p, operands: xs },
                NodeKind::Apply { op: q, operands: ys },
            ) => p.cmp(q).then_with(|| {
                for (&x, &y) in xs.iter().zip(ys.iter()) {
                    let ord = self.compare(x, y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                xs.len().cmp(&ys.len())
            }),
            (x, y) => kind_rank(x).cmp(&kind_rank(y)),
        }
    }

    /// Evaluates `e` under the assignment `env` (variable name to value).
    ///
    /// Returns `None` if a reachable variable is unbound or bound to a value
    /// outside its valtype.
    pub fn evaluate(&self, e: Expr, env: &HashMap<String, Value>) -> Option<Value> {
        let mut cache = HashMap::new();
        self._evaluate(e, env, &mut cache)
    }

    fn _evaluate(&self, e: Expr, env: &HashMap<String, Value>, cache: &mut HashMap<Expr, Value>) -> Option<Value> {
        if let Some(value) = cache.get(&e) {
            return Some(value.clone());
        }
        let node = self.node(e);
        let value = match &node.kind {
            NodeKind::Variable(name) => {
                let value = env.get(&**name)?;
                if !node.valtype.is_valid(value) {
                    return None;
                }
                value.clone()
            }
            NodeKind::Constant(value) => value.clone(),
            NodeKind::Apply { op, operands } => {
                let values = operands
                    .iter()
                    .map(|&x| self._evaluate(x, env, cache))
                    .collect::<Option<Vec<_>>>()?;
                op.evaluate(&values)
            }
        };
        cache.insert(e, value.clone());
        Some(value)
    }

    /// All distinct nodes reachable from `roots`, in depth-first pre-order.
    pub fn descendants(&self, roots: impl IntoIterator<Item = Expr>) -> Vec<Expr> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<Expr> = roots.into_iter().collect();
        stack.reverse();
        while let Some(e) = stack.pop() {
            if visited.insert(e) {
                order.push(e);
                stack.extend(self.operands(e).iter().rev().copied());
            }
        }
        order
    }

    /// Variables reachable from `roots`, in order of first occurrence.
    pub fn variables(&self, roots: impl IntoIterator<Item = Expr>) -> Vec<Expr> {
        self.descendants(roots)
            .into_iter()
            .filter(|&e| self.is_variable(e))
            .collect()
    }

    /// Number of distinct nodes in the DAG rooted at `e`.
    pub fn size(&self, e: Expr) -> usize {
        self.descendants([e]).len()
    }

    /// Renders `e` as an s-expression, e.g. `(and x (not y))`.
    ///
    /// The output is linear in the size of the DAG: an operator node with
    /// several parents is written out once as `@N=(..)`, where `N` is its
    /// handle index, and referenced as `@N` afterwards.
    pub fn to_bracket_string(&self, e: Expr) -> String {
        let mut parents: HashMap<Expr, usize> = HashMap::new();
        for d in self.descendants([e]) {
            for &x in self.operands(d).iter() {
                *parents.entry(x).or_insert(0) += 1;
            }
        }
        let mut written = HashSet::new();
        let mut out = String::new();
        self.write_bracket(e, &parents, &mut written, &mut out);
        out
    }

    fn write_bracket(&self, e: Expr, parents: &HashMap<Expr, usize>, written: &mut HashSet<Expr>, out: &mut String) {
        let node = self.node(e);
        match &node.kind {
            NodeKind::Variable(name) => out.push_str(name),
            NodeKind::Constant(value) => out.push_str(&node.valtype.display(value)),
            NodeKind::Apply { op, operands } => {
                if parents.get(&e).copied().unwrap_or(0) > 1 {
                    if !written.insert(e) {
                        let _ = write!(out, "@{}", e.index());
                        return;
                    }
                    let _ = write!(out, "@{}=", e.index());
                }
                let _ = write!(out, "({}", op);
                for &x in operands.iter() {
                    out.push(' ');
                    self.write_bracket(x, parents, written, out);
                }
                out.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_interning() {
        let ctx = Context::default();
        let x = ctx.mk_bool_var("x").unwrap();
        let y = ctx.mk_bool_var("y").unwrap();
        assert_eq!(ctx.mk_bool_var("x").unwrap(), x);
        let a = ctx.apply_and(&[x, y]).unwrap();
        let b = ctx.apply_and(&[x, y]).unwrap();
        assert_eq!(a, b);
        let c = ctx.apply_and(&[y, x]).unwrap();
        assert_ne!(a, c);
        assert_eq!(ctx.mk_bool(true), ctx.mk_bool(true));
        assert_ne!(ctx.mk_bool(true), ctx.mk_bool(false));
    }

    #[test]
    fn test_interning_survives_growth() {
        let ctx = Context::new(2);
        let vars: Vec<Expr> = (0..100).map(|i| ctx.mk_bool_var(&format!("v{}", i)).unwrap()).collect();
        let ands: Vec<Expr> = vars.windows(2).map(|w| ctx.apply_and(w).unwrap()).collect();
        let again: Vec<Expr> = vars.windows(2).map(|w| ctx.apply_and(w).unwrap()).collect();
        assert_eq!(ands, again);
        assert_eq!(ctx.num_nodes(), 100 + 99);
    }

    #[test]
    fn test_variable_redeclared() {
        let ctx = Context::default();
        ctx.mk_var("x", Valtype::bitvector(3)).unwrap();
        let err = ctx.mk_var("x", Valtype::bitvector(4)).unwrap_err();
        assert!(matches!(err, ConstructionError::VariableRedeclared { .. }));
        assert!(ctx.mk_var("x", Valtype::bitvector(3)).is_ok());
        assert!(matches!(
            ctx.mk_bool_var("x").unwrap_err(),
            ConstructionError::VariableRedeclared { .. }
        ));
        let p = ctx.mk_bool_var("p").unwrap();
        assert_eq!(ctx.mk_bool_var("p").unwrap(), p);
    }

    #[test]
    fn test_atoms_and_literals() {
        let ctx = Context::default();
        let p = ctx.mk_bool_var("p").unwrap();
        let v = ctx.mk_var("v", Valtype::bitvector(3)).unwrap();
        let pair = ctx.mk_product_valtype(&[Valtype::Bool, Valtype::bitvector(2)]);
        let t = ctx.mk_var("t", pair).unwrap();

        let v1 = ctx.apply_bit(v, 1).unwrap();
        let t0 = ctx.apply_field(t, 0).unwrap();
        let t11 = ctx.apply_bit(ctx.apply_field(t, 1).unwrap(), 1).unwrap();
        for atom in [p, v1, t0, t11] {
            assert!(ctx.is_atom(atom), "{}", ctx.to_bracket_string(atom));
            assert!(ctx.is_literal(ctx.apply_not(atom).unwrap()));
        }

        // Non-boolean selections and selections from composites are not atoms.
        assert!(!ctx.is_atom(v));
        assert!(!ctx.is_atom(ctx.apply_field(t, 1).unwrap()));
        let sum = ctx.apply_add(v, v, 3).unwrap();
        assert!(!ctx.is_atom(ctx.apply_bit(sum, 0).unwrap()));
        assert!(!ctx.is_literal(ctx.mk_bool(true)));

        // Clauses accept bit literals.
        let nv1 = ctx.apply_not(v1).unwrap();
        assert!(ctx.apply_clause(&[p, nv1, t11]).is_ok());
    }

    #[test]
    fn test_constant_validation() {
        let ctx = Context::default();
        assert!(ctx.mk_bv(3, 7u32).is_ok());
        assert!(matches!(
            ctx.mk_bv(3, 8u32).unwrap_err(),
            ConstructionError::InvalidConstant { .. }
        ));
        assert!(ctx.mk_bv(0, 0u32).is_err());
        assert_ne!(ctx.mk_bv(3, 0u32).unwrap(), ctx.mk_bv(4, 0u32).unwrap());
    }

    #[test]
    fn test_arity_error() {
        let ctx = Context::default();
        let x = ctx.mk_bool_var("x").unwrap();
        let err = ctx.apply(Op::Xor, &[x, x, x]).unwrap_err();
        assert_eq!(err.to_string(), "xor: expected 2 operands, got 3");
        assert!(ctx.apply_and(&[]).is_err());
    }

    #[test]
    fn test_product_valtypes_are_shared() {
        let ctx = Context::default();
        let a = ctx.mk_product_valtype(&[Valtype::Bool, Valtype::bitvector(2)]);
        let b = ctx.mk_product_valtype(&[Valtype::Bool, Valtype::bitvector(2)]);
        assert_eq!(a, b);
        match (&a, &b) {
            (Valtype::Product(x), Valtype::Product(y)) => assert!(Rc::ptr_eq(x, y)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_compare_is_structural() {
        let ctx = Context::default();
        let b = ctx.mk_bool_var("b").unwrap();
        let a = ctx.mk_bool_var("a").unwrap();
        let t = ctx.mk_bool(true);
        assert_eq!(ctx.compare(a, b), Ordering::Less);
        assert_eq!(ctx.compare(t, a), Ordering::Less);
        let na = ctx.apply_not(a).unwrap();
        let nb = ctx.apply_not(b).unwrap();
        assert_eq!(ctx.compare(na, nb), Ordering::Less);
        assert_eq!(ctx.compare(b, na), Ordering::Less);
    }

    #[test]
    fn test_evaluate() {
        let ctx = Context::default();
        let x = ctx.mk_var("x", Valtype::bitvector(3)).unwrap();
        let y = ctx.mk_var("y", Valtype::bitvector(3)).unwrap();
        let m = ctx.apply_mul(x, y, 6).unwrap();
        let env = HashMap::from([("x".to_string(), Value::from(6u32)), ("y".to_string(), Value::from(7u32))]);
        assert_eq!(ctx.evaluate(m, &env), Some(Value::from(42u32)));
        let env = HashMap::from([("x".to_string(), Value::from(6u32))]);
        assert_eq!(ctx.evaluate(m, &env), None);
    }

    #[test]
    fn test_variables_and_size() {
        let ctx = Context::default();
        let x = ctx.mk_bool_var("x").unwrap();
        let y = ctx.mk_bool_var("y").unwrap();
        let nx = ctx.apply_not(x).unwrap();
        let f = ctx.apply_or(&[nx, y, x]).unwrap();
        assert_eq!(ctx.variables([f]), vec![x, y]);
        assert_eq!(ctx.size(f), 4);
        assert_eq!(ctx.to_bracket_string(f), "(or (not x) y x)");
    }

    #[test]
    fn test_bracket_string_constants() {
        let ctx = Context::default();
        let x = ctx.mk_var("x", Valtype::bitvector(3)).unwrap();
        let five = ctx.mk_bv(3, 5u32).unwrap();
        let e = ctx.apply_eq(x, five).unwrap();
        assert_eq!(ctx.to_bracket_string(e), "(eq x 5:uint3)");
        let b = ctx.apply_bit(x, 2).unwrap();
        assert_eq!(ctx.to_bracket_string(b), "(bit[2] x)");
    }

    #[test]
    fn test_bracket_string_shares_nodes() {
        let ctx = Context::default();
        let x = ctx.mk_bool_var("x").unwrap();
        let y = ctx.mk_bool_var("y").unwrap();
        let xy = ctx.apply_xor(x, y).unwrap();
        let e = ctx.apply_and(&[xy, ctx.apply_or(&[xy, x]).unwrap()]).unwrap();
        let n = xy.index();
        assert_eq!(ctx.to_bracket_string(e), format!("(and @{n}=(xor x y) (or @{n} x))"));
    }

    #[test]
    fn test_bracket_string_is_linear_in_dag_size() {
        // A chain of doublings: the unshared tree has 2^40 leaves.
        let ctx = Context::default();
        let mut e = ctx.mk_bool_var("x").unwrap();
        for _ in 0..40 {
            e = ctx.apply_xor(e, e).unwrap();
        }
        let s = ctx.to_bracket_string(e);
        assert_eq!(s.matches("(xor").count(), 40);
        assert!(s.len() < 40 * 32);
    }
}
