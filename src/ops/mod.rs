//! Operator definition table.
//!
//! Every operator is a variant of the closed enumeration [`Op`]. For each operator
//! this module provides, through exhaustive `match`es:
//!
//! - **[`Op::validate`]**: arity, operand valtypes and attribute schema.
//! - **[`Op::result_valtype`]**: type inference.
//! - **[`Op::evaluate`]**: the semantic function on concrete values.
//!
//! The optional rewrite capabilities are guarded by [`Op::capabilities`]:
//!
//! - **[`Op::simplify`]**: a provably-equivalent simpler expression.
//! - **[`Op::negate`]**: the negation of the operator application, used to push negations to leaves.
//! - **[`Op::canonicalize`]**: a deterministic operand order for commutative operators.
//! - **[`Op::decompose`]**: an equivalent expression over lower-ranked operators.
//!
//! # Rank
//!
//! Decomposition terminates because every decomposition only produces operators of
//! strictly lower rank: `mul`/`add` to `bits`/`bit`/`and`/`or`/`xor`, bitvector `ite`
//! to boolean `ite` to `and`/`or`/`not`, `implies` to `or`/`not`, and bitvector or
//! product `eq` to `eq` over bits or fields. Any new decomposition must uphold the
//! same obligation; it is not checked at runtime.

use std::fmt;

use crate::context::Context;
use crate::error::ConstructionError;
use crate::reference::Expr;
use crate::types::{Valtype, Value};
use crate::utils::pairing2;

pub mod bitvec;
pub mod logic;
pub mod product;

/// Result of an optional rewrite: `Ok(None)` means "no change".
pub type Rewrite = Result<Option<Expr>, ConstructionError>;

/// Operator identifier, with its attributes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Op {
    /// Logical negation.
    Not,
    /// Logical conjunction.
    And,
    /// Logical disjunction.
    Or,
    /// CNF-primitive disjunction: every operand is a variable or its negation.
    Clause,
    /// Exclusive or of two booleans.
    Xor,
    /// Logical implication.
    Implies,
    /// If-then-else over booleans or bitvectors.
    Ite,
    /// Equality of two values of the same valtype.
    Eq,
    /// The `index`-th bit of a bitvector.
    Bit { index: u32 },
    /// A bitvector assembled from booleans, least significant first.
    Bits,
    /// Addition modulo `2^width`.
    Add { width: u32 },
    /// Multiplication modulo `2^width`.
    Mul { width: u32 },
    /// A product value assembled from its fields.
    Tuple,
    /// The `index`-th field of a product value.
    Field { index: u32 },
}

/// Operand count constraint.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Exactly(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(k) => write!(f, "{}", k),
            Arity::AtLeast(k) => write!(f, "at least {}", k),
        }
    }
}

/// Optional rewrite capabilities of an operator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct Capabilities {
    pub simplify: bool,
    pub push_negation: bool,
    pub canonicalize: bool,
    pub decompose: bool,
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Not => "not",
            Op::And => "and",
            Op::Or => "or",
            Op::Clause => "clause",
            Op::Xor => "xor",
            Op::Implies => "implies",
            Op::Ite => "ite",
            Op::Eq => "eq",
            Op::Bit { .. } => "bit",
            Op::Bits => "bits",
            Op::Add { .. } => "add",
            Op::Mul { .. } => "mul",
            Op::Tuple => "tuple",
            Op::Field { .. } => "field",
        }
    }

    /// Structural key of the operator tag and its attributes.
    pub(crate) fn key(&self) -> u64 {
        let (tag, attr) = match *self {
            Op::Not => (0, 0),
            Op::And => (1, 0),
            Op::Or => (2, 0),
            Op::Clause => (3, 0),
            Op::Xor => (4, 0),
            Op::Implies => (5, 0),
            Op::Ite => (6, 0),
            Op::Eq => (7, 0),
            Op::Bit { index } => (8, index),
            Op::Bits => (9, 0),
            Op::Add { width } => (10, width),
            Op::Mul { width } => (11, width),
            Op::Tuple => (12, 0),
            Op::Field { index } => (13, index),
        };
        pairing2(tag, attr as u64)
    }

    pub fn arity(&self) -> Arity {
        match self {
            Op::Not | Op::Bit { .. } | Op::Field { .. } => Arity::Exactly(1),
            Op::Xor | Op::Implies | Op::Eq | Op::Add { .. } | Op::Mul { .. } => Arity::Exactly(2),
            Op::Ite => Arity::Exactly(3),
            Op::And | Op::Or | Op::Clause | Op::Bits | Op::Tuple => Arity::AtLeast(1),
        }
    }

    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            Op::And | Op::Or | Op::Clause | Op::Xor | Op::Eq | Op::Add { .. } | Op::Mul { .. }
        )
    }

    pub fn capabilities(&self) -> Capabilities {
        let commutative = self.is_commutative();
        match self {
            Op::Not => Capabilities {
                simplify: true,
                push_negation: true,
                ..Default::default()
            },
            Op::And | Op::Or | Op::Clause | Op::Xor => Capabilities {
                simplify: true,
                push_negation: true,
                canonicalize: commutative,
                decompose: false,
            },
            Op::Eq => Capabilities {
                simplify: true,
                push_negation: true,
                canonicalize: commutative,
                decompose: true,
            },
            Op::Implies | Op::Ite => Capabilities {
                simplify: true,
                push_negation: true,
                canonicalize: false,
                decompose: true,
            },
            Op::Add { .. } | Op::Mul { .. } => Capabilities {
                simplify: true,
                push_negation: false,
                canonicalize: commutative,
                decompose: true,
            },
            Op::Bit { .. } | Op::Bits | Op::Tuple | Op::Field { .. } => Capabilities {
                simplify: true,
                ..Default::default()
            },
        }
    }

    /// Checks arity, operand valtypes and attributes.
    pub fn validate(&self, ctx: &Context, operands: &[Expr]) -> Result<(), ConstructionError> {
        if !self.arity().accepts(operands.len()) {
            return Err(ConstructionError::InvalidArity {
                op: self.name(),
                expected: self.arity().to_string(),
                actual: operands.len(),
            });
        }
        let valtypes: Vec<Valtype> = operands.iter().map(|&e| ctx.valtype(e)).collect();
        match *self {
            Op::Not | Op::And | Op::Or | Op::Xor | Op::Implies => logic::validate_bools(self, &valtypes),
            Op::Clause => logic::validate_clause(ctx, operands, &valtypes),
            Op::Ite => logic::validate_ite(&valtypes),
            Op::Eq => bitvec::validate_eq(&valtypes),
            Op::Bit { index } => bitvec::validate_bit(index, &valtypes),
            Op::Bits => logic::validate_bools(self, &valtypes),
            Op::Add { width } | Op::Mul { width } => bitvec::validate_arith(self, width, &valtypes),
            Op::Tuple => Ok(()),
            Op::Field { index } => product::validate_field(index, &valtypes),
        }
    }

    /// Infers the result valtype. Operands must have been validated.
    pub fn result_valtype(&self, operands: &[Valtype]) -> Valtype {
        match *self {
            Op::Not | Op::And | Op::Or | Op::Clause | Op::Xor | Op::Implies | Op::Eq | Op::Bit { .. } => {
                Valtype::Bool
            }
            Op::Ite => operands[1].clone(),
            Op::Bits => Valtype::bitvector(operands.len() as u32),
            Op::Add { width } | Op::Mul { width } => Valtype::bitvector(width),
            Op::Tuple => Valtype::Product(operands.iter().cloned().collect()),
            Op::Field { index } => product::field_valtype(index, &operands[0]),
        }
    }

    /// Evaluates the operator on concrete operand values.
    ///
    /// # Panics
    ///
    /// Panics if the values do not match the operand valtypes accepted by [`Op::validate`].
    pub fn evaluate(&self, values: &[Value]) -> Value {
        match *self {
            Op::Not | Op::And | Op::Or | Op::Clause | Op::Xor | Op::Implies | Op::Ite => {
                logic::evaluate(self, values)
            }
            Op::Eq => Value::Bool(values[0] == values[1]),
            Op::Bit { .. } | Op::Bits | Op::Add { .. } | Op::Mul { .. } => bitvec::evaluate(self, values),
            Op::Tuple | Op::Field { .. } => product::evaluate(self, values),
        }
    }

    /// Simplifies `op(operands)`, assuming the operands are already simplified.
    pub fn simplify(&self, ctx: &Context, operands: &[Expr]) -> Rewrite {
        // Fold when every operand is a constant.
        let values: Option<Vec<Value>> = operands.iter().map(|&e| ctx.constant(e)).collect();
        if let Some(values) = values {
            let valtypes: Vec<Valtype> = operands.iter().map(|&e| ctx.valtype(e)).collect();
            let result = self.evaluate(&values);
            return ctx.mk_const(self.result_valtype(&valtypes), result).map(Some);
        }

        match *self {
            Op::Not => logic::simplify_not(ctx, operands),
            Op::And | Op::Or => logic::simplify_and_or(self, ctx, operands),
            Op::Clause => logic::simplify_clause(ctx, operands),
            Op::Xor => logic::simplify_xor(ctx, operands),
            Op::Implies => logic::simplify_implies(ctx, operands),
            Op::Ite => logic::simplify_ite(ctx, operands),
            Op::Eq => bitvec::simplify_eq(ctx, operands),
            Op::Bit { index } => bitvec::simplify_bit(index, ctx, operands),
            Op::Bits => bitvec::simplify_bits(ctx, operands),
            Op::Add { width } => bitvec::simplify_add(width, ctx, operands),
            Op::Mul { width } => bitvec::simplify_mul(width, ctx, operands),
            Op::Tuple => Ok(None),
            Op::Field { index } => product::simplify_field(index, ctx, operands),
        }
    }

    /// Builds an expression equivalent to `not(op(operands))` whose outermost
    /// operator is not `not`, if the operator knows how.
    pub fn negate(&self, ctx: &Context, operands: &[Expr]) -> Rewrite {
        match *self {
            Op::Not => Ok(Some(operands[0])),
            Op::And => logic::negate_and(ctx, operands),
            Op::Or | Op::Clause => logic::negate_or(ctx, operands),
            Op::Xor => logic::negate_xor(ctx, operands),
            Op::Implies => logic::negate_implies(ctx, operands),
            Op::Ite => logic::negate_ite(ctx, operands),
            Op::Eq => logic::negate_eq(ctx, operands),
            Op::Bit { .. } | Op::Bits | Op::Add { .. } | Op::Mul { .. } | Op::Tuple | Op::Field { .. } => Ok(None),
        }
    }

    /// Sorts the operands of a commutative operator into canonical order.
    pub fn canonicalize(&self, ctx: &Context, operands: &[Expr]) -> Rewrite {
        if !self.is_commutative() {
            return Ok(None);
        }
        let mut sorted = operands.to_vec();
        sorted.sort_by(|&a, &b| ctx.compare(a, b));
        if sorted.as_slice() == operands {
            return Ok(None);
        }
        ctx.apply(*self, &sorted).map(Some)
    }

    /// Expresses `op(operands)` with lower-ranked operators.
    pub fn decompose(&self, ctx: &Context, operands: &[Expr]) -> Rewrite {
        match *self {
            Op::Implies => logic::decompose_implies(ctx, operands),
            Op::Ite => logic::decompose_ite(ctx, operands),
            Op::Add { width } => bitvec::decompose_add(width, ctx, operands),
            Op::Mul { width } => bitvec::decompose_mul(width, ctx, operands),
            Op::Eq => match ctx.valtype(operands[0]) {
                Valtype::Bool => Ok(None),
                Valtype::BitVector(width) => bitvec::decompose_eq(width, ctx, operands),
                Valtype::Product(fields) => product::decompose_eq(fields.len(), ctx, operands),
            },
            Op::Not
            | Op::And
            | Op::Or
            | Op::Clause
            | Op::Xor
            | Op::Bit { .. }
            | Op::Bits
            | Op::Tuple
            | Op::Field { .. } => Ok(None),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Bit { index } | Op::Field { index } => write!(f, "{}[{}]", self.name(), index),
            Op::Add { width } | Op::Mul { width } => write!(f, "{}[{}]", self.name(), width),
            _ => write!(f, "{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert!(Op::Xor.arity().accepts(2));
        assert!(!Op::Xor.arity().accepts(3));
        assert!(Op::And.arity().accepts(5));
        assert!(!Op::And.arity().accepts(0));
        assert_eq!(Op::And.arity().to_string(), "at least 1");
    }

    #[test]
    fn test_capabilities() {
        assert!(Op::Mul { width: 4 }.capabilities().decompose);
        assert!(!Op::And.capabilities().decompose);
        assert!(Op::And.capabilities().canonicalize);
        assert!(!Op::Implies.capabilities().canonicalize);
        assert!(!Op::Bits.capabilities().push_negation);
    }

    #[test]
    fn test_keys_distinguish_attributes() {
        assert_ne!(Op::Bit { index: 0 }.key(), Op::Bit { index: 1 }.key());
        assert_ne!(Op::Add { width: 3 }.key(), Op::Mul { width: 3 }.key());
        assert_eq!(Op::And.key(), Op::And.key());
    }

    #[test]
    fn test_evaluate_logic() {
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        assert_eq!(Op::And.evaluate(&[t.clone(), f.clone()]), f);
        assert_eq!(Op::Or.evaluate(&[t.clone(), f.clone()]), t);
        assert_eq!(Op::Xor.evaluate(&[t.clone(), t.clone()]), f);
        assert_eq!(Op::Implies.evaluate(&[f.clone(), f.clone()]), t);
        assert_eq!(Op::Eq.evaluate(&[Value::from(3u32), Value::from(3u32)]), t);
    }

    #[test]
    fn test_evaluate_mul_wraps() {
        let v = Op::Mul { width: 3 }.evaluate(&[Value::from(6u32), Value::from(7u32)]);
        assert_eq!(v, Value::from(42u32 % 8));
        let v = Op::Mul { width: 6 }.evaluate(&[Value::from(6u32), Value::from(7u32)]);
        assert_eq!(v, Value::from(42u32));
    }

    #[test]
    fn test_display() {
        assert_eq!(Op::Bit { index: 2 }.to_string(), "bit[2]");
        assert_eq!(Op::Mul { width: 6 }.to_string(), "mul[6]");
        assert_eq!(Op::And.to_string(), "and");
    }
}
