//! Bitvector operators: `eq`, `bit`, `bits`, `add`, `mul`.
//!
//! Arithmetic is unsigned and wraps modulo `2^width`, where `width` is the
//! operator attribute. Operands may be narrower or wider than the result:
//! missing high bits read as zero, extra high bits are dropped.

use log::debug;
use num_bigint::BigUint;

use super::{Op, Rewrite};
use crate::context::Context;
use crate::error::ConstructionError;
use crate::reference::Expr;
use crate::types::{modulus, Valtype, Value};

pub(super) fn validate_eq(valtypes: &[Valtype]) -> Result<(), ConstructionError> {
    if valtypes[0] != valtypes[1] {
        return Err(ConstructionError::InvalidOperand {
            op: Op::Eq.name(),
            position: 1,
            expected: valtypes[0].to_string(),
            actual: valtypes[1].to_string(),
        });
    }
    Ok(())
}

pub(super) fn validate_bit(index: u32, valtypes: &[Valtype]) -> Result<(), ConstructionError> {
    let op = Op::Bit { index }.name();
    let width = valtypes[0].width().ok_or_else(|| ConstructionError::InvalidOperand {
        op,
        position: 0,
        expected: "a bitvector".to_string(),
        actual: valtypes[0].to_string(),
    })?;
    if index >= width {
        return Err(ConstructionError::InvalidAttribute {
            op,
            attribute: "index",
            expected: format!("less than {}", width),
            actual: index.to_string(),
        });
    }
    Ok(())
}

pub(super) fn validate_arith(op: &Op, width: u32, valtypes: &[Valtype]) -> Result<(), ConstructionError> {
    if width == 0 {
        return Err(ConstructionError::InvalidAttribute {
            op: op.name(),
            attribute: "width",
            expected: "at least 1".to_string(),
            actual: width.to_string(),
        });
    }
    for (position, valtype) in valtypes.iter().enumerate() {
        if !valtype.is_bitvector() {
            return Err(ConstructionError::InvalidOperand {
                op: op.name(),
                position,
                expected: "a bitvector".to_string(),
                actual: valtype.to_string(),
            });
        }
    }
    Ok(())
}

fn uint_at(values: &[Value], i: usize) -> &BigUint {
    match &values[i] {
        Value::BitVector(n) => n,
        v => panic!("Expected a bitvector operand, got {}", v),
    }
}

pub(super) fn evaluate(op: &Op, values: &[Value]) -> Value {
    match *op {
        Op::Bit { index } => Value::Bool(uint_at(values, 0).bit(index as u64)),
        Op::Bits => {
            let mut n = BigUint::ZERO;
            for (i, v) in values.iter().enumerate() {
                match v {
                    Value::Bool(true) => n.set_bit(i as u64, true),
                    Value::Bool(false) => {}
                    v => panic!("Expected a boolean operand, got {}", v),
                }
            }
            Value::BitVector(n)
        }
        Op::Add { width } => Value::BitVector((uint_at(values, 0) + uint_at(values, 1)) % modulus(width)),
        Op::Mul { width } => Value::BitVector((uint_at(values, 0) * uint_at(values, 1)) % modulus(width)),
        _ => unreachable!("{} is not a bitvector operator", op),
    }
}

// ─── Simplification ───

pub(super) fn simplify_eq(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let (a, b) = (operands[0], operands[1]);
    if a == b {
        debug!("eq(x, x) => true");
        return Ok(Some(ctx.mk_bool(true)));
    }
    if ctx.valtype(a).is_bool() {
        for (x, y) in [(a, b), (b, a)] {
            match ctx.bool_constant(x) {
                Some(true) => return Ok(Some(y)),
                Some(false) => return ctx.apply_not(y).map(Some),
                None => {}
            }
        }
        if ctx.negated(a) == Some(b) || ctx.negated(b) == Some(a) {
            return Ok(Some(ctx.mk_bool(false)));
        }
    }
    Ok(None)
}

/// bit(bits(x0, .., xn), i) => xi
pub(super) fn simplify_bit(index: u32, ctx: &Context, operands: &[Expr]) -> Rewrite {
    let v = operands[0];
    if ctx.op(v) == Some(Op::Bits) {
        return Ok(Some(ctx.operands(v)[index as usize]));
    }
    Ok(None)
}

/// bits(bit(v, 0), .., bit(v, n-1)) => v, when `v` has width `n`.
pub(super) fn simplify_bits(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let source = match ctx.op(operands[0]) {
        Some(Op::Bit { index: 0 }) => ctx.operands(operands[0])[0],
        _ => return Ok(None),
    };
    if ctx.valtype(source).width() != Some(operands.len() as u32) {
        return Ok(None);
    }
    for (i, &e) in operands.iter().enumerate() {
        if ctx.op(e) != Some(Op::Bit { index: i as u32 }) || ctx.operands(e)[0] != source {
            return Ok(None);
        }
    }
    debug!("bits(bit(v, 0..{})) => v", operands.len());
    Ok(Some(source))
}

fn is_uint(ctx: &Context, e: Expr, n: u32) -> bool {
    matches!(ctx.constant(e), Some(Value::BitVector(v)) if v == BigUint::from(n))
}

pub(super) fn simplify_add(width: u32, ctx: &Context, operands: &[Expr]) -> Rewrite {
    let (a, b) = (operands[0], operands[1]);
    for (x, y) in [(a, b), (b, a)] {
        // add(0, y) => y, if no truncation happens
        if is_uint(ctx, x, 0) && ctx.valtype(y).width() == Some(width) {
            return Ok(Some(y));
        }
    }
    Ok(None)
}

pub(super) fn simplify_mul(width: u32, ctx: &Context, operands: &[Expr]) -> Rewrite {
    let (a, b) = (operands[0], operands[1]);
    for (x, y) in [(a, b), (b, a)] {
        if is_uint(ctx, x, 0) {
            return ctx.mk_bv(width, 0u32).map(Some);
        }
        if is_uint(ctx, x, 1) && ctx.valtype(y).width() == Some(width) {
            return Ok(Some(y));
        }
    }
    Ok(None)
}

// ─── Decomposition ───

/// The low `width` bits of `e`, zero-extended when `e` is narrower.
fn bits_of(ctx: &Context, e: Expr, width: u32) -> Result<Vec<Expr>, ConstructionError> {
    let actual = ctx.valtype(e).width().unwrap_or(0);
    (0..width)
        .map(|i| {
            if i < actual {
                ctx.apply_bit(e, i)
            } else {
                Ok(ctx.mk_bool(false))
            }
        })
        .collect()
}

/// Ripple-carry addition of two equally long bit rows; the final carry is dropped.
fn ripple_add(ctx: &Context, xs: &[Expr], ys: &[Expr]) -> Result<Vec<Expr>, ConstructionError> {
    assert_eq!(xs.len(), ys.len());
    let n = xs.len();
    let mut sum = Vec::with_capacity(n);
    let mut carry: Option<Expr> = None;
    for i in 0..n {
        let (x, y) = (xs[i], ys[i]);
        let half = ctx.apply_xor(x, y)?;
        let last = i + 1 == n;
        match carry {
            None => {
                sum.push(half);
                if !last {
                    carry = Some(ctx.apply_and(&[x, y])?);
                }
            }
            Some(c) => {
                sum.push(ctx.apply_xor(half, c)?);
                if !last {
                    let generate = ctx.apply_and(&[x, y])?;
                    let propagate = ctx.apply_and(&[c, half])?;
                    carry = Some(ctx.apply_or(&[generate, propagate])?);
                }
            }
        }
    }
    Ok(sum)
}

/// add(a, b) => bits(ripple-carry sum of the bits of `a` and `b`)
pub(super) fn decompose_add(width: u32, ctx: &Context, operands: &[Expr]) -> Rewrite {
    let xs = bits_of(ctx, operands[0], width)?;
    let ys = bits_of(ctx, operands[1], width)?;
    let sum = ripple_add(ctx, &xs, &ys)?;
    ctx.apply_bits(&sum).map(Some)
}

/// Shift-and-add multiplier: row `j` holds the partial products `a[i] & b[j]`
/// shifted by `j`, and is accumulated into columns `j..width` with a ripple-carry adder.
pub(super) fn decompose_mul(width: u32, ctx: &Context, operands: &[Expr]) -> Rewrite {
    let xs = bits_of(ctx, operands[0], width)?;
    let ys = bits_of(ctx, operands[1], width)?;
    let n = width as usize;

    let mut acc: Vec<Expr> = Vec::with_capacity(n);
    for &x in &xs {
        acc.push(ctx.apply_and(&[x, ys[0]])?);
    }
    for j in 1..n {
        let row: Vec<Expr> = (j..n)
            .map(|i| ctx.apply_and(&[xs[i - j], ys[j]]))
            .collect::<Result<_, _>>()?;
        let sum = ripple_add(ctx, &acc[j..], &row)?;
        acc.truncate(j);
        acc.extend(sum);
    }
    ctx.apply_bits(&acc).map(Some)
}

/// eq(a, b) => and(eq(bit(a, 0), bit(b, 0)), .., eq(bit(a, w-1), bit(b, w-1)))
pub(super) fn decompose_eq(width: u32, ctx: &Context, operands: &[Expr]) -> Rewrite {
    let (a, b) = (operands[0], operands[1]);
    let bits = (0..width)
        .map(|i| ctx.apply_eq(ctx.apply_bit(a, i)?, ctx.apply_bit(b, i)?))
        .collect::<Result<Vec<_>, _>>()?;
    ctx.apply_and(&bits).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use test_log::test;

    #[test]
    fn test_bit_index_out_of_range() {
        let ctx = Context::default();
        let x = ctx.mk_var("x", Valtype::bitvector(3)).unwrap();
        let err = ctx.apply_bit(x, 3).unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::InvalidAttribute { op: "bit", attribute: "index", .. }
        ));
        assert!(ctx.apply_bit(x, 2).is_ok());
    }

    #[test]
    fn test_eq_requires_same_valtype() {
        let ctx = Context::default();
        let x = ctx.mk_var("x", Valtype::bitvector(3)).unwrap();
        let y = ctx.mk_var("y", Valtype::bitvector(4)).unwrap();
        assert!(ctx.apply_eq(x, y).is_err());
        assert_eq!(ctx.valtype(ctx.apply_eq(x, x).unwrap()), Valtype::Bool);
    }

    #[test]
    fn test_arith_rejects_booleans() {
        let ctx = Context::default();
        let p = ctx.mk_bool_var("p").unwrap();
        let x = ctx.mk_var("x", Valtype::bitvector(3)).unwrap();
        let err = ctx.apply_add(p, x, 3).unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidOperand { op: "add", position: 0, .. }));
        let err = ctx.apply_mul(x, x, 0).unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidAttribute { attribute: "width", .. }));
    }

    #[test]
    fn test_constant_fold_mul() {
        let ctx = Context::default();
        let a = ctx.mk_bv(3, 6u32).unwrap();
        let b = ctx.mk_bv(3, 7u32).unwrap();
        let m = ctx.apply_mul(a, b, 6).unwrap();
        let folded = Op::Mul { width: 6 }.simplify(&ctx, &ctx.operands(m)).unwrap();
        assert_eq!(folded, Some(ctx.mk_bv(6, 42u32).unwrap()));
    }

    #[test]
    fn test_bit_of_bits() {
        let ctx = Context::default();
        let p = ctx.mk_bool_var("p").unwrap();
        let q = ctx.mk_bool_var("q").unwrap();
        let v = ctx.apply_bits(&[p, q]).unwrap();
        assert_eq!(Op::Bit { index: 1 }.simplify(&ctx, &[v]).unwrap(), Some(q));
    }

    #[test]
    fn test_bits_of_bit() {
        let ctx = Context::default();
        let x = ctx.mk_var("x", Valtype::bitvector(2)).unwrap();
        let b0 = ctx.apply_bit(x, 0).unwrap();
        let b1 = ctx.apply_bit(x, 1).unwrap();
        assert_eq!(Op::Bits.simplify(&ctx, &[b0, b1]).unwrap(), Some(x));
        assert_eq!(Op::Bits.simplify(&ctx, &[b1, b0]).unwrap(), None);
        assert_eq!(Op::Bits.simplify(&ctx, &[b0]).unwrap(), None);
    }

    #[test]
    fn test_mul_identities() {
        let ctx = Context::default();
        let x = ctx.mk_var("x", Valtype::bitvector(4)).unwrap();
        let zero = ctx.mk_bv(4, 0u32).unwrap();
        let one = ctx.mk_bv(2, 1u32).unwrap();
        assert_eq!(Op::Mul { width: 4 }.simplify(&ctx, &[x, zero]).unwrap(), Some(zero));
        assert_eq!(Op::Mul { width: 4 }.simplify(&ctx, &[one, x]).unwrap(), Some(x));
        // Truncating width: no identity rewrite.
        assert_eq!(Op::Mul { width: 3 }.simplify(&ctx, &[one, x]).unwrap(), None);
        assert_eq!(Op::Add { width: 4 }.simplify(&ctx, &[zero, x]).unwrap(), Some(x));
    }

    fn check_decomposition(op: Op, width_a: u32, width_b: u32) {
        let ctx = Context::default();
        let a = ctx.mk_var("a", Valtype::bitvector(width_a)).unwrap();
        let b = ctx.mk_var("b", Valtype::bitvector(width_b)).unwrap();
        let e = ctx.apply(op, &[a, b]).unwrap();
        let d = op.decompose(&ctx, &[a, b]).unwrap().unwrap();
        assert_eq!(ctx.valtype(d), ctx.valtype(e));
        for x in 0..(1u32 << width_a) {
            for y in 0..(1u32 << width_b) {
                let env = HashMap::from([
                    ("a".to_string(), Value::from(x)),
                    ("b".to_string(), Value::from(y)),
                ]);
                assert_eq!(ctx.evaluate(d, &env), ctx.evaluate(e, &env), "{}({}, {})", op, x, y);
            }
        }
    }

    #[test]
    fn test_decompose_add() {
        check_decomposition(Op::Add { width: 3 }, 3, 3);
        check_decomposition(Op::Add { width: 4 }, 3, 2);
        check_decomposition(Op::Add { width: 2 }, 3, 3);
    }

    #[test]
    fn test_decompose_mul() {
        check_decomposition(Op::Mul { width: 3 }, 3, 3);
        check_decomposition(Op::Mul { width: 6 }, 3, 3);
        check_decomposition(Op::Mul { width: 1 }, 2, 2);
    }
}
