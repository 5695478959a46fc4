//! Boolean operators: `not`, `and`, `or`, `clause`, `xor`, `implies`, `ite`.

use std::collections::HashSet;

use log::debug;

use super::{Op, Rewrite};
use crate::context::Context;
use crate::error::ConstructionError;
use crate::reference::Expr;
use crate::types::{Valtype, Value};

pub(super) fn validate_bools(op: &Op, valtypes: &[Valtype]) -> Result<(), ConstructionError> {
    for (position, valtype) in valtypes.iter().enumerate() {
        if !valtype.is_bool() {
            return Err(ConstructionError::InvalidOperand {
                op: op.name(),
                position,
                expected: "bool".to_string(),
                actual: valtype.to_string(),
            });
        }
    }
    Ok(())
}

/// Every operand of a clause must already be in literal form.
pub(super) fn validate_clause(
    ctx: &Context,
    operands: &[Expr],
    valtypes: &[Valtype],
) -> Result<(), ConstructionError> {
    validate_bools(&Op::Clause, valtypes)?;
    for (position, &e) in operands.iter().enumerate() {
        if !ctx.is_literal(e) {
            return Err(ConstructionError::InvalidOperand {
                op: Op::Clause.name(),
                position,
                expected: "a literal".to_string(),
                actual: ctx.to_bracket_string(e),
            });
        }
    }
    Ok(())
}

pub(super) fn validate_ite(valtypes: &[Valtype]) -> Result<(), ConstructionError> {
    let op = Op::Ite.name();
    if !valtypes[0].is_bool() {
        return Err(ConstructionError::InvalidOperand {
            op,
            position: 0,
            expected: "bool".to_string(),
            actual: valtypes[0].to_string(),
        });
    }
    if !(valtypes[1].is_bool() || valtypes[1].is_bitvector()) {
        return Err(ConstructionError::InvalidOperand {
            op,
            position: 1,
            expected: "bool or a bitvector".to_string(),
            actual: valtypes[1].to_string(),
        });
    }
    if valtypes[2] != valtypes[1] {
        return Err(ConstructionError::InvalidOperand {
            op,
            position: 2,
            expected: valtypes[1].to_string(),
            actual: valtypes[2].to_string(),
        });
    }
    Ok(())
}

fn bool_at(values: &[Value], i: usize) -> bool {
    match values[i] {
        Value::Bool(b) => b,
        ref v => panic!("Expected a boolean operand, got {}", v),
    }
}

pub(super) fn evaluate(op: &Op, values: &[Value]) -> Value {
    let n = values.len();
    match op {
        Op::Not => Value::Bool(!bool_at(values, 0)),
        Op::And => Value::Bool((0..n).all(|i| bool_at(values, i))),
        Op::Or | Op::Clause => Value::Bool((0..n).any(|i| bool_at(values, i))),
        Op::Xor => Value::Bool(bool_at(values, 0) != bool_at(values, 1)),
        Op::Implies => Value::Bool(!bool_at(values, 0) || bool_at(values, 1)),
        Op::Ite => {
            if bool_at(values, 0) {
                values[1].clone()
            } else {
                values[2].clone()
            }
        }
        _ => unreachable!("{} is not a boolean operator", op),
    }
}

// ─── Simplification ───

pub(super) fn simplify_not(ctx: &Context, operands: &[Expr]) -> Rewrite {
    // not(not(x)) => x
    if let Some(inner) = ctx.negated(operands[0]) {
        debug!("not(not(x)) => x");
        return Ok(Some(inner));
    }
    Ok(None)
}

/// Shared rule set for `and` (identity `true`) and `or` (identity `false`).
pub(super) fn simplify_and_or(op: &Op, ctx: &Context, operands: &[Expr]) -> Rewrite {
    let identity = *op == Op::And;
    let annihilator = !identity;

    let mut out: Vec<Expr> = Vec::with_capacity(operands.len());
    let mut seen: HashSet<Expr> = HashSet::new();
    let mut stack: Vec<Expr> = operands.iter().rev().copied().collect();

    while let Some(x) = stack.pop() {
        if let Some(b) = ctx.bool_constant(x) {
            if b == annihilator {
                debug!("{}(.., {}, ..) => {}", op, b, annihilator);
                return Ok(Some(ctx.mk_bool(annihilator)));
            }
            continue;
        }
        let nested = ctx.op(x);
        let flatten = match op {
            Op::And => nested == Some(Op::And),
            _ => nested == Some(Op::Or) || nested == Some(Op::Clause),
        };
        if flatten {
            stack.extend(ctx.operands(x).iter().rev().copied());
            continue;
        }
        if seen.insert(x) {
            out.push(x);
        }
    }

    // x op not(x) => annihilator
    for &x in &out {
        if let Some(inner) = ctx.negated(x) {
            if seen.contains(&inner) {
                debug!("{}(x, not(x)) => {}", op, annihilator);
                return Ok(Some(ctx.mk_bool(annihilator)));
            }
        }
    }

    match out.len() {
        0 => Ok(Some(ctx.mk_bool(identity))),
        1 => Ok(Some(out[0])),
        _ if out.as_slice() == operands => Ok(None),
        _ => ctx.apply(*op, &out).map(Some),
    }
}

pub(super) fn simplify_clause(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let mut out: Vec<Expr> = Vec::with_capacity(operands.len());
    let mut seen: HashSet<Expr> = HashSet::new();
    for &x in operands {
        if seen.insert(x) {
            out.push(x);
        }
    }
    for &x in &out {
        if let Some(inner) = ctx.negated(x) {
            if seen.contains(&inner) {
                debug!("clause(x, not(x)) => true");
                return Ok(Some(ctx.mk_bool(true)));
            }
        }
    }
    match out.len() {
        1 => Ok(Some(out[0])),
        _ if out.as_slice() == operands => Ok(None),
        _ => ctx.apply(Op::Clause, &out).map(Some),
    }
}

pub(super) fn simplify_xor(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let (a, b) = (operands[0], operands[1]);

    for (x, y) in [(a, b), (b, a)] {
        match ctx.bool_constant(x) {
            Some(false) => return Ok(Some(y)),
            Some(true) => return ctx.apply_not(y).map(Some),
            None => {}
        }
    }
    if a == b {
        return Ok(Some(ctx.mk_bool(false)));
    }
    if ctx.negated(a) == Some(b) || ctx.negated(b) == Some(a) {
        return Ok(Some(ctx.mk_bool(true)));
    }
    // xor(not(x), not(y)) => xor(x, y)
    if let (Some(x), Some(y)) = (ctx.negated(a), ctx.negated(b)) {
        return ctx.apply_xor(x, y).map(Some);
    }
    Ok(None)
}

pub(super) fn simplify_implies(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let (a, b) = (operands[0], operands[1]);
    match ctx.bool_constant(a) {
        Some(true) => return Ok(Some(b)),
        Some(false) => return Ok(Some(ctx.mk_bool(true))),
        None => {}
    }
    match ctx.bool_constant(b) {
        Some(true) => return Ok(Some(ctx.mk_bool(true))),
        Some(false) => return ctx.apply_not(a).map(Some),
        None => {}
    }
    if a == b {
        return Ok(Some(ctx.mk_bool(true)));
    }
    Ok(None)
}

pub(super) fn simplify_ite(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let (c, t, e) = (operands[0], operands[1], operands[2]);
    match ctx.bool_constant(c) {
        Some(true) => return Ok(Some(t)),
        Some(false) => return Ok(Some(e)),
        None => {}
    }
    if t == e {
        return Ok(Some(t));
    }
    // ite(not(c), t, e) => ite(c, e, t)
    if let Some(inner) = ctx.negated(c) {
        return ctx.apply_ite(inner, e, t).map(Some);
    }
    if ctx.valtype(t).is_bool() {
        match (ctx.bool_constant(t), ctx.bool_constant(e)) {
            (Some(true), Some(false)) => return Ok(Some(c)),
            (Some(false), Some(true)) => return ctx.apply_not(c).map(Some),
            (Some(true), None) => return ctx.apply_or(&[c, e]).map(Some),
            (Some(false), None) => {
                let not_c = ctx.apply_not(c)?;
                return ctx.apply_and(&[not_c, e]).map(Some);
            }
            (None, Some(true)) => {
                let not_c = ctx.apply_not(c)?;
                return ctx.apply_or(&[not_c, t]).map(Some);
            }
            (None, Some(false)) => return ctx.apply_and(&[c, t]).map(Some),
            _ => {}
        }
    }
    Ok(None)
}

// ─── Negation ───

fn negate_all(ctx: &Context, operands: &[Expr]) -> Result<Vec<Expr>, ConstructionError> {
    operands.iter().map(|&x| ctx.apply_not(x)).collect()
}

/// not(and(xs)) => or(not(xs))
pub(super) fn negate_and(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let negated = negate_all(ctx, operands)?;
    ctx.apply_or(&negated).map(Some)
}

/// not(or(xs)) => and(not(xs))
pub(super) fn negate_or(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let negated = negate_all(ctx, operands)?;
    ctx.apply_and(&negated).map(Some)
}

/// not(xor(a, b)) => xor(a, not(b))
pub(super) fn negate_xor(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let not_b = ctx.apply_not(operands[1])?;
    ctx.apply_xor(operands[0], not_b).map(Some)
}

/// not(implies(a, b)) => and(a, not(b))
pub(super) fn negate_implies(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let not_b = ctx.apply_not(operands[1])?;
    ctx.apply_and(&[operands[0], not_b]).map(Some)
}

/// not(ite(c, t, e)) => ite(c, not(t), not(e)), for booleans only.
pub(super) fn negate_ite(ctx: &Context, operands: &[Expr]) -> Rewrite {
    if !ctx.valtype(operands[1]).is_bool() {
        return Ok(None);
    }
    let not_t = ctx.apply_not(operands[1])?;
    let not_e = ctx.apply_not(operands[2])?;
    ctx.apply_ite(operands[0], not_t, not_e).map(Some)
}

/// not(eq(a, b)) => xor(a, b), for booleans only.
pub(super) fn negate_eq(ctx: &Context, operands: &[Expr]) -> Rewrite {
    if !ctx.valtype(operands[0]).is_bool() {
        return Ok(None);
    }
    ctx.apply_xor(operands[0], operands[1]).map(Some)
}

// ─── Decomposition ───

/// implies(a, b) => or(not(a), b)
pub(super) fn decompose_implies(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let not_a = ctx.apply_not(operands[0])?;
    ctx.apply_or(&[not_a, operands[1]]).map(Some)
}

/// Boolean: ite(c, t, e) => or(and(c, t), and(not(c), e)).
/// Bitvector: one boolean `ite` per bit, reassembled with `bits`.
pub(super) fn decompose_ite(ctx: &Context, operands: &[Expr]) -> Rewrite {
    let (c, t, e) = (operands[0], operands[1], operands[2]);
    match ctx.valtype(t) {
        Valtype::Bool => {
            let then_branch = ctx.apply_and(&[c, t])?;
            let not_c = ctx.apply_not(c)?;
            let else_branch = ctx.apply_and(&[not_c, e])?;
            ctx.apply_or(&[then_branch, else_branch]).map(Some)
        }
        Valtype::BitVector(width) => {
            let mut bits = Vec::with_capacity(width as usize);
            for i in 0..width {
                let ti = ctx.apply_bit(t, i)?;
                let ei = ctx.apply_bit(e, i)?;
                bits.push(ctx.apply_ite(c, ti, ei)?);
            }
            ctx.apply_bits(&bits).map(Some)
        }
        Valtype::Product(_) => Ok(None),
    }
}
