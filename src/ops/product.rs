//! Product operators: `tuple` and `field`.

use super::{Op, Rewrite};
use crate::context::Context;
use crate::error::ConstructionError;
use crate::reference::Expr;
use crate::types::{Valtype, Value};

pub(super) fn validate_field(index: u32, valtypes: &[Valtype]) -> Result<(), ConstructionError> {
    let op = Op::Field { index }.name();
    let fields = valtypes[0].fields().ok_or_else(|| ConstructionError::InvalidOperand {
        op,
        position: 0,
        expected: "a product".to_string(),
        actual: valtypes[0].to_string(),
    })?;
    if index as usize >= fields.len() {
        return Err(ConstructionError::InvalidAttribute {
            op,
            attribute: "index",
            expected: format!("less than {}", fields.len()),
            actual: index.to_string(),
        });
    }
    Ok(())
}

pub(super) fn field_valtype(index: u32, product: &Valtype) -> Valtype {
    match product.fields() {
        Some(fields) => fields[index as usize].clone(),
        None => panic!("Expected a product valtype, got {}", product),
    }
}

pub(super) fn evaluate(op: &Op, values: &[Value]) -> Value {
    match *op {
        Op::Tuple => Value::Product(values.to_vec()),
        Op::Field { index } => match values[0].as_fields() {
            Some(fields) => fields[index as usize].clone(),
            None => panic!("Expected a product operand, got {}", values[0]),
        },
        _ => unreachable!("{} is not a product operator", op),
    }
}

/// field(tuple(x0, .., xn), i) => xi
pub(super) fn simplify_field(index: u32, ctx: &Context, operands: &[Expr]) -> Rewrite {
    let v = operands[0];
    if ctx.op(v) == Some(Op::Tuple) {
        return Ok(Some(ctx.operands(v)[index as usize]));
    }
    Ok(None)
}

/// eq(a, b) => and(eq(field(a, 0), field(b, 0)), ..)
pub(super) fn decompose_eq(num_fields: usize, ctx: &Context, operands: &[Expr]) -> Rewrite {
    let (a, b) = (operands[0], operands[1]);
    let fields = (0..num_fields as u32)
        .map(|i| ctx.apply_eq(ctx.apply_field(a, i)?, ctx.apply_field(b, i)?))
        .collect::<Result<Vec<_>, _>>()?;
    if fields.is_empty() {
        return Ok(Some(ctx.mk_bool(true)));
    }
    ctx.apply_and(&fields).map(Some)
}
