use std::rc::Rc;

use crate::ops::Op;
use crate::reference::Expr;
use crate::types::{Valtype, Value};
use crate::utils::{pairing2, pairing3, pairing_many, std_hash, MyHash};

/// Payload of an interned expression node.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NodeKind {
    Variable(Rc<str>),
    Constant(Value),
    Apply { op: Op, operands: Rc<[Expr]> },
}

/// An expression node as stored in the pool.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Node {
    pub valtype: Valtype,
    pub kind: NodeKind,
}

impl Node {
    pub fn op(&self) -> Option<Op> {
        match &self.kind {
            NodeKind::Apply { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn operands(&self) -> &[Expr] {
        match &self.kind {
            NodeKind::Apply { operands, .. } => operands,
            _ => &[],
        }
    }
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        let (tag, payload) = match &self.kind {
            NodeKind::Variable(name) => (0, std_hash(name)),
            // Valtype is part of a constant's identity: `0:uint3` differs from `0:uint4`.
            NodeKind::Constant(value) => (1, pairing2(std_hash(&self.valtype), std_hash(value))),
            NodeKind::Apply { op, operands } => {
                (2, pairing2(op.key(), pairing_many(operands.iter().map(|e| e.raw()))))
            }
        };
        pairing3(tag, payload, valtype_hint(&self.valtype))
    }
}

/// Cheap discriminator folded into node hashes.
fn valtype_hint(valtype: &Valtype) -> u64 {
    match valtype {
        Valtype::Bool => 0,
        Valtype::BitVector(w) => *w as u64 + 1,
        Valtype::Product(fields) => pairing2(fields.len() as u64, 1),
    }
}
