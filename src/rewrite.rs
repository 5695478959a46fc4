//! Rewrite engine.
//!
//! Passes traverse the expression DAG, not the unshared tree: a node reached
//! through several parents is rewritten once. The generic traversals
//! [`bottom_up`] and [`top_down`] take an arbitrary rewrite function and memoize
//! per call. The named passes run the same traversals with a per-node rule:
//! [`simplify`] and [`canonicalize`] bottom-up, [`push_negation`] and
//! [`decompose`] top-down. Their memo lives in the [`Context`], keyed by
//! `(pass, node)`, so repeated calls are free.
//!
//! Since nodes are immutable and interned, a handle is a sound memo key.

use std::collections::HashMap;

use log::debug;

use crate::context::Context;
use crate::error::ConstructionError;
use crate::ops::Op;
use crate::reference::Expr;

/// Identifier of a named rewrite pass.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Pass {
    Simplify,
    PushNegation,
    Canonicalize,
    Decompose,
}

type Result<T> = std::result::Result<T, ConstructionError>;

/// Rebuilds `e` with new operands, keeping the handle if nothing changed.
fn rebuild(ctx: &Context, e: Expr, op: Op, old: &[Expr], new: &[Expr]) -> Result<Expr> {
    if old == new {
        Ok(e)
    } else {
        ctx.apply(op, new)
    }
}

/// Memo table of a traversal: node handle to rewritten node.
trait Memo {
    fn get(&self, e: Expr) -> Option<Expr>;
    fn insert(&mut self, e: Expr, res: Expr);
}

impl Memo for HashMap<Expr, Expr> {
    fn get(&self, e: Expr) -> Option<Expr> {
        HashMap::get(self, &e).copied()
    }

    fn insert(&mut self, e: Expr, res: Expr) {
        HashMap::insert(self, e, res);
    }
}

/// The context-wide memo of a named pass. Every result is a fixpoint of its pass.
struct PassMemo<'a> {
    ctx: &'a Context,
    pass: Pass,
}

impl Memo for PassMemo<'_> {
    fn get(&self, e: Expr) -> Option<Expr> {
        self.ctx.cached_rewrite(self.pass, e)
    }

    fn insert(&mut self, e: Expr, res: Expr) {
        self.ctx.cache_rewrite(self.pass, e, res);
        if res != e {
            self.ctx.cache_rewrite(self.pass, res, res);
        }
    }
}

/// Applies `f` to every node after its operands have been rewritten.
pub fn bottom_up<F>(ctx: &Context, e: Expr, mut f: F) -> Result<Expr>
where
    F: FnMut(&Context, Expr) -> Result<Expr>,
{
    _bottom_up(ctx, e, &mut f, &mut HashMap::new())
}

fn _bottom_up<F, M>(ctx: &Context, e: Expr, f: &mut F, memo: &mut M) -> Result<Expr>
where
    F: FnMut(&Context, Expr) -> Result<Expr>,
    M: Memo,
{
    if let Some(res) = memo.get(e) {
        return Ok(res);
    }
    let rebuilt = match ctx.op(e) {
        None => e,
        Some(op) => {
            let operands = ctx.operands(e);
            let new = operands
                .iter()
                .map(|&x| _bottom_up(ctx, x, f, memo))
                .collect::<Result<Vec<_>>>()?;
            rebuild(ctx, e, op, &operands, &new)?
        }
    };
    let res = f(ctx, rebuilt)?;
    memo.insert(e, res);
    Ok(res)
}

/// Applies `f` to every node before descending into the operands of its result.
pub fn top_down<F>(ctx: &Context, e: Expr, mut f: F) -> Result<Expr>
where
    F: FnMut(&Context, Expr) -> Result<Expr>,
{
    _top_down(ctx, e, &mut f, &mut HashMap::new())
}

fn _top_down<F, M>(ctx: &Context, e: Expr, f: &mut F, memo: &mut M) -> Result<Expr>
where
    F: FnMut(&Context, Expr) -> Result<Expr>,
    M: Memo,
{
    if let Some(res) = memo.get(e) {
        return Ok(res);
    }
    let top = f(ctx, e)?;
    let res = match ctx.op(top) {
        None => top,
        Some(op) => {
            let operands = ctx.operands(top);
            let new = operands
                .iter()
                .map(|&x| _top_down(ctx, x, f, memo))
                .collect::<Result<Vec<_>>>()?;
            rebuild(ctx, top, op, &operands, &new)?
        }
    };
    memo.insert(e, res);
    Ok(res)
}

/// Simplifies `e` bottom-up until no simplification rule fires.
pub fn simplify(ctx: &Context, e: Expr) -> Result<Expr> {
    let mut memo = PassMemo { ctx, pass: Pass::Simplify };
    _bottom_up(ctx, e, &mut simplify_node, &mut memo)
}

/// Simplifies a node whose operands are already simplified.
fn simplify_node(ctx: &Context, e: Expr) -> Result<Expr> {
    let op = match ctx.op(e) {
        Some(op) if op.capabilities().simplify => op,
        _ => return Ok(e),
    };
    match op.simplify(ctx, &ctx.operands(e))? {
        // The result may contain fresh, unsimplified nodes.
        Some(res) if res != e => {
            debug!("simplify: {} => {}", e, res);
            simplify(ctx, res)
        }
        _ => Ok(e),
    }
}

/// Pushes every negation down to the leaves, so that `not` only ever wraps
/// atoms or operators that cannot absorb it.
pub fn push_negation(ctx: &Context, e: Expr) -> Result<Expr> {
    let mut memo = PassMemo {
        ctx,
        pass: Pass::PushNegation,
    };
    _top_down(ctx, e, &mut push_negation_node, &mut memo)
}

/// Rewrites `not(x)` at the top of `e` until the top is no longer an absorbable negation.
fn push_negation_node(ctx: &Context, e: Expr) -> Result<Expr> {
    let mut current = e;
    while let Some(inner) = ctx.negated(current) {
        if let Some(b) = ctx.bool_constant(inner) {
            return Ok(ctx.mk_bool(!b));
        }
        let inner_op = match ctx.op(inner) {
            Some(op) if op.capabilities().push_negation => op,
            _ => break,
        };
        match inner_op.negate(ctx, &ctx.operands(inner))? {
            Some(res) => {
                debug!("push_negation: {} => {}", current, res);
                current = res;
            }
            None => break,
        }
    }
    Ok(current)
}

/// Sorts the operands of every commutative operator into canonical order.
pub fn canonicalize(ctx: &Context, e: Expr) -> Result<Expr> {
    let mut memo = PassMemo {
        ctx,
        pass: Pass::Canonicalize,
    };
    _bottom_up(ctx, e, &mut canonicalize_node, &mut memo)
}

fn canonicalize_node(ctx: &Context, e: Expr) -> Result<Expr> {
    match ctx.op(e) {
        Some(op) if op.capabilities().canonicalize => Ok(op.canonicalize(ctx, &ctx.operands(e))?.unwrap_or(e)),
        _ => Ok(e),
    }
}

/// Replaces every composite operator by its decomposition.
///
/// At each node, decomposition is repeated while the operator reports the
/// capability, then the pass descends into the operands of the result.
pub fn decompose(ctx: &Context, e: Expr) -> Result<Expr> {
    let mut memo = PassMemo { ctx, pass: Pass::Decompose };
    _top_down(ctx, e, &mut decompose_node, &mut memo)
}

fn decompose_node(ctx: &Context, e: Expr) -> Result<Expr> {
    let mut current = e;
    while let Some(op) = ctx.op(current) {
        if !op.capabilities().decompose {
            break;
        }
        match op.decompose(ctx, &ctx.operands(current))? {
            Some(res) => {
                debug!("decompose: {} ({}) => {}", current, op, res);
                current = res;
            }
            None => break,
        }
    }
    Ok(current)
}

/// The full pipeline: simplify, decompose, simplify, push negations, simplify, canonicalize.
pub fn normalize(ctx: &Context, e: Expr) -> Result<Expr> {
    let e = simplify(ctx, e)?;
    let e = decompose(ctx, e)?;
    let e = simplify(ctx, e)?;
    let e = push_negation(ctx, e)?;
    let e = simplify(ctx, e)?;
    canonicalize(ctx, e)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::{Valtype, Value, ValueDomain};

    #[test]
    fn test_simplify_nested() {
        let ctx = Context::default();
        let x = ctx.mk_bool_var("x").unwrap();
        let y = ctx.mk_bool_var("y").unwrap();
        let t = ctx.mk_bool(true);
        let nnx = ctx.apply_not(ctx.apply_not(x).unwrap()).unwrap();
        let inner = ctx.apply_and(&[nnx, t]).unwrap();
        let e = ctx.apply_or(&[ctx.mk_bool(false), ctx.apply_and(&[inner, y]).unwrap()]).unwrap();
        let s = simplify(&ctx, e).unwrap();
        assert_eq!(s, ctx.apply_and(&[x, y]).unwrap());
        assert_eq!(simplify(&ctx, s).unwrap(), s);
    }

    #[test]
    fn test_simplify_memoized_in_context() {
        let ctx = Context::default();
        let x = ctx.mk_bool_var("x").unwrap();
        let e = ctx.apply_and(&[x, x]).unwrap();
        assert_eq!(simplify(&ctx, e).unwrap(), x);
        assert_eq!(ctx.cached_rewrite(Pass::Simplify, e), Some(x));
        assert_eq!(ctx.cached_rewrite(Pass::Canonicalize, e), None);
    }

    #[test]
    fn test_passes_memoize_every_visited_node() {
        let ctx = Context::default();
        let x = ctx.mk_bool_var("x").unwrap();
        let y = ctx.mk_bool_var("y").unwrap();
        let yx = ctx.apply_or(&[y, x]).unwrap();
        let e = ctx.apply_and(&[yx, ctx.apply_not(yx).unwrap(), x]).unwrap();

        let c = canonicalize(&ctx, e).unwrap();
        for d in ctx.descendants([e]) {
            assert!(ctx.cached_rewrite(Pass::Canonicalize, d).is_some(), "{}", d);
        }
        assert_eq!(ctx.cached_rewrite(Pass::Canonicalize, c), Some(c));

        assert_eq!(simplify(&ctx, e).unwrap(), ctx.mk_bool(false));
        for d in ctx.descendants([e]) {
            assert!(ctx.cached_rewrite(Pass::Simplify, d).is_some(), "{}", d);
        }

        let p = push_negation(&ctx, ctx.apply_not(e).unwrap()).unwrap();
        assert_eq!(ctx.cached_rewrite(Pass::PushNegation, p), Some(p));
    }

    #[test]
    fn test_push_negation() {
        let ctx = Context::default();
        let a = ctx.mk_bool_var("a").unwrap();
        let b = ctx.mk_bool_var("b").unwrap();
        let c = ctx.mk_bool_var("c").unwrap();
        let bc = ctx.apply_or(&[b, c]).unwrap();
        let e = ctx.apply_not(ctx.apply_and(&[a, bc]).unwrap()).unwrap();
        let p = push_negation(&ctx, e).unwrap();
        assert_eq!(ctx.to_bracket_string(p), "(or (not a) (and (not b) (not c)))");
        // Every `not` wraps a variable.
        for d in ctx.descendants([p]) {
            if let Some(inner) = ctx.negated(d) {
                assert!(ctx.is_variable(inner));
            }
        }
    }

    #[test]
    fn test_push_negation_double() {
        let ctx = Context::default();
        let a = ctx.mk_bool_var("a").unwrap();
        let e = ctx.apply_not(ctx.apply_not(ctx.apply_not(a).unwrap()).unwrap()).unwrap();
        assert_eq!(push_negation(&ctx, e).unwrap(), ctx.apply_not(a).unwrap());
        let f = ctx.apply_not(ctx.mk_bool(true)).unwrap();
        assert_eq!(push_negation(&ctx, f).unwrap(), ctx.mk_bool(false));
    }

    #[test]
    fn test_canonical_confluence() {
        let ctx = Context::default();
        let a = ctx.mk_bool_var("a").unwrap();
        let b = ctx.mk_bool_var("b").unwrap();
        let c = ctx.mk_bool_var("c").unwrap();
        let e1 = ctx.apply_and(&[c, ctx.apply_or(&[b, a]).unwrap()]).unwrap();
        let e2 = ctx.apply_and(&[ctx.apply_or(&[a, b]).unwrap(), c]).unwrap();
        assert_ne!(e1, e2);
        assert_eq!(canonicalize(&ctx, e1).unwrap(), canonicalize(&ctx, e2).unwrap());
    }

    #[test]
    fn test_decompose_removes_composites() {
        let ctx = Context::default();
        let x = ctx.mk_var("x", Valtype::bitvector(2)).unwrap();
        let y = ctx.mk_var("y", Valtype::bitvector(2)).unwrap();
        let c = ctx.mk_bool_var("c").unwrap();
        let m = ctx.apply_mul(x, y, 3).unwrap();
        let s = ctx.apply_add(x, y, 3).unwrap();
        let e = ctx.apply_eq(ctx.apply_ite(c, m, s).unwrap(), ctx.mk_bv(3, 4u32).unwrap()).unwrap();
        let d = normalize(&ctx, e).unwrap();
        for n in ctx.descendants([d]) {
            if let Some(op) = ctx.op(n) {
                assert_eq!(op.decompose(&ctx, &ctx.operands(n)).unwrap(), None, "{} survived", op);
            }
        }
        // Still equivalent.
        let t = Valtype::bitvector(2);
        for xv in t.values() {
            for yv in t.values() {
                for cv in [false, true] {
                    let env = HashMap::from([
                        ("x".to_string(), xv.clone()),
                        ("y".to_string(), yv.clone()),
                        ("c".to_string(), Value::Bool(cv)),
                    ]);
                    assert_eq!(ctx.evaluate(d, &env), ctx.evaluate(e, &env));
                }
            }
        }
    }

    #[test]
    fn test_negated_bitvector_eq_normalizes_to_atoms() {
        let ctx = Context::default();
        let p = ctx.mk_var("p", Valtype::bitvector(3)).unwrap();
        let one = ctx.mk_bv(3, 1u32).unwrap();
        let e = ctx.apply_not(ctx.apply_eq(p, one).unwrap()).unwrap();
        let n = normalize(&ctx, e).unwrap();

        for d in ctx.descendants([n]) {
            if let Some(inner) = ctx.negated(d) {
                assert!(ctx.is_atom(inner), "{}", ctx.to_bracket_string(d));
            }
            assert_ne!(ctx.op(d), Some(Op::Eq), "{}", ctx.to_bracket_string(d));
        }
        for pv in Valtype::bitvector(3).values() {
            let env = HashMap::from([("p".to_string(), pv)]);
            assert_eq!(ctx.evaluate(n, &env), ctx.evaluate(e, &env));
        }
    }

    #[test]
    fn test_product_eq_decomposes_per_field() {
        let ctx = Context::default();
        let pair = ctx.mk_product_valtype(&[Valtype::Bool, Valtype::bitvector(2)]);
        let a = ctx.mk_var("a", pair.clone()).unwrap();
        let b = ctx.mk_var("b", pair.clone()).unwrap();
        let e = ctx.apply_eq(a, b).unwrap();
        let d = decompose(&ctx, e).unwrap();
        let a1 = ctx.apply_field(a, 1).unwrap().index();
        let b1 = ctx.apply_field(b, 1).unwrap().index();
        assert_eq!(
            ctx.to_bracket_string(d),
            format!(
                "(and (eq (field[0] a) (field[0] b)) (and (eq (bit[0] @{a1}=(field[1] a)) (bit[0] @{b1}=(field[1] b))) (eq (bit[1] @{a1}) (bit[1] @{b1}))))"
            )
        );
        for av in pair.values() {
            for bv in pair.values() {
                let env = HashMap::from([("a".to_string(), av.clone()), ("b".to_string(), bv)]);
                assert_eq!(ctx.evaluate(d, &env), ctx.evaluate(e, &env));
            }
        }
    }

    #[test]
    fn test_mul_constants_normalize_to_42() {
        let ctx = Context::default();
        let a = ctx.mk_bv(3, 6u32).unwrap();
        let b = ctx.mk_bv(3, 7u32).unwrap();
        let m = ctx.apply_mul(a, b, 6).unwrap();
        assert_eq!(simplify(&ctx, m).unwrap(), ctx.mk_bv(6, 42u32).unwrap());
        // Decomposing first must give the same constant.
        let d = decompose(&ctx, m).unwrap();
        assert_eq!(simplify(&ctx, d).unwrap(), ctx.mk_bv(6, 42u32).unwrap());
    }

    #[test]
    fn test_generic_traversals() {
        let ctx = Context::default();
        let a = ctx.mk_bool_var("a").unwrap();
        let b = ctx.mk_bool_var("b").unwrap();
        let ab = ctx.apply_and(&[a, b]).unwrap();
        let e = ctx.apply_or(&[ab, ab]).unwrap();

        // Rename `a` to `b`, counting the visits.
        let mut visits = 0;
        let r = bottom_up(&ctx, e, |ctx, x| {
            visits += 1;
            Ok(if x == a { b } else { x })
        })
        .unwrap();
        // e, ab, a, b: the shared `ab` is visited once.
        assert_eq!(visits, 4);
        let bb = ctx.apply_and(&[b, b]).unwrap();
        assert_eq!(r, ctx.apply_or(&[bb, bb]).unwrap());

        let r = top_down(&ctx, e, |ctx, x| match ctx.op(x) {
            Some(Op::Or) => ctx.apply_and(&ctx.operands(x)),
            _ => Ok(x),
        })
        .unwrap();
        assert_eq!(r, ctx.apply_and(&[ab, ab]).unwrap());
    }
}
