use std::fmt::{Display, Formatter};

/// Handle to an interned expression node.
///
/// Handles are only meaningful together with the [`Context`][crate::context::Context]
/// that produced them. Within one context, two handles are equal
/// if and only if the expressions are structurally equal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Expr(u32);

impl Expr {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the index of the node in the expression pool.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn raw(self) -> u64 {
        self.0 as u64
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Expr::new(7).to_string(), "@7");
        assert_eq!(Expr::new(7).index(), 7);
    }
}
