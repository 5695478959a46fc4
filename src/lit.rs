use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A CNF literal: a non-zero signed integer, negative for negated variables.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Lit(i32);

impl Lit {
    /// Creates a literal from its signed representation.
    ///
    /// # Panics
    ///
    /// Panics if `value == 0`.
    pub fn new(value: i32) -> Self {
        assert_ne!(value, 0, "Literal 0 is not allowed");
        Self(value)
    }

    /// Creates the positive literal of the given variable.
    pub fn positive(var: u32) -> Self {
        Self::new(var as i32)
    }

    pub const fn is_negated(&self) -> bool {
        self.0 < 0
    }

    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Return the underlying variable (always positive).
    pub const fn var(self) -> u32 {
        self.0.unsigned_abs()
    }

    /// Return the signed representation.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Evaluates the literal under a truth value of its variable.
    pub const fn eval(self, var_value: bool) -> bool {
        var_value != self.is_negated()
    }
}

impl Neg for Lit {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl Display for Lit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation() {
        let a = Lit::positive(3);
        assert!(!a.is_negated());
        assert!((-a).is_negated());
        assert_eq!(-(-a), a);
        assert_eq!((-a).var(), 3);
        assert_eq!((-a).get(), -3);
    }

    #[test]
    fn test_eval() {
        let a = Lit::positive(1);
        assert!(a.eval(true));
        assert!(!a.eval(false));
        assert!((-a).eval(false));
    }

    #[test]
    #[should_panic(expected = "Literal 0 is not allowed")]
    fn test_zero() {
        Lit::new(0);
    }
}
