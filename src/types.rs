//! Value domains and their bit-level representation.
//!
//! Every expression has a [`Valtype`], which describes the set of values it may take:
//!
//! - **[`Valtype::Bool`]**: a single boolean.
//! - **[`Valtype::BitVector`]**: an unsigned integer of fixed width.
//! - **[`Valtype::Product`]**: a tuple of other valtypes.
//!
//! Each valtype has a fixed *bit-tuple* size, and converts between domain
//! values and bit-tuples (least significant bit first) through the
//! [`ValueDomain`] contract. Lowering to CNF works purely on bit-tuples.

use std::fmt;
use std::rc::Rc;

use num_bigint::BigUint;

/// A value-domain descriptor.
///
/// Equality is structural: two descriptors with equal kind and parameters are equal.
/// Product descriptors are cheap to clone (shared field list).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Valtype {
    Bool,
    BitVector(u32),
    Product(Rc<[Valtype]>),
}

impl Valtype {
    /// Creates a bitvector valtype of the given width.
    ///
    /// # Panics
    ///
    /// Panics if `width == 0`.
    pub fn bitvector(width: u32) -> Self {
        assert_ne!(width, 0, "Bitvector width must be >= 1");
        Valtype::BitVector(width)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Valtype::Bool)
    }

    pub fn is_bitvector(&self) -> bool {
        matches!(self, Valtype::BitVector(_))
    }

    /// Returns the width of a bitvector valtype.
    pub fn width(&self) -> Option<u32> {
        match self {
            Valtype::BitVector(w) => Some(*w),
            _ => None,
        }
    }

    /// Returns the field list of a product valtype.
    pub fn fields(&self) -> Option<&[Valtype]> {
        match self {
            Valtype::Product(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the offset (in bits) of the `index`-th field of a product valtype.
    pub fn field_offset(&self, index: usize) -> Option<usize> {
        let fields = self.fields()?;
        if index >= fields.len() {
            return None;
        }
        Some(fields[..index].iter().map(|f| f.bit_size()).sum())
    }
}

impl fmt::Display for Valtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Valtype::Bool => write!(f, "bool"),
            Valtype::BitVector(w) => write!(f, "uint{}", w),
            Valtype::Product(fields) => {
                write!(f, "(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A domain value.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Value {
    Bool(bool),
    BitVector(BigUint),
    Product(Vec<Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_biguint(&self) -> Option<&BigUint> {
        match self {
            Value::BitVector(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_fields(&self) -> Option<&[Value]> {
        match self {
            Value::Product(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::BitVector(BigUint::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::BitVector(BigUint::from(n))
    }
}

impl From<BigUint> for Value {
    fn from(n: BigUint) -> Self {
        Value::BitVector(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::BitVector(n) => write!(f, "{}", n),
            Value::Product(fields) => {
                write!(f, "(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// `2^width` as a big integer.
pub fn modulus(width: u32) -> BigUint {
    BigUint::from(1u32) << width
}

/// The contract every value domain provides.
///
/// Lowering only ever deals with bit-tuples; this trait is the bridge between
/// domain values and those bit-tuples. Bit 0 is the least significant bit.
pub trait ValueDomain {
    /// Number of bits in the bit-tuple representation.
    fn bit_size(&self) -> usize;

    /// Checks whether `value` belongs to this domain.
    fn is_valid(&self, value: &Value) -> bool;

    /// Number of distinct values in the domain.
    fn cardinality(&self) -> BigUint;

    /// Enumerates all values of the domain.
    fn values(&self) -> Box<dyn Iterator<Item = Value> + '_>;

    /// Converts a value into its bit-tuple.
    fn to_bits(&self, value: &Value) -> Vec<bool>;

    /// Converts a bit-tuple back into a value.
    fn from_bits(&self, bits: &[bool]) -> Value;

    /// Human-readable rendering of a value.
    fn display(&self, value: &Value) -> String;
}

impl ValueDomain for Valtype {
    fn bit_size(&self) -> usize {
        match self {
            Valtype::Bool => 1,
            Valtype::BitVector(w) => *w as usize,
            Valtype::Product(fields) => fields.iter().map(|f| f.bit_size()).sum(),
        }
    }

    fn is_valid(&self, value: &Value) -> bool {
        match (self, value) {
            (Valtype::Bool, Value::Bool(_)) => true,
            (Valtype::BitVector(w), Value::BitVector(n)) => n.bits() <= *w as u64,
            (Valtype::Product(fields), Value::Product(values)) => {
                fields.len() == values.len() && fields.iter().zip(values).all(|(f, v)| f.is_valid(v))
            }
            _ => false,
        }
    }

    fn cardinality(&self) -> BigUint {
        // Every bit pattern is a valid value for the built-in domains.
        BigUint::from(1u32) << self.bit_size()
    }

    fn values(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        let size = self.bit_size();
        let cardinality = self.cardinality();
        let mut current = BigUint::ZERO;
        Box::new(std::iter::from_fn(move || {
            if current >= cardinality {
                return None;
            }
            let bits: Vec<bool> = (0..size).map(|i| current.bit(i as u64)).collect();
            current += 1u32;
            Some(self.from_bits(&bits))
        }))
    }

    fn to_bits(&self, value: &Value) -> Vec<bool> {
        assert!(self.is_valid(value), "Value {} does not belong to {}", value, self);
        match (self, value) {
            (Valtype::Bool, Value::Bool(b)) => vec![*b],
            (Valtype::BitVector(w), Value::BitVector(n)) => (0..*w as u64).map(|i| n.bit(i)).collect(),
            (Valtype::Product(fields), Value::Product(values)) => {
                fields.iter().zip(values).flat_map(|(f, v)| f.to_bits(v)).collect()
            }
            _ => unreachable!(),
        }
    }

    fn from_bits(&self, bits: &[bool]) -> Value {
        assert_eq!(bits.len(), self.bit_size(), "Bit-tuple size mismatch for {}", self);
        match self {
            Valtype::Bool => Value::Bool(bits[0]),
            Valtype::BitVector(_) => {
                let mut n = BigUint::ZERO;
                for (i, &b) in bits.iter().enumerate() {
                    if b {
                        n.set_bit(i as u64, true);
                    }
                }
                Value::BitVector(n)
            }
            Valtype::Product(fields) => {
                let mut offset = 0;
                let mut values = Vec::with_capacity(fields.len());
                for field in fields.iter() {
                    let size = field.bit_size();
                    values.push(field.from_bits(&bits[offset..offset + size]));
                    offset += size;
                }
                Value::Product(values)
            }
        }
    }

    fn display(&self, value: &Value) -> String {
        match (self, value) {
            (Valtype::BitVector(w), Value::BitVector(n)) => format!("{}:uint{}", n, w),
            _ => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_size() {
        assert_eq!(Valtype::Bool.bit_size(), 1);
        assert_eq!(Valtype::bitvector(5).bit_size(), 5);
        let p = Valtype::Product(Rc::from(vec![Valtype::Bool, Valtype::bitvector(3)]));
        assert_eq!(p.bit_size(), 4);
        assert_eq!(p.field_offset(0), Some(0));
        assert_eq!(p.field_offset(1), Some(1));
        assert_eq!(p.field_offset(2), None);
    }

    #[test]
    #[should_panic(expected = "Bitvector width must be >= 1")]
    fn test_bitvector_zero_width() {
        Valtype::bitvector(0);
    }

    #[test]
    fn test_structural_equality() {
        let a = Valtype::Product(Rc::from(vec![Valtype::Bool, Valtype::bitvector(3)]));
        let b = Valtype::Product(Rc::from(vec![Valtype::Bool, Valtype::bitvector(3)]));
        assert_eq!(a, b);
        assert_ne!(Valtype::bitvector(3), Valtype::bitvector(4));
    }

    #[test]
    fn test_bitvector_bits() {
        let t = Valtype::bitvector(4);
        let v = Value::from(6u32);
        let bits = t.to_bits(&v);
        assert_eq!(bits, vec![false, true, true, false]);
        assert_eq!(t.from_bits(&bits), v);
    }

    #[test]
    fn test_validity() {
        let t = Valtype::bitvector(3);
        assert!(t.is_valid(&Value::from(7u32)));
        assert!(!t.is_valid(&Value::from(8u32)));
        assert!(!t.is_valid(&Value::Bool(true)));
        assert!(!Valtype::Bool.is_valid(&Value::from(0u32)));
    }

    #[test]
    fn test_enumerate_product() {
        let p = Valtype::Product(Rc::from(vec![Valtype::Bool, Valtype::bitvector(2)]));
        assert_eq!(p.cardinality(), BigUint::from(8u32));
        let values: Vec<Value> = p.values().collect();
        assert_eq!(values.len(), 8);
        for v in &values {
            assert!(p.is_valid(v));
            assert_eq!(&p.from_bits(&p.to_bits(v)), v);
        }
        assert_eq!(values[0], Value::Product(vec![Value::Bool(false), Value::from(0u32)]));
        assert_eq!(values[7], Value::Product(vec![Value::Bool(true), Value::from(3u32)]));
    }

    #[test]
    fn test_display() {
        let p = Valtype::Product(Rc::from(vec![Valtype::Bool, Valtype::bitvector(3)]));
        assert_eq!(p.to_string(), "(bool, uint3)");
        assert_eq!(Valtype::bitvector(3).display(&Value::from(5u32)), "5:uint3");
        let v = Value::Product(vec![Value::Bool(true), Value::from(5u32)]);
        assert_eq!(p.display(&v), "(true, 5)");
    }
}
