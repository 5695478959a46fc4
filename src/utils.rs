use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// [Szudzik pairing function][szudzik-pairing], wrapping on overflow.
///
/// ```text
/// (a, b) -> if (a<b) then (b^2 + a) else (a^2 + a + b)
/// ```
///
/// The function is a bijection as long as the result fits into `u64`,
/// and degrades into a plain hash combinator beyond that.
///
/// [szudzik-pairing]: http://szudzik.com/ElegantPairing.pdf
pub fn pairing_szudzik(a: u64, b: u64) -> u64 {
    if a < b {
        b.wrapping_mul(b).wrapping_add(a)
    } else {
        a.wrapping_mul(a).wrapping_add(a).wrapping_add(b)
    }
}

/// [Pairing function][pairing] for two `u64` values.
///
/// [pairing]: https://en.wikipedia.org/wiki/Pairing_function
pub fn pairing2(a: u64, b: u64) -> u64 {
    pairing_szudzik(a, b)
}

/// Pairing function for three `u64` values.
pub fn pairing3(a: u64, b: u64, c: u64) -> u64 {
    pairing2(pairing2(a, b), c)
}

/// Folds a sequence of values into one key, left to right.
///
/// The sequence length is mixed in as well, so `[a]` and `[a, 0]` differ.
pub fn pairing_many(values: impl IntoIterator<Item = u64>) -> u64 {
    let mut acc = 0;
    let mut len = 0u64;
    for v in values {
        acc = pairing2(acc, v);
        len += 1;
    }
    pairing2(len, acc)
}

/// Hashes an arbitrary `Hash` value (names, big integers) into a `u64`.
pub fn std_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

pub trait MyHash {
    /// Structural hash used for bucketing in the node table.
    ///
    /// Equal values must produce equal hashes; collisions are resolved
    /// by exact comparison.
    fn hash(&self) -> u64;
}
