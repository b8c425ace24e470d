use rand::Rng;
use subtle::ConstantTimeEq;

/// Fixed-width numeric code; leading zeros are kept.
pub fn generate(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Exact, constant-time comparison. Codes are digits and never case-folded.
pub fn matches(expected: &str, submitted: &str) -> bool {
    expected.as_bytes().ct_eq(submitted.as_bytes()).into()
}
