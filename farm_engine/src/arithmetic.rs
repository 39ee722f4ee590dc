/// Farm engine — Arithmetic Primitives
///
/// Balances and ledgers are i64. Rates (bonuses, probabilities, price
/// multipliers) are f64, and every amount derived from a rate is floored
/// back to i64 before it touches a balance.

/// Milliseconds since the caller's epoch. The engine never reads a clock.
pub type Millis = i64;

/// Checked addition. `None` on i64 overflow.
pub fn checked_add(a: i64, b: i64) -> Option<i64> {
    a.checked_add(b)
}

/// Checked multiplication. `None` on i64 overflow.
pub fn checked_mul(a: i64, b: i64) -> Option<i64> {
    a.checked_mul(b)
}

/// `floor(amount * rate)`. Float-to-int casts saturate, so an absurd
/// rate clamps to the i64 range instead of wrapping.
pub fn floor_scaled(amount: i64, rate: f64) -> i64 {
    (amount as f64 * rate).floor() as i64
}

/// Subtract `amount` from `balance` only if the result stays >= 0.
pub fn checked_debit(balance: i64, amount: i64) -> Option<i64> {
    if amount < 0 || balance < amount {
        return None;
    }
    Some(balance - amount)
}

/// Smallest `prefix_N` (N >= 1) for which `taken` is false.
pub fn fresh_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut n: u64 = 1;
    loop {
        let candidate = format!("{}_{}", prefix, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
