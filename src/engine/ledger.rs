use thiserror::Error;

/// Applies a signed point delta to a balance.
///
/// Zero deltas are rejected (the sign *is* the direction; a zero row carries
/// no information) and so is any delta that would drive the balance negative.
/// Spending more than the user holds is a caller error, not something to
/// clamp silently.
pub fn apply_delta(balance: i64, delta: i64) -> Result<i64, BalanceError> {
    if delta == 0 {
        return Err(BalanceError::ZeroDelta);
    }

    let after = balance + delta;
    if after < 0 {
        return Err(BalanceError::Insufficient { balance, delta });
    }

    Ok(after)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("point transactions must carry a non-zero delta")]
    ZeroDelta,

    #[error("insufficient points: balance {balance}, requested delta {delta}")]
    Insufficient { balance: i64, delta: i64 },
}
