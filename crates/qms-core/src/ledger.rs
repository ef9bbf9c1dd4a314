//! Usage arithmetic for ADD and SET updates.

use crate::error::AppError;
use crate::models::UpdateOperation;

/// New counter value after applying `operation` with `amount`. A missing
/// counter takes `amount` regardless of the operation.
pub fn next_usage_value(current: Option<f64>, operation: UpdateOperation, amount: f64) -> f64 {
    match (current, operation) {
        (None, _) => amount,
        (Some(value), UpdateOperation::Add) => value + amount,
        (Some(_), UpdateOperation::Set) => amount,
    }
}

pub fn validate_amount(amount: f64) -> Result<(), AppError> {
    if amount.is_finite() {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "amount must be a finite number, got {}",
            amount
        )))
    }
}
