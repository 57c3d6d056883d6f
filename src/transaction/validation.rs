/// Validation logic for transactions separated from type definitions
use crate::error::ChainError;
use crate::transaction::types::{Transaction, MAX_ADDRESS_LENGTH};

impl Transaction {
    /// Reject transactions that are structurally unusable. Nothing here looks
    /// at balances or signatures: acceptance is otherwise unconditional.
    pub fn validate(&self) -> Result<(), ChainError> {
        if !self.amount.is_finite() {
            return Err(ChainError::MalformedInput(format!(
                "Transaction {} amount must be a finite number",
                self.transaction_id
            )));
        }

        if self.amount < 0.0 {
            return Err(ChainError::MalformedInput(format!(
                "Transaction {} amount must not be negative, got {}",
                self.transaction_id, self.amount
            )));
        }

        if self.transaction_id.trim().is_empty() {
            return Err(ChainError::MalformedInput(
                "Transaction id cannot be empty".to_string(),
            ));
        }

        validate_address("sender", &self.sender)?;
        validate_address("recipient", &self.recipient)?;

        Ok(())
    }
}

fn validate_address(field: &str, address: &str) -> Result<(), ChainError> {
    if address.trim().is_empty() {
        return Err(ChainError::MalformedInput(format!(
            "Transaction {} cannot be empty",
            field
        )));
    }

    if address.len() > MAX_ADDRESS_LENGTH {
        return Err(ChainError::MalformedInput(format!(
            "Transaction {} exceeds maximum length of {} characters",
            field, MAX_ADDRESS_LENGTH
        )));
    }

    Ok(())
}
