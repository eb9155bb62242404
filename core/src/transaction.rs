// concord/core/src/transaction.rs

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub type TxId = Uuid;
pub type Address = String;

/// A value transfer between two addresses. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub sender: Address,
    pub recipient: Address,
    pub amount: u64,
    pub timestamp: u64,
}

impl Transaction {
    /// Creates a transaction with a fresh random id, stamped with the current time.
    pub fn new(sender: impl Into<Address>, recipient: impl Into<Address>, amount: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            timestamp: current_timestamp(),
        }
    }

    /// Structural checks only; sender authenticity is not verified.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sender.is_empty() {
            return Err(ValidationError::EmptySender);
        }
        if self.recipient.is_empty() {
            return Err(ValidationError::EmptyRecipient);
        }
        if self.amount == 0 {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(())
    }
}

/// Milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
