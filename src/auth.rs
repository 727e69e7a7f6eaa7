use crate::crash::types::Address;
use crate::errors::GameError;

/// Single admin identity fixed at ledger initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminGate {
    admin: Address,
}

impl AdminGate {
    pub fn new(admin: Address) -> Self {
        Self { admin }
    }

    pub fn admin(&self) -> &Address {
        &self.admin
    }

    pub fn require_admin(&self, caller: &Address) -> Result<(), GameError> {
        if caller == &self.admin {
            Ok(())
        } else {
            tracing::debug!(caller = %caller, "rejected non-admin caller");
            Err(GameError::Unauthorized)
        }
    }
}
