//! Credential gate for employees

use std::sync::Arc;

use tracing::{debug, warn};
use tradeflow_domain::{Employee, RecordStatus, ReferenceKind, ReferenceRecord, Result, TradeflowError};

use crate::store::ReferenceRepository;

pub struct Authenticator {
    repo: Arc<dyn ReferenceRepository>,
}

impl Authenticator {
    pub fn new(repo: Arc<dyn ReferenceRepository>) -> Self {
        Self { repo }
    }

    /// The employee behind `employee_id` if `password` matches the stored
    /// hash. Unknown ids, inactive employees and bad passwords are all
    /// `Unauthorized` with the same message.
    pub async fn authenticate(&self, employee_id: &str, password: &str) -> Result<Employee> {
        let denied = || TradeflowError::Unauthorized(format!("invalid credentials for {employee_id}"));

        // Straight from the store, not the reference cache.
        let employee = match self.repo.get_reference(ReferenceKind::Employee, employee_id).await? {
            Some(ReferenceRecord::Employee(employee)) => employee,
            _ => {
                debug!(employee = employee_id, "unknown employee");
                return Err(denied());
            }
        };
        if employee.status != RecordStatus::Active {
            warn!(employee = employee_id, "sign-in attempt by inactive employee");
            return Err(denied());
        }
        let Some(hash) = employee.password_hash.as_deref() else {
            return Err(denied());
        };
        match tradeflow_common::verify_password(password, hash) {
            Ok(true) => Ok(Employee { password_hash: None, ..employee }),
            Ok(false) => {
                warn!(employee = employee_id, "password mismatch");
                Err(denied())
            }
            Err(err) => {
                warn!(employee = employee_id, error = %err, "stored password hash unreadable");
                Err(denied())
            }
        }
    }
}
