//! Role-based access for the status server
//!
//! Each route declares the capability it needs. The guard derives the caller's
//! role from the request and checks the capability before the handler runs.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Any customer-facing surface
    Public,
    /// Venue staff, identified by bearer token
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadStatus,
    ReadSchedule,
}

impl Role {
    pub fn grants(self, capability: Capability) -> bool {
        match (self, capability) {
            (_, Capability::ReadStatus) => true,
            (Role::Staff, Capability::ReadSchedule) => true,
            (Role::Public, Capability::ReadSchedule) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    /// Staff hold every capability, so a denial always means missing credentials
    #[error("authentication required")]
    Unauthenticated,
}

impl AccessDenied {
    /// HTTP status line for the denial
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            AccessDenied::Unauthenticated => (401, "Unauthorized"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccessGuard {
    staff_token: Option<String>,
}

impl AccessGuard {
    /// Without a staff token nobody can reach staff routes
    pub fn new(staff_token: Option<String>) -> Self {
        Self {
            staff_token: staff_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn role_for(&self, bearer: Option<&str>) -> Role {
        match (&self.staff_token, bearer) {
            (Some(expected), Some(given)) if constant_time_eq(expected.as_bytes(), given.as_bytes()) => {
                Role::Staff
            }
            _ => Role::Public,
        }
    }

    pub fn authorize(&self, role: Role, capability: Capability) -> Result<(), AccessDenied> {
        if role.grants(capability) {
            Ok(())
        } else {
            Err(AccessDenied::Unauthenticated)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
