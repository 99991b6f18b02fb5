//! Contract error types for the smart orders service
//!
//! These errors are transport-agnostic and used for inter-module communication.

/// Smart orders domain errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Missing or invalid field, or a transition not allowed from the current status
    Validation {
        /// Validation error message
        message: String,
    },
    /// Order, device, line item or account not found
    NotFound {
        /// Resource type (order, device, order_item, account, cart)
        resource: String,
        /// Resource identifier
        id: String,
    },
    /// Role or ownership violation
    Forbidden {
        /// Why access was denied
        reason: String,
    },
    /// Missing or invalid session, credentials or callback token
    Unauthorized {
        /// Why authentication failed
        reason: String,
    },
    /// Concurrent modification (draft creation race, duplicate username)
    Conflict {
        /// Conflict reason
        reason: String,
    },
    /// External collaborator unreachable or failing
    Dependency {
        /// Collaborator name
        service: String,
        /// Error details
        message: String,
    },
    /// Internal error
    Internal,
}

impl OrderError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { message } => {
                write!(f, "Validation error: {}", message)
            }
            Self::NotFound { resource, id } => {
                write!(f, "{} not found: {}", resource, id)
            }
            Self::Forbidden { reason } => {
                write!(f, "Forbidden: {}", reason)
            }
            Self::Unauthorized { reason } => {
                write!(f, "Unauthorized: {}", reason)
            }
            Self::Conflict { reason } => {
                write!(f, "Conflict: {}", reason)
            }
            Self::Dependency { service, message } => {
                write!(f, "Dependency '{}' failed: {}", service, message)
            }
            Self::Internal => {
                write!(f, "Internal error")
            }
        }
    }
}

impl std::error::Error for OrderError {}
