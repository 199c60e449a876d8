use std::fmt;

use thiserror::Error;

use crate::lookup::LookupError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collaborator {
    ContentLookup,
    TargetingGroupLookup,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentLookup => f.write_str("content lookup"),
            Self::TargetingGroupLookup => f.write_str("targeting group lookup"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("{collaborator} failed for `{key}`: {source}")]
    Lookup {
        collaborator: Collaborator,
        key: String,
        #[source]
        source: LookupError,
    },
}

impl SelectionError {
    pub fn content_lookup(key: impl Into<String>, source: LookupError) -> Self {
        Self::Lookup { collaborator: Collaborator::ContentLookup, key: key.into(), source }
    }

    pub fn targeting_group_lookup(key: impl Into<String>, source: LookupError) -> Self {
        Self::Lookup { collaborator: Collaborator::TargetingGroupLookup, key: key.into(), source }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => {
                "The advertisement service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => "lookup_unavailable",
            Self::Internal { .. } => "lookup_failure",
        }
    }
}

impl SelectionError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<SelectionError> for InterfaceError {
    fn from(value: SelectionError) -> Self {
        let message = value.to_string();
        match value {
            SelectionError::Lookup { source: LookupError::Unavailable(_), .. } => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            SelectionError::Lookup { source: LookupError::Backend(_), .. } => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
