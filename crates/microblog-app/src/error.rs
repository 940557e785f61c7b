// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::FieldViolation;

/// Every failure that can cross the boundary between the API client and the
/// resource table controllers. Values are cloneable so controllers can keep
/// the last failure around for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    /// Network, HTTP status, or body decoding failure.
    #[error("{0}")]
    Transport(String),
    /// The response body did not match any recognized list envelope.
    #[error("Unexpected data format from API")]
    Shape,
    #[error("{}", describe_violations(.0))]
    Validation(Vec<FieldViolation>),
    /// Rejected credentials or a non-admin account.
    #[error("{0}")]
    Auth(String),
}

impl AdminError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            Self::Validation(violations) => violations,
            _ => &[],
        }
    }
}

fn describe_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|violation| violation.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
