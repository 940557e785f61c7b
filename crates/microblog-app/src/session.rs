// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AdminError, Role, UserId};

pub const ADMIN_REQUIRED_MESSAGE: &str = "Access restricted: Admin privileges required";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(default)]
    pub id: Option<UserId>,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: String,
}

/// Body of a successful `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionUser,
}

/// An authenticated admin session. Created on login, dropped on logout.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

impl Session {
    /// Accepts a login response only for admin accounts.
    pub fn admit(response: LoginResponse) -> Result<Self, AdminError> {
        if Role::parse(&response.user.role) != Some(Role::Admin) {
            return Err(AdminError::auth(ADMIN_REQUIRED_MESSAGE));
        }
        if response.token.trim().is_empty() {
            return Err(AdminError::auth(INVALID_CREDENTIALS_MESSAGE));
        }
        Ok(Self {
            token: response.token,
            user: response.user,
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ADMIN_REQUIRED_MESSAGE, LoginResponse, Session, SessionUser};
    use crate::AdminError;

    fn response(role: &str) -> LoginResponse {
        LoginResponse {
            token: "tok-123".to_owned(),
            user: SessionUser {
                id: None,
                name: "Ada".to_owned(),
                email: "ada@example.com".to_owned(),
                role: role.to_owned(),
            },
        }
    }

    #[test]
    fn admin_login_is_admitted() {
        let session = Session::admit(response("ADMIN")).expect("admin should be admitted");
        assert_eq!(session.token, "tok-123");
        assert_eq!(session.user.name, "Ada");
    }

    #[test]
    fn non_admin_login_is_rejected() {
        for role in ["EDITOR", "READER", "admin", ""] {
            let error = Session::admit(response(role)).expect_err("non-admin should fail");
            assert_eq!(error, AdminError::auth(ADMIN_REQUIRED_MESSAGE));
        }
    }

    #[test]
    fn debug_output_redacts_token() {
        let session = Session::admit(response("ADMIN")).expect("admin should be admitted");
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("tok-123"));
        assert!(rendered.contains("<redacted>"));
    }
}
