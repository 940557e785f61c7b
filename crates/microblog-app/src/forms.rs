// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::Serialize;
use std::fmt;

use crate::{AdminError, Article, Role, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    pub fn required(field: &'static str, label: &str) -> Self {
        Self {
            field,
            message: format!("{label} is required"),
        }
    }
}

/// Editable copy of a record. Edits are typed; text parsing happens in the
/// presentation layer before an edit reaches the draft.
pub trait Draft: Clone + fmt::Debug {
    type Edit: fmt::Debug;

    fn apply(&mut self, edit: Self::Edit);

    fn violations(&self) -> Vec<FieldViolation>;
}

/// Draft type for resources that cannot be edited. It has no values, so no
/// edit session can ever hold one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadOnly {}

impl Draft for ReadOnly {
    type Edit = ReadOnly;

    fn apply(&mut self, _edit: Self::Edit) {
        match *self {}
    }

    fn violations(&self) -> Vec<FieldViolation> {
        match *self {}
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDraft {
    pub title: String,
    pub content: String,
    pub is_published: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleEdit {
    Title(String),
    Content(String),
    Published(bool),
    Tags(Vec<String>),
}

impl ArticleDraft {
    pub fn from_article(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            content: article.content.clone(),
            is_published: article.is_published,
            tags: article.tags.clone(),
        }
    }
}

impl Draft for ArticleDraft {
    type Edit = ArticleEdit;

    fn apply(&mut self, edit: Self::Edit) {
        match edit {
            ArticleEdit::Title(title) => self.title = title,
            ArticleEdit::Content(content) => self.content = content,
            ArticleEdit::Published(published) => self.is_published = published,
            ArticleEdit::Tags(tags) => self.tags = tags,
        }
    }

    fn violations(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        if self.title.trim().is_empty() {
            violations.push(FieldViolation::required("title", "Title"));
        }
        if self.content.trim().is_empty() {
            violations.push(FieldViolation::required("content", "Content"));
        }
        violations
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    /// Omitted from the body while unknown so the server keeps its value.
    #[serde(skip_serializing_if = "Role::is_unknown")]
    pub role: Role,
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEdit {
    Name(String),
    Email(String),
    Role(Role),
    Verified(bool),
}

impl UserDraft {
    pub fn from_user(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_verified: user.is_verified,
        }
    }
}

impl Draft for UserDraft {
    type Edit = UserEdit;

    fn apply(&mut self, edit: Self::Edit) {
        match edit {
            UserEdit::Name(name) => self.name = name,
            UserEdit::Email(email) => self.email = email,
            UserEdit::Role(role) => self.role = role,
            UserEdit::Verified(verified) => self.is_verified = verified,
        }
    }

    fn violations(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        if self.name.trim().is_empty() {
            violations.push(FieldViolation::required("name", "Name"));
        }
        if self.email.trim().is_empty() {
            violations.push(FieldViolation::required("email", "Email"));
        }
        violations
    }
}

/// Splits comma-separated tag text into trimmed, non-empty tags.
pub fn parse_tag_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn format_tag_list(tags: &[String]) -> String {
    tags.join(", ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn validate(&self) -> Result<(), AdminError> {
        if self.email.trim().is_empty() || self.password.trim().is_empty() {
            return Err(AdminError::auth("Email and password are required"));
        }
        Ok(())
    }
}
