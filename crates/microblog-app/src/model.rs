// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::*;
use crate::{ArticleDraft, ReadOnly, Resource, UserDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Editor,
    Reader,
    /// Any role this client does not know; kept so one record cannot sink a list.
    #[serde(other)]
    Unknown,
}

impl Role {
    pub const ALL: [Self; 3] = [Self::Admin, Self::Editor, Self::Reader];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Editor => "EDITOR",
            Self::Reader => "READER",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Editor => "Editor",
            Self::Reader => "Reader",
            Self::Unknown => "Unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ADMIN" => Some(Self::Admin),
            "EDITOR" => Some(Self::Editor),
            "READER" => Some(Self::Reader),
            _ => None,
        }
    }

    /// Next role in selection order, wrapping around.
    pub fn cycle(self) -> Self {
        match Self::ALL.iter().position(|role| *role == self) {
            Some(current) => Self::ALL[(current + 1) % Self::ALL.len()],
            None => Self::ALL[0],
        }
    }

    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    #[serde(default)]
    pub id: Option<UserId>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCounts {
    #[serde(default)]
    pub comments: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(rename = "_count", default)]
    pub counts: Option<ArticleCounts>,
}

impl Article {
    pub fn author_name(&self) -> &str {
        self.author.as_ref().map_or("", |author| author.name.as_str())
    }

    pub fn comment_count(&self) -> u64 {
        self.counts.map_or(0, |counts| counts.comments)
    }

    pub const fn status_label(&self) -> &'static str {
        if self.is_published {
            "Published"
        } else {
            "Draft"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub user: Option<AuthorRef>,
    #[serde(default)]
    pub article_id: Option<ArticleId>,
    /// Filled in client-side while composing the comment list.
    #[serde(default)]
    pub article_title: Option<String>,
}

impl Comment {
    pub fn author_name(&self) -> &str {
        self.user.as_ref().map_or("", |user| user.name.as_str())
    }

    pub fn article_label(&self) -> &str {
        self.article_title.as_deref().unwrap_or("Unknown Article")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub users: usize,
    pub articles: usize,
    pub comments: u64,
}

pub fn created_on(timestamp: Option<OffsetDateTime>) -> Option<Date> {
    timestamp.map(OffsetDateTime::date)
}

impl Resource for User {
    type Id = UserId;
    type Draft = UserDraft;

    const SINGULAR: &'static str = "user";
    const PLURAL: &'static str = "users";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn draft(&self) -> Option<Self::Draft> {
        Some(UserDraft::from_user(self))
    }
}

impl Resource for Article {
    type Id = ArticleId;
    type Draft = ArticleDraft;

    const SINGULAR: &'static str = "article";
    const PLURAL: &'static str = "articles";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn draft(&self) -> Option<Self::Draft> {
        Some(ArticleDraft::from_article(self))
    }
}

impl Resource for Comment {
    type Id = CommentId;
    type Draft = ReadOnly;

    const SINGULAR: &'static str = "comment";
    const PLURAL: &'static str = "comments";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn draft(&self) -> Option<Self::Draft> {
        None
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
