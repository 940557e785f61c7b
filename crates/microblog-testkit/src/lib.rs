// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use microblog_app::{
    AdminError, Article, ArticleCounts, ArticleId, AuthorRef, Comment, CommentId, Resource,
    ResourceSource, Role, Session, SessionUser, User, UserId,
};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::path::PathBuf;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 12] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Turner", "Brooks",
];
const TAGS: [&str; 10] = [
    "tech",
    "news",
    "programming",
    "rust",
    "design",
    "travel",
    "food",
    "music",
    "science",
    "opinion",
];
const MAIL_DOMAINS: [&str; 4] = [
    "example.com",
    "microblog.test",
    "mail.local",
    "posts.dev",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Deterministic generator for users, articles, and comments. Ids are
/// sequential per kind so tests can predict them.
#[derive(Debug, Clone)]
pub struct BlogFaker {
    rng: DeterministicRng,
    next_user: usize,
    next_article: usize,
    next_comment: usize,
}

impl BlogFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_user: 0,
            next_article: 0,
            next_comment: 0,
        }
    }

    pub fn user(&mut self) -> User {
        self.next_user += 1;
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let domain = self.pick(&MAIL_DOMAINS);
        User {
            id: UserId::new(format!("user-{}", self.next_user)),
            name: format!("{first} {last}"),
            email: format!(
                "{}.{}@{domain}",
                first.to_ascii_lowercase(),
                last.to_ascii_lowercase()
            ),
            role: Role::ALL[self.rng.int_n(Role::ALL.len())],
            is_verified: self.rng.bool(),
            created_at: Some(self.created_at()),
        }
    }

    pub fn users(&mut self, count: usize) -> Vec<User> {
        (0..count).map(|_| self.user()).collect()
    }

    pub fn article(&mut self) -> Article {
        self.next_article += 1;
        let author = self.author();
        let tag_count = self.rng.int_n(4);
        let tags = (0..tag_count)
            .map(|_| self.pick(&TAGS).to_owned())
            .collect();
        let topic = self.pick(&TAGS);
        Article {
            id: ArticleId::new(format!("article-{}", self.next_article)),
            title: format!("Post {} about {topic}", self.next_article),
            content: self.sentence(6, 18),
            is_published: self.rng.bool(),
            created_at: Some(self.created_at()),
            author: Some(author),
            tags,
            counts: Some(ArticleCounts {
                comments: self.rng.int_n(12) as u64,
            }),
        }
    }

    pub fn articles(&mut self, count: usize) -> Vec<Article> {
        (0..count).map(|_| self.article()).collect()
    }

    pub fn comment_on(&mut self, article: &Article) -> Comment {
        self.next_comment += 1;
        Comment {
            id: CommentId::new(format!("comment-{}", self.next_comment)),
            content: self.sentence(3, 10),
            created_at: Some(self.created_at()),
            user: Some(self.author()),
            article_id: Some(article.id.clone()),
            article_title: None,
        }
    }

    fn author(&mut self) -> AuthorRef {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        AuthorRef {
            id: None,
            name: format!("{first} {last}"),
        }
    }

    fn created_at(&mut self) -> OffsetDateTime {
        let days = self.rng.int_n(365) as i64;
        fixture_timestamp() - Duration::days(days)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn sentence(&mut self, min_words: usize, max_words: usize) -> String {
        const WORDS: [&str; 20] = [
            "today", "release", "notes", "thread", "update", "draft", "review", "weekend",
            "launch", "idea", "question", "answer", "community", "feedback", "post", "story",
            "guide", "tips", "photo", "event",
        ];

        let count = min_words + self.rng.int_n(max_words.saturating_sub(min_words) + 1);
        let mut parts = Vec::with_capacity(count);
        for _ in 0..count {
            parts.push(self.pick(&WORDS).to_owned());
        }
        let mut sentence = parts.join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }
}

/// In-memory [`ResourceSource`] that replays queued results and records every
/// call it receives.
#[derive(Debug)]
pub struct ScriptedSource<R: Resource> {
    fetches: VecDeque<Result<Vec<R>, AdminError>>,
    updates: VecDeque<Result<(), AdminError>>,
    deletes: VecDeque<Result<(), AdminError>>,
    pub fetch_calls: usize,
    pub updated: Vec<(R::Id, R::Draft)>,
    pub deleted: Vec<R::Id>,
}

impl<R: Resource> Default for ScriptedSource<R> {
    fn default() -> Self {
        Self {
            fetches: VecDeque::new(),
            updates: VecDeque::new(),
            deletes: VecDeque::new(),
            fetch_calls: 0,
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

impl<R: Resource> ScriptedSource<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_fetch(&mut self, result: Result<Vec<R>, AdminError>) -> &mut Self {
        self.fetches.push_back(result);
        self
    }

    pub fn push_update(&mut self, result: Result<(), AdminError>) -> &mut Self {
        self.updates.push_back(result);
        self
    }

    pub fn push_delete(&mut self, result: Result<(), AdminError>) -> &mut Self {
        self.deletes.push_back(result);
        self
    }

    pub fn mutation_calls(&self) -> usize {
        self.updated.len() + self.deleted.len()
    }
}

impl<R: Resource> ResourceSource<R> for ScriptedSource<R> {
    fn fetch(&mut self) -> Result<Vec<R>, AdminError> {
        self.fetch_calls += 1;
        self.fetches
            .pop_front()
            .unwrap_or_else(|| Err(AdminError::transport("no scripted fetch result")))
    }

    fn update(&mut self, id: &R::Id, draft: &R::Draft) -> Result<(), AdminError> {
        self.updated.push((id.clone(), draft.clone()));
        self.updates.pop_front().unwrap_or(Ok(()))
    }

    fn delete(&mut self, id: &R::Id) -> Result<(), AdminError> {
        self.deleted.push(id.clone());
        self.deletes.pop_front().unwrap_or(Ok(()))
    }
}

/// The three response bodies a list endpoint may return for `records`.
pub fn envelope_variants(key: &str, records: &Value) -> [Value; 3] {
    [
        records.clone(),
        json!({ key: records }),
        json!({ "data": records }),
    ]
}

pub fn admin_session() -> Session {
    Session {
        token: "test-token".to_owned(),
        user: SessionUser {
            id: Some(UserId::new("admin-1")),
            name: "Admin User".to_owned(),
            email: "admin@example.com".to_owned(),
            role: Role::Admin.as_str().to_owned(),
        },
    }
}

pub fn temp_file_path(file_name: &str) -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join(file_name);
    Ok((dir, path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

pub fn fixture_timestamp() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

#[cfg(test)]
mod tests {
    use super::{BlogFaker, ScriptedSource, envelope_variants, fixture_datetime, fixture_timestamp};
    use microblog_app::{AdminError, Article, ResourceSource};
    use serde_json::json;
    use std::collections::BTreeSet;
    use time::format_description::well_known::Rfc3339;

    #[test]
    fn same_seed_produces_same_records() {
        let mut left = BlogFaker::new(42);
        let mut right = BlogFaker::new(42);
        assert_eq!(left.users(3), right.users(3));
        assert_eq!(left.articles(3), right.articles(3));
    }

    #[test]
    fn ids_are_sequential_and_unique() {
        let mut faker = BlogFaker::new(7);
        let articles = faker.articles(23);
        let ids: BTreeSet<_> = articles.iter().map(|article| article.id.clone()).collect();
        assert_eq!(ids.len(), 23);
        assert_eq!(articles[0].id.as_str(), "article-1");
        assert_eq!(articles[22].id.as_str(), "article-23");
    }

    #[test]
    fn article_titles_carry_their_sequence_number() {
        let mut faker = BlogFaker::new(11);
        let articles = faker.articles(2);
        assert!(articles[0].title.starts_with("Post 1 about "));
        assert!(articles[1].title.starts_with("Post 2 about "));
        assert!(articles.iter().all(|article| article.author.is_some()));
    }

    #[test]
    fn comments_reference_their_article() {
        let mut faker = BlogFaker::new(3);
        let article = faker.article();
        let comment = faker.comment_on(&article);
        assert_eq!(comment.article_id.as_ref(), Some(&article.id));
        assert!(comment.article_title.is_none());
        assert!(comment.content.ends_with('.'));
    }

    #[test]
    fn scripted_source_replays_in_order_and_records_calls() {
        let mut faker = BlogFaker::new(1);
        let article = faker.article();
        let mut source = ScriptedSource::<Article>::new();
        source
            .push_fetch(Ok(vec![article.clone()]))
            .push_delete(Err(AdminError::transport("down")));

        assert_eq!(source.fetch(), Ok(vec![article.clone()]));
        assert!(source.fetch().is_err());
        assert!(source.delete(&article.id).is_err());
        assert!(source.delete(&article.id).is_ok());
        assert_eq!(source.fetch_calls, 2);
        assert_eq!(source.deleted.len(), 2);
        assert_eq!(source.mutation_calls(), 2);
    }

    #[test]
    fn envelope_variants_wrap_the_same_records() {
        let records = json!([{"id": "a1"}]);
        let [bare, keyed, data] = envelope_variants("articles", &records);
        assert_eq!(bare, records);
        assert_eq!(keyed["articles"], records);
        assert_eq!(data["data"], records);
    }

    #[test]
    fn fixture_datetime_matches_timestamp() {
        let parsed = time::OffsetDateTime::parse(fixture_datetime(), &Rfc3339)
            .expect("fixture should parse");
        assert_eq!(parsed, fixture_timestamp());
    }
}
