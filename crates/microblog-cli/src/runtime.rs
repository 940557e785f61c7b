// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::session_store::SessionStore;
use anyhow::{Context, Result};
use microblog_api::{ApiSource, Client};
use microblog_app::{Article, Comment, ResourceSource, Session, User};
use microblog_tui::{AdminRuntime, BackendReply, BackendRequest, InternalEvent, ReplyTarget};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, warn};

/// Runs UI requests against the HTTP API on worker threads.
#[derive(Debug, Clone)]
pub struct ApiRuntime {
    client: Client,
    store: SessionStore,
    comment_article_limit: usize,
}

impl ApiRuntime {
    pub fn new(client: Client, store: SessionStore, comment_article_limit: usize) -> Self {
        Self {
            client,
            store,
            comment_article_limit,
        }
    }

    fn client_for(&self, session: Option<&Session>) -> Client {
        match session {
            Some(session) => self.client.for_session(session),
            None => self.client.clone(),
        }
    }
}

impl AdminRuntime for ApiRuntime {
    fn execute(&mut self, session: Option<&Session>, request: BackendRequest) -> BackendReply {
        let client = self.client_for(session);
        let mut source = ApiSource::new(&client, self.comment_article_limit);
        match request {
            BackendRequest::SignIn(input) => {
                let mut signer = self.client.clone();
                let result = signer.sign_in(&input);
                if let Ok(session) = &result
                    && let Err(error) = self.store.save(session)
                {
                    warn!(error = %format!("{error:#}"), "session not persisted");
                }
                BackendReply::SignedIn(result)
            }
            BackendRequest::LoadDashboard => BackendReply::Dashboard(client.dashboard_stats()),
            BackendRequest::LoadUsers => {
                BackendReply::Users(ResourceSource::<User>::fetch(&mut source))
            }
            BackendRequest::UpdateUser(id, draft) => {
                BackendReply::Mutation(ResourceSource::<User>::update(&mut source, &id, &draft))
            }
            BackendRequest::DeleteUser(id) => {
                BackendReply::Mutation(ResourceSource::<User>::delete(&mut source, &id))
            }
            BackendRequest::LoadArticles => {
                BackendReply::Articles(ResourceSource::<Article>::fetch(&mut source))
            }
            BackendRequest::UpdateArticle(id, draft) => BackendReply::Mutation(
                ResourceSource::<Article>::update(&mut source, &id, &draft),
            ),
            BackendRequest::DeleteArticle(id) => {
                BackendReply::Mutation(ResourceSource::<Article>::delete(&mut source, &id))
            }
            BackendRequest::LoadComments => {
                BackendReply::Comments(ResourceSource::<Comment>::fetch(&mut source))
            }
            BackendRequest::DeleteComment(id) => {
                BackendReply::Mutation(ResourceSource::<Comment>::delete(&mut source, &id))
            }
        }
    }

    fn sign_out(&mut self) -> Result<()> {
        if self.store.clear()? {
            debug!(path = %self.store.path().display(), "removed session file");
        }
        Ok(())
    }

    fn spawn_request(
        &mut self,
        session: Option<Session>,
        target: ReplyTarget,
        request: BackendRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let mut worker = self.clone();
        thread::Builder::new()
            .name("microblog-request".to_owned())
            .spawn(move || {
                let reply = worker.execute(session.as_ref(), request);
                if tx.send(InternalEvent::Backend { target, reply }).is_err() {
                    debug!(?target, "ui gone before reply arrived");
                }
            })
            .context("spawn request worker thread")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ApiRuntime;
    use crate::session_store::SessionStore;
    use anyhow::{Result, anyhow};
    use microblog_api::Client;
    use microblog_app::{ArticleId, CommentId, LoginInput, UserId};
    use microblog_testkit::{admin_session, temp_file_path};
    use microblog_tui::{AdminRuntime, BackendReply, BackendRequest, InternalEvent, ReplyTarget};
    use serde_json::json;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tiny_http::{Header, Response, Server};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct SeenRequest {
        line: String,
        authorization: Option<String>,
    }

    /// Answers `requests` requests with `body`, recording method, path, and
    /// `Authorization` header of each.
    fn mock_server(
        requests: usize,
        body: String,
    ) -> Result<(String, thread::JoinHandle<Vec<SeenRequest>>)> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let addr = format!("http://{}/api", server.server_addr());
        let handle = thread::spawn(move || {
            let mut seen = Vec::with_capacity(requests);
            for _ in 0..requests {
                let request = server.recv().expect("request expected");
                seen.push(SeenRequest {
                    line: format!("{} {}", request.method(), request.url()),
                    authorization: request
                        .headers()
                        .iter()
                        .find(|header| header.field.equiv("Authorization"))
                        .map(|header| header.value.as_str().to_owned()),
                });
                let response = Response::from_string(body.clone()).with_header(
                    Header::from_bytes("Content-Type", "application/json")
                        .expect("valid content type header"),
                );
                request.respond(response).expect("response should succeed");
            }
            seen
        });
        Ok((addr, handle))
    }

    fn runtime(addr: &str, store: SessionStore) -> Result<ApiRuntime> {
        Ok(ApiRuntime::new(
            Client::new(addr, Duration::from_secs(2))?,
            store,
            5,
        ))
    }

    #[test]
    fn sign_in_persists_the_session() -> Result<()> {
        let body = json!({
            "token": "tok-9",
            "user": {"id": "u1", "name": "Ada", "email": "ada@example.com", "role": "ADMIN"}
        });
        let (addr, handle) = mock_server(1, body.to_string())?;
        let (_temp, path) = temp_file_path("session.json")?;
        let store = SessionStore::new(&path);
        let mut runtime = runtime(&addr, store.clone())?;

        let reply = runtime.execute(
            None,
            BackendRequest::SignIn(LoginInput {
                email: "ada@example.com".to_owned(),
                password: "pw".to_owned(),
            }),
        );
        let session = match reply {
            BackendReply::SignedIn(Ok(session)) => session,
            other => return Err(anyhow!("expected a session, got {other:?}")),
        };
        assert_eq!(store.load()?, Some(session));

        runtime.sign_out()?;
        assert!(!path.exists());
        handle.join().map_err(|_| anyhow!("server thread panicked"))?;
        Ok(())
    }

    #[test]
    fn spawned_request_replies_over_channel_with_session_token() -> Result<()> {
        let (addr, handle) = mock_server(1, json!({"users": []}).to_string())?;
        let (_temp, path) = temp_file_path("session.json")?;
        let mut runtime = runtime(&addr, SessionStore::new(path))?;
        let (tx, rx) = mpsc::channel();
        let target = ReplyTarget::Dashboard { request_id: 3 };

        runtime.spawn_request(
            Some(admin_session()),
            target,
            BackendRequest::LoadUsers,
            tx,
        )?;
        let event = rx.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(
            event,
            InternalEvent::Backend {
                target,
                reply: BackendReply::Users(Ok(Vec::new())),
            }
        );

        let seen = handle.join().map_err(|_| anyhow!("server thread panicked"))?;
        assert_eq!(
            seen,
            vec![SeenRequest {
                line: "GET /api/admin/users".to_owned(),
                authorization: Some("Bearer test-token".to_owned()),
            }]
        );
        Ok(())
    }

    #[test]
    fn table_requests_reach_their_resource_endpoints() -> Result<()> {
        let (addr, handle) = mock_server(3, "{}".to_owned())?;
        let (_temp, path) = temp_file_path("session.json")?;
        let mut runtime = runtime(&addr, SessionStore::new(path))?;
        let session = admin_session();

        for request in [
            BackendRequest::DeleteUser(UserId::new("u7")),
            BackendRequest::DeleteArticle(ArticleId::new("a3")),
            BackendRequest::DeleteComment(CommentId::new("c9")),
        ] {
            let reply = runtime.execute(Some(&session), request);
            assert_eq!(reply, BackendReply::Mutation(Ok(())));
        }

        let seen = handle.join().map_err(|_| anyhow!("server thread panicked"))?;
        let lines: Vec<_> = seen.iter().map(|request| request.line.as_str()).collect();
        assert_eq!(
            lines,
            vec![
                "DELETE /api/admin/users/u7",
                "DELETE /api/articles/a3",
                "DELETE /api/comments/c9",
            ]
        );
        Ok(())
    }

    #[test]
    fn article_load_goes_through_envelope_normalization() -> Result<()> {
        let body = json!({"data": [{"id": "a1", "title": "First"}], "total": 1});
        let (addr, handle) = mock_server(1, body.to_string())?;
        let (_temp, path) = temp_file_path("session.json")?;
        let mut runtime = runtime(&addr, SessionStore::new(path))?;

        let reply = runtime.execute(Some(&admin_session()), BackendRequest::LoadArticles);
        let articles = match reply {
            BackendReply::Articles(Ok(articles)) => articles,
            other => return Err(anyhow!("expected articles, got {other:?}")),
        };
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "First");
        handle.join().map_err(|_| anyhow!("server thread panicked"))?;
        Ok(())
    }

    #[test]
    fn unreachable_api_surfaces_as_failed_load() -> Result<()> {
        let (_temp, path) = temp_file_path("session.json")?;
        let mut runtime = ApiRuntime::new(
            Client::new("http://127.0.0.1:1/api", Duration::from_secs(1))?,
            SessionStore::new(path),
            5,
        );
        let reply = runtime.execute(Some(&admin_session()), BackendRequest::LoadArticles);
        assert!(matches!(reply, BackendReply::Articles(Err(_))));
        Ok(())
    }
}
