// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Generic list controller shared by every management screen.
//!
//! A [`ResourceTable`] owns one collection and the dialog state around it:
//! load state, pagination window, the view/delete/edit selections, and the
//! in-flight markers that keep mutations from being submitted twice.
//!
//! Every API-facing operation comes in two halves. `start_*` records that a
//! request is in flight and hands back a [`Ticket`] (or `None` when the call
//! must be a no-op); `finish_*` applies the result only if the ticket is still
//! the one the table is waiting for. A UI can run the request anywhere in
//! between. The synchronous drivers ([`ResourceTable::load`],
//! [`ResourceTable::confirm_delete`], [`ResourceTable::save_draft`]) compose
//! both halves around a [`ResourceSource`].

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

use crate::{AdminError, Draft, FieldViolation};

pub const PAGE_SIZE_OPTIONS: [usize; 3] = [5, 10, 25];
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// A record type the controller can manage.
pub trait Resource: Clone + fmt::Debug {
    type Id: Clone + Eq + Hash + fmt::Debug + fmt::Display;
    type Draft: Draft;

    const SINGULAR: &'static str;
    const PLURAL: &'static str;

    fn id(&self) -> &Self::Id;

    /// Editable copy of this record, or `None` for read-only resources.
    fn draft(&self) -> Option<Self::Draft>;
}

/// Backend operations for one resource collection.
pub trait ResourceSource<R: Resource> {
    fn fetch(&mut self) -> Result<Vec<R>, AdminError>;

    fn update(&mut self, id: &R::Id, draft: &R::Draft) -> Result<(), AdminError>;

    fn delete(&mut self, id: &R::Id) -> Result<(), AdminError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

pub fn validate_page_size(page_size: usize) -> Result<(), AdminError> {
    if PAGE_SIZE_OPTIONS.contains(&page_size) {
        return Ok(());
    }
    Err(AdminError::Validation(vec![FieldViolation {
        field: "page_size",
        message: format!(
            "page size must be one of {}; got {page_size}",
            PAGE_SIZE_OPTIONS
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    page_index: usize,
    page_size: usize,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageWindow {
    pub fn new(page_size: usize) -> Result<Self, AdminError> {
        validate_page_size(page_size)?;
        Ok(Self {
            page_index: 0,
            page_size,
        })
    }

    pub const fn page_index(self) -> usize {
        self.page_index
    }

    pub const fn page_size(self) -> usize {
        self.page_size
    }

    pub fn set_page(&mut self, page_index: usize) {
        self.page_index = page_index;
    }

    /// Changing the size always returns to the first page.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), AdminError> {
        validate_page_size(page_size)?;
        self.page_size = page_size;
        self.page_index = 0;
        Ok(())
    }

    /// Slice bounds for a collection of `len` rows; empty when the page is
    /// past the end.
    pub fn range(self, len: usize) -> Range<usize> {
        let start = self.page_index.saturating_mul(self.page_size).min(len);
        let end = start.saturating_add(self.page_size).min(len);
        start..end
    }

    pub fn page_count(self, len: usize) -> usize {
        len.div_ceil(self.page_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(u64);

fn next_table_id() -> TableId {
    static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);
    TableId(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Identifies one in-flight request of one controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    table: TableId,
    seq: u64,
}

impl Ticket {
    pub const fn table(self) -> TableId {
        self.table
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete<Id> {
    pub id: Id,
    in_flight: Option<Ticket>,
    pub error: Option<String>,
}

impl<Id> PendingDelete<Id> {
    pub const fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession<Id, D> {
    pub id: Id,
    pub draft: D,
    saving: Option<Ticket>,
    pub error: Option<String>,
}

impl<Id, D> EditSession<Id, D> {
    pub const fn is_saving(&self) -> bool {
        self.saving.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest<Id> {
    pub ticket: Ticket,
    pub id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest<Id, D> {
    pub ticket: Ticket,
    pub id: Id,
    pub draft: D,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The write succeeded; the caller must run the refetch for `reload`.
    Completed { reload: Ticket },
    /// The write failed; the dialog stays open with an inline error.
    Failed(AdminError),
    /// Nothing happened: no pending request, a duplicate submission, a
    /// superseded reply, or a disposed controller.
    Ignored,
}

#[derive(Debug)]
pub struct ResourceTable<R: Resource> {
    id: TableId,
    rows: Vec<R>,
    load_state: LoadState,
    window: PageWindow,
    viewing: Option<R>,
    pending_delete: Option<PendingDelete<R::Id>>,
    edit: Option<EditSession<R::Id, R::Draft>>,
    next_seq: u64,
    active_load: Option<Ticket>,
    disposed: bool,
}

impl<R: Resource> Default for ResourceTable<R> {
    fn default() -> Self {
        Self::new(PageWindow::default())
    }
}

impl<R: Resource> ResourceTable<R> {
    pub fn new(window: PageWindow) -> Self {
        Self {
            id: next_table_id(),
            rows: Vec::new(),
            load_state: LoadState::Loading,
            window,
            viewing: None,
            pending_delete: None,
            edit: None,
            next_seq: 0,
            active_load: None,
            disposed: false,
        }
    }

    pub const fn table_id(&self) -> TableId {
        self.id
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub const fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub const fn window(&self) -> PageWindow {
        self.window
    }

    pub fn visible_rows(&self) -> &[R] {
        &self.rows[self.window.range(self.rows.len())]
    }

    pub fn page_count(&self) -> usize {
        self.window.page_count(self.rows.len())
    }

    pub fn find(&self, id: &R::Id) -> Option<&R> {
        self.rows.iter().find(|row| row.id() == id)
    }

    pub const fn viewing(&self) -> Option<&R> {
        self.viewing.as_ref()
    }

    pub const fn pending_delete(&self) -> Option<&PendingDelete<R::Id>> {
        self.pending_delete.as_ref()
    }

    pub const fn edit(&self) -> Option<&EditSession<R::Id, R::Draft>> {
        self.edit.as_ref()
    }

    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_loading(&self) -> bool {
        self.load_state == LoadState::Loading
    }

    /// Stops this controller from accepting any further replies.
    pub fn dispose(&mut self) {
        if !self.disposed {
            debug!(resource = R::PLURAL, "disposing table controller");
        }
        self.disposed = true;
        self.active_load = None;
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.next_seq = self.next_seq.wrapping_add(1);
        Ticket {
            table: self.id,
            seq: self.next_seq,
        }
    }

    pub fn start_load(&mut self) -> Option<Ticket> {
        if self.disposed {
            return None;
        }
        let ticket = self.issue_ticket();
        self.active_load = Some(ticket);
        self.load_state = LoadState::Loading;
        debug!(resource = R::PLURAL, seq = ticket.seq, "load started");
        Some(ticket)
    }

    /// Applies a fetch result. Returns `false` when the reply was discarded
    /// because a newer load superseded it or the controller was disposed.
    pub fn finish_load(&mut self, ticket: Ticket, result: Result<Vec<R>, AdminError>) -> bool {
        if self.disposed || self.active_load != Some(ticket) {
            debug!(
                resource = R::PLURAL,
                seq = ticket.seq,
                "discarding superseded load reply"
            );
            return false;
        }
        self.active_load = None;

        match result {
            Ok(rows) => {
                self.rows = dedupe_by_id(rows);
                self.load_state = LoadState::Ready;
                info!(resource = R::PLURAL, count = self.rows.len(), "loaded");
            }
            Err(AdminError::Shape) => {
                self.rows.clear();
                self.load_state = LoadState::Failed(AdminError::Shape.to_string());
                error!(resource = R::PLURAL, "unexpected response envelope");
            }
            Err(error) => {
                self.rows.clear();
                self.load_state = LoadState::Failed(format!("Failed to load {}", R::PLURAL));
                error!(resource = R::PLURAL, %error, "load failed");
            }
        }
        true
    }

    pub fn set_page(&mut self, page_index: usize) {
        self.window.set_page(page_index);
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), AdminError> {
        self.window.set_page_size(page_size)
    }

    pub fn begin_view(&mut self, record: R) {
        self.viewing = Some(record);
    }

    pub fn end_view(&mut self) {
        self.viewing = None;
    }

    /// Asks for confirmation to delete `id`. Refused while another delete is
    /// in flight.
    pub fn begin_delete(&mut self, id: R::Id) -> bool {
        if self.disposed
            || self
                .pending_delete
                .as_ref()
                .is_some_and(PendingDelete::is_in_flight)
        {
            return false;
        }
        self.pending_delete = Some(PendingDelete {
            id,
            in_flight: None,
            error: None,
        });
        true
    }

    pub fn start_delete(&mut self) -> Option<DeleteRequest<R::Id>> {
        if self.disposed {
            return None;
        }
        match &self.pending_delete {
            Some(pending) if !pending.is_in_flight() => {}
            _ => return None,
        }
        let ticket = self.issue_ticket();
        let pending = self.pending_delete.as_mut()?;
        pending.in_flight = Some(ticket);
        pending.error = None;
        Some(DeleteRequest {
            ticket,
            id: pending.id.clone(),
        })
    }

    pub fn finish_delete(
        &mut self,
        ticket: Ticket,
        result: Result<(), AdminError>,
    ) -> MutationOutcome {
        if self.disposed {
            return MutationOutcome::Ignored;
        }
        let Some(pending) = self.pending_delete.as_mut() else {
            return MutationOutcome::Ignored;
        };
        if pending.in_flight != Some(ticket) {
            return MutationOutcome::Ignored;
        }

        match result {
            Ok(()) => {
                info!(resource = R::SINGULAR, id = %pending.id, "deleted");
                self.pending_delete = None;
                self.reload_outcome()
            }
            Err(error) => {
                error!(resource = R::SINGULAR, id = %pending.id, %error, "delete failed");
                pending.in_flight = None;
                pending.error = Some(format!(
                    "Failed to delete {}. Please try again.",
                    R::SINGULAR
                ));
                MutationOutcome::Failed(error)
            }
        }
    }

    /// Closes the confirmation. Refused while the delete is in flight.
    pub fn cancel_delete(&mut self) -> bool {
        if self
            .pending_delete
            .as_ref()
            .is_some_and(PendingDelete::is_in_flight)
        {
            return false;
        }
        self.pending_delete = None;
        true
    }

    /// Opens edit mode with a fresh draft of `record`. Refused for read-only
    /// resources and while a save is in flight.
    pub fn begin_edit(&mut self, record: &R) -> bool {
        if self.disposed || self.edit.as_ref().is_some_and(EditSession::is_saving) {
            return false;
        }
        let Some(draft) = record.draft() else {
            return false;
        };
        self.edit = Some(EditSession {
            id: record.id().clone(),
            draft,
            saving: None,
            error: None,
        });
        true
    }

    pub fn update_draft(&mut self, edit: <R::Draft as Draft>::Edit) -> bool {
        match self.edit.as_mut() {
            Some(session) if !session.is_saving() => {
                session.draft.apply(edit);
                true
            }
            _ => false,
        }
    }

    pub fn validate_draft(&self) -> Vec<FieldViolation> {
        self.edit
            .as_ref()
            .map(|session| session.draft.violations())
            .unwrap_or_default()
    }

    /// Validates the draft and marks the save as in flight. Validation
    /// failures are reported without producing a request; a save that is
    /// already in flight yields `Ok(None)`.
    #[allow(clippy::type_complexity)]
    pub fn start_save(&mut self) -> Result<Option<SaveRequest<R::Id, R::Draft>>, AdminError> {
        if self.disposed {
            return Ok(None);
        }
        let violations = match &self.edit {
            Some(session) if !session.is_saving() => session.draft.violations(),
            _ => return Ok(None),
        };
        if !violations.is_empty() {
            let error = AdminError::Validation(violations);
            if let Some(session) = self.edit.as_mut() {
                session.error = Some(error.to_string());
            }
            return Err(error);
        }

        let ticket = self.issue_ticket();
        let Some(session) = self.edit.as_mut() else {
            return Ok(None);
        };
        session.saving = Some(ticket);
        session.error = None;
        Ok(Some(SaveRequest {
            ticket,
            id: session.id.clone(),
            draft: session.draft.clone(),
        }))
    }

    pub fn finish_save(&mut self, ticket: Ticket, result: Result<(), AdminError>) -> MutationOutcome {
        if self.disposed {
            return MutationOutcome::Ignored;
        }
        let Some(session) = self.edit.as_mut() else {
            return MutationOutcome::Ignored;
        };
        if session.saving != Some(ticket) {
            return MutationOutcome::Ignored;
        }

        match result {
            Ok(()) => {
                info!(resource = R::SINGULAR, id = %session.id, "saved");
                self.edit = None;
                self.reload_outcome()
            }
            Err(error) => {
                error!(resource = R::SINGULAR, id = %session.id, %error, "save failed");
                session.saving = None;
                session.error = Some(format!(
                    "Failed to save {}. Please try again.",
                    R::SINGULAR
                ));
                MutationOutcome::Failed(error)
            }
        }
    }

    /// Discards the draft. Refused while the save is in flight.
    pub fn cancel_edit(&mut self) -> bool {
        if self.edit.as_ref().is_some_and(EditSession::is_saving) {
            return false;
        }
        self.edit = None;
        true
    }

    fn reload_outcome(&mut self) -> MutationOutcome {
        match self.start_load() {
            Some(reload) => MutationOutcome::Completed { reload },
            None => MutationOutcome::Ignored,
        }
    }

    pub fn load<S>(&mut self, source: &mut S) -> bool
    where
        S: ResourceSource<R> + ?Sized,
    {
        let Some(ticket) = self.start_load() else {
            return false;
        };
        let result = source.fetch();
        self.finish_load(ticket, result)
    }

    pub fn confirm_delete<S>(&mut self, source: &mut S) -> MutationOutcome
    where
        S: ResourceSource<R> + ?Sized,
    {
        let Some(request) = self.start_delete() else {
            return MutationOutcome::Ignored;
        };
        let result = source.delete(&request.id);
        let outcome = self.finish_delete(request.ticket, result);
        self.run_reload(&outcome, source);
        outcome
    }

    pub fn save_draft<S>(&mut self, source: &mut S) -> Result<MutationOutcome, AdminError>
    where
        S: ResourceSource<R> + ?Sized,
    {
        let Some(request) = self.start_save()? else {
            return Ok(MutationOutcome::Ignored);
        };
        let result = source.update(&request.id, &request.draft);
        let outcome = self.finish_save(request.ticket, result);
        self.run_reload(&outcome, source);
        Ok(outcome)
    }

    fn run_reload<S>(&mut self, outcome: &MutationOutcome, source: &mut S)
    where
        S: ResourceSource<R> + ?Sized,
    {
        if let MutationOutcome::Completed { reload } = outcome {
            let result = source.fetch();
            self.finish_load(*reload, result);
        }
    }
}

fn dedupe_by_id<R: Resource>(rows: Vec<R>) -> Vec<R> {
    let received = rows.len();
    let mut seen = HashSet::with_capacity(received);
    let rows: Vec<R> = rows
        .into_iter()
        .filter(|row| seen.insert(row.id().clone()))
        .collect();
    if rows.len() != received {
        warn!(
            resource = R::PLURAL,
            dropped = received - rows.len(),
            "dropped rows with duplicate ids"
        );
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::{
        LoadState, MutationOutcome, PAGE_SIZE_OPTIONS, PageWindow, ResourceTable,
        validate_page_size,
    };
    use crate::{AdminError, Article, ArticleEdit, ArticleId, Comment, CommentId};

    fn article(id: usize) -> Article {
        Article {
            id: ArticleId::new(format!("a{id}")),
            title: format!("Article {id}"),
            content: "Body".to_owned(),
            is_published: false,
            created_at: None,
            author: None,
            tags: Vec::new(),
            counts: None,
        }
    }

    fn ready_table(len: usize) -> ResourceTable<Article> {
        let mut table = ResourceTable::default();
        let ticket = table.start_load().expect("fresh table should load");
        assert!(table.finish_load(ticket, Ok((0..len).map(article).collect())));
        table
    }

    #[test]
    fn fresh_table_starts_loading() {
        let table = ResourceTable::<Article>::default();
        assert_eq!(table.load_state(), &LoadState::Loading);
        assert!(table.rows().is_empty());
    }

    #[test]
    fn last_page_of_twenty_three_rows_has_three() {
        let mut table = ready_table(23);
        table.set_page(2);
        let ids: Vec<_> = table
            .visible_rows()
            .iter()
            .map(|row| row.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a20", "a21", "a22"]);
        assert_eq!(table.page_count(), 3);
    }

    #[test]
    fn out_of_range_page_yields_empty_slice() {
        let mut table = ready_table(23);
        table.set_page(7);
        assert!(table.visible_rows().is_empty());
        table.set_page(usize::MAX);
        assert!(table.visible_rows().is_empty());
    }

    #[test]
    fn page_size_change_resets_page_index() {
        let mut table = ready_table(40);
        table.set_page(2);
        table.set_page_size(25).expect("25 is allowed");
        assert_eq!(table.window().page_index(), 0);
        assert_eq!(table.window().page_size(), 25);
        assert_eq!(table.visible_rows().len(), 25);
    }

    #[test]
    fn page_size_outside_allowed_set_is_rejected() {
        let mut window = PageWindow::default();
        window.set_page(3);
        let error = window.set_page_size(7).expect_err("7 is not allowed");
        assert_eq!(error.violations()[0].field, "page_size");
        assert_eq!(window.page_index(), 3);
        assert_eq!(window.page_size(), 10);

        for size in PAGE_SIZE_OPTIONS {
            assert!(validate_page_size(size).is_ok());
        }
        assert!(PageWindow::new(0).is_err());
    }

    #[test]
    fn superseded_load_reply_is_discarded() {
        let mut table = ResourceTable::<Article>::default();
        let first = table.start_load().expect("first load");
        let second = table.start_load().expect("second load");

        assert!(table.finish_load(second, Ok(vec![article(2)])));
        assert!(!table.finish_load(first, Ok(vec![article(1)])));
        assert_eq!(table.rows(), &[article(2)]);
        assert_eq!(table.load_state(), &LoadState::Ready);
    }

    #[test]
    fn disposed_table_ignores_replies() {
        let mut table = ResourceTable::<Article>::default();
        let ticket = table.start_load().expect("load");
        table.dispose();
        assert!(!table.finish_load(ticket, Ok(vec![article(1)])));
        assert!(table.rows().is_empty());
        assert!(table.start_load().is_none());
    }

    #[test]
    fn tickets_from_another_table_are_ignored() {
        let mut old = ResourceTable::<Article>::default();
        let stale = old.start_load().expect("load");
        let mut fresh = ResourceTable::<Article>::default();
        fresh.start_load().expect("load");
        assert_ne!(stale.table(), fresh.table_id());
        assert!(!fresh.finish_load(stale, Ok(vec![article(1)])));
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let mut table = ResourceTable::<Article>::default();
        let ticket = table.start_load().expect("load");
        let mut duplicate = article(1);
        duplicate.title = "Duplicate".to_owned();
        table.finish_load(ticket, Ok(vec![article(1), article(2), duplicate]));
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[0].title, "Article 1");
    }

    #[test]
    fn shape_and_transport_failures_map_to_messages() {
        let mut table = ready_table(3);
        let ticket = table.start_load().expect("load");
        table.finish_load(ticket, Err(AdminError::Shape));
        assert!(table.rows().is_empty());
        assert_eq!(
            table.load_state(),
            &LoadState::Failed("Unexpected data format from API".to_owned())
        );

        let ticket = table.start_load().expect("load");
        table.finish_load(ticket, Err(AdminError::transport("connection refused")));
        assert_eq!(
            table.load_state(),
            &LoadState::Failed("Failed to load articles".to_owned())
        );
    }

    #[test]
    fn view_selection_is_independent_of_other_selections() {
        let mut table = ready_table(2);
        table.begin_view(article(0));
        assert!(table.begin_delete(article(1).id));
        assert!(table.begin_edit(&article(1)));

        table.end_view();
        assert!(table.viewing().is_none());
        assert!(table.pending_delete().is_some());
        assert!(table.edit().is_some());
    }

    #[test]
    fn duplicate_delete_submission_is_a_no_op() {
        let mut table = ready_table(2);
        table.begin_delete(article(0).id);
        let request = table.start_delete().expect("first submission");
        assert!(table.start_delete().is_none());
        assert!(!table.cancel_delete());
        assert!(!table.begin_delete(article(1).id));

        let outcome = table.finish_delete(request.ticket, Ok(()));
        assert!(matches!(outcome, MutationOutcome::Completed { .. }));
        assert!(table.pending_delete().is_none());
        assert!(table.is_loading());
    }

    #[test]
    fn edit_is_refused_for_read_only_resources() {
        let mut table = ResourceTable::<Comment>::default();
        let comment = Comment {
            id: CommentId::new("c1"),
            content: "hi".to_owned(),
            created_at: None,
            user: None,
            article_id: None,
            article_title: None,
        };
        assert!(!table.begin_edit(&comment));
        assert!(table.edit().is_none());
    }

    #[test]
    fn draft_is_frozen_while_saving() {
        let mut table = ready_table(1);
        table.begin_edit(&article(0));
        let request = table
            .start_save()
            .expect("valid draft")
            .expect("first submission");
        assert!(!table.update_draft(ArticleEdit::Title("Changed".to_owned())));
        assert!(table.start_save().expect("no validation").is_none());
        assert!(!table.cancel_edit());
        assert_eq!(request.draft.title, "Article 0");

        let outcome = table.finish_save(request.ticket, Err(AdminError::transport("boom")));
        assert!(matches!(outcome, MutationOutcome::Failed(_)));
        let session = table.edit().expect("edit stays open");
        assert_eq!(
            session.error.as_deref(),
            Some("Failed to save article. Please try again.")
        );
        assert!(table.update_draft(ArticleEdit::Title("Changed".to_owned())));
    }
}
