// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use microblog_app::{
    AdminError, AppCommand, AppEvent, AppState, Article, ArticleDraft, ArticleEdit, ArticleId,
    Comment, CommentId, DashboardStats, Draft, LoadState, LoginInput, MutationOutcome,
    PAGE_SIZE_OPTIONS, PageWindow, ReadOnly, Resource, ResourceTable, Screen, Session, Ticket,
    User, UserDraft, UserEdit, UserId, created_on, format_tag_list, parse_tag_list,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendRequest {
    SignIn(LoginInput),
    LoadDashboard,
    LoadUsers,
    UpdateUser(UserId, UserDraft),
    DeleteUser(UserId),
    LoadArticles,
    UpdateArticle(ArticleId, ArticleDraft),
    DeleteArticle(ArticleId),
    LoadComments,
    DeleteComment(CommentId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendReply {
    SignedIn(Result<Session, AdminError>),
    Dashboard(Result<DashboardStats, AdminError>),
    Users(Result<Vec<User>, AdminError>),
    Articles(Result<Vec<Article>, AdminError>),
    Comments(Result<Vec<Comment>, AdminError>),
    Mutation(Result<(), AdminError>),
    /// The request never ran.
    Failed(AdminError),
}

/// Where a reply must be applied. Replies whose target is no longer current
/// are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTarget {
    Login { request_id: u64 },
    Dashboard { request_id: u64 },
    Load(Ticket),
    Delete(Ticket),
    Save(Ticket),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Backend {
        target: ReplyTarget,
        reply: BackendReply,
    },
}

pub trait AdminRuntime {
    /// Runs one request to completion on the calling thread.
    fn execute(&mut self, session: Option<&Session>, request: BackendRequest) -> BackendReply;

    /// Forgets any persisted session.
    fn sign_out(&mut self) -> Result<()>;

    fn spawn_request(
        &mut self,
        session: Option<Session>,
        target: ReplyTarget,
        request: BackendRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let reply = self.execute(session.as_ref(), request);
        tx.send(InternalEvent::Backend { target, reply })
            .map_err(|_| anyhow::anyhow!("backend event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiOptions {
    pub page_size: usize,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            page_size: microblog_app::DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Toggle,
    Choice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSpec {
    label: &'static str,
    kind: FieldKind,
}

const USER_FIELDS: [FieldSpec; 4] = [
    FieldSpec {
        label: "Name",
        kind: FieldKind::Text,
    },
    FieldSpec {
        label: "Email",
        kind: FieldKind::Text,
    },
    FieldSpec {
        label: "Role",
        kind: FieldKind::Choice,
    },
    FieldSpec {
        label: "Verified",
        kind: FieldKind::Toggle,
    },
];

const ARTICLE_FIELDS: [FieldSpec; 4] = [
    FieldSpec {
        label: "Title",
        kind: FieldKind::Text,
    },
    FieldSpec {
        label: "Content",
        kind: FieldKind::Text,
    },
    FieldSpec {
        label: "Published",
        kind: FieldKind::Toggle,
    },
    FieldSpec {
        label: "Tags",
        kind: FieldKind::Text,
    },
];

/// Presentation and backend wiring for one manageable resource.
trait TableScreen: Resource + Sized {
    const TITLE: &'static str;
    const COLUMNS: &'static [&'static str];
    const FIELDS: &'static [FieldSpec];

    fn into_active(view: TableView<Self>) -> ActiveTable;
    fn load_request() -> BackendRequest;
    fn delete_request(id: Self::Id) -> BackendRequest;
    fn save_request(id: Self::Id, draft: Self::Draft) -> BackendRequest;
    fn rows_from(reply: BackendReply) -> Option<Result<Vec<Self>, AdminError>>;
    fn cells(&self) -> Vec<String>;
    fn detail_lines(&self) -> Vec<String>;
    fn field_text(draft: &Self::Draft, index: usize) -> String;
    fn text_edit(index: usize, text: &str) -> Option<<Self::Draft as Draft>::Edit>;
    fn toggle_edit(draft: &Self::Draft, index: usize) -> Option<<Self::Draft as Draft>::Edit>;
}

impl TableScreen for User {
    const TITLE: &'static str = "Users";
    const COLUMNS: &'static [&'static str] = &["Name", "Email", "Role", "Verified", "Joined"];
    const FIELDS: &'static [FieldSpec] = &USER_FIELDS;

    fn into_active(view: TableView<Self>) -> ActiveTable {
        ActiveTable::Users(view)
    }

    fn load_request() -> BackendRequest {
        BackendRequest::LoadUsers
    }

    fn delete_request(id: UserId) -> BackendRequest {
        BackendRequest::DeleteUser(id)
    }

    fn save_request(id: UserId, draft: UserDraft) -> BackendRequest {
        BackendRequest::UpdateUser(id, draft)
    }

    fn rows_from(reply: BackendReply) -> Option<Result<Vec<Self>, AdminError>> {
        match reply {
            BackendReply::Users(result) => Some(result),
            BackendReply::Failed(error) => Some(Err(error)),
            _ => None,
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.email.clone(),
            self.role.label().to_owned(),
            yes_no(self.is_verified).to_owned(),
            format_date(created_on(self.created_at)),
        ]
    }

    fn detail_lines(&self) -> Vec<String> {
        vec![
            format!("Name:     {}", self.name),
            format!("Email:    {}", self.email),
            format!("Role:     {}", self.role.label()),
            format!("Verified: {}", yes_no(self.is_verified)),
            format!("Joined:   {}", format_date(created_on(self.created_at))),
            format!("Id:       {}", self.id),
        ]
    }

    fn field_text(draft: &UserDraft, index: usize) -> String {
        match index {
            0 => draft.name.clone(),
            1 => draft.email.clone(),
            2 => draft.role.label().to_owned(),
            3 => yes_no(draft.is_verified).to_owned(),
            _ => String::new(),
        }
    }

    fn text_edit(index: usize, text: &str) -> Option<UserEdit> {
        match index {
            0 => Some(UserEdit::Name(text.to_owned())),
            1 => Some(UserEdit::Email(text.to_owned())),
            _ => None,
        }
    }

    fn toggle_edit(draft: &UserDraft, index: usize) -> Option<UserEdit> {
        match index {
            2 => Some(UserEdit::Role(draft.role.cycle())),
            3 => Some(UserEdit::Verified(!draft.is_verified)),
            _ => None,
        }
    }
}

impl TableScreen for Article {
    const TITLE: &'static str = "Articles";
    const COLUMNS: &'static [&'static str] =
        &["Title", "Author", "Status", "Comments", "Tags", "Created"];
    const FIELDS: &'static [FieldSpec] = &ARTICLE_FIELDS;

    fn into_active(view: TableView<Self>) -> ActiveTable {
        ActiveTable::Articles(view)
    }

    fn load_request() -> BackendRequest {
        BackendRequest::LoadArticles
    }

    fn delete_request(id: ArticleId) -> BackendRequest {
        BackendRequest::DeleteArticle(id)
    }

    fn save_request(id: ArticleId, draft: ArticleDraft) -> BackendRequest {
        BackendRequest::UpdateArticle(id, draft)
    }

    fn rows_from(reply: BackendReply) -> Option<Result<Vec<Self>, AdminError>> {
        match reply {
            BackendReply::Articles(result) => Some(result),
            BackendReply::Failed(error) => Some(Err(error)),
            _ => None,
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            truncate_label(&self.title, 40),
            self.author_name().to_owned(),
            self.status_label().to_owned(),
            self.comment_count().to_string(),
            truncate_label(&format_tag_list(&self.tags), 24),
            format_date(created_on(self.created_at)),
        ]
    }

    fn detail_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Title:    {}", self.title),
            format!("Author:   {}", self.author_name()),
            format!("Status:   {}", self.status_label()),
            format!("Tags:     {}", format_tag_list(&self.tags)),
            format!("Comments: {}", self.comment_count()),
            format!("Created:  {}", format_date(created_on(self.created_at))),
            String::new(),
        ];
        lines.extend(self.content.lines().map(str::to_owned));
        lines
    }

    fn field_text(draft: &ArticleDraft, index: usize) -> String {
        match index {
            0 => draft.title.clone(),
            1 => draft.content.clone(),
            2 => yes_no(draft.is_published).to_owned(),
            3 => format_tag_list(&draft.tags),
            _ => String::new(),
        }
    }

    fn text_edit(index: usize, text: &str) -> Option<ArticleEdit> {
        match index {
            0 => Some(ArticleEdit::Title(text.to_owned())),
            1 => Some(ArticleEdit::Content(text.to_owned())),
            3 => Some(ArticleEdit::Tags(parse_tag_list(text))),
            _ => None,
        }
    }

    fn toggle_edit(draft: &ArticleDraft, index: usize) -> Option<ArticleEdit> {
        (index == 2).then_some(ArticleEdit::Published(!draft.is_published))
    }
}

impl TableScreen for Comment {
    const TITLE: &'static str = "Comments";
    const COLUMNS: &'static [&'static str] = &["Comment", "Author", "Article", "Created"];
    const FIELDS: &'static [FieldSpec] = &[];

    fn into_active(view: TableView<Self>) -> ActiveTable {
        ActiveTable::Comments(view)
    }

    fn load_request() -> BackendRequest {
        BackendRequest::LoadComments
    }

    fn delete_request(id: CommentId) -> BackendRequest {
        BackendRequest::DeleteComment(id)
    }

    fn save_request(_id: CommentId, draft: ReadOnly) -> BackendRequest {
        match draft {}
    }

    fn rows_from(reply: BackendReply) -> Option<Result<Vec<Self>, AdminError>> {
        match reply {
            BackendReply::Comments(result) => Some(result),
            BackendReply::Failed(error) => Some(Err(error)),
            _ => None,
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            truncate_label(&self.content, 48),
            self.author_name().to_owned(),
            truncate_label(self.article_label(), 32),
            format_date(created_on(self.created_at)),
        ]
    }

    fn detail_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Author:  {}", self.author_name()),
            format!("Article: {}", self.article_label()),
            format!("Created: {}", format_date(created_on(self.created_at))),
            String::new(),
        ];
        lines.extend(self.content.lines().map(str::to_owned));
        lines
    }

    fn field_text(draft: &ReadOnly, _index: usize) -> String {
        match *draft {}
    }

    fn text_edit(_index: usize, _text: &str) -> Option<ReadOnly> {
        None
    }

    fn toggle_edit(draft: &ReadOnly, _index: usize) -> Option<ReadOnly> {
        match *draft {}
    }
}

fn format_date(date: Option<impl std::fmt::Display>) -> String {
    date.map_or_else(|| "-".to_owned(), |date| date.to_string())
}

#[derive(Debug)]
struct TableView<R: Resource> {
    table: ResourceTable<R>,
    cursor: usize,
    edit_field: usize,
    field_text: Vec<String>,
}

impl<R: TableScreen> TableView<R> {
    fn new(options: UiOptions) -> Self {
        Self {
            table: ResourceTable::new(PageWindow::new(options.page_size).unwrap_or_default()),
            cursor: 0,
            edit_field: 0,
            field_text: Vec::new(),
        }
    }

    fn selected(&self) -> Option<&R> {
        if self.table.load_state() != &LoadState::Ready {
            return None;
        }
        self.table.visible_rows().get(self.cursor)
    }

    fn clamp(&mut self) {
        let pages = self.table.page_count();
        if pages > 0 && self.table.window().page_index() >= pages {
            self.table.set_page(pages - 1);
        }
        let visible = self.table.visible_rows().len();
        self.cursor = self.cursor.min(visible.saturating_sub(1));
    }

    fn start_load(&mut self) -> Vec<TableAction> {
        self.table
            .start_load()
            .map(|ticket| TableAction::Request(ReplyTarget::Load(ticket), R::load_request()))
            .into_iter()
            .collect()
    }
}

#[derive(Debug)]
enum ActiveTable {
    Users(TableView<User>),
    Articles(TableView<Article>),
    Comments(TableView<Comment>),
}

macro_rules! with_table {
    ($active:expr, $view:ident => $body:expr) => {
        match $active {
            ActiveTable::Users($view) => $body,
            ActiveTable::Articles($view) => $body,
            ActiveTable::Comments($view) => $body,
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TableAction {
    Status(String),
    Request(ReplyTarget, BackendRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LoginField {
    #[default]
    Email,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct LoginForm {
    email: String,
    password: String,
    focus: LoginField,
    error: Option<String>,
    submitting: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct DashboardView {
    stats: Option<DashboardStats>,
    error: Option<String>,
    loading: Option<u64>,
}

#[derive(Debug, Default)]
struct ViewData {
    options: UiOptions,
    login: LoginForm,
    dashboard: DashboardView,
    table: Option<ActiveTable>,
    help_visible: bool,
    status_token: u64,
    request_seq: u64,
}

impl ViewData {
    fn new(options: UiOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    fn next_request_id(&mut self) -> u64 {
        self.request_seq = self.request_seq.wrapping_add(1);
        self.request_seq
    }
}

pub fn run_app<R: AdminRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    options: UiOptions,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(options);
    let (internal_tx, internal_rx) = mpsc::channel();
    enter_screen(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(false) => {}
            Ok(true) => match event::read().context("read event") {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            },
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    if let Some(active) = view_data.table.as_mut() {
        with_table!(active, view => view.table.dispose());
    }
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AdminRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Backend { target, reply } => {
                apply_backend_reply(state, runtime, view_data, tx, target, reply);
            }
        }
    }
}

fn apply_backend_reply<R: AdminRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    target: ReplyTarget,
    reply: BackendReply,
) {
    match target {
        ReplyTarget::Login { request_id } => {
            if view_data.login.submitting != Some(request_id) {
                debug!(request_id, "dropping stale login reply");
                return;
            }
            view_data.login.submitting = None;
            let result = match reply {
                BackendReply::SignedIn(result) => result,
                BackendReply::Failed(error) => Err(error),
                other => {
                    warn!(?other, "unexpected reply to sign-in");
                    return;
                }
            };
            match result {
                Ok(session) => {
                    view_data.login = LoginForm::default();
                    dispatch_command(state, runtime, view_data, tx, AppCommand::SignIn(session));
                }
                Err(error) => {
                    view_data.login.error = Some(error.to_string());
                }
            }
        }
        ReplyTarget::Dashboard { request_id } => {
            if view_data.dashboard.loading != Some(request_id) {
                debug!(request_id, "dropping stale dashboard reply");
                return;
            }
            view_data.dashboard.loading = None;
            match reply {
                BackendReply::Dashboard(Ok(stats)) => {
                    view_data.dashboard.stats = Some(stats);
                    view_data.dashboard.error = None;
                }
                BackendReply::Dashboard(Err(error)) | BackendReply::Failed(error) => {
                    view_data.dashboard.stats = None;
                    view_data.dashboard.error = Some(error.to_string());
                }
                other => warn!(?other, "unexpected reply to dashboard load"),
            }
        }
        ReplyTarget::Load(_) | ReplyTarget::Delete(_) | ReplyTarget::Save(_) => {
            let actions = match view_data.table.as_mut() {
                Some(active) => with_table!(active, view => apply_table_reply(view, target, reply)),
                None => Vec::new(),
            };
            run_actions(state, runtime, view_data, tx, actions);
        }
    }
}

fn apply_table_reply<R: TableScreen>(
    view: &mut TableView<R>,
    target: ReplyTarget,
    reply: BackendReply,
) -> Vec<TableAction> {
    match target {
        ReplyTarget::Load(ticket) => {
            let Some(result) = R::rows_from(reply) else {
                return Vec::new();
            };
            if view.table.finish_load(ticket, result) {
                view.clamp();
            }
            Vec::new()
        }
        ReplyTarget::Delete(ticket) => {
            let Some(result) = mutation_result(reply) else {
                return Vec::new();
            };
            let outcome = view.table.finish_delete(ticket, result);
            mutation_actions::<R>(outcome, "deleted")
        }
        ReplyTarget::Save(ticket) => {
            let Some(result) = mutation_result(reply) else {
                return Vec::new();
            };
            let outcome = view.table.finish_save(ticket, result);
            if view.table.edit().is_none() {
                view.field_text.clear();
            }
            mutation_actions::<R>(outcome, "saved")
        }
        ReplyTarget::Login { .. } | ReplyTarget::Dashboard { .. } => Vec::new(),
    }
}

fn mutation_result(reply: BackendReply) -> Option<Result<(), AdminError>> {
    match reply {
        BackendReply::Mutation(result) => Some(result),
        BackendReply::Failed(error) => Some(Err(error)),
        _ => None,
    }
}

fn mutation_actions<R: TableScreen>(outcome: MutationOutcome, verb: &str) -> Vec<TableAction> {
    match outcome {
        MutationOutcome::Completed { reload } => vec![
            TableAction::Status(format!("{verb} {}", R::SINGULAR)),
            TableAction::Request(ReplyTarget::Load(reload), R::load_request()),
        ],
        MutationOutcome::Failed(error) => {
            vec![TableAction::Status(format!("{} error: {error}", R::SINGULAR))]
        }
        MutationOutcome::Ignored => Vec::new(),
    }
}

fn run_actions<R: AdminRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    actions: Vec<TableAction>,
) {
    for action in actions {
        match action {
            TableAction::Status(message) => emit_status(state, view_data, tx, message),
            TableAction::Request(target, request) => {
                spawn_backend(state, runtime, tx, target, request);
            }
        }
    }
}

fn spawn_backend<R: AdminRuntime>(
    state: &AppState,
    runtime: &mut R,
    tx: &Sender<InternalEvent>,
    target: ReplyTarget,
    request: BackendRequest,
) {
    debug!(?target, "dispatching backend request");
    if let Err(error) = runtime.spawn_request(state.session.clone(), target, request, tx.clone()) {
        warn!(%error, "backend request did not start");
        let reply = BackendReply::Failed(AdminError::transport(format!("{error:#}")));
        let _ = tx.send(InternalEvent::Backend { target, reply });
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn dispatch_command<R: AdminRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let events = state.dispatch(command);
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::ScreenChanged { .. }))
    {
        enter_screen(state, runtime, view_data, tx);
    }
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(tx, view_data.status_token);
    }
}

/// Disposes the previous screen's controller and starts loading the current
/// screen.
fn enter_screen<R: AdminRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    if let Some(mut previous) = view_data.table.take() {
        with_table!(&mut previous, view => view.table.dispose());
    }
    view_data.dashboard.loading = None;

    let actions = match state.screen {
        Screen::Login => Vec::new(),
        Screen::Dashboard => {
            let request_id = view_data.next_request_id();
            view_data.dashboard.loading = Some(request_id);
            vec![TableAction::Request(
                ReplyTarget::Dashboard { request_id },
                BackendRequest::LoadDashboard,
            )]
        }
        Screen::Users => open_table::<User>(view_data),
        Screen::Articles => open_table::<Article>(view_data),
        Screen::Comments => open_table::<Comment>(view_data),
    };
    run_actions(state, runtime, view_data, tx, actions);
}

fn open_table<R: TableScreen>(view_data: &mut ViewData) -> Vec<TableAction> {
    let mut view = TableView::<R>::new(view_data.options);
    let actions = view.start_load();
    view_data.table = Some(R::into_active(view));
    actions
}

fn handle_key_event<R: AdminRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    if state.screen == Screen::Login {
        handle_login_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if let Some(active) = view_data.table.as_mut()
        && let Some(actions) = with_table!(active, view => handle_table_key(view, key))
    {
        run_actions(state, runtime, view_data, internal_tx, actions);
        return false;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Tab, _) => {
            dispatch_command(state, runtime, view_data, internal_tx, AppCommand::NextScreen);
        }
        (KeyCode::BackTab, _) => {
            dispatch_command(state, runtime, view_data, internal_tx, AppCommand::PrevScreen);
        }
        (KeyCode::Char('l'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            sign_out(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char(digit @ '1'..='4'), KeyModifiers::NONE) => {
            let index = digit as usize - '1' as usize;
            if let Some(screen) = Screen::SIGNED_IN.get(index) {
                dispatch_command(
                    state,
                    runtime,
                    view_data,
                    internal_tx,
                    AppCommand::Open(*screen),
                );
            }
        }
        (KeyCode::Char('r'), KeyModifiers::NONE) if state.screen == Screen::Dashboard => {
            enter_screen(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('?'), _) => {
            view_data.help_visible = true;
        }
        _ => {}
    }
    false
}

fn sign_out<R: AdminRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    if let Err(error) = runtime.sign_out() {
        warn!(error = %format!("{error:#}"), "could not clear persisted session");
    }
    view_data.dashboard = DashboardView::default();
    view_data.login = LoginForm::default();
    dispatch_command(state, runtime, view_data, tx, AppCommand::SignOut);
}

fn handle_login_key<R: AdminRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if key.code == KeyCode::Enter {
        submit_login(state, runtime, view_data, tx);
        return;
    }

    let login = &mut view_data.login;
    match key.code {
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            login.focus = match login.focus {
                LoginField::Email => LoginField::Password,
                LoginField::Password => LoginField::Email,
            };
        }
        KeyCode::Backspace if login.submitting.is_none() => {
            login_text_mut(login).pop();
        }
        KeyCode::Char(ch)
            if login.submitting.is_none() && !key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            login_text_mut(login).push(ch);
        }
        _ => {}
    }
}

fn login_text_mut(login: &mut LoginForm) -> &mut String {
    match login.focus {
        LoginField::Email => &mut login.email,
        LoginField::Password => &mut login.password,
    }
}

fn submit_login<R: AdminRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    if view_data.login.submitting.is_some() {
        return;
    }
    let input = LoginInput {
        email: view_data.login.email.clone(),
        password: view_data.login.password.clone(),
    };
    if let Err(error) = input.validate() {
        view_data.login.error = Some(error.to_string());
        return;
    }

    let request_id = view_data.next_request_id();
    view_data.login.error = None;
    view_data.login.submitting = Some(request_id);
    spawn_backend(
        state,
        runtime,
        tx,
        ReplyTarget::Login { request_id },
        BackendRequest::SignIn(input),
    );
}

/// Returns `None` when the key is not a table key, so global bindings apply.
fn handle_table_key<R: TableScreen>(
    view: &mut TableView<R>,
    key: KeyEvent,
) -> Option<Vec<TableAction>> {
    if view.table.edit().is_some() {
        return Some(handle_edit_key(view, key));
    }
    if view.table.pending_delete().is_some() {
        return Some(handle_delete_key(view, key));
    }
    if view.table.viewing().is_some() {
        return Some(handle_view_key(view, key));
    }

    let actions = match (key.code, key.modifiers) {
        (KeyCode::Char('j') | KeyCode::Down, _) => {
            let visible = view.table.visible_rows().len();
            if view.cursor + 1 < visible {
                view.cursor += 1;
            }
            Vec::new()
        }
        (KeyCode::Char('k') | KeyCode::Up, _) => {
            view.cursor = view.cursor.saturating_sub(1);
            Vec::new()
        }
        (KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown, _) => {
            let page = view.table.window().page_index();
            if page + 1 < view.table.page_count() {
                view.table.set_page(page + 1);
                view.cursor = 0;
            }
            Vec::new()
        }
        (KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp, _) => {
            let page = view.table.window().page_index();
            if page > 0 {
                view.table.set_page(page - 1);
                view.cursor = 0;
            }
            Vec::new()
        }
        (KeyCode::Char('+' | '='), _) => change_page_size(view, 1),
        (KeyCode::Char('-'), _) => change_page_size(view, -1),
        (KeyCode::Enter | KeyCode::Char('v'), _) => {
            if let Some(record) = view.selected().cloned() {
                view.table.begin_view(record);
            }
            Vec::new()
        }
        (KeyCode::Char('e'), KeyModifiers::NONE) => begin_edit(view),
        (KeyCode::Char('d'), KeyModifiers::NONE) => begin_delete(view),
        (KeyCode::Char('r'), KeyModifiers::NONE) => view.start_load(),
        _ => return None,
    };
    Some(actions)
}

fn change_page_size<R: TableScreen>(view: &mut TableView<R>, delta: isize) -> Vec<TableAction> {
    let current = view.table.window().page_size();
    let index = PAGE_SIZE_OPTIONS
        .iter()
        .position(|size| *size == current)
        .unwrap_or(0) as isize;
    let len = PAGE_SIZE_OPTIONS.len() as isize;
    let next = PAGE_SIZE_OPTIONS[(index + delta).rem_euclid(len) as usize];
    match view.table.set_page_size(next) {
        Ok(()) => {
            view.cursor = 0;
            vec![TableAction::Status(format!("{next} rows per page"))]
        }
        Err(error) => vec![TableAction::Status(error.to_string())],
    }
}

fn begin_edit<R: TableScreen>(view: &mut TableView<R>) -> Vec<TableAction> {
    let Some(record) = view.selected().cloned() else {
        return Vec::new();
    };
    if !view.table.begin_edit(&record) {
        return vec![TableAction::Status(format!("{} are read-only", R::PLURAL))];
    }
    view.edit_field = 0;
    view.field_text = match view.table.edit() {
        Some(session) => (0..R::FIELDS.len())
            .map(|index| R::field_text(&session.draft, index))
            .collect(),
        None => Vec::new(),
    };
    Vec::new()
}

fn begin_delete<R: TableScreen>(view: &mut TableView<R>) -> Vec<TableAction> {
    if let Some(id) = view.selected().map(|record| record.id().clone()) {
        view.table.begin_delete(id);
    }
    Vec::new()
}

fn handle_view_key<R: TableScreen>(view: &mut TableView<R>, key: KeyEvent) -> Vec<TableAction> {
    match key.code {
        KeyCode::Esc | KeyCode::Enter | KeyCode::Char('v') => view.table.end_view(),
        KeyCode::Char('e') => {
            view.table.end_view();
            return begin_edit(view);
        }
        KeyCode::Char('d') => {
            view.table.end_view();
            return begin_delete(view);
        }
        _ => {}
    }
    Vec::new()
}

fn handle_delete_key<R: TableScreen>(view: &mut TableView<R>, key: KeyEvent) -> Vec<TableAction> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => match view.table.start_delete() {
            Some(request) => vec![TableAction::Request(
                ReplyTarget::Delete(request.ticket),
                R::delete_request(request.id),
            )],
            None => Vec::new(),
        },
        KeyCode::Char('n') | KeyCode::Esc => {
            if view.table.cancel_delete() {
                Vec::new()
            } else {
                vec![TableAction::Status("delete in progress".to_owned())]
            }
        }
        _ => Vec::new(),
    }
}

fn handle_edit_key<R: TableScreen>(view: &mut TableView<R>, key: KeyEvent) -> Vec<TableAction> {
    let saving = view.table.edit().is_some_and(|session| session.is_saving());
    let field_count = R::FIELDS.len();

    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            if view.table.cancel_edit() {
                view.field_text.clear();
                Vec::new()
            } else {
                vec![TableAction::Status("save in progress".to_owned())]
            }
        }
        (KeyCode::Char('s'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            match view.table.start_save() {
                Ok(Some(request)) => vec![TableAction::Request(
                    ReplyTarget::Save(request.ticket),
                    R::save_request(request.id, request.draft),
                )],
                Ok(None) => Vec::new(),
                Err(error) => vec![TableAction::Status(error.to_string())],
            }
        }
        (KeyCode::Tab | KeyCode::Down | KeyCode::Enter, _) if field_count > 0 => {
            view.edit_field = (view.edit_field + 1) % field_count;
            Vec::new()
        }
        (KeyCode::BackTab | KeyCode::Up, _) if field_count > 0 => {
            view.edit_field = (view.edit_field + field_count - 1) % field_count;
            Vec::new()
        }
        _ if saving => Vec::new(),
        (KeyCode::Backspace, _) => {
            edit_text(view, |text| {
                text.pop();
            });
            Vec::new()
        }
        (KeyCode::Char(' '), _) if focused_kind::<R>(view) != Some(FieldKind::Text) => {
            let edit = view
                .table
                .edit()
                .and_then(|session| R::toggle_edit(&session.draft, view.edit_field));
            if let Some(edit) = edit {
                view.table.update_draft(edit);
                refresh_field_text(view);
            }
            Vec::new()
        }
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            edit_text(view, |text| text.push(ch));
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn focused_kind<R: TableScreen>(view: &TableView<R>) -> Option<FieldKind> {
    R::FIELDS.get(view.edit_field).map(|field| field.kind)
}

fn edit_text<R: TableScreen>(view: &mut TableView<R>, change: impl FnOnce(&mut String)) {
    if focused_kind::<R>(view) != Some(FieldKind::Text) {
        return;
    }
    let index = view.edit_field;
    let Some(text) = view.field_text.get_mut(index) else {
        return;
    };
    change(text);
    if let Some(edit) = R::text_edit(index, text) {
        view.table.update_draft(edit);
    }
}

fn refresh_field_text<R: TableScreen>(view: &mut TableView<R>) {
    let index = view.edit_field;
    let value = view
        .table
        .edit()
        .map(|session| R::field_text(&session.draft, index));
    if let (Some(value), Some(slot)) = (value, view.field_text.get_mut(index)) {
        *slot = value;
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    if state.is_signed_in() {
        let selected = Screen::SIGNED_IN
            .iter()
            .position(|screen| *screen == state.screen)
            .unwrap_or(0);
        let titles = Screen::SIGNED_IN
            .iter()
            .map(|screen| screen.label().to_owned())
            .collect::<Vec<String>>();
        let tabs = Tabs::new(titles)
            .block(
                Block::default()
                    .title("microblog admin")
                    .borders(Borders::ALL),
            )
            .style(Style::default().fg(Color::White))
            .highlight_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .select(selected);
        frame.render_widget(tabs, layout[0]);
    } else {
        let header = Paragraph::new("sign in with an admin account").block(
            Block::default()
                .title("microblog admin")
                .borders(Borders::ALL),
        );
        frame.render_widget(header, layout[0]);
    }

    match state.screen {
        Screen::Login => render_login(frame, layout[1], &view_data.login),
        Screen::Dashboard => {
            let body = Paragraph::new(render_dashboard_text(state, &view_data.dashboard))
                .block(Block::default().borders(Borders::ALL).title("Dashboard"));
            frame.render_widget(body, layout[1]);
        }
        Screen::Users | Screen::Articles | Screen::Comments => {
            if let Some(active) = &view_data.table {
                with_table!(active, view => render_table(frame, layout[1], view));
            }
        }
    }

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if let Some(active) = &view_data.table {
        with_table!(active, view => render_table_overlays(frame, view));
    }

    if view_data.help_visible {
        let area = centered_rect(76, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_login(frame: &mut ratatui::Frame<'_>, area: Rect, login: &LoginForm) {
    let area = centered_rect(60, 60, area);
    frame.render_widget(Clear, area);
    let form = Paragraph::new(render_login_text(login))
        .wrap(Wrap { trim: false })
        .block(Block::default().title("Admin Login").borders(Borders::ALL));
    frame.render_widget(form, area);
}

fn render_login_text(login: &LoginForm) -> String {
    let marker = |field: LoginField| if login.focus == field { ">" } else { " " };
    let mut lines = vec![
        format!("{} Email:    {}", marker(LoginField::Email), login.email),
        format!(
            "{} Password: {}",
            marker(LoginField::Password),
            "*".repeat(login.password.chars().count())
        ),
        String::new(),
    ];
    if let Some(error) = &login.error {
        lines.push(format!("! {error}"));
        lines.push(String::new());
    }
    if login.submitting.is_some() {
        lines.push("signing in...".to_owned());
    } else {
        lines.push("enter sign in | tab switch field | ctrl+q quit".to_owned());
    }
    lines.join("\n")
}

fn render_dashboard_text(state: &AppState, dashboard: &DashboardView) -> String {
    let mut lines = Vec::new();
    if let Some(session) = &state.session {
        lines.push(format!(
            "Welcome back, {} ({})",
            session.user.name, session.user.role
        ));
        lines.push(String::new());
    }
    if dashboard.loading.is_some() {
        lines.push("loading statistics...".to_owned());
    } else if let Some(error) = &dashboard.error {
        lines.push(format!("Failed to load dashboard statistics: {error}"));
    } else if let Some(stats) = dashboard.stats {
        lines.push(format!("Users:    {}", stats.users));
        lines.push(format!("Articles: {}", stats.articles));
        lines.push(format!("Comments: {}", stats.comments));
    }
    lines.join("\n")
}

fn table_title<R: TableScreen>(view: &TableView<R>) -> String {
    let window = view.table.window();
    let pages = view.table.page_count().max(1);
    format!(
        "{} | page {}/{} | {} per page | {} total",
        R::TITLE,
        window.page_index() + 1,
        pages,
        window.page_size(),
        view.table.rows().len()
    )
}

fn render_table<R: TableScreen>(frame: &mut ratatui::Frame<'_>, area: Rect, view: &TableView<R>) {
    let message = match view.table.load_state() {
        LoadState::Loading => Some((format!("Loading {}...", R::PLURAL), Color::Gray)),
        LoadState::Failed(message) => Some((message.clone(), Color::Red)),
        LoadState::Ready if view.table.rows().is_empty() => {
            Some((format!("No {} found", R::PLURAL), Color::Gray))
        }
        LoadState::Ready => None,
    };
    if let Some((message, color)) = message {
        let body = Paragraph::new(message)
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL).title(R::TITLE));
        frame.render_widget(body, area);
        return;
    }

    let header = Row::new(R::COLUMNS.iter().map(|label| {
        Cell::from(*label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let rows = view
        .table
        .visible_rows()
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let style = if index == view.cursor {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Row::new(record.cells().into_iter().map(Cell::from)).style(style)
        });
    let widths = vec![Constraint::Min(8); R::COLUMNS.len()];
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(view))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn render_table_overlays<R: TableScreen>(frame: &mut ratatui::Frame<'_>, view: &TableView<R>) {
    if let Some(record) = view.table.viewing() {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let mut lines = record.detail_lines();
        lines.push(String::new());
        lines.push("esc close | e edit | d delete".to_owned());
        let detail = Paragraph::new(lines.join("\n"))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(format!("{} details", capitalize(R::SINGULAR)))
                    .borders(Borders::ALL),
            );
        frame.render_widget(detail, area);
    }

    if let Some(session) = view.table.edit() {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let text = render_edit_text::<R>(view, session.error.as_deref(), session.is_saving());
        let form = Paragraph::new(text).wrap(Wrap { trim: false }).block(
            Block::default()
                .title(format!("Edit {}", R::SINGULAR))
                .borders(Borders::ALL),
        );
        frame.render_widget(form, area);
    }

    if let Some(pending) = view.table.pending_delete() {
        let area = centered_rect(50, 30, frame.area());
        frame.render_widget(Clear, area);
        let mut lines = vec![format!(
            "Are you sure you want to delete this {}? This action cannot be undone.",
            R::SINGULAR
        )];
        if let Some(error) = &pending.error {
            lines.push(String::new());
            lines.push(format!("! {error}"));
        }
        lines.push(String::new());
        lines.push(if pending.is_in_flight() {
            "deleting...".to_owned()
        } else {
            "y delete | n cancel".to_owned()
        });
        let confirm = Paragraph::new(lines.join("\n"))
            .wrap(Wrap { trim: false })
            .style(Style::default().fg(Color::Red))
            .block(
                Block::default()
                    .title("Confirm Delete")
                    .borders(Borders::ALL),
            );
        frame.render_widget(confirm, area);
    }
}

fn render_edit_text<R: TableScreen>(
    view: &TableView<R>,
    error: Option<&str>,
    saving: bool,
) -> String {
    let mut lines = R::FIELDS
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let marker = if index == view.edit_field { ">" } else { " " };
            let value = view
                .field_text
                .get(index)
                .map(String::as_str)
                .unwrap_or_default();
            format!("{marker} {:<10} {value}", format!("{}:", field.label))
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    if let Some(error) = error {
        lines.push(format!("! {error}"));
        lines.push(String::new());
    }
    lines.push(if saving {
        "saving...".to_owned()
    } else {
        "tab/shift+tab field | space toggle | ctrl+s save | esc cancel".to_owned()
    });
    lines.join("\n")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let hints = match state.screen {
        Screen::Login => "enter sign in | ctrl+q quit",
        Screen::Dashboard => "tab/shift+tab screens | 1-4 jump | r reload | ctrl+l logout | ? help",
        Screen::Users | Screen::Articles | Screen::Comments => {
            "j/k row | n/p page | +/- size | enter view | e edit | d delete | r reload | ? help"
        }
    };
    match &state.status_line {
        Some(status) => format!("{status} | {hints}"),
        None => hints.to_owned(),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ctrl+l logout | tab/shift+tab screens | 1-4 jump | ? help\n\
table: j/k row | n/p page | +/- rows per page | enter/v view | e edit | d delete | r reload\n\
view: esc close | e edit | d delete\n\
edit: tab/shift+tab field | type to change text | space toggle/cycle | ctrl+s save | esc cancel\n\
delete: y confirm | n cancel\n\
dashboard: r reload"
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate_label(value: &str, max_chars: usize) -> String {
    let single_line = value.lines().next().unwrap_or_default();
    let mut chars = single_line.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() || single_line.len() < value.trim_end().len() {
        format!("{truncated}…")
    } else {
        truncated
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
