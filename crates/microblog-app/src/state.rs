// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Dashboard,
    Users,
    Articles,
    Comments,
}

impl Screen {
    /// Screens reachable once signed in, in navigation order.
    pub const SIGNED_IN: [Self; 4] = [Self::Dashboard, Self::Users, Self::Articles, Self::Comments];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::Dashboard => "Dashboard",
            Self::Users => "Users",
            Self::Articles => "Articles",
            Self::Comments => "Comments",
        }
    }

    pub const fn requires_session(self) -> bool {
        !matches!(self, Self::Login)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub screen: Screen,
    pub session: Option<Session>,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            screen: Screen::Login,
            session: None,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextScreen,
    PrevScreen,
    Open(Screen),
    SignIn(Session),
    SignOut,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ScreenChanged { from: Screen, to: Screen },
    SignedIn,
    SignedOut,
    RedirectedToLogin,
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    /// Starts on the dashboard when a persisted session is available.
    pub fn with_session(session: Option<Session>) -> Self {
        let screen = if session.is_some() {
            Screen::Dashboard
        } else {
            Screen::Login
        };
        Self {
            screen,
            session,
            status_line: None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextScreen => self.rotate_screen(1),
            AppCommand::PrevScreen => self.rotate_screen(-1),
            AppCommand::Open(screen) => self.open(screen),
            AppCommand::SignIn(session) => {
                let name = session.user.name.clone();
                self.session = Some(session);
                let mut events = vec![AppEvent::SignedIn];
                events.extend(self.change_screen(Screen::Dashboard));
                events.push(self.set_status(&format!("signed in as {name}")));
                events
            }
            AppCommand::SignOut => {
                self.session = None;
                let mut events = vec![AppEvent::SignedOut];
                events.extend(self.change_screen(Screen::Login));
                events.push(self.set_status("signed out"));
                events
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn open(&mut self, screen: Screen) -> Vec<AppEvent> {
        if screen.requires_session() && self.session.is_none() {
            let mut events = vec![AppEvent::RedirectedToLogin];
            events.extend(self.change_screen(Screen::Login));
            return events;
        }
        self.change_screen(screen)
    }

    fn rotate_screen(&mut self, delta: isize) -> Vec<AppEvent> {
        if self.session.is_none() {
            return Vec::new();
        }
        let screens = Screen::SIGNED_IN;
        let current = screens
            .iter()
            .position(|screen| *screen == self.screen)
            .unwrap_or(0) as isize;
        let len = screens.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.change_screen(screens[next])
    }

    fn change_screen(&mut self, to: Screen) -> Vec<AppEvent> {
        let from = self.screen;
        if from == to {
            return Vec::new();
        }
        self.screen = to;
        vec![AppEvent::ScreenChanged { from, to }]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState, Screen};
    use crate::{Session, SessionUser};

    fn session() -> Session {
        Session {
            token: "tok".to_owned(),
            user: SessionUser {
                id: None,
                name: "Ada".to_owned(),
                email: String::new(),
                role: "ADMIN".to_owned(),
            },
        }
    }

    #[test]
    fn opening_dashboard_screen_without_session_redirects_to_login() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::Open(Screen::Articles));
        assert_eq!(state.screen, Screen::Login);
        assert_eq!(events, vec![AppEvent::RedirectedToLogin]);
    }

    #[test]
    fn sign_in_moves_to_dashboard() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::SignIn(session()));
        assert!(state.is_signed_in());
        assert_eq!(state.screen, Screen::Dashboard);
        assert_eq!(
            events,
            vec![
                AppEvent::SignedIn,
                AppEvent::ScreenChanged {
                    from: Screen::Login,
                    to: Screen::Dashboard,
                },
                AppEvent::StatusUpdated("signed in as Ada".to_owned()),
            ]
        );
    }

    #[test]
    fn screen_rotation_wraps_and_skips_login() {
        let mut state = AppState::with_session(Some(session()));
        assert_eq!(state.screen, Screen::Dashboard);

        state.dispatch(AppCommand::PrevScreen);
        assert_eq!(state.screen, Screen::Comments);

        state.dispatch(AppCommand::NextScreen);
        state.dispatch(AppCommand::NextScreen);
        assert_eq!(state.screen, Screen::Users);
    }

    #[test]
    fn rotation_is_ignored_when_signed_out() {
        let mut state = AppState::default();
        assert!(state.dispatch(AppCommand::NextScreen).is_empty());
        assert_eq!(state.screen, Screen::Login);
    }

    #[test]
    fn sign_out_clears_session_and_returns_to_login() {
        let mut state = AppState::with_session(Some(session()));
        state.dispatch(AppCommand::Open(Screen::Users));

        state.dispatch(AppCommand::SignOut);
        assert!(!state.is_signed_in());
        assert_eq!(state.screen, Screen::Login);
        assert_eq!(state.status_line.as_deref(), Some("signed out"));
    }
}
