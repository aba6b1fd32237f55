//! Bounded registry of live session tabs.
//!
//! The registry owns the ordered tab collection plus one always-present
//! launcher pseudo-tab. Each tab's state is aggregated purely locally; one
//! session's status is never inferred from another's.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, ApiResult, BoardClient, EventStream, StreamEvent};
use crate::config::Config;
use crate::core::events::UpdateSender;
use crate::core::session::{ChatSession, request_kill};
use crate::core::turn::TurnOutcome;

/// Which surface is in front: the launcher or one session tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveView {
    Launcher,
    Session(String),
}

/// One live session plus its turn-cancellation bookkeeping.
#[derive(Debug)]
pub struct SessionTab {
    pub session: ChatSession,
    cancel: Option<CancellationToken>,
}

impl SessionTab {
    fn new(session: ChatSession) -> Self {
        Self {
            session,
            cancel: None,
        }
    }
}

/// Result of a successful launch: the new session's id plus the still-open
/// event stream, handed off for the per-session panel to keep reading.
pub struct LaunchedTab {
    pub session_id: String,
    pub stream: EventStream,
}

impl std::fmt::Debug for LaunchedTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchedTab")
            .field("session_id", &self.session_id)
            .field("stream", &"<EventStream>")
            .finish()
    }
}

/// Registry of concurrently open session tabs, bounded by `max_tabs`.
#[derive(Debug)]
pub struct TabManager {
    tabs: Vec<SessionTab>,
    active: ActiveView,
    max_tabs: usize,
}

impl TabManager {
    /// Creates an empty registry with the given capacity.
    pub fn new(max_tabs: usize) -> Self {
        Self {
            tabs: Vec::new(),
            active: ActiveView::Launcher,
            max_tabs,
        }
    }

    /// Creates a registry sized from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_tabs)
    }

    pub fn max_tabs(&self) -> usize {
        self.max_tabs
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn has_capacity(&self) -> bool {
        self.tabs.len() < self.max_tabs
    }

    pub fn active(&self) -> &ActiveView {
        &self.active
    }

    /// Brings a session tab to the front. Returns false for an unknown id.
    pub fn activate(&mut self, id: &str) -> bool {
        if self.tab(id).is_some() {
            self.active = ActiveView::Session(id.to_string());
            true
        } else {
            false
        }
    }

    /// Returns to the launcher view.
    pub fn show_launcher(&mut self) {
        self.active = ActiveView::Launcher;
    }

    pub fn sessions(&self) -> impl Iterator<Item = &ChatSession> {
        self.tabs.iter().map(|t| &t.session)
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.tab(id).map(|t| &t.session)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ChatSession> {
        self.tab_mut(id).map(|t| &mut t.session)
    }

    fn tab(&self, id: &str) -> Option<&SessionTab> {
        self.tabs.iter().find(|t| t.session.id == id)
    }

    fn tab_mut(&mut self, id: &str) -> Option<&mut SessionTab> {
        self.tabs.iter_mut().find(|t| t.session.id == id)
    }

    /// Launches a new agent session.
    ///
    /// At capacity this refuses synchronously: no tab is touched and no
    /// request leaves the process. Otherwise the creation stream is read
    /// only until the backend announces the session id; the still-open
    /// stream is returned so the panel can keep reading the same handle —
    /// read ownership moves with it.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn launch(
        &mut self,
        client: &BoardClient,
        skill_id: &str,
        prompt: &str,
        board: Option<&str>,
    ) -> ApiResult<LaunchedTab> {
        if !self.has_capacity() {
            return Err(ApiError::capacity(self.max_tabs));
        }

        let mut stream = client.create_session(skill_id, prompt, board).await?;

        while let Some(item) = stream.next().await {
            match item? {
                StreamEvent::Session { session_id } => {
                    let mut session =
                        ChatSession::new(&session_id, derive_title(prompt, skill_id), skill_id);
                    // The launch prompt is the first user turn; the panel
                    // drives the handed-off stream as its response.
                    session
                        .messages
                        .push(crate::core::events::Message::user(prompt));
                    self.tabs.push(SessionTab::new(session));
                    self.active = ActiveView::Session(session_id.clone());
                    return Ok(LaunchedTab { session_id, stream });
                }
                StreamEvent::Error { error } => {
                    return Err(ApiError::application(error));
                }
                other => {
                    tracing::debug!("Ignoring pre-announcement event: {other:?}");
                }
            }
        }

        Err(ApiError::transport(
            "stream ended before a session was announced",
        ))
    }

    /// Rebuilds the tab list from persisted summaries at startup.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn restore(&mut self, client: &BoardClient) -> ApiResult<usize> {
        let summaries = client.list_sessions().await?;

        let mut tabs: Vec<SessionTab> = summaries
            .into_iter()
            .map(|summary| SessionTab::new(ChatSession::from_summary(summary)))
            .collect();
        if tabs.len() > self.max_tabs {
            tracing::warn!(
                "Backend returned {} sessions; keeping the first {}",
                tabs.len(),
                self.max_tabs
            );
            tabs.truncate(self.max_tabs);
        }

        self.tabs = tabs;
        self.active = ActiveView::Launcher;
        Ok(self.tabs.len())
    }

    /// Closes a tab.
    ///
    /// The backend delete is best-effort; the local tab goes away regardless
    /// of its outcome, and the launcher takes over if the closed tab was in
    /// front.
    pub async fn close(&mut self, client: &BoardClient, id: &str) {
        if let Err(err) = client.delete_session(id).await {
            tracing::warn!("Failed to delete session {id}: {err}");
        }

        if let Some(pos) = self.tabs.iter().position(|t| t.session.id == id) {
            if let Some(cancel) = self.tabs[pos].cancel.take() {
                cancel.cancel();
            }
            self.tabs.remove(pos);
        }
        if self.active == ActiveView::Session(id.to_string()) {
            self.active = ActiveView::Launcher;
        }
    }

    /// Renames a tab. The local title updates optimistically; persistence is
    /// best-effort.
    pub async fn rename(&mut self, client: &BoardClient, id: &str, title: &str) {
        if let Some(tab) = self.tab_mut(id) {
            tab.session.title = title.to_string();
        }
        if let Err(err) = client.rename_session(id, title).await {
            tracing::warn!("Failed to persist rename of session {id}: {err}");
        }
    }

    /// Sends a user message on a tab's session, driving the turn to its end.
    pub async fn send_message(
        &mut self,
        client: &BoardClient,
        id: &str,
        text: &str,
        updates: &UpdateSender,
    ) -> TurnOutcome {
        let Some(cancel) = self.begin_turn(id) else {
            return TurnOutcome::Rejected;
        };
        let outcome = match self.get_mut(id) {
            Some(session) => session.run_turn(client, text, cancel, updates).await,
            None => TurnOutcome::Rejected,
        };
        self.finish_turn(id);
        outcome
    }

    /// Issues the cancellation token for a tab's next turn and records it so
    /// `kill` can reach the loop. Refused while a turn is already live.
    pub fn begin_turn(&mut self, id: &str) -> Option<CancellationToken> {
        let tab = self.tab_mut(id)?;
        if tab.cancel.is_some() || tab.session.is_streaming() {
            tracing::warn!("Session {id} already has a live read loop");
            return None;
        }
        let token = CancellationToken::new();
        tab.cancel = Some(token.clone());
        Some(token)
    }

    /// Clears the turn bookkeeping once its read loop has ended.
    pub fn finish_turn(&mut self, id: &str) {
        if let Some(tab) = self.tab_mut(id) {
            tab.cancel = None;
        }
    }

    /// Stops a tab's streaming turn: cancels only that tab's token and fires
    /// the out-of-band kill notification. Other tabs are unaffected.
    pub fn kill(&self, client: &BoardClient, id: &str) {
        if let Some(tab) = self.tab(id)
            && let Some(cancel) = &tab.cancel
        {
            request_kill(client, id, cancel);
        }
    }
}

/// Derives a tab title from the launch prompt, falling back to the skill id.
fn derive_title(prompt: &str, skill_id: &str) -> String {
    let first_line = prompt.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return skill_id.to_string();
    }
    if first_line.chars().count() <= 60 {
        first_line.to_string()
    } else {
        let truncated: String = first_line.chars().take(60).collect();
        format!("{truncated}…")
    }
}
