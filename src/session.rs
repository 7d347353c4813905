use crate::completion::CompletionRequest;
use crate::config::ConfigManager;
use crate::error::PolishError;
use crate::input::{
    capture_selection, capture_whole_text, classify, has_selection, write_at_snapshot, write_whole,
    EditableTarget, HostError, SelectionSnapshot, TargetKind, TextHost, WriteOutcome,
};
use crate::logging::log_text_change;
use crate::styles::StyleId;
use tracing::{debug, info, warn};

/// Identifies one completion request. `session` changes on every trigger,
/// `request` on every retry or style change within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub session: u64,
    pub request: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Capturing,
    AwaitingResult { ticket: Ticket },
    Applying { polished: String },
    Reporting { error: PolishError },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Capturing => "capturing",
            SessionState::AwaitingResult { .. } => "awaiting",
            SessionState::Applying { .. } => "ready",
            SessionState::Reporting { .. } => "error",
        }
    }
}

/// What one trigger captured. Lives until dismiss, apply, or the next trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct PolishSession {
    pub id: u64,
    pub target: EditableTarget,
    pub original_text: String,
    pub style: StyleId,
    /// `None` means the whole field was captured.
    pub snapshot: Option<SelectionSnapshot>,
}

/// A request the caller must run and feed back through [`SessionController::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub ticket: Ticket,
    pub request: CompletionRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedPolish {
    pub original: String,
    pub polished: String,
    pub style: StyleId,
    pub outcome: WriteOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Waiting in `Applying` for apply or dismiss.
    Ready(String),
    Applied(AppliedPolish),
    Failed(PolishError),
    /// The ticket no longer matches the live request; nothing changed.
    Discarded,
}

pub struct SessionController<H> {
    host: H,
    config: ConfigManager,
    state: SessionState,
    session: Option<PolishSession>,
    next_session: u64,
    next_request: u64,
    last_target: Option<EditableTarget>,
    selection_available: bool,
}

impl<H: TextHost> SessionController<H> {
    pub fn new(host: H, config: ConfigManager) -> Self {
        Self {
            host,
            config,
            state: SessionState::Idle,
            session: None,
            next_session: 0,
            next_request: 0,
            last_target: None,
            selection_available: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> Option<&PolishSession> {
        self.session.as_ref()
    }

    pub fn last_target(&self) -> Option<EditableTarget> {
        self.last_target
    }

    pub fn selection_available(&self) -> bool {
        self.selection_available
    }

    /// Records the focused element if it is eligible. Ineligible focus (a
    /// button, the result panel) leaves the remembered target alone.
    pub fn focus_changed(&mut self) -> Option<EditableTarget> {
        let target = self.active_target();
        if let Some(target) = target {
            if self.last_target != Some(target) {
                debug!(node = %target.node, kind = target.kind.label(), "Tracking focused target");
            }
            self.last_target = Some(target);
        }
        target
    }

    fn active_target(&self) -> Option<EditableTarget> {
        let node = self.host.active_element()?;
        let kind = classify(self.host.describe(node).as_ref())?;
        Some(EditableTarget::new(kind, node))
    }

    fn resolve_target(&mut self) -> Option<EditableTarget> {
        if let Some(target) = self.focus_changed() {
            return Some(target);
        }
        self.last_target
            .filter(|target| self.host.is_attached(target.node))
    }

    /// Starts a new session from the current focus. Any earlier in-flight
    /// request becomes stale from this point on.
    pub fn trigger(&mut self) -> Result<PendingRequest, PolishError> {
        self.next_session += 1;
        self.session = None;
        self.state = SessionState::Capturing;

        // An untrusted desktop host cannot even see the focused element.
        if self.host.requires_accessibility() && !self.host.accessibility_trusted() {
            return Err(self.report(PolishError::AccessibilityNotGranted));
        }

        let Some(target) = self.resolve_target() else {
            self.state = SessionState::Idle;
            info!("🚫 Nothing to polish: no eligible text field is focused");
            return Err(PolishError::NoEligibleTarget);
        };

        if target.kind == TargetKind::AccessibilityElement && !self.host.accessibility_trusted() {
            return Err(self.report(PolishError::AccessibilityNotGranted));
        }

        let (text, snapshot) = match capture_selection(&mut self.host, &target) {
            Some(selection) => (selection.text, Some(selection.snapshot)),
            None => (capture_whole_text(&self.host, &target), None),
        };

        if text.trim().is_empty() {
            return Err(self.report(PolishError::EmptyInput));
        }

        info!(
            "✂️ Captured {} chars from {} ({})",
            text.chars().count(),
            target.kind.label(),
            if snapshot.is_some() { "selection" } else { "whole field" }
        );

        self.session = Some(PolishSession {
            id: self.next_session,
            target,
            original_text: text,
            style: self.config.get().default_style,
            snapshot,
        });
        self.issue()
    }

    /// Re-sends the captured text unchanged. `Ok(None)` when nothing was captured.
    pub fn retry(&mut self) -> Result<Option<PendingRequest>, PolishError> {
        if self.session.is_none() {
            debug!("Retry ignored: no captured text");
            return Ok(None);
        }
        info!("🔁 Retrying polish");
        self.issue().map(Some)
    }

    /// Re-sends the captured text with another style. The selection is not recaptured.
    pub fn change_style(&mut self, style: StyleId) -> Result<Option<PendingRequest>, PolishError> {
        let Some(session) = self.session.as_mut() else {
            debug!("Style change ignored: no captured text");
            return Ok(None);
        };
        session.style = style;
        info!("🎨 Switching style to {}", style.config().label);
        self.issue().map(Some)
    }

    fn issue(&mut self) -> Result<PendingRequest, PolishError> {
        let Some((session_id, style, text)) = self
            .session
            .as_ref()
            .map(|session| (session.id, session.style, session.original_text.clone()))
        else {
            return Err(PolishError::Unknown("No captured text".to_string()));
        };

        // Settings are read per request so edits apply without a restart.
        let config = self.config.get();
        let request = CompletionRequest {
            text,
            style_prompt: style.config().system_prompt.to_string(),
            api_key: config.api_key.clone(),
            endpoint: config.api_endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.request_timeout(),
        };

        if let Err(err) = request.validate() {
            return Err(self.report(err));
        }

        self.next_request += 1;
        let ticket = Ticket {
            session: session_id,
            request: self.next_request,
        };
        self.state = SessionState::AwaitingResult { ticket };
        debug!(?ticket, style = %style, "Issued completion request");
        Ok(PendingRequest { ticket, request })
    }

    /// Feeds a completion result back. Only the latest request of the live
    /// session is accepted; anything else is dropped without side effects.
    pub fn resolve(&mut self, ticket: Ticket, result: Result<String, PolishError>) -> Resolution {
        match &self.state {
            SessionState::AwaitingResult { ticket: live } if *live == ticket => {}
            _ => {
                debug!(?ticket, state = self.state.label(), "Discarding stale completion result");
                return Resolution::Discarded;
            }
        }

        match result {
            Ok(polished) => {
                self.state = SessionState::Applying {
                    polished: polished.clone(),
                };
                if self.config.get().auto_apply {
                    return match self.apply() {
                        Ok(applied) => Resolution::Applied(applied),
                        Err(err) => Resolution::Failed(err),
                    };
                }
                info!("✨ Polished text ready ({} chars)", polished.chars().count());
                Resolution::Ready(polished)
            }
            Err(err) => Resolution::Failed(self.report(err)),
        }
    }

    /// Replaces the result waiting in `Applying`, as when the user edits it.
    pub fn edit_result(&mut self, text: &str) -> bool {
        match &mut self.state {
            SessionState::Applying { polished } => {
                *polished = text.to_string();
                true
            }
            _ => false,
        }
    }

    /// Writes the waiting result into the captured target and returns to Idle.
    pub fn apply(&mut self) -> Result<AppliedPolish, PolishError> {
        let SessionState::Applying { polished } = &self.state else {
            return Err(PolishError::Unknown(
                "No polished text is waiting to be applied".to_string(),
            ));
        };
        let polished = polished.clone();
        let Some(session) = self.session.clone() else {
            return Err(self.report(PolishError::Unknown("Session vanished".to_string())));
        };

        let written = match &session.snapshot {
            Some(snapshot) => write_at_snapshot(&mut self.host, &session.target, snapshot, &polished),
            None => write_whole(&mut self.host, &session.target, &polished),
        };

        let outcome = match written {
            Ok(outcome) => outcome,
            Err(HostError::Detached(node)) => {
                warn!(node = %node, "Target detached before apply; nothing written");
                return Err(self.report(PolishError::NoEligibleTarget));
            }
            Err(err) => return Err(self.report(PolishError::Unknown(err.to_string()))),
        };

        log_text_change(&session.original_text, &polished);
        info!("✅ Applied polished text ({:?})", outcome);

        self.state = SessionState::Idle;
        self.session = None;
        Ok(AppliedPolish {
            original: session.original_text,
            polished,
            style: session.style,
            outcome,
        })
    }

    /// Returns to Idle. A request still in flight will be discarded on arrival.
    pub fn dismiss(&mut self) {
        if self.state != SessionState::Idle {
            debug!(state = self.state.label(), "Session dismissed");
        }
        self.state = SessionState::Idle;
        self.session = None;
    }

    /// Recomputes whether the remembered target holds a polishable selection.
    /// Only meaningful while Idle; returns the new value.
    pub fn refresh_selection_prompt(&mut self) -> bool {
        if self.state != SessionState::Idle {
            return self.selection_available;
        }

        let target = self.focus_changed().or(self.last_target);
        self.selection_available = match target {
            Some(target) if self.host.is_attached(target.node) => {
                has_selection(&self.host, &target)
            }
            _ => false,
        };
        self.selection_available
    }

    fn report(&mut self, error: PolishError) -> PolishError {
        warn!(code = error.code(), "❌ {}", error.message());
        self.state = SessionState::Reporting {
            error: error.clone(),
        };
        error
    }
}
