use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::completion::Completer;
use crate::config::ConfigManager;
use crate::error::PolishError;
use crate::input::TextHost;
use crate::session::{
    AppliedPolish, PendingRequest, Resolution, SessionController, SessionState, Ticket,
};
use crate::status::StatusWriter;
use crate::styles::StyleId;

/// Runs on the app task with exclusive access to the host, as a document
/// mutation from the page would.
pub type HostEdit<H> = Box<dyn FnOnce(&mut H) + Send>;

pub enum AppEvent<H> {
    Trigger,
    FocusChanged,
    SelectionChanged,
    Apply,
    Dismiss,
    Retry,
    Style(StyleId),
    EditResult(String),
    Host(HostEdit<H>),
    Shutdown,
}

/// What the reporting surface should show after each step.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Awaiting { style: StyleId },
    Ready { polished: String, style: StyleId },
    Applied(AppliedPolish),
    Failed(PolishError),
    SelectionPrompt(bool),
    Discarded(Ticket),
    Dismissed,
}

pub struct AppHandle<H> {
    tx: mpsc::UnboundedSender<AppEvent<H>>,
}

impl<H> Clone for AppHandle<H> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<H> AppHandle<H> {
    /// `false` once the app loop has stopped.
    pub fn send(&self, event: AppEvent<H>) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn edit_host(&self, edit: impl FnOnce(&mut H) + Send + 'static) -> bool {
        self.send(AppEvent::Host(Box::new(edit)))
    }
}

type CompletionResult = (Ticket, Result<String, PolishError>);

pub struct PolishApp<H> {
    controller: SessionController<H>,
    config_manager: ConfigManager,
    completer: Arc<dyn Completer>,
    status_writer: Option<StatusWriter>,
    events_rx: mpsc::UnboundedReceiver<AppEvent<H>>,
    results_tx: mpsc::UnboundedSender<CompletionResult>,
    results_rx: mpsc::UnboundedReceiver<CompletionResult>,
    notices_tx: mpsc::UnboundedSender<Notice>,
    selection_deadline: Option<Instant>,
    selection_prompt: bool,
}

impl<H: TextHost + Send + 'static> PolishApp<H> {
    pub fn new(
        host: H,
        config_manager: ConfigManager,
        completer: Arc<dyn Completer>,
    ) -> (Self, AppHandle<H>, mpsc::UnboundedReceiver<Notice>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();

        let app = Self {
            controller: SessionController::new(host, config_manager.clone()),
            config_manager,
            completer,
            status_writer: None,
            events_rx,
            results_tx,
            results_rx,
            notices_tx,
            selection_deadline: None,
            selection_prompt: false,
        };
        (app, AppHandle { tx: events_tx }, notices_rx)
    }

    pub fn with_status(mut self, status_writer: StatusWriter) -> Self {
        if let Err(err) = status_writer.set_idle(false) {
            warn!("Failed to initialize status file: {err:#}");
        }
        self.status_writer = Some(status_writer);
        self
    }

    /// Processes events until `Shutdown` or until every handle is dropped,
    /// then hands the host back.
    pub async fn run(mut self) -> Result<H> {
        info!("🚀 polish-rs session loop running");
        let mut config_rx = self.config_manager.subscribe();

        loop {
            let deadline = self.selection_deadline;
            tokio::select! {
                event = self.events_rx.recv() => {
                    match event {
                        Some(AppEvent::Shutdown) | None => {
                            info!("Session loop stopping");
                            break;
                        }
                        Some(event) => self.handle_event(event),
                    }
                }
                Some((ticket, result)) = self.results_rx.recv() => {
                    self.handle_result(ticket, result);
                }
                _ = wait_until(deadline) => {
                    self.selection_deadline = None;
                    self.refresh_selection_prompt();
                }
                changed = config_rx.changed() => {
                    if changed.is_ok() {
                        let config = config_rx.borrow_and_update().clone();
                        debug!(style = %config.default_style, "Configuration change observed");
                    }
                }
            }
        }

        if let Some(status) = &self.status_writer {
            if let Err(err) = status.cleanup() {
                warn!("Failed to clean up status file: {err:#}");
            }
        }
        Ok(self.into_host())
    }

    fn into_host(self) -> H {
        let Self { controller, .. } = self;
        controller.into_host()
    }

    fn handle_event(&mut self, event: AppEvent<H>) {
        match event {
            AppEvent::Trigger => {
                let outcome = self.controller.trigger();
                self.dispatch_or_report(outcome.map(Some));
            }
            AppEvent::FocusChanged => {
                self.controller.focus_changed();
                self.schedule_selection_refresh();
            }
            AppEvent::SelectionChanged => self.schedule_selection_refresh(),
            AppEvent::Apply => match self.controller.apply() {
                Ok(applied) => self.applied(applied),
                Err(err) => self.failed(err),
            },
            AppEvent::Dismiss => {
                self.controller.dismiss();
                self.update_status(|status| status.set_idle(false));
                self.notify(Notice::Dismissed);
                self.schedule_selection_refresh();
            }
            AppEvent::Retry => {
                let outcome = self.controller.retry();
                self.dispatch_or_report(outcome);
            }
            AppEvent::Style(style) => {
                let outcome = self.controller.change_style(style);
                self.dispatch_or_report(outcome);
            }
            AppEvent::EditResult(text) => {
                if !self.controller.edit_result(&text) {
                    debug!("Edit ignored: no result is waiting");
                }
            }
            AppEvent::Host(edit) => edit(self.controller.host_mut()),
            AppEvent::Shutdown => {}
        }
    }

    fn handle_result(&mut self, ticket: Ticket, result: Result<String, PolishError>) {
        match self.controller.resolve(ticket, result) {
            Resolution::Ready(polished) => {
                let style = self
                    .controller
                    .session()
                    .map(|session| session.style)
                    .unwrap_or_default();
                self.update_status(|status| status.set_ready(&polished, style));
                self.notify(Notice::Ready { polished, style });
            }
            Resolution::Applied(applied) => self.applied(applied),
            Resolution::Failed(err) => self.failed(err),
            Resolution::Discarded => self.notify(Notice::Discarded(ticket)),
        }
    }

    fn dispatch_or_report(&mut self, outcome: Result<Option<PendingRequest>, PolishError>) {
        match outcome {
            Ok(Some(pending)) => self.dispatch(pending),
            Ok(None) => {}
            Err(err) => self.failed(err),
        }
    }

    /// The request runs on its own task; the loop keeps serving events and
    /// picks the result up from the results channel.
    fn dispatch(&mut self, pending: PendingRequest) {
        let style = self
            .controller
            .session()
            .map(|session| session.style)
            .unwrap_or_default();
        self.update_status(|status| status.set_awaiting(style));
        self.notify(Notice::Awaiting { style });

        let completer = Arc::clone(&self.completer);
        let results_tx = self.results_tx.clone();
        let PendingRequest { ticket, request } = pending;
        tokio::spawn(async move {
            let result = completer.complete(request).await;
            if results_tx.send((ticket, result)).is_err() {
                debug!(?ticket, "Session loop gone; dropping completion result");
            }
        });
    }

    fn applied(&mut self, applied: AppliedPolish) {
        if let Some(status) = &self.status_writer {
            if let Err(err) =
                status.record_polish(&applied.original, &applied.polished, applied.style)
            {
                warn!("Failed to record history: {err:#}");
            }
        }
        self.update_status(|status| status.set_idle(false));
        self.notify(Notice::Applied(applied));
        self.schedule_selection_refresh();
    }

    fn failed(&mut self, err: PolishError) {
        if err.offers_configuration() {
            info!("⚙️  Run `polish-rs config` to fix: {}", err.message());
        }
        self.update_status(|status| status.set_error(&err));
        self.notify(Notice::Failed(err));
    }

    fn schedule_selection_refresh(&mut self) {
        let debounce = self.config_manager.get().selection_debounce();
        self.selection_deadline = Some(Instant::now() + debounce);
    }

    fn refresh_selection_prompt(&mut self) {
        let available = self.controller.refresh_selection_prompt();
        if available == self.selection_prompt {
            return;
        }
        self.selection_prompt = available;
        debug!(available, "Selection prompt changed");
        if matches!(self.controller.state(), SessionState::Idle) {
            self.update_status(|status| status.set_idle(available));
        }
        self.notify(Notice::SelectionPrompt(available));
    }

    fn update_status(&self, update: impl FnOnce(&StatusWriter) -> Result<()>) {
        if let Some(status) = &self.status_writer {
            if let Err(err) = update(status) {
                error!("Failed to update status: {err:#}");
            }
        }
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices_tx.send(notice);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
