use async_trait::async_trait;
use polish_rs::app::{AppEvent, AppHandle, Notice, PolishApp};
use polish_rs::completion::{Completer, CompletionRequest};
use polish_rs::input::{
    ElementDescriptor, MemoryDocument, NodeId, SelectionDirection, TextHost, WriteOutcome,
};
use polish_rs::{Config, ConfigManager, PolishError, StatusWriter, StyleId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Answers by request text after a fixed delay and records every request.
#[derive(Default)]
struct ScriptedCompleter {
    replies: HashMap<String, (Duration, Result<String, PolishError>)>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompleter {
    fn reply(mut self, text: &str, delay_ms: u64, result: Result<&str, PolishError>) -> Self {
        self.replies.insert(
            text.to_string(),
            (
                Duration::from_millis(delay_ms),
                result.map(str::to_string),
            ),
        );
        self
    }

    fn seen(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    async fn complete(&self, request: CompletionRequest) -> Result<String, PolishError> {
        self.seen.lock().unwrap().push(request.clone());
        let (delay, result) = self
            .replies
            .get(&request.text)
            .cloned()
            .unwrap_or((Duration::ZERO, Err(PolishError::Unknown("unscripted".into()))));
        tokio::time::sleep(delay).await;
        result.map(|text| format!("{text} [{}]", style_tag(&request.style_prompt)))
    }
}

fn style_tag(prompt: &str) -> &'static str {
    StyleId::all()
        .iter()
        .find(|style| style.config().system_prompt == prompt)
        .map(|style| style.as_str())
        .unwrap_or("?")
}

fn config(auto_apply: bool) -> ConfigManager {
    ConfigManager::in_memory(Config {
        api_key: "sk-test".to_string(),
        selection_debounce_ms: 20,
        auto_apply,
        ..Config::default()
    })
}

struct Harness {
    handle: AppHandle<MemoryDocument>,
    notices: UnboundedReceiver<Notice>,
    app: tokio::task::JoinHandle<anyhow::Result<MemoryDocument>>,
}

impl Harness {
    fn start(document: MemoryDocument, completer: Arc<ScriptedCompleter>, auto_apply: bool) -> Self {
        let (app, handle, notices) = PolishApp::new(document, config(auto_apply), completer);
        Self {
            handle,
            notices,
            app: tokio::spawn(app.run()),
        }
    }

    fn send(&self, event: AppEvent<MemoryDocument>) {
        assert!(self.handle.send(event), "app loop stopped early");
    }

    fn focus(&self, node: NodeId) {
        self.handle
            .edit_host(move |doc: &mut MemoryDocument| doc.set_active(Some(node)));
        self.send(AppEvent::FocusChanged);
    }

    /// Skips notices until `pick` matches one.
    async fn wait_for<T>(&mut self, mut pick: impl FnMut(&Notice) -> Option<T>) -> T {
        let deadline = Duration::from_secs(3);
        tokio::time::timeout(deadline, async {
            loop {
                let notice = self.notices.recv().await.expect("notice channel open");
                if let Some(found) = pick(&notice) {
                    return found;
                }
            }
        })
        .await
        .expect("expected notice did not arrive")
    }

    async fn finish(self) -> MemoryDocument {
        self.send(AppEvent::Shutdown);
        self.app.await.expect("app task").expect("app result")
    }
}

fn field_doc(values: &[&str]) -> (MemoryDocument, Vec<NodeId>) {
    let mut doc = MemoryDocument::new();
    let nodes = values
        .iter()
        .map(|value| doc.add_field(ElementDescriptor::text_area(), value))
        .collect::<Vec<_>>();
    doc.set_active(nodes.first().copied());
    (doc, nodes)
}

#[tokio::test]
async fn newer_session_wins_over_slow_older_response() {
    let completer = Arc::new(
        ScriptedCompleter::default()
            .reply("alpha draft", 150, Ok("Alpha"))
            .reply("beta draft", 10, Ok("Beta")),
    );
    let (doc, nodes) = field_doc(&["alpha draft", "beta draft"]);
    let mut harness = Harness::start(doc, completer.clone(), true);

    harness.send(AppEvent::Trigger);
    harness.focus(nodes[1]);
    harness.send(AppEvent::Trigger);

    let applied = harness
        .wait_for(|notice| match notice {
            Notice::Applied(applied) => Some(applied.clone()),
            _ => None,
        })
        .await;
    assert_eq!(applied.polished, "Beta [formal]");

    harness
        .wait_for(|notice| matches!(notice, Notice::Discarded(_)).then_some(()))
        .await;

    let doc = harness.finish().await;
    assert_eq!(doc.field_value(nodes[0]).unwrap(), "alpha draft");
    assert_eq!(doc.field_value(nodes[1]).unwrap(), "Beta [formal]");
    assert_eq!(completer.seen().len(), 2);
}

#[tokio::test]
async fn stale_result_is_dropped_even_before_newer_one_resolves() {
    let completer = Arc::new(
        ScriptedCompleter::default()
            .reply("first", 10, Ok("First"))
            .reply("second", 400, Ok("Second")),
    );
    let (doc, nodes) = field_doc(&["first", "second"]);
    let mut harness = Harness::start(doc, completer, true);

    harness.send(AppEvent::Trigger);
    harness.focus(nodes[1]);
    harness.send(AppEvent::Trigger);

    harness
        .wait_for(|notice| matches!(notice, Notice::Discarded(_)).then_some(()))
        .await;

    let doc = harness.finish().await;
    assert_eq!(doc.field_value(nodes[0]).unwrap(), "first");
    assert_eq!(doc.field_value(nodes[1]).unwrap(), "second");
}

#[tokio::test]
async fn retry_after_failure_reuses_captured_selection() {
    let completer = Arc::new(ScriptedCompleter::default().reply(
        "quick",
        0,
        Err(PolishError::upstream(503, "")),
    ));
    let mut doc = MemoryDocument::new();
    let node = doc.add_field(ElementDescriptor::input("text"), "the quick fox");
    doc.set_active(Some(node));
    doc.select_field(node, Some(4), Some(9), SelectionDirection::Forward);
    let mut harness = Harness::start(doc, completer.clone(), false);

    harness.send(AppEvent::Trigger);
    let err = harness
        .wait_for(|notice| match notice {
            Notice::Failed(err) => Some(err.clone()),
            _ => None,
        })
        .await;
    assert_eq!(err.status_code(), Some(503));

    // Move the live selection; the retry must still use the captured span.
    harness.handle.edit_host(move |doc: &mut MemoryDocument| {
        doc.select_field(node, Some(0), Some(3), SelectionDirection::None)
    });
    harness.send(AppEvent::Retry);
    harness
        .wait_for(|notice| matches!(notice, Notice::Failed(_)).then_some(()))
        .await;

    let seen = completer.seen();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|request| request.text == "quick"));
    harness.finish().await;
}

#[tokio::test]
async fn style_change_reissues_and_apply_writes_selection() {
    let completer = Arc::new(ScriptedCompleter::default().reply("quick", 20, Ok("swift")));
    let mut doc = MemoryDocument::new();
    let node = doc.add_field(ElementDescriptor::input("text"), "the quick fox");
    doc.set_active(Some(node));
    doc.select_field(node, Some(4), Some(9), SelectionDirection::Forward);
    let mut harness = Harness::start(doc, completer.clone(), false);

    harness.send(AppEvent::Trigger);
    harness.send(AppEvent::Style(StyleId::Concise));

    let (polished, style) = harness
        .wait_for(|notice| match notice {
            Notice::Ready { polished, style } => Some((polished.clone(), *style)),
            _ => None,
        })
        .await;
    assert_eq!(polished, "swift [concise]");
    assert_eq!(style, StyleId::Concise);

    harness.send(AppEvent::Apply);
    let applied = harness
        .wait_for(|notice| match notice {
            Notice::Applied(applied) => Some(applied.clone()),
            _ => None,
        })
        .await;
    assert_eq!(applied.outcome, WriteOutcome::Inserted);

    let doc = harness.finish().await;
    assert_eq!(doc.field_value(node).unwrap(), "the swift [concise] fox");
    assert_eq!(completer.seen().len(), 2);
}

#[tokio::test]
async fn stale_range_falls_back_to_whole_region() {
    let completer = Arc::new(ScriptedCompleter::default().reply("brown fox", 30, Ok("red fox")));
    let mut doc = MemoryDocument::new();
    let region = doc.add_region(&["The quick ", "brown fox"]);
    doc.set_active(Some(region));
    doc.select_in_region(region, (1, 0), (1, 9));
    let mut harness = Harness::start(doc, completer, false);

    harness.send(AppEvent::Trigger);
    // A framework re-render swaps every text node while the request is out.
    harness.handle.edit_host(move |doc: &mut MemoryDocument| {
        doc.rerender_region(region, &["The quick ", "brown fox", " jumps"])
    });
    harness
        .wait_for(|notice| matches!(notice, Notice::Ready { .. }).then_some(()))
        .await;

    harness.send(AppEvent::Apply);
    let applied = harness
        .wait_for(|notice| match notice {
            Notice::Applied(applied) => Some(applied.clone()),
            _ => None,
        })
        .await;
    assert_eq!(applied.outcome, WriteOutcome::WholeField);

    let doc = harness.finish().await;
    assert_eq!(doc.rich_text(region).unwrap(), "red fox [formal]");
}

#[tokio::test]
async fn whitespace_only_field_reports_empty_input() {
    let completer = Arc::new(ScriptedCompleter::default());
    let (doc, _) = field_doc(&["    "]);
    let mut harness = Harness::start(doc, completer.clone(), false);

    harness.send(AppEvent::Trigger);
    let err = harness
        .wait_for(|notice| match notice {
            Notice::Failed(err) => Some(err.clone()),
            _ => None,
        })
        .await;
    assert_eq!(err, PolishError::EmptyInput);
    assert!(completer.seen().is_empty());
    harness.finish().await;
}

#[tokio::test]
async fn trailing_spaces_are_captured_whole_and_sent() {
    let completer = Arc::new(ScriptedCompleter::default().reply("hello   ", 0, Ok("Hello.")));
    let mut doc = MemoryDocument::new();
    let node = doc.add_field(ElementDescriptor::input("text"), "hello   ");
    doc.set_active(Some(node));
    let mut harness = Harness::start(doc, completer.clone(), true);

    harness.send(AppEvent::Trigger);
    harness
        .wait_for(|notice| matches!(notice, Notice::Applied(_)).then_some(()))
        .await;

    let doc = harness.finish().await;
    assert_eq!(completer.seen()[0].text, "hello   ");
    assert_eq!(doc.field_value(node).unwrap(), "Hello. [formal]");
}

#[tokio::test]
async fn selection_prompt_is_debounced() {
    let completer = Arc::new(ScriptedCompleter::default());
    let mut doc = MemoryDocument::new();
    let node = doc.add_field(ElementDescriptor::input("text"), "pick some words");
    doc.set_active(Some(node));
    let mut harness = Harness::start(doc, completer, false);

    harness.send(AppEvent::FocusChanged);
    for end in 1..=4 {
        harness.handle.edit_host(move |doc: &mut MemoryDocument| {
            doc.select_field(node, Some(0), Some(end), SelectionDirection::Forward)
        });
        harness.send(AppEvent::SelectionChanged);
    }

    let available = harness
        .wait_for(|notice| match notice {
            Notice::SelectionPrompt(available) => Some(*available),
            _ => None,
        })
        .await;
    assert!(available);
    harness.finish().await;
}

#[tokio::test]
async fn applied_polish_lands_in_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let completer: Arc<ScriptedCompleter> =
        Arc::new(ScriptedCompleter::default().reply("draft", 0, Ok("Draft")));
    let (doc, _) = field_doc(&["draft"]);
    let (app, handle, mut notices) = PolishApp::new(doc, config(true), completer);
    let app = app.with_status(StatusWriter::at(dir.path()).expect("status writer"));
    let task = tokio::spawn(app.run());

    handle.send(AppEvent::Trigger);
    tokio::time::timeout(Duration::from_secs(3), async {
        while let Some(notice) = notices.recv().await {
            if matches!(notice, Notice::Applied(_)) {
                break;
            }
        }
    })
    .await
    .expect("applied notice");

    handle.send(AppEvent::Shutdown);
    task.await.expect("app task").expect("app result");

    let history = StatusWriter::at(dir.path()).expect("status writer").history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].original, "draft");
    assert_eq!(history[0].polished, "Draft [formal]");
}
