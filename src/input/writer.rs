use crate::input::host::{HostError, HostResult, TextHost};
use crate::input::target::{EditableTarget, SelectionSnapshot, TargetKind};
use tracing::{debug, warn};

/// Which path a write-back ended up taking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Undo-preserving insertion over a restored selection.
    Inserted,
    /// Direct assignment followed by an input notification.
    Assigned,
    /// The snapshot no longer matched the target; the whole field was replaced.
    WholeField,
    /// Snapshot and target disagree on kind; nothing was written.
    Skipped,
}

/// Replaces the entire content of the target.
pub fn write_whole<H: TextHost + ?Sized>(
    host: &mut H,
    target: &EditableTarget,
    text: &str,
) -> HostResult<WriteOutcome> {
    ensure_attached(host, target)?;
    host.focus(target.node)?;

    match target.kind {
        TargetKind::PlainField | TargetKind::MultilineField => {
            let len = host
                .field_value(target.node)
                .map(|value| value.chars().count())
                .unwrap_or(0);
            let selected = host
                .set_field_selection(target.node, 0, len, Default::default())
                .is_ok();
            if selected && host.insert_text(text) {
                return Ok(WriteOutcome::Inserted);
            }
            debug!(target = %target.node, "Insert primitive unavailable; assigning field value");
            host.set_field_value(target.node, text)?;
            host.dispatch_input_event(target.node);
            Ok(WriteOutcome::Assigned)
        }
        TargetKind::RichRegion => {
            let selected = host.select_node_contents(target.node).is_ok();
            if selected && host.insert_text(text) {
                return Ok(WriteOutcome::Inserted);
            }
            debug!(target = %target.node, "Insert primitive unavailable; assigning region text");
            host.set_rich_text(target.node, text)?;
            host.dispatch_input_event(target.node);
            Ok(WriteOutcome::Assigned)
        }
        TargetKind::AccessibilityElement => {
            host.set_field_value(target.node, text)?;
            Ok(WriteOutcome::Assigned)
        }
    }
}

/// Writes `text` back into the span described by `snapshot`.
pub fn write_at_snapshot<H: TextHost + ?Sized>(
    host: &mut H,
    target: &EditableTarget,
    snapshot: &SelectionSnapshot,
    text: &str,
) -> HostResult<WriteOutcome> {
    ensure_attached(host, target)?;

    match (snapshot, target.kind) {
        (
            SelectionSnapshot::Offsets {
                start,
                end,
                direction,
            },
            TargetKind::PlainField | TargetKind::MultilineField,
        ) => {
            host.focus(target.node)?;
            let restored = host
                .set_field_selection(target.node, *start, *end, *direction)
                .is_ok();
            if restored && host.insert_text(text) {
                return Ok(WriteOutcome::Inserted);
            }
            debug!(
                target = %target.node,
                start, end, "Insert primitive unavailable; replacing offset range directly"
            );
            host.set_field_range_text(target.node, text, *start, *end)?;
            host.dispatch_input_event(target.node);
            Ok(WriteOutcome::Assigned)
        }
        (SelectionSnapshot::Range(range), TargetKind::RichRegion) => {
            let still_inside = host
                .range_common_ancestor(*range)
                .is_some_and(|ancestor| host.contains(target.node, ancestor));
            if !still_inside {
                debug!(target = %target.node, "Captured range went stale; replacing whole region");
                return degrade(host, target, text);
            }

            host.focus(target.node)?;
            if host.select_range(*range).is_err() {
                return degrade(host, target, text);
            }
            if host.insert_text(text) {
                return Ok(WriteOutcome::Inserted);
            }
            debug!(target = %target.node, "Insert primitive unavailable; splicing captured range");
            host.delete_range_and_insert_text(*range, text)?;
            host.clear_selection();
            host.dispatch_input_event(target.node);
            Ok(WriteOutcome::Assigned)
        }
        (
            SelectionSnapshot::Accessibility { selected_text },
            TargetKind::AccessibilityElement,
        ) => {
            host.focus(target.node)?;
            let unchanged = host
                .selected_text(target.node)
                .is_some_and(|live| !live.is_empty() && live == *selected_text);
            if unchanged && host.set_selected_text(target.node, text).is_ok() {
                return Ok(WriteOutcome::Inserted);
            }
            debug!(target = %target.node, "Selection moved since capture; replacing element value");
            degrade(host, target, text)
        }
        (snapshot, kind) => {
            warn!(
                snapshot = snapshot.kind_label(),
                target = kind.label(),
                "Snapshot does not belong to this target; refusing to write"
            );
            Ok(WriteOutcome::Skipped)
        }
    }
}

fn degrade<H: TextHost + ?Sized>(
    host: &mut H,
    target: &EditableTarget,
    text: &str,
) -> HostResult<WriteOutcome> {
    write_whole(host, target, text).map(|outcome| match outcome {
        WriteOutcome::Skipped => WriteOutcome::Skipped,
        _ => WriteOutcome::WholeField,
    })
}

fn ensure_attached<H: TextHost + ?Sized>(host: &H, target: &EditableTarget) -> HostResult<()> {
    if host.is_attached(target.node) {
        Ok(())
    } else {
        Err(HostError::Detached(target.node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::capture::{capture_selection, capture_whole_text};
    use crate::input::memory::MemoryDocument;
    use crate::input::target::{ElementDescriptor, SelectionDirection};

    fn field_doc(value: &str) -> (MemoryDocument, EditableTarget) {
        let mut doc = MemoryDocument::new();
        let node = doc.add_field(ElementDescriptor::text_area(), value);
        (doc, EditableTarget::new(TargetKind::MultilineField, node))
    }

    #[test]
    fn offset_round_trip_is_identity() {
        let text = "The quick brown fox jumps";
        for (start, end) in [(0, 3), (4, 9), (10, 25), (0, 25)] {
            for supported in [true, false] {
                let (mut doc, target) = field_doc(text);
                doc.set_insert_text_supported(supported);
                doc.select_field(target.node, Some(start), Some(end), SelectionDirection::Forward);
                let info = capture_selection(&mut doc, &target).expect("selection");
                write_at_snapshot(&mut doc, &target, &info.snapshot, &info.text).unwrap();
                assert_eq!(capture_whole_text(&doc, &target), text);
            }
        }
    }

    #[test]
    fn offset_write_prefers_insert_primitive() {
        let (mut doc, target) = field_doc("fix teh typo");
        let snapshot = SelectionSnapshot::Offsets {
            start: 4,
            end: 7,
            direction: SelectionDirection::Forward,
        };
        let outcome = write_at_snapshot(&mut doc, &target, &snapshot, "the").unwrap();
        assert_eq!(outcome, WriteOutcome::Inserted);
        assert_eq!(doc.field_value(target.node).as_deref(), Some("fix the typo"));
        assert_eq!(doc.undo_log().len(), 1);
    }

    #[test]
    fn offset_fallback_replaces_range_and_notifies() {
        let (mut doc, target) = field_doc("fix teh typo");
        doc.set_insert_text_supported(false);
        let snapshot = SelectionSnapshot::Offsets {
            start: 4,
            end: 7,
            direction: SelectionDirection::None,
        };
        let outcome = write_at_snapshot(&mut doc, &target, &snapshot, "the").unwrap();
        assert_eq!(outcome, WriteOutcome::Assigned);
        assert_eq!(doc.field_value(target.node).as_deref(), Some("fix the typo"));
        let selection = doc.field_selection(target.node);
        assert_eq!((selection.start, selection.end), (Some(7), Some(7)));
        assert_eq!(doc.input_events(), &[target.node]);
        assert!(doc.undo_log().is_empty());
    }

    #[test]
    fn write_restores_focus() {
        let (mut doc, target) = field_doc("abc");
        let other = doc.add_field(ElementDescriptor::input("text"), "");
        doc.set_active(Some(other));
        write_whole(&mut doc, &target, "xyz").unwrap();
        assert_eq!(doc.active_element(), Some(target.node));
        assert_eq!(doc.field_value(target.node).as_deref(), Some("xyz"));
    }

    #[test]
    fn whole_write_falls_back_to_assignment() {
        let (mut doc, target) = field_doc("old");
        doc.set_insert_text_supported(false);
        assert_eq!(
            write_whole(&mut doc, &target, "new").unwrap(),
            WriteOutcome::Assigned
        );
        assert_eq!(doc.field_value(target.node).as_deref(), Some("new"));
        assert_eq!(doc.input_events(), &[target.node]);
    }

    #[test]
    fn range_write_replaces_only_captured_span() {
        let mut doc = MemoryDocument::new();
        let region = doc.add_region(&["Please ", "fix this", " today"]);
        let target = EditableTarget::new(TargetKind::RichRegion, region);
        doc.set_active(Some(region));
        doc.select_in_region(region, (1, 0), (1, 8));
        let info = capture_selection(&mut doc, &target).unwrap();

        // Selection moves elsewhere before the result comes back.
        doc.select_in_region(region, (0, 0), (0, 1));

        let outcome = write_at_snapshot(&mut doc, &target, &info.snapshot, "repair it").unwrap();
        assert_eq!(outcome, WriteOutcome::Inserted);
        assert_eq!(doc.rich_text(region).as_deref(), Some("Please repair it today"));
    }

    #[test]
    fn range_fallback_splices_and_notifies() {
        let mut doc = MemoryDocument::new();
        let region = doc.add_region(&["one two three"]);
        let target = EditableTarget::new(TargetKind::RichRegion, region);
        doc.set_insert_text_supported(false);
        doc.select_in_region(region, (0, 4), (0, 7));
        let info = capture_selection(&mut doc, &target).unwrap();

        let outcome = write_at_snapshot(&mut doc, &target, &info.snapshot, "2").unwrap();
        assert_eq!(outcome, WriteOutcome::Assigned);
        assert_eq!(doc.rich_text(region).as_deref(), Some("one 2 three"));
        assert_eq!(doc.input_events(), &[region]);
        assert!(doc.document_selection().is_none());
    }

    #[test]
    fn stale_range_degrades_to_whole_region() {
        let mut doc = MemoryDocument::new();
        let region = doc.add_region(&["alpha ", "beta"]);
        let target = EditableTarget::new(TargetKind::RichRegion, region);
        doc.select_in_region(region, (1, 0), (1, 4));
        let info = capture_selection(&mut doc, &target).unwrap();

        let anchor = doc.text_nodes(region)[1];
        doc.remove_node(anchor);

        let outcome = write_at_snapshot(&mut doc, &target, &info.snapshot, "gamma").unwrap();
        assert_eq!(outcome, WriteOutcome::WholeField);
        assert_eq!(doc.rich_text(region).as_deref(), Some("gamma"));
    }

    #[test]
    fn rerendered_region_counts_as_stale() {
        let mut doc = MemoryDocument::new();
        let region = doc.add_region(&["draft text"]);
        let target = EditableTarget::new(TargetKind::RichRegion, region);
        doc.set_insert_text_supported(false);
        doc.select_in_region(region, (0, 0), (0, 5));
        let info = capture_selection(&mut doc, &target).unwrap();
        doc.rerender_region(region, &["draft text!"]);

        let outcome = write_at_snapshot(&mut doc, &target, &info.snapshot, "final").unwrap();
        assert_eq!(outcome, WriteOutcome::WholeField);
        assert_eq!(doc.rich_text(region).as_deref(), Some("final"));
    }

    #[test]
    fn detached_target_fails_closed() {
        let (mut doc, target) = field_doc("abc");
        doc.remove_node(target.node);
        let snapshot = SelectionSnapshot::Offsets {
            start: 0,
            end: 1,
            direction: SelectionDirection::None,
        };
        assert_eq!(
            write_at_snapshot(&mut doc, &target, &snapshot, "z"),
            Err(HostError::Detached(target.node))
        );
        assert_eq!(doc.field_value(target.node).as_deref(), Some("abc"));
    }

    #[test]
    fn mismatched_snapshot_is_skipped() {
        let (mut doc, target) = field_doc("abc");
        let region = doc.add_region(&["x"]);
        let range = doc.select_in_region(region, (0, 0), (0, 1)).unwrap();
        let outcome =
            write_at_snapshot(&mut doc, &target, &SelectionSnapshot::Range(range), "z").unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped);
        assert_eq!(doc.field_value(target.node).as_deref(), Some("abc"));
    }

    #[test]
    fn accessibility_write_replaces_selection_when_unchanged() {
        let mut doc = MemoryDocument::new();
        let node = doc.add_accessibility_element("AXTextArea", "ship it now");
        let target = EditableTarget::new(TargetKind::AccessibilityElement, node);
        doc.select_accessibility(node, 0, 7);
        let info = capture_selection(&mut doc, &target).unwrap();

        let outcome = write_at_snapshot(&mut doc, &target, &info.snapshot, "Release").unwrap();
        assert_eq!(outcome, WriteOutcome::Inserted);
        assert_eq!(doc.field_value(node).as_deref(), Some("Release now"));
    }

    #[test]
    fn accessibility_write_degrades_when_selection_moved() {
        let mut doc = MemoryDocument::new();
        let node = doc.add_accessibility_element("AXTextArea", "ship it now");
        let target = EditableTarget::new(TargetKind::AccessibilityElement, node);
        doc.select_accessibility(node, 0, 7);
        let info = capture_selection(&mut doc, &target).unwrap();
        doc.select_accessibility(node, 8, 11);

        let outcome = write_at_snapshot(&mut doc, &target, &info.snapshot, "Release").unwrap();
        assert_eq!(outcome, WriteOutcome::WholeField);
        assert_eq!(doc.field_value(node).as_deref(), Some("Release"));
    }
}
