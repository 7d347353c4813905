use crate::input::host::TextHost;
use crate::input::char_slice;
use crate::input::target::{
    EditableTarget, RangeId, SelectionInfo, SelectionSnapshot, TargetKind,
};
use tracing::debug;

/// Reads the target's selection without touching the host's state. `None`
/// means there is nothing actionable: no selection, a collapsed one, a
/// selection outside the target, or whitespace only.
pub fn capture_selection<H: TextHost + ?Sized>(
    host: &mut H,
    target: &EditableTarget,
) -> Option<SelectionInfo> {
    match target.kind {
        TargetKind::PlainField | TargetKind::MultilineField => capture_offsets(host, target),
        TargetKind::RichRegion => capture_range(host, target),
        TargetKind::AccessibilityElement => {
            let text = host.selected_text(target.node)?;
            if text.is_empty() {
                return None;
            }
            Some(SelectionInfo {
                snapshot: SelectionSnapshot::Accessibility {
                    selected_text: text.clone(),
                },
                text,
            })
        }
    }
}

/// Whether [`capture_selection`] would find something, without copying any
/// range into the host.
pub fn has_selection<H: TextHost + ?Sized>(host: &H, target: &EditableTarget) -> bool {
    match target.kind {
        TargetKind::RichRegion => selected_range(host, target).is_some(),
        kind if kind.is_offset_addressable() => capture_offsets(host, target).is_some(),
        _ => host
            .selected_text(target.node)
            .is_some_and(|text| !text.is_empty()),
    }
}

/// Full current value of the target, untrimmed.
pub fn capture_whole_text<H: TextHost + ?Sized>(host: &H, target: &EditableTarget) -> String {
    let text = match target.kind {
        TargetKind::RichRegion => host.rich_text(target.node),
        _ => host.field_value(target.node),
    };
    text.unwrap_or_default()
}

fn capture_offsets<H: TextHost + ?Sized>(
    host: &H,
    target: &EditableTarget,
) -> Option<SelectionInfo> {
    let selection = host.field_selection(target.node);
    let (start, end) = (selection.start?, selection.end?);
    if start == end {
        return None;
    }

    let value = host.field_value(target.node)?;
    let text = char_slice(&value, start, end);
    if text.trim().is_empty() {
        return None;
    }

    Some(SelectionInfo {
        text,
        snapshot: SelectionSnapshot::Offsets {
            start,
            end,
            direction: selection.direction,
        },
    })
}

fn selected_range<H: TextHost + ?Sized>(
    host: &H,
    target: &EditableTarget,
) -> Option<(RangeId, String)> {
    let selection = host.document_selection()?;
    if selection.collapsed {
        return None;
    }

    if !host.contains(target.node, selection.anchor) || !host.contains(target.node, selection.focus)
    {
        debug!(target = %target.node, "Document selection escapes the focused region");
        return None;
    }

    let text = host.range_text(selection.range)?;
    if text.trim().is_empty() {
        return None;
    }
    Some((selection.range, text))
}

fn capture_range<H: TextHost + ?Sized>(
    host: &mut H,
    target: &EditableTarget,
) -> Option<SelectionInfo> {
    let (live, text) = selected_range(host, target)?;
    // The live selection keeps moving; keep a copy of where it is now.
    let range = host.clone_range(live).ok()?;
    Some(SelectionInfo {
        text,
        snapshot: SelectionSnapshot::Range(range),
    })
}
