pub mod capture;
pub mod classifier;
pub mod host;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod memory;
pub mod target;
pub mod writer;

pub use capture::{capture_selection, capture_whole_text, has_selection};
pub use classifier::{classify, is_eligible};
pub use host::{HostError, HostResult, TextHost};
pub use memory::MemoryDocument;
pub use target::{
    EditableTarget, ElementDescriptor, NodeId, RangeId, SelectionDirection, SelectionInfo,
    SelectionSnapshot, TargetKind,
};
pub use writer::{write_at_snapshot, write_whole, WriteOutcome};

/// Chars `start..end` of `text`; out-of-range bounds clamp to the end.
pub(crate) fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}
