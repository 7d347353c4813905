use crate::input::target::{
    DocumentSelection, ElementDescriptor, FieldSelection, NodeId, RangeId, SelectionDirection,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("{0} is no longer attached")]
    Detached(NodeId),
    #[error("{0} does not support {1}")]
    Unsupported(NodeId, &'static str),
    #[error("range {0} is unknown to the host")]
    UnknownRange(u64),
    #[error("offsets {start}..{end} are out of bounds")]
    OutOfBounds { start: usize, end: usize },
    #[error("host call failed: {0}")]
    Failed(String),
}

pub type HostResult<T> = std::result::Result<T, HostError>;

/// The surface the capture/write protocol drives. Document hosts implement the
/// field and rich-region groups, desktop hosts the accessibility group.
/// Offsets are char offsets into the field value.
pub trait TextHost {
    fn active_element(&self) -> Option<NodeId>;
    fn describe(&self, node: NodeId) -> Option<ElementDescriptor>;
    fn is_attached(&self, node: NodeId) -> bool;
    fn focus(&mut self, node: NodeId) -> HostResult<()>;

    fn field_value(&self, node: NodeId) -> Option<String>;

    fn field_selection(&self, _node: NodeId) -> FieldSelection {
        FieldSelection::default()
    }

    fn set_field_selection(
        &mut self,
        node: NodeId,
        _start: usize,
        _end: usize,
        _direction: SelectionDirection,
    ) -> HostResult<()> {
        Err(HostError::Unsupported(node, "offset selection"))
    }

    fn set_field_value(&mut self, node: NodeId, _text: &str) -> HostResult<()> {
        Err(HostError::Unsupported(node, "value assignment"))
    }

    /// Replaces `start..end` and leaves the caret after the inserted text.
    fn set_field_range_text(
        &mut self,
        node: NodeId,
        _text: &str,
        _start: usize,
        _end: usize,
    ) -> HostResult<()> {
        Err(HostError::Unsupported(node, "range replacement"))
    }

    fn rich_text(&self, _node: NodeId) -> Option<String> {
        None
    }

    fn document_selection(&self) -> Option<DocumentSelection> {
        None
    }

    fn range_text(&self, _range: RangeId) -> Option<String> {
        None
    }

    fn clone_range(&mut self, range: RangeId) -> HostResult<RangeId> {
        Err(HostError::UnknownRange(range.0))
    }

    fn range_common_ancestor(&self, _range: RangeId) -> Option<NodeId> {
        None
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool;

    fn select_range(&mut self, range: RangeId) -> HostResult<()> {
        Err(HostError::UnknownRange(range.0))
    }

    fn select_node_contents(&mut self, node: NodeId) -> HostResult<()> {
        Err(HostError::Unsupported(node, "node selection"))
    }

    fn clear_selection(&mut self) {}

    fn delete_range_and_insert_text(&mut self, range: RangeId, _text: &str) -> HostResult<()> {
        Err(HostError::UnknownRange(range.0))
    }

    fn set_rich_text(&mut self, node: NodeId, _text: &str) -> HostResult<()> {
        Err(HostError::Unsupported(node, "rich text assignment"))
    }

    /// Undo-preserving insertion over the live selection. `false` when the
    /// primitive is missing or refused.
    fn insert_text(&mut self, _text: &str) -> bool {
        false
    }

    fn dispatch_input_event(&mut self, _node: NodeId) {}

    /// Whether every element query depends on the accessibility permission.
    fn requires_accessibility(&self) -> bool {
        false
    }

    fn accessibility_trusted(&self) -> bool {
        true
    }

    fn selected_text(&self, _node: NodeId) -> Option<String> {
        None
    }

    fn set_selected_text(&mut self, node: NodeId, _text: &str) -> HostResult<()> {
        Err(HostError::Unsupported(node, "selected text attribute"))
    }
}
