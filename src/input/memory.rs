use crate::input::char_slice;
use crate::input::host::{HostError, HostResult, TextHost};
use crate::input::target::{
    DocumentSelection, ElementDescriptor, FieldSelection, NodeId, RangeId, SelectionDirection,
};
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone)]
enum Node {
    Field {
        descriptor: ElementDescriptor,
        value: String,
        selection: FieldSelection,
    },
    Region {
        descriptor: ElementDescriptor,
        children: Vec<NodeId>,
    },
    Text {
        text: String,
        parent: Option<NodeId>,
    },
    Accessibility {
        descriptor: ElementDescriptor,
        value: String,
        selected: Option<(usize, usize)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Boundary {
    node: NodeId,
    offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RangeData {
    start: Boundary,
    end: Boundary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoEntry {
    pub node: NodeId,
    pub previous: String,
}

/// A small in-process document: single-line and multiline fields, editable
/// regions made of text nodes, accessibility elements, one document selection,
/// and an undo log fed only by the undo-preserving insertion path.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
    ranges: HashMap<RangeId, RangeData>,
    selection: Option<RangeId>,
    active: Option<NodeId>,
    next_id: u64,
    insert_text_supported: bool,
    trusted: bool,
    input_events: Vec<NodeId>,
    undo_log: Vec<UndoEntry>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            ranges: HashMap::new(),
            selection: None,
            active: None,
            next_id: 1,
            insert_text_supported: true,
            trusted: true,
            input_events: Vec::new(),
            undo_log: Vec::new(),
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_field(&mut self, descriptor: ElementDescriptor, value: &str) -> NodeId {
        let id = NodeId(self.allocate());
        self.nodes.insert(
            id,
            Node::Field {
                descriptor,
                value: value.to_string(),
                selection: FieldSelection::default(),
            },
        );
        self.roots.push(id);
        id
    }

    /// Adds an editable region whose children are one text node per entry.
    pub fn add_region(&mut self, texts: &[&str]) -> NodeId {
        let region = NodeId(self.allocate());
        let mut children = Vec::with_capacity(texts.len());
        for text in texts {
            let child = NodeId(self.allocate());
            self.nodes.insert(
                child,
                Node::Text {
                    text: text.to_string(),
                    parent: Some(region),
                },
            );
            children.push(child);
        }
        self.nodes.insert(
            region,
            Node::Region {
                descriptor: ElementDescriptor::editable_region("div"),
                children,
            },
        );
        self.roots.push(region);
        region
    }

    pub fn add_accessibility_element(&mut self, role: &str, value: &str) -> NodeId {
        let id = NodeId(self.allocate());
        self.nodes.insert(
            id,
            Node::Accessibility {
                descriptor: ElementDescriptor::accessibility(role),
                value: value.to_string(),
                selected: None,
            },
        );
        self.roots.push(id);
        id
    }

    pub fn set_active(&mut self, node: Option<NodeId>) {
        self.active = node;
    }

    pub fn set_insert_text_supported(&mut self, supported: bool) {
        self.insert_text_supported = supported;
    }

    pub fn set_trusted(&mut self, trusted: bool) {
        self.trusted = trusted;
    }

    pub fn select_field(
        &mut self,
        node: NodeId,
        start: Option<usize>,
        end: Option<usize>,
        direction: SelectionDirection,
    ) {
        if let Some(Node::Field { selection, .. }) = self.nodes.get_mut(&node) {
            *selection = FieldSelection {
                start,
                end,
                direction,
            };
        }
    }

    pub fn select_accessibility(&mut self, node: NodeId, start: usize, end: usize) {
        if let Some(Node::Accessibility { selected, .. }) = self.nodes.get_mut(&node) {
            *selected = Some((start, end));
        }
    }

    pub fn text_nodes(&self, region: NodeId) -> Vec<NodeId> {
        match self.nodes.get(&region) {
            Some(Node::Region { children, .. }) => children.clone(),
            _ => Vec::new(),
        }
    }

    /// Selects `(child_index, offset)` to `(child_index, offset)` inside a region.
    pub fn select_in_region(
        &mut self,
        region: NodeId,
        start: (usize, usize),
        end: (usize, usize),
    ) -> Option<RangeId> {
        let children = self.text_nodes(region);
        let range = RangeData {
            start: Boundary {
                node: *children.get(start.0)?,
                offset: start.1,
            },
            end: Boundary {
                node: *children.get(end.0)?,
                offset: end.1,
            },
        };
        let id = self.store_range(range);
        self.selection = Some(id);
        Some(id)
    }

    /// Detaches a node (and, for regions, its text nodes) from the document.
    pub fn remove_node(&mut self, node: NodeId) {
        self.roots.retain(|root| *root != node);
        let parent = match self.nodes.get(&node) {
            Some(Node::Text { parent, .. }) => *parent,
            _ => None,
        };
        if let Some(parent) = parent {
            if let Some(Node::Region { children, .. }) = self.nodes.get_mut(&parent) {
                children.retain(|child| *child != node);
            }
            if let Some(Node::Text { parent, .. }) = self.nodes.get_mut(&node) {
                *parent = None;
            }
        }
        if self.active == Some(node) {
            self.active = None;
        }
    }

    /// Replaces all children of a region, as a framework re-render would.
    pub fn rerender_region(&mut self, region: NodeId, texts: &[&str]) {
        let new_children: Vec<NodeId> = texts
            .iter()
            .map(|text| {
                let child = NodeId(self.allocate());
                self.nodes.insert(
                    child,
                    Node::Text {
                        text: text.to_string(),
                        parent: Some(region),
                    },
                );
                child
            })
            .collect();
        self.replace_children(region, new_children);
    }

    /// Number of ranges the document is holding, live selection and copies alike.
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn input_events(&self) -> &[NodeId] {
        &self.input_events
    }

    pub fn undo_log(&self) -> &[UndoEntry] {
        &self.undo_log
    }

    /// Reverts the most recent undo-preserving insertion.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo_log.pop() else {
            return false;
        };
        let is_region = match self.nodes.get(&entry.node) {
            Some(Node::Field { .. }) | Some(Node::Accessibility { .. }) => false,
            Some(Node::Region { .. }) => true,
            _ => return false,
        };
        if is_region {
            let child = NodeId(self.allocate());
            self.nodes.insert(
                child,
                Node::Text {
                    text: entry.previous,
                    parent: Some(entry.node),
                },
            );
            self.replace_children(entry.node, vec![child]);
        } else {
            self.write_value(entry.node, &entry.previous);
        }
        true
    }

    fn store_range(&mut self, range: RangeData) -> RangeId {
        let id = RangeId(self.allocate());
        self.ranges.insert(id, range);
        id
    }

    fn replace_children(&mut self, region: NodeId, new_children: Vec<NodeId>) {
        let old = match self.nodes.get_mut(&region) {
            Some(Node::Region { children, .. }) => std::mem::replace(children, new_children),
            _ => return,
        };
        for child in old {
            if let Some(Node::Text { parent, .. }) = self.nodes.get_mut(&child) {
                *parent = None;
            }
        }
    }

    fn write_value(&mut self, node: NodeId, text: &str) {
        match self.nodes.get_mut(&node) {
            Some(Node::Field {
                value, selection, ..
            }) => {
                *value = text.to_string();
                let len = text.chars().count();
                *selection = FieldSelection {
                    start: Some(len),
                    end: Some(len),
                    direction: SelectionDirection::None,
                };
            }
            Some(Node::Accessibility {
                value, selected, ..
            }) => {
                *value = text.to_string();
                *selected = None;
            }
            _ => {}
        }
    }

    fn text_of(&self, node: NodeId) -> Option<&str> {
        match self.nodes.get(&node) {
            Some(Node::Text { text, .. }) => Some(text.as_str()),
            _ => None,
        }
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        match self.nodes.get(&node) {
            Some(Node::Text { parent, .. }) => *parent,
            _ => None,
        }
    }

    fn child_index(&self, region: NodeId, node: NodeId) -> Option<usize> {
        match self.nodes.get(&region) {
            Some(Node::Region { children, .. }) => children.iter().position(|c| *c == node),
            _ => None,
        }
    }

    /// Resolves a range to (region, start index, end index) when both ends are
    /// attached text nodes of the same region, in document order.
    fn resolve_range(&self, range: &RangeData) -> Option<(NodeId, usize, usize)> {
        let region = self.parent_of(range.start.node)?;
        if self.parent_of(range.end.node)? != region || !self.is_attached(region) {
            return None;
        }
        let start = self.child_index(region, range.start.node)?;
        let end = self.child_index(region, range.end.node)?;
        (start <= end).then_some((region, start, end))
    }

    fn splice_range(&mut self, range: RangeData, text: &str) -> HostResult<NodeId> {
        let (region, start_idx, end_idx) = self
            .resolve_range(&range)
            .ok_or(HostError::Detached(range.start.node))?;
        let children = self.text_nodes(region);

        let start_text = self.text_of(range.start.node).unwrap_or_default().to_string();
        let end_text = self.text_of(range.end.node).unwrap_or_default().to_string();
        let prefix = char_slice(&start_text, 0, range.start.offset);
        let suffix = char_slice(&end_text, range.end.offset, end_text.chars().count());

        let inserted = NodeId(self.allocate());
        self.nodes.insert(
            inserted,
            Node::Text {
                text: text.to_string(),
                parent: Some(region),
            },
        );
        let suffix_node = NodeId(self.allocate());
        self.nodes.insert(
            suffix_node,
            Node::Text {
                text: suffix,
                parent: Some(region),
            },
        );

        let mut rebuilt: Vec<NodeId> = children[..start_idx].to_vec();
        rebuilt.push(range.start.node);
        rebuilt.push(inserted);
        rebuilt.push(suffix_node);
        rebuilt.extend_from_slice(&children[end_idx + 1..]);

        // Nodes between the boundaries (and the end node when distinct) leave the tree.
        for child in &children[start_idx + 1..=end_idx] {
            if let Some(Node::Text { parent, .. }) = self.nodes.get_mut(child) {
                *parent = None;
            }
        }
        if let Some(Node::Text { text, .. }) = self.nodes.get_mut(&range.start.node) {
            *text = prefix;
        }
        if let Some(Node::Region { children, .. }) = self.nodes.get_mut(&region) {
            *children = rebuilt;
        }
        trace!(%region, "Spliced range in memory region");
        Ok(inserted)
    }

    fn collapse_selection_after(&mut self, node: NodeId) {
        let offset = self.text_of(node).map(|t| t.chars().count()).unwrap_or(0);
        let boundary = Boundary { node, offset };
        let id = self.store_range(RangeData {
            start: boundary,
            end: boundary,
        });
        self.selection = Some(id);
    }

    fn region_snapshot(&self, region: NodeId) -> String {
        self.text_nodes(region)
            .iter()
            .filter_map(|child| self.text_of(*child))
            .collect()
    }
}

impl TextHost for MemoryDocument {
    fn active_element(&self) -> Option<NodeId> {
        self.active
    }

    fn describe(&self, node: NodeId) -> Option<ElementDescriptor> {
        match self.nodes.get(&node)? {
            Node::Field { descriptor, .. }
            | Node::Region { descriptor, .. }
            | Node::Accessibility { descriptor, .. } => Some(descriptor.clone()),
            Node::Text { .. } => None,
        }
    }

    fn is_attached(&self, node: NodeId) -> bool {
        match self.nodes.get(&node) {
            Some(Node::Text { parent, .. }) => parent.is_some_and(|p| self.is_attached(p)),
            Some(_) => self.roots.contains(&node),
            None => false,
        }
    }

    fn focus(&mut self, node: NodeId) -> HostResult<()> {
        if !self.is_attached(node) {
            return Err(HostError::Detached(node));
        }
        self.active = Some(node);
        Ok(())
    }

    fn field_value(&self, node: NodeId) -> Option<String> {
        match self.nodes.get(&node)? {
            Node::Field { value, .. } | Node::Accessibility { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    fn field_selection(&self, node: NodeId) -> FieldSelection {
        match self.nodes.get(&node) {
            Some(Node::Field { selection, .. }) => *selection,
            _ => FieldSelection::default(),
        }
    }

    fn set_field_selection(
        &mut self,
        node: NodeId,
        start: usize,
        end: usize,
        direction: SelectionDirection,
    ) -> HostResult<()> {
        match self.nodes.get_mut(&node) {
            Some(Node::Field {
                value, selection, ..
            }) => {
                // Browsers clamp out-of-range offsets to the value length.
                let len = value.chars().count();
                *selection = FieldSelection {
                    start: Some(start.min(len)),
                    end: Some(end.min(len)),
                    direction,
                };
                Ok(())
            }
            _ => Err(HostError::Unsupported(node, "offset selection")),
        }
    }

    fn set_field_value(&mut self, node: NodeId, text: &str) -> HostResult<()> {
        match self.nodes.get(&node) {
            Some(Node::Field { .. }) | Some(Node::Accessibility { .. }) => {
                self.write_value(node, text);
                Ok(())
            }
            _ => Err(HostError::Unsupported(node, "value assignment")),
        }
    }

    fn set_field_range_text(
        &mut self,
        node: NodeId,
        text: &str,
        start: usize,
        end: usize,
    ) -> HostResult<()> {
        match self.nodes.get_mut(&node) {
            Some(Node::Field {
                value, selection, ..
            }) => {
                let len = value.chars().count();
                if start > end || end > len {
                    return Err(HostError::OutOfBounds { start, end });
                }
                *value = splice(value, start, end, text);
                let caret = start + text.chars().count();
                *selection = FieldSelection {
                    start: Some(caret),
                    end: Some(caret),
                    direction: SelectionDirection::None,
                };
                Ok(())
            }
            _ => Err(HostError::Unsupported(node, "range replacement")),
        }
    }

    fn rich_text(&self, node: NodeId) -> Option<String> {
        match self.nodes.get(&node)? {
            Node::Region { .. } => Some(self.region_snapshot(node)),
            _ => None,
        }
    }

    fn document_selection(&self) -> Option<DocumentSelection> {
        let id = self.selection?;
        let range = self.ranges.get(&id)?;
        Some(DocumentSelection {
            anchor: range.start.node,
            focus: range.end.node,
            collapsed: range.start == range.end,
            range: id,
        })
    }

    fn range_text(&self, range: RangeId) -> Option<String> {
        let data = self.ranges.get(&range)?;
        let (region, start_idx, end_idx) = self.resolve_range(data)?;
        let children = self.text_nodes(region);
        let mut out = String::new();
        for (idx, child) in children[start_idx..=end_idx].iter().enumerate() {
            let text = self.text_of(*child).unwrap_or_default();
            let len = text.chars().count();
            let from = if idx == 0 { data.start.offset.min(len) } else { 0 };
            let to = if start_idx + idx == end_idx {
                data.end.offset.min(len)
            } else {
                len
            };
            if from < to {
                out.push_str(&char_slice(text, from, to));
            }
        }
        Some(out)
    }

    fn clone_range(&mut self, range: RangeId) -> HostResult<RangeId> {
        let data = *self
            .ranges
            .get(&range)
            .ok_or(HostError::UnknownRange(range.0))?;
        Ok(self.store_range(data))
    }

    fn range_common_ancestor(&self, range: RangeId) -> Option<NodeId> {
        let data = self.ranges.get(&range)?;
        if data.start.node == data.end.node {
            return Some(data.start.node);
        }
        let (region, _, _) = self.resolve_range(data)?;
        Some(region)
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if !self.is_attached(ancestor) || !self.is_attached(node) {
            return false;
        }
        node == ancestor || self.parent_of(node) == Some(ancestor)
    }

    fn select_range(&mut self, range: RangeId) -> HostResult<()> {
        if !self.ranges.contains_key(&range) {
            return Err(HostError::UnknownRange(range.0));
        }
        self.selection = Some(range);
        Ok(())
    }

    fn select_node_contents(&mut self, node: NodeId) -> HostResult<()> {
        let mut children = self.text_nodes(node);
        if !matches!(self.nodes.get(&node), Some(Node::Region { .. })) {
            return Err(HostError::Unsupported(node, "node selection"));
        }
        if children.is_empty() {
            let child = NodeId(self.allocate());
            self.nodes.insert(
                child,
                Node::Text {
                    text: String::new(),
                    parent: Some(node),
                },
            );
            self.replace_children(node, vec![child]);
            children.push(child);
        }
        let first = children[0];
        let last = children[children.len() - 1];
        let last_len = self.text_of(last).map(|t| t.chars().count()).unwrap_or(0);
        let id = self.store_range(RangeData {
            start: Boundary {
                node: first,
                offset: 0,
            },
            end: Boundary {
                node: last,
                offset: last_len,
            },
        });
        self.selection = Some(id);
        Ok(())
    }

    fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn delete_range_and_insert_text(&mut self, range: RangeId, text: &str) -> HostResult<()> {
        let data = *self
            .ranges
            .get(&range)
            .ok_or(HostError::UnknownRange(range.0))?;
        self.splice_range(data, text).map(|_| ())
    }

    fn set_rich_text(&mut self, node: NodeId, text: &str) -> HostResult<()> {
        if !matches!(self.nodes.get(&node), Some(Node::Region { .. })) {
            return Err(HostError::Unsupported(node, "rich text assignment"));
        }
        let child = NodeId(self.allocate());
        self.nodes.insert(
            child,
            Node::Text {
                text: text.to_string(),
                parent: Some(node),
            },
        );
        self.replace_children(node, vec![child]);
        Ok(())
    }

    fn insert_text(&mut self, text: &str) -> bool {
        if !self.insert_text_supported {
            return false;
        }
        let Some(active) = self.active else {
            return false;
        };

        match self.nodes.get(&active).cloned() {
            Some(Node::Field {
                value, selection, ..
            }) => {
                let len = value.chars().count();
                let start = selection.start.unwrap_or(len).min(len);
                let end = selection.end.unwrap_or(start).clamp(start, len);
                self.undo_log.push(UndoEntry {
                    node: active,
                    previous: value.clone(),
                });
                if let Some(Node::Field {
                    value, selection, ..
                }) = self.nodes.get_mut(&active)
                {
                    *value = splice(value, start, end, text);
                    let caret = start + text.chars().count();
                    *selection = FieldSelection {
                        start: Some(caret),
                        end: Some(caret),
                        direction: SelectionDirection::None,
                    };
                }
                self.input_events.push(active);
                true
            }
            Some(Node::Region { .. }) => {
                let Some(range) = self.selection.and_then(|id| self.ranges.get(&id).copied())
                else {
                    return false;
                };
                if self.parent_of(range.start.node) != Some(active) {
                    return false;
                }
                let previous = self.region_snapshot(active);
                match self.splice_range(range, text) {
                    Ok(inserted) => {
                        self.undo_log.push(UndoEntry {
                            node: active,
                            previous,
                        });
                        self.collapse_selection_after(inserted);
                        self.input_events.push(active);
                        true
                    }
                    Err(_) => false,
                }
            }
            _ => false,
        }
    }

    fn dispatch_input_event(&mut self, node: NodeId) {
        self.input_events.push(node);
    }

    fn accessibility_trusted(&self) -> bool {
        self.trusted
    }

    fn selected_text(&self, node: NodeId) -> Option<String> {
        match self.nodes.get(&node)? {
            Node::Accessibility {
                value, selected, ..
            } => Some(match selected {
                Some((start, end)) => char_slice(value, *start, *end),
                None => String::new(),
            }),
            _ => None,
        }
    }

    fn set_selected_text(&mut self, node: NodeId, text: &str) -> HostResult<()> {
        match self.nodes.get_mut(&node) {
            Some(Node::Accessibility {
                value, selected, ..
            }) => {
                let Some((start, end)) = *selected else {
                    return Err(HostError::Failed("no selected text".to_string()));
                };
                *value = splice(value, start, end, text);
                *selected = None;
                Ok(())
            }
            _ => Err(HostError::Unsupported(node, "selected text attribute")),
        }
    }
}

fn splice(text: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut out: String = text.chars().take(start).collect();
    out.push_str(replacement);
    out.extend(text.chars().skip(end));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_text_spans_multiple_nodes() {
        let mut doc = MemoryDocument::new();
        let region = doc.add_region(&["Hello ", "brave ", "world"]);
        let range = doc.select_in_region(region, (0, 2), (2, 3)).unwrap();
        assert_eq!(doc.range_text(range).as_deref(), Some("llo brave wor"));
        assert_eq!(doc.range_common_ancestor(range), Some(region));
    }

    #[test]
    fn splice_replaces_span_and_detaches_inner_nodes() {
        let mut doc = MemoryDocument::new();
        let region = doc.add_region(&["Hello ", "brave ", "world"]);
        let middle = doc.text_nodes(region)[1];
        let range = doc.select_in_region(region, (0, 6), (2, 0)).unwrap();
        doc.delete_range_and_insert_text(range, "bold ").unwrap();
        assert_eq!(doc.rich_text(region).as_deref(), Some("Hello bold world"));
        assert!(!doc.is_attached(middle));
    }

    #[test]
    fn insert_text_on_field_records_undo() {
        let mut doc = MemoryDocument::new();
        let field = doc.add_field(ElementDescriptor::input("text"), "good morning");
        doc.set_active(Some(field));
        doc.select_field(field, Some(0), Some(4), SelectionDirection::Forward);
        assert!(doc.insert_text("nice"));
        assert_eq!(doc.field_value(field).as_deref(), Some("nice morning"));
        assert!(doc.undo());
        assert_eq!(doc.field_value(field).as_deref(), Some("good morning"));
    }

    #[test]
    fn unsupported_insert_reports_false() {
        let mut doc = MemoryDocument::new();
        let field = doc.add_field(ElementDescriptor::text_area(), "abc");
        doc.set_active(Some(field));
        doc.set_insert_text_supported(false);
        assert!(!doc.insert_text("x"));
        assert_eq!(doc.field_value(field).as_deref(), Some("abc"));
    }

    #[test]
    fn removed_region_detaches_its_text_nodes() {
        let mut doc = MemoryDocument::new();
        let region = doc.add_region(&["text"]);
        let child = doc.text_nodes(region)[0];
        doc.remove_node(region);
        assert!(!doc.is_attached(child));
        assert!(!doc.contains(region, child));
    }

    #[test]
    fn char_offsets_respect_multibyte_text() {
        let mut doc = MemoryDocument::new();
        let field = doc.add_field(ElementDescriptor::input("text"), "héllo wörld");
        doc.set_field_range_text(field, "W", 6, 7).unwrap();
        assert_eq!(doc.field_value(field).as_deref(), Some("héllo Wörld"));
    }
}
