use std::fmt;

/// Handle to a node owned by the host (element, text node, or accessibility element).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Handle to a host range object. Ranges are live: they follow the nodes they
/// point into for as long as those nodes stay attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    PlainField,
    MultilineField,
    RichRegion,
    AccessibilityElement,
}

impl TargetKind {
    pub fn label(&self) -> &'static str {
        match self {
            TargetKind::PlainField => "plain field",
            TargetKind::MultilineField => "multiline field",
            TargetKind::RichRegion => "rich region",
            TargetKind::AccessibilityElement => "accessibility element",
        }
    }

    pub fn is_offset_addressable(&self) -> bool {
        matches!(self, TargetKind::PlainField | TargetKind::MultilineField)
    }
}

/// The focused editable surface a capture/write cycle operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditableTarget {
    pub kind: TargetKind,
    pub node: NodeId,
}

impl EditableTarget {
    pub fn new(kind: TargetKind, node: NodeId) -> Self {
        Self { kind, node }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionDirection {
    Forward,
    Backward,
    #[default]
    None,
}

/// Structural facts about an element, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementTag {
    /// Single-line field; `input_type` is the lowercase type tag.
    Input { input_type: String },
    TextArea,
    /// Any other element (div, span, body ...).
    Other(String),
    /// Element exposed through an assistive API rather than a document.
    Accessibility { role: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub tag: ElementTag,
    pub autocomplete: Option<String>,
    pub content_editable: bool,
}

impl ElementDescriptor {
    pub fn input(input_type: &str) -> Self {
        Self {
            tag: ElementTag::Input {
                input_type: input_type.to_ascii_lowercase(),
            },
            autocomplete: None,
            content_editable: false,
        }
    }

    pub fn text_area() -> Self {
        Self {
            tag: ElementTag::TextArea,
            autocomplete: None,
            content_editable: false,
        }
    }

    pub fn editable_region(name: &str) -> Self {
        Self {
            tag: ElementTag::Other(name.to_string()),
            autocomplete: None,
            content_editable: true,
        }
    }

    pub fn accessibility(role: &str) -> Self {
        Self {
            tag: ElementTag::Accessibility {
                role: role.to_string(),
            },
            autocomplete: None,
            content_editable: false,
        }
    }

    pub fn with_autocomplete(mut self, hint: &str) -> Self {
        self.autocomplete = Some(hint.to_string());
        self
    }
}

/// Where a selection was at capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSnapshot {
    Offsets {
        start: usize,
        end: usize,
        direction: SelectionDirection,
    },
    Range(RangeId),
    /// Assistive APIs expose no stable offsets, only the selected text itself.
    /// A write re-checks it and otherwise degrades to the whole value.
    Accessibility { selected_text: String },
}

impl SelectionSnapshot {
    pub fn kind_label(&self) -> &'static str {
        match self {
            SelectionSnapshot::Offsets { .. } => "offsets",
            SelectionSnapshot::Range(_) => "range",
            SelectionSnapshot::Accessibility { .. } => "accessibility",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionInfo {
    pub text: String,
    pub snapshot: SelectionSnapshot,
}

/// Raw offset selection state of a field. Either bound may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldSelection {
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub direction: SelectionDirection,
}

/// The document's current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSelection {
    pub anchor: NodeId,
    pub focus: NodeId,
    pub collapsed: bool,
    pub range: RangeId,
}
