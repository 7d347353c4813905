use crate::input::target::{ElementDescriptor, ElementTag, TargetKind};

/// Field types that never carry user prose.
const UNSAFE_INPUT_TYPES: &[&str] = &[
    "password", "hidden", "file", "submit", "button", "reset", "image",
];

/// Autocomplete tokens marking credential or payment fields.
const SENSITIVE_AUTOCOMPLETE: &[&str] = &[
    "cc-name",
    "cc-number",
    "cc-exp",
    "cc-exp-month",
    "cc-exp-year",
    "cc-csc",
    "cc-type",
    "new-password",
    "current-password",
];

const SECURE_ACCESSIBILITY_ROLES: &[&str] = &["AXSecureTextField"];

pub fn is_eligible(element: Option<&ElementDescriptor>) -> bool {
    classify(element).is_some()
}

/// Decides which kind of editable surface an element is, if it may be captured at all.
pub fn classify(element: Option<&ElementDescriptor>) -> Option<TargetKind> {
    let element = element?;

    match &element.tag {
        ElementTag::Input { input_type } => {
            if UNSAFE_INPUT_TYPES
                .iter()
                .any(|unsafe_type| unsafe_type.eq_ignore_ascii_case(input_type))
            {
                return None;
            }
            if has_sensitive_autocomplete(element.autocomplete.as_deref()) {
                return None;
            }
            Some(TargetKind::PlainField)
        }
        ElementTag::TextArea => Some(TargetKind::MultilineField),
        ElementTag::Accessibility { role } => {
            if SECURE_ACCESSIBILITY_ROLES.contains(&role.as_str()) {
                None
            } else {
                Some(TargetKind::AccessibilityElement)
            }
        }
        ElementTag::Other(_) if element.content_editable => Some(TargetKind::RichRegion),
        ElementTag::Other(_) => None,
    }
}

fn has_sensitive_autocomplete(hint: Option<&str>) -> bool {
    let Some(hint) = hint else {
        return false;
    };

    // Hints are token lists ("section-pay billing cc-number").
    hint.split_whitespace().any(|token| {
        SENSITIVE_AUTOCOMPLETE
            .iter()
            .any(|sensitive| sensitive.eq_ignore_ascii_case(token))
    })
}
