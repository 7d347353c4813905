use crate::input::host::{HostError, HostResult, TextHost};
use crate::input::target::{ElementDescriptor, NodeId};
use accessibility_sys::{
    kAXErrorSuccess, kAXFocusedAttribute, kAXFocusedUIElementAttribute, kAXRoleAttribute,
    kAXSecureTextFieldSubrole, kAXSelectedTextAttribute, kAXSubroleAttribute, kAXValueAttribute,
    AXError, AXIsProcessTrusted, AXUIElementCopyAttributeValue, AXUIElementCreateSystemWide,
    AXUIElementIsAttributeSettable, AXUIElementRef, AXUIElementSetAttributeValue,
};
use core_foundation::base::{CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::string::CFString;
use std::cell::RefCell;
use tracing::{debug, warn};

/// A retained AXUIElement.
#[derive(Clone, PartialEq)]
struct AxElement(CFType);

// AXUIElement references are CF objects with atomic retain counts and the AX
// calls made here may come from any thread.
unsafe impl Send for AxElement {}

impl AxElement {
    /// Takes ownership of a reference returned by a Create/Copy call.
    fn from_create(ptr: CFTypeRef) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            Some(Self(unsafe { CFType::wrap_under_create_rule(ptr) }))
        }
    }

    fn raw(&self) -> AXUIElementRef {
        self.0.as_CFTypeRef() as AXUIElementRef
    }

    fn copy_attribute(&self, attribute: &str) -> Option<CFType> {
        let name = CFString::new(attribute);
        let mut value: CFTypeRef = std::ptr::null();
        let status = unsafe {
            AXUIElementCopyAttributeValue(self.raw(), name.as_concrete_TypeRef(), &mut value)
        };
        if status != kAXErrorSuccess || value.is_null() {
            return None;
        }
        Some(unsafe { CFType::wrap_under_create_rule(value) })
    }

    fn element_attribute(&self, attribute: &str) -> Option<AxElement> {
        self.copy_attribute(attribute).map(AxElement)
    }

    fn string_attribute(&self, attribute: &str) -> Option<String> {
        self.copy_attribute(attribute)?
            .downcast::<CFString>()
            .map(|value| value.to_string())
    }

    fn set_attribute(&self, attribute: &str, value: &CFType) -> Result<(), AXError> {
        let name = CFString::new(attribute);
        let status = unsafe {
            AXUIElementSetAttributeValue(
                self.raw(),
                name.as_concrete_TypeRef(),
                value.as_CFTypeRef(),
            )
        };
        if status == kAXErrorSuccess {
            Ok(())
        } else {
            Err(status)
        }
    }

    fn set_string_attribute(&self, attribute: &str, text: &str) -> Result<(), AXError> {
        self.set_attribute(attribute, &CFString::new(text).as_CFType())
    }

    fn is_settable(&self, attribute: &str) -> bool {
        let name = CFString::new(attribute);
        let mut settable = 0;
        let status = unsafe {
            AXUIElementIsAttributeSettable(self.raw(), name.as_concrete_TypeRef(), &mut settable)
        };
        status == kAXErrorSuccess && settable != 0
    }

    fn is_alive(&self) -> bool {
        self.copy_attribute(kAXRoleAttribute).is_some()
    }
}

/// Drives the focused element of whatever application is frontmost through
/// the macOS Accessibility API.
pub struct AccessibilityHost {
    system: AxElement,
    elements: RefCell<Vec<(NodeId, AxElement)>>,
    next_id: RefCell<u64>,
}

impl AccessibilityHost {
    pub fn new() -> anyhow::Result<Self> {
        let system = AxElement::from_create(unsafe { AXUIElementCreateSystemWide() } as CFTypeRef)
            .ok_or_else(|| anyhow::anyhow!("Failed to create the system-wide AX element"))?;
        Ok(Self {
            system,
            elements: RefCell::new(Vec::new()),
            next_id: RefCell::new(1),
        })
    }

    /// Opens the Accessibility pane of System Settings.
    pub fn request_access() -> anyhow::Result<()> {
        std::process::Command::new("open")
            .arg("x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility")
            .spawn()?;
        Ok(())
    }

    fn element(&self, node: NodeId) -> Option<AxElement> {
        self.elements
            .borrow()
            .iter()
            .find(|(id, _)| *id == node)
            .map(|(_, element)| element.clone())
    }

    fn require(&self, node: NodeId) -> HostResult<AxElement> {
        self.element(node).ok_or(HostError::Detached(node))
    }

    /// Reuses the id of an element that compares equal, so refocusing the
    /// same control yields the same node.
    fn register(&self, element: AxElement) -> NodeId {
        let mut elements = self.elements.borrow_mut();
        if let Some((id, _)) = elements.iter().find(|(_, known)| *known == element) {
            return *id;
        }

        // Drop elements whose process or window went away.
        elements.retain(|(_, known)| known.is_alive());

        let mut next = self.next_id.borrow_mut();
        let id = NodeId(*next);
        *next += 1;
        elements.push((id, element));
        id
    }
}

impl TextHost for AccessibilityHost {
    fn active_element(&self) -> Option<NodeId> {
        let focused = self.system.element_attribute(kAXFocusedUIElementAttribute)?;
        Some(self.register(focused))
    }

    fn describe(&self, node: NodeId) -> Option<ElementDescriptor> {
        let element = self.element(node)?;
        let role = element.string_attribute(kAXRoleAttribute)?;
        let subrole = element.string_attribute(kAXSubroleAttribute);
        if subrole.as_deref() == Some(kAXSecureTextFieldSubrole) {
            return Some(ElementDescriptor::accessibility(kAXSecureTextFieldSubrole));
        }

        // Buttons, lists and other read-only controls are not text surfaces.
        if !element.is_settable(kAXValueAttribute) && !element.is_settable(kAXSelectedTextAttribute)
        {
            debug!(role = %role, "Focused element is not editable");
            return None;
        }
        Some(ElementDescriptor::accessibility(&role))
    }

    fn is_attached(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(|element| element.is_alive())
    }

    fn focus(&mut self, node: NodeId) -> HostResult<()> {
        let element = self.require(node)?;
        let value = CFBoolean::true_value().as_CFType();
        if let Err(status) = element.set_attribute(kAXFocusedAttribute, &value) {
            // Many apps refuse AXFocused while still accepting writes.
            debug!(node = %node, status, "AXFocused was not accepted");
        }
        Ok(())
    }

    fn field_value(&self, node: NodeId) -> Option<String> {
        self.element(node)?.string_attribute(kAXValueAttribute)
    }

    fn set_field_value(&mut self, node: NodeId, text: &str) -> HostResult<()> {
        let element = self.require(node)?;
        element.set_string_attribute(kAXValueAttribute, text).map_err(|status| {
            warn!(node = %node, status, "Setting AXValue failed");
            HostError::Failed(format!("AXValue write failed ({status})"))
        })
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node
    }

    fn requires_accessibility(&self) -> bool {
        true
    }

    fn accessibility_trusted(&self) -> bool {
        unsafe { AXIsProcessTrusted() }
    }

    fn selected_text(&self, node: NodeId) -> Option<String> {
        self.element(node)?.string_attribute(kAXSelectedTextAttribute)
    }

    fn set_selected_text(&mut self, node: NodeId, text: &str) -> HostResult<()> {
        let element = self.require(node)?;
        element.set_string_attribute(kAXSelectedTextAttribute, text).map_err(|status| {
            warn!(node = %node, status, "Setting AXSelectedText failed");
            HostError::Failed(format!("AXSelectedText write failed ({status})"))
        })
    }
}
