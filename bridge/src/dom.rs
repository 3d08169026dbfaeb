//! Document Abstraction
//!
//! The bridge never touches a concrete DOM. Hosts implement these traits for
//! whatever they render into: the browser DOM, or [`crate::VirtualDocument`].

/// Mutation surface used when applying backend messages.
///
/// Element setters return `false` when no element has the given id; callers
/// treat that as a skipped mutation, never as an error.
pub trait Document {
    /// Set the visible text of the element with `id`.
    fn set_text_content(&self, id: &str, value: &str) -> bool;

    /// Replace the markup inside the element with `id`.
    fn set_inner_html(&self, id: &str, html: &str) -> bool;

    /// Set the editable value of the element with `id`.
    fn set_input_value(&self, id: &str, value: &str) -> bool;

    /// Set an attribute on the document root element.
    fn set_root_attribute(&self, name: &str, value: &str);

    /// Reload the whole document.
    fn reload(&self);
}

/// The element an input or click event originated from.
pub trait EventTarget {
    fn attribute(&self, name: &str) -> Option<String>;

    /// Current value for editable elements, `None` for everything else.
    fn value(&self) -> Option<String>;
}
