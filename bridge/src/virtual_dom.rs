//! In-memory document used by headless hosts and tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use crate::dom::{Document, EventTarget};

/// A single element of a [`VirtualDocument`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VirtualElement {
    pub id: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub inner_html: Option<String>,
    pub value: Option<String>,
}

impl VirtualElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// An element with an editable value, like `<input>`.
    pub fn input(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::new(id)
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

impl EventTarget for VirtualElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn value(&self) -> Option<String> {
        self.value.clone()
    }
}

/// Flat id-indexed document. Elements are owned by the document and
/// mutated through the [`Document`] trait.
#[derive(Debug, Default)]
pub struct VirtualDocument {
    elements: RefCell<HashMap<String, VirtualElement>>,
    root_attributes: RefCell<BTreeMap<String, String>>,
    reloads: Cell<u32>,
}

impl VirtualDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element, replacing any element with the same id.
    pub fn insert(&self, element: VirtualElement) {
        self.elements
            .borrow_mut()
            .insert(element.id.clone(), element);
    }

    pub fn with_element(self, element: VirtualElement) -> Self {
        self.insert(element);
        self
    }

    /// Snapshot of the element with `id`.
    pub fn element(&self, id: &str) -> Option<VirtualElement> {
        self.elements.borrow().get(id).cloned()
    }

    /// Snapshot of every element, sorted by id.
    pub fn elements(&self) -> Vec<VirtualElement> {
        let mut elements: Vec<_> = self.elements.borrow().values().cloned().collect();
        elements.sort_by(|a, b| a.id.cmp(&b.id));
        elements
    }

    pub fn root_attribute(&self, name: &str) -> Option<String> {
        self.root_attributes.borrow().get(name).cloned()
    }

    pub fn reload_count(&self) -> u32 {
        self.reloads.get()
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut VirtualElement)) -> bool {
        match self.elements.borrow_mut().get_mut(id) {
            Some(element) => {
                f(element);
                true
            }
            None => false,
        }
    }
}

impl Document for VirtualDocument {
    fn set_text_content(&self, id: &str, value: &str) -> bool {
        self.update(id, |element| {
            element.text = value.to_string();
            element.inner_html = None;
        })
    }

    fn set_inner_html(&self, id: &str, html: &str) -> bool {
        self.update(id, |element| {
            element.inner_html = Some(html.to_string());
            element.text.clear();
        })
    }

    fn set_input_value(&self, id: &str, value: &str) -> bool {
        self.update(id, |element| element.value = Some(value.to_string()))
    }

    fn set_root_attribute(&self, name: &str, value: &str) {
        self.root_attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
    }
}
