//! The Bridge
//!
//! Owns the connection handle and the handler set for one document. Hosts
//! build exactly one per page and feed it socket frames and DOM events.

use std::cell::Cell;
use std::rc::Rc;

use crate::config::BridgeConfig;
use crate::dom::{Document, EventTarget};
use crate::error::Result;
use crate::handlers::{DomMutations, HandlerContext, HandlerRegistry, InboundHandler, InputSync};
use crate::protocol::{InboundMessage, OutboundMessage};
use crate::storage::ThemeStorage;

/// Outgoing half of the backend connection.
pub trait Transport {
    fn send_text(&self, text: String) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn send_text(&self, text: String) -> Result<()> {
        (**self).send_text(text)
    }
}

pub struct Bridge<D, S, T> {
    config: BridgeConfig,
    document: D,
    storage: S,
    transport: T,
    handlers: HandlerRegistry,
    input_sync_registered: Cell<bool>,
}

impl<D, S, T> Bridge<D, S, T>
where
    D: Document,
    S: ThemeStorage,
    T: Transport,
{
    /// Create a bridge with the text, markup and theme handlers installed.
    pub fn new(config: BridgeConfig, document: D, storage: S, transport: T) -> Self {
        let handlers = HandlerRegistry::new();
        handlers.register(Rc::new(DomMutations));

        Self {
            config,
            document,
            storage,
            transport,
            handlers,
            input_sync_registered: Cell::new(false),
        }
    }

    /// Run startup registrations. Safe to call repeatedly.
    pub fn setup(&self) {
        self.register_input_sync();
    }

    /// Install the `update_input` handler unless it is already installed.
    ///
    /// Returns whether this call installed it.
    pub fn register_input_sync(&self) -> bool {
        if self.input_sync_registered.replace(true) {
            return false;
        }
        self.handlers.register(Rc::new(InputSync));
        log::debug!("Input sync handler registered");
        true
    }

    /// Add a handler that runs after the built-in ones.
    pub fn register_handler(&self, handler: Rc<dyn InboundHandler>) {
        self.handlers.register(handler);
    }

    pub fn on_open(&self) {
        log::info!("{}", self.config.connected_message);
    }

    /// Decode a text frame and apply it. Returns `false` if it was ignored.
    pub fn receive(&self, text: &str) -> bool {
        match InboundMessage::decode(text) {
            Some(message) => {
                self.apply(&message);
                true
            }
            None => false,
        }
    }

    /// Apply an already decoded message.
    pub fn apply(&self, message: &InboundMessage) {
        log::debug!("Applying {} {:?}", message.kind(), message.target_id());
        let cx = HandlerContext {
            document: &self.document,
            storage: &self.storage,
            config: &self.config,
        };
        self.handlers.dispatch(message, &cx);
    }

    /// Forward a click if the target is a backend component.
    pub fn on_click(&self, target: &(impl EventTarget + ?Sized)) -> Result<bool> {
        let Some(id) = self.component_id(target) else {
            return Ok(false);
        };
        self.send(&OutboundMessage::click(id))?;
        Ok(true)
    }

    /// Forward an input change if the target is a backend component.
    pub fn on_input(&self, target: &(impl EventTarget + ?Sized)) -> Result<bool> {
        let Some(id) = self.component_id(target) else {
            return Ok(false);
        };
        let value = target.value().unwrap_or_default();
        self.send(&OutboundMessage::input(id, value))?;
        Ok(true)
    }

    pub fn send(&self, message: &OutboundMessage) -> Result<()> {
        let text = message.encode()?;
        log::debug!("Sending {}", text);
        self.transport.send_text(text)
    }

    fn component_id(&self, target: &(impl EventTarget + ?Sized)) -> Option<String> {
        target
            .attribute(&self.config.component_attribute)
            .filter(|id| !id.is_empty())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::BridgeError;
    use crate::storage::MemoryStorage;
    use crate::virtual_dom::{VirtualDocument, VirtualElement};

    #[derive(Default)]
    struct RecordingTransport {
        sent: RefCell<Vec<String>>,
        closed: Cell<bool>,
    }

    impl Transport for RecordingTransport {
        fn send_text(&self, text: String) -> Result<()> {
            if self.closed.get() {
                return Err(BridgeError::NotOpen);
            }
            self.sent.borrow_mut().push(text);
            Ok(())
        }
    }

    type TestBridge = Bridge<VirtualDocument, MemoryStorage, RecordingTransport>;

    fn bridge() -> TestBridge {
        let document = VirtualDocument::new()
            .with_element(VirtualElement::new("title").with_text("Hello"))
            .with_element(VirtualElement::new("other").with_text("untouched"))
            .with_element(VirtualElement::new("main"))
            .with_element(VirtualElement::input("name", "").with_attribute("data-component-id", "name"));

        let bridge = Bridge::new(
            BridgeConfig::default(),
            document,
            MemoryStorage::new(),
            RecordingTransport::default(),
        );
        bridge.setup();
        bridge
    }

    fn sent(bridge: &TestBridge) -> Vec<String> {
        bridge.transport().sent.borrow().clone()
    }

    #[test]
    fn test_update_text() {
        let bridge = bridge();
        assert!(bridge.receive(r#"{"type":"update_text","id":"title","value":"Bye"}"#));

        assert_eq!(bridge.document().element("title").unwrap().text, "Bye");
        assert_eq!(bridge.document().element("other").unwrap().text, "untouched");
    }

    #[test]
    fn test_missing_targets_leave_document_unchanged() {
        let bridge = bridge();
        let before = bridge.document().elements();

        bridge.receive(r#"{"type":"update_text","id":"nope","value":"x"}"#);
        bridge.receive(r#"{"type":"replace","id":"nope","html":"<p>x</p>"}"#);
        bridge.receive(r#"{"type":"update_input","id":"nope","value":"x"}"#);

        assert_eq!(bridge.document().elements(), before);
    }

    #[test]
    fn test_malformed_and_unknown_frames_are_ignored() {
        let bridge = bridge();
        let before = bridge.document().elements();

        assert!(!bridge.receive("{"));
        assert!(!bridge.receive(r#"{"type":"delete_everything","id":"title"}"#));
        assert!(!bridge.receive(r#"{"type":"update_text","value":"no id"}"#));

        assert_eq!(bridge.document().elements(), before);
        assert_eq!(bridge.document().root_attribute("data-theme"), None);
    }

    #[test]
    fn test_replace() {
        let bridge = bridge();
        bridge.receive(r#"{"type":"replace","id":"main","html":"<div id=\"x\">screen</div>"}"#);

        assert_eq!(
            bridge.document().element("main").unwrap().inner_html.as_deref(),
            Some(r#"<div id="x">screen</div>"#)
        );
    }

    #[test]
    fn test_set_theme_sets_attribute_and_persists() {
        let bridge = bridge();
        bridge.receive(r#"{"type":"set_theme","theme":"dark"}"#);

        assert_eq!(bridge.document().root_attribute("data-theme").as_deref(), Some("dark"));
        assert_eq!(bridge.storage().get_item("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn test_update_input() {
        let bridge = bridge();
        bridge.receive(r#"{"type":"update_input","id":"name","value":"alice"}"#);

        assert_eq!(
            bridge.document().element("name").unwrap().value.as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_input_sync_registers_once() {
        let bridge = bridge();
        let count = bridge.handler_count();

        bridge.setup();
        bridge.setup();
        assert!(!bridge.register_input_sync());
        assert_eq!(bridge.handler_count(), count);
    }

    #[test]
    fn test_update_input_applies_once_per_message() {
        struct CountingDocument {
            inner: VirtualDocument,
            value_writes: Cell<u32>,
        }

        impl Document for CountingDocument {
            fn set_text_content(&self, id: &str, value: &str) -> bool {
                self.inner.set_text_content(id, value)
            }
            fn set_inner_html(&self, id: &str, html: &str) -> bool {
                self.inner.set_inner_html(id, html)
            }
            fn set_input_value(&self, id: &str, value: &str) -> bool {
                self.value_writes.set(self.value_writes.get() + 1);
                self.inner.set_input_value(id, value)
            }
            fn set_root_attribute(&self, name: &str, value: &str) {
                self.inner.set_root_attribute(name, value)
            }
            fn reload(&self) {
                self.inner.reload()
            }
        }

        let document = CountingDocument {
            inner: VirtualDocument::new().with_element(VirtualElement::input("name", "")),
            value_writes: Cell::new(0),
        };
        let bridge = Bridge::new(
            BridgeConfig::default(),
            document,
            MemoryStorage::new(),
            RecordingTransport::default(),
        );
        for _ in 0..3 {
            bridge.setup();
        }

        bridge.receive(r#"{"type":"update_input","id":"name","value":"a"}"#);
        assert_eq!(bridge.document().value_writes.get(), 1);
    }

    #[test]
    fn test_update_input_needs_setup() {
        let bridge = Bridge::new(
            BridgeConfig::default(),
            VirtualDocument::new().with_element(VirtualElement::input("name", "before")),
            MemoryStorage::new(),
            RecordingTransport::default(),
        );
        bridge.receive(r#"{"type":"update_input","id":"name","value":"after"}"#);

        assert_eq!(
            bridge.document().element("name").unwrap().value.as_deref(),
            Some("before")
        );
    }

    #[test]
    fn test_click_sends_component_id() {
        let bridge = bridge();
        let button = VirtualElement::new("btn-1").with_attribute("data-component-id", "btn");

        assert!(bridge.on_click(&button).unwrap());
        assert_eq!(sent(&bridge), vec![r#"{"type":"click","id":"btn"}"#]);
    }

    #[test]
    fn test_click_without_component_id_sends_nothing() {
        let bridge = bridge();
        let plain = VirtualElement::new("plain");
        let empty = VirtualElement::new("empty").with_attribute("data-component-id", "");

        assert!(!bridge.on_click(&plain).unwrap());
        assert!(!bridge.on_click(&empty).unwrap());
        assert!(sent(&bridge).is_empty());
    }

    #[test]
    fn test_input_sends_current_value() {
        let bridge = bridge();
        let field = VirtualElement::input("f", "hello").with_attribute("data-component-id", "field");

        assert!(bridge.on_input(&field).unwrap());
        assert_eq!(
            sent(&bridge),
            vec![r#"{"type":"input","id":"field","value":"hello"}"#]
        );

        assert!(!bridge.on_input(&VirtualElement::input("g", "x")).unwrap());
        assert_eq!(sent(&bridge).len(), 1);
    }

    #[test]
    fn test_send_failure_is_reported() {
        let bridge = bridge();
        bridge.transport().closed.set(true);
        let button = VirtualElement::new("b").with_attribute("data-component-id", "b");

        assert!(matches!(bridge.on_click(&button), Err(BridgeError::NotOpen)));
    }

    #[test]
    fn test_custom_attribute_names() {
        let config = BridgeConfig::default()
            .with_component_attribute("data-tau")
            .with_theme_attribute("data-mode")
            .with_theme_storage_key("mode");
        let bridge = Bridge::new(
            config,
            VirtualDocument::new(),
            MemoryStorage::new(),
            RecordingTransport::default(),
        );

        let button = VirtualElement::new("b").with_attribute("data-tau", "b");
        assert!(bridge.on_click(&button).unwrap());

        bridge.receive(r#"{"type":"set_theme","theme":"night"}"#);
        assert_eq!(bridge.document().root_attribute("data-mode").as_deref(), Some("night"));
        assert_eq!(bridge.storage().get_item("mode").unwrap().as_deref(), Some("night"));
    }

    #[test]
    fn test_hot_reload_reloads_document() {
        let bridge = bridge();
        bridge.receive(r#"{"type":"hot_reload","message":"hot_reload"}"#);
        bridge.receive(r#"{"type":"hmr_error","message":"SyntaxError"}"#);

        assert_eq!(bridge.document().reload_count(), 1);
    }

    #[test]
    fn test_custom_handlers_run_after_builtins() {
        struct Recorder(RefCell<Vec<&'static str>>);

        impl InboundHandler for Recorder {
            fn handle(&self, message: &InboundMessage, _cx: &HandlerContext<'_>) {
                self.0.borrow_mut().push(message.kind());
            }
        }

        let bridge = bridge();
        let recorder = Rc::new(Recorder(RefCell::new(Vec::new())));
        bridge.register_handler(recorder.clone());

        bridge.receive(r#"{"type":"set_theme","theme":"dark"}"#);
        bridge.receive("garbage");
        assert_eq!(*recorder.0.borrow(), vec!["set_theme"]);
    }
}
