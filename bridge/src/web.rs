//! Browser Host
//!
//! Binds a [`Bridge`] to the page it is loaded into: the live DOM,
//! `localStorage`, and a browser `WebSocket`.
//!
//! ```js
//! import init, { connect } from "./taupy_bridge.js";
//!
//! await init();
//! const bridge = connect();            // ws://localhost:8765
//! // bridge.free() detaches all listeners
//! ```

use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    CloseEvent, Element, Event, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement,
    MessageEvent, WebSocket,
};

use crate::bridge::{Bridge, Transport};
use crate::config::BridgeConfig;
use crate::dom::{self, Document};
use crate::error::{BridgeError, Result};
use crate::storage::ThemeStorage;

/// The page's live DOM.
pub struct WebDocument {
    document: web_sys::Document,
}

impl WebDocument {
    pub fn new(document: web_sys::Document) -> Self {
        Self { document }
    }

    /// The document of the current window.
    pub fn current() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| platform("no window"))?;
        let document = window.document().ok_or_else(|| platform("no document"))?;
        Ok(Self::new(document))
    }

    fn element(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }
}

impl Document for WebDocument {
    fn set_text_content(&self, id: &str, value: &str) -> bool {
        let Some(element) = self.element(id) else {
            return false;
        };
        element.set_text_content(Some(value));
        true
    }

    fn set_inner_html(&self, id: &str, html: &str) -> bool {
        let Some(element) = self.element(id) else {
            return false;
        };
        element.set_inner_html(html);
        true
    }

    fn set_input_value(&self, id: &str, value: &str) -> bool {
        let Some(element) = self.element(id) else {
            return false;
        };
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(textarea) = element.dyn_ref::<HtmlTextAreaElement>() {
            textarea.set_value(value);
        } else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
            select.set_value(value);
        } else {
            log::debug!("update_input: #{} is not editable", id);
            return false;
        }
        true
    }

    fn set_root_attribute(&self, name: &str, value: &str) {
        let Some(root) = self.document.document_element() else {
            return;
        };
        if let Err(e) = root.set_attribute(name, value) {
            log::warn!("Failed to set root attribute {}: {:?}", name, e);
        }
    }

    fn reload(&self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        if let Err(e) = window.location().reload() {
            log::warn!("Failed to reload: {:?}", e);
        }
    }
}

impl dom::EventTarget for Element {
    fn attribute(&self, name: &str) -> Option<String> {
        self.get_attribute(name)
    }

    fn value(&self) -> Option<String> {
        if let Some(input) = self.dyn_ref::<HtmlInputElement>() {
            Some(input.value())
        } else if let Some(textarea) = self.dyn_ref::<HtmlTextAreaElement>() {
            Some(textarea.value())
        } else {
            self.dyn_ref::<HtmlSelectElement>().map(|select| select.value())
        }
    }
}

/// `window.localStorage`.
pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    pub fn current() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| platform("no window"))?;
        let storage = window
            .local_storage()
            .map_err(|e| BridgeError::Storage(format!("{:?}", e)))?
            .ok_or_else(|| BridgeError::Storage("local storage is unavailable".to_string()))?;
        Ok(Self { storage })
    }
}

impl ThemeStorage for LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| BridgeError::Storage(format!("{:?}", e)))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| BridgeError::Storage(format!("{:?}", e)))
    }
}

/// Browser socket as a bridge transport.
pub struct SocketTransport {
    socket: WebSocket,
}

impl Transport for SocketTransport {
    fn send_text(&self, text: String) -> Result<()> {
        if self.socket.ready_state() != WebSocket::OPEN {
            return Err(BridgeError::NotOpen);
        }
        self.socket
            .send_with_str(&text)
            .map_err(|e| platform(&format!("{:?}", e)))
    }
}

type WebBridge = Bridge<WebDocument, LocalStorage, SocketTransport>;

/// Keeps a connected bridge and its listeners alive.
///
/// Dropping it (`free()` from JS) detaches every listener.
#[wasm_bindgen]
pub struct BridgeHandle {
    bridge: Rc<WebBridge>,
    socket: WebSocket,
    document: web_sys::Document,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
    on_click: Closure<dyn FnMut(Event)>,
    on_input: Closure<dyn FnMut(Event)>,
}

#[wasm_bindgen]
impl BridgeHandle {
    /// Socket ready state, as in `WebSocket.readyState`.
    #[wasm_bindgen(getter, js_name = readyState)]
    pub fn ready_state(&self) -> u16 {
        self.socket.ready_state()
    }

    /// Close the backend socket. Listeners stay attached until the handle
    /// is freed.
    pub fn close(&self) -> std::result::Result<(), JsValue> {
        self.socket.close()
    }

    /// Apply a frame as if the backend had sent it.
    pub fn receive(&self, text: &str) -> bool {
        self.bridge.receive(text)
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.socket.set_onopen(None);
        self.socket.set_onmessage(None);
        self.socket.set_onclose(None);
        let _ = self
            .document
            .remove_event_listener_with_callback("click", self.on_click.as_ref().unchecked_ref());
        let _ = self
            .document
            .remove_event_listener_with_callback("input", self.on_input.as_ref().unchecked_ref());
        log::debug!("Bridge listeners detached");
    }
}

/// Connect the current page to the backend at `endpoint`
/// (default `ws://localhost:8765`).
#[wasm_bindgen]
pub fn connect(endpoint: Option<String>) -> std::result::Result<BridgeHandle, JsValue> {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    let mut config = BridgeConfig::default();
    if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
        config = config.with_endpoint(&endpoint).map_err(to_js)?;
    }
    attach(config).map_err(to_js)
}

/// Open the socket described by `config` and wire it to the current page.
pub fn attach(config: BridgeConfig) -> Result<BridgeHandle> {
    let document = WebDocument::current()?;
    let page = document.document.clone();
    let storage = LocalStorage::current()?;

    let socket = WebSocket::new(config.endpoint.as_str())
        .map_err(|e| platform(&format!("failed to open {}: {:?}", config.endpoint, e)))?;

    let bridge = Rc::new(Bridge::new(
        config,
        document,
        storage,
        SocketTransport {
            socket: socket.clone(),
        },
    ));
    bridge.setup();

    let on_open = {
        let bridge = bridge.clone();
        Closure::<dyn FnMut(Event)>::wrap(Box::new(move |_event| bridge.on_open()))
    };
    socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));

    let on_message = {
        let bridge = bridge.clone();
        Closure::<dyn FnMut(MessageEvent)>::wrap(Box::new(move |event: MessageEvent| {
            match event.data().as_string() {
                Some(text) => {
                    bridge.receive(&text);
                }
                None => log::debug!("Ignoring non-text socket frame"),
            }
        }))
    };
    socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

    let on_close = Closure::<dyn FnMut(CloseEvent)>::wrap(Box::new(|event: CloseEvent| {
        log::warn!("Backend connection closed ({} {})", event.code(), event.reason());
    }));
    socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));

    let on_click = {
        let bridge = bridge.clone();
        Closure::<dyn FnMut(Event)>::wrap(Box::new(move |event: Event| {
            let Some(target) = event_element(&event) else {
                return;
            };
            if let Err(e) = bridge.on_click(&target) {
                log::debug!("Click not sent: {}", e);
            }
        }))
    };
    page.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
        .map_err(|e| platform(&format!("{:?}", e)))?;

    let on_input = {
        let bridge = bridge.clone();
        Closure::<dyn FnMut(Event)>::wrap(Box::new(move |event: Event| {
            let Some(target) = event_element(&event) else {
                return;
            };
            if let Err(e) = bridge.on_input(&target) {
                log::debug!("Input not sent: {}", e);
            }
        }))
    };
    page.add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref())
        .map_err(|e| platform(&format!("{:?}", e)))?;

    Ok(BridgeHandle {
        bridge,
        socket,
        document: page,
        _on_open: on_open,
        _on_message: on_message,
        _on_close: on_close,
        on_click,
        on_input,
    })
}

fn event_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

fn platform(message: &str) -> BridgeError {
    BridgeError::Platform(message.to_string())
}

fn to_js(error: BridgeError) -> JsValue {
    JsValue::from_str(&error.to_string())
}
