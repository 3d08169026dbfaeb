//! Inbound Message Handlers
//!
//! Each handler applies the messages it understands to the document and
//! ignores the rest. The bridge hands every decoded message to every
//! registered handler.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::BridgeConfig;
use crate::dom::Document;
use crate::protocol::InboundMessage;
use crate::storage::ThemeStorage;

/// What a handler may touch while applying a message.
pub struct HandlerContext<'a> {
    pub document: &'a dyn Document,
    pub storage: &'a dyn ThemeStorage,
    pub config: &'a BridgeConfig,
}

pub trait InboundHandler {
    fn handle(&self, message: &InboundMessage, cx: &HandlerContext<'_>);
}

/// Ordered set of handlers. Registration order is dispatch order.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RefCell<Vec<Rc<dyn InboundHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Rc<dyn InboundHandler>) {
        self.handlers.borrow_mut().push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }

    pub fn dispatch(&self, message: &InboundMessage, cx: &HandlerContext<'_>) {
        // Snapshot so a handler can register another one mid-dispatch.
        let handlers = self.handlers.borrow().clone();
        for handler in handlers {
            handler.handle(message, cx);
        }
    }
}

/// Text, markup, theme and dev-server messages.
pub struct DomMutations;

impl InboundHandler for DomMutations {
    fn handle(&self, message: &InboundMessage, cx: &HandlerContext<'_>) {
        match message {
            InboundMessage::UpdateText { id, value } => {
                if !cx.document.set_text_content(id, value) {
                    log::debug!("update_text: no element #{}", id);
                }
            }
            InboundMessage::Replace { id, html } => {
                if !cx.document.set_inner_html(id, html) {
                    log::debug!("replace: no element #{}", id);
                }
            }
            InboundMessage::SetTheme { theme } => {
                cx.document
                    .set_root_attribute(&cx.config.theme_attribute, theme);
                if let Err(e) = cx.storage.set_item(&cx.config.theme_storage_key, theme) {
                    log::warn!("Failed to persist theme {}: {}", theme, e);
                }
            }
            InboundMessage::HotReload { message } => {
                log::info!("[HMR] Reloading ({})", message);
                cx.document.reload();
            }
            InboundMessage::HmrError { message } => {
                log::error!("[HMR] Backend failed to reload:\n{}", message);
            }
            InboundMessage::UpdateInput { .. } => {}
        }
    }
}

/// Keeps editable elements in sync with backend-side values.
pub struct InputSync;

impl InboundHandler for InputSync {
    fn handle(&self, message: &InboundMessage, cx: &HandlerContext<'_>) {
        if let InboundMessage::UpdateInput { id, value } = message {
            if !cx.document.set_input_value(id, value) {
                log::debug!("update_input: no element #{}", id);
            }
        }
    }
}
