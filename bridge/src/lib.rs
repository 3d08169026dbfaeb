//! # TauPy Bridge
//!
//! Connects a UI document to a TauPy backend over one WebSocket. Clicks and
//! input changes on elements tagged with `data-component-id` go out as JSON
//! messages; backend messages come back as text updates, markup
//! replacements, theme switches and input value syncs.
//!
//! ## Example
//!
//! ```rust
//! use taupy_bridge::{Bridge, BridgeConfig, MemoryStorage, Transport, VirtualDocument, VirtualElement};
//!
//! struct Discard;
//!
//! impl Transport for Discard {
//!     fn send_text(&self, _text: String) -> taupy_bridge::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let document = VirtualDocument::new().with_element(VirtualElement::new("counter"));
//! let bridge = Bridge::new(BridgeConfig::default(), document, MemoryStorage::new(), Discard);
//! bridge.setup();
//!
//! bridge.receive(r#"{"type":"update_text","id":"counter","value":"1"}"#);
//! assert_eq!(bridge.document().element("counter").unwrap().text, "1");
//! ```

mod bridge;
mod config;
mod dom;
mod error;
mod handlers;
mod protocol;
mod storage;
mod virtual_dom;

#[cfg(not(target_arch = "wasm32"))]
pub mod connection;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use bridge::{Bridge, Transport};
pub use config::*;
pub use dom::{Document, EventTarget};
pub use error::{BridgeError, Result};
pub use handlers::{DomMutations, HandlerContext, HandlerRegistry, InboundHandler, InputSync};
pub use protocol::{InboundMessage, OutboundMessage};
pub use storage::{FileStorage, MemoryStorage, ThemeStorage};
pub use virtual_dom::{VirtualDocument, VirtualElement};

/// First 100 characters of `text`, for log lines.
pub(crate) fn preview(text: &str) -> &str {
    match text.char_indices().nth(100) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
