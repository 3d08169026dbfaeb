//! Headless TauPy client.
//!
//! Connects to a backend, applies its messages to an in-memory document and
//! reads simulated user events from stdin:
//!
//! ```text
//! click <id>
//! input <id> <value>
//! show <id>
//! dump
//! theme
//! quit
//! ```

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use taupy_bridge::connection::{self, ConnectionEvent, ConnectionHandle};
use taupy_bridge::{
    Bridge, BridgeConfig, Document, FileStorage, MemoryStorage, ThemeStorage, Transport,
    VirtualDocument, VirtualElement,
};

#[derive(Parser, Debug)]
#[command(name = "taupy-headless", about = "Drive a TauPy backend without a browser")]
struct Args {
    /// Backend socket, overrides TAUPY_BRIDGE_ENDPOINT
    #[arg(long)]
    endpoint: Option<String>,

    /// JSON file to persist the theme in (in-memory if omitted)
    #[arg(long)]
    storage: Option<PathBuf>,

    /// Plain element ids the backend may update
    #[arg(long = "element", value_name = "ID")]
    elements: Vec<String>,

    /// Input element ids; each is also its own component id
    #[arg(long = "input", value_name = "ID")]
    inputs: Vec<String>,

    /// Clickable element ids; each is also its own component id
    #[arg(long = "button", value_name = "ID")]
    buttons: Vec<String>,
}

enum HostEvent {
    Socket(ConnectionEvent),
    Line(String),
    StdinClosed,
}

type HeadlessBridge<T = ConnectionHandle> = Bridge<VirtualDocument, Box<dyn ThemeStorage>, T>;

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();

    let mut config = BridgeConfig::from_env().context("invalid TAUPY_BRIDGE_* environment")?;
    if let Some(endpoint) = &args.endpoint {
        config = config.with_endpoint(endpoint)?;
    }

    let storage: Box<dyn ThemeStorage> = match &args.storage {
        Some(path) => Box::new(FileStorage::open(path)?),
        None => Box::new(MemoryStorage::new()),
    };
    if let Some(theme) = storage.get_item(&config.theme_storage_key)? {
        log::info!("Stored theme: {}", theme);
    }

    let document = build_document(&args, &config);

    let (tx, rx) = mpsc::channel();
    let socket_tx = tx.clone();
    let handle = connection::connect(&config.endpoint, move |event| {
        let _ = socket_tx.send(HostEvent::Socket(event));
    })?;

    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(HostEvent::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(HostEvent::StdinClosed);
    });

    let bridge = Bridge::new(config, document, storage, handle.clone());
    bridge.setup();

    for event in rx {
        match event {
            HostEvent::Socket(ConnectionEvent::Open) => bridge.on_open(),
            HostEvent::Socket(ConnectionEvent::Message(text)) => {
                if bridge.receive(&text) {
                    log::debug!("Applied: {}", text);
                }
            }
            HostEvent::Socket(ConnectionEvent::Error(message)) => {
                log::error!("Socket error: {}", message);
            }
            HostEvent::Socket(ConnectionEvent::Close { code, reason }) => {
                log::info!("Socket closed ({} {})", code, reason);
                break;
            }
            HostEvent::Line(line) => {
                if !run_command(&bridge, line.trim()) {
                    handle.close();
                }
            }
            HostEvent::StdinClosed => handle.close(),
        }
    }

    Ok(())
}

fn build_document(args: &Args, config: &BridgeConfig) -> VirtualDocument {
    let document = VirtualDocument::new();
    for id in &args.elements {
        document.insert(VirtualElement::new(id));
    }
    for id in &args.inputs {
        document.insert(
            VirtualElement::input(id, "").with_attribute(&config.component_attribute, id),
        );
    }
    for id in &args.buttons {
        document.insert(VirtualElement::new(id).with_attribute(&config.component_attribute, id));
    }
    document
}

/// Execute one stdin command. Returns `false` when the user asked to quit.
fn run_command<T: Transport>(bridge: &HeadlessBridge<T>, line: &str) -> bool {
    let mut parts = line.splitn(3, ' ');
    let command = parts.next().unwrap_or_default();
    let id = parts.next();
    let rest = parts.next();

    match (command, id) {
        ("", _) => {}
        ("quit" | "exit", _) => return false,
        ("click", Some(id)) => {
            let target = target_for(bridge, id);
            report(bridge.on_click(&target), "click", id);
        }
        ("input", Some(id)) => {
            let value = rest.unwrap_or_default();
            bridge.document().set_input_value(id, value);
            let mut target = target_for(bridge, id);
            target.value = Some(value.to_string());
            report(bridge.on_input(&target), "input", id);
        }
        ("show", Some(id)) => match bridge.document().element(id) {
            Some(element) => println!("{:#?}", element),
            None => println!("no element #{}", id),
        },
        ("dump", _) => {
            for element in bridge.document().elements() {
                println!("{:?}", element);
            }
        }
        ("theme", _) => {
            let attribute = &bridge.config().theme_attribute;
            println!(
                "{}={}",
                attribute,
                bridge.document().root_attribute(attribute).unwrap_or_default()
            );
        }
        _ => println!("unknown command: {}", line),
    }
    true
}

/// The element with `id`, or a detached one tagged with `id` as its
/// component id.
fn target_for<T: Transport>(bridge: &HeadlessBridge<T>, id: &str) -> VirtualElement {
    bridge.document().element(id).unwrap_or_else(|| {
        VirtualElement::new(id).with_attribute(&bridge.config().component_attribute, id)
    })
}

fn report(result: taupy_bridge::Result<bool>, kind: &str, id: &str) {
    match result {
        Ok(true) => log::info!("Sent {} for {}", kind, id),
        Ok(false) => println!("#{} has no component id", id),
        Err(e) => log::warn!("Failed to send {}: {}", kind, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingTransport {
        sent: RefCell<Vec<String>>,
    }

    impl Transport for RecordingTransport {
        fn send_text(&self, text: String) -> taupy_bridge::Result<()> {
            self.sent.borrow_mut().push(text);
            Ok(())
        }
    }

    fn headless(argv: &[&str]) -> HeadlessBridge<RecordingTransport> {
        let args = Args::try_parse_from(
            std::iter::once("taupy-headless").chain(argv.iter().copied()),
        )
        .unwrap();
        let config = BridgeConfig::default();
        let document = build_document(&args, &config);
        let bridge = Bridge::new(
            config,
            document,
            Box::new(MemoryStorage::new()) as Box<dyn ThemeStorage>,
            RecordingTransport::default(),
        );
        bridge.setup();
        bridge
    }

    fn sent(bridge: &HeadlessBridge<RecordingTransport>) -> Vec<String> {
        bridge.transport().sent.borrow().clone()
    }

    #[test]
    fn test_input_writes_document_then_sends() {
        let bridge = headless(&["--input", "name"]);

        assert!(run_command(&bridge, "input name hello world"));

        let element = bridge.document().element("name").unwrap();
        assert_eq!(element.value.as_deref(), Some("hello world"));
        assert_eq!(
            sent(&bridge),
            vec![r#"{"type":"input","id":"name","value":"hello world"}"#]
        );
    }

    #[test]
    fn test_click_needs_a_component_id() {
        let bridge = headless(&["--element", "title", "--button", "go"]);

        assert!(run_command(&bridge, "click title"));
        assert!(sent(&bridge).is_empty());

        assert!(run_command(&bridge, "click go"));
        assert!(run_command(&bridge, "click detached"));
        assert_eq!(
            sent(&bridge),
            vec![
                r#"{"type":"click","id":"go"}"#,
                r#"{"type":"click","id":"detached"}"#,
            ]
        );
    }

    #[test]
    fn test_read_only_commands_keep_running() {
        let bridge = headless(&["--element", "title"]);
        assert!(bridge.receive(r#"{"type":"set_theme","theme":"dark"}"#));

        for line in ["", "show title", "show missing", "dump", "theme", "bogus"] {
            assert!(run_command(&bridge, line), "{:?} should not quit", line);
        }
        assert!(sent(&bridge).is_empty());
    }

    #[test]
    fn test_quit_and_exit_stop_the_loop() {
        let bridge = headless(&[]);
        assert!(!run_command(&bridge, "quit"));
        assert!(!run_command(&bridge, "exit"));
    }
}
