//! Ignitron firmware main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BleTransport<BluedroidLink>  FilePresetLibrary                │
//! │  (TransportPort)              (PresetLibrary)                  │
//! │  FileConfigStore   NullKeyboard   LogEventSink                 │
//! │  (ConfigPort)      (KeyboardPort) (EventSink)                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Controller (pure logic)                   │    │
//! │  │  Reassembler · Dispatch · Preset manager · Encoder     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Bluedroid callbacks ──▶ IngestQueue ──▶ main loop             │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use ignitron::adapters::ble_transport::BleTransport;
use ignitron::adapters::bluedroid::BluedroidLink;
use ignitron::adapters::config_store::FileConfigStore;
use ignitron::adapters::keyboard::NullKeyboard;
use ignitron::adapters::log_sink::LogEventSink;
use ignitron::adapters::preset_store::FilePresetLibrary;
use ignitron::adapters::spiffs;
use ignitron::app::service::Controller;
use ignitron::queue::IngestQueue;

/// Chunks pushed by the Bluedroid callbacks, drained by the main loop.
static INGEST: IngestQueue = IngestQueue::new();

const LOOP_PERIOD: Duration = Duration::from_millis(5);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Ignitron v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Storage ────────────────────────────────────────────
    if let Err(e) = spiffs::mount() {
        warn!("Storage unavailable ({}), running with defaults", e);
    }
    let config_store = FileConfigStore::new(spiffs::MOUNT_POINT);
    let library = FilePresetLibrary::open(format!("{}/presets", spiffs::MOUNT_POINT))
        .map_err(|e| anyhow::anyhow!("preset library: {e}"))?;

    // ── 3. Adapters + controller ──────────────────────────────
    let transport = BleTransport::new(BluedroidLink::new(&INGEST));
    let mut sink = LogEventSink::new();
    let mut controller = Controller::new(transport, library, config_store, NullKeyboard::new());
    controller.start(&mut sink);

    info!("System ready. Entering main loop.");

    // ── 4. Main loop ──────────────────────────────────────────
    loop {
        if controller.transport_mut().link_mut().take_new_connection() {
            controller.on_peer_connected(&mut sink);
        }

        controller.process(&INGEST, &mut sink);

        if controller.take_restart_request() {
            warn!("Restarting");
            std::thread::sleep(Duration::from_millis(100));
            // SAFETY: plain FFI call, does not return.
            unsafe { esp_idf_svc::sys::esp_restart() };
        }

        std::thread::sleep(LOOP_PERIOD);
    }
}
