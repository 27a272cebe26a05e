//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements     | Connects to                      |
//! |-----------------|----------------|----------------------------------|
//! | `ble_transport` | TransportPort  | any [`GattLink`](ble_transport::GattLink) |
//! | `bluedroid`     | GattLink       | ESP-IDF Bluedroid (GATTC/GATTS/SPP) |
//! | `config_store`  | ConfigPort     | `SparkMode.config` / `BTMode.config` |
//! | `preset_store`  | PresetLibrary  | `<bank>/<slot>.json` files       |
//! | `keyboard`      | KeyboardPort   | placeholder, never connected     |
//! | `log_sink`      | EventSink      | Serial log output                |
//! | `spiffs`        | (none)         | SPIFFS VFS mount                 |

pub mod ble_transport;
#[cfg(target_os = "espidf")]
pub mod bluedroid;
pub mod config_store;
pub mod keyboard;
pub mod log_sink;
pub mod preset_store;
#[cfg(target_os = "espidf")]
pub mod spiffs;

/// Fresh, empty scratch directory for file-backed adapter tests.
#[cfg(test)]
pub(crate) fn test_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("ignitron-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
