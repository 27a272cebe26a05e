//! SPIFFS mount for the preset library and the mode files.

use esp_idf_svc::sys::*;
use log::{info, warn};

use crate::app::ports::StorageError;

/// VFS path the partition is mounted at.
pub const MOUNT_POINT: &str = "/spiffs";
const MOUNT_POINT_C: &core::ffi::CStr = c"/spiffs";

/// Mount the default SPIFFS partition, formatting it if mounting fails.
pub fn mount() -> Result<(), StorageError> {
    let conf = esp_vfs_spiffs_conf_t {
        base_path: MOUNT_POINT_C.as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 8,
        format_if_mount_failed: true,
    };
    // SAFETY: called once from the main task; `conf` outlives the call.
    let ret = unsafe { esp_vfs_spiffs_register(&conf) };
    if ret != ESP_OK {
        warn!("SPIFFS: mount failed ({ret})");
        return Err(StorageError::Unavailable);
    }
    info!("SPIFFS: mounted at {MOUNT_POINT}");
    Ok(())
}
