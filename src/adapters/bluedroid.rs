//! Bluedroid [`GattLink`] for the ESP32.
//!
//! | Role               | Stack              | Inbound path                    |
//! |--------------------|--------------------|---------------------------------|
//! | `Central`          | GATTC client       | `0xFFC2` notifications → queue  |
//! | `PeripheralBle`    | GATTS server       | `0xFFC1` writes → queue         |
//! | `PeripheralSerial` | Classic BT SPP     | data bytes → serial buffer      |
//!
//! Bridge and looper modes always run the central role; the peripheral
//! roles only apply to the emulated amp.  Bluedroid callbacks run in the
//! Bluedroid task, so they only copy data into the [`IngestQueue`] or
//! the serial buffer and flip atomics.

extern crate alloc;
use alloc::collections::VecDeque;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock};

use esp_idf_svc::sys::*;
use log::{error, info, warn};

use super::ble_transport::{
    BleTransportError, GattLink, SPARK_NOTIFY_CHAR_UUID, SPARK_SERVICE_UUID,
    SPARK_WRITE_CHAR_UUID,
};
use crate::queue::IngestQueue;
use crate::state::{BluetoothRole, OperationMode};

// ───────────────────────────────────────────────────────────────
// Callback state
// ───────────────────────────────────────────────────────────────

const APP_ID: u16 = 0;
const AMP_NAME_PREFIX: &[u8] = b"Spark";
const EMULATED_AMP_NAME: &core::ffi::CStr = c"Spark 40 BLE";
const SERIAL_NAME: &core::ffi::CStr = c"Spark 40 Audio";

static INGEST: OnceLock<&'static IngestQueue> = OnceLock::new();
static SERIAL_RX: Mutex<VecDeque<u8>> = Mutex::new(VecDeque::new());
static REMOTE_BDA: Mutex<[u8; 6]> = Mutex::new([0; 6]);

static CONNECTED: AtomicBool = AtomicBool::new(false);
/// Raised on every new connection, consumed by the main loop.
static NEW_CONNECTION: AtomicBool = AtomicBool::new(false);

static GATT_IF: AtomicU32 = AtomicU32::new(0);
static CONN_ID: AtomicU32 = AtomicU32::new(0);
static SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
static WRITE_HANDLE: AtomicU32 = AtomicU32::new(0);
static NOTIFY_HANDLE: AtomicU32 = AtomicU32::new(0);
static SPP_HANDLE: AtomicU32 = AtomicU32::new(0);
static SVC_START: AtomicU32 = AtomicU32::new(0);
static SVC_END: AtomicU32 = AtomicU32::new(0);
static CHAR_STEP: AtomicU32 = AtomicU32::new(0);

fn enqueue(data: &[u8]) {
    if let Some(queue) = INGEST.get() {
        queue.push(data);
    }
}

fn set_connected(connected: bool) {
    CONNECTED.store(connected, Ordering::Release);
    if connected {
        NEW_CONNECTION.store(true, Ordering::Release);
    }
}

fn uuid16(uuid: u16) -> esp_bt_uuid_t {
    // SAFETY: plain C struct, all-zero is a valid value.
    let mut t: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

fn adv_params() -> esp_ble_adv_params_t {
    esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        // SAFETY: remaining fields are plain data.
        ..unsafe { core::mem::zeroed() }
    }
}

fn scan_params() -> esp_ble_scan_params_t {
    esp_ble_scan_params_t {
        scan_type: esp_ble_scan_type_t_BLE_SCAN_TYPE_ACTIVE,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        scan_filter_policy: esp_ble_scan_filter_t_BLE_SCAN_FILTER_ALLOW_ALL,
        scan_interval: 0x50,
        scan_window: 0x30,
        scan_duplicate: esp_ble_scan_duplicate_t_BLE_SCAN_DUPLICATE_DISABLE,
    }
}

// ───────────────────────────────────────────────────────────────
// GAP
// ───────────────────────────────────────────────────────────────

unsafe extern "C" fn gap_event_handler(
    event: esp_gap_ble_cb_event_t,
    param: *mut esp_ble_gap_cb_param_t,
) {
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_PARAM_SET_COMPLETE_EVT => {
            info!("BLE GAP: scanning for amp");
            unsafe { esp_ble_gap_start_scanning(0) };
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RESULT_EVT => {
            let r = unsafe { &mut (*param).scan_rst };
            if r.search_evt != esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_RES_EVT {
                return;
            }
            let mut len = 0u8;
            let name = unsafe {
                esp_ble_resolve_adv_data(
                    r.ble_adv.as_mut_ptr(),
                    esp_ble_adv_data_type_ESP_BLE_AD_TYPE_NAME_CMPL as u8,
                    &mut len,
                )
            };
            if name.is_null() {
                return;
            }
            let name = unsafe { core::slice::from_raw_parts(name, usize::from(len)) };
            if name.starts_with(AMP_NAME_PREFIX) {
                info!("BLE GAP: found '{}'", String::from_utf8_lossy(name));
                unsafe {
                    esp_ble_gap_stop_scanning();
                    esp_ble_gattc_open(
                        GATT_IF.load(Ordering::Relaxed) as esp_gatt_if_t,
                        r.bda.as_mut_ptr(),
                        r.ble_addr_type,
                        true,
                    );
                }
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            info!("BLE GAP: advertising as emulated amp");
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// GATT client (central role)
// ───────────────────────────────────────────────────────────────

unsafe extern "C" fn gattc_event_handler(
    event: esp_gattc_cb_event_t,
    gattc_if: esp_gatt_if_t,
    param: *mut esp_ble_gattc_cb_param_t,
) {
    match event {
        esp_gattc_cb_event_t_ESP_GATTC_REG_EVT => {
            GATT_IF.store(u32::from(gattc_if), Ordering::Relaxed);
            let mut params = scan_params();
            unsafe { esp_ble_gap_set_scan_params(&mut params) };
        }
        esp_gattc_cb_event_t_ESP_GATTC_OPEN_EVT => {
            let p = unsafe { &(*param).open };
            if p.status != esp_gatt_status_t_ESP_GATT_OK {
                warn!("BLE GATTC: open failed ({})", p.status);
                let mut params = scan_params();
                unsafe { esp_ble_gap_set_scan_params(&mut params) };
                return;
            }
            CONN_ID.store(u32::from(p.conn_id), Ordering::Relaxed);
            if let Ok(mut bda) = REMOTE_BDA.lock() {
                *bda = p.remote_bda;
            }
            let mut filter = uuid16(SPARK_SERVICE_UUID);
            unsafe { esp_ble_gattc_search_service(gattc_if, p.conn_id, &mut filter) };
        }
        esp_gattc_cb_event_t_ESP_GATTC_SEARCH_RES_EVT => {
            let p = unsafe { &(*param).search_res };
            SVC_START.store(u32::from(p.start_handle), Ordering::Relaxed);
            SVC_END.store(u32::from(p.end_handle), Ordering::Relaxed);
        }
        esp_gattc_cb_event_t_ESP_GATTC_SEARCH_CMPL_EVT => {
            let conn_id = CONN_ID.load(Ordering::Relaxed) as u16;
            let (Some(write), Some(notify)) = (
                unsafe { find_char(gattc_if, conn_id, SPARK_WRITE_CHAR_UUID) },
                unsafe { find_char(gattc_if, conn_id, SPARK_NOTIFY_CHAR_UUID) },
            ) else {
                error!("BLE GATTC: Spark characteristics not found");
                return;
            };
            WRITE_HANDLE.store(u32::from(write), Ordering::Relaxed);
            NOTIFY_HANDLE.store(u32::from(notify), Ordering::Relaxed);
            info!("BLE GATTC: amp service ready");
            if let Ok(mut bda) = REMOTE_BDA.lock() {
                unsafe { esp_ble_gattc_register_for_notify(gattc_if, bda.as_mut_ptr(), notify) };
            }
        }
        esp_gattc_cb_event_t_ESP_GATTC_REG_FOR_NOTIFY_EVT => {
            info!("BLE GATTC: connected to amp");
            set_connected(true);
        }
        esp_gattc_cb_event_t_ESP_GATTC_NOTIFY_EVT => {
            let p = unsafe { &(*param).notify };
            let data = unsafe { core::slice::from_raw_parts(p.value, usize::from(p.value_len)) };
            enqueue(data);
        }
        esp_gattc_cb_event_t_ESP_GATTC_DISCONNECT_EVT => {
            warn!("BLE GATTC: amp disconnected, rescanning");
            set_connected(false);
            WRITE_HANDLE.store(0, Ordering::Relaxed);
            NOTIFY_HANDLE.store(0, Ordering::Relaxed);
            let mut params = scan_params();
            unsafe { esp_ble_gap_set_scan_params(&mut params) };
        }
        _ => {}
    }
}

unsafe fn find_char(gattc_if: esp_gatt_if_t, conn_id: u16, uuid: u16) -> Option<u16> {
    // SAFETY: plain C struct, all-zero is a valid value.
    let mut result: esp_gattc_char_elem_t = unsafe { core::mem::zeroed() };
    let mut count: u16 = 1;
    let ret = unsafe {
        esp_ble_gattc_get_char_by_uuid(
            gattc_if,
            conn_id,
            SVC_START.load(Ordering::Relaxed) as u16,
            SVC_END.load(Ordering::Relaxed) as u16,
            uuid16(uuid),
            &mut result,
            &mut count,
        )
    };
    (ret == esp_gatt_status_t_ESP_GATT_OK && count > 0).then_some(result.char_handle)
}

// ───────────────────────────────────────────────────────────────
// GATT server (emulated amp, BLE)
// ───────────────────────────────────────────────────────────────

unsafe extern "C" fn gatts_event_handler(
    event: esp_gatts_cb_event_t,
    gatts_if: esp_gatt_if_t,
    param: *mut esp_ble_gatts_cb_param_t,
) {
    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            GATT_IF.store(u32::from(gatts_if), Ordering::Relaxed);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t { uuid: uuid16(SPARK_SERVICE_UUID), inst_id: 0 },
                is_primary: true,
            };
            unsafe {
                esp_ble_gap_set_device_name(EMULATED_AMP_NAME.as_ptr());
                esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let svc = unsafe { (*param).create.service_handle };
            SVC_HANDLE.store(u32::from(svc), Ordering::Relaxed);
            CHAR_STEP.store(1, Ordering::Relaxed);
            unsafe {
                esp_ble_gatts_start_service(svc);
                add_char(
                    svc,
                    SPARK_WRITE_CHAR_UUID,
                    ESP_GATT_PERM_WRITE,
                    ESP_GATT_CHAR_PROP_BIT_WRITE | ESP_GATT_CHAR_PROP_BIT_WRITE_NR,
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let handle = unsafe { (*param).add_char.attr_handle };
            let svc = SVC_HANDLE.load(Ordering::Relaxed) as u16;
            match CHAR_STEP.load(Ordering::Relaxed) {
                1 => {
                    WRITE_HANDLE.store(u32::from(handle), Ordering::Relaxed);
                    CHAR_STEP.store(2, Ordering::Relaxed);
                    unsafe {
                        add_char(
                            svc,
                            SPARK_NOTIFY_CHAR_UUID,
                            ESP_GATT_PERM_READ,
                            ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_NOTIFY,
                        );
                    }
                }
                2 => {
                    NOTIFY_HANDLE.store(u32::from(handle), Ordering::Relaxed);
                    CHAR_STEP.store(3, Ordering::Relaxed);
                    let mut params = adv_params();
                    unsafe { esp_ble_gap_start_advertising(&mut params) };
                }
                _ => {}
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let conn_id = unsafe { (*param).connect.conn_id };
            CONN_ID.store(u32::from(conn_id), Ordering::Relaxed);
            info!("BLE GATTS: app connected (conn_id={conn_id})");
            set_connected(true);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            info!("BLE GATTS: app disconnected");
            set_connected(false);
            let mut params = adv_params();
            unsafe { esp_ble_gap_start_advertising(&mut params) };
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            if u32::from(p.handle) == WRITE_HANDLE.load(Ordering::Relaxed) {
                let data = unsafe { core::slice::from_raw_parts(p.value, usize::from(p.len)) };
                enqueue(data);
            }
        }
        _ => {}
    }
}

unsafe fn add_char(svc_handle: u16, uuid: u16, perm: u32, prop: u32) {
    let mut char_uuid = uuid16(uuid);
    unsafe {
        esp_ble_gatts_add_char(
            svc_handle,
            &mut char_uuid,
            perm as esp_gatt_perm_t,
            prop as esp_gatt_char_prop_t,
            core::ptr::null_mut(),
            core::ptr::null_mut(),
        );
    }
}

// ───────────────────────────────────────────────────────────────
// SPP (emulated amp, serial)
// ───────────────────────────────────────────────────────────────

unsafe extern "C" fn spp_event_handler(event: esp_spp_cb_event_t, param: *mut esp_spp_cb_param_t) {
    match event {
        esp_spp_cb_event_t_ESP_SPP_INIT_EVT => unsafe {
            esp_bt_dev_set_device_name(SERIAL_NAME.as_ptr());
            esp_bt_gap_set_scan_mode(
                esp_bt_connection_mode_t_ESP_BT_CONNECTABLE,
                esp_bt_discovery_mode_t_ESP_BT_GENERAL_DISCOVERABLE,
            );
            esp_spp_start_srv(
                ESP_SPP_SEC_NONE as esp_spp_sec_t,
                esp_spp_role_t_ESP_SPP_ROLE_SLAVE,
                0,
                SERIAL_NAME.as_ptr(),
            );
        },
        esp_spp_cb_event_t_ESP_SPP_SRV_OPEN_EVT => {
            let handle = unsafe { (*param).srv_open.handle };
            SPP_HANDLE.store(handle, Ordering::Relaxed);
            info!("BT SPP: app connected");
            set_connected(true);
        }
        esp_spp_cb_event_t_ESP_SPP_CLOSE_EVT => {
            info!("BT SPP: app disconnected");
            SPP_HANDLE.store(0, Ordering::Relaxed);
            set_connected(false);
        }
        esp_spp_cb_event_t_ESP_SPP_DATA_IND_EVT => {
            let p = unsafe { &(*param).data_ind };
            let data = unsafe { core::slice::from_raw_parts(p.data, usize::from(p.len)) };
            if let Ok(mut rx) = SERIAL_RX.lock() {
                rx.extend(data.iter().copied());
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// Link
// ───────────────────────────────────────────────────────────────

pub struct BluedroidLink {
    role: Option<BluetoothRole>,
}

impl BluedroidLink {
    /// Inbound chunks go to `queue` from now on.
    pub fn new(queue: &'static IngestQueue) -> Self {
        if INGEST.set(queue).is_err() {
            warn!("BLE: ingest queue already registered");
        }
        Self { role: None }
    }

    /// Whether a peer connected since the last call.
    pub fn take_new_connection(&mut self) -> bool {
        NEW_CONNECTION.swap(false, Ordering::AcqRel)
    }

    fn check(ret: esp_err_t, what: &str) -> Result<(), BleTransportError> {
        if ret == ESP_OK {
            Ok(())
        } else {
            error!("BLE: {what} failed ({ret})");
            Err(BleTransportError::StackInitFailed)
        }
    }

    fn bring_up(classic: bool) -> Result<(), BleTransportError> {
        // SAFETY: called once from the main task before any callback runs.
        unsafe {
            let mut cfg = esp_bt_controller_config_t::default();
            Self::check(esp_bt_controller_init(&mut cfg), "bt_controller_init")?;
            let mode = if classic {
                esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT
            } else {
                esp_bt_mode_t_ESP_BT_MODE_BLE
            };
            Self::check(esp_bt_controller_enable(mode), "bt_controller_enable")?;
            Self::check(esp_bluedroid_init(), "bluedroid_init")?;
            Self::check(esp_bluedroid_enable(), "bluedroid_enable")
        }
    }
}

impl GattLink for BluedroidLink {
    fn write(&mut self, chunk: &[u8]) -> Result<(), BleTransportError> {
        let handle = WRITE_HANDLE.load(Ordering::Relaxed) as u16;
        if !CONNECTED.load(Ordering::Acquire) || handle == 0 {
            return Err(BleTransportError::NotConnected);
        }
        // SAFETY: the stack copies `chunk` before returning.
        let ret = unsafe {
            esp_ble_gattc_write_char(
                GATT_IF.load(Ordering::Relaxed) as esp_gatt_if_t,
                CONN_ID.load(Ordering::Relaxed) as u16,
                handle,
                chunk.len() as u16,
                chunk.as_ptr().cast_mut(),
                esp_gatt_write_type_t_ESP_GATT_WRITE_TYPE_RSP,
                esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
            )
        };
        if ret == ESP_OK { Ok(()) } else { Err(BleTransportError::Io) }
    }

    fn notify(&mut self, chunk: &[u8]) -> Result<(), BleTransportError> {
        if !CONNECTED.load(Ordering::Acquire) {
            return Err(BleTransportError::NotConnected);
        }
        // SAFETY: the stack copies `chunk` before returning.
        let ret = unsafe {
            if self.role == Some(BluetoothRole::PeripheralSerial) {
                esp_spp_write(
                    SPP_HANDLE.load(Ordering::Relaxed),
                    chunk.len() as i32,
                    chunk.as_ptr().cast_mut(),
                )
            } else {
                esp_ble_gatts_send_indicate(
                    GATT_IF.load(Ordering::Relaxed) as esp_gatt_if_t,
                    CONN_ID.load(Ordering::Relaxed) as u16,
                    NOTIFY_HANDLE.load(Ordering::Relaxed) as u16,
                    chunk.len() as u16,
                    chunk.as_ptr().cast_mut(),
                    false,
                )
            }
        };
        if ret == ESP_OK { Ok(()) } else { Err(BleTransportError::Io) }
    }

    fn is_connected(&self) -> bool {
        CONNECTED.load(Ordering::Acquire)
    }

    fn read_serial_byte(&mut self) -> Option<u8> {
        SERIAL_RX.lock().ok()?.pop_front()
    }

    fn serial_available(&self) -> bool {
        SERIAL_RX.lock().is_ok_and(|rx| !rx.is_empty())
    }

    fn start(&mut self, mode: OperationMode, role: BluetoothRole) -> Result<(), BleTransportError> {
        let role = if mode.is_bridging() { BluetoothRole::Central } else { role };
        self.role = Some(role);
        // SAFETY: callbacks are registered before the stack emits events.
        match role {
            BluetoothRole::Central => {
                Self::bring_up(false)?;
                unsafe {
                    esp_ble_gap_register_callback(Some(gap_event_handler));
                    esp_ble_gattc_register_callback(Some(gattc_event_handler));
                    esp_ble_gattc_app_register(APP_ID);
                }
            }
            BluetoothRole::PeripheralBle => {
                Self::bring_up(false)?;
                unsafe {
                    esp_ble_gap_register_callback(Some(gap_event_handler));
                    esp_ble_gatts_register_callback(Some(gatts_event_handler));
                    esp_ble_gatts_app_register(APP_ID);
                }
            }
            BluetoothRole::PeripheralSerial => {
                Self::bring_up(true)?;
                unsafe {
                    esp_spp_register_callback(Some(spp_event_handler));
                    esp_spp_init(esp_spp_mode_t_ESP_SPP_MODE_CB);
                }
            }
        }
        info!("BLE(espidf): {:?} role up", role);
        Ok(())
    }
}
