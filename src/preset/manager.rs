//! Bank navigation and the store/delete edit workflows.
//!
//! Pure state transitions over [`ControlContext`] and a
//! [`PresetLibrary`].  Nothing here talks to the transport; the
//! controller gates each call and sends whatever the new state requires.
//!
//! Store and delete both need the same slot selected twice.  The first
//! selection only records the target.

use log::{info, warn};

use super::{Preset, SLOTS_PER_BANK};
use crate::app::ports::{DeleteOutcome, PresetLibrary, StoreOutcome};
use crate::state::{ControlContext, OperationMode, PresetEditMode};

pub const MSG_SAVE_OK: &str = "SAVE OK";
pub const MSG_PRESET_EXISTS: &str = "PRST EXIST";
pub const MSG_SAVE_ERROR: &str = "SAVE ERROR";
pub const MSG_DELETE_OK: &str = "DELETE OK";
pub const MSG_FILE_NOT_EXIST: &str = "FILE NOT EXIST";
pub const MSG_DELETE_ERROR: &str = "DELETE ERROR";

// ---------------------------------------------------------------------------
// Bank navigation
// ---------------------------------------------------------------------------

/// Next bank in the ring `0..=banks`.  Emulated-amp mode skips bank 0.
pub fn increase_bank<L: PresetLibrary>(ctx: &mut ControlContext, lib: &L) {
    let banks = lib.number_of_banks();
    ctx.pending_bank = if ctx.pending_bank >= banks { 0 } else { ctx.pending_bank + 1 };
    if ctx.is_emulated_amp() && ctx.pending_bank == 0 {
        ctx.pending_bank = banks.min(1);
    }
    update_pending_bank_status(ctx, lib);
}

pub fn decrease_bank<L: PresetLibrary>(ctx: &mut ControlContext, lib: &L) {
    let banks = lib.number_of_banks();
    ctx.pending_bank = match ctx.pending_bank {
        0 => banks,
        b => (b - 1).min(banks),
    };
    if ctx.is_emulated_amp() && ctx.pending_bank == 0 {
        ctx.pending_bank = banks;
    }
    update_pending_bank_status(ctx, lib);
}

/// Load the pending preset for the new bank.  Bridge modes wait for a
/// preset selection; emulated-amp mode switches at once.
fn update_pending_bank_status<L: PresetLibrary>(ctx: &mut ControlContext, lib: &L) {
    if ctx.pending_bank != 0 {
        ctx.pending_preset = lib.get_preset(ctx.pending_bank, ctx.active_slot);
    }
    if ctx.is_emulated_amp() {
        ctx.active_bank = ctx.pending_bank;
        ctx.commit_pending();
        match ctx.preset_edit_mode {
            PresetEditMode::Delete => reset_preset_edit(ctx, true, true),
            PresetEditMode::Store => reset_preset_edit(ctx, false, false),
            PresetEditMode::None => {}
        }
    }
}

/// Jump straight to `bank`.  Out-of-range values are ignored.
pub fn set_bank<L: PresetLibrary>(ctx: &mut ControlContext, lib: &L, bank: u8) {
    if bank > lib.number_of_banks() {
        return;
    }
    ctx.active_bank = bank;
    ctx.pending_bank = bank;
}

/// Looper cycling: the four slots of a bank form a ring that rolls into
/// the neighbouring bank.  Updates the pending bank and returns the slot
/// to switch to.
pub fn looper_step(ctx: &mut ControlContext, banks: u8, forward: bool) -> u8 {
    if forward {
        if ctx.active_slot >= SLOTS_PER_BANK {
            ctx.pending_bank = if ctx.active_bank >= banks { 0 } else { ctx.active_bank + 1 };
            1
        } else {
            ctx.active_slot + 1
        }
    } else if ctx.active_slot <= 1 {
        ctx.pending_bank = if ctx.active_bank == 0 { banks } else { ctx.active_bank - 1 };
        SLOTS_PER_BANK
    } else {
        ctx.active_slot - 1
    }
}

// ---------------------------------------------------------------------------
// Edit workflows (emulated-amp mode)
// ---------------------------------------------------------------------------

/// A numbered slot was selected in emulated-amp mode.  `slot == 0` is
/// the delete button.
pub fn process_preset_edit<L: PresetLibrary>(ctx: &mut ControlContext, lib: &mut L, slot: u8) {
    if slot == 0 {
        process_delete_request(ctx, lib);
    } else if ctx.preset_edit_mode == PresetEditMode::Store {
        process_store_request(ctx, lib, slot);
    } else {
        reset_preset_edit(ctx, true, true);
        select_slot(ctx, lib, slot);
    }
}

/// Delete button: cancels a pending store, otherwise drives the delete
/// workflow.  Only meaningful in emulated-amp mode.
pub fn handle_delete_button<L: PresetLibrary>(ctx: &mut ControlContext, lib: &mut L) -> bool {
    if ctx.operation_mode != OperationMode::EmulatedAmp {
        info!("preset: delete ignored outside AMP mode");
        return false;
    }
    if ctx.preset_edit_mode == PresetEditMode::Store {
        reset_preset_edit(ctx, true, true);
    } else {
        process_preset_edit(ctx, lib, 0);
    }
    true
}

/// The app uploaded a preset: hold it until a slot is chosen twice.
pub fn receive_app_preset(ctx: &mut ControlContext, preset: Preset) {
    info!("preset: received '{}' from app, awaiting slot", preset.name);
    ctx.preset_edit_mode = PresetEditMode::Store;
    ctx.app_received_preset = Some(preset);
    ctx.slot_to_edit = 0;
}

fn select_slot<L: PresetLibrary>(ctx: &mut ControlContext, lib: &L, slot: u8) {
    ctx.active_slot = slot;
    ctx.active_preset = lib.get_preset(ctx.active_bank, slot);
    ctx.pending_preset = ctx.active_preset.clone();
}

fn process_store_request<L: PresetLibrary>(ctx: &mut ControlContext, lib: &mut L, slot: u8) {
    ctx.response_msg = None;
    if ctx.slot_to_edit != slot || ctx.bank_to_edit != ctx.pending_bank {
        select_slot(ctx, lib, slot);
        ctx.slot_to_edit = slot;
        ctx.bank_to_edit = ctx.pending_bank;
        return;
    }

    let outcome = match &ctx.app_received_preset {
        Some(preset) => lib.store_preset(preset, ctx.pending_bank, slot),
        None => StoreOutcome::UnknownError,
    };
    match outcome {
        StoreOutcome::Ok => {
            info!("preset: stored {}-{}", ctx.pending_bank, slot);
            reset_preset_edit(ctx, true, true);
            select_slot(ctx, lib, slot);
            ctx.response_msg = Some(MSG_SAVE_OK);
        }
        StoreOutcome::FileExists => ctx.response_msg = Some(MSG_PRESET_EXISTS),
        StoreOutcome::ErrorOpen | StoreOutcome::UnknownError => {
            warn!("preset: storing {}-{} failed: {:?}", ctx.pending_bank, slot, outcome);
            ctx.response_msg = Some(MSG_SAVE_ERROR);
        }
    }
}

fn process_delete_request<L: PresetLibrary>(ctx: &mut ControlContext, lib: &mut L) {
    ctx.response_msg = None;
    if ctx.preset_edit_mode != PresetEditMode::Delete || ctx.active_bank == 0 {
        ctx.preset_edit_mode = PresetEditMode::Delete;
        ctx.slot_to_edit = ctx.active_slot;
        ctx.bank_to_edit = ctx.active_bank;
        return;
    }

    let outcome = lib.delete_preset(ctx.active_bank, ctx.active_slot);
    match outcome {
        DeleteOutcome::Ok | DeleteOutcome::FileNotExist => {
            info!("preset: deleted {}-{}", ctx.active_bank, ctx.active_slot);
            ctx.active_preset = lib.get_preset(ctx.pending_bank, ctx.active_slot);
            ctx.pending_preset = ctx.active_preset.clone();
            ctx.response_msg = Some(if outcome == DeleteOutcome::Ok {
                MSG_DELETE_OK
            } else {
                MSG_FILE_NOT_EXIST
            });
        }
        DeleteOutcome::ErrorOpen => {
            warn!("preset: deleting {}-{} failed", ctx.active_bank, ctx.active_slot);
            ctx.response_msg = Some(MSG_DELETE_ERROR);
        }
    }
    reset_preset_edit(ctx, true, true);
}

/// Forget the recorded target; optionally the received preset and the
/// edit mode too.
pub fn reset_preset_edit(ctx: &mut ControlContext, reset_mode: bool, reset_preset: bool) {
    ctx.slot_to_edit = 0;
    ctx.bank_to_edit = 0;
    if reset_preset {
        ctx.app_received_preset = None;
    }
    if reset_mode {
        ctx.preset_edit_mode = PresetEditMode::None;
    }
}
