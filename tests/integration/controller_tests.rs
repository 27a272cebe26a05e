//! Controller integration tests.
//!
//! Drive the full relay core (queue → reassembler → dispatch → encoder)
//! against the recording mocks and assert on what reached the radio,
//! the library and the config store.

use ignitron::app::commands::{AppCommand, KeyboardKey};
use ignitron::app::events::AppEvent;
use ignitron::app::service::{Controller, SERIAL_MSG_MAX};
use ignitron::config::DeviceConfig;
use ignitron::protocol::codec::PayloadWriter;
use ignitron::protocol::message;
use ignitron::protocol::{
    Command, Content, Direction, FramingProfile, MessageEncoder, MessageKind, SubCommand,
};
use ignitron::queue::IngestQueue;
use ignitron::state::{BluetoothRole, ButtonMode, OperationMode, PresetEditMode};

use crate::mock_hw::{
    KeyCall, MemConfig, MemLibrary, MockKeyboard, MockTransport, RecordingSink, TestController,
    controller, preset,
};

// ── Helpers ───────────────────────────────────────────────────

/// A message as the amp would send it.
fn from_amp(seq: u8, cmd: Command, sub: SubCommand, payload: &[u8]) -> Vec<Vec<u8>> {
    MessageEncoder::new(FramingProfile::FROM_AMP).encode(seq, cmd, sub as u8, payload, Direction::FromAmp)
}

/// A message as the app would send it to a Spark 40.
fn from_app(seq: u8, cmd: Command, sub: SubCommand, payload: &[u8]) -> Vec<Vec<u8>> {
    MessageEncoder::default().encode(seq, cmd, sub as u8, payload, Direction::ToAmp)
}

fn deliver(ctrl: &mut TestController, sink: &mut RecordingSink, chunks: &[Vec<u8>]) {
    let queue = IngestQueue::new();
    for chunk in chunks {
        queue.push(chunk);
    }
    ctrl.process(&queue, sink);
}

/// Bridge: the amp reports hardware preset `slot`, the relay fetches it
/// and the amp answers with `p`.
fn load_hw_preset(ctrl: &mut TestController, sink: &mut RecordingSink, slot: u8, name: &str) {
    let report = from_amp(0x10, Command::Response, SubCommand::HwPresetNumber, &message::hw_preset_payload(slot));
    deliver(ctrl, sink, &report);
    let answer = from_amp(0x11, Command::Response, SubCommand::Preset, &message::preset_payload(&preset(name)));
    deliver(ctrl, sink, &answer);
}

// ── Emulated amp ──────────────────────────────────────────────

#[test]
fn emulated_amp_starts_on_bank_one() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::filled(3));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);

    let ctx = ctrl.context();
    assert_eq!((ctx.active_bank, ctx.pending_bank, ctx.active_slot), (1, 1, 1));
    assert_eq!(ctx.active_preset.name, "B1S1");
    assert_eq!(ctx.pending_preset.name, "B1S1");
    assert_eq!(
        ctrl.transport().started,
        vec![(OperationMode::EmulatedAmp, BluetoothRole::PeripheralBle)]
    );
    assert_eq!(
        sink.events,
        vec![AppEvent::Started { mode: OperationMode::EmulatedAmp, role: BluetoothRole::PeripheralBle }]
    );
}

#[test]
fn uploaded_preset_is_stored_after_same_slot_twice() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::new(3));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);
    assert!(ctrl.handle_command(AppCommand::SetBank(2), &mut sink));

    let upload = from_app(0x05, Command::Write, SubCommand::Preset, &message::preset_payload(&preset("Upload")));
    deliver(&mut ctrl, &mut sink, &upload);

    let acks = ctrl.transport().notified_commands();
    assert_eq!(acks.len(), 1);
    assert_eq!((acks[0].command, acks[0].sub_command, acks[0].sequence), (0x04, 0x01, 0x05));
    assert_eq!(ctrl.context().preset_edit_mode, PresetEditMode::Store);
    assert_eq!(ctrl.context().app_received_preset.as_ref().map(|p| p.name.as_str()), Some("Upload"));

    // First selection only records the target.
    ctrl.handle_command(AppCommand::SelectPreset(3), &mut sink);
    assert!(ctrl.library().presets.is_empty());
    assert_eq!((ctrl.context().bank_to_edit, ctrl.context().slot_to_edit), (2, 3));

    ctrl.handle_command(AppCommand::SelectPreset(3), &mut sink);
    let stored = &ctrl.library().presets[&(2, 3)];
    assert_eq!(stored.name, "Upload");
    assert!(stored.same_configuration(&preset("Upload")));

    let ctx = ctrl.context();
    assert_eq!(ctx.response_msg, Some("SAVE OK"));
    assert_eq!(ctx.preset_edit_mode, PresetEditMode::None);
    assert!(ctx.app_received_preset.is_none());
    assert_eq!(ctx.active_preset.name, "Upload");
    assert_eq!(ctx.pending_preset.name, "Upload");
    assert!(sink.events.contains(&AppEvent::EditResponse("SAVE OK")));
}

#[test]
fn different_slots_do_not_store() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::new(2));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);
    let upload = from_app(0x01, Command::Write, SubCommand::Preset, &message::preset_payload(&preset("Upload")));
    deliver(&mut ctrl, &mut sink, &upload);

    ctrl.handle_command(AppCommand::SelectPreset(3), &mut sink);
    ctrl.handle_command(AppCommand::SelectPreset(4), &mut sink);

    assert!(ctrl.library().presets.is_empty());
    assert_eq!(ctrl.context().slot_to_edit, 4);
    assert_eq!(ctrl.context().preset_edit_mode, PresetEditMode::Store);
}

#[test]
fn occupied_slot_reports_exists() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::filled(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);
    let upload = from_app(0x01, Command::Write, SubCommand::Preset, &message::preset_payload(&preset("Upload")));
    deliver(&mut ctrl, &mut sink, &upload);

    ctrl.handle_command(AppCommand::SelectPreset(2), &mut sink);
    ctrl.handle_command(AppCommand::SelectPreset(2), &mut sink);

    assert_eq!(ctrl.context().response_msg, Some("PRST EXIST"));
    assert_eq!(ctrl.library().presets[&(1, 2)].name, "B1S2");
    assert_eq!(ctrl.context().preset_edit_mode, PresetEditMode::Store);
}

#[test]
fn delete_needs_two_presses() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::filled(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);

    assert!(ctrl.handle_command(AppCommand::DeletePreset, &mut sink));
    assert_eq!(ctrl.context().preset_edit_mode, PresetEditMode::Delete);
    assert!(ctrl.library().presets.contains_key(&(1, 1)));

    ctrl.handle_command(AppCommand::DeletePreset, &mut sink);
    assert!(!ctrl.library().presets.contains_key(&(1, 1)));
    assert_eq!(ctrl.context().response_msg, Some("DELETE OK"));
    assert_eq!(ctrl.context().preset_edit_mode, PresetEditMode::None);
    assert!(ctrl.context().active_preset.is_empty);

    ctrl.handle_command(AppCommand::ResetEditResponse, &mut sink);
    ctrl.handle_command(AppCommand::DeletePreset, &mut sink);
    ctrl.handle_command(AppCommand::DeletePreset, &mut sink);
    assert_eq!(ctrl.context().response_msg, Some("FILE NOT EXIST"));
}

#[test]
fn delete_button_cancels_pending_store() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);
    let upload = from_app(0x01, Command::Write, SubCommand::Preset, &message::preset_payload(&preset("Upload")));
    deliver(&mut ctrl, &mut sink, &upload);

    ctrl.handle_command(AppCommand::DeletePreset, &mut sink);
    assert_eq!(ctrl.context().preset_edit_mode, PresetEditMode::None);
    assert!(ctrl.context().app_received_preset.is_none());
    assert!(sink.events.contains(&AppEvent::EditModeChanged(PresetEditMode::None)));
}

#[test]
fn read_requests_get_fixed_answers() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::filled(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);

    deliver(&mut ctrl, &mut sink, &from_app(0x21, Command::Read, SubCommand::SerialNumber, &[]));
    deliver(&mut ctrl, &mut sink, &from_app(0x22, Command::Read, SubCommand::HwPresetNumber, &[]));
    deliver(&mut ctrl, &mut sink, &from_app(0x23, Command::Read, SubCommand::FirmwareVersion, &[]));

    let answers = ctrl.transport().notified_commands();
    assert_eq!(answers.len(), 3);
    assert!(answers.iter().all(|a| a.command == 0x03 && a.kind == MessageKind::CompleteResponse));

    assert_eq!((answers[0].sequence, answers[0].sub_command), (0x21, 0x23));
    assert_eq!(answers[0].payload, PayloadWriter::new().string("S999C999B999").finish());

    assert_eq!((answers[1].sequence, answers[1].sub_command), (0x22, 0x10));
    assert_eq!(answers[1].payload, vec![0x00, 0x00]);

    assert_eq!(answers[2].payload, vec![0xCE, 0x01, 0x0A, 0x08, 0x1B]);

    // From-amp block header on every answer.
    for chunks in &ctrl.transport().notified {
        assert_eq!(&chunks[0][4..6], &[0x41, 0xFF]);
    }
}

#[test]
fn current_preset_request_returns_active() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::filled(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);

    let request = from_app(0x30, Command::Read, SubCommand::Preset, &message::current_preset_request(None));
    deliver(&mut ctrl, &mut sink, &request);

    let answers = ctrl.transport().notified_commands();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].sequence, 0x30);
    match &answers[0].content {
        Content::Preset(p) => assert_eq!(p.name, "B1S1"),
        other => panic!("expected a preset, got {other:?}"),
    }
}

#[test]
fn unknown_read_is_not_answered() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);
    deliver(&mut ctrl, &mut sink, &from_app(0x40, Command::Read, SubCommand::AmpName, &[]));
    assert!(ctrl.transport().notified.is_empty());
}

#[test]
fn each_queued_write_acked_exactly_once() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);

    let mut chunks = from_app(0x01, Command::Write, SubCommand::EffectOnOff, &message::effect_payload("Booster", true));
    chunks.extend(from_app(0x02, Command::Write, SubCommand::EffectOnOff, &message::effect_payload("Booster", false)));
    deliver(&mut ctrl, &mut sink, &chunks);
    ctrl.process(&IngestQueue::new(), &mut sink);

    let acks = ctrl.transport().notified_commands();
    assert_eq!(acks.len(), 2);
    assert_eq!((acks[0].sequence, acks[0].sub_command), (0x01, 0x15));
    assert_eq!((acks[1].sequence, acks[1].sub_command), (0x02, 0x15));
    assert!(acks.iter().all(|a| a.kind == MessageKind::Ack));
}

#[test]
fn corrupted_write_is_still_acked() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);

    let mut chunks = from_app(0x07, Command::Write, SubCommand::EffectOnOff, &message::effect_payload("Booster", true));
    // Checksum byte of the first frame, after the 16-byte block header.
    chunks[0][16 + 3] ^= 0x01;
    deliver(&mut ctrl, &mut sink, &chunks);

    let acks = ctrl.transport().notified_commands();
    assert_eq!(acks.len(), 1);
    assert_eq!((acks[0].sequence, acks[0].sub_command), (0x07, 0x15));
    assert_eq!(ctrl.context().preset_edit_mode, PresetEditMode::None);
}

#[test]
fn serial_stream_is_processed_per_message() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);

    let bytes = from_app(0x09, Command::Read, SubCommand::SerialNumber, &[]).concat();
    ctrl.transport_mut().serial.extend(bytes);
    ctrl.process(&IngestQueue::new(), &mut sink);

    let answers = ctrl.transport().notified_commands();
    assert_eq!(answers.len(), 1);
    assert_eq!((answers[0].sequence, answers[0].sub_command), (0x09, 0x23));
}

#[test]
fn unterminated_serial_noise_is_bounded() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);

    ctrl.transport_mut().serial.extend(core::iter::repeat(0x00).take(600));
    ctrl.process(&IngestQueue::new(), &mut sink);
    assert!(ctrl.serial_backlog() < SERIAL_MSG_MAX);
    assert!(ctrl.transport().notified_commands().is_empty());

    let bytes = from_app(0x0A, Command::Read, SubCommand::SerialNumber, &[]).concat();
    ctrl.transport_mut().serial.extend(bytes);
    ctrl.process(&IngestQueue::new(), &mut sink);
    let answers = ctrl.transport().notified_commands();
    assert_eq!(answers.len(), 1);
    assert_eq!((answers[0].sequence, answers[0].sub_command), (0x0A, 0x23));
    assert_eq!(ctrl.serial_backlog(), 0);
}

#[test]
fn emulated_bank_ring_skips_zero() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::filled(2));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);

    ctrl.handle_command(AppCommand::IncreaseBank, &mut sink);
    assert_eq!(ctrl.context().active_bank, 2);
    assert_eq!(ctrl.context().active_preset.name, "B2S1");
    ctrl.handle_command(AppCommand::IncreaseBank, &mut sink);
    assert_eq!(ctrl.context().active_bank, 1);
    ctrl.handle_command(AppCommand::DecreaseBank, &mut sink);
    assert_eq!(ctrl.context().active_bank, 2);
    assert!(sink.events.contains(&AppEvent::BankChanged { active: 2, pending: 2 }));
}

#[test]
fn effect_toggle_refused_when_emulating() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::connected(), MemLibrary::filled(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);
    assert!(!ctrl.handle_command(AppCommand::ToggleEffect(2), &mut sink));
    assert!(!ctrl.handle_command(AppCommand::ToggleButtonMode, &mut sink));
    assert!(ctrl.transport().sent.is_empty());
}

// ── Bridge ────────────────────────────────────────────────────

#[test]
fn hw_report_fetches_and_reselect_toggles_drive() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::new(2));
    let mut sink = RecordingSink::default();

    let report = from_amp(0x10, Command::Response, SubCommand::HwPresetNumber, &message::hw_preset_payload(2));
    deliver(&mut ctrl, &mut sink, &report);
    assert_eq!((ctrl.context().active_bank, ctrl.context().active_slot), (0, 2));

    let sent = ctrl.transport().sent_commands();
    assert_eq!(sent.len(), 1);
    assert_eq!((sent[0].command, sent[0].sub_command), (0x02, 0x01));
    assert_eq!(&sent[0].payload[..2], &[0x00, 0x01]);

    let answer = from_amp(0x11, Command::Response, SubCommand::Preset, &message::preset_payload(&preset("Amp 2")));
    deliver(&mut ctrl, &mut sink, &answer);
    assert_eq!(ctrl.context().active_preset.name, "Amp 2");
    assert_eq!(ctrl.transport().sent.len(), 1, "preset responses need no ack");

    // Re-selecting the active hardware preset toggles the drive pedal.
    assert!(ctrl.handle_command(AppCommand::SelectPreset(2), &mut sink));
    let sent = ctrl.transport().sent_commands();
    let toggle = sent.last().unwrap();
    assert_eq!((toggle.command, toggle.sub_command), (0x01, 0x15));
    assert_eq!(toggle.content, Content::EffectOnOff { name: "Booster".into(), on: true });
    assert!(!ctrl.context().active_preset.pedals[2].is_on);
    assert!(ctrl.context().pending_preset.pedals[2].is_on);

    // Only the amp's ack promotes the change.
    let ack = from_amp(toggle.sequence, Command::Ack, SubCommand::EffectOnOff, &[]);
    deliver(&mut ctrl, &mut sink, &ack);
    assert!(ctrl.context().active_preset.pedals[2].is_on);
    assert!(sink.events.iter().any(|e| matches!(e, AppEvent::PresetChanged { slot: 2, .. })));
}

#[test]
fn custom_preset_upload_then_ack_selects_custom_slot() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::filled(2));
    let mut sink = RecordingSink::default();

    ctrl.handle_command(AppCommand::IncreaseBank, &mut sink);
    assert_eq!((ctrl.context().active_bank, ctrl.context().pending_bank), (0, 1));
    assert_eq!(ctrl.context().pending_preset.name, "B1S1");

    assert!(ctrl.handle_command(AppCommand::SelectPreset(1), &mut sink));
    let sent = ctrl.transport().sent_commands();
    assert_eq!(sent.len(), 1);
    assert_eq!((sent[0].command, sent[0].sub_command), (0x01, 0x01));
    assert!(matches!(&sent[0].content, Content::Preset(p) if p.name == "B1S1"));
    assert!(ctrl.context().custom_preset_number_change_pending);
    assert_eq!((ctrl.context().active_bank, ctrl.context().active_slot), (1, 1));
    assert!(ctrl.context().active_preset.is_empty, "not promoted before the ack");

    let ack = from_amp(sent[0].sequence, Command::Ack, SubCommand::Preset, &[]);
    deliver(&mut ctrl, &mut sink, &ack);

    let sent = ctrl.transport().sent_commands();
    assert_eq!(sent.len(), 2);
    assert_eq!((sent[1].command, sent[1].sub_command), (0x01, 0x38));
    assert_eq!(sent[1].payload, vec![0x00, 0x7F]);
    assert!(!ctrl.context().custom_preset_number_change_pending);
    assert_eq!(ctrl.context().active_preset.name, "B1S1");
}

#[test]
fn empty_library_slot_is_not_sent() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    ctrl.handle_command(AppCommand::IncreaseBank, &mut sink);
    ctrl.handle_command(AppCommand::SelectPreset(3), &mut sink);
    assert!(ctrl.transport().sent.is_empty());
    assert_eq!((ctrl.context().active_bank, ctrl.context().active_slot), (0, 1));
}

#[test]
fn hw_preset_change_ack_fetches_preset() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();

    ctrl.handle_command(AppCommand::SelectPreset(3), &mut sink);
    let sent = ctrl.transport().sent_commands();
    assert_eq!((sent[0].command, sent[0].sub_command), (0x01, 0x38));
    assert_eq!(sent[0].payload, vec![0x00, 0x02]);
    assert_eq!(ctrl.context().active_slot, 3);

    let ack = from_amp(sent[0].sequence, Command::Ack, SubCommand::ChangeHwPreset, &[]);
    deliver(&mut ctrl, &mut sink, &ack);
    let sent = ctrl.transport().sent_commands();
    assert_eq!(sent.len(), 2);
    assert_eq!((sent[1].command, sent[1].sub_command), (0x02, 0x01));
    assert_eq!(&sent[1].payload[..2], &[0x00, 0x02]);
}

#[test]
fn amp_notification_is_acked_toward_amp() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();

    let change = from_amp(0x33, Command::Response, SubCommand::ChangeHwPreset, &message::hw_preset_payload(4));
    deliver(&mut ctrl, &mut sink, &change);

    let (first, _) = &ctrl.transport().sent[0];
    assert_eq!(&first[0][4..6], &[0x53, 0xFE]);
    let sent = ctrl.transport().sent_commands();
    assert_eq!((sent[0].command, sent[0].sub_command, sent[0].sequence), (0x04, 0x38, 0x33));
    assert_eq!(ctrl.context().active_slot, 4);
    assert_eq!((sent[1].command, sent[1].sub_command), (0x02, 0x01));
}

#[test]
fn custom_slot_report_keeps_numbering() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::filled(1));
    let mut sink = RecordingSink::default();
    ctrl.handle_command(AppCommand::IncreaseBank, &mut sink);
    ctrl.handle_command(AppCommand::SelectPreset(2), &mut sink);
    assert_eq!((ctrl.context().active_bank, ctrl.context().active_slot), (1, 2));

    let report = from_amp(0x50, Command::Response, SubCommand::HwPresetNumber, &message::hw_preset_payload(128));
    deliver(&mut ctrl, &mut sink, &report);
    assert_eq!(ctrl.reassembler().current_preset_number(), 128);
    assert_eq!((ctrl.context().active_bank, ctrl.context().active_slot), (1, 2));
}

#[test]
fn amp_name_selects_framing() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();

    let name = PayloadWriter::new().string("Spark MINI").finish();
    deliver(&mut ctrl, &mut sink, &from_amp(0x60, Command::Response, SubCommand::AmpName, &name));
    assert_eq!(ctrl.encoder().profile(), FramingProfile::SPARK_MINI);
    assert!(sink.events.contains(&AppEvent::AmpIdentified("Spark MINI".into())));

    ctrl.handle_command(AppCommand::SelectPreset(2), &mut sink);
    let (chunks, paced) = ctrl.transport().sent.last().unwrap();
    assert!(*paced);
    assert!(chunks.iter().all(|c| c.len() <= 0x14));
    assert_eq!(ctrl.transport().sent_commands().last().unwrap().sub_command, 0x38);
}

#[test]
fn unknown_amp_keeps_framing() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    let name = PayloadWriter::new().string("Spark 2").finish();
    deliver(&mut ctrl, &mut sink, &from_amp(0x61, Command::Response, SubCommand::AmpName, &name));
    assert_eq!(ctrl.encoder().profile(), FramingProfile::SPARK_40);
}

#[test]
fn out_of_range_slots_are_ignored() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::filled(1));
    let mut sink = RecordingSink::default();
    ctrl.handle_command(AppCommand::IncreaseBank, &mut sink);
    assert_eq!(ctrl.context().button_mode, ButtonMode::PresetSelect);

    assert!(!ctrl.handle_command(AppCommand::SelectPreset(0), &mut sink));
    assert!(!ctrl.handle_command(AppCommand::SelectPreset(5), &mut sink));
    assert!(!ctrl.handle_command(AppCommand::NumberedButton(5), &mut sink));
    assert!(!ctrl.switch_preset(0, true));
    assert!(ctrl.transport().sent.is_empty());
    assert_eq!((ctrl.context().active_bank, ctrl.context().active_slot), (0, 1));
    assert!(!ctrl.context().custom_preset_number_change_pending);
}

#[test]
fn emulated_amp_ignores_slot_past_bank() {
    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::filled(1));
    let mut sink = RecordingSink::default();
    ctrl.start(&mut sink);
    let before = ctrl.context().active_preset.clone();
    sink.events.clear();

    assert!(!ctrl.handle_command(AppCommand::SelectPreset(5), &mut sink));
    assert_eq!(ctrl.context().active_slot, 1);
    assert_eq!(ctrl.context().active_preset, before);
    assert_eq!(ctrl.context().preset_edit_mode, PresetEditMode::None);
    assert!(sink.events.is_empty());
}

#[test]
fn actions_need_connected_amp() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::default(), MemLibrary::filled(2));
    let mut sink = RecordingSink::default();
    assert!(!ctrl.handle_command(AppCommand::SelectPreset(1), &mut sink));
    assert!(!ctrl.handle_command(AppCommand::IncreaseBank, &mut sink));
    assert!(!ctrl.handle_command(AppCommand::ToggleEffect(2), &mut sink));
    assert!(!ctrl.handle_command(AppCommand::ToggleButtonMode, &mut sink));
    assert!(ctrl.transport().sent.is_empty());
    assert_eq!(ctrl.context().pending_bank, 0);
}

#[test]
fn effect_buttons_follow_fixed_map() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    load_hw_preset(&mut ctrl, &mut sink, 1, "Amp 1");

    assert!(ctrl.handle_command(AppCommand::ToggleButtonMode, &mut sink));
    assert_eq!(ctrl.context().button_mode, ButtonMode::EffectToggle);

    assert!(ctrl.handle_command(AppCommand::NumberedButton(4), &mut sink));
    let toggle = ctrl.transport().sent_commands().pop().unwrap();
    assert_eq!(toggle.content, Content::EffectOnOff { name: "ChorusAnalog".into(), on: true });

    assert!(ctrl.handle_command(AppCommand::NumberedButton(1), &mut sink));
    let toggle = ctrl.transport().sent_commands().pop().unwrap();
    assert_eq!(toggle.content, Content::EffectOnOff { name: "bias.noisegate".into(), on: false });

    assert!(!ctrl.handle_command(AppCommand::NumberedButton(7), &mut sink));
    assert!(!ctrl.handle_command(AppCommand::ToggleEffect(9), &mut sink));
}

#[test]
fn peer_connection_identifies_amp_and_resends_slot() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    ctrl.on_peer_connected(&mut sink);

    let sent = ctrl.transport().sent_commands();
    assert_eq!(sent.len(), 2);
    assert_eq!((sent[0].command, sent[0].sub_command), (0x02, 0x11));
    assert_eq!((sent[1].command, sent[1].sub_command), (0x01, 0x38));
    assert_eq!(sent[1].payload, vec![0x00, 0x00]);
    assert!(sent[1].sequence > sent[0].sequence);
}

// ── Looper ────────────────────────────────────────────────────

#[test]
fn looper_steps_roll_across_banks() {
    let mut ctrl = controller(OperationMode::Looper, MockTransport::connected(), MemLibrary::filled(2));
    let mut sink = RecordingSink::default();

    assert!(ctrl.handle_command(AppCommand::LooperNext, &mut sink));
    assert_eq!((ctrl.context().active_bank, ctrl.context().active_slot), (0, 2));

    assert!(ctrl.handle_command(AppCommand::LooperPrevious, &mut sink));
    assert_eq!(ctrl.context().active_slot, 1);

    assert!(ctrl.handle_command(AppCommand::LooperPrevious, &mut sink));
    assert_eq!((ctrl.context().active_bank, ctrl.context().active_slot), (2, 4));
    let upload = ctrl.transport().sent_commands().pop().unwrap();
    assert!(matches!(upload.content, Content::Preset(ref p) if p.name == "B2S4"));
}

#[test]
fn looper_steps_only_in_looper_mode() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::filled(1));
    let mut sink = RecordingSink::default();
    assert!(!ctrl.handle_command(AppCommand::LooperNext, &mut sink));
    assert!(ctrl.transport().sent.is_empty());
}

// ── Modes, roles, restart ─────────────────────────────────────

#[test]
fn mode_switch_persists_and_drives_keyboard() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();

    assert!(ctrl.handle_command(AppCommand::ToggleLooperAppMode, &mut sink));
    assert_eq!(ctrl.context().operation_mode, OperationMode::Looper);
    assert!(ctrl.keyboard().started);
    assert_eq!(ctrl.config_store().stored.borrow().operation_mode, OperationMode::Looper);
    assert!(sink.events.contains(&AppEvent::ModeChanged {
        mode: OperationMode::Looper,
        button_mode: ButtonMode::PresetSelect,
    }));

    assert!(ctrl.handle_command(AppCommand::ToggleLooperAppMode, &mut sink));
    assert_eq!(ctrl.context().operation_mode, OperationMode::Bridge);
    assert!(!ctrl.keyboard().started);
    assert_eq!(ctrl.config_store().saves.get(), 2);
}

#[test]
fn mode_switch_discards_pending_navigation() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::connected(), MemLibrary::filled(2));
    let mut sink = RecordingSink::default();
    ctrl.handle_command(AppCommand::IncreaseBank, &mut sink);
    assert_eq!(ctrl.context().pending_bank, 1);

    ctrl.handle_command(AppCommand::SwitchOperationMode(OperationMode::Looper), &mut sink);
    assert_eq!(ctrl.context().pending_bank, 0);
    assert_eq!(ctrl.context().pending_preset, ctrl.context().active_preset);
}

#[test]
fn bluetooth_role_toggle_restarts_emulated_amp() {
    let mut ctrl = controller(OperationMode::Bridge, MockTransport::default(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    assert!(!ctrl.handle_command(AppCommand::ToggleBluetoothRole, &mut sink));
    assert!(!ctrl.take_restart_request());

    let mut ctrl = controller(OperationMode::EmulatedAmp, MockTransport::default(), MemLibrary::new(1));
    assert!(ctrl.handle_command(AppCommand::ToggleBluetoothRole, &mut sink));
    assert_eq!(ctrl.bluetooth_role(), BluetoothRole::PeripheralSerial);
    assert_eq!(ctrl.config_store().stored.borrow().bt_role, BluetoothRole::PeripheralSerial);
    assert!(ctrl.take_restart_request());
    assert!(!ctrl.take_restart_request());
    assert!(sink.events.contains(&AppEvent::RestartRequested { reset_mode: false }));
}

#[test]
fn restart_can_forget_mode() {
    let mut ctrl = controller(OperationMode::Looper, MockTransport::default(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    ctrl.handle_command(AppCommand::Restart { reset_mode: true }, &mut sink);
    assert!(ctrl.config_store().mode_cleared.get());
    assert!(ctrl.take_restart_request());
}

#[test]
fn persisted_config_selects_role() {
    let config = DeviceConfig {
        operation_mode: OperationMode::EmulatedAmp,
        bt_role: BluetoothRole::PeripheralSerial,
    };
    let mut ctrl = Controller::new(
        MockTransport::default(),
        MemLibrary::new(1),
        MemConfig::with(config),
        MockKeyboard::default(),
    );
    ctrl.start(&mut RecordingSink::default());
    assert_eq!(
        ctrl.transport().started,
        vec![(OperationMode::EmulatedAmp, BluetoothRole::PeripheralSerial)]
    );
}

#[test]
fn keyboard_only_mode_starts_keyboard_not_radio() {
    let mut ctrl = controller(OperationMode::KeyboardOnly, MockTransport::default(), MemLibrary::new(1));
    ctrl.start(&mut RecordingSink::default());
    assert!(ctrl.keyboard().started);
    assert!(ctrl.transport().started.is_empty());
}

// ── Keyboard ──────────────────────────────────────────────────

const KEY_SPACE: KeyboardKey = KeyboardKey { uid: 3, key: 0x2C, modifier: 0xE1, repeat: 1, label: "REC" };

#[test]
fn key_press_sends_modifier_and_repeats() {
    let mut ctrl = Controller::new(
        MockTransport::default(),
        MemLibrary::new(1),
        MemConfig::default(),
        MockKeyboard { connected: true, ..MockKeyboard::default() },
    );
    let mut sink = RecordingSink::default();

    assert!(ctrl.handle_command(AppCommand::KeyPress(KEY_SPACE), &mut sink));
    assert_eq!(
        ctrl.keyboard().calls,
        vec![KeyCall::Press(0xE1), KeyCall::Write(0x2C), KeyCall::Write(0x2C), KeyCall::Release(0xE1)]
    );
    assert_eq!(ctrl.context().last_key.as_ref().map(|k| k.uid), Some(3));
    assert!(sink.events.contains(&AppEvent::KeyboardKeySent { uid: 3, label: "REC" }));

    ctrl.handle_command(AppCommand::ResetLastKey, &mut sink);
    assert!(ctrl.context().last_key.is_none());
}

#[test]
fn key_press_needs_connected_keyboard() {
    let mut ctrl = controller(OperationMode::Looper, MockTransport::default(), MemLibrary::new(1));
    let mut sink = RecordingSink::default();
    assert!(!ctrl.handle_command(AppCommand::KeyPress(KEY_SPACE), &mut sink));
    assert!(ctrl.keyboard().calls.is_empty());
}
