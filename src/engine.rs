//! The protocol engine: single owner of all mutable protocol state,
//! advanced by a periodic work cycle.
//!
//! Transport chunks are reassembled into complete SysEx messages and
//! queued; every cycle classifies at most one of them and advances the
//! outbound queue by at most one transition, so a cycle never blocks.
//! Classification is by message prefix: the universal identity reply,
//! the firmware version answer, settings-family frames (dump streams,
//! parameter reports, status words) and memory-family confirmations.

use anyhow::{bail, Context, Result};
use tracing::{debug, info, trace, warn};

use crate::midi::Transport;
use crate::patchlib::PatchLibrary;
use crate::protocol::queue::{InboundQueue, OutboundQueue, Reassembly};
use crate::protocol::serialize::{self, opcode, PatchTarget};
use crate::protocol::{
    dump, model_name, ProtocolError, FAMILY_MEMORY, FAMILY_SETTINGS, IDENTITY_REPLY_PREFIX,
    SYSEX_START, SYSEX_STOP, VERSION_ANSWER_PREFIX, YAMAHA_ID,
};
use crate::settings::SettingsAggregate;

/// Delivery ids of the handshake messages. Patch writes start at
/// [`serialize::PATCH_HEADER_ID`], well clear of these.
const ID_IDENTITY: u16 = 1;
const ID_FIRMWARE: u16 = 2;
const ID_DUMP: u16 = 3;

/// Length nibbles of a full 210-byte dump slice.
const FULL_SLICE_NIBBLES: (u8, u8) = (0x0D, 0x01);

/// Snapshot of the engine for the console's `status` command.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub model: Option<&'static str>,
    pub firmware: Option<String>,
    pub live: bool,
    pub active_patch: Option<usize>,
    pub patch_name: String,
    pub dirty: bool,
    pub boost: bool,
    pub outbound_pending: usize,
    pub library_len: usize,
}

pub struct Engine {
    transport: Box<dyn Transport>,
    settings: SettingsAggregate,
    /// Pre-patch settings, kept from the first activation until the
    /// patch is deactivated again.
    stored: Option<SettingsAggregate>,
    library: PatchLibrary,
    outbound: OutboundQueue,
    inbound: InboundQueue,
    reassembly: Reassembly,
    dump_stream: Vec<u8>,
    collecting_dump: bool,
    connected_model: Option<u32>,
    firmware: Option<String>,
    active_patch: Option<usize>,
    /// Switch to live mode once the startup dump has been mirrored.
    live_mode: bool,
}

impl Engine {
    pub fn new(transport: Box<dyn Transport>, library: PatchLibrary, live_mode: bool) -> Self {
        Self {
            transport,
            settings: SettingsAggregate::new(),
            stored: None,
            library,
            outbound: OutboundQueue::new(),
            inbound: InboundQueue::new(),
            reassembly: Reassembly::new(),
            dump_stream: Vec::new(),
            collecting_dump: false,
            connected_model: None,
            firmware: None,
            active_patch: None,
            live_mode,
        }
    }

    /// The mirrored amplifier state. Setter calls land here; the frames
    /// they produce are picked up by the next work cycle.
    pub fn settings_mut(&mut self) -> &mut SettingsAggregate {
        &mut self.settings
    }

    pub fn settings(&self) -> &SettingsAggregate {
        &self.settings
    }

    pub fn library(&self) -> &PatchLibrary {
        &self.library
    }

    /// Swap in a freshly loaded library (directory watcher path).
    pub fn set_library(&mut self, library: PatchLibrary) {
        if let Some(id) = self.active_patch {
            if library.get(id).is_none() {
                warn!(id, "active patch disappeared from the library");
            }
        }
        self.library = library;
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            model: self.connected_model.map(model_name),
            firmware: self.firmware.clone(),
            live: self.settings.send_changes(),
            active_patch: self.active_patch,
            patch_name: self.settings.active_name().to_string(),
            dirty: self.settings.is_dirty(),
            boost: self.settings.boost_active(),
            outbound_pending: self.outbound.len(),
            library_len: self.library.len(),
        }
    }

    // ===== Handshake =====

    /// Reset the transport state and enqueue the opening sequence: the
    /// universal identity request, then the firmware-version request.
    /// The startup dump request follows once the version answer is in.
    pub fn start_handshake(&mut self) -> Result<(), ProtocolError> {
        let dropped = self.outbound.reset();
        if dropped > 0 {
            warn!(dropped, "stalled outbound messages cleared");
        }
        self.collecting_dump = false;
        self.dump_stream.clear();
        self.connected_model = None;
        self.firmware = None;

        self.outbound.enqueue(serialize::identity_request(ID_IDENTITY))?;
        let request = serialize::settings_message(
            self.settings.framer_mut(),
            opcode::FIRMWARE_REQUEST,
            &[],
            ID_FIRMWARE,
            false,
            true,
        );
        self.outbound.enqueue_all(request)?;
        info!("handshake started");
        Ok(())
    }

    /// Ask the amplifier for a full settings dump. The stream that comes
    /// back is applied to the mirror when it completes.
    pub fn request_dump(&mut self) -> Result<(), ProtocolError> {
        let request = serialize::settings_message(
            self.settings.framer_mut(),
            opcode::DUMP_REQUEST,
            &[],
            ID_DUMP,
            false,
            true,
        );
        self.outbound.enqueue_all(request)
    }

    fn ensure_identified(&self) -> Result<()> {
        if self.connected_model.is_none() {
            bail!("no amplifier identified yet, complete the handshake first");
        }
        Ok(())
    }

    // ===== Patch operations =====

    /// Load a library patch into the mirror and push it to the device.
    /// The pre-patch settings are snapshotted once, so switching between
    /// patches keeps the state from before the first activation.
    pub fn activate_patch(&mut self, id: usize) -> Result<()> {
        self.ensure_identified()?;
        let entry = self
            .library
            .get(id)
            .with_context(|| format!("no patch with id {id} (library holds {})", self.library.len()))?;
        if self.stored.is_none() {
            self.stored = Some(self.settings.clone());
            debug!("local settings stored");
        }
        info!(id, patch = %entry.name, "activating patch");
        self.settings.load_document(&entry.doc);
        self.active_patch = Some(id);
        Ok(())
    }

    /// Restore the settings stored by the first activation and push them
    /// back as a full patch write.
    pub fn deactivate_patch(&mut self) -> Result<()> {
        self.ensure_identified()?;
        match self.stored.take() {
            Some(stored) => {
                self.settings.adopt_state(&stored);
                self.settings.create_patch(PatchTarget::Active);
                self.active_patch = None;
                info!("local settings restored");
            }
            None => info!("no patch active, nothing to restore"),
        }
        Ok(())
    }

    /// Write the current settings into one of the five user memory
    /// slots (1-5) and remember the slot as the settings' home.
    pub fn save_to_slot(&mut self, slot: u8) -> Result<()> {
        self.ensure_identified()?;
        if !(1..=5).contains(&slot) {
            bail!("slot must be 1-5, got {slot}");
        }
        let name = self.settings.active_name().to_string();
        self.settings.set_patch_name(&name, slot as usize);
        self.settings.create_patch(PatchTarget::UserSlot(slot - 1));
        self.settings.set_active_user_setting(Some(slot));
        info!(slot, patch = %name, "settings written to user slot");
        Ok(())
    }

    pub fn active_patch(&self) -> Option<usize> {
        self.active_patch
    }

    // ===== Work cycle =====

    /// Transport callback path: accumulate one chunk, queue the message
    /// once its final chunk (the SysEx terminator) arrives.
    pub fn feed_chunk(&mut self, chunk: &[u8]) {
        if self.reassembly.pending() == 0 && chunk.first() != Some(&SYSEX_START) {
            // realtime and channel traffic, not a SysEx continuation
            trace!(len = chunk.len(), "non-exclusive chunk skipped");
            return;
        }
        let is_final = chunk.last() == Some(&SYSEX_STOP);
        match self.reassembly.feed(chunk, is_final) {
            Ok(Some(msg)) => {
                trace!(len = msg.len(), "message reassembled");
                if let Err(e) = self.inbound.push(msg) {
                    warn!(error = %e, "inbound message dropped");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "partial message discarded"),
        }
    }

    /// One engine step: classify at most one inbound message, move the
    /// frames produced since the last step into the outbound queue, then
    /// advance that queue by one transition.
    pub fn work_cycle(&mut self) -> Result<()> {
        if let Some(msg) = self.inbound.pop() {
            self.classify(&msg);
        }
        for msg in self.settings.take_outbox() {
            let id = msg.id;
            if let Err(e) = self.outbound.enqueue(msg) {
                warn!(id, error = %e, "frame rejected by the outbound queue");
            }
        }
        if let Some(payload) = self.outbound.tick() {
            self.transport
                .send_raw(payload)
                .context("sending the queued frame")?;
        }
        Ok(())
    }

    // ===== Inbound classification =====

    fn classify(&mut self, msg: &[u8]) {
        if msg.starts_with(&IDENTITY_REPLY_PREFIX) {
            self.on_identity_reply(msg);
        } else if msg.starts_with(&VERSION_ANSWER_PREFIX) {
            self.on_version_answer(msg);
        } else if is_family(msg, &FAMILY_SETTINGS) {
            self.on_settings_frame(msg);
        } else if is_family(msg, &FAMILY_MEMORY) {
            self.on_memory_frame(msg);
        } else {
            debug!(
                head = %hex::encode(&msg[..msg.len().min(12)]),
                len = msg.len(),
                "unclassified message dropped"
            );
        }
    }

    /// Identity reply: `F0 7E 7F 06 02`, the Yamaha id, then the family
    /// and model words and four version digits.
    fn on_identity_reply(&mut self, msg: &[u8]) {
        if msg.len() < 17 || msg[5..8] != YAMAHA_ID {
            debug!(len = msg.len(), "identity reply from a foreign device ignored");
            return;
        }
        let family = u16::from_le_bytes([msg[8], msg[9]]);
        let model = u16::from_le_bytes([msg[10], msg[11]]);
        let id = (family as u32) << 16 | model as u32;
        let version = format!("{}.{}.{}{}", msg[15], msg[14], msg[13], msg[12] as char);
        info!(model = model_name(id), id = format_args!("{id:#010x}"), %version, "amplifier identified");
        self.connected_model = Some(id);
        if self.firmware.is_none() {
            self.firmware = Some(version);
        }
        self.outbound.acknowledge();
    }

    /// The `L6ImageType:...` string. Arrives once after the identity
    /// reply and once more as the reply to the firmware request; the
    /// second one triggers the startup dump request.
    fn on_version_answer(&mut self, msg: &[u8]) {
        let ascii = msg
            .get(VERSION_ANSWER_PREFIX.len()..msg.len().saturating_sub(1))
            .unwrap_or(&[]);
        let version = ascii
            .split(|&b| b == 0)
            .filter_map(|part| std::str::from_utf8(part).ok())
            .find_map(|part| part.strip_prefix("L6ImageVersion:"));
        if let Some(version) = version {
            info!(version, "firmware version reported");
            self.firmware = Some(version.to_string());
        }
        if let Some(id) = self.outbound.answer() {
            if id == ID_FIRMWARE {
                if let Err(e) = self.request_dump() {
                    warn!(error = %e, "startup dump request not queued");
                }
            }
        }
    }

    fn on_settings_frame(&mut self, msg: &[u8]) {
        let frame = match serialize::decode_frame(msg) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "undecodable settings frame dropped");
                return;
            }
        };
        if frame.len_nibbles == FULL_SLICE_NIBBLES {
            self.dump_stream.extend_from_slice(&frame.raw);
            self.collecting_dump = true;
            trace!(collected = self.dump_stream.len(), "dump slice buffered");
            return;
        }
        if self.collecting_dump {
            // first shorter frame closes the stream
            self.dump_stream.extend_from_slice(&frame.raw);
            self.collecting_dump = false;
            let stream = std::mem::take(&mut self.dump_stream);
            self.finish_dump(&stream);
            return;
        }
        match frame.raw.len() {
            16 => self.on_parameter_report(&frame.raw),
            8 => self.on_status(&frame.raw),
            len => debug!(len, "settings frame without a mapping dropped"),
        }
    }

    /// Memory-family traffic back from the device is the write
    /// confirmation status.
    fn on_memory_frame(&mut self, msg: &[u8]) {
        let frame = match serialize::decode_frame(msg) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "undecodable memory frame dropped");
                return;
            }
        };
        if frame.raw.len() == 8 {
            if word(&frame.raw, 0) == opcode::WRITE_ACK {
                debug!("memory write confirmed");
            }
            self.on_status(&frame.raw);
        } else {
            debug!(len = frame.raw.len(), "memory frame without a mapping dropped");
        }
    }

    /// A complete dump stream: parse, mirror, count the answer, then
    /// switch to live mode when configured.
    fn finish_dump(&mut self, stream: &[u8]) {
        let parsed = dump::parse_dump(stream);
        if !parsed.is_complete() {
            warn!(len = stream.len(), "damaged dump stream, applying the sound part");
        }
        dump::apply_dump(&parsed, &mut self.settings);
        info!(
            units = parsed.units.len(),
            globals = parsed.globals.len(),
            patch = %self.settings.active_name(),
            "settings dump applied"
        );
        if let Some(id) = self.outbound.answer() {
            trace!(id, "dump answered the in-flight request");
        }
        if self.live_mode && !self.settings.send_changes() {
            self.settings.set_send_changes(true);
            info!("live mode on, changes now stream to the amplifier");
        }
    }

    /// A 16-byte report: the device pushes `(unit key, parameter key,
    /// value)` words when a knob moves on the amplifier itself.
    fn on_parameter_report(&mut self, raw: &[u8]) {
        let unit = word(raw, 0) as u16;
        let key = word(raw, 1) as u16;
        let value = word(raw, 2);
        if dump::apply_parameter(&mut self.settings, unit, key, value) {
            debug!(unit, key, "device-side change mirrored");
        } else {
            debug!(unit, key, "parameter report without a mapping dropped");
        }
    }

    /// An 8-byte status pair `(code, status)`. Zero status satisfies the
    /// next outstanding flag of the in-flight message, ack before answer.
    fn on_status(&mut self, raw: &[u8]) {
        let code = word(raw, 0);
        let status = word(raw, 1);
        if status != 0 {
            warn!(code, status, head = ?self.outbound.head_id(), "device reported a failure status");
            return;
        }
        if let Some(id) = self.outbound.acknowledge() {
            trace!(id, code, "in-flight message acknowledged");
        } else if let Some(id) = self.outbound.answer() {
            trace!(id, code, "in-flight message answered");
        } else {
            debug!(code, "status with nothing in flight dropped");
        }
    }
}

fn is_family(msg: &[u8], family: &[u8; 3]) -> bool {
    msg.len() > 7 && msg[0] == SYSEX_START && msg[1..4] == YAMAHA_ID && msg[4..7] == *family
}

fn word(raw: &[u8], i: usize) -> u32 {
    u32::from_le_bytes([raw[4 * i], raw[4 * i + 1], raw[4 * i + 2], raw[4 * i + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{bucket, SLICE_LEN};
    use crate::settings::types::{AmpModel, Collection, Control};
    use parking_lot::Mutex;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct CapturingTransport {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Transport for CapturingTransport {
        fn send_raw(&mut self, msg: &[u8]) -> Result<(), ProtocolError> {
            self.sent.lock().push(msg.to_vec());
            Ok(())
        }
    }

    fn engine_with_transport() -> (Engine, CapturingTransport) {
        let transport = CapturingTransport::default();
        let engine = Engine::new(Box::new(transport.clone()), PatchLibrary::default(), true);
        (engine, transport)
    }

    fn cycles(engine: &mut Engine, n: usize) {
        for _ in 0..n {
            engine.work_cycle().unwrap();
        }
    }

    /// A settings-family frame as the amplifier would emit it.
    fn device_frame(counter: u8, index: u8, raw: &[u8]) -> Vec<u8> {
        let mut out = vec![0xF0, 0x00, 0x01, 0x0C, 0x22, 0x02, 0x4D, 0x01];
        out.push(counter);
        out.push(index);
        out.push(((raw.len() - 1) / 16) as u8);
        out.push(((raw.len() - 1) % 16) as u8);
        out.extend_from_slice(&bucket::encode(raw));
        out.push(0xF7);
        out
    }

    fn identity_reply() -> Vec<u8> {
        vec![
            0xF0, 0x7E, 0x7F, 0x06, 0x02, 0x00, 0x01, 0x0C, 0x24, 0x00, 0x02, 0x00, 0x63, 0x00,
            0x1E, 0x01, 0xF7,
        ]
    }

    fn version_answer() -> Vec<u8> {
        let mut msg = VERSION_ANSWER_PREFIX.to_vec();
        msg.extend_from_slice(b"L6ImageType:main\0L6ImageVersion:1.30.0.c\0");
        msg.push(0xF7);
        msg
    }

    fn status_frame(code: u32, status: u32) -> Vec<u8> {
        let mut raw = code.to_le_bytes().to_vec();
        raw.extend_from_slice(&status.to_le_bytes());
        device_frame(0x30, 0, &raw)
    }

    /// Feed a complete dump of `settings` as the amplifier would send it.
    fn feed_dump(engine: &mut Engine, settings: &SettingsAggregate) {
        let buffer = serialize::build_patch_buffer(settings);
        for (i, slice) in buffer.chunks(SLICE_LEN).enumerate() {
            engine.feed_chunk(&device_frame(0x10, i as u8, slice));
            cycles(engine, 1);
        }
    }

    #[test]
    fn handshake_walks_identity_then_firmware_then_dump() {
        let (mut engine, transport) = engine_with_transport();
        engine.start_handshake().unwrap();

        cycles(&mut engine, 3);
        {
            let sent = transport.sent.lock();
            assert_eq!(sent.len(), 1, "identity request holds the queue");
            assert_eq!(sent[0], crate::protocol::IDENTITY_REQUEST);
        }

        // first reply acknowledges, the version message answers
        engine.feed_chunk(&identity_reply());
        cycles(&mut engine, 2);
        assert_eq!(engine.status().model, Some("THR30II"));
        assert_eq!(engine.status().firmware.as_deref(), Some("1.30.0c"));
        assert_eq!(transport.sent.lock().len(), 1);

        engine.feed_chunk(&version_answer());
        cycles(&mut engine, 3);
        {
            let sent = transport.sent.lock();
            assert_eq!(sent.len(), 2, "firmware request follows the identity");
            assert_eq!(sent[1].len(), 29);
        }
        // the L6 string refines the firmware field
        assert_eq!(engine.status().firmware.as_deref(), Some("1.30.0.c"));

        // second version answer resolves the firmware request and queues
        // the dump request
        engine.feed_chunk(&version_answer());
        cycles(&mut engine, 3);
        assert_eq!(transport.sent.lock().len(), 3, "dump request sent");

        let mut amp_state = SettingsAggregate::new();
        amp_state.set_collection_amp(Collection::Modern, AmpModel::HiGain);
        amp_state.set_control(Control::Gain, 66.0);
        amp_state.set_patch_name("From Amp", 0);
        feed_dump(&mut engine, &amp_state);

        let status = engine.status();
        assert_eq!(status.patch_name, "From Amp");
        assert!(status.live, "live mode follows the startup dump");
        assert!(!status.dirty);
        assert_eq!(engine.settings().amp, AmpModel::HiGain);
        assert!((engine.settings().control(Control::Gain) - 66.0).abs() < 1e-4);

        cycles(&mut engine, 2);
        assert_eq!(engine.status().outbound_pending, 0, "handshake fully drained");
    }

    #[test]
    fn multi_slice_dumps_need_the_closing_short_frame() {
        let (mut engine, _transport) = engine_with_transport();

        let mut amp_state = SettingsAggregate::new();
        amp_state.set_patch_name("Sliced", 0);
        let buffer = serialize::build_patch_buffer(&amp_state);
        assert!(buffer.len() > SLICE_LEN, "fixture must span slices");

        let mut chunks = buffer.chunks(SLICE_LEN);
        let first = chunks.next().unwrap();
        engine.feed_chunk(&device_frame(0x10, 0, first));
        cycles(&mut engine, 1);
        assert_ne!(
            engine.settings().active_name(),
            "Sliced",
            "a full slice alone must not close the stream"
        );

        for (i, slice) in chunks.enumerate() {
            engine.feed_chunk(&device_frame(0x10, i as u8 + 1, slice));
            cycles(&mut engine, 1);
        }
        assert_eq!(engine.settings().active_name(), "Sliced");
    }

    #[test]
    fn parameter_reports_mirror_without_echo() {
        let (mut engine, transport) = engine_with_transport();
        engine.settings_mut().set_send_changes(true);

        let mut raw = Vec::new();
        raw.extend_from_slice(&(crate::protocol::values::unit_key::AMP as u32).to_le_bytes());
        raw.extend_from_slice(&(crate::protocol::values::param_key::BASS as u32).to_le_bytes());
        raw.extend_from_slice(&crate::protocol::values::percent_to_wire(72.0).to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());

        engine.feed_chunk(&device_frame(0x22, 0, &raw));
        cycles(&mut engine, 2);

        assert!((engine.settings().control(Control::Bass) - 72.0).abs() < 1e-4);
        assert!(transport.sent.lock().is_empty(), "mirroring must not send");
    }

    #[test]
    fn zero_status_satisfies_ack_then_answer() {
        let (mut engine, _transport) = engine_with_transport();
        engine.start_handshake().unwrap();
        cycles(&mut engine, 1); // identity request now in flight

        engine.feed_chunk(&status_frame(0, 1));
        cycles(&mut engine, 2);
        assert_eq!(
            engine.status().outbound_pending,
            2,
            "failure status leaves the head in flight"
        );

        engine.feed_chunk(&status_frame(0, 0));
        cycles(&mut engine, 1);
        engine.feed_chunk(&status_frame(0, 0));
        cycles(&mut engine, 3);
        assert_eq!(
            engine.status().outbound_pending,
            1,
            "two clean statuses complete an ack+answer message"
        );
    }

    #[test]
    fn write_confirmation_releases_the_patch_frames() {
        let (mut engine, transport) = engine_with_transport();
        engine.feed_chunk(&identity_reply());
        cycles(&mut engine, 1);

        engine.settings_mut().set_patch_name("Held", 0);
        engine.settings_mut().create_patch(PatchTarget::Active);
        cycles(&mut engine, 1); // enqueue + send the header

        let frames_total = {
            let sent = transport.sent.lock();
            assert_eq!(sent.len(), 1, "header waits for its ack and answer");
            1 + serialize::build_patch_buffer(engine.settings()).len().div_ceil(SLICE_LEN)
        };

        // header ack + answer come back as memory statuses
        let mut confirm = opcode::WRITE_ACK.to_le_bytes().to_vec();
        confirm.extend_from_slice(&0u32.to_le_bytes());
        let mut msg = vec![0xF0, 0x00, 0x01, 0x0C, 0x24, 0x02, 0x4D, 0x01, 0x06, 0x00];
        msg.push(((confirm.len() - 1) / 16) as u8);
        msg.push(((confirm.len() - 1) % 16) as u8);
        msg.extend_from_slice(&bucket::encode(&confirm));
        msg.push(0xF7);

        engine.feed_chunk(&msg);
        cycles(&mut engine, 2);
        engine.feed_chunk(&msg);
        cycles(&mut engine, 8);
        {
            let sent = transport.sent.lock();
            assert!(
                sent.len() >= frames_total - 1,
                "middle slices flow freely, got {}",
                sent.len()
            );
        }

        // the final slice waits for its own confirmation
        engine.feed_chunk(&msg);
        cycles(&mut engine, 3);
        assert_eq!(engine.status().outbound_pending, 0);
        assert_eq!(transport.sent.lock().len(), frames_total);
    }

    #[test]
    fn foreign_traffic_is_dropped_quietly() {
        let (mut engine, transport) = engine_with_transport();
        engine.feed_chunk(&[0xF0, 0x00, 0x20, 0x6B, 0x01, 0x02, 0xF7]); // other vendor
        engine.feed_chunk(&[0xF0, 0x7E, 0x7F, 0x06, 0x02, 0x42, 0xF7]); // foreign identity
        engine.feed_chunk(&[0xF8]); // clock tick, final by length
        cycles(&mut engine, 5);
        assert!(engine.status().model.is_none());
        assert!(transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn patch_cycle_snapshots_and_restores() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{"data":{"meta":{"name":"Lead"},"tone":{"THRGroupAmp":{"@asset":"THR10X_Brown1","Drive":0.9}}}}"#,
        )
        .unwrap();
        let library = PatchLibrary::load(dir.path()).await.unwrap();

        let transport = CapturingTransport::default();
        let mut engine = Engine::new(Box::new(transport.clone()), library, false);

        assert!(
            engine.activate_patch(1).is_err(),
            "patch ops need an identified amplifier"
        );

        engine.feed_chunk(&identity_reply());
        cycles(&mut engine, 1);

        engine.settings_mut().set_control(Control::Gain, 31.0);
        engine.activate_patch(1).unwrap();
        assert_eq!(engine.active_patch(), Some(1));
        assert_eq!(engine.settings().active_name(), "Lead");
        assert_eq!(engine.settings().collection, Collection::Modern);
        assert_eq!(engine.settings().amp, AmpModel::Lead);
        assert!((engine.settings().control(Control::Gain) - 90.0).abs() < 1e-4);

        assert!(engine.activate_patch(7).is_err(), "unknown id is an error");
        assert_eq!(engine.active_patch(), Some(1), "failed activation changes nothing");

        engine.deactivate_patch().unwrap();
        assert_eq!(engine.active_patch(), None);
        assert!((engine.settings().control(Control::Gain) - 31.0).abs() < 1e-4);

        // both writes are queued but only the first header leaves while
        // its confirmations are outstanding
        cycles(&mut engine, 6);
        assert_eq!(transport.sent.lock().len(), 1);
        assert!(engine.status().outbound_pending >= 4);
    }
}
