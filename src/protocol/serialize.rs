//! Wire frame construction: the tagged patch buffer, its slicing into
//! memory-write frames, the two-frame settings-change messages, and the
//! inbound frame decoder.
//!
//! Every frame shares one shape: an 8-byte preamble selecting the family,
//! a counter byte, a frame index, two length nibbles describing the raw
//! payload, the bit-bucket-encoded payload, and the SysEx terminator.
//! Single-message payloads are zero-padded to whole 7-byte groups before
//! encoding (the nibbles keep the true length); patch slices are not.

use crate::protocol::bucket;
use crate::protocol::queue::OutMessage;
use crate::protocol::tokens::Token;
use crate::protocol::values::{
    self, amp_type_code, echo_type_code, effect_type_code, param_key, reverb_type_code, type_code,
    unit_key, WireType,
};
use crate::protocol::{
    ProtocolError, FRAME_HEADER_LEN, IDENTITY_REQUEST, MEMORY_PREAMBLE, SETTINGS_PREAMBLE,
    SLICE_LEN, SYSEX_STOP,
};
use crate::settings::types::{Control, EffectType, HallParams, ReverbType};
use crate::settings::SettingsAggregate;

/// Sequence id of a patch write's header frame; slices follow upward.
pub const PATCH_HEADER_ID: u16 = 100;

/// Counter byte of a patch header frame. The slices of the same patch all
/// carry the successor value and never advance it further.
const PATCH_FRAME_SEED: u8 = 0x06;

const WRITE_OPCODE: u32 = 0x0D;

/// Opcodes of the settings-change family, transmitted as the first word
/// of a message's head frame.
pub mod opcode {
    /// Ask for the firmware version string.
    pub const FIRMWARE_REQUEST: u32 = 0x01;
    /// Ask for a full settings dump.
    pub const DUMP_REQUEST: u32 = 0x02;
    /// Change a single parameter value.
    pub const PARAM_CHANGE: u32 = 0x04;
    /// Switch a unit on or off, or select the cabinet.
    pub const UNIT_COMMAND: u32 = 0x07;
    /// Change a unit's active type selector.
    pub const TYPE_CHANGE: u32 = 0x08;
    /// Unlock the MIDI interface with the firmware's key.
    pub const MIDI_ACTIVATE: u32 = 0x09;
    /// Device-side confirmation of a memory write.
    pub const WRITE_ACK: u32 = 0x0C;
}

/// Destination of a patch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTarget {
    /// Overwrite the live settings without touching stored slots.
    Active,
    /// Overwrite one of the user memory slots.
    UserSlot(u8),
}

impl PatchTarget {
    fn word(self) -> u32 {
        match self {
            PatchTarget::Active => 0xFFFF_FFFF,
            PatchTarget::UserSlot(n) => n as u32,
        }
    }
}

/// Per-connection sequence counter for settings-change frames. Each
/// transmitted frame consumes one value; the device uses it to detect
/// lost frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct Framer {
    seq: u8,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next sequence byte, wrapping inside the 7-bit value space.
    pub fn next_seq(&mut self) -> u8 {
        let v = self.seq & 0x7F;
        self.seq = self.seq.wrapping_add(1);
        v
    }
}

fn push_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_token(buf: &mut Vec<u8>, token: Token) {
    buf.extend_from_slice(token.bytes());
}

/// One `(device key, wire type, value)` triple inside a unit block.
fn push_param(buf: &mut Vec<u8>, key: u16, ty: WireType, value: u32) {
    push_u16(buf, key);
    push_u32(buf, ty.word());
    push_u32(buf, value);
}

/// Unit block preamble: key, type selector and parameter count.
fn open_unit(buf: &mut Vec<u8>, key: u16, ty: u16, par_count: u32) {
    push_token(buf, Token::UnitOpen);
    push_u16(buf, key);
    push_token(buf, Token::UnitType);
    push_token(buf, Token::PseudoVal);
    push_u16(buf, ty);
    push_token(buf, Token::ParCount);
    push_token(buf, Token::PseudoType);
    push_u32(buf, par_count);
}

/// Sextet announcing a global value: number, padding, type byte.
fn push_global_header(buf: &mut Vec<u8>, number: u16, ty: WireType) {
    push_u16(buf, number);
    push_u16(buf, 0);
    buf.push(ty.type_byte());
    buf.push(0);
}

fn push_meta(buf: &mut Vec<u8>, name: &str, tnid: u32, unknown: u32, tempo: u32) {
    push_token(buf, Token::Meta);
    push_token(buf, Token::TokenMeta);
    push_global_header(buf, 0x0000, WireType::Text);
    push_u32(buf, name.len() as u32 + 1);
    buf.extend_from_slice(name.as_bytes());
    buf.push(0);
    push_global_header(buf, 0x0001, WireType::Enum);
    push_u32(buf, tnid);
    push_global_header(buf, 0x0002, WireType::Enum);
    push_u32(buf, unknown);
    push_global_header(buf, 0x0003, WireType::Int);
    push_u32(buf, tempo);
}

fn pct(v: f64) -> u32 {
    values::percent_to_wire(v)
}

/// Room, plate and hall reverbs serialize the same three parameters.
fn push_hall_reverb(buf: &mut Vec<u8>, ty: ReverbType, p: &HallParams) {
    open_unit(buf, unit_key::REVERB, reverb_type_code(ty), 3);
    push_param(buf, param_key::DECAY, WireType::Int, pct(p.decay));
    push_param(buf, param_key::PRE_DELAY, WireType::Int, pct(p.predelay));
    push_param(buf, param_key::TONE, WireType::Int, pct(p.tone));
}

/// Serialize the complete aggregate into the tagged wire structure the
/// device stores as a patch. The guitar-processing unit carries the
/// enable flags, mix levels, cabinet and gate directly; compressor, amp,
/// effect, echo and reverb nest inside it as subunits.
pub fn build_patch_buffer(s: &SettingsAggregate) -> Vec<u8> {
    let mut buf = Vec::with_capacity(600);

    push_token(&mut buf, Token::StructOpen);
    push_meta(
        &mut buf,
        s.active_name(),
        s.tnid,
        s.unknown_global,
        s.tempo,
    );
    push_token(&mut buf, Token::StructClose);

    push_token(&mut buf, Token::StructOpen);
    push_token(&mut buf, Token::Data);
    push_token(&mut buf, Token::TokenData);

    open_unit(
        &mut buf,
        unit_key::GUITAR_PROC,
        type_code::Y2_GUITAR_FLOW,
        11,
    );
    push_param(
        &mut buf,
        param_key::FX1_ENABLE,
        WireType::Binary,
        s.units.compressor as u32,
    );
    push_param(
        &mut buf,
        param_key::FX2_ENABLE,
        WireType::Binary,
        s.units.effect as u32,
    );
    push_param(&mut buf, param_key::FX2_MIX, WireType::Int, pct(s.effect.mix));
    push_param(
        &mut buf,
        param_key::FX3_ENABLE,
        WireType::Binary,
        s.units.echo as u32,
    );
    push_param(&mut buf, param_key::FX3_MIX, WireType::Int, pct(s.echo.mix));
    push_param(
        &mut buf,
        param_key::FX4_ENABLE,
        WireType::Binary,
        s.units.reverb as u32,
    );
    push_param(
        &mut buf,
        param_key::FX4_WET_SEND,
        WireType::Int,
        pct(s.reverb.mix),
    );
    push_param(
        &mut buf,
        param_key::GATE_ENABLE,
        WireType::Binary,
        s.units.gate as u32,
    );
    push_param(
        &mut buf,
        param_key::SPK_SIM_TYPE,
        WireType::Enum,
        s.cabinet.id() as u32,
    );
    push_param(&mut buf, param_key::DECAY, WireType::Int, pct(s.gate.decay));
    push_param(
        &mut buf,
        param_key::GATE_THRESHOLD,
        WireType::Int,
        values::threshold_to_wire(s.gate.threshold),
    );

    open_unit(&mut buf, unit_key::COMPRESSOR, type_code::RED_COMP, 2);
    push_param(
        &mut buf,
        param_key::LEVEL,
        WireType::Int,
        pct(s.compressor.level),
    );
    push_param(
        &mut buf,
        param_key::SUSTAIN,
        WireType::Int,
        pct(s.compressor.sustain),
    );
    push_token(&mut buf, Token::UnitClose);

    open_unit(
        &mut buf,
        unit_key::AMP,
        amp_type_code(s.collection, s.amp),
        5,
    );
    push_param(&mut buf, param_key::BASS, WireType::Int, pct(s.control(Control::Bass)));
    push_param(&mut buf, param_key::DRIVE, WireType::Int, pct(s.control(Control::Gain)));
    push_param(&mut buf, param_key::MASTER, WireType::Int, pct(s.control(Control::Master)));
    push_param(&mut buf, param_key::MID, WireType::Int, pct(s.control(Control::Mid)));
    push_param(&mut buf, param_key::TREBLE, WireType::Int, pct(s.control(Control::Treble)));
    push_token(&mut buf, Token::UnitClose);

    let fx = &s.effect;
    match fx.active {
        EffectType::Phaser => {
            open_unit(&mut buf, unit_key::EFFECT, effect_type_code(fx.active), 2);
            push_param(&mut buf, param_key::FEEDBACK, WireType::Int, pct(fx.phaser.feedback));
            push_param(&mut buf, param_key::FREQ, WireType::Int, pct(fx.phaser.speed));
        }
        EffectType::Tremolo => {
            open_unit(&mut buf, unit_key::EFFECT, effect_type_code(fx.active), 2);
            push_param(&mut buf, param_key::DEPTH, WireType::Int, pct(fx.tremolo.depth));
            push_param(&mut buf, param_key::SPEED, WireType::Int, pct(fx.tremolo.speed));
        }
        EffectType::Flanger => {
            open_unit(&mut buf, unit_key::EFFECT, effect_type_code(fx.active), 2);
            push_param(&mut buf, param_key::DEPTH, WireType::Int, pct(fx.flanger.depth));
            push_param(&mut buf, param_key::FREQ, WireType::Int, pct(fx.flanger.speed));
        }
        EffectType::Chorus => {
            open_unit(&mut buf, unit_key::EFFECT, effect_type_code(fx.active), 4);
            push_param(&mut buf, param_key::DEPTH, WireType::Int, pct(fx.chorus.depth));
            push_param(&mut buf, param_key::FEEDBACK, WireType::Int, pct(fx.chorus.feedback));
            push_param(&mut buf, param_key::FREQ, WireType::Int, pct(fx.chorus.speed));
            push_param(&mut buf, param_key::PRE, WireType::Int, pct(fx.chorus.predelay));
        }
    }
    push_token(&mut buf, Token::UnitClose);

    let echo = s.echo.active_params();
    open_unit(&mut buf, unit_key::ECHO, echo_type_code(s.echo.active), 4);
    push_param(&mut buf, param_key::BASS, WireType::Int, pct(echo.bass));
    push_param(&mut buf, param_key::FEEDBACK, WireType::Int, pct(echo.feedback));
    push_param(&mut buf, param_key::TIME, WireType::Int, pct(echo.time));
    push_param(&mut buf, param_key::TREBLE, WireType::Int, pct(echo.treble));
    push_token(&mut buf, Token::UnitClose);

    let rv = &s.reverb;
    match rv.active {
        ReverbType::Spring => {
            open_unit(&mut buf, unit_key::REVERB, reverb_type_code(rv.active), 2);
            push_param(&mut buf, param_key::TIME, WireType::Int, pct(rv.spring.time));
            push_param(&mut buf, param_key::TONE, WireType::Int, pct(rv.spring.tone));
        }
        ReverbType::Room => push_hall_reverb(&mut buf, rv.active, &rv.room),
        ReverbType::Plate => push_hall_reverb(&mut buf, rv.active, &rv.plate),
        ReverbType::Hall => push_hall_reverb(&mut buf, rv.active, &rv.hall),
    }
    push_token(&mut buf, Token::UnitClose);

    push_token(&mut buf, Token::UnitClose);
    push_token(&mut buf, Token::StructClose);
    buf
}

/// The name-only variant: a meta section holding just the patch name.
/// One slice is always enough.
pub fn build_name_buffer(name: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(name.len() + 32);
    push_token(&mut buf, Token::StructOpen);
    push_token(&mut buf, Token::Meta);
    push_token(&mut buf, Token::TokenMeta);
    push_global_header(&mut buf, 0x0000, WireType::Text);
    push_u32(&mut buf, name.len() as u32 + 1);
    buf.extend_from_slice(name.as_bytes());
    buf.push(0);
    push_token(&mut buf, Token::StructClose);
    buf
}

/// Wrap one raw payload into a wire frame. `raw` must not be empty; the
/// length nibbles encode `raw.len() - 1`.
fn framed(preamble: &[u8; 8], counter: u8, index: u8, raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + bucket::encoded_len(raw.len()) + 1);
    out.extend_from_slice(preamble);
    out.push(counter);
    out.push(index);
    out.push(((raw.len() - 1) / 16) as u8);
    out.push(((raw.len() - 1) % 16) as u8);
    out.extend_from_slice(&bucket::encode(raw));
    out.push(SYSEX_STOP);
    out
}

/// A settings-change frame, padded to whole 7-byte groups the way the
/// device's own remote pads them. The length nibbles still describe the
/// unpadded payload.
fn settings_frame(counter: u8, raw: &[u8]) -> Vec<u8> {
    let mut padded = raw.to_vec();
    padded.resize(raw.len().div_ceil(7) * 7, 0);
    let mut frame = framed(&SETTINGS_PREAMBLE, counter, 0x00, &padded);
    frame[10] = ((raw.len() - 1) / 16) as u8;
    frame[11] = ((raw.len() - 1) % 16) as u8;
    frame
}

/// One inbound frame stripped to its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub counter: u8,
    pub index: u8,
    /// Length nibbles as transmitted; `(0x0D, 0x01)` marks a full slice.
    pub len_nibbles: (u8, u8),
    pub raw: Vec<u8>,
}

/// Decode a received frame: strip header and terminator, undo the bit
/// bucketing and cut the payload to the length the nibbles declare
/// (dropping any group padding the sender added).
pub fn decode_frame(frame: &[u8]) -> Result<DecodedFrame, ProtocolError> {
    if frame.len() < FRAME_HEADER_LEN + 1 {
        return Err(ProtocolError::FrameTooShort {
            len: frame.len(),
            min: FRAME_HEADER_LEN + 1,
        });
    }
    let raw_len = frame[10] as usize * 16 + frame[11] as usize + 1;
    let mut raw = bucket::decode(&frame[FRAME_HEADER_LEN..frame.len() - 1]);
    if raw.len() < raw_len {
        return Err(ProtocolError::FrameTooShort {
            len: raw.len(),
            min: raw_len,
        });
    }
    raw.truncate(raw_len);
    Ok(DecodedFrame {
        counter: frame[8],
        index: frame[9],
        len_nibbles: (frame[10], frame[11]),
        raw,
    })
}

/// Split a serialized patch buffer into its transmission frames: one
/// header describing lengths and target slot, then one frame per
/// 210-byte slice. The header awaits both ack and answer; the final
/// slice awaits the write ack; everything between flows freely.
pub fn frame_patch(buffer: &[u8], target: PatchTarget) -> Vec<OutMessage> {
    let netto = buffer.len() as u32 + 12;
    let brutto = buffer.len() as u32 + 20;

    let mut control = Vec::with_capacity(28);
    push_u32(&mut control, WRITE_OPCODE);
    push_u32(&mut control, brutto);
    push_u32(&mut control, target.word());
    push_u32(&mut control, netto);
    push_u32(&mut control, 0);
    push_u32(&mut control, 1);
    push_u32(&mut control, 0);

    let slices: Vec<&[u8]> = buffer.chunks(SLICE_LEN).collect();
    let mut frames = Vec::with_capacity(slices.len() + 1);
    frames.push(OutMessage::new(
        framed(&MEMORY_PREAMBLE, PATCH_FRAME_SEED, 0x00, &control),
        PATCH_HEADER_ID,
        true,
        true,
    ));
    for (i, slice) in slices.iter().enumerate() {
        let last = i == slices.len() - 1;
        frames.push(OutMessage::new(
            framed(
                &MEMORY_PREAMBLE,
                PATCH_FRAME_SEED + 1,
                (i % 128) as u8,
                slice,
            ),
            PATCH_HEADER_ID + 1 + i as u16,
            last,
            false,
        ));
    }
    frames
}

/// Build one settings-change message: a head frame carrying the opcode
/// and body length, then the body frame when a body exists. Delivery
/// flags attach to the message's final frame.
pub fn settings_message(
    framer: &mut Framer,
    op: u32,
    body: &[u8],
    id: u16,
    needs_ack: bool,
    needs_answer: bool,
) -> Vec<OutMessage> {
    let mut head = Vec::with_capacity(8);
    push_u32(&mut head, op);
    push_u32(&mut head, body.len() as u32);

    let head_frame = settings_frame(framer.next_seq(), &head);
    if body.is_empty() {
        return vec![OutMessage::new(head_frame, id, needs_ack, needs_answer)];
    }
    let body_frame = settings_frame(framer.next_seq(), body);
    vec![
        OutMessage::fire_and_forget(head_frame, id),
        OutMessage::new(body_frame, id, needs_ack, needs_answer),
    ]
}

/// Single parameter update, addressed by unit key and device key. The
/// value is already in wire representation.
pub fn param_change(framer: &mut Framer, unit: u16, key: u16, value: u32) -> Vec<OutMessage> {
    let mut body = Vec::with_capacity(12);
    push_u32(&mut body, unit as u32);
    push_u32(&mut body, key as u32);
    push_u32(&mut body, value);
    settings_message(framer, opcode::PARAM_CHANGE, &body, 0, false, false)
}

/// Unit on/off switch or cabinet selection, addressed by command key on
/// the guitar-processing unit.
pub fn unit_command(framer: &mut Framer, unit: u16, key: u16, value: u32) -> Vec<OutMessage> {
    let mut body = Vec::with_capacity(12);
    push_u32(&mut body, unit as u32);
    push_u32(&mut body, key as u32);
    push_u32(&mut body, value);
    settings_message(framer, opcode::UNIT_COMMAND, &body, 0, false, false)
}

/// Switch a unit's active type (amp model, effect, echo or reverb type).
pub fn type_change(framer: &mut Framer, unit: u16, ty: u16) -> Vec<OutMessage> {
    let mut body = Vec::with_capacity(8);
    push_u32(&mut body, unit as u32);
    push_u32(&mut body, ty as u32);
    settings_message(framer, opcode::TYPE_CHANGE, &body, 0, false, false)
}

/// Universal identity request, the opening move of the handshake. The
/// first reply acknowledges it, the version message answers it.
pub fn identity_request(id: u16) -> OutMessage {
    OutMessage::new(IDENTITY_REQUEST.to_vec(), id, true, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tokens::Token;

    #[test]
    fn framer_wraps_inside_seven_bits() {
        let mut f = Framer::new();
        for expect in 0..0x80u16 {
            assert_eq!(f.next_seq(), expect as u8);
        }
        assert_eq!(f.next_seq(), 0, "wraps back to zero after 0x7f");
    }

    #[test]
    fn frame_shape_is_uniform() {
        let frame = framed(&MEMORY_PREAMBLE, 0x06, 0x00, &[0u8; 28]);
        assert_eq!(&frame[..8], &MEMORY_PREAMBLE);
        assert_eq!(frame[8], 0x06);
        assert_eq!(frame[9], 0x00);
        assert_eq!((frame[10], frame[11]), (0x01, 0x0B), "28 bytes as nibbles");
        assert_eq!(*frame.last().unwrap(), SYSEX_STOP);
        assert_eq!(frame.len(), 12 + 32 + 1, "28 raw bytes bucket to 32");
    }

    #[test]
    fn full_slice_marker_is_0d_01() {
        let frame = framed(&MEMORY_PREAMBLE, 0x07, 0x00, &[0u8; SLICE_LEN]);
        assert_eq!((frame[10], frame[11]), (0x0D, 0x01));
    }

    #[test]
    fn patch_frames_cover_the_buffer_exactly() {
        let buffer: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
        let frames = frame_patch(&buffer, PatchTarget::Active);

        // 500 bytes -> two full slices plus one 80-byte rest
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].id, PATCH_HEADER_ID);

        let mut joined = Vec::new();
        for frame in &frames[1..] {
            let payload = &frame.payload[FRAME_HEADER_LEN..frame.payload.len() - 1];
            joined.extend_from_slice(&bucket::decode(payload));
        }
        assert_eq!(joined, buffer);
    }

    #[test]
    fn patch_header_carries_both_length_fields() {
        let buffer = vec![0x42u8; 300];
        let frames = frame_patch(&buffer, PatchTarget::UserSlot(2));
        let header = &frames[0];
        assert!(header.needs_ack && header.needs_answer);

        let control = bucket::decode(&header.payload[FRAME_HEADER_LEN..header.payload.len() - 1]);
        assert_eq!(control.len(), 28);
        let word = |i: usize| {
            u32::from_le_bytes([control[i * 4], control[i * 4 + 1], control[i * 4 + 2], control[i * 4 + 3]])
        };
        assert_eq!(word(0), WRITE_OPCODE);
        assert_eq!(word(1), 320, "brutto = len + 20");
        assert_eq!(word(2), 2, "slot index");
        assert_eq!(word(3), 312, "netto = len + 12");
        assert_eq!((word(4), word(5), word(6)), (0, 1, 0));
    }

    #[test]
    fn slice_counters_follow_the_header_seed() {
        let buffer = vec![0u8; 421]; // 2 full slices + 1 byte
        let frames = frame_patch(&buffer, PatchTarget::Active);
        assert_eq!(frames[0].payload[8], 0x06);
        for (i, frame) in frames[1..].iter().enumerate() {
            assert_eq!(frame.payload[8], 0x07, "slices never advance the counter");
            assert_eq!(frame.payload[9], i as u8);
        }
        let last = frames.last().unwrap();
        assert!(last.needs_ack && !last.needs_answer);
        for frame in &frames[1..frames.len() - 1] {
            assert!(!frame.needs_ack && !frame.needs_answer);
        }
    }

    #[test]
    fn exact_multiple_of_slice_len_marks_final_full_slice() {
        let buffer = vec![0u8; SLICE_LEN * 2];
        let frames = frame_patch(&buffer, PatchTarget::Active);
        assert_eq!(frames.len(), 3);
        assert!(frames[2].needs_ack, "final frame still awaits the write ack");
        assert_eq!((frames[2].payload[10], frames[2].payload[11]), (0x0D, 0x01));
    }

    #[test]
    fn settings_message_splits_head_and_body() {
        let mut framer = Framer::new();
        let msgs = param_change(&mut framer, 0x0104, 0x0052, 0x3F00_0000);
        assert_eq!(msgs.len(), 2);

        let head = decode_frame(&msgs[0].payload).unwrap();
        assert_eq!(&head.raw[..4], &opcode::PARAM_CHANGE.to_le_bytes());
        assert_eq!(&head.raw[4..8], &12u32.to_le_bytes());

        let body = decode_frame(&msgs[1].payload).unwrap().raw;
        assert_eq!(body.len(), 12, "padding is cut away on decode");
        assert_eq!(&body[..4], &0x0104u32.to_le_bytes());
        assert_eq!(&body[4..8], &0x0052u32.to_le_bytes());
        assert_eq!(&body[8..12], &0x3F00_0000u32.to_le_bytes());

        assert_eq!(msgs[0].payload[8], 0, "head uses the first sequence value");
        assert_eq!(msgs[1].payload[8], 1, "body consumes the next");
        assert_eq!(&msgs[0].payload[..8], &SETTINGS_PREAMBLE);
    }

    #[test]
    fn firmware_request_matches_the_captured_message() {
        // as sniffed from the vendor's remote application
        let expected: [u8; 29] = [
            0xF0, 0x00, 0x01, 0x0C, 0x22, 0x02, 0x4D, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0xF7,
        ];
        let mut framer = Framer::new();
        let msgs = settings_message(&mut framer, opcode::FIRMWARE_REQUEST, &[], 2, false, true);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].needs_answer);
        assert_eq!(msgs[0].payload, expected);
    }

    #[test]
    fn decode_frame_recovers_the_declared_length() {
        let raw: Vec<u8> = (0u8..12).collect();
        let frame = settings_frame(0x21, &raw);
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.counter, 0x21);
        assert_eq!(decoded.len_nibbles, (0, 11));
        assert_eq!(decoded.raw, raw);

        assert!(decode_frame(&frame[..8]).is_err(), "header alone is too short");
    }

    #[test]
    fn name_buffer_is_meta_only() {
        let buf = build_name_buffer("Lead");
        assert!(buf.starts_with(Token::StructOpen.bytes()));
        assert!(buf.ends_with(Token::StructClose.bytes()));
        let meta_at = Token::StructOpen.bytes().len();
        assert_eq!(&buf[meta_at..meta_at + 6], Token::Meta.bytes());
        // length prefix counts the terminating nul
        let len_at = meta_at + 6 + 8 + 6;
        assert_eq!(&buf[len_at..len_at + 4], &5u32.to_le_bytes());
        assert_eq!(&buf[len_at + 4..len_at + 9], b"Lead\0");
    }
}
