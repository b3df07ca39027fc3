//! Settings-dump parser.
//!
//! A dump arrives as one reassembled payload: a meta section holding the
//! globals (name, tempo) and a data section holding a nested unit tree
//! with every parameter of the current patch. The walk advances over
//! six-byte groups; marker sextets switch the state, everything else is
//! read according to the state the walk is in. A structural error is
//! terminal for the walk but not for the result: whatever was harvested
//! before the error still applies.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::protocol::tokens::Token;
use crate::protocol::values::{self, param_key, unit_key, WireType};
use crate::protocol::PATCH_NAME_MAX;
use crate::settings::types::{
    Cabinet, CompressorParam, EchoType, EffectType, GateParam, ReverbType,
};
use crate::settings::SettingsAggregate;

/// Walk states. `Error` is terminal; every other state names the kind of
/// six-byte group expected next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParserState {
    #[default]
    Idle,
    Structure,
    Data,
    Meta,
    Global,
    Unit,
    ValuesUnit,
    SubUnit,
    ValuesSubunit,
    Error,
}

/// One harvested parameter: the wire type tag and the raw 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyValue {
    pub type_byte: u8,
    pub raw: u32,
}

/// A unit block from the data section. Top-level blocks may nest one
/// level of subunits; subunits never nest further.
#[derive(Debug, Clone, Default)]
pub struct DumpUnit {
    pub type_code: u16,
    pub declared_param_count: u16,
    pub values: BTreeMap<u16, KeyValue>,
    pub subunits: BTreeMap<u16, DumpUnit>,
}

/// A global from the meta section: the patch name or a numeric word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalValue {
    Text(String),
    Number(u32),
}

/// Everything one walk collected, plus the state it ended in. Anything
/// other than [`ParserState::Error`] means the buffer was structurally
/// sound end to end.
#[derive(Debug, Default)]
pub struct ParsedDump {
    pub globals: BTreeMap<u16, GlobalValue>,
    pub units: BTreeMap<u16, DumpUnit>,
    pub state: ParserState,
}

impl ParsedDump {
    pub fn is_complete(&self) -> bool {
        self.state != ParserState::Error
    }
}

struct Parser<'a> {
    buf: &'a [u8],
    pt: usize,
    state: ParserState,
    globals: BTreeMap<u16, GlobalValue>,
    units: BTreeMap<u16, DumpUnit>,
    current_unit: u16,
    current_subunit: u16,
}

/// Walk a reassembled dump payload. The walk never reads past the end of
/// `buf`; a malformed group parks the state in [`ParserState::Error`] and
/// whatever was collected up to that point is returned as-is.
pub fn parse_dump(buf: &[u8]) -> ParsedDump {
    let mut parser = Parser {
        buf,
        pt: 0,
        state: ParserState::Idle,
        globals: BTreeMap::new(),
        units: BTreeMap::new(),
        current_unit: 0,
        current_subunit: 0,
    };
    while parser.pt + 6 <= buf.len() && parser.state != ParserState::Error {
        parser.step();
    }
    if parser.state == ParserState::Error {
        warn!(at = parser.pt, "dump walk stopped on a structural error");
    }
    ParsedDump {
        globals: parser.globals,
        units: parser.units,
        state: parser.state,
    }
}

impl<'a> Parser<'a> {
    /// Handle the six-byte group at the cursor. Handlers may consume
    /// extra bytes; the group itself is consumed here.
    fn step(&mut self) {
        let buf = self.buf;
        let sextet = &buf[self.pt..self.pt + 6];
        self.state = match self.state {
            ParserState::Idle => {
                if Token::StructOpen.matches(sextet) {
                    ParserState::Structure
                } else {
                    ParserState::Idle
                }
            }
            ParserState::Structure => self.enter_section(sextet),
            ParserState::Data => self.dispatch_data(sextet),
            // The meta token pair switches straight to Global, so this
            // arm only fires on a meta section missing its name tag.
            ParserState::Meta => {
                if Token::StructClose.matches(sextet) {
                    ParserState::Idle
                } else {
                    ParserState::Global
                }
            }
            ParserState::Global => self.read_global(sextet),
            ParserState::Unit => self.dispatch_unit(sextet),
            ParserState::ValuesUnit => self.read_unit_value(sextet),
            ParserState::SubUnit => self.dispatch_subunit(sextet),
            ParserState::ValuesSubunit => self.read_subunit_value(sextet),
            ParserState::Error => ParserState::Error,
        };
        self.pt += 6;
    }

    /// A section opener is a sextet plus an eight-byte name tag: "TRTG"
    /// introduces the unit data, "PSRP" the globals.
    fn enter_section(&mut self, sextet: &[u8]) -> ParserState {
        if self.pt + 14 > self.buf.len() {
            warn!("dump ends inside a section opener");
            return ParserState::Error;
        }
        let tag = &self.buf[self.pt + 6..self.pt + 14];
        if Token::Data.matches(sextet) && Token::TokenData.matches(tag) {
            self.pt += 8;
            return ParserState::Data;
        }
        if Token::Meta.matches(sextet) && Token::TokenMeta.matches(tag) {
            self.pt += 8;
            return ParserState::Global;
        }
        ParserState::Structure
    }

    fn dispatch_data(&mut self, sextet: &[u8]) -> ParserState {
        if Token::UnitOpen.matches(sextet) {
            ParserState::Unit
        } else if Token::StructClose.matches(sextet) {
            ParserState::Idle
        } else {
            ParserState::Data
        }
    }

    /// Globals are `number, pad, type tag` sextets followed by the value:
    /// four raw bytes for numbers, a length word plus NUL-terminated text
    /// for strings.
    fn read_global(&mut self, sextet: &[u8]) -> ParserState {
        if Token::StructClose.matches(sextet) {
            return ParserState::Idle;
        }
        if self.pt + 10 > self.buf.len() {
            warn!("dump ends inside a global value");
            return ParserState::Error;
        }
        let number = u16::from_le_bytes([sextet[0], sextet[1]]);
        let buf = self.buf;
        match WireType::from_byte(sextet[4]) {
            Some(WireType::Text) => {
                let len = buf[self.pt + 6] as usize;
                let text_len = len.saturating_sub(1);
                if self.pt + 10 + text_len > buf.len() {
                    warn!(number, "dump ends inside a global string");
                    return ParserState::Error;
                }
                let mut text = String::from_utf8_lossy(
                    &buf[self.pt + 10..self.pt + 10 + text_len],
                )
                .into_owned();
                if text.len() > PATCH_NAME_MAX {
                    let mut end = PATCH_NAME_MAX;
                    while !text.is_char_boundary(end) {
                        end -= 1;
                    }
                    text.truncate(end);
                }
                self.globals.insert(number, GlobalValue::Text(text));
                self.pt += len + 4;
            }
            Some(WireType::Enum) | Some(WireType::Int) => {
                let raw = u32::from_le_bytes([
                    buf[self.pt + 6],
                    buf[self.pt + 7],
                    buf[self.pt + 8],
                    buf[self.pt + 9],
                ]);
                self.globals.insert(number, GlobalValue::Number(raw));
                self.pt += 4;
            }
            _ => {
                debug!(number, tag = sextet[4], "global with unknown type tag skipped");
                self.pt += 4;
            }
        }
        ParserState::Global
    }

    fn dispatch_unit(&mut self, sextet: &[u8]) -> ParserState {
        if Token::UnitOpen.matches(sextet) {
            return ParserState::SubUnit;
        }
        if Token::UnitClose.matches(sextet) {
            return ParserState::Data;
        }
        if Token::UnitType.matches(&sextet[2..]) {
            let key = u16::from_le_bytes([sextet[0], sextet[1]]);
            return self.open_unit_block(key, false);
        }
        warn!(at = self.pt, "unexpected group in unit position");
        ParserState::Error
    }

    fn dispatch_subunit(&mut self, sextet: &[u8]) -> ParserState {
        if Token::UnitOpen.matches(sextet) {
            warn!(at = self.pt, "units nest only one level deep");
            return ParserState::Error;
        }
        if Token::UnitClose.matches(sextet) {
            return ParserState::Unit;
        }
        if Token::UnitType.matches(&sextet[2..]) {
            let key = u16::from_le_bytes([sextet[0], sextet[1]]);
            return self.open_unit_block(key, true);
        }
        warn!(at = self.pt, "unexpected group in subunit position");
        ParserState::Error
    }

    /// The rest of a unit header after its key sextet: pseudo value, type
    /// code, count tag and declared parameter count, 24 bytes in total
    /// from the key sextet's start.
    fn open_unit_block(&mut self, key: u16, nested: bool) -> ParserState {
        if self.pt + 22 > self.buf.len() {
            warn!(unit = key, "dump ends inside a unit header");
            return ParserState::Error;
        }
        let buf = self.buf;
        self.pt += 10;
        let type_code = u16::from_le_bytes([buf[self.pt], buf[self.pt + 1]]);
        let declared = u16::from_le_bytes([buf[self.pt + 10], buf[self.pt + 11]]);
        self.pt += 8;

        let block = DumpUnit {
            type_code,
            declared_param_count: declared,
            values: BTreeMap::new(),
            subunits: BTreeMap::new(),
        };
        if nested {
            self.units
                .entry(self.current_unit)
                .or_default()
                .subunits
                .insert(key, block);
            self.current_subunit = key;
            ParserState::ValuesSubunit
        } else {
            self.units.insert(key, block);
            self.current_unit = key;
            ParserState::ValuesUnit
        }
    }

    fn read_unit_value(&mut self, sextet: &[u8]) -> ParserState {
        if Token::UnitOpen.matches(sextet) {
            ParserState::SubUnit
        } else if Token::UnitClose.matches(sextet) {
            ParserState::Data
        } else {
            self.read_value(sextet, false)
        }
    }

    fn read_subunit_value(&mut self, sextet: &[u8]) -> ParserState {
        if Token::UnitOpen.matches(sextet) {
            warn!(at = self.pt, "units nest only one level deep");
            ParserState::Error
        } else if Token::UnitClose.matches(sextet) {
            ParserState::Unit
        } else {
            self.read_value(sextet, true)
        }
    }

    /// A parameter triple: key and type-word sextet, then four raw value
    /// bytes. The walk stays in the surrounding values state.
    fn read_value(&mut self, sextet: &[u8], nested: bool) -> ParserState {
        if self.pt + 10 > self.buf.len() {
            warn!("dump ends inside a parameter value");
            return ParserState::Error;
        }
        let key = u16::from_le_bytes([sextet[0], sextet[1]]);
        let buf = self.buf;
        let value = KeyValue {
            type_byte: sextet[4],
            raw: u32::from_le_bytes([
                buf[self.pt + 6],
                buf[self.pt + 7],
                buf[self.pt + 8],
                buf[self.pt + 9],
            ]),
        };
        let unit = self.units.entry(self.current_unit).or_default();
        let slot = if nested {
            unit.subunits.entry(self.current_subunit).or_default()
        } else {
            unit
        };
        slot.values.insert(key, value);
        self.pt += 4;
        if nested {
            ParserState::ValuesSubunit
        } else {
            ParserState::ValuesUnit
        }
    }
}

/// Map a parsed dump into the aggregate. Sending is suppressed for the
/// duration so the device's own state is not echoed back at it; the
/// mirror counts as synced afterwards.
pub fn apply_dump(dump: &ParsedDump, settings: &mut SettingsAggregate) {
    let live = settings.send_changes();
    settings.set_send_changes(false);

    for (&number, value) in &dump.globals {
        match (number, value) {
            (0x0000, GlobalValue::Text(name)) => settings.set_patch_name(name, 0),
            (0x0001, GlobalValue::Number(v)) => settings.tnid = *v,
            (0x0002, GlobalValue::Number(v)) => settings.unknown_global = *v,
            (0x0003, GlobalValue::Number(v)) => settings.tempo = *v,
            _ => debug!(number, "global without a mapping skipped"),
        }
    }

    if let Some(proc_block) = dump.units.get(&unit_key::GUITAR_PROC) {
        for (&key, sub) in &proc_block.subunits {
            match key {
                unit_key::COMPRESSOR => apply_compressor(sub, settings),
                unit_key::AMP => apply_amp(sub, settings),
                unit_key::EFFECT => apply_effect(sub, settings),
                unit_key::ECHO => apply_echo(sub, settings),
                unit_key::REVERB => apply_reverb(sub, settings),
                other => debug!(key = other, "subunit without a mapping skipped"),
            }
        }
        apply_unit_values(proc_block, settings);
    }

    settings.set_send_changes(live);
    settings.mark_synced();
}

fn apply_compressor(sub: &DumpUnit, settings: &mut SettingsAggregate) {
    for (&key, value) in &sub.values {
        match values::compressor_param_from_key(key) {
            Some(param) => {
                settings.set_compressor_param(param, values::wire_to_percent(value.raw))
            }
            None => debug!(key, "compressor key without a mapping skipped"),
        }
    }
}

fn apply_amp(sub: &DumpUnit, settings: &mut SettingsAggregate) {
    match values::amp_from_type_code(sub.type_code) {
        Some((collection, model)) => settings.set_collection_amp(collection, model),
        None => warn!(
            code = sub.type_code,
            "amp type code not recognized, keeping the current amp"
        ),
    }
    for (&key, value) in &sub.values {
        match values::control_from_key(key) {
            Some(control) => settings.set_control(control, values::wire_to_percent(value.raw)),
            None => debug!(key, "amp key without a mapping skipped"),
        }
    }
}

fn apply_effect(sub: &DumpUnit, settings: &mut SettingsAggregate) {
    let ty = values::effect_type_from_code(sub.type_code).unwrap_or_else(|| {
        warn!(code = sub.type_code, "effect type code not recognized, assuming phaser");
        EffectType::Phaser
    });
    settings.set_effect_type(ty);
    for (&key, value) in &sub.values {
        match values::effect_param_from_key(key) {
            Some(param) => {
                settings.set_effect_param(ty, param, values::wire_to_percent(value.raw))
            }
            None => debug!(key, "effect key without a mapping skipped"),
        }
    }
}

fn apply_echo(sub: &DumpUnit, settings: &mut SettingsAggregate) {
    let ty = values::echo_type_from_code(sub.type_code).unwrap_or_else(|| {
        warn!(code = sub.type_code, "echo type code not recognized, assuming tape echo");
        EchoType::TapeEcho
    });
    settings.set_echo_type(ty);
    for (&key, value) in &sub.values {
        match values::echo_param_from_key(key) {
            Some(param) => settings.set_echo_param(ty, param, values::wire_to_percent(value.raw)),
            None => debug!(key, "echo key without a mapping skipped"),
        }
    }
}

fn apply_reverb(sub: &DumpUnit, settings: &mut SettingsAggregate) {
    let ty = values::reverb_type_from_code(sub.type_code).unwrap_or_else(|| {
        warn!(code = sub.type_code, "reverb type code not recognized, assuming spring");
        ReverbType::Spring
    });
    settings.set_reverb_type(ty);
    for (&key, value) in &sub.values {
        match values::reverb_param_from_key(key) {
            Some(param) => {
                settings.set_reverb_param(ty, param, values::wire_to_percent(value.raw))
            }
            None => debug!(key, "reverb key without a mapping skipped"),
        }
    }
}

/// Enable flags, mix levels, cabinet and gate ride directly on the
/// guitar-processing unit rather than in a subunit.
fn apply_unit_values(block: &DumpUnit, settings: &mut SettingsAggregate) {
    for (&key, value) in &block.values {
        if !apply_proc_value(settings, key, value.raw) {
            debug!(key, "processing-unit key without a mapping skipped");
        }
    }
}

fn apply_proc_value(settings: &mut SettingsAggregate, key: u16, raw: u32) -> bool {
    if let Some(unit) = values::unit_from_enable_key(key) {
        settings.switch_unit(unit, raw != 0);
        return true;
    }
    match key {
        param_key::DECAY => {
            settings.set_gate_param(GateParam::Decay, values::wire_to_percent(raw))
        }
        param_key::COMP_MIX => {
            settings.set_compressor_param(CompressorParam::Mix, values::wire_to_percent(raw))
        }
        param_key::FX2_MIX => settings.set_effect_mix(values::wire_to_percent(raw)),
        param_key::FX3_MIX => settings.set_echo_mix(values::wire_to_percent(raw)),
        param_key::AMP_ENABLE => trace!(on = raw != 0, "amp enable flag reported"),
        param_key::SPK_SIM_TYPE => match u8::try_from(raw).ok().and_then(Cabinet::new) {
            Some(cabinet) => settings.set_cabinet(cabinet),
            None => warn!(id = raw, "cabinet id out of range, keeping the current cabinet"),
        },
        param_key::GATE_THRESHOLD => {
            settings.set_gate_param(GateParam::Threshold, values::wire_to_threshold(raw))
        }
        param_key::FX4_WET_SEND => settings.set_reverb_mix(values::wire_to_percent(raw)),
        _ => return false,
    }
    true
}

/// Apply one reported `(unit key, parameter key, raw value)` triple from
/// outside a dump, as pushed by the device when a knob moves on the amp
/// itself. Per-family keys resolve against the currently active type.
/// Sending is suppressed for the apply; returns false when no mapping
/// exists.
pub fn apply_parameter(settings: &mut SettingsAggregate, unit: u16, key: u16, raw: u32) -> bool {
    let live = settings.send_changes();
    settings.set_send_changes(false);
    let applied = match unit {
        unit_key::GUITAR_PROC => apply_proc_value(settings, key, raw),
        unit_key::COMPRESSOR => match values::compressor_param_from_key(key) {
            Some(param) => {
                settings.set_compressor_param(param, values::wire_to_percent(raw));
                true
            }
            None => false,
        },
        unit_key::AMP => match values::control_from_key(key) {
            Some(control) => {
                settings.set_control(control, values::wire_to_percent(raw));
                true
            }
            None => false,
        },
        unit_key::EFFECT => match values::effect_param_from_key(key) {
            Some(param) => {
                let ty = settings.effect.active;
                settings.set_effect_param(ty, param, values::wire_to_percent(raw));
                true
            }
            None => false,
        },
        unit_key::ECHO => match values::echo_param_from_key(key) {
            Some(param) => {
                let ty = settings.echo.active;
                settings.set_echo_param(ty, param, values::wire_to_percent(raw));
                true
            }
            None => false,
        },
        unit_key::REVERB => match values::reverb_param_from_key(key) {
            Some(param) => {
                let ty = settings.reverb.active;
                settings.set_reverb_param(ty, param, values::wire_to_percent(raw));
                true
            }
            None => false,
        },
        _ => false,
    };
    settings.set_send_changes(live);
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::serialize;
    use crate::protocol::values::type_code;
    use crate::settings::types::{
        AmpModel, Collection, Control, EchoParam, EffectParam, ReverbParam, Unit, UnitStates,
    };

    fn open_data_section(buf: &mut Vec<u8>) {
        buf.extend_from_slice(Token::StructOpen.bytes());
        buf.extend_from_slice(Token::Data.bytes());
        buf.extend_from_slice(Token::TokenData.bytes());
    }

    fn unit_header(buf: &mut Vec<u8>, key: u16, ty: u16, count: u32) {
        buf.extend_from_slice(Token::UnitOpen.bytes());
        buf.extend_from_slice(&key.to_le_bytes());
        buf.extend_from_slice(Token::UnitType.bytes());
        buf.extend_from_slice(Token::PseudoVal.bytes());
        buf.extend_from_slice(&ty.to_le_bytes());
        buf.extend_from_slice(Token::ParCount.bytes());
        buf.extend_from_slice(Token::PseudoType.bytes());
        buf.extend_from_slice(&count.to_le_bytes());
    }

    fn value_triple(buf: &mut Vec<u8>, key: u16, ty: WireType, raw: u32) {
        buf.extend_from_slice(&key.to_le_bytes());
        buf.extend_from_slice(&ty.word().to_le_bytes());
        buf.extend_from_slice(&raw.to_le_bytes());
    }

    #[test]
    fn serialized_patches_parse_back_into_the_same_mirror() {
        let mut original = SettingsAggregate::new();
        original.set_collection_amp(Collection::Modern, AmpModel::HiGain);
        original.set_control(Control::Gain, 73.0);
        original.set_control(Control::Master, 41.5);
        original.set_control(Control::Bass, 12.0);
        original.set_control(Control::Mid, 88.25);
        original.set_control(Control::Treble, 60.0);
        original.set_effect_type(EffectType::Flanger);
        original.set_effect_param(EffectType::Flanger, EffectParam::Depth, 35.0);
        original.set_effect_param(EffectType::Flanger, EffectParam::Speed, 18.0);
        original.set_effect_mix(22.0);
        original.set_echo_type(EchoType::DigitalDelay);
        original.set_echo_param(EchoType::DigitalDelay, EchoParam::Time, 44.0);
        original.set_echo_param(EchoType::DigitalDelay, EchoParam::Feedback, 31.0);
        original.set_echo_param(EchoType::DigitalDelay, EchoParam::Bass, 52.0);
        original.set_echo_param(EchoType::DigitalDelay, EchoParam::Treble, 47.0);
        original.set_echo_mix(28.0);
        original.set_reverb_type(ReverbType::Plate);
        original.set_reverb_param(ReverbType::Plate, ReverbParam::Decay, 18.0);
        original.set_reverb_param(ReverbType::Plate, ReverbParam::Predelay, 9.0);
        original.set_reverb_param(ReverbType::Plate, ReverbParam::Tone, 66.0);
        original.set_reverb_mix(31.0);
        original.set_compressor_param(CompressorParam::Sustain, 58.0);
        original.set_compressor_param(CompressorParam::Level, 64.0);
        original.set_gate_param(GateParam::Threshold, 25.0);
        original.set_gate_param(GateParam::Decay, 35.0);
        original.switch_unit(Unit::Compressor, true);
        original.switch_unit(Unit::Effect, true);
        original.switch_unit(Unit::Echo, false);
        original.switch_unit(Unit::Reverb, true);
        original.switch_unit(Unit::Gate, true);
        original.set_cabinet(Cabinet::new(7).unwrap());
        original.set_patch_name("Round Trip", 0);
        original.tnid = 77;
        original.tempo = 128;

        let dump = parse_dump(&serialize::build_patch_buffer(&original));
        assert_eq!(dump.state, ParserState::Idle);

        let mut rebuilt = SettingsAggregate::new();
        rebuilt.set_send_changes(true);
        apply_dump(&dump, &mut rebuilt);
        assert!(rebuilt.send_changes(), "live flag must survive the apply");
        assert!(
            rebuilt.take_outbox().is_empty(),
            "applying a dump must not echo messages back"
        );
        assert!(!rebuilt.is_dirty());

        assert_eq!(rebuilt.collection, Collection::Modern);
        assert_eq!(rebuilt.amp, AmpModel::HiGain);
        for control in Control::ALL {
            assert!(
                (rebuilt.control(control) - original.control(control)).abs() < 1e-4,
                "{control:?} drifted",
            );
        }
        assert_eq!(rebuilt.effect.active, EffectType::Flanger);
        assert!((rebuilt.effect.flanger.depth - 35.0).abs() < 1e-4);
        assert!((rebuilt.effect.flanger.speed - 18.0).abs() < 1e-4);
        assert!((rebuilt.effect.mix - 22.0).abs() < 1e-4);
        assert_eq!(rebuilt.echo.active, EchoType::DigitalDelay);
        assert!((rebuilt.echo.digital.time - 44.0).abs() < 1e-4);
        assert!((rebuilt.echo.digital.feedback - 31.0).abs() < 1e-4);
        assert!((rebuilt.echo.digital.bass - 52.0).abs() < 1e-4);
        assert!((rebuilt.echo.digital.treble - 47.0).abs() < 1e-4);
        assert!((rebuilt.echo.mix - 28.0).abs() < 1e-4);
        assert_eq!(rebuilt.reverb.active, ReverbType::Plate);
        assert!((rebuilt.reverb.plate.decay - 18.0).abs() < 1e-4);
        assert!((rebuilt.reverb.plate.predelay - 9.0).abs() < 1e-4);
        assert!((rebuilt.reverb.plate.tone - 66.0).abs() < 1e-4);
        assert!((rebuilt.reverb.mix - 31.0).abs() < 1e-4);
        assert!((rebuilt.compressor.sustain - 58.0).abs() < 1e-4);
        assert!((rebuilt.compressor.level - 64.0).abs() < 1e-4);
        assert!((rebuilt.gate.threshold - 25.0).abs() < 1e-4);
        assert!((rebuilt.gate.decay - 35.0).abs() < 1e-4);
        assert_eq!(rebuilt.units, original.units);
        assert_eq!(rebuilt.cabinet.id(), 7);
        assert_eq!(rebuilt.active_name(), "Round Trip");
        assert_eq!(rebuilt.tnid, 77);
        assert_eq!(rebuilt.tempo, 128);
    }

    #[test]
    fn truncated_dumps_never_read_past_the_cut() {
        let mut settings = SettingsAggregate::new();
        settings.set_patch_name("Cut Short", 0);
        let buffer = serialize::build_patch_buffer(&settings);
        for cut in 0..buffer.len() {
            let _ = parse_dump(&buffer[..cut]);
        }
    }

    #[test]
    fn a_cut_inside_a_unit_header_keeps_the_globals() {
        let mut settings = SettingsAggregate::new();
        settings.set_patch_name("Cut Short", 0);
        let buffer = serialize::build_patch_buffer(&settings);
        let pos = buffer
            .windows(6)
            .position(|w| Token::UnitOpen.matches(w))
            .unwrap();

        // The key sextet survives the cut but the header behind it does
        // not, which parks the walk in the error state.
        let dump = parse_dump(&buffer[..pos + 16]);
        assert_eq!(dump.state, ParserState::Error);
        assert!(!dump.is_complete());
        assert_eq!(
            dump.globals.get(&0x0000),
            Some(&GlobalValue::Text("Cut Short".to_string()))
        );

        let mut rebuilt = SettingsAggregate::new();
        apply_dump(&dump, &mut rebuilt);
        assert_eq!(rebuilt.active_name(), "Cut Short");
    }

    #[test]
    fn a_second_nesting_level_stops_the_walk() {
        let mut buf = Vec::new();
        open_data_section(&mut buf);
        unit_header(&mut buf, unit_key::GUITAR_PROC, type_code::Y2_GUITAR_FLOW, 0);
        unit_header(&mut buf, unit_key::REVERB, type_code::SPRING, 0);
        buf.extend_from_slice(Token::UnitOpen.bytes());

        let dump = parse_dump(&buf);
        assert_eq!(dump.state, ParserState::Error);
        // Both legal levels were recorded before the walk stopped.
        let proc_block = &dump.units[&unit_key::GUITAR_PROC];
        assert!(proc_block.subunits.contains_key(&unit_key::REVERB));
    }

    #[test]
    fn unknown_type_codes_fall_back_to_the_family_defaults() {
        let mut buf = Vec::new();
        open_data_section(&mut buf);
        unit_header(&mut buf, unit_key::GUITAR_PROC, type_code::Y2_GUITAR_FLOW, 0);
        unit_header(&mut buf, unit_key::EFFECT, 0x7777, 0);
        buf.extend_from_slice(Token::UnitClose.bytes());
        unit_header(&mut buf, unit_key::ECHO, 0x7777, 0);
        buf.extend_from_slice(Token::UnitClose.bytes());
        unit_header(&mut buf, unit_key::REVERB, 0x7777, 0);
        buf.extend_from_slice(Token::UnitClose.bytes());
        unit_header(&mut buf, unit_key::AMP, 0x7777, 0);
        buf.extend_from_slice(Token::UnitClose.bytes());
        buf.extend_from_slice(Token::UnitClose.bytes());
        buf.extend_from_slice(Token::StructClose.bytes());

        let dump = parse_dump(&buf);
        assert_eq!(dump.state, ParserState::Idle);

        let mut settings = SettingsAggregate::new();
        settings.set_effect_type(EffectType::Tremolo);
        settings.set_echo_type(EchoType::DigitalDelay);
        settings.set_reverb_type(ReverbType::Hall);
        settings.set_collection_amp(Collection::Boutique, AmpModel::Crunch);
        apply_dump(&dump, &mut settings);

        assert_eq!(settings.effect.active, EffectType::Phaser);
        assert_eq!(settings.echo.active, EchoType::TapeEcho);
        assert_eq!(settings.reverb.active, ReverbType::Spring);
        // An unknown amp code keeps whatever amp was selected.
        assert_eq!(settings.collection, Collection::Boutique);
        assert_eq!(settings.amp, AmpModel::Crunch);
    }

    #[test]
    fn unknown_keys_are_kept_in_the_tree_but_not_applied() {
        let mut buf = Vec::new();
        open_data_section(&mut buf);
        unit_header(&mut buf, unit_key::GUITAR_PROC, type_code::Y2_GUITAR_FLOW, 1);
        value_triple(&mut buf, 0x7777, WireType::Int, values::percent_to_wire(50.0));
        buf.extend_from_slice(Token::UnitClose.bytes());
        buf.extend_from_slice(Token::StructClose.bytes());

        let dump = parse_dump(&buf);
        assert_eq!(dump.state, ParserState::Idle);
        let proc_block = &dump.units[&unit_key::GUITAR_PROC];
        assert_eq!(proc_block.declared_param_count, 1);
        assert_eq!(
            proc_block.values[&0x7777].raw,
            values::percent_to_wire(50.0)
        );

        let mut settings = SettingsAggregate::new();
        apply_dump(&dump, &mut settings);
        assert_eq!(settings.units, UnitStates::default());
        assert_eq!(settings.cabinet.id(), 0);
    }

    #[test]
    fn reported_triples_update_the_active_family() {
        let mut settings = SettingsAggregate::new();
        settings.set_send_changes(true);
        settings.set_effect_type(EffectType::Chorus);
        settings.take_outbox();

        assert!(apply_parameter(
            &mut settings,
            unit_key::AMP,
            param_key::BASS,
            values::percent_to_wire(72.0)
        ));
        assert!((settings.control(Control::Bass) - 72.0).abs() < 1e-4);

        assert!(apply_parameter(
            &mut settings,
            unit_key::EFFECT,
            param_key::DEPTH,
            values::percent_to_wire(33.0)
        ));
        assert!((settings.effect.chorus.depth - 33.0).abs() < 1e-4);

        assert!(apply_parameter(
            &mut settings,
            unit_key::GUITAR_PROC,
            param_key::GATE_THRESHOLD,
            values::threshold_to_wire(40.0)
        ));
        assert!((settings.gate.threshold - 40.0).abs() < 1e-3);

        assert!(!apply_parameter(&mut settings, 0x7777, param_key::BASS, 0));
        assert!(!apply_parameter(&mut settings, unit_key::AMP, 0x7777, 0));

        assert!(settings.send_changes(), "live flag must be restored");
        assert!(
            settings.take_outbox().is_empty(),
            "mirroring a report must not echo messages back"
        );
    }

    #[test]
    fn over_long_names_are_cut_at_the_wire_limit() {
        let long = "n".repeat(PATCH_NAME_MAX + 16);
        let dump = parse_dump(&serialize::build_name_buffer(&long));
        match dump.globals.get(&0x0000) {
            Some(GlobalValue::Text(name)) => assert_eq!(name.len(), PATCH_NAME_MAX),
            other => panic!("name global missing: {other:?}"),
        }
    }

    #[test]
    fn junk_outside_sections_is_skipped() {
        assert_eq!(parse_dump(&[]).state, ParserState::Idle);

        let noise = parse_dump(&[0xFF; 30]);
        assert_eq!(noise.state, ParserState::Idle);
        assert!(noise.globals.is_empty());
        assert!(noise.units.is_empty());

        // Leading junk does not derail a later section as long as the
        // groups stay aligned.
        let mut buf = vec![0xFF; 12];
        buf.extend_from_slice(&serialize::build_name_buffer("After Junk"));
        let dump = parse_dump(&buf);
        assert_eq!(
            dump.globals.get(&0x0000),
            Some(&GlobalValue::Text("After Junk".to_string()))
        );
    }
}
