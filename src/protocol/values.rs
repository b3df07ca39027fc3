//! Device keys, unit type codes and value scaling.
//!
//! The tables are the single source of truth for both directions: the
//! serializer resolves semantic fields to device keys through them, the
//! dump mapper resolves device keys back to semantic fields.
//!
//! Continuous parameters travel as IEEE-754 single bits of `value / 100`;
//! the gate threshold travels as the dB value itself (-96..0 mapped from
//! the 0-100 scale).

use crate::settings::types::{
    AmpModel, Collection, CompressorParam, Control, EchoParam, EchoType, EffectParam, EffectType,
    GateParam, ReverbParam, ReverbType, Unit,
};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Value encodings used inside unit parameter triples and globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Binary,
    Enum,
    Int,
    Text,
}

impl WireType {
    /// The 32-bit type word written ahead of a unit parameter value.
    pub const fn word(self) -> u32 {
        (self.type_byte() as u32) << 16
    }

    /// The single type byte used in global sextets.
    pub const fn type_byte(self) -> u8 {
        match self {
            WireType::Binary => 0x01,
            WireType::Enum => 0x02,
            WireType::Int => 0x03,
            WireType::Text => 0x04,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(WireType::Binary),
            0x02 => Some(WireType::Enum),
            0x03 => Some(WireType::Int),
            0x04 => Some(WireType::Text),
            _ => None,
        }
    }
}

/// Unit keys: the 16-bit addresses of the unit blocks in a patch.
pub mod unit_key {
    /// Top-level guitar processing unit, hosts everything else.
    pub const GUITAR_PROC: u16 = 0x0104;
    pub const COMPRESSOR: u16 = 0x0107;
    pub const AMP: u16 = 0x010A;
    pub const EFFECT: u16 = 0x010E;
    pub const ECHO: u16 = 0x010F;
    pub const REVERB: u16 = 0x0112;
}

/// Device parameter keys. Subunits reuse keys freely (the amp's bass and
/// a tape echo's bass share 0x004F); scope is the surrounding unit.
pub mod param_key {
    pub const BASS: u16 = 0x004F;
    pub const MID: u16 = 0x0050;
    pub const TREBLE: u16 = 0x0051;
    pub const DRIVE: u16 = 0x0052;
    pub const MASTER: u16 = 0x0053;

    pub const SUSTAIN: u16 = 0x00BE;
    pub const LEVEL: u16 = 0x00BF;

    pub const DEPTH: u16 = 0x00C0;
    pub const SPEED: u16 = 0x00C1;
    pub const FREQ: u16 = 0x00C2;
    pub const FEEDBACK: u16 = 0x00C3;
    pub const PRE: u16 = 0x00C4;
    pub const TIME: u16 = 0x00C5;
    pub const TONE: u16 = 0x00C6;
    pub const PRE_DELAY: u16 = 0x00C7;

    /// Gate decay on the top unit, reverb decay in the reverb subunit.
    pub const DECAY: u16 = 0x00F8;

    pub const FX1_ENABLE: u16 = 0x0116;
    pub const COMP_MIX: u16 = 0x0117;
    pub const FX2_MIX: u16 = 0x0118;
    pub const FX2_ENABLE: u16 = 0x0119;
    pub const FX3_MIX: u16 = 0x011B;
    pub const FX3_ENABLE: u16 = 0x011C;
    pub const FX4_ENABLE: u16 = 0x011F;
    pub const AMP_ENABLE: u16 = 0x0120;
    pub const GATE_ENABLE: u16 = 0x0121;
    pub const SPK_SIM_TYPE: u16 = 0x0124;
    pub const GATE_THRESHOLD: u16 = 0x0125;
    pub const FX4_WET_SEND: u16 = 0x0126;
}

/// Unit type codes selecting the active processing flavor.
pub mod type_code {
    pub const Y2_GUITAR_FLOW: u16 = 0x0190;
    pub const RED_COMP: u16 = 0x00B0;

    pub const CHORUS: u16 = 0x00D0;
    pub const FLANGER: u16 = 0x00D1;
    pub const PHASER: u16 = 0x00D2;
    pub const TREMOLO: u16 = 0x00D3;

    pub const TAPE_ECHO: u16 = 0x00E0;
    pub const DIGITAL_DELAY: u16 = 0x00E1;

    pub const SPRING: u16 = 0x00F1;
    pub const ROOM: u16 = 0x00F2;
    pub const PLATE: u16 = 0x00F3;
    pub const HALL: u16 = 0x00F4;

    /// Amp models: one code per collection/model pair.
    pub const AMP_BASE: u16 = 0x0080;
}

/// A semantic parameter's wire identity and legal range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    pub key: u16,
    pub wire_type: WireType,
    pub range: (f64, f64),
}

const PERCENT: (f64, f64) = (0.0, 100.0);

const fn percent(key: u16) -> ParamDescriptor {
    ParamDescriptor {
        key,
        wire_type: WireType::Int,
        range: PERCENT,
    }
}

/// Whether `v` is inside `range`. NaN is never in range.
pub fn in_range(v: f64, range: (f64, f64)) -> bool {
    v >= range.0 && v <= range.1
}

/// Scale a 0-100 value to its wire representation.
pub fn percent_to_wire(v: f64) -> u32 {
    ((v / 100.0) as f32).to_bits()
}

/// Inverse of [`percent_to_wire`].
pub fn wire_to_percent(raw: u32) -> f64 {
    f32::from_bits(raw) as f64 * 100.0
}

/// Scale a 0-100 gate threshold to the wire's dB domain (-96..0).
pub fn threshold_to_wire(v: f64) -> u32 {
    ((v * 96.0 / 100.0 - 96.0) as f32).to_bits()
}

/// Inverse of [`threshold_to_wire`].
pub fn wire_to_threshold(raw: u32) -> f64 {
    100.0 + f32::from_bits(raw) as f64 * 100.0 / 96.0
}

pub fn control_descriptor(control: Control) -> ParamDescriptor {
    let key = match control {
        Control::Gain => param_key::DRIVE,
        Control::Master => param_key::MASTER,
        Control::Bass => param_key::BASS,
        Control::Mid => param_key::MID,
        Control::Treble => param_key::TREBLE,
    };
    percent(key)
}

pub fn control_from_key(key: u16) -> Option<Control> {
    match key {
        param_key::DRIVE => Some(Control::Gain),
        param_key::MASTER => Some(Control::Master),
        param_key::BASS => Some(Control::Bass),
        param_key::MID => Some(Control::Mid),
        param_key::TREBLE => Some(Control::Treble),
        _ => None,
    }
}

/// Descriptor of an effect subunit parameter. `None` when the type does
/// not have the parameter (mix is not a subunit parameter).
pub fn effect_descriptor(effect: EffectType, param: EffectParam) -> Option<ParamDescriptor> {
    use EffectParam::*;
    use EffectType::*;
    let key = match (effect, param) {
        (Chorus, Depth) | (Flanger, Depth) | (Tremolo, Depth) => param_key::DEPTH,
        (Chorus, Feedback) | (Phaser, Feedback) => param_key::FEEDBACK,
        // Tremolo names its rate "speed" on the wire, the others "freq".
        (Tremolo, Speed) => param_key::SPEED,
        (Chorus, Speed) | (Flanger, Speed) | (Phaser, Speed) => param_key::FREQ,
        (Chorus, Predelay) => param_key::PRE,
        _ => return None,
    };
    Some(percent(key))
}

pub fn effect_param_from_key(key: u16) -> Option<EffectParam> {
    match key {
        param_key::DEPTH => Some(EffectParam::Depth),
        param_key::FEEDBACK => Some(EffectParam::Feedback),
        param_key::SPEED | param_key::FREQ => Some(EffectParam::Speed),
        param_key::PRE => Some(EffectParam::Predelay),
        _ => None,
    }
}

/// Echo parameters are identical for both echo types.
pub fn echo_descriptor(param: EchoParam) -> Option<ParamDescriptor> {
    let key = match param {
        EchoParam::Bass => param_key::BASS,
        EchoParam::Feedback => param_key::FEEDBACK,
        EchoParam::Time => param_key::TIME,
        EchoParam::Treble => param_key::TREBLE,
        EchoParam::Mix => return None,
    };
    Some(percent(key))
}

pub fn echo_param_from_key(key: u16) -> Option<EchoParam> {
    match key {
        param_key::BASS => Some(EchoParam::Bass),
        param_key::FEEDBACK => Some(EchoParam::Feedback),
        param_key::TIME => Some(EchoParam::Time),
        param_key::TREBLE => Some(EchoParam::Treble),
        _ => None,
    }
}

pub fn reverb_descriptor(reverb: ReverbType, param: ReverbParam) -> Option<ParamDescriptor> {
    use ReverbParam::*;
    use ReverbType::*;
    let key = match (reverb, param) {
        (Spring, Time) => param_key::TIME,
        (Spring, Tone) | (Room, Tone) | (Plate, Tone) | (Hall, Tone) => param_key::TONE,
        (Room, Decay) | (Plate, Decay) | (Hall, Decay) => param_key::DECAY,
        (Room, Predelay) | (Plate, Predelay) | (Hall, Predelay) => param_key::PRE_DELAY,
        _ => return None,
    };
    Some(percent(key))
}

pub fn reverb_param_from_key(key: u16) -> Option<ReverbParam> {
    match key {
        param_key::TIME => Some(ReverbParam::Time),
        param_key::TONE => Some(ReverbParam::Tone),
        param_key::DECAY => Some(ReverbParam::Decay),
        param_key::PRE_DELAY => Some(ReverbParam::Predelay),
        _ => None,
    }
}

pub fn compressor_descriptor(param: CompressorParam) -> Option<ParamDescriptor> {
    let key = match param {
        CompressorParam::Sustain => param_key::SUSTAIN,
        CompressorParam::Level => param_key::LEVEL,
        CompressorParam::Mix => return None,
    };
    Some(percent(key))
}

pub fn compressor_param_from_key(key: u16) -> Option<CompressorParam> {
    match key {
        param_key::SUSTAIN => Some(CompressorParam::Sustain),
        param_key::LEVEL => Some(CompressorParam::Level),
        _ => None,
    }
}

/// Gate parameters live directly on the guitar-processing unit.
pub fn gate_descriptor(param: GateParam) -> ParamDescriptor {
    match param {
        GateParam::Threshold => percent(param_key::GATE_THRESHOLD),
        GateParam::Decay => percent(param_key::DECAY),
    }
}

/// Mix levels live directly on the guitar-processing unit as well.
pub fn mix_key(unit: Unit) -> Option<u16> {
    match unit {
        Unit::Compressor => Some(param_key::COMP_MIX),
        Unit::Effect => Some(param_key::FX2_MIX),
        Unit::Echo => Some(param_key::FX3_MIX),
        Unit::Reverb => Some(param_key::FX4_WET_SEND),
        Unit::Gate => None,
    }
}

/// The on/off command key of a switchable unit.
pub fn unit_enable_key(unit: Unit) -> u16 {
    match unit {
        Unit::Compressor => param_key::FX1_ENABLE,
        Unit::Gate => param_key::GATE_ENABLE,
        Unit::Effect => param_key::FX2_ENABLE,
        Unit::Echo => param_key::FX3_ENABLE,
        Unit::Reverb => param_key::FX4_ENABLE,
    }
}

pub fn unit_from_enable_key(key: u16) -> Option<Unit> {
    match key {
        param_key::FX1_ENABLE => Some(Unit::Compressor),
        param_key::GATE_ENABLE => Some(Unit::Gate),
        param_key::FX2_ENABLE => Some(Unit::Effect),
        param_key::FX3_ENABLE => Some(Unit::Echo),
        param_key::FX4_ENABLE => Some(Unit::Reverb),
        _ => None,
    }
}

pub fn effect_type_code(effect: EffectType) -> u16 {
    match effect {
        EffectType::Chorus => type_code::CHORUS,
        EffectType::Flanger => type_code::FLANGER,
        EffectType::Phaser => type_code::PHASER,
        EffectType::Tremolo => type_code::TREMOLO,
    }
}

pub fn effect_type_from_code(code: u16) -> Option<EffectType> {
    match code {
        type_code::CHORUS => Some(EffectType::Chorus),
        type_code::FLANGER => Some(EffectType::Flanger),
        type_code::PHASER => Some(EffectType::Phaser),
        type_code::TREMOLO => Some(EffectType::Tremolo),
        _ => None,
    }
}

pub fn echo_type_code(echo: EchoType) -> u16 {
    match echo {
        EchoType::TapeEcho => type_code::TAPE_ECHO,
        EchoType::DigitalDelay => type_code::DIGITAL_DELAY,
    }
}

pub fn echo_type_from_code(code: u16) -> Option<EchoType> {
    match code {
        type_code::TAPE_ECHO => Some(EchoType::TapeEcho),
        type_code::DIGITAL_DELAY => Some(EchoType::DigitalDelay),
        _ => None,
    }
}

pub fn reverb_type_code(reverb: ReverbType) -> u16 {
    match reverb {
        ReverbType::Spring => type_code::SPRING,
        ReverbType::Room => type_code::ROOM,
        ReverbType::Plate => type_code::PLATE,
        ReverbType::Hall => type_code::HALL,
    }
}

pub fn reverb_type_from_code(code: u16) -> Option<ReverbType> {
    match code {
        type_code::SPRING => Some(ReverbType::Spring),
        type_code::ROOM => Some(ReverbType::Room),
        type_code::PLATE => Some(ReverbType::Plate),
        type_code::HALL => Some(ReverbType::Hall),
        _ => None,
    }
}

/// Type code of a collection/model pair in the amp subunit.
pub fn amp_type_code(col: Collection, model: AmpModel) -> u16 {
    type_code::AMP_BASE + (col as u16) * 8 + model as u16
}

static AMP_CODES: Lazy<HashMap<u16, (Collection, AmpModel)>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for col in Collection::ALL {
        for model in AmpModel::ALL {
            map.insert(amp_type_code(col, model), (col, model));
        }
    }
    map
});

pub fn amp_from_type_code(code: u16) -> Option<(Collection, AmpModel)> {
    AMP_CODES.get(&code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_scaling_round_trips() {
        for v in [0.0, 1.0, 37.0, 50.0, 99.0, 100.0] {
            let back = wire_to_percent(percent_to_wire(v));
            assert!((back - v).abs() < 1e-4, "{v} came back as {back}");
        }
    }

    #[test]
    fn threshold_scaling_round_trips_through_db() {
        for v in [0.0, 25.0, 40.0, 100.0] {
            let back = wire_to_threshold(threshold_to_wire(v));
            assert!((back - v).abs() < 1e-4, "{v} came back as {back}");
        }
        // 0 on the scale is the -96 dB floor, 100 is 0 dB.
        assert_eq!(threshold_to_wire(100.0), 0.0f32.to_bits());
        assert_eq!(threshold_to_wire(0.0), (-96.0f32).to_bits());
    }

    #[test]
    fn nan_is_out_of_range() {
        assert!(!in_range(f64::NAN, PERCENT));
        assert!(!in_range(100.1, PERCENT));
        assert!(in_range(0.0, PERCENT));
        assert!(in_range(100.0, PERCENT));
    }

    #[test]
    fn tremolo_speed_uses_its_own_key() {
        let trem = effect_descriptor(EffectType::Tremolo, EffectParam::Speed);
        let phas = effect_descriptor(EffectType::Phaser, EffectParam::Speed);
        assert_eq!(trem.map(|d| d.key), Some(param_key::SPEED));
        assert_eq!(phas.map(|d| d.key), Some(param_key::FREQ));
    }

    #[test]
    fn invalid_effect_combinations_have_no_descriptor() {
        assert!(effect_descriptor(EffectType::Phaser, EffectParam::Depth).is_none());
        assert!(effect_descriptor(EffectType::Flanger, EffectParam::Feedback).is_none());
        assert!(effect_descriptor(EffectType::Tremolo, EffectParam::Predelay).is_none());
        assert!(reverb_descriptor(ReverbType::Spring, ReverbParam::Decay).is_none());
        assert!(reverb_descriptor(ReverbType::Hall, ReverbParam::Time).is_none());
    }

    #[test]
    fn amp_codes_are_unique_and_reversible() {
        for col in Collection::ALL {
            for model in AmpModel::ALL {
                let code = amp_type_code(col, model);
                assert_eq!(amp_from_type_code(code), Some((col, model)));
            }
        }
        assert_eq!(AMP_CODES.len(), 24);
    }

    #[test]
    fn enable_keys_map_back_to_their_units() {
        for unit in Unit::ALL {
            assert_eq!(unit_from_enable_key(unit_enable_key(unit)), Some(unit));
        }
    }
}
