//! Domain vocabulary of the amplifier: selectors, parameter identifiers
//! and the per-type parameter storage.
//!
//! Every effect family keeps the parameters of *all* its types, not only
//! the active one; switching types must never lose the values dialed in
//! under another type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five continuous amp controls, 0-100 each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    Gain,
    Master,
    Bass,
    Mid,
    Treble,
}

impl Control {
    pub const ALL: [Control; 5] = [
        Control::Gain,
        Control::Master,
        Control::Bass,
        Control::Mid,
        Control::Treble,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Amp model collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Classic,
    Boutique,
    Modern,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Classic,
        Collection::Boutique,
        Collection::Modern,
    ];
}

/// Amp models available in every collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmpModel {
    Clean,
    Crunch,
    Lead,
    HiGain,
    Special,
    Bass,
    Aco,
    Flat,
}

impl AmpModel {
    pub const ALL: [AmpModel; 8] = [
        AmpModel::Clean,
        AmpModel::Crunch,
        AmpModel::Lead,
        AmpModel::HiGain,
        AmpModel::Special,
        AmpModel::Bass,
        AmpModel::Aco,
        AmpModel::Flat,
    ];
}

/// Speaker cabinet simulation, 0x00 through 0x10 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cabinet(u8);

impl Cabinet {
    pub const MAX: u8 = 0x10;

    pub fn new(id: u8) -> Option<Self> {
        (id <= Self::MAX).then_some(Cabinet(id))
    }

    pub const fn id(self) -> u8 {
        self.0
    }
}

impl Default for Cabinet {
    fn default() -> Self {
        Cabinet(0)
    }
}

impl fmt::Display for Cabinet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cab {:#04x}", self.0)
    }
}

/// The five switchable processing units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    Compressor,
    Gate,
    Effect,
    Echo,
    Reverb,
}

impl Unit {
    pub const ALL: [Unit; 5] = [
        Unit::Compressor,
        Unit::Gate,
        Unit::Effect,
        Unit::Echo,
        Unit::Reverb,
    ];
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Unit::Compressor => "compressor",
            Unit::Gate => "gate",
            Unit::Effect => "effect",
            Unit::Echo => "echo",
            Unit::Reverb => "reverb",
        };
        f.write_str(name)
    }
}

/// On/off state of every switchable unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStates {
    pub compressor: bool,
    pub gate: bool,
    pub effect: bool,
    pub echo: bool,
    pub reverb: bool,
}

impl UnitStates {
    pub fn get(&self, unit: Unit) -> bool {
        match unit {
            Unit::Compressor => self.compressor,
            Unit::Gate => self.gate,
            Unit::Effect => self.effect,
            Unit::Echo => self.echo,
            Unit::Reverb => self.reverb,
        }
    }

    pub fn set(&mut self, unit: Unit, on: bool) {
        match unit {
            Unit::Compressor => self.compressor = on,
            Unit::Gate => self.gate = on,
            Unit::Effect => self.effect = on,
            Unit::Echo => self.echo = on,
            Unit::Reverb => self.reverb = on,
        }
    }
}

/// Modulation effect types (FX2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectType {
    Chorus,
    Flanger,
    Phaser,
    Tremolo,
}

impl EffectType {
    pub const ALL: [EffectType; 4] = [
        EffectType::Chorus,
        EffectType::Flanger,
        EffectType::Phaser,
        EffectType::Tremolo,
    ];
}

/// Echo types (FX3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EchoType {
    TapeEcho,
    DigitalDelay,
}

/// Reverb types (FX4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReverbType {
    Spring,
    Room,
    Plate,
    Hall,
}

/// Parameter identifiers of the effect family. Not every type has every
/// parameter; setters reject the combinations that do not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectParam {
    Depth,
    Feedback,
    Speed,
    Predelay,
    Mix,
}

/// Parameter identifiers of the echo family (both types share the set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EchoParam {
    Bass,
    Feedback,
    Time,
    Treble,
    Mix,
}

/// Parameter identifiers of the reverb family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReverbParam {
    Time,
    Tone,
    Decay,
    Predelay,
    Mix,
}

/// Compressor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompressorParam {
    Sustain,
    Level,
    Mix,
}

/// Noise-gate parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateParam {
    Threshold,
    Decay,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChorusParams {
    pub depth: f64,
    pub feedback: f64,
    pub speed: f64,
    pub predelay: f64,
}

impl Default for ChorusParams {
    fn default() -> Self {
        Self {
            depth: 50.0,
            feedback: 50.0,
            speed: 50.0,
            predelay: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlangerParams {
    pub depth: f64,
    pub speed: f64,
}

impl Default for FlangerParams {
    fn default() -> Self {
        Self {
            depth: 50.0,
            speed: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaserParams {
    pub feedback: f64,
    pub speed: f64,
}

impl Default for PhaserParams {
    fn default() -> Self {
        Self {
            feedback: 50.0,
            speed: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TremoloParams {
    pub depth: f64,
    pub speed: f64,
}

impl Default for TremoloParams {
    fn default() -> Self {
        Self {
            depth: 50.0,
            speed: 50.0,
        }
    }
}

/// All effect types' parameters plus the active selection. The mix level
/// is shared across types on the device, so it lives once per family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSettings {
    pub active: EffectType,
    pub chorus: ChorusParams,
    pub flanger: FlangerParams,
    pub phaser: PhaserParams,
    pub tremolo: TremoloParams,
    pub mix: f64,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            active: EffectType::Phaser,
            chorus: ChorusParams::default(),
            flanger: FlangerParams::default(),
            phaser: PhaserParams::default(),
            tremolo: TremoloParams::default(),
            mix: 50.0,
        }
    }
}

/// One echo type's parameters. Tape echo and digital delay share the
/// field set but keep independent storage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EchoParams {
    pub bass: f64,
    pub feedback: f64,
    pub time: f64,
    pub treble: f64,
}

impl Default for EchoParams {
    fn default() -> Self {
        Self {
            bass: 50.0,
            feedback: 50.0,
            time: 50.0,
            treble: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoSettings {
    pub active: EchoType,
    pub tape: EchoParams,
    pub digital: EchoParams,
    pub mix: f64,
}

impl EchoSettings {
    pub fn params(&self, ty: EchoType) -> &EchoParams {
        match ty {
            EchoType::TapeEcho => &self.tape,
            EchoType::DigitalDelay => &self.digital,
        }
    }

    pub fn params_mut(&mut self, ty: EchoType) -> &mut EchoParams {
        match ty {
            EchoType::TapeEcho => &mut self.tape,
            EchoType::DigitalDelay => &mut self.digital,
        }
    }

    pub fn active_params(&self) -> &EchoParams {
        self.params(self.active)
    }
}

impl Default for EchoSettings {
    fn default() -> Self {
        Self {
            active: EchoType::TapeEcho,
            tape: EchoParams::default(),
            digital: EchoParams::default(),
            mix: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpringParams {
    pub time: f64,
    pub tone: f64,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            time: 50.0,
            tone: 50.0,
        }
    }
}

/// Room, plate and hall reverbs share this field set with independent
/// storage per type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HallParams {
    pub decay: f64,
    pub predelay: f64,
    pub tone: f64,
}

impl Default for HallParams {
    fn default() -> Self {
        Self {
            decay: 50.0,
            predelay: 50.0,
            tone: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverbSettings {
    pub active: ReverbType,
    pub spring: SpringParams,
    pub room: HallParams,
    pub plate: HallParams,
    pub hall: HallParams,
    pub mix: f64,
}

impl ReverbSettings {
    /// Storage of the room/plate/hall parameter set; spring has its own.
    pub fn hall_params(&self, ty: ReverbType) -> Option<&HallParams> {
        match ty {
            ReverbType::Spring => None,
            ReverbType::Room => Some(&self.room),
            ReverbType::Plate => Some(&self.plate),
            ReverbType::Hall => Some(&self.hall),
        }
    }

    pub fn hall_params_mut(&mut self, ty: ReverbType) -> Option<&mut HallParams> {
        match ty {
            ReverbType::Spring => None,
            ReverbType::Room => Some(&mut self.room),
            ReverbType::Plate => Some(&mut self.plate),
            ReverbType::Hall => Some(&mut self.hall),
        }
    }
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            active: ReverbType::Spring,
            spring: SpringParams::default(),
            room: HallParams::default(),
            plate: HallParams::default(),
            hall: HallParams::default(),
            mix: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    pub sustain: f64,
    pub level: f64,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            sustain: 50.0,
            level: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateParams {
    pub threshold: f64,
    pub decay: f64,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            threshold: 40.0,
            decay: 50.0,
        }
    }
}
