//! The local mirror of the amplifier's state and the only place that
//! mutates it.
//!
//! Setters enforce the value-range policy (out-of-range updates are
//! ignored, never clamped) and, while the live flag is set, emit the
//! matching settings-change frames into the outbox. Bulk operations such
//! as loading a patch document mutate silently and serialize once at the
//! end.

pub mod types;

use crate::patchlib::{EffectGroupDoc, PatchDocument, ReverbGroupDoc};
use crate::protocol::queue::OutMessage;
use crate::protocol::serialize::{self, Framer, PatchTarget};
use crate::protocol::values::{self, param_key, unit_key};
use crate::protocol::PATCH_NAME_MAX;
use tracing::{debug, warn};
use types::{
    AmpModel, Cabinet, Collection, CompressorParam, CompressorParams, Control, EchoParam,
    EchoSettings, EchoType, EffectParam, EffectSettings, EffectType, GateParam, GateParams,
    ReverbParam, ReverbSettings, ReverbType, Unit, UnitStates,
};

/// Number of patch name slots: the active name plus five user memories.
pub const NAME_SLOTS: usize = 6;

/// Complete mirrored amplifier state.
#[derive(Debug, Clone)]
pub struct SettingsAggregate {
    pub collection: Collection,
    pub amp: AmpModel,
    pub cabinet: Cabinet,
    control: [f64; 5],
    pub effect: EffectSettings,
    pub echo: EchoSettings,
    pub reverb: ReverbSettings,
    pub compressor: CompressorParams,
    comp_mix: f64,
    pub gate: GateParams,
    pub units: UnitStates,
    patch_names: [String; NAME_SLOTS],
    pub tnid: u32,
    pub unknown_global: u32,
    pub tempo: u32,

    send_changes: bool,
    dirty: bool,
    active_user_setting: Option<u8>,
    control_store: [f64; 5],
    boost_active: bool,
    framer: Framer,
    outbox: Vec<OutMessage>,
}

impl Default for SettingsAggregate {
    fn default() -> Self {
        Self {
            collection: Collection::Classic,
            amp: AmpModel::Clean,
            cabinet: Cabinet::default(),
            control: [50.0; 5],
            effect: EffectSettings::default(),
            echo: EchoSettings::default(),
            reverb: ReverbSettings::default(),
            compressor: CompressorParams::default(),
            comp_mix: 50.0,
            gate: GateParams::default(),
            units: UnitStates::default(),
            patch_names: Default::default(),
            tnid: 0,
            unknown_global: 0,
            tempo: 0,
            send_changes: false,
            dirty: false,
            active_user_setting: None,
            control_store: [50.0; 5],
            boost_active: false,
            framer: Framer::new(),
            outbox: Vec::new(),
        }
    }
}

impl SettingsAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every accepted mutation also emits the matching
    /// settings-change frames into the outbox.
    pub fn set_send_changes(&mut self, on: bool) {
        self.send_changes = on;
    }

    pub fn send_changes(&self) -> bool {
        self.send_changes
    }

    /// The settings-family sequence counter. The handshake messages share
    /// it with the live senders so the device sees one continuous stream.
    pub fn framer_mut(&mut self) -> &mut Framer {
        &mut self.framer
    }

    /// Unsent frames produced by setters and patch builds, in order.
    pub fn take_outbox(&mut self) -> Vec<OutMessage> {
        std::mem::take(&mut self.outbox)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Declare the mirror in sync with the device (after applying a dump).
    pub fn mark_synced(&mut self) {
        self.dirty = false;
    }

    pub fn active_user_setting(&self) -> Option<u8> {
        self.active_user_setting
    }

    pub fn set_active_user_setting(&mut self, slot: Option<u8>) {
        self.active_user_setting = slot;
    }

    pub fn control(&self, control: Control) -> f64 {
        self.control[control.index()]
    }

    pub fn compressor_mix(&self) -> f64 {
        self.comp_mix
    }

    pub fn active_name(&self) -> &str {
        &self.patch_names[0]
    }

    pub fn patch_name(&self, slot: usize) -> &str {
        &self.patch_names[slot.min(NAME_SLOTS - 1)]
    }

    /// Copy another mirror's amplifier state, keeping this one's transport
    /// state (sequence counter, outbox, live flag) untouched.
    pub fn adopt_state(&mut self, other: &SettingsAggregate) {
        self.collection = other.collection;
        self.amp = other.amp;
        self.cabinet = other.cabinet;
        self.control = other.control;
        self.effect = other.effect.clone();
        self.echo = other.echo.clone();
        self.reverb = other.reverb.clone();
        self.compressor = other.compressor;
        self.comp_mix = other.comp_mix;
        self.gate = other.gate;
        self.units = other.units;
        self.patch_names = other.patch_names.clone();
        self.tnid = other.tnid;
        self.unknown_global = other.unknown_global;
        self.tempo = other.tempo;
        self.dirty = other.dirty;
        self.active_user_setting = other.active_user_setting;
    }

    fn send_param(&mut self, unit: u16, key: u16, value: u32) {
        if self.send_changes {
            let msgs = serialize::param_change(&mut self.framer, unit, key, value);
            self.outbox.extend(msgs);
        }
    }

    fn send_unit_command(&mut self, key: u16, value: u32) {
        if self.send_changes {
            let msgs = serialize::unit_command(&mut self.framer, unit_key::GUITAR_PROC, key, value);
            self.outbox.extend(msgs);
        }
    }

    fn send_type(&mut self, unit: u16, ty: u16) {
        if self.send_changes {
            let msgs = serialize::type_change(&mut self.framer, unit, ty);
            self.outbox.extend(msgs);
        }
    }

    // ===== Continuous controls =====

    pub fn set_control(&mut self, control: Control, value: f64) {
        let desc = values::control_descriptor(control);
        if !values::in_range(value, desc.range) {
            debug!(?control, value, "control out of range, ignored");
            return;
        }
        self.control[control.index()] = value;
        self.dirty = true;
        self.send_param(unit_key::AMP, desc.key, values::percent_to_wire(value));
    }

    // ===== Selectors =====

    pub fn set_collection_amp(&mut self, collection: Collection, amp: AmpModel) {
        self.collection = collection;
        self.amp = amp;
        self.dirty = true;
        self.send_type(unit_key::AMP, values::amp_type_code(collection, amp));
    }

    pub fn set_cabinet(&mut self, cabinet: Cabinet) {
        self.cabinet = cabinet;
        self.dirty = true;
        self.send_unit_command(param_key::SPK_SIM_TYPE, cabinet.id() as u32);
    }

    pub fn set_effect_type(&mut self, ty: EffectType) {
        self.effect.active = ty;
        self.dirty = true;
        self.send_type(unit_key::EFFECT, values::effect_type_code(ty));
    }

    pub fn set_echo_type(&mut self, ty: EchoType) {
        self.echo.active = ty;
        self.dirty = true;
        self.send_type(unit_key::ECHO, values::echo_type_code(ty));
    }

    pub fn set_reverb_type(&mut self, ty: ReverbType) {
        self.reverb.active = ty;
        self.dirty = true;
        self.send_type(unit_key::REVERB, values::reverb_type_code(ty));
    }

    // ===== Unit switches =====

    pub fn switch_unit(&mut self, unit: Unit, on: bool) {
        self.units.set(unit, on);
        self.dirty = true;
        self.send_unit_command(values::unit_enable_key(unit), on as u32);
    }

    // ===== Effect family =====

    /// Store one effect parameter. The target type does not have to be the
    /// active one; every type keeps its own values.
    pub fn set_effect_param(&mut self, ty: EffectType, param: EffectParam, value: f64) {
        if let EffectParam::Mix = param {
            self.set_effect_mix(value);
            return;
        }
        let Some(desc) = values::effect_descriptor(ty, param) else {
            debug!(?ty, ?param, "parameter not present on this effect type");
            return;
        };
        if !values::in_range(value, desc.range) {
            debug!(?ty, ?param, value, "effect value out of range, ignored");
            return;
        }
        match (ty, param) {
            (EffectType::Chorus, EffectParam::Depth) => self.effect.chorus.depth = value,
            (EffectType::Chorus, EffectParam::Feedback) => self.effect.chorus.feedback = value,
            (EffectType::Chorus, EffectParam::Speed) => self.effect.chorus.speed = value,
            (EffectType::Chorus, EffectParam::Predelay) => self.effect.chorus.predelay = value,
            (EffectType::Flanger, EffectParam::Depth) => self.effect.flanger.depth = value,
            (EffectType::Flanger, EffectParam::Speed) => self.effect.flanger.speed = value,
            (EffectType::Phaser, EffectParam::Feedback) => self.effect.phaser.feedback = value,
            (EffectType::Phaser, EffectParam::Speed) => self.effect.phaser.speed = value,
            (EffectType::Tremolo, EffectParam::Depth) => self.effect.tremolo.depth = value,
            (EffectType::Tremolo, EffectParam::Speed) => self.effect.tremolo.speed = value,
            _ => return,
        }
        self.dirty = true;
        self.send_param(unit_key::EFFECT, desc.key, values::percent_to_wire(value));
    }

    pub fn set_effect_mix(&mut self, value: f64) {
        if !values::in_range(value, (0.0, 100.0)) {
            debug!(value, "effect mix out of range, ignored");
            return;
        }
        self.effect.mix = value;
        self.dirty = true;
        self.send_param(
            unit_key::GUITAR_PROC,
            param_key::FX2_MIX,
            values::percent_to_wire(value),
        );
    }

    // ===== Echo family =====

    pub fn set_echo_param(&mut self, ty: EchoType, param: EchoParam, value: f64) {
        if let EchoParam::Mix = param {
            self.set_echo_mix(value);
            return;
        }
        let Some(desc) = values::echo_descriptor(param) else {
            return;
        };
        if !values::in_range(value, desc.range) {
            debug!(?ty, ?param, value, "echo value out of range, ignored");
            return;
        }
        let params = self.echo.params_mut(ty);
        match param {
            EchoParam::Bass => params.bass = value,
            EchoParam::Feedback => params.feedback = value,
            EchoParam::Time => params.time = value,
            EchoParam::Treble => params.treble = value,
            EchoParam::Mix => unreachable!(),
        }
        self.dirty = true;
        self.send_param(unit_key::ECHO, desc.key, values::percent_to_wire(value));
    }

    pub fn set_echo_mix(&mut self, value: f64) {
        if !values::in_range(value, (0.0, 100.0)) {
            debug!(value, "echo mix out of range, ignored");
            return;
        }
        self.echo.mix = value;
        self.dirty = true;
        self.send_param(
            unit_key::GUITAR_PROC,
            param_key::FX3_MIX,
            values::percent_to_wire(value),
        );
    }

    // ===== Reverb family =====

    pub fn set_reverb_param(&mut self, ty: ReverbType, param: ReverbParam, value: f64) {
        if let ReverbParam::Mix = param {
            self.set_reverb_mix(value);
            return;
        }
        let Some(desc) = values::reverb_descriptor(ty, param) else {
            debug!(?ty, ?param, "parameter not present on this reverb type");
            return;
        };
        if !values::in_range(value, desc.range) {
            debug!(?ty, ?param, value, "reverb value out of range, ignored");
            return;
        }
        match ty {
            ReverbType::Spring => match param {
                ReverbParam::Time => self.reverb.spring.time = value,
                ReverbParam::Tone => self.reverb.spring.tone = value,
                _ => return,
            },
            _ => {
                let Some(params) = self.reverb.hall_params_mut(ty) else {
                    return;
                };
                match param {
                    ReverbParam::Decay => params.decay = value,
                    ReverbParam::Predelay => params.predelay = value,
                    ReverbParam::Tone => params.tone = value,
                    _ => return,
                }
            }
        }
        self.dirty = true;
        self.send_param(unit_key::REVERB, desc.key, values::percent_to_wire(value));
    }

    pub fn set_reverb_mix(&mut self, value: f64) {
        if !values::in_range(value, (0.0, 100.0)) {
            debug!(value, "reverb mix out of range, ignored");
            return;
        }
        self.reverb.mix = value;
        self.dirty = true;
        self.send_param(
            unit_key::GUITAR_PROC,
            param_key::FX4_WET_SEND,
            values::percent_to_wire(value),
        );
    }

    // ===== Compressor and gate =====

    pub fn set_compressor_param(&mut self, param: CompressorParam, value: f64) {
        if !values::in_range(value, (0.0, 100.0)) {
            debug!(?param, value, "compressor value out of range, ignored");
            return;
        }
        match param {
            CompressorParam::Sustain => {
                self.compressor.sustain = value;
                self.dirty = true;
                self.send_param(
                    unit_key::COMPRESSOR,
                    param_key::SUSTAIN,
                    values::percent_to_wire(value),
                );
            }
            CompressorParam::Level => {
                self.compressor.level = value;
                self.dirty = true;
                self.send_param(
                    unit_key::COMPRESSOR,
                    param_key::LEVEL,
                    values::percent_to_wire(value),
                );
            }
            CompressorParam::Mix => {
                self.comp_mix = value;
                self.dirty = true;
                self.send_param(
                    unit_key::GUITAR_PROC,
                    param_key::COMP_MIX,
                    values::percent_to_wire(value),
                );
            }
        }
    }

    pub fn set_gate_param(&mut self, param: GateParam, value: f64) {
        if !values::in_range(value, (0.0, 100.0)) {
            debug!(?param, value, "gate value out of range, ignored");
            return;
        }
        let desc = values::gate_descriptor(param);
        let wire = match param {
            GateParam::Threshold => {
                self.gate.threshold = value;
                values::threshold_to_wire(value)
            }
            GateParam::Decay => {
                self.gate.decay = value;
                values::percent_to_wire(value)
            }
        };
        self.dirty = true;
        self.send_param(unit_key::GUITAR_PROC, desc.key, wire);
    }

    // ===== Patch names =====

    /// Store a name in the given slot (0 = active). Names longer than the
    /// wire limit are cut at a character boundary. Renaming the active
    /// slot while live pushes the name-only patch to the device.
    pub fn set_patch_name(&mut self, name: &str, slot: usize) {
        let slot = slot.min(NAME_SLOTS - 1);
        let mut name = name.to_string();
        if name.len() > PATCH_NAME_MAX {
            let mut end = PATCH_NAME_MAX;
            while !name.is_char_boundary(end) {
                end -= 1;
            }
            name.truncate(end);
        }
        self.patch_names[slot] = name;
        if slot == 0 {
            self.dirty = true;
            if self.send_changes {
                self.create_name_patch();
            }
        }
    }

    // ===== Gain boost =====

    /// Snapshot the controls and push the gain up by 40 points (saturating
    /// at the top of the scale), sending regardless of the live flag.
    pub fn apply_gain_boost(&mut self) {
        if self.boost_active {
            return;
        }
        self.control_store = self.control;
        let boosted = (self.control(Control::Gain) + 40.0).min(100.0);
        let prev = self.send_changes;
        self.send_changes = true;
        self.set_control(Control::Gain, boosted);
        self.send_changes = prev;
        self.boost_active = true;
        debug!(gain = boosted, "gain boost on");
    }

    /// Restore the gain stored by [`Self::apply_gain_boost`].
    pub fn remove_gain_boost(&mut self) {
        if !self.boost_active {
            return;
        }
        let prev = self.send_changes;
        self.send_changes = true;
        self.set_control(Control::Gain, self.control_store[Control::Gain.index()]);
        self.send_changes = prev;
        self.boost_active = false;
        debug!("gain boost off");
    }

    pub fn boost_active(&self) -> bool {
        self.boost_active
    }

    // ===== Whole-patch operations =====

    /// Serialize the aggregate and queue the write frames. Clears the
    /// dirty flag and the active user setting.
    pub fn create_patch(&mut self, target: PatchTarget) {
        let buffer = serialize::build_patch_buffer(self);
        debug!(len = buffer.len(), ?target, "patch serialized");
        let frames = serialize::frame_patch(&buffer, target);
        self.outbox.extend(frames);
        self.dirty = false;
        self.active_user_setting = None;
    }

    /// Queue the lightweight name-only write for the active name.
    pub fn create_name_patch(&mut self) {
        let buffer = serialize::build_name_buffer(&self.patch_names[0]);
        let frames = serialize::frame_patch(&buffer, PatchTarget::Active);
        self.outbox.extend(frames);
    }

    /// Populate the aggregate from a patch document, then serialize the
    /// whole result once. Individual setters stay silent during the bulk
    /// load so the device receives a single patch write. The document
    /// defines the gain, so an active boost is forgotten rather than
    /// restored.
    pub fn load_document(&mut self, doc: &PatchDocument) {
        let prev = self.send_changes;
        self.send_changes = false;
        self.apply_document(doc);
        self.send_changes = prev;
        self.boost_active = false;
        self.create_patch(PatchTarget::Active);
    }

    fn apply_document(&mut self, doc: &PatchDocument) {
        let tone = &doc.data.tone;
        self.set_patch_name(&doc.data.meta.name, 0);
        self.tnid = doc.data.meta.tnid;
        self.tempo = tone.global.tempo;

        self.switch_unit(Unit::Compressor, tone.compressor.enabled);
        self.switch_unit(Unit::Gate, tone.gate.enabled);
        self.switch_unit(Unit::Effect, tone.effect.enabled);
        self.switch_unit(Unit::Echo, tone.echo.enabled);
        self.switch_unit(Unit::Reverb, tone.reverb.enabled);

        self.set_compressor_param(CompressorParam::Sustain, tone.compressor.sustain * 100.0);
        self.set_compressor_param(CompressorParam::Level, tone.compressor.level * 100.0);

        match amp_from_asset(&tone.amp.asset) {
            Some((collection, amp)) => self.set_collection_amp(collection, amp),
            None => {
                warn!(asset = %tone.amp.asset, "unknown amp asset, using Classic Clean");
                self.set_collection_amp(Collection::Classic, AmpModel::Clean);
            }
        }
        self.set_control(Control::Gain, tone.amp.drive * 100.0);
        self.set_control(Control::Master, tone.amp.master * 100.0);
        self.set_control(Control::Bass, tone.amp.bass * 100.0);
        self.set_control(Control::Mid, tone.amp.mid * 100.0);
        self.set_control(Control::Treble, tone.amp.treble * 100.0);

        match Cabinet::new(tone.cab.spk_sim_type) {
            Some(cab) => self.set_cabinet(cab),
            None => warn!(id = tone.cab.spk_sim_type, "cabinet id out of range, kept current"),
        }

        // threshold arrives as dB in [-96, 0]
        self.set_gate_param(
            GateParam::Threshold,
            100.0 - 100.0 / 96.0 * -tone.gate.thresh,
        );
        self.set_gate_param(GateParam::Decay, tone.gate.decay * 100.0);

        self.apply_effect_doc(&tone.effect);
        self.apply_echo_doc(tone);
        self.apply_reverb_doc(&tone.reverb);
    }

    fn apply_effect_doc(&mut self, group: &EffectGroupDoc) {
        if let Some(ty) = effect_from_asset(&group.asset) {
            self.set_effect_type(ty);
        } else {
            warn!(asset = %group.asset, "unknown effect asset, type kept");
        }
        if let Some(p) = &group.chorus {
            self.set_effect_param(EffectType::Chorus, EffectParam::Speed, p.freq * 100.0);
            self.set_effect_param(EffectType::Chorus, EffectParam::Depth, p.depth * 100.0);
            self.set_effect_param(EffectType::Chorus, EffectParam::Predelay, p.pre * 100.0);
            self.set_effect_param(EffectType::Chorus, EffectParam::Feedback, p.feedback * 100.0);
            self.set_effect_mix(p.wet_dry * 100.0);
        }
        if let Some(p) = &group.flanger {
            self.set_effect_param(EffectType::Flanger, EffectParam::Speed, p.freq * 100.0);
            self.set_effect_param(EffectType::Flanger, EffectParam::Depth, p.depth * 100.0);
            self.set_effect_mix(p.wet_dry * 100.0);
        }
        if let Some(p) = &group.phaser {
            self.set_effect_param(EffectType::Phaser, EffectParam::Speed, p.speed * 100.0);
            self.set_effect_param(EffectType::Phaser, EffectParam::Feedback, p.feedback * 100.0);
            self.set_effect_mix(p.wet_dry * 100.0);
        }
        if let Some(p) = &group.tremolo {
            self.set_effect_param(EffectType::Tremolo, EffectParam::Speed, p.speed * 100.0);
            self.set_effect_param(EffectType::Tremolo, EffectParam::Depth, p.depth * 100.0);
            self.set_effect_mix(p.wet_dry * 100.0);
        }
    }

    fn apply_echo_doc(&mut self, tone: &crate::patchlib::ToneDoc) {
        if let Some(ty) = echo_from_asset(&tone.echo.asset) {
            self.set_echo_type(ty);
        } else {
            warn!(asset = %tone.echo.asset, "unknown echo asset, type kept");
        }
        for (ty, doc) in [
            (EchoType::TapeEcho, &tone.echo.tape),
            (EchoType::DigitalDelay, &tone.echo.digital),
        ] {
            if let Some(p) = doc {
                self.set_echo_param(ty, EchoParam::Time, p.time * 100.0);
                self.set_echo_param(ty, EchoParam::Feedback, p.feedback * 100.0);
                self.set_echo_param(ty, EchoParam::Bass, p.bass * 100.0);
                self.set_echo_param(ty, EchoParam::Treble, p.treble * 100.0);
                self.set_echo_mix(p.wet_dry * 100.0);
            }
        }
    }

    fn apply_reverb_doc(&mut self, group: &ReverbGroupDoc) {
        if let Some(ty) = reverb_from_asset(&group.asset) {
            self.set_reverb_type(ty);
        } else {
            warn!(asset = %group.asset, "unknown reverb asset, type kept");
        }
        if let Some(p) = &group.spring {
            self.set_reverb_param(ReverbType::Spring, ReverbParam::Time, p.time * 100.0);
            self.set_reverb_param(ReverbType::Spring, ReverbParam::Tone, p.tone * 100.0);
            self.set_reverb_mix(p.wet_dry * 100.0);
        }
        for (ty, doc) in [
            (ReverbType::Room, &group.room),
            (ReverbType::Plate, &group.plate),
            (ReverbType::Hall, &group.hall),
        ] {
            if let Some(p) = doc {
                self.set_reverb_param(ty, ReverbParam::Decay, p.decay * 100.0);
                self.set_reverb_param(ty, ReverbParam::Predelay, p.pre_delay * 100.0);
                self.set_reverb_param(ty, ReverbParam::Tone, p.tone * 100.0);
                self.set_reverb_mix(p.wet_dry * 100.0);
            }
        }
    }
}

/// Amp asset names as written by the THR Remote applications, one per
/// collection/model pair.
const AMP_ASSETS: [(&str, Collection, AmpModel); 24] = [
    ("THR10_Clean", Collection::Classic, AmpModel::Clean),
    ("THR10_Crunch", Collection::Classic, AmpModel::Crunch),
    ("THR10_Lead", Collection::Classic, AmpModel::Lead),
    ("THR10_Brit", Collection::Classic, AmpModel::HiGain),
    ("THR10_Modern", Collection::Classic, AmpModel::Special),
    ("THR10_Bass", Collection::Classic, AmpModel::Bass),
    ("THR10_Aco", Collection::Classic, AmpModel::Aco),
    ("THR10_Flat", Collection::Classic, AmpModel::Flat),
    ("THR10C_DC30", Collection::Boutique, AmpModel::Clean),
    ("THR10C_Deluxe", Collection::Boutique, AmpModel::Crunch),
    ("THR10C_Mini", Collection::Boutique, AmpModel::Lead),
    ("THR10C_BJunior2", Collection::Boutique, AmpModel::HiGain),
    ("THR10C_Club", Collection::Boutique, AmpModel::Special),
    ("THR10C_Bass", Collection::Boutique, AmpModel::Bass),
    ("THR10C_Aco", Collection::Boutique, AmpModel::Aco),
    ("THR10C_Flat", Collection::Boutique, AmpModel::Flat),
    ("THR10X_Clean", Collection::Modern, AmpModel::Clean),
    ("THR10X_South", Collection::Modern, AmpModel::Crunch),
    ("THR10X_Brown1", Collection::Modern, AmpModel::Lead),
    ("THR10X_Stealth", Collection::Modern, AmpModel::HiGain),
    ("THR10X_FLead", Collection::Modern, AmpModel::Special),
    ("THR10X_Bass", Collection::Modern, AmpModel::Bass),
    ("THR10X_Aco", Collection::Modern, AmpModel::Aco),
    ("THR10X_Flat", Collection::Modern, AmpModel::Flat),
];

pub fn amp_from_asset(name: &str) -> Option<(Collection, AmpModel)> {
    AMP_ASSETS
        .iter()
        .find(|(asset, _, _)| *asset == name)
        .map(|(_, c, m)| (*c, *m))
}

pub fn amp_asset(collection: Collection, amp: AmpModel) -> &'static str {
    AMP_ASSETS
        .iter()
        .find(|(_, c, m)| *c == collection && *m == amp)
        .map(|(asset, _, _)| *asset)
        .unwrap_or("THR10_Clean")
}

pub fn effect_from_asset(name: &str) -> Option<EffectType> {
    match name {
        "StereoSquareChorus" => Some(EffectType::Chorus),
        "L6Flanger" => Some(EffectType::Flanger),
        "Phaser" => Some(EffectType::Phaser),
        "BiasTremolo" => Some(EffectType::Tremolo),
        _ => None,
    }
}

pub fn echo_from_asset(name: &str) -> Option<EchoType> {
    match name {
        "TapeEcho" => Some(EchoType::TapeEcho),
        "L6DigitalDelay" => Some(EchoType::DigitalDelay),
        _ => None,
    }
}

pub fn reverb_from_asset(name: &str) -> Option<ReverbType> {
    match name {
        "StandardSpring" => Some(ReverbType::Spring),
        "SmallRoom1" => Some(ReverbType::Room),
        "LargePlate1" => Some(ReverbType::Plate),
        "ReallyLargeHall" => Some(ReverbType::Hall),
        _ => None,
    }
}
