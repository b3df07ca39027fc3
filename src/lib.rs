//! THR30II Pedal - foot-controller gateway for the Yamaha THR30II
//!
//! Remotely reconfigures a THR30II guitar amplifier over USB-MIDI using the
//! amplifier's proprietary SysEx protocol: bit-bucketed transport encoding,
//! tagged binary patches, multi-frame uploads and an acknowledgment-aware
//! send queue.

pub mod config;
pub mod console;
pub mod engine;
pub mod midi;
pub mod monitor;
pub mod patchlib;
pub mod protocol;
pub mod settings;
