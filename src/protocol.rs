//! THR30II SysEx protocol engine
//!
//! Everything needed to talk to the amplifier lives below this module:
//! - `tokens`: the closed vocabulary of structural byte markers
//! - `bucket`: the 7-bit-safe transport codec
//! - `values`: device keys, type codes and value scaling
//! - `serialize`: patch and settings-change message builders
//! - `dump`: the token-driven parser for incoming settings dumps
//! - `queue`: outbound ack tracking, inbound reassembly

pub mod bucket;
pub mod dump;
pub mod queue;
pub mod serialize;
pub mod tokens;
pub mod values;

use thiserror::Error;

/// SysEx frame delimiters.
pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_STOP: u8 = 0xF7;

/// Yamaha manufacturer/device id sequence, directly after 0xF0.
pub const YAMAHA_ID: [u8; 3] = [0x00, 0x01, 0x0C];

/// Sub-id sequence of the settings-change message family (`22 02 4D`).
pub const FAMILY_SETTINGS: [u8; 3] = [0x22, 0x02, 0x4D];
/// Sub-id sequence of the memory/patch-write message family (`24 02 4D`).
pub const FAMILY_MEMORY: [u8; 3] = [0x24, 0x02, 0x4D];

/// Fixed preamble of a settings-family message (start + ids + command 0x00).
pub const SETTINGS_PREAMBLE: [u8; 8] = [0xF0, 0x00, 0x01, 0x0C, 0x22, 0x02, 0x4D, 0x00];
/// Fixed preamble of a memory-family message (start + ids + command 0x01).
pub const MEMORY_PREAMBLE: [u8; 8] = [0xF0, 0x00, 0x01, 0x0C, 0x24, 0x02, 0x4D, 0x01];

/// Universal identity request, the first message of the handshake.
pub const IDENTITY_REQUEST: [u8; 6] = [0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7];
/// Prefix of the amplifier's reply to [`IDENTITY_REQUEST`].
pub const IDENTITY_REPLY_PREFIX: [u8; 5] = [0xF0, 0x7E, 0x7F, 0x06, 0x02];
/// Prefix of the version-string answer (`L6ImageType:...`).
pub const VERSION_ANSWER_PREFIX: [u8; 10] =
    [0xF0, 0x00, 0x01, 0x0C, 0x24, 0x02, 0x7E, 0x7F, 0x06, 0x02];

/// Number of bytes of every frame up to (not including) the payload:
/// preamble, sequence counter, slice counter and the two length nibbles.
pub const FRAME_HEADER_LEN: usize = 12;

/// Maximum pre-bucket payload of one frame. Chosen so the encoded frame
/// stays under the practical 255-byte SysEx limit with no incomplete
/// 7-byte group (210 = 30 * 7).
pub const SLICE_LEN: usize = 210;

/// Hard cap on one reassembled inbound message.
pub const REASSEMBLY_MAX: usize = 4096;

/// Patch names are truncated to this many characters on both directions.
pub const PATCH_NAME_MAX: usize = 64;

/// Model id words reported in the identity reply.
pub const MODEL_THR30II: u32 = 0x0024_0002;
pub const MODEL_THR10II: u32 = 0x0024_0001;

/// Errors surfaced by the protocol layer. Parser structure errors are not
/// here: the dump parser degrades to its terminal state instead of failing
/// the caller.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("outbound queue is full ({capacity} messages pending)")]
    QueueFull { capacity: usize },

    #[error("inbound queue is full ({capacity} messages pending)")]
    InboundFull { capacity: usize },

    #[error("incoming message exceeds {max} bytes, discarded")]
    MessageTooLong { max: usize },

    #[error("frame of {len} bytes is shorter than the {min}-byte header")]
    FrameTooShort { len: usize, min: usize },

    #[error("transport send failed: {0}")]
    Transport(String),
}

/// Resolve a model id word to a display name.
pub fn model_name(id: u32) -> &'static str {
    match id {
        MODEL_THR30II => "THR30II",
        MODEL_THR10II => "THR10II",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preambles_carry_the_family_ids() {
        assert_eq!(&SETTINGS_PREAMBLE[4..7], &FAMILY_SETTINGS);
        assert_eq!(&MEMORY_PREAMBLE[4..7], &FAMILY_MEMORY);
        assert_eq!(&SETTINGS_PREAMBLE[1..4], &YAMAHA_ID);
    }

    #[test]
    fn model_names_resolve() {
        assert_eq!(model_name(MODEL_THR30II), "THR30II");
        assert_eq!(model_name(MODEL_THR10II), "THR10II");
        assert_eq!(model_name(0xDEAD_BEEF), "unknown");
    }
}
