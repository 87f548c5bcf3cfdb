use derive_more::IsVariant;
use thiserror::Error as TError;

use crate::{image::MAX_IMAGE_SIZE, session::Stage};

#[derive(Debug, TError, IsVariant)]
pub enum Error {
    /// The image doesn't fit into EWRAM
    #[error("Image is too large: {0} bytes, at most {max} bytes fit", max = MAX_IMAGE_SIZE)]
    ImageTooLarge(usize),
    /// Nothing to upload
    #[error("Image is empty")]
    EmptyImage,

    /// The console didn't answer a polling handshake within the retry policy
    #[error("No reply during {stage} after {attempts} attempts")]
    HandshakeTimeout { stage: Stage, attempts: u32 },
    /// The checksum computed by the console differs from the one sent by the host
    #[error("Checksum doesn't match! Expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// gba-port error
    #[error("Transport error: {0}")]
    Transport(#[from] gba_port::err::Error),
}
