//! Game Boy Advance multiboot host.
//!
//! The console boot ROM listens on the link port in SPI slave mode. The host
//! discovers it, sends the cartridge header in the clear, derives a keystream
//! from the console replies, streams the obfuscated payload and finally sends
//! a checksum of the plain payload. The console never reports whether the
//! checksum matched.

use gba_port::Transport;

use crate::err::Error;

pub mod checksum;
pub mod cipher;
pub mod emulator;
pub mod err;
pub mod image;
pub mod progress;
pub mod session;

pub type Result<T> = core::result::Result<T, Error>;

pub use emulator::Emulator;
pub use image::FirmwareImage;
pub use progress::{NoProgress, Progress};
pub use session::{PollPolicy, Seeds, Session, Stage, Upload};

/// Validate `data` and upload it over `io`.
///
/// The image is checked before the transport is touched. Any transport error aborts the upload,
/// a new upload starts over from discovery.
pub fn upload<T: Transport, P: Progress>(
    io: T,
    data: &[u8],
    policy: PollPolicy,
    progress: P,
) -> Result<Upload> {
    let image = FirmwareImage::new(data)?;
    Session::new(io, image, policy, progress).run()
}
