use std::{fmt::Display, thread::sleep, time::Duration};

use derive_ctor::ctor;
use derive_more::IsVariant;
use gba_port::Transport;

use crate::{
    Result,
    checksum::Checksum,
    cipher::Cipher,
    err::Error,
    image::FirmwareImage,
    progress::Progress,
};

const DISCOVERY: u32 = 0x6202;
const DISCOVERY_REPLY: u32 = 0x72026202;
const RECOGNITION: u32 = 0x6102;
const HEADER_DONE: u32 = 0x6200;
const SEED_REQUEST: u32 = 0x63d1;
const SEED_ACK: u32 = 0x6400;
const CHECKSUM_READY: u32 = 0x65;
const CHECKSUM_READY_REPLY: u32 = 0x00750065;
const CHECKSUM_SEND: u32 = 0x66;

/// Offset subtracted from the padded size in the length word.
pub const LENGTH_BIAS: u32 = 0x190;
/// Added to the console key byte to form the keystream seed.
pub const SEED_M_BASE: u32 = 0xffff00d1;
/// Added to the console key byte to form the handshake byte.
pub const SEED_H_BASE: u32 = 0xf;
/// Mask applied to the final checksum seed.
pub const SEED_F_MASK: u32 = 0xffff0000;

/// Protocol state. Stages run strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum Stage {
    Discovery,
    Recognition,
    Header,
    HeaderComplete,
    Seeds,
    Payload,
    ChecksumFold,
    ChecksumHandshake,
    /// Terminal state of a finished upload.
    ChecksumExchange,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Discovery => "discovery",
            Self::Recognition => "recognition",
            Self::Header => "header transfer",
            Self::HeaderComplete => "header handshake",
            Self::Seeds => "seed exchange",
            Self::Payload => "payload transfer",
            Self::ChecksumFold => "checksum fold",
            Self::ChecksumHandshake => "checksum handshake",
            Self::ChecksumExchange => "checksum exchange",
        };
        f.write_str(name)
    }
}

/// How long to keep polling the console in the discovery and checksum handshakes.
#[derive(ctor, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between attempts
    pub delay: Duration,
    /// Give up after this many attempts, poll forever if `None`
    pub attempts: Option<u32>,
}

impl PollPolicy {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(10);

    pub fn unbounded(delay: Duration) -> Self {
        Self::new(delay, None)
    }

    pub fn bounded(delay: Duration, attempts: u32) -> Self {
        Self::new(delay, Some(attempts))
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::unbounded(Self::DEFAULT_DELAY)
    }
}

/// Values derived from the console replies during the seed exchange.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Seeds {
    /// Keystream seed
    pub m: u32,
    /// Handshake byte base
    pub h: u32,
    /// Folded into the checksum after the payload
    pub f: u32,
}

/// Summary of a finished upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upload {
    pub padded_size: u32,
    pub seeds: Seeds,
    pub checksum: u16,
}

/// One multiboot upload over `T`.
///
/// Every step is a public method so the protocol can be driven stage by stage;
/// [`Session::run`] performs all of them in order.
pub struct Session<'a, T: Transport, P: Progress> {
    io: T,
    image: FirmwareImage<'a>,
    policy: PollPolicy,
    progress: P,
    stage: Stage,
    seeds: Seeds,
    cipher: Cipher,
    checksum: Checksum,
    offset: u32,
}

impl<'a, T: Transport, P: Progress> Session<'a, T, P> {
    pub fn new(io: T, image: FirmwareImage<'a>, policy: PollPolicy, progress: P) -> Self {
        Self {
            io,
            image,
            policy,
            progress,
            stage: Stage::Discovery,
            seeds: Seeds::default(),
            cipher: Cipher::new(0),
            checksum: Checksum::default(),
            offset: 0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn seeds(&self) -> Seeds {
        self.seeds
    }

    pub fn checksum(&self) -> u16 {
        self.checksum.value()
    }

    /// Byte offset of the last payload word sent.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn into_inner(self) -> T {
        self.io
    }

    /// Run every stage from discovery to the checksum exchange.
    pub fn run(&mut self) -> Result<Upload> {
        self.discover()?;
        self.recognize()?;
        self.send_header()?;
        self.finish_header()?;
        self.establish_seeds()?;
        self.send_payload()?;
        self.fold_checksum();
        self.checksum_handshake()?;
        self.exchange_checksum()?;

        Ok(Upload {
            padded_size: self.image.padded_size(),
            seeds: self.seeds,
            checksum: self.checksum.value(),
        })
    }

    fn send(&mut self, word: u32) -> Result<u32> {
        self.io.exchange(word).map_err(|e| e.into())
    }

    /// Send `word` until the console answers with `reply`, returns the number of attempts.
    fn poll(&mut self, word: u32, reply: u32) -> Result<u32> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            if self.send(word)? == reply {
                return Ok(attempts);
            }

            if self.policy.attempts.is_some_and(|limit| attempts >= limit) {
                return Err(Error::HandshakeTimeout {
                    stage: self.stage,
                    attempts,
                });
            }
            sleep(self.policy.delay);
        }
    }

    /// Wait for the console to enter multiboot mode.
    pub fn discover(&mut self) -> Result<u32> {
        self.stage = Stage::Discovery;
        self.poll(DISCOVERY, DISCOVERY_REPLY)
    }

    pub fn recognize(&mut self) -> Result<()> {
        self.stage = Stage::Recognition;
        self.send(DISCOVERY)?;
        self.send(RECOGNITION)?;
        Ok(())
    }

    /// Send the 0xc0 byte header in 16-bit units.
    pub fn send_header(&mut self) -> Result<()> {
        self.stage = Stage::Header;
        for unit in self.image.header_units() {
            self.send(unit)?;
        }
        Ok(())
    }

    pub fn finish_header(&mut self) -> Result<()> {
        self.stage = Stage::HeaderComplete;
        self.send(HEADER_DONE)?;
        self.send(DISCOVERY)?;
        Ok(())
    }

    /// Exchange the key and length words and derive the session seeds.
    pub fn establish_seeds(&mut self) -> Result<Seeds> {
        self.stage = Stage::Seeds;

        self.send(SEED_REQUEST)?;
        let reply = self.send(SEED_REQUEST)?;
        let key = (reply >> 16) & 0xff;
        self.seeds.m = key + SEED_M_BASE;
        self.seeds.h = key + SEED_H_BASE;

        self.send((((reply >> 16) + SEED_H_BASE) & 0xff) | SEED_ACK)?;

        /* Images under LENGTH_BIAS bytes wrap around, as on the reference host */
        let length = self.image.padded_size().wrapping_sub(LENGTH_BIAS) / 4;
        let reply = self.send(length)?;
        self.seeds.f = (((reply >> 16) & 0xff) + self.seeds.h) | SEED_F_MASK;

        self.cipher = Cipher::new(self.seeds.m);
        Ok(self.seeds)
    }

    /// Send the obfuscated payload and fold every plain word into the checksum.
    pub fn send_payload(&mut self) -> Result<()> {
        self.stage = Stage::Payload;

        let total = self.image.padded_size();
        for (offset, word) in self.image.payload_words() {
            self.checksum.update(word);
            let data = self.cipher.encode_next(word, offset);
            self.send(data)?;

            self.offset = offset;
            self.progress.report(offset, total);
        }
        self.progress.report(total, total);

        Ok(())
    }

    pub fn fold_checksum(&mut self) {
        self.stage = Stage::ChecksumFold;
        self.checksum.update(self.seeds.f);
    }

    pub fn checksum_handshake(&mut self) -> Result<u32> {
        self.stage = Stage::ChecksumHandshake;
        self.poll(CHECKSUM_READY, CHECKSUM_READY_REPLY)
    }

    /// Send the checksum. The console's verdict is not read back.
    pub fn exchange_checksum(&mut self) -> Result<()> {
        self.stage = Stage::ChecksumExchange;
        self.send(CHECKSUM_SEND)?;
        self.send(self.checksum.value() as u32)?;
        Ok(())
    }
}
