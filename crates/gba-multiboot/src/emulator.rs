//! Software model of the console side of a multiboot upload.
//!
//! The emulator answers like the boot ROM does from the host's point of view,
//! de-obfuscates the payload and recomputes the checksum, so an upload can be checked
//! end to end without hardware.

use gba_port::Transport;

use crate::{
    Result,
    checksum::Checksum,
    cipher::Cipher,
    err::Error,
    image::{HEADER_SIZE, MAX_IMAGE_SIZE},
    session::{LENGTH_BIAS, SEED_F_MASK, SEED_H_BASE, SEED_M_BASE},
};

const HANDSHAKE_REPLY: u32 = 0x73000000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Recognition(u8),
    Header,
    HeaderComplete(u8),
    SeedRequest(u8),
    SeedAck,
    Length,
    Payload(u32),
    ChecksumReady,
    ChecksumSend,
    ChecksumValue,
    Done,
}

pub struct Emulator {
    key: u8,
    hash: u8,
    busy: u32,
    pending: u32,
    phase: Phase,
    image: Vec<u8>,
    seed_f: u32,
    cipher: Cipher,
    checksum: Checksum,
    received: Option<u16>,
    exchanges: usize,
}

impl Emulator {
    /// `key` is reported in the seed exchange, `hash` in the reply to the length word.
    pub fn new(key: u8, hash: u8) -> Self {
        Self {
            key,
            hash,
            busy: 0,
            pending: 0,
            phase: Phase::Idle,
            image: Vec::new(),
            seed_f: 0,
            cipher: Cipher::new(0),
            checksum: Checksum::default(),
            received: None,
            exchanges: 0,
        }
    }

    /// Ignore the first `busy` polls of each handshake.
    pub fn with_busy(mut self, busy: u32) -> Self {
        self.busy = busy;
        self.pending = busy;
        self
    }

    /// Image reconstructed from the header and the decoded payload.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Checksum sent by the host.
    pub fn received_checksum(&self) -> Option<u16> {
        self.received
    }

    /// Checksum of what actually arrived, once the payload is complete.
    pub fn computed_checksum(&self) -> Option<u16> {
        match self.phase {
            Phase::ChecksumReady | Phase::ChecksumSend | Phase::ChecksumValue | Phase::Done => {
                Some(self.checksum.value())
            }
            _ => None,
        }
    }

    /// Compare both checksums, `None` until the host sent its checksum.
    pub fn verify(&self) -> Option<Result<()>> {
        let actual = self.received?;
        let expected = self.computed_checksum()?;
        Some(if expected == actual {
            Ok(())
        } else {
            Err(Error::ChecksumMismatch { expected, actual })
        })
    }

    fn violation(&self, word: u32) -> gba_port::Result<u32> {
        Err(gba_port::err::Error::Custom(
            format!("Unexpected word {word:#010x} in {:?}", self.phase).into(),
        ))
    }

    /// Reply to a polled word, stalling for the configured number of polls first.
    fn poll_reply(&mut self, reply: u32, next: Phase) -> u32 {
        if self.pending > 0 {
            self.pending -= 1;
            return 0;
        }

        self.pending = self.busy;
        self.phase = next;
        reply
    }

    fn key_reply(&self, low: u32) -> u32 {
        HANDSHAKE_REPLY | (self.key as u32) << 16 | low
    }

    fn start_payload(&mut self, length: u32) -> gba_port::Result<u32> {
        /* Images under LENGTH_BIAS bytes arrive as a wrapped length word */
        let size = length.wrapping_mul(4).wrapping_add(LENGTH_BIAS);
        if size as usize > MAX_IMAGE_SIZE || size.wrapping_sub(LENGTH_BIAS) / 4 != length {
            return self.violation(length);
        }

        let key = self.key as u32;
        let seed_h = key + SEED_H_BASE;
        self.seed_f = (self.hash as u32 + seed_h) | SEED_F_MASK;
        self.cipher = Cipher::new(key + SEED_M_BASE);
        self.checksum = Checksum::default();

        let words = (size as usize).saturating_sub(HEADER_SIZE) as u32 / 4;
        self.phase = if words == 0 {
            self.checksum.update(self.seed_f);
            Phase::ChecksumReady
        } else {
            Phase::Payload(words)
        };

        Ok(HANDSHAKE_REPLY | (self.hash as u32) << 16 | (length & 0xffff))
    }

    fn receive_payload(&mut self, data: u32, remaining: u32) -> u32 {
        let offset = self.image.len() as u32;
        let word = self.cipher.decode_next(data, offset);
        self.checksum.update(word);
        self.image.extend_from_slice(&word.to_le_bytes());

        self.phase = if remaining > 1 {
            Phase::Payload(remaining - 1)
        } else {
            self.checksum.update(self.seed_f);
            Phase::ChecksumReady
        };
        0
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new(0xcc, 0xc5)
    }
}

impl Transport for Emulator {
    fn exchange(&mut self, word: u32) -> gba_port::Result<u32> {
        self.exchanges += 1;

        match (self.phase, word) {
            (Phase::Idle, 0x6202) => Ok(self.poll_reply(0x72026202, Phase::Recognition(0))),
            (Phase::Idle, _) => Ok(0),
            (Phase::Recognition(0), 0x6202) => {
                self.phase = Phase::Recognition(1);
                Ok(0x72026202)
            }
            (Phase::Recognition(1), 0x6102) => {
                self.phase = Phase::Header;
                Ok(0x72026102)
            }
            (Phase::Header, unit) if unit <= 0xffff => {
                self.image.extend_from_slice(&(unit as u16).to_le_bytes());
                if self.image.len() == HEADER_SIZE {
                    self.phase = Phase::HeaderComplete(0);
                }
                Ok(0x72020000 | (self.image.len() as u32 / 2))
            }
            (Phase::HeaderComplete(0), 0x6200) => {
                self.phase = Phase::HeaderComplete(1);
                Ok(0)
            }
            (Phase::HeaderComplete(1), 0x6202) => {
                self.phase = Phase::SeedRequest(0);
                Ok(0x72026202)
            }
            (Phase::SeedRequest(seen), 0x63d1) => {
                self.phase = if seen == 0 {
                    Phase::SeedRequest(1)
                } else {
                    Phase::SeedAck
                };
                Ok(self.key_reply(0x63d1))
            }
            (Phase::SeedAck, ack)
                if ack & !0xff == 0x6400
                    && ack & 0xff == (self.key as u32 + SEED_H_BASE) & 0xff =>
            {
                self.phase = Phase::Length;
                Ok(self.key_reply(ack))
            }
            (Phase::Length, length) => self.start_payload(length),
            (Phase::Payload(remaining), data) => Ok(self.receive_payload(data, remaining)),
            (Phase::ChecksumReady, 0x65) => Ok(self.poll_reply(0x00750065, Phase::ChecksumSend)),
            (Phase::ChecksumSend, 0x66) => {
                self.phase = Phase::ChecksumValue;
                Ok(0x00750066)
            }
            (Phase::ChecksumValue, checksum) if checksum <= 0xffff => {
                self.received = Some(checksum as u16);
                self.phase = Phase::Done;
                Ok(0)
            }
            _ => self.violation(word),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_waits_for_busy_polls() {
        let mut emulator = Emulator::default().with_busy(2);

        assert_eq!(emulator.exchange(0x6202).unwrap(), 0);
        assert_eq!(emulator.exchange(0x6202).unwrap(), 0);
        assert_eq!(emulator.exchange(0x6202).unwrap(), 0x72026202);
        assert_eq!(emulator.exchanges(), 3);
    }

    #[test]
    fn rejects_out_of_order_words() {
        let mut emulator = Emulator::default();
        emulator.exchange(0x6202).unwrap();

        assert!(emulator.exchange(0x63d1).is_err());
    }

    #[test]
    fn rejects_oversized_length() {
        let mut emulator = Emulator::default();
        reach_length(&mut emulator);

        assert!(emulator.exchange(0x10000).is_err());
    }

    fn reach_length(emulator: &mut Emulator) {
        for word in [0x6202, 0x6202, 0x6102] {
            emulator.exchange(word).unwrap();
        }
        for _ in 0..HEADER_SIZE / 2 {
            emulator.exchange(0).unwrap();
        }
        for word in [0x6200, 0x6202, 0x63d1, 0x63d1, 0x64db] {
            emulator.exchange(word).unwrap();
        }
    }

    #[test]
    fn wrapped_length_is_header_only() {
        let mut emulator = Emulator::default();
        reach_length(&mut emulator);

        emulator.exchange(0x3fffffa0).unwrap();
        assert!(emulator.computed_checksum().is_some());
        assert_eq!(emulator.exchange(0x65).unwrap(), 0x00750065);
    }

    #[test]
    fn rejects_length_that_wraps_past_itself() {
        let mut emulator = Emulator::default();
        reach_length(&mut emulator);

        assert!(emulator.exchange(0x40000000).is_err());
    }

    #[test]
    fn nothing_to_verify_before_checksum() {
        let emulator = Emulator::default();
        assert!(emulator.verify().is_none());
        assert!(emulator.computed_checksum().is_none());
    }
}
