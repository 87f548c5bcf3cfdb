use crate::{Result, err::Error};

/// Largest image the console accepts, the size of EWRAM.
pub const MAX_IMAGE_SIZE: usize = 256 * 1024;
/// Cartridge-style header sent before the key exchange.
pub const HEADER_SIZE: usize = 0xc0;
/// Transfer granularity expected by the boot ROM.
pub const IMAGE_ALIGN: usize = 16;

/// Round `size` up to the transfer granularity.
pub const fn padded_size(size: usize) -> usize {
    size.div_ceil(IMAGE_ALIGN) * IMAGE_ALIGN
}

/// Validated multiboot image.
///
/// Bytes past the end of the source buffer read as zero up to the padded size.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareImage<'a> {
    data: &'a [u8],
    padded_size: u32,
}

impl<'a> FirmwareImage<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::EmptyImage);
        }
        if data.len() > MAX_IMAGE_SIZE {
            return Err(Error::ImageTooLarge(data.len()));
        }

        Ok(Self {
            data,
            padded_size: padded_size(data.len()) as u32,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn padded_size(&self) -> u32 {
        self.padded_size
    }

    fn byte(&self, offset: usize) -> u8 {
        self.data.get(offset).copied().unwrap_or(0)
    }

    /// Header as 16-bit little-endian units, each zero-extended to a protocol word.
    pub fn header_units(self) -> impl Iterator<Item = u32> + 'a {
        (0..HEADER_SIZE)
            .step_by(2)
            .map(move |i| u16::from_le_bytes([self.byte(i), self.byte(i + 1)]) as u32)
    }

    /// Little-endian payload words after the header, paired with their byte offset.
    pub fn payload_words(self) -> impl Iterator<Item = (u32, u32)> + 'a {
        (HEADER_SIZE..self.padded_size as usize)
            .step_by(4)
            .map(move |i| {
                let word = u32::from_le_bytes([
                    self.byte(i),
                    self.byte(i + 1),
                    self.byte(i + 2),
                    self.byte(i + 3),
                ]);
                (i as u32, word)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_boundaries() {
        for (size, padded) in [(0, 0), (1, 16), (16, 16), (17, 32), (MAX_IMAGE_SIZE, MAX_IMAGE_SIZE)] {
            assert_eq!(padded_size(size), padded);
            assert!(padded_size(size) >= size);
            assert_eq!(padded_size(size) % 16, 0);
        }
    }

    #[test]
    fn size_limits() {
        assert!(matches!(FirmwareImage::new(&[]), Err(Error::EmptyImage)));

        let too_large = vec![0; MAX_IMAGE_SIZE + 1];
        assert!(matches!(
            FirmwareImage::new(&too_large),
            Err(Error::ImageTooLarge(s)) if s == MAX_IMAGE_SIZE + 1
        ));

        let largest = vec![0; MAX_IMAGE_SIZE];
        assert_eq!(FirmwareImage::new(&largest).unwrap().padded_size(), MAX_IMAGE_SIZE as u32);
    }

    #[test]
    fn header_is_read_as_halfwords() {
        let data: Vec<u8> = (0..=0xffu8).collect();
        let image = FirmwareImage::new(&data).unwrap();
        let units: Vec<u32> = image.header_units().collect();

        assert_eq!(units.len(), 96);
        assert_eq!(units[0], 0x0100);
        assert_eq!(units[1], 0x0302);
        assert_eq!(units[95], 0xbfbe);
    }

    #[test]
    fn short_image_reads_zeros() {
        let data = [0xaa; 3];
        let image = FirmwareImage::new(&data).unwrap();
        let units: Vec<u32> = image.header_units().collect();

        assert_eq!(units[0], 0xaaaa);
        assert_eq!(units[1], 0x00aa);
        assert!(units[2..].iter().all(|u| *u == 0));
        assert_eq!(image.payload_words().count(), 0);
    }

    #[test]
    fn payload_words_are_padded() {
        let mut data = vec![0; HEADER_SIZE];
        data.extend_from_slice(&[0x78, 0x56, 0x34, 0x12, 0xef, 0xbe]);
        let image = FirmwareImage::new(&data).unwrap();
        let words: Vec<(u32, u32)> = image.payload_words().collect();

        assert_eq!(image.padded_size(), 0xd0);
        assert_eq!(words, [(0xc0, 0x12345678), (0xc4, 0xbeef), (0xc8, 0), (0xcc, 0)]);
    }
}
