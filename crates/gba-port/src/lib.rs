use std::{
    io::{Read as _, Write as _},
    time::Duration,
};

use derive_ctor::ctor;
use serialport::{SerialPort, SerialPortInfo, SerialPortType, available_ports};

use crate::err::Error;

pub mod err;

pub type Result<T> = core::result::Result<T, Error>;

pub type Port = Box<dyn SerialPort>;

/// Default bridge baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default read timeout for a single word reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

pub trait FromBytes<const N: usize> {
    fn from_be(bytes: [u8; N]) -> Self;
}

pub trait ToBytes<const N: usize> {
    fn to_be(&self) -> [u8; N];
}

pub trait SimpleRead {
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    fn simple_read_be<T: FromBytes<N>, const N: usize>(&mut self) -> Result<T> {
        let mut bytes = [0; N];
        Self::read(self, &mut bytes)?;
        Ok(T::from_be(bytes))
    }

    fn read_u32_be(&mut self) -> Result<u32> {
        self.simple_read_be()
    }
}

pub trait SimpleWrite {
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Push buffered bytes out to the device.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn simple_write_be<T: ToBytes<N>, const N: usize>(&mut self, value: T) -> Result<()> {
        Self::write(self, &value.to_be())
    }

    fn write_u32_be(&mut self, value: u32) -> Result<()> {
        self.simple_write_be(value)
    }
}

impl FromBytes<4> for u32 {
    fn from_be(bytes: [u8; 4]) -> Self {
        Self::from_be_bytes(bytes)
    }
}

impl ToBytes<4> for u32 {
    fn to_be(&self) -> [u8; 4] {
        self.to_be_bytes()
    }
}

impl SimpleRead for Port {
    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.read_exact(buf).map_err(|e| e.into())
    }
}

impl SimpleWrite for Port {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.write_all(buf).map_err(|e| e.into())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::Write::flush(self).map_err(|e| e.into())
    }
}

/// A full-duplex 32-bit word exchange with the console.
///
/// The word is clocked out MSB first while the console's reply is clocked in,
/// so every call is one blocking round trip.
pub trait Transport {
    fn exchange(&mut self, word: u32) -> Result<u32>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, word: u32) -> Result<u32> {
        (**self).exchange(word)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self, word: u32) -> Result<u32> {
        (**self).exchange(word)
    }
}

/// Serial bridge settings.
#[derive(ctor, Debug, Clone)]
pub struct BridgeConfig {
    /// Serial device path
    pub path: String,
    /// Baud rate between host and bridge
    pub baud_rate: u32,
    /// Reply timeout
    pub timeout: Duration,
}

impl BridgeConfig {
    pub fn with_defaults(path: impl Into<String>) -> Self {
        Self::new(path.into(), DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT)
    }
}

/// Serial-to-SPI bridge.
///
/// The host only sets the serial baud rate. The bridge firmware must already be configured
/// as the link-port SPI master: mode 3, MSB first, 32-bit frames at the 256 kHz normal-mode
/// clock. It shifts out every 4 bytes it receives as one frame and writes back the 4 bytes
/// clocked in during that frame, with no framing or escaping of its own.
pub struct SerialBridge<T: SimpleRead + SimpleWrite = Port> {
    io: T,
}

impl SerialBridge<Port> {
    pub fn open(config: &BridgeConfig) -> Result<Self> {
        let port = serialport::new(&config.path, config.baud_rate)
            .timeout(config.timeout)
            .open()?;
        /* Drop whatever the bridge sent before we were listening */
        port.clear(serialport::ClearBuffer::All)?;

        Ok(Self::new(port))
    }
}

impl<T: SimpleRead + SimpleWrite> SerialBridge<T> {
    pub fn new(io: T) -> Self {
        Self { io }
    }

    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T: SimpleRead + SimpleWrite> Transport for SerialBridge<T> {
    fn exchange(&mut self, word: u32) -> Result<u32> {
        self.io.write_u32_be(word)?;
        self.io.flush()?;
        self.io.read_u32_be()
    }
}

/// List USB serial devices that may be a bridge.
pub fn available_bridges() -> Result<Vec<SerialPortInfo>> {
    Ok(available_ports()?
        .into_iter()
        .filter(|s| matches!(s.port_type, SerialPortType::UsbPort(_)))
        .collect())
}
