use std::{
    fs,
    io::{Write, stdout},
    path::PathBuf,
    thread::sleep,
    time::Duration,
};

use clap::Parser;
use clap_num::number_range;
use colored::Colorize;
use gba_multiboot::{Emulator, FirmwareImage, PollPolicy, Session};
use gba_port::{BridgeConfig, DEFAULT_BAUD_RATE, SerialBridge, Transport, available_bridges};
use serialport::SerialPortType;

use crate::{err::Error, logging::Bar};

mod err;
mod logging;

type Result<T> = core::result::Result<T, Error>;

/// Upload a program to a Game Boy Advance in multiboot mode through a serial-to-SPI bridge.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Multiboot image to upload
    #[arg(required_unless_present = "list")]
    image: Option<PathBuf>,

    /// Bridge serial port, waits for a single USB serial device if not set
    #[arg(short, long)]
    port: Option<String>,

    /// Bridge baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Reply timeout in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = positive)]
    timeout: u64,

    /// Delay between handshake polls in milliseconds
    #[arg(long, default_value_t = 10)]
    poll_delay: u64,

    /// Give up a handshake after this many polls, polls forever if not set
    #[arg(long, value_parser = attempts)]
    attempts: Option<u32>,

    /// Upload to the built-in console emulator instead of the bridge
    #[arg(long)]
    dry_run: bool,

    /// List USB serial devices and exit
    #[arg(short, long)]
    list: bool,
}

fn positive(s: &str) -> core::result::Result<u64, String> {
    number_range(s, 1, u64::MAX)
}

fn attempts(s: &str) -> core::result::Result<u32, String> {
    number_range(s, 1, u32::MAX)
}

fn list_bridges() -> Result<()> {
    let ports = available_bridges()?;
    if ports.is_empty() {
        println!("{}", "No USB serial devices found".yellow());
    }

    for port in ports {
        match port.port_type {
            SerialPortType::UsbPort(usb) => println!(
                "{} {:04x}:{:04x} {}",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.product.unwrap_or_default()
            ),
            _ => println!("{}", port.port_name),
        }
    }

    Ok(())
}

fn find_bridge() -> Result<String> {
    log!("Waiting for the bridge");
    let port = loop {
        let ports = available_bridges()?;

        if ports.len() > 1 {
            return Err(Error::MoreThanOneDevice);
        } else if ports.is_empty() {
            log!(".");
        } else {
            println!();
            break ports[0].port_name.clone();
        }

        sleep(Duration::from_millis(500));
    };

    println!("Found bridge at {port}");
    Ok(port)
}

fn boot<T: Transport>(io: T, image: FirmwareImage, policy: PollPolicy) -> Result<()> {
    let mut session = Session::new(io, image, policy, Bar::new(stdout()));

    println!("Power on the console in multiboot mode with the link cable attached");
    log!("Waiting for the console...");
    status!(session.discover())?;

    log!("Sending header...");
    status!(
        session
            .recognize()
            .and_then(|_| session.send_header())
            .and_then(|_| session.finish_header())
    )?;

    log!("Exchanging keys...");
    let seeds = status!(session.establish_seeds())?;
    println!("Keystream seed: {:#010x}", seeds.m);

    println!("Sending payload...");
    session.send_payload()?;
    session.fold_checksum();

    log!("Waiting for checksum handshake...");
    status!(session.checksum_handshake())?;

    let checksum = session.checksum();
    log!("Sending checksum {checksum:#06x}...");
    status!(session.exchange_checksum())?;

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if cli.list {
        return list_bridges();
    }

    let path = cli
        .image
        .ok_or(Error::Custom("Image path is required".into()))?;
    let data = fs::read(&path)?;
    let image = FirmwareImage::new(&data)?;
    println!(
        "Image: {} bytes, {} bytes padded",
        image.len(),
        image.padded_size()
    );

    let policy = PollPolicy::new(Duration::from_millis(cli.poll_delay), cli.attempts);

    if cli.dry_run {
        let mut emulator = Emulator::default();
        boot(&mut emulator, image, policy)?;

        log!("Verifying upload on the emulator...");
        return match emulator.verify() {
            Some(ret) => status!(ret).map_err(|e| e.into()),
            None => Err(Error::Custom("Emulator didn't receive a checksum".into())),
        };
    }

    let port = match cli.port {
        Some(port) => port,
        None => find_bridge()?,
    };
    let config = BridgeConfig {
        path: port,
        baud_rate: cli.baud,
        timeout: Duration::from_millis(cli.timeout),
    };

    log!("Opening bridge...");
    let bridge = status!(SerialBridge::open(&config))?;
    boot(bridge, image, policy)?;

    println!("{}", "Upload complete".green());
    Ok(())
}

fn main() -> core::result::Result<(), String> {
    let cli = Cli::parse();
    run(cli).map_err(|e| e.to_string())
}
