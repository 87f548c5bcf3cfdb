use thiserror::Error as TError;

#[derive(Debug, TError)]
pub enum Error {
    /// More than one serial bridge is connected and none was picked
    #[error("Please disconnect other USB serial devices or pick the bridge via --port")]
    MoreThanOneDevice,

    /// gba-multiboot error
    #[error("Multiboot error: {0}")]
    Multiboot(#[from] gba_multiboot::err::Error),
    /// gba-port error
    #[error("Bridge error: {0}")]
    Port(#[from] gba_port::err::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Any other error
    #[error("{0}")]
    Custom(#[from] Box<dyn std::error::Error>),
}
