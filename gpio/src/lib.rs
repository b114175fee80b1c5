pub mod gpiod;
pub mod lcd;
pub mod mock;
pub mod raw;

use std::fmt::{Debug, Display, Formatter};
use std::thread::sleep;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("timed out waiting for the device")]
    Timeout,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Identifies a single GPIO line as a (port, pin) pair.
///
/// How the pair maps onto hardware is up to the [GpioDriver] backend: the raw BCM backend only
/// knows port `0`, the gpiod backend uses the port as a chip index.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PinId {
    pub port: usize,
    pub pin: usize,
}

impl PinId {
    pub const fn new(port: usize, pin: usize) -> Self {
        Self { port, pin }
    }
}

impl Display for PinId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.port, self.pin)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GpioDirection {
    Input,
    Output,
}

/// Pin-level access to a set of GPIO lines.
///
/// All methods take `&self`; backends that need to track state use interior mutability.
pub trait GpioDriver: Debug {
    /// Configures the pin as an input or an output.
    fn set_direction(&self, pin: PinId, direction: GpioDirection) -> GpioResult<()>;

    /// Sets the logical level of an output pin.
    ///
    /// Backends may return [GpioError::InvalidArgument] if the pin is not configured as an output.
    fn write(&self, pin: PinId, value: bool) -> GpioResult<()>;

    /// Reads the logical level of an input pin.
    ///
    /// Backends may return [GpioError::InvalidArgument] if the pin is not configured as an input.
    fn read(&self, pin: PinId) -> GpioResult<bool>;
}

/// Blocking delay with microsecond granularity.
pub trait Delay: Debug {
    /// Blocks the caller for at least `us` microseconds.
    fn delay_us(&self, us: u32);
}

/// [Delay] backed by [std::thread::sleep].
///
/// The OS scheduler usually oversleeps short waits, which is fine here since every timing
/// requirement of the supported controllers is a minimum.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay_us(&self, us: u32) {
        sleep(Duration::from_micros(us as u64));
    }
}
