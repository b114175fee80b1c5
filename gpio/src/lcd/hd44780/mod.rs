//! HD44780 character LCD module.
//!
//! - [driver] holds the command codec ([driver::HD44780Driver]) and its GPIO implementation
//!   ([driver::GpioHD44780Driver]), which clocks bytes onto a 4-bit or 8-bit parallel bus and
//!   optionally polls the busy flag instead of waiting fixed delays.
//! - [registry] is a fixed-capacity pool of displays sharing one GPIO backend.
//! - [DisplayExt] adds text-level helpers (printing, cursor placement, custom characters) on top
//!   of any driver.
//!
//! Datasheet: Hitachi, [“HD44780U (LCD-II),”](https://www.sparkfun.com/datasheets/LCD/HD44780.pdf)
//! see pages 45–46 for the initialization sequences.

pub mod driver;
pub mod registry;
mod display;

pub use display::*;
