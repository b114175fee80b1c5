//! HD44780 command codec.
//!
//! See [HD44780Driver] for the command set, and [GpioHD44780Driver] for the implementation over a
//! parallel GPIO bus.

mod gpio;

use crate::{GpioError, GpioResult};
use std::fmt::Debug;
pub use gpio::*;

/// Settle time for the clear display and return home commands. These take about 1.52 ms on the
/// HD44780, far longer than the fixed delay used for ordinary writes, and the wait applies even
/// when the busy flag is polled.
pub const SLOW_COMMAND_DELAY_US: u32 = 2_000;

/// The `HD44780Driver` trait is the command codec for HD44780-compatible controllers.
///
/// The provided methods encode every command into its byte. They keep the display control and
/// entry mode registers up to date, so a partial update (e.g. turning blinking on) leaves the
/// other flags of the register untouched. Implementors only supply the transport: sending raw
/// command and data bytes, waiting, and storing the two registers.
///
/// # Commands
///
/// | Command         | Byte       | Notes                                   |
/// |-----------------|------------|-----------------------------------------|
/// | Clear display   | `00000001` | slow, see [SLOW_COMMAND_DELAY_US]       |
/// | Return home     | `0000001?` | slow                                    |
/// | Entry mode set  | `000001IS` | see [EntryMode]                         |
/// | Display control | `00001DCB` | see [DisplayControl]                    |
/// | Cursor shift    | `0001DR??` | display or cursor, right or left        |
/// | Function set    | `001BLF??` | see [LcdConfig]                         |
/// | CGRAM address   | `01AAAAAA` | custom character memory                 |
/// | DDRAM address   | `1AAAAAAA` | cursor position                         |
pub trait HD44780Driver: Debug {
    /// Runs the power-on initialization sequence for the given configuration.
    /// See [GpioHD44780Driver::init] for the GPIO version.
    fn init(&mut self, config: LcdConfig) -> GpioResult<()>;

    /// The last display control value written to the controller.
    fn display_control(&self) -> DisplayControl;

    /// Stores the register and writes it to the controller.
    fn set_display_control(&mut self, control: DisplayControl) -> GpioResult<()>;

    /// The last entry mode value written to the controller.
    fn entry_mode(&self) -> EntryMode;

    /// Stores the register and writes it to the controller.
    fn set_entry_mode(&mut self, mode: EntryMode) -> GpioResult<()>;

    /// Sends a command byte (RS = 0).
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends a data byte (RS = 1), written to CGRAM or DDRAM depending on the last address set.
    fn send_data(&mut self, data: u8) -> GpioResult<()>;

    /// Blocks for at least `us` microseconds.
    fn delay_us(&mut self, us: u32);

    /// Clears the display and sets the cursor to the home position.
    ///
    /// Command: `00000001`.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(0b00000001)?;
        self.delay_us(SLOW_COMMAND_DELAY_US);
        Ok(())
    }

    /// Sets the cursor to the home position and undoes any display shift.
    ///
    /// Command: `00000010`.
    fn return_home(&mut self) -> GpioResult<()> {
        self.send_command(0b00000010)?;
        self.delay_us(SLOW_COMMAND_DELAY_US);
        Ok(())
    }

    /// Turns the display on or off. The contents of DDRAM are kept while the display is off.
    fn set_display_on(&mut self, on: bool) -> GpioResult<()> {
        let mut control = self.display_control();
        control.set_display_on(on);
        self.set_display_control(control)
    }

    /// Shows or hides the underline cursor.
    fn set_cursor_visible(&mut self, visible: bool) -> GpioResult<()> {
        let mut control = self.display_control();
        control.set_cursor(visible);
        self.set_display_control(control)
    }

    /// Turns blinking of the character at the cursor position on or off.
    fn set_cursor_blink(&mut self, blink: bool) -> GpioResult<()> {
        let mut control = self.display_control();
        control.set_blink(blink);
        self.set_display_control(control)
    }

    /// Sets the direction the cursor moves in after each character is written.
    /// [CursorDirection::Right] writes text left to right.
    fn set_text_direction(&mut self, direction: CursorDirection) -> GpioResult<()> {
        let mut mode = self.entry_mode();
        mode.set_direction(direction);
        self.set_entry_mode(mode)
    }

    /// When on, the whole display shifts with each character written instead of the cursor.
    fn set_autoscroll(&mut self, autoscroll: bool) -> GpioResult<()> {
        let mut mode = self.entry_mode();
        mode.set_autoscroll(autoscroll);
        self.set_entry_mode(mode)
    }

    /// Moves the cursor or shifts the display by one position.
    ///
    /// Command: `0001DR00`.
    /// `D` is `1` for display shift, `0` for cursor shift.
    /// `R` is `1` for right shift, `0` for left shift.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> GpioResult<()> {
        let mut command = 0b00010000;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Shifts the whole display content by one position, without touching DDRAM.
    fn scroll_display(&mut self, direction: CursorDirection) -> GpioResult<()> {
        self.cursor_shift(true, direction)
    }

    /// Sets the interface width, number of lines and font.
    ///
    /// Command: `001BLF00`.
    fn function_set(&mut self, config: LcdConfig) -> GpioResult<()> {
        self.send_command(0b00100000 | config.to_mask())
    }

    /// Sets the CGRAM address. Following data bytes are written into custom character memory.
    ///
    /// The address is a 6-bit value. If out of bounds, it will return [GpioError::InvalidArgument].
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b00111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(0b01000000 | address)
    }

    /// Sets the DDRAM address, which is the cursor position.
    ///
    /// The address is a 7-bit value. If out of bounds, it will return [GpioError::InvalidArgument].
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b01111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(0b10000000 | address)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor (or display) to the left.
    Left,
    /// Moves the cursor (or display) to the right.
    Right,
}

/// Width of the parallel data bus.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum InterfaceWidth {
    /// D4–D7 wired, every byte is sent as two nibbles.
    #[default]
    Bus4Bit,
    /// D0–D7 wired.
    Bus8Bit,
}

impl InterfaceWidth {
    /// Number of data lines.
    pub fn width(&self) -> usize {
        match self {
            InterfaceWidth::Bus4Bit => 4,
            InterfaceWidth::Bus8Bit => 8,
        }
    }

    pub fn to_mask(&self) -> u8 {
        match self {
            InterfaceWidth::Bus4Bit => 0b00000000,
            InterfaceWidth::Bus8Bit => 0b00010000,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Lines {
    One,
    #[default]
    Two,
}

impl Lines {
    pub fn to_mask(&self) -> u8 {
        match self {
            Lines::One => 0b00000000,
            Lines::Two => 0b00001000,
        }
    }
}

/// Character cell size. 5x10 is only available on single-line displays.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Font {
    #[default]
    Dots5x8,
    Dots5x10,
}

impl Font {
    pub fn to_mask(&self) -> u8 {
        match self {
            Font::Dots5x8 => 0b00000000,
            Font::Dots5x10 => 0b00000100,
        }
    }
}

/// Creation-time configuration of a display. Maps onto the `BLF` bits of the function set command.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct LcdConfig {
    pub interface: InterfaceWidth,
    pub lines: Lines,
    pub font: Font,
}

impl LcdConfig {
    pub fn new(interface: InterfaceWidth, lines: Lines, font: Font) -> Self {
        Self { interface, lines, font }
    }

    pub fn to_mask(&self) -> u8 {
        self.interface.to_mask() | self.lines.to_mask() | self.font.to_mask()
    }
}

/// The display control register: `00001DCB`.
///
/// `D` is `1` for display on, `C` for cursor on, `B` for blinking on.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DisplayControl(u8);

impl DisplayControl {
    const DISPLAY: u8 = 0b100;
    const CURSOR: u8 = 0b010;
    const BLINK: u8 = 0b001;

    pub fn new(display_on: bool, cursor_on: bool, blink_on: bool) -> Self {
        let mut control = Self(0);
        control.set_display_on(display_on);
        control.set_cursor(cursor_on);
        control.set_blink(blink_on);
        control
    }

    fn set_flag(&mut self, flag: u8, v: bool) {
        self.0 &= !flag;
        if v {
            self.0 |= flag;
        }
    }

    pub fn set_display_on(&mut self, v: bool) {
        self.set_flag(Self::DISPLAY, v);
    }

    pub fn set_cursor(&mut self, v: bool) {
        self.set_flag(Self::CURSOR, v);
    }

    pub fn set_blink(&mut self, v: bool) {
        self.set_flag(Self::BLINK, v);
    }

    pub fn display_on(&self) -> bool {
        self.0 & Self::DISPLAY != 0
    }

    pub fn cursor(&self) -> bool {
        self.0 & Self::CURSOR != 0
    }

    pub fn blink(&self) -> bool {
        self.0 & Self::BLINK != 0
    }

    /// The full command byte, opcode included.
    pub fn command(&self) -> u8 {
        0b00001000 | self.0
    }
}

/// Display on, cursor and blinking off.
impl Default for DisplayControl {
    fn default() -> Self {
        Self::new(true, false, false)
    }
}

/// The entry mode register: `000001IS`.
///
/// `I` is `1` when the cursor moves right after a write (left-to-right text), `S` is `1` when the
/// display shifts instead (autoscroll).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EntryMode(u8);

impl EntryMode {
    const INCREMENT: u8 = 0b10;
    const SHIFT: u8 = 0b01;

    pub fn new(direction: CursorDirection, autoscroll: bool) -> Self {
        let mut mode = Self(0);
        mode.set_direction(direction);
        mode.set_autoscroll(autoscroll);
        mode
    }

    pub fn set_direction(&mut self, direction: CursorDirection) {
        self.0 &= !Self::INCREMENT;
        if direction == CursorDirection::Right {
            self.0 |= Self::INCREMENT;
        }
    }

    pub fn set_autoscroll(&mut self, v: bool) {
        self.0 &= !Self::SHIFT;
        if v {
            self.0 |= Self::SHIFT;
        }
    }

    pub fn direction(&self) -> CursorDirection {
        if self.0 & Self::INCREMENT != 0 {
            CursorDirection::Right
        } else {
            CursorDirection::Left
        }
    }

    pub fn autoscroll(&self) -> bool {
        self.0 & Self::SHIFT != 0
    }

    /// The full command byte, opcode included.
    pub fn command(&self) -> u8 {
        0b00000100 | self.0
    }
}

/// Left to right, no autoscroll.
impl Default for EntryMode {
    fn default() -> Self {
        Self::new(CursorDirection::Right, false)
    }
}
