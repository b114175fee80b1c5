use crate::lcd::hd44780::driver::HD44780Driver;
use crate::{GpioError, GpioResult};
use log::warn;

/// DDRAM address of the first column of each line. Lines 2 and 3 only exist on 4-line modules,
/// which are wired as two 2-line halves.
pub const LINE_OFFSETS: [u8; 4] = [0x00, 0x40, 0x10, 0x50];

/// Text-level helpers for any [HD44780Driver].
///
/// Nothing here wraps text or tracks the cursor; the controller simply advances its address
/// counter after every character according to the entry mode.
pub trait DisplayExt {
    /// Prints a single character code at the cursor. Codes `0..=7` show the custom characters.
    fn print_char(&mut self, c: u8) -> GpioResult<()>;

    /// Prints a string at the cursor, one character per byte, stopping at a NUL if there is one.
    ///
    /// Non-ASCII characters are printed as `?`, since the character ROM isn't Unicode.
    fn print(&mut self, s: &str) -> GpioResult<()>;

    /// Prints a signed decimal integer at the cursor.
    fn print_int(&mut self, n: i32) -> GpioResult<()>;

    /// Moves the cursor to `line` (0–3) and `col`.
    fn set_cursor(&mut self, line: usize, col: usize) -> GpioResult<()>;

    /// Moves the cursor, then prints.
    fn print_at(&mut self, line: usize, col: usize, s: &str) -> GpioResult<()>;

    /// Uploads a 5x8 custom character into one of the 8 CGRAM slots. Only the low 3 bits of
    /// `index` are used. Each byte of `charmap` is one pixel row, top first, low 5 bits used.
    ///
    /// This leaves the address counter in CGRAM, so call [DisplayExt::set_cursor] before printing.
    fn create_char(&mut self, index: u8, charmap: &[u8; 8]) -> GpioResult<()>;
}

impl <T: ?Sized + HD44780Driver> DisplayExt for T {
    fn print_char(&mut self, c: u8) -> GpioResult<()> {
        self.send_data(c)
    }

    fn print(&mut self, s: &str) -> GpioResult<()> {
        for c in s.chars().take_while(|&c| c != '\0') {
            if c.is_ascii() {
                self.send_data(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.send_data(b'?')?
            }
        }
        Ok(())
    }

    fn print_int(&mut self, n: i32) -> GpioResult<()> {
        // u32::MAX has 10 digits
        let mut buffer = [0u8; 10];
        let mut len = 0;

        if n < 0 {
            self.send_data(b'-')?;
        }

        let mut magnitude = n.unsigned_abs();
        loop {
            debug_assert!(len < buffer.len());
            buffer[len] = b'0' + (magnitude % 10) as u8;
            len += 1;
            magnitude /= 10;
            if magnitude == 0 {
                break;
            }
        }

        for &digit in buffer[..len].iter().rev() {
            self.send_data(digit)?;
        }
        Ok(())
    }

    fn set_cursor(&mut self, line: usize, col: usize) -> GpioResult<()> {
        let offset = *LINE_OFFSETS.get(line).ok_or(GpioError::InvalidArgument)?;
        let address = u8::try_from(col)
            .ok()
            .and_then(|col| col.checked_add(offset))
            .ok_or(GpioError::InvalidArgument)?;
        self.set_ddram_address(address)
    }

    fn print_at(&mut self, line: usize, col: usize, s: &str) -> GpioResult<()> {
        self.set_cursor(line, col)?;
        self.print(s)
    }

    fn create_char(&mut self, index: u8, charmap: &[u8; 8]) -> GpioResult<()> {
        let index = index & 0b111;
        self.set_cgram_address(index << 3)?;
        for &row in charmap {
            self.send_data(row)?;
        }
        Ok(())
    }
}
