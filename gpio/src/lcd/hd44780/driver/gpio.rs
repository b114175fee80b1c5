use crate::lcd::hd44780::driver::{DisplayControl, EntryMode, HD44780Driver, InterfaceWidth, LcdConfig};
use crate::{Delay, GpioDirection, GpioDriver, GpioError, GpioResult, PinId};
use log::{debug, trace};

/// Minimum E pulse width is 450 ns.
const ENABLE_PULSE_US: u32 = 1;
/// Fixed wait after each write when the busy flag can't be read. Most commands take 37 µs.
const WRITE_SETTLE_US: u32 = 50;
/// The controller ignores the bus until VCC has been stable for 40 ms.
const POWER_ON_DELAY_US: u32 = 50_000;
/// Waits after each of the three reset function sets.
const RESET_DELAYS_US: [u32; 3] = [4_500, 150, 150];

/// Level of the RS pin.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegisterSelect {
    /// Instruction register (RS = 0).
    Command,
    /// Data register (RS = 1).
    Data,
}

impl RegisterSelect {
    fn level(&self) -> bool {
        matches!(self, RegisterSelect::Data)
    }
}

/// RS, E and the optional RW pin.
///
/// Without RW the display's R/W input must be tied to GND and the driver falls back to fixed
/// delays instead of polling the busy flag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ControlPins {
    pub rs: PinId,
    pub en: PinId,
    pub rw: Option<PinId>,
}

/// The data lines, LSb first: D4–D7 for the 4-bit interface, D0–D7 for the 8-bit one.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DataPins {
    Bus4Bit([PinId; 4]),
    Bus8Bit([PinId; 8]),
}

impl DataPins {
    pub fn pins(&self) -> &[PinId] {
        match self {
            DataPins::Bus4Bit(pins) => pins,
            DataPins::Bus8Bit(pins) => pins,
        }
    }

    pub fn interface(&self) -> InterfaceWidth {
        match self {
            DataPins::Bus4Bit(_) => InterfaceWidth::Bus4Bit,
            DataPins::Bus8Bit(_) => InterfaceWidth::Bus8Bit,
        }
    }

    /// D7, which carries the busy flag during a read.
    pub fn msb(&self) -> PinId {
        match self {
            DataPins::Bus4Bit(pins) => pins[3],
            DataPins::Bus8Bit(pins) => pins[7],
        }
    }
}

/// One physical display: its wiring and the last values of its write-only registers.
///
/// The interface width follows from [DataPins] and can't change after creation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Device {
    control_pins: ControlPins,
    data_pins: DataPins,
    control: DisplayControl,
    mode: EntryMode,
}

impl Device {
    pub fn new(control_pins: ControlPins, data_pins: DataPins) -> Self {
        Self {
            control_pins,
            data_pins,
            control: DisplayControl::default(),
            mode: EntryMode::default(),
        }
    }

    pub fn control_pins(&self) -> &ControlPins {
        &self.control_pins
    }

    pub fn data_pins(&self) -> &DataPins {
        &self.data_pins
    }

    pub fn interface(&self) -> InterfaceWidth {
        self.data_pins.interface()
    }

    pub fn control(&self) -> DisplayControl {
        self.control
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    /// Whether the busy flag is polled instead of waiting fixed delays.
    pub fn uses_busy_flag(&self) -> bool {
        self.control_pins.rw.is_some()
    }
}

/// HD44780 driver over a parallel GPIO bus.
///
/// Every byte is put on the data lines and latched with a 1 µs E pulse; in 4-bit mode that
/// happens twice per byte, high nibble first. After each write the driver either waits a fixed
/// 50 µs or, if the device has an RW pin, polls the busy flag before the next byte.
///
/// The driver borrows the [Device] it talks to, so the register state survives the driver and
/// can be picked up again by a later one (see [crate::lcd::hd44780::registry]).
#[derive(Debug)]
pub struct GpioHD44780Driver<'a> {
    gpio: &'a dyn GpioDriver,
    delay: &'a dyn Delay,
    device: &'a mut Device,
    busy_poll_limit: Option<u32>,
}

impl<'a> GpioHD44780Driver<'a> {
    pub fn new(gpio: &'a dyn GpioDriver, delay: &'a dyn Delay, device: &'a mut Device) -> Self {
        GpioHD44780Driver {
            gpio,
            delay,
            device,
            busy_poll_limit: None,
        }
    }

    /// Makes the busy flag poll give up with [GpioError::Timeout] after `limit` busy samples.
    /// By default it waits forever, as a correctly wired controller always finishes.
    ///
    /// The flag is always sampled at least once, so `Some(0)` behaves like `Some(1)`.
    pub fn with_busy_poll_limit(mut self, limit: Option<u32>) -> Self {
        self.busy_poll_limit = limit;
        self
    }

    pub fn device(&self) -> &Device {
        self.device
    }

    /// Configures every wired pin as an output and, if present, sets RW to write.
    pub fn setup_pins(&self) -> GpioResult<()> {
        let pins = self.device.control_pins;
        self.gpio.set_direction(pins.rs, GpioDirection::Output)?;
        self.gpio.set_direction(pins.en, GpioDirection::Output)?;

        if let Some(rw) = pins.rw {
            self.gpio.set_direction(rw, GpioDirection::Output)?;
            self.gpio.write(rw, false)?;
        }

        for &pin in self.device.data_pins.pins() {
            self.gpio.set_direction(pin, GpioDirection::Output)?;
        }
        Ok(())
    }

    fn pulse_e(&self) -> GpioResult<()> {
        let en = self.device.control_pins.en;
        self.gpio.write(en, true)?;
        self.delay.delay_us(ENABLE_PULSE_US);
        self.gpio.write(en, false)
    }

    /// Puts the low bits of `value` on the data lines (as many as the bus is wide) and latches them.
    pub fn write_value(&mut self, value: u8) -> GpioResult<()> {
        for (i, &pin) in self.device.data_pins.pins().iter().enumerate() {
            self.gpio.write(pin, (value >> i) & 1 != 0)?;
        }
        self.pulse_e()?;

        if !self.device.uses_busy_flag() {
            self.delay.delay_us(WRITE_SETTLE_US);
        }
        Ok(())
    }

    /// Sends a full byte to the instruction or data register.
    pub fn send(&mut self, data: u8, register: RegisterSelect) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {:?}", data, register);

        if self.device.uses_busy_flag() {
            self.wait_ready()?;
        }

        self.gpio.write(self.device.control_pins.rs, register.level())?;

        match self.device.interface() {
            InterfaceWidth::Bus8Bit => self.write_value(data)?,
            InterfaceWidth::Bus4Bit => {
                trace!("Writing HN: {:04b}", data >> 4);
                self.write_value(data >> 4)?;
                trace!("Writing LN: {:04b}", data & 0x0F);
                self.write_value(data & 0x0F)?;
            }
        }
        Ok(())
    }

    /// Blocks until the controller clears its busy flag.
    ///
    /// D7 is switched to an input for the duration and restored afterwards, along with RW, even
    /// if polling fails.
    pub fn wait_ready(&mut self) -> GpioResult<()> {
        let Some(rw) = self.device.control_pins.rw else {
            return Err(GpioError::NotSupported);
        };
        let d7 = self.device.data_pins.msb();

        // RW goes high only once D7 no longer drives the bus
        let result = self
            .gpio
            .write(self.device.control_pins.rs, false)
            .and_then(|_| self.gpio.set_direction(d7, GpioDirection::Input))
            .and_then(|_| self.gpio.write(rw, true))
            .and_then(|_| self.poll_busy_flag(d7));

        let restore_rw = self.gpio.write(rw, false);
        let restore_d7 = self.gpio.set_direction(d7, GpioDirection::Output);
        result.and(restore_rw).and(restore_d7)
    }

    fn poll_busy_flag(&self, d7: PinId) -> GpioResult<()> {
        let en = self.device.control_pins.en;
        let mut polls = 0u32;

        loop {
            self.gpio.write(en, true)?;
            self.delay.delay_us(ENABLE_PULSE_US);
            let busy = self.gpio.read(d7)?;
            self.gpio.write(en, false)?;

            // Clock out the address counter's low nibble to finish the read
            if self.device.interface() == InterfaceWidth::Bus4Bit {
                self.pulse_e()?;
            }

            trace!("Busy flag: {}", busy);
            if !busy {
                return Ok(());
            }

            polls += 1;
            if self.busy_poll_limit.is_some_and(|limit| polls >= limit) {
                return Err(GpioError::Timeout);
            }
        }
    }
}

impl HD44780Driver for GpioHD44780Driver<'_> {
    /// Initializes the display following the HD44780 datasheet (pages 45, 46).
    ///
    /// All pins are configured first. After waiting for the power supply to settle, the
    /// controller is forced into a known state: the function set nibble `0011` is sent three
    /// times, which puts it in 8-bit mode no matter what mode it was in, and for the 4-bit
    /// interface `0010` then switches it to 4-bit mode. For the 8-bit interface the configuration
    /// byte is sent three times instead.
    ///
    /// Then the real function set is sent, the display is turned on with the cursor hidden, the
    /// display is cleared and text is set to run left to right without autoscroll.
    ///
    /// Nothing here can detect a missing or miswired controller. Without RW, the sequence
    /// completes regardless.
    fn init(&mut self, config: LcdConfig) -> GpioResult<()> {
        if config.interface != self.device.interface() {
            return Err(GpioError::InvalidArgument);
        }

        debug!("Initializing HD44780 with {:?}", config);
        self.setup_pins()?;

        self.delay.delay_us(POWER_ON_DELAY_US);

        self.gpio.write(self.device.control_pins.rs, false)?;
        self.gpio.write(self.device.control_pins.en, false)?;

        // Synchronize
        match config.interface {
            InterfaceWidth::Bus4Bit => {
                for delay in RESET_DELAYS_US {
                    self.write_value(0b0011)?;
                    self.delay.delay_us(delay);
                }
                self.write_value(0b0010)?;
            }
            InterfaceWidth::Bus8Bit => {
                for delay in RESET_DELAYS_US {
                    self.send(config.to_mask(), RegisterSelect::Command)?;
                    self.delay.delay_us(delay);
                }
            }
        }

        self.function_set(config)?;
        self.set_display_control(DisplayControl::default())?;
        self.clear_display()?;
        self.set_entry_mode(EntryMode::default())?;

        debug!("HD44780 initialized");
        Ok(())
    }

    fn display_control(&self) -> DisplayControl {
        self.device.control
    }

    fn set_display_control(&mut self, control: DisplayControl) -> GpioResult<()> {
        self.device.control = control;
        self.send_command(control.command())
    }

    fn entry_mode(&self) -> EntryMode {
        self.device.mode
    }

    fn set_entry_mode(&mut self, mode: EntryMode) -> GpioResult<()> {
        self.device.mode = mode;
        self.send_command(mode.command())
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, RegisterSelect::Command)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, RegisterSelect::Data)
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}
