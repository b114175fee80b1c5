//! Fixed-capacity pool of HD44780 displays sharing one GPIO backend and one delay source.
//!
//! The pool never allocates after construction. Slots are handed out in order until the pool has
//! been filled once; after that, [DeviceRegistry::create] reuses the first slot released by
//! [DeviceRegistry::destroy].
//!
//! ```no_run
//! use hdlcd_gpio::{PinId, ThreadDelay};
//! use hdlcd_gpio::lcd::hd44780::DisplayExt;
//! use hdlcd_gpio::lcd::hd44780::driver::LcdConfig;
//! use hdlcd_gpio::lcd::hd44780::registry::DeviceRegistry;
//! use hdlcd_gpio::raw::RawGpioDriver;
//!
//! let gpio = RawGpioDriver::new_gpiomem()?;
//! let mut registry = DeviceRegistry::<1>::new(&gpio, &ThreadDelay, false);
//!
//! // RS, E
//! let control = [PinId::new(0, 22), PinId::new(0, 17)];
//! // D4, D5, D6, D7
//! let data = [PinId::new(0, 26), PinId::new(0, 16), PinId::new(0, 20), PinId::new(0, 21)];
//! let handle = registry.create(LcdConfig::default(), &control, &data)?;
//!
//! if let Some(mut lcd) = registry.get(handle) {
//!     lcd.print_at(0, 0, "Hello")?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
use crate::lcd::hd44780::driver::{ControlPins, DataPins, Device, GpioHD44780Driver, HD44780Driver, InterfaceWidth, LcdConfig};
use crate::{Delay, GpioDriver, GpioError, PinId};
use bitvec::vec::BitVec;
use log::debug;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum RegistryError {
    #[error("no free device slot")]
    Exhausted,
    #[error("pin list does not match the interface")]
    InvalidPins,
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
}

/// Index of a slot in a [DeviceRegistry].
///
/// Handles are plain indices: once a device is destroyed and its slot reused, an old handle
/// refers to the new device.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DeviceHandle(usize);

impl DeviceHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for DeviceHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "lcd#{}", self.0)
    }
}

/// Pool of up to `N` live displays.
///
/// Whether displays have their RW pin wired (and so poll the busy flag) is decided once for the
/// whole registry. With `rw_support` the control pin list is RS, E, RW; otherwise RS, E.
pub struct DeviceRegistry<'a, const N: usize> {
    gpio: &'a dyn GpioDriver,
    delay: &'a dyn Delay,
    rw_support: bool,
    busy_poll_limit: Option<u32>,
    slots: [Option<Device>; N],
    live: BitVec,
    /// Slots below this index have been handed out at least once.
    claimed: usize,
}

impl<'a, const N: usize> DeviceRegistry<'a, N> {
    pub fn new(gpio: &'a dyn GpioDriver, delay: &'a dyn Delay, rw_support: bool) -> Self {
        Self {
            gpio,
            delay,
            rw_support,
            busy_poll_limit: None,
            slots: std::array::from_fn(|_| None),
            live: BitVec::repeat(false, N),
            claimed: 0,
        }
    }

    /// See [GpioHD44780Driver::with_busy_poll_limit]. Only matters with `rw_support`.
    pub fn with_busy_poll_limit(mut self, limit: Option<u32>) -> Self {
        self.busy_poll_limit = limit;
        self
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Number of live devices.
    pub fn len(&self) -> usize {
        self.live.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.live.not_any()
    }

    pub fn rw_support(&self) -> bool {
        self.rw_support
    }

    pub fn is_live(&self, handle: DeviceHandle) -> bool {
        self.live.get(handle.0).is_some_and(|bit| *bit)
    }

    fn parse_pins(
        &self,
        config: LcdConfig,
        control_pins: &[PinId],
        data_pins: &[PinId],
    ) -> Result<(ControlPins, DataPins), RegistryError> {
        let control_pins = match (self.rw_support, control_pins) {
            (false, &[rs, en]) => ControlPins { rs, en, rw: None },
            (true, &[rs, en, rw]) => ControlPins { rs, en, rw: Some(rw) },
            _ => return Err(RegistryError::InvalidPins),
        };

        let data_pins = match config.interface {
            InterfaceWidth::Bus4Bit => DataPins::Bus4Bit(data_pins.try_into().map_err(|_| RegistryError::InvalidPins)?),
            InterfaceWidth::Bus8Bit => DataPins::Bus8Bit(data_pins.try_into().map_err(|_| RegistryError::InvalidPins)?),
        };

        Ok((control_pins, data_pins))
    }

    fn claim_slot(&mut self) -> Option<usize> {
        if self.claimed < N {
            self.claimed += 1;
            return Some(self.claimed - 1);
        }
        self.live.first_zero()
    }

    /// Claims a slot, configures the pins and runs the initialization sequence.
    ///
    /// `control_pins` are RS, E and (with RW support) RW. `data_pins` are D4–D7 for the 4-bit
    /// interface, D0–D7 for the 8-bit one.
    ///
    /// # Errors
    /// - [RegistryError::InvalidPins] if either list is empty or has the wrong length. No slot is
    ///   claimed.
    /// - [RegistryError::Exhausted] if all `N` slots are live.
    /// - [RegistryError::Gpio] if the backend fails during initialization; the slot is released.
    pub fn create(
        &mut self,
        config: LcdConfig,
        control_pins: &[PinId],
        data_pins: &[PinId],
    ) -> Result<DeviceHandle, RegistryError> {
        let (control_pins, data_pins) = self.parse_pins(config, control_pins, data_pins)?;
        let index = self.claim_slot().ok_or(RegistryError::Exhausted)?;
        let handle = DeviceHandle(index);
        debug!("Claimed {} for {:?}", handle, config);

        let device = self.slots[index].insert(Device::new(control_pins, data_pins));
        let result = GpioHD44780Driver::new(self.gpio, self.delay, device)
            .with_busy_poll_limit(self.busy_poll_limit)
            .init(config);

        if let Err(err) = result {
            debug!("Releasing {} after failed init: {}", handle, err);
            return Err(err.into());
        }

        self.live.set(index, true);
        Ok(handle)
    }

    /// Releases the slot. Does nothing if the handle isn't live.
    ///
    /// The display itself is left as it is, still showing its last contents.
    pub fn destroy(&mut self, handle: DeviceHandle) {
        if self.is_live(handle) {
            debug!("Released {}", handle);
            self.live.set(handle.0, false);
        }
    }

    /// Gets a driver for a live device. The register state is kept in the registry, so drivers
    /// can be dropped and re-acquired freely.
    pub fn get(&mut self, handle: DeviceHandle) -> Option<GpioHD44780Driver<'_>> {
        if !self.is_live(handle) {
            return None;
        }
        let device = self.slots[handle.0].as_mut()?;
        Some(GpioHD44780Driver::new(self.gpio, self.delay, device).with_busy_poll_limit(self.busy_poll_limit))
    }

    /// The stored state of a live device.
    pub fn device(&self, handle: DeviceHandle) -> Option<&Device> {
        if !self.is_live(handle) {
            return None;
        }
        self.slots[handle.0].as_ref()
    }
}

impl<const N: usize> Debug for DeviceRegistry<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceRegistry({}/{} live, {:?})", self.len(), N, self.gpio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::DisplayExt;
    use crate::lcd::hd44780::driver::{Font, Lines};
    use crate::mock::{pair_nibbles, MockBusPins, MockDelay, MockGpioDriver};

    fn control(n: usize) -> [PinId; 2] {
        [PinId::new(n, 0), PinId::new(n, 1)]
    }

    fn data(n: usize) -> [PinId; 4] {
        [PinId::new(n, 4), PinId::new(n, 5), PinId::new(n, 6), PinId::new(n, 7)]
    }

    #[test]
    fn creation_beyond_capacity_fails() {
        let gpio = MockGpioDriver::new();
        let delay = MockDelay::new();
        let mut registry = DeviceRegistry::<2>::new(&gpio, &delay, false);
        let config = LcdConfig::default();

        let a = registry.create(config, &control(0), &data(0)).unwrap();
        let b = registry.create(config, &control(1), &data(1)).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.create(config, &control(2), &data(2)), Err(RegistryError::Exhausted));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn destroyed_slot_is_reused() {
        let gpio = MockGpioDriver::new();
        let delay = MockDelay::new();
        let mut registry = DeviceRegistry::<2>::new(&gpio, &delay, false);
        let config = LcdConfig::default();

        let a = registry.create(config, &control(0), &data(0)).unwrap();
        let _b = registry.create(config, &control(1), &data(1)).unwrap();
        registry.destroy(a);
        assert!(!registry.is_live(a));
        assert!(registry.get(a).is_none());

        let c = registry.create(config, &control(2), &data(2)).unwrap();
        assert_eq!(c, a);
        assert_eq!(registry.device(c).map(|d| d.control_pins().rs), Some(PinId::new(2, 0)));
    }

    #[test]
    fn destroy_is_idempotent() {
        let gpio = MockGpioDriver::new();
        let delay = MockDelay::new();
        let mut registry = DeviceRegistry::<1>::new(&gpio, &delay, false);

        let a = registry.create(LcdConfig::default(), &control(0), &data(0)).unwrap();
        registry.destroy(a);
        registry.destroy(a);
        registry.destroy(DeviceHandle(7));
        assert!(registry.is_empty());
    }

    #[test]
    fn invalid_pins_claim_no_slot() {
        let gpio = MockGpioDriver::new();
        let delay = MockDelay::new();
        let mut registry = DeviceRegistry::<1>::new(&gpio, &delay, false);
        let config = LcdConfig::default();

        assert_eq!(registry.create(config, &[], &data(0)), Err(RegistryError::InvalidPins));
        assert_eq!(registry.create(config, &control(0), &[]), Err(RegistryError::InvalidPins));
        // RW given but not supported by this registry
        let with_rw = [PinId::new(0, 0), PinId::new(0, 1), PinId::new(0, 2)];
        assert_eq!(registry.create(config, &with_rw, &data(0)), Err(RegistryError::InvalidPins));
        // 4 data pins for an 8-bit interface
        let config_8bit = LcdConfig::new(InterfaceWidth::Bus8Bit, Lines::Two, Font::Dots5x8);
        assert_eq!(registry.create(config_8bit, &control(0), &data(0)), Err(RegistryError::InvalidPins));
        assert!(gpio.events().is_empty());

        assert!(registry.create(config, &control(0), &data(0)).is_ok());
    }

    #[test]
    fn rw_support_requires_three_control_pins() {
        let gpio = MockGpioDriver::new();
        let delay = MockDelay::new();
        let mut registry = DeviceRegistry::<1>::new(&gpio, &delay, true);
        let config = LcdConfig::default();

        assert_eq!(registry.create(config, &control(0), &data(0)), Err(RegistryError::InvalidPins));
        let with_rw = [PinId::new(0, 0), PinId::new(0, 1), PinId::new(0, 2)];
        let handle = registry.create(config, &with_rw, &data(0)).unwrap();
        assert!(registry.device(handle).is_some_and(|d| d.uses_busy_flag()));
    }

    #[test]
    fn failed_init_releases_slot() {
        let gpio = MockGpioDriver::new();
        let delay = MockDelay::new();
        let mut registry = DeviceRegistry::<1>::new(&gpio, &delay, true).with_busy_poll_limit(Some(2));
        let with_rw = [PinId::new(0, 0), PinId::new(0, 1), PinId::new(0, 2)];
        let config = LcdConfig::default();

        // Busy flag stuck high during the first function set
        gpio.script_reads([true; 2]);
        assert_eq!(
            registry.create(config, &with_rw, &data(0)),
            Err(RegistryError::Gpio(GpioError::Timeout))
        );
        assert!(registry.is_empty());

        assert!(registry.create(config, &with_rw, &data(0)).is_ok());
    }

    #[test]
    fn recreated_device_starts_from_default_registers() {
        let gpio = MockGpioDriver::new();
        let delay = MockDelay::new();
        let mut registry = DeviceRegistry::<1>::new(&gpio, &delay, false);
        let config = LcdConfig::default();

        let a = registry.create(config, &control(0), &data(0)).unwrap();
        if let Some(mut lcd) = registry.get(a) {
            lcd.set_cursor_blink(true).unwrap();
        }
        assert_eq!(registry.device(a).map(|d| d.control().command()), Some(0x0D));
        registry.destroy(a);

        let b = registry.create(config, &control(0), &data(0)).unwrap();
        assert_eq!(registry.device(b).map(|d| d.control().command()), Some(0x0C));
    }

    #[test]
    fn register_state_survives_between_drivers() {
        let gpio = MockGpioDriver::new();
        let delay = MockDelay::new();
        let mut registry = DeviceRegistry::<1>::new(&gpio, &delay, false);

        let handle = registry.create(LcdConfig::default(), &control(0), &data(0)).unwrap();
        if let Some(mut lcd) = registry.get(handle) {
            lcd.set_cursor_visible(true).unwrap();
        }
        gpio.clear_events();
        if let Some(mut lcd) = registry.get(handle) {
            lcd.set_cursor_blink(true).unwrap();
            lcd.print_int(-5).unwrap();
        }

        let device = registry.device(handle).unwrap();
        let latches = pair_nibbles(&gpio.latches(MockBusPins::from(device)));
        let values: Vec<_> = latches.iter().map(|l| l.value).collect();
        assert_eq!(values, vec![0x0F, b'-', b'5']);
    }
}
