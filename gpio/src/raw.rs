//! Memory-mapped GPIO backend for the Raspberry Pi (BCM283x / BCM2711).
//!
//! The register block is mapped through `/dev/gpiomem` (no root required) or `/dev/mem`.
//! The SoC has a single GPIO bank, so only port `0` is valid.
use crate::{GpioDirection, GpioDriver, GpioError, GpioResult, PinId};
use log::trace;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;

pub struct RawGpioDriver {
    mmap: MmapRaw,
}

impl RawGpioDriver {
    /// Physical address of the GPIO block on the BCM2837 (Pi 3).
    pub const BCM2837_GPIO_BASE: u64 = 0x3F20_0000;
    /// Physical address of the GPIO block on the BCM2711 (Pi 4).
    pub const BCM2711_GPIO_BASE: u64 = 0xFE20_0000;

    const PIN_COUNT: usize = 58;

    const FUNCTION_INPUT: u32 = 0b000;
    const FUNCTION_OUTPUT: u32 = 0b001;

    fn create(path: &str, offset: u64) -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
                .offset(offset)
                .len(4096)
                .map_raw(&file)?;

        Ok(RawGpioDriver { mmap })
    }

    /// `/dev/gpiomem` already starts at the GPIO register block.
    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0)
    }

    /// Maps `/dev/mem` at `base`, e.g. [Self::BCM2711_GPIO_BASE]. Needs root.
    pub fn new_mem(base: u64) -> GpioResult<Self> {
        Self::create("/dev/mem", base)
    }

    fn pin_index(pin: PinId) -> GpioResult<usize> {
        if pin.port != 0 || pin.pin >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }
        Ok(pin.pin)
    }

    pub fn raw_get_pin_function(&self, pin_index: usize) -> GpioResult<u32> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_ptr() as *const u32;
        // GPFSELn register
        let register_ptr = unsafe { mmap.add(pin_index / 10) };
        let shift = (pin_index % 10) * 3;

        let register_value = unsafe { register_ptr.read_volatile() };
        Ok((register_value >> shift) & 0b111)
    }

    pub fn raw_set_pin_function(&self, pin_index: usize, function: u32) -> GpioResult<()> {
        if function > 0b111 || pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // GPFSELn register
        let register_ptr = unsafe { mmap.add(pin_index / 10) };
        let shift = (pin_index % 10) * 3;

        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !(0b111 << shift);
        register_value |= function << shift;
        unsafe { register_ptr.write_volatile(register_value) };

        Ok(())
    }

    fn raw_set_pin_output(&self, pin_index: usize, high: bool) {
        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // GPSETn/GPCLRn register
        let register_ptr = unsafe { mmap.add(if high { 0x1c / 4 } else { 0x28 / 4 } + pin_index / 32) };
        let shift = pin_index % 32;

        unsafe { register_ptr.write_volatile(1 << shift) };
    }

    fn raw_get_pin_level(&self, pin_index: usize) -> bool {
        let mmap = self.mmap.as_ptr() as *const u32;
        // GPLEVn register
        let register_ptr = unsafe { mmap.add((0x34 / 4) + pin_index / 32) };
        let shift = pin_index % 32;

        let register_value = unsafe { register_ptr.read_volatile() };
        (register_value >> shift) & 1 != 0
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for RawGpioDriver {
    fn set_direction(&self, pin: PinId, direction: GpioDirection) -> GpioResult<()> {
        let index = Self::pin_index(pin)?;
        trace!("Set pin {} direction: {:?}", pin, direction);
        let function = match direction {
            GpioDirection::Input => Self::FUNCTION_INPUT,
            GpioDirection::Output => Self::FUNCTION_OUTPUT,
        };
        self.raw_set_pin_function(index, function)
    }

    fn write(&self, pin: PinId, value: bool) -> GpioResult<()> {
        let index = Self::pin_index(pin)?;
        if self.raw_get_pin_function(index)? != Self::FUNCTION_OUTPUT {
            return Err(GpioError::InvalidArgument);
        }
        self.raw_set_pin_output(index, value);
        Ok(())
    }

    fn read(&self, pin: PinId) -> GpioResult<bool> {
        let index = Self::pin_index(pin)?;
        Ok(self.raw_get_pin_level(index))
    }
}
