//! In-memory GPIO and delay backends that record every operation.
//!
//! Useful for dry runs without hardware, and for checking what a driver put on the wire:
//! [MockGpioDriver::latches] replays the recorded log and reports the state of the bus at
//! every enable strobe.
use crate::lcd::hd44780::driver::Device;
use crate::{Delay, GpioDirection, GpioDriver, GpioError, GpioResult, PinId};
use log::trace;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MockEvent {
    Direction(PinId, GpioDirection),
    Write(PinId, bool),
    Read(PinId, bool),
}

/// Bus state captured on a rising edge of the enable pin while RW is low.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Latch {
    /// Level of the RS pin: `false` for command, `true` for data.
    pub rs: bool,
    /// Data lines packed LSb first.
    pub value: u8,
}

/// Pins the decoder should watch. Mirrors the wiring handed to the LCD driver.
#[derive(Copy, Clone, Debug)]
pub struct MockBusPins<'a> {
    pub rs: PinId,
    pub en: PinId,
    pub rw: Option<PinId>,
    pub data: &'a [PinId],
}

impl<'a> From<&'a Device> for MockBusPins<'a> {
    fn from(device: &'a Device) -> Self {
        let control = device.control_pins();
        MockBusPins {
            rs: control.rs,
            en: control.en,
            rw: control.rw,
            data: device.data_pins().pins(),
        }
    }
}

/// Joins consecutive 4-bit latches into bytes, high nibble first.
/// A trailing unpaired nibble is dropped.
pub fn pair_nibbles(latches: &[Latch]) -> Vec<Latch> {
    latches
        .chunks_exact(2)
        .map(|pair| Latch {
            rs: pair[0].rs,
            value: (pair[0].value << 4) | (pair[1].value & 0x0F),
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct MockGpioDriver {
    events: RefCell<Vec<MockEvent>>,
    directions: RefCell<HashMap<PinId, GpioDirection>>,
    levels: RefCell<HashMap<PinId, bool>>,
    scripted_reads: RefCell<VecDeque<bool>>,
}

impl MockGpioDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues levels to be returned by subsequent reads, oldest first.
    /// Once the queue is empty, reads return `false`.
    pub fn script_reads(&self, values: impl IntoIterator<Item = bool>) {
        self.scripted_reads.borrow_mut().extend(values);
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn direction(&self, pin: PinId) -> Option<GpioDirection> {
        self.directions.borrow().get(&pin).copied()
    }

    pub fn level(&self, pin: PinId) -> Option<bool> {
        self.levels.borrow().get(&pin).copied()
    }

    /// Replays the log and returns the bus state at every enable rising edge.
    ///
    /// Strobes issued while RW is high are reads and are skipped.
    pub fn latches(&self, pins: MockBusPins<'_>) -> Vec<Latch> {
        let mut levels: HashMap<PinId, bool> = HashMap::new();
        let mut latches = Vec::new();

        for event in self.events.borrow().iter() {
            let MockEvent::Write(pin, value) = *event else {
                continue;
            };
            let was_high = levels.insert(pin, value).unwrap_or(false);

            if pin != pins.en || !value || was_high {
                continue;
            }
            let reading = pins.rw.is_some_and(|rw| levels.get(&rw).copied().unwrap_or(false));
            if reading {
                continue;
            }

            let value = pins.data
                .iter()
                .enumerate()
                .filter(|(_, pin)| levels.get(*pin).copied().unwrap_or(false))
                .fold(0u8, |acc, (i, _)| acc | (1 << i));
            latches.push(Latch {
                rs: levels.get(&pins.rs).copied().unwrap_or(false),
                value,
            });
        }

        latches
    }
}

impl GpioDriver for MockGpioDriver {
    fn set_direction(&self, pin: PinId, direction: GpioDirection) -> GpioResult<()> {
        trace!("mock: pin {} -> {:?}", pin, direction);
        self.directions.borrow_mut().insert(pin, direction);
        self.events.borrow_mut().push(MockEvent::Direction(pin, direction));
        Ok(())
    }

    fn write(&self, pin: PinId, value: bool) -> GpioResult<()> {
        if self.direction(pin) != Some(GpioDirection::Output) {
            return Err(GpioError::InvalidArgument);
        }
        trace!("mock: pin {} = {}", pin, value);
        self.levels.borrow_mut().insert(pin, value);
        self.events.borrow_mut().push(MockEvent::Write(pin, value));
        Ok(())
    }

    fn read(&self, pin: PinId) -> GpioResult<bool> {
        if self.direction(pin) != Some(GpioDirection::Input) {
            return Err(GpioError::InvalidArgument);
        }
        let value = self.scripted_reads.borrow_mut().pop_front().unwrap_or(false);
        trace!("mock: pin {} read {}", pin, value);
        self.events.borrow_mut().push(MockEvent::Read(pin, value));
        Ok(value)
    }
}

/// [Delay] that only records the requested durations.
#[derive(Debug, Default)]
pub struct MockDelay {
    delays: RefCell<Vec<u32>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<u32> {
        self.delays.borrow().clone()
    }

    pub fn total_us(&self) -> u64 {
        self.delays.borrow().iter().map(|&us| us as u64).sum()
    }

    pub fn clear(&self) {
        self.delays.borrow_mut().clear();
    }
}

impl Delay for MockDelay {
    fn delay_us(&self, us: u32) {
        self.delays.borrow_mut().push(us);
    }
}
