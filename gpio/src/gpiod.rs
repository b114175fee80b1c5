//! GpiodDriver implementation for driving GPIO lines through the Linux GPIO character device,
//! using the gpiod library.
//!
//! The port of a [PinId] selects the chip (in the order the chips were passed to
//! [GpiodDriver::new]) and the pin selects the line offset on that chip.
use crate::{GpioDirection, GpioDriver, GpioError, GpioResult, PinId};
use log::trace;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

enum GpiodLine {
    Input(gpiod::Lines<gpiod::Input>),
    Output(gpiod::Lines<gpiod::Output>),
}

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO lines.
///
/// Lines are requested lazily by [GpioDriver::set_direction]. Changing the direction of a line
/// releases the old request before issuing a new one.
pub struct GpiodDriver {
    chips: Vec<gpiod::Chip>,
    lines: RefCell<HashMap<PinId, GpiodLine>>,
}

impl GpiodDriver {
    pub fn new(chips: Vec<gpiod::Chip>) -> Self {
        Self {
            chips,
            lines: RefCell::new(HashMap::new()),
        }
    }

    /// Opens the chips at the given paths, e.g. `/dev/gpiochip0`.
    pub fn open<I, P>(paths: I) -> GpioResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<std::path::Path>,
    {
        let chips = paths
            .into_iter()
            .map(|path| gpiod::Chip::new(path.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(chips))
    }

    fn chip(&self, pin: PinId) -> GpioResult<&gpiod::Chip> {
        let chip = self.chips.get(pin.port).ok_or(GpioError::InvalidArgument)?;
        if pin.pin >= chip.num_lines() as usize {
            return Err(GpioError::InvalidArgument);
        }
        Ok(chip)
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.chips.iter().map(|chip| chip.name()).collect();
        write!(f, "GpiodDriver({:?})", names)
    }
}

impl GpioDriver for GpiodDriver {
    fn set_direction(&self, pin: PinId, direction: GpioDirection) -> GpioResult<()> {
        let chip = self.chip(pin)?;
        let offset = pin.pin as u32;
        let mut lines = self.lines.borrow_mut();

        // The kernel refuses a second request for a line that is still held
        lines.remove(&pin);

        trace!("Requesting line {} as {:?}", pin, direction);
        let line = match direction {
            GpioDirection::Input => GpiodLine::Input(chip.request_lines(
                gpiod::Options::input([offset]).consumer(env!("CARGO_PKG_NAME")),
            )?),
            GpioDirection::Output => GpiodLine::Output(chip.request_lines(
                gpiod::Options::output([offset]).consumer(env!("CARGO_PKG_NAME")),
            )?),
        };
        lines.insert(pin, line);
        Ok(())
    }

    fn write(&self, pin: PinId, value: bool) -> GpioResult<()> {
        match self.lines.borrow().get(&pin) {
            Some(GpiodLine::Output(line)) => {
                line.set_values([value])?;
                Ok(())
            }
            _ => Err(GpioError::InvalidArgument),
        }
    }

    fn read(&self, pin: PinId) -> GpioResult<bool> {
        match self.lines.borrow().get(&pin) {
            Some(GpiodLine::Input(line)) => {
                let values = line.get_values([false])?;
                Ok(values[0])
            }
            _ => Err(GpioError::InvalidArgument),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn open_accepts_any_path_like_and_reports_missing_chips() {
        assert!(GpiodDriver::open(["/nonexistent/gpiochip99"]).is_err());
        assert!(GpiodDriver::open(vec![String::from("/nonexistent/gpiochip99")]).is_err());
        assert!(GpiodDriver::open([PathBuf::from("/nonexistent/gpiochip99")]).is_err());
    }

    #[test]
    fn open_with_no_chips_rejects_every_pin() {
        let gpio = GpiodDriver::open(Vec::<&str>::new()).unwrap();
        assert_eq!(
            gpio.set_direction(PinId::new(0, 0), GpioDirection::Output),
            Err(GpioError::InvalidArgument)
        );
        assert_eq!(gpio.write(PinId::new(0, 0), true), Err(GpioError::InvalidArgument));
    }
}
