mod config;

use crate::config::{Backend, Config};
use dotenv::dotenv;
use hdlcd_gpio::gpiod::GpiodDriver;
use hdlcd_gpio::lcd::hd44780::DisplayExt;
use hdlcd_gpio::lcd::hd44780::driver::{CursorDirection, HD44780Driver};
use hdlcd_gpio::lcd::hd44780::registry::DeviceRegistry;
use hdlcd_gpio::mock::MockGpioDriver;
use hdlcd_gpio::raw::RawGpioDriver;
use hdlcd_gpio::{GpioDriver, ThreadDelay};
use log::{debug, info};
use std::thread::sleep;
use std::time::Duration;
use sysinfo::System;

/// Upper bound on displays driven at once.
const MAX_DEVICES: usize = 4;

const BELL: [u8; 8] = [0x04, 0x0E, 0x0E, 0x0E, 0x1F, 0x00, 0x04, 0x00];

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!("Architecture {}", System::cpu_arch());

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using environment");
        Config::from_env()?
    };
    debug!("{:?}", config);

    let lcd_config = config.lcd_config()?;
    let control_pins = config.control_pins();
    let data_pins = config.data_pins();
    info!("LCD {:?} @ Control: {:?}, Data: {:?}", lcd_config, control_pins, data_pins);

    debug!("Initializing GPIO driver...");
    let gpio: Box<dyn GpioDriver> = match config.backend {
        Backend::Raw => match config.raw_base {
            Some(base) => Box::new(RawGpioDriver::new_mem(base)?),
            None => Box::new(RawGpioDriver::new_gpiomem()?),
        },
        Backend::Gpiod => Box::new(GpiodDriver::open(&config.chips)?),
        Backend::Mock => Box::new(MockGpioDriver::new()),
    };
    debug!("{:?} initialized.", gpio);

    let delay = ThreadDelay;
    let mut registry = DeviceRegistry::<MAX_DEVICES>::new(&*gpio, &delay, config.pin_rw.is_some())
        .with_busy_poll_limit(config.busy_poll_limit);

    debug!("Busy flag polling: {}", registry.rw_support());

    debug!("Initializing LCD driver...");
    let handle = registry.create(lcd_config, &control_pins, &data_pins)?;
    info!("{} initialized ({}/{} slots).", handle, registry.len(), registry.capacity());

    let mut lcd = registry
        .get(handle)
        .ok_or_else(|| eyre::eyre!("{} is not live", handle))?;

    lcd.create_char(0, &BELL)?;
    lcd.clear_display()?;
    lcd.print_at(0, 0, "HD44780 ")?;
    lcd.print_char(0)?;
    lcd.set_cursor(1, 0)?;
    lcd.print("v.")?;
    lcd.print(env!("CARGO_PKG_VERSION"))?;

    sleep(Duration::from_secs(1));

    lcd.set_cursor_visible(true)?;
    lcd.set_cursor_blink(true)?;
    for tick in 0..config.ticks {
        lcd.print_at(1, 0, "        ")?;
        lcd.set_cursor(1, 0)?;
        lcd.print_int(tick as i32 - (config.ticks / 2) as i32)?;
        sleep(Duration::from_millis(250));
    }
    lcd.set_cursor_blink(false)?;
    lcd.set_cursor_visible(false)?;

    info!("Scrolling...");
    for _ in 0..4 {
        lcd.scroll_display(CursorDirection::Left)?;
        sleep(Duration::from_millis(200));
    }
    for _ in 0..4 {
        lcd.scroll_display(CursorDirection::Right)?;
        sleep(Duration::from_millis(200));
    }

    lcd.clear_display()?;
    lcd.set_text_direction(CursorDirection::Left)?;
    lcd.set_cursor(0, 15)?;
    lcd.print("olleh")?;
    lcd.set_text_direction(CursorDirection::Right)?;

    lcd.set_cursor(1, 16)?;
    lcd.set_autoscroll(true)?;
    lcd.print("...")?;
    lcd.set_autoscroll(false)?;

    lcd.set_display_on(false)?;
    sleep(Duration::from_millis(500));
    lcd.set_display_on(true)?;
    lcd.return_home()?;
    drop(lcd);

    registry.destroy(handle);
    info!("{} released.", handle);

    Ok(())
}
