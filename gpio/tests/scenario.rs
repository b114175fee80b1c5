use hdlcd_gpio::PinId;
use hdlcd_gpio::lcd::hd44780::DisplayExt;
use hdlcd_gpio::lcd::hd44780::driver::{Font, HD44780Driver, InterfaceWidth, LcdConfig, Lines};
use hdlcd_gpio::lcd::hd44780::registry::DeviceRegistry;
use hdlcd_gpio::mock::{pair_nibbles, Latch, MockBusPins, MockDelay, MockGpioDriver};

const CONTROL: [PinId; 2] = [PinId::new(0, 22), PinId::new(0, 17)];
const DATA: [PinId; 4] = [PinId::new(0, 26), PinId::new(0, 16), PinId::new(0, 20), PinId::new(0, 21)];

fn command(value: u8) -> Latch {
    Latch { rs: false, value }
}

fn data(value: u8) -> Latch {
    Latch { rs: true, value }
}

#[test]
fn clear_move_and_print_on_4bit_two_line_display() {
    let gpio = MockGpioDriver::new();
    let delay = MockDelay::new();
    let mut registry = DeviceRegistry::<1>::new(&gpio, &delay, false);
    let config = LcdConfig::new(InterfaceWidth::Bus4Bit, Lines::Two, Font::Dots5x8);

    let handle = registry.create(config, &CONTROL, &DATA).unwrap();
    {
        let mut lcd = registry.get(handle).unwrap();
        lcd.clear_display().unwrap();
        lcd.set_cursor(1, 3).unwrap();
        lcd.print("hi").unwrap();
    }

    let device = registry.device(handle).unwrap();
    let latches = gpio.latches(MockBusPins::from(device));

    // Reset nibbles are sent on their own
    assert_eq!(latches[..4], [command(0x03), command(0x03), command(0x03), command(0x02)]);
    assert_eq!(
        pair_nibbles(&latches[4..]),
        vec![
            // Function set, display on, clear, entry mode
            command(0x28),
            command(0x0C),
            command(0x01),
            command(0x06),
            // Caller's operations
            command(0x01),
            command(0xC3),
            data(b'h'),
            data(b'i'),
        ]
    );
}

#[test]
fn eight_bit_display_with_busy_flag() {
    let gpio = MockGpioDriver::new();
    let delay = MockDelay::new();
    let mut registry = DeviceRegistry::<2>::new(&gpio, &delay, true);
    let config = LcdConfig::new(InterfaceWidth::Bus8Bit, Lines::One, Font::Dots5x10);
    let control = [PinId::new(0, 1), PinId::new(0, 2), PinId::new(0, 3)];
    let data_pins: Vec<_> = (0..8).map(|pin| PinId::new(1, pin)).collect();

    let handle = registry.create(config, &control, &data_pins).unwrap();
    gpio.clear_events();
    gpio.script_reads([true, false]);
    {
        let mut lcd = registry.get(handle).unwrap();
        lcd.create_char(1, &[0x1F; 8]).unwrap();
        lcd.set_cursor(0, 0).unwrap();
        lcd.print_char(1).unwrap();
        lcd.print_int(-120).unwrap();
    }

    let device = registry.device(handle).unwrap();
    let latches = gpio.latches(MockBusPins::from(device));
    let mut expected = vec![command(0x48)];
    expected.extend([data(0x1F); 8]);
    expected.extend([command(0x80), data(1), data(b'-'), data(b'1'), data(b'2'), data(b'0')]);
    assert_eq!(latches, expected);
}
