use dotenv::var;
use eyre::{bail, eyre};
use hdlcd_gpio::PinId;
use hdlcd_gpio::lcd::hd44780::driver::{Font, InterfaceWidth, LcdConfig, Lines};
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Memory-mapped BCM registers through `/dev/gpiomem`, or `/dev/mem` with `raw_base`.
    Raw,
    /// Linux GPIO character devices.
    Gpiod,
    /// Records everything, touches nothing.
    Mock,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub struct PinSpec {
    #[serde(default)]
    pub port: usize,
    pub pin: usize,
}

impl From<PinSpec> for PinId {
    fn from(spec: PinSpec) -> Self {
        PinId::new(spec.port, spec.pin)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    /// Physical GPIO base to map from `/dev/mem` for the raw backend. `/dev/gpiomem` if unset.
    pub raw_base: Option<u64>,
    /// Chip paths for the gpiod backend, indexed by pin port.
    pub chips: Vec<String>,
    /// `4` or `8`.
    pub interface: u8,
    /// `1` or `2`.
    pub lines: u8,
    /// `5x8` or `5x10`.
    pub font: String,
    pub pin_rs: PinSpec,
    pub pin_en: PinSpec,
    pub pin_rw: Option<PinSpec>,
    pub pins_data: Vec<PinSpec>,
    pub busy_poll_limit: Option<u32>,
    /// How many counter updates to show before shutting down.
    pub ticks: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: Backend::Mock,
            raw_base: None,
            chips: vec!["/dev/gpiochip0".to_string()],
            interface: 4,
            lines: 2,
            font: "5x8".to_string(),
            pin_rs: PinSpec { port: 0, pin: 22 },
            pin_en: PinSpec { port: 0, pin: 17 },
            pin_rw: None,
            pins_data: [26, 16, 20, 21]
                .into_iter()
                .map(|pin| PinSpec { port: 0, pin })
                .collect(),
            busy_poll_limit: None,
            ticks: 10,
        }
    }
}

impl Config {
    pub fn try_load() -> Option<Self> {
        let config_str = var_os("HDLCD_CONFIG");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("hdlcd.json"));
        let config_path = Path::new(config_str);
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    /// Defaults, overridden by whichever `HDLCD_*` variables are set.
    pub fn from_env() -> eyre::Result<Self> {
        let mut config = Config::default();

        if let Ok(backend) = var("HDLCD_BACKEND") {
            config.backend = serde_json::from_value(serde_json::Value::String(backend.to_lowercase()))
                .map_err(|_| eyre!("Unknown backend {:?}", backend))?;
        }
        if let Ok(base) = var("HDLCD_RAW_BASE") {
            config.raw_base = Some(parse_address(&base)?);
        }
        if let Ok(chips) = var("HDLCD_CHIPS") {
            config.chips = split_list(&chips).map(str::to_string).collect();
        }
        if let Ok(interface) = var("HDLCD_INTERFACE") {
            config.interface = interface.trim().parse()?;
        }
        if let Ok(lines) = var("HDLCD_LINES") {
            config.lines = lines.trim().parse()?;
        }
        if let Ok(font) = var("HDLCD_FONT") {
            config.font = font.trim().to_string();
        }
        if let Ok(pin) = var("HDLCD_PIN_RS") {
            config.pin_rs = parse_pin(&pin)?;
        }
        if let Ok(pin) = var("HDLCD_PIN_EN") {
            config.pin_en = parse_pin(&pin)?;
        }
        if let Ok(pin) = var("HDLCD_PIN_RW") {
            config.pin_rw = Some(parse_pin(&pin)?);
        }
        if let Ok(pins) = var("HDLCD_PINS_DATA") {
            config.pins_data = parse_pin_list(&pins)?;
        }
        if let Ok(limit) = var("HDLCD_BUSY_POLL_LIMIT") {
            config.busy_poll_limit = Some(limit.trim().parse()?);
        }
        if let Ok(ticks) = var("HDLCD_TICKS") {
            config.ticks = ticks.trim().parse()?;
        }

        Ok(config)
    }

    pub fn lcd_config(&self) -> eyre::Result<LcdConfig> {
        let interface = match self.interface {
            4 => InterfaceWidth::Bus4Bit,
            8 => InterfaceWidth::Bus8Bit,
            other => bail!("Invalid interface width {}", other),
        };
        let lines = match self.lines {
            1 => Lines::One,
            2 => Lines::Two,
            other => bail!("Invalid line count {}", other),
        };
        let font = match self.font.to_lowercase().as_str() {
            "5x8" => Font::Dots5x8,
            "5x10" => Font::Dots5x10,
            other => bail!("Invalid font {:?}", other),
        };
        Ok(LcdConfig::new(interface, lines, font))
    }

    /// RS, E and, if configured, RW.
    pub fn control_pins(&self) -> Vec<PinId> {
        [Some(self.pin_rs), Some(self.pin_en), self.pin_rw]
            .into_iter()
            .flatten()
            .map(PinId::from)
            .collect()
    }

    pub fn data_pins(&self) -> Vec<PinId> {
        self.pins_data.iter().copied().map(PinId::from).collect()
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Parses `port:pin`, or a bare `pin` on port 0.
pub fn parse_pin(pin_str: &str) -> eyre::Result<PinSpec> {
    let pin_str = pin_str.trim();
    match pin_str.split_once(':') {
        Some((port, pin)) => Ok(PinSpec {
            port: port.trim().parse()?,
            pin: pin.trim().parse()?,
        }),
        None => Ok(PinSpec {
            port: 0,
            pin: pin_str.parse()?,
        }),
    }
}

/// Parses a hex (`0x` prefix) or decimal address.
pub fn parse_address(address: &str) -> eyre::Result<u64> {
    let address = address.trim().replace('_', "");
    match address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) {
        Some(hex) => Ok(u64::from_str_radix(hex, 16)?),
        None => Ok(address.parse()?),
    }
}

pub fn parse_pin_list(list: &str) -> eyre::Result<Vec<PinSpec>> {
    split_list(list).map(parse_pin).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdlcd_gpio::raw::RawGpioDriver;

    #[test]
    fn parses_pins_with_and_without_port() {
        assert_eq!(parse_pin("17").unwrap(), PinSpec { port: 0, pin: 17 });
        assert_eq!(parse_pin(" 1:5 ").unwrap(), PinSpec { port: 1, pin: 5 });
        assert!(parse_pin("a:5").is_err());
        assert!(parse_pin("").is_err());
    }

    #[test]
    fn parses_pin_lists_with_mixed_separators() {
        let pins = parse_pin_list("26, 16;20  1:21").unwrap();
        let pins: Vec<PinId> = pins.into_iter().map(PinId::from).collect();
        assert_eq!(
            pins,
            vec![PinId::new(0, 26), PinId::new(0, 16), PinId::new(0, 20), PinId::new(1, 21)]
        );
    }

    #[test]
    fn parses_hex_and_decimal_addresses() {
        assert_eq!(parse_address("0xFE20_0000").unwrap(), RawGpioDriver::BCM2711_GPIO_BASE);
        assert_eq!(parse_address(" 0x3f200000 ").unwrap(), RawGpioDriver::BCM2837_GPIO_BASE);
        assert_eq!(parse_address("4096").unwrap(), 4096);
        assert!(parse_address("0xZZ").is_err());
    }

    #[test]
    fn default_config_is_a_valid_4bit_display() {
        let config = Config::default();
        assert_eq!(config.lcd_config().unwrap(), LcdConfig::default());
        assert_eq!(config.control_pins().len(), 2);
        assert_eq!(config.data_pins().len(), 4);
    }

    #[test]
    fn loads_partial_json() {
        let json = r#"{
            "backend": "gpiod",
            "interface": 8,
            "font": "5x10",
            "pin_rw": { "pin": 27 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.backend, Backend::Gpiod);
        assert_eq!(config.pin_rw, Some(PinSpec { port: 0, pin: 27 }));
        assert_eq!(config.control_pins()[2], PinId::new(0, 27));

        let lcd = config.lcd_config().unwrap();
        assert_eq!(lcd.interface, InterfaceWidth::Bus8Bit);
        assert_eq!(lcd.font, Font::Dots5x10);
        assert_eq!(lcd.lines, Lines::Two);
    }

    #[test]
    fn rejects_unknown_geometry() {
        let config = Config { interface: 6, ..Config::default() };
        assert!(config.lcd_config().is_err());
        let config = Config { font: "8x8".to_string(), ..Config::default() };
        assert!(config.lcd_config().is_err());
    }
}
