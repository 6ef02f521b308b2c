use crate::controller::Buttons;
use crate::foreign::{ForeignProcess, ImageProcess};
use crate::input::DiscoveryConfig;
use crate::locator::LocatorConfig;
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug, Clone)]
#[command(name = "n64bridge", about = "Inspect and drive a running N64 emulator")]
pub struct Args {
    #[command(flatten)]
    pub target: Target,

    /// Smallest region considered as RDRAM (hex: 0x400000 or decimal)
    #[arg(long, value_parser = parse_hex_or_dec, global = true)]
    pub ram_size_min: Option<u64>,

    /// Largest region considered as RDRAM (hex: 0x800000 or decimal)
    #[arg(long, value_parser = parse_hex_or_dec, global = true)]
    pub ram_size_max: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Which process to work on
#[derive(ClapArgs, Debug, Clone)]
pub struct Target {
    /// Attach to a running emulator by process id
    #[arg(long, conflicts_with = "dump")]
    pub pid: Option<u32>,

    /// Work on a raw memory dump instead of a live process
    #[arg(long)]
    pub dump: Option<PathBuf>,

    /// Address the dump was taken from (hex: 0x1000 or decimal)
    #[arg(long, value_parser = parse_hex_or_dec)]
    pub dump_base: Option<u64>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the target's memory regions
    Regions {
        /// Only show writable regions
        #[arg(long)]
        writable: bool,
    },

    /// Find RDRAM in the target
    Locate,

    /// Read a value from console memory
    Peek {
        /// Console address (hex: 0x80000400 or decimal)
        #[arg(value_parser = parse_hex_or_dec)]
        address: u64,

        #[arg(long, value_enum, default_value_t = Width::Word)]
        width: Width,

        /// Read through a periodic full-RDRAM snapshot instead of direct reads
        #[arg(long)]
        snapshot: bool,
    },

    /// Find the controller-state structure
    DiscoverInput {
        /// Time between the two differential captures, in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Write controller state into the target
    Inject {
        /// Controller port, 0-3
        #[arg(long, default_value_t = 0)]
        player: usize,

        /// Buttons to hold, comma separated (A,B,Z,START,D_UP,...,C_RIGHT,L,R)
        #[arg(long, value_delimiter = ',', value_parser = parse_button)]
        press: Vec<Buttons>,

        /// Analog X, clamped to [-127, 127]
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        x: i32,

        /// Analog Y, clamped to [-127, 127]
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        y: i32,

        /// Hold the input this long, then release everything
        #[arg(long)]
        hold_ms: Option<u64>,

        /// Controller-state address, skipping discovery
        #[arg(long, value_parser = parse_hex_or_dec)]
        base: Option<u64>,
    },

    /// Zero every controller slot
    Release {
        /// Controller-state address, skipping discovery
        #[arg(long, value_parser = parse_hex_or_dec)]
        base: Option<u64>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Half,
    Word,
    Float,
}

impl Args {
    /// Validate that the arguments are consistent
    pub fn validate(&self) -> Result<(), String> {
        if self.target.pid.is_none() && self.target.dump.is_none() {
            return Err("one of --pid or --dump is required".to_string());
        }
        if self.target.dump_base.is_some() && self.target.dump.is_none() {
            return Err("--dump-base only applies with --dump".to_string());
        }
        if let (Some(min), Some(max)) = (self.ram_size_min, self.ram_size_max) {
            if min > max {
                return Err("--ram-size-min is larger than --ram-size-max".to_string());
            }
        }
        if let Command::Peek { address, .. } = &self.command {
            if *address > u32::MAX as u64 {
                return Err(format!("{address:#x} is not a 32-bit console address"));
            }
        }
        if let Command::Inject { player, .. } = &self.command {
            if *player >= n64bridge_hw::pif::CHANNELS {
                return Err(format!("--player {player} is not a controller port (0-3)"));
            }
        }
        Ok(())
    }

    /// Convert Args to LocatorConfig
    pub fn to_locator_config(&self) -> LocatorConfig {
        let defaults = LocatorConfig::default();
        LocatorConfig {
            ram_size_min: self.ram_size_min.unwrap_or(defaults.ram_size_min),
            ram_size_max: self.ram_size_max.unwrap_or(defaults.ram_size_max),
            ..defaults
        }
    }

    /// Convert Args to DiscoveryConfig
    pub fn to_discovery_config(&self) -> DiscoveryConfig {
        let mut config = DiscoveryConfig::default();
        if let Command::DiscoverInput {
            interval_ms: Some(ms),
        } = self.command
        {
            config.snapshot_interval = Duration::from_millis(ms);
        }
        config
    }
}

pub fn parse_hex_or_dec(s: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(&hex.replace('_', ""), 16)
    } else {
        s.parse()
    }
}

pub fn parse_button(s: &str) -> Result<Buttons, String> {
    Buttons::from_name(&s.trim().to_ascii_uppercase())
        .ok_or_else(|| format!("unknown button {s:?}"))
}

/// Attach to the process or load the dump named on the command line
pub fn open_target(target: &Target) -> Result<ForeignProcess> {
    if let Some(path) = &target.dump {
        let base = target.dump_base.unwrap_or(0);
        info!("Loading memory dump {:?} at {:#x}", path, base);
        let image = ImageProcess::from_dump(path, base)
            .with_context(|| format!("failed to read dump {}", path.display()))?;
        return Ok(ForeignProcess::from_backend(0, Box::new(image)));
    }

    let pid = target.pid.context("no target process given")?;
    ForeignProcess::connect(pid).with_context(|| format!("failed to attach to process {pid}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_and_decimal() {
        assert_eq!(parse_hex_or_dec("0x80000400"), Ok(0x8000_0400));
        assert_eq!(parse_hex_or_dec("0X8000_0400"), Ok(0x8000_0400));
        assert_eq!(parse_hex_or_dec("1024"), Ok(1024));
        assert!(parse_hex_or_dec("0xZZ").is_err());
    }

    #[test]
    fn inject_parses_button_list() {
        let args = Args::try_parse_from([
            "n64bridge", "--pid", "1234", "inject", "--player", "1", "--press", "a,Start",
            "--x", "-40", "--hold-ms", "100",
        ])
        .unwrap();
        assert!(args.validate().is_ok());
        match args.command {
            Command::Inject {
                player, press, x, y, hold_ms, base,
            } => {
                assert_eq!(player, 1);
                assert_eq!(press, vec![Buttons::A, Buttons::START]);
                assert_eq!((x, y), (-40, 0));
                assert_eq!(hold_ms, Some(100));
                assert_eq!(base, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn target_is_required_and_exclusive() {
        let args = Args::try_parse_from(["n64bridge", "locate"]).unwrap();
        assert!(args.validate().is_err());
        assert!(
            Args::try_parse_from(["n64bridge", "--pid", "1", "--dump", "x.bin", "locate"]).is_err()
        );
    }

    #[test]
    fn dump_base_needs_a_dump() {
        let args = Args::try_parse_from(["n64bridge", "--pid", "1", "--dump-base", "0", "locate"])
            .unwrap();
        assert!(args.validate().is_err());

        let args = Args::try_parse_from([
            "n64bridge", "--dump", "x.bin", "--dump-base", "0x1000", "locate",
        ])
        .unwrap();
        assert!(args.validate().is_ok());
        assert_eq!(args.target.dump_base, Some(0x1000));
    }

    #[test]
    fn configs_take_overrides() {
        let args = Args::try_parse_from([
            "n64bridge", "--dump", "ram.bin", "--ram-size-min", "0x200000",
            "discover-input", "--interval-ms", "250",
        ])
        .unwrap();
        assert_eq!(args.to_locator_config().ram_size_min, 0x20_0000);
        assert_eq!(
            args.to_locator_config().ram_size_max,
            LocatorConfig::default().ram_size_max
        );
        assert_eq!(
            args.to_discovery_config().snapshot_interval,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn peek_rejects_wide_addresses() {
        let args =
            Args::try_parse_from(["n64bridge", "--pid", "1", "peek", "0x1_0000_0000"]).unwrap();
        assert!(args.validate().is_err());
    }
}
