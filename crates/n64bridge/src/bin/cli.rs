use anyhow::Result;
use clap::Parser;
use n64bridge::{
    AccessTier, Args, Command, ControllerInjector, ControllerState, DiscoveryError,
    ForeignProcess, InputLocator, RamLocator, RamView, Width, open_target,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How a subcommand ended, for the exit code
enum Outcome {
    Done,
    NotFound,
}

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let process = match open_target(&args.target) {
        Ok(process) => Arc::new(process),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    };

    let exit_code = match run(&args, &process) {
        Ok(Outcome::Done) => 0,
        Ok(Outcome::NotFound) => 1,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    process.disconnect();
    std::process::exit(exit_code);
}

fn run(args: &Args, process: &Arc<ForeignProcess>) -> Result<Outcome> {
    match &args.command {
        Command::Regions { writable } => {
            for region in process.regions()? {
                if *writable && !region.is_writable() {
                    continue;
                }
                println!(
                    "{:#014x}-{:#014x} {:>10} {:?} {}",
                    region.base,
                    region.end(),
                    region.size,
                    region.protection,
                    region.name.as_deref().unwrap_or("")
                );
            }
            Ok(Outcome::Done)
        }

        Command::Locate => {
            let Some(found) = optional(RamLocator::new(args.to_locator_config()).locate(process))?
            else {
                eprintln!("RDRAM not found");
                return Ok(Outcome::NotFound);
            };
            println!("{:#x} ({:?})", found.base, found.method);
            Ok(Outcome::Done)
        }

        Command::Peek {
            address,
            width,
            snapshot,
        } => {
            let Some(found) = optional(RamLocator::new(args.to_locator_config()).locate(process))?
            else {
                eprintln!("RDRAM not found");
                return Ok(Outcome::NotFound);
            };
            let tier = if *snapshot {
                AccessTier::per_frame()
            } else {
                AccessTier::Direct
            };
            let ram = tier.open(Arc::clone(process), found.base)?;
            let address = *address as u32;
            match width {
                Width::Byte => println!("{:#04x}", ram.read8(address)?),
                Width::Half => println!("{:#06x}", ram.read16(address)?),
                Width::Word => println!("{:#010x}", ram.read32(address)?),
                Width::Float => println!("{}", ram.read_f32(address)?),
            }
            Ok(Outcome::Done)
        }

        Command::DiscoverInput { .. } => {
            info!("Press and hold any button on the emulator's controller");
            let locator = InputLocator::new(args.to_discovery_config());
            let Some(found) = optional(locator.locate(process))? else {
                eprintln!("Controller state not found");
                return Ok(Outcome::NotFound);
            };
            println!("{:#x} ({:?})", found.base, found.method);
            Ok(Outcome::Done)
        }

        Command::Inject {
            player,
            press,
            x,
            y,
            hold_ms,
            base,
        } => {
            let Some(base) = input_base(args, process, *base)? else {
                return Ok(Outcome::NotFound);
            };
            let mut injector = ControllerInjector::new(base);
            let buttons = press.iter().copied().collect();
            injector.set_buttons(process, *player, buttons)?;
            injector.set_analog_stick(process, *player, *x, *y)?;
            let state = injector.state(*player).unwrap_or_default();
            info!("Player {} <- {:?}", player, state);
            println!("{}", format_state(&state));

            if let Some(ms) = hold_ms {
                std::thread::sleep(Duration::from_millis(*ms));
                injector.release_all(process)?;
            }
            Ok(Outcome::Done)
        }

        Command::Release { base } => {
            let Some(base) = input_base(args, process, *base)? else {
                return Ok(Outcome::NotFound);
            };
            ControllerInjector::new(base).release_all(process)?;
            Ok(Outcome::Done)
        }
    }
}

/// Turn `NotFound` into `None` and keep real errors
fn optional<T>(result: Result<T, DiscoveryError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DiscoveryError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn input_base(args: &Args, process: &ForeignProcess, base: Option<u64>) -> Result<Option<u64>> {
    if base.is_some() {
        return Ok(base);
    }
    let found = optional(InputLocator::new(args.to_discovery_config()).locate(process))?;
    if found.is_none() {
        eprintln!("Controller state not found; pass --base to skip discovery");
    }
    Ok(found.map(|found| found.base))
}

fn format_state(state: &ControllerState) -> String {
    format!(
        "buttons={:?} x={} y={} bytes={:02X?}",
        state.buttons,
        state.x(),
        state.y(),
        state.to_bytes()
    )
}
