//! One-shot door commands: status, open, close, battery.

use garagelink_api::DoorAction;
use garagelink_core::{BatteryReading, battery_percent, normalize};

use crate::cli::{DoorArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn status(args: DoorArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load_config(global)?;
    let door = cfg.door(args.door.as_deref())?;
    let (client, credentials) = super::connect(&cfg)?;

    let payload = client.status(&credentials, door.address).await?;
    let color = output::should_color(global.color);
    println!("{}: {}", door.name, output::door_state(normalize(&payload), color));
    if args.raw {
        println!("{}", output::raw(&payload)?);
    }
    Ok(())
}

pub async fn actuate(action: DoorAction, args: DoorArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load_config(global)?;
    let door = cfg.door(args.door.as_deref())?;
    let (client, credentials) = super::connect(&cfg)?;

    let payload = client.call(&credentials, door.address, action).await?;
    println!("{}: {action} requested", door.name);
    if args.raw {
        println!("{}", output::raw(&payload)?);
    }
    Ok(())
}

pub async fn battery(args: DoorArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load_config(global)?;
    let door = cfg.door(args.door.as_deref())?;
    let (client, credentials) = super::connect(&cfg)?;

    let payload = client.battery(&credentials, door.address).await?;
    let reading = BatteryReading::classify(battery_percent(&payload), cfg.battery_low_level);
    let color = output::should_color(global.color);
    println!("{}: battery {}", door.name, output::battery(reading, color));
    if args.raw {
        println!("{}", output::raw(&payload)?);
    }
    Ok(())
}
