use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("flux {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: flux");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("FLUX_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("FLUX_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("default_device: {}", flux_transport::DEFAULT_DEVICE);
    println!("default_baud: {}", flux_transport::DEFAULT_BAUD_RATE);
    match flux_transport::available_devices() {
        Ok(devices) if devices.is_empty() => println!("serial_devices: none"),
        Ok(devices) => println!("serial_devices: {}", devices.join(", ")),
        Err(err) => println!("serial_devices: unavailable ({err})"),
    }

    Ok(SUCCESS)
}
