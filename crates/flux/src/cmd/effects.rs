use crate::cmd::{catalog, EffectsArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_effects, OutputFormat};

pub fn run(_args: EffectsArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = catalog()?;
    print_effects(&registry.descriptors(), format);
    Ok(SUCCESS)
}
