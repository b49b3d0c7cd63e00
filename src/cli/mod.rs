use std::str::FromStr;

use anyhow::anyhow;
use burn::backend::Autodiff;
use log::LevelFilter;
use pico_args::Arguments;

/// The backend used by the command line tools
#[cfg(not(feature = "tch"))]
pub type Backend = burn::backend::NdArray;

/// The backend used by the command line tools
#[cfg(feature = "tch")]
pub type Backend = burn::backend::LibTorch;

/// The backend used for training
pub type TrainingBackend = Autodiff<Backend>;

/// The default device of [`Backend`]
pub fn device() -> <Backend as burn::tensor::backend::Backend>::Device {
    Default::default()
}

/// Initialize logging at info level, or debug level when `verbose` is set. `RUST_LOG` still
/// applies on top.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    pretty_env_logger::formatted_builder()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Take the next positional argument, naming it when it is missing
pub fn required<T>(pargs: &mut Arguments, name: &str) -> anyhow::Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    pargs.free_from_str().map_err(|e| match e {
        pico_args::Error::MissingArgument => anyhow!("Missing required argument: {}", name),
        _ => anyhow!("{}", e),
    })
}
