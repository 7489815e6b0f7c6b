//! Serves the cape picked in the Fishbattery launcher to the local player, on whichever revision
//! of the host game's API is loaded.
//!
//! The embedding layer describes the host's classes through [`host`], creates a runtime with
//! [`start`] and calls into the returned [`CapeRuntime`] from its hooks.

pub mod adapter;
pub mod asset;
pub mod host;
mod logging;
pub mod meta;
pub mod runtime;

pub use runtime::CapeRuntime;

use meta::settings::Settings;

/// Sets the bridge up with settings from the launcher's environment variables.
pub fn start(host: Box<dyn host::Host>) -> CapeRuntime {
    let settings = Settings::from_env();

    if let Some(log_path) = &settings.log_path {
        // Load the logging system before everything else so we can log from here on.
        if let Err(err) = logging::init(log_path) {
            eprintln!("Unable to start logging to {}: {err:?}", log_path.display());
        }
    }

    log::info!("Fishbattery cape bridge {}", env!("CARGO_PKG_VERSION"));

    if settings.cape_id.is_empty() {
        log::info!("No cape selected by the launcher");
    } else {
        log::info!("Launcher selected cape {:?} ({})", settings.cape_id, settings.tier());
    }

    CapeRuntime::new(host, settings)
}
