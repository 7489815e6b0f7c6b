//! Logging backend which writes to a file on a background thread.

use chrono::Local;
use eyre::Result;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::OnceCell;
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::{mpsc, Mutex},
};

/// Crates whose logging is too noisy to be useful.
const MUTED_MODULES: [&str; 3] = ["mio::", "hyper", "reqwest"];

struct Message {
    module: String,
    level: Level,
    string: String,
    time: String,
}

impl Message {
    fn write_to_file(&self, file: &mut File) {
        let level_name = match self.level {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug | Level::Trace => "debug",
        };

        //      [date time] [module] [level] Text
        let _ = writeln!(
            file,
            "[{}] [{}] [{}] {}",
            self.time, self.module, level_name, self.string
        );
    }
}

pub struct Logger;

impl Logger {
    pub fn commit(&self, record: &Record) {
        let module_path = match record.module_path() {
            Some(path) if MUTED_MODULES.iter().any(|muted| path.contains(muted)) => return,
            Some(path) => path,
            None => return,
        };

        let message = Message {
            module: module_path
                .split("::")
                .last()
                .unwrap_or("unknown")
                .to_string(),
            level: record.level(),
            string: format!("{}", record.args()),
            time: Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        };

        if let Some(Ok(sender)) = MSG_SENDER.get().map(Mutex::lock) {
            // The writer thread only goes away with the process.
            let _ = sender.send(message);
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.commit(record);
        }
    }

    fn flush(&self) {}
}

static LOGGER: Logger = Logger;
static MSG_SENDER: OnceCell<Mutex<mpsc::Sender<Message>>> = OnceCell::new();

/// Where the crash report for a log at `log_path` goes.
fn crash_path(log_path: &Path) -> PathBuf {
    log_path.with_extension("crash.txt")
}

fn install_panic_hook(crash_path: PathBuf) {
    std::panic::set_hook(Box::new(move |info| {
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "no message".to_string());

        let location = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "unknown".to_string());

        let backtrace = std::backtrace::Backtrace::force_capture();

        let info_dump = format!(
            "The Fishbattery cape bridge crashed.

Message: {message}
Location: {location}
Time: {}
Version: {}

{backtrace}",
            Local::now(),
            env!("CARGO_PKG_VERSION"),
        );

        log::error!("{info_dump}");
        let _ = std::fs::write(&crash_path, info_dump);

        std::process::abort();
    }));
}

/// Starts logging to the file at `path`, replacing whatever was there.
pub fn init(path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    let (sender, receiver) = mpsc::channel::<Message>();

    MSG_SENDER
        .set(Mutex::new(sender))
        .map_err(|_| eyre::eyre!("logging was already initialised"))?;

    log::set_logger(&LOGGER).map_err(|err| eyre::eyre!("{err}"))?;

    log::set_max_level(if cfg!(feature = "debug") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    install_panic_hook(crash_path(path));

    // Writing happens off the render thread, which is also where every log call comes from.
    std::thread::spawn(move || {
        for message in receiver {
            message.write_to_file(&mut file);
        }
    });

    Ok(())
}
