use std::{cell::RefCell, sync::Once};

use log::{Level, LevelFilter, Log, Metadata, Record};

thread_local! {
    static CAPTURED: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
}

/// Keeps every record logged on the current thread. Tests run on their own
/// threads, so each sees only its own records.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED.with(|captured| {
            captured
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INSTALL: Once = Once::new();

/// Installs the capturing logger (once per process) and forgets what this
/// thread captured so far. Do not mix with `env_logger` in the same test
/// binary.
pub fn capture_logs() {
    INSTALL.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    CAPTURED.with(|captured| captured.borrow_mut().clear());
}

/// Messages captured on this thread at exactly `level`
pub fn captured(level: Level) -> Vec<String> {
    CAPTURED.with(|captured| {
        captured
            .borrow()
            .iter()
            .filter(|(logged, _)| *logged == level)
            .map(|(_, message)| message.clone())
            .collect()
    })
}
