use std::{io, sync::Once, thread};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use log::LevelFilter;
use synod_rs::types::basic::{Decree, NodeID};

static LOGGER_INIT: Once = Once::new();

// Set up a logger that logs all log messages with `level` and above.
pub(crate) fn setup_logger(level: LevelFilter) {
    LOGGER_INIT.call_once(|| {
        fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "[{:?}][{}] {}",
                    thread::current().id(),
                    record.level(),
                    message
                ))
            })
            .level(level)
            .chain(io::stdout())
            .apply()
            .unwrap();
    })
}

pub(crate) fn log_with_context(node: NodeID, content: &str) {
    log::debug!("[node {}] {}", node, content)
}

// Get a more readable representation of a decree by base64-encoding its digest and taking the first 7
// characters.
pub(crate) fn first_seven_base64_chars(decree: &Decree) -> String {
    let encoded = STANDARD_NO_PAD.encode(decree.digest());
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}
