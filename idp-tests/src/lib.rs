mod concurrent;
mod identity_providers;
mod memory;
mod template;

use idp::ConnectionSource;
use log::LevelFilter;
use std::env;

pub use concurrent::concurrent;
pub use identity_providers::identity_providers;
pub use memory::*;
pub use template::template;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run every scenario against a real database behind `source`.
///
/// The scenarios own the `idp*` tables and `template_check`, they are dropped
/// and recreated.
pub fn execute_tests<S: ConnectionSource>(source: S) {
    template(&source);
    identity_providers(&source);
    concurrent(&source);
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
