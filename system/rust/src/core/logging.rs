use crate::core::sysprop::{get_i32, PropertyI32};

fn get_log_level() -> log::LevelFilter {
    match get_i32(PropertyI32::LogLevel) {
        0 => log::LevelFilter::Off,
        1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        5 => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info, // default level
    }
}

/// Inits logging for Android
#[cfg(target_os = "android")]
pub fn init_logging() {
    android_logger::init_once(
        android_logger::Config::default().with_tag("bt_adv").with_max_level(get_log_level()),
    );
    log::set_max_level(get_log_level())
}

/// Inits logging for host
#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    env_logger::Builder::new().filter(None, get_log_level()).parse_default_env().try_init().ok();
    log::set_max_level(get_log_level())
}
