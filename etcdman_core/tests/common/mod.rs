// Each integration test binary uses a different subset of the helpers.
#![allow(dead_code)]

pub mod fake_store;

use log::LevelFilter;

pub fn init_logging() {
    //   Logs will appear only when you run with `-- --nocapture`
    //   or when the test fails.
    let _ = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
