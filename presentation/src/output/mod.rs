//! Output formatting for answers, errors and configuration

pub mod console;
