#![cfg_attr(not(test), no_std)]
pub mod button;
pub mod command;
pub mod error;
pub mod pump;
pub mod schedule;
pub mod sensor;
pub mod service;
pub mod settings;
pub mod time;

#[cfg(feature = "esp32")]
pub mod io;
#[cfg(feature = "esp32")]
pub mod net;
