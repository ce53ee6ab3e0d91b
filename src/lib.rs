// File: lib.rs
// Location: /src/lib.rs

pub mod bluez;
pub mod config;
pub mod display;
pub mod gsettings;
pub mod nm;
pub mod wifi;
