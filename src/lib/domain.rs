//! Domain layer

pub mod mail;
