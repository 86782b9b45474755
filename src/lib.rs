#![no_std]

pub mod func;
pub mod mutex;
mod ring;

pub mod binding;
pub mod error;
pub mod events;
pub mod exclusive;
pub mod irq;
pub mod port;
pub mod stream;
pub mod uart;

#[cfg(feature = "sim")]
pub mod sim;
