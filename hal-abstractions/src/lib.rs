//! Hardware abstraction traits for reset-durable timekeeping
//!
//! This crate defines the seams between board support code and the
//! platform-agnostic logic in `retained-clock-core`. BSPs implement these
//! traits; tests implement them with `Cell`-backed fakes.
//!
//! - [`counter::TickCounter`]: a free-running tick source that can be told to
//!   keep counting through a soft reset.
//! - [`register`]: named bit fields inside memory-mapped registers, with
//!   read-modify-write that never disturbs neighbouring bits.

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod counter;
pub mod register;

pub use counter::TickCounter;
pub use register::{BitField, ControlBit, RegisterBlock};
