#![no_std]

pub mod runtime;
pub mod sensors;
