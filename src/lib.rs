// src/lib.rs

//! Dublin Airport security times bot library.

pub mod clock;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod publishers;
pub mod services;
pub mod storage;
pub mod utils;
