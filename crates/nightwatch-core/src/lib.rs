pub mod astro;
pub mod batch;
pub mod classify;
pub mod clock;
pub mod config;
pub mod consts;
pub mod error;
pub mod fits;
pub mod frame;
pub mod layout;
pub mod metadata;
pub mod monitor;
pub mod pipeline;
pub mod process;
pub mod processor;
pub mod retry;
