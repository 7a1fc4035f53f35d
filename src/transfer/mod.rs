//! File transfer
//!
//! Payload streaming for `GET` and `PUT`.

pub mod file_ops;

pub use file_ops::{Download, Upload, send_file};
