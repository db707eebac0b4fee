//! Image derivatives for upload. Pure Rust, no system dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff** | `image::guess_format` on the leading bytes |
//! | **Identify** | decoder dimensions + EXIF orientation |
//! | **Resize → JPEG** | Lanczos3 + `JpegEncoder` |
//! | **Thumbnail** | same resize path + `unsharpen` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::fit_within;
pub use operations::{DerivativeConfig, Derivatives, create_derivatives, remove_derivatives};
pub use params::{Quality, ResizeParams, Sharpening};
pub use rust_backend::{RustBackend, sniff_format};
