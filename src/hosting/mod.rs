//! Remote image hosting.
//!
//! - **Backend**: [`HostingBackend`] trait, credentials, error types
//! - **Registry**: selector string → backend constructor
//! - **Imgur**: [`ImgurBackend`], the stock implementation
//!
//! Adding a hosting service means implementing [`HostingBackend`] and
//! registering a constructor; the uploader never names a concrete backend.

pub mod backend;
pub mod imgur;
pub mod registry;

pub use backend::{AuthError, BackendCredentials, HostingBackend, RemoteImage, UploadError};
pub use imgur::ImgurBackend;
pub use registry::Registry;
