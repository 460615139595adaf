//! Runtime facade (C2): the sandboxed surface handed to a plugin
//! handler — filesystem shim, whitelisted env accessor, HTTP client,
//! and structured logger. Every operation passes through the
//! permission gates in `pcore_permissions` before touching anything.

mod env;
mod error;
mod fs;
mod http;
mod logger;

pub use env::EnvAccessor;
pub use error::{FacadeError, FacadeResult};
pub use fs::{FsShim, Metadata};
pub use http::HttpClient;
pub use logger::{LogLevel, Logger};
