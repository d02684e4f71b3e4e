// src/api/mod.rs

//! Control plane: the HTTP front end started once every service has been
//! launched.
//!
//! The supervisor only depends on the [`ControlPlane`] trait. The production
//! implementation, [`HttpControlPlane`], serves static assets and a small
//! JSON API over the [`StatusBoard`].

pub mod http;
pub mod status;

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;

pub use http::HttpControlPlane;
pub use status::{ServiceStatus, StatusBoard};

/// Something that can be started after all services are up.
pub trait ControlPlane: Send {
    /// Start listening. Resolves once the listener is bound (`Ok`) or binding
    /// failed (`Err`); serving continues in the background.
    fn start(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
