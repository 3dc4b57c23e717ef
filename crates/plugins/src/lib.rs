//! `plugins` crate: the `PluginCapabilities` trait and the route/handler
//! vocabulary shared by the generator and the live registries.
//!
//! Every generated backend plugin is described to the live system through
//! [`PluginCapabilities`]: the routes it wants registered and the handler that
//! serves each step index. Step-type specifics travel as tagged
//! [`HandlerKind`] data rather than as plugin subtypes.

pub mod error;
pub mod traits;
pub mod mock;

pub use error::PluginError;
pub use traits::{
    check_route_table, HandlerKind, HandlerRef, HttpMethod, PluginCapabilities, RouteKey,
    RouteSpec, UiEntry,
};
