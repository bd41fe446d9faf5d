//! Location resolution for wxhist
//!
//! Turns typed text, device geolocation and coordinates into a single active
//! location selection. Every lookup is cached and supersede-safe: a newer request
//! always wins over an older one that resolves later.

pub mod cache;
pub mod location;
pub mod reverse;
pub mod search;
pub mod session;
pub mod types;
pub mod weather;

pub use cache::TtlCache;
pub use location::{DeviceLocator, GeolocationResolver, Position, PositionOptions, SystemLocator};
pub use reverse::ReverseGeocodeResolver;
pub use search::{GeocodeSearch, SearchBinding};
pub use session::LocationSession;
pub use types::*;
pub use weather::CurrentWeatherResolver;
