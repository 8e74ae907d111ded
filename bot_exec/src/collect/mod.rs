//! # Collection planning module
//!
//! Collection planning picks the order in which fallen birdies are picked up. The robot turns in
//! place to face each birdie before driving onto it, and the grabber sweeps an arc while turning.
//! Any birdie inside that arc would be knocked away, so the [`selector`] only accepts turns which
//! stay clear of nearby birdies, falling back to a short straight move when no turn is safe. The
//! [`route`] assembler chains selections into the full sequence of legs for a sweep.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod route;
pub mod selector;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use params::CollectParams;
pub use route::{plan_route, Route, RouteLeg};
pub use selector::{select_target, ClampRect, CollectionTarget};
