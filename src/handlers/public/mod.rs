// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service metadata and health. Uploaded pictures are also public but are
// served by tower-http's ServeDir rather than a handler.

pub mod service;

pub use service::{health, root};
