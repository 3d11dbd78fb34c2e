// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (bearer token required)
pub mod public;    // No authentication required (/, /health)
pub mod protected; // Bearer token required (/api/students/*)
