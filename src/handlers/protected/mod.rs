// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// Route Prefix: /api/students
// Middleware: jwt_auth_middleware, which injects AuthUser into extensions

pub mod students; // Student record lifecycle
