use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::auth::JwtKeys;
use crate::config::AppConfig;
use crate::handlers::{protected::students, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::StudentService;

/// Room for the text fields and multipart framing around a maximum-size picture
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Router knobs that come from configuration
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub uploads_path: String,
    pub max_request_size_bytes: usize,
    pub enable_cors: bool,
    pub enable_request_logging: bool,
}

impl RouterOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            uploads_path: config.uploads.public_path.clone(),
            max_request_size_bytes: config.uploads.max_file_size_bytes + MULTIPART_OVERHEAD,
            enable_cors: config.security.enable_cors,
            enable_request_logging: config.api.enable_request_logging,
        }
    }
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            uploads_path: "/uploads".to_string(),
            max_request_size_bytes: crate::config::DEFAULT_MAX_FILE_SIZE + MULTIPART_OVERHEAD,
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

pub fn app(service: Arc<StudentService>, keys: JwtKeys, options: &RouterOptions) -> Router {
    let uploads = ServeDir::new(service.attachments().root());

    let mut router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .nest_service(&options.uploads_path, uploads)
        // Protected
        .nest("/api/students", student_routes(keys, options))
        .layer(Extension(service));

    // Global middleware
    if options.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    if options.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn student_routes(keys: JwtKeys, options: &RouterOptions) -> Router {
    Router::new()
        .route("/", get(students::collection_get).post(students::collection_post))
        .route(
            "/:id",
            get(students::record_get)
                .put(students::record_put)
                .delete(students::record_delete),
        )
        .route_layer(from_fn_with_state(keys, jwt_auth_middleware))
        .layer(DefaultBodyLimit::max(options.max_request_size_bytes))
}
