use http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::util::env::{EnvResult, Var};
use crate::var;

/// CORS layer built from `CORS_ALLOW_ORIGINS`: `*` or a comma-separated
/// origin list.
pub async fn cors() -> EnvResult<CorsLayer> {
    let origins = var!(Var::CorsAllowOrigins).await?;

    if origins.trim() == "*" {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let list: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(list))
        .allow_methods(Any)
        .allow_headers(Any))
}
