/// Middleware module
///
/// Bearer token authentication for the `/api` scope.

mod jwt_middleware;

pub use jwt_middleware::bearer_token;
pub use jwt_middleware::JwtMiddleware;
