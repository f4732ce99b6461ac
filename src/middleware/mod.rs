/// Middleware module
///
/// Bearer-token authentication for the protected `/api` routes.

mod jwt_middleware;

pub use jwt_middleware::JwtMiddleware;
