use actix_web::{middleware::Logger, web, App, HttpServer};
use actix_web::dev::Server;
use std::net::TcpListener;

use crate::auth::AuthService;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    delete_current_user, get_current_user, get_user_by_id, health_check, login, logout, refresh,
    register, update_current_user,
};

pub fn run(listener: TcpListener, auth: AuthService) -> Result<Server, std::io::Error> {
    let auth_data = web::Data::new(auth.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(auth_data.clone())

            // Public routes (registered before the protected /api scope)
            .route("/health_check", web::get().to(health_check))
            .route("/api/register", web::post().to(register))
            .route("/api/login", web::post().to(login))
            .route("/api/refresh", web::post().to(refresh))

            // Protected routes (require a bearer access token)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(auth.clone()))
                    .route("/logout", web::post().to(logout))
                    .route("/users/me", web::get().to(get_current_user))
                    .route("/users/me", web::put().to(update_current_user))
                    .route("/users/me", web::delete().to(delete_current_user))
                    .route("/users/{id}", web::get().to(get_user_by_id))
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
