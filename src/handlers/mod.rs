pub mod auth;
pub mod event;

pub use auth::auth_config;
pub use event::event_config;

use actix_web::web;

/// `/api/v1` 下的全部路由
pub fn api_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(auth_config)
            .configure(event_config),
    );
}
