mod health;
mod status;

use actix_web::web;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health_route)
        .service(status::endpoint_status_route)
        .service(status::endpoint_history_route)
        .service(status::site_status_route);
}
