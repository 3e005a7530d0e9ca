// src/main.rs

mod app_state;
mod auth;
mod config;
mod db;
mod department;
mod employee;
mod error;
mod lead;
mod manager;
mod models;
mod reports;
mod target;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    http::header::HeaderMap,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpServer, ResponseError,
};
use env_logger::Env;
use futures::future::{ok, Ready};
use log::info;

use crate::app_state::AppState;
use crate::auth::validate_jwt;
use crate::error::ApiError;

/// Session guard. Every route requires a valid bearer token except the login
/// and admin-bootstrap endpoints; missing, malformed and expired tokens all
/// get the same 401. Decoded claims land in the request extensions.
#[derive(Debug)]
pub struct Authentication;

fn is_public(path: &str, method: &str) -> bool {
    // CORS preflight never carries credentials.
    if method == "OPTIONS" {
        return true;
    }
    method == "POST"
        && matches!(
            path,
            "/admin-login" | "/employee-login" | "/manager-login" | "/create-admin"
        )
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    auth_str
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware { service })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !is_public(req.path(), req.method().as_str()) {
            let secret = req
                .app_data::<web::Data<AppState>>()
                .map(|state| state.config.jwt_secret.clone());
            let claims = match (bearer_token(req.headers()), secret) {
                (Some(token), Some(secret)) => validate_jwt(&token, &secret).ok(),
                _ => None,
            };
            match claims {
                Some(claims) => {
                    req.extensions_mut().insert(claims);
                }
                None => {
                    let (req_parts, _payload) = req.into_parts();
                    let resp = ApiError::Unauthorized.error_response().map_into_boxed_body();
                    let srv_resp = ServiceResponse::new(req_parts, resp);
                    return Box::pin(async move { Ok(srv_resp) });
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let mongodb = Arc::new(db::MongoDB::init(&config.mongo_uri, &config.database_name).await);

    info!("Server running at http://{}", config.bind_addr);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    let bind_addr = config.bind_addr.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Authentication)
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(AppState {
                mongodb: mongodb.clone(),
                config: config.clone(),
            }))
            // AUTH
            .route("/admin-login", web::post().to(auth::admin_login))
            .route("/employee-login", web::post().to(auth::employee_login))
            .route("/manager-login", web::post().to(auth::manager_login))
            .route("/create-admin", web::post().to(auth::create_admin))
            // DEPARTMENTS
            .service(
                web::resource("/department")
                    .route(web::get().to(department::list_departments))
                    .route(web::post().to(department::create_department))
                    .route(web::put().to(department::update_department))
                    .route(web::delete().to(department::delete_department)),
            )
            .route(
                "/departments",
                web::get().to(reports::list_departments_with_totals),
            )
            .route(
                "/departments/{id}",
                web::get().to(reports::department_progress),
            )
            // EMPLOYEES & MANAGERS
            .route("/addEmployee", web::post().to(employee::add_employee))
            .route("/employee/{id}", web::get().to(employee::get_employee))
            .route(
                "/updateEmployee/{id}",
                web::put().to(employee::update_employee),
            )
            .route(
                "/delete_employee",
                web::delete().to(employee::delete_employee),
            )
            .route("/addManager", web::post().to(manager::add_manager))
            // LEADS
            .route("/addLead", web::post().to(lead::add_lead))
            .route("/leads/import", web::post().to(lead::import_leads))
            .route("/editlead", web::put().to(lead::edit_lead))
            .route("/lead/{id}", web::put().to(lead::update_lead))
            .route(
                "/leads/callback-count",
                web::get().to(lead::callback_count),
            )
            .route(
                "/leads/callback-details",
                web::get().to(lead::callback_details),
            )
            .route(
                "/leads/count-by-employee",
                web::get().to(lead::count_by_employee),
            )
            .route(
                "/leads/count-by-department",
                web::get().to(lead::count_by_department),
            )
            // TARGETS
            .route("/target", web::post().to(target::create_target))
    })
    .bind(bind_addr)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    #[test]
    fn login_and_bootstrap_routes_are_public() {
        assert!(is_public("/admin-login", "POST"));
        assert!(is_public("/employee-login", "POST"));
        assert!(is_public("/manager-login", "POST"));
        assert!(is_public("/create-admin", "POST"));
        assert!(is_public("/department", "OPTIONS"));
    }

    #[test]
    fn everything_else_is_guarded() {
        assert!(!is_public("/department", "GET"));
        assert!(!is_public("/departments", "GET"));
        assert!(!is_public("/addLead", "POST"));
        assert!(!is_public("/leads/import", "POST"));
        assert!(!is_public("/delete_employee", "DELETE"));
        assert!(!is_public("/admin-login", "GET"));
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Bearer   "),
        );
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
