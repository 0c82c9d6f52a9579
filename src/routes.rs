use log::{info, warn};
use std::fs;
use std::sync::Arc;

use actix_web::{
    FromRequest, Handler, HttpResponse, Responder, guard, http::Method, http::header::ContentType,
    web,
};
use chrono::Local;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::auth::AuthProvider;
use crate::error::AppError;
use crate::gpio::{GpioBackend, PinRegistry};
use crate::html::{self, Overview};
use crate::logger::{EventLogger, TIMESTAMP_FORMAT};

pub struct AppState<B: GpioBackend> {
    pub registry: Arc<PinRegistry<B>>,
    pub logger: Arc<EventLogger<B>>,
    pub auth: Arc<dyn AuthProvider>,
    /// Signals `main` to stop the server.
    pub shutdown: mpsc::Sender<()>,
}

impl<B: GpioBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            logger: Arc::clone(&self.logger),
            auth: Arc::clone(&self.auth),
            shutdown: self.shutdown.clone(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LoginQuery {
    uname: String,
    pwd: String,
}

impl<B: GpioBackend + 'static> AppState<B> {
    pub fn dashboard_scope(&self, base_path: &str) -> actix_web::Scope {
        web::scope(base_path)
            .service(get_only("/", index))
            .service(get_only("/validate", validate::<B>))
            .service(get_only("/view", view::<B>))
            .service(get_only("/log_toggle", log_toggle::<B>))
            .service(get_only("/log_now", log_now::<B>))
            .service(get_only("/log_get", log_get::<B>))
            .service(get_only("/log_clear", log_clear::<B>))
            .service(get_only("/shutdownserver", shutdown_server::<B>))
    }
}

fn get_only<F, Args>(path: &str, handler: F) -> actix_web::Resource
where
    F: Handler<Args>,
    Args: FromRequest + 'static,
    F::Output: Responder + 'static,
{
    web::resource(path).route(web::get().to(handler)).route(
        web::route()
            .guard(guard_not_methods(&[Method::GET]))
            .to(method_not_allowed),
    )
}

async fn index() -> HttpResponse {
    html_response(html::login_form())
}

async fn validate<B: GpioBackend + 'static>(
    query: web::Query<LoginQuery>,
    state: web::Data<AppState<B>>,
) -> Result<HttpResponse, AppError> {
    if state.auth.validate(&query.uname, &query.pwd) {
        info!("User {:?} logged in", query.uname);
        return render_overview(state.get_ref());
    }

    warn!("Rejected login for user {:?}", query.uname);
    Ok(html_response(html::login_form()))
}

async fn view<B: GpioBackend + 'static>(
    state: web::Data<AppState<B>>,
) -> Result<HttpResponse, AppError> {
    render_overview(state.get_ref())
}

async fn log_toggle<B: GpioBackend + 'static>(
    state: web::Data<AppState<B>>,
) -> Result<HttpResponse, AppError> {
    let enabled = state.logger.toggle();
    info!("Logging {}", if enabled { "enabled" } else { "disabled" });

    render_overview(state.get_ref())
}

async fn log_now<B: GpioBackend + 'static>(
    state: web::Data<AppState<B>>,
) -> Result<HttpResponse, AppError> {
    match state.logger.log_now() {
        Ok(()) => {}
        // the overview shows the failing row
        Err(e @ AppError::PinRead { .. }) => warn!("Snapshot not logged: {e}"),
        Err(e) => return Err(e),
    }

    render_overview(state.get_ref())
}

async fn log_get<B: GpioBackend + 'static>(
    state: web::Data<AppState<B>>,
) -> Result<HttpResponse, AppError> {
    let contents = state.logger.read()?;

    Ok(html_response(html::log_page(&contents)))
}

async fn log_clear<B: GpioBackend + 'static>(
    state: web::Data<AppState<B>>,
) -> Result<HttpResponse, AppError> {
    state.logger.clear()?;
    info!("Log file {} cleared", state.logger.path().display());

    render_overview(state.get_ref())
}

async fn shutdown_server<B: GpioBackend + 'static>(
    state: web::Data<AppState<B>>,
) -> HttpResponse {
    state.logger.disable();
    info!("Shutdown requested");
    // a full channel means a shutdown is already pending
    let _ = state.shutdown.try_send(());

    HttpResponse::Ok().finish()
}

fn render_overview<B: GpioBackend>(state: &AppState<B>) -> Result<HttpResponse, AppError> {
    let view = Overview {
        host_name: host_name(),
        system_time: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        log_size: state.logger.size()?,
        logging_enabled: state.logger.is_enabled(),
        readings: state.registry.read_state(),
    };

    Ok(html_response(html::overview(&view)))
}

fn host_name() -> String {
    fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|name| name.trim().to_string())
        .ok()
        .filter(|name| !name.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn html_response(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(body)
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

fn guard_not_methods(methods: &[Method]) -> impl guard::Guard + use<> {
    let allowed: Vec<Method> = methods.to_vec();
    guard::fn_guard(move |ctx| !allowed.iter().any(|m| m == ctx.head().method))
}
