use std::sync::Arc;

use actix_web::{App, test, web};
use pi_minilog::{
    AppConfig, AppState, EventLogger, MockGpioBackend, PinRegistry, StaticCredentials,
};
use tempfile::{TempDir, tempdir};
use tokio::sync::mpsc;

fn sample_config(dir: &TempDir) -> AppConfig {
    let json = format!(
        r#"
        {{
            "http": {{
                "host": "127.0.0.1:8080",
                "path": "/minilog"
            }},
            "pins": {{ "3": 5, "2": 3 }},
            "users": {{ "admin": "root", "guest": "guest" }},
            "log_file": {:?}
        }}
        "#,
        dir.path().join("minilog.log")
    );
    AppConfig::from_json(&json).expect("valid sample config")
}

struct Harness {
    _dir: TempDir,
    config: AppConfig,
    backend: Arc<MockGpioBackend>,
    state: AppState<MockGpioBackend>,
    shutdown_rx: mpsc::Receiver<()>,
}

fn harness() -> Harness {
    let dir = tempdir().unwrap();
    let config = sample_config(&dir);
    let backend = Arc::new(MockGpioBackend::default());
    let registry = Arc::new(PinRegistry::new(&config, backend.clone()));
    let logger = Arc::new(EventLogger::open(registry.clone(), config.log_file.clone()).unwrap());
    registry.init(logger.clone()).unwrap();

    let (shutdown, shutdown_rx) = mpsc::channel(1);
    let state = AppState {
        registry,
        logger,
        auth: Arc::new(StaticCredentials::new(config.users.clone())),
        shutdown,
    };

    Harness {
        _dir: dir,
        config,
        backend,
        state,
        shutdown_rx,
    }
}

macro_rules! init_app {
    ($h:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($h.state.clone()))
                .service($h.state.dashboard_scope(&$h.config.http.path)),
        )
        .await
    };
}

macro_rules! get_text {
    ($app:expr, $uri:expr) => {{
        let req = test::TestRequest::get().uri($uri).to_request();
        let body = test::call_and_read_body(&$app, req).await;
        String::from_utf8(body.to_vec()).unwrap()
    }};
}

#[actix_rt::test]
async fn index_serves_login_form() {
    let h = harness();
    let app = init_app!(h);

    let req = test::TestRequest::get().uri("/minilog/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/html; charset=utf-8"
    );

    let body = get_text!(app, "/minilog/");
    assert!(body.contains("action=\"validate\""));
    assert!(body.contains("name=\"uname\""));
    assert!(body.contains("name=\"pwd\""));
}

#[actix_rt::test]
async fn validate_accepts_known_pair_only() {
    let h = harness();
    let app = init_app!(h);

    let body = get_text!(app, "/minilog/validate?uname=admin&pwd=root");
    assert!(body.contains("Current Sensor States"));

    let body = get_text!(app, "/minilog/validate?uname=admin&pwd=wrong");
    assert!(body.contains("action=\"validate\""));
    assert!(!body.contains("Current Sensor States"));

    let body = get_text!(app, "/minilog/validate");
    assert!(body.contains("action=\"validate\""));
}

#[actix_rt::test]
async fn view_renders_pins_in_port_order() {
    let h = harness();
    h.backend.set_level(5, true).unwrap();
    let app = init_app!(h);

    let body = get_text!(app, "/minilog/view");
    let first = body.find("<tr><td>2</td><td>3</td><td>false</td></tr>").unwrap();
    let second = body.find("<tr><td>3</td><td>5</td><td>true</td></tr>").unwrap();
    assert!(first < second);
    assert!(body.contains("Log File Size: 0 Bytes"));
    assert!(body.contains("Current Logging Status: false"));
}

#[actix_rt::test]
async fn failed_pin_read_does_not_fail_the_page() {
    let h = harness();
    h.backend.fail_reads(3, true).unwrap();
    let app = init_app!(h);

    let req = test::TestRequest::get().uri("/minilog/view").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body = get_text!(app, "/minilog/view");
    assert!(body.contains("<tr><td>2</td><td>3</td><td>error: "));
    assert!(body.contains("<tr><td>3</td><td>5</td><td>false</td></tr>"));
}

#[actix_rt::test]
async fn log_now_with_failed_read_renders_overview() {
    let h = harness();
    h.backend.fail_reads(5, true).unwrap();
    let app = init_app!(h);

    let req = test::TestRequest::get().uri("/minilog/log_now").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body = get_text!(app, "/minilog/log_now");
    assert!(body.contains("Current Sensor States"));
    assert!(body.contains("<tr><td>3</td><td>5</td><td>error: "));
    assert!(body.contains("Log File Size: 0 Bytes"));
    assert!(h.state.logger.read().unwrap().is_empty());
}

#[actix_rt::test]
async fn log_now_with_unwritable_log_is_500() {
    let h = harness();
    std::fs::remove_file(h.state.logger.path()).unwrap();
    std::fs::create_dir(h.state.logger.path()).unwrap();
    let app = init_app!(h);

    let req = test::TestRequest::get().uri("/minilog/log_now").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
}

#[actix_rt::test]
async fn log_controls_round_trip() {
    let h = harness();
    let app = init_app!(h);

    let body = get_text!(app, "/minilog/log_toggle");
    assert!(body.contains("Current Logging Status: true"));
    assert!(h.state.logger.is_enabled());

    h.backend.set_level(3, true).unwrap();
    let body = get_text!(app, "/minilog/log_now");
    assert!(!body.contains("Log File Size: 0 Bytes"));

    let log = get_text!(app, "/minilog/log_get");
    let lines: Vec<&str> = log.split_terminator("<br>\n").collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.ends_with(", true, false\r")));

    let body = get_text!(app, "/minilog/log_clear");
    assert!(body.contains("Log File Size: 0 Bytes"));
    assert_eq!(get_text!(app, "/minilog/log_get"), "");

    let body = get_text!(app, "/minilog/log_toggle");
    assert!(body.contains("Current Logging Status: false"));
}

#[actix_rt::test]
async fn shutdown_disables_logging_and_signals() {
    let mut h = harness();
    h.state.logger.toggle();
    let app = init_app!(h);

    let req = test::TestRequest::get()
        .uri("/minilog/shutdownserver")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    assert!(!h.state.logger.is_enabled());
    assert!(h.shutdown_rx.try_recv().is_ok());
}

#[actix_rt::test]
async fn wrong_method_returns_405() {
    let h = harness();
    let app = init_app!(h);

    for uri in ["/minilog/", "/minilog/view", "/minilog/log_clear", "/minilog/shutdownserver"] {
        let req = test::TestRequest::post().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 405, "{uri}");
    }
    assert!(h.state.logger.read().unwrap().is_empty());
}

#[actix_rt::test]
async fn unknown_path_returns_404() {
    let h = harness();
    let app = init_app!(h);

    let req = test::TestRequest::get().uri("/minilog/nope").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}
