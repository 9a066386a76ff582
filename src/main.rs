use actix_web::{App, HttpServer, middleware::Logger, web};
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use chrono::Local;  // timestamp in log lines
use std::sync::Arc;

use lucky_spin_backend::{
    config::Config,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    storage::{CsvEventStore, CsvUserStore},
    swagger::swagger_config,
    utils::{JwtService, SystemClock},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml()?;

    // 初始化 CSV 存储（抽奖记录、中奖记录、用户表）
    let event_store = CsvEventStore::from_config(&config.storage);
    event_store.init()?;
    let user_store = CsvUserStore::new(config.storage.users_path());
    user_store.init()?;

    // 创建JWT服务
    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );

    // 创建服务
    let clock = Arc::new(SystemClock);
    let event_service =
        EventService::new(Arc::new(event_store), config.event.clone(), clock.clone())?;
    let auth_service = AuthService::new(Arc::new(user_store), jwt_service.clone(), clock);

    log::info!(
        "Lucky spin event configured for months {}..={}, bookings ledger at {}",
        config.event.start_month,
        config.event.end_month,
        config.storage.bookings_path().display()
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let event_service = web::Data::new(event_service);
    let auth_service = web::Data::new(auth_service);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(auth_service.clone())
            .app_data(event_service.clone())
            .configure(swagger_config)
            .configure(handlers::api_config)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
