use actix_web::{middleware::Logger, web, App, HttpServer};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use rifabot_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    handlers,
    middlewares::create_cors,
    services::*,
    swagger::swagger_config,
    tasks,
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
    let config = Config::from_toml()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration file: {e}"))?;

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;

    // 运行数据库迁移
    run_migrations(&pool).await?;

    // 创建服务
    let raffle_service = RaffleService::new(pool.clone());
    let order_service = OrderService::new(pool.clone());
    let reservation_service =
        ReservationService::new(pool.clone(), config.reservation.clone());
    let flow_service = FlowService::new(reservation_service.clone(), raffle_service.clone());
    let dispatch_service = DispatchService::new(pool.clone(), flow_service.clone());

    // 启动后台过期扫描任务
    tasks::spawn_all(
        reservation_service.clone(),
        config.reservation.sweep_interval_secs,
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let bind_addr = (config.server.host.clone(), config.server.port);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .app_data(web::Data::new(raffle_service.clone()))
            .app_data(web::Data::new(order_service.clone()))
            .app_data(web::Data::new(reservation_service.clone()))
            .app_data(web::Data::new(dispatch_service.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::raffle_config)
                    .configure(handlers::order_config),
            )
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
