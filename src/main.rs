use public_storage_bridge::{
    config::{LogConfig, PathValidator},
    logging,
    platform::{pump_host_events, HostEventSender},
    server, AppConfig, AppState,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

const CONFIG_PATH: &str = "config/app.toml";

/// 加载日志配置
///
/// 尝试从配置文件加载，失败时返回默认配置
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 先加载日志配置（必须保持 _log_guard 存活）
    let log_config = load_log_config().await;
    let _log_guard = logging::init_logging(&log_config);

    info!("Public Storage Bridge v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_or_default(CONFIG_PATH).await;
    PathValidator::validate_or_error(&config.storage.public_root)?;

    // 宿主事件：分享选择器、目录选择器、重新索引
    let (events, rx) = HostEventSender::channel();
    let pump = tokio::spawn(pump_host_events(rx));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(config, events);
    info!("应用状态初始化完成");

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let app = server::router(app_state).layer(middleware);

    info!("服务器启动在: http://{}", addr);
    info!("方法调用: POST http://{}/api/v1/invoke", addr);
    info!("健康检查: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始优雅关闭...");
        }
    }

    pump.abort();
    info!("应用已安全退出");

    Ok(())
}
