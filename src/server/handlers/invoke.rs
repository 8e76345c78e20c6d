// 方法通道调用API处理器

use crate::bridge::{Arguments, MethodCall, MethodResult};
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::ApiResponse;

/// 方法通道调用请求
///
/// 通道名可能包含 `/`，因此放在请求体而不是路径参数里
#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub channel: String,
    pub method: String,
    #[serde(default)]
    pub arguments: Arguments,
}

/// 方法通道错误详情
#[derive(Debug, Serialize)]
pub struct InvokeErrorData {
    /// 通道错误码（如 SAVE_ERROR、FILE_NOT_FOUND）
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// 调用通道方法
///
/// POST /api/v1/invoke
pub async fn invoke_method(
    State(state): State<AppState>,
    Json(req): Json<InvokeRequest>,
) -> Result<Json<ApiResponse<Value>>, StatusCode> {
    debug!("API: 调用通道方法 channel={}, method={}", req.channel, req.method);

    let registry = state.registry.clone();
    let channel = req.channel.clone();
    let call = MethodCall::new(req.method, req.arguments);

    // 通道处理器执行同步文件 I/O
    let outcome = tokio::task::spawn_blocking(move || registry.invoke(&channel, &call))
        .await
        .map_err(|e| {
            error!("通道方法执行任务异常: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let response = match outcome {
        None => {
            warn!("未注册的通道: {}", req.channel);
            ApiResponse::error(404, format!("Unknown channel: {}", req.channel))
        }
        Some(MethodResult::Success { value }) => ApiResponse::success(value),
        Some(MethodResult::Error {
            code,
            message,
            details,
        }) => {
            let data = InvokeErrorData {
                error_code: code,
                details,
            };
            let data = serde_json::to_value(data).map_err(|e| {
                error!("序列化错误详情失败: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;
            ApiResponse::error_with_data(1, message, data)
        }
        Some(MethodResult::NotImplemented) => {
            ApiResponse::error(501, "Method not implemented".to_string())
        }
    };

    Ok(Json(response))
}

/// 健康检查响应结构
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub channels: Vec<String>,
}

/// 健康检查
///
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "public-storage-bridge".to_string(),
        channels: state
            .registry
            .channels()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}
