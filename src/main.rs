use std::sync::Arc;
use tracing::{error, info, warn};

use job_apply_automation::error::AppError;
use job_apply_automation::models::{load_payload_file, ApplicationResult};
use job_apply_automation::utils::logging;
use job_apply_automation::{
    AppResult, AutomationEngine, AutomationPayload, BridgeOutput, ChromeSessionFactory, CommandAgent,
    Config, DesktopIntegration, ExecutionMode, HostIds, ProxyManager, ServerIntegration,
};

/// 宿主桥接入口：stdout 只输出一行结果 JSON，成功时退出码为 0
#[tokio::main]
async fn main() {
    let config = Config::from_env();
    logging::init(&config.log_filter);

    let application_id = std::env::var("APPLICATION_ID").unwrap_or_else(|_| "unknown".to_string());
    let mode = config.mode;

    // 在独立任务中运行，panic 也能转换成 JSON 错误
    let handle = tokio::spawn(run(config, application_id.clone()));
    let output = match handle.await {
        Ok(output) => output,
        Err(e) => {
            error!("[{}] ❌ 运行任务异常终止: {}", mode, e);
            BridgeOutput::error(format!("运行任务异常终止: {}", e), &application_id, mode.as_str())
        }
    };

    println!("{}", output.to_json());
    std::process::exit(if output.success { 0 } else { 1 });
}

async fn run(config: Config, application_id: String) -> BridgeOutput {
    let mode = config.mode;
    let finish = |result: &ApplicationResult| BridgeOutput::from_result(result, &application_id, mode.as_str());
    let ids = HostIds {
        application_id: Some(application_id.clone()),
        user_id: std::env::var("USER_ID").ok(),
    };

    let payload = match load_payload(&config).await.and_then(AutomationPayload::validate) {
        Ok(payload) => payload,
        Err(e) => {
            error!("[{}] ❌ 载荷无效: {}", mode, e);
            return finish(&ApplicationResult::failed_before_start("unknown", "unknown", &ids, &e));
        }
    };

    let Some(command) = config.agent_command.clone() else {
        let e = AppError::Configuration("未设置 AGENT_COMMAND".to_string());
        error!("[{}] ❌ {}", mode, e);
        return finish(&ApplicationResult::failed_before_start(&payload.job.job_id, "unknown", &ids, &e));
    };
    let browser_profile = config.browser_profile_path.clone();
    let proxy_pool_file = config.proxy_pool_file.clone();
    let engine = Arc::new(AutomationEngine::new(
        config,
        Arc::new(ChromeSessionFactory),
        Arc::new(CommandAgent::new(command)),
    ));

    let result = match mode {
        ExecutionMode::Server => {
            let proxies = match proxy_pool_file {
                Some(path) => match ProxyManager::from_toml_file(&path).await {
                    Ok(pool) => Some(Arc::new(pool)),
                    Err(e) => {
                        warn!("[{}] ⚠️ 代理池加载失败，不使用代理: {:#}", mode, e);
                        None
                    }
                },
                None => None,
            };
            ServerIntegration::new(engine, proxies).run(payload, ids).await
        }
        ExecutionMode::Desktop => DesktopIntegration::new(engine, browser_profile).run(payload, ids).await,
    };

    info!("[{}] 结果已生成: {}", mode, result.status());
    finish(&result)
}

async fn load_payload(config: &Config) -> AppResult<AutomationPayload> {
    match &config.data_file {
        Some(path) => load_payload_file(path).await,
        None => AutomationPayload::from_env_vars(|key| std::env::var(key).ok()),
    }
}
