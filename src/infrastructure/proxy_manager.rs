//! 代理池
//!
//! 多个尝试之间唯一共享的可变状态：轮询游标和每个代理的成功率评分，
//! 由一把互斥锁串行化。评分只对外暴露，选择策略本身不使用评分。

use chrono::{DateTime, Utc};
use rand::Rng;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::models::loaders::load_proxy_pool;
use crate::models::proxy::ProxyConfig;

const SUCCESS_BONUS: f64 = 0.05;
const FAILURE_PENALTY: f64 = 0.1;
const INITIAL_SCORE: f64 = 1.0;

/// 池中的一个代理条目
#[derive(Debug, Clone)]
pub struct ProxyServer {
    pub config: ProxyConfig,
    success_rate: f64,
    last_used: Option<DateTime<Utc>>,
}

impl ProxyServer {
    fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            success_rate: INITIAL_SCORE,
            last_used: None,
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    pub fn last_used(&self) -> Option<DateTime<Utc>> {
        self.last_used
    }

    fn matches(&self, host: &str, port: u16) -> bool {
        let candidate = ProxyConfig::new(host, port, self.config.scheme);
        self.config.key() == candidate.key()
    }

    fn adjust(&mut self, delta: f64) {
        self.success_rate = (self.success_rate + delta).clamp(0.0, 1.0);
    }
}

#[derive(Debug, Default)]
struct PoolState {
    proxies: Vec<ProxyServer>,
    cursor: usize,
}

impl PoolState {
    fn take(&mut self, index: usize) -> ProxyConfig {
        let server = &mut self.proxies[index];
        server.last_used = Some(Utc::now());
        server.config.clone()
    }
}

/// 代理轮换管理器
#[derive(Debug, Default)]
pub struct ProxyManager {
    state: Mutex<PoolState>,
}

impl ProxyManager {
    pub fn new(proxies: impl IntoIterator<Item = ProxyConfig>) -> Self {
        let manager = Self::default();
        for proxy in proxies {
            manager.add(proxy);
        }
        manager
    }

    /// 从 TOML 代理池文件创建
    pub async fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let proxies = load_proxy_pool(path).await?;
        let manager = Self::new(proxies);
        info!("🌐 代理池已就绪，共 {} 个代理", manager.len());
        Ok(manager)
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // 评分和游标在任何时刻都是自洽的，锁中毒时继续使用内部状态
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 轮询取下一个代理，池为空时返回 `None`
    pub fn next(&self) -> Option<ProxyConfig> {
        let mut state = self.lock();
        if state.proxies.is_empty() {
            return None;
        }
        let index = state.cursor % state.proxies.len();
        state.cursor = (index + 1) % state.proxies.len();
        let proxy = state.take(index);
        debug!("轮询选中代理: {}", proxy.server_url());
        Some(proxy)
    }

    /// 随机取一个代理
    pub fn random(&self) -> Option<ProxyConfig> {
        let mut state = self.lock();
        if state.proxies.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..state.proxies.len());
        Some(state.take(index))
    }

    /// 按国家代码取第一个匹配的代理（大小写不敏感）
    pub fn by_country(&self, code: &str) -> Option<ProxyConfig> {
        let mut state = self.lock();
        let index = state.proxies.iter().position(|p| {
            p.config
                .country
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(code))
        })?;
        Some(state.take(index))
    }

    pub fn mark_success(&self, host: &str, port: u16) {
        self.feedback(host, port, SUCCESS_BONUS);
    }

    pub fn mark_failure(&self, host: &str, port: u16) {
        self.feedback(host, port, -FAILURE_PENALTY);
    }

    fn feedback(&self, host: &str, port: u16, delta: f64) {
        let mut state = self.lock();
        match state.proxies.iter_mut().find(|p| p.matches(host, port)) {
            Some(server) => {
                server.adjust(delta);
                debug!("代理 {}:{} 评分更新为 {:.2}", host, port, server.success_rate);
            }
            None => debug!("代理 {}:{} 不在池中，忽略反馈", host, port),
        }
    }

    /// 加入代理；相同 host:port 已存在时不重复添加
    pub fn add(&self, config: ProxyConfig) -> bool {
        let mut state = self.lock();
        let (host, port) = config.key();
        if state.proxies.iter().any(|p| p.matches(&host, port)) {
            return false;
        }
        state.proxies.push(ProxyServer::new(config));
        true
    }

    /// 移除代理；不存在时无操作
    pub fn remove(&self, host: &str, port: u16) -> bool {
        let mut state = self.lock();
        let before = state.proxies.len();
        state.proxies.retain(|p| !p.matches(host, port));
        let removed = state.proxies.len() != before;
        if state.proxies.is_empty() {
            state.cursor = 0;
        } else {
            state.cursor %= state.proxies.len();
        }
        removed
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.proxies.clear();
        state.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 当前评分快照
    pub fn score(&self, host: &str, port: u16) -> Option<f64> {
        self.lock()
            .proxies
            .iter()
            .find(|p| p.matches(host, port))
            .map(ProxyServer::success_rate)
    }

    pub fn servers(&self) -> Vec<ProxyServer> {
        self.lock().proxies.clone()
    }
}
