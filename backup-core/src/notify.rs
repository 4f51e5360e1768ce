use crate::archive::ArchiveKind;
use crate::config::NotifyConfig;
use crate::constants::{notify, units};
use crate::report::{RunReport, format_elapsed};
use crate::{BackupError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// 推送通知能力
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Pushover 推送
#[derive(Debug, Clone)]
pub struct PushoverNotifier {
    client: reqwest::Client,
    api_url: String,
    api_token: String,
    user_key: String,
}

impl PushoverNotifier {
    pub fn new(credentials: &NotifyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(notify::REQUEST_TIMEOUT))
            .build()?;

        Ok(Self {
            client,
            api_url: notify::PUSHOVER_API_URL.to_string(),
            api_token: credentials.api_token.clone(),
            user_key: credentials.user_key.clone(),
        })
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let params = [
            ("token", self.api_token.as_str()),
            ("user", self.user_key.as_str()),
            ("message", message),
        ];

        let response = self.client.post(&self.api_url).form(&params).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackupError::notify(format!("{status}: {body}")));
        }

        Ok(())
    }
}

/// 渲染运行摘要
pub fn render_summary(report: &RunReport) -> String {
    let mut message = String::from("🔥 备份摘要 🔥\n\n");
    message.push_str(&format!("🕒 耗时: {}\n", format_elapsed(report.elapsed)));
    message.push_str(&format!(
        "💾 备份大小: {:.2} MB\n",
        units::bytes_to_mb(report.total_bytes)
    ));
    message.push_str(&format!("🚀 上传状态: {}\n", report.upload.glyph()));
    message.push_str(&format!("🐳 备份的容器数量: {}\n", report.workload_count));

    if report.primary_archive_failed() {
        message.push_str("\n❌ 主数据归档失败\n");
    }
    for failure in report
        .archive
        .failures
        .iter()
        .filter(|f| f.kind == ArchiveKind::Additional)
    {
        message.push_str(&format!("⚠️ 归档失败: {}\n", failure.source.display()));
    }
    for outcome in report.restart.degraded() {
        message.push_str(&format!("⚠️ 容器未能确认启动: {}\n", outcome.name));
    }

    message
}

/// 发送通知，失败只记录日志，不重试
///
/// 返回是否发送成功
pub async fn dispatch(notifier: Option<&dyn Notifier>, message: &str) -> bool {
    let Some(notifier) = notifier else {
        info!("未配置推送通知凭据，跳过通知");
        return false;
    };

    match notifier.send(message).await {
        Ok(()) => {
            info!("📨 备份摘要已推送");
            true
        }
        Err(e) => {
            warn!("⚠️  推送通知失败: {}", e);
            false
        }
    }
}
