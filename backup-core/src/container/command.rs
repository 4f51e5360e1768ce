use super::runtime::ContainerRuntime;
use super::types::{DockerCli, Workload, WorkloadId};
use crate::{BackupError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// `docker ps --format '{{json .}}'` 的单行输出
#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "State", default)]
    state: Option<String>,
}

impl DockerCli {
    /// 检查 docker 命令是否可用以及 Docker 服务是否运行
    pub async fn check_available(&self) -> Result<()> {
        // 检查 docker 命令
        if which::which(&self.binary).is_err() {
            return Err(BackupError::runtime(format!(
                "{} 未安装或不在 PATH 中",
                self.binary
            )));
        }

        // 检查 Docker 服务是否运行
        let output = self.run_docker_command(&["info"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackupError::runtime(format!("Docker 服务未运行: {stderr}")));
        }

        Ok(())
    }

    /// 执行 docker 命令
    pub(crate) async fn run_docker_command(&self, args: &[&str]) -> Result<std::process::Output> {
        debug!("执行: {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BackupError::runtime(format!("无法执行 {}: {e}", self.binary)))?;

        Ok(output)
    }

    /// 执行 docker 命令，失败时把 stderr 包装为错误
    async fn run_checked(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = self.run_docker_command(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackupError::runtime(format!(
                "{action}失败: {}",
                stderr.trim()
            )));
        }
        Ok(output)
    }

    /// 解析 `docker ps` 的 JSON 行输出
    pub(crate) fn parse_ps_output(&self, output: &str) -> Result<Vec<Workload>> {
        let mut workloads = Vec::new();

        for line in output.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let ps: PsLine = serde_json::from_str(line)?;
            // 多个名称时以逗号分隔，取第一个
            let name = ps
                .names
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .trim_start_matches('/')
                .to_string();

            let running = ps
                .state
                .as_deref()
                .map(|s| s.eq_ignore_ascii_case("running"))
                .unwrap_or(true);

            workloads.push(Workload {
                id: WorkloadId(ps.id),
                name,
                running,
            });
        }

        Ok(workloads)
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list_running(&self) -> Result<Vec<Workload>> {
        let output = self
            .run_checked(&["ps", "--no-trunc", "--format", "{{json .}}"], "获取容器列表")
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let workloads = self.parse_ps_output(&stdout)?;
        Ok(workloads.into_iter().filter(|w| w.running).collect())
    }

    async fn inspect(&self, id: &WorkloadId) -> Result<Vec<u8>> {
        let output = self
            .run_checked(&["inspect", id.as_str()], &format!("获取容器 {} 配置", id.short()))
            .await?;
        Ok(output.stdout)
    }

    async fn stop(&self, id: &WorkloadId) -> Result<()> {
        self.run_checked(&["stop", id.as_str()], &format!("停止容器 {}", id.short()))
            .await?;
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.run_checked(&["start", name], &format!("启动容器 {name}"))
            .await?;
        Ok(())
    }

    async fn is_running(&self, name: &str) -> Result<bool> {
        let output = self
            .run_checked(
                &["inspect", "-f", "{{.State.Running}}", name],
                &format!("查询容器 {name} 状态"),
            )
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim() == "true")
    }
}
