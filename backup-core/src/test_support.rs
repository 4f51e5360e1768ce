//! 测试替身：内存中的容器运行时、归档器、远程同步和通知

use crate::archive::Archiver;
use crate::container::{ContainerRuntime, Workload, WorkloadId};
use crate::constants::command;
use crate::notify::Notifier;
use crate::replication::{RemoteSync, SyncOutput};
use crate::{BackupError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    Inspect(String),
    Stop(String),
    Start(String),
    Poll(String),
}

#[derive(Debug)]
struct Container {
    id: String,
    name: String,
    running: bool,
    /// 启动后还需要多少次轮询才报告运行中
    pending_polls: Option<usize>,
}

#[derive(Debug, Default)]
struct RuntimeState {
    containers: Vec<Container>,
    events: Vec<RuntimeEvent>,
    fail_inspect: HashSet<String>,
    fail_stop: HashSet<String>,
    fail_start: HashSet<String>,
    never_ready: HashSet<String>,
    ready_after: HashMap<String, usize>,
    unreachable: bool,
}

#[derive(Debug, Default)]
pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
}

impl FakeRuntime {
    /// 所有容器初始为运行中，ID 为 `id-<name>`
    pub fn new(names: &[&str]) -> Self {
        let containers = names
            .iter()
            .map(|name| Container {
                id: format!("id-{name}"),
                name: name.to_string(),
                running: true,
                pending_polls: None,
            })
            .collect();

        Self {
            state: Mutex::new(RuntimeState {
                containers,
                ..Default::default()
            }),
        }
    }

    pub fn workloads(&self) -> Vec<Workload> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .iter()
            .filter(|c| c.running)
            .map(|c| Workload::running(c.id.clone(), c.name.clone()))
            .collect()
    }

    pub fn events(&self) -> Vec<RuntimeEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn running_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .iter()
            .filter(|c| c.running)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn stop_all(&self) {
        let mut state = self.state.lock().unwrap();
        for container in &mut state.containers {
            container.running = false;
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn fail_inspect(&self, name: &str) {
        self.state.lock().unwrap().fail_inspect.insert(name.to_string());
    }

    pub fn fail_stop(&self, name: &str) {
        self.state.lock().unwrap().fail_stop.insert(name.to_string());
    }

    pub fn fail_start(&self, name: &str) {
        self.state.lock().unwrap().fail_start.insert(name.to_string());
    }

    /// 启动命令成功，但容器永远不会报告运行中
    pub fn never_ready(&self, name: &str) {
        self.state.lock().unwrap().never_ready.insert(name.to_string());
    }

    /// 启动后第 `polls` 次轮询才报告运行中
    pub fn ready_after(&self, name: &str, polls: usize) {
        self.state
            .lock()
            .unwrap()
            .ready_after
            .insert(name.to_string(), polls);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_running(&self) -> Result<Vec<Workload>> {
        if self.state.lock().unwrap().unreachable {
            return Err(BackupError::runtime("Cannot connect to the Docker daemon"));
        }
        Ok(self.workloads())
    }

    async fn inspect(&self, id: &WorkloadId) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        let name = state
            .containers
            .iter()
            .find(|c| c.id == id.as_str())
            .map(|c| c.name.clone())
            .ok_or_else(|| BackupError::runtime(format!("no such container: {id}")))?;
        state.events.push(RuntimeEvent::Inspect(name.clone()));

        if state.fail_inspect.contains(&name) {
            return Err(BackupError::runtime(format!("inspect {name} failed")));
        }
        Ok(format!("[{{\"Id\":\"{id}\",\"Name\":\"{name}\"}}]").into_bytes())
    }

    async fn stop(&self, id: &WorkloadId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .containers
            .iter()
            .position(|c| c.id == id.as_str())
            .ok_or_else(|| BackupError::runtime(format!("no such container: {id}")))?;
        let name = state.containers[index].name.clone();
        state.events.push(RuntimeEvent::Stop(name.clone()));

        if state.fail_stop.contains(&name) {
            return Err(BackupError::runtime(format!("stop {name} failed")));
        }
        state.containers[index].running = false;
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(RuntimeEvent::Start(name.to_string()));

        if state.fail_start.contains(name) {
            return Err(BackupError::runtime(format!("start {name} failed")));
        }

        let never_ready = state.never_ready.contains(name);
        let ready_after = state.ready_after.get(name).copied();
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| BackupError::runtime(format!("no such container: {name}")))?;

        if never_ready {
            container.running = false;
        } else if let Some(polls) = ready_after {
            container.pending_polls = Some(polls);
        } else {
            container.running = true;
        }
        Ok(())
    }

    async fn is_running(&self, name: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.events.push(RuntimeEvent::Poll(name.to_string()));

        let container = state
            .containers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| BackupError::runtime(format!("no such container: {name}")))?;

        if let Some(remaining) = container.pending_polls {
            if remaining <= 1 {
                container.pending_polls = None;
                container.running = true;
            } else {
                container.pending_polls = Some(remaining - 1);
            }
        }
        Ok(container.running)
    }
}

/// 把输入路径列表写入输出文件的归档替身
#[derive(Debug, Default)]
pub struct FakeArchiver {
    fail_on: HashSet<String>,
    interrupt_on: Option<String>,
    calls: Mutex<Vec<(PathBuf, Vec<PathBuf>)>>,
}

impl FakeArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 归档名匹配时直接失败
    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            fail_on: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    /// 归档名匹配时写入一半数据后失败，模拟中途中断
    pub fn interrupting_on(name: &str) -> Self {
        Self {
            interrupt_on: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, Vec<PathBuf>)> {
        self.calls.lock().unwrap().clone()
    }
}

/// 暂存文件名带有任务序号前缀（`0-docker_backup.tar.gz`），匹配时去掉前缀
fn archive_name(output: &Path) -> String {
    let file_name = output
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match file_name.split_once('-') {
        Some((index, rest)) if index.parse::<usize>().is_ok() => rest.to_string(),
        _ => file_name,
    }
}

#[async_trait]
impl Archiver for FakeArchiver {
    async fn create_archive(&self, output: &Path, inputs: &[PathBuf]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((output.to_path_buf(), inputs.to_vec()));

        let name = archive_name(output);

        if self.fail_on.contains(&name) {
            return Err(BackupError::archive(format!("{name}: tar exited with status 2")));
        }
        if self.interrupt_on.as_deref() == Some(name.as_str()) {
            std::fs::write(output, b"\x1f\x8b partial")?;
            return Err(BackupError::archive(format!("{name}: interrupted")));
        }

        let listing: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
        std::fs::write(output, listing.join("\n"))?;
        Ok(())
    }
}

#[derive(Debug)]
enum SyncBehavior {
    Output(SyncOutput),
    Unreachable,
}

/// 记录复制请求的远程同步替身
#[derive(Debug)]
pub struct FakeSync {
    behavior: SyncBehavior,
    copies: Mutex<Vec<(PathBuf, String)>>,
}

impl FakeSync {
    fn with(behavior: SyncBehavior) -> Self {
        Self {
            behavior,
            copies: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::with(SyncBehavior::Output(SyncOutput {
            exit_success: Some(true),
            output: "Transferred: 2 / 2, 100%".to_string(),
        }))
    }

    /// 没有退出码、输出中包含失败标记
    pub fn failing_with_marker() -> Self {
        Self::with(SyncBehavior::Output(SyncOutput {
            exit_success: None,
            output: format!("ERROR : docker_backup.tar.gz: {}: quota exceeded", command::RCLONE_FAILURE_MARKER),
        }))
    }

    pub fn unreachable() -> Self {
        Self::with(SyncBehavior::Unreachable)
    }

    pub fn copies(&self) -> Vec<(PathBuf, String)> {
        self.copies.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSync for FakeSync {
    async fn copy(&self, local: &Path, remote: &str) -> Result<SyncOutput> {
        self.copies
            .lock()
            .unwrap()
            .push((local.to_path_buf(), remote.to_string()));

        match &self.behavior {
            SyncBehavior::Output(output) => Ok(output.clone()),
            SyncBehavior::Unreachable => Err(BackupError::sync("rclone not found")),
        }
    }
}

/// 记录消息的通知替身
#[derive(Debug, Default)]
pub struct FakeNotifier {
    fail: bool,
    messages: Mutex<Vec<String>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            return Err(BackupError::notify("401 Unauthorized"));
        }
        Ok(())
    }
}
