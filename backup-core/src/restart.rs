//! 两阶段容器重启
//!
//! 第一阶段按优先级列表依次启动，每个容器确认运行后才启动下一个；
//! 第二阶段并发启动其余容器，不等待确认。
//! 第一阶段的等待有超时上限，超时的容器记为 `TimedOut`，随后继续处理下一个容器，
//! 此时顺序保证只对已确认运行的容器成立。

use crate::container::ContainerRuntime;
use crate::{BackupError, Result};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// 单个容器的重启状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum RestartState {
    NotStarted,
    /// 已发出启动命令，尚未确认运行
    Starting,
    ConfirmedRunning,
    /// 超时仍未确认运行
    TimedOut,
    Failed(String),
}

impl RestartState {
    pub fn is_degraded(&self) -> bool {
        matches!(self, RestartState::TimedOut | RestartState::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPhase {
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadRestart {
    pub name: String,
    pub phase: RestartPhase,
    pub state: RestartState,
}

/// 重启计划
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestartPlan {
    /// 按优先级顺序启动并确认的容器
    pub ordered: Vec<String>,
    /// 其余容器，无顺序要求
    pub unordered: Vec<String>,
    /// 优先级列表中备份前未运行、因此跳过的容器
    pub skipped: Vec<String>,
}

impl RestartPlan {
    /// 根据优先级列表和备份前运行中的容器生成计划
    ///
    /// 每个备份前运行中的容器恰好出现一次；不在运行集合中的优先级条目被跳过
    pub fn build(priority: &[String], previously_running: &[String]) -> Self {
        let running: HashSet<&str> = previously_running.iter().map(String::as_str).collect();
        let mut planned: HashSet<&str> = HashSet::new();
        let mut plan = RestartPlan::default();

        for name in priority {
            if running.contains(name.as_str()) {
                if planned.insert(name.as_str()) {
                    plan.ordered.push(name.clone());
                }
            } else if !plan.skipped.contains(name) {
                plan.skipped.push(name.clone());
            }
        }

        for name in previously_running {
            if planned.insert(name.as_str()) {
                plan.unordered.push(name.clone());
            }
        }

        plan
    }

    pub fn len(&self) -> usize {
        self.ordered.len() + self.unordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 重启阶段结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct RestartReport {
    pub outcomes: Vec<WorkloadRestart>,
    pub skipped: Vec<String>,
}

impl RestartReport {
    pub fn degraded(&self) -> Vec<&WorkloadRestart> {
        self.outcomes.iter().filter(|o| o.state.is_degraded()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.degraded().is_empty()
    }

    pub fn state_of(&self, name: &str) -> Option<&RestartState> {
        self.outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| &o.state)
    }
}

/// 重启控制器
pub struct RestartController<'a> {
    runtime: &'a dyn ContainerRuntime,
    poll_interval: Duration,
    confirm_timeout: Duration,
}

impl<'a> RestartController<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        poll_interval: Duration,
        confirm_timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            poll_interval,
            confirm_timeout,
        }
    }

    #[instrument(skip_all, fields(ordered = plan.ordered.len(), unordered = plan.unordered.len()))]
    pub async fn execute(&self, plan: &RestartPlan) -> RestartReport {
        let mut report = RestartReport {
            outcomes: Vec::with_capacity(plan.len()),
            skipped: plan.skipped.clone(),
        };

        for name in &plan.skipped {
            debug!("优先级容器 {} 备份前未运行，跳过", name);
        }

        info!("🔄 按顺序重启 {} 个容器...", plan.ordered.len());
        for name in &plan.ordered {
            let state = self.start_and_confirm(name).await;
            report.outcomes.push(WorkloadRestart {
                name: name.clone(),
                phase: RestartPhase::Ordered,
                state,
            });
        }

        info!("🔄 重启其余 {} 个容器...", plan.unordered.len());
        let unordered = join_all(plan.unordered.iter().map(|name| async move {
            info!("启动容器 {}...", name);
            let state = match self.runtime.start(name).await {
                Ok(()) => RestartState::Starting,
                Err(e) => {
                    warn!("⚠️  启动容器 {} 失败: {}", name, e);
                    RestartState::Failed(e.to_string())
                }
            };
            WorkloadRestart {
                name: name.clone(),
                phase: RestartPhase::Unordered,
                state,
            }
        }))
        .await;
        report.outcomes.extend(unordered);

        report
    }

    async fn start_and_confirm(&self, name: &str) -> RestartState {
        info!("启动容器 {}...", name);
        if let Err(e) = self.runtime.start(name).await {
            warn!("⚠️  启动容器 {} 失败: {}", name, e);
            return RestartState::Failed(e.to_string());
        }

        match self.wait_until_running(name).await {
            Ok(()) => {
                info!("✅ 容器 {} 已运行", name);
                RestartState::ConfirmedRunning
            }
            Err(e) => {
                warn!("⚠️  {}，继续启动后续容器", e);
                RestartState::TimedOut
            }
        }
    }

    /// 轮询直到容器报告运行中，超过确认超时时间返回错误
    async fn wait_until_running(&self, name: &str) -> Result<()> {
        let poll = async {
            loop {
                match self.runtime.is_running(name).await {
                    Ok(true) => return,
                    Ok(false) => info!("等待容器 {} 启动...", name),
                    Err(e) => debug!("查询容器 {} 状态失败: {}", name, e),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        tokio::time::timeout(self.confirm_timeout, poll)
            .await
            .map_err(|_| BackupError::Timeout {
                operation: format!("等待容器 {name} 启动"),
                timeout_seconds: self.confirm_timeout.as_secs(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRuntime, RuntimeEvent};

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn controller(runtime: &FakeRuntime) -> RestartController<'_> {
        RestartController::new(
            runtime,
            Duration::from_millis(5),
            Duration::from_millis(200),
        )
    }

    fn position(events: &[RuntimeEvent], target: &RuntimeEvent) -> usize {
        events
            .iter()
            .position(|e| e == target)
            .unwrap_or_else(|| panic!("missing event {target:?}"))
    }

    #[test]
    fn test_plan_skips_absent_priority_names() {
        let plan = RestartPlan::build(&names(&["B", "D"]), &names(&["A", "B", "C"]));
        assert_eq!(plan.ordered, names(&["B"]));
        assert_eq!(plan.unordered, names(&["A", "C"]));
        assert_eq!(plan.skipped, names(&["D"]));
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_plan_each_workload_exactly_once() {
        let plan = RestartPlan::build(&names(&["c", "a", "c"]), &names(&["a", "b", "c"]));
        assert_eq!(plan.ordered, names(&["c", "a"]));
        assert_eq!(plan.unordered, names(&["b"]));
    }

    #[test]
    fn test_empty_plan() {
        let plan = RestartPlan::build(&names(&["a"]), &[]);
        assert!(plan.is_empty());
        assert_eq!(plan.skipped, names(&["a"]));
    }

    #[tokio::test]
    async fn test_ordered_phase_respects_priority_not_inventory_order() {
        let runtime = FakeRuntime::new(&["a", "b", "c"]);
        runtime.stop_all();
        runtime.ready_after("c", 3);

        let plan = RestartPlan::build(&names(&["c", "a"]), &names(&["a", "b", "c"]));
        let report = controller(&runtime).execute(&plan).await;

        let events = runtime.events();
        let start_c = position(&events, &RuntimeEvent::Start("c".into()));
        let start_a = position(&events, &RuntimeEvent::Start("a".into()));
        let start_b = position(&events, &RuntimeEvent::Start("b".into()));
        let last_poll_c = events
            .iter()
            .rposition(|e| *e == RuntimeEvent::Poll("c".into()))
            .unwrap();

        assert!(start_c < last_poll_c);
        assert!(last_poll_c < start_a);
        assert!(start_a < start_b);
        assert_eq!(report.state_of("c"), Some(&RestartState::ConfirmedRunning));
        assert_eq!(report.state_of("a"), Some(&RestartState::ConfirmedRunning));
        assert_eq!(report.state_of("b"), Some(&RestartState::Starting));
        assert!(report.is_clean());
        assert_eq!(runtime.running_names(), names(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_timeout_is_reported_and_restart_continues() {
        let runtime = FakeRuntime::new(&["broker", "consumer", "web"]);
        runtime.stop_all();
        runtime.never_ready("broker");

        let plan = RestartPlan::build(
            &names(&["broker", "consumer"]),
            &names(&["broker", "consumer", "web"]),
        );
        let report = controller(&runtime).execute(&plan).await;

        assert_eq!(report.state_of("broker"), Some(&RestartState::TimedOut));
        assert_eq!(
            report.state_of("consumer"),
            Some(&RestartState::ConfirmedRunning)
        );
        assert_eq!(report.state_of("web"), Some(&RestartState::Starting));
        assert_eq!(report.degraded().len(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_does_not_block_others() {
        let runtime = FakeRuntime::new(&["a", "b", "c"]);
        runtime.stop_all();
        runtime.fail_start("a");
        runtime.fail_start("c");

        let plan = RestartPlan::build(&names(&["a"]), &names(&["a", "b", "c"]));
        let report = controller(&runtime).execute(&plan).await;

        assert!(matches!(report.state_of("a"), Some(RestartState::Failed(_))));
        assert!(matches!(report.state_of("c"), Some(RestartState::Failed(_))));
        assert_eq!(report.state_of("b"), Some(&RestartState::Starting));
        assert_eq!(runtime.running_names(), names(&["b"]));
    }
}
