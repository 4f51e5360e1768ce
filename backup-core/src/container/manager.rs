use super::types::DockerCli;
use crate::constants::command;

impl DockerCli {
    /// 使用 PATH 中的 docker 命令
    pub fn new() -> Self {
        Self::with_binary(command::DOCKER_BIN)
    }

    /// 指定 docker 可执行文件（例如 podman 或绝对路径）
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}
