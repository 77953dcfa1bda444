//! Remote execution channel
//!
//! All convergence-phase work happens on target hosts over an
//! authenticated channel. The default implementation shells out to
//! `ssh`/`scp` in BatchMode (key-based, never interactive); the trait
//! seam exists so the engine and bootstrap procedures can be driven
//! against an in-memory fake in tests.
//!
//! Every operation carries an explicit timeout. An elapsed timeout is a
//! failure, never an indefinite wait.

use crate::error::{ConvoyError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Result of one remote command
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Process exit code (-1 when terminated by signal)
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Authenticated remote-execution channel to a single host
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Address of the host this channel is bound to
    fn host(&self) -> &str;

    /// Run a command on the host. A non-zero exit status is returned in
    /// the output, not as an error; errors are reserved for transport
    /// failures and timeouts.
    async fn exec(&self, command: &str, timeout: Duration) -> Result<ExecOutput>;

    /// Upload a byte buffer to a path on the host
    async fn upload(&self, data: &[u8], remote_path: &str, timeout: Duration) -> Result<()>;
}

/// Creates channels for resolved hosts
pub trait ChannelFactory: Send + Sync {
    fn connect(&self, address: &str) -> Arc<dyn RemoteChannel>;
}

/// SSH channel backed by the system `ssh`/`scp` binaries
pub struct SshChannel {
    host: String,
    user: String,
    key_file: Option<PathBuf>,
}

impl SshChannel {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            key_file: None,
        }
    }

    pub fn with_key_file(mut self, key_file: impl Into<PathBuf>) -> Self {
        self.key_file = Some(key_file.into());
        self
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn base_args(&self, cmd: &mut Command) {
        cmd.arg("-o").arg("BatchMode=yes");
        cmd.arg("-o").arg("StrictHostKeyChecking=accept-new");
        if let Some(key) = &self.key_file {
            cmd.arg("-i").arg(key);
        }
    }

    async fn run_with_timeout(
        &self,
        mut cmd: Command,
        timeout: Duration,
    ) -> Result<std::process::Output> {
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ConvoyError::RemoteConnection(format!(
                "{}: {}",
                self.host, e
            ))),
            Err(_) => Err(ConvoyError::RemoteTimeout {
                host: self.host.clone(),
                seconds: timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl RemoteChannel for SshChannel {
    fn host(&self) -> &str {
        &self.host
    }

    async fn exec(&self, command: &str, timeout: Duration) -> Result<ExecOutput> {
        let mut cmd = Command::new("ssh");
        self.base_args(&mut cmd);
        cmd.arg(self.destination());
        cmd.arg("--").arg(command);

        tracing::debug!(host = %self.host, command = %command, "Running remote command");

        let output = self.run_with_timeout(cmd, timeout).await?;
        Ok(ExecOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn upload(&self, data: &[u8], remote_path: &str, timeout: Duration) -> Result<()> {
        // scp はローカルファイルしか送れないため一時ファイルを経由する
        let mut tmp = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut tmp, data)?;

        let mut cmd = Command::new("scp");
        self.base_args(&mut cmd);
        cmd.arg("-q");
        cmd.arg(tmp.path());
        cmd.arg(format!("{}:{}", self.destination(), remote_path));

        tracing::debug!(host = %self.host, remote_path = %remote_path, bytes = data.len(), "Uploading file");

        let output = self.run_with_timeout(cmd, timeout).await?;
        if !output.status.success() {
            return Err(ConvoyError::RemoteConnection(format!(
                "scp to {} failed: {}",
                self.host,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Factory producing [`SshChannel`]s with shared credentials
pub struct SshChannelFactory {
    pub user: String,
    pub key_file: Option<PathBuf>,
}

impl SshChannelFactory {
    pub fn new(user: impl Into<String>, key_file: Option<PathBuf>) -> Self {
        Self {
            user: user.into(),
            key_file,
        }
    }
}

impl ChannelFactory for SshChannelFactory {
    fn connect(&self, address: &str) -> Arc<dyn RemoteChannel> {
        let mut channel = SshChannel::new(address, self.user.clone());
        if let Some(key) = &self.key_file {
            channel = channel.with_key_file(key.clone());
        }
        Arc::new(channel)
    }
}
