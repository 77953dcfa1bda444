//! Artifact installer state machine
//!
//! Generalized install procedure for a versioned binary artifact on a
//! remote host: prerequisite gate → fetch → extract → install →
//! credentials → verify. Every step is idempotent (overwrite-by-copy);
//! there is no rollback anywhere — re-running the machine from the
//! start is the recovery mechanism.

use crate::arch::map_arch;
use crate::auth::render_auth_config;
use crate::error::{BootstrapError, Result};
use crate::state::{BootstrapReport, BootstrapState};
use convoy_core::{BootstrapSpec, RemoteChannel, SecretStore};
use flate2::read::GzDecoder;
use std::time::Duration;

/// Staging prefix on the target host for uploaded files
const STAGING_PREFIX: &str = "/tmp/convoy-install";

/// Runs [`BootstrapSpec`] state machines against remote hosts
pub struct Installer {
    exec_timeout: Duration,
    download_timeout: Duration,
}

impl Default for Installer {
    fn default() -> Self {
        Self {
            exec_timeout: Duration::from_secs(120),
            download_timeout: Duration::from_secs(300),
        }
    }
}

impl Installer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    /// Run the full state machine on one host
    ///
    /// Terminal states are `verified` (Ok) or `failed` (Err). A failed
    /// prerequisite is a hard gate and surfaces as
    /// [`BootstrapError::PrerequisiteFailed`] so the engine can apply
    /// its gate policy.
    pub async fn run(
        &self,
        name: &str,
        spec: &BootstrapSpec,
        channel: &dyn RemoteChannel,
        secrets: &SecretStore,
    ) -> Result<BootstrapReport> {
        let mut report = BootstrapReport::new(channel.host(), name);

        // start → prerequisites_checked
        if let Some(socket) = &spec.prerequisite_socket {
            let out = channel
                .exec(&format!("test -S {}", socket), self.exec_timeout)
                .await?;
            if !out.success() {
                let message = format!("runtime control socket {} is absent", socket);
                report.fail(&message);
                return Err(BootstrapError::PrerequisiteFailed {
                    host: channel.host().to_string(),
                    message,
                });
            }
        }
        report.reach(BootstrapState::PrerequisitesChecked, "prerequisites satisfied");

        // Architecture comes from host facts, artifact naming needs it
        let out = channel.exec("uname -m", self.exec_timeout).await?;
        if !out.success() {
            let message = format!("uname -m exited with {}", out.status);
            report.fail(&message);
            return Err(BootstrapError::FactsFailed {
                host: channel.host().to_string(),
                message,
            });
        }
        let arch = map_arch(&out.stdout);

        // prerequisites_checked → artifact_fetched
        let url = spec
            .artifact
            .replace("{version}", &spec.version)
            .replace("{arch}", &arch);
        let bytes = match self.fetch_artifact(&url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                report.fail(e.to_string());
                return Err(e);
            }
        };
        report.reach(
            BootstrapState::ArtifactFetched,
            format!("{} ({} bytes)", url, bytes.len()),
        );

        // artifact_fetched → artifact_extracted
        let binaries = match extract_binaries(&bytes, &spec.binaries) {
            Ok(binaries) => binaries,
            Err(e) => {
                report.fail(e.to_string());
                return Err(e);
            }
        };
        report.reach(
            BootstrapState::ArtifactExtracted,
            format!("{} binaries extracted", binaries.len()),
        );

        // artifact_extracted → binaries_installed (overwrite-by-copy)
        for (bin_name, data) in &binaries {
            let staging = format!("{}-{}", STAGING_PREFIX, bin_name);
            channel
                .upload(data, &staging, self.download_timeout)
                .await?;

            let command = format!(
                "mkdir -p {dir} && install -m 0755 {staging} {dir}/{bin}",
                dir = spec.install_dir,
                staging = staging,
                bin = bin_name
            );
            let out = channel.exec(&command, self.exec_timeout).await?;
            if !out.success() {
                let message = format!("install of {} exited with {}", bin_name, out.status);
                report.fail(&message);
                return Err(BootstrapError::InstallFailed {
                    host: channel.host().to_string(),
                    message,
                });
            }
        }
        report.reach(
            BootstrapState::BinariesInstalled,
            format!("installed to {}", spec.install_dir),
        );

        // binaries_installed → credentials_configured
        // Both branches (credentials present or not) are valid terminal
        // configurations, never a failure.
        if let Some(auth_file) = &spec.auth_file {
            let username = spec
                .username_secret
                .as_deref()
                .and_then(|key| secrets.lookup(key));
            let password = spec
                .password_secret
                .as_deref()
                .and_then(|key| secrets.lookup(key));
            let configured = username.is_some() && password.is_some();

            let content = render_auth_config(
                spec.registry.as_deref(),
                username.as_deref(),
                password.as_deref(),
            )?;
            let staging = format!("{}-auth.json", STAGING_PREFIX);
            channel
                .upload(content.as_bytes(), &staging, self.exec_timeout)
                .await?;

            let parent = auth_file.rsplit_once('/').map(|(d, _)| d).unwrap_or(".");
            let command = format!(
                "mkdir -p {} && install -m 0600 {} {}",
                parent, staging, auth_file
            );
            let out = channel.exec(&command, self.exec_timeout).await?;
            if !out.success() {
                let message = format!("credential file install exited with {}", out.status);
                report.fail(&message);
                return Err(BootstrapError::InstallFailed {
                    host: channel.host().to_string(),
                    message,
                });
            }

            report.reach(
                BootstrapState::CredentialsConfigured,
                if configured {
                    "registry credentials configured"
                } else {
                    "empty credential file written"
                },
            );
        } else {
            report.reach(
                BootstrapState::CredentialsConfigured,
                "no credential file declared",
            );
        }

        // credentials_configured → verified
        let mut failures = Vec::new();
        for bin_name in &spec.binaries {
            let out = channel
                .exec(
                    &format!("{}/{} --version", spec.install_dir, bin_name),
                    self.exec_timeout,
                )
                .await?;
            if !out.success() {
                failures.push(format!("{}: exit {}", bin_name, out.status));
            }
        }

        // Cleanup of staging files is best-effort and never affects the
        // state classification.
        let _ = channel
            .exec(&format!("rm -f {}-*", STAGING_PREFIX), self.exec_timeout)
            .await;

        if failures.is_empty() {
            report.reach(BootstrapState::Verified, "all self-checks passed");
            Ok(report)
        } else {
            let message = failures.join("; ");
            report.fail(&message);
            Err(BootstrapError::VerificationFailed(message))
        }
    }

    /// Side-effect-free check: is the declared version already
    /// installed and passing its self-checks?
    pub async fn is_installed(
        &self,
        spec: &BootstrapSpec,
        channel: &dyn RemoteChannel,
    ) -> Result<bool> {
        for bin_name in &spec.binaries {
            let path = format!("{}/{}", spec.install_dir, bin_name);

            let out = channel
                .exec(&format!("test -x {}", path), self.exec_timeout)
                .await?;
            if !out.success() {
                return Ok(false);
            }

            let out = channel
                .exec(&format!("{} --version", path), self.exec_timeout)
                .await?;
            if !out.success() || !out.stdout.contains(&spec.version) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn fetch_artifact(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let client = reqwest::Client::builder()
                .timeout(self.download_timeout)
                .build()
                .map_err(|e| BootstrapError::DownloadFailed(e.to_string()))?;

            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| BootstrapError::DownloadFailed(e.to_string()))?;

            if !response.status().is_success() {
                return Err(BootstrapError::DownloadFailed(format!(
                    "{} returned HTTP {}",
                    url,
                    response.status()
                )));
            }

            Ok(response
                .bytes()
                .await
                .map_err(|e| BootstrapError::DownloadFailed(e.to_string()))?
                .to_vec())
        } else {
            // 検証済みミラーを置いた air-gapped 環境向けのローカルパス
            let path = url.strip_prefix("file://").unwrap_or(url);
            tokio::fs::read(path)
                .await
                .map_err(|e| BootstrapError::DownloadFailed(format!("{}: {}", path, e)))
        }
    }
}

/// Extract the named binaries from a gzipped tar artifact
fn extract_binaries(bytes: &[u8], names: &[String]) -> Result<Vec<(String, Vec<u8>)>> {
    let scratch = tempfile::tempdir()?;

    let decoder = GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(scratch.path())
        .map_err(|e| BootstrapError::ExtractFailed(e.to_string()))?;

    let mut binaries = Vec::new();
    for name in names {
        // Release tarballs ship binaries under bin/, some flat
        let candidates = [scratch.path().join("bin").join(name), scratch.path().join(name)];
        let path = candidates
            .iter()
            .find(|p| p.is_file())
            .ok_or_else(|| BootstrapError::MissingBinary(name.clone()))?;
        binaries.push((name.clone(), std::fs::read(path)?));
    }

    Ok(binaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use convoy_core::ExecOutput;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::collections::{HashMap, HashSet};
    use std::io::Write;
    use std::sync::Mutex;

    /// In-memory channel: tracks uploads, replays a tiny shell
    struct FakeChannel {
        files: Mutex<HashMap<String, Vec<u8>>>,
        execs: Mutex<Vec<String>>,
        sockets: HashSet<String>,
        fail_verify: HashSet<String>,
    }

    impl FakeChannel {
        fn new() -> Self {
            Self {
                files: Mutex::new(HashMap::new()),
                execs: Mutex::new(Vec::new()),
                sockets: HashSet::new(),
                fail_verify: HashSet::new(),
            }
        }

        fn with_socket(mut self, socket: &str) -> Self {
            self.sockets.insert(socket.to_string());
            self
        }

        fn with_failing_verify(mut self, binary: &str) -> Self {
            self.fail_verify.insert(binary.to_string());
            self
        }

        fn ok(stdout: &str) -> ExecOutput {
            ExecOutput {
                status: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            }
        }

        fn status(code: i32) -> ExecOutput {
            ExecOutput {
                status: code,
                stdout: String::new(),
                stderr: String::new(),
            }
        }

        fn run_one(&self, command: &str) -> ExecOutput {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.as_slice() {
                ["test", "-S", path] => {
                    Self::status(if self.sockets.contains(*path) { 0 } else { 1 })
                }
                ["test", "-x", path] => Self::status(
                    if self.files.lock().unwrap().contains_key(*path) {
                        0
                    } else {
                        1
                    },
                ),
                ["uname", "-m"] => Self::ok("x86_64\n"),
                ["mkdir", "-p", _] => Self::status(0),
                ["rm", "-f", _] => Self::status(0),
                ["install", "-m", _, src, dst] => {
                    let mut files = self.files.lock().unwrap();
                    match files.get(*src).cloned() {
                        Some(data) => {
                            files.insert(dst.to_string(), data);
                            Self::status(0)
                        }
                        None => Self::status(1),
                    }
                }
                [binary, "--version"] => {
                    let name = binary.rsplit('/').next().unwrap_or(binary);
                    if self.fail_verify.contains(name) {
                        Self::status(1)
                    } else if self.files.lock().unwrap().contains_key(*binary) {
                        Self::ok(&format!("{} v0.13.2", name))
                    } else {
                        Self::status(127)
                    }
                }
                _ => Self::status(127),
            }
        }
    }

    #[async_trait]
    impl RemoteChannel for FakeChannel {
        fn host(&self) -> &str {
            "10.0.0.2"
        }

        async fn exec(&self, command: &str, _timeout: Duration) -> convoy_core::Result<ExecOutput> {
            self.execs.lock().unwrap().push(command.to_string());
            let mut last = FakeChannel::status(0);
            for part in command.split(" && ") {
                last = self.run_one(part);
                if last.status != 0 {
                    break;
                }
            }
            Ok(last)
        }

        async fn upload(
            &self,
            data: &[u8],
            remote_path: &str,
            _timeout: Duration,
        ) -> convoy_core::Result<()> {
            self.files
                .lock()
                .unwrap()
                .insert(remote_path.to_string(), data.to_vec());
            Ok(())
        }
    }

    /// Build a buildkit-shaped release tarball on disk
    fn make_artifact(dir: &std::path::Path) -> String {
        let path = dir.join("buildkit-v0.13.2.linux-amd64.tar.gz");
        let file = std::fs::File::create(&path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for name in ["buildkitd", "buildctl"] {
            let data = format!("fake {} binary", name);
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("bin/{}", name), data.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();

        path.display().to_string()
    }

    fn spec(artifact: String) -> BootstrapSpec {
        BootstrapSpec {
            version: "0.13.2".to_string(),
            artifact,
            install_dir: "/usr/local/bin".to_string(),
            binaries: vec!["buildkitd".to_string(), "buildctl".to_string()],
            prerequisite_socket: Some("/run/user/1000/podman/podman.sock".to_string()),
            auth_file: Some("/home/build/.docker/config.json".to_string()),
            registry: Some("ghcr.io".to_string()),
            username_secret: Some("REGISTRY_USER".to_string()),
            password_secret: Some("REGISTRY_PASS".to_string()),
        }
    }

    #[tokio::test]
    async fn test_gate_failure_runs_no_further_step() {
        let scratch = tempfile::tempdir().unwrap();
        let channel = FakeChannel::new(); // socket absent
        let installer = Installer::new();

        let result = installer
            .run(
                "buildkit",
                &spec(make_artifact(scratch.path())),
                &channel,
                &SecretStore::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(BootstrapError::PrerequisiteFailed { .. })
        ));
        // Only the gate check ran; nothing was fetched or uploaded
        assert_eq!(channel.execs.lock().unwrap().len(), 1);
        assert!(channel.files.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_run_reaches_verified() {
        let scratch = tempfile::tempdir().unwrap();
        let channel = FakeChannel::new().with_socket("/run/user/1000/podman/podman.sock");
        let installer = Installer::new();

        let report = installer
            .run(
                "buildkit",
                &spec(make_artifact(scratch.path())),
                &channel,
                &SecretStore::new(),
            )
            .await
            .unwrap();

        assert!(report.is_verified());
        let states: Vec<BootstrapState> = report.steps.iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![
                BootstrapState::PrerequisitesChecked,
                BootstrapState::ArtifactFetched,
                BootstrapState::ArtifactExtracted,
                BootstrapState::BinariesInstalled,
                BootstrapState::CredentialsConfigured,
                BootstrapState::Verified,
            ]
        );

        let files = channel.files.lock().unwrap();
        assert!(files.contains_key("/usr/local/bin/buildkitd"));
        assert!(files.contains_key("/usr/local/bin/buildctl"));

        // No secrets resolved: the credential file holds an empty map
        let auth = String::from_utf8(files["/home/build/.docker/config.json"].clone()).unwrap();
        let parsed: crate::auth::RegistryAuthConfig = serde_json::from_str(&auth).unwrap();
        assert!(parsed.auths.is_empty());
    }

    #[tokio::test]
    async fn test_credentials_written_when_both_secrets_resolve() {
        let scratch = tempfile::tempdir().unwrap();
        let channel = FakeChannel::new().with_socket("/run/user/1000/podman/podman.sock");
        let installer = Installer::new();

        let mut secrets = SecretStore::new();
        secrets.set_override("REGISTRY_USER", "builder");
        secrets.set_override("REGISTRY_PASS", "s3cret");

        let report = installer
            .run(
                "buildkit",
                &spec(make_artifact(scratch.path())),
                &channel,
                &secrets,
            )
            .await
            .unwrap();

        assert!(report.is_verified());

        let files = channel.files.lock().unwrap();
        let auth = String::from_utf8(files["/home/build/.docker/config.json"].clone()).unwrap();
        let parsed: crate::auth::RegistryAuthConfig = serde_json::from_str(&auth).unwrap();
        assert_eq!(parsed.auths.len(), 1);
        assert!(parsed.auths.contains_key("ghcr.io"));
    }

    #[tokio::test]
    async fn test_verification_failure_does_not_roll_back() {
        let scratch = tempfile::tempdir().unwrap();
        let channel = FakeChannel::new()
            .with_socket("/run/user/1000/podman/podman.sock")
            .with_failing_verify("buildctl");
        let installer = Installer::new();

        let result = installer
            .run(
                "buildkit",
                &spec(make_artifact(scratch.path())),
                &channel,
                &SecretStore::new(),
            )
            .await;

        match result {
            Err(BootstrapError::VerificationFailed(message)) => {
                assert!(message.contains("buildctl"));
                assert!(!message.contains("buildkitd"));
            }
            other => panic!("unexpected: {:?}", other),
        }

        // Installed binaries stay in place
        let files = channel.files.lock().unwrap();
        assert!(files.contains_key("/usr/local/bin/buildkitd"));
        assert!(files.contains_key("/usr/local/bin/buildctl"));
    }

    #[tokio::test]
    async fn test_is_installed_detects_converged_host() {
        let scratch = tempfile::tempdir().unwrap();
        let channel = FakeChannel::new().with_socket("/run/user/1000/podman/podman.sock");
        let installer = Installer::new();
        let spec = spec(make_artifact(scratch.path()));

        assert!(!installer.is_installed(&spec, &channel).await.unwrap());

        installer
            .run("buildkit", &spec, &channel, &SecretStore::new())
            .await
            .unwrap();

        assert!(installer.is_installed(&spec, &channel).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_binary_in_artifact() {
        let scratch = tempfile::tempdir().unwrap();
        let channel = FakeChannel::new().with_socket("/run/user/1000/podman/podman.sock");
        let installer = Installer::new();

        let mut spec = spec(make_artifact(scratch.path()));
        spec.binaries.push("qemu-runner".to_string());

        let result = installer
            .run("buildkit", &spec, &channel, &SecretStore::new())
            .await;

        assert!(matches!(result, Err(BootstrapError::MissingBinary(name)) if name == "qemu-runner"));
    }
}
