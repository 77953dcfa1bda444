//! Shared test doubles: an in-memory remote channel with a tiny shell,
//! and an in-memory compute provider.

#![allow(dead_code)]

use async_trait::async_trait;
use convoy_cloud::{
    AuthStatus, CloudError, ComputeProvider, MachineState, MachineStatus, PollConfig,
    ProviderState, ResolvedHost,
};
use convoy_core::{ChannelFactory, ExecOutput, MachineSpec, RemoteChannel};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory host: files, systemd units, sockets, exec log
pub struct FakeChannel {
    host: String,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    /// unit -> (active, enabled)
    pub services: Mutex<HashMap<String, (bool, bool)>>,
    pub sockets: Mutex<HashSet<String>>,
    pub execs: Mutex<Vec<String>>,
}

impl FakeChannel {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            files: Mutex::new(HashMap::new()),
            services: Mutex::new(HashMap::new()),
            sockets: Mutex::new(HashSet::new()),
            execs: Mutex::new(Vec::new()),
        }
    }

    pub fn add_socket(&self, path: &str) {
        self.sockets.lock().unwrap().insert(path.to_string());
    }

    pub fn seed_file(&self, path: &str, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.execs
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.contains(needle))
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
            ["true"] => Self::status(0),
            ["test", "-S", path] => {
                let present = self.sockets.lock().unwrap().contains(*path)
                    || self.files.lock().unwrap().contains_key(*path);
                Self::status(if present { 0 } else { 1 })
            }
            ["test", flag, path] if *flag == "-e" || *flag == "-f" || *flag == "-x" => {
                Self::status(if self.has_file(path) { 0 } else { 1 })
            }
            ["cat", path] => match self.files.lock().unwrap().get(*path) {
                Some(data) => Self::ok(&String::from_utf8_lossy(data)),
                None => Self::status(1),
            },
            ["touch", path] => {
                self.seed_file(path, b"");
                Self::status(0)
            }
            ["mkdir", "-p", _] => Self::status(0),
            ["rm", "-f", _] => Self::status(0),
            ["chmod", _, _] => Self::status(0),
            ["uname", "-m"] => Self::ok("x86_64\n"),
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
            ["systemctl", "is-active", "--quiet", unit] => {
                let services = self.services.lock().unwrap();
                Self::status(if services.get(*unit).map(|s| s.0).unwrap_or(false) {
                    0
                } else {
                    3
                })
            }
            ["systemctl", "is-enabled", "--quiet", unit] => {
                let services = self.services.lock().unwrap();
                Self::status(if services.get(*unit).map(|s| s.1).unwrap_or(false) {
                    0
                } else {
                    1
                })
            }
            ["systemctl", "start", unit] => {
                self.services
                    .lock()
                    .unwrap()
                    .entry(unit.to_string())
                    .or_insert((false, false))
                    .0 = true;
                Self::status(0)
            }
            ["systemctl", "enable", unit] => {
                self.services
                    .lock()
                    .unwrap()
                    .entry(unit.to_string())
                    .or_insert((false, false))
                    .1 = true;
                Self::status(0)
            }
            ["systemctl", "stop", unit] => {
                if let Some(state) = self.services.lock().unwrap().get_mut(*unit) {
                    state.0 = false;
                }
                Self::status(0)
            }
            [binary, "--version"] => {
                let name = binary.rsplit('/').next().unwrap_or(binary);
                if self.has_file(binary) {
                    Self::ok(&format!("{} v0.13.2", name))
                } else {
                    Self::status(127)
                }
            }
            parts if parts.first() == Some(&"curl") => {
                // curl -fsSL --max-time N -o DEST URL
                match parts.iter().position(|p| *p == "-o") {
                    Some(i) if i + 1 < parts.len() => {
                        self.seed_file(parts[i + 1], b"downloaded");
                        Self::status(0)
                    }
                    _ => Self::status(2),
                }
            }
            _ => Self::status(127),
        }
    }
}

#[async_trait]
impl RemoteChannel for FakeChannel {
    fn host(&self) -> &str {
        &self.host
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
        self.seed_file(remote_path, data);
        Ok(())
    }
}

/// Hands out one shared FakeChannel per address
#[derive(Default)]
pub struct FakeChannelFactory {
    pub channels: Mutex<HashMap<String, Arc<FakeChannel>>>,
}

impl FakeChannelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(&self, address: &str) -> Arc<FakeChannel> {
        self.channels
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(FakeChannel::new(address)))
            .clone()
    }

    pub fn connected_count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    /// True if any connected host ran a command containing `needle`
    pub fn any_ran(&self, needle: &str) -> bool {
        self.channels
            .lock()
            .unwrap()
            .values()
            .any(|c| c.ran(needle))
    }
}

impl ChannelFactory for FakeChannelFactory {
    fn connect(&self, address: &str) -> Arc<dyn RemoteChannel> {
        self.host(address)
    }
}

/// In-memory compute provider: every create succeeds, addresses are
/// allocated sequentially.
pub struct FakeProvider {
    pub machines: Mutex<HashMap<String, MachineState>>,
    counter: AtomicU32,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            machines: Mutex::new(HashMap::new()),
            counter: AtomicU32::new(1),
        }
    }
}

#[async_trait]
impl ComputeProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn display_name(&self) -> &str {
        "Fake Cloud"
    }

    async fn check_auth(&self) -> convoy_cloud::Result<AuthStatus> {
        Ok(AuthStatus::ok("fake@example.com"))
    }

    async fn describe(&self) -> convoy_cloud::Result<ProviderState> {
        let mut state = ProviderState::new();
        for (name, machine) in self.machines.lock().unwrap().iter() {
            state.add(name.clone(), machine.clone());
        }
        Ok(state)
    }

    async fn create_machine(
        &self,
        name: &str,
        spec: &MachineSpec,
    ) -> convoy_cloud::Result<MachineState> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let state = MachineState::new(format!("fake-{}", n))
            .with_status(MachineStatus::Running)
            .with_attribute("tier", serde_json::json!(spec.tier))
            .with_attribute("cores", serde_json::json!(spec.cores))
            .with_attribute("memory_gb", serde_json::json!(spec.memory_gb))
            .with_attribute("image", serde_json::json!(spec.image))
            .with_attribute("subnet", serde_json::json!(spec.subnet))
            .with_attribute("internal_ip", serde_json::json!(format!("10.0.0.{}", n)))
            .with_attribute(
                "external_ip",
                serde_json::json!(format!("203.0.113.{}", n)),
            );
        self.machines
            .lock()
            .unwrap()
            .insert(name.to_string(), state.clone());
        Ok(state)
    }

    async fn update_machine(
        &self,
        _name: &str,
        _spec: &MachineSpec,
        current: &MachineState,
    ) -> convoy_cloud::Result<MachineState> {
        Ok(current.clone())
    }

    async fn destroy_machine(&self, name: &str) -> convoy_cloud::Result<()> {
        self.machines.lock().unwrap().remove(name);
        Ok(())
    }

    async fn resolve_addresses(
        &self,
        name: &str,
        _poll: &PollConfig,
    ) -> convoy_cloud::Result<ResolvedHost> {
        let machines = self.machines.lock().unwrap();
        let state = machines
            .get(name)
            .ok_or_else(|| CloudError::PlacementFailed {
                machine: name.to_string(),
                message: "no network interface allocated".to_string(),
            })?;
        Ok(ResolvedHost {
            name: name.to_string(),
            internal_address: state.get_attribute("internal_ip").unwrap(),
            external_address: state.get_attribute("external_ip").unwrap(),
            ready: true,
        })
    }
}

/// Build a buildkit-shaped release tarball and return its path
pub fn make_artifact(dir: &std::path::Path) -> String {
    use flate2::Compression;
    use flate2::write::GzEncoder;

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
