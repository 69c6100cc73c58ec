//! Launching and supervising bundle servers.
//!
//! [`build_launch_plan`] turns a manifest into a concrete command line for the
//! declared runtime. [`supervise`] runs it with inherited stdio, forwards
//! SIGINT and SIGTERM to the child and reports the child's exit code.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use crate::constants::{
    DEFAULT_NODE_COMMAND, PYTHON3_COMMAND, PYTHON_COMMAND, PYTHON_DEPS_DIR, PYTHONPATH_ENV,
};
use crate::error::{PakError, PakResult};
use crate::manifest::{Manifest, ServerKind};
use crate::vars::{substitute, substitute_args, substitute_env};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Everything needed to start a server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Program to execute.
    pub program: String,

    /// Arguments after substitution.
    pub args: Vec<String>,

    /// Complete child environment.
    pub env: BTreeMap<String, String>,

    /// Working directory (the cache directory).
    pub cwd: PathBuf,
}

/// Lifecycle of a supervised server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running { pid: Option<u32> },
    Exited(i32),
    Failed(String),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ProcessState {
    /// State after the child has been reaped. A missing code (killed by a
    /// signal) counts as 0.
    pub fn from_exit_status(status: ExitStatus) -> Self {
        Self::Exited(status.code().unwrap_or(0))
    }

    /// Exit code if the process has exited.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            _ => None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Build the launch plan for an extracted bundle.
///
/// `values` are the resolved user_config values, `ambient` the process
/// environment. `probe` reports whether a command can be run (used to pick a
/// python interpreter).
pub fn build_launch_plan(
    manifest: &Manifest,
    cache_dir: &Path,
    values: &BTreeMap<String, String>,
    ambient: &BTreeMap<String, String>,
    probe: &dyn Fn(&str) -> bool,
) -> PakResult<LaunchPlan> {
    let kind = manifest.server_kind()?;
    let dirname = cache_dir.to_string_lossy();
    let mcp_config = &manifest.server.mcp_config;
    let entry_path = cache_dir.join(&manifest.server.entry_point);

    let args = substitute_args(&mcp_config.args, &dirname, values);
    let command = mcp_config
        .command
        .as_deref()
        .map(|c| substitute(c, &dirname, values));

    let script_args = || {
        if args.is_empty() {
            vec![entry_path.to_string_lossy().into_owned()]
        } else {
            args.clone()
        }
    };

    let (program, args) = match kind {
        ServerKind::Binary => {
            make_executable(&entry_path);
            (entry_path.to_string_lossy().into_owned(), args.clone())
        }
        ServerKind::Node => (
            command.unwrap_or_else(|| DEFAULT_NODE_COMMAND.to_string()),
            script_args(),
        ),
        ServerKind::Python => {
            let program = match command {
                Some(c) if c != PYTHON_COMMAND => c,
                _ => pick_python(probe),
            };
            (program, script_args())
        }
    };

    let mut env = substitute_env(&mcp_config.env, &dirname, values);
    env.extend(ambient.iter().map(|(k, v)| (k.clone(), v.clone())));

    if kind == ServerKind::Python {
        env.insert(
            PYTHONPATH_ENV.to_string(),
            python_path(cache_dir, ambient.get(PYTHONPATH_ENV)),
        );
    }

    tracing::debug!(%kind, program = %program, ?args, "built launch plan");

    Ok(LaunchPlan {
        program,
        args,
        env,
        cwd: cache_dir.to_path_buf(),
    })
}

/// Run the plan to completion and return the child's exit code.
pub async fn supervise(plan: &LaunchPlan) -> PakResult<i32> {
    let mut state = ProcessState::NotStarted;
    tracing::debug!(?state, program = %plan.program, "starting server");

    // Handlers go in before the child exists so a failure here cannot orphan it.
    let mut relay = SignalRelay::install()?;

    let mut child = match tokio::process::Command::new(&plan.program)
        .args(&plan.args)
        .env_clear()
        .envs(&plan.env)
        .current_dir(&plan.cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            let message = format!("{}: {}", plan.program, e);
            state = ProcessState::Failed(message.clone());
            tracing::debug!(?state, "spawn failed");
            return Err(PakError::SpawnFailure(message));
        }
    };

    state = ProcessState::Running { pid: child.id() };
    tracing::debug!(?state, "server started");

    let status = relay.wait(&mut child).await?;

    state = ProcessState::from_exit_status(status);
    tracing::debug!(?state, "server exited");

    Ok(state.exit_code().unwrap_or(0))
}

/// Relays SIGINT and SIGTERM to the child while pak waits on it.
#[cfg(unix)]
struct SignalRelay {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalRelay {
    fn install() -> PakResult<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    async fn wait(&mut self, child: &mut tokio::process::Child) -> PakResult<ExitStatus> {
        let pid = child.id();
        loop {
            tokio::select! {
                status = child.wait() => return Ok(status?),
                _ = self.sigint.recv() => forward_signal(pid, libc::SIGINT),
                _ = self.sigterm.recv() => forward_signal(pid, libc::SIGTERM),
            }
        }
    }
}

#[cfg(not(unix))]
struct SignalRelay;

#[cfg(not(unix))]
impl SignalRelay {
    fn install() -> PakResult<Self> {
        Ok(Self)
    }

    async fn wait(&mut self, child: &mut tokio::process::Child) -> PakResult<ExitStatus> {
        Ok(child.wait().await?)
    }
}

#[cfg(unix)]
fn forward_signal(pid: Option<u32>, sig: libc::c_int) {
    let Some(pid) = pid else {
        return;
    };
    tracing::debug!(pid, sig, "forwarding signal to server");
    unsafe {
        libc::kill(pid as libc::pid_t, sig);
    }
}

/// Probe whether `command --version` runs successfully.
pub fn command_available(command: &str) -> bool {
    std::process::Command::new(command)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

fn pick_python(probe: &dyn Fn(&str) -> bool) -> String {
    if probe(PYTHON3_COMMAND) {
        PYTHON3_COMMAND.to_string()
    } else {
        PYTHON_COMMAND.to_string()
    }
}

/// `<cache_dir>/deps`, followed by the inherited search path if there is one.
fn python_path(cache_dir: &Path, inherited: Option<&String>) -> String {
    let deps = cache_dir.join(PYTHON_DEPS_DIR).to_string_lossy().into_owned();
    match inherited.filter(|p| !p.is_empty()) {
        Some(existing) => format!("{}{}{}", deps, path_separator(), existing),
        None => deps,
    }
}

fn path_separator() -> char {
    if cfg!(windows) { ';' } else { ':' }
}

/// Best-effort chmod 755. Failures are ignored.
fn make_executable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)) {
            tracing::debug!(path = %path.display(), error = %e, "chmod failed");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
