use std::process::{Command, Stdio};

use crate::models::{CoreError, CoreErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PrivilegeGrant {
    Root,
    Cached,
    Authenticated,
}

impl PrivilegeGrant {
    /// Whether privileged commands still need a `sudo` prefix.
    pub fn needs_sudo(self) -> bool {
        self != Self::Root
    }
}

pub trait PrivilegeProbe {
    fn is_root(&self) -> bool;

    /// Elevation is available without asking, e.g. a cached sudo timestamp.
    fn has_cached_credentials(&self) -> bool;

    /// Asks the operator once; `true` when elevation was granted.
    fn authenticate(&self) -> bool;
}

/// Makes sure privileged tasks can run before the pipeline starts.
///
/// Exactly one interactive attempt is made. A refusal is returned as
/// [`CoreErrorKind::AuthenticationFailed`] and is fatal for the run.
pub fn ensure_privileges(probe: &dyn PrivilegeProbe) -> Result<PrivilegeGrant, CoreError> {
    if probe.is_root() {
        tracing::debug!("running as root");
        return Ok(PrivilegeGrant::Root);
    }

    if probe.has_cached_credentials() {
        tracing::debug!("using cached sudo credentials");
        return Ok(PrivilegeGrant::Cached);
    }

    if probe.authenticate() {
        return Ok(PrivilegeGrant::Authenticated);
    }

    tracing::error!("sudo authentication failed");
    Err(CoreError::new(
        CoreErrorKind::AuthenticationFailed,
        "sudo authentication failed; elevated privileges are required to install dependencies",
    ))
}

/// Checks the effective uid and talks to `sudo` on the controlling terminal.
pub struct SudoProbe;

impl PrivilegeProbe for SudoProbe {
    fn is_root(&self) -> bool {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }

    fn has_cached_credentials(&self) -> bool {
        Command::new("sudo")
            .args(["-n", "true"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    fn authenticate(&self) -> bool {
        match Command::new("sudo").arg("-v").status() {
            Ok(status) => status.success(),
            Err(error) => {
                tracing::error!(error = %error, "failed to run sudo");
                false
            }
        }
    }
}
