//! Machine identity for license binding.
//!
//! The identity is an opaque string. Documents record it at installation,
//! and hardware-binding tokens are derived from it.

use std::env;

use warden_crypto::short_token;

/// Supplies the identity of the current machine.
pub trait HardwareIdentity: Send + Sync {
    fn machine_identity(&self) -> String;
}

/// Hardware-binding token for a machine identity.
///
/// Empty when the identity is empty.
#[must_use]
pub fn hardware_token(machine_identity: &str) -> String {
    short_token(machine_identity)
}

/// Identity of the host this process runs on.
///
/// Combines OS, architecture, hostname, the platform machine id and the
/// user name. Stable across reboots; changes when the machine does.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostHardware;

impl HardwareIdentity for HostHardware {
    fn machine_identity(&self) -> String {
        collect_hardware_ids().join("|")
    }
}

/// A fixed identity, for tests and for hosts that supply their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticHardware(pub String);

impl StaticHardware {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }
}

impl HardwareIdentity for StaticHardware {
    fn machine_identity(&self) -> String {
        self.0.clone()
    }
}

fn collect_hardware_ids() -> Vec<String> {
    let mut ids = vec![env::consts::OS.to_string(), env::consts::ARCH.to_string()];

    ids.push(get_hostname());

    if let Some(machine_id) = get_machine_id() {
        ids.push(machine_id);
    }

    if let Ok(user) = env::var("USER").or_else(|_| env::var("USERNAME")) {
        ids.push(user);
    }

    ids
}

fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn get_machine_id() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
