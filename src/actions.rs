//! Action sources that feed the event log.
//!
//! Each source does its own work and then hands a `(category, detail)` pair to
//! a [`Recorder`]; none of them wait for the write.

use std::fmt;
use std::net::IpAddr;
use std::process::Command;
use std::str::FromStr;

use mac_address::MacAddress;
use tracing::{debug, info, warn};

use crate::errors::{NebulaError, NebulaResult};
use crate::event::{CATEGORY_CMD, CATEGORY_NAV, CATEGORY_SPEEDTEST};
use crate::recorder::Recorder;

const UNKNOWN: &str = "?";

/// Pages of the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Tools,
    Speed,
    Logs,
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Page::Dashboard => "Dashboard",
            Page::Tools => "Tools",
            Page::Speed => "Speed",
            Page::Logs => "Logs",
        };
        f.write_str(name)
    }
}

pub fn record_navigation(recorder: &dyn Recorder, page: Page) {
    recorder.record(CATEGORY_NAV, &format!("{page} visitado"));
}

/// Command shell family the catalog is translated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

/// Fixed catalog of network maintenance commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCommand {
    FlushDns,
    RegisterDns,
    ReleaseIp,
    RenewIp,
    PingGoogle,
    PingCloudflare,
}

impl NetworkCommand {
    pub const ALL: [NetworkCommand; 6] = [
        NetworkCommand::FlushDns,
        NetworkCommand::RegisterDns,
        NetworkCommand::ReleaseIp,
        NetworkCommand::RenewIp,
        NetworkCommand::PingGoogle,
        NetworkCommand::PingCloudflare,
    ];

    /// Name shown to the user and stored as the event detail
    pub fn display_name(self) -> &'static str {
        match self {
            NetworkCommand::FlushDns => "Flush DNS",
            NetworkCommand::RegisterDns => "Reg. DNS",
            NetworkCommand::ReleaseIp => "Release IP",
            NetworkCommand::RenewIp => "Renew IP",
            NetworkCommand::PingGoogle => "Ping Google",
            NetworkCommand::PingCloudflare => "Ping Cloudflare",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            NetworkCommand::FlushDns => "flush-dns",
            NetworkCommand::RegisterDns => "register-dns",
            NetworkCommand::ReleaseIp => "release-ip",
            NetworkCommand::RenewIp => "renew-ip",
            NetworkCommand::PingGoogle => "ping-google",
            NetworkCommand::PingCloudflare => "ping-cloudflare",
        }
    }

    /// Fixed host probed by the ping entries
    pub fn ping_target(self) -> Option<&'static str> {
        match self {
            NetworkCommand::PingGoogle => Some("8.8.8.8"),
            NetworkCommand::PingCloudflare => Some("1.1.1.1"),
            _ => None,
        }
    }

    /// Program and arguments on `platform`, or `None` where it has no equivalent.
    ///
    /// `ping_count` is the number of echo requests the ping entries send.
    pub fn argv(self, platform: Platform, ping_count: u32) -> Option<Vec<String>> {
        let count = ping_count.to_string();
        let parts: Vec<&str> = match (platform, self) {
            (Platform::Windows, NetworkCommand::FlushDns) => vec!["ipconfig", "/flushdns"],
            (Platform::Windows, NetworkCommand::RegisterDns) => vec!["ipconfig", "/registerdns"],
            (Platform::Windows, NetworkCommand::ReleaseIp) => vec!["ipconfig", "/release"],
            (Platform::Windows, NetworkCommand::RenewIp) => vec!["ipconfig", "/renew"],
            (Platform::Unix, NetworkCommand::FlushDns) => vec!["resolvectl", "flush-caches"],
            // Dynamic DNS registration is left to the DHCP client on Unix.
            (Platform::Unix, NetworkCommand::RegisterDns) => return None,
            (Platform::Unix, NetworkCommand::ReleaseIp) => vec!["dhclient", "-r"],
            (Platform::Unix, NetworkCommand::RenewIp) => vec!["dhclient"],
            (platform, ping) => {
                let target = ping.ping_target()?;
                let flag = match platform {
                    Platform::Windows => "-n",
                    Platform::Unix => "-c",
                };
                vec!["ping", flag, count.as_str(), target]
            }
        };
        Some(parts.into_iter().map(str::to_string).collect())
    }
}

impl FromStr for NetworkCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NetworkCommand::ALL
            .into_iter()
            .find(|cmd| cmd.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = NetworkCommand::ALL.iter().map(|c| c.slug()).collect();
                format!("unknown command '{s}' (known: {})", known.join(", "))
            })
    }
}

/// Captured result of a network command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub output: String,
}

/// Run `command`, then log it as a `CMD` event whatever the outcome.
///
/// Non-zero exit codes are not errors: their output is returned like any
/// other. Failing to launch the program is [`NebulaError::Command`], and an
/// entry with no equivalent on this platform is
/// [`NebulaError::CapabilityUnavailable`].
pub fn run_command(
    recorder: &dyn Recorder,
    command: NetworkCommand,
    ping_count: u32,
) -> NebulaResult<CommandOutput> {
    let name = command.display_name();
    let Some(argv) = command.argv(Platform::current(), ping_count) else {
        recorder.record(CATEGORY_CMD, name);
        warn!(command = name, "network command has no equivalent on this platform");
        return Err(NebulaError::capability_unavailable(name));
    };
    run_argv(recorder, name, &argv)
}

fn run_argv(recorder: &dyn Recorder, name: &str, argv: &[String]) -> NebulaResult<CommandOutput> {
    info!(command = name, argv = ?argv, "running network command");

    let result = match argv.split_first() {
        Some((program, args)) => Command::new(program).args(args).output(),
        None => Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")),
    };
    recorder.record(CATEGORY_CMD, name);

    let output = result.map_err(|e| {
        warn!(command = name, error = %e, "network command could not start");
        NebulaError::command(name, e)
    })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(CommandOutput {
        success: output.status.success(),
        output: text,
    })
}

/// Basic facts about the local machine; anything that cannot be read is `"?"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub host: String,
    pub ip: String,
    pub mac: String,
    pub os: String,
    pub arch: String,
}

impl HostInfo {
    pub fn probe() -> Self {
        let host = gethostname::gethostname().into_string().ok();
        let ip = local_ip_address::local_ip()
            .map_err(|e| debug!(error = %e, "no local IPv4 address"))
            .ok();
        let mac = match mac_address::get_mac_address() {
            Ok(mac) => mac,
            Err(e) => {
                debug!(error = %e, "MAC address lookup failed");
                None
            }
        };
        Self::from_parts(host, ip, mac)
    }

    pub fn from_parts(host: Option<String>, ip: Option<IpAddr>, mac: Option<MacAddress>) -> Self {
        Self {
            host: host
                .filter(|h| !h.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            ip: ip.map_or_else(|| UNKNOWN.to_string(), |ip| ip.to_string()),
            mac: mac.map_or_else(|| UNKNOWN.to_string(), |mac| format_mac(&mac)),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Upper-case, colon separated
fn format_mac(mac: &MacAddress) -> String {
    mac.bytes()
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "host: {}", self.host)?;
        writeln!(f, "ip:   {}", self.ip)?;
        writeln!(f, "mac:  {}", self.mac)?;
        writeln!(f, "os:   {}", self.os)?;
        write!(f, "arch: {}", self.arch)
    }
}

/// Figures from a finished speed test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedTestResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
}

impl SpeedTestResult {
    pub fn detail(&self) -> String {
        format!(
            "D:{:.1} U:{:.1} P:{}",
            self.download_mbps, self.upload_mbps, self.ping_ms
        )
    }
}

pub fn record_speed_test(recorder: &dyn Recorder, result: &SpeedTestResult) {
    recorder.record(CATEGORY_SPEEDTEST, &result.detail());
}
