use pifleet_common::models::device::Reading;
use pifleet_common::network::mac::MacAddress;

pub const MODEL: &str = "cat /proc/device-tree/model";
pub const MAC_ADDRESS: &str = "cat /sys/class/net/eth0/address";
pub const RAM: &str = "free -m | awk '/^Mem:/ {print $2}'";
pub const STORAGE: &str = r#"df -h / | awk 'NR==2 {print $3 "/" $2 " (" $5 ")"}'"#;
pub const TEMPERATURE: &str = "vcgencmd measure_temp";

/// Device-tree strings are NUL terminated.
pub fn parse_model(stdout: &str) -> Reading {
    let model = stdout.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    non_empty(model)
}

pub fn parse_mac(stdout: &str) -> Option<MacAddress> {
    stdout.trim().parse().ok()
}

/// `free -m` total, e.g. `3794` -> `3794 MB`.
pub fn parse_ram(stdout: &str) -> Reading {
    let total = stdout.trim();
    if total.is_empty() {
        return Reading::Unknown;
    }
    match total.parse::<u64>() {
        Ok(megabytes) => Reading::Value(format!("{megabytes} MB")),
        Err(_) => unexpected(total),
    }
}

/// Used/size and percentage of the root filesystem, e.g. `5.2G/29G (19%)`.
pub fn parse_storage(stdout: &str) -> Reading {
    non_empty(stdout.trim())
}

/// `temp=48.3'C` -> `48.3'C`.
pub fn parse_temperature(stdout: &str) -> Reading {
    let line = stdout.trim();
    if line.is_empty() {
        return Reading::Unknown;
    }
    match line.split_once('=') {
        Some((_, value)) if !value.trim().is_empty() => Reading::Value(value.trim().to_string()),
        _ => unexpected(line),
    }
}

fn non_empty(value: &str) -> Reading {
    if value.is_empty() {
        Reading::Unknown
    } else {
        Reading::Value(value.to_string())
    }
}

fn unexpected(output: &str) -> Reading {
    Reading::Failed(format!("unexpected output '{output}'"))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
