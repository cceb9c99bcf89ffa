use colored::*;

use pifleet_common::models::device::{Device, DeviceInfo, Reading, Telemetry};
use pifleet_common::models::dispatch::DispatchResult;
use pifleet_common::models::lag::LagMeasurement;
use pifleet_common::models::setup::Setup;

use crate::terminal::colors;

type Detail = (String, ColoredString);

pub fn reading(value: &Reading) -> ColoredString {
    match value {
        Reading::Value(v) => v.color(colors::TEXT_DEFAULT),
        Reading::Unknown => "Unknown".color(colors::SEPARATOR),
        Reading::Failed(_) => value.to_string().color(colors::FAIL),
    }
}

pub fn lag(value: Option<&LagMeasurement>) -> ColoredString {
    match value {
        Some(measured @ LagMeasurement::Measured { .. }) => measured.to_string().color(colors::OK),
        Some(unmeasurable) => unmeasurable.to_string().color(colors::WARN),
        None => "N/A (never measured)".color(colors::SEPARATOR),
    }
}

fn telemetry(pairs: &mut Vec<Detail>, telemetry: &Telemetry) {
    pairs.push(("Temp".into(), reading(&telemetry.temperature)));
    pairs.push(("RAM".into(), reading(&telemetry.ram)));
    pairs.push(("Storage".into(), reading(&telemetry.storage)));
}

pub fn device_details(device: &Device) -> Vec<Detail> {
    let ip = match device.ip {
        Some(ip) => ip.to_string().color(colors::IPV4_ADDR),
        None => "none".color(colors::SEPARATOR),
    };
    let mut pairs: Vec<Detail> = vec![
        ("IPv4".into(), ip),
        ("MAC".into(), device.mac.to_string().color(colors::MAC_ADDR)),
        ("Model".into(), reading(&device.model)),
    ];
    telemetry(&mut pairs, &device.telemetry);
    pairs.push(("Lag".into(), lag(device.lag.as_ref())));

    if let Some(seen) = device.last_connection {
        let seen = seen.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        pairs.push(("Last seen".into(), seen.color(colors::TEXT_DEFAULT)));
    }
    pairs
}

pub fn device_title(device: &Device) -> String {
    let mut flags = Vec::new();
    if device.master {
        flags.push("master".color(colors::ACCENT).to_string());
    }
    if device.missing {
        flags.push("missing".color(colors::FAIL).to_string());
    }
    if flags.is_empty() {
        device.name.clone()
    } else {
        format!("{} ({})", device.name, flags.join(", "))
    }
}

pub fn info_details(info: &DeviceInfo) -> Vec<Detail> {
    let mac = match info.mac {
        Some(mac) => mac.to_string().color(colors::MAC_ADDR),
        None => "Unknown".color(colors::SEPARATOR),
    };
    let mut pairs: Vec<Detail> = vec![
        ("MAC".into(), mac),
        ("Model".into(), reading(&info.model)),
    ];
    telemetry(&mut pairs, &info.telemetry);
    pairs.push(("Lag".into(), lag(Some(&info.lag))));
    pairs
}

pub fn dispatch_line(result: &DispatchResult) -> String {
    let status = if result.success {
        "ok".color(colors::OK).bold()
    } else {
        "failed".color(colors::FAIL).bold()
    };
    let mut line = format!("{} {} {}", result.device, "→".color(colors::SEPARATOR), status);
    if let Some(detail) = &result.detail {
        line.push_str(&format!(" {}", detail.color(colors::SEPARATOR)));
    }
    line
}

pub fn setup_line(setup: &Setup) -> String {
    format!(
        "{} {} {}",
        setup.name.color(colors::PRIMARY),
        setup.iprange.color(colors::IPV4_ADDR),
        format!("({})", setup.slug).color(colors::SEPARATOR)
    )
}
