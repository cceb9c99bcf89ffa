use std::net::Ipv4Addr;
use std::time::Duration;

/// One echo request from the device to `target`. `-W` only takes whole seconds.
pub fn command(target: Ipv4Addr, timeout: Duration) -> String {
    let wait = timeout.as_secs().max(1);
    format!("ping -c 1 -W {wait} {target}")
}

/// Round-trip time from the `time=` field of iputils or busybox ping output.
pub fn parse_rtt(output: &str) -> Option<Duration> {
    let (_, tail) = output.split_once("time=")?;
    let value = tail.split_whitespace().next()?.trim_end_matches("ms");
    let millis: f64 = value.parse().ok()?;
    if !millis.is_finite() || millis < 0.0 {
        return None;
    }
    Some(Duration::from_nanos((millis * 1_000_000.0).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPUTILS: &str = "PING 10.0.0.5 (10.0.0.5) 56(84) bytes of data.\n\
        64 bytes from 10.0.0.5: icmp_seq=1 ttl=64 time=0.421 ms\n\n\
        --- 10.0.0.5 ping statistics ---\n\
        1 packets transmitted, 1 received, 0% packet loss, time 0ms\n\
        rtt min/avg/max/mdev = 0.421/0.421/0.421/0.000 ms\n";

    #[test]
    fn command_rounds_timeout_up_to_a_second() {
        let target = Ipv4Addr::new(10, 0, 0, 5);
        assert_eq!(command(target, Duration::from_millis(200)), "ping -c 1 -W 1 10.0.0.5");
        assert_eq!(command(target, Duration::from_secs(3)), "ping -c 1 -W 3 10.0.0.5");
    }

    #[test]
    fn parses_iputils_reply() {
        assert_eq!(parse_rtt(IPUTILS), Some(Duration::from_micros(421)));
    }

    #[test]
    fn parses_glued_unit() {
        let rtt = parse_rtt("64 bytes from 10.0.0.5: seq=0 ttl=64 time=12ms").unwrap();
        assert_eq!(rtt, Duration::from_millis(12));
    }

    #[test]
    fn no_reply_is_none() {
        let lost = "PING 10.0.0.5 (10.0.0.5) 56(84) bytes of data.\n\n\
            --- 10.0.0.5 ping statistics ---\n\
            1 packets transmitted, 0 received, 100% packet loss, time 0ms\n";
        assert_eq!(parse_rtt(lost), None);
        assert_eq!(parse_rtt("time=abc ms"), None);
    }
}
