//! IPv4/IPv6 containment checks for trusted-proxy matching.
//!
//! Comparisons are bit-exact: IPv4 uses dotted-decimal parsing plus CIDR
//! prefix comparison, IPv6 compares 16-bit groups under a per-group mask.
//! IPv6 support comes from `std::net` and is always available, so there is
//! no "IPv6 disabled" failure mode to report.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Checks whether an address is contained in a list of IPs or CIDR subnets.
///
/// The candidate is treated as IPv6 when it contains more than one colon,
/// otherwise as IPv4. Unparsable candidates or patterns never match.
pub fn check_ip(request_ip: &str, ips: &[&str]) -> bool {
    let v6 = request_ip.matches(':').count() > 1;
    ips.iter().any(|ip| {
        if v6 {
            check_ip6(request_ip, ip)
        } else {
            check_ip4(request_ip, ip)
        }
    })
}

/// Compares an IPv4 address against an address or CIDR subnet.
pub fn check_ip4(request_ip: &str, ip: &str) -> bool {
    let Ok(request) = request_ip.parse::<Ipv4Addr>() else {
        return false;
    };

    let (address, netmask) = match ip.split_once('/') {
        Some((address, netmask)) => {
            let Ok(netmask) = netmask.parse::<u8>() else {
                return false;
            };
            (address, netmask)
        }
        None => (ip, 32),
    };

    let Ok(address) = address.parse::<Ipv4Addr>() else {
        return false;
    };
    if netmask > 32 {
        return false;
    }
    if netmask == 0 {
        // /0 contains every valid address
        return true;
    }

    let shift = 32 - u32::from(netmask);
    (u32::from(request) >> shift) == (u32::from(address) >> shift)
}

/// Compares an IPv6 address against an address or CIDR subnet.
pub fn check_ip6(request_ip: &str, ip: &str) -> bool {
    let Ok(request) = request_ip.parse::<Ipv6Addr>() else {
        return false;
    };

    let (address, netmask) = match ip.split_once('/') {
        Some((address, netmask)) => {
            let Ok(netmask) = netmask.parse::<u8>() else {
                return false;
            };
            (address, netmask)
        }
        None => (ip, 128),
    };

    let Ok(address) = address.parse::<Ipv6Addr>() else {
        return false;
    };
    if netmask == 0 {
        return true;
    }
    if netmask > 128 {
        return false;
    }

    let request = request.segments();
    let address = address.segments();
    let groups = usize::from(netmask).div_ceil(16);
    for i in 0..groups {
        let left = (u32::from(netmask) - 16 * i as u32).min(16);
        let mask = !(0xFFFFu32 >> left) & 0xFFFF;
        if (u32::from(request[i]) & mask) != (u32::from(address[i]) & mask) {
            return false;
        }
    }
    true
}

/// Anonymizes an address by zeroing the last IPv4 octet or the last four
/// IPv6 groups. `::ffff:` mapped, `::` compatible and bracketed forms are
/// preserved; unparsable input passes through unchanged.
pub fn anonymize(ip: &str) -> String {
    let mut ip = ip;
    let mut v4_mapped = false;
    let mut v4_compatible = false;

    if let Some(rest) = ip.strip_prefix("::ffff:") {
        if rest.parse::<Ipv4Addr>().is_ok() {
            v4_mapped = true;
            ip = rest;
        }
    } else if let Some(rest) = ip.strip_prefix("::") {
        if rest.parse::<Ipv4Addr>().is_ok() {
            v4_compatible = true;
            ip = rest;
        }
    }

    let mut wrapped = false;
    if ip.starts_with('[') && ip.ends_with(']') {
        wrapped = true;
        ip = &ip[1..ip.len() - 1];
    }

    let anonymized = if let Ok(v4) = ip.parse::<Ipv4Addr>() {
        let octets = v4.octets();
        Ipv4Addr::new(octets[0], octets[1], octets[2], 0).to_string()
    } else if let Ok(v6) = ip.parse::<Ipv6Addr>() {
        let s = v6.segments();
        Ipv6Addr::new(s[0], s[1], s[2], s[3], 0, 0, 0, 0).to_string()
    } else {
        ip.to_string()
    };

    let anonymized = if v4_mapped {
        format!("::ffff:{anonymized}")
    } else if v4_compatible {
        format!("::{anonymized}")
    } else {
        anonymized
    };

    if wrapped {
        format!("[{anonymized}]")
    } else {
        anonymized
    }
}

#[cfg(test)]
mod tests {
    use super::{anonymize, check_ip, check_ip4, check_ip6};

    #[test]
    fn ipv4_exact_and_subnet() {
        assert!(check_ip4("192.168.1.1", "192.168.1.1"));
        assert!(check_ip4("192.168.1.1", "192.168.1.1/1"));
        assert!(check_ip4("192.168.1.1", "192.168.1.0/24"));
        assert!(!check_ip4("192.168.1.1", "1.2.3.4/1"));
        assert!(!check_ip4("192.168.1.1", "192.168.1.1/33"));
        assert!(check_ip4("10.10.10.10", "10.0.0.0/8"));
        assert!(!check_ip4("11.0.0.0", "10.0.0.0/8"));
    }

    #[test]
    fn ipv4_slash_zero_matches_any_valid_address() {
        assert!(check_ip4("1.2.3.4", "0.0.0.0/0"));
        assert!(check_ip4("1.2.3.4", "192.168.1.0/0"));
        assert!(!check_ip4("not-an-ip", "0.0.0.0/0"));
    }

    #[test]
    fn ipv4_invalid_inputs_never_match() {
        assert!(!check_ip4("1.2.3.4", "invalid"));
        assert!(!check_ip4("", "1.2.3.4/1"));
        assert!(!check_ip4("192.168.1.1", "192.168.1.1/bad"));
        assert!(!check_ip4("2001:db8::1", "2001:db8::1"));
    }

    #[test]
    fn ipv6_exact_and_subnet() {
        assert!(check_ip6("2a01:198:603:0:396e:4789:8e99:890f", "2a01:198:603:0::/65"));
        assert!(!check_ip6("2a00:198:603:0:396e:4789:8e99:890f", "2a01:198:603:0::/65"));
        assert!(!check_ip6("2a01:198:603:0:396e:4789:8e99:890f", "::1"));
        assert!(check_ip6("0:0:0:0:0:0:0:1", "::1"));
        assert!(!check_ip6("0:0:603:0:396e:4789:8e99:0001", "::1"));
        assert!(check_ip6("2a01:198:603:0:396e:4789:8e99:890f", "2a01:198:603:0::/16"));
    }

    #[test]
    fn ipv6_slash_zero_and_bad_masks() {
        assert!(check_ip6("::1", "::/0"));
        assert!(!check_ip6("::1", "::1/129"));
        assert!(!check_ip6("::1", "::1/bad"));
        assert!(!check_ip6("1.2.3.4", "::1"));
        assert!(!check_ip6("{{{{", "::1"));
    }

    #[test]
    fn dispatch_by_colon_count() {
        assert!(check_ip("192.168.1.1", &["1.2.3.4/1", "192.168.1.0/24"]));
        assert!(check_ip("2a01:198:603:0:396e:4789:8e99:890f", &["::1", "2a01:198:603:0::/65"]));
        assert!(!check_ip("192.168.1.1", &[]));
        assert!(!check_ip("127.0.0.1", &["10.0.0.0/8"]));
    }

    #[test]
    fn anonymize_zeroes_the_tail() {
        assert_eq!(anonymize("192.168.1.1"), "192.168.1.0");
        assert_eq!(anonymize("1.2.3.4"), "1.2.3.0");
        assert_eq!(anonymize("2a01:198:603:10:396e:4789:8e99:890f"), "2a01:198:603:10::");
        assert_eq!(anonymize("::1"), "::");
        assert_eq!(anonymize("[2a01:198::3]"), "[2a01:198::]");
        assert_eq!(anonymize("::ffff:172.16.0.9"), "::ffff:172.16.0.0");
        assert_eq!(anonymize("::172.16.0.9"), "::172.16.0.0");
    }
}
