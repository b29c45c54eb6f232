//! Address classification for Layer C.
//!
//! Blocked IPv4: 0/8, 10/8, 127/8, 169.254/16, 172.16/12, 192.168/16,
//! 224/4 (multicast), 240/4 (reserved, includes broadcast).
//! Blocked IPv6: `::`, `::1`, fe80::/10, fc00::/7 (covers fd00::/8),
//! ff00::/8, and IPv4-mapped/compatible addresses wrapping a blocked IPv4.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// True if `ip` must never be dialed on behalf of a caller.
pub fn is_unsafe_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_unsafe_ipv4(v4),
        IpAddr::V6(v6) => is_unsafe_ipv6(v6),
    }
}

pub fn is_unsafe_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    match a {
        0 | 10 | 127 => true,
        169 if b == 254 => true,
        172 if (16..=31).contains(&b) => true,
        192 if b == 168 => true,
        224..=255 => true,
        _ => false,
    }
}

pub fn is_unsafe_ipv6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    let first = ip.segments()[0];
    if (first & 0xffc0) == 0xfe80 // link-local
        || (first & 0xfe00) == 0xfc00 // unique local
        || (first & 0xff00) == 0xff00
    {
        return true;
    }
    if let Some(v4) = embedded_ipv4(ip) {
        return is_unsafe_ipv4(v4);
    }
    false
}

/// IPv4 address carried by `::ffff:a.b.c.d` or the deprecated `::a.b.c.d` form.
fn embedded_ipv4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }
    let s = ip.segments();
    if s[..6].iter().all(|&x| x == 0) {
        return Some(Ipv4Addr::new(
            (s[6] >> 8) as u8,
            s[6] as u8,
            (s[7] >> 8) as u8,
            s[7] as u8,
        ));
    }
    None
}
