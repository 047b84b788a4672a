//! IP address rules for the access policy and rate limiter.
//!
//! A rule is either a single address or a CIDR subnet. Rules are parsed once
//! at configuration time and checked for containment on every request, so the
//! containment test works on raw integer representations instead of
//! re-parsing strings.

use std::fmt;
use std::net::IpAddr;

use anyhow::{bail, Context, Result};

/// A single IP address or a CIDR subnet.
///
/// Used as the key type for both access (allow/deny) rules and rate-limit
/// rules. `Subnet` keeps the network address with host bits already masked
/// off, so `contains` is a mask-and-compare.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IpRule {
    Exact(IpAddr),
    Subnet { network: IpAddr, prefix: u8 },
}

impl IpRule {
    /// Parse a rule from `"10.0.0.1"` or `"10.0.0.0/24"` notation.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once('/') {
            None => {
                let addr: IpAddr = s
                    .parse()
                    .with_context(|| format!("invalid IP address `{s}`"))?;
                Ok(IpRule::Exact(addr))
            }
            Some((addr, prefix)) => {
                let addr: IpAddr = addr
                    .parse()
                    .with_context(|| format!("invalid subnet address `{s}`"))?;
                let prefix: u8 = prefix
                    .parse()
                    .with_context(|| format!("invalid subnet prefix `{s}`"))?;
                let max = match addr {
                    IpAddr::V4(_) => 32,
                    IpAddr::V6(_) => 128,
                };
                if prefix > max {
                    bail!("subnet prefix /{prefix} out of range for `{s}`");
                }
                Ok(IpRule::Subnet {
                    network: mask_addr(addr, prefix),
                    prefix,
                })
            }
        }
    }

    /// Whether `addr` is matched by this rule.
    ///
    /// Address families never mix: a v4 rule cannot match a v6 address.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match self {
            IpRule::Exact(rule_addr) => *rule_addr == addr,
            IpRule::Subnet { network, prefix } => match (network, addr) {
                (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                    mask_addr(addr, *prefix) == *network
                }
                _ => false,
            },
        }
    }

    /// Ordering weight for most-specific-match-wins resolution.
    ///
    /// An exact address always outranks any subnet; among subnets, a longer
    /// prefix outranks a shorter one.
    pub fn specificity(&self) -> u16 {
        match self {
            IpRule::Exact(_) => u16::MAX,
            IpRule::Subnet { prefix, .. } => u16::from(*prefix),
        }
    }
}

impl fmt::Display for IpRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpRule::Exact(addr) => write!(f, "{addr}"),
            IpRule::Subnet { network, prefix } => write!(f, "{network}/{prefix}"),
        }
    }
}

fn mask_addr(addr: IpAddr, prefix: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let mask = if prefix == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(prefix))
            };
            IpAddr::V4((bits & mask).into())
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let mask = if prefix == 0 {
                0
            } else {
                u128::MAX << (128 - u32::from(prefix))
            };
            IpAddr::V6((bits & mask).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact() {
        let rule = IpRule::parse("10.0.0.1").unwrap();
        assert!(rule.contains("10.0.0.1".parse().unwrap()));
        assert!(!rule.contains("10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn test_parse_subnet_masks_host_bits() {
        let rule = IpRule::parse("10.0.0.5/24").unwrap();
        assert_eq!(rule.to_string(), "10.0.0.0/24");
        assert!(rule.contains("10.0.0.200".parse().unwrap()));
        assert!(!rule.contains("10.0.1.1".parse().unwrap()));
    }

    #[test]
    fn test_zero_prefix_matches_everything_v4() {
        let rule = IpRule::parse("0.0.0.0/0").unwrap();
        assert!(rule.contains("192.168.1.1".parse().unwrap()));
        assert!(!rule.contains("::1".parse().unwrap()));
    }

    #[test]
    fn test_v6_subnet() {
        let rule = IpRule::parse("2001:db8::/32").unwrap();
        assert!(rule.contains("2001:db8::1".parse().unwrap()));
        assert!(!rule.contains("2001:db9::1".parse().unwrap()));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(IpRule::parse("not-an-ip").is_err());
        assert!(IpRule::parse("10.0.0.0/33").is_err());
        assert!(IpRule::parse("10.0.0.0/abc").is_err());
    }

    #[test]
    fn test_specificity_ordering() {
        let exact = IpRule::parse("10.0.0.1").unwrap();
        let narrow = IpRule::parse("10.0.0.0/24").unwrap();
        let wide = IpRule::parse("10.0.0.0/8").unwrap();
        assert!(exact.specificity() > narrow.specificity());
        assert!(narrow.specificity() > wide.specificity());
    }
}
