use serde::{Deserialize, Deserializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(Hash, Eq, PartialEq, Debug)]
#[derive(Clone, Copy)]
pub struct CidrIP {
    pub ip: Ipv4Addr,
    pub netmask: u8,
}

impl CidrIP {
    pub fn new(ip: Ipv4Addr, netmask: u8) -> Self {
        Self { ip, netmask }
    }

    fn mask_bits(&self) -> u32 {
        match self.netmask {
            0 => 0,
            n => u32::max_value() << (32 - n as u32),
        }
    }

    /// Network address of the prefix (host bits cleared)
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.ip) & self.mask_bits())
    }

    /// True if `other` lies entirely inside this prefix
    pub fn contains(&self, other: &CidrIP) -> bool {
        other.netmask >= self.netmask
            && (u32::from(other.ip) & self.mask_bits()) == u32::from(self.network())
    }
}

impl fmt::Display for CidrIP {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.netmask)
    }
}

impl FromStr for CidrIP {
    type Err = String;

    fn from_str(cidr: &str) -> Result<Self, Self::Err> {
        let elems: Vec<&str> = cidr.trim().split('/').collect();
        if elems.len() != 2 {
            return Err(format!("'{}' is not in address/prefix-length form", cidr));
        }
        let ip: Ipv4Addr = elems[0].parse().map_err(|_| format!("'{}' is not an IPv4 address", elems[0]))?;
        let netmask: u8 = elems[1].parse().map_err(|_| format!("'{}' is not a prefix length", elems[1]))?;
        if netmask > 32 {
            return Err(format!("prefix length {} is larger than 32", netmask));
        }
        Ok(Self { ip, netmask })
    }
}

impl<'de> Deserialize<'de> for CidrIP {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_prefix() {
        let cidr: CidrIP = "172.16.1.0/24".parse().unwrap();
        assert_eq!(cidr.ip, Ipv4Addr::new(172, 16, 1, 0));
        assert_eq!(cidr.netmask, 24);
        assert_eq!(cidr.to_string(), "172.16.1.0/24");
    }

    #[test]
    fn rejects_malformed_prefixes() {
        assert!("172.16.1.0".parse::<CidrIP>().is_err());
        assert!("172.16.1/24".parse::<CidrIP>().is_err());
        assert!("172.16.1.0/33".parse::<CidrIP>().is_err());
    }

    #[test]
    fn subnet_containment() {
        let space: CidrIP = "172.16.0.0/16".parse().unwrap();
        assert!(space.contains(&"172.16.1.0/24".parse().unwrap()));
        assert!(space.contains(&"172.16.2.0/24".parse().unwrap()));
        assert!(!space.contains(&"172.17.0.0/24".parse().unwrap()));
        assert!(!space.contains(&"172.0.0.0/8".parse().unwrap()));
    }

    #[test]
    fn zero_prefix_contains_everything() {
        let all = CidrIP::new(Ipv4Addr::new(0, 0, 0, 0), 0);
        assert!(all.contains(&"10.0.0.0/8".parse().unwrap()));
    }
}
