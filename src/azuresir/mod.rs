//azuresir/mod.rs
//
//Azure System Internal Representation: what the sample asks Azure to create
//(system.rs), how it is spelled for the Azure CLI (emitter.rs), and what
//Azure answers back (the models below, filled in by translator.rs).

pub mod emitter;
pub mod system;
pub mod translator;

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Subnet {
    pub name: String,
    pub address_prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub resource_group: String,
    pub region: String,
    pub address_space: Vec<String>,
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityRuleSummary {
    pub name: String,
    pub priority: u16,
    pub direction: String,
    pub access: String,
    pub protocol: String,
    pub destination_port: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSecurityGroup {
    pub id: String,
    pub name: String,
    pub resource_group: String,
    pub rules: Vec<SecurityRuleSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Disk {
    pub id: String,
    pub name: String,
    pub resource_group: String,
    pub size_gb: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublicIpAddress {
    pub id: String,
    pub name: String,
    /// None until Azure has allocated the address
    pub ip_address: Option<String>,
    pub fqdn: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInterface {
    pub id: String,
    pub name: String,
    pub resource_group: String,
    pub private_ip: Option<String>,
    pub public_ip_id: Option<String>,
    pub ip_forwarding: bool,
    pub network_security_group_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataDisk {
    pub lun: u32,
    pub name: String,
    pub size_gb: u32,
    pub managed_disk_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Deallocating,
    Deallocated,
    Unknown(String),
}

impl PowerState {
    /// Accepts both the instance view code ("PowerState/running") and the
    /// display form returned by `vm show -d` ("VM running")
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        let state = code.rsplit(|c: char| c == '/' || c == ' ').next().unwrap_or(code);
        match state.to_lowercase().as_str() {
            "starting" => PowerState::Starting,
            "running" => PowerState::Running,
            "stopping" => PowerState::Stopping,
            "stopped" => PowerState::Stopped,
            "deallocating" => PowerState::Deallocating,
            "deallocated" => PowerState::Deallocated,
            _ => PowerState::Unknown(code.to_string()),
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PowerState::Starting => write!(f, "PowerState/starting"),
            PowerState::Running => write!(f, "PowerState/running"),
            PowerState::Stopping => write!(f, "PowerState/stopping"),
            PowerState::Stopped => write!(f, "PowerState/stopped"),
            PowerState::Deallocating => write!(f, "PowerState/deallocating"),
            PowerState::Deallocated => write!(f, "PowerState/deallocated"),
            PowerState::Unknown(code) => write!(f, "{}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub resource_group: String,
    pub region: String,
    pub size: String,
    pub admin_username: Option<String>,
    pub primary_nic_id: Option<String>,
    /// Sorted by LUN
    pub data_disks: Vec<DataDisk>,
    pub tags: BTreeMap<String, String>,
    pub power_state: PowerState,
    pub public_ips: Vec<String>,
}

impl VirtualMachine {
    pub fn data_disk_at(&self, lun: u32) -> Option<&DataDisk> {
        self.data_disks.iter().find(|d| d.lun == lun)
    }

    /// Lowest LUN not used by an attached data disk
    pub fn next_free_lun(&self) -> u32 {
        (0..).find(|lun| self.data_disk_at(*lun).is_none()).unwrap_or(0)
    }
}

// =============================== Printing ====================================

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Network: {}", self.id)?;
        writeln!(f, "\tName: {}", self.name)?;
        writeln!(f, "\tResource group: {}", self.resource_group)?;
        writeln!(f, "\tRegion: {}", self.region)?;
        writeln!(f, "\tAddress spaces: {}", self.address_space.join(", "))?;
        write!(f, "\tSubnets:")?;
        for subnet in &self.subnets {
            write!(f, "\n\t\t{}: {}", subnet.name, subnet.address_prefix)?;
        }
        Ok(())
    }
}

impl fmt::Display for NetworkSecurityGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "NSG: {}", self.id)?;
        write!(f, "\tRules:")?;
        for rule in &self.rules {
            write!(f, "\n\t\t{} ({}): {} {} {} port {}", rule.name, rule.priority, rule.access, rule.direction, rule.protocol, rule.destination_port)?;
        }
        Ok(())
    }
}

impl fmt::Display for VirtualMachine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Virtual machine: {}", self.id)?;
        writeln!(f, "\tName: {}", self.name)?;
        writeln!(f, "\tResource group: {}", self.resource_group)?;
        writeln!(f, "\tRegion: {}", self.region)?;
        writeln!(f, "\tSize: {}", self.size)?;
        writeln!(f, "\tPower state: {}", self.power_state)?;
        if let Some(user) = &self.admin_username {
            writeln!(f, "\tAdmin user name: {}", user)?;
        }
        if !self.public_ips.is_empty() {
            writeln!(f, "\tPublic IPs: {}", self.public_ips.join(", "))?;
        }
        if !self.tags.is_empty() {
            let tags: Vec<String> = self.tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            writeln!(f, "\tTags: {}", tags.join(", "))?;
        }
        write!(f, "\tData disks:")?;
        for disk in &self.data_disks {
            write!(f, "\n\t\tLun: {} Name: {} Size: {} GB", disk.lun, disk.name, disk.size_gb)?;
        }
        Ok(())
    }
}
