// azuresir/system.rs
//
// Definitions of the resources to create. Each one is assembled with builder
// methods, checked with validate(), then handed to a single creation call of
// the management client. Definitions are never mutated once handed over.

use super::{Disk, Network, NetworkInterface, NetworkSecurityGroup};
use crate::utils::types::CidrIP;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;

pub const MAX_DISK_SIZE_GB: u32 = 32767;
pub const MIN_RULE_PRIORITY: u16 = 100;
pub const MAX_RULE_PRIORITY: u16 = 4096;
const MAX_WINDOWS_COMPUTER_NAME: usize = 15;
const RESERVED_USERNAMES: &[&str] = &["admin", "administrator", "guest", "root", "user", "user1", "test", "test1", "owner"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDefinition(pub String);

impl fmt::Display for InvalidDefinition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for InvalidDefinition {}

type Validation = Result<(), InvalidDefinition>;

fn require(field: &str, value: &str, resource: &str) -> Validation {
    if value.trim().is_empty() {
        invalid_definition!("{} of {} is not set", field, resource);
    }
    Ok(())
}

// ================================ Network ====================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceGroupRef {
    /// Created together with the first resource placed in it
    New(String),
    Existing(String),
}

impl ResourceGroupRef {
    pub fn name(&self) -> &str {
        match self {
            ResourceGroupRef::New(name) | ResourceGroupRef::Existing(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubnetDefinition {
    pub name: String,
    pub address_prefix: CidrIP,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkDefinition {
    pub name: String,
    pub region: String,
    pub resource_group: ResourceGroupRef,
    pub address_space: Option<CidrIP>,
    pub subnets: Vec<SubnetDefinition>,
}

impl NetworkDefinition {
    pub fn define(name: &str) -> Self {
        Self {
            name: name.to_string(),
            region: String::new(),
            resource_group: ResourceGroupRef::Existing(String::new()),
            address_space: None,
            subnets: Vec::new(),
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn with_new_resource_group(mut self, name: &str) -> Self {
        self.resource_group = ResourceGroupRef::New(name.to_string());
        self
    }

    pub fn with_address_space(mut self, space: CidrIP) -> Self {
        self.address_space = Some(space);
        self
    }

    pub fn define_subnet(mut self, name: &str, prefix: CidrIP) -> Self {
        self.subnets.push(SubnetDefinition { name: name.to_string(), address_prefix: prefix });
        self
    }

    pub fn validate(&self) -> Validation {
        let what = format!("virtual network {}", self.name);
        require("name", &self.name, &what)?;
        require("region", &self.region, &what)?;
        require("resource group", self.resource_group.name(), &what)?;

        let space = match self.address_space {
            Some(space) => space,
            None => invalid_definition!("{} has no address space", what),
        };
        if self.subnets.is_empty() {
            invalid_definition!("{} has no subnet", what);
        }
        let mut names = HashSet::new();
        for subnet in &self.subnets {
            if !names.insert(subnet.name.as_str()) {
                invalid_definition!("{} defines subnet {} twice", what, subnet.name);
            }
            if !space.contains(&subnet.address_prefix) {
                invalid_definition!("subnet {} ({}) is outside of the address space {} of {}", subnet.name, subnet.address_prefix, space, what);
            }
        }
        Ok(())
    }
}

// ============================ Security group =================================

/// Every rule of the sample lets inbound traffic in
pub const RULE_DIRECTION: &str = "Inbound";
pub const RULE_ACCESS: &str = "Allow";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRange {
    Any,
    Single(u16),
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "Tcp"),
            Protocol::Any => write!(f, "*"),
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PortRange::Any => write!(f, "*"),
            PortRange::Single(port) => write!(f, "{}", port),
        }
    }
}

const ANY_ADDRESS: &str = "*";

/// Inbound allow rule
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityRule {
    pub name: String,
    pub protocol: Protocol,
    pub source_address: String,
    pub source_port: PortRange,
    pub destination_address: String,
    pub destination_port: PortRange,
    pub priority: u16,
    pub description: Option<String>,
}

impl SecurityRule {
    pub fn allow_inbound(name: &str) -> Self {
        Self {
            name: name.to_string(),
            protocol: Protocol::Any,
            source_address: ANY_ADDRESS.to_string(),
            source_port: PortRange::Any,
            destination_address: ANY_ADDRESS.to_string(),
            destination_port: PortRange::Any,
            priority: 0,
            description: None,
        }
    }

    pub fn from_any_address(mut self) -> Self {
        self.source_address = ANY_ADDRESS.to_string();
        self
    }

    pub fn from_any_port(mut self) -> Self {
        self.source_port = PortRange::Any;
        self
    }

    pub fn to_any_address(mut self) -> Self {
        self.destination_address = ANY_ADDRESS.to_string();
        self
    }

    pub fn to_port(mut self, port: u16) -> Self {
        self.destination_port = PortRange::Single(port);
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    fn validate(&self) -> Validation {
        require("name", &self.name, "security rule")?;
        if !within_bounds_incl!(MIN_RULE_PRIORITY, self.priority, MAX_RULE_PRIORITY) {
            invalid_definition!("priority {} of rule {} is outside of {}..={}", self.priority, self.name, MIN_RULE_PRIORITY, MAX_RULE_PRIORITY);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NsgDefinition {
    pub name: String,
    pub region: String,
    pub resource_group: String,
    /// Kept in definition order
    pub rules: Vec<SecurityRule>,
}

impl NsgDefinition {
    pub fn define(name: &str) -> Self {
        Self { name: name.to_string(), region: String::new(), resource_group: String::new(), rules: Vec::new() }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn with_existing_resource_group(mut self, name: &str) -> Self {
        self.resource_group = name.to_string();
        self
    }

    pub fn define_rule(mut self, rule: SecurityRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn validate(&self) -> Validation {
        let what = format!("network security group {}", self.name);
        require("name", &self.name, &what)?;
        require("region", &self.region, &what)?;
        require("resource group", &self.resource_group, &what)?;

        let mut names = HashSet::new();
        let mut priorities = HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !names.insert(rule.name.as_str()) {
                invalid_definition!("{} defines rule {} twice", what, rule.name);
            }
            if !priorities.insert(rule.priority) {
                invalid_definition!("{} has two rules with priority {}", what, rule.priority);
            }
        }
        Ok(())
    }
}

// ================================= Disk ======================================

#[derive(Debug, Clone, PartialEq)]
pub struct DiskDefinition {
    pub name: String,
    pub region: String,
    pub resource_group: String,
    pub size_gb: u32,
}

impl DiskDefinition {
    /// Defines an empty managed data disk
    pub fn define(name: &str) -> Self {
        Self { name: name.to_string(), region: String::new(), resource_group: String::new(), size_gb: 0 }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn with_existing_resource_group(mut self, name: &str) -> Self {
        self.resource_group = name.to_string();
        self
    }

    pub fn with_size_in_gb(mut self, size_gb: u32) -> Self {
        self.size_gb = size_gb;
        self
    }

    pub fn validate(&self) -> Validation {
        let what = format!("disk {}", self.name);
        require("name", &self.name, &what)?;
        require("region", &self.region, &what)?;
        require("resource group", &self.resource_group, &what)?;
        validate_disk_size(self.size_gb, &what)
    }
}

fn validate_disk_size(size_gb: u32, what: &str) -> Validation {
    if !within_bounds_incl!(1, size_gb, MAX_DISK_SIZE_GB) {
        invalid_definition!("size of {} must be between 1 and {} GB, got {}", what, MAX_DISK_SIZE_GB, size_gb);
    }
    Ok(())
}

// =========================== Network interface ===============================

#[derive(Debug, Clone, PartialEq)]
pub struct PublicIpDefinition {
    /// Also used as the DNS leaf label
    pub name: String,
}

impl PublicIpDefinition {
    /// Azure DNS labels: 3 to 63 characters, lowercase letters, digits and hyphens, starting with a letter
    fn validate(&self) -> Validation {
        let label = &self.name;
        let starts_with_letter = label.chars().next().map(|c| c.is_ascii_lowercase()).unwrap_or(false);
        let allowed = label.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !within_bounds_incl!(3, label.len(), 63) || !starts_with_letter || !allowed || label.ends_with('-') {
            invalid_definition!("'{}' is not a valid DNS label for a public IP address", label);
        }
        Ok(())
    }
}

/// The primary private address is always allocated dynamically
#[derive(Debug, Clone, PartialEq)]
pub struct NicDefinition {
    pub name: String,
    pub region: String,
    pub resource_group: String,
    pub network_name: String,
    pub subnet: String,
    pub public_ip: Option<PublicIpDefinition>,
    pub ip_forwarding: bool,
    /// Id of the security group to attach
    pub network_security_group: Option<String>,
}

impl NicDefinition {
    pub fn define(name: &str) -> Self {
        Self {
            name: name.to_string(),
            region: String::new(),
            resource_group: String::new(),
            network_name: String::new(),
            subnet: String::new(),
            public_ip: None,
            ip_forwarding: false,
            network_security_group: None,
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn with_existing_resource_group(mut self, name: &str) -> Self {
        self.resource_group = name.to_string();
        self
    }

    pub fn with_existing_primary_network(mut self, network: &Network) -> Self {
        self.network_name = network.name.clone();
        self
    }

    pub fn with_subnet(mut self, subnet: &str) -> Self {
        self.subnet = subnet.to_string();
        self
    }

    pub fn with_new_primary_public_ip_address(mut self, leaf_dns_label: &str) -> Self {
        self.public_ip = Some(PublicIpDefinition { name: leaf_dns_label.to_string() });
        self
    }

    pub fn with_ip_forwarding(mut self) -> Self {
        self.ip_forwarding = true;
        self
    }

    pub fn with_existing_network_security_group(mut self, nsg: &NetworkSecurityGroup) -> Self {
        self.network_security_group = Some(nsg.id.clone());
        self
    }

    pub fn validate(&self) -> Validation {
        let what = format!("network interface {}", self.name);
        require("name", &self.name, &what)?;
        require("region", &self.region, &what)?;
        require("resource group", &self.resource_group, &what)?;
        require("network", &self.network_name, &what)?;
        require("subnet", &self.subnet, &what)?;
        if let Some(public_ip) = &self.public_ip {
            public_ip.validate()?;
        }
        Ok(())
    }
}

// ============================ Virtual machine ================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownWindowsImage {
    WindowsServer2012R2Datacenter,
    WindowsServer2016Datacenter,
    WindowsServer2019Datacenter,
}

impl KnownWindowsImage {
    /// Marketplace URN (publisher:offer:sku:version)
    pub fn urn(&self) -> &'static str {
        match self {
            KnownWindowsImage::WindowsServer2012R2Datacenter => "MicrosoftWindowsServer:WindowsServer:2012-R2-Datacenter:latest",
            KnownWindowsImage::WindowsServer2016Datacenter => "MicrosoftWindowsServer:WindowsServer:2016-Datacenter:latest",
            KnownWindowsImage::WindowsServer2019Datacenter => "MicrosoftWindowsServer:WindowsServer:2019-Datacenter:latest",
        }
    }

    /// Looks up an image by its marketplace sku, e.g. "2016-Datacenter"
    pub fn from_sku(sku: &str) -> Option<Self> {
        match sku.trim().to_lowercase().as_str() {
            "2012-r2-datacenter" => Some(KnownWindowsImage::WindowsServer2012R2Datacenter),
            "2016-datacenter" => Some(KnownWindowsImage::WindowsServer2016Datacenter),
            "2019-datacenter" => Some(KnownWindowsImage::WindowsServer2019Datacenter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataDiskSpec {
    /// Empty disk created by the VM creation itself
    New { size_gb: u32 },
    /// Disk defined up-front, created right before the VM
    Define(DiskDefinition),
    Existing(Disk),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VmDefinition {
    pub name: String,
    pub region: String,
    pub resource_group: String,
    pub primary_nic_id: String,
    pub image: String,
    pub admin_username: String,
    pub admin_password: String,
    pub data_disks: Vec<DataDiskSpec>,
    pub size: String,
    pub tags: BTreeMap<String, String>,
}

impl VmDefinition {
    pub fn define(name: &str) -> Self {
        Self {
            name: name.to_string(),
            region: String::new(),
            resource_group: String::new(),
            primary_nic_id: String::new(),
            image: String::new(),
            admin_username: String::new(),
            admin_password: String::new(),
            data_disks: Vec::new(),
            size: String::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn with_existing_resource_group(mut self, name: &str) -> Self {
        self.resource_group = name.to_string();
        self
    }

    pub fn with_existing_primary_network_interface(mut self, nic: &NetworkInterface) -> Self {
        self.primary_nic_id = nic.id.clone();
        self
    }

    pub fn with_popular_windows_image(self, image: KnownWindowsImage) -> Self {
        self.with_image(image.urn())
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = image.to_string();
        self
    }

    pub fn with_admin_username(mut self, username: &str) -> Self {
        self.admin_username = username.to_string();
        self
    }

    pub fn with_admin_password(mut self, password: &str) -> Self {
        self.admin_password = password.to_string();
        self
    }

    pub fn with_new_data_disk(mut self, size_gb: u32) -> Self {
        self.data_disks.push(DataDiskSpec::New { size_gb });
        self
    }

    pub fn with_new_data_disk_from(mut self, disk: DiskDefinition) -> Self {
        self.data_disks.push(DataDiskSpec::Define(disk));
        self
    }

    pub fn with_existing_data_disk(mut self, disk: &Disk) -> Self {
        self.data_disks.push(DataDiskSpec::Existing(disk.clone()));
        self
    }

    pub fn with_size(mut self, size: &str) -> Self {
        self.size = size.to_string();
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn validate(&self) -> Validation {
        let what = format!("virtual machine {}", self.name);
        require("name", &self.name, &what)?;
        require("region", &self.region, &what)?;
        require("resource group", &self.resource_group, &what)?;
        require("primary network interface", &self.primary_nic_id, &what)?;
        require("image", &self.image, &what)?;
        require("size", &self.size, &what)?;
        require("admin user name", &self.admin_username, &what)?;

        if self.name.len() > MAX_WINDOWS_COMPUTER_NAME {
            invalid_definition!("{}: Windows computer names are limited to {} characters", what, MAX_WINDOWS_COMPUTER_NAME);
        }
        if RESERVED_USERNAMES.contains(&self.admin_username.to_lowercase().as_str()) {
            invalid_definition!("{}: admin user name '{}' is reserved by Azure", what, self.admin_username);
        }
        validate_password(&self.admin_password, &what)?;

        for spec in &self.data_disks {
            match spec {
                DataDiskSpec::New { size_gb } => validate_disk_size(*size_gb, &format!("new data disk of {}", self.name))?,
                DataDiskSpec::Define(def) => def.validate()?,
                DataDiskSpec::Existing(_) => (),
            }
        }
        Ok(())
    }
}

/// 12 to 123 characters, with at least 3 of: lowercase, uppercase, digit, special character
fn validate_password(password: &str, what: &str) -> Validation {
    if !within_bounds_incl!(12, password.chars().count(), 123) {
        invalid_definition!("{}: admin password must be 12 to 123 characters long", what);
    }
    let classes = [
        password.chars().any(|c| c.is_lowercase()),
        password.chars().any(|c| c.is_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_alphanumeric()),
    ];
    if classes.iter().filter(|present| **present).count() < 3 {
        invalid_definition!("{}: admin password is not complex enough", what);
    }
    Ok(())
}

// ============================== VM update ====================================

/// Changes applied to an existing VM in one update call.
/// Detaches are applied before attaches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VmUpdate {
    pub tags: BTreeMap<String, String>,
    pub new_data_disks: Vec<u32>,
    pub detach_luns: Vec<u32>,
}

impl VmUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_new_data_disk(mut self, size_gb: u32) -> Self {
        self.new_data_disks.push(size_gb);
        self
    }

    pub fn without_data_disk(mut self, lun: u32) -> Self {
        self.detach_luns.push(lun);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.new_data_disks.is_empty() && self.detach_luns.is_empty()
    }

    pub fn validate(&self) -> Validation {
        if self.is_empty() {
            invalid_definition!("update does not change anything");
        }
        if self.tags.keys().any(|k| k.trim().is_empty()) {
            invalid_definition!("tag names cannot be empty");
        }
        for size_gb in &self.new_data_disks {
            validate_disk_size(*size_gb, "new data disk")?;
        }
        let unique: HashSet<&u32> = self.detach_luns.iter().collect();
        if unique.len() != self.detach_luns.len() {
            invalid_definition!("the same LUN is detached twice");
        }
        Ok(())
    }
}
