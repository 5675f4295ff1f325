// global_config.rs
//
// Everything the user may want to change about the sample lives in one YAML
// file (paths::CONFIG). Every field has a default so that the file, or any part
// of it, can be left out.

use crate::error::ConfigError;
use crate::paths;
use crate::utils::types::CidrIP;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SampleConfig {
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub vm: VmConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AzureConfig {
    pub cli_binary: String,
    pub region: String,
    pub resource_group: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            cli_binary: "az".to_string(),
            region: "eastus".to_string(),
            resource_group: "testRGViaApi".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SubnetConfig {
    pub name: String,
    pub prefix: CidrIP,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub address_space: CidrIP,
    pub subnets: Vec<SubnetConfig>,
    /// Subnet the VM's network interface is placed in
    pub nic_subnet: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let cidr = |ip: [u8; 4], netmask: u8| CidrIP::new(ip.into(), netmask);
        Self {
            address_space: cidr([172, 16, 0, 0], 16),
            subnets: vec![
                SubnetConfig { name: "Front-end".to_string(), prefix: cidr([172, 16, 1, 0], 24) },
                SubnetConfig { name: "Back-end".to_string(), prefix: cidr([172, 16, 2, 0], 24) },
            ],
            nic_subnet: "Front-end".to_string(),
        }
    }
}

fn default_tags() -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert("who-rocks".to_string(), "java".to_string());
    tags.insert("where".to_string(), "on azure".to_string());
    tags
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct VmConfig {
    pub size: String,
    /// Windows Server sku (e.g. 2012-R2-Datacenter), marketplace URN or CLI image alias
    pub image: String,
    pub new_data_disk_gb: u32,
    pub defined_data_disk_gb: u32,
    pub existing_data_disk_gb: u32,
    pub attached_data_disk_gb: u32,
    pub tags: BTreeMap<String, String>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            size: "Standard_DS2_v2".to_string(),
            image: "2012-R2-Datacenter".to_string(),
            new_data_disk_gb: 10,
            defined_data_disk_gb: 100,
            existing_data_disk_gb: 50,
            attached_data_disk_gb: 10,
            tags: default_tags(),
        }
    }
}

fn use_default_pause() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone)]
pub struct WorkflowConfig {
    #[serde(default = "use_default_pause")]
    pub pause_for_confirmation: bool,
    #[serde(default)]
    pub start_after_power_off: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { pause_for_confirmation: use_default_pause(), start_after_power_off: false }
    }
}

impl SampleConfig {
    pub fn from_yaml(text: &str, path: &str) -> Result<Self, ConfigError> {
        // an empty file is the same as no file
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: SampleConfig = serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml { path: path.to_string(), source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.azure.resource_group.trim().is_empty() {
            return Err(ConfigError::Invalid("azure.resource_group cannot be empty".to_string()));
        }
        if !self.network.subnets.iter().any(|s| s.name == self.network.nic_subnet) {
            return Err(ConfigError::Invalid(format!("network.nic_subnet '{}' is not one of the configured subnets", self.network.nic_subnet)));
        }
        for subnet in &self.network.subnets {
            if !self.network.address_space.contains(&subnet.prefix) {
                return Err(ConfigError::Invalid(format!("subnet {} ({}) is outside of the address space {}", subnet.name, subnet.prefix, self.network.address_space)));
            }
        }
        let sizes = [
            ("vm.new_data_disk_gb", self.vm.new_data_disk_gb),
            ("vm.defined_data_disk_gb", self.vm.defined_data_disk_gb),
            ("vm.existing_data_disk_gb", self.vm.existing_data_disk_gb),
            ("vm.attached_data_disk_gb", self.vm.attached_data_disk_gb),
        ];
        for (field, size) in sizes.iter() {
            if !within_bounds_incl!(1, *size, crate::azuresir::system::MAX_DISK_SIZE_GB) {
                return Err(ConfigError::Invalid(format!("{} must be between 1 and {} GB, got {}", field, crate::azuresir::system::MAX_DISK_SIZE_GB, size)));
            }
        }
        Ok(())
    }
}

/// Config file location: MANAGE_VM_CONFIG if set, the default path otherwise
pub fn config_path() -> String {
    std::env::var(paths::CONFIG_ENV).unwrap_or_else(|_| paths::CONFIG.to_string())
}

/// Loads the config file at `path`. A missing file is not an error: the defaults
/// are returned and the second element of the tuple is false.
pub fn load_config(path: &str) -> Result<(SampleConfig, bool), ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok((SampleConfig::from_yaml(&text, path)?, true)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok((SampleConfig::default(), false)),
        Err(source) => Err(ConfigError::Io { path: path.to_string(), source }),
    }
}

#[cfg(test)]
mod tests {
    use crate::azuresir::system::KnownWindowsImage;
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn defaults_match_the_documented_sample() {
        let config = SampleConfig::default();
        assert_eq!(config.azure.resource_group, "testRGViaApi");
        assert_eq!(config.network.address_space.to_string(), "172.16.0.0/16");
        assert_eq!(config.network.subnets.len(), 2);
        assert_eq!(config.vm.size, "Standard_DS2_v2");
        assert_eq!(config.vm.tags["where"], "on azure");
        assert!(config.workflow.pause_for_confirmation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let yaml = "azure:\n  region: westeurope\nworkflow:\n  start_after_power_off: true\n";
        let config = SampleConfig::from_yaml(yaml, "test.yml").unwrap();
        assert_eq!(config.azure.region, "westeurope");
        assert_eq!(config.azure.cli_binary, "az");
        assert!(config.workflow.start_after_power_off);
        assert!(config.workflow.pause_for_confirmation);
        assert_eq!(config.vm.defined_data_disk_gb, 100);
    }

    #[test]
    fn bad_cidr_is_a_yaml_error() {
        let yaml = "network:\n  address_space: 172.16.0.0\n";
        assert_matches!(SampleConfig::from_yaml(yaml, "test.yml"), Err(ConfigError::Yaml { .. }));
    }

    #[test]
    fn nic_subnet_must_exist() {
        let yaml = "network:\n  nic_subnet: DMZ\n";
        assert_matches!(SampleConfig::from_yaml(yaml, "test.yml"), Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn subnet_outside_address_space_is_rejected() {
        let yaml = "network:\n  subnets:\n    - { name: Front-end, prefix: 10.0.0.0/24 }\n";
        assert_matches!(SampleConfig::from_yaml(yaml, "test.yml"), Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_sized_disk_is_rejected() {
        let yaml = "vm:\n  existing_data_disk_gb: 0\n";
        assert_matches!(SampleConfig::from_yaml(yaml, "test.yml"), Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yml");
        let (config, found) = load_config(path.to_str().unwrap()).unwrap();
        assert!(!found);
        assert_eq!(config.azure.region, "eastus");
    }

    #[test]
    fn loads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "vm:\n  size: Standard_B2s\n  tags:\n    team: samples").unwrap();
        let (config, found) = load_config(file.path().to_str().unwrap()).unwrap();
        assert!(found);
        assert_eq!(config.vm.size, "Standard_B2s");
        assert_eq!(config.vm.tags.len(), 1);
    }

    #[test]
    fn shipped_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/manage_vm.yml");
        let (config, found) = load_config(path).unwrap();
        assert!(found);
        assert_eq!(config.network.nic_subnet, "Front-end");
        assert_eq!(config.vm.tags.len(), 2);
        assert!(config.workflow.pause_for_confirmation);
        assert_eq!(KnownWindowsImage::from_sku(&config.vm.image), Some(KnownWindowsImage::WindowsServer2012R2Datacenter));
    }
}
