// Reads the JSON printed by the Azure CLI back into the models of azuresir.
// Only the fields the sample uses are declared, serde skips the rest.

use super::{DataDisk, Disk, Network, NetworkInterface, NetworkSecurityGroup, PowerState, PublicIpAddress, SecurityRuleSummary, Subnet, VirtualMachine};
use crate::error::{CloudError, CloudResult};
use crate::utils::resource_id::ResourceId;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Some create commands wrap the resource, e.g. `{"newVNet": {...}}`
const ENVELOPES: &[&str] = &["newVNet", "NewNSG", "NewNIC", "publicIp"];

fn unwrap_envelope(value: Value) -> Value {
    if let Value::Object(map) = &value {
        if map.len() == 1 {
            for key in ENVELOPES {
                if let Some(inner) = map.get(*key) {
                    return inner.clone();
                }
            }
        }
    }
    value
}

/// Parses the output of `command`, looking through creation envelopes
pub fn parse<T: DeserializeOwned>(command: &str, stdout: &str) -> CloudResult<T> {
    let value: Value = serde_json::from_str(stdout)
        .map_err(|source| CloudError::Parse { command: command.to_string(), source })?;
    serde_json::from_value(unwrap_envelope(value))
        .map_err(|source| CloudError::Parse { command: command.to_string(), source })
}

/// Group reported by the CLI, or the one named in the resource id
fn group_or_from_id(resource_group: Option<String>, id: &str) -> String {
    match resource_group {
        Some(group) => group,
        None => ResourceId::parse(id).map(|r| r.resource_group).unwrap_or_default(),
    }
}

// ================================= Network ===================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzAddressSpace {
    #[serde(default)]
    address_prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzSubnet {
    name: String,
    #[serde(default)]
    address_prefix: Option<String>,
    #[serde(default)]
    address_prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzVnet {
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    resource_group: Option<String>,
    address_space: AzAddressSpace,
    #[serde(default)]
    subnets: Vec<AzSubnet>,
}

impl From<AzVnet> for Network {
    fn from(az: AzVnet) -> Self {
        let subnets = az.subnets.into_iter().map(|s| {
            let AzSubnet { name, address_prefix, address_prefixes } = s;
            Subnet {
                address_prefix: address_prefix.or_else(|| address_prefixes.into_iter().next()).unwrap_or_default(),
                name,
            }
        }).collect();
        Network {
            resource_group: group_or_from_id(az.resource_group, &az.id),
            id: az.id,
            name: az.name,
            region: az.location,
            address_space: az.address_space.address_prefixes,
            subnets,
        }
    }
}

// ============================= Security group ================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzSecurityRule {
    name: String,
    priority: u16,
    direction: String,
    access: String,
    protocol: String,
    #[serde(default)]
    destination_port_range: Option<String>,
    #[serde(default)]
    destination_port_ranges: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzNsg {
    id: String,
    name: String,
    #[serde(default)]
    resource_group: Option<String>,
    #[serde(default)]
    security_rules: Vec<AzSecurityRule>,
}

impl From<AzNsg> for NetworkSecurityGroup {
    fn from(az: AzNsg) -> Self {
        let mut rules: Vec<SecurityRuleSummary> = az.security_rules.into_iter().map(|r| {
            let AzSecurityRule { name, priority, direction, access, protocol, destination_port_range, destination_port_ranges } = r;
            SecurityRuleSummary {
                destination_port: destination_port_range.unwrap_or_else(|| destination_port_ranges.join(",")),
                name,
                priority,
                direction,
                access,
                protocol,
            }
        }).collect();
        rules.sort_by_key(|r| r.priority);
        NetworkSecurityGroup {
            resource_group: group_or_from_id(az.resource_group, &az.id),
            id: az.id,
            name: az.name,
            rules,
        }
    }
}

// ================================== Disk =====================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzDisk {
    id: String,
    name: String,
    #[serde(default)]
    resource_group: Option<String>,
    disk_size_gb: u32,
}

impl From<AzDisk> for Disk {
    fn from(az: AzDisk) -> Self {
        Disk {
            resource_group: group_or_from_id(az.resource_group, &az.id),
            id: az.id,
            name: az.name,
            size_gb: az.disk_size_gb,
        }
    }
}

// ============================ Network interface ==============================

#[derive(Debug, Deserialize)]
struct AzId {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzIpConfiguration {
    #[serde(default, alias = "privateIPAddress")]
    private_ip_address: Option<String>,
    #[serde(default, alias = "publicIPAddress")]
    public_ip_address: Option<AzId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzNic {
    id: String,
    name: String,
    #[serde(default)]
    resource_group: Option<String>,
    #[serde(default, alias = "enableIPForwarding")]
    enable_ip_forwarding: bool,
    #[serde(default)]
    ip_configurations: Vec<AzIpConfiguration>,
    #[serde(default)]
    network_security_group: Option<AzId>,
}

impl From<AzNic> for NetworkInterface {
    fn from(az: AzNic) -> Self {
        let primary = az.ip_configurations.into_iter().next();
        let (private_ip, public_ip_id) = match primary {
            Some(conf) => (conf.private_ip_address, conf.public_ip_address.map(|p| p.id)),
            None => (None, None),
        };
        NetworkInterface {
            resource_group: group_or_from_id(az.resource_group, &az.id),
            id: az.id,
            name: az.name,
            private_ip,
            public_ip_id,
            ip_forwarding: az.enable_ip_forwarding,
            network_security_group_id: az.network_security_group.map(|n| n.id),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzDnsSettings {
    #[serde(default)]
    fqdn: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzPublicIp {
    id: String,
    name: String,
    #[serde(default)]
    ip_address: Option<String>,
    #[serde(default)]
    dns_settings: Option<AzDnsSettings>,
}

impl From<AzPublicIp> for PublicIpAddress {
    fn from(az: AzPublicIp) -> Self {
        PublicIpAddress {
            id: az.id,
            name: az.name,
            ip_address: az.ip_address,
            fqdn: az.dns_settings.and_then(|d| d.fqdn),
        }
    }
}

// ============================ Virtual machine ================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzHardwareProfile {
    vm_size: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzOsProfile {
    #[serde(default)]
    admin_username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzDataDisk {
    lun: u32,
    name: String,
    #[serde(default)]
    disk_size_gb: Option<u32>,
    #[serde(default)]
    managed_disk: Option<AzId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzStorageProfile {
    #[serde(default)]
    data_disks: Vec<AzDataDisk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzNetworkProfile {
    #[serde(default)]
    network_interfaces: Vec<AzId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzVm {
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    resource_group: Option<String>,
    hardware_profile: AzHardwareProfile,
    #[serde(default)]
    os_profile: Option<AzOsProfile>,
    storage_profile: AzStorageProfile,
    #[serde(default)]
    network_profile: Option<AzNetworkProfile>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    /// Only present with `--show-details`
    #[serde(default)]
    power_state: Option<String>,
    /// Comma separated, only present with `--show-details`
    #[serde(default)]
    public_ips: Option<String>,
}

impl From<AzVm> for VirtualMachine {
    fn from(az: AzVm) -> Self {
        let mut data_disks: Vec<DataDisk> = az.storage_profile.data_disks.into_iter().map(|d| DataDisk {
            lun: d.lun,
            name: d.name,
            size_gb: d.disk_size_gb.unwrap_or(0),
            managed_disk_id: d.managed_disk.map(|m| m.id),
        }).collect();
        data_disks.sort_by_key(|d| d.lun);

        let public_ips = az.public_ips.unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(String::from)
            .collect();

        VirtualMachine {
            resource_group: group_or_from_id(az.resource_group, &az.id),
            id: az.id,
            name: az.name,
            region: az.location,
            size: az.hardware_profile.vm_size,
            admin_username: az.os_profile.and_then(|p| p.admin_username),
            primary_nic_id: az.network_profile.and_then(|p| p.network_interfaces.into_iter().next()).map(|n| n.id),
            data_disks,
            tags: az.tags.unwrap_or_default(),
            power_state: az.power_state.map(|s| PowerState::from_code(&s)).unwrap_or_else(|| PowerState::Unknown(String::new())),
            public_ips,
        }
    }
}

// ================================ Account ====================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzAccount {
    pub id: String,
}

/// Parses the output of a command returning a single resource
pub fn to_model<A, M>(command: &str, stdout: &str) -> CloudResult<M>
    where A: DeserializeOwned,
          M: From<A> {

    parse::<A>(command, stdout).map(M::from)
}

pub fn to_models<A, M>(command: &str, stdout: &str) -> CloudResult<Vec<M>>
    where A: DeserializeOwned,
          M: From<A> {

    parse::<Vec<A>>(command, stdout).map(|list| list.into_iter().map(M::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const VM_SHOW: &str = r#"{
        "id": "/subscriptions/0000/resourceGroups/testRG/providers/Microsoft.Compute/virtualMachines/wVM1",
        "name": "wVM1",
        "location": "eastus",
        "resourceGroup": "testRG",
        "hardwareProfile": {"vmSize": "Standard_DS2_v2"},
        "osProfile": {"adminUsername": "vmadmin0042", "computerName": "wVM1"},
        "storageProfile": {
            "dataDisks": [
                {"lun": 2, "name": "dsk-2", "diskSizeGb": 50, "managedDisk": {"id": "/subscriptions/0000/resourceGroups/testRG/providers/Microsoft.Compute/disks/dsk-2"}},
                {"lun": 0, "name": "wVM1_disk2", "diskSizeGb": 10, "managedDisk": null}
            ]
        },
        "networkProfile": {"networkInterfaces": [{"id": "/subscriptions/0000/resourceGroups/testRG/providers/Microsoft.Network/networkInterfaces/nic1"}]},
        "tags": {"who-rocks": "java"},
        "powerState": "VM running",
        "publicIps": "20.1.2.3"
    }"#;

    #[test]
    fn vm_with_details() {
        let vm: VirtualMachine = to_model::<AzVm, _>("vm show", VM_SHOW).unwrap();
        assert_eq!(vm.resource_group, "testRG");
        assert_eq!(vm.size, "Standard_DS2_v2");
        assert_eq!(vm.power_state, PowerState::Running);
        assert_eq!(vm.public_ips, vec!["20.1.2.3"]);
        assert_eq!(vm.data_disks.iter().map(|d| d.lun).collect::<Vec<_>>(), vec![0, 2]);
        assert!(vm.data_disk_at(2).unwrap().managed_disk_id.is_some());
        assert_eq!(vm.tags.get("who-rocks").map(String::as_str), Some("java"));
        assert!(vm.primary_nic_id.unwrap().ends_with("/nic1"));
    }

    #[test]
    fn vm_without_details_has_unknown_power_state() {
        let json = r#"{"id": "/subscriptions/0000/resourceGroups/testRG/providers/Microsoft.Compute/virtualMachines/v",
                       "name": "v", "hardwareProfile": {"vmSize": "Standard_A1"}, "storageProfile": {}, "tags": null}"#;
        let vm: VirtualMachine = to_model::<AzVm, _>("vm show", json).unwrap();
        assert_eq!(vm.resource_group, "testRG");
        assert_eq!(vm.power_state, PowerState::Unknown(String::new()));
        assert!(vm.public_ips.is_empty());
        assert!(vm.tags.is_empty());
    }

    #[test]
    fn vnet_envelope_is_unwrapped() {
        let json = r#"{"newVNet": {
            "id": "/subscriptions/0000/resourceGroups/testRG/providers/Microsoft.Network/virtualNetworks/vnet1",
            "name": "vnet1", "location": "eastus",
            "addressSpace": {"addressPrefixes": ["172.16.0.0/16"]},
            "subnets": [{"name": "Front-end", "addressPrefix": "172.16.1.0/24"},
                        {"name": "Back-end", "addressPrefixes": ["172.16.2.0/24"]}]
        }}"#;
        let network: Network = to_model::<AzVnet, _>("network vnet create", json).unwrap();
        assert_eq!(network.resource_group, "testRG");
        assert_eq!(network.address_space, vec!["172.16.0.0/16"]);
        assert_eq!(network.subnets[1], Subnet { name: "Back-end".to_string(), address_prefix: "172.16.2.0/24".to_string() });
    }

    #[test]
    fn nsg_rules_sorted_by_priority() {
        let json = r#"{"id": "/subscriptions/0000/resourceGroups/testRG/providers/Microsoft.Network/networkSecurityGroups/fensg",
            "name": "fensg",
            "securityRules": [
                {"name": "ALLOW-HTTP", "priority": 101, "direction": "Inbound", "access": "Allow", "protocol": "Tcp", "destinationPortRange": "80"},
                {"name": "ALLOW-RDP", "priority": 100, "direction": "Inbound", "access": "Allow", "protocol": "Tcp", "destinationPortRange": "3389"}
            ]}"#;
        let nsg: NetworkSecurityGroup = to_model::<AzNsg, _>("network nsg show", json).unwrap();
        assert_eq!(nsg.rules[0].name, "ALLOW-RDP");
        assert_eq!(nsg.rules[1].destination_port, "80");
    }

    #[test]
    fn reported_group_wins_and_port_lists_are_joined() {
        let json = r#"{"id": "/subscriptions/0000/resourceGroups/fromId/providers/Microsoft.Network/networkSecurityGroups/fensg",
            "name": "fensg", "resourceGroup": "testRG",
            "securityRules": [
                {"name": "ALLOW-WEB", "priority": 102, "direction": "Inbound", "access": "Allow", "protocol": "Tcp", "destinationPortRanges": ["80", "443"]}
            ]}"#;
        let nsg: NetworkSecurityGroup = to_model::<AzNsg, _>("network nsg show", json).unwrap();
        assert_eq!(nsg.resource_group, "testRG");
        assert_eq!(nsg.rules[0].destination_port, "80,443");
        assert_eq!(nsg.rules[0].name, "ALLOW-WEB");
    }

    #[test]
    fn nic_accepts_both_ip_spellings() {
        let json = r#"{"NewNIC": {
            "id": "/subscriptions/0000/resourceGroups/testRG/providers/Microsoft.Network/networkInterfaces/nic1",
            "name": "nic1", "enableIPForwarding": true,
            "ipConfigurations": [{"privateIPAddress": "172.16.1.4",
                                  "publicIPAddress": {"id": "/subscriptions/0000/resourceGroups/testRG/providers/Microsoft.Network/publicIPAddresses/pip1"}}],
            "networkSecurityGroup": {"id": "/subscriptions/0000/resourceGroups/testRG/providers/Microsoft.Network/networkSecurityGroups/fensg"}
        }}"#;
        let nic: NetworkInterface = to_model::<AzNic, _>("network nic create", json).unwrap();
        assert!(nic.ip_forwarding);
        assert_eq!(nic.private_ip.as_deref(), Some("172.16.1.4"));
        assert!(nic.public_ip_id.unwrap().ends_with("/pip1"));
        assert!(nic.network_security_group_id.is_some());
    }

    #[test]
    fn public_ip_fqdn() {
        let json = r#"{"publicIp": {"id": "/x/pip1", "name": "pip1", "ipAddress": "20.1.2.3",
                       "dnsSettings": {"fqdn": "pip1.eastus.cloudapp.azure.com"}}}"#;
        let pip: PublicIpAddress = to_model::<AzPublicIp, _>("network public-ip create", json).unwrap();
        assert_eq!(pip.ip_address.as_deref(), Some("20.1.2.3"));
        assert_eq!(pip.fqdn.as_deref(), Some("pip1.eastus.cloudapp.azure.com"));
    }

    #[test]
    fn vm_list_and_disk() {
        let list = format!("[{}]", VM_SHOW);
        let vms: Vec<VirtualMachine> = to_models::<AzVm, _>("vm list", &list).unwrap();
        assert_eq!(vms.len(), 1);

        let disk: Disk = to_model::<AzDisk, _>("disk create", r#"{"id": "/subscriptions/0000/resourceGroups/testRG/providers/Microsoft.Compute/disks/dsk-1", "name": "dsk-1", "diskSizeGb": 50}"#).unwrap();
        assert_eq!(disk.size_gb, 50);
        assert_eq!(disk.resource_group, "testRG");
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let res: CloudResult<VirtualMachine> = to_model::<AzVm, _>("vm show", "WARNING: not json");
        assert_matches!(res, Err(CloudError::Parse { command, .. }) if command == "vm show");
    }
}
