// Turns the definitions of system.rs into Azure CLI invocations.
// Commands are argument vectors (no shell in between), so values with spaces
// such as tag values need no quoting.

use super::system::{DataDiskSpec, DiskDefinition, NetworkDefinition, NicDefinition, NsgDefinition, SecurityRule, SubnetDefinition, VmDefinition, RULE_ACCESS, RULE_DIRECTION};
use super::VirtualMachine;
use std::collections::BTreeMap;
use std::fmt;

const REDACTED: &str = "********";

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Plain(String),
    /// Emitted as one `--name=value` element so a value starting with `-` is not read as a flag
    Secret { name: String, value: String },
}

/// One `az` invocation, without the binary name
#[derive(Debug, Clone, PartialEq)]
pub struct AzCommand {
    args: Vec<Arg>,
}

impl AzCommand {
    /// `group` is the space separated command path, e.g. "network vnet create"
    pub fn new(group: &str) -> Self {
        Self { args: group.split_whitespace().map(|w| Arg::Plain(w.to_string())).collect() }
    }

    pub fn arg(mut self, name: &str, value: &str) -> Self {
        self.args.push(Arg::Plain(format!("--{}", name)));
        self.args.push(Arg::Plain(value.to_string()));
        self
    }

    pub fn opt_arg(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.arg(name, v),
            None => self,
        }
    }

    /// `--name v1 v2 ...`, skipped entirely when there are no values
    pub fn values<I, S>(mut self, name: &str, values: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String> {

        let values: Vec<Arg> = values.into_iter().map(|v| Arg::Plain(v.into())).collect();
        if !values.is_empty() {
            self.args.push(Arg::Plain(format!("--{}", name)));
            self.args.extend(values);
        }
        self
    }

    pub fn flag(mut self, name: &str) -> Self {
        self.args.push(Arg::Plain(format!("--{}", name)));
        self
    }

    /// Like arg(), but the value never shows up in logs or error messages
    pub fn secret(mut self, name: &str, value: &str) -> Self {
        self.args.push(Arg::Secret { name: name.to_string(), value: value.to_string() });
        self
    }

    /// Arguments to pass to the process, JSON output requested
    pub fn to_args(&self) -> Vec<String> {
        let mut ret: Vec<String> = self.args.iter().map(|a| match a {
            Arg::Plain(s) => s.clone(),
            Arg::Secret { name, value } => format!("--{}={}", name, value),
        }).collect();
        ret.extend(["--output", "json", "--only-show-errors"].iter().map(|s| s.to_string()));
        ret
    }
}

impl fmt::Display for AzCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let shown: Vec<String> = self.args.iter().map(|a| match a {
            Arg::Plain(s) => s.clone(),
            Arg::Secret { name, .. } => format!("--{}={}", name, REDACTED),
        }).collect();
        write!(f, "{}", shown.join(" "))
    }
}

// ============================== Resource group ===============================

pub fn group_create(name: &str, region: &str) -> AzCommand {
    AzCommand::new("group create").arg("name", name).arg("location", region)
}

pub fn group_delete(name: &str) -> AzCommand {
    AzCommand::new("group delete").arg("name", name).flag("yes")
}

// ================================= Network ===================================

pub fn vnet_create(def: &NetworkDefinition) -> AzCommand {
    AzCommand::new("network vnet create")
        .arg("resource-group", def.resource_group.name())
        .arg("name", &def.name)
        .arg("location", &def.region)
        .values("address-prefixes", def.address_space.iter().map(|a| a.to_string()))
}

pub fn subnet_create(def: &NetworkDefinition, subnet: &SubnetDefinition) -> AzCommand {
    AzCommand::new("network vnet subnet create")
        .arg("resource-group", def.resource_group.name())
        .arg("vnet-name", &def.name)
        .arg("name", &subnet.name)
        .arg("address-prefixes", &subnet.address_prefix.to_string())
}

pub fn vnet_show(resource_group: &str, name: &str) -> AzCommand {
    AzCommand::new("network vnet show").arg("resource-group", resource_group).arg("name", name)
}

// ============================= Security group ================================

pub fn nsg_create(def: &NsgDefinition) -> AzCommand {
    AzCommand::new("network nsg create")
        .arg("resource-group", &def.resource_group)
        .arg("name", &def.name)
        .arg("location", &def.region)
}

pub fn nsg_rule_create(def: &NsgDefinition, rule: &SecurityRule) -> AzCommand {
    AzCommand::new("network nsg rule create")
        .arg("resource-group", &def.resource_group)
        .arg("nsg-name", &def.name)
        .arg("name", &rule.name)
        .arg("priority", &rule.priority.to_string())
        .arg("direction", RULE_DIRECTION)
        .arg("access", RULE_ACCESS)
        .arg("protocol", &rule.protocol.to_string())
        .arg("source-address-prefixes", &rule.source_address)
        .arg("source-port-ranges", &rule.source_port.to_string())
        .arg("destination-address-prefixes", &rule.destination_address)
        .arg("destination-port-ranges", &rule.destination_port.to_string())
        .opt_arg("description", rule.description.as_deref())
}

pub fn nsg_show(resource_group: &str, name: &str) -> AzCommand {
    AzCommand::new("network nsg show").arg("resource-group", resource_group).arg("name", name)
}

// ================================== Disk =====================================

pub fn disk_create(def: &DiskDefinition) -> AzCommand {
    AzCommand::new("disk create")
        .arg("resource-group", &def.resource_group)
        .arg("name", &def.name)
        .arg("location", &def.region)
        .arg("size-gb", &def.size_gb.to_string())
}

// ============================ Network interface ==============================

pub fn public_ip_create(def: &NicDefinition) -> Option<AzCommand> {
    def.public_ip.as_ref().map(|pip| {
        AzCommand::new("network public-ip create")
            .arg("resource-group", &def.resource_group)
            .arg("name", &pip.name)
            .arg("location", &def.region)
            .arg("dns-name", &pip.name)
            .arg("sku", "Standard")
            .arg("allocation-method", "Static")
    })
}

pub fn public_ip_show(id: &str) -> AzCommand {
    AzCommand::new("network public-ip show").arg("ids", id)
}

pub fn nic_create(def: &NicDefinition) -> AzCommand {
    AzCommand::new("network nic create")
        .arg("resource-group", &def.resource_group)
        .arg("name", &def.name)
        .arg("location", &def.region)
        .arg("vnet-name", &def.network_name)
        .arg("subnet", &def.subnet)
        .opt_arg("public-ip-address", def.public_ip.as_ref().map(|p| p.name.as_str()))
        .arg("ip-forwarding", if def.ip_forwarding { "true" } else { "false" })
        .opt_arg("network-security-group", def.network_security_group.as_deref())
}

pub fn nic_show(id: &str) -> AzCommand {
    AzCommand::new("network nic show").arg("ids", id)
}

// ============================ Virtual machine ================================

/// `attached_disk_ids` are the ids of the Define and Existing data disks, in
/// definition order; new empty disks get the lowest LUNs.
pub fn vm_create(def: &VmDefinition, attached_disk_ids: &[String]) -> AzCommand {
    let new_sizes: Vec<String> = def.data_disks.iter().filter_map(|d| match d {
        DataDiskSpec::New { size_gb } => Some(size_gb.to_string()),
        _ => None,
    }).collect();

    AzCommand::new("vm create")
        .arg("resource-group", &def.resource_group)
        .arg("name", &def.name)
        .arg("location", &def.region)
        .arg("nics", &def.primary_nic_id)
        .arg("image", &def.image)
        .arg("size", &def.size)
        .arg("admin-username", &def.admin_username)
        .secret("admin-password", &def.admin_password)
        .values("data-disk-sizes-gb", new_sizes)
        .values("attach-data-disks", attached_disk_ids.iter().cloned())
        .values("tags", tag_pairs(&def.tags))
}

pub fn vm_show(resource_group: &str, name: &str) -> AzCommand {
    AzCommand::new("vm show").arg("resource-group", resource_group).arg("name", name).flag("show-details")
}

pub fn vm_update_tags(vm: &VirtualMachine, tags: &BTreeMap<String, String>) -> AzCommand {
    AzCommand::new("vm update")
        .arg("resource-group", &vm.resource_group)
        .arg("name", &vm.name)
        .values("set", tags.iter().map(|(k, v)| format!("tags.{}={}", k, v)))
}

pub fn vm_disk_attach_new(vm: &VirtualMachine, disk_name: &str, size_gb: u32, lun: u32) -> AzCommand {
    AzCommand::new("vm disk attach")
        .arg("resource-group", &vm.resource_group)
        .arg("vm-name", &vm.name)
        .arg("name", disk_name)
        .flag("new")
        .arg("size-gb", &size_gb.to_string())
        .arg("lun", &lun.to_string())
}

pub fn vm_disk_detach(vm: &VirtualMachine, disk_name: &str) -> AzCommand {
    AzCommand::new("vm disk detach")
        .arg("resource-group", &vm.resource_group)
        .arg("vm-name", &vm.name)
        .arg("name", disk_name)
}

/// `action` is one of restart, stop, start
pub fn vm_power(vm: &VirtualMachine, action: &str) -> AzCommand {
    AzCommand::new(&format!("vm {}", action))
        .arg("resource-group", &vm.resource_group)
        .arg("name", &vm.name)
}

pub fn vm_list(resource_group: &str) -> AzCommand {
    AzCommand::new("vm list").arg("resource-group", resource_group).flag("show-details")
}

pub fn vm_delete(id: &str) -> AzCommand {
    AzCommand::new("vm delete").arg("ids", id).flag("yes")
}

// ================================ Account ====================================

pub fn login_service_principal(client_id: &str, client_secret: &str, tenant_id: &str) -> AzCommand {
    AzCommand::new("login")
        .flag("service-principal")
        .arg("username", client_id)
        .secret("password", client_secret)
        .arg("tenant", tenant_id)
}

pub fn account_set(subscription_id: &str) -> AzCommand {
    AzCommand::new("account set").arg("subscription", subscription_id)
}

pub fn account_show() -> AzCommand {
    AzCommand::new("account show")
}

fn tag_pairs(tags: &BTreeMap<String, String>) -> Vec<String> {
    tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azuresir::system::{Protocol, SecurityRule};

    fn position(args: &[String], flag: &str) -> usize {
        args.iter().position(|a| a == flag).unwrap_or_else(|| panic!("{} missing from {:?}", flag, args))
    }

    #[test]
    fn rule_is_spelled_for_the_cli() {
        let nsg = NsgDefinition::define("fensg").with_region("eastus").with_existing_resource_group("rg");
        let rule = SecurityRule::allow_inbound("ALLOW-HTTP").to_port(80).with_protocol(Protocol::Tcp).with_priority(101).with_description("Allow HTTP");
        let args = nsg_rule_create(&nsg, &rule).to_args();

        assert_eq!(&args[..4], &["network", "nsg", "rule", "create"]);
        assert_eq!(args[position(&args, "--priority") + 1], "101");
        assert_eq!(args[position(&args, "--direction") + 1], "Inbound");
        assert_eq!(args[position(&args, "--access") + 1], "Allow");
        assert_eq!(args[position(&args, "--protocol") + 1], "Tcp");
        assert_eq!(args[position(&args, "--destination-port-ranges") + 1], "80");
        assert_eq!(args[position(&args, "--source-port-ranges") + 1], "*");
        assert_eq!(args[position(&args, "--description") + 1], "Allow HTTP");
        assert!(args.ends_with(&["--output".to_string(), "json".to_string(), "--only-show-errors".to_string()]));
    }

    #[test]
    fn dynamic_nic_has_no_private_address() {
        let nic = NicDefinition::define("nic1")
            .with_region("eastus")
            .with_existing_resource_group("rg")
            .with_subnet("Front-end")
            .with_new_primary_public_ip_address("pip1xyz")
            .with_ip_forwarding();
        let args = nic_create(&nic).to_args();
        assert!(!args.contains(&"--private-ip-address".to_string()));
        assert_eq!(args[position(&args, "--public-ip-address") + 1], "pip1xyz");
        assert_eq!(args[position(&args, "--ip-forwarding") + 1], "true");

        let pip = public_ip_create(&nic).unwrap().to_args();
        assert_eq!(pip[position(&pip, "--dns-name") + 1], "pip1xyz");
    }

    #[test]
    fn vm_create_lists_new_then_attached_disks_and_hides_password() {
        let def = VmDefinition::define("wVM1")
            .with_existing_resource_group("rg")
            .with_admin_username("vmadmin0001")
            .with_admin_password("Pa5$secretvalue")
            .with_new_data_disk(10)
            .with_tag("who-rocks", "java");
        let cmd = vm_create(&def, &["/d/dsk-1".to_string(), "/d/dsk-2".to_string()]);
        let args = cmd.to_args();

        assert_eq!(args[position(&args, "--data-disk-sizes-gb") + 1], "10");
        let attach = position(&args, "--attach-data-disks");
        assert_eq!(&args[attach + 1..attach + 3], &["/d/dsk-1", "/d/dsk-2"]);
        assert!(args.contains(&"--admin-password=Pa5$secretvalue".to_string()));
        assert_eq!(args[position(&args, "--tags") + 1], "who-rocks=java");

        let shown = cmd.to_string();
        assert!(!shown.contains("Pa5$secretvalue"));
        assert!(shown.contains("--admin-password=********"));
    }

    #[test]
    fn secret_starting_with_dash_stays_attached_to_its_flag() {
        let cmd = login_service_principal("app-id", "-Xy7~secret", "tenant-id");
        let args = cmd.to_args();
        assert!(args.contains(&"--password=-Xy7~secret".to_string()));
        assert!(!args.contains(&"-Xy7~secret".to_string()));
        assert!(!args.contains(&"--password".to_string()));
        assert_eq!(args[position(&args, "--username") + 1], "app-id");

        let shown = cmd.to_string();
        assert!(!shown.contains("Xy7"));
        assert!(shown.contains("--password=********"));
    }

    #[test]
    fn empty_value_lists_are_skipped() {
        let def = VmDefinition::define("wVM1").with_existing_resource_group("rg");
        let args = vm_create(&def, &[]).to_args();
        assert!(!args.contains(&"--attach-data-disks".to_string()));
        assert!(!args.contains(&"--data-disk-sizes-gb".to_string()));
        assert!(!args.contains(&"--tags".to_string()));
    }

    #[test]
    fn tag_values_with_spaces_stay_one_argument() {
        let vm = VirtualMachine {
            id: "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/wVM1".to_string(),
            name: "wVM1".to_string(),
            resource_group: "rg".to_string(),
            region: "eastus".to_string(),
            size: "Standard_DS2_v2".to_string(),
            admin_username: None,
            primary_nic_id: None,
            data_disks: Vec::new(),
            tags: BTreeMap::new(),
            power_state: crate::azuresir::PowerState::Running,
            public_ips: Vec::new(),
        };
        let mut tags = BTreeMap::new();
        tags.insert("where".to_string(), "on azure".to_string());
        let args = vm_update_tags(&vm, &tags).to_args();
        assert_eq!(args[position(&args, "--set") + 1], "tags.where=on azure");
    }
}
