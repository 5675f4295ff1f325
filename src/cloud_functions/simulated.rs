// In-memory control plane. It behaves like Azure where the workflow can tell
// the difference: ARM ids, LUN assignment, cascading group deletion and
// NotFound answers. Backs the `simulate` command and the tests.

use crate::azuresir::system::{DataDiskSpec, DiskDefinition, NetworkDefinition, NicDefinition, NsgDefinition, ResourceGroupRef, VmDefinition, VmUpdate, RULE_ACCESS, RULE_DIRECTION};
use crate::azuresir::{DataDisk, Disk, Network, NetworkInterface, NetworkSecurityGroup, PowerState, PublicIpAddress, SecurityRuleSummary, Subnet, VirtualMachine};
use crate::cloud_functions::AzureClient;
use crate::error::{CloudError, CloudResult};
use crate::utils::resource_id::{name_from_id, ResourceId};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";
const COMPUTE: &str = "Microsoft.Compute";
const NETWORK: &str = "Microsoft.Network";

#[derive(Default)]
struct State {
    /// name -> region
    groups: BTreeMap<String, String>,
    networks: Vec<Network>,
    nsgs: Vec<NetworkSecurityGroup>,
    disks: Vec<Disk>,
    public_ips: Vec<PublicIpAddress>,
    nics: Vec<NetworkInterface>,
    vms: Vec<VirtualMachine>,

    calls: Vec<String>,
    #[cfg(test)]
    snapshots: Vec<VirtualMachine>,
    failing: HashSet<String>,
    next_address: u8,
}

impl State {
    fn require_group(&self, name: &str) -> CloudResult<()> {
        if self.groups.contains_key(name) {
            Ok(())
        } else {
            Err(CloudError::NotFound(format!("(ResourceGroupNotFound) Resource group '{}' could not be found.", name)))
        }
    }

    fn vm_index(&self, resource_group: &str, name: &str) -> CloudResult<usize> {
        self.vms.iter()
            .position(|vm| vm.resource_group == resource_group && vm.name == name)
            .ok_or_else(|| CloudError::NotFound(format!("(ResourceNotFound) The Resource 'Microsoft.Compute/virtualMachines/{}' under resource group '{}' was not found.", name, resource_group)))
    }

    fn snapshot(&mut self, idx: usize) -> VirtualMachine {
        let vm = self.vms[idx].clone();
        #[cfg(test)]
        self.snapshots.push(vm.clone());
        vm
    }
}

pub struct SimulatedAzure {
    state: RefCell<State>,
}

impl Default for SimulatedAzure {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAzure {
    pub fn new() -> Self {
        Self { state: RefCell::new(State { next_address: 4, ..State::default() }) }
    }

    /// Trait method names in call order
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    fn enter(&self, operation: &str) -> CloudResult<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(operation.to_string());
        if state.failing.contains(operation) {
            return Err(CloudError::Simulated(operation.to_string()));
        }
        Ok(())
    }

    fn id(resource_group: &str, namespace: &str, resource_type: &str, name: &str) -> String {
        ResourceId::format(SUBSCRIPTION, resource_group, namespace, resource_type, name)
    }

    fn insert_disk(state: &mut State, def: &DiskDefinition) -> CloudResult<Disk> {
        def.validate().map_err(|e| CloudError::Validation(e.0))?;
        state.require_group(&def.resource_group)?;
        let disk = Disk {
            id: Self::id(&def.resource_group, COMPUTE, "disks", &def.name),
            name: def.name.clone(),
            resource_group: def.resource_group.clone(),
            size_gb: def.size_gb,
        };
        state.disks.push(disk.clone());
        Ok(disk)
    }
}

#[cfg(test)]
impl SimulatedAzure {
    /// Every later call of `operation` (a trait method name) fails
    pub fn fail_on(self, operation: &str) -> Self {
        self.state.borrow_mut().failing.insert(operation.to_string());
        self
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state.borrow().calls.iter().filter(|c| *c == operation).count()
    }

    /// Every VM returned so far, in order
    pub fn snapshots(&self) -> Vec<VirtualMachine> {
        self.state.borrow().snapshots.clone()
    }

    pub fn group_exists(&self, name: &str) -> bool {
        self.state.borrow().groups.contains_key(name)
    }

    /// Number of resources of any kind left in the group
    pub fn resource_count(&self, resource_group: &str) -> usize {
        let state = self.state.borrow();
        state.networks.iter().filter(|r| r.resource_group == resource_group).count()
            + state.nsgs.iter().filter(|r| r.resource_group == resource_group).count()
            + state.disks.iter().filter(|r| r.resource_group == resource_group).count()
            + state.nics.iter().filter(|r| r.resource_group == resource_group).count()
            + state.public_ips.iter().filter(|r| group_of(&r.id) == resource_group).count()
            + state.vms.iter().filter(|r| r.resource_group == resource_group).count()
    }
}

fn group_of(id: &str) -> String {
    ResourceId::parse(id).map(|r| r.resource_group).unwrap_or_default()
}

fn not_found(what: &str, id: &str) -> CloudError {
    CloudError::NotFound(format!("(ResourceNotFound) {} '{}' was not found.", what, id))
}

impl AzureClient for SimulatedAzure {
    fn subscription_id(&self) -> CloudResult<String> {
        self.enter("subscription_id")?;
        Ok(SUBSCRIPTION.to_string())
    }

    fn create_network(&self, def: &NetworkDefinition) -> CloudResult<Network> {
        self.enter("create_network")?;
        def.validate().map_err(|e| CloudError::Validation(e.0))?;
        let mut state = self.state.borrow_mut();
        match &def.resource_group {
            ResourceGroupRef::New(name) => {
                state.groups.entry(name.clone()).or_insert_with(|| def.region.clone());
            }
            ResourceGroupRef::Existing(name) => state.require_group(name)?,
        }

        let group = def.resource_group.name();
        let network = Network {
            id: Self::id(group, NETWORK, "virtualNetworks", &def.name),
            name: def.name.clone(),
            resource_group: group.to_string(),
            region: def.region.clone(),
            address_space: def.address_space.iter().map(|a| a.to_string()).collect(),
            subnets: def.subnets.iter().map(|s| Subnet { name: s.name.clone(), address_prefix: s.address_prefix.to_string() }).collect(),
        };
        state.networks.push(network.clone());
        Ok(network)
    }

    fn create_network_security_group(&self, def: &NsgDefinition) -> CloudResult<NetworkSecurityGroup> {
        self.enter("create_network_security_group")?;
        def.validate().map_err(|e| CloudError::Validation(e.0))?;
        let mut state = self.state.borrow_mut();
        state.require_group(&def.resource_group)?;

        let mut rules: Vec<SecurityRuleSummary> = def.rules.iter().map(|r| SecurityRuleSummary {
            name: r.name.clone(),
            priority: r.priority,
            direction: RULE_DIRECTION.to_string(),
            access: RULE_ACCESS.to_string(),
            protocol: r.protocol.to_string(),
            destination_port: r.destination_port.to_string(),
        }).collect();
        rules.sort_by_key(|r| r.priority);

        let nsg = NetworkSecurityGroup {
            id: Self::id(&def.resource_group, NETWORK, "networkSecurityGroups", &def.name),
            name: def.name.clone(),
            resource_group: def.resource_group.clone(),
            rules,
        };
        state.nsgs.push(nsg.clone());
        Ok(nsg)
    }

    fn create_disk(&self, def: &DiskDefinition) -> CloudResult<Disk> {
        self.enter("create_disk")?;
        Self::insert_disk(&mut self.state.borrow_mut(), def)
    }

    fn create_network_interface(&self, def: &NicDefinition) -> CloudResult<NetworkInterface> {
        self.enter("create_network_interface")?;
        def.validate().map_err(|e| CloudError::Validation(e.0))?;
        let mut state = self.state.borrow_mut();
        state.require_group(&def.resource_group)?;

        let network = state.networks.iter()
            .find(|n| n.resource_group == def.resource_group && n.name == def.network_name)
            .cloned()
            .ok_or_else(|| not_found("virtual network", &def.network_name))?;
        if !network.subnets.iter().any(|s| s.name == def.subnet) {
            return Err(not_found("subnet", &def.subnet));
        }
        if let Some(nsg_id) = &def.network_security_group {
            if !state.nsgs.iter().any(|n| &n.id == nsg_id) {
                return Err(not_found("network security group", nsg_id));
            }
        }

        let address = state.next_address;
        state.next_address = state.next_address.wrapping_add(1);

        let public_ip_id = match &def.public_ip {
            Some(pip) => {
                let public_ip = PublicIpAddress {
                    id: Self::id(&def.resource_group, NETWORK, "publicIPAddresses", &pip.name),
                    name: pip.name.clone(),
                    ip_address: Some(format!("20.42.0.{}", address)),
                    fqdn: Some(format!("{}.{}.cloudapp.azure.com", pip.name, def.region)),
                };
                let id = public_ip.id.clone();
                state.public_ips.push(public_ip);
                Some(id)
            }
            None => None,
        };

        let prefix = network.subnets.iter().find(|s| s.name == def.subnet).map(|s| s.address_prefix.clone()).unwrap_or_default();
        let base = prefix.split('/').next().unwrap_or("0.0.0.0").rsplitn(2, '.').nth(1).unwrap_or("0.0.0").to_string();
        let private_ip = format!("{}.{}", base, address);

        let nic = NetworkInterface {
            id: Self::id(&def.resource_group, NETWORK, "networkInterfaces", &def.name),
            name: def.name.clone(),
            resource_group: def.resource_group.clone(),
            private_ip: Some(private_ip),
            public_ip_id,
            ip_forwarding: def.ip_forwarding,
            network_security_group_id: def.network_security_group.clone(),
        };
        state.nics.push(nic.clone());
        Ok(nic)
    }

    fn create_virtual_machine(&self, def: &VmDefinition) -> CloudResult<VirtualMachine> {
        self.enter("create_virtual_machine")?;
        def.validate().map_err(|e| CloudError::Validation(e.0))?;
        let mut state = self.state.borrow_mut();
        state.require_group(&def.resource_group)?;
        if state.vms.iter().any(|vm| vm.resource_group == def.resource_group && vm.name == def.name) {
            return Err(CloudError::Validation(format!("a virtual machine named {} already exists", def.name)));
        }

        let nic = state.nics.iter()
            .find(|n| n.id == def.primary_nic_id)
            .cloned()
            .ok_or_else(|| not_found("network interface", &def.primary_nic_id))?;

        let mut data_disks = Vec::new();
        let new_disks = def.data_disks.iter().filter_map(|d| match d {
            DataDiskSpec::New { size_gb } => Some(*size_gb),
            _ => None,
        });
        for size_gb in new_disks {
            let lun = data_disks.len() as u32;
            data_disks.push(DataDisk { lun, name: format!("{}_disk{}", def.name, lun + 2), size_gb, managed_disk_id: None });
        }
        for spec in &def.data_disks {
            let disk = match spec {
                DataDiskSpec::New { .. } => continue,
                DataDiskSpec::Define(disk_def) => Self::insert_disk(&mut state, disk_def)?,
                DataDiskSpec::Existing(disk) => state.disks.iter()
                    .find(|d| d.id == disk.id)
                    .cloned()
                    .ok_or_else(|| not_found("disk", &disk.id))?,
            };
            let lun = data_disks.len() as u32;
            data_disks.push(DataDisk { lun, name: disk.name, size_gb: disk.size_gb, managed_disk_id: Some(disk.id) });
        }

        let public_ips: Vec<String> = nic.public_ip_id.as_ref()
            .and_then(|id| state.public_ips.iter().find(|p| &p.id == id))
            .and_then(|p| p.ip_address.clone())
            .into_iter()
            .collect();

        let region = state.groups.get(&def.resource_group).cloned().unwrap_or_default();
        state.vms.push(VirtualMachine {
            id: Self::id(&def.resource_group, COMPUTE, "virtualMachines", &def.name),
            name: def.name.clone(),
            resource_group: def.resource_group.clone(),
            region: if def.region.is_empty() { region } else { def.region.clone() },
            size: def.size.clone(),
            admin_username: Some(def.admin_username.clone()),
            primary_nic_id: Some(nic.id),
            data_disks,
            tags: def.tags.clone(),
            power_state: PowerState::Running,
            public_ips,
        });
        let idx = state.vms.len() - 1;
        Ok(state.snapshot(idx))
    }

    fn get_virtual_machine(&self, resource_group: &str, name: &str) -> CloudResult<VirtualMachine> {
        self.enter("get_virtual_machine")?;
        let mut state = self.state.borrow_mut();
        let idx = state.vm_index(resource_group, name)?;
        Ok(state.snapshot(idx))
    }

    fn get_public_ip_address(&self, vm: &VirtualMachine) -> CloudResult<PublicIpAddress> {
        self.enter("get_public_ip_address")?;
        let state = self.state.borrow();
        let nic_id = vm.primary_nic_id.as_deref().ok_or_else(|| not_found("network interface of", &vm.name))?;
        let nic = state.nics.iter().find(|n| n.id == nic_id).ok_or_else(|| not_found("network interface", nic_id))?;
        let pip_id = nic.public_ip_id.as_deref().ok_or_else(|| not_found("public IP address of", &nic.name))?;
        state.public_ips.iter().find(|p| p.id == pip_id).cloned().ok_or_else(|| not_found("public IP address", pip_id))
    }

    fn update_virtual_machine(&self, vm: &VirtualMachine, update: &VmUpdate) -> CloudResult<VirtualMachine> {
        self.enter("update_virtual_machine")?;
        update.validate().map_err(|e| CloudError::Validation(e.0))?;
        let mut state = self.state.borrow_mut();
        let idx = state.vm_index(&vm.resource_group, &vm.name)?;

        let target = &mut state.vms[idx];
        for lun in &update.detach_luns {
            if target.data_disk_at(*lun).is_none() {
                return Err(CloudError::NotFound(format!("no data disk at LUN {} of {}", lun, target.name)));
            }
        }
        for (key, value) in &update.tags {
            target.tags.insert(key.clone(), value.clone());
        }
        target.data_disks.retain(|d| !update.detach_luns.contains(&d.lun));
        for size_gb in &update.new_data_disks {
            let lun = target.next_free_lun();
            let name = format!("{}_attached{}", target.name, lun);
            target.data_disks.push(DataDisk { lun, name, size_gb: *size_gb, managed_disk_id: None });
        }
        target.data_disks.sort_by_key(|d| d.lun);
        Ok(state.snapshot(idx))
    }

    fn restart_virtual_machine(&self, vm: &VirtualMachine) -> CloudResult<VirtualMachine> {
        self.enter("restart_virtual_machine")?;
        let mut state = self.state.borrow_mut();
        let idx = state.vm_index(&vm.resource_group, &vm.name)?;
        state.vms[idx].power_state = PowerState::Running;
        Ok(state.snapshot(idx))
    }

    fn power_off_virtual_machine(&self, vm: &VirtualMachine) -> CloudResult<VirtualMachine> {
        self.enter("power_off_virtual_machine")?;
        let mut state = self.state.borrow_mut();
        let idx = state.vm_index(&vm.resource_group, &vm.name)?;
        state.vms[idx].power_state = PowerState::Stopped;
        Ok(state.snapshot(idx))
    }

    fn start_virtual_machine(&self, vm: &VirtualMachine) -> CloudResult<VirtualMachine> {
        self.enter("start_virtual_machine")?;
        let mut state = self.state.borrow_mut();
        let idx = state.vm_index(&vm.resource_group, &vm.name)?;
        state.vms[idx].power_state = PowerState::Running;
        Ok(state.snapshot(idx))
    }

    fn list_virtual_machines(&self, resource_group: &str) -> CloudResult<Vec<VirtualMachine>> {
        self.enter("list_virtual_machines")?;
        let state = self.state.borrow();
        state.require_group(resource_group)?;
        Ok(state.vms.iter().filter(|vm| vm.resource_group == resource_group).cloned().collect())
    }

    fn delete_virtual_machine_by_id(&self, id: &str) -> CloudResult<()> {
        self.enter("delete_virtual_machine_by_id")?;
        let mut state = self.state.borrow_mut();
        let before = state.vms.len();
        state.vms.retain(|vm| !vm.id.eq_ignore_ascii_case(id));
        if state.vms.len() == before {
            return Err(not_found("virtual machine", name_from_id(id)));
        }
        Ok(())
    }

    fn delete_resource_group(&self, name: &str) -> CloudResult<()> {
        self.enter("delete_resource_group")?;
        let mut state = self.state.borrow_mut();
        state.require_group(name)?;
        state.groups.remove(name);
        state.networks.retain(|r| r.resource_group != name);
        state.nsgs.retain(|r| r.resource_group != name);
        state.disks.retain(|r| r.resource_group != name);
        state.nics.retain(|r| r.resource_group != name);
        state.public_ips.retain(|r| group_of(&r.id) != name);
        state.vms.retain(|r| r.resource_group != name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azuresir::system::{Protocol, SecurityRule};
    use assert_matches::assert_matches;

    const RG: &str = "rg";

    fn network(azure: &SimulatedAzure) -> Network {
        let def = NetworkDefinition::define("vnet1")
            .with_region("eastus")
            .with_new_resource_group(RG)
            .with_address_space("172.16.0.0/16".parse().unwrap())
            .define_subnet("Front-end", "172.16.1.0/24".parse().unwrap());
        azure.create_network(&def).unwrap()
    }

    fn nic(azure: &SimulatedAzure, network: &Network) -> NetworkInterface {
        let def = NicDefinition::define("nic1")
            .with_region("eastus")
            .with_existing_resource_group(RG)
            .with_existing_primary_network(network)
            .with_subnet("Front-end")
            .with_new_primary_public_ip_address("pip1abc");
        azure.create_network_interface(&def).unwrap()
    }

    fn vm_def(nic: &NetworkInterface) -> VmDefinition {
        VmDefinition::define("wVM1")
            .with_region("eastus")
            .with_existing_resource_group(RG)
            .with_existing_primary_network_interface(nic)
            .with_image("img")
            .with_size("Standard_DS2_v2")
            .with_admin_username("vmadmin0001")
            .with_admin_password("Pa5$abcdefghij")
    }

    #[test]
    fn unknown_group_is_not_found() {
        let azure = SimulatedAzure::new();
        assert_matches!(azure.delete_resource_group(RG), Err(e) if e.is_not_found());
        assert_matches!(azure.list_virtual_machines(RG), Err(e) if e.is_not_found());
    }

    #[test]
    fn group_delete_cascades() {
        let azure = SimulatedAzure::new();
        let network = network(&azure);
        let nsg = NsgDefinition::define("nsg").with_region("eastus").with_existing_resource_group(RG)
            .define_rule(SecurityRule::allow_inbound("ALLOW-RDP").to_port(3389).with_protocol(Protocol::Tcp).with_priority(100));
        azure.create_network_security_group(&nsg).unwrap();
        let nic = nic(&azure, &network);
        azure.create_virtual_machine(&vm_def(&nic)).unwrap();
        assert_eq!(azure.resource_count(RG), 5);

        azure.delete_resource_group(RG).unwrap();
        assert!(!azure.group_exists(RG));
        assert_eq!(azure.resource_count(RG), 0);
    }

    #[test]
    fn new_disks_take_the_first_luns() {
        let azure = SimulatedAzure::new();
        let network = network(&azure);
        let nic = nic(&azure, &network);
        let existing = azure.create_disk(&DiskDefinition::define("dsk-2").with_region("eastus").with_existing_resource_group(RG).with_size_in_gb(50)).unwrap();
        let def = vm_def(&nic)
            .with_new_data_disk_from(DiskDefinition::define("dsk-1").with_region("eastus").with_existing_resource_group(RG).with_size_in_gb(100))
            .with_existing_data_disk(&existing)
            .with_new_data_disk(10);
        let vm = azure.create_virtual_machine(&def).unwrap();

        let layout: Vec<(u32, u32)> = vm.data_disks.iter().map(|d| (d.lun, d.size_gb)).collect();
        assert_eq!(layout, vec![(0, 10), (1, 100), (2, 50)]);
        assert_eq!(vm.public_ips.len(), 1);
        assert_eq!(vm.power_state, PowerState::Running);
    }

    #[test]
    fn detach_keeps_other_luns_and_attach_fills_the_hole() {
        let azure = SimulatedAzure::new();
        let network = network(&azure);
        let nic = nic(&azure, &network);
        let vm = azure.create_virtual_machine(&vm_def(&nic).with_new_data_disk(10).with_new_data_disk(20)).unwrap();

        let vm = azure.update_virtual_machine(&vm, &VmUpdate::new().without_data_disk(0)).unwrap();
        assert_eq!(vm.data_disks.iter().map(|d| d.lun).collect::<Vec<_>>(), vec![1]);

        let vm = azure.update_virtual_machine(&vm, &VmUpdate::new().with_new_data_disk(30)).unwrap();
        assert_eq!(vm.data_disk_at(0).map(|d| d.size_gb), Some(30));

        assert_matches!(azure.update_virtual_machine(&vm, &VmUpdate::new().without_data_disk(7)), Err(e) if e.is_not_found());
    }

    #[test]
    fn public_ip_of_vm() {
        let azure = SimulatedAzure::new();
        let network = network(&azure);
        let nic = nic(&azure, &network);
        let vm = azure.create_virtual_machine(&vm_def(&nic)).unwrap();
        let pip = azure.get_public_ip_address(&vm).unwrap();
        assert_eq!(pip.name, "pip1abc");
        assert_eq!(pip.fqdn.as_deref(), Some("pip1abc.eastus.cloudapp.azure.com"));
        assert_eq!(nic.private_ip.as_deref(), Some("172.16.1.4"));
    }

    #[test]
    fn injected_failure_is_recorded() {
        let azure = SimulatedAzure::new().fail_on("create_network");
        let def = NetworkDefinition::define("vnet1")
            .with_region("eastus")
            .with_new_resource_group(RG)
            .with_address_space("172.16.0.0/16".parse().unwrap())
            .define_subnet("Front-end", "172.16.1.0/24".parse().unwrap());
        assert_matches!(azure.create_network(&def), Err(CloudError::Simulated(op)) if op == "create_network");
        assert!(!azure.group_exists(RG));
        assert_eq!(azure.calls(), vec!["create_network"]);
    }

    #[test]
    fn invalid_definitions_are_rejected() {
        let azure = SimulatedAzure::new();
        network(&azure);
        let def = DiskDefinition::define("big").with_region("eastus").with_existing_resource_group(RG).with_size_in_gb(40000);
        assert_matches!(azure.create_disk(&def), Err(CloudError::Validation(_)));
    }
}
