pub mod confirm;

use crate::azuresir::system::{DiskDefinition, InvalidDefinition, KnownWindowsImage, NetworkDefinition, NicDefinition, NsgDefinition, Protocol, SecurityRule, VmDefinition, VmUpdate};
use crate::azuresir::{PowerState, VirtualMachine};
use crate::cloud_functions::AzureClient;
use crate::error::{CloudError, CloudResult, PipelineError};
use crate::utils::global_config::SampleConfig;
use crate::utils::names;
use confirm::Confirm;

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Max length of the generated network resource names
const RESOURCE_NAME_LEN: usize = 24;

/// One remote step of the workflow, used to say where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateNetwork,
    CreateSecurityGroup,
    CreateDisk,
    CreateNetworkInterface,
    CreateVm,
    GetPublicIp,
    TagVm,
    AttachDisk,
    DetachDisk,
    RestartVm,
    PowerOffVm,
    StartVm,
    ListVms,
    DeleteVm,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Step::CreateNetwork => "create virtual network",
            Step::CreateSecurityGroup => "create network security group",
            Step::CreateDisk => "create data disk",
            Step::CreateNetworkInterface => "create network interface",
            Step::CreateVm => "create virtual machine",
            Step::GetPublicIp => "get public IP address",
            Step::TagVm => "tag virtual machine",
            Step::AttachDisk => "attach data disk",
            Step::DetachDisk => "detach data disk",
            Step::RestartVm => "restart virtual machine",
            Step::PowerOffVm => "power off virtual machine",
            Step::StartVm => "start virtual machine",
            Step::ListVms => "list virtual machines",
            Step::DeleteVm => "delete virtual machine",
        };
        write!(f, "{}", name)
    }
}

/// Attaches the step to an error, like anyhow's Context but typed
trait StepContext<T> {
    fn during(self, step: Step) -> Result<T, PipelineError>;
}

impl<T> StepContext<T> for CloudResult<T> {
    fn during(self, step: Step) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError::Step { step, source })
    }
}

impl<T> StepContext<T> for Result<T, InvalidDefinition> {
    fn during(self, step: Step) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError::Invalid { step, source })
    }
}

fn unexpected(step: Step, check: Result<(), String>) -> Result<(), PipelineError> {
    check.map_err(|message| PipelineError::Unexpected { step, message })
}

/// Result of deleting the resource group at the end of a run
#[derive(Debug)]
pub enum CleanupOutcome {
    Deleted,
    /// The group did not exist, so nothing had been created
    NothingToClean,
    Failed(CloudError),
}

/// What the provisioning part produced before the VM got deleted
#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned {
    pub vm_id: String,
    pub public_ip: Option<String>,
    pub creation_time: Duration,
}

#[derive(Debug)]
pub struct RunReport {
    pub provisioning: Result<Provisioned, PipelineError>,
    pub cleanup: CleanupOutcome,
}

/// Names of everything the workflow creates, all random so that runs never collide
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNames {
    pub network: String,
    pub security_group: String,
    pub network_interface: String,
    pub public_ip: String,
    pub vm: String,
    pub defined_disk: String,
    pub existing_disk: String,
    pub admin_username: String,
    pub admin_password: String,
}

impl ResourceNames {
    pub fn generate() -> Self {
        Self {
            network: names::random_resource_name("vnet", RESOURCE_NAME_LEN),
            security_group: names::random_resource_name("fensg", RESOURCE_NAME_LEN),
            network_interface: names::random_resource_name("nic", RESOURCE_NAME_LEN),
            public_ip: names::random_resource_name("pip", RESOURCE_NAME_LEN),
            vm: names::create_random_name("wVM"),
            defined_disk: names::create_random_name("dsk-"),
            existing_disk: names::create_random_name("dsk-"),
            admin_username: names::create_username(),
            admin_password: names::create_password(),
        }
    }
}

// ============================== Post-conditions ==============================

fn check_disk_count(vm: &VirtualMachine, expected: usize) -> Result<(), String> {
    if vm.data_disks.len() != expected {
        return Err(format!("expected {} data disks, found {}", expected, vm.data_disks.len()));
    }
    Ok(())
}

fn check_tags(before: &BTreeMap<String, String>, requested: &BTreeMap<String, String>, after: &BTreeMap<String, String>) -> Result<(), String> {
    for (key, value) in requested {
        if after.get(key) != Some(value) {
            return Err(format!("tag {}={} is missing", key, value));
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            return Err(format!("tag {} was lost", key));
        }
    }
    Ok(())
}

/// The disk at `lun` is gone and every other disk kept its LUN
fn check_detached(before: &VirtualMachine, lun: u32, after: &VirtualMachine) -> Result<(), String> {
    if after.data_disk_at(lun).is_some() {
        return Err(format!("a data disk is still attached at LUN {}", lun));
    }
    for disk in before.data_disks.iter().filter(|d| d.lun != lun) {
        match after.data_disk_at(disk.lun) {
            Some(d) if d.name == disk.name => (),
            _ => return Err(format!("data disk {} moved away from LUN {}", disk.name, disk.lun)),
        }
    }
    Ok(())
}

fn check_power_state(vm: &VirtualMachine, expected: &PowerState) -> Result<(), String> {
    if &vm.power_state != expected {
        return Err(format!("power state is {}, expected {}", vm.power_state, expected));
    }
    Ok(())
}

fn check_listed_once(vms: &[VirtualMachine], id: &str) -> Result<(), String> {
    match vms.iter().filter(|vm| vm.id.eq_ignore_ascii_case(id)).count() {
        1 => Ok(()),
        n => Err(format!("{} is listed {} times", id, n)),
    }
}

// ================================ Cleanup ====================================

/// Deletes the resource group and everything in it
pub fn clean_resource_group<C: AzureClient>(client: &C, resource_group: &str) -> CleanupOutcome {
    println_with_time!("Deleting Resource Group: {}", resource_group);
    match client.delete_resource_group(resource_group) {
        Ok(()) => {
            println_with_time!("Deleted Resource Group: {}", resource_group);
            CleanupOutcome::Deleted
        }
        Err(e) if e.is_not_found() => {
            println_with_time!("Did not create any resources in Azure. No clean up is necessary");
            CleanupOutcome::NothingToClean
        }
        Err(e) => {
            println_with_time!("Could not delete resource group {} ({} error)", resource_group, e.kind());
            log_error!(e);
            CleanupOutcome::Failed(e)
        }
    }
}

// ================================ Workflow ===================================

pub struct ManageVmPipeline<'a, C: AzureClient> {
    client: &'a C,
    config: &'a SampleConfig,
    names: ResourceNames,
}

impl<'a, C: AzureClient> ManageVmPipeline<'a, C> {
    pub fn new(client: &'a C, config: &'a SampleConfig) -> Self {
        Self::with_names(client, config, ResourceNames::generate())
    }

    pub fn with_names(client: &'a C, config: &'a SampleConfig, names: ResourceNames) -> Self {
        Self { client, config, names }
    }

    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    /// Provisions and exercises the VM, then deletes the resource group whatever happened
    pub fn run(&self, confirm: &mut dyn Confirm) -> RunReport {
        let provisioning = self.provision(confirm);
        if let Err(e) = &provisioning {
            println_with_time!("Error while creating resources in: {}", self.config.azure.resource_group);
            log_error!(*e);
        }
        let cleanup = clean_resource_group(self.client, &self.config.azure.resource_group);
        RunReport { provisioning, cleanup }
    }

    pub fn provision(&self, confirm: &mut dyn Confirm) -> Result<Provisioned, PipelineError> {
        let config = self.config;
        let names = &self.names;
        let rg = config.azure.resource_group.as_str();
        let region = config.azure.region.as_str();

        //Network
        println_with_time!("Creating a virtual network ...");
        let network_def = config.network.subnets.iter().fold(
            NetworkDefinition::define(&names.network)
                .with_region(region)
                .with_new_resource_group(rg)
                .with_address_space(config.network.address_space),
            |def, subnet| def.define_subnet(&subnet.name, subnet.prefix));
        network_def.validate().during(Step::CreateNetwork)?;
        let network = self.client.create_network(&network_def).during(Step::CreateNetwork)?;
        println_with_time!("Created a virtual network: {}", network.id);
        println_with_time!("{}", network);

        //NSG
        println_with_time!("Creating a security group for the front end - allows RDP and HTTP");
        let nsg_def = NsgDefinition::define(&names.security_group)
            .with_region(region)
            .with_existing_resource_group(rg)
            .define_rule(SecurityRule::allow_inbound("ALLOW-RDP")
                .from_any_address()
                .from_any_port()
                .to_any_address()
                .to_port(3389)
                .with_protocol(Protocol::Tcp)
                .with_priority(100)
                .with_description("Allow RDP"))
            .define_rule(SecurityRule::allow_inbound("ALLOW-HTTP")
                .from_any_address()
                .from_any_port()
                .to_any_address()
                .to_port(80)
                .with_protocol(Protocol::Tcp)
                .with_priority(101)
                .with_description("Allow HTTP"));
        nsg_def.validate().during(Step::CreateSecurityGroup)?;
        let nsg = self.client.create_network_security_group(&nsg_def).during(Step::CreateSecurityGroup)?;
        println_with_time!("Created a network security group for the front end: {}", nsg.id);
        println_with_time!("{}", nsg);

        //Disks: one created along with the VM, one right now
        let defined_disk = DiskDefinition::define(&names.defined_disk)
            .with_region(region)
            .with_existing_resource_group(rg)
            .with_size_in_gb(config.vm.defined_data_disk_gb);
        defined_disk.validate().during(Step::CreateDisk)?;
        let existing_def = DiskDefinition::define(&names.existing_disk)
            .with_region(region)
            .with_existing_resource_group(rg)
            .with_size_in_gb(config.vm.existing_data_disk_gb);
        existing_def.validate().during(Step::CreateDisk)?;
        let existing_disk = self.client.create_disk(&existing_def).during(Step::CreateDisk)?;
        println_with_time!("Created data disk {} ({} GB)", existing_disk.id, existing_disk.size_gb);

        //NIC
        println_with_time!("Creating a network interface for the front end");
        let nic_def = NicDefinition::define(&names.network_interface)
            .with_region(region)
            .with_existing_resource_group(rg)
            .with_existing_primary_network(&network)
            .with_subnet(&config.network.nic_subnet)
            .with_new_primary_public_ip_address(&names.public_ip)
            .with_ip_forwarding()
            .with_existing_network_security_group(&nsg);
        nic_def.validate().during(Step::CreateNetworkInterface)?;
        let nic = self.client.create_network_interface(&nic_def).during(Step::CreateNetworkInterface)?;
        println_with_time!("Created network interface for the front end: {}", nic.id);

        //VM
        println_with_time!("Creating a Windows VM");
        let vm_def = VmDefinition::define(&names.vm)
            .with_region(region)
            .with_existing_resource_group(rg)
            .with_existing_primary_network_interface(&nic);
        let vm_def = match KnownWindowsImage::from_sku(&config.vm.image) {
            Some(image) => vm_def.with_popular_windows_image(image),
            None => vm_def.with_image(&config.vm.image),
        };
        let vm_def = vm_def
            .with_admin_username(&names.admin_username)
            .with_admin_password(&names.admin_password)
            .with_new_data_disk(config.vm.new_data_disk_gb)
            .with_new_data_disk_from(defined_disk)
            .with_existing_data_disk(&existing_disk)
            .with_size(&config.vm.size);
        vm_def.validate().during(Step::CreateVm)?;
        let start = Instant::now();
        let vm = self.client.create_virtual_machine(&vm_def).during(Step::CreateVm)?;
        let creation_time = start.elapsed();
        println_with_time!("Created VM: (took {} seconds) {}", creation_time.as_secs(), vm.id);
        println_with_time!("{}", vm);
        unexpected(Step::CreateVm, check_disk_count(&vm, vm_def.data_disks.len()))?;

        let public_ip = self.client.get_public_ip_address(&vm).during(Step::GetPublicIp)?;
        println_with_time!("IP of VM for remote desktop: {}", public_ip.ip_address.as_deref().unwrap_or("(not allocated yet)"));

        //Tags
        let tag_update = config.vm.tags.iter().fold(VmUpdate::new(), |update, (k, v)| update.with_tag(k, v));
        let vm = if tag_update.is_empty() {
            vm
        } else {
            tag_update.validate().during(Step::TagVm)?;
            let tagged = self.client.update_virtual_machine(&vm, &tag_update).during(Step::TagVm)?;
            unexpected(Step::TagVm, check_tags(&vm.tags, &tag_update.tags, &tagged.tags))?;
            println_with_time!("Tagged VM: {}", tagged.id);
            tagged
        };

        //Attach
        let attach = VmUpdate::new().with_new_data_disk(config.vm.attached_data_disk_gb);
        attach.validate().during(Step::AttachDisk)?;
        let attached = self.client.update_virtual_machine(&vm, &attach).during(Step::AttachDisk)?;
        unexpected(Step::AttachDisk, check_disk_count(&attached, vm.data_disks.len() + 1))?;
        println_with_time!("Added a data disk to VM {}", attached.id);
        println_with_time!("{}", attached);
        confirm.confirm("Attached a new data disk, you can check it with a remote desktop client if needed.").map_err(PipelineError::Confirmation)?;

        //Detach
        let detach = VmUpdate::new().without_data_disk(0);
        detach.validate().during(Step::DetachDisk)?;
        let detached = self.client.update_virtual_machine(&attached, &detach).during(Step::DetachDisk)?;
        unexpected(Step::DetachDisk, check_detached(&attached, 0, &detached))?;
        println_with_time!("Detached data disk at lun 0 from VM {}", detached.id);
        confirm.confirm("Removed the data disk at lun 0, you can check it with a remote desktop client if needed.").map_err(PipelineError::Confirmation)?;

        //Power cycle
        println_with_time!("Restarting VM: {}", detached.id);
        let restarted = self.client.restart_virtual_machine(&detached).during(Step::RestartVm)?;
        println_with_time!("Restarted VM: {}; state = {}", restarted.id, restarted.power_state);
        unexpected(Step::RestartVm, check_power_state(&restarted, &PowerState::Running))?;

        println_with_time!("Powering OFF VM: {}", restarted.id);
        let stopped = self.client.power_off_virtual_machine(&restarted).during(Step::PowerOffVm)?;
        println_with_time!("Powered OFF VM: {}; state = {}", stopped.id, stopped.power_state);
        unexpected(Step::PowerOffVm, check_power_state(&stopped, &PowerState::Stopped))?;

        if config.workflow.start_after_power_off {
            println_with_time!("Starting VM: {}", stopped.id);
            let started = self.client.start_virtual_machine(&stopped).during(Step::StartVm)?;
            println_with_time!("Started VM: {}; state = {}", started.id, started.power_state);
            unexpected(Step::StartVm, check_power_state(&started, &PowerState::Running))?;
        }

        //List
        let vms = self.client.list_virtual_machines(rg).during(Step::ListVms)?;
        println_with_time!("Printing list of VMs =======");
        for listed in &vms {
            println_with_time!("{}", listed);
        }
        unexpected(Step::ListVms, check_listed_once(&vms, &stopped.id))?;

        //Delete
        println_with_time!("Deleting VM: {}", stopped.id);
        self.client.delete_virtual_machine_by_id(&stopped.id).during(Step::DeleteVm)?;
        println_with_time!("Deleted VM: {}", stopped.id);

        Ok(Provisioned { vm_id: stopped.id, public_ip: public_ip.ip_address, creation_time })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azuresir::DataDisk;
    use crate::cloud_functions::simulated::SimulatedAzure;
    use super::confirm::AutoConfirm;
    use assert_matches::assert_matches;
    use std::io;

    fn config() -> SampleConfig {
        SampleConfig::default()
    }

    fn run_with(azure: &SimulatedAzure, config: &SampleConfig) -> (RunReport, AutoConfirm) {
        let mut confirm = AutoConfirm::default();
        let report = ManageVmPipeline::new(azure, config).run(&mut confirm);
        (report, confirm)
    }

    /// VM snapshots returned by create and by the three updates, in that order
    fn update_snapshots(azure: &SimulatedAzure) -> Vec<VirtualMachine> {
        azure.snapshots().into_iter().take(4).collect()
    }

    #[test]
    fn happy_path_cleans_up_once() {
        let azure = SimulatedAzure::new();
        let config = config();
        let (report, confirm) = run_with(&azure, &config);

        let provisioned = report.provisioning.unwrap();
        assert!(provisioned.vm_id.contains("/virtualMachines/wVM"));
        assert!(provisioned.public_ip.is_some());
        assert_matches!(report.cleanup, CleanupOutcome::Deleted);
        assert_eq!(azure.call_count("delete_resource_group"), 1);
        assert!(!azure.group_exists(&config.azure.resource_group));
        assert_eq!(confirm.seen.len(), 2);
    }

    #[test]
    fn failure_still_deletes_the_group_once() {
        let azure = SimulatedAzure::new().fail_on("restart_virtual_machine");
        let config = config();
        let (report, _) = run_with(&azure, &config);

        assert_matches!(report.provisioning, Err(PipelineError::Step { step: Step::RestartVm, source: CloudError::Simulated(_) }));
        assert_matches!(report.cleanup, CleanupOutcome::Deleted);
        assert_eq!(azure.call_count("delete_resource_group"), 1);
        assert_eq!(azure.resource_count(&config.azure.resource_group), 0);
        assert_eq!(azure.call_count("power_off_virtual_machine"), 0);
    }

    #[test]
    fn nothing_created_means_nothing_to_clean() {
        let azure = SimulatedAzure::new().fail_on("create_network");
        let (report, confirm) = run_with(&azure, &config());

        assert_matches!(report.provisioning, Err(PipelineError::Step { step: Step::CreateNetwork, .. }));
        assert_matches!(report.cleanup, CleanupOutcome::NothingToClean);
        assert_eq!(azure.call_count("delete_resource_group"), 1);
        assert!(confirm.seen.is_empty());
    }

    #[test]
    fn failing_group_delete_is_reported_not_raised() {
        let azure = SimulatedAzure::new().fail_on("delete_resource_group");
        let (report, _) = run_with(&azure, &config());
        assert!(report.provisioning.is_ok());
        assert_matches!(report.cleanup, CleanupOutcome::Failed(CloudError::Simulated(_)));
    }

    #[test]
    fn vm_starts_with_three_data_disks() {
        let azure = SimulatedAzure::new();
        run_with(&azure, &config());

        let created = &update_snapshots(&azure)[0];
        let sizes: Vec<u32> = created.data_disks.iter().map(|d| d.size_gb).collect();
        assert_eq!(sizes, vec![10, 100, 50]);
    }

    #[test]
    fn attach_adds_one_and_detach_keeps_other_luns() {
        let azure = SimulatedAzure::new();
        run_with(&azure, &config());

        let snapshots = update_snapshots(&azure);
        let (tagged, attached, detached) = (&snapshots[1], &snapshots[2], &snapshots[3]);
        assert_eq!(attached.data_disks.len(), tagged.data_disks.len() + 1);
        assert!(detached.data_disk_at(0).is_none());
        for disk in attached.data_disks.iter().filter(|d| d.lun != 0) {
            assert_eq!(detached.data_disk_at(disk.lun), Some(disk));
        }
    }

    #[test]
    fn power_states_follow_the_workflow() {
        let azure = SimulatedAzure::new();
        run_with(&azure, &config());

        let states: Vec<PowerState> = azure.snapshots().into_iter().skip(4).map(|vm| vm.power_state).collect();
        assert_eq!(states, vec![PowerState::Running, PowerState::Stopped]);
        assert_eq!(azure.call_count("start_virtual_machine"), 0);
    }

    #[test]
    fn optional_start_after_power_off() {
        let azure = SimulatedAzure::new();
        let mut config = config();
        config.workflow.start_after_power_off = true;
        let (report, _) = run_with(&azure, &config);

        assert!(report.provisioning.is_ok());
        let last = azure.snapshots().pop().unwrap();
        assert_eq!(last.power_state, PowerState::Running);
        assert_eq!(azure.call_count("start_virtual_machine"), 1);
    }

    #[test]
    fn tags_are_applied() {
        let azure = SimulatedAzure::new();
        run_with(&azure, &config());

        let tagged = &update_snapshots(&azure)[1];
        assert_eq!(tagged.tags.get("who-rocks").map(String::as_str), Some("java"));
        assert_eq!(tagged.tags.get("where").map(String::as_str), Some("on azure"));
    }

    #[test]
    fn steps_run_in_order() {
        let azure = SimulatedAzure::new();
        run_with(&azure, &config());
        assert_eq!(azure.calls(), vec![
            "create_network",
            "create_network_security_group",
            "create_disk",
            "create_network_interface",
            "create_virtual_machine",
            "get_public_ip_address",
            "update_virtual_machine",
            "update_virtual_machine",
            "update_virtual_machine",
            "restart_virtual_machine",
            "power_off_virtual_machine",
            "list_virtual_machines",
            "delete_virtual_machine_by_id",
            "delete_resource_group",
        ]);
    }

    struct RefusingConfirm;

    impl Confirm for RefusingConfirm {
        fn confirm(&mut self, _message: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"))
        }
    }

    #[test]
    fn confirmation_failure_aborts_but_cleans_up() {
        let azure = SimulatedAzure::new();
        let config = config();
        let report = ManageVmPipeline::new(&azure, &config).run(&mut RefusingConfirm);

        assert_matches!(report.provisioning, Err(PipelineError::Confirmation(_)));
        assert_matches!(report.cleanup, CleanupOutcome::Deleted);
        assert_eq!(azure.call_count("update_virtual_machine"), 2);
    }

    #[test]
    fn unknown_nic_subnet_fails_the_nic_step() {
        let azure = SimulatedAzure::new();
        let mut config = config();
        config.network.nic_subnet = "DMZ".to_string();
        let (report, _) = run_with(&azure, &config);
        assert_matches!(report.provisioning, Err(PipelineError::Step { step: Step::CreateNetworkInterface, ref source }) if source.is_not_found());
    }

    #[test]
    fn invalid_definition_is_caught_before_any_call() {
        let azure = SimulatedAzure::new();
        let mut config = config();
        config.vm.existing_data_disk_gb = 0;
        let (report, _) = run_with(&azure, &config);
        assert_matches!(report.provisioning, Err(PipelineError::Invalid { step: Step::CreateDisk, .. }));
        assert_eq!(azure.call_count("create_disk"), 0);
    }

    fn disk(lun: u32, name: &str) -> DataDisk {
        DataDisk { lun, name: name.to_string(), size_gb: 10, managed_disk_id: None }
    }

    fn vm_with(disks: Vec<DataDisk>) -> VirtualMachine {
        VirtualMachine {
            id: "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/wVM1".to_string(),
            name: "wVM1".to_string(),
            resource_group: "rg".to_string(),
            region: "eastus".to_string(),
            size: "Standard_DS2_v2".to_string(),
            admin_username: None,
            primary_nic_id: None,
            data_disks: disks,
            tags: BTreeMap::new(),
            power_state: PowerState::Running,
            public_ips: Vec::new(),
        }
    }

    #[test]
    fn detach_check_catches_shifted_luns() {
        let before = vm_with(vec![disk(0, "a"), disk(1, "b"), disk(2, "c")]);
        assert!(check_detached(&before, 0, &vm_with(vec![disk(1, "b"), disk(2, "c")])).is_ok());
        assert!(check_detached(&before, 0, &vm_with(vec![disk(0, "b"), disk(1, "c")])).is_err());
        assert!(check_detached(&before, 0, &vm_with(vec![disk(1, "b")])).is_err());
    }

    #[test]
    fn tag_check_catches_lost_tags() {
        let mut before = BTreeMap::new();
        before.insert("owner".to_string(), "me".to_string());
        let mut requested = BTreeMap::new();
        requested.insert("who-rocks".to_string(), "java".to_string());

        let mut after = requested.clone();
        assert!(check_tags(&before, &requested, &after).is_err());
        after.insert("owner".to_string(), "me".to_string());
        assert!(check_tags(&before, &requested, &after).is_ok());
        after.insert("who-rocks".to_string(), "rust".to_string());
        assert!(check_tags(&before, &requested, &after).is_err());
    }

    #[test]
    fn list_check_wants_exactly_one() {
        let vm = vm_with(Vec::new());
        assert!(check_listed_once(&[vm.clone()], &vm.id).is_ok());
        assert!(check_listed_once(&[], &vm.id).is_err());
        assert!(check_listed_once(&[vm.clone(), vm.clone()], &vm.id).is_err());
    }

    #[test]
    fn clean_command_on_missing_group() {
        let azure = SimulatedAzure::new();
        assert_matches!(clean_resource_group(&azure, "never-created"), CleanupOutcome::NothingToClean);
    }
}
