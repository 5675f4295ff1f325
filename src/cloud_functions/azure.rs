use crate::auth::AuthFile;
use crate::azuresir::emitter::{self, AzCommand};
use crate::azuresir::system::{DataDiskSpec, DiskDefinition, NetworkDefinition, NicDefinition, NsgDefinition, ResourceGroupRef, VmDefinition, VmUpdate};
use crate::azuresir::translator::{self, AzAccount, AzDisk, AzNic, AzNsg, AzPublicIp, AzVm, AzVnet};
use crate::azuresir::{DataDisk, Disk, Network, NetworkInterface, NetworkSecurityGroup, PublicIpAddress, VirtualMachine};
use crate::cloud_functions::AzureClient;
use crate::error::{AuthError, CloudError, CloudResult};
use crate::shell_tools;
use crate::utils::names;
use serde::de::DeserializeOwned;
use std::io;

/// Management client backed by the Azure CLI
pub struct AzureCli {
    binary: String,
}

impl AzureCli {
    pub fn new(binary: &str) -> Self {
        Self { binary: binary.to_string() }
    }

    /// Command line as logged, secrets masked
    fn shown(&self, cmd: &AzCommand) -> String {
        format!("{} {}", self.binary, cmd)
    }

    fn run(&self, cmd: &AzCommand) -> CloudResult<String> {
        let shown = self.shown(cmd);
        println_with_time!("{}", shown);
        shell_tools::run_command(&self.binary, &cmd.to_args(), &shown).into_stdout()
    }

    fn run_model<A, M>(&self, cmd: &AzCommand) -> CloudResult<M>
        where A: DeserializeOwned,
              M: From<A> {

        let stdout = self.run(cmd)?;
        translator::to_model::<A, M>(&cmd.to_string(), &stdout)
    }

    pub fn check_install(&self) -> CloudResult<()> {
        if shell_tools::check_command_exist(&self.binary) {
            Ok(())
        } else {
            Err(CloudError::Spawn {
                command: self.binary.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "Azure CLI is not installed at this path, please check the config file and/or install Azure CLI"),
            })
        }
    }

    /// Logs in with the service principal when credentials are given, otherwise
    /// relies on an existing `az login` session. Returns the subscription id.
    pub fn authenticate(&self, auth: Option<&AuthFile>) -> Result<String, AuthError> {
        if let Some(auth) = auth {
            self.run(&emitter::login_service_principal(&auth.client_id, &auth.client_secret, &auth.tenant_id))
                .map_err(AuthError::Login)?;
            self.run(&emitter::account_set(&auth.subscription_id))
                .map_err(AuthError::Login)?;
        }
        self.subscription_id().map_err(AuthError::Login)
    }
}

impl AzureClient for AzureCli {
    fn subscription_id(&self) -> CloudResult<String> {
        let account: AzAccount = translator::parse("account show", &self.run(&emitter::account_show())?)?;
        Ok(account.id)
    }

    fn create_network(&self, def: &NetworkDefinition) -> CloudResult<Network> {
        if let ResourceGroupRef::New(group) = &def.resource_group {
            self.run(&emitter::group_create(group, &def.region))?;
        }
        self.run(&emitter::vnet_create(def))?;
        for subnet in &def.subnets {
            self.run(&emitter::subnet_create(def, subnet))?;
        }
        self.run_model::<AzVnet, _>(&emitter::vnet_show(def.resource_group.name(), &def.name))
    }

    fn create_network_security_group(&self, def: &NsgDefinition) -> CloudResult<NetworkSecurityGroup> {
        self.run(&emitter::nsg_create(def))?;
        for rule in &def.rules {
            self.run(&emitter::nsg_rule_create(def, rule))?;
        }
        self.run_model::<AzNsg, _>(&emitter::nsg_show(&def.resource_group, &def.name))
    }

    fn create_disk(&self, def: &DiskDefinition) -> CloudResult<Disk> {
        self.run_model::<AzDisk, _>(&emitter::disk_create(def))
    }

    fn create_network_interface(&self, def: &NicDefinition) -> CloudResult<NetworkInterface> {
        if let Some(cmd) = emitter::public_ip_create(def) {
            self.run(&cmd)?;
        }
        self.run_model::<AzNic, _>(&emitter::nic_create(def))
    }

    fn create_virtual_machine(&self, def: &VmDefinition) -> CloudResult<VirtualMachine> {
        let mut attached: Vec<String> = Vec::new();
        for spec in &def.data_disks {
            let id = match spec {
                DataDiskSpec::New { .. } => None,
                DataDiskSpec::Define(disk) => Some(self.create_disk(disk)?.id),
                DataDiskSpec::Existing(disk) => Some(disk.id.clone()),
            };
            optionally_push!(attached, id);
        }
        // vm create prints a summary, not the VM
        self.run(&emitter::vm_create(def, &attached))?;
        self.get_virtual_machine(&def.resource_group, &def.name)
    }

    fn get_virtual_machine(&self, resource_group: &str, name: &str) -> CloudResult<VirtualMachine> {
        self.run_model::<AzVm, _>(&emitter::vm_show(resource_group, name))
    }

    fn get_public_ip_address(&self, vm: &VirtualMachine) -> CloudResult<PublicIpAddress> {
        let nic_id = vm.primary_nic_id.as_deref()
            .ok_or_else(|| CloudError::NotFound(format!("{} has no network interface", vm.name)))?;
        let NetworkInterface { name, public_ip_id, .. } = self.run_model::<AzNic, _>(&emitter::nic_show(nic_id))?;
        let pip_id = public_ip_id
            .ok_or_else(|| CloudError::NotFound(format!("{} has no public IP address", name)))?;
        self.run_model::<AzPublicIp, _>(&emitter::public_ip_show(&pip_id))
    }

    fn update_virtual_machine(&self, vm: &VirtualMachine, update: &VmUpdate) -> CloudResult<VirtualMachine> {
        let mut current = vm.clone();

        if !update.tags.is_empty() {
            self.run(&emitter::vm_update_tags(&current, &update.tags))?;
        }

        for lun in &update.detach_luns {
            let name = match current.data_disk_at(*lun) {
                Some(disk) => disk.name.clone(),
                None => return Err(CloudError::NotFound(format!("no data disk at LUN {} of {}", lun, current.name))),
            };
            self.run(&emitter::vm_disk_detach(&current, &name))?;
            current.data_disks.retain(|d| d.lun != *lun);
        }

        for size_gb in &update.new_data_disks {
            let lun = current.next_free_lun();
            let name = names::random_resource_name(&format!("{}-data", current.name), 40);
            self.run(&emitter::vm_disk_attach_new(&current, &name, *size_gb, lun))?;
            current.data_disks.push(DataDisk { lun, name, size_gb: *size_gb, managed_disk_id: None });
        }

        self.get_virtual_machine(&vm.resource_group, &vm.name)
    }

    fn restart_virtual_machine(&self, vm: &VirtualMachine) -> CloudResult<VirtualMachine> {
        self.run(&emitter::vm_power(vm, "restart"))?;
        self.get_virtual_machine(&vm.resource_group, &vm.name)
    }

    fn power_off_virtual_machine(&self, vm: &VirtualMachine) -> CloudResult<VirtualMachine> {
        self.run(&emitter::vm_power(vm, "stop"))?;
        self.get_virtual_machine(&vm.resource_group, &vm.name)
    }

    fn start_virtual_machine(&self, vm: &VirtualMachine) -> CloudResult<VirtualMachine> {
        self.run(&emitter::vm_power(vm, "start"))?;
        self.get_virtual_machine(&vm.resource_group, &vm.name)
    }

    fn list_virtual_machines(&self, resource_group: &str) -> CloudResult<Vec<VirtualMachine>> {
        let cmd = emitter::vm_list(resource_group);
        let stdout = self.run(&cmd)?;
        translator::to_models::<AzVm, _>(&cmd.to_string(), &stdout)
    }

    fn delete_virtual_machine_by_id(&self, id: &str) -> CloudResult<()> {
        self.run(&emitter::vm_delete(id)).map(|_| ())
    }

    fn delete_resource_group(&self, name: &str) -> CloudResult<()> {
        self.run(&emitter::group_delete(name)).map(|_| ())
    }
}
