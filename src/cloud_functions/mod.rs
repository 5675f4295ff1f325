pub mod azure;
pub mod simulated;

use crate::azuresir::system::{DiskDefinition, NetworkDefinition, NicDefinition, NsgDefinition, VmDefinition, VmUpdate};
use crate::azuresir::{Disk, Network, NetworkInterface, NetworkSecurityGroup, PublicIpAddress, VirtualMachine};
use crate::error::CloudResult;

/// The management plane as seen by the workflow. Every call blocks until the
/// remote operation has completed.
pub trait AzureClient {
    fn subscription_id(&self) -> CloudResult<String>;

    /// Also creates the resource group when the definition asks for a new one
    fn create_network(&self, def: &NetworkDefinition) -> CloudResult<Network>;

    fn create_network_security_group(&self, def: &NsgDefinition) -> CloudResult<NetworkSecurityGroup>;

    fn create_disk(&self, def: &DiskDefinition) -> CloudResult<Disk>;

    /// Creates the public IP address first when one is requested
    fn create_network_interface(&self, def: &NicDefinition) -> CloudResult<NetworkInterface>;

    /// Creates the disks defined inline, then the VM. New empty disks get the
    /// lowest LUNs, defined and existing disks follow in definition order.
    fn create_virtual_machine(&self, def: &VmDefinition) -> CloudResult<VirtualMachine>;

    fn get_virtual_machine(&self, resource_group: &str, name: &str) -> CloudResult<VirtualMachine>;

    /// Public IP address bound to the primary NIC of the VM
    fn get_public_ip_address(&self, vm: &VirtualMachine) -> CloudResult<PublicIpAddress>;

    fn update_virtual_machine(&self, vm: &VirtualMachine, update: &VmUpdate) -> CloudResult<VirtualMachine>;

    fn restart_virtual_machine(&self, vm: &VirtualMachine) -> CloudResult<VirtualMachine>;

    fn power_off_virtual_machine(&self, vm: &VirtualMachine) -> CloudResult<VirtualMachine>;

    fn start_virtual_machine(&self, vm: &VirtualMachine) -> CloudResult<VirtualMachine>;

    fn list_virtual_machines(&self, resource_group: &str) -> CloudResult<Vec<VirtualMachine>>;

    fn delete_virtual_machine_by_id(&self, id: &str) -> CloudResult<()>;

    /// Deletes the group and everything in it. CloudError::NotFound when the
    /// group does not exist.
    fn delete_resource_group(&self, name: &str) -> CloudResult<()>;
}
