pub const CONFIG: &str = "config/manage_vm.yml";
/// Overrides CONFIG when set
pub const CONFIG_ENV: &str = "MANAGE_VM_CONFIG";
/// Full path to the Azure credentials file
pub const AUTH_LOCATION_ENV: &str = "AZURE_AUTH_LOCATION";
