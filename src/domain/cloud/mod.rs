pub mod connectivity;
pub mod credential;
pub mod emulated;
pub mod plugin;
pub mod plugin_registry;
