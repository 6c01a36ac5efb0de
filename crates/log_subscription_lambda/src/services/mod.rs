pub mod inventory_lister;
pub mod state_store;
pub mod subscription_manager;
