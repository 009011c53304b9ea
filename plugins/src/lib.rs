pub mod control_plane;
pub mod factory;
pub mod object_store;
pub mod operation;
