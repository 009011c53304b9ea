pub mod load;
pub mod types;

pub use load::{apply_env_overrides, get_depot_data_dir, load_default, load_path};
pub use types::{
    AppConfig, BackendKind, ControlPlaneConfig, DeletionPolicy, LoggingConfig, ObjectStoreConfig,
    RemoteConfig, RetryConfig, TimeoutConfig, UploadConfig,
};
