pub mod client;
pub mod config;
pub mod discovery;
pub mod entity;
pub mod panel;
pub mod render;
pub mod secret;
pub mod util;

pub use client::HassApi;
pub use client::HassClient;
pub use client::Method;
pub use client::SendError;
pub use config::Config;
pub use config::LogLevel;
pub use discovery::discover_sensors;
pub use discovery::discover_toggleable;
pub use entity::EntityRecord;
pub use entity::EntityState;
pub use panel::Panel;
pub use panel::PanelEvent;
pub use panel::PanelHandle;
pub use secret::SecretSchema;
pub use secret::SystemTokenStore;
pub use secret::TokenStore;
