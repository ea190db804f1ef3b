//! `SeaORM` Entity prelude

pub use super::asset_history::Entity as AssetHistory;
pub use super::assets::Entity as Assets;
pub use super::device_status::Entity as DeviceStatus;
pub use super::disposition_info::Entity as DispositionInfo;
pub use super::flagged_devices::Entity as FlaggedDevices;
pub use super::mel_rules::Entity as MelRules;
pub use super::packages::Entity as Packages;
pub use super::receipt_events::Entity as ReceiptEvents;
