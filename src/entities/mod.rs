//! Entity module - SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod capper;
pub mod guild_settings;
pub mod guild_subscription;
pub mod system_state;
pub mod unit_record;
pub mod wager;

// Re-export specific types to avoid conflicts
pub use capper::{Column as CapperColumn, Entity as Capper, Model as CapperModel};
pub use guild_settings::{
    Column as GuildSettingsColumn, Entity as GuildSettings, Model as GuildSettingsModel,
};
pub use guild_subscription::{
    Column as GuildSubscriptionColumn, Entity as GuildSubscription,
    Model as GuildSubscriptionModel, SubscriptionTier,
};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use unit_record::{Column as UnitRecordColumn, Entity as UnitRecord, Model as UnitRecordModel};
pub use wager::{Column as WagerColumn, Entity as Wager, Model as WagerModel, WagerState};
