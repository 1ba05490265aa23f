// ABOUTME: SeaORM entities module for database models and relationships
// ABOUTME: Exports all entity definitions for users, wands, and work orders

pub mod user;
pub mod wand;
pub mod work_order;

pub use user::Entity as User;
pub use wand::Entity as Wand;
pub use work_order::Entity as WorkOrder;
