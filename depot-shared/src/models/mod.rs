/// Database models and task types for Depot
///
/// # Models
///
/// - `user`: User accounts
/// - `item`: Inventory items owned by users
/// - `envelope`: The immutable unit of work published to the task broker
/// - `outcome`: The terminal success/failure record for an executed task

pub mod envelope;
pub mod item;
pub mod outcome;
pub mod user;
