pub mod converge;
pub mod down;
pub mod inventory;
pub mod plan;
pub mod provision;
pub mod status;
pub mod up;
pub mod validate;
