//! Read-only view of the skills already installed on disk.

pub mod catalog;
pub mod skill_file;

pub use catalog::InstalledSkills;
pub use skill_file::{InstalledSkill, load_skill};
