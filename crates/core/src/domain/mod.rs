pub mod directory;
pub mod requisition;
pub mod threshold;
