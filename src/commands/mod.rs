pub mod analyze;
pub mod links;
pub mod revisions;
pub mod status;
