pub mod command_pruner;
pub mod import_service;
pub mod upload_signing;
