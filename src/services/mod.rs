pub mod api_server;
pub mod filename_resolver;
pub mod registry_engine;
