pub mod replication_director;
pub mod server_config;
