pub mod init;
pub mod migrate;
pub mod paths;
pub mod status;
