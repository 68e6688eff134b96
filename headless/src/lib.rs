pub mod init;
pub mod scenario;
pub mod systems;
