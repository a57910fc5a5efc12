pub mod fs;
pub mod registry;
pub mod s3;
