mod r#static;
pub use r#static::StaticCredentialProvider;

mod env;
pub use env::EnvCredentialProvider;

mod edgerc;
pub use edgerc::EdgeRcCredentialProvider;

mod default;
pub use default::DefaultCredentialProvider;
