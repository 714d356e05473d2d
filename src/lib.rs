pub mod clientid;
pub mod config;
pub mod error;
pub mod lease;
pub mod store;
pub mod token;
pub mod transient;

pub use clientid::{CidVariant, ClientId, OPTION_CLIENT_IDENTIFIER};
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use lease::{ExpireAction, Lease, PluginHandle};
pub use store::LeaseStore;
pub use token::Token;
pub use transient::TransientStore;
