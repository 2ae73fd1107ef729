pub mod factory;
pub mod openai;
pub mod provider;
pub mod types;

pub use factory::create_oracle;
pub use provider::Oracle;
pub use types::{Message, OracleResponse};
