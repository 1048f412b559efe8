mod client;
mod errors;
mod fetch;
mod query;
mod types;
pub mod xml;
pub use self::client::Cov19Api;
pub use self::errors::Error;
pub use self::query::{Filters, Structure};
pub use self::types::JsonResponse;
pub use self::xml::XmlNode;
