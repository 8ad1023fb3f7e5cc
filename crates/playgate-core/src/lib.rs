/// Playgate core
///
/// Account credentials, bearer tokens, and the access-code redemption engine
/// that gates playlist distribution. Persistence, the channel/playlist catalog
/// and the clock are collaborators behind the traits in [`store`] and
/// [`clock`]; [`memory`] provides in-process implementations of them.
pub mod authz;
pub mod clock;
pub mod codes;
pub mod credentials;
pub mod error;
pub mod memory;
pub mod render;
pub mod resolver;
pub mod store;
pub mod tokens;

pub use authz::{Capability, Principal};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codes::{AccessCodeRegistry, CodeSource, GenerateCode, RandomCodeSource, Redemption};
pub use credentials::CredentialStore;
pub use error::{Error, Result};
pub use render::{ManifestFormat, Rendered};
pub use resolver::PlaylistResolver;
pub use tokens::{IssuedToken, TokenIssuer};
