mod clock;
mod codec;
mod config;
mod issuer;
mod layout;
mod metadata;
mod policy;
mod record;
mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::{client_binding, CodecError, DecodedToken, PREFIX};
pub use config::{Config, ConfigError};
pub use issuer::{
    hardware_fingerprint_of, ClientIdentity, IssuanceParameters, Issuer, IssuerError, MAX_BULK_MINT,
};
pub use layout::{LayoutError, LAYOUT_VERSION};
pub use metadata::{EmbeddedMetadata, FeatureValue, MetadataError};
pub use policy::{evaluate, RejectionKind, ValidationContext, Verdict};
pub use record::{StoreError, TokenRecord, TokenRecordStore};
pub use store::InMemoryRecordStore;
