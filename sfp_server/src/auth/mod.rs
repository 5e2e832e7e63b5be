//! Request authentication.
//!
//! Storefront backends call the `/api` endpoints with signed requests, checked by [`SignedRequestAuthenticator`].
//! Operators reach the `/admin` endpoints with a bearer token that an external [`IdentityProvider`] vouches for.
mod api_keys;
mod identity;
mod nonce_ledger;
mod signed_request;

pub use api_keys::{ApiKeyRing, MatchedKey};
pub use identity::{HttpIdentityProvider, IdentityError, IdentityProvider};
pub use nonce_ledger::{MemoryNonceLedger, NonceLedger};
pub use signed_request::{
    canonical_message,
    sign_request,
    ApiClient,
    SignedRequest,
    SignedRequestAuthenticator,
    API_KEY_HEADER,
    NONCE_HEADER,
    SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
