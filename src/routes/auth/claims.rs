use serde::{Deserialize, Serialize};

/// Claims minted by the external identity provider. `id` is the opaque user
/// identifier (a UUID string) every local record is keyed by.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub name: String,
    pub exp: usize, // expiration (as UNIX timestamp)
    pub iss: String,
    pub aud: String,
}
