//! Storage key constants.

/// Storage keys used by the auth session.
///
/// The names match the original web client's keys so a store written by one
/// client remains readable by the other.
pub struct StorageKeys;

impl StorageKeys {
    /// Short-lived bearer token sent on every authorized request
    pub const ACCESS_TOKEN: &'static str = "accessToken";

    /// Long-lived token exchanged for fresh pairs
    pub const REFRESH_TOKEN: &'static str = "refreshToken";
}
