/// A prefix added to every local user id so we can easily validate it and
/// catch a bidder accidentally echoing an external id back to us.
pub const LOCAL_ID_PREFIX: &str = "rx-";

/// Cookie name carrying the base64url-encoded sync payload (§6).
pub const COOKIE_NAME: &str = "uids";

/// Macro placeholder substituted with the local exchange id in bidder sync
/// pixel URLs.
pub const LOCAL_ID_MACRO: &str = "{RXID}";
