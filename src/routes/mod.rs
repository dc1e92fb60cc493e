/// Router Module Index
///
/// Routes are split by who may call them. Admin routes still check the session
/// in each handler through the `AdminSession` extractor, so mounting one in
/// the wrong router cannot expose it.

/// Listing pages, private-document unlock, login/logout, and the read-only JSON API.
pub mod public;

/// Admin page, mutations through forms, and the mutating JSON API.
pub mod admin;
