//! Per-community settings seam
//!
//! Settings are owned by another component; the core only reads them, always
//! with a caller-supplied default.

use std::collections::HashMap;

/// Role required to propose games (checked by the command layer)
pub const PROPOSER_ROLE: &str = "letstry-proposer-role";
/// Role required to vote (checked by the command layer)
pub const VOTER_ROLE: &str = "letstry-voter-role";
/// Channel that receives ballot results
pub const ANNOUNCEMENT_CHANNEL: &str = "letstry-announcement-channel";

/// Role that lets everyone in
pub const EVERYONE_ROLE: &str = "@everyone";

/// Read-only access to one community's settings
pub trait Settings {
    fn get(&self, key: &str) -> Option<String>;

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
}

impl Settings for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}
