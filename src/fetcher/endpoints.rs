//! OpenF1 resource paths and query keys
//!
//! All resources live under one base URL (`https://api.openf1.org/v1`) and
//! answer `GET /{resource}?{filters}` with a JSON array of flat objects.

/// Sentinel accepted by `meeting_key` / `session_key` meaning "most recent"
pub const LATEST: &str = "latest";

/// Query parameter names
pub mod params {
    /// Meeting filter
    pub const MEETING_KEY: &str = "meeting_key";
    /// Session filter
    pub const SESSION_KEY: &str = "session_key";
    /// Car number filter
    pub const DRIVER_NUMBER: &str = "driver_number";
}

/// Upstream resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Race weekends
    Meetings,
    /// Sessions within a meeting
    Sessions,
    /// Starting grid of a qualifying session
    StartingGrid,
    /// Classification of a session
    SessionResult,
    /// Driver identities
    Drivers,
    /// Weather samples
    Weather,
    /// Tyre stints
    Stints,
    /// Timed laps
    Laps,
}

impl Resource {
    /// Path segment under the base URL
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Meetings => "meetings",
            Resource::Sessions => "sessions",
            Resource::StartingGrid => "starting_grid",
            Resource::SessionResult => "session_result",
            Resource::Drivers => "drivers",
            Resource::Weather => "weather",
            Resource::Stints => "stints",
            Resource::Laps => "laps",
        }
    }

    /// Full URL for this resource under `base_url`
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.path())
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}
