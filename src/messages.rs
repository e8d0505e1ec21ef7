//! User-facing message texts

/// Refresh interval shown to users, in minutes
pub const REFRESH_MINUTES: u64 = 10;

pub const WELCOME: &str = "👋 Hi! I'm EasyWay Bot.\n\n\
    📍 Send me your location and I'll tell you an interesting fact about it!\n\n\
    🔄 Live locations work too: I'll send a new fact every 10 minutes.\n\n\
    🚀 Try it right now!";

pub const HELP: &str = "❓ *How to use the bot:*\n\n\
    1️⃣ Send a regular location to get a fact about that place\n\
    2️⃣ Share a live location to get a new fact every 10 minutes\n\
    3️⃣ Facts are searched within 500 meters of your position";

pub const ONLY_LOCATIONS: &str = "🤔 I only understand locations.\n\n\
    Send me your location via 📎 → Location";

pub const SEARCHING: &str = "🔍 Looking for an interesting fact about your location...";

pub const SEARCHING_LIVE: &str = "🔍 Looking for an interesting fact about your current location...";

pub const NOTHING_FOUND: &str =
    "🤷 Couldn't find anything interesting, try again with another location.";

pub const NOTHING_FOUND_LIVE: &str =
    "🤷 Couldn't find anything interesting for the live location. Please try again.";

pub const LIVE_STOPPED: &str = "⏹️ Live location stopped. Thanks for using the bot!";

pub const LIVE_ENDED: &str = "⏰ Live location has ended.";

pub const LIVE_EXPIRED: &str = "⏰ Live location ended automatically.";

pub const MISSING_CHAT: &str = "Could not determine the chat.";

pub const MISSING_LOCATION: &str = "Could not read the location data.";

pub const GENERIC_FAILURE: &str = "❌ Something went wrong while processing your location. Please try again.";

/// Reply for a one-shot lookup
pub fn static_fact(fact: &str) -> String {
    format!("📍 *Interesting fact about your location:*\n\n{}", fact)
}

/// Reply when a live session starts
pub fn live_started(fact: &str) -> String {
    format!(
        "📍 *Live location active!*\n\n{}\n\n🔄 _I'll send new facts every {} minutes._",
        fact, REFRESH_MINUTES
    )
}

/// Reply for a scheduled refresh
pub fn scheduled_fact(fact: &str) -> String {
    format!("📍 *New fact about your location:*\n\n{}", fact)
}
