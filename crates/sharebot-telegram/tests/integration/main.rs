//! Integration tests for sharebot-telegram
//!
//! Uses wiremock to simulate the Telegram Bot API and verifies the client,
//! the file source and the dispatcher end to end.

mod common;

mod test_bot;
mod test_client;
