//! Per-machine client device token.
//!
//! Generated once and cached under the config dir; possession of the token
//! is what authorizes self-cancellation later.

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::core::DeviceId;
use crate::paths;

const TOKEN_LEN: usize = 32;

pub fn client_device_id() -> String {
    let path = paths::device_id_path();
    if let Ok(cached) = std::fs::read_to_string(&path) {
        let cached = cached.trim();
        if DeviceId::parse(cached).is_ok() {
            return cached.to_string();
        }
        tracing::warn!(path = %path.display(), "cached device token invalid, regenerating");
    }

    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect();

    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    if let Err(err) = std::fs::write(&path, &token) {
        tracing::warn!("failed to cache device token: {err}");
    }
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_is_a_valid_device_id() {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        assert!(DeviceId::parse(&token).is_ok());
    }
}
