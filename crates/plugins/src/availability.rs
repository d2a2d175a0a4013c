//! Pure availability check: is a plugin eligible for this user/channel.

use crate::plugin::PluginSpec;

/// Check the user and channel against the plugin's configuration to decide
/// whether its matchers should be evaluated at all. `channel: None` is a
/// direct message.
///
/// Rule order: direct-only plugins never fire in channels; admin-only
/// plugins require the user in `admins`; a non-empty user allow-list must
/// glob-match the user; direct messages then need `allow_direct` (or
/// `direct_only`); channel messages need the channel listed or
/// `all_channels`.
pub fn plugin_available(
    user: &str,
    channel: Option<&str>,
    admins: &[String],
    plugin: &PluginSpec,
) -> bool {
    let direct = channel.is_none();
    if !direct && plugin.direct_only {
        return false;
    }
    if plugin.require_admin && !admins.iter().any(|a| a == user) {
        return false;
    }
    if !plugin.users.is_empty() && !plugin.users.iter().any(|pat| glob_match(pat, user)) {
        return false;
    }
    if direct {
        return plugin.allow_direct || plugin.direct_only;
    }
    if !plugin.channels.is_empty() {
        let channel = channel.unwrap_or_default();
        plugin.channels.iter().any(|c| c == channel)
    } else {
        plugin.all_channels
    }
}

/// Glob matching supporting `*` as a wildcard for any sequence of chars.
/// Backtracks on `*`, so "a*b" matches "acbb".
fn glob_match(pattern: &str, text: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == text,
        Some((prefix, rest)) => {
            let Some(tail) = text.strip_prefix(prefix) else {
                return false;
            };
            if rest.is_empty() {
                return true;
            }
            (0..=tail.len())
                .filter(|i| tail.is_char_boundary(*i))
                .any(|i| glob_match(rest, &tail[i..]))
        },
    }
}
