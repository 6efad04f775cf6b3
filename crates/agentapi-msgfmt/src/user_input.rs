//! Best-effort removal of echoed user input.
//!
//! Goose, Aider, and Claude Code echo the user's submission back into the
//! terminal. The echo shows up at the top of the extracted message, possibly
//! broken up by UI glyphs, so matching is done over whitespace-stripped runes
//! while remembering which line every rune came from.

use crate::WHITESPACE_CHARS;

/// Runes taken from the first line of the user input to locate the echo.
const MAX_USER_INPUT_PREFIX_RUNES: usize = 6;
/// The echo is expected near the top of the message: the first 6 lines or
/// 25 runes, whichever holds more runes.
const MAX_MESSAGE_HEAD_LINES: usize = 6;
const MIN_MESSAGE_HEAD_RUNES: usize = 25;
/// How far to skip ahead in the message when a rune fails to match,
/// allowing for UI glyphs interposed between echoed characters.
const MISMATCH_LOOKAHEAD: usize = 5;

/// Strip all whitespace runes from `raw`, remembering for each retained rune
/// the index of the line it came from.
fn normalize_with_line_mapping(raw: &str) -> (Vec<char>, Vec<String>, Vec<usize>) {
    let lines: Vec<String> = raw.split('\n').map(str::to_owned).collect();
    let mut normalized = Vec::new();
    let mut line_locations = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        for rune in line.chars() {
            if !WHITESPACE_CHARS.contains(&rune) {
                normalized.push(rune);
                line_locations.push(line_idx);
            }
        }
    }
    (normalized, lines, line_locations)
}

fn find_subsequence(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Find where the echoed user input starts in the message head.
fn find_user_input_start_idx(
    msg: &[char],
    msg_line_locations: &[usize],
    user_input: &[char],
    user_input_line_locations: &[usize],
) -> Option<usize> {
    // Only the first line of the user input is considered, to avoid the echo
    // being broken up by UI elements further down.
    let mut prefix_len = 0;
    for (i, line_idx) in user_input_line_locations.iter().enumerate() {
        if *line_idx > 0 || i >= MAX_USER_INPUT_PREFIX_RUNES {
            break;
        }
        prefix_len = i + 1;
    }
    if prefix_len == 0 {
        return None;
    }
    let prefix = &user_input[..prefix_len];

    let mut head_len = 0;
    for (i, line_idx) in msg_line_locations.iter().enumerate() {
        if *line_idx >= MAX_MESSAGE_HEAD_LINES {
            break;
        }
        head_len = i + 1;
    }
    head_len = head_len.max(MIN_MESSAGE_HEAD_RUNES).min(msg.len());

    find_subsequence(&msg[..head_len], prefix)
}

/// Advance through the message from `start`, consuming user-input runes and
/// skipping up to [`MISMATCH_LOOKAHEAD`] interposed runes on each mismatch.
/// Returns the index of the last matched rune, or `start` when nothing
/// matched at all.
fn find_user_input_end_idx(start: usize, msg: &[char], user_input: &[char]) -> usize {
    let mut input_idx = 0;
    let mut msg_idx = start;
    'outer: loop {
        if input_idx >= user_input.len() || msg_idx >= msg.len() {
            break;
        }
        if user_input[input_idx] == msg[msg_idx] {
            input_idx += 1;
            msg_idx += 1;
            continue;
        }
        for skip in 1..=MISMATCH_LOOKAHEAD {
            if msg_idx + skip >= msg.len() {
                break;
            }
            if user_input[input_idx] == msg[msg_idx + skip] {
                input_idx += 1;
                msg_idx += skip;
                continue 'outer;
            }
        }
        break;
    }
    if msg_idx == start {
        start
    } else {
        msg_idx - 1
    }
}

/// Remove the echoed user input from the message: every message line up to
/// and including the one holding the last matched rune is dropped. When the
/// echo cannot be located, the message is returned unchanged.
pub fn remove_user_input(msg_raw: &str, user_input_raw: &str) -> String {
    let (msg, msg_lines, msg_line_locations) = normalize_with_line_mapping(msg_raw);
    let (user_input, _, user_input_line_locations) = normalize_with_line_mapping(user_input_raw);

    let Some(start_idx) = find_user_input_start_idx(
        &msg,
        &msg_line_locations,
        &user_input,
        &user_input_line_locations,
    ) else {
        return msg_raw.to_owned();
    };

    let end_idx = find_user_input_end_idx(start_idx, &msg, &user_input);
    let last_user_input_line_idx = msg_line_locations[end_idx];
    msg_lines
        .get(last_user_input_line_idx + 1..)
        .unwrap_or_default()
        .join("\n")
}
