//! Input-box and reply-widget stripping.

const HORIZONTAL_RULE: &str = "───────────────";

/// Locate the input box used by Claude Code, Goose, and Aider:
///
/// ```text
/// ───────────────
/// >
/// ───────────────
/// ```
///
/// Returns the index of the first line belonging to the box.
fn find_greater_than_message_box(lines: &[&str]) -> Option<usize> {
    let floor = lines.len().saturating_sub(6);
    for i in (floor..lines.len()).rev() {
        if lines[i].contains('>') {
            if i > 0 && lines[i - 1].contains(HORIZONTAL_RULE) {
                return Some(i - 1);
            }
            return Some(i);
        }
    }
    None
}

/// Locate the slim input box used by OpenAI Codex:
///
/// ```text
/// ───────────────
/// │
/// ───────────────
/// ```
fn find_generic_slim_message_box(lines: &[&str]) -> Option<usize> {
    if lines.len() < 3 {
        return None;
    }
    let floor = lines.len().saturating_sub(9);
    for i in (floor..=lines.len() - 3).rev() {
        if lines[i].contains(HORIZONTAL_RULE)
            && (lines[i + 1].contains('|') || lines[i + 1].contains('│'))
            && lines[i + 2].contains(HORIZONTAL_RULE)
        {
            return Some(i);
        }
    }
    None
}

/// Drop the agent's input box from the bottom of the message, if present.
pub(crate) fn remove_message_box(msg: &str) -> String {
    let lines: Vec<&str> = msg.split('\n').collect();

    let message_box_start =
        find_greater_than_message_box(&lines).or_else(|| find_generic_slim_message_box(&lines));

    match message_box_start {
        Some(idx) => lines[..idx].join("\n"),
        None => msg.to_owned(),
    }
}

/// Extract the interior of the Codex reply widget.
///
/// The widget frames the agent's reply with `╭…╮` and `╰…╯` borders and `│`
/// gutters. Everything outside the box is dropped; gutter characters are
/// stripped from the interior lines. When the top border has scrolled off
/// screen, extraction starts at the first line.
pub fn extract_codex_reply(msg: &str) -> String {
    let mut lines: Vec<String> = msg.split('\n').map(str::to_owned).collect();
    let mut box_end = None;
    let mut box_start = None;

    for i in (0..lines.len()).rev() {
        if box_end.is_none() {
            if lines[i].contains("╰────────") && lines[i].contains("───────╯") {
                box_end = Some(i);
            }
        } else {
            if lines[i].contains('╭') && lines[i].contains("───────╮") {
                box_start = Some(i);
                break;
            }

            if let Some(stripped) = lines[i].strip_prefix('│').map(str::to_owned) {
                lines[i] = stripped;
            }
            if let Some(stripped) = lines[i]
                .strip_suffix('│')
                .map(|rest| rest.trim_end_matches([' ', '\t']).to_owned())
            {
                lines[i] = stripped;
            }
        }
    }

    let end = box_end.unwrap_or(lines.len());
    let start = box_start.map_or(0, |idx| idx + 1);
    lines[start..end].join("\n")
}
