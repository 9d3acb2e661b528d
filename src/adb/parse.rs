// Parsers for text produced by adb shell commands

/// Parse `wm size` output. An override size, when present, wins over the physical one.
pub fn parse_screen_size(output: &str) -> Option<(u32, u32)> {
    let mut physical = None;
    let mut override_size = None;
    for line in output.lines() {
        let line = line.trim();
        if let Some(size_str) = line.strip_prefix("Physical size: ") {
            physical = parse_dimensions(size_str);
        } else if let Some(size_str) = line.strip_prefix("Override size: ") {
            override_size = parse_dimensions(size_str);
        }
    }
    override_size.or(physical)
}

fn parse_dimensions(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.trim().split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Extract the focused package from `dumpsys window` output.
///
/// Looks at `mCurrentFocus` first and falls back to `mFocusedApp`. Lines look like
/// `mCurrentFocus=Window{1a2b3c u0 com.gof.global/com.unity3d.player.UnityPlayerActivity}`.
pub fn parse_foreground_package(output: &str) -> Option<String> {
    ["mCurrentFocus", "mFocusedApp"].iter().find_map(|key| {
        output
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with(key))
            .find_map(package_from_focus_line)
    })
}

fn package_from_focus_line(line: &str) -> Option<String> {
    // The component is the token holding a '/', e.g. "com.pkg/.Activity}"
    line.split_whitespace()
        .find(|token| token.contains('/'))
        .and_then(|token| token.split('/').next())
        .map(|pkg| pkg.trim_start_matches(['{', '(']).to_string())
        .filter(|pkg| !pkg.is_empty() && pkg.contains('.'))
}

/// Escape text for `input text`: spaces become `%s`, shell metacharacters are backslash-escaped.
pub fn escape_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            '\\' | '"' | '\'' | '`' | '$' | '&' | '|' | ';' | '<' | '>' | '(' | ')' | '*'
            | '?' | '~' | '#' | '!' | '[' | ']' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
