/// Replace every `$$` in `input` with the shell's pid.
///
/// Pairs are matched left to right and never overlap, so `$$$` expands to
/// the pid followed by a lone `$`.
pub fn expand_pid(input: &str, pid: u32) -> String {
    if !input.contains("$$") {
        return input.to_string();
    }

    let pid = pid.to_string();
    let mut result = String::with_capacity(input.len() + pid.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'$') {
            chars.next();
            result.push_str(&pid);
        } else {
            result.push(ch);
        }
    }

    result
}
