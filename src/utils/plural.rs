//! Pluralization for log lines.

#[inline]
fn plural_s(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// `plural_count(1, "task")` -> `"1 task"`, `plural_count(3, "task")` -> `"3 tasks"`
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    format!("{} {}{}", count, noun, plural_s(count))
}
