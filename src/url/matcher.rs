/// Checks whether a URL path matches an exclusion pattern
///
/// Patterns match whole path segments: `/admin` excludes `/admin` and
/// everything below it, but not `/administrator`. A `*` matches any run of
/// characters, including `/`.
///
/// # Examples
///
/// ```
/// use rag_crawler::url::matches_path_pattern;
///
/// assert!(matches_path_pattern("/admin", "/admin/users"));
/// assert!(!matches_path_pattern("/admin", "/administrator"));
/// assert!(matches_path_pattern("/blog/*/comments", "/blog/2024/comments"));
/// ```
pub fn matches_path_pattern(pattern: &str, path: &str) -> bool {
    let pattern = pattern.trim_end_matches('/');
    if pattern.is_empty() {
        return true;
    }

    let path = path.to_lowercase();
    let pattern = pattern.to_lowercase();

    if !pattern.contains('*') {
        return path == pattern || path.starts_with(&format!("{}/", pattern));
    }

    glob_match(&pattern, &path) || glob_match(&format!("{}/*", pattern), &path)
}

/// Iterative glob match where `*` matches any (possibly empty) sequence
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_ti = 0;

    while ti < t.len() {
        if pi < p.len() && p[pi] != '*' && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }

    pi == p.len()
}
