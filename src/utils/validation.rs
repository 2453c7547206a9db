use regex::Regex;

/// Owner namespaces follow the same grammar as a single repository path
/// component: lowercase alphanumerics with inner separators.
pub fn is_valid_owner(owner: &str) -> bool {
    let re = Regex::new(r"^[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*$").unwrap();
    re.is_match(owner)
}

/// Logical paths are slash-separated segments. Each segment must start with
/// an alphanumeric, which also rules out `.` and `..` traversal components.
pub fn is_valid_path(path: &str) -> bool {
    let re =
        Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]{0,127}(/[a-zA-Z0-9][a-zA-Z0-9._-]{0,127})*$")
            .unwrap();
    re.is_match(path)
}
