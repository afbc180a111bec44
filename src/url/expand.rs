use url::Url;

/// Produces the URL followed by the ancestor directories worth queuing
///
/// Without a query string every strict ancestor path ending in `/` is
/// produced, nearest first, down to the host root. With a query string only
/// the query-stripped form of the same path is produced.
///
/// # Examples
///
/// ```
/// use exam_crawler::url::expand_url;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/duck/foo").unwrap();
/// let expanded: Vec<String> = expand_url(&url).iter().map(|u| u.to_string()).collect();
/// assert_eq!(
///     expanded,
///     vec![
///         "https://example.com/duck/foo",
///         "https://example.com/duck/",
///         "https://example.com/",
///     ]
/// );
/// ```
pub fn expand_url(url: &Url) -> Vec<Url> {
    let mut out = vec![url.clone()];

    if url.query().is_some_and(|q| !q.is_empty()) {
        let mut stripped = url.clone();
        stripped.set_query(None);
        out.push(stripped);
        return out;
    }

    // Opaque URLs (mailto:, data:) have no hierarchy to walk
    if url.cannot_be_a_base() {
        return out;
    }

    let mut path = url.path().to_string();
    loop {
        let trimmed = path.trim_end_matches('/');
        let Some(idx) = trimmed.rfind('/') else {
            break;
        };
        path = trimmed[..=idx].to_string();

        let mut parent = url.clone();
        parent.set_query(None);
        parent.set_path(&path);
        out.push(parent);

        if path == "/" {
            break;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(s: &str) -> Vec<String> {
        expand_url(&Url::parse(s).unwrap())
            .into_iter()
            .map(|u| u.to_string())
            .collect()
    }

    #[test]
    fn test_ancestor_walk() {
        assert_eq!(
            expand("https://example.com/duck/foo"),
            vec![
                "https://example.com/duck/foo",
                "https://example.com/duck/",
                "https://example.com/",
            ]
        );
    }

    #[test]
    fn test_query_expands_one_step() {
        assert_eq!(
            expand("https://example.com/duck/?x=1"),
            vec!["https://example.com/duck/?x=1", "https://example.com/duck/"]
        );
    }

    #[test]
    fn test_query_on_file_strips_only_query() {
        assert_eq!(
            expand("http://www.cs.ubc.ca/~foo/exam.pdf?session=abc"),
            vec![
                "http://www.cs.ubc.ca/~foo/exam.pdf?session=abc",
                "http://www.cs.ubc.ca/~foo/exam.pdf",
            ]
        );
    }

    #[test]
    fn test_directory_url() {
        assert_eq!(
            expand("https://example.com/a/b/"),
            vec![
                "https://example.com/a/b/",
                "https://example.com/a/",
                "https://example.com/",
            ]
        );
    }

    #[test]
    fn test_root_has_no_ancestors() {
        assert_eq!(expand("https://example.com/"), vec!["https://example.com/"]);
    }

    #[test]
    fn test_deep_path() {
        let expanded = expand("https://www.cs.ubc.ca/~schmidtm/Courses/340-F16/L1.pdf");
        assert_eq!(
            expanded,
            vec![
                "https://www.cs.ubc.ca/~schmidtm/Courses/340-F16/L1.pdf",
                "https://www.cs.ubc.ca/~schmidtm/Courses/340-F16/",
                "https://www.cs.ubc.ca/~schmidtm/Courses/",
                "https://www.cs.ubc.ca/~schmidtm/",
                "https://www.cs.ubc.ca/",
            ]
        );
    }
}
