use url::Url;

/// Ordered, duplicate-free list of urls to scrape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetList {
    urls: Vec<String>,
}

impl TargetList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the newline-delimited file form. Blank lines are skipped and a
    /// repeated url keeps its first position.
    pub fn from_lines(content: &str) -> Self {
        let mut list = Self::new();
        for line in content.lines() {
            list.push(line.trim());
        }
        list
    }

    pub fn to_lines(&self) -> String {
        let mut out = String::new();
        for url in &self.urls {
            out.push_str(url);
            out.push('\n');
        }
        out
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|u| u == url)
    }

    /// Append `url` unless it is blank or already present. Returns whether it was added.
    pub fn push(&mut self, url: &str) -> bool {
        if url.is_empty() || self.contains(url) {
            return false;
        }
        self.urls.push(url.to_string());
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for TargetList {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut list = Self::new();
        for url in iter {
            list.push(url.trim());
        }
        list
    }
}

/// A url can become a target when it carries an http(s) scheme and parses.
pub fn is_trackable_url(candidate: &str) -> bool {
    let lower = candidate.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }
    Url::parse(candidate).is_ok_and(|url| url.host_str().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lines_skips_blanks_and_duplicates() {
        let list = TargetList::from_lines(
            "https://a.example/1\n\n  https://b.example/2  \nhttps://a.example/1\n",
        );

        assert_eq!(
            list.iter().collect::<Vec<_>>(),
            vec!["https://a.example/1", "https://b.example/2"]
        );
        assert_eq!(list.to_lines(), "https://a.example/1\nhttps://b.example/2\n");
    }

    #[test]
    fn test_push_rejects_duplicates() {
        let mut list = TargetList::new();
        assert!(list.push("https://a.example/1"));
        assert!(!list.push("https://a.example/1"));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_trackable_urls() {
        assert!(is_trackable_url("https://www.gsstore.org/giyim"));
        assert!(is_trackable_url("HTTP://shop.example/item"));
        assert!(!is_trackable_url("www.gsstore.org/giyim"));
        assert!(!is_trackable_url("ftp://files.example/x"));
        assert!(!is_trackable_url("https://"));
    }
}
