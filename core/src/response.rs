use std::collections::BTreeMap;

use bytes::Bytes;

/// Private metadata key holding the final URL after redirects.
pub const URL_KEY: &str = "cloak_url";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostResponse {
    pub status: u16,
    /// Header multimap: one entry per name, values in arrival order.
    pub headers: Vec<(String, Vec<String>)>,
    pub body: Bytes,
    /// Adapter-scoped metadata, never sent or shown as headers.
    pub private: BTreeMap<String, String>,
}

impl HostResponse {
    /// Values of header `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    pub fn final_url(&self) -> Option<&str> {
        self.private.get(URL_KEY).map(String::as_str)
    }

    /// Group ordered pairs by name, keeping the first spelling seen.
    pub(crate) fn group_headers(pairs: Vec<(String, String)>) -> Vec<(String, Vec<String>)> {
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (name, value) in pairs {
            match grouped.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
                Some((_, values)) => values.push(value),
                None => grouped.push((name, vec![value])),
            }
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn grouping_preserves_first_seen_order() {
        let grouped = HostResponse::group_headers(vec![
            pair("set-cookie", "a=1"),
            pair("content-type", "text/plain"),
            pair("Set-Cookie", "b=2"),
        ]);
        assert_eq!(
            grouped,
            vec![
                ("set-cookie".to_string(), vec!["a=1".to_string(), "b=2".to_string()]),
                ("content-type".to_string(), vec!["text/plain".to_string()]),
            ]
        );
    }

    #[test]
    fn header_lookup_ignores_case() {
        let response = HostResponse {
            status: 200,
            headers: HostResponse::group_headers(vec![pair("content-type", "text/plain")]),
            ..Default::default()
        };
        assert_eq!(response.header("Content-Type"), Some(&["text/plain".to_string()][..]));
        assert!(response.header("x-missing").is_none());
        assert!(response.final_url().is_none());
    }
}
