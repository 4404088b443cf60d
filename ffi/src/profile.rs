//! Browser impersonation profiles.
//!
//! A profile is looked up by name and contributes the default request
//! headers the emulated browser would send. Headers set on the request
//! itself always win over profile defaults.

pub struct Profile {
    pub name: &'static str,
    pub headers: &'static [(&'static str, &'static str)],
}

const CHROME_ACCEPT: &str = concat!(
    "text/html,application/xhtml+xml,application/xml;q=0.9,",
    "image/avif,image/webp,image/apng,*/*;q=0.8",
);
const FIREFOX_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

static PROFILES: &[Profile] = &[
    Profile {
        name: "chrome_131",
        headers: &[
            ("sec-ch-ua", r#""Google Chrome";v="131", "Chromium";v="131", "Not_A Brand";v="24""#),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", r#""Windows""#),
            (
                "user-agent",
                concat!(
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
                    "(KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
                ),
            ),
            ("accept", CHROME_ACCEPT),
            ("accept-language", "en-US,en;q=0.9"),
        ],
    },
    Profile {
        name: "chrome_136",
        headers: &[
            ("sec-ch-ua", r#""Chromium";v="136", "Google Chrome";v="136", "Not.A/Brand";v="99""#),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", r#""macOS""#),
            (
                "user-agent",
                concat!(
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 ",
                    "(KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36",
                ),
            ),
            ("accept", CHROME_ACCEPT),
            ("accept-language", "en-US,en;q=0.9"),
        ],
    },
    Profile {
        name: "edge_134",
        headers: &[
            ("sec-ch-ua", r#""Chromium";v="134", "Microsoft Edge";v="134", "Not:A-Brand";v="24""#),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", r#""Windows""#),
            (
                "user-agent",
                concat!(
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
                    "(KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36 Edg/134.0.0.0",
                ),
            ),
            ("accept", CHROME_ACCEPT),
            ("accept-language", "en-US,en;q=0.9"),
        ],
    },
    Profile {
        name: "firefox_136",
        headers: &[
            (
                "user-agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:136.0) Gecko/20100101 Firefox/136.0",
            ),
            ("accept", FIREFOX_ACCEPT),
            ("accept-language", "en-US,en;q=0.5"),
        ],
    },
    Profile {
        name: "firefox_139",
        headers: &[
            (
                "user-agent",
                "Mozilla/5.0 (X11; Linux x86_64; rv:139.0) Gecko/20100101 Firefox/139.0",
            ),
            ("accept", FIREFOX_ACCEPT),
            ("accept-language", "en-US,en;q=0.5"),
        ],
    },
    Profile {
        name: "safari_18",
        headers: &[
            (
                "user-agent",
                concat!(
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 ",
                    "(KHTML, like Gecko) Version/18.0 Safari/605.1.15",
                ),
            ),
            ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
            ("accept-language", "en-US,en;q=0.9"),
        ],
    },
    Profile {
        name: "safari_ios_18",
        headers: &[
            (
                "user-agent",
                concat!(
                    "Mozilla/5.0 (iPhone; CPU iPhone OS 18_0 like Mac OS X) AppleWebKit/605.1.15 ",
                    "(KHTML, like Gecko) Version/18.0 Mobile/15E148 Safari/604.1",
                ),
            ),
            ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
            ("accept-language", "en-US,en;q=0.9"),
        ],
    },
    Profile {
        name: "okhttp_5",
        headers: &[("user-agent", "okhttp/5.0.0")],
    },
];

pub fn lookup(name: &str) -> Option<&'static Profile> {
    PROFILES.iter().find(|p| p.name == name)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    PROFILES.iter().map(|p| p.name)
}

/// Profile defaults not overridden by `headers`, followed by `headers`.
pub fn apply(profile: Option<&Profile>, headers: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged = Vec::with_capacity(headers.len() + 8);
    if let Some(profile) = profile {
        for (name, value) in profile.headers {
            if !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
                merged.push((name.to_string(), value.to_string()));
            }
        }
    }
    merged.extend(headers.iter().cloned());
    merged
}
