use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use url::Url;

/// How strictly a link has to match the seed to count as the same site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OriginMatch {
    /// Scheme, host and port must all match
    #[default]
    Origin,
    /// Only the host must match, `http` and `https` are interchangeable
    Host,
}

/// Same-site test against the seed of a crawl.
///
/// Pure URL comparison, no request is ever issued. When the seed redirects,
/// the location it landed on counts as the same site too, see
/// [`SameOrigin::follow_redirect`].
#[derive(Debug, Clone)]
pub struct SameOrigin {
    seed: Url,
    landed: OnceLock<Url>,
    policy: OriginMatch,
}

impl SameOrigin {
    pub fn new(seed: Url, policy: OriginMatch) -> Self {
        Self {
            seed,
            landed: OnceLock::new(),
            policy,
        }
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Records where the seed ended up after redirects. Only the first call
    /// has an effect, returns whether it was that one.
    pub fn follow_redirect(&self, landed: Url) -> bool {
        self.landed.set(landed).is_ok()
    }

    pub fn accepts(&self, link: &Url) -> bool {
        self.matches(&self.seed, link)
            || self
                .landed
                .get()
                .map_or(false, |landed| self.matches(landed, link))
    }

    fn matches(&self, anchor: &Url, link: &Url) -> bool {
        match self.policy {
            OriginMatch::Origin => link.origin() == anchor.origin(),
            OriginMatch::Host => {
                is_web(link) && link.host().is_some() && link.host() == anchor.host()
            }
        }
    }

    /// Parses `link` and returns it without its fragment when it belongs to
    /// the seed's site.
    pub fn filter(&self, link: &str) -> Option<Url> {
        let mut url = Url::parse(link).ok()?;
        if !self.accepts(&url) {
            return None;
        }
        url.set_fragment(None);
        Some(url)
    }
}

fn is_web(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// One-off strict check of two absolute URLs, false when either doesn't parse.
pub fn same_origin(seed: &str, link: &str) -> bool {
    match (Url::parse(seed), Url::parse(link)) {
        (Ok(seed), Ok(link)) => SameOrigin::new(seed, OriginMatch::Origin).accepts(&link),
        _ => false,
    }
}
