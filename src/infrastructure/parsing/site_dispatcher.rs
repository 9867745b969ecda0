//! Url → strategy chain routing

use tracing::debug;

use super::config::{GenericPageSelectors, SiteProfile};
use super::strategy::{ScrollPolicy, StrategyChain};

/// Where a target goes.
pub enum Dispatch<'a> {
    Chain(&'a StrategyChain),
    Skip(String),
}

pub struct SiteDispatcher {
    skip_patterns: Vec<String>,
    sites: Vec<(String, StrategyChain)>,
    generic: StrategyChain,
}

impl SiteDispatcher {
    pub fn new(generic: StrategyChain) -> Self {
        Self {
            skip_patterns: Vec::new(),
            sites: Vec::new(),
            generic,
        }
    }

    /// Dispatcher for the configured profiles, in their listed order.
    pub fn from_profiles(
        profiles: &[SiteProfile],
        skip_patterns: &[String],
        scroll: ScrollPolicy,
    ) -> Self {
        let generic = StrategyChain::generic(GenericPageSelectors::default()).with_scroll(scroll);
        let mut dispatcher = Self::new(generic).with_skip_patterns(skip_patterns.to_vec());
        for profile in profiles {
            dispatcher.register(
                profile.domain_pattern.clone(),
                StrategyChain::from_profile(profile).with_scroll(scroll),
            );
        }
        dispatcher
    }

    #[must_use]
    pub fn with_skip_patterns(mut self, patterns: Vec<String>) -> Self {
        self.skip_patterns = patterns.into_iter().filter(|p| !p.is_empty()).collect();
        self
    }

    /// Add a site after the existing ones. Earlier registrations win on overlap.
    pub fn register(&mut self, pattern: impl Into<String>, chain: StrategyChain) {
        self.sites.push((pattern.into(), chain));
    }

    pub fn dispatch(&self, url: &str) -> Dispatch<'_> {
        if let Some(pattern) = self.skip_patterns.iter().find(|p| url.contains(p.as_str())) {
            return Dispatch::Skip(format!("matches skip pattern '{pattern}'"));
        }

        match self.sites.iter().find(|(pattern, _)| url.contains(pattern.as_str())) {
            Some((pattern, chain)) => {
                debug!("{} matched site pattern '{}'", url, pattern);
                Dispatch::Chain(chain)
            }
            None => Dispatch::Chain(&self.generic),
        }
    }
}
