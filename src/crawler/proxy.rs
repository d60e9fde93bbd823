//! Proxy tier selection and rotation
//!
//! Each domain keeps request and success counts per proxy tier. A task's
//! first attempt picks the tier whose share of requests lags behind its
//! share of successes; retries always go through residential proxies.

use crate::config::ProxyConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Class of proxy a request goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyTier {
    Datacenter,
    Residential,
}

impl std::fmt::Display for ProxyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyTier::Datacenter => write!(f, "datacenter"),
            ProxyTier::Residential => write!(f, "residential"),
        }
    }
}

/// Requests sent through one tier and how many were not blocked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierStats {
    pub total: u64,
    pub successful: u64,
}

impl TierStats {
    fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.successful += 1;
        }
    }
}

/// Tracks proxy outcomes for a domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainProxyStats {
    pub datacenter: TierStats,
    pub residential: TierStats,
}

impl DomainProxyStats {
    /// Picks the tier for a first attempt
    ///
    /// The datacenter-to-residential success-rate ratio is compared with
    /// their request ratio. Datacenter is used while its request share is
    /// below what its success rate earns it. One extra datacenter success
    /// is assumed so a few early blocks do not rule it out for good.
    ///
    /// When residential has no requests or no successes the ratio is
    /// undefined; datacenter is then used unless it was tried and never
    /// succeeded.
    ///
    /// # Examples
    ///
    /// ```
    /// use gleaner::crawler::{DomainProxyStats, ProxyTier, TierStats};
    ///
    /// let stats = DomainProxyStats {
    ///     datacenter: TierStats { total: 10, successful: 1 },
    ///     residential: TierStats { total: 10, successful: 9 },
    /// };
    /// assert_eq!(stats.preferred_tier(), ProxyTier::Residential);
    /// ```
    pub fn preferred_tier(&self) -> ProxyTier {
        let dc = self.datacenter;
        let res = self.residential;

        if res.total == 0 || res.successful == 0 {
            return if dc.total > 0 && dc.successful == 0 {
                ProxyTier::Residential
            } else {
                ProxyTier::Datacenter
            };
        }
        if dc.total == 0 {
            return ProxyTier::Datacenter;
        }

        let dc_success_rate = (dc.successful + 1) as f64 / dc.total as f64;
        let res_success_rate = res.successful as f64 / res.total as f64;
        let success_ratio = dc_success_rate / res_success_rate;
        let total_ratio = dc.total as f64 / res.total as f64;

        if success_ratio > total_ratio {
            ProxyTier::Datacenter
        } else {
            ProxyTier::Residential
        }
    }

    fn tier_mut(&mut self, tier: ProxyTier) -> &mut TierStats {
        match tier {
            ProxyTier::Datacenter => &mut self.datacenter,
            ProxyTier::Residential => &mut self.residential,
        }
    }
}

/// A proxy assigned to one navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyChoice {
    pub tier: ProxyTier,
    pub url: String,
}

/// Chooses proxies and learns which tier works per domain
#[derive(Debug)]
pub struct ProxyManager {
    datacenter: Vec<String>,
    residential: Vec<String>,
    next_datacenter: AtomicUsize,
    next_residential: AtomicUsize,
    stats: Mutex<HashMap<String, DomainProxyStats>>,
}

impl ProxyManager {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            datacenter: config.datacenter.clone(),
            residential: config.residential.clone(),
            next_datacenter: AtomicUsize::new(0),
            next_residential: AtomicUsize::new(0),
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// False when no proxy is configured; requests then go direct
    pub fn is_enabled(&self) -> bool {
        !self.datacenter.is_empty() || !self.residential.is_empty()
    }

    /// Picks the proxy for an attempt at a page on `domain`
    ///
    /// # Arguments
    ///
    /// * `domain` - Host of the page
    /// * `retry_count` - Failed attempts so far; any retry goes residential
    ///
    /// # Returns
    ///
    /// `None` when no proxies are configured. If the wanted tier has no
    /// proxies, the other tier is used.
    pub fn choose(&self, domain: &str, retry_count: u32) -> Option<ProxyChoice> {
        if !self.is_enabled() {
            return None;
        }

        let wanted = if retry_count > 0 {
            ProxyTier::Residential
        } else {
            let mut stats = self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            stats.entry(domain.to_string()).or_default().preferred_tier()
        };

        let tier = match wanted {
            ProxyTier::Datacenter if self.datacenter.is_empty() => ProxyTier::Residential,
            ProxyTier::Residential if self.residential.is_empty() => ProxyTier::Datacenter,
            tier => tier,
        };

        let (pool, cursor) = match tier {
            ProxyTier::Datacenter => (&self.datacenter, &self.next_datacenter),
            ProxyTier::Residential => (&self.residential, &self.next_residential),
        };
        let index = cursor.fetch_add(1, Ordering::Relaxed) % pool.len();

        Some(ProxyChoice {
            tier,
            url: pool[index].clone(),
        })
    }

    /// Records whether a request through `tier` got past the site's blocking
    pub fn record(&self, domain: &str, tier: ProxyTier, success: bool) {
        let mut stats = self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        stats
            .entry(domain.to_string())
            .or_default()
            .tier_mut(tier)
            .record(success);
    }

    /// Current counts for `domain`, if it was ever requested
    pub fn stats_for(&self, domain: &str) -> Option<DomainProxyStats> {
        let stats = self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        stats.get(domain).copied()
    }
}
