//! Device trust heuristics.
//!
//! Scores the client environment for signs of automation, headless
//! execution, user-agent spoofing and implausible screen geometry. The
//! evaluation is pure: it reads an [`EnvironmentSignals`] snapshot collected
//! by the caller and always produces a score, never an error.
//!
//! # Scoring
//!
//! Start at 100 and subtract the penalty of every triggered check, floored
//! at 0. Automation and headless penalties are near-disqualifying on their
//! own; platform mismatch and abnormal screens are corroborating signals
//! meant to stack. The penalties live in [`TrustPolicy`] and can be tuned
//! from a TOML table.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// User-agent substrings left by automation drivers.
const AUTOMATION_AGENT_MARKERS: &[&str] = &["HeadlessChrome", "WebDriver"];

/// Globals injected into the page by automation frameworks (PhantomJS,
/// legacy ChromeDriver).
const AUTOMATION_GLOBALS: &[&str] = &["callPhantom", "_phantom", "phantom", "domAutomation"];

/// User-agent substring reported by headless engines.
const HEADLESS_AGENT_MARKER: &str = "Headless";

const APPLE_MOBILE_DEVICES: &[&str] = &["iPhone", "iPad", "iPod"];

/// Width/height pair in device-independent pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Snapshot of the client environment, as reported by the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentSignals {
    /// Self-reported agent string.
    pub user_agent: String,
    /// Legacy declared platform.
    pub platform: String,
    /// Platform from user-agent client hints; preferred when present.
    pub ua_data_platform: Option<String>,
    /// Whether the WebDriver flag is exposed.
    pub webdriver: bool,
    /// Names of known automation globals found in the page.
    pub automation_globals: Vec<String>,
    /// Declared language preferences. `None` when the list is not exposed.
    pub languages: Option<Vec<String>>,
    pub screen: Dimensions,
    pub viewport: Dimensions,
}

impl EnvironmentSignals {
    /// Declared platform, preferring client hints over the legacy field.
    /// An empty client-hint value counts as absent.
    pub fn effective_platform(&self) -> &str {
        self.ua_data_platform
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.platform)
    }
}

/// A failed heuristic, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskFactor {
    AutomationFramework,
    HeadlessBrowser,
    PlatformInconsistency,
    AbnormalScreen,
}

impl RiskFactor {
    pub fn label(&self) -> &'static str {
        match self {
            RiskFactor::AutomationFramework => "Automation Framework Detected",
            RiskFactor::HeadlessBrowser => "Headless Browser Detected",
            RiskFactor::PlatformInconsistency => "Platform Inconsistency (User-Agent spoofing)",
            RiskFactor::AbnormalScreen => "Abnormal Screen Properties",
        }
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for RiskFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Outcome of a device trust evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustMetrics {
    pub is_bot: bool,
    pub is_headless: bool,
    pub platform_mismatch: bool,
    pub screen_properties_valid: bool,
    /// 0 (untrusted) to 100 (no risk signals).
    pub trust_score: u8,
    pub risk_factors: Vec<RiskFactor>,
}

#[derive(Error, Debug)]
pub enum TrustPolicyError {
    #[error("invalid trust policy: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Penalty table for the trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrustPolicy {
    pub bot_penalty: u8,
    pub headless_penalty: u8,
    pub platform_mismatch_penalty: u8,
    pub abnormal_screen_penalty: u8,
    /// Screens narrower or shorter than this are considered abnormal.
    pub min_screen_dimension: u32,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            bot_penalty: 90,
            headless_penalty: 80,
            platform_mismatch_penalty: 40,
            abnormal_screen_penalty: 30,
            min_screen_dimension: 100,
        }
    }
}

impl TrustPolicy {
    /// Parse a policy table. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, TrustPolicyError> {
        Ok(toml::from_str(s)?)
    }
}

/// True if the environment shows automation tooling.
pub fn detect_bot(signals: &EnvironmentSignals) -> bool {
    AUTOMATION_AGENT_MARKERS
        .iter()
        .any(|m| signals.user_agent.contains(m))
        || signals.webdriver
        || signals
            .automation_globals
            .iter()
            .any(|g| AUTOMATION_GLOBALS.contains(&g.as_str()))
}

/// True if the agent string admits to a headless engine, or the browser
/// exposes an empty language list (real browsers always report one).
pub fn detect_headless(signals: &EnvironmentSignals) -> bool {
    signals.user_agent.contains(HEADLESS_AGENT_MARKER)
        || signals.languages.as_ref().is_some_and(|l| l.is_empty())
}

/// False if the declared platform family has no trace in the agent string.
pub fn check_platform_consistency(signals: &EnvironmentSignals) -> bool {
    let platform = signals.effective_platform();
    let platform_lower = platform.to_lowercase();
    let agent = &signals.user_agent;
    let agent_lower = agent.to_lowercase();

    if platform_lower.contains("mac") && !agent_lower.contains("mac") {
        return false;
    }
    if platform_lower.contains("win") && !agent_lower.contains("win") {
        return false;
    }
    let apple_mobile = |s: &str| APPLE_MOBILE_DEVICES.iter().any(|d| s.contains(d));
    if apple_mobile(platform) && !apple_mobile(agent) {
        return false;
    }

    true
}

/// False if the screen is implausibly small or the viewport has no area.
pub fn check_screen_properties(signals: &EnvironmentSignals, min_dimension: u32) -> bool {
    if signals.screen.width < min_dimension || signals.screen.height < min_dimension {
        return false;
    }
    if signals.viewport.width == 0 || signals.viewport.height == 0 {
        return false;
    }
    true
}

/// Applies a [`TrustPolicy`] to environment snapshots.
#[derive(Debug, Clone, Default)]
pub struct DeviceTrustEvaluator {
    policy: TrustPolicy,
}

impl DeviceTrustEvaluator {
    pub fn new(policy: TrustPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    pub fn evaluate(&self, signals: &EnvironmentSignals) -> TrustMetrics {
        let is_bot = detect_bot(signals);
        let is_headless = detect_headless(signals);
        let platform_mismatch = !check_platform_consistency(signals);
        let screen_valid = check_screen_properties(signals, self.policy.min_screen_dimension);

        let checks = [
            (is_bot, RiskFactor::AutomationFramework, self.policy.bot_penalty),
            (is_headless, RiskFactor::HeadlessBrowser, self.policy.headless_penalty),
            (
                platform_mismatch,
                RiskFactor::PlatformInconsistency,
                self.policy.platform_mismatch_penalty,
            ),
            (
                !screen_valid,
                RiskFactor::AbnormalScreen,
                self.policy.abnormal_screen_penalty,
            ),
        ];

        let mut trust_score = 100u8;
        let mut risk_factors = Vec::new();
        for (triggered, factor, penalty) in checks {
            if triggered {
                trust_score = trust_score.saturating_sub(penalty);
                risk_factors.push(factor);
            }
        }

        tracing::debug!(
            trust_score,
            risk_factors = risk_factors.len(),
            "device trust evaluated"
        );

        TrustMetrics {
            is_bot,
            is_headless,
            platform_mismatch,
            screen_properties_valid: screen_valid,
            trust_score,
            risk_factors,
        }
    }
}

/// Evaluate with the default penalty table.
pub fn evaluate_device_trust(signals: &EnvironmentSignals) -> TrustMetrics {
    DeviceTrustEvaluator::default().evaluate(signals)
}
