// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Threat detection strategies
//!
//! Each strategy compiles its patterns once at construction. Redaction
//! markers are uppercase bracketed tokens chosen so that no strategy can
//! match its own (or another strategy's) output, which keeps the composite
//! sanitizer idempotent.

use regex::Regex;
use url::Url;

use super::{Issue, PatternTag, SanitizeStrategy};

const REMOVED: &str = "[REMOVED]";

fn compile(patterns: &[&str]) -> anyhow::Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(anyhow::Error::from))
        .collect()
}

/// Detects SQL injection in both direct SQL syntax and natural-language
/// database commands. Redacts only when the text is actually SQL-shaped.
pub struct SqlInjectionStrategy {
    syntax: Vec<Regex>,
    natural_language: Vec<Regex>,
    sql_indicators: Vec<Regex>,
}

impl SqlInjectionStrategy {
    pub fn new() -> anyhow::Result<Self> {
        let syntax = compile(&[
            r#"(?i)(?:SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER)\s+(?:.*?\s+)?(?:FROM|INTO|TABLE|DATABASE|WHERE)\s+[\w`"']+"#,
            r"(?:--|/\*.*?\*/)\s*$",
            r#"(?i)['"]?\s*OR\s*['"]?1['"]?\s*=\s*['"]?1"#,
            r"(?i)UNION\s+(?:ALL\s+)?SELECT",
            r"(?i);\s*(?:SELECT|INSERT|UPDATE|DELETE|DROP|CREATE)\b",
            r"(?i)(?:xp_cmdshell|sp_executesql|exec\s*\(|execute\s*\()",
            r"(?i)(?:sleep|waitfor\s+delay|benchmark|pg_sleep)\s*\(",
        ])?;
        let natural_language = compile(&[
            r"(?i)(?:change|update|modify|set)\s+(?:the\s+)?(?:phone|email|password|role|permission|name|address)",
            r"(?i)(?:make|set)\s+(?:me|user|someone|them)\s+(?:an?\s+)?(?:admin|superadmin|root|moderator)",
            r"(?i)modify\s+(?:the\s+)?database",
            r"(?i)set\s+(?:all\s+)?(?:user\s+)?passwords?\s+to",
            r"(?i)update\s+(?:their|his|her|my|user)\s+(?:role|permission|access|privilege)",
            r"(?i)give\s+(?:me|user|them|someone)\s+(?:admin|super|root|elevated)\s+(?:access|privileges?|permissions?)",
            r"(?i)delete\s+(?:all\s+)?(?:user|account|record)s?\s+(?:from|in)",
            r"(?i)remove\s+(?:all\s+)?(?:user|account|customer)\s+(?:data|records?|information)",
        ])?;
        let sql_indicators = compile(&[
            r";\s*$",
            r"--\s*$",
            r"--\s",
            r"/\*",
            r"(?i)\bFROM\s+\w+\s+WHERE\b",
            r"(?i)\bVALUES\s*\(",
            r"(?i)\bSET\s+\w+\s*=",
        ])?;
        Ok(Self {
            syntax,
            natural_language,
            sql_indicators,
        })
    }

    /// Distinguish actual SQL syntax from SQL keywords in prose
    fn is_likely_sql(&self, text: &str) -> bool {
        self.sql_indicators.iter().any(|re| re.is_match(text))
    }
}

impl SanitizeStrategy for SqlInjectionStrategy {
    fn name(&self) -> &'static str {
        "sql_injection"
    }

    fn apply(&self, text: &str) -> (String, Vec<Issue>) {
        let mut issues = Vec::new();
        let mut sanitized = text.to_string();

        if self.syntax.iter().any(|re| re.is_match(text)) {
            issues.push(Issue::new(
                PatternTag::SqlInjection,
                "SQL syntax pattern detected",
            ));
            if self.is_likely_sql(text) {
                for re in &self.syntax {
                    sanitized = re.replace_all(&sanitized, REMOVED).into_owned();
                }
            }
        }

        if self.natural_language.iter().any(|re| re.is_match(text)) {
            issues.push(Issue::new(
                PatternTag::SqlInjection,
                "Natural language database command detected",
            ));
        }

        (sanitized, issues)
    }
}

/// Detects cross-site scripting vectors; redacts matched markup
pub struct XssStrategy {
    patterns: Vec<Regex>,
}

impl XssStrategy {
    pub fn new() -> anyhow::Result<Self> {
        let patterns = compile(&[
            r"(?is)<script[^>]*>.*?</script>",
            r#"(?i)\bon\w+\s*=\s*["'][^"']*["']"#,
            r"(?i)javascript\s*:",
            r"(?i)<(?:iframe|object|embed|link|style|base|form)[^>]*>",
            r"(?i)<svg[^>]*onload[^>]*>",
            r"(?i)data:[^,]*script",
            r"(?i)\b(?:eval|expression)\s*\(",
            r"(?i)document\.write\s*\(",
        ])?;
        Ok(Self { patterns })
    }
}

impl SanitizeStrategy for XssStrategy {
    fn name(&self) -> &'static str {
        "xss"
    }

    fn apply(&self, text: &str) -> (String, Vec<Issue>) {
        let mut issues = Vec::new();
        let mut sanitized = text.to_string();

        if self.patterns.iter().any(|re| re.is_match(text)) {
            issues.push(Issue::new(
                PatternTag::XssAttack,
                "Potential XSS pattern detected",
            ));
            for re in &self.patterns {
                sanitized = re.replace_all(&sanitized, REMOVED).into_owned();
            }
        }

        (sanitized, issues)
    }
}

/// Detects prompt injection and jailbreak attempts. Flags only; the text is
/// left untouched so downstream agents see the original wording.
pub struct PromptInjectionStrategy {
    patterns: Vec<Regex>,
}

impl PromptInjectionStrategy {
    pub fn new() -> anyhow::Result<Self> {
        let patterns = compile(&[
            r"(?i)(?:ignore|forget|disregard)\s+(?:all\s+)?(?:previous|above|prior)\s+(?:instructions?|commands?|prompts?)",
            r"(?i)(?:ignore|forget|disregard)\s+(?:the\s+)?(?:rules?|restrictions?|guidelines?|policies)",
            r"(?i)you\s+are\s+now\s+(?:in\s+)?(?:admin|debug|root|system|developer|god)\s+mode",
            r"(?i)(?:enter|enable|activate)\s+(?:admin|debug|maintenance|developer)\s+mode",
            r"(?i)i\s+am\s+(?:now\s+)?(?:the\s+)?(?:admin|administrator|root|system|owner)",
            r"(?i)switch\s+to\s+(?:admin|root|system|unrestricted)\s+(?:mode|context|role)",
            r"(?i)(?:system|admin)\s*:\s*(?:you|ignore|allow)",
            r"(?i)\[\[?(?:system|admin|root)\]\]?",
            r"(?i)\{\{(?:system|admin|root)\}\}",
            r"(?is)<!--.*?(?:ignore|admin|system|execute).*?-->",
            r"(?i)pretend\s+(?:you\s+are|to\s+be|that)",
            r"(?i)act\s+as\s+if\s+you",
            r"(?i)new\s+(?:rule|instruction|command)\s*:",
            r"(?i)from\s+now\s+on\s*[,:]",
        ])?;
        Ok(Self { patterns })
    }
}

impl SanitizeStrategy for PromptInjectionStrategy {
    fn name(&self) -> &'static str {
        "prompt_injection"
    }

    fn apply(&self, text: &str) -> (String, Vec<Issue>) {
        let mut issues = Vec::new();
        if self.patterns.iter().any(|re| re.is_match(text)) {
            issues.push(Issue::new(
                PatternTag::PromptInjection,
                "Prompt injection attempt detected",
            ));
        }
        (text.to_string(), issues)
    }
}

const SENSITIVE_TERMS: &[&str] = &[
    "password",
    "pwd",
    "passwd",
    "credential",
    "secret",
    "token",
    "api_key",
    "ssn",
    "social security",
    "credit card",
    "bank account",
    "private key",
];

const EXTRACTION_VERBS: &[&str] = &[
    "dump", "export", "extract", "show", "list", "display", "give", "provide", "send", "email",
    "download", "copy", "transfer", "leak", "steal",
];

const BULK_INDICATORS: &[&str] = &["all", "entire", "complete", "every", "whole", "full", "*"];

const DATA_TERMS: &[&str] = &[
    "user", "customer", "account", "record", "data", "database", "table",
];

/// Detects attempts to extract sensitive or bulk data. Flag only.
pub struct DataExfiltrationStrategy;

impl DataExfiltrationStrategy {
    pub fn new() -> Self {
        Self
    }

    fn contains_any(text: &str, terms: &[&str]) -> bool {
        terms.iter().any(|t| text.contains(t))
    }
}

impl SanitizeStrategy for DataExfiltrationStrategy {
    fn name(&self) -> &'static str {
        "data_exfiltration"
    }

    fn apply(&self, text: &str) -> (String, Vec<Issue>) {
        let lower = text.to_lowercase();
        let mut issues = Vec::new();

        let has_verb = Self::contains_any(&lower, EXTRACTION_VERBS);
        if has_verb && Self::contains_any(&lower, SENSITIVE_TERMS) {
            issues.push(Issue::new(
                PatternTag::DataExfiltration,
                "Sensitive data request detected",
            ));
        } else if has_verb
            && Self::contains_any(&lower, BULK_INDICATORS)
            && Self::contains_any(&lower, DATA_TERMS)
        {
            issues.push(Issue::new(
                PatternTag::DataExfiltration,
                "Bulk data extraction attempt",
            ));
        } else if lower.contains("information_schema") || lower.contains("show tables") {
            issues.push(Issue::new(
                PatternTag::DataExfiltration,
                "Database structure exploration",
            ));
        } else if lower.contains("select") && Self::contains_any(&lower, SENSITIVE_TERMS) {
            issues.push(Issue::new(
                PatternTag::DataExfiltration,
                "SQL data extraction pattern",
            ));
        }

        (text.to_string(), issues)
    }
}

/// URL shorteners and known IP-logger services
const SUSPICIOUS_DOMAINS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "goo.gl",
    "ow.ly",
    "is.gd",
    "t.co",
    "grabify.link",
    "iplogger.org",
    "iplogger.com",
    "2no.co",
    "blasze.com",
];

/// TLDs disproportionately used in phishing campaigns
const SUSPICIOUS_TLDS: &[&str] = &[
    ".tk",
    ".ml",
    ".ga",
    ".cf",
    ".click",
    ".download",
    ".review",
];

/// Detects malicious URLs; redacts suspicious ones, flags bare IPs
pub struct UrlStrategy {
    url_pattern: Regex,
    ip_pattern: Regex,
}

impl UrlStrategy {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            url_pattern: Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#)?,
            ip_pattern: Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b")?,
        })
    }

    fn is_suspicious(url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            // Malformed URL is suspicious
            Err(_) => return true,
        };
        let domain = match parsed.host_str() {
            Some(h) => h.to_lowercase(),
            None => return true,
        };

        if SUSPICIOUS_DOMAINS.iter().any(|d| domain.contains(d)) {
            return true;
        }
        if SUSPICIOUS_TLDS.iter().any(|tld| domain.ends_with(tld)) {
            return true;
        }
        // Homograph attack: non-ASCII characters in the domain
        if !domain.is_ascii() {
            return true;
        }
        false
    }
}

impl SanitizeStrategy for UrlStrategy {
    fn name(&self) -> &'static str {
        "url"
    }

    fn apply(&self, text: &str) -> (String, Vec<Issue>) {
        let mut issues = Vec::new();
        let mut sanitized = text.to_string();

        let urls: Vec<String> = self
            .url_pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        for url in urls {
            if Self::is_suspicious(&url) {
                if issues.is_empty() {
                    issues.push(Issue::new(
                        PatternTag::SuspiciousUrl,
                        "Suspicious URL detected",
                    ));
                }
                sanitized = sanitized.replace(&url, "[URL_REMOVED]");
            }
        }

        if self.ip_pattern.is_match(&sanitized) {
            issues.push(Issue::new(
                PatternTag::SuspiciousUrl,
                "Direct IP address detected",
            ));
        }

        (sanitized, issues)
    }
}

/// Detects and redacts personal identifiable information
pub struct PersonalInfoStrategy {
    credit_card: Regex,
    ssn: Regex,
    ssn_context: Regex,
    phone: Regex,
    email: Regex,
}

impl PersonalInfoStrategy {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            credit_card: Regex::new(r"\b(?:\d{4}[-\s]){3}\d{4}\b")?,
            ssn: Regex::new(r"\b\d{3}[-\s]\d{2}[-\s]\d{4}\b")?,
            ssn_context: Regex::new(r"(?i)(?:ssn|social.{0,10}security|tax.{0,10}id)")?,
            phone: Regex::new(r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b")?,
            email: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")?,
        })
    }

    fn is_exempt_email(email: &str) -> bool {
        let lower = email.to_lowercase();
        ["example.com", "test.com", "localhost", "admin@", "noreply@"]
            .iter()
            .any(|x| lower.contains(x))
    }
}

impl SanitizeStrategy for PersonalInfoStrategy {
    fn name(&self) -> &'static str {
        "personal_info"
    }

    fn apply(&self, text: &str) -> (String, Vec<Issue>) {
        let mut issues = Vec::new();
        let mut sanitized = text.to_string();

        // Credit cards before phones: a 16-digit grouped number would
        // otherwise partially match the phone pattern
        if self.credit_card.is_match(&sanitized) {
            issues.push(Issue::new(
                PatternTag::PersonalInfo,
                "Credit card pattern detected",
            ));
            sanitized = self
                .credit_card
                .replace_all(&sanitized, "[CC_REMOVED]")
                .into_owned();
        }

        if self.ssn.is_match(&sanitized) && self.ssn_context.is_match(&sanitized) {
            issues.push(Issue::new(
                PatternTag::PersonalInfo,
                "SSN pattern detected",
            ));
            sanitized = self
                .ssn
                .replace_all(&sanitized, "[SSN_REMOVED]")
                .into_owned();
        }

        if self.phone.is_match(&sanitized) {
            issues.push(Issue::new(
                PatternTag::PersonalInfo,
                "Phone number detected",
            ));
            sanitized = self
                .phone
                .replace_all(&sanitized, "[PHONE_REMOVED]")
                .into_owned();
        }

        let snapshot = sanitized.clone();
        let emails: Vec<String> = self
            .email
            .find_iter(&snapshot)
            .map(|m| m.as_str().to_string())
            .collect();
        for email in emails {
            if !Self::is_exempt_email(&email) {
                issues.push(Issue::new(
                    PatternTag::PersonalInfo,
                    "Email address detected",
                ));
                sanitized = sanitized.replace(&email, "[EMAIL_REMOVED]");
            }
        }

        (sanitized, issues)
    }
}

/// Redacts words from the configured profanity list
pub struct ProfanityStrategy {
    patterns: Vec<Regex>,
}

impl ProfanityStrategy {
    pub fn new(words: &[String]) -> anyhow::Result<Self> {
        let patterns = words
            .iter()
            .map(|w| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(w)))
                    .map_err(anyhow::Error::from)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

impl SanitizeStrategy for ProfanityStrategy {
    fn name(&self) -> &'static str {
        "profanity"
    }

    fn apply(&self, text: &str) -> (String, Vec<Issue>) {
        let mut issues = Vec::new();
        let mut sanitized = text.to_string();

        for re in &self.patterns {
            if re.is_match(&sanitized) {
                if issues.is_empty() {
                    issues.push(Issue::new(PatternTag::Profanity, "Inappropriate content"));
                }
                sanitized = re.replace_all(&sanitized, "[REDACTED]").into_owned();
            }
        }

        (sanitized, issues)
    }
}
