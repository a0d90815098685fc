use anyhow::Context;

pub const DEFAULT_INSTITUTION: &str = "George Mason University";

// substring identifying the registration class-search results page
pub const RESULTS_PAGE_MARKER: &str = "StudentRegistrationSsb/ssb/classSearch/classSearch";

pub struct Settings {
    pub proxy_url: String,
    pub api_token: String,
    pub institution: String,
}

impl Settings {
    pub fn from_env(institution_override: Option<String>) -> anyhow::Result<Self> {
        let proxy_url = std::env::var("RATINGS_PROXY_URL")
            .context("RATINGS_PROXY_URL must be set to the trusted relay endpoint")?;
        let api_token = std::env::var("RATINGS_API_TOKEN")
            .context("RATINGS_API_TOKEN must be set to the shared service credential")?;
        let institution = institution_override
            .or_else(|| std::env::var("TARGET_INSTITUTION").ok())
            .unwrap_or_else(|| DEFAULT_INSTITUTION.to_string());

        Ok(Self {
            proxy_url,
            api_token,
            institution,
        })
    }
}

/// The enricher only runs on the class-search results page.
pub fn is_results_page(url: &str) -> bool {
    url.contains(RESULTS_PAGE_MARKER)
}
