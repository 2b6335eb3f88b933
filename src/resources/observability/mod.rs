//! Observability service resources.

pub mod scrape_config;
