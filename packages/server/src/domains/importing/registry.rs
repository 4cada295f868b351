//! Maps a proposal URL to its importer. First match wins, so host patterns
//! must not overlap; the test below guards that.

use std::sync::Arc;

use parser_client::ParserClient;

use super::importers::{host_matches, FanqieImporter, ProposalImporter, RemoteSiteImporter};
use crate::config::Config;

#[derive(Clone, Default)]
pub struct ImporterRegistry {
    importers: Vec<Arc<dyn ProposalImporter>>,
}

impl ImporterRegistry {
    pub fn new(importers: Vec<Arc<dyn ProposalImporter>>) -> Self {
        Self { importers }
    }

    /// fanqie, 101kks, 69shuba, tadu.
    pub fn standard(config: &Config) -> Self {
        let client = ParserClient::new(config.parser_service_url.clone());
        Self::new(vec![
            Arc::new(FanqieImporter::new(config.fanqie.clone())),
            Arc::new(RemoteSiteImporter::kks101(client.clone(), config.kks101.clone())),
            Arc::new(RemoteSiteImporter::shuba69(client.clone(), config.shuba69.clone())),
            Arc::new(RemoteSiteImporter::tadu(client, config.tadu.clone())),
        ])
    }

    pub fn select(&self, url: &str) -> Option<Arc<dyn ProposalImporter>> {
        self.importers
            .iter()
            .find(|importer| importer.can_import(url))
            .cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.importers.iter().map(|i| i.name()).collect()
    }

    /// `(claimed_by, owner, host)` for every host pattern that another
    /// importer would also accept.
    pub fn overlapping_hosts(&self) -> Vec<(&'static str, &'static str, &'static str)> {
        let mut overlaps = Vec::new();
        for owner in &self.importers {
            for host in owner.hosts() {
                let sample = format!("https://{host}/");
                for other in &self.importers {
                    if other.name() != owner.name()
                        && other.hosts().iter().any(|pattern| host_matches(&sample, pattern))
                    {
                        overlaps.push((other.name(), owner.name(), *host));
                    }
                }
            }
        }
        overlaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteSession;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            database_url: "postgres://localhost/test".into(),
            database_max_connections: 1,
            uploads_dir: PathBuf::from("./uploads"),
            parser_service_url: "http://parser.test".into(),
            import_run_timeout: Duration::from_secs(60),
            fanqie: SiteSession::default(),
            kks101: SiteSession::default(),
            shuba69: SiteSession::default(),
            tadu: SiteSession::default(),
        }
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(
            ImporterRegistry::standard(&config()).names(),
            vec!["fanqie", "101kks", "69shuba", "tadu"]
        );
    }

    #[test]
    fn test_select_by_host() {
        let registry = ImporterRegistry::standard(&config());
        let pick = |url: &str| registry.select(url).map(|i| i.name());

        assert_eq!(pick("https://fanqienovel.com/page/7143038691944959011"), Some("fanqie"));
        assert_eq!(pick("https://www.101kks.com/book/12345.html"), Some("101kks"));
        assert_eq!(pick("https://www.69shuba.com/book/88888.htm"), Some("69shuba"));
        assert_eq!(pick("https://www.tadu.com/book/1000/"), Some("tadu"));
        assert_eq!(pick("https://unknown.example.com/book/1"), None);
    }

    #[test]
    fn test_no_host_pattern_overlaps() {
        let registry = ImporterRegistry::standard(&config());
        assert!(registry.overlapping_hosts().is_empty());
    }
}
