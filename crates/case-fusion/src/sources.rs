//! Retrieval of the three raw source tables.
//!
//! The fetches are independent and run concurrently; the build waits for all
//! of them at a single join point and fails as a whole if any one fails.

use crate::timeseries::{CaseAttribute, RawTables};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

pub const JOHNS_HOPKINS_PROVIDER: &str = "Johns Hopkins CSSE COVID-19";

const JOHNS_HOPKINS_BASE: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Url(String),
    File(PathBuf),
}

impl SourceLocation {
    /// `http://` and `https://` values are URLs, anything else a file path.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lowered = trimmed.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Url(url) => f.write_str(url),
            SourceLocation::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    pub confirmed: SourceLocation,
    pub recovered: SourceLocation,
    pub deceased: SourceLocation,
}

impl SourceSet {
    pub fn johns_hopkins() -> Self {
        Self {
            confirmed: johns_hopkins_table("confirmed"),
            recovered: johns_hopkins_table("recovered"),
            deceased: johns_hopkins_table("deaths"),
        }
    }
}

fn johns_hopkins_table(kind: &str) -> SourceLocation {
    SourceLocation::Url(format!(
        "{JOHNS_HOPKINS_BASE}/time_series_covid19_{kind}_global.csv"
    ))
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request for {attribute} table at {url} failed: {source}")]
    Http {
        attribute: CaseAttribute,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request for {attribute} table at {url} returned {status}")]
    Status {
        attribute: CaseAttribute,
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to read {attribute} table from {path}: {source}")]
    Io {
        attribute: CaseAttribute,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl SourceFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetch_all(&self, sources: &SourceSet) -> Result<RawTables, FetchError> {
        let (confirmed, recovered, deceased) = tokio::try_join!(
            self.fetch(CaseAttribute::Confirmed, &sources.confirmed),
            self.fetch(CaseAttribute::Recovered, &sources.recovered),
            self.fetch(CaseAttribute::Deceased, &sources.deceased),
        )?;

        Ok(RawTables {
            confirmed,
            recovered,
            deceased,
        })
    }

    pub async fn fetch(
        &self,
        attribute: CaseAttribute,
        location: &SourceLocation,
    ) -> Result<String, FetchError> {
        let body = match location {
            SourceLocation::Url(url) => self.fetch_url(attribute, url).await?,
            SourceLocation::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| FetchError::Io {
                        attribute,
                        path: path.clone(),
                        source,
                    })?;
                // Undecodable bytes become U+FFFD and later parse as zero.
                String::from_utf8_lossy(&bytes).into_owned()
            }
        };

        debug!(%attribute, source = %location, bytes = body.len(), "source table fetched");
        Ok(body)
    }

    async fn fetch_url(&self, attribute: CaseAttribute, url: &str) -> Result<String, FetchError> {
        let http_error = |source| FetchError::Http {
            attribute,
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                attribute,
                url: url.to_string(),
                status,
            });
        }

        response.text().await.map_err(http_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "case-fusion-{}-{name}",
            std::process::id()
        ));
        std::fs::write(&path, contents).expect("scratch file written");
        path
    }

    #[test]
    fn source_location_distinguishes_urls_from_paths() {
        assert_eq!(
            SourceLocation::parse(" https://example.org/a.csv "),
            SourceLocation::Url("https://example.org/a.csv".to_string())
        );
        assert_eq!(
            SourceLocation::parse("HTTP://example.org/a.csv"),
            SourceLocation::Url("HTTP://example.org/a.csv".to_string())
        );
        assert_eq!(
            SourceLocation::parse("data/confirmed.csv"),
            SourceLocation::File(PathBuf::from("data/confirmed.csv"))
        );
    }

    #[test]
    fn johns_hopkins_defaults_point_at_global_series() {
        let sources = SourceSet::johns_hopkins();
        assert!(sources
            .confirmed
            .to_string()
            .ends_with("time_series_covid19_confirmed_global.csv"));
        assert!(sources
            .deceased
            .to_string()
            .ends_with("time_series_covid19_deaths_global.csv"));
    }

    #[tokio::test]
    async fn fetch_all_reads_local_files() {
        let confirmed = scratch_file("fetch-confirmed.csv", "confirmed");
        let recovered = scratch_file("fetch-recovered.csv", "recovered");
        let deceased = scratch_file("fetch-deceased.csv", "deceased");
        let sources = SourceSet {
            confirmed: SourceLocation::File(confirmed.clone()),
            recovered: SourceLocation::File(recovered.clone()),
            deceased: SourceLocation::File(deceased.clone()),
        };

        let tables = SourceFetcher::new()
            .fetch_all(&sources)
            .await
            .expect("local tables load");

        assert_eq!(tables.confirmed, "confirmed");
        assert_eq!(tables.recovered, "recovered");
        assert_eq!(tables.deceased, "deceased");

        for path in [confirmed, recovered, deceased] {
            let _ = std::fs::remove_file(path);
        }
    }

    #[tokio::test]
    async fn file_with_invalid_utf8_is_read_lossily() {
        let path = std::env::temp_dir().join(format!(
            "case-fusion-{}-invalid-utf8.csv",
            std::process::id()
        ));
        std::fs::write(&path, b"a,b,c,d,1/22/20\n,Alpha,1,2,\xFF\xFE\n")
            .expect("scratch file written");

        let body = SourceFetcher::new()
            .fetch(CaseAttribute::Confirmed, &SourceLocation::File(path.clone()))
            .await
            .expect("invalid utf-8 does not fail the fetch");
        assert!(body.starts_with("a,b,c,d,1/22/20\n,Alpha,1,2,"));
        assert!(body.contains('\u{FFFD}'));

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn one_failed_source_fails_the_whole_fetch() {
        let confirmed = scratch_file("partial-confirmed.csv", "confirmed");
        let sources = SourceSet {
            confirmed: SourceLocation::File(confirmed.clone()),
            recovered: SourceLocation::File(Path::new("./does-not-exist.csv").to_path_buf()),
            deceased: SourceLocation::File(confirmed.clone()),
        };

        let error = SourceFetcher::new()
            .fetch_all(&sources)
            .await
            .expect_err("missing recovered table must fail");

        match error {
            FetchError::Io { attribute, .. } => assert_eq!(attribute, CaseAttribute::Recovered),
            other => panic!("expected io error, got {other:?}"),
        }

        let _ = std::fs::remove_file(confirmed);
    }
}
