use crate::detector;
use crate::errors::DealError;
use crate::identity;
use crate::models::{ChangeSemantics, IdentityPolicy, RunOutcome};
use crate::notifier::Notifier;
use crate::scraper::{DealSource, ImageFetcher};
use crate::store::DealStore;
use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub identity_policy: IdentityPolicy,
    pub change_semantics: ChangeSemantics,
}

/// One pass: fetch, derive identities, compare with history, persist, notify.
///
/// Anything that goes wrong before the history is saved aborts the run with
/// the store untouched. History is saved before the first announcement, so a
/// crash while notifying can lose announcements but never repeat them.
pub fn run_once<S, F>(
    source: &S,
    fetcher: &F,
    store: &DealStore,
    notifier: &Notifier<'_>,
    options: &RunOptions,
) -> Result<RunOutcome>
where
    S: DealSource + ?Sized,
    F: ImageFetcher + ?Sized,
{
    let urls = source
        .fetch_deal_urls()
        .with_context(|| format!("Failed to fetch deals from {}", source.name()))?;

    let extracted = identity::build_deals(&urls, options.identity_policy, fetcher);
    if extracted.deals.is_empty() {
        return Err(DealError::SourceFormat(format!(
            "none of the {} scraped deals had a usable {} identity",
            urls.len(),
            options.identity_policy
        ))
        .into());
    }
    info!("Identified {} current deals", extracted.deals.len());

    let previous = store.load().context("Failed to load deal history")?;
    let mut result = detector::detect(&extracted.deals, previous, options.change_semantics);

    // Deals that could not be identified are still live; their absence from
    // `current` is not a removal and must not drop them from history.
    if extracted.is_incomplete() {
        warn!(
            "{} deals could not be identified, keeping their history",
            extracted.skipped
        );
        result.changed = !result.new_deals.is_empty();
    }

    if !result.changed {
        info!("No new deals found");
        return Ok(RunOutcome::NoChanges);
    }

    let history: HashSet<String> = if extracted.is_incomplete() {
        result.current.union(&result.previous).cloned().collect()
    } else {
        result.current.clone()
    };
    store
        .save(&history)
        .context("Failed to persist deal history")?;

    if result.new_deals.is_empty() {
        info!("Deal list changed but nothing new to announce");
        return Ok(RunOutcome::Persisted);
    }

    info!("New deals found: {}", result.new_deals.len());
    let failures = notifier.announce(&result.new_deals);

    Ok(RunOutcome::Announced {
        new_deals: result.new_deals.len(),
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{Messages, MockAnnouncer};
    use crate::identity::content_identity;
    use crate::scraper::{MockDealSource, MockImageFetcher};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn messages() -> Messages {
        Messages {
            summary: "Deals updated".to_string(),
            image_title: "New deal".to_string(),
            social_caption: "caption".to_string(),
        }
    }

    fn source_with(urls: &[&str]) -> MockDealSource {
        let urls: Vec<String> = urls.iter().map(|u| u.to_string()).collect();
        let mut source = MockDealSource::new();
        source.expect_name().return_const("test");
        source.expect_fetch_deal_urls().returning(move || Ok(urls.clone()));
        source
    }

    fn stored(path: &PathBuf) -> HashSet<String> {
        serde_json::from_str::<Vec<String>>(&fs::read_to_string(path).unwrap())
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_source_failure_leaves_store_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deals.json");
        fs::write(&path, r#"["old.jpg"]"#).unwrap();
        let store = DealStore::new(&path);

        let mut source = MockDealSource::new();
        source.expect_name().return_const("test");
        source
            .expect_fetch_deal_urls()
            .returning(|| Err(DealError::SourceFormat("no short code found".to_string())));
        let fetcher = MockImageFetcher::new();
        let mut announcer = MockAnnouncer::new();
        announcer.expect_send_text().never();
        let messages = messages();
        let notifier = Notifier::new(&announcer, &fetcher, None, &messages);

        let err = run_once(&source, &fetcher, &store, &notifier, &RunOptions::default()).unwrap_err();

        assert!(matches!(err.downcast_ref::<DealError>(), Some(DealError::SourceFormat(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"["old.jpg"]"#);
    }

    #[test]
    fn test_persists_before_announcing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deals.json");
        fs::write(&path, r#"["a.jpg"]"#).unwrap();
        let store = DealStore::new(&path);

        let source = source_with(&["https://cdn.example.com/b.jpg", "https://cdn.example.com/a.jpg"]);
        let mut fetcher = MockImageFetcher::new();
        fetcher.expect_fetch_image().returning(|_| Ok(vec![1]));

        let seen_path = path.clone();
        let mut announcer = MockAnnouncer::new();
        announcer.expect_send_text().times(1).returning(move |_| {
            assert!(stored(&seen_path).contains("b.jpg"));
            Ok(())
        });
        announcer
            .expect_send_image()
            .withf(|_, name: &str, _| name == "b.jpg")
            .times(1)
            .returning(|_, _, _| Ok(()));
        let messages = messages();
        let notifier = Notifier::new(&announcer, &fetcher, None, &messages);

        let outcome = run_once(&source, &fetcher, &store, &notifier, &RunOptions::default()).unwrap();

        assert!(matches!(outcome, RunOutcome::Announced { new_deals: 1, ref failures } if failures.is_empty()));
        let expected: HashSet<String> = ["a.jpg", "b.jpg"].iter().map(|s| s.to_string()).collect();
        assert_eq!(stored(&path), expected);
    }

    #[test]
    fn test_no_new_deals_skips_persist_and_notify() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deals.json");
        fs::write(&path, r#"["b.jpg","a.jpg","gone.jpg"]"#).unwrap();
        let store = DealStore::new(&path);

        let source = source_with(&["https://cdn.example.com/a.jpg", "https://cdn.example.com/b.jpg"]);
        let fetcher = MockImageFetcher::new();
        let mut announcer = MockAnnouncer::new();
        announcer.expect_send_text().never();
        announcer.expect_send_image().never();
        let messages = messages();
        let notifier = Notifier::new(&announcer, &fetcher, None, &messages);

        let outcome = run_once(&source, &fetcher, &store, &notifier, &RunOptions::default()).unwrap();

        assert!(matches!(outcome, RunOutcome::NoChanges));
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"["b.jpg","a.jpg","gone.jpg"]"#);
    }

    #[test]
    fn test_symmetric_removal_persists_without_announcing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deals.json");
        fs::write(&path, r#"["a.jpg","gone.jpg"]"#).unwrap();
        let store = DealStore::new(&path);

        let source = source_with(&["https://cdn.example.com/a.jpg"]);
        let fetcher = MockImageFetcher::new();
        let mut announcer = MockAnnouncer::new();
        announcer.expect_send_text().never();
        let messages = messages();
        let notifier = Notifier::new(&announcer, &fetcher, None, &messages);
        let options = RunOptions {
            change_semantics: ChangeSemantics::Symmetric,
            ..RunOptions::default()
        };

        let outcome = run_once(&source, &fetcher, &store, &notifier, &options).unwrap();

        assert!(matches!(outcome, RunOutcome::Persisted));
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"["a.jpg"]"#);
    }

    #[test]
    fn test_unusable_identities_fail_the_run() {
        let dir = tempdir().unwrap();
        let store = DealStore::new(dir.path().join("deals.json"));

        let source = source_with(&["https://cdn.example.com/"]);
        let fetcher = MockImageFetcher::new();
        let announcer = MockAnnouncer::new();
        let messages = messages();
        let notifier = Notifier::new(&announcer, &fetcher, None, &messages);

        let err = run_once(&source, &fetcher, &store, &notifier, &RunOptions::default()).unwrap_err();

        assert!(matches!(err.downcast_ref::<DealError>(), Some(DealError::SourceFormat(_))));
        assert!(!store.path().exists());
    }

    fn hashing_fetcher(failing: Option<&'static str>) -> MockImageFetcher {
        let mut fetcher = MockImageFetcher::new();
        fetcher.expect_fetch_image().returning(move |url| match failing {
            Some(name) if url.ends_with(name) => Err(DealError::network(url, "HTTP 503 Service Unavailable")),
            _ => Ok(url.as_bytes().to_vec()),
        });
        fetcher
    }

    fn hash_of(url: &str) -> String {
        content_identity(url.as_bytes())
    }

    #[test]
    fn test_transient_hash_failure_does_not_reannounce() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deals.json");
        let store = DealStore::new(&path);
        let messages = messages();
        let options = RunOptions {
            identity_policy: IdentityPolicy::ContentHash,
            change_semantics: ChangeSemantics::Symmetric,
        };
        let page = ["https://cdn.example.com/a.jpg", "https://cdn.example.com/b.jpg"];
        let both: HashSet<String> = page.iter().map(|u| hash_of(u)).collect();

        // First run announces both deals.
        let fetcher = hashing_fetcher(None);
        let mut announcer = MockAnnouncer::new();
        announcer.expect_send_text().times(1).returning(|_| Ok(()));
        announcer.expect_send_image().times(2).returning(|_, _, _| Ok(()));
        let notifier = Notifier::new(&announcer, &fetcher, None, &messages);
        let outcome = run_once(&source_with(&page), &fetcher, &store, &notifier, &options).unwrap();
        assert!(matches!(outcome, RunOutcome::Announced { new_deals: 2, .. }));
        assert_eq!(stored(&path), both);

        // Second run cannot download b; it is neither removed nor announced.
        let fetcher = hashing_fetcher(Some("b.jpg"));
        let mut announcer = MockAnnouncer::new();
        announcer.expect_send_text().never();
        announcer.expect_send_image().never();
        let notifier = Notifier::new(&announcer, &fetcher, None, &messages);
        let outcome = run_once(&source_with(&page), &fetcher, &store, &notifier, &options).unwrap();
        assert!(matches!(outcome, RunOutcome::NoChanges));
        assert_eq!(stored(&path), both);

        // Third run recovers and finds nothing new.
        let fetcher = hashing_fetcher(None);
        let mut announcer = MockAnnouncer::new();
        announcer.expect_send_text().never();
        announcer.expect_send_image().never();
        let notifier = Notifier::new(&announcer, &fetcher, None, &messages);
        let outcome = run_once(&source_with(&page), &fetcher, &store, &notifier, &options).unwrap();
        assert!(matches!(outcome, RunOutcome::NoChanges));
        assert_eq!(stored(&path), both);
    }

    #[test]
    fn test_new_deal_with_failed_download_keeps_unidentified_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deals.json");
        let a = "https://cdn.example.com/a.jpg";
        let b = "https://cdn.example.com/b.jpg";
        let c = "https://cdn.example.com/c.jpg";
        fs::write(&path, serde_json::to_string(&[hash_of(a), hash_of(b)]).unwrap()).unwrap();
        let store = DealStore::new(&path);

        let fetcher = hashing_fetcher(Some("b.jpg"));
        let mut announcer = MockAnnouncer::new();
        announcer.expect_send_text().times(1).returning(|_| Ok(()));
        announcer.expect_send_image().times(1).returning(|_, _, _| Ok(()));
        let messages = messages();
        let notifier = Notifier::new(&announcer, &fetcher, None, &messages);
        let options = RunOptions {
            identity_policy: IdentityPolicy::ContentHash,
            ..RunOptions::default()
        };

        let outcome = run_once(&source_with(&[c, b, a]), &fetcher, &store, &notifier, &options).unwrap();

        assert!(matches!(outcome, RunOutcome::Announced { new_deals: 1, .. }));
        let expected: HashSet<String> = [a, b, c].iter().map(|u| hash_of(u)).collect();
        assert_eq!(stored(&path), expected);
    }

    #[test]
    fn test_unreadable_history_aborts_before_notifying() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deals.json");
        fs::create_dir(&path).unwrap();
        let store = DealStore::new(&path);

        let source = source_with(&["https://cdn.example.com/a.jpg"]);
        let fetcher = MockImageFetcher::new();
        let mut announcer = MockAnnouncer::new();
        announcer.expect_send_text().never();
        announcer.expect_send_image().never();
        let messages = messages();
        let notifier = Notifier::new(&announcer, &fetcher, None, &messages);

        let err = run_once(&source, &fetcher, &store, &notifier, &RunOptions::default()).unwrap_err();

        assert!(matches!(err.downcast_ref::<DealError>(), Some(DealError::Persistence(_))));
        assert!(path.is_dir());
    }
}
