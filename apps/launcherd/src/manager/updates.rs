use std::cmp::Ordering;

use tracing::warn;

use super::error::ManagerError;
use super::source::ReleaseFeed;
use super::state::SharedState;
use super::version_paths;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
    pub update_available: bool,
    pub latest_version: Option<String>,
    pub installed_version: Option<String>,
}

/// Compare the newest release tag against the version decoded from the
/// selected interface's settings path. No interface selected, or a path
/// that does not decode, reads as "no update" rather than an error.
pub async fn check_for_updates(
    state: &SharedState,
    feed: &dyn ReleaseFeed,
) -> Result<UpdateCheck, ManagerError> {
    let releases = feed.release_meta().await?;
    let latest = releases.first().map(|release| release.tag_name.clone());

    let settings_path = {
        let session = state.lock().await;
        session.interface_settings.clone()
    };
    let Some(settings_path) = settings_path else {
        return Ok(UpdateCheck {
            update_available: false,
            latest_version: latest,
            installed_version: None,
        });
    };

    let decoded = version_paths::decode(&settings_path.to_string_lossy());
    match (latest, decoded) {
        (Some(latest_tag), Ok((_, installed))) => {
            let local = version_paths::normalize_for_compare(&installed);
            let update_available = compare_versions(&latest_tag, &local) == Ordering::Greater;
            Ok(UpdateCheck {
                update_available,
                latest_version: Some(latest_tag),
                installed_version: Some(installed),
            })
        }
        (latest, Err(e)) => {
            warn!("cannot read installed version, skipping update check: {e}");
            Ok(UpdateCheck {
                update_available: false,
                latest_version: latest,
                installed_version: None,
            })
        }
        (None, Ok((_, installed))) => Ok(UpdateCheck {
            update_available: false,
            latest_version: None,
            installed_version: Some(installed),
        }),
    }
}

/// Numeric segment comparison tolerant of the version shapes seen in the
/// wild: dotted tags ("2.1.0"), folder-form ("2-0-5" after normalizing
/// underscores) and prefixed tags ("v2.1.0"). Missing segments compare as
/// zero; segments with no digits at all compare as zero too.
pub(crate) fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |version: &str| -> Vec<u64> {
        version
            .split(['.', '-', '_'])
            .map(|segment| {
                let digits: String = segment
                    .chars()
                    .filter(|c| c.is_ascii_digit())
                    .collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    };

    let left = parse(a);
    let right = parse(b);
    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_tag_beats_folder_form_version() {
        // Installed "2_0_5" normalizes to "2-0-5" before comparing.
        let local = version_paths::normalize_for_compare("2_0_5");
        assert_eq!(compare_versions("2.1.0", &local), Ordering::Greater);
    }

    #[test]
    fn equal_versions_in_different_shapes() {
        assert_eq!(compare_versions("2.1.0", "2-1-0"), Ordering::Equal);
        assert_eq!(compare_versions("v2.1.0", "2.1.0"), Ordering::Equal);
    }

    #[test]
    fn shorter_versions_pad_with_zero() {
        assert_eq!(compare_versions("2.1", "2.1.0"), Ordering::Equal);
        assert_eq!(compare_versions("2.1.1", "2.1"), Ordering::Greater);
        assert_eq!(compare_versions("2", "2.0.1"), Ordering::Less);
    }
}
