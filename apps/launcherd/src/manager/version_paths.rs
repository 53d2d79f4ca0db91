use thiserror::Error;

/// Per-version settings directory, ignored when decoding paths.
const SETTINGS_COMPONENT: &str = "launcher_settings";
/// Interface executable, ignored when decoding paths.
const EXECUTABLE_COMPONENT: &str = "interface.exe";

#[derive(Debug, Error)]
pub enum VersionPathError {
    #[error("no name/version delimiter in path segment: {0}")]
    Malformed(String),
}

/// Install folder name for a release. The inverse of [`decode`] as long as
/// the version carries no `-` of its own.
pub fn encode(name: &str, version: &str) -> String {
    format!("{name}-{version}")
}

/// Release tags use dots; install folders store them with underscores so
/// the folder's only `-` is the name/version delimiter.
pub fn sanitize_version(version: &str) -> String {
    version.replace('.', "_")
}

/// Folder-form version back to a shape the version comparison accepts.
pub fn normalize_for_compare(version: &str) -> String {
    version.replace('_', "-")
}

/// Recover `(name, version)` from an install path. Accepts full paths, bare
/// folder names, and paths that still carry the settings dir or executable
/// as their final components. The version is everything after the last `-`
/// of the folder name.
pub fn decode(path: &str) -> Result<(String, String), VersionPathError> {
    let mut segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect();

    while let Some(last) = segments.last() {
        if last.eq_ignore_ascii_case(SETTINGS_COMPONENT)
            || last.eq_ignore_ascii_case(EXECUTABLE_COMPONENT)
        {
            segments.pop();
        } else {
            break;
        }
    }

    let Some(segment) = segments.last() else {
        return Err(VersionPathError::Malformed(path.to_string()));
    };

    match segment.rsplit_once('-') {
        Some((name, version)) if !name.is_empty() && !version.is_empty() => {
            Ok((name.to_string(), version.to_string()))
        }
        _ => Err(VersionPathError::Malformed(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips() {
        for (name, version) in [
            ("Orbit Interface", "2_1_0"),
            ("interface", "dev"),
            ("Orbit-Nightly Interface", "2_0_5"),
        ] {
            let folder = encode(name, version);
            let (decoded_name, decoded_version) = decode(&folder).unwrap();
            assert_eq!(decoded_name, name);
            assert_eq!(decoded_version, version);
        }
    }

    #[test]
    fn decode_accepts_full_paths_and_trailing_separators() {
        let (name, version) =
            decode("/srv/orbit/library/Orbit Interface-2_0_5/").unwrap();
        assert_eq!(name, "Orbit Interface");
        assert_eq!(version, "2_0_5");

        let (name, version) =
            decode(r"C:\Orbit\Library\Orbit Interface-2_0_5").unwrap();
        assert_eq!(name, "Orbit Interface");
        assert_eq!(version, "2_0_5");
    }

    #[test]
    fn decode_ignores_settings_and_executable_suffixes() {
        let settings = "/srv/orbit/library/Orbit Interface-2_0_5/launcher_settings";
        assert_eq!(decode(settings).unwrap().1, "2_0_5");

        let exe = "/srv/orbit/library/Orbit Interface-2_0_5/interface.exe";
        assert_eq!(decode(exe).unwrap().1, "2_0_5");

        let both = "/srv/orbit/library/Orbit Interface-2_0_5/launcher_settings/interface.exe";
        assert_eq!(decode(both).unwrap().1, "2_0_5");
    }

    #[test]
    fn decode_rejects_segments_without_delimiter() {
        assert!(decode("/srv/orbit/library/downloads").is_err());
        assert!(decode("").is_err());
        assert!(decode("-2_0_5").is_err());
        assert!(decode("Orbit Interface-").is_err());
    }

    #[test]
    fn sanitize_and_normalize_relate_tag_and_folder_forms() {
        assert_eq!(sanitize_version("2.1.0"), "2_1_0");
        assert_eq!(normalize_for_compare("2_0_5"), "2-0-5");
    }
}
