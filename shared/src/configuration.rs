use std::fs::read_to_string;
use std::path::Path;

use miette::{miette, Context, IntoDiagnostic, Result};
use serde::de::DeserializeOwned;

/// Loads and parses a TOML configuration file.
pub fn load_from_file<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if path.exists() && !path.is_file() {
        return Err(miette!(
            "Path exists, but it is not a file: {:?}",
            path
        ));
    } else if !path.exists() {
        return Err(miette!("No such file: {:?}", path));
    }

    let file_contents = read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| miette!("Could not read configuration file."))?;

    parse_from_str(&file_contents)
}

pub fn parse_from_str<T: DeserializeOwned>(contents: &str) -> Result<T> {
    toml::from_str(contents)
        .into_diagnostic()
        .wrap_err_with(|| miette!("Could not parse TOML contents of configuration file."))
}


#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Sample {
        name: String,
        count: usize,
    }

    #[test]
    fn loads_toml_file() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("sample.toml");
        std::fs::write(&path, "name = \"scene\"\ncount = 3\n").unwrap();

        let sample: Sample = load_from_file(&path).unwrap();
        assert_eq!(
            sample,
            Sample {
                name: "scene".to_string(),
                count: 3
            }
        );
    }

    #[test]
    fn missing_and_directory_paths_are_rejected() {
        let directory = tempfile::tempdir().unwrap();

        assert!(load_from_file::<Sample, _>(directory.path().join("missing.toml")).is_err());
        assert!(load_from_file::<Sample, _>(directory.path()).is_err());
    }

    #[test]
    fn invalid_toml_is_rejected() {
        assert!(parse_from_str::<Sample>("name = ").is_err());
    }
}
